use std::{collections::BTreeMap, time::Duration};

use indoc::formatdoc;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::time::Instant;

use super::ClusterName;
use crate::{
    categorizer_config::LlmConfig,
    email::EmailRecord,
    prompt::{generate_with_retry, LabelGenerator, TimeoutSchedule},
};

lazy_static! {
    static ref RE_COUNT_SUFFIX: Regex = Regex::new(r"\s*\(\d+\s*emails?\)").unwrap();
    static ref RE_NAME_CHARSET: Regex = Regex::new(r"^[A-Za-z0-9\s&\-/()]+$").unwrap();
    static ref RE_BULLET: Regex = Regex::new(r"^(?:[-*•]|\d+[.)])\s+").unwrap();
}

const NAME_PREFIXES: [&str; 4] = ["Category Name:", "Category:", "Name:", "Suggestion:"];

const FALLBACK_IMPROVEMENTS: [(&str, &str); 5] = [
    ("General", "Mixed Communications"),
    ("Miscellaneous", "Various Topics"),
    ("Uncategorized", "Unclassified Emails"),
    ("Email Group", "Email Cluster"),
    ("Cluster", "Email Group"),
];

const SENDER_CHARS: usize = 50;
const SUBJECT_CHARS: usize = 80;
const PREVIEW_CHARS: usize = 100;

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Numbered sender / subject / preview lines for the first `samples` emails
pub fn cluster_summary(emails: &[&EmailRecord], samples: usize) -> String {
    let mut parts: Vec<String> = emails
        .iter()
        .take(samples)
        .enumerate()
        .map(|(i, email)| {
            let sender = if email.sender.is_empty() { "Unknown" } else { email.sender.as_str() };
            let subject = if email.subject.is_empty() { "No Subject" } else { email.subject.as_str() };
            format!(
                "{}. From: {}\n   Subject: {}\n   Preview: {}...",
                i + 1,
                truncate(sender, SENDER_CHARS),
                truncate(subject, SUBJECT_CHARS),
                truncate(&email.body, PREVIEW_CHARS),
            )
        })
        .collect();

    if emails.len() > samples {
        parts.push(format!("... and {} more similar emails", emails.len() - samples));
    }
    parts.join("\n\n")
}

pub fn naming_prompt(current_name: &str, size: usize, summary: &str) -> String {
    formatdoc! {r#"
        Analyze this email cluster and suggest a clear, descriptive category name.

        Cluster Info:
        - Size: {size} emails
        - Current name: {current_name}

        Sample emails from cluster:
        {summary}

        Rules:
        1. Create a clear, professional category name (2-4 words)
        2. Focus on the main theme/purpose of these emails
        3. Use categories like: Professional Development, Work Communications, Shopping & E-commerce,
           Entertainment & Media, Financial Services, Security & Authentication, Travel & Booking,
           News & Updates, Social & Networking, Support & Service, Development & Technology
        4. If emails don't fit standard categories, create a descriptive custom name

        Return ONLY the category name, nothing else.
        Example: "Professional Development" or "GitHub Notifications" or "Travel Bookings""#}
}

/// Extract a usable category name from noisy model output.
///
/// Keeps the first non-empty line, drops bullets, known prefixes, quotes and
/// any `(n emails)` suffix, then checks length and charset.
pub fn sanitize_llm_name(raw: &str, min_len: usize, max_len: usize) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let mut name = RE_BULLET.replace(line, "").trim().to_string();

    for prefix in NAME_PREFIXES {
        if name
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        {
            name = name[prefix.len()..].trim().to_string();
        }
    }

    let name = name.trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*') || c.is_whitespace());
    let name = RE_COUNT_SUFFIX.replace_all(name, "");
    let name = name.trim().trim_end_matches('.').trim();

    let len = name.chars().count();
    if len < min_len || len > max_len || !RE_NAME_CHARSET.is_match(name) {
        return None;
    }
    Some(name.to_string())
}

/// Base name used when the model gave nothing usable. Only the first matching
/// generic word is replaced.
pub fn improve_fallback_name(base: &str) -> String {
    let base = RE_COUNT_SUFFIX.replace_all(base, "");
    FALLBACK_IMPROVEMENTS
        .iter()
        .find(|(generic, _)| base.contains(*generic))
        .map(|(generic, better)| base.replacen(*generic, better, 1))
        .unwrap_or_else(|| base.to_string())
}

/// Renames clusters one at a time through a `LabelGenerator`, keeping the
/// deterministic name whenever the model fails or runs out of time
pub struct LlmNamer<'a, G: LabelGenerator> {
    generator: &'a G,
    schedule: TimeoutSchedule,
    samples: usize,
    min_name_len: usize,
    max_name_len: usize,
    budget: Option<Duration>,
}

impl<'a, G: LabelGenerator> LlmNamer<'a, G> {
    pub fn new(generator: &'a G, config: &LlmConfig) -> Self {
        LlmNamer {
            generator,
            schedule: TimeoutSchedule::new(
                Duration::from_secs(config.base_timeout_secs),
                config.timeout_multiplier,
                config.max_attempts,
            ),
            samples: config.sample_emails,
            min_name_len: config.min_name_len,
            max_name_len: config.max_name_len,
            budget: config.naming_budget_secs.map(Duration::from_secs),
        }
    }

    pub fn with_budget(mut self, budget: Option<Duration>) -> Self {
        self.budget = budget;
        self
    }

    /// Rename every non-outlier cluster in place. `groups` maps cluster ids to
    /// rows of `emails`.
    pub async fn polish(
        &self,
        names: &mut [ClusterName],
        groups: &BTreeMap<i32, Vec<usize>>,
        emails: &[EmailRecord],
    ) {
        let deadline = self.budget.map(|budget| Instant::now() + budget);
        let total = names.iter().filter(|n| !n.is_outlier).count();
        let mut exhausted = false;

        for (i, name) in names.iter_mut().filter(|n| !n.is_outlier).enumerate() {
            if exhausted || deadline.is_some_and(|d| Instant::now() >= d) {
                if !exhausted {
                    tracing::warn!(
                        "LLM naming budget exhausted, {} clusters keep fallback names",
                        total - i
                    );
                    exhausted = true;
                }
                name.base = improve_fallback_name(&name.base);
                continue;
            }

            let members: Vec<&EmailRecord> = groups
                .get(&name.cluster_id)
                .map(|rows| rows.iter().filter_map(|r| emails.get(*r)).collect())
                .unwrap_or_default();
            let prompt = naming_prompt(
                &name.label(),
                name.size,
                &cluster_summary(&members, self.samples),
            );

            tracing::info!("Naming cluster {}/{}: {}", i + 1, total, name.label());
            match generate_with_retry(self.generator, &prompt, &self.schedule, deadline).await {
                Ok(raw) => match sanitize_llm_name(&raw, self.min_name_len, self.max_name_len) {
                    Some(clean) => {
                        tracing::info!("LLM renamed '{}' to '{}'", name.base, clean);
                        name.base = clean;
                        name.strategy = "llm".to_string();
                    }
                    None => {
                        tracing::warn!("Rejected LLM name {:?} for '{}'", raw, name.base);
                        name.base = improve_fallback_name(&name.base);
                    }
                },
                Err(e) => {
                    tracing::warn!("LLM naming failed for '{}': {}", name.base, e);
                    name.base = improve_fallback_name(&name.base);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        categorizer_config::CategorizerConfig,
        testing::common::{email, FailingGenerator, FixedGenerator},
    };

    fn cluster_name(id: i32, base: &str, size: usize) -> ClusterName {
        ClusterName {
            cluster_id: id,
            base: base.to_string(),
            size,
            strategy: "domain".to_string(),
            is_outlier: false,
        }
    }

    #[test]
    fn test_sanitize_llm_name() {
        let s = |raw: &str| sanitize_llm_name(raw, 3, 50);
        assert_eq!(s("  \"Bank Alerts\"  ").as_deref(), Some("Bank Alerts"));
        assert_eq!(s("Category: Travel Bookings").as_deref(), Some("Travel Bookings"));
        assert_eq!(s("Category Name: CI Failures").as_deref(), Some("CI Failures"));
        assert_eq!(s("\n- `GitHub Notifications`\nThese emails are...").as_deref(), Some("GitHub Notifications"));
        assert_eq!(s("Shopping & E-commerce (12 emails)").as_deref(), Some("Shopping & E-commerce"));
        assert_eq!(s("News/Updates.").as_deref(), Some("News/Updates"));
    }

    #[test]
    fn test_sanitize_rejects_bad_names() {
        let s = |raw: &str| sanitize_llm_name(raw, 3, 50);
        assert_eq!(s(""), None);
        assert_eq!(s("OK"), None);
        assert_eq!(s("Emails: receipts, invoices!"), None);
        assert_eq!(s(&"Long ".repeat(20)), None);
    }

    #[test]
    fn test_improve_fallback_name() {
        assert_eq!(improve_fallback_name("General"), "Mixed Communications");
        assert_eq!(improve_fallback_name("Miscellaneous"), "Various Topics");
        assert_eq!(improve_fallback_name("Email Group 3 (4 emails)"), "Email Cluster 3");
        assert_eq!(improve_fallback_name("GitHub Development"), "GitHub Development");
    }

    #[test]
    fn test_cluster_summary() {
        let emails = [
            email("1", "alerts@bank.com", "Verify your account", "We noticed unusual activity on your account"),
            email("2", "", "", "short"),
            email("3", "alerts@bank.com", "Another", "body"),
        ];
        let refs: Vec<&EmailRecord> = emails.iter().collect();
        let summary = cluster_summary(&refs, 2);
        assert!(summary.starts_with("1. From: alerts@bank.com\n   Subject: Verify your account\n   Preview: We noticed"));
        assert!(summary.contains("2. From: Unknown\n   Subject: No Subject\n   Preview: short..."));
        assert!(summary.ends_with("... and 1 more similar emails"));
    }

    #[test]
    fn test_naming_prompt() {
        let prompt = naming_prompt("Email Group 1 (3 emails)", 3, "1. From: a@b.com");
        assert!(prompt.starts_with("Analyze this email cluster"));
        assert!(prompt.contains("- Size: 3 emails"));
        assert!(prompt.contains("- Current name: Email Group 1 (3 emails)"));
        assert!(prompt.contains("Return ONLY the category name"));
    }

    #[tokio::test]
    async fn test_polish_with_fixed_answer() {
        let config = CategorizerConfig::default();
        let emails = vec![email("1", "a@bank.com", "Statement", "")];
        let groups = BTreeMap::from([(0, vec![0])]);
        let mut names = vec![cluster_name(0, "Financial Services", 1)];
        let generator = FixedGenerator::new("Category: Bank Statements");

        LlmNamer::new(&generator, &config.llm)
            .polish(&mut names, &groups, &emails)
            .await;

        assert_eq!(names[0].base, "Bank Statements");
        assert_eq!(names[0].strategy, "llm");
    }

    #[tokio::test(start_paused = true)]
    async fn test_polish_falls_back_on_failure() {
        let config = CategorizerConfig::default();
        let emails = vec![email("1", "x@y.com", "Hi", ""), email("2", "x@y.com", "Yo", "")];
        let groups = BTreeMap::from([(0, vec![0]), (1, vec![1])]);
        let mut names = vec![cluster_name(0, "Email Group 0", 1), cluster_name(1, "Garden Related", 1)];

        LlmNamer::new(&FailingGenerator, &config.llm)
            .polish(&mut names, &groups, &emails)
            .await;

        assert_eq!(names[0].base, "Email Cluster 0");
        assert_eq!(names[1].base, "Garden Related");
        assert_eq!(names[1].strategy, "domain");
    }

    #[tokio::test]
    async fn test_polish_skips_outliers() {
        let config = CategorizerConfig::default();
        let generator = FixedGenerator::new("Renamed");
        let mut names = vec![ClusterName {
            cluster_id: -1,
            base: "Miscellaneous".to_string(),
            size: 2,
            strategy: "outlier".to_string(),
            is_outlier: true,
        }];
        LlmNamer::new(&generator, &config.llm)
            .polish(&mut names, &BTreeMap::new(), &[])
            .await;
        assert_eq!(names[0].base, "Miscellaneous");
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_budget_keeps_fallback_names() {
        let config = CategorizerConfig::default();
        let generator = FixedGenerator::new("Renamed");
        let mut names = vec![cluster_name(0, "General", 1)];
        LlmNamer::new(&generator, &config.llm)
            .with_budget(Some(Duration::ZERO))
            .polish(&mut names, &BTreeMap::new(), &[])
            .await;
        assert_eq!(names[0].base, "Mixed Communications");
        assert_eq!(generator.calls(), 0);
    }
}
