//! Phishing risk scoring
//!
//! Rule based indicators, optionally blended with a model's own 0-100 rating.

use std::time::Duration;

use indoc::formatdoc;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use strum::{AsRefStr, Display};
use url::{Host, Url};

use crate::{
    categorizer_config::PhishingConfig,
    email::EmailRecord,
    prompt::{generate_with_retry, LabelGenerator, TimeoutSchedule},
};

lazy_static! {
    static ref RE_URL: Regex = Regex::new(r#"https?://[^\s<>"')]+"#).unwrap();
    static ref RE_SPOOFED_DOMAIN: Regex = Regex::new(r"[0-9]|[.\-]{2,}|[_\-]").unwrap();
    static ref RE_CREDENTIALS: Regex = Regex::new(
        r"password|login|username|pin\s*code|social\s*security|credit\s*card|bank\s*account"
    )
    .unwrap();
    static ref RE_RISK_SCORE: Regex = Regex::new(r#"(?i)risk[_\s]*score["\s]*:\s*(\d+)"#).unwrap();
}

const SUSPICIOUS_SENDER_SCORE: u32 = 30;
const SPOOFED_DOMAIN_SCORE: u32 = 10;
const SUBJECT_KEYWORD_SCORE: u32 = 15;
const BODY_PHRASE_SCORE: u32 = 10;
const URGENCY_SCORE: u32 = 20;
const MIN_URGENCY_WORDS: usize = 2;
const SHORT_URL_SCORE: u32 = 25;
const IP_URL_SCORE: u32 = 30;
const SUSPICIOUS_TLD_SCORE: u32 = 20;
const CREDENTIALS_SCORE: u32 = 15;
const SHOUTING_SCORE: u32 = 10;
const MAX_SCORE: u32 = 100;
/// Used when the model fails or gives no readable score
const LLM_FALLBACK_SCORE: u32 = 25;
const PROMPT_BODY_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            80.. => RiskLevel::High,
            50..=79 => RiskLevel::Medium,
            20..=49 => RiskLevel::Low,
            _ => RiskLevel::Safe,
        }
    }

    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            RiskLevel::High => &[
                "Do NOT click any links or download attachments",
                "Do NOT provide any personal information",
                "Report this email as phishing to your IT team",
                "Delete this email immediately",
                "Change passwords if you've already interacted",
            ],
            RiskLevel::Medium => &[
                "Exercise extreme caution with this email",
                "Verify sender through alternative communication",
                "Avoid clicking links - navigate directly to websites",
                "Contact the sender directly if urgent",
                "Consult IT security if unsure",
            ],
            RiskLevel::Low => &[
                "Some suspicious elements detected",
                "Verify sender if requesting sensitive information",
                "Hover over links to check destinations before clicking",
                "Be cautious with personal information sharing",
            ],
            RiskLevel::Safe => &[
                "Email appears safe based on analysis",
                "Still verify unexpected requests for sensitive info",
                "Standard caution with links and attachments advised",
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleAnalysis {
    pub score: u32,
    pub indicators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhishingReport {
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub indicators: Vec<String>,
    pub explanation: String,
    pub rule_score: u32,
    pub llm_score: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct LlmVerdict {
    risk_score: f64,
    #[serde(default)]
    explanation: Option<String>,
}

pub struct PhishingDetector {
    config: PhishingConfig,
    schedule: TimeoutSchedule,
}

impl PhishingDetector {
    pub fn new(config: &PhishingConfig) -> Self {
        PhishingDetector {
            config: config.clone(),
            // 30s then 60s
            schedule: TimeoutSchedule::new(
                Duration::from_secs(config.base_timeout_secs),
                2,
                config.max_attempts,
            ),
        }
    }

    pub fn analyze_rules(&self, email: &EmailRecord) -> RuleAnalysis {
        let mut score = 0;
        let mut indicators = vec![];

        if let Some(domain) = email.sender_domain() {
            if self
                .config
                .suspicious_domains
                .iter()
                .any(|d| domain.contains(d.as_str()))
            {
                score += SUSPICIOUS_SENDER_SCORE;
                indicators.push(format!("Suspicious sender domain: {}", domain));
            }
            let stem = domain.replace(".com", "").replace(".org", "");
            if RE_SPOOFED_DOMAIN.is_match(&stem) {
                score += SPOOFED_DOMAIN_SCORE;
                indicators.push("Potentially spoofed domain".to_string());
            }
        }

        let subject = email.subject.to_lowercase();
        for keyword in self.config.subject_keywords.iter().filter(|k| subject.contains(k.as_str())) {
            score += SUBJECT_KEYWORD_SCORE;
            indicators.push(format!("Suspicious subject: '{}'", keyword));
        }

        let body = email.body.to_lowercase();
        for phrase in self.config.body_phrases.iter().filter(|p| body.contains(p.as_str())) {
            score += BODY_PHRASE_SCORE;
            indicators.push(format!("Suspicious phrase: '{}'", phrase));
        }

        let urgency = self
            .config
            .urgency_words
            .iter()
            .filter(|w| body.contains(w.as_str()))
            .count();
        if urgency >= MIN_URGENCY_WORDS {
            score += URGENCY_SCORE;
            indicators.push("Multiple urgency indicators".to_string());
        }

        for url in RE_URL.find_iter(&email.body) {
            let Some(host) = url_host(url.as_str()) else {
                continue;
            };
            if matches!(host, Host::Ipv4(_) | Host::Ipv6(_)) {
                score += IP_URL_SCORE;
                indicators.push("URL uses IP address instead of domain".to_string());
                continue;
            }
            let host = host.to_string();
            if self
                .config
                .suspicious_domains
                .iter()
                .any(|d| host.contains(d.as_str()))
            {
                score += SHORT_URL_SCORE;
                indicators.push(format!("Suspicious shortened URL: {}", host));
            }
            if self
                .config
                .suspicious_tlds
                .iter()
                .any(|tld| host.ends_with(tld.as_str()))
            {
                score += SUSPICIOUS_TLD_SCORE;
                indicators.push(format!("Suspicious domain extension: {}", host));
            }
        }

        if RE_CREDENTIALS.is_match(&body) {
            score += CREDENTIALS_SCORE;
            indicators.push("Requests sensitive information".to_string());
        }

        if has_shouting(&format!("{} {}", email.subject, email.body)) {
            score += SHOUTING_SCORE;
            indicators.push("Poor grammar/spelling".to_string());
        }

        RuleAnalysis {
            score: score.min(MAX_SCORE),
            indicators,
        }
    }

    /// Full report. With a generator the model's score is blended in by
    /// `llm_weight`; without one the rule score stands alone.
    pub async fn analyze<G: LabelGenerator>(
        &self,
        email: &EmailRecord,
        generator: Option<&G>,
    ) -> PhishingReport {
        let rules = self.analyze_rules(email);

        let (risk_score, llm_score, explanation) = match generator {
            Some(generator) => {
                let (llm_score, explanation) = self.analyze_llm(email, generator).await;
                let weight = self.config.llm_weight.clamp(0.0, 1.0);
                let blended = llm_score as f64 * weight + rules.score as f64 * (1.0 - weight);
                (blended as u32, Some(llm_score), explanation)
            }
            None => (
                rules.score,
                None,
                format!("{} rule based indicators found", rules.indicators.len()),
            ),
        };

        PhishingReport {
            risk_score,
            risk_level: RiskLevel::from_score(risk_score),
            indicators: rules.indicators,
            explanation,
            rule_score: rules.score,
            llm_score,
        }
    }

    async fn analyze_llm<G: LabelGenerator>(&self, email: &EmailRecord, generator: &G) -> (u32, String) {
        let prompt = phishing_prompt(email);
        match generate_with_retry(generator, &prompt, &self.schedule, None).await {
            Ok(response) => parse_verdict(&response),
            Err(e) => {
                tracing::error!("LLM phishing analysis failed for {}: {}", email.id, e);
                (LLM_FALLBACK_SCORE, format!("LLM analysis failed: {}", e))
            }
        }
    }
}

/// Normalized host of a URL. Numeric forms like `http://2130706433/` come
/// back as `Host::Ipv4`.
fn url_host(url: &str) -> Option<Host<String>> {
    Url::parse(url).ok()?.host().map(|host| host.to_owned())
}

/// Three or more consecutive all-caps words longer than two characters
fn has_shouting(text: &str) -> bool {
    let mut run = 0;
    for word in text.split_whitespace() {
        let has_letters = word.chars().any(char::is_alphabetic);
        let upper = has_letters && !word.chars().any(char::is_lowercase);
        if upper && word.chars().count() > 2 {
            run += 1;
            if run >= 3 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

fn phishing_prompt(email: &EmailRecord) -> String {
    let mut body: String = email.body.chars().take(PROMPT_BODY_CHARS).collect();
    if email.body.chars().count() > PROMPT_BODY_CHARS {
        body.push_str("...");
    }
    formatdoc! {r#"
        Analyze this email for phishing indicators. Rate the phishing risk from 0-100.

        Email Details:
        From: {sender}
        Subject: {subject}
        Body: {body}

        Analyze for:
        1. Urgency tactics
        2. Request for personal information
        3. Suspicious links or attachments
        4. Grammar/spelling errors
        5. Generic greetings
        6. Authority impersonation
        7. Fear tactics

        Respond with JSON:
        {{"risk_score": 0-100, "explanation": "detailed explanation of findings"}}"#,
        sender = email.sender,
        subject = email.subject,
    }
}

/// Score and explanation from model output: JSON first, then a loose
/// `risk_score: N` match
fn parse_verdict(response: &str) -> (u32, String) {
    let trimmed = response.trim();
    let json = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    };

    if let Ok(verdict) = serde_json::from_str::<LlmVerdict>(json) {
        let score = verdict.risk_score.clamp(0.0, MAX_SCORE as f64) as u32;
        let explanation = verdict
            .explanation
            .unwrap_or_else(|| "LLM analysis completed".to_string());
        return (score, explanation);
    }

    tracing::debug!("Could not parse JSON verdict, parsing manually...");
    match RE_RISK_SCORE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
    {
        Some(score) => (score.min(MAX_SCORE), trimmed.to_string()),
        None => (
            LLM_FALLBACK_SCORE,
            "LLM analysis completed but score unclear".to_string(),
        ),
    }
}
