use std::{borrow::Cow, collections::HashSet};

use itertools::Itertools;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::{
    categorizer_config::{CategorizerConfig, ServiceDomain},
    email::{
        lemmatizer::lemmatize, record::EmailRecord, sender::sender_features,
        stopwords::stopword_set,
    },
};

const RE_WHITESPACE_STR: &str = r"[\r\t\n]+";
const RE_LONG_SPACE_STR: &str = r" {2,}";
const RE_DIVIDERS_STR: &str = r"[-=_]{3,}";
const RE_HTTP_LINK_STR: &str = r"https?:\/\/(www\.)?[-a-zA-Z0-9@:%._\+~#=]{1,256}\.[a-zA-Z0-9()]{1,6}\b([-a-zA-Z0-9()@:%_\+.~#?&//=]*)";
const RE_WWW_LINK_STR: &str = r"(?i)\bwww\.[^\s]+";
const RE_EMAIL_ADDR_STR: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";
const RE_HTML_TAG_STR: &str = r"<[^>]+>";
const RE_HTML_ENTITY_STR: &str = r"&(#\d+|#x[0-9a-fA-F]+|[a-zA-Z]+);";
const RE_SANITIZE_STR: &str = r"(?is)<!--.*?-->|<script.*?</script>|<style.*?</style>";
const RE_IMG_TAG_STR: &str = r#"<img[^>]*alt=["']([^"']*)["'][^>]*/?>"#;
const RE_NON_LETTER_STR: &str = r"[^\p{L}\s]+";
// Footer detection patterns (case-insensitive)
const RE_FOOTER_STR: &str = r"(?i)(^|\s)(unsubscribe|opt[- ]?out|manage\s+(your\s+)?(email\s+)?preferences|email\s+preferences|update\s+(your\s+)?preferences|sent\s+from\s+(my\s+)?(iphone|ipad|android|samsung|galaxy|mobile|outlook)|get\s+outlook\s+for|this\s+(email|message)\s+(is\s+)?(was\s+)?sent\s+(to|from)|this\s+(e-?mail|message)\s+(and\s+any\s+attachments\s+)?(is|are|may\s+be)\s+(intended|privileged|confidential)|if\s+you\s+(are\s+not|have\s+received)\s+(the\s+intended|this\s+(e-?mail|message)\s+in\s+error)|privacy\s+policy|terms\s+(of\s+service|and\s+conditions)|all\s+rights\s+reserved|©\s*\d{4}|\d{4}\s*©|view\s+(this\s+)?(email\s+)?in\s+(your\s+)?browser|trouble\s+viewing|add\s+us\s+to\s+your\s+address\s+book|you('re|\s+are)\s+(receiving|getting)\s+this\s+(email|message|because))";

lazy_static::lazy_static!(
    static ref RE_WHITESPACE: Regex = Regex::new(RE_WHITESPACE_STR).unwrap();
    static ref RE_LONG_SPACE: Regex = Regex::new(RE_LONG_SPACE_STR).unwrap();
    static ref RE_DIVIDERS: Regex = Regex::new(RE_DIVIDERS_STR).unwrap();
    static ref RE_HTTP_LINK: Regex = Regex::new(RE_HTTP_LINK_STR).unwrap();
    static ref RE_WWW_LINK: Regex = Regex::new(RE_WWW_LINK_STR).unwrap();
    static ref RE_EMAIL_ADDR: Regex = Regex::new(RE_EMAIL_ADDR_STR).unwrap();
    static ref RE_HTML_TAG: Regex = Regex::new(RE_HTML_TAG_STR).unwrap();
    static ref RE_HTML_ENTITY: Regex = Regex::new(RE_HTML_ENTITY_STR).unwrap();
    static ref RE_SANITIZE: Regex = Regex::new(RE_SANITIZE_STR).unwrap();
    static ref RE_IMG_TAG: Regex = Regex::new(RE_IMG_TAG_STR).unwrap();
    static ref RE_NON_LETTER: Regex = Regex::new(RE_NON_LETTER_STR).unwrap();
    static ref RE_FOOTER: Regex = Regex::new(RE_FOOTER_STR).unwrap();
);

const SUBJECT_WEIGHT: usize = 3;

/// Cleaned, tokenized form of one email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    pub source_id: String,
    pub subject_tokens: Vec<String>,
    pub body_tokens: Vec<String>,
    pub sender_features: Vec<String>,
    /// Subject tokens three times, then body tokens, then sender tokens
    pub weighted_text: String,
    /// Set when the token pipeline failed and raw cleaned words were used
    pub degraded: bool,
}

impl NormalizedDocument {
    /// Subject then body tokens, in order
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.subject_tokens
            .iter()
            .chain(self.body_tokens.iter())
            .map(String::as_str)
    }

    pub fn weighted_tokens(&self) -> impl Iterator<Item = &str> {
        self.weighted_text.split_whitespace()
    }

    pub fn is_empty(&self) -> bool {
        self.weighted_text.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TextNormalizer {
    max_body_chars: usize,
    min_token_len: usize,
    stopwords: HashSet<String>,
    noise_tokens: HashSet<String>,
    services: Vec<ServiceDomain>,
}

impl TextNormalizer {
    pub fn new(config: &CategorizerConfig) -> Self {
        TextNormalizer {
            max_body_chars: config.normalizer.max_body_chars,
            min_token_len: config.normalizer.min_token_len,
            stopwords: stopword_set(&config.normalizer.email_stopwords),
            noise_tokens: config
                .normalizer
                .noise_tokens
                .iter()
                .map(|t| t.to_lowercase())
                .collect(),
            services: config.service_domains.clone(),
        }
    }

    pub fn normalize_all(&self, emails: &[EmailRecord]) -> Vec<NormalizedDocument> {
        emails.iter().map(|email| self.normalize(email)).collect()
    }

    pub fn normalize(&self, email: &EmailRecord) -> NormalizedDocument {
        let subject = self.clean_text(&email.subject, false);
        let body: String = email.body.chars().take(self.max_body_chars).collect();
        let body = self.clean_text(&body, true);
        let domain = email.sender_domain();
        let sender_features = sender_features(domain.as_deref(), &self.services);

        let (subject_tokens, body_tokens, degraded) = match self.tokenize_pair(&subject, &body) {
            Ok((s, b)) => (s, b, false),
            Err(e) => {
                tracing::warn!("Degraded normalization for email {}: {}", email.id, e);
                (raw_words(&subject), raw_words(&body), true)
            }
        };

        let weighted_text = std::iter::repeat(subject_tokens.iter())
            .take(SUBJECT_WEIGHT)
            .flatten()
            .chain(body_tokens.iter())
            .chain(sender_features.iter())
            .join(" ");

        NormalizedDocument {
            source_id: email.id.clone(),
            subject_tokens,
            body_tokens,
            sender_features,
            weighted_text,
            degraded,
        }
    }

    /// Lowercased text with markup, links, addresses and punctuation removed
    pub fn clean_text(&self, text: &str, is_body: bool) -> String {
        let text: Cow<str> = if RE_HTML_TAG.is_match(text) {
            let t = RE_SANITIZE.replace_all(text, " ");
            let t = replace_images(&t);
            Cow::Owned(html2text::from_read(t.as_bytes(), 400))
        } else {
            Cow::Borrowed(text)
        };
        let t = RE_HTTP_LINK.replace_all(&text, " ");
        let t = RE_WWW_LINK.replace_all(&t, " ");
        let t = RE_EMAIL_ADDR.replace_all(&t, " ");
        let t = RE_HTML_TAG.replace_all(&t, " ");
        let t = RE_HTML_ENTITY.replace_all(&t, " ");
        let t = RE_WHITESPACE.replace_all(&t, " ");
        let t = RE_DIVIDERS.replace_all(&t, " ");
        let t = RE_LONG_SPACE.replace_all(&t, " ");
        let t = if is_body { strip_footer(&t) } else { t.as_ref() };
        let t = t.to_lowercase();
        let t = RE_NON_LETTER.replace_all(&t, " ");
        t.split_whitespace().join(" ")
    }

    fn tokenize_pair(
        &self,
        subject: &str,
        body: &str,
    ) -> anyhow::Result<(Vec<String>, Vec<String>)> {
        let subject_tokens = self.tokenize(subject);
        let body_tokens = self.tokenize(body);
        if subject_tokens.is_empty()
            && body_tokens.is_empty()
            && !(subject.is_empty() && body.is_empty())
        {
            anyhow::bail!("no usable tokens in '{} {}'", subject, body);
        }
        Ok((subject_tokens, body_tokens))
    }

    fn tokenize(&self, cleaned: &str) -> Vec<String> {
        cleaned
            .unicode_words()
            .filter(|w| w.chars().count() > self.min_token_len)
            .filter(|w| w.chars().all(char::is_alphabetic))
            .filter(|w| !self.stopwords.contains(*w) && !self.noise_tokens.contains(*w))
            .map(lemmatize)
            .collect()
    }
}

fn raw_words(cleaned: &str) -> Vec<String> {
    cleaned.split_whitespace().map(str::to_string).collect()
}

fn replace_images(body: &str) -> Cow<'_, str> {
    RE_IMG_TAG.replace_all(body, " $1 ")
}

/// Remove email footers (unsubscribe links, legal disclaimers, signatures)
fn strip_footer(body: &str) -> &str {
    if let Some(m) = RE_FOOTER.find(body) {
        body[..m.start()].trim_end()
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> TextNormalizer {
        TextNormalizer::new(&CategorizerConfig::default())
    }

    #[test]
    fn test_clean_text_strips_links_and_addresses() {
        let n = normalizer();
        let cleaned = n.clean_text(
            "Visit https://example.com/path?q=1 or write to help@example.com NOW!!",
            true,
        );
        assert_eq!(cleaned, "visit or write to now");
    }

    #[test]
    fn test_clean_text_html() {
        let n = normalizer();
        let cleaned = n.clean_text(
            r#"<html><style>p { color: red; }</style><p>Your <b>invoice</b> is ready&nbsp;</p><!-- hidden --></html>"#,
            true,
        );
        assert!(cleaned.contains("invoice"));
        assert!(!cleaned.contains("color"));
        assert!(!cleaned.contains("hidden"));
        assert!(!cleaned.contains('<'));
    }

    #[test]
    fn test_strip_footer() {
        let text = "Your order is confirmed. Opt out of marketing emails here.";
        assert_eq!(strip_footer(text), "Your order is confirmed.");

        let text = "Thanks for the update! Sent from my iPhone";
        assert_eq!(strip_footer(text), "Thanks for the update!");

        let text = "Just a regular email with no footer content.";
        assert_eq!(strip_footer(text), text);
    }

    #[test]
    fn test_img_alt_text_kept() {
        let result = replace_images(r#"<img src="logo.png" alt="Company Logo">"#);
        assert_eq!(result.trim(), "Company Logo");
    }

    #[test]
    fn test_token_filters() {
        let n = normalizer();
        let email = EmailRecord::try_new(
            "1",
            "alerts@bank.com",
            "Please verify your account",
            "We noticed 3 unusual logins. Regards, the team at <b>Bank</b> style",
        )
        .unwrap();
        let doc = n.normalize(&email);

        assert_eq!(doc.subject_tokens, vec!["verify", "account"]);
        assert_eq!(
            doc.body_tokens,
            vec!["noticed", "unusual", "login", "team", "bank"]
        );
        assert_eq!(doc.sender_features, vec!["bank"]);
        assert!(!doc.degraded);
    }

    #[test]
    fn test_weighted_text_repeats_subject() {
        let n = normalizer();
        let email = EmailRecord::try_new(
            "1",
            "ci@github.com",
            "Build failed",
            "Workflow pipeline broke",
        )
        .unwrap();
        let doc = n.normalize(&email);
        assert_eq!(
            doc.weighted_text,
            "build failed build failed build failed workflow pipeline broke github development"
        );
        assert_eq!(
            doc.tokens().collect::<Vec<_>>(),
            vec!["build", "failed", "workflow", "pipeline", "broke"]
        );
    }

    #[test]
    fn test_degraded_document() {
        let n = normalizer();
        let email = EmailRecord::try_new("1", "", "Hi", "ok").unwrap();
        let doc = n.normalize(&email);
        assert!(doc.degraded);
        assert_eq!(doc.subject_tokens, vec!["hi"]);
        assert_eq!(doc.weighted_text, "hi hi hi ok");
    }

    #[test]
    fn test_empty_email() {
        let n = normalizer();
        let email = EmailRecord::try_new("1", "", "", "").unwrap();
        let doc = n.normalize(&email);
        assert!(doc.is_empty());
        assert!(!doc.degraded);
    }

    #[test]
    fn test_body_truncated() {
        let mut config = CategorizerConfig::default();
        config.normalizer.max_body_chars = 13;
        let n = TextNormalizer::new(&config);
        let email =
            EmailRecord::try_new("1", "", "", "shipment delayed because of weather").unwrap();
        let doc = n.normalize(&email);
        assert_eq!(doc.body_tokens, vec!["shipment", "dela"]);
    }
}
