use std::{collections::HashSet, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CategorizerError, CategorizerResult};

/// One input email. Only `id` is required; the text fields default to empty
/// strings so partially populated records from upstream fetchers still load.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, alias = "receivedAt")]
    pub received_at: Option<DateTime<Utc>>,
}

impl EmailRecord {
    pub fn try_new(
        id: impl Into<String>,
        sender: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> CategorizerResult<Self> {
        let record = EmailRecord {
            id: id.into(),
            sender: sender.into(),
            subject: subject.into(),
            body: body.into(),
            received_at: None,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    fn validate(&self) -> CategorizerResult<()> {
        if self.id.trim().is_empty() {
            return Err(CategorizerError::InvalidEmail(format!(
                "email from '{}' with subject '{}' has an empty id",
                self.sender, self.subject
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> CategorizerResult<Self> {
        let record: EmailRecord = serde_json::from_str(json)?;
        record.validate()?;
        Ok(record)
    }

    /// Parse a JSON array of emails, rejecting empty or duplicate ids
    pub fn from_json_list(json: &str) -> CategorizerResult<Vec<Self>> {
        let records: Vec<EmailRecord> = serde_json::from_str(json)?;
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            record.validate()?;
            if !seen.insert(record.id.as_str()) {
                return Err(CategorizerError::InvalidEmail(format!(
                    "duplicate email id: {}",
                    record.id
                )));
            }
        }
        Ok(records)
    }

    /// Bare address, with any `Name <addr>` wrapper removed
    pub fn sender_address(&self) -> &str {
        let sender = self.sender.trim();
        match (sender.rfind('<'), sender.rfind('>')) {
            (Some(start), Some(end)) if start < end => sender[start + 1..end].trim(),
            _ => sender,
        }
    }

    /// Lowercased domain part of the sender, if the sender has one
    pub fn sender_domain(&self) -> Option<String> {
        let address = self.sender_address();
        let (_, domain) = address.rsplit_once('@')?;
        let domain = domain.trim().trim_end_matches('.').to_lowercase();
        if domain.is_empty() {
            None
        } else {
            Some(domain)
        }
    }

    /// Short single-line view used in prompts and tool output
    pub fn preview(&self, max_chars: usize) -> String {
        let body: String = self.body.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut preview: String = body.chars().take(max_chars).collect();
        if body.chars().count() > max_chars {
            preview.push_str("...");
        }
        preview
    }
}

impl fmt::Display for EmailRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<sender>{}</sender> <subject>{}</subject>",
            self.sender, self.subject
        )
    }
}
