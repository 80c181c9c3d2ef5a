use std::{collections::HashMap, path::Path};

use anyhow::Context;
use categorizer::{observability::format_table, Categorization, EmailRecord};
use itertools::Itertools;

const SAMPLE_SUBJECTS: usize = 2;
const SUBJECT_CHARS: usize = 60;

pub fn load_emails(path: impl AsRef<Path>) -> anyhow::Result<Vec<EmailRecord>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let emails = EmailRecord::from_json_list(&json)
        .with_context(|| format!("Could not parse emails from {}", path.display()))?;
    Ok(emails)
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars - 3).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Table of categories, largest first, with a couple of sample subjects
pub fn categories_table(categorization: &Categorization, emails: &[EmailRecord]) -> String {
    let by_id: HashMap<&str, &EmailRecord> = emails.iter().map(|e| (e.id.as_str(), e)).collect();

    let rows: Vec<Vec<String>> = categorization
        .as_map()
        .into_iter()
        .map(|(name, members)| {
            let samples = members
                .iter()
                .filter_map(|id| by_id.get(id.as_str()))
                .take(SAMPLE_SUBJECTS)
                .map(|e| shorten(&e.subject, SUBJECT_CHARS))
                .join("; ");
            vec![name, members.len().to_string(), samples]
        })
        .collect();

    format!(
        "{} emails in {} categories ({}, {} outliers)\n{}",
        categorization.email_count(),
        categorization.categories.len(),
        categorization.method,
        categorization.outliers,
        format_table(&["Category", "Emails", "Samples"], &rows)
    )
}
