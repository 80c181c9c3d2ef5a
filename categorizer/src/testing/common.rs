use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{
    email::EmailRecord,
    error::{CategorizerError, CategorizerResult},
    prompt::LabelGenerator,
};

pub fn email(id: &str, sender: &str, subject: &str, body: &str) -> EmailRecord {
    EmailRecord::try_new(id, sender, subject, body).unwrap()
}

/// Bank alerts, CI failures and two personal emails
pub fn scenario_batch() -> Vec<EmailRecord> {
    vec![
        email("bank-1", "alerts@bank.com", "Verify your account", "We noticed unusual login activity on your account."),
        email("bank-2", "alerts@bank.com", "Please verify your account", "Confirm your password to keep access to your account."),
        email("bank-3", "alerts@bank.com", "Action needed: verify your account", "Your account security needs attention. Verify your login."),
        email("ci-1", "ci@github.com", "Build failed", "The workflow run for main failed. Build failed on step test."),
        email("ci-2", "ci@github.com", "Build failed on main", "Pipeline build failed after commit to branch main."),
        email("ci-3", "ci@github.com", "Build failed again", "Workflow build failed: deploy step returned an error."),
        email("mom-1", "mom@gmail.com", "Sunday dinner", "Are you coming over for dinner on Sunday? Bring dessert."),
        email("pal-1", "pal@gmail.com", "Holiday photos", "Uploaded the beach photos from our holiday trip."),
    ]
}

/// `n` emails cycling through a few distinct topics
pub fn mixed_batch(n: usize) -> Vec<EmailRecord> {
    let topics = [
        ("alerts@bank.com", "Verify your account", "Unusual login detected, confirm your password"),
        ("ci@github.com", "Build failed", "Workflow pipeline failed on branch main"),
        ("orders@shop.example", "Your order has shipped", "Delivery of your order is scheduled, track the shipment"),
        ("events@meetup.example", "Meeting reminder", "Calendar invite for the conference call agenda"),
    ];
    (0..n)
        .map(|i| {
            let (sender, subject, body) = topics[i % topics.len()];
            email(&format!("e{}", i), sender, &format!("{} {}", subject, i), body)
        })
        .collect()
}

/// Always errors, like an unreachable model server
pub struct FailingGenerator;

impl LabelGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str, _timeout: Duration) -> CategorizerResult<String> {
        Err(CategorizerError::Llm("Ollama API error: 503 Service Unavailable".to_string()))
    }
}

/// Answers every prompt with the same text and counts calls
pub struct FixedGenerator {
    answer: String,
    calls: AtomicUsize,
}

impl FixedGenerator {
    pub fn new(answer: &str) -> Self {
        FixedGenerator {
            answer: answer.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LabelGenerator for FixedGenerator {
    async fn generate(&self, _prompt: &str, _timeout: Duration) -> CategorizerResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}
