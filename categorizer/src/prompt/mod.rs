pub(crate) mod ollama;

use std::time::Duration;

use tokio::time::Instant;

pub use ollama::OllamaClient;

use crate::error::{CategorizerError, CategorizerResult};

/// Anything that turns a prompt into model text, bounded by a timeout
#[allow(async_fn_in_trait)]
pub trait LabelGenerator {
    async fn generate(&self, prompt: &str, timeout: Duration) -> CategorizerResult<String>;
}

/// Escalating per-attempt timeouts: attempt `i` waits `base * multiplier^i`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSchedule {
    pub base: Duration,
    pub multiplier: u32,
    pub max_attempts: u32,
}

impl TimeoutSchedule {
    pub fn new(base: Duration, multiplier: u32, max_attempts: u32) -> Self {
        TimeoutSchedule {
            base,
            multiplier: multiplier.max(1),
            max_attempts,
        }
    }

    /// Timeout after `level` escalations
    pub fn timeout_at(&self, level: u32) -> Duration {
        self.base.saturating_mul(self.multiplier.saturating_pow(level))
    }

    pub fn timeouts(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts).map(|level| self.timeout_at(level))
    }
}

/// Call the generator until it succeeds or `max_attempts` is used up. Only a
/// timeout moves the next attempt to the longer timeout; other errors retry
/// at the same one. Each attempt is also capped by the optional `deadline`.
pub async fn generate_with_retry<G: LabelGenerator>(
    generator: &G,
    prompt: &str,
    schedule: &TimeoutSchedule,
    deadline: Option<Instant>,
) -> CategorizerResult<String> {
    let mut last_error = CategorizerError::Llm("no attempts made".to_string());
    let mut level = 0;

    for attempt in 0..schedule.max_attempts {
        let timeout = schedule.timeout_at(level);
        let timeout = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    tracing::warn!("LLM budget exhausted before attempt {}", attempt + 1);
                    return Err(CategorizerError::LlmTimeout(Duration::ZERO));
                }
                timeout.min(remaining)
            }
            None => timeout,
        };

        tracing::debug!(
            "LLM attempt {}/{} (timeout: {}s)",
            attempt + 1,
            schedule.max_attempts,
            timeout.as_secs_f32()
        );

        let result = match tokio::time::timeout(timeout, generator.generate(prompt, timeout)).await
        {
            Ok(result) => result,
            Err(_) => Err(CategorizerError::LlmTimeout(timeout)),
        };

        match result {
            Ok(text) => return Ok(text),
            Err(e) if e.is_timeout() => {
                tracing::warn!("LLM attempt {} timed out after {}s", attempt + 1, timeout.as_secs_f32());
                last_error = CategorizerError::LlmTimeout(timeout);
                level += 1;
            }
            Err(e) => {
                tracing::warn!("LLM attempt {} failed: {}", attempt + 1, e);
                last_error = e;
            }
        }
    }

    Err(last_error)
}
