//! Adaptive email categorization.
//!
//! Groups a batch of emails into a variable number of named categories:
//! text normalization, TF-IDF features, a clustering model search, layered
//! naming strategies with an optional LLM pass, and post-processing that
//! guarantees every email lands in exactly one category.

pub mod categorizer_config;
pub mod cluster;
pub mod email;
pub mod error;
pub mod features;
pub mod naming;
pub mod observability;
pub mod phishing;
pub mod pipeline;
pub mod post_process;
pub mod prompt;

#[cfg(test)]
mod testing;

pub use categorizer_config::CategorizerConfig;
pub use email::EmailRecord;
pub use error::{CategorizerError, CategorizerResult};
pub use pipeline::Categorizer;
pub use post_process::{Categorization, Category};
