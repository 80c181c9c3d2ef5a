use std::collections::HashSet;

use indexmap::IndexMap;

use super::{NamingContext, NamingStrategy};
use crate::{categorizer_config::NamingConfig, email::stopwords::stopword_set};

const MIN_WORD_LEN: usize = 4;

/// Names a cluster after its most frequent meaningful word
pub struct FrequencyStrategy {
    stopwords: HashSet<String>,
    candidates: usize,
}

impl FrequencyStrategy {
    pub fn new(config: &NamingConfig, email_stopwords: &[String]) -> Self {
        FrequencyStrategy {
            stopwords: stopword_set(email_stopwords),
            candidates: config.frequency_candidates,
        }
    }

    /// Most frequent word among the top candidates that is neither a stopword
    /// nor too short. Equal counts keep first-seen order.
    pub fn top_word<'a>(&self, words: impl Iterator<Item = &'a str>) -> Option<&'a str> {
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        for word in words.filter(|w| w.chars().all(|c| c.is_ascii_alphabetic()) && w.len() >= 3) {
            *counts.entry(word).or_default() += 1;
        }
        counts.sort_by(|_, a, _, b| b.cmp(a));
        counts
            .into_iter()
            .take(self.candidates)
            .map(|(word, _)| word)
            .find(|word| word.len() >= MIN_WORD_LEN && !self.stopwords.contains(*word))
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl NamingStrategy for FrequencyStrategy {
    fn name(&self) -> &str {
        "frequency"
    }

    fn suggest(&self, ctx: &NamingContext) -> Option<String> {
        let word = self.top_word(ctx.cluster_documents().flat_map(|d| d.weighted_tokens()))?;
        Some(format!("{} Related", title_case(word)))
    }
}
