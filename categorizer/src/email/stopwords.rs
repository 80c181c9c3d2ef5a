use std::collections::HashSet;

use stop_words::{get, LANGUAGE};

/// NLTK English stopwords plus the configured email boilerplate terms
pub fn stopword_set(email_stopwords: &[String]) -> HashSet<String> {
    get(LANGUAGE::English)
        .into_iter()
        .chain(email_stopwords.iter().map(|w| w.to_lowercase()))
        .collect()
}
