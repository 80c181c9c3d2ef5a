use std::collections::HashSet;

use super::{NamingContext, NamingStrategy};
use crate::categorizer_config::{NamingConfig, SemanticCategory};

/// Matches a cluster's strongest TF-IDF terms against the keyword taxonomy.
///
/// Each category scores `hits * priority`, boosted when more than one of its
/// keywords matched. The best category wins if its score reaches the
/// confidence floor, a fraction of the cluster size.
pub struct SemanticStrategy {
    categories: Vec<SemanticCategory>,
    top_terms: usize,
    matched_terms: usize,
    multi_keyword_boost: f64,
    min_confidence_ratio: f64,
}

impl SemanticStrategy {
    pub fn new(categories: &[SemanticCategory], config: &NamingConfig) -> Self {
        SemanticStrategy {
            categories: categories.to_vec(),
            top_terms: config.top_terms,
            matched_terms: config.matched_terms,
            multi_keyword_boost: config.multi_keyword_boost,
            min_confidence_ratio: config.min_confidence_ratio,
        }
    }

    /// Best scoring category for the given terms. Earlier categories win ties.
    pub fn score_terms(&self, terms: &[String]) -> Option<(&SemanticCategory, f64)> {
        let words: HashSet<&str> = terms
            .iter()
            .take(self.matched_terms)
            .flat_map(|term| term.split_whitespace())
            .collect();

        let mut best: Option<(&SemanticCategory, f64)> = None;
        for category in &self.categories {
            let hits = category
                .keywords
                .iter()
                .filter(|k| words.contains(k.as_str()))
                .count();
            if hits == 0 {
                continue;
            }
            let mut score = (hits as u32 * category.priority) as f64;
            if hits > 1 {
                score *= self.multi_keyword_boost;
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((category, score));
            }
        }
        best
    }
}

impl NamingStrategy for SemanticStrategy {
    fn name(&self) -> &str {
        "semantic"
    }

    fn suggest(&self, ctx: &NamingContext) -> Option<String> {
        let terms = ctx.features.top_terms(ctx.rows, self.top_terms);
        if terms.is_empty() {
            return None;
        }

        let (category, score) = self.score_terms(&terms)?;
        let floor = ctx.size() as f64 * self.min_confidence_ratio;
        if score >= floor {
            Some(category.name.clone())
        } else {
            tracing::debug!(
                "Semantic match '{}' scored {} below floor {} for cluster {}",
                category.name,
                score,
                floor,
                ctx.cluster_id
            );
            None
        }
    }
}
