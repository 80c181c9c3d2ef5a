//! Feature Builder
//!
//! Turns normalized documents into a numeric matrix for clustering:
//! - `TfIdfVectorizer`: lexical TF-IDF over the weighted text, with PCA for wide matrices
//! - `EmbeddingVectorizer`: dense vectors from a caller supplied `Embedder`

mod embedding;
pub mod pca;
pub mod scaling;
mod tfidf;

use std::cmp::Ordering;

use ndarray::{Array2, Axis};

pub use embedding::{Embedder, EmbeddingVectorizer};
pub use tfidf::TfIdfVectorizer;

use crate::{email::NormalizedDocument, error::CategorizerResult};

pub trait Vectorizer: Send + Sync {
    fn vectorize(&self, docs: &[NormalizedDocument]) -> CategorizerResult<FeatureMatrix>;

    fn name(&self) -> &str;
}

/// Vectorize a batch, degrading to a single-column matrix when vectorization
/// fails so the clusterer falls back to one category
pub fn build_features(vectorizer: &dyn Vectorizer, docs: &[NormalizedDocument]) -> FeatureMatrix {
    match vectorizer.vectorize(docs) {
        Ok(features) => features,
        Err(e) => {
            tracing::warn!(
                "{} vectorization failed for {} documents, using degenerate features: {}",
                vectorizer.name(),
                docs.len(),
                e
            );
            FeatureMatrix::degenerate(docs.len())
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    data: Array2<f64>,
    /// Un-reduced TF-IDF rows, column aligned with `vocabulary`
    term_weights: Option<Array2<f64>>,
    vocabulary: Vec<String>,
    degenerate: bool,
}

impl FeatureMatrix {
    pub fn new(data: Array2<f64>, term_weights: Option<Array2<f64>>, vocabulary: Vec<String>) -> Self {
        FeatureMatrix {
            data,
            term_weights,
            vocabulary,
            degenerate: false,
        }
    }

    pub fn degenerate(n_samples: usize) -> Self {
        FeatureMatrix {
            data: Array2::zeros((n_samples, 1)),
            term_weights: None,
            vocabulary: vec![],
            degenerate: true,
        }
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_degenerate(&self) -> bool {
        self.degenerate
    }

    /// Highest mean TF-IDF terms over the given rows, strongest first.
    /// Ties are broken alphabetically.
    pub fn top_terms(&self, rows: &[usize], limit: usize) -> Vec<String> {
        let Some(weights) = &self.term_weights else {
            return vec![];
        };
        let rows: Vec<usize> = rows.iter().copied().filter(|r| *r < weights.nrows()).collect();
        if rows.is_empty() {
            return vec![];
        }

        let selected = weights.select(Axis(0), &rows);
        let Some(mean) = selected.mean_axis(Axis(0)) else {
            return vec![];
        };

        let mut scored: Vec<(&String, f64)> = self
            .vocabulary
            .iter()
            .zip(mean.iter().copied())
            .filter(|(_, w)| *w > 0.0)
            .collect();
        scored.sort_by(|(ta, wa), (tb, wb)| {
            wb.partial_cmp(wa).unwrap_or(Ordering::Equal).then_with(|| ta.cmp(tb))
        });
        scored
            .into_iter()
            .take(limit)
            .map(|(term, _)| term.clone())
            .collect()
    }
}
