use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;
use ndarray::Array2;

use super::{pca, FeatureMatrix, Vectorizer};
use crate::{
    categorizer_config::{CategorizerConfig, FeaturesConfig},
    email::NormalizedDocument,
    error::{CategorizerError, CategorizerResult},
};

/// TF-IDF over each document's weighted text with smooth idf, optional
/// sublinear tf and L2 row normalization
#[derive(Debug, Clone)]
pub struct TfIdfVectorizer {
    config: FeaturesConfig,
    seed: u64,
}

impl TfIdfVectorizer {
    pub fn new(config: &CategorizerConfig) -> Self {
        TfIdfVectorizer {
            config: config.features.clone(),
            seed: config.clustering.seed,
        }
    }

    fn ngrams(&self, tokens: &[&str]) -> Vec<String> {
        let mut grams = Vec::new();
        for n in self.config.ngram_min..=self.config.ngram_max {
            if n > tokens.len() {
                break;
            }
            grams.extend(tokens.windows(n).map(|w| w.join(" ")));
        }
        grams
    }

    /// Returns the vocabulary (alphabetical) and the document-term matrix
    pub fn fit_transform(&self, texts: &[&str]) -> CategorizerResult<(Vec<String>, Array2<f64>)> {
        let n_docs = texts.len();
        let counts: Vec<HashMap<String, usize>> = texts
            .iter()
            .map(|text| {
                let tokens = text.split_whitespace().collect_vec();
                self.ngrams(&tokens).into_iter().counts()
            })
            .collect();

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        let mut corpus_freq: HashMap<&str, usize> = HashMap::new();
        for doc in &counts {
            for (term, count) in doc {
                *doc_freq.entry(term.as_str()).or_default() += 1;
                *corpus_freq.entry(term.as_str()).or_default() += count;
            }
        }

        let max_doc_count = self.config.max_df * n_docs as f64;
        let vocabulary: BTreeMap<&str, usize> = corpus_freq
            .iter()
            .filter(|(term, _)| doc_freq[*term] as f64 <= max_doc_count)
            .sorted_by(|(ta, ca), (tb, cb)| cb.cmp(ca).then_with(|| ta.cmp(tb)))
            .take(self.config.max_features)
            .map(|(term, _)| *term)
            .sorted()
            .enumerate()
            .map(|(col, term)| (term, col))
            .collect();

        if vocabulary.is_empty() {
            return Err(CategorizerError::EmptyVocabulary);
        }

        let mut matrix = Array2::<f64>::zeros((n_docs, vocabulary.len()));
        for (row, doc) in counts.iter().enumerate() {
            for (term, count) in doc {
                let Some(&col) = vocabulary.get(term.as_str()) else {
                    continue;
                };
                let tf = if self.config.sublinear_tf {
                    1.0 + (*count as f64).ln()
                } else {
                    *count as f64
                };
                let df = doc_freq[term.as_str()] as f64;
                let idf = ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0;
                matrix[[row, col]] = tf * idf;
            }
        }

        for mut row in matrix.rows_mut() {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|v| v / norm);
            }
        }

        Ok((vocabulary.into_keys().map(str::to_string).collect(), matrix))
    }
}

impl Vectorizer for TfIdfVectorizer {
    fn vectorize(&self, docs: &[NormalizedDocument]) -> CategorizerResult<FeatureMatrix> {
        let texts = docs.iter().map(|d| d.weighted_text.as_str()).collect_vec();
        let (vocabulary, tfidf) = self.fit_transform(&texts)?;

        let data = if vocabulary.len() > self.config.pca_threshold {
            let reduced = pca::reduce(
                &tfidf,
                self.config.pca_max_components,
                self.config.pca_iterations,
                self.seed,
            );
            tracing::debug!(
                "Reduced TF-IDF from {} to {} dimensions",
                vocabulary.len(),
                reduced.ncols()
            );
            reduced
        } else {
            tfidf.clone()
        };

        Ok(FeatureMatrix::new(data, Some(tfidf), vocabulary))
    }

    fn name(&self) -> &str {
        "tfidf"
    }
}
