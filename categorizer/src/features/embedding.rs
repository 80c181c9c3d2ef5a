use ndarray::Array2;

use super::{FeatureMatrix, TfIdfVectorizer, Vectorizer};
use crate::{
    email::NormalizedDocument,
    error::{CategorizerError, CategorizerResult},
};

/// Produces one dense vector per text. Implementations run synchronously;
/// callers that need a remote model should embed ahead of time.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Clusters on caller supplied embeddings while keeping TF-IDF term weights
/// for naming
pub struct EmbeddingVectorizer<E: Embedder> {
    embedder: E,
    terms: TfIdfVectorizer,
}

impl<E: Embedder> EmbeddingVectorizer<E> {
    pub fn new(embedder: E, terms: TfIdfVectorizer) -> Self {
        EmbeddingVectorizer { embedder, terms }
    }
}

impl<E: Embedder> Vectorizer for EmbeddingVectorizer<E> {
    fn vectorize(&self, docs: &[NormalizedDocument]) -> CategorizerResult<FeatureMatrix> {
        let texts: Vec<String> = docs.iter().map(|d| d.tokens().collect::<Vec<_>>().join(" ")).collect();
        let vectors = self.embedder.embed(&texts)?;

        if vectors.len() != docs.len() {
            return Err(CategorizerError::Internal(anyhow::anyhow!(
                "Embedder returned {} vectors for {} documents",
                vectors.len(),
                docs.len()
            )));
        }
        let dim = vectors.first().map(Vec::len).unwrap_or(0);
        if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
            return Err(CategorizerError::Internal(anyhow::anyhow!(
                "Embedder returned vectors of inconsistent dimension"
            )));
        }

        let data = Array2::from_shape_fn((docs.len(), dim), |(i, j)| f64::from(vectors[i][j]));

        // Term weights only feed naming, so a batch with no vocabulary still clusters
        let (term_weights, vocabulary) = match self.terms.fit_transform(
            &docs.iter().map(|d| d.weighted_text.as_str()).collect::<Vec<_>>(),
        ) {
            Ok((vocabulary, weights)) => (Some(weights), vocabulary),
            Err(_) => (None, vec![]),
        };

        Ok(FeatureMatrix::new(data, term_weights, vocabulary))
    }

    fn name(&self) -> &str {
        "embedding"
    }
}
