use std::{env, fmt, path::Path};

use config::{Config, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::Deserialize;
use strum::{AsRefStr, EnumString};

use crate::error::{CategorizerError, CategorizerResult};

const DEFAULT_CONFIG_TOML: &str = include_str!("../../config/config.toml");
const ENV_PREFIX: &str = "CATEGORIZER";
const CONFIG_PATH_VAR: &str = "CATEGORIZER_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct NormalizerConfig {
    pub max_body_chars: usize,
    /// Tokens with this many characters or fewer are dropped
    pub min_token_len: usize,
    pub noise_tokens: Vec<String>,
    pub email_stopwords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeaturesConfig {
    pub max_features: usize,
    pub ngram_min: usize,
    pub ngram_max: usize,
    pub max_df: f64,
    pub sublinear_tf: bool,
    pub pca_threshold: usize,
    pub pca_max_components: usize,
    pub pca_iterations: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusteringConfig {
    pub min_cluster_size: usize,
    pub small_batch_limit: usize,
    pub medium_batch_limit: usize,
    pub dbscan_eps: Vec<f64>,
    pub max_outlier_ratio: f64,
    pub imbalance_share: f64,
    pub imbalance_penalty: f64,
    pub agglomerative_max_k: usize,
    pub kmeans_max_k: usize,
    pub fallback_max_k: usize,
    pub kmeans_max_iterations: usize,
    pub kmeans_restarts: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NamingStrategyKind {
    Domain,
    Semantic,
    Frequency,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamingConfig {
    pub outlier_label: String,
    pub top_terms: usize,
    pub matched_terms: usize,
    pub multi_keyword_boost: f64,
    pub min_confidence_ratio: f64,
    pub frequency_candidates: usize,
    pub strategies: Vec<NamingStrategyKind>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub base_timeout_secs: u64,
    pub timeout_multiplier: u32,
    pub max_attempts: u32,
    pub sample_emails: usize,
    pub min_name_len: usize,
    pub max_name_len: usize,
    /// Wall-clock budget for the whole naming phase
    #[serde(default)]
    pub naming_budget_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhishingConfig {
    pub suspicious_domains: Vec<String>,
    pub subject_keywords: Vec<String>,
    pub body_phrases: Vec<String>,
    pub urgency_words: Vec<String>,
    pub suspicious_tlds: Vec<String>,
    pub llm_weight: f64,
    pub base_timeout_secs: u64,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDomain {
    pub domain: String,
    pub features: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainCategory {
    pub domain: String,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SemanticCategory {
    pub name: String,
    pub priority: u32,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeGroup {
    pub target: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategorizerConfig {
    pub normalizer: NormalizerConfig,
    pub features: FeaturesConfig,
    pub clustering: ClusteringConfig,
    pub naming: NamingConfig,
    pub llm: LlmConfig,
    pub phishing: PhishingConfig,
    pub service_domains: Vec<ServiceDomain>,
    pub domain_categories: Vec<DomainCategory>,
    pub semantic_categories: Vec<SemanticCategory>,
    pub merge_groups: Vec<MergeGroup>,
}

lazy_static! {
    static ref DEFAULT_CONFIG: CategorizerConfig =
        CategorizerConfig::from_toml_str(DEFAULT_CONFIG_TOML)
            .expect("embedded config.toml is invalid");
}

impl Default for CategorizerConfig {
    fn default() -> Self {
        DEFAULT_CONFIG.clone()
    }
}

impl CategorizerConfig {
    pub fn from_toml_str(toml: &str) -> CategorizerResult<Self> {
        let cfg: CategorizerConfig = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Layers the given file over the embedded defaults, so a file only needs
    /// the keys it changes
    pub fn from_file(path: impl AsRef<Path>) -> CategorizerResult<Self> {
        let path = path.as_ref().display().to_string();
        let cfg: CategorizerConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG_TOML, FileFormat::Toml))
            .add_source(File::with_name(&path))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// `CATEGORIZER_CONFIG` points at an override file; `CATEGORIZER__SECTION__KEY`
    /// variables override single values.
    pub fn from_env() -> CategorizerResult<Self> {
        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG_TOML, FileFormat::Toml));
        if let Ok(path) = env::var(CONFIG_PATH_VAR) {
            tracing::info!("Loading categorizer config from {}", path);
            builder = builder.add_source(File::with_name(&path));
        }
        let cfg: CategorizerConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> CategorizerResult<()> {
        let invalid = |msg: &str| Err(CategorizerError::InvalidConfig(msg.to_string()));

        if self.clustering.min_cluster_size == 0 {
            return invalid("clustering.min_cluster_size must be at least 1");
        }
        if self.clustering.dbscan_eps.is_empty()
            || self.clustering.dbscan_eps.iter().any(|eps| *eps <= 0.0)
        {
            return invalid("clustering.dbscan_eps must contain positive values");
        }
        if self.clustering.kmeans_max_iterations == 0 || self.clustering.kmeans_restarts == 0 {
            return invalid("clustering.kmeans_max_iterations and kmeans_restarts must be at least 1");
        }
        let unit = |v: f64| v > 0.0 && v <= 1.0;
        if !unit(self.clustering.imbalance_share)
            || !unit(self.clustering.imbalance_penalty)
            || !unit(self.clustering.max_outlier_ratio)
        {
            return invalid("clustering ratios must be in (0, 1]");
        }
        if self.features.ngram_min == 0 || self.features.ngram_min > self.features.ngram_max {
            return invalid("features.ngram_min must be >= 1 and <= ngram_max");
        }
        if !unit(self.features.max_df) {
            return invalid("features.max_df must be in (0, 1]");
        }
        if self.llm.min_name_len > self.llm.max_name_len {
            return invalid("llm.min_name_len must not exceed llm.max_name_len");
        }
        if self.llm.max_attempts == 0 || self.phishing.max_attempts == 0 {
            return invalid("llm attempts must be at least 1");
        }
        Ok(())
    }
}

impl fmt::Display for CategorizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Categorizer Config:\n{:?}\n\nClustering: {:?}\n\nNaming: {:?}\n\nLLM: {} ({})\n\nSemantic Categories:\n{}\n\nMerge Groups:\n{}",
            self.features,
            self.clustering,
            self.naming,
            self.llm.model,
            self.llm.base_url,
            self.semantic_categories
                .iter()
                .map(|c| format!("{} (priority {}) -> {}", c.name, c.priority, c.keywords.join(", ")))
                .collect::<Vec<_>>()
                .join("\n"),
            self.merge_groups
                .iter()
                .map(|g| format!("{} <- {}", g.target, g.patterns.join(", ")))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_config_parses() {
        let cfg = CategorizerConfig::default();
        assert_eq!(cfg.clustering.min_cluster_size, 3);
        assert_eq!(cfg.clustering.dbscan_eps, vec![0.3, 0.5, 0.7, 1.0]);
        assert_eq!(cfg.features.max_features, 2000);
        assert_eq!(cfg.naming.outlier_label, "Miscellaneous");
        assert_eq!(
            cfg.naming.strategies,
            vec![
                NamingStrategyKind::Domain,
                NamingStrategyKind::Semantic,
                NamingStrategyKind::Frequency
            ]
        );
        assert!(cfg.llm.naming_budget_secs.is_none());
        assert!(cfg
            .domain_categories
            .iter()
            .any(|d| d.domain == "github.com" && d.category == "GitHub Development"));
    }

    #[test]
    fn test_validate_rejects_zero_cluster_size() {
        let mut cfg = CategorizerConfig::default();
        cfg.clustering.min_cluster_size = 0;
        assert!(matches!(
            cfg.validate(),
            Err(CategorizerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_ratios() {
        let mut cfg = CategorizerConfig::default();
        cfg.clustering.imbalance_penalty = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = CategorizerConfig::default();
        cfg.features.ngram_min = 4;
        assert!(cfg.validate().is_err());

        let mut cfg = CategorizerConfig::default();
        cfg.clustering.dbscan_eps.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = CategorizerConfig::default();
        cfg.clustering.kmeans_max_iterations = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = CategorizerConfig::default();
        cfg.clustering.kmeans_restarts = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let result = CategorizerConfig::from_toml_str("[clustering]\nmin_cluster_size = 2\n");
        assert!(matches!(result, Err(CategorizerError::Config(_))));
    }

    #[test]
    fn test_strategy_kind_from_str() {
        use std::str::FromStr;
        assert_eq!(
            NamingStrategyKind::from_str("semantic").unwrap(),
            NamingStrategyKind::Semantic
        );
        assert_eq!(NamingStrategyKind::Domain.as_ref(), "domain");
    }
}
