//! Category Namer
//!
//! Every cluster gets a human readable name from the first strategy that
//! returns one. Strategy order comes from `[naming].strategies`; the literal
//! `Email Group {id}` name always closes the chain. Outliers are named with
//! the fixed outlier label.

mod domain;
mod frequency;
pub mod llm;
mod semantic;

use std::collections::BTreeMap;

pub use domain::DomainStrategy;
pub use frequency::FrequencyStrategy;
pub use llm::{improve_fallback_name, sanitize_llm_name, LlmNamer};
pub use semantic::SemanticStrategy;

use crate::{
    categorizer_config::{CategorizerConfig, NamingStrategyKind},
    cluster::{ClusterOutcome, OUTLIER},
    email::{EmailRecord, NormalizedDocument},
    features::FeatureMatrix,
};

/// Everything a strategy may look at for one cluster. `rows` index into
/// `emails`, `documents` and the feature matrix.
#[derive(Debug, Clone, Copy)]
pub struct NamingContext<'a> {
    pub cluster_id: i32,
    pub rows: &'a [usize],
    pub emails: &'a [EmailRecord],
    pub documents: &'a [NormalizedDocument],
    pub features: &'a FeatureMatrix,
}

impl<'a> NamingContext<'a> {
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn cluster_emails(&self) -> impl Iterator<Item = &'a EmailRecord> + '_ {
        self.rows.iter().filter_map(|row| self.emails.get(*row))
    }

    pub fn cluster_documents(&self) -> impl Iterator<Item = &'a NormalizedDocument> + '_ {
        self.rows.iter().filter_map(|row| self.documents.get(*row))
    }
}

pub trait NamingStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Base name for the cluster, without the member count
    fn suggest(&self, ctx: &NamingContext) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterName {
    pub cluster_id: i32,
    pub base: String,
    pub size: usize,
    /// Strategy that produced `base`
    pub strategy: String,
    pub is_outlier: bool,
}

impl ClusterName {
    /// Display name, e.g. `GitHub Development (3 emails)`. The outlier bucket
    /// keeps its bare label.
    pub fn label(&self) -> String {
        if self.is_outlier {
            self.base.clone()
        } else {
            format!("{} ({} emails)", self.base, self.size)
        }
    }
}

pub struct CategoryNamer {
    strategies: Vec<Box<dyn NamingStrategy>>,
    outlier_label: String,
}

impl CategoryNamer {
    pub fn from_config(config: &CategorizerConfig) -> Self {
        let strategies = config
            .naming
            .strategies
            .iter()
            .map(|kind| -> Box<dyn NamingStrategy> {
                match kind {
                    NamingStrategyKind::Domain => {
                        Box::new(DomainStrategy::new(&config.domain_categories))
                    }
                    NamingStrategyKind::Semantic => Box::new(SemanticStrategy::new(
                        &config.semantic_categories,
                        &config.naming,
                    )),
                    NamingStrategyKind::Frequency => Box::new(FrequencyStrategy::new(
                        &config.naming,
                        &config.normalizer.email_stopwords,
                    )),
                }
            })
            .collect();
        Self::with_strategies(strategies, &config.naming.outlier_label)
    }

    pub fn with_strategies(strategies: Vec<Box<dyn NamingStrategy>>, outlier_label: &str) -> Self {
        CategoryNamer {
            strategies,
            outlier_label: outlier_label.to_string(),
        }
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// One name per cluster id in the outcome, ordered by cluster id
    pub fn name_clusters(
        &self,
        emails: &[EmailRecord],
        documents: &[NormalizedDocument],
        outcome: &ClusterOutcome,
        features: &FeatureMatrix,
    ) -> Vec<ClusterName> {
        let groups: BTreeMap<i32, Vec<usize>> = outcome.groups();
        groups
            .iter()
            .map(|(cluster_id, rows)| {
                self.name_cluster(&NamingContext {
                    cluster_id: *cluster_id,
                    rows,
                    emails,
                    documents,
                    features,
                })
            })
            .collect()
    }

    pub fn name_cluster(&self, ctx: &NamingContext) -> ClusterName {
        if ctx.cluster_id == OUTLIER {
            return ClusterName {
                cluster_id: ctx.cluster_id,
                base: self.outlier_label.clone(),
                size: ctx.size(),
                strategy: "outlier".to_string(),
                is_outlier: true,
            };
        }

        let (base, strategy) = self
            .strategies
            .iter()
            .find_map(|strategy| {
                strategy
                    .suggest(ctx)
                    .map(|base| (base, strategy.name().to_string()))
            })
            .unwrap_or_else(|| (format!("Email Group {}", ctx.cluster_id), "literal".to_string()));

        tracing::debug!(
            "Cluster {} ({} emails) named '{}' by {} strategy",
            ctx.cluster_id,
            ctx.size(),
            base,
            strategy
        );

        ClusterName {
            cluster_id: ctx.cluster_id,
            base,
            size: ctx.size(),
            strategy,
            is_outlier: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cluster::ClusterMethod,
        email::TextNormalizer,
        features::{build_features, TfIdfVectorizer},
        testing::common::email,
    };

    fn name_batch(emails: &[EmailRecord], labels: Vec<i32>) -> Vec<ClusterName> {
        let config = CategorizerConfig::default();
        let docs = TextNormalizer::new(&config).normalize_all(emails);
        let features = build_features(&TfIdfVectorizer::new(&config), &docs);
        let outcome = ClusterOutcome {
            labels,
            method: ClusterMethod::KMeans { k: 2 },
            score: None,
        };
        CategoryNamer::from_config(&config).name_clusters(emails, &docs, &outcome, &features)
    }

    #[test]
    fn test_strategy_order_from_config() {
        let namer = CategoryNamer::from_config(&CategorizerConfig::default());
        assert_eq!(namer.strategy_names(), vec!["domain", "semantic", "frequency"]);
    }

    #[test]
    fn test_outlier_named_miscellaneous() {
        let emails = vec![
            email("1", "ci@github.com", "Build failed", "workflow failed"),
            email("2", "ci@github.com", "Build failed again", "workflow failed"),
            email("3", "someone@example.org", "Lunch", "sandwiches tomorrow"),
        ];
        let names = name_batch(&emails, vec![0, 0, OUTLIER]);

        assert_eq!(names.len(), 2);
        let outlier = &names[0];
        assert!(outlier.is_outlier);
        assert_eq!(outlier.label(), "Miscellaneous");
        assert_eq!(outlier.size, 1);
        assert_eq!(names[1].label(), "GitHub Development (2 emails)");
        assert_eq!(names[1].strategy, "domain");
    }

    #[test]
    fn test_literal_fallback() {
        let namer = CategoryNamer::with_strategies(vec![], "Miscellaneous");
        let emails = vec![email("1", "a@b.com", "x", "y")];
        let docs = TextNormalizer::new(&CategorizerConfig::default()).normalize_all(&emails);
        let features = FeatureMatrix::degenerate(1);
        let name = namer.name_cluster(&NamingContext {
            cluster_id: 4,
            rows: &[0],
            emails: &emails,
            documents: &docs,
            features: &features,
        });
        assert_eq!(name.label(), "Email Group 4 (1 emails)");
        assert_eq!(name.strategy, "literal");
    }

    #[test]
    fn test_naming_is_deterministic() {
        let emails = vec![
            email("1", "alerts@bank.com", "Verify your account", "We noticed unusual login activity"),
            email("2", "alerts@bank.com", "Verify your account now", "Confirm your password"),
            email("3", "friend@gmail.com", "Weekend plans", "Barbecue at the lake"),
        ];
        let first = name_batch(&emails, vec![0, 0, 1]);
        let second = name_batch(&emails, vec![0, 0, 1]);
        assert_eq!(first, second);
    }
}
