//! Categorization pipeline
//!
//! emails -> normalizer -> feature builder -> clusterer -> namer -> post-processor
//!
//! Each call is independent; no state is carried between batches.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    categorizer_config::CategorizerConfig,
    cluster::{AdaptiveClusterer, ClusterOutcome},
    email::{EmailRecord, TextNormalizer},
    features::{build_features, TfIdfVectorizer, Vectorizer},
    naming::{CategoryNamer, ClusterName, LlmNamer},
    observability::{NoopProgress, ProgressPhase, ProgressReporter, ProgressUpdate},
    post_process::{verify_partition, Categorization, PostProcessor},
    prompt::LabelGenerator,
};

/// Clustered and named, not yet post-processed
struct NamedClusters {
    outcome: ClusterOutcome,
    groups: BTreeMap<i32, Vec<usize>>,
    names: Vec<ClusterName>,
}

pub struct Categorizer {
    config: CategorizerConfig,
    normalizer: TextNormalizer,
    vectorizer: Box<dyn Vectorizer>,
    clusterer: AdaptiveClusterer,
    namer: CategoryNamer,
    post_processor: PostProcessor,
    progress: Arc<dyn ProgressReporter>,
}

impl Categorizer {
    pub fn new(config: CategorizerConfig) -> Self {
        Categorizer {
            normalizer: TextNormalizer::new(&config),
            vectorizer: Box::new(TfIdfVectorizer::new(&config)),
            clusterer: AdaptiveClusterer::new(&config.clustering),
            namer: CategoryNamer::from_config(&config),
            post_processor: PostProcessor::new(&config),
            progress: Arc::new(NoopProgress),
            config,
        }
    }

    pub fn with_vectorizer(mut self, vectorizer: Box<dyn Vectorizer>) -> Self {
        self.vectorizer = vectorizer;
        self
    }

    pub fn with_namer(mut self, namer: CategoryNamer) -> Self {
        self.namer = namer;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &CategorizerConfig {
        &self.config
    }

    fn report(&self, phase: ProgressPhase, percent: u8, message: String) {
        self.progress.report(ProgressUpdate::new(phase, percent, message));
    }

    /// Group a batch into named categories without any network calls
    pub fn categorize(&self, emails: &[EmailRecord]) -> Categorization {
        if emails.is_empty() {
            self.report(ProgressPhase::Done, 100, "No emails to categorize".to_string());
            return Categorization::empty();
        }
        let named = self.cluster_and_name(emails);
        self.finish(emails, named)
    }

    /// Same clustering as `categorize`, then one LLM renaming pass per
    /// cluster. Failed or timed out calls keep the deterministic names.
    pub async fn categorize_with_llm<G: LabelGenerator>(
        &self,
        emails: &[EmailRecord],
        generator: &G,
    ) -> Categorization {
        if emails.is_empty() {
            self.report(ProgressPhase::Done, 100, "No emails to categorize".to_string());
            return Categorization::empty();
        }
        let mut named = self.cluster_and_name(emails);

        self.report(
            ProgressPhase::Naming,
            75,
            format!("Asking the LLM to name {} clusters", named.names.len()),
        );
        LlmNamer::new(generator, &self.config.llm)
            .polish(&mut named.names, &named.groups, emails)
            .await;

        self.finish(emails, named)
    }

    fn cluster_and_name(&self, emails: &[EmailRecord]) -> NamedClusters {
        self.report(
            ProgressPhase::Normalizing,
            0,
            format!("Normalizing {} emails", emails.len()),
        );
        let documents = self.normalizer.normalize_all(emails);
        let degraded = documents.iter().filter(|d| d.degraded).count();
        if degraded > 0 {
            tracing::warn!("{} of {} documents were normalized in degraded mode", degraded, documents.len());
        }

        self.report(
            ProgressPhase::BuildingFeatures,
            20,
            format!("Vectorizing with {}", self.vectorizer.name()),
        );
        let features = build_features(self.vectorizer.as_ref(), &documents);
        tracing::debug!(
            "Feature matrix: {} x {} ({} vocabulary terms)",
            features.n_samples(),
            features.n_features(),
            features.vocabulary().len()
        );

        self.report(ProgressPhase::Clustering, 40, "Selecting clustering".to_string());
        let outcome = self.clusterer.cluster(&features);
        let groups = outcome.groups();

        self.report(
            ProgressPhase::Naming,
            70,
            format!("Naming {} clusters ({})", groups.len(), outcome.method),
        );
        let names = self.namer.name_clusters(emails, &documents, &outcome, &features);

        NamedClusters {
            outcome,
            groups,
            names,
        }
    }

    fn finish(&self, emails: &[EmailRecord], named: NamedClusters) -> Categorization {
        self.report(ProgressPhase::PostProcessing, 90, "Merging categories".to_string());
        let categories = self.post_processor.process(&named.names, &named.groups, emails);

        let categorization = Categorization {
            categories,
            method: named.outcome.method,
            outliers: named.outcome.outlier_count(),
        };
        if let Err(e) = verify_partition(&categorization, emails) {
            tracing::error!("Categorization defect: {}", e);
        }

        tracing::info!(
            "Categorized {} emails into {} categories using {}",
            emails.len(),
            categorization.categories.len(),
            categorization.method
        );
        self.report(
            ProgressPhase::Done,
            100,
            format!("{} categories", categorization.categories.len()),
        );
        categorization
    }
}
