//! Adaptive Clusterer
//!
//! Picks an algorithm by batch size. Large batches run a model search over
//! DBSCAN, Ward agglomerative and k-means candidates scored by silhouette.

mod agglomerative;
mod dbscan;
mod kmeans;
mod silhouette;

use std::collections::BTreeMap;

use derive_more::derive::Display;
use ndarray::{Array2, ArrayView1};

pub use agglomerative::WardDendrogram;
pub use dbscan::dbscan;
pub use kmeans::{KMeans, KMeansFit};
pub use silhouette::silhouette_score;

use crate::{
    categorizer_config::ClusteringConfig,
    features::{scaling::standardize, FeatureMatrix},
};

/// Label used for density-based noise points
pub const OUTLIER: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Display)]
pub enum ClusterMethod {
    #[display("Single")]
    Single,
    #[display("KMeans(k={k})")]
    KMeans { k: usize },
    #[display("Agglomerative(k={k})")]
    Agglomerative { k: usize },
    #[display("DBSCAN(eps={eps})")]
    Dbscan { eps: f64 },
    #[display("Fallback KMeans(k={k})")]
    FallbackKMeans { k: usize },
}

/// Cluster label per email, in input order. `OUTLIER` marks noise.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterOutcome {
    pub labels: Vec<i32>,
    pub method: ClusterMethod,
    pub score: Option<f64>,
}

impl ClusterOutcome {
    pub fn single(n: usize) -> Self {
        ClusterOutcome {
            labels: vec![0; n],
            method: ClusterMethod::Single,
            score: None,
        }
    }

    /// Row indices per cluster id, ordered by id (outliers first)
    pub fn groups(&self) -> BTreeMap<i32, Vec<usize>> {
        let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for (row, label) in self.labels.iter().enumerate() {
            groups.entry(*label).or_default().push(row);
        }
        groups
    }

    pub fn cluster_count(&self) -> usize {
        self.groups().keys().filter(|id| **id != OUTLIER).count()
    }

    pub fn outlier_count(&self) -> usize {
        self.labels.iter().filter(|l| **l == OUTLIER).count()
    }
}

pub fn pairwise_distances(data: &Array2<f64>) -> Array2<f64> {
    let n = data.nrows();
    let mut distances = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = squared_distance(data.row(i), data.row(j)).sqrt();
            distances[[i, j]] = d;
            distances[[j, i]] = d;
        }
    }
    distances
}

pub(crate) fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[derive(Debug, Clone)]
pub struct AdaptiveClusterer {
    config: ClusteringConfig,
}

impl AdaptiveClusterer {
    pub fn new(config: &ClusteringConfig) -> Self {
        AdaptiveClusterer {
            config: config.clone(),
        }
    }

    pub fn cluster(&self, features: &FeatureMatrix) -> ClusterOutcome {
        let n = features.n_samples();
        let min_size = self.config.min_cluster_size.max(1);

        if n < min_size || features.is_degenerate() {
            tracing::debug!("Skipping clustering for {} emails", n);
            return ClusterOutcome::single(n);
        }

        let data = features.data();
        let outcome = if n < self.config.small_batch_limit {
            let k = (n / 2).clamp(2, 3).min(n);
            self.kmeans(data, k, ClusterMethod::KMeans { k })
                .unwrap_or_else(|| ClusterOutcome::single(n))
        } else if n < self.config.medium_batch_limit {
            let k = (n / min_size).clamp(2, 6).min(n);
            let labels = to_labels(&WardDendrogram::fit(data).cut(k));
            ClusterOutcome {
                score: silhouette_score(&pairwise_distances(data), &labels),
                labels,
                method: ClusterMethod::Agglomerative { k },
            }
        } else {
            self.search(data).unwrap_or_else(|| {
                let k = (n / min_size).clamp(2, self.config.fallback_max_k.max(2));
                tracing::warn!("No clustering candidate accepted, using fallback KMeans(k={})", k);
                self.kmeans(data, k, ClusterMethod::FallbackKMeans { k })
                    .unwrap_or_else(|| ClusterOutcome::single(n))
            })
        };

        tracing::info!(
            "Clustered {} emails with {} into {} clusters ({} outliers), score {}",
            n,
            outcome.method,
            outcome.cluster_count(),
            outcome.outlier_count(),
            outcome
                .score
                .map_or("n/a".to_string(), |s| format!("{:.3}", s))
        );
        outcome
    }

    fn kmeans(&self, data: &Array2<f64>, k: usize, method: ClusterMethod) -> Option<ClusterOutcome> {
        let labels = self.kmeans_labels(data, k)?;
        Some(ClusterOutcome {
            score: silhouette_score(&pairwise_distances(data), &labels),
            labels,
            method,
        })
    }

    fn kmeans_labels(&self, data: &Array2<f64>, k: usize) -> Option<Vec<i32>> {
        let fit = KMeans::new(
            k,
            self.config.kmeans_max_iterations,
            self.config.kmeans_restarts,
            self.config.seed,
        )
        .fit(data);
        match fit {
            Ok(fit) => Some(to_labels(&fit.labels)),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }

    /// Model search for larger batches. Candidates are tried in a fixed order
    /// and only a strictly better score replaces the current best.
    fn search(&self, data: &Array2<f64>) -> Option<ClusterOutcome> {
        let n = data.nrows();
        let min_size = self.config.min_cluster_size.max(1);
        let mut best: Option<ClusterOutcome> = None;
        let mut best_score = -1.0;

        let mut consider = |labels: Vec<i32>, method: ClusterMethod, raw: Option<f64>| {
            let Some(raw) = raw else {
                tracing::debug!("{} rejected: silhouette undefined", method);
                return;
            };
            let score = self.penalize_imbalance(&labels, raw);
            tracing::debug!("{} scored {:.3} (raw {:.3})", method, score, raw);
            if score > best_score {
                best_score = score;
                best = Some(ClusterOutcome {
                    labels,
                    method,
                    score: Some(score),
                });
            }
        };

        let scaled = standardize(data);
        let scaled_distances = pairwise_distances(&scaled);
        for &eps in &self.config.dbscan_eps {
            let labels = match dbscan(&scaled, eps, min_size.max(2)) {
                Ok(labels) => labels,
                Err(e) => {
                    tracing::debug!("{}", e);
                    continue;
                }
            };
            let clusters = labels
                .iter()
                .filter(|l| **l != OUTLIER)
                .collect::<std::collections::BTreeSet<_>>()
                .len();
            let noise = labels.iter().filter(|l| **l == OUTLIER).count();
            if clusters < 2 || noise as f64 > n as f64 * self.config.max_outlier_ratio {
                tracing::debug!(
                    "DBSCAN(eps={}) rejected: {} clusters, {} outliers",
                    eps,
                    clusters,
                    noise
                );
                continue;
            }
            let score = silhouette_score(&scaled_distances, &labels);
            consider(labels, ClusterMethod::Dbscan { eps }, score);
        }

        let distances = pairwise_distances(data);
        let max_k = |cap: usize| cap.min(n / (2 * min_size));

        let dendrogram = WardDendrogram::fit(data);
        for k in 2..=max_k(self.config.agglomerative_max_k) {
            let labels = to_labels(&dendrogram.cut(k));
            let score = silhouette_score(&distances, &labels);
            consider(labels, ClusterMethod::Agglomerative { k }, score);
        }

        for k in 2..=max_k(self.config.kmeans_max_k) {
            let Some(labels) = self.kmeans_labels(data, k) else {
                continue;
            };
            let score = silhouette_score(&distances, &labels);
            consider(labels, ClusterMethod::KMeans { k }, score);
        }

        best
    }

    /// Halves the score when one cluster holds more than the allowed share of the batch
    fn penalize_imbalance(&self, labels: &[i32], score: f64) -> f64 {
        let mut sizes: BTreeMap<i32, usize> = BTreeMap::new();
        for label in labels.iter().filter(|l| **l != OUTLIER) {
            *sizes.entry(*label).or_default() += 1;
        }
        let largest = sizes.values().copied().max().unwrap_or(0);
        if largest as f64 > labels.len() as f64 * self.config.imbalance_share {
            score * self.config.imbalance_penalty
        } else {
            score
        }
    }
}

fn to_labels(labels: &[usize]) -> Vec<i32> {
    labels.iter().map(|l| *l as i32).collect()
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::categorizer_config::CategorizerConfig;

    fn clusterer(min_cluster_size: usize) -> AdaptiveClusterer {
        let mut config = CategorizerConfig::default().clustering;
        config.min_cluster_size = min_cluster_size;
        AdaptiveClusterer::new(&config)
    }

    /// `groups` blobs of `per_group` points spaced far apart on separate axes
    fn blobs(groups: usize, per_group: usize) -> FeatureMatrix {
        let n = groups * per_group;
        let data = Array2::from_shape_fn((n, groups), |(i, j)| {
            let group = i / per_group;
            let jitter = (i % per_group) as f64 * 0.01;
            if group == j {
                1.0 + jitter
            } else {
                jitter
            }
        });
        FeatureMatrix::new(data, None, vec![])
    }

    #[test]
    fn test_tiny_batch_is_single_cluster() {
        let outcome = clusterer(3).cluster(&blobs(1, 2));
        assert_eq!(outcome.labels, vec![0, 0]);
        assert_eq!(outcome.method, ClusterMethod::Single);
        assert_eq!(outcome.method.to_string(), "Single");
    }

    #[test]
    fn test_degenerate_features_single_cluster() {
        let outcome = clusterer(3).cluster(&FeatureMatrix::degenerate(12));
        assert_eq!(outcome.labels, vec![0; 12]);
        assert_eq!(outcome.method, ClusterMethod::Single);
    }

    #[test]
    fn test_empty_batch() {
        let outcome = clusterer(3).cluster(&FeatureMatrix::degenerate(0));
        assert!(outcome.labels.is_empty());
        assert_eq!(outcome.cluster_count(), 0);
    }

    #[test]
    fn test_small_batch_uses_kmeans() {
        let outcome = clusterer(2).cluster(&blobs(3, 3));
        assert_eq!(outcome.method, ClusterMethod::KMeans { k: 3 });
        assert_eq!(outcome.method.to_string(), "KMeans(k=3)");
        assert_eq!(outcome.cluster_count(), 3);
        assert_eq!(outcome.labels[0], outcome.labels[2]);
        assert_ne!(outcome.labels[0], outcome.labels[3]);
    }

    #[test]
    fn test_medium_batch_uses_ward() {
        let outcome = clusterer(3).cluster(&blobs(3, 5));
        assert_eq!(outcome.method, ClusterMethod::Agglomerative { k: 5 });
        assert_eq!(outcome.labels.len(), 15);
        assert!(outcome.labels.iter().all(|l| *l >= 0));
    }

    #[test]
    fn test_large_batch_search_finds_blobs() {
        let outcome = clusterer(3).cluster(&blobs(4, 8));
        assert_eq!(outcome.cluster_count(), 4);
        assert!(outcome.score.unwrap() > 0.5);
        for group in 0..4 {
            let first = outcome.labels[group * 8];
            assert!(outcome.labels[group * 8..(group + 1) * 8]
                .iter()
                .all(|l| *l == first));
        }
    }

    #[test]
    fn test_output_covers_every_row() {
        for n in [1, 2, 5, 9, 14, 25] {
            let outcome = clusterer(3).cluster(&blobs(1, n));
            assert_eq!(outcome.labels.len(), n);
        }
    }

    #[test]
    fn test_imbalance_penalty() {
        let c = clusterer(3);
        // 5 of 8 in one cluster exceeds 40%
        let labels = vec![0, 0, 0, 0, 0, 1, 1, 1];
        assert_eq!(c.penalize_imbalance(&labels, 0.8), 0.4);
        let labels = vec![0, 0, 0, 1, 1, 1, 2, 2];
        assert_eq!(c.penalize_imbalance(&labels, 0.8), 0.8);
    }

    #[test]
    fn test_balance_penalty_changes_selection() {
        // A spread-out line of 12 points and a tight far-away group of 8.
        // Unpenalized, the coarse 12/8 split has the best silhouette; with
        // the penalty it exceeds the 40% share and a finer split wins.
        let mut rows = vec![];
        for i in 0..12 {
            rows.push([i as f64, 0.0]);
        }
        for i in 0..8 {
            rows.push([i as f64 * 0.001, 100.0]);
        }
        let data = Array2::from_shape_fn((rows.len(), 2), |(i, j)| rows[i][j]);
        let features = FeatureMatrix::new(data, None, vec![]);

        let mut config = CategorizerConfig::default().clustering;
        config.min_cluster_size = 2;
        config.dbscan_eps = vec![100.0];
        config.imbalance_penalty = 1.0;
        let unpenalized = AdaptiveClusterer::new(&config).cluster(&features);
        assert_eq!(unpenalized.cluster_count(), 2);
        assert_eq!(unpenalized.method, ClusterMethod::Agglomerative { k: 2 });

        config.imbalance_penalty = 0.5;
        let penalized = AdaptiveClusterer::new(&config).cluster(&features);
        assert!(penalized.cluster_count() > 2);
    }

    #[test]
    fn test_failed_kmeans_still_covers_every_row() {
        let mut config = CategorizerConfig::default().clustering;
        config.kmeans_max_iterations = 0;
        let clusterer = AdaptiveClusterer::new(&config);

        let outcome = clusterer.cluster(&blobs(3, 3));
        assert_eq!(outcome.method, ClusterMethod::Single);
        assert_eq!(outcome.labels, vec![0; 9]);

        let outcome = clusterer.cluster(&blobs(4, 8));
        assert_eq!(outcome.labels.len(), 32);
        assert!(outcome.labels.iter().all(|l| *l >= OUTLIER));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(ClusterMethod::Dbscan { eps: 0.5 }.to_string(), "DBSCAN(eps=0.5)");
        assert_eq!(
            ClusterMethod::Agglomerative { k: 4 }.to_string(),
            "Agglomerative(k=4)"
        );
        assert_eq!(
            ClusterMethod::FallbackKMeans { k: 2 }.to_string(),
            "Fallback KMeans(k=2)"
        );
    }
}
