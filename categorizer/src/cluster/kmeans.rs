use linfa::{
    traits::{Fit, Predict},
    DatasetBase,
};
use linfa_clustering::KMeans as KMeansModel;
use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, SeedableRng};

use crate::error::{CategorizerError, CategorizerResult};

#[derive(Debug, Clone)]
pub struct KMeans {
    k: usize,
    max_iterations: usize,
    restarts: usize,
    seed: u64,
}

#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centroids: Array2<f64>,
    /// Mean squared distance of each point to its centroid
    pub inertia: f64,
}

impl KMeans {
    pub fn new(k: usize, max_iterations: usize, restarts: usize, seed: u64) -> Self {
        KMeans {
            k,
            max_iterations,
            restarts,
            seed,
        }
    }

    /// Best of `restarts` k-means++ seeded runs. `k` is capped at the number
    /// of rows; the same seed always gives the same labels.
    pub fn fit(&self, data: &Array2<f64>) -> CategorizerResult<KMeansFit> {
        let n = data.nrows();
        if n == 0 {
            return Ok(KMeansFit {
                labels: vec![],
                centroids: Array2::zeros((0, data.ncols())),
                inertia: 0.0,
            });
        }
        let k = self.k.clamp(1, n);

        let dataset = DatasetBase::from(data.clone());
        let model = KMeansModel::params_with_rng(k, StdRng::seed_from_u64(self.seed))
            .n_runs(self.restarts)
            .max_n_iterations(self.max_iterations as u64)
            .fit(&dataset)
            .map_err(|e| CategorizerError::Clustering(format!("KMeans(k={}) fit failed: {}", k, e)))?;

        let labels: Array1<usize> = model.predict(data);
        Ok(KMeansFit {
            labels: labels.to_vec(),
            centroids: model.centroids().clone(),
            inertia: model.inertia(),
        })
    }
}
