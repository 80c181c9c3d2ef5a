use linfa::{traits::Transformer, ParamGuard};
use linfa_clustering::Dbscan;
use ndarray::{Array1, Array2};

use super::OUTLIER;
use crate::error::{CategorizerError, CategorizerResult};

/// Density-based clustering with euclidean neighbourhoods of radius `eps`.
///
/// Points reachable from no core point are labelled `OUTLIER`. `min_points`
/// must be at least 2.
pub fn dbscan(data: &Array2<f64>, eps: f64, min_points: usize) -> CategorizerResult<Vec<i32>> {
    let params = Dbscan::params(min_points)
        .tolerance(eps)
        .check()
        .map_err(|e| CategorizerError::Clustering(format!("DBSCAN(eps={}): {}", eps, e)))?;

    let memberships: Array1<Option<usize>> = params.transform(data);
    Ok(memberships
        .iter()
        .map(|m| m.map_or(OUTLIER, |cluster| cluster as i32))
        .collect())
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_two_dense_groups_and_noise() {
        let data = array![
            [0.0],
            [0.1],
            [0.2],
            [0.15],
            [5.0],
            [5.1],
            [5.2],
            [5.15],
            [20.0]
        ];
        let labels = dbscan(&data, 0.5, 3).unwrap();
        assert_eq!(labels[8], OUTLIER);
        assert!(labels[..4].iter().all(|l| *l == labels[0] && *l != OUTLIER));
        assert!(labels[4..8].iter().all(|l| *l == labels[4] && *l != OUTLIER));
        assert_ne!(labels[0], labels[4]);
    }

    #[test]
    fn test_all_noise() {
        let data = array![[0.0], [10.0], [20.0]];
        assert_eq!(dbscan(&data, 0.5, 2).unwrap(), vec![OUTLIER; 3]);
    }

    #[test]
    fn test_invalid_params() {
        let data = array![[0.0], [0.1]];
        assert!(dbscan(&data, 0.5, 1).is_err());
        assert!(dbscan(&data, -1.0, 2).is_err());
    }
}
