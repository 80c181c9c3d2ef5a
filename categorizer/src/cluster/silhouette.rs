use std::collections::BTreeMap;

use ndarray::Array2;

use super::OUTLIER;

/// Mean silhouette coefficient over non-outlier points, computed from a
/// precomputed euclidean distance matrix.
///
/// Returns `None` when the score is undefined: fewer than two clusters, or
/// as many clusters as scored points.
pub fn silhouette_score(distances: &Array2<f64>, labels: &[i32]) -> Option<f64> {
    let points: Vec<usize> = (0..labels.len()).filter(|i| labels[*i] != OUTLIER).collect();

    let mut clusters: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for &i in &points {
        clusters.entry(labels[i]).or_default().push(i);
    }
    if clusters.len() < 2 || clusters.len() >= points.len() {
        return None;
    }

    let mean_distance = |i: usize, members: &[usize]| -> f64 {
        let total: f64 = members.iter().filter(|j| **j != i).map(|j| distances[[i, *j]]).sum();
        let count = members.iter().filter(|j| **j != i).count();
        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    };

    let total: f64 = points
        .iter()
        .map(|&i| {
            let own = &clusters[&labels[i]];
            if own.len() == 1 {
                return 0.0;
            }
            let a = mean_distance(i, own);
            let b = clusters
                .iter()
                .filter(|(label, _)| **label != labels[i])
                .map(|(_, members)| mean_distance(i, members))
                .fold(f64::INFINITY, f64::min);
            let denom = a.max(b);
            if denom > 0.0 {
                (b - a) / denom
            } else {
                0.0
            }
        })
        .sum();

    Some(total / points.len() as f64)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::cluster::pairwise_distances;

    #[test]
    fn test_well_separated() {
        let data = array![[0.0, 0.0], [0.1, 0.0], [10.0, 10.0], [10.1, 10.0]];
        let d = pairwise_distances(&data);
        let score = silhouette_score(&d, &[0, 0, 1, 1]).unwrap();
        assert!(score > 0.95);
    }

    #[test]
    fn test_bad_assignment_scores_lower() {
        let data = array![[0.0, 0.0], [0.1, 0.0], [10.0, 10.0], [10.1, 10.0]];
        let d = pairwise_distances(&data);
        let good = silhouette_score(&d, &[0, 0, 1, 1]).unwrap();
        let bad = silhouette_score(&d, &[0, 1, 0, 1]).unwrap();
        assert!(bad < good);
        assert!(bad < 0.0);
    }

    #[test]
    fn test_outliers_ignored() {
        let data = array![[0.0, 0.0], [0.1, 0.0], [10.0, 10.0], [10.1, 10.0], [5.0, 5.0]];
        let d = pairwise_distances(&data);
        let with_noise = silhouette_score(&d, &[0, 0, 1, 1, OUTLIER]).unwrap();
        let without = silhouette_score(&d.slice(ndarray::s![..4, ..4]).to_owned(), &[0, 0, 1, 1]).unwrap();
        assert!((with_noise - without).abs() < 1e-12);
    }

    #[test]
    fn test_undefined_cases() {
        let data = array![[0.0], [1.0], [2.0]];
        let d = pairwise_distances(&data);
        assert!(silhouette_score(&d, &[0, 0, 0]).is_none());
        assert!(silhouette_score(&d, &[0, 1, 2]).is_none());
        assert!(silhouette_score(&d, &[OUTLIER, OUTLIER, 0]).is_none());
    }
}
