use ndarray::{Array1, Array2, Axis};
use rand::{rngs::StdRng, Rng, SeedableRng};

const CONVERGENCE_TOL: f64 = 1e-10;
const EIGEN_EPS: f64 = 1e-12;

/// Project `data` onto at most `min(max_components, n - 1, n_features)`
/// principal components.
///
/// Components are found by power iteration with deflation on the sample Gram
/// matrix, which keeps the cost quadratic in the sample count instead of the
/// (much larger) vocabulary size. The result is deterministic for a seed.
pub fn reduce(data: &Array2<f64>, max_components: usize, iterations: usize, seed: u64) -> Array2<f64> {
    let (n, d) = data.dim();
    let k = max_components.min(n.saturating_sub(1)).min(d);
    if k == 0 {
        return data.clone();
    }

    let mean = data
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(d));
    let centered = data - &mean;
    let mut gram = centered.dot(&centered.t());

    let mut rng = StdRng::seed_from_u64(seed);
    let mut scores = Array2::<f64>::zeros((n, k));

    for component in 0..k {
        let mut v = Array1::from_shape_fn(n, |_| rng.gen::<f64>() - 0.5);
        normalize(&mut v);

        for _ in 0..iterations {
            let mut next = gram.dot(&v);
            if normalize(&mut next) <= EIGEN_EPS {
                break;
            }
            let delta: f64 = (&next - &v).iter().map(|x| x.abs()).sum();
            v = next;
            if delta < CONVERGENCE_TOL {
                break;
            }
        }

        let eigenvalue = v.dot(&gram.dot(&v));
        if eigenvalue <= EIGEN_EPS {
            // Remaining variance is numerically zero
            break;
        }

        // Fix the sign so the largest entry is positive
        let pivot = v
            .iter()
            .copied()
            .fold(0.0_f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
        if pivot < 0.0 {
            v.mapv_inplace(|x| -x);
        }

        scores
            .column_mut(component)
            .assign(&(&v * eigenvalue.sqrt()));

        let col = v.view().insert_axis(Axis(1));
        let projection = col.dot(&col.t()) * eigenvalue;
        gram -= &projection;
    }

    scores
}

fn normalize(v: &mut Array1<f64>) -> f64 {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        v.mapv_inplace(|x| x / norm);
    }
    norm
}
