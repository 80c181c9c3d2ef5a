use std::cmp::Ordering;

use ndarray::Array2;

use super::squared_distance;

#[derive(Debug, Clone, Copy)]
struct Merge {
    left: usize,
    right: usize,
    height: f64,
}

/// Ward linkage hierarchy, built once and cut at any cluster count
#[derive(Debug, Clone)]
pub struct WardDendrogram {
    n: usize,
    /// Sorted by height, stable for ties
    merges: Vec<Merge>,
}

impl WardDendrogram {
    /// Builds the full hierarchy with the nearest-neighbour chain algorithm and
    /// Lance–Williams distance updates on squared euclidean distances.
    pub fn fit(data: &Array2<f64>) -> Self {
        let n = data.nrows();
        let mut dist = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in (i + 1)..n {
                let d = squared_distance(data.row(i), data.row(j));
                dist[[i, j]] = d;
                dist[[j, i]] = d;
            }
        }

        let mut sizes = vec![1usize; n];
        let mut active = vec![true; n];
        let mut merges = Vec::with_capacity(n.saturating_sub(1));
        let mut chain: Vec<usize> = Vec::new();
        let mut remaining = n;

        while remaining > 1 {
            if chain.is_empty() {
                if let Some(first) = active.iter().position(|a| *a) {
                    chain.push(first);
                }
            }
            let Some(&a) = chain.last() else {
                break;
            };
            let prev = chain.len().checked_sub(2).map(|i| chain[i]);

            let mut best = prev;
            let mut best_dist = prev.map_or(f64::INFINITY, |p| dist[[a, p]]);
            for b in (0..n).filter(|b| active[*b] && *b != a) {
                if dist[[a, b]] < best_dist {
                    best = Some(b);
                    best_dist = dist[[a, b]];
                }
            }
            let Some(b) = best else {
                break;
            };

            if Some(b) != prev {
                chain.push(b);
                continue;
            }

            chain.truncate(chain.len() - 2);
            let (keep, drop) = if a < b { (a, b) } else { (b, a) };
            let (size_keep, size_drop) = (sizes[keep] as f64, sizes[drop] as f64);
            for k in (0..n).filter(|k| active[*k] && *k != keep && *k != drop) {
                let size_k = sizes[k] as f64;
                let updated = ((size_keep + size_k) * dist[[keep, k]]
                    + (size_drop + size_k) * dist[[drop, k]]
                    - size_k * best_dist)
                    / (size_keep + size_drop + size_k);
                dist[[keep, k]] = updated;
                dist[[k, keep]] = updated;
            }
            sizes[keep] += sizes[drop];
            active[drop] = false;
            remaining -= 1;
            merges.push(Merge {
                left: keep,
                right: drop,
                height: best_dist,
            });
        }

        merges.sort_by(|x, y| x.height.partial_cmp(&y.height).unwrap_or(Ordering::Equal));
        WardDendrogram { n, merges }
    }

    /// Flat labels for `k` clusters, numbered by first appearance
    pub fn cut(&self, k: usize) -> Vec<usize> {
        let k = k.clamp(1, self.n.max(1));
        let mut parent: Vec<usize> = (0..self.n).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for merge in self.merges.iter().take(self.n.saturating_sub(k)) {
            let a = find(&mut parent, merge.left);
            let b = find(&mut parent, merge.right);
            if a != b {
                parent[b] = a;
            }
        }

        let mut ids: Vec<Option<usize>> = vec![None; self.n];
        let mut next = 0;
        (0..self.n)
            .map(|i| {
                let root = find(&mut parent, i);
                *ids[root].get_or_insert_with(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect()
    }
}
