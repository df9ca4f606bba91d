//! Seeded k-means over small colour samples.
//!
//! Results depend only on the input order, `k`, the iteration budget and the
//! seed, so repeated calls on the same pixels give identical clusters.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, PartialEq)]
pub struct Clusters {
    pub centers: Vec<[f32; 3]>,
    pub counts: Vec<usize>,
    /// Cluster index per input sample.
    pub labels: Vec<usize>,
}

impl Clusters {
    /// Index of the most populated cluster; the lowest index wins ties.
    pub fn largest(&self) -> usize {
        let mut best = 0;
        for (i, &c) in self.counts.iter().enumerate() {
            if c > self.counts[best] {
                best = i;
            }
        }
        best
    }
}

fn dist2(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    (0..3).map(|c| (a[c] - b[c]).powi(2)).sum()
}

fn nearest(centers: &[[f32; 3]], p: &[f32; 3]) -> usize {
    let mut best = 0;
    let mut best_d = f32::INFINITY;
    for (i, c) in centers.iter().enumerate() {
        let d = dist2(c, p);
        if d < best_d {
            best_d = d;
            best = i;
        }
    }
    best
}

/// k-means++ seeding followed by Lloyd iterations.
///
/// Returns `None` when there are fewer samples than clusters or `k` is zero.
/// A cluster that loses all its members keeps its previous centre.
pub fn kmeans(samples: &[[f32; 3]], k: usize, iterations: usize, seed: u64) -> Option<Clusters> {
    if k == 0 || samples.len() < k {
        return None;
    }
    let mut rng = StdRng::seed_from_u64(seed);

    let mut centers = Vec::with_capacity(k);
    centers.push(samples[rng.gen_range(0..samples.len())]);
    let mut d2: Vec<f32> = samples.iter().map(|p| dist2(p, &centers[0])).collect();
    while centers.len() < k {
        let total: f32 = d2.iter().sum();
        let pick = if total > 0.0 {
            let mut target = rng.gen::<f32>() * total;
            let mut chosen = samples.len() - 1;
            for (i, &d) in d2.iter().enumerate() {
                if target < d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            // All samples coincide with existing centres.
            rng.gen_range(0..samples.len())
        };
        let c = samples[pick];
        for (d, p) in d2.iter_mut().zip(samples) {
            *d = d.min(dist2(p, &c));
        }
        centers.push(c);
    }

    let mut labels = vec![0usize; samples.len()];
    for _ in 0..iterations.max(1) {
        let mut changed = false;
        for (label, p) in labels.iter_mut().zip(samples) {
            let n = nearest(&centers, p);
            if *label != n {
                *label = n;
                changed = true;
            }
        }

        let mut sums = vec![[0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (&label, p) in labels.iter().zip(samples) {
            counts[label] += 1;
            for c in 0..3 {
                sums[label][c] += p[c] as f64;
            }
        }
        for i in 0..k {
            if counts[i] > 0 {
                centers[i] = sums[i].map(|s| (s / counts[i] as f64) as f32);
            }
        }
        if !changed {
            break;
        }
    }

    let mut counts = vec![0usize; k];
    for &label in &labels {
        counts[label] += 1;
    }
    Some(Clusters { centers, counts, labels })
}
