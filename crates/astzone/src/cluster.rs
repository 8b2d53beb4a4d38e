//! Two-level intensity clustering (inhibition vs bacteria).
//!
//! Clustering is a capability injected into [`crate::ZoneMeter`] through the
//! [`IntensityClusterer`] trait. [`KMeansClusterer`] is the built-in
//! implementation: seeded k-means++ with several restarts, run on a 256-bin
//! histogram so the cost does not depend on the pixel count.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Cluster centers on the 0-255 intensity scale, sorted ascending.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClusterCenters {
    /// Darker level (clear agar inside an inhibition zone).
    pub inhibition: f32,
    /// Brighter level (bacterial lawn).
    pub bacteria: f32,
}

impl ClusterCenters {
    pub fn new(inhibition: f32, bacteria: f32) -> Self {
        Self {
            inhibition,
            bacteria,
        }
    }

    /// `bacteria - inhibition`.
    pub fn contrast(&self) -> f32 {
        self.bacteria - self.inhibition
    }

    /// Level halfway between the two centers.
    pub fn midpoint(&self) -> f32 {
        (self.inhibition + self.bacteria) / 2.0
    }

    /// Inhibition/bacteria decision level for a reading sensitivity in [0, 1].
    ///
    /// Sensitivity 0 puts the level on the bacteria center, 1 on the
    /// inhibition center.
    pub fn threshold(&self, sensitivity: f32) -> f32 {
        self.inhibition + self.contrast() * (1.0 - sensitivity)
    }
}

/// Splits a set of 8-bit intensities into a dark and a bright level.
pub trait IntensityClusterer {
    /// Return the two centers, or `None` when `samples` is empty.
    fn two_levels(&self, samples: &[u8]) -> Option<ClusterCenters>;
}

/// Seeded multi-restart 1-D k-means.
#[derive(Debug, Clone)]
pub struct KMeansClusterer {
    pub attempts: u32,
    pub seed: u64,
    pub max_iters: usize,
    /// Convergence threshold on the largest center shift (intensity units).
    pub epsilon: f64,
}

impl Default for KMeansClusterer {
    fn default() -> Self {
        Self {
            attempts: 10,
            seed: 42,
            max_iters: 100,
            epsilon: 0.01,
        }
    }
}

impl KMeansClusterer {
    pub fn new(attempts: u32, seed: u64) -> Self {
        Self {
            attempts,
            seed,
            ..Self::default()
        }
    }

    /// Cluster `samples` into `k` levels. Centers are returned sorted ascending.
    pub fn cluster(&self, samples: &[u8], k: usize) -> Option<Vec<f32>> {
        if samples.is_empty() || k == 0 {
            return None;
        }
        let mut hist = [0u64; 256];
        for &v in samples {
            hist[v as usize] += 1;
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<(f64, Vec<f64>)> = None;
        for _ in 0..self.attempts.max(1) {
            let init = kmeans_pp_init(&hist, k, &mut rng);
            let (centers, compactness) = lloyd(&hist, init, self.max_iters, self.epsilon);
            let improved = best
                .as_ref()
                .map_or(true, |(best_compactness, _)| compactness < *best_compactness);
            if improved {
                best = Some((compactness, centers));
            }
        }

        best.map(|(_, centers)| {
            let mut out: Vec<f32> = centers.into_iter().map(|c| c as f32).collect();
            out.sort_by(|a, b| a.total_cmp(b));
            out
        })
    }
}

impl IntensityClusterer for KMeansClusterer {
    fn two_levels(&self, samples: &[u8]) -> Option<ClusterCenters> {
        let centers = self.cluster(samples, 2)?;
        Some(ClusterCenters::new(centers[0], centers[1]))
    }
}

fn kmeans_pp_init(hist: &[u64; 256], k: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut centers = Vec::with_capacity(k);
    let first = match WeightedIndex::new(hist.iter().copied()) {
        Ok(dist) => dist.sample(rng),
        Err(_) => rng.gen_range(0..256),
    };
    centers.push(first as f64);

    while centers.len() < k {
        let weights: Vec<f64> = hist
            .iter()
            .enumerate()
            .map(|(v, &n)| n as f64 * nearest_sq_dist(v as f64, &centers))
            .collect();
        let next = match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(rng) as f64,
            // Every sample already sits on a center.
            Err(_) => centers[0],
        };
        centers.push(next);
    }
    centers
}

fn nearest_sq_dist(v: f64, centers: &[f64]) -> f64 {
    centers
        .iter()
        .map(|c| (v - c) * (v - c))
        .fold(f64::INFINITY, f64::min)
}

fn nearest_center(v: f64, centers: &[f64]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centers.iter().enumerate() {
        let d = (v - c).abs();
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

/// Lloyd iterations on a histogram. Returns the centers and their compactness
/// (sum of squared distances of every sample to its center).
fn lloyd(
    hist: &[u64; 256],
    mut centers: Vec<f64>,
    max_iters: usize,
    epsilon: f64,
) -> (Vec<f64>, f64) {
    let k = centers.len();
    for _ in 0..max_iters {
        let mut sums = vec![0.0f64; k];
        let mut counts = vec![0u64; k];
        for (v, &n) in hist.iter().enumerate() {
            if n == 0 {
                continue;
            }
            let c = nearest_center(v as f64, &centers);
            sums[c] += v as f64 * n as f64;
            counts[c] += n;
        }
        let mut shift = 0.0f64;
        for i in 0..k {
            // An empty cluster keeps its center.
            if counts[i] > 0 {
                let updated = sums[i] / counts[i] as f64;
                shift = shift.max((updated - centers[i]).abs());
                centers[i] = updated;
            }
        }
        if shift < epsilon {
            break;
        }
    }

    let compactness = hist
        .iter()
        .enumerate()
        .map(|(v, &n)| n as f64 * nearest_sq_dist(v as f64, &centers))
        .sum();
    (centers, compactness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bimodal(low: u8, n_low: usize, high: u8, n_high: usize) -> Vec<u8> {
        let mut v = Vec::with_capacity(n_low + n_high);
        for i in 0..n_low {
            v.push(low.saturating_add((i % 5) as u8).saturating_sub(2));
        }
        for i in 0..n_high {
            v.push(high.saturating_add((i % 5) as u8).saturating_sub(2));
        }
        v
    }

    #[test]
    fn finds_both_modes_in_order() {
        let samples = bimodal(40, 3000, 180, 1000);
        let centers = KMeansClusterer::default().two_levels(&samples).unwrap();
        assert_relative_eq!(centers.inhibition, 40.0, epsilon = 0.5);
        assert_relative_eq!(centers.bacteria, 180.0, epsilon = 0.5);
        assert_relative_eq!(centers.midpoint(), 110.0, epsilon = 0.5);
    }

    #[test]
    fn result_is_deterministic_for_a_seed() {
        let samples = bimodal(60, 500, 110, 700);
        let km = KMeansClusterer::new(5, 7);
        assert_eq!(km.two_levels(&samples), km.two_levels(&samples));
    }

    #[test]
    fn constant_input_yields_equal_centers() {
        let samples = vec![77u8; 400];
        let centers = KMeansClusterer::default().two_levels(&samples).unwrap();
        assert_relative_eq!(centers.inhibition, 77.0);
        assert_relative_eq!(centers.bacteria, 77.0);
        assert_eq!(centers.contrast(), 0.0);
    }

    #[test]
    fn empty_input_has_no_centers() {
        assert!(KMeansClusterer::default().two_levels(&[]).is_none());
    }

    #[test]
    fn threshold_moves_with_sensitivity() {
        let c = ClusterCenters::new(20.0, 120.0);
        assert_relative_eq!(c.threshold(0.0), 120.0);
        assert_relative_eq!(c.threshold(0.5), 70.0);
        assert_relative_eq!(c.threshold(1.0), 20.0);
    }

    #[test]
    fn three_clusters() {
        let mut samples = bimodal(20, 200, 120, 200);
        samples.extend(bimodal(230, 200, 230, 0));
        let centers = KMeansClusterer::default().cluster(&samples, 3).unwrap();
        assert_eq!(centers.len(), 3);
        assert_relative_eq!(centers[0], 20.0, epsilon = 0.5);
        assert_relative_eq!(centers[1], 120.0, epsilon = 0.5);
        assert_relative_eq!(centers[2], 230.0, epsilon = 0.5);
    }
}
