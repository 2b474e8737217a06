//! Sum tree for prioritized sampling.
//!
//! The layout follows the array-backed tree of
//! https://github.com/jaromiru/AI-blog/blob/master/SumTree.py and the segment trees of
//! https://github.com/openai/baselines/blob/master/baselines/deepq/replay_buffer.py
use segment_tree::{
    ops::{MaxIgnoreNaN, MinIgnoreNaN},
    SegmentPoint,
};
use serde::{Deserialize, Serialize};

/// Specifies how importance weights are normalized.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum WeightNormalizer {
    /// Normalized by the maximum weight over all samples in the buffer.
    All,

    /// Normalized by the maximum weight in the sampled batch.
    Batch,
}

/// Priority index over the slots of a replay buffer.
///
/// Leaves hold `(p + eps)^alpha`; every internal node holds the sum of its children.
/// Ancestors are recomputed from their children on each update, so the root is
/// always the sum of the leaves and writing the same value twice changes nothing.
#[derive(Debug)]
pub struct SumTree {
    eps: f32,
    alpha: f32,
    capacity: usize,
    n_samples: usize,
    tree: Vec<f64>,
    min_tree: SegmentPoint<f32, MinIgnoreNaN>,
    max_tree: SegmentPoint<f32, MaxIgnoreNaN>,
    normalize: WeightNormalizer,
}

impl SumTree {
    /// Creates a tree with `capacity` leaves, all empty.
    pub fn new(capacity: usize, alpha: f32, normalize: WeightNormalizer) -> Self {
        debug_assert!(capacity > 0);
        Self {
            eps: 1e-6,
            alpha,
            capacity,
            n_samples: 0,
            tree: vec![0f64; 2 * capacity - 1],
            min_tree: SegmentPoint::build(vec![f32::MAX; capacity], MinIgnoreNaN),
            max_tree: SegmentPoint::build(vec![0f32; capacity], MaxIgnoreNaN),
            normalize,
        }
    }

    /// Number of leaves registered through [`SumTree::add`].
    pub fn len(&self) -> usize {
        self.n_samples
    }

    /// Returns `true` if no leaf has been registered.
    pub fn is_empty(&self) -> bool {
        self.n_samples == 0
    }

    /// Sum of all leaves.
    pub fn total(&self) -> f64 {
        self.tree[0]
    }

    /// Maximum raw priority over the registered leaves, `1.0` if there is none.
    pub fn max(&self) -> f32 {
        if self.n_samples == 0 {
            1.0
        } else {
            self.max_tree.query(0, self.n_samples)
        }
    }

    /// Value of the `ix`-th leaf, i.e. `(p + eps)^alpha`.
    pub fn leaf(&self, ix: usize) -> f64 {
        self.tree[ix + self.capacity - 1]
    }

    /// Sets the priority of a newly stored slot.
    pub fn add(&mut self, ix: usize, p: f32) {
        self.update(ix, p);

        if self.n_samples < self.capacity {
            self.n_samples += 1;
        }
    }

    /// Updates the priority at `ix`.
    ///
    /// The alpha-th power of the priority is stored in the leaf.
    pub fn update(&mut self, ix: usize, p: f32) {
        debug_assert!(ix < self.capacity);

        let v = (p + self.eps).powf(self.alpha);
        self.min_tree.modify(ix, v);
        self.max_tree.modify(ix, p);

        let mut node = ix + self.capacity - 1;
        self.tree[node] = v as f64;
        while node > 0 {
            node = (node - 1) / 2;
            self.tree[node] = self.tree[2 * node + 1] + self.tree[2 * node + 2];
        }
    }

    /// Returns the leaf where the cumulative sum of leaves, in tree order, exceeds `s`.
    pub fn get(&self, s: f64) -> usize {
        let mut node = 0;
        let mut s = s;

        loop {
            let left = 2 * node + 1;
            let right = left + 1;
            if left >= self.tree.len() {
                break;
            }

            if s < self.tree[left] || self.tree[right] == 0.0 {
                node = left;
            } else {
                s -= self.tree[left];
                node = right;
            }
        }

        node + 1 - self.capacity
    }

    /// Samples indices for a batch and returns them with normalized importance weights.
    ///
    /// The cumulative priority range is split into `batch_size` segments of equal mass
    /// and one index is drawn from each. With probability `uniform_prob` a draw picks a
    /// registered leaf uniformly instead.
    ///
    /// The weight is $w_i=\left(N P(i)\right)^{-\beta}$, normalized according to
    /// [`WeightNormalizer`].
    pub fn sample(
        &self,
        batch_size: usize,
        beta: f32,
        uniform_prob: f32,
        rng: &mut fastrand::Rng,
    ) -> (Vec<usize>, Vec<f32>) {
        let n = self.n_samples;
        debug_assert!(n > 0);

        let total = self.total();
        let segment = total / batch_size as f64;
        let ixs = (0..batch_size)
            .map(|j| {
                if total <= 0.0 || rng.f32() < uniform_prob {
                    return rng.usize(..n);
                }
                let s = (segment * (j as f64 + rng.f64())).min(total);
                let ix = self.get(s);
                if ix < n {
                    ix
                } else {
                    rng.usize(..n)
                }
            })
            .collect::<Vec<_>>();

        let beta = beta as f64;
        let n_over_total = n as f64 / total;
        let ws = ixs
            .iter()
            .map(|&ix| (n_over_total * self.leaf(ix)).powf(-beta))
            .collect::<Vec<_>>();

        let w_max = match self.normalize {
            WeightNormalizer::All => {
                let p_min = self.min_tree.query(0, n) as f64;
                (n_over_total * p_min).powf(-beta)
            }
            WeightNormalizer::Batch => ws.iter().cloned().fold(f64::MIN, f64::max),
        };

        let ws = ws.iter().map(|w| (w / w_max) as f32).collect();

        (ixs, ws)
    }
}

#[cfg(test)]
mod tests {
    use super::{SumTree, WeightNormalizer};

    fn sum_tree(data: &[f32], capacity: usize) -> SumTree {
        let mut sum_tree = SumTree::new(capacity, 1.0, WeightNormalizer::Batch);
        for (ix, &p) in data.iter().enumerate() {
            sum_tree.add(ix, p);
        }
        sum_tree
    }

    #[test]
    fn test_sum_tree_get() {
        let data = vec![0.5f32, 0.2, 0.8, 0.3, 1.1, 2.5, 3.9];
        let sum_tree = sum_tree(&data, 8);

        assert_eq!(sum_tree.get(0.0), 0);
        assert_eq!(sum_tree.get(0.4), 0);
        assert_eq!(sum_tree.get(0.6), 1);
        assert_eq!(sum_tree.get(1.2), 2);
        assert_eq!(sum_tree.get(1.6), 3);
        assert_eq!(sum_tree.get(2.0), 4);
        assert_eq!(sum_tree.get(2.8), 4);
        assert_eq!(sum_tree.get(sum_tree.total()), 6);
    }

    #[test]
    fn test_total_matches_leaves() {
        let data = vec![0.5f32, 0.2, 0.8, 0.3, 1.1, 2.5, 3.9];
        let mut sum_tree = sum_tree(&data, 7);
        sum_tree.update(3, 10.0);
        sum_tree.update(0, 0.0);
        sum_tree.add(0, 4.0);

        let leaves: f64 = (0..7).map(|ix| sum_tree.leaf(ix)).sum();
        assert!((sum_tree.total() - leaves).abs() < 1e-9);
        assert_eq!(sum_tree.len(), 7);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut sum_tree = sum_tree(&[1.0, 2.0, 3.0, 4.0, 5.0], 5);
        sum_tree.update(1, 0.25);
        sum_tree.update(3, 7.5);
        let once = sum_tree.total();
        sum_tree.update(1, 0.25);
        sum_tree.update(3, 7.5);
        assert_eq!(once.to_bits(), sum_tree.total().to_bits());
    }

    #[test]
    fn test_max_priority() {
        let mut sum_tree = SumTree::new(4, 0.6, WeightNormalizer::Batch);
        assert_eq!(sum_tree.max(), 1.0);
        sum_tree.add(0, 1.0);
        sum_tree.add(1, 3.0);
        assert_eq!(sum_tree.max(), 3.0);
        sum_tree.update(1, 0.5);
        assert_eq!(sum_tree.max(), 1.0);
    }

    #[test]
    fn test_sample_frequencies() {
        let data = vec![0.5f32, 0.2, 0.8, 0.3, 1.1, 2.5, 3.9];
        let sum_tree = sum_tree(&data, 8);
        let mut rng = fastrand::Rng::with_seed(42);

        let n_samples = 200_000;
        let (ixs, _) = sum_tree.sample(n_samples, 1.0, 0.0, &mut rng);
        assert!(ixs.iter().all(|&ix| ix < data.len()));

        for (ix, &p) in data.iter().enumerate() {
            let expected = (p as f64) / sum_tree.total();
            let n = ixs.iter().filter(|&&e| e == ix).count();
            let freq = n as f64 / n_samples as f64;
            assert!((freq - expected).abs() < 0.01, "ix={}: {} vs {}", ix, freq, expected);
        }
    }

    #[test]
    fn test_sample_is_stratified() {
        let sum_tree = sum_tree(&[1.0; 8], 8);
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..1000 {
            let (mut ixs, _) = sum_tree.sample(8, 0.4, 0.0, &mut rng);
            ixs.sort_unstable();
            assert_eq!(ixs, (0..8).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_uniform_fallback_ignores_priorities() {
        let sum_tree = sum_tree(&[1.0, 1.0, 1.0, 1000.0], 4);
        let mut rng = fastrand::Rng::with_seed(3);
        let (ixs, _) = sum_tree.sample(8000, 0.4, 1.0, &mut rng);

        for ix in 0..4 {
            let n = ixs.iter().filter(|&&e| e == ix).count();
            assert!((n as i64 - 2000).abs() < 200, "ix={}: {}", ix, n);
        }
    }

    #[test]
    fn test_batch_weights_are_normalized() {
        let sum_tree = sum_tree(&[1.0, 1.0, 1.0, 100.0], 4);
        let mut rng = fastrand::Rng::with_seed(0);
        for _ in 0..100 {
            let (_, ws) = sum_tree.sample(8, 0.4, 1e-3, &mut rng);
            let w_max = ws.iter().cloned().fold(f32::MIN, f32::max);
            assert_eq!(w_max, 1.0);
            assert!(ws.iter().all(|&w| w > 0.0 && w <= 1.0));
        }
    }

    #[test]
    fn test_all_normalizer_bounds_weights() {
        let mut sum_tree = SumTree::new(4, 1.0, WeightNormalizer::All);
        for (ix, &p) in [1.0f32, 2.0, 4.0, 8.0].iter().enumerate() {
            sum_tree.add(ix, p);
        }
        let mut rng = fastrand::Rng::with_seed(1);
        let (ixs, ws) = sum_tree.sample(16, 1.0, 0.0, &mut rng);
        for (ix, w) in ixs.iter().zip(ws.iter()) {
            assert!(*w <= 1.0 + 1e-6);
            if *ix == 0 {
                assert!((w - 1.0).abs() < 1e-6);
            }
        }
    }
}
