//! Strategies selecting the slots that make up a batch.
use super::{IwScheduler, PerConfig, SumTree};
use crate::{
    checkpoint::{get_state, Checkpoint, StateDict},
    error::RecallError,
};
use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Selects buffer slots for a batch.
///
/// A sampler lives behind the replay buffer's sampler lock; every method is called
/// with exclusive access.
pub trait Sampler: Send {
    /// Registers a slot that has just been (over)written.
    ///
    /// `priority` is the initial priority tagged on the transition, if any.
    fn on_store(&mut self, ix: usize, priority: Option<f32>);

    /// Draws `batch_size` slots among the first `len`.
    ///
    /// Returns the indices and, for prioritized sampling, the importance weights.
    fn sample_indices(
        &mut self,
        len: usize,
        batch_size: usize,
    ) -> Result<(Vec<usize>, Option<Vec<f32>>), RecallError>;

    /// Updates priorities after a learning step.
    ///
    /// Indices have already been checked against the buffer length.
    fn update_priorities(&mut self, ixs: &[usize], priorities: &[f32]);

    /// Summary values to be checkpointed.
    fn summary(&self) -> StateDict {
        StateDict::new()
    }

    /// Restores the summary values.
    fn load_summary(&mut self, _summary: &StateDict) -> Result<(), RecallError> {
        Ok(())
    }
}

/// Uniform sampling with replacement.
pub struct UniformSampler {
    rng: StdRng,
}

impl UniformSampler {
    /// Creates a sampler with a seeded random number generator.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Sampler for UniformSampler {
    fn on_store(&mut self, _ix: usize, _priority: Option<f32>) {}

    fn sample_indices(
        &mut self,
        len: usize,
        batch_size: usize,
    ) -> Result<(Vec<usize>, Option<Vec<f32>>), RecallError> {
        if len == 0 {
            return Err(RecallError::EmptyBuffer);
        }
        let ixs = (0..batch_size)
            .map(|_| self.rng.gen_range(0..len))
            .collect::<Vec<_>>();
        Ok((ixs, None))
    }

    fn update_priorities(&mut self, _ixs: &[usize], _priorities: &[f32]) {}
}

/// Prioritized sampling with importance sampling weights.
///
/// New slots get the priority tagged on their transition, or the current maximum
/// priority of the index, so that they are replayed promptly.
pub struct PrioritizedSampler {
    sum_tree: SumTree,
    iw_scheduler: IwScheduler,
    uniform_sample_prob: f32,
    rng: fastrand::Rng,
    restored_max: Option<f32>,
}

impl PrioritizedSampler {
    /// Creates a sampler over `capacity` slots.
    pub fn new(capacity: usize, per_config: &PerConfig, seed: u64) -> Self {
        Self {
            sum_tree: SumTree::new(capacity, per_config.alpha, per_config.normalize),
            iw_scheduler: IwScheduler::new(
                per_config.beta_0,
                per_config.beta_final,
                per_config.n_opts_final,
            ),
            uniform_sample_prob: per_config.uniform_sample_prob,
            rng: fastrand::Rng::with_seed(seed),
            restored_max: None,
        }
    }

    /// The priority index.
    pub fn sum_tree(&self) -> &SumTree {
        &self.sum_tree
    }

    /// Current exponent of the importance weights.
    pub fn beta(&self) -> f32 {
        self.iw_scheduler.beta()
    }
}

impl Sampler for PrioritizedSampler {
    fn on_store(&mut self, ix: usize, priority: Option<f32>) {
        let p = match (priority, self.restored_max) {
            (Some(p), _) => p,
            (None, Some(p)) if self.sum_tree.is_empty() => p,
            (None, _) => self.sum_tree.max(),
        };
        self.sum_tree.add(ix, p);
    }

    fn sample_indices(
        &mut self,
        _len: usize,
        batch_size: usize,
    ) -> Result<(Vec<usize>, Option<Vec<f32>>), RecallError> {
        // The tree may lag behind the published length while a push is registering
        // its slots, never the other way around.
        if self.sum_tree.is_empty() {
            return Err(RecallError::EmptyBuffer);
        }
        let beta = self.iw_scheduler.beta();
        let (ixs, ws) =
            self.sum_tree
                .sample(batch_size, beta, self.uniform_sample_prob, &mut self.rng);
        Ok((ixs, Some(ws)))
    }

    fn update_priorities(&mut self, ixs: &[usize], priorities: &[f32]) {
        for (&ix, &p) in ixs.iter().zip(priorities.iter()) {
            self.sum_tree.update(ix, p);
        }
        self.iw_scheduler.add_n_opts();
    }

    fn summary(&self) -> StateDict {
        let mut sd = self.iw_scheduler.state_dict();
        sd.insert("priority_sum".to_string(), self.sum_tree.total());
        sd.insert("max_priority".to_string(), self.sum_tree.max() as f64);
        sd.insert("n_samples".to_string(), self.sum_tree.len() as f64);
        sd
    }

    fn load_summary(&mut self, summary: &StateDict) -> Result<(), RecallError> {
        self.iw_scheduler.load_state_dict(summary)?;
        // Buffer contents are not restored; the max priority seeds the first new slot.
        let max_priority = get_state(summary, "max_priority")? as f32;
        debug!("Restored max priority: {}", max_priority);
        self.restored_max = Some(max_priority);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prioritized(capacity: usize) -> PrioritizedSampler {
        let per_config = PerConfig::default().alpha(1.0).uniform_sample_prob(0.0);
        PrioritizedSampler::new(capacity, &per_config, 42)
    }

    #[test]
    fn test_uniform_frequencies() {
        let mut sampler = UniformSampler::new(42);
        let mut counts = vec![0usize; 10];
        for _ in 0..1000 {
            let (ixs, ws) = sampler.sample_indices(10, 100).unwrap();
            assert!(ws.is_none());
            ixs.iter().for_each(|&ix| counts[ix] += 1);
        }
        for c in counts {
            let freq = c as f32 / 100_000.0;
            assert!((freq - 0.1).abs() < 0.01, "freq = {}", freq);
        }
    }

    #[test]
    fn test_new_slot_gets_max_priority() {
        let mut sampler = prioritized(4);
        sampler.on_store(0, None);
        assert_eq!(sampler.sum_tree().max(), 1.0);

        sampler.update_priorities(&[0], &[7.0]);
        sampler.on_store(1, None);
        assert_eq!(sampler.sum_tree().max(), 7.0);
        assert!((sampler.sum_tree().leaf(1) - 7.0).abs() < 1e-4);
    }

    #[test]
    fn test_update_advances_beta() {
        let per_config = PerConfig::default().beta_0(0.4).n_opts_final(10);
        let mut sampler = PrioritizedSampler::new(4, &per_config, 0);
        sampler.on_store(0, None);
        for _ in 0..5 {
            sampler.update_priorities(&[0], &[1.0]);
        }
        assert!((sampler.beta() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_summary_round_trip() {
        let mut sampler = prioritized(4);
        sampler.on_store(0, None);
        sampler.update_priorities(&[0], &[3.0]);
        let summary = sampler.summary();
        assert_eq!(summary.get("max_priority"), Some(&3.0));
        assert_eq!(summary.get("n_samples"), Some(&1.0));

        let mut restored = prioritized(4);
        restored.load_summary(&summary).unwrap();
        assert_eq!(restored.summary().get("n_opts"), Some(&1.0));
        restored.on_store(0, None);
        assert_eq!(restored.sum_tree().max(), 3.0);
    }

    #[test]
    fn test_empty() {
        let mut sampler = prioritized(4);
        assert_eq!(
            sampler.sample_indices(0, 1).unwrap_err(),
            RecallError::EmptyBuffer
        );
    }
}
