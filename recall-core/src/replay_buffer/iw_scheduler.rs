//! Scheduling the exponent of importance weight for PER.
use crate::{
    checkpoint::{get_state, Checkpoint, StateDict},
    error::RecallError,
};
use serde::{Deserialize, Serialize};

/// Scheduler of the exponent of importance weight for PER.
///
/// $\beta$ is linearly annealed from `beta_0` to `beta_final` over `n_opts_final`
/// optimization steps.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct IwScheduler {
    /// Initial value of $\beta$.
    pub beta_0: f32,

    /// Final value of $\beta$.
    pub beta_final: f32,

    /// Optimization steps when beta reaches its final value.
    pub n_opts_final: usize,

    /// Current optimization steps.
    pub n_opts: usize,
}

impl IwScheduler {
    /// Creates a scheduler.
    pub fn new(beta_0: f32, beta_final: f32, n_opts_final: usize) -> Self {
        Self {
            beta_0,
            beta_final,
            n_opts_final,
            n_opts: 0,
        }
    }

    /// Gets the exponent of importance sampling weight.
    pub fn beta(&self) -> f32 {
        if self.n_opts >= self.n_opts_final {
            self.beta_final
        } else {
            let d = self.beta_final - self.beta_0;
            self.beta_0 + d * (self.n_opts as f32 / self.n_opts_final as f32)
        }
    }

    /// Add an optimization step for scheduling beta through training.
    pub fn add_n_opts(&mut self) {
        self.n_opts += 1;
    }
}

impl Checkpoint for IwScheduler {
    fn state_dict(&self) -> StateDict {
        let mut sd = StateDict::new();
        sd.insert("n_opts".to_string(), self.n_opts as f64);
        sd.insert("beta".to_string(), self.beta() as f64);
        sd
    }

    fn load_state_dict(&mut self, state_dict: &StateDict) -> Result<(), RecallError> {
        self.n_opts = get_state(state_dict, "n_opts")? as usize;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beta_anneals_linearly() {
        let mut s = IwScheduler::new(0.4, 1.0, 4);
        assert_eq!(s.beta(), 0.4);
        s.add_n_opts();
        s.add_n_opts();
        assert!((s.beta() - 0.7).abs() < 1e-6);
        s.add_n_opts();
        s.add_n_opts();
        s.add_n_opts();
        assert_eq!(s.beta(), 1.0);
    }

    #[test]
    fn test_restore_n_opts() {
        let mut s = IwScheduler::new(0.4, 1.0, 10);
        (0..5).for_each(|_| s.add_n_opts());
        let sd = s.state_dict();

        let mut restored = IwScheduler::new(0.4, 1.0, 10);
        restored.load_state_dict(&sd).unwrap();
        assert_eq!(restored, s);
    }

    #[test]
    fn test_zero_length_schedule_is_final() {
        let s = IwScheduler::new(0.4, 1.0, 0);
        assert_eq!(s.beta(), 1.0);
    }
}
