//! Conversion of environment steps into n-step transitions.
use super::Transition;
use crate::error::RecallError;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Configuration of [`NStepProcessor`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct NStepProcessorConfig {
    /// Number of rewards summed in a return.
    pub n_step: usize,

    /// Discount factor.
    pub gamma: f32,
}

impl Default for NStepProcessorConfig {
    fn default() -> Self {
        Self {
            n_step: 3,
            gamma: 0.99,
        }
    }
}

impl NStepProcessorConfig {
    /// Sets the number of steps.
    pub fn n_step(mut self, n_step: usize) -> Self {
        self.n_step = n_step;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }
}

struct PendingStep {
    state: ArrayD<f32>,
    action: ArrayD<f32>,
    reward: f32,
}

/// Builds transitions with n-step returns from a stream of environment steps.
///
/// A transition for step `t` is emitted once step `t + n - 1` has been processed. It
/// carries `n_step_return = r_t + gamma r_t+1 + ... + gamma^(n-1) r_t+n-1` and the
/// state observed after step `t + n - 1` as `next_state`. When an episode ends, every
/// pending step is emitted at once with a truncated return, the terminal state and
/// `done = true`.
///
/// With `n_step = 1`, the output is the plain one-step transition with
/// `n_step_return == reward`.
pub struct NStepProcessor {
    n_step: usize,
    gamma: f32,
    window: VecDeque<PendingStep>,
}

impl NStepProcessor {
    /// Creates a processor. Fails if `n_step` is zero.
    pub fn build(config: &NStepProcessorConfig) -> Result<Self, RecallError> {
        if config.n_step == 0 {
            return Err(RecallError::InvalidConfig(
                "n_step must be positive".to_string(),
            ));
        }
        Ok(Self {
            n_step: config.n_step,
            gamma: config.gamma,
            window: VecDeque::with_capacity(config.n_step),
        })
    }

    /// Discards pending steps, e.g. when an episode is interrupted from outside.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Number of steps waiting for their return to be complete.
    pub fn n_pending(&self) -> usize {
        self.window.len()
    }

    /// Processes one environment step `(s_t, a_t, r_t, s_t+1, done_t)`.
    ///
    /// Returns the transitions completed by this step, oldest first.
    pub fn process(
        &mut self,
        state: ArrayD<f32>,
        action: ArrayD<f32>,
        reward: f32,
        next_state: ArrayD<f32>,
        done: bool,
    ) -> Vec<Transition> {
        self.window.push_back(PendingStep {
            state,
            action,
            reward,
        });

        if done {
            let mut trs = Vec::with_capacity(self.window.len());
            while let Some(tr) = self.pop_front(&next_state, true) {
                trs.push(tr);
            }
            trs
        } else if self.window.len() == self.n_step {
            self.pop_front(&next_state, false).into_iter().collect()
        } else {
            vec![]
        }
    }

    fn pop_front(&mut self, next_state: &ArrayD<f32>, done: bool) -> Option<Transition> {
        let gamma = self.gamma;
        let ret = self
            .window
            .iter()
            .rev()
            .fold(0.0, |acc, step| step.reward + gamma * acc);
        let step = self.window.pop_front()?;
        Some(
            Transition::new(step.state, step.action, step.reward, next_state.clone(), done)
                .with_n_step_return(ret),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, arr1};

    fn s(v: f32) -> ArrayD<f32> {
        arr1(&[v]).into_dyn()
    }

    fn a() -> ArrayD<f32> {
        arr0(0.0).into_dyn()
    }

    #[test]
    fn test_n_step_returns() {
        let config = NStepProcessorConfig::default().n_step(3).gamma(0.5);
        let mut proc = NStepProcessor::build(&config).unwrap();

        assert!(proc.process(s(0.0), a(), 1.0, s(1.0), false).is_empty());
        assert!(proc.process(s(1.0), a(), 2.0, s(2.0), false).is_empty());

        let trs = proc.process(s(2.0), a(), 4.0, s(3.0), false);
        assert_eq!(trs.len(), 1);
        assert_eq!(trs[0].state, s(0.0));
        assert_eq!(trs[0].reward, 1.0);
        assert_eq!(trs[0].n_step_return, Some(3.0));
        assert_eq!(trs[0].next_state, s(3.0));
        assert!(!trs[0].done);

        let trs = proc.process(s(3.0), a(), 8.0, s(4.0), false);
        assert_eq!(trs[0].n_step_return, Some(6.0));
        assert_eq!(proc.n_pending(), 2);
    }

    #[test]
    fn test_episode_end_flushes() {
        let config = NStepProcessorConfig::default().n_step(3).gamma(0.5);
        let mut proc = NStepProcessor::build(&config).unwrap();
        proc.process(s(0.0), a(), 4.0, s(1.0), false);
        let trs = proc.process(s(1.0), a(), 8.0, s(2.0), true);

        assert_eq!(trs.len(), 2);
        assert_eq!(trs[0].n_step_return, Some(8.0));
        assert_eq!(trs[1].n_step_return, Some(8.0));
        assert!(trs.iter().all(|tr| tr.done && tr.next_state == s(2.0)));
        assert_eq!(proc.n_pending(), 0);
    }

    #[test]
    fn test_one_step() {
        let config = NStepProcessorConfig::default().n_step(1);
        let mut proc = NStepProcessor::build(&config).unwrap();
        let trs = proc.process(s(0.0), a(), 1.5, s(1.0), false);
        assert_eq!(trs[0].n_step_return, Some(1.5));

        let config = NStepProcessorConfig::default().n_step(0);
        assert!(NStepProcessor::build(&config).is_err());
    }
}
