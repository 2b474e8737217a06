//! Schedule of learning steps and target network publication.
mod config;
mod target;
use crate::{
    checkpoint::{get_state, Checkpoint, StateDict},
    error::RecallError,
};
pub use config::CoordinatorConfig;
use log::{debug, info};
use std::sync::Arc;
pub use target::{TargetNetwork, TargetSnapshot};

/// Phase of training.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Collecting transitions; no learning step is allowed.
    Warmup,

    /// Learning steps are allowed on the update period.
    Active,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Decides when the learner may draw a batch and when the target network is refreshed.
///
/// A *global step* `t` is one environment step of every worker, i.e. `num_worker`
/// transitions. The coordinator starts in [`Phase::Warmup`] and enters [`Phase::Active`]
/// once `t` reaches `start_train_step`; it never goes back.
///
/// While active, a learning step is allowed at `t` if
/// `(t - start_train_step) % update_period == 0`, so with `start_train_step = 100` and
/// `update_period = 8` learning happens at `100, 108, 116, ...`.
///
/// Every `target_update_period` learner updates reported with
/// [`Coordinator::record_opt`], a copy of the online parameters is published to the
/// [`TargetNetwork`] as a new snapshot.
///
/// ```
/// use recall_core::coordinator::{Coordinator, CoordinatorConfig};
///
/// let config = CoordinatorConfig::default()
///     .start_train_step(100)
///     .update_period(8)
///     .target_update_period(5);
/// let mut coordinator = Coordinator::new(&config, vec![0f32; 4])?;
/// let mut online = vec![0f32; 4];
///
/// for _ in 0..1000 {
///     if coordinator.step() {
///         online.iter_mut().for_each(|w| *w += 1.0);
///         coordinator.record_opt(|| online.clone());
///     }
/// }
/// assert_eq!(coordinator.target_snapshot().version, 22);
/// # Ok::<(), recall_core::error::RecallError>(())
/// ```
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> Warmup
///     Warmup --> Warmup: t < start_train_step
///     Warmup --> Active: t == start_train_step
///     Active --> Active: learn if (t - start_train_step) % update_period == 0
/// ```
pub struct Coordinator<P> {
    config: CoordinatorConfig,

    /// Next global step to be evaluated.
    global_step: usize,

    /// Transitions not yet making up a global step.
    pending: usize,

    /// Learner updates reported so far.
    n_opts: usize,

    phase: Phase,
    target: TargetNetwork<P>,
}

impl<P> Coordinator<P> {
    /// Creates a coordinator with the initial target parameters.
    pub fn new(config: &CoordinatorConfig, init_params: P) -> Result<Self, RecallError> {
        config.check()?;
        Ok(Self {
            config: config.clone(),
            global_step: 0,
            pending: 0,
            n_opts: 0,
            phase: Phase::Warmup,
            target: TargetNetwork::new(init_params),
        })
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of global steps evaluated so far.
    pub fn global_step(&self) -> usize {
        self.global_step
    }

    /// Number of learner updates reported so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// The configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// A handle on the target network cell.
    pub fn target(&self) -> TargetNetwork<P> {
        self.target.clone()
    }

    /// The latest target snapshot.
    pub fn target_snapshot(&self) -> Arc<TargetSnapshot<P>> {
        self.target.snapshot()
    }

    /// Evaluates the next global step and returns whether a learning step is allowed.
    pub fn step(&mut self) -> bool {
        let t = self.global_step;
        self.global_step += 1;

        if t < self.config.start_train_step {
            return false;
        }
        if self.phase == Phase::Warmup {
            self.phase = Phase::Active;
            info!("Start training at global step {}", t);
        }
        (t - self.config.start_train_step) % self.config.update_period == 0
    }

    /// Accounts for `n` stored transitions and returns the number of learning steps
    /// allowed by the global steps they complete.
    pub fn on_transitions(&mut self, n: usize) -> usize {
        self.pending += n;
        let mut n_learn = 0;
        while self.pending >= self.config.num_worker {
            self.pending -= self.config.num_worker;
            if self.step() {
                n_learn += 1;
            }
        }
        n_learn
    }

    /// Records a learner update.
    ///
    /// Every `target_update_period` updates, the copy of the online parameters returned
    /// by `online` is published and its version is returned. `online` is not called
    /// otherwise.
    pub fn record_opt<F>(&mut self, online: F) -> Option<usize>
    where
        F: FnOnce() -> P,
    {
        self.n_opts += 1;
        if self.n_opts % self.config.target_update_period != 0 {
            return None;
        }
        let version = self.target.publish(online(), self.n_opts);
        debug!(
            "Published target snapshot {} at {} learner updates",
            version, self.n_opts
        );
        Some(version)
    }
}

impl<P> Checkpoint for Coordinator<P> {
    fn state_dict(&self) -> StateDict {
        let mut sd = StateDict::new();
        sd.insert("global_step".to_string(), self.global_step as f64);
        sd.insert("pending".to_string(), self.pending as f64);
        sd.insert("n_opts".to_string(), self.n_opts as f64);
        sd
    }

    fn load_state_dict(&mut self, state_dict: &StateDict) -> Result<(), RecallError> {
        self.global_step = get_state(state_dict, "global_step")? as usize;
        self.pending = get_state(state_dict, "pending")? as usize;
        self.n_opts = get_state(state_dict, "n_opts")? as usize;
        self.phase = if self.global_step > self.config.start_train_step {
            Phase::Active
        } else {
            Phase::Warmup
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CoordinatorConfig {
        CoordinatorConfig::default()
            .start_train_step(100)
            .update_period(8)
            .target_update_period(5)
            .num_worker(1)
    }

    #[test]
    fn test_learning_steps() {
        let mut coordinator = Coordinator::new(&config(), ()).unwrap();
        let allowed = (0..200)
            .filter(|_| coordinator.step())
            .collect::<Vec<_>>();
        assert_eq!(
            allowed,
            (100..200).step_by(8).collect::<Vec<_>>()
        );
        assert_eq!(coordinator.phase(), Phase::Active);
    }

    #[test]
    fn test_phase() {
        let mut coordinator = Coordinator::new(&config(), ()).unwrap();
        for _ in 0..100 {
            assert!(!coordinator.step());
            assert_eq!(coordinator.phase(), Phase::Warmup);
        }
        assert!(coordinator.step());
        assert_eq!(coordinator.phase(), Phase::Active);
    }

    #[test]
    fn test_target_publication() {
        let mut coordinator = Coordinator::new(&config(), 0usize).unwrap();
        let mut versions = vec![];
        let mut n_learn = 0;
        for t in 0..500 {
            if coordinator.step() {
                n_learn += 1;
                // Online parameters represented by the global step
                coordinator.record_opt(|| t);
                versions.push(coordinator.target_snapshot().version);
            }
        }
        assert_eq!(n_learn, 50);
        for (k, &v) in versions.iter().enumerate() {
            assert_eq!(v, (k + 1) / 5);
        }
        let snapshot = coordinator.target_snapshot();
        assert_eq!(snapshot.opt_steps, 50);
        assert_eq!(snapshot.params, 100 + 49 * 8);
    }

    #[test]
    fn test_on_transitions_counts_global_steps() {
        let config = config().start_train_step(2).update_period(1).num_worker(4);
        let mut coordinator = Coordinator::new(&config, ()).unwrap();
        // 7 transitions make one global step (t = 0) and 3 pending ones.
        assert_eq!(coordinator.on_transitions(7), 0);
        assert_eq!(coordinator.global_step(), 1);
        // 9 more complete t = 1, 2, 3.
        assert_eq!(coordinator.on_transitions(9), 2);
        assert_eq!(coordinator.global_step(), 4);
    }

    #[test]
    fn test_state_dict() {
        let mut coordinator = Coordinator::new(&config(), ()).unwrap();
        for _ in 0..120 {
            coordinator.step();
        }
        coordinator.record_opt(|| ());
        let sd = coordinator.state_dict();

        let mut restored = Coordinator::new(&config(), ()).unwrap();
        restored.load_state_dict(&sd).unwrap();
        assert_eq!(restored.global_step(), 120);
        assert_eq!(restored.n_opts(), 1);
        assert_eq!(restored.phase(), Phase::Active);
    }
}
