use std::time::Duration;

/// Stats of [`AsyncTrainer`](crate::AsyncTrainer)`::train()`.
#[derive(Clone, Debug)]
pub struct AsyncTrainStat {
    /// The number of samples pushed to the replay buffer per second.
    pub samples_per_sec: f32,

    /// Duration of training.
    pub duration: Duration,

    /// The number of optimization steps per second.
    pub opt_per_sec: f32,

    /// The number of optimization steps.
    pub n_opts: usize,

    /// The number of samples stored in the replay buffer.
    pub n_samples: usize,

    /// The number of target network publications.
    pub n_target_updates: usize,
}

impl AsyncTrainStat {
    /// Returns a formatted string.
    pub fn fmt(&self) -> String {
        let mut s = "samples/sec, opt_steps/sec, duration, opt_steps, target updates\n".to_string();
        s += format!(
            "{}, {}, {}, {}, {}\n",
            self.samples_per_sec,
            self.opt_per_sec,
            self.duration.as_secs_f32(),
            self.n_opts,
            self.n_target_updates,
        )
        .as_str();
        s
    }
}
