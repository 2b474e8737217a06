//! Configuration of [`Coordinator`](super::Coordinator).
use crate::error::RecallError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Schedule of learning steps and target network publication.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct CoordinatorConfig {
    /// Global step from which learning is allowed.
    pub start_train_step: usize,

    /// Interval of learning steps, in global steps.
    pub update_period: usize,

    /// Interval of target network publication, in learner updates.
    pub target_update_period: usize,

    /// Number of transitions making one global step.
    pub num_worker: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            start_train_step: 100_000,
            update_period: 4,
            target_update_period: 500,
            num_worker: 1,
        }
    }
}

impl CoordinatorConfig {
    /// Sets the global step from which learning is allowed.
    pub fn start_train_step(mut self, v: usize) -> Self {
        self.start_train_step = v;
        self
    }

    /// Sets the interval of learning steps.
    pub fn update_period(mut self, v: usize) -> Self {
        self.update_period = v;
        self
    }

    /// Sets the interval of target network publication.
    pub fn target_update_period(mut self, v: usize) -> Self {
        self.target_update_period = v;
        self
    }

    /// Sets the number of workers.
    pub fn num_worker(mut self, v: usize) -> Self {
        self.num_worker = v;
        self
    }

    /// Checks that every period is positive.
    pub fn check(&self) -> Result<(), RecallError> {
        for (name, v) in [
            ("update_period", self.update_period),
            ("target_update_period", self.target_update_period),
            ("num_worker", self.num_worker),
        ]
        .iter()
        {
            if *v == 0 {
                return Err(RecallError::InvalidConfig(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_period() {
        let config = CoordinatorConfig::default().update_period(0);
        assert!(matches!(config.check(), Err(RecallError::InvalidConfig(_))));
        let config = CoordinatorConfig::default().num_worker(0);
        assert!(matches!(config.check(), Err(RecallError::InvalidConfig(_))));
        assert!(CoordinatorConfig::default().check().is_ok());
    }
}
