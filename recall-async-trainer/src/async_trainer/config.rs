use anyhow::Result;
use recall_core::error::RecallError;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`AsyncTrainer`](crate::AsyncTrainer).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AsyncTrainerConfig {
    /// The maximum number of optimization steps.
    pub max_opts: usize,

    /// Interval of publishing the model to actors in optimization steps.
    pub sync_interval: usize,

    /// Interval of logging training progress in optimization steps.
    pub record_interval: usize,
}

impl AsyncTrainerConfig {
    /// Constructs [AsyncTrainerConfig] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [AsyncTrainerConfig].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Checks that the intervals are positive.
    pub fn check(&self) -> Result<(), RecallError> {
        if self.sync_interval == 0 || self.record_interval == 0 {
            return Err(RecallError::InvalidConfig(
                "sync_interval and record_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the maximum number of optimization steps.
    pub fn max_opts(mut self, v: usize) -> Self {
        self.max_opts = v;
        self
    }

    /// Sets the interval of publishing the model to actors.
    pub fn sync_interval(mut self, v: usize) -> Self {
        self.sync_interval = v;
        self
    }

    /// Sets the interval of logging.
    pub fn record_interval(mut self, v: usize) -> Self {
        self.record_interval = v;
        self
    }
}

impl Default for AsyncTrainerConfig {
    /// There is no special intention behind these initial values.
    fn default() -> Self {
        Self {
            max_opts: 10000,
            sync_interval: 100,
            record_interval: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_async_trainer_config() -> Result<()> {
        let config = AsyncTrainerConfig::default().max_opts(200).sync_interval(20);
        let dir = TempDir::new("async_trainer_config")?;
        let path = dir.path().join("async_trainer_config.yaml");
        config.save(&path)?;
        assert_eq!(AsyncTrainerConfig::load(&path)?, config);

        assert!(config.clone().record_interval(0).check().is_err());
        Ok(())
    }
}
