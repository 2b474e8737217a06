use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [ActorManager](super::ActorManager).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActorManagerConfig {
    /// Number of samples to be buffered in each actor until being pushed to the replay buffer.
    ///
    /// The default value is 100.
    pub n_buffer: usize,

    /// Number of chunks the channel to the replay buffer holds before actors block.
    ///
    /// The default value is 1000.
    pub channel_capacity: usize,
}

impl Default for ActorManagerConfig {
    fn default() -> Self {
        Self {
            n_buffer: 100,
            channel_capacity: 1000,
        }
    }
}

impl ActorManagerConfig {
    /// Sets the number of samples buffered in each actor.
    pub fn n_buffer(mut self, n_buffer: usize) -> Self {
        self.n_buffer = n_buffer;
        self
    }

    /// Sets the capacity of the channel to the replay buffer.
    pub fn channel_capacity(mut self, channel_capacity: usize) -> Self {
        self.channel_capacity = channel_capacity;
        self
    }

    /// Constructs [ActorManagerConfig] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [ActorManagerConfig].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
