//! Checkpointable summaries as flat mappings of named numbers.
//!
//! Replay buffer contents are not persisted; the statistics that would be costly or
//! impossible to rebuild are. Each checkpointable object exposes its state as a
//! [`StateDict`], which can be written to and read from a YAML file.
use crate::error::RecallError;
use anyhow::Result;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Flat mapping from field names to numbers.
pub type StateDict = BTreeMap<String, f64>;

/// Objects whose state can be saved and restored as a [`StateDict`].
pub trait Checkpoint {
    /// Returns the current state.
    fn state_dict(&self) -> StateDict;

    /// Restores the state.
    fn load_state_dict(&mut self, state_dict: &StateDict) -> Result<(), RecallError>;
}

/// Looks up a required field.
pub fn get_state(state_dict: &StateDict, key: &str) -> Result<f64, RecallError> {
    state_dict
        .get(key)
        .copied()
        .ok_or_else(|| RecallError::MissingStateKey(key.to_string()))
}

/// Prefixes all keys, so that several objects can share one file.
pub fn with_prefix(prefix: &str, state_dict: StateDict) -> StateDict {
    state_dict
        .into_iter()
        .map(|(k, v)| (format!("{}.{}", prefix, k), v))
        .collect()
}

/// Extracts the fields stored under `prefix` by [`with_prefix`].
pub fn strip_prefix(prefix: &str, state_dict: &StateDict) -> StateDict {
    let prefix = format!("{}.", prefix);
    state_dict
        .iter()
        .filter_map(|(k, v)| k.strip_prefix(prefix.as_str()).map(|k| (k.to_string(), *v)))
        .collect()
}

/// Saves a state dict as a YAML file.
pub fn save_state_dict(state_dict: &StateDict, path: impl AsRef<Path>) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(serde_yaml::to_string(state_dict)?.as_bytes())?;
    Ok(())
}

/// Loads a state dict from a YAML file.
pub fn load_state_dict_from(path: impl AsRef<Path>) -> Result<StateDict> {
    let file = File::open(path)?;
    let rdr = BufReader::new(file);
    let state_dict = serde_yaml::from_reader(rdr)?;
    Ok(state_dict)
}
