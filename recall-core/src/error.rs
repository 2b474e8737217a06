//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
///
/// All of them are programmer or configuration errors. They indicate a risk to the
/// integrity of stored data and are not meant to be caught and retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecallError {
    /// A transition disagrees with the schema declared for the buffer.
    #[error("Schema mismatch on field `{field}`: expected {expected}, got {actual}")]
    SchemaMismatch {
        /// Name of the offending field.
        field: String,
        /// Expected shape or presence.
        expected: String,
        /// Actual shape or presence.
        actual: String,
    },

    /// Sampling was requested from a buffer holding no transitions.
    #[error("Cannot sample from an empty replay buffer")]
    EmptyBuffer,

    /// An index outside `[0, len)` was given.
    #[error("Index {ix} is out of range for a buffer of length {len}")]
    IndexOutOfRange {
        /// The offending index.
        ix: usize,
        /// Number of valid entries at the time of the call.
        len: usize,
    },

    /// Non-positive buffer size, or batch size that the buffer cannot serve.
    #[error("Invalid capacity: buffer_size = {buffer_size}, batch_size = {batch_size}")]
    CapacityConfig {
        /// Capacity of the buffer.
        buffer_size: usize,
        /// Requested batch size.
        batch_size: usize,
    },

    /// Any other invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Indices and priorities given to a priority update have different lengths.
    #[error("{ixs} indices given with {priorities} priorities")]
    LengthMismatch {
        /// Number of indices.
        ixs: usize,
        /// Number of priorities.
        priorities: usize,
    },

    /// Negative or non-finite priority.
    #[error("Priority must be a non-negative finite number, got {0}")]
    InvalidPriority(f32),

    /// A state dict lacks a field required to restore an object.
    #[error("Missing key in state dict: {0}")]
    MissingStateKey(String),
}
