//! Errors in the asynchronous trainer.
use thiserror::Error;

/// Errors in the asynchronous trainer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AsyncTrainerError {
    /// The channel to the replay buffer thread has been closed.
    #[error("Failed to send pushed items to the replay buffer")]
    SendMsgForPush,

    /// An actor thread panicked.
    #[error("Actor {0} panicked")]
    ActorPanicked(usize),

    /// The replay buffer thread panicked.
    #[error("Replay buffer thread panicked")]
    ReplayBufferPanicked,
}
