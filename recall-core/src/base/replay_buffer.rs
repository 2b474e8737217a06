//! Replay buffer interface.
//!
//! Both traits take `&self`: a buffer is shared through an `Arc` between any number
//! of producers pushing transitions and a learner drawing batches.
use anyhow::Result;

/// Interface of buffers that store experiences.
///
/// Implemented by the replay buffer itself and by proxies that forward experiences
/// from a worker thread to it.
pub trait ExperienceBufferBase {
    /// Items stored in the buffer.
    type Item;

    /// Pushes a batch of items, preserving their order.
    fn push(&self, items: Vec<Self::Item>) -> Result<()>;

    /// The number of items currently stored.
    fn len(&self) -> usize;

    /// Returns `true` if the buffer holds no item.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface of replay buffers that generate batches for training.
pub trait ReplayBufferBase {
    /// Configuration of the buffer.
    type Config: Clone;

    /// Batch generated for training.
    type Batch;

    /// Builds a replay buffer.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Samples a batch of `size` items.
    fn batch(&self, size: usize) -> Result<Self::Batch>;

    /// Updates the priorities of the items at `ixs` from TD errors.
    ///
    /// Buffers without prioritization only check the indices.
    fn update_priority(&self, ixs: &[usize], td_errs: &[f32]) -> Result<()>;
}
