//! Circular replay buffer shared by producers and a learner.
use super::{
    batch::BatchBuilder, PrioritizedSampler, ReplayBufferConfig, Sampler, Transition,
    TransitionBatch, TransitionSchema, UniformSampler,
};
use crate::{
    checkpoint::{get_state, Checkpoint, StateDict},
    error::RecallError,
    ExperienceBufferBase, ReplayBufferBase,
};
use log::info;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

/// A fixed-capacity ring buffer of [`Transition`]s.
///
/// Slots `[0, len)` always hold valid transitions. When the buffer is full, the write
/// cursor points at the oldest transition, which is the next one to be overwritten.
///
/// # Concurrency
///
/// * [`ReplayBuffer::store`] runs one short critical section per call, which reserves
///   the slots, takes their write locks, publishes the new length and registers the
///   slots with the sampler. Transitions are moved into the slots after this section,
///   while their write locks are still held, so a reader never observes a partially
///   written or unwritten slot.
/// * [`ReplayBuffer::sample`] reads the length once and copies each sampled slot under
///   its read lock; it may run concurrently with `store`.
/// * The sampler, including the priority index, is behind a single lock.
pub struct ReplayBuffer {
    capacity: usize,
    schema: TransitionSchema,
    slots: Vec<RwLock<Option<Transition>>>,
    cursor: Mutex<usize>,
    len: AtomicUsize,
    sampler: Mutex<Box<dyn Sampler>>,
}

impl ReplayBuffer {
    /// Creates a replay buffer.
    ///
    /// Fails with [`RecallError::CapacityConfig`] if the capacity is zero or smaller
    /// than the configured batch size.
    pub fn new(config: &ReplayBufferConfig) -> Result<Self, RecallError> {
        config.check()?;
        let capacity = config.capacity;
        let sampler: Box<dyn Sampler> = match &config.per_config {
            Some(per_config) => Box::new(PrioritizedSampler::new(capacity, per_config, config.seed)),
            None => Box::new(UniformSampler::new(config.seed)),
        };
        info!(
            "Replay buffer: capacity = {}, prioritized = {}",
            capacity,
            config.per_config.is_some()
        );

        Ok(Self {
            capacity,
            schema: config.schema.clone(),
            slots: (0..capacity).map(|_| RwLock::new(None)).collect(),
            cursor: Mutex::new(0),
            len: AtomicUsize::new(0),
            sampler: Mutex::new(sampler),
        })
    }

    /// Capacity of the buffer.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The schema transitions are checked against.
    pub fn schema(&self) -> &TransitionSchema {
        &self.schema
    }

    /// Number of valid transitions.
    pub fn size(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Stores transitions in the given order.
    ///
    /// Every transition is checked against the schema before anything is written.
    /// If more than `capacity` transitions are given, only the last `capacity` of them
    /// remain, as if they had been stored one by one.
    pub fn store(&self, transitions: Vec<Transition>) -> Result<(), RecallError> {
        for tr in transitions.iter() {
            self.schema.validate(tr)?;
        }
        let n = transitions.len();
        if n == 0 {
            return Ok(());
        }
        let skip = n.saturating_sub(self.capacity);

        let mut guards = Vec::with_capacity(n - skip);
        {
            let mut cursor = lock(&self.cursor);
            let start = *cursor;
            for j in skip..n {
                let ix = (start + j) % self.capacity;
                guards.push(write(&self.slots[ix]));
            }
            *cursor = (start + n) % self.capacity;

            // Samplers see the length and the registered slots change together.
            let mut sampler = lock(&self.sampler);
            let len = (self.len.load(Ordering::Acquire) + n).min(self.capacity);
            self.len.store(len, Ordering::Release);
            for (j, tr) in transitions.iter().enumerate().skip(skip) {
                sampler.on_store((start + j) % self.capacity, tr.priority);
            }
        }

        for (mut guard, tr) in guards.into_iter().zip(transitions.into_iter().skip(skip)) {
            *guard = Some(tr);
        }

        Ok(())
    }

    /// Samples a batch of `batch_size` transitions.
    ///
    /// The batch carries importance weights if the buffer is prioritized.
    pub fn sample(&self, batch_size: usize) -> Result<TransitionBatch, RecallError> {
        if batch_size == 0 || batch_size > self.capacity {
            return Err(RecallError::CapacityConfig {
                buffer_size: self.capacity,
                batch_size,
            });
        }

        let (ixs, weight) = {
            let mut sampler = lock(&self.sampler);
            let len = self.size();
            if len == 0 {
                return Err(RecallError::EmptyBuffer);
            }
            sampler.sample_indices(len, batch_size)?
        };

        let mut builder = BatchBuilder::with_capacity(&self.schema, batch_size);
        for &ix in ixs.iter() {
            let slot = read(&self.slots[ix]);
            match slot.as_ref() {
                Some(tr) => builder.push(tr),
                None => {
                    return Err(RecallError::IndexOutOfRange {
                        ix,
                        len: self.size(),
                    })
                }
            }
        }

        builder.build(ixs, weight)
    }

    /// Updates priorities of sampled slots from new TD-error magnitudes.
    ///
    /// The whole request is checked before any priority changes. For a uniform buffer
    /// only the checks are done.
    pub fn update_priorities(&self, ixs: &[usize], priorities: &[f32]) -> Result<(), RecallError> {
        if ixs.len() != priorities.len() {
            return Err(RecallError::LengthMismatch {
                ixs: ixs.len(),
                priorities: priorities.len(),
            });
        }
        let len = self.size();
        if let Some(&ix) = ixs.iter().find(|&&ix| ix >= len) {
            return Err(RecallError::IndexOutOfRange { ix, len });
        }
        if let Some(&p) = priorities.iter().find(|&&p| !(p >= 0.0 && p.is_finite())) {
            return Err(RecallError::InvalidPriority(p));
        }

        lock(&self.sampler).update_priorities(ixs, priorities);
        Ok(())
    }

    /// Returns a copy of the transition in slot `ix`.
    pub fn get(&self, ix: usize) -> Result<Transition, RecallError> {
        let len = self.size();
        if ix >= len {
            return Err(RecallError::IndexOutOfRange { ix, len });
        }
        read(&self.slots[ix])
            .clone()
            .ok_or(RecallError::IndexOutOfRange { ix, len })
    }
}

impl ExperienceBufferBase for ReplayBuffer {
    type Item = Transition;

    fn push(&self, items: Vec<Transition>) -> anyhow::Result<()> {
        Ok(self.store(items)?)
    }

    fn len(&self) -> usize {
        self.size()
    }
}

impl ReplayBufferBase for ReplayBuffer {
    type Config = ReplayBufferConfig;
    type Batch = TransitionBatch;

    fn build(config: &Self::Config) -> anyhow::Result<Self> {
        Ok(Self::new(config)?)
    }

    fn batch(&self, size: usize) -> anyhow::Result<Self::Batch> {
        Ok(self.sample(size)?)
    }

    fn update_priority(&self, ixs: &[usize], td_errs: &[f32]) -> anyhow::Result<()> {
        let priorities = td_errs.iter().map(|e| e.abs()).collect::<Vec<_>>();
        Ok(self.update_priorities(ixs, &priorities)?)
    }
}

impl Checkpoint for ReplayBuffer {
    /// Summary of the priority index. Transitions themselves are not included.
    fn state_dict(&self) -> StateDict {
        let mut sd = lock(&self.sampler).summary();
        sd.insert("len".to_string(), self.size() as f64);
        sd
    }

    fn load_state_dict(&mut self, state_dict: &StateDict) -> Result<(), RecallError> {
        get_state(state_dict, "len")?;
        lock(&self.sampler).load_summary(state_dict)
    }
}

// A panic in another thread cannot leave the guarded values half-updated: each of
// them is replaced by a single assignment.
fn lock<T: ?Sized>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay_buffer::PerConfig;
    use ndarray::{arr0, arr1};

    fn tr(v: f32) -> Transition {
        Transition::new(
            arr1(&[v]).into_dyn(),
            arr0(0.0).into_dyn(),
            v,
            arr1(&[v + 1.0]).into_dyn(),
            false,
        )
    }

    fn buffer(capacity: usize, per: bool) -> ReplayBuffer {
        let per_config = if per {
            Some(PerConfig::default().alpha(1.0).uniform_sample_prob(0.0))
        } else {
            None
        };
        let config = ReplayBufferConfig::default()
            .capacity(capacity)
            .batch_size(1)
            .schema(TransitionSchema::new(&[1], &[]))
            .per_config(per_config);
        ReplayBuffer::new(&config).unwrap()
    }

    #[test]
    fn test_wraps_around() {
        let buffer = buffer(5, false);
        let mut sizes = vec![];
        for v in 1..=7 {
            buffer.store(vec![tr(v as f32)]).unwrap();
            sizes.push(buffer.size());
        }
        assert_eq!(sizes, vec![1, 2, 3, 4, 5, 5, 5]);

        let rewards = (0..5)
            .map(|ix| buffer.get(ix).unwrap().reward)
            .collect::<Vec<_>>();
        assert_eq!(rewards, vec![6.0, 7.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_oversized_push_keeps_newest() {
        let buffer = buffer(3, false);
        buffer.store((1..=5).map(|v| tr(v as f32)).collect()).unwrap();
        assert_eq!(buffer.size(), 3);
        // Cursor started at 0 and advanced by 5: slot k holds the transition written last
        // at position k.
        let rewards = (0..3)
            .map(|ix| buffer.get(ix).unwrap().reward)
            .collect::<Vec<_>>();
        assert_eq!(rewards, vec![4.0, 5.0, 3.0]);

        buffer.store(vec![tr(6.0)]).unwrap();
        assert_eq!(buffer.get(2).unwrap().reward, 6.0);
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = buffer(4, false);
        assert_eq!(buffer.sample(1).unwrap_err(), RecallError::EmptyBuffer);
        let buffer_per = self::buffer(4, true);
        assert_eq!(buffer_per.sample(1).unwrap_err(), RecallError::EmptyBuffer);
    }

    #[test]
    fn test_schema_mismatch_stores_nothing() {
        let buffer = buffer(4, false);
        let bad = Transition::new(
            arr1(&[0.0, 1.0]).into_dyn(),
            arr0(0.0).into_dyn(),
            0.0,
            arr1(&[0.0, 1.0]).into_dyn(),
            false,
        );
        let err = buffer.store(vec![tr(1.0), bad]).unwrap_err();
        assert!(matches!(err, RecallError::SchemaMismatch { .. }));
        assert_eq!(buffer.size(), 0);
    }

    #[test]
    fn test_sample_only_written_slots() {
        let buffer = buffer(100, false);
        buffer.store(vec![tr(0.0), tr(1.0), tr(2.0)]).unwrap();
        let batch = buffer.sample(64).unwrap();
        assert_eq!(batch.len(), 64);
        assert!(batch.ix_sample.iter().all(|&ix| ix < 3));
        assert_eq!(batch.state.shape(), &[64, 1]);
        assert_eq!(batch.action.shape(), &[64]);
        assert!(batch.weight.is_none());
        for (k, &ix) in batch.ix_sample.iter().enumerate() {
            assert_eq!(batch.reward[k], ix as f32);
            assert_eq!(batch.next_state[[k, 0]], ix as f32 + 1.0);
        }
    }

    #[test]
    fn test_update_priorities_checks() {
        let buffer = buffer(8, true);
        buffer.store(vec![tr(0.0), tr(1.0)]).unwrap();
        assert_eq!(
            buffer.update_priorities(&[0, 2], &[1.0, 1.0]),
            Err(RecallError::IndexOutOfRange { ix: 2, len: 2 })
        );
        assert_eq!(
            buffer.update_priorities(&[0], &[1.0, 1.0]),
            Err(RecallError::LengthMismatch {
                ixs: 1,
                priorities: 2
            })
        );
        assert_eq!(
            buffer.update_priorities(&[0], &[-1.0]),
            Err(RecallError::InvalidPriority(-1.0))
        );
        assert!(buffer.update_priorities(&[0, 1], &[0.5, 2.0]).is_ok());
    }

    #[test]
    fn test_tagged_priority_is_used() {
        let buffer = buffer(4, true);
        buffer
            .store(vec![tr(0.0).with_priority(0.0), tr(1.0).with_priority(50.0)])
            .unwrap();
        let batch = buffer.sample(4).unwrap();
        let n_high = batch.ix_sample.iter().filter(|&&ix| ix == 1).count();
        assert!(n_high >= 3);
    }
}
