//! Versioned snapshots of network parameters.
use std::sync::{Arc, PoisonError, RwLock};

/// Parameters of a network frozen at publication.
#[derive(Debug, PartialEq)]
pub struct TargetSnapshot<P> {
    /// Number of publications before this one. The initial snapshot has version `0`.
    pub version: usize,

    /// Learner updates done when the snapshot was taken.
    pub opt_steps: usize,

    /// A value copy of the parameters.
    pub params: P,
}

/// A shared cell holding the latest [`TargetSnapshot`].
///
/// Cloning the handle shares the cell. A published snapshot is never mutated;
/// [`TargetNetwork::publish`] replaces the whole snapshot, so a reader holding the
/// result of [`TargetNetwork::snapshot`] keeps a complete set of parameters even while
/// a newer one is being published.
pub struct TargetNetwork<P> {
    slot: Arc<RwLock<Arc<TargetSnapshot<P>>>>,
}

impl<P> Clone for TargetNetwork<P> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<P> TargetNetwork<P> {
    /// Creates the cell with an initial snapshot of version `0`.
    pub fn new(params: P) -> Self {
        let snapshot = TargetSnapshot {
            version: 0,
            opt_steps: 0,
            params,
        };
        Self {
            slot: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// Publishes new parameters and returns the version of the new snapshot.
    ///
    /// `params` must already be a copy owned by the caller; only the pointer swap
    /// happens under the lock.
    pub fn publish(&self, params: P, opt_steps: usize) -> usize {
        let mut next = Arc::new(TargetSnapshot {
            version: 0,
            opt_steps,
            params,
        });
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        let version = slot.version + 1;
        // `next` has not been shared yet.
        if let Some(snapshot) = Arc::get_mut(&mut next) {
            snapshot.version = version;
        }
        *slot = next;
        version
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<TargetSnapshot<P>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Version of the latest published snapshot.
    pub fn version(&self) -> usize {
        self.snapshot().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_publish_replaces_snapshot() {
        let target = TargetNetwork::new(vec![0.0f32; 3]);
        let old = target.snapshot();
        assert_eq!(old.version, 0);

        assert_eq!(target.publish(vec![1.0; 3], 5), 1);
        let new = target.snapshot();
        assert_eq!(new.version, 1);
        assert_eq!(new.opt_steps, 5);
        assert_eq!(new.params, vec![1.0; 3]);

        // A snapshot taken earlier is left untouched.
        assert_eq!(old.params, vec![0.0; 3]);
    }

    #[test]
    fn test_readers_never_see_mixed_params() {
        let target = TargetNetwork::new(vec![0usize; 64]);
        let writer = {
            let target = target.clone();
            thread::spawn(move || {
                for v in 1..=200 {
                    target.publish(vec![v; 64], v);
                }
            })
        };

        let mut last_version = 0;
        for _ in 0..1000 {
            let snapshot = target.snapshot();
            let v = snapshot.params[0];
            assert!(snapshot.params.iter().all(|&x| x == v));
            assert_eq!(snapshot.version, v);
            assert!(snapshot.version >= last_version);
            last_version = snapshot.version;
        }
        writer.join().unwrap();
        assert_eq!(target.version(), 200);
    }
}
