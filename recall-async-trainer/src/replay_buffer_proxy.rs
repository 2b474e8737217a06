use crate::{AsyncTrainerError, PushedItemMessage};
use anyhow::Result;
use crossbeam_channel::Sender;
use recall_core::ExperienceBufferBase;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Configuration of [`ReplayBufferProxy`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ReplayBufferProxyConfig {
    /// Number of items buffered until sent to the replay buffer.
    pub n_buffer: usize,
}

/// Replay buffer on the actor side.
///
/// Items pushed into the proxy are sent to the replay buffer thread in chunks of
/// `n_buffer`, so that the shared buffer is locked once per chunk rather than once per
/// environment step. Items keep the order in which they were pushed.
///
/// The proxy is owned by a single actor thread.
pub struct ReplayBufferProxy<T> {
    id: usize,

    /// Sender of [`PushedItemMessage`].
    sender: Sender<PushedItemMessage<T>>,

    /// Number of items buffered until sent.
    n_buffer: usize,

    /// Items not sent yet.
    buffer: RefCell<Vec<T>>,
}

impl<T> ReplayBufferProxy<T> {
    /// Creates a proxy sending chunks on `sender`.
    pub fn build_with_sender(
        id: usize,
        config: &ReplayBufferProxyConfig,
        sender: Sender<PushedItemMessage<T>>,
    ) -> Self {
        let n_buffer = config.n_buffer.max(1);
        Self {
            id,
            sender,
            n_buffer,
            buffer: RefCell::new(Vec::with_capacity(n_buffer)),
        }
    }

    /// Sends the buffered items, even if fewer than `n_buffer`.
    pub fn flush(&self) -> Result<()> {
        let items = self.buffer.replace(Vec::with_capacity(self.n_buffer));
        if items.is_empty() {
            return Ok(());
        }
        self.send(items)
    }

    fn send(&self, pushed_items: Vec<T>) -> Result<()> {
        let msg = PushedItemMessage {
            id: self.id,
            pushed_items,
        };
        // Blocks while the channel is full.
        self.sender
            .send(msg)
            .map_err(|_| AsyncTrainerError::SendMsgForPush)?;
        Ok(())
    }
}

impl<T> ExperienceBufferBase for ReplayBufferProxy<T> {
    type Item = T;

    fn push(&self, items: Vec<T>) -> Result<()> {
        let chunks = {
            let mut buffer = self.buffer.borrow_mut();
            buffer.extend(items);
            let mut chunks = vec![];
            while buffer.len() >= self.n_buffer {
                let rest = buffer.split_off(self.n_buffer);
                chunks.push(std::mem::replace(&mut *buffer, rest));
            }
            chunks
        };

        for chunk in chunks {
            self.send(chunk)?;
        }
        Ok(())
    }

    /// Number of items waiting to be sent.
    fn len(&self) -> usize {
        self.buffer.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_chunks_keep_order() -> Result<()> {
        let (s, r) = bounded(10);
        let proxy = ReplayBufferProxy::build_with_sender(3, &ReplayBufferProxyConfig { n_buffer: 4 }, s);

        proxy.push(vec![0, 1, 2])?;
        assert!(r.is_empty());
        proxy.push(vec![3, 4, 5, 6, 7, 8, 9])?;
        assert_eq!(proxy.len(), 2);

        let msg = r.recv()?;
        assert_eq!(msg.id, 3);
        assert_eq!(msg.pushed_items, vec![0, 1, 2, 3]);
        assert_eq!(r.recv()?.pushed_items, vec![4, 5, 6, 7]);

        proxy.flush()?;
        assert_eq!(r.recv()?.pushed_items, vec![8, 9]);
        assert!(proxy.is_empty());
        Ok(())
    }

    #[test]
    fn test_closed_channel() {
        let (s, r) = bounded(1);
        let proxy = ReplayBufferProxy::build_with_sender(0, &ReplayBufferProxyConfig { n_buffer: 1 }, s);
        drop(r);
        let err = proxy.push(vec![0]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<AsyncTrainerError>(),
            Some(&AsyncTrainerError::SendMsgForPush)
        );
    }
}
