//! In-process binder: named channels backed by crossbeam queues.

use crate::error::{MessagingError, Result};
use crate::message::Message;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Transport that owns the channels messages travel through
pub trait ChannelRegistry<T>: Send + Sync {
    fn send(&self, channel: &str, message: Message<T>) -> Result<()>;

    /// Take the next message from `channel`, waiting up to `timeout`.
    /// `None` means the timeout elapsed.
    fn poll(&self, channel: &str, timeout: Duration) -> Result<Option<Message<T>>>;
}

struct Channel<T> {
    sender: Sender<Message<T>>,
    receiver: Receiver<Message<T>>,
}

/// Channels live in memory and double as the collector tests read from
pub struct InMemoryBinder<T> {
    channels: RwLock<HashMap<String, Channel<T>>>,
}

impl<T: Send> InMemoryBinder<T> {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_channel(self, name: impl Into<String>) -> Self {
        self.declare(name);
        self
    }

    /// Create a channel. Declaring an existing channel keeps its queued messages.
    pub fn declare(&self, name: impl Into<String>) {
        let name = name.into();
        let mut channels = self.channels.write();
        if !channels.contains_key(&name) {
            debug!("Declaring channel {}", name);
            let (sender, receiver) = unbounded();
            channels.insert(name, Channel { sender, receiver });
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.read().contains_key(name)
    }

    /// Messages queued on `name`, 0 for unknown channels
    pub fn pending(&self, name: &str) -> usize {
        self.channels
            .read()
            .get(name)
            .map(|c| c.receiver.len())
            .unwrap_or(0)
    }

    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl<T: Send> Default for InMemoryBinder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ChannelRegistry<T> for InMemoryBinder<T> {
    fn send(&self, channel: &str, message: Message<T>) -> Result<()> {
        let channels = self.channels.read();
        let target = channels
            .get(channel)
            .ok_or_else(|| MessagingError::ChannelNotFound(channel.to_string()))?;
        target
            .sender
            .send(message)
            .map_err(|_| MessagingError::Disconnected(channel.to_string()))
    }

    fn poll(&self, channel: &str, timeout: Duration) -> Result<Option<Message<T>>> {
        // Clone the receiver so the lock is not held while blocking
        let receiver = self
            .channels
            .read()
            .get(channel)
            .map(|c| c.receiver.clone())
            .ok_or_else(|| MessagingError::ChannelNotFound(channel.to_string()))?;

        match receiver.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(MessagingError::Disconnected(channel.to_string()))
            }
        }
    }
}
