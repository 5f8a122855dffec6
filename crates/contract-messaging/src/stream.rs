//! Stream-style binding: logical destinations resolved to channels by name.

use crate::binder::ChannelRegistry;
use crate::client::{MessagingClient, DEFAULT_RECEIVE_TIMEOUT};
use crate::error::{MessagingError, Result};
use crate::message::{Message, Received};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Binding of one channel to a broker destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingProperties {
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl BindingProperties {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            group: None,
            content_type: None,
        }
    }
}

/// Messaging client over a channel registry.
///
/// A destination is first looked up among the binding destinations; the channel
/// bound to it is used. Destinations without a binding are treated as channel names.
pub struct StreamMessaging<T> {
    registry: Arc<dyn ChannelRegistry<T>>,
    /// Keyed by channel name. Ordered so resolution is deterministic.
    bindings: BTreeMap<String, BindingProperties>,
    receive_timeout: Duration,
}

impl<T> StreamMessaging<T> {
    pub fn new(registry: Arc<dyn ChannelRegistry<T>>) -> Self {
        Self {
            registry,
            bindings: BTreeMap::new(),
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
        }
    }

    pub fn with_binding(mut self, channel: impl Into<String>, binding: BindingProperties) -> Self {
        self.bindings.insert(channel.into(), binding);
        self
    }

    pub fn with_bindings(
        mut self,
        bindings: impl IntoIterator<Item = (String, BindingProperties)>,
    ) -> Self {
        self.bindings.extend(bindings);
        self
    }

    /// Timeout applied by `receive_message`
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn bindings(&self) -> &BTreeMap<String, BindingProperties> {
        &self.bindings
    }

    /// Channel name for a logical destination
    pub fn resolve_destination(&self, destination: &str) -> String {
        let bound = self
            .bindings
            .iter()
            .find(|(_, binding)| binding.destination == destination);
        match bound {
            Some((channel, _)) => {
                debug!("Destination [{}] is bound to channel [{}]", destination, channel);
                channel.clone()
            }
            None => {
                debug!(
                    "No binding for destination [{}], using it as the channel name",
                    destination
                );
                destination.to_string()
            }
        }
    }
}

impl<T: Debug> MessagingClient<T> for StreamMessaging<T> {
    fn send(&self, message: Message<T>, destination: &str) -> Result<()> {
        let channel = self.resolve_destination(destination);
        let description = format!("{message:?}");
        self.registry.send(&channel, message).map_err(|e| {
            error!(
                "Failed to send message {} to destination [{}]: {}",
                description, destination, e
            );
            MessagingError::SendFailed {
                destination: destination.to_string(),
                message: description,
                source: Box::new(e),
            }
        })
    }

    fn receive_message_within(&self, destination: &str, timeout: Duration) -> Result<Received<T>> {
        let channel = self.resolve_destination(destination);
        match self.registry.poll(&channel, timeout) {
            Ok(Some(message)) => Ok(Received::Message(message)),
            Ok(None) => {
                debug!(
                    "No message on destination [{}] within {:?}",
                    destination, timeout
                );
                Ok(Received::TimedOut)
            }
            Err(e) => {
                error!(
                    "Failed to receive a message from destination [{}]: {}",
                    destination, e
                );
                Err(MessagingError::ReceiveFailed {
                    destination: destination.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }

    fn receive_message(&self, destination: &str) -> Result<Received<T>> {
        self.receive_message_within(destination, self.receive_timeout)
    }
}
