//! Send and receive contract test messages against logical destinations.
//!
//! [`StreamMessaging`] maps destinations onto channels through its bindings and
//! talks to any [`ChannelRegistry`]. [`InMemoryBinder`] is the in-process registry
//! used in tests.

pub mod binder;
pub mod client;
pub mod error;
pub mod message;
pub mod stream;

pub use binder::{ChannelRegistry, InMemoryBinder};
pub use client::{MessagingClient, DEFAULT_RECEIVE_TIMEOUT};
pub use error::{MessagingError, Result};
pub use message::{Headers, Message, Received};
pub use stream::{BindingProperties, StreamMessaging};
