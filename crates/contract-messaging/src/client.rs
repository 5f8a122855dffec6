use crate::error::Result;
use crate::message::{Headers, Message, Received};
use std::time::Duration;

/// Timeout used by [`MessagingClient::receive_message`]
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds, sends and receives messages.
///
/// What a destination is (channel, queue, topic) depends on the implementation.
pub trait MessagingClient<T> {
    fn send(&self, message: Message<T>, destination: &str) -> Result<()>;

    fn send_payload(&self, payload: T, headers: Headers, destination: &str) -> Result<()> {
        self.send(self.create(payload, headers), destination)
    }

    /// Wait up to `timeout` for a message on `destination`
    fn receive_message_within(&self, destination: &str, timeout: Duration) -> Result<Received<T>>;

    fn receive_message(&self, destination: &str) -> Result<Received<T>> {
        self.receive_message_within(destination, DEFAULT_RECEIVE_TIMEOUT)
    }

    fn create(&self, payload: T, headers: Headers) -> Message<T> {
        Message::with_headers(payload, headers)
    }
}
