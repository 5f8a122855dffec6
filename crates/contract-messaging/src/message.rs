use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Message headers. Values are arbitrary JSON.
pub type Headers = HashMap<String, Value>;

/// A payload together with its headers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<T> {
    pub payload: T,
    #[serde(default)]
    pub headers: Headers,
}

impl<T> Message<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            headers: Headers::new(),
        }
    }

    pub fn with_headers(payload: T, headers: Headers) -> Self {
        Self { payload, headers }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(name)
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

/// Outcome of waiting for a message
#[derive(Debug, Clone, PartialEq)]
pub enum Received<T> {
    Message(Message<T>),
    /// Nothing arrived before the timeout elapsed
    TimedOut,
}

impl<T> Received<T> {
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Received::TimedOut)
    }

    pub fn message(&self) -> Option<&Message<T>> {
        match self {
            Received::Message(message) => Some(message),
            Received::TimedOut => None,
        }
    }

    pub fn into_message(self) -> Option<Message<T>> {
        match self {
            Received::Message(message) => Some(message),
            Received::TimedOut => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_headers_accumulate() {
        let message = Message::new("book returned")
            .with_header("contentType", "application/json")
            .with_header("retries", 3);

        assert_eq!(message.header("contentType"), Some(&json!("application/json")));
        assert_eq!(message.header("retries"), Some(&json!(3)));
        assert_eq!(message.header("missing"), None);
        assert_eq!(message.into_payload(), "book returned");
    }

    #[test]
    fn test_headers_default_when_absent_in_json() {
        let message: Message<Value> = serde_json::from_str(r#"{"payload":{"isbn":"123"}}"#).unwrap();
        assert!(message.headers.is_empty());
        assert_eq!(message.payload["isbn"], "123");
    }

    #[test]
    fn test_received_accessors() {
        let received = Received::Message(Message::new(1));
        assert!(!received.is_timed_out());
        assert_eq!(received.message().map(|m| m.payload), Some(1));

        let timed_out: Received<i32> = Received::TimedOut;
        assert!(timed_out.is_timed_out());
        assert!(timed_out.into_message().is_none());
    }
}
