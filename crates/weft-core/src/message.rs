// SPDX-License-Identifier: Apache-2.0

//! Message contract and the in-process envelope implementation.
//!
//! The message plane treats messages as opaque: the only observable surface is
//! the [`Message`] trait. [`Envelope`] is the in-process implementation used
//! by harnesses and tests; transports may supply their own.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde_json::Value;

/// Shared, immutable handle to a message.
pub type SharedMessage = Arc<dyn Message>;

/// Observable surface of a message travelling through a subsystem.
pub trait Message: Send + Sync {
    /// Unique message identifier.
    fn id(&self) -> &str;

    /// Routing path, `/`-segmented. Empty paths are rejected by the router.
    fn path(&self) -> &str;

    /// Message payload.
    fn body(&self) -> &Value;

    /// Creation time as milliseconds since the Unix epoch.
    fn timestamp_ms(&self) -> u64;

    /// Whether the message must not be interleaved with others.
    fn is_atomic(&self) -> bool {
        false
    }

    /// Whether the sender expects a reply via [`Message::set_query_result`].
    fn is_query(&self) -> bool {
        false
    }

    /// Stores the handler's reply. Ignored for non-query messages.
    fn set_query_result(&self, _value: Value) {}

    /// Returns the stored reply, if any handler has answered.
    fn query_result(&self) -> Option<Value> {
        None
    }
}

/// In-process message with an interior-mutable query-result slot.
#[derive(Debug)]
pub struct Envelope {
    id: String,
    path: String,
    body: Value,
    timestamp_ms: u64,
    atomic: bool,
    query: bool,
    result: Mutex<Option<Value>>,
}

impl Envelope {
    /// Creates a plain (non-query, non-atomic) message.
    #[must_use]
    pub fn new(path: impl Into<String>, body: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path: path.into(),
            body,
            timestamp_ms: epoch_millis(),
            atomic: false,
            query: false,
            result: Mutex::new(None),
        }
    }

    /// Creates a query message; handlers answer via [`Message::set_query_result`].
    #[must_use]
    pub fn query(path: impl Into<String>, body: Value) -> Self {
        Self {
            query: true,
            ..Self::new(path, body)
        }
    }

    /// Marks the message atomic.
    #[must_use]
    pub fn atomic(mut self) -> Self {
        self.atomic = true;
        self
    }

    /// Wraps the envelope in a shared handle.
    #[must_use]
    pub fn shared(self) -> SharedMessage {
        Arc::new(self)
    }
}

impl Message for Envelope {
    fn id(&self) -> &str {
        &self.id
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn body(&self) -> &Value {
        &self.body
    }

    fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    fn is_atomic(&self) -> bool {
        self.atomic
    }

    fn is_query(&self) -> bool {
        self.query
    }

    fn set_query_result(&self, value: Value) {
        *self.result.lock() = Some(value);
    }

    fn query_result(&self) -> Option<Value> {
        self.result.lock().clone()
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_exposes_path_and_body() {
        let msg = Envelope::new("user/login", json!({"who": "ada"}));
        assert_eq!(msg.path(), "user/login");
        assert_eq!(msg.body()["who"], "ada");
        assert!(!msg.is_query());
        assert!(!msg.is_atomic());
    }

    #[test]
    fn envelope_ids_are_unique() {
        let a = Envelope::new("p", Value::Null);
        let b = Envelope::new("p", Value::Null);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn query_result_round_trips() {
        let msg = Envelope::query("lookup/name", Value::Null);
        assert!(msg.is_query());
        assert_eq!(msg.query_result(), None);
        msg.set_query_result(json!({"ok": true}));
        assert_eq!(msg.query_result(), Some(json!({"ok": true})));
    }

    #[test]
    fn atomic_flag_sticks() {
        let msg = Envelope::new("p", Value::Null).atomic();
        assert!(msg.is_atomic());
    }
}
