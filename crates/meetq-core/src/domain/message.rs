//! Transport-level message types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier assigned by the transport on send.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Proof of the current lease on a message ("pop receipt").
///
/// Every receive/renew call hands out a new token and invalidates the previous
/// one. Not `Clone` on purpose: the holder replaces it in place instead of
/// keeping copies around.
#[derive(Debug, PartialEq, Eq)]
pub struct LeaseToken(String);

impl LeaseToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A message as returned by a receive call, leased to the caller.
#[derive(Debug)]
pub struct QueueMessage {
    pub id: MessageId,
    pub lease_token: LeaseToken,
    /// Serialized job (see [`crate::domain::codec`]).
    pub body: String,
    /// How many times the message has been received, this delivery included.
    pub dequeue_count: u32,
    pub inserted_at: DateTime<Utc>,
}
