//! Errors shared by the queue ports.
//!
//! - [`TransportError`]: a send/receive/delete/renew call failed
//! - [`QueueError`]: enqueue-side failure surfaced to the submitter
//! - [`JobError`]: a job value violates its invariants

use std::fmt;

use thiserror::Error;

use super::codec::CodecError;
use super::message::MessageId;

/// Transport operation, used to tag request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportOp {
    Send,
    Receive,
    Delete,
    Renew,
}

impl fmt::Display for TransportOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportOp::Send => "send",
            TransportOp::Receive => "receive",
            TransportOp::Delete => "delete",
            TransportOp::Renew => "renew",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{operation} request failed: {message}")]
    Request {
        operation: TransportOp,
        message: String,
    },

    #[error("message {0} not found")]
    NotFound(MessageId),

    /// The token is no longer the current one: another receive or renew
    /// rotated it, so this caller no longer owns the message.
    #[error("lease token for message {0} is stale")]
    StaleLease(MessageId),
}

impl TransportError {
    pub fn request(operation: TransportOp, message: impl Into<String>) -> Self {
        Self::Request {
            operation,
            message: message.into(),
        }
    }

    /// True when retrying with the same token can never succeed.
    pub fn is_lease_lost(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::StaleLease(_))
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("queue has been stopped and no longer accepts jobs")]
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("meeting_id must not be empty")]
    EmptyMeetingId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_and_missing_messages_mean_the_lease_is_lost() {
        let id = MessageId::new("1");
        assert!(TransportError::StaleLease(id.clone()).is_lease_lost());
        assert!(TransportError::NotFound(id).is_lease_lost());
        assert!(!TransportError::request(TransportOp::Renew, "timeout").is_lease_lost());
    }

    #[test]
    fn request_error_names_the_operation() {
        let err = TransportError::request(TransportOp::Receive, "connection reset");
        assert_eq!(err.to_string(), "receive request failed: connection reset");
    }
}
