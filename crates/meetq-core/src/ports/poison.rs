//! PoisonSink port - 処理不能メッセージ（poison message）の退避先

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{QueueMessage, TransportError};

/// Why a message was pulled out of the work queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoisonReason {
    /// The body did not decode into a job.
    Malformed { error: String },

    /// Received more times than the worker allows.
    DeliveryLimit {
        dequeue_count: u32,
        max_delivery_count: u32,
    },
}

impl fmt::Display for PoisonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoisonReason::Malformed { error } => write!(f, "malformed body: {error}"),
            PoisonReason::DeliveryLimit {
                dequeue_count,
                max_delivery_count,
            } => write!(
                f,
                "delivered {dequeue_count} times (limit {max_delivery_count})"
            ),
        }
    }
}

/// Destination for poison messages.
///
/// The worker deletes the original message only after `quarantine` returns
/// `Ok`. An error leaves the message in the work queue for redelivery.
#[async_trait]
pub trait PoisonSink: Send + Sync {
    async fn quarantine(
        &self,
        message: &QueueMessage,
        reason: &PoisonReason,
    ) -> Result<(), TransportError>;
}
