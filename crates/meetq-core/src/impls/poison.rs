//! PoisonSink の実装
//!
//! - **LogPoisonSink**: error ログを出して破棄（デフォルト）
//! - **TransportPoisonSink**: 別キュー（`<queue>-poison` など）へ転送

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::error;

use crate::domain::{MessageId, QueueMessage, TransportError, TransportOp};
use crate::ports::{PoisonReason, PoisonSink, QueueTransport};

/// Logs the poison message and drops it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPoisonSink;

#[async_trait]
impl PoisonSink for LogPoisonSink {
    async fn quarantine(
        &self,
        message: &QueueMessage,
        reason: &PoisonReason,
    ) -> Result<(), TransportError> {
        error!(
            message_id = %message.id,
            dequeue_count = message.dequeue_count,
            %reason,
            body = %message.body,
            "dropping poison message"
        );
        Ok(())
    }
}

/// Record written to the poison queue.
#[derive(Debug, Serialize)]
struct PoisonRecord<'a> {
    message_id: &'a MessageId,
    dequeue_count: u32,
    reason: &'a PoisonReason,
    body: &'a str,
}

/// Forwards poison messages to a second transport.
pub struct TransportPoisonSink {
    transport: Arc<dyn QueueTransport>,
}

impl TransportPoisonSink {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl PoisonSink for TransportPoisonSink {
    async fn quarantine(
        &self,
        message: &QueueMessage,
        reason: &PoisonReason,
    ) -> Result<(), TransportError> {
        let record = PoisonRecord {
            message_id: &message.id,
            dequeue_count: message.dequeue_count,
            reason,
            body: &message.body,
        };
        let body = serde_json::to_string(&record)
            .map_err(|e| TransportError::request(TransportOp::Send, e.to_string()))?;
        let id = self.transport.send(body).await?;
        error!(
            message_id = %message.id,
            poison_message_id = %id,
            %reason,
            "moved poison message"
        );
        Ok(())
    }
}
