//! QueueTransport port - クラウドキュー（Azure Storage Queue など）の抽象化
//!
//! DurableQueue（送信側）と QueueWorker（受信側）が同じ transport を共有します。
//!
//! # 実装
//! - **InMemoryTransport**: 開発・テスト用（lease / pop receipt の挙動を再現）

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{LeaseToken, MessageId, QueueMessage, TransportError};

/// Lease-based message transport.
///
/// # 設計原則
/// - at-least-once, near-FIFO delivery (no strict ordering)
/// - `receive` hides each returned message for `visibility_timeout`
/// - only the newest lease token may delete or renew a message
/// - shared between tasks without external locking (`Send + Sync`)
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Append one message. Returns the id the transport assigned.
    async fn send(&self, body: String) -> Result<MessageId, TransportError>;

    /// Lease up to `max_count` visible messages.
    async fn receive(
        &self,
        max_count: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>, TransportError>;

    /// Remove a leased message for good.
    async fn delete(&self, id: &MessageId, lease: &LeaseToken) -> Result<(), TransportError>;

    /// Push the message's visibility out by `visibility_timeout` from now.
    ///
    /// The returned token replaces `lease`, which is invalid afterwards.
    async fn renew(
        &self,
        id: &MessageId,
        lease: &LeaseToken,
        visibility_timeout: Duration,
    ) -> Result<LeaseToken, TransportError>;
}
