//! InMemoryTransport - 開発・テスト用の QueueTransport
//!
//! # 学習ポイント
//! - lease token（pop receipt）のローテーションを再現
//! - tokio::time::Instant を使うので `start_paused` のテストで時間を進められる
//! - 呼び出し履歴と障害注入でワーカーの挙動を検証できる

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use ulid::Ulid;

use crate::domain::{LeaseToken, MessageId, QueueMessage, TransportError, TransportOp};
use crate::ports::QueueTransport;

/// One recorded call against the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Send {
        id: MessageId,
    },
    Receive {
        max_count: usize,
        visibility_timeout: Duration,
        returned: usize,
    },
    Delete {
        id: MessageId,
    },
    Renew {
        id: MessageId,
        visibility_timeout: Duration,
    },
}

#[derive(Debug)]
struct StoredMessage {
    id: MessageId,
    body: String,
    inserted_at: DateTime<Utc>,
    dequeue_count: u32,
    visible_at: Instant,
    /// Current pop receipt, if the message was ever received.
    lease: Option<String>,
}

#[derive(Debug, Default)]
struct TransportState {
    messages: VecDeque<StoredMessage>,
    calls: Vec<TransportCall>,
    failures: HashMap<TransportOp, u32>,
}

impl TransportState {
    /// Consume one injected failure for `op`, if any is pending.
    fn take_failure(&mut self, op: TransportOp) -> Result<(), TransportError> {
        if let Some(remaining) = self.failures.get_mut(&op)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(TransportError::request(op, "injected failure"));
        }
        Ok(())
    }

    fn leased_mut(
        &mut self,
        id: &MessageId,
        lease: &LeaseToken,
    ) -> Result<&mut StoredMessage, TransportError> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| &m.id == id)
            .ok_or_else(|| TransportError::NotFound(id.clone()))?;
        if message.lease.as_deref() != Some(lease.as_str()) {
            return Err(TransportError::StaleLease(id.clone()));
        }
        Ok(message)
    }
}

/// In-memory queue with storage-queue lease semantics.
///
/// - `receive` hides messages for the visibility timeout and bumps
///   `dequeue_count`
/// - every receive/renew issues a fresh token; older tokens get `StaleLease`
/// - a deleted (or never sent) message gets `NotFound`
///
/// # 使用例
/// ```ignore
/// let transport = Arc::new(InMemoryTransport::new());
/// transport.send(body).await?;
/// let batch = transport.receive(4, Duration::from_secs(30)).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    state: Mutex<TransportState>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, TransportState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `times` calls of `op` fail with a request error.
    pub fn fail_next(&self, op: TransportOp, times: u32) {
        *self.state().failures.entry(op).or_default() += times;
    }

    /// Every call made so far, failed ones included.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.state().calls.clone()
    }

    /// Number of delete calls.
    pub fn deletes(&self) -> usize {
        self.count_calls(|c| matches!(c, TransportCall::Delete { .. }))
    }

    /// Number of renew calls.
    pub fn renewals(&self) -> usize {
        self.count_calls(|c| matches!(c, TransportCall::Renew { .. }))
    }

    fn count_calls(&self, pred: impl Fn(&TransportCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    /// Messages still stored, visible or not.
    pub fn len(&self) -> usize {
        self.state().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bodies of the stored messages in insertion order.
    pub fn bodies(&self) -> Vec<String> {
        self.state().messages.iter().map(|m| m.body.clone()).collect()
    }
}

#[async_trait]
impl QueueTransport for InMemoryTransport {
    async fn send(&self, body: String) -> Result<MessageId, TransportError> {
        let mut state = self.state();
        state.take_failure(TransportOp::Send)?;

        let id = MessageId::new(Ulid::new().to_string());
        state.messages.push_back(StoredMessage {
            id: id.clone(),
            body,
            inserted_at: Utc::now(),
            dequeue_count: 0,
            visible_at: Instant::now(),
            lease: None,
        });
        state.calls.push(TransportCall::Send { id: id.clone() });
        Ok(id)
    }

    async fn receive(
        &self,
        max_count: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>, TransportError> {
        let mut state = self.state();
        if let Err(e) = state.take_failure(TransportOp::Receive) {
            state.calls.push(TransportCall::Receive {
                max_count,
                visibility_timeout,
                returned: 0,
            });
            return Err(e);
        }

        let now = Instant::now();
        let mut batch = Vec::new();
        for message in state.messages.iter_mut() {
            if batch.len() >= max_count {
                break;
            }
            if message.visible_at > now {
                continue;
            }
            let token = Ulid::new().to_string();
            message.dequeue_count += 1;
            message.visible_at = now + visibility_timeout;
            message.lease = Some(token.clone());
            batch.push(QueueMessage {
                id: message.id.clone(),
                lease_token: LeaseToken::new(token),
                body: message.body.clone(),
                dequeue_count: message.dequeue_count,
                inserted_at: message.inserted_at,
            });
        }

        state.calls.push(TransportCall::Receive {
            max_count,
            visibility_timeout,
            returned: batch.len(),
        });
        Ok(batch)
    }

    async fn delete(&self, id: &MessageId, lease: &LeaseToken) -> Result<(), TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::Delete { id: id.clone() });
        state.take_failure(TransportOp::Delete)?;

        state.leased_mut(id, lease)?;
        state.messages.retain(|m| &m.id != id);
        Ok(())
    }

    async fn renew(
        &self,
        id: &MessageId,
        lease: &LeaseToken,
        visibility_timeout: Duration,
    ) -> Result<LeaseToken, TransportError> {
        let mut state = self.state();
        state.calls.push(TransportCall::Renew {
            id: id.clone(),
            visibility_timeout,
        });
        state.take_failure(TransportOp::Renew)?;

        let message = state.leased_mut(id, lease)?;
        let token = Ulid::new().to_string();
        message.visible_at = Instant::now() + visibility_timeout;
        message.lease = Some(token.clone());
        Ok(LeaseToken::new(token))
    }
}
