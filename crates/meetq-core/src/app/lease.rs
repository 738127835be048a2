//! Lease - メッセージ単位の lease 管理と更新（watchdog）
//!
//! # 学習ポイント
//! - lease token は `Lease` が唯一の所有者（Clone しない、更新時に差し替え）
//! - handler は別タスクで走らせ、`select!` で完了と更新期限を競合させる
//! - stale lease は「失った」と記録するだけで handler は止めない

use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::app::config::WorkerConfig;
use crate::domain::{LeaseToken, MessageId};
use crate::observability::WorkerStats;
use crate::ports::QueueTransport;

/// Shortest wait between two renewal attempts after a transient failure.
const MIN_RENEW_RETRY: Duration = Duration::from_millis(10);

/// Exclusive claim on one received message.
#[derive(Debug)]
pub struct Lease {
    message_id: MessageId,
    token: LeaseToken,
    duration: Duration,
    acquired_at: Instant,
    lost: bool,
    renew_failures: u32,
}

impl Lease {
    /// `acquired_at` should be taken before the call that issued `token`, so
    /// the computed deadlines are never later than the transport's.
    pub fn new(
        message_id: MessageId,
        token: LeaseToken,
        duration: Duration,
        acquired_at: Instant,
    ) -> Self {
        Self {
            message_id,
            token,
            duration,
            acquired_at,
            lost: false,
            renew_failures: 0,
        }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Newest token; the only one the transport still accepts.
    pub fn token(&self) -> &LeaseToken {
        &self.token
    }

    pub fn renew_at(&self, fraction: f64) -> Instant {
        self.acquired_at + self.duration.mul_f64(fraction)
    }

    pub fn expires_at(&self) -> Instant {
        self.acquired_at + self.duration
    }

    /// True once a renewal was rejected because someone else owns the message.
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    /// Renewal calls that failed, lease-lost rejections included.
    pub fn renew_failures(&self) -> u32 {
        self.renew_failures
    }

    fn rotate(&mut self, token: LeaseToken, acquired_at: Instant, duration: Duration) {
        self.token = token;
        self.acquired_at = acquired_at;
        self.duration = duration;
    }

    fn mark_lost(&mut self) {
        self.lost = true;
    }
}

/// Keeps a lease alive while its handler task runs.
pub(crate) struct LeaseKeeper<'a> {
    transport: &'a dyn QueueTransport,
    config: &'a WorkerConfig,
    stats: &'a WorkerStats,
}

impl<'a> LeaseKeeper<'a> {
    pub(crate) fn new(
        transport: &'a dyn QueueTransport,
        config: &'a WorkerConfig,
        stats: &'a WorkerStats,
    ) -> Self {
        Self {
            transport,
            config,
            stats,
        }
    }

    /// Wait for `task`, renewing `lease` each time the renewal point passes.
    ///
    /// The task is never cancelled. Renewing stops once the lease is lost.
    pub(crate) async fn watch<T>(
        &self,
        lease: &mut Lease,
        mut task: JoinHandle<T>,
    ) -> Result<T, JoinError> {
        let mut next_renewal = lease.renew_at(self.config.renewal_fraction);
        loop {
            tokio::select! {
                result = &mut task => return result,
                _ = sleep_until(next_renewal), if !lease.is_lost() => {
                    next_renewal = self.renew(lease).await;
                }
            }
        }
    }

    /// One renewal attempt. Returns when the next attempt is due.
    async fn renew(&self, lease: &mut Lease) -> Instant {
        let requested_at = Instant::now();
        let result = self
            .transport
            .renew(lease.message_id(), lease.token(), self.config.visibility_timeout)
            .await;

        match result {
            Ok(token) => {
                lease.rotate(token, requested_at, self.config.visibility_timeout);
                self.stats.record_renewal();
                debug!(message_id = %lease.message_id, "renewed lease");
                lease.renew_at(self.config.renewal_fraction)
            }
            Err(e) if e.is_lease_lost() => {
                lease.mark_lost();
                lease.renew_failures += 1;
                self.stats.record_transport_error();
                warn!(
                    message_id = %lease.message_id,
                    error = %e,
                    "lease lost; handler keeps running but the message may be redelivered"
                );
                requested_at
            }
            Err(e) => {
                lease.renew_failures += 1;
                self.stats.record_transport_error();
                let now = Instant::now();
                let retry_in = self.retry_delay(lease, now);
                warn!(
                    message_id = %lease.message_id,
                    error = %e,
                    ?retry_in,
                    "lease renewal failed"
                );
                now + retry_in
            }
        }
    }

    /// `poll_interval`, shortened so the retry still lands inside the lease.
    fn retry_delay(&self, lease: &Lease, now: Instant) -> Duration {
        let remaining = lease.expires_at().saturating_duration_since(now);
        if remaining.is_zero() {
            return self.config.poll_interval;
        }
        self.config
            .poll_interval
            .min(remaining / 2)
            .max(MIN_RENEW_RETRY)
    }
}
