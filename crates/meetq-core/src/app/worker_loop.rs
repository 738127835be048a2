//! QueueWorker - durable キューのポーリングループ
//!
//! # フロー
//! 1. QueueTransport::receive() で最大 `max_batch_size` 件を lease 付きで取得
//! 2. 配送回数の上限チェック → 超えていれば PoisonSink へ退避して削除
//! 3. body を MeetingImportJob に decode → 失敗したら PoisonSink へ退避して削除
//! 4. handler を別タスクで実行し、LeaseKeeper が lease を更新し続ける
//! 5. 成功 → 最新の lease token で delete / 失敗 → 何もしない（lease 切れで再配送）
//!
//! バッチ内のメッセージは並行に処理し、全件終わってから次の receive に進む。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::app::config::{ConfigError, WorkerConfig};
use crate::app::lease::{Lease, LeaseKeeper};
use crate::domain::{QueueMessage, TransportError, codec};
use crate::impls::LogPoisonSink;
use crate::observability::WorkerStats;
use crate::ports::{JobHandler, PoisonReason, PoisonSink, QueueTransport, Worker};

/// Polling worker for a lease-based transport.
///
/// # 使用例
/// ```ignore
/// let worker = Arc::new(QueueWorker::new(transport, handler, WorkerConfig::default())?);
/// let runner = tokio::spawn({
///     let worker = worker.clone();
///     async move { worker.run_forever().await }
/// });
/// // ...
/// worker.stop();
/// runner.await?;
/// ```
/// What one poll cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// Messages returned by the receive call.
    pub received: usize,
    /// Delete, renew or poison-sink calls that failed while processing them.
    pub failed_calls: usize,
}

impl PollOutcome {
    /// Empty batches and batches with failed transport calls wait
    /// `poll_interval` before the next receive.
    pub fn should_back_off(&self) -> bool {
        self.received == 0 || self.failed_calls > 0
    }
}

pub struct QueueWorker {
    dispatcher: Dispatcher,
    shutdown_tx: watch::Sender<bool>,
}

/// Everything a per-message task needs, cheap to clone into it.
#[derive(Clone)]
struct Dispatcher {
    transport: Arc<dyn QueueTransport>,
    handler: Arc<dyn JobHandler>,
    poison: Arc<dyn PoisonSink>,
    config: Arc<WorkerConfig>,
    stats: Arc<WorkerStats>,
}

impl QueueWorker {
    pub fn new(
        transport: Arc<dyn QueueTransport>,
        handler: Arc<dyn JobHandler>,
        config: WorkerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            dispatcher: Dispatcher {
                transport,
                handler,
                poison: Arc::new(LogPoisonSink),
                config: Arc::new(config),
                stats: Arc::new(WorkerStats::new()),
            },
            shutdown_tx,
        })
    }

    /// Replace the default log-and-drop poison sink.
    pub fn with_poison_sink(mut self, sink: Arc<dyn PoisonSink>) -> Self {
        self.dispatcher.poison = sink;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.dispatcher.config
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.dispatcher.stats
    }

    /// One receive plus processing of the whole batch.
    ///
    /// Only the receive call itself fails here. Failed calls made while
    /// processing the batch are logged and counted in the outcome.
    pub async fn poll_once(&self) -> Result<PollOutcome, TransportError> {
        let config = &self.dispatcher.config;
        // lease deadlines are measured from before the request
        let received_at = Instant::now();
        let batch = match self
            .dispatcher
            .transport
            .receive(config.max_batch_size, config.visibility_timeout)
            .await
        {
            Ok(batch) => batch,
            Err(e) => {
                self.dispatcher.stats.record_transport_error();
                return Err(e);
            }
        };

        let count = batch.len();
        self.dispatcher.stats.record_poll(count);
        if count > 0 {
            debug!(count, "received batch");
        }

        let mut outcome = PollOutcome {
            received: count,
            failed_calls: 0,
        };
        let mut tasks = JoinSet::new();
        for message in batch {
            tasks.spawn(self.dispatcher.clone().process(message, received_at));
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(failed_calls) => outcome.failed_calls += failed_calls,
                Err(e) => error!(error = %e, "message task aborted"),
            }
        }
        Ok(outcome)
    }
}

impl Dispatcher {
    /// Returns the number of transport calls that failed for this message.
    async fn process(self, message: QueueMessage, received_at: Instant) -> usize {
        if let Some(max_delivery_count) = self.config.max_delivery_count
            && message.dequeue_count > max_delivery_count
        {
            let reason = PoisonReason::DeliveryLimit {
                dequeue_count: message.dequeue_count,
                max_delivery_count,
            };
            return self.quarantine(message, reason).await;
        }

        let job = match codec::decode(&message.body) {
            Ok(job) => job,
            Err(e) => {
                let reason = PoisonReason::Malformed {
                    error: e.to_string(),
                };
                return self.quarantine(message, reason).await;
            }
        };

        let QueueMessage {
            id,
            lease_token,
            dequeue_count,
            ..
        } = message;
        let meeting_id = job.meeting_id().to_string();
        debug!(%meeting_id, message_id = %id, dequeue_count, "dispatching job");

        let mut lease = Lease::new(id, lease_token, self.config.visibility_timeout, received_at);
        let handler = self.handler.clone();
        let task = tokio::spawn(async move { handler.handle(job).await });

        let keeper = LeaseKeeper::new(self.transport.as_ref(), &self.config, &self.stats);
        let mut failed_calls = match keeper.watch(&mut lease, task).await {
            Ok(Ok(())) => {
                self.stats.record_success();
                usize::from(!self.delete(&lease, &meeting_id).await)
            }
            Ok(Err(e)) => {
                self.stats.record_failure();
                warn!(
                    %meeting_id,
                    message_id = %lease.message_id(),
                    dequeue_count,
                    error = ?e,
                    "job failed; message left for redelivery"
                );
                0
            }
            Err(e) => {
                self.stats.record_failure();
                error!(
                    %meeting_id,
                    message_id = %lease.message_id(),
                    dequeue_count,
                    error = %e,
                    "job handler panicked; message left for redelivery"
                );
                0
            }
        };
        failed_calls += lease.renew_failures() as usize;
        failed_calls
    }

    /// Returns whether the message is gone.
    async fn delete(&self, lease: &Lease, meeting_id: &str) -> bool {
        match self.transport.delete(lease.message_id(), lease.token()).await {
            Ok(()) => {
                self.stats.record_deleted();
                info!(meeting_id, message_id = %lease.message_id(), "job completed");
                true
            }
            Err(e) => {
                self.stats.record_transport_error();
                if lease.is_lost() || e.is_lease_lost() {
                    warn!(
                        meeting_id,
                        message_id = %lease.message_id(),
                        error = %e,
                        "job completed after its lease was lost; expect a duplicate delivery"
                    );
                } else {
                    error!(
                        meeting_id,
                        message_id = %lease.message_id(),
                        error = %e,
                        "failed to delete completed message"
                    );
                }
                false
            }
        }
    }

    /// Hand a poison message to the sink, then delete it. Returns the number
    /// of failed calls (0 or 1).
    async fn quarantine(&self, message: QueueMessage, reason: PoisonReason) -> usize {
        warn!(
            message_id = %message.id,
            dequeue_count = message.dequeue_count,
            %reason,
            "quarantining poison message"
        );
        if let Err(e) = self.poison.quarantine(&message, &reason).await {
            self.stats.record_transport_error();
            error!(
                message_id = %message.id,
                error = %e,
                "poison sink rejected message; leaving it in the queue"
            );
            return 1;
        }
        self.stats.record_poisoned();

        match self.transport.delete(&message.id, &message.lease_token).await {
            Ok(()) => {
                self.stats.record_deleted();
                0
            }
            Err(e) => {
                self.stats.record_transport_error();
                error!(
                    message_id = %message.id,
                    error = %e,
                    "failed to delete quarantined message"
                );
                1
            }
        }
    }
}

#[async_trait]
impl Worker for QueueWorker {
    async fn run_forever(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let config = &self.dispatcher.config;
        info!(
            visibility_timeout = ?config.visibility_timeout,
            poll_interval = ?config.poll_interval,
            max_batch_size = config.max_batch_size,
            "queue worker started"
        );

        loop {
            // shutdown が来ていたら抜ける（処理中のバッチは poll_once 内で完了済み）
            if *shutdown_rx.borrow() {
                break;
            }

            let idle = match self.poll_once().await {
                Ok(outcome) => {
                    if outcome.failed_calls > 0 {
                        warn!(
                            failed_calls = outcome.failed_calls,
                            "transport calls failed during batch; backing off"
                        );
                    }
                    outcome.should_back_off()
                }
                Err(e) => {
                    warn!(error = %e, "receive failed; backing off");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = shutdown_rx.changed() => {}
                    _ = tokio::time::sleep(config.poll_interval) => {}
                }
            }
        }
        info!("queue worker stopped");
    }

    fn stop(&self) {
        self.shutdown_tx.send_replace(true);
    }
}
