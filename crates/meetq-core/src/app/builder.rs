//! QueueBuilder - キューとワーカーの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - in-process / durable の切り替えを tagged enum で表現

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::config::{ConfigError, WorkerConfig};
use crate::app::worker_loop::QueueWorker;
use crate::domain::{MeetingImportJob, QueueError};
use crate::impls::{DurableQueue, InProcessQueue};
use crate::observability::WorkerCounts;
use crate::ports::{JobHandler, JobQueue, PoisonSink, QueueTransport, Worker};

/// Which medium jobs travel through.
#[derive(Clone, Default)]
pub enum Backend {
    /// In-memory FIFO drained by one task. Not durable.
    #[default]
    InProcess,
    /// Lease-based transport polled by a [`QueueWorker`].
    Durable { transport: Arc<dyn QueueTransport> },
}

/// BuildError は構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid worker configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("a poison sink only applies to the durable backend")]
    PoisonSinkWithoutTransport,
}

/// Builds a matching `(MeetingQueue, MeetingWorker)` pair.
///
/// # 使用例
/// ```ignore
/// let (queue, worker) = QueueBuilder::new(handler)
///     .backend(Backend::Durable { transport })
///     .worker_config(WorkerConfig::default())
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - build() 時に WorkerConfig を検証（backend に関係なく）
/// - in-process に poison sink を渡したら BuildError
pub struct QueueBuilder {
    handler: Arc<dyn JobHandler>,
    backend: Backend,
    config: WorkerConfig,
    poison_sink: Option<Arc<dyn PoisonSink>>,
}

impl QueueBuilder {
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        Self {
            handler,
            backend: Backend::default(),
            config: WorkerConfig::default(),
            poison_sink: None,
        }
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn worker_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn poison_sink(mut self, sink: Arc<dyn PoisonSink>) -> Self {
        self.poison_sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<(MeetingQueue, MeetingWorker), BuildError> {
        self.config.validate()?;
        match self.backend {
            Backend::InProcess => {
                if self.poison_sink.is_some() {
                    return Err(BuildError::PoisonSinkWithoutTransport);
                }
                let queue = InProcessQueue::new(self.handler);
                Ok((
                    MeetingQueue::InProcess(queue.clone()),
                    MeetingWorker::InProcess(queue),
                ))
            }
            Backend::Durable { transport } => {
                let mut worker = QueueWorker::new(transport.clone(), self.handler, self.config)?;
                if let Some(sink) = self.poison_sink {
                    worker = worker.with_poison_sink(sink);
                }
                Ok((
                    MeetingQueue::Durable(DurableQueue::new(transport)),
                    MeetingWorker::Durable(Arc::new(worker)),
                ))
            }
        }
    }
}

/// Submission side, whichever backend was built.
#[derive(Clone)]
pub enum MeetingQueue {
    InProcess(InProcessQueue),
    Durable(DurableQueue),
}

#[async_trait]
impl JobQueue for MeetingQueue {
    async fn enqueue(&self, job: MeetingImportJob) -> Result<(), QueueError> {
        match self {
            MeetingQueue::InProcess(queue) => queue.enqueue(job).await,
            MeetingQueue::Durable(queue) => queue.enqueue(job).await,
        }
    }
}

/// Processing side, whichever backend was built.
#[derive(Clone)]
pub enum MeetingWorker {
    InProcess(InProcessQueue),
    Durable(Arc<QueueWorker>),
}

impl MeetingWorker {
    pub fn counts(&self) -> WorkerCounts {
        match self {
            MeetingWorker::InProcess(queue) => queue.stats().snapshot(),
            MeetingWorker::Durable(worker) => worker.stats().snapshot(),
        }
    }
}

#[async_trait]
impl Worker for MeetingWorker {
    async fn run_forever(&self) {
        match self {
            MeetingWorker::InProcess(queue) => queue.run_forever().await,
            MeetingWorker::Durable(worker) => worker.run_forever().await,
        }
    }

    fn stop(&self) {
        match self {
            MeetingWorker::InProcess(queue) => queue.stop(),
            MeetingWorker::Durable(worker) => worker.stop(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::{InMemoryTransport, LogPoisonSink};
    use crate::ports::handler_fn;
    use std::time::Duration;

    fn handler() -> Arc<dyn JobHandler> {
        Arc::new(handler_fn(|_job: MeetingImportJob| async move { Ok(()) }))
    }

    fn job(id: &str) -> MeetingImportJob {
        MeetingImportJob::new(id, "retro", "2024-11-01T10:00:00Z", "https://blob/r.wav").unwrap()
    }

    #[test]
    fn default_backend_is_in_process() {
        let (queue, worker) = QueueBuilder::new(handler()).build().unwrap();
        assert!(matches!(queue, MeetingQueue::InProcess(_)));
        assert!(matches!(worker, MeetingWorker::InProcess(_)));
    }

    #[test]
    fn invalid_config_fails_the_build() {
        let result = QueueBuilder::new(handler())
            .worker_config(WorkerConfig::default().with_renewal_fraction(1.5))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::Config(ConfigError::RenewalFraction(_)))
        ));
    }

    #[test]
    fn poison_sink_requires_a_transport() {
        let result = QueueBuilder::new(handler())
            .poison_sink(Arc::new(LogPoisonSink))
            .build();
        assert!(matches!(result, Err(BuildError::PoisonSinkWithoutTransport)));
    }

    #[tokio::test]
    async fn in_process_pair_shares_one_queue() {
        let (queue, worker) = QueueBuilder::new(handler()).build().unwrap();
        queue.enqueue(job("a")).await.unwrap();
        queue.enqueue(job("b")).await.unwrap();

        worker.stop();
        worker.run_forever().await;

        assert_eq!(worker.counts().succeeded, 2);
        assert!(matches!(
            queue.enqueue(job("c")).await,
            Err(QueueError::Stopped)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn durable_pair_shares_one_transport() {
        let transport = Arc::new(InMemoryTransport::new());
        let (queue, worker) = QueueBuilder::new(handler())
            .backend(Backend::Durable {
                transport: transport.clone(),
            })
            .worker_config(WorkerConfig::default().with_poll_interval(Duration::from_millis(10)))
            .poison_sink(Arc::new(LogPoisonSink))
            .build()
            .unwrap();

        queue.enqueue(job("a")).await.unwrap();
        let runner = tokio::spawn({
            let worker = worker.clone();
            async move { worker.run_forever().await }
        });
        while !transport.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        worker.stop();
        runner.await.unwrap();

        let counts = worker.counts();
        assert_eq!(counts.succeeded, 1);
        assert_eq!(counts.deleted, 1);
    }
}
