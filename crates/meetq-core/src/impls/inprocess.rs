//! InProcessQueue - 単一プロセス用のキュー（永続化なし）
//!
//! # 学習ポイント
//! - FIFO とワーカー状態を 1 つの Mutex で守り、check-and-spawn を競合なしにする
//! - ワーカーは enqueue 時に遅延起動し、FIFO が空になったら Idle に戻る
//! - watch チャネルで状態変化（Idle / stop）を待つ

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::domain::{MeetingImportJob, QueueError};
use crate::observability::WorkerStats;
use crate::ports::{JobHandler, JobQueue, Worker};

/// State of the drain task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
}

struct InProcessState {
    pending: VecDeque<MeetingImportJob>,
    worker: WorkerState,
    stopped: bool,
}

struct Shared {
    handler: Arc<dyn JobHandler>,
    state: Mutex<InProcessState>,
    state_tx: watch::Sender<WorkerState>,
    shutdown_tx: watch::Sender<bool>,
    stats: WorkerStats,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, InProcessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Non-durable queue for single-instance deployments.
///
/// Jobs run one at a time in FIFO order on a lazily spawned task. Nothing is
/// persisted: a crash loses queued and in-flight jobs, and a failed job is
/// logged and dropped.
///
/// Cloning shares the same queue.
#[derive(Clone)]
pub struct InProcessQueue {
    shared: Arc<Shared>,
}

impl InProcessQueue {
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        let (state_tx, _) = watch::channel(WorkerState::Idle);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                handler,
                state: Mutex::new(InProcessState {
                    pending: VecDeque::new(),
                    worker: WorkerState::Idle,
                    stopped: false,
                }),
                state_tx,
                shutdown_tx,
                stats: WorkerStats::new(),
            }),
        }
    }

    pub fn worker_state(&self) -> WorkerState {
        self.shared.lock().worker
    }

    /// Jobs waiting behind the one currently running.
    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.shared.stats
    }
}

#[async_trait]
impl JobQueue for InProcessQueue {
    async fn enqueue(&self, job: MeetingImportJob) -> Result<(), QueueError> {
        let mut state = self.shared.lock();
        if state.stopped {
            return Err(QueueError::Stopped);
        }
        debug!(meeting_id = job.meeting_id(), "queued in-process job");
        state.pending.push_back(job);

        if state.worker == WorkerState::Idle {
            state.worker = WorkerState::Running;
            self.shared.state_tx.send_replace(WorkerState::Running);
            tokio::spawn(drain(self.shared.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl Worker for InProcessQueue {
    async fn run_forever(&self) {
        let mut shutdown = self.shared.shutdown_tx.subscribe();
        let _ = shutdown.wait_for(|stopped| *stopped).await;

        let mut state = self.shared.state_tx.subscribe();
        let _ = state.wait_for(|s| *s == WorkerState::Idle).await;
        info!("in-process worker stopped");
    }

    fn stop(&self) {
        self.shared.lock().stopped = true;
        self.shared.shutdown_tx.send_replace(true);
    }
}

/// Process jobs until the FIFO is empty, then go `Idle`.
async fn drain(shared: Arc<Shared>) {
    loop {
        let job = {
            let mut state = shared.lock();
            match state.pending.pop_front() {
                Some(job) => job,
                None => {
                    // emptiness check and Idle transition under one lock
                    state.worker = WorkerState::Idle;
                    shared.state_tx.send_replace(WorkerState::Idle);
                    return;
                }
            }
        };

        shared.stats.record_received();
        let meeting_id = job.meeting_id().to_string();
        let handler = shared.handler.clone();

        // own task so a panicking handler does not take the drain loop down
        match tokio::spawn(async move { handler.handle(job).await }).await {
            Ok(Ok(())) => {
                shared.stats.record_success();
                info!(%meeting_id, "in-process job completed");
            }
            Ok(Err(e)) => {
                shared.stats.record_failure();
                error!(%meeting_id, error = ?e, "in-process job failed");
            }
            Err(e) => {
                shared.stats.record_failure();
                error!(%meeting_id, error = %e, "in-process job panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::handler_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn job(id: &str) -> MeetingImportJob {
        MeetingImportJob::new(id, "weekly sync", "2024-11-01T10:00:00Z", "https://blob/a.wav")
            .unwrap()
    }

    fn recording_queue() -> (InProcessQueue, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = handler_fn(move |job: MeetingImportJob| {
            let sink = sink.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                sink.lock().unwrap().push(job.meeting_id().to_string());
                Ok(())
            }
        });
        (InProcessQueue::new(Arc::new(handler)), seen)
    }

    #[tokio::test]
    async fn jobs_run_in_fifo_order() {
        let (queue, seen) = recording_queue();
        for id in ["a", "b", "c"] {
            queue.enqueue(job(id)).await.unwrap();
        }

        queue.stop();
        queue.run_forever().await;

        assert_eq!(*seen.lock().unwrap(), ["a", "b", "c"]);
        assert_eq!(queue.worker_state(), WorkerState::Idle);
        assert_eq!(queue.stats().snapshot().succeeded, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn only_one_job_runs_at_a_time() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));
        let (a, p, d) = (active.clone(), peak.clone(), done.clone());
        let handler = handler_fn(move |_job: MeetingImportJob| {
            let (active, peak, done) = (a.clone(), p.clone(), d.clone());
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        let queue = InProcessQueue::new(Arc::new(handler));

        let mut submitters = Vec::new();
        for n in 0..4 {
            let queue = queue.clone();
            submitters.push(tokio::spawn(async move {
                for i in 0..10 {
                    queue.enqueue(job(&format!("{n}-{i}"))).await.unwrap();
                }
            }));
        }
        for s in submitters {
            s.await.unwrap();
        }

        queue.stop();
        queue.run_forever().await;

        assert_eq!(done.load(Ordering::SeqCst), 40);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_job_does_not_stop_the_queue() {
        let ok = Arc::new(AtomicUsize::new(0));
        let counter = ok.clone();
        let handler = handler_fn(move |job: MeetingImportJob| {
            let counter = counter.clone();
            async move {
                match job.meeting_id() {
                    "boom" => anyhow::bail!("transcription failed"),
                    "panic" => panic!("handler panicked"),
                    _ => {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }
            }
        });
        let queue = InProcessQueue::new(Arc::new(handler));

        for id in ["a", "boom", "panic", "b"] {
            queue.enqueue(job(id)).await.unwrap();
        }
        queue.stop();
        queue.run_forever().await;

        assert_eq!(ok.load(Ordering::SeqCst), 2);
        let counts = queue.stats().snapshot();
        assert_eq!(counts.received, 4);
        assert_eq!(counts.failed, 2);
    }

    #[tokio::test]
    async fn worker_restarts_after_going_idle() {
        let (queue, seen) = recording_queue();
        let mut state = queue.shared.state_tx.subscribe();

        queue.enqueue(job("first")).await.unwrap();
        state.wait_for(|s| *s == WorkerState::Idle).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), ["first"]);

        queue.enqueue(job("second")).await.unwrap();
        assert_eq!(queue.worker_state(), WorkerState::Running);
        queue.stop();
        queue.run_forever().await;

        assert_eq!(*seen.lock().unwrap(), ["first", "second"]);
    }

    #[tokio::test]
    async fn stopped_queue_rejects_new_jobs() {
        let (queue, _) = recording_queue();
        queue.stop();

        let err = queue.enqueue(job("late")).await.unwrap_err();
        assert!(matches!(err, QueueError::Stopped));
        assert_eq!(queue.pending(), 0);

        // nothing to drain: returns immediately
        queue.run_forever().await;
    }
}
