use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Duration, sleep};
use tracing::{info, warn};

use meetq_core::app::{Backend, BackendKind, QueueBuilder, Settings};
use meetq_core::domain::{MeetingImportJob, codec};
use meetq_core::impls::InMemoryTransport;
use meetq_core::observability::init_tracing;
use meetq_core::ports::{JobHandler, JobQueue, Worker};

/// Demo handler: logs the job and pretends to import it.
struct LoggingHandler {
    delay: Duration,
}

#[async_trait]
impl JobHandler for LoggingHandler {
    async fn handle(&self, job: MeetingImportJob) -> anyhow::Result<()> {
        info!(
            meeting_id = job.meeting_id(),
            title = job.title(),
            blob_url = job.blob_url(),
            "importing meeting"
        );
        sleep(self.delay).await;
        Ok(())
    }
}

/// stdin の JSON lines を読んで投入し、全件処理されたらカウンタを出力する
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env は任意
    let _ = dotenvy::dotenv();
    let settings = Settings::from_env().context("reading MEETQ_* settings")?;
    init_tracing(settings.json_logs);

    let handler = Arc::new(LoggingHandler {
        delay: Duration::from_millis(200),
    });

    // durable モードの transport は in-memory（クラウドキューの代わり）
    let transport = Arc::new(InMemoryTransport::new());
    let backend = match settings.backend {
        BackendKind::InProcess => Backend::InProcess,
        BackendKind::Durable => Backend::Durable {
            transport: transport.clone(),
        },
    };
    let (queue, worker) = QueueBuilder::new(handler)
        .backend(backend)
        .worker_config(settings.worker.clone())
        .build()?;

    info!(backend = ?settings.backend, "meetq started");
    let runner = tokio::spawn({
        let worker = worker.clone();
        async move { worker.run_forever().await }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let (mut accepted, mut rejected) = (0u64, 0u64);
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match codec::decode(line) {
            Ok(job) => {
                queue.enqueue(job).await?;
                accepted += 1;
            }
            Err(e) => {
                rejected += 1;
                warn!(error = %e, "skipping invalid job line");
            }
        }
    }
    info!(accepted, rejected, "input exhausted");

    // in-process は stop 後も残りを処理してから止まる
    if settings.backend == BackendKind::Durable {
        while !transport.is_empty() {
            sleep(settings.worker.poll_interval).await;
        }
    }
    worker.stop();
    runner.await.context("worker task failed")?;

    println!("{}", serde_json::to_string_pretty(&worker.counts())?);
    Ok(())
}
