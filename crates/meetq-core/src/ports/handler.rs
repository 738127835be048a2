//! JobHandler port - 外部の処理（文字起こし・抽出・保存）への唯一の入口

use std::future::Future;

use async_trait::async_trait;

use crate::domain::MeetingImportJob;

/// Processes one job.
///
/// `Ok(())` means the job is done and its message may be deleted. Any error
/// leaves the message for redelivery, so the same `meeting_id` can arrive
/// again: implementations must be idempotent with respect to it.
///
/// Long-running handlers should yield regularly (`.await` on I/O, or move
/// blocking work to `spawn_blocking`) so the lease watchdog gets to run.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: MeetingImportJob) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a [`JobHandler`].
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a handler.
///
/// ```ignore
/// let handler = handler_fn(|job: MeetingImportJob| async move {
///     println!("importing {}", job.meeting_id());
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(MeetingImportJob) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(MeetingImportJob) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, job: MeetingImportJob) -> anyhow::Result<()> {
        (self.f)(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> MeetingImportJob {
        MeetingImportJob::new(id, "t", "2024-11-01T10:00:00Z", "https://blob").unwrap()
    }

    #[tokio::test]
    async fn closure_handler_receives_the_job() {
        let handler = handler_fn(|job: MeetingImportJob| async move {
            anyhow::ensure!(job.meeting_id() == "ok", "unexpected job {}", job.meeting_id());
            Ok(())
        });

        handler.handle(job("ok")).await.unwrap();
        let err = handler.handle(job("other")).await.unwrap_err();
        assert!(err.to_string().contains("other"));
    }
}
