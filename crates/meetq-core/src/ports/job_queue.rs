//! JobQueue port - ジョブ投入口
//!
//! リクエスト処理側はこの trait だけを見ます（処理の完了は待たない）。

use async_trait::async_trait;

use crate::domain::{MeetingImportJob, QueueError};

/// Submission side of the queue.
///
/// `enqueue` appends exactly one message and returns without waiting for the
/// job to be processed. It never retries internally: a failure is returned to
/// the caller, who owns the retry policy. Re-sending after a send that failed
/// but was actually delivered produces a duplicate; handlers dedupe on
/// `meeting_id`.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: MeetingImportJob) -> Result<(), QueueError>;
}
