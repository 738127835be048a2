//! DurableQueue - クラウドキューへの投入側

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::domain::{MeetingImportJob, QueueError, codec};
use crate::ports::{JobQueue, QueueTransport};

/// Enqueue side backed by a [`QueueTransport`].
///
/// Each `enqueue` serializes the job and performs exactly one `send`. Errors
/// are returned as-is; retrying is up to the caller.
#[derive(Clone)]
pub struct DurableQueue {
    transport: Arc<dyn QueueTransport>,
}

impl DurableQueue {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn QueueTransport> {
        &self.transport
    }
}

#[async_trait]
impl JobQueue for DurableQueue {
    async fn enqueue(&self, job: MeetingImportJob) -> Result<(), QueueError> {
        let body = codec::encode(&job)?;
        let message_id = self.transport.send(body).await?;
        info!(
            meeting_id = job.meeting_id(),
            %message_id,
            "enqueued meeting import job"
        );
        Ok(())
    }
}
