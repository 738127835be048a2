//! Meeting import job: the value handed from the submission path to a worker.

use serde::{Deserialize, Serialize};

use super::errors::JobError;

/// One meeting import (immutable once built).
///
/// `meeting_id` doubles as the idempotency key. Delivery is at-least-once, so a
/// handler can see the same job more than once and must dedupe on it.
///
/// Wire form: JSON object with `meeting_id`, `title`, `started_at`, `blob_url`
/// and `original_filename` (written as `null` when absent).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawJob")]
pub struct MeetingImportJob {
    meeting_id: String,
    title: String,
    started_at: String,
    blob_url: String,
    original_filename: Option<String>,
}

/// Unvalidated shape of the wire record.
///
/// Required fields have no default, so a body missing any of them fails to
/// decode. Unknown fields are ignored.
#[derive(Deserialize)]
struct RawJob {
    meeting_id: String,
    title: String,
    started_at: String,
    blob_url: String,
    #[serde(default)]
    original_filename: Option<String>,
}

impl TryFrom<RawJob> for MeetingImportJob {
    type Error = JobError;

    fn try_from(raw: RawJob) -> Result<Self, Self::Error> {
        let job = Self::new(raw.meeting_id, raw.title, raw.started_at, raw.blob_url)?;
        Ok(match raw.original_filename {
            Some(name) => job.with_original_filename(name),
            None => job,
        })
    }
}

impl MeetingImportJob {
    /// Build a job. Fails when `meeting_id` is empty or whitespace only.
    pub fn new(
        meeting_id: impl Into<String>,
        title: impl Into<String>,
        started_at: impl Into<String>,
        blob_url: impl Into<String>,
    ) -> Result<Self, JobError> {
        let meeting_id = meeting_id.into();
        if meeting_id.trim().is_empty() {
            return Err(JobError::EmptyMeetingId);
        }
        Ok(Self {
            meeting_id,
            title: title.into(),
            started_at: started_at.into(),
            blob_url: blob_url.into(),
            original_filename: None,
        })
    }

    pub fn with_original_filename(mut self, name: impl Into<String>) -> Self {
        self.original_filename = Some(name.into());
        self
    }

    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// ISO-8601 timestamp as submitted. Kept as text; the worker never interprets it.
    pub fn started_at(&self) -> &str {
        &self.started_at
    }

    /// Opaque locator of the uploaded recording or transcript.
    pub fn blob_url(&self) -> &str {
        &self.blob_url
    }

    pub fn original_filename(&self) -> Option<&str> {
        self.original_filename.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_has_no_original_filename() {
        let job = MeetingImportJob::new("m-1", "Daily sync", "2024-11-01T10:00:00Z", "https://blob")
            .unwrap();
        assert_eq!(job.meeting_id(), "m-1");
        assert_eq!(job.original_filename(), None);
    }

    #[test]
    fn blank_meeting_id_is_rejected() {
        let err = MeetingImportJob::new("  ", "t", "2024-11-01T10:00:00Z", "https://blob")
            .unwrap_err();
        assert_eq!(err, JobError::EmptyMeetingId);
    }

    #[test]
    fn with_original_filename_sets_the_name() {
        let job = MeetingImportJob::new("m-1", "t", "2024-11-01T10:00:00Z", "https://blob")
            .unwrap()
            .with_original_filename("sync.txt");
        assert_eq!(job.original_filename(), Some("sync.txt"));
    }
}
