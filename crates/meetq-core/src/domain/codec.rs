//! Wire codec for [`MeetingImportJob`] message bodies.
//!
//! Bodies are UTF-8 JSON. Encoding is deterministic (fields in declaration
//! order), decoding ignores field order.

use super::job::MeetingImportJob;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode meeting import job: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("malformed meeting import job body: {0}")]
    Decode(#[source] serde_json::Error),
}

pub fn encode(job: &MeetingImportJob) -> Result<String, CodecError> {
    serde_json::to_string(job).map_err(CodecError::Encode)
}

/// Decode a message body. Missing required fields, an empty `meeting_id` or
/// non-JSON input all surface as [`CodecError::Decode`].
pub fn decode(body: &str) -> Result<MeetingImportJob, CodecError> {
    serde_json::from_str(body).map_err(CodecError::Decode)
}
