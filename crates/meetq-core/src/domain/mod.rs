//! Domain model: the job value, its wire codec, transport messages and errors.

pub mod codec;
pub mod errors;
pub mod job;
pub mod message;

pub use self::codec::CodecError;
pub use self::errors::{JobError, QueueError, TransportError, TransportOp};
pub use self::job::MeetingImportJob;
pub use self::message::{LeaseToken, MessageId, QueueMessage};
