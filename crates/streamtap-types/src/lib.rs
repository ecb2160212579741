//! Shared streamtap record, offset, lifecycle, and error model types.
//!
//! This crate is the boundary between source tasks (connectors) and the host
//! that schedules them, so it carries no store- or storage-specific
//! dependencies.

pub mod connector;
pub mod error;
pub mod offset;
pub mod record;
pub mod shutdown;
pub mod state;

pub use connector::SourceTask;
pub use error::ConnectorError;
pub use offset::{OffsetReader, SourceOffset, SourcePartition};
pub use record::{OutputRecord, PollOutcome, ResumePosition, StreamEntry};
pub use shutdown::ShutdownHandle;
