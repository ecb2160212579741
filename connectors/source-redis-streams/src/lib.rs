//! Source task for Redis streams.
//!
//! Tails a single stream with blocking `XREAD` calls, resuming from the
//! offset the host last persisted, and turns every entry into an
//! [`OutputRecord`](streamtap_types::OutputRecord) bound for a topic derived
//! from the stream name.

pub mod client;
pub mod config;
pub mod error;
pub mod mapper;
pub mod reader;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use error::TaskError;
pub use task::{RedisStreamSource, TaskState};
