//! Host-side scheduling for streamtap source tasks.

pub mod checkpoint;
pub mod config;
pub mod errors;
pub mod runner;
pub mod sink;

pub use checkpoint::StateOffsetReader;
pub use errors::EngineError;
pub use runner::{run_task, IdleBackoff, RunSummary};
pub use sink::{open_sink, JsonLinesSink, RecordSink};
