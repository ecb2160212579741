//! Durable source offset storage for the streamtap host.
//!
//! Provides the [`OffsetBackend`] trait and a [`SqliteOffsetBackend`]
//! implementation. Offsets are scoped by task and keyed by source partition.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod sqlite;

pub use backend::OffsetBackend;
pub use error::StateError;
pub use sqlite::SqliteOffsetBackend;
