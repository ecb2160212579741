//! Checkpoint contract between a source task and its host.
//!
//! A task identifies *what* it reads with a [`SourcePartition`] and *where*
//! it is with a [`SourceOffset`]. The host persists the pair after a batch
//! has been delivered and hands the offset back through an [`OffsetReader`]
//! when the task restarts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConnectorError;

/// Offset field holding the last delivered entry id.
pub const OFFSET_FIELD: &str = "offset";

/// Identifies the log a task reads. Serializes as `{"stream": "<name>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourcePartition {
    pub stream: String,
}

impl SourcePartition {
    #[must_use]
    pub fn new(stream: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
        }
    }
}

/// Resume position payload as stored by the host.
///
/// Kept as an untyped JSON object: whatever was persisted comes back as-is,
/// and the task decides whether it is well formed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceOffset(Map<String, Value>);

impl SourceOffset {
    /// Offset payload `{"offset": "<token>"}`.
    #[must_use]
    pub fn from_token(token: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(OFFSET_FIELD.to_string(), Value::String(token.into()));
        Self(map)
    }

    /// Wrap an arbitrary JSON object, e.g. one read back from storage.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Look up a field of the payload.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The `offset` field, when it is present and a string.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.get(OFFSET_FIELD).and_then(Value::as_str)
    }
}

/// Host-side lookup of the last durably persisted offset for a partition.
pub trait OffsetReader {
    /// Returns `Ok(None)` when nothing has been persisted for `partition`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectorError`] when the underlying storage fails.
    fn offset(&self, partition: &SourcePartition) -> Result<Option<SourceOffset>, ConnectorError>;
}

impl OffsetReader for HashMap<SourcePartition, SourceOffset> {
    fn offset(&self, partition: &SourcePartition) -> Result<Option<SourceOffset>, ConnectorError> {
        Ok(self.get(partition).cloned())
    }
}
