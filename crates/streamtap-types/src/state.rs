//! Offset storage model types.
//!
//! Pure data types shared by the host and `OffsetBackend` implementations.

use serde::{Deserialize, Serialize};

/// Opaque task identifier. Persisted offsets are scoped to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Create a new task identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S: Into<String>> From<S> for TaskId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

/// A persisted offset row as read back from a backend.
///
/// `updated_at` is an ISO-8601 UTC string (e.g. `"2026-01-15T10:00:00Z"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOffset {
    pub partition: crate::offset::SourcePartition,
    pub offset: crate::offset::SourceOffset,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_display_and_as_str() {
        let id = TaskId::new("orders-ingest");
        assert_eq!(id.as_str(), "orders-ingest");
        assert_eq!(id.to_string(), "orders-ingest");
    }

    #[test]
    fn task_id_serde_transparent() {
        let json = serde_json::to_string(&TaskId::from("t1")).unwrap();
        assert_eq!(json, "\"t1\"");
    }
}
