//! Stream entries, output records, and poll outcomes.

use serde::{Deserialize, Serialize};

use crate::offset::{SourceOffset, SourcePartition};

/// One entry read from a stream.
///
/// `id` is an opaque token assigned by the store. It is ordered within a
/// stream but its internal structure is never interpreted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEntry {
    pub id: String,
    /// Field/value pairs in the order the store returned them.
    pub fields: Vec<(String, String)>,
}

impl StreamEntry {
    pub fn new(id: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Where the next read for a stream should continue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePosition {
    pub stream_name: String,
    pub offset_token: String,
}

impl ResumePosition {
    pub fn new(stream_name: impl Into<String>, offset_token: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            offset_token: offset_token.into(),
        }
    }

    /// Checkpoint key: `{"stream": stream_name}`.
    #[must_use]
    pub fn partition(&self) -> SourcePartition {
        SourcePartition::new(self.stream_name.clone())
    }

    /// Checkpoint value: `{"offset": offset_token}`.
    #[must_use]
    pub fn offset(&self) -> SourceOffset {
        SourceOffset::from_token(self.offset_token.clone())
    }
}

/// A record handed to the host for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Entry id as a string.
    pub partition_key: String,
    /// Topic the record is destined for.
    pub destination: String,
    /// Flat, order-preserving field/value pairs of the entry.
    pub value: Vec<(String, String)>,
    pub resume_position: ResumePosition,
    /// Seconds since the Unix epoch at which the record was produced.
    pub ingest_timestamp: i64,
}

/// Result of one poll cycle.
///
/// `Idle` and `Interrupted` are distinct from an error and from each other:
/// the host backs off on `Idle` and winds down on `Interrupted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// At least one record, in store order.
    Records(Vec<OutputRecord>),
    /// The wait elapsed without new entries.
    Idle,
    /// Shutdown was requested while the read was outstanding.
    Interrupted,
}

impl PollOutcome {
    /// Wrap a batch, treating an empty one as [`PollOutcome::Idle`].
    #[must_use]
    pub fn from_records(records: Vec<OutputRecord>) -> Self {
        if records.is_empty() {
            Self::Idle
        } else {
            Self::Records(records)
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Number of records carried (zero for `Idle` and `Interrupted`).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Records(records) => records.len(),
            Self::Idle | Self::Interrupted => 0,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
