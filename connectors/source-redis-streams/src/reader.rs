//! Cursor-tracking reader for one (stream, task) pair.
//!
//! `StreamCursorReader` resolves where reading starts, issues one bounded
//! blocking read per call, and advances its cursor to the last entry id it
//! returned. The cursor never moves backwards.

use std::time::Duration;

use serde_json::Value;
use streamtap_types::offset::{SourceOffset, OFFSET_FIELD};
use streamtap_types::{ShutdownHandle, StreamEntry};

use crate::client::{StoreError, StreamStore};
use crate::error::TaskError;

/// Extra time allowed past the block wait before a read is abandoned.
const READ_GUARD: Duration = Duration::from_secs(5);

/// Result of a single [`StreamCursorReader::read`].
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Entries in ascending id order; empty when the wait elapsed.
    Entries(Vec<StreamEntry>),
    /// Shutdown was requested before the store replied.
    Interrupted,
}

/// Reader in the `Ready` state. There is no separate closed state: closing
/// only releases the connection, which the reader does not own.
#[derive(Debug)]
pub struct StreamCursorReader {
    stream_name: String,
    batch_size: usize,
    block_wait: Duration,
    cursor: String,
    closed: bool,
}

impl StreamCursorReader {
    /// Resolve the start offset and build a ready reader.
    ///
    /// The `offset` field of `recovered` wins when it is a string. A missing
    /// payload, a missing field or a `null` field falls back to
    /// `configured_start_offset`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::ConfigType`] if the recovered `offset` field holds
    /// any other JSON type.
    pub fn initialize(
        stream_name: &str,
        batch_size: usize,
        block_wait: Duration,
        configured_start_offset: &str,
        recovered: Option<&SourceOffset>,
    ) -> Result<Self, TaskError> {
        let cursor = match recovered.and_then(|offset| offset.get(OFFSET_FIELD)) {
            None | Some(Value::Null) => configured_start_offset.to_string(),
            Some(Value::String(token)) => {
                tracing::info!(stream = stream_name, offset = %token, "Found previous offset");
                token.clone()
            }
            Some(other) => {
                return Err(TaskError::ConfigType {
                    stream: stream_name.to_string(),
                    found: json_type_name(other),
                })
            }
        };

        Ok(Self {
            stream_name: stream_name.to_string(),
            batch_size,
            block_wait,
            cursor,
            closed: false,
        })
    }

    /// Pin a `$` cursor to the stream's current last id.
    ///
    /// Every read after `$` only sees entries appended during that read, so
    /// leaving `$` in place would drop whatever arrives between two polls.
    /// Concrete ids are kept as they are.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Read`] if the store fails or does not answer
    /// within the read guard.
    pub async fn resolve_start<S: StreamStore>(&mut self, store: &mut S) -> Result<(), TaskError> {
        let resolved = tokio::time::timeout(
            READ_GUARD,
            store.resolve_offset(&self.stream_name, &self.cursor),
        )
        .await
        .unwrap_or(Err(StoreError::Timeout(READ_GUARD)))
        .map_err(|source| TaskError::Read {
            stream: self.stream_name.clone(),
            source,
        })?;

        if resolved != self.cursor {
            tracing::info!(
                stream = %self.stream_name,
                requested = %self.cursor,
                offset = %resolved,
                "Resolved start offset"
            );
            self.cursor = resolved;
        }
        Ok(())
    }

    /// Issue exactly one read for up to `batch_size` entries after the cursor.
    ///
    /// Waits at most the block wait for entries, plus a fixed guard for a
    /// store that never answers. Returns [`ReadOutcome::Interrupted`] as soon
    /// as `shutdown` is triggered; the cursor is left untouched in that case.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Read`] on store failure or when the guard expires.
    /// Nothing is retried here.
    pub async fn read<S: StreamStore>(
        &mut self,
        store: &mut S,
        shutdown: &ShutdownHandle,
    ) -> Result<ReadOutcome, TaskError> {
        if shutdown.is_triggered() {
            return Ok(ReadOutcome::Interrupted);
        }

        let block = (!self.block_wait.is_zero()).then_some(self.block_wait);
        let guard = self.block_wait + READ_GUARD;
        let entries = tokio::select! {
            biased;
            () = shutdown.triggered() => return Ok(ReadOutcome::Interrupted),
            result = tokio::time::timeout(
                guard,
                store.read_after(&self.stream_name, &self.cursor, self.batch_size, block),
            ) => match result {
                Ok(Ok(entries)) => entries,
                Ok(Err(source)) => {
                    return Err(TaskError::Read {
                        stream: self.stream_name.clone(),
                        source,
                    })
                }
                Err(_) => {
                    return Err(TaskError::Read {
                        stream: self.stream_name.clone(),
                        source: StoreError::Timeout(guard),
                    })
                }
            },
        };

        if let Some(last) = entries.last() {
            self.cursor.clone_from(&last.id);
        }
        Ok(ReadOutcome::Entries(entries))
    }

    /// Id of the last entry read, or the start offset.
    pub fn current_offset(&self) -> &str {
        &self.cursor
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    pub fn close(&mut self) {
        if !self.closed {
            tracing::debug!(stream = %self.stream_name, offset = %self.cursor, "Reader closed");
            self.closed = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
