//! Offset lookup for task start and offset commit after delivery.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use streamtap_state::OffsetBackend;
use streamtap_types::offset::{OffsetReader, SourceOffset, SourcePartition};
use streamtap_types::state::TaskId;
use streamtap_types::{ConnectorError, OutputRecord};

/// [`OffsetReader`] over the host's offset backend, scoped to one task.
pub struct StateOffsetReader<'a> {
    backend: &'a dyn OffsetBackend,
    task: &'a TaskId,
}

impl<'a> StateOffsetReader<'a> {
    pub fn new(backend: &'a dyn OffsetBackend, task: &'a TaskId) -> Self {
        Self { backend, task }
    }
}

impl OffsetReader for StateOffsetReader<'_> {
    fn offset(&self, partition: &SourcePartition) -> Result<Option<SourceOffset>, ConnectorError> {
        self.backend
            .get_offset(self.task, partition)
            .map(|stored| stored.map(|s| s.offset))
            .map_err(|e| ConnectorError::internal("STATE_READ_FAILED", e.to_string()))
    }
}

/// Persist the resume position of the last record per partition in a
/// delivered batch. Returns the number of offsets written.
///
/// Must only be called once the batch has been handed to the sink.
pub(crate) fn commit_batch_offsets(
    backend: &dyn OffsetBackend,
    task: &TaskId,
    records: &[OutputRecord],
) -> Result<u64> {
    let mut last_per_partition = BTreeMap::new();
    for record in records {
        last_per_partition.insert(record.resume_position.partition(), &record.resume_position);
    }

    let mut committed = 0u64;
    for (partition, position) in last_per_partition {
        backend
            .set_offset(task, &partition, &position.offset())
            .with_context(|| {
                format!(
                    "Failed to commit offset {} for stream '{}'",
                    position.offset_token, partition.stream
                )
            })?;
        tracing::debug!(
            task = task.as_str(),
            stream = partition.stream,
            offset = position.offset_token,
            "Offset committed"
        );
        committed += 1;
    }
    Ok(committed)
}
