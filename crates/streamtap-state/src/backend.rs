//! Offset backend trait definition.
//!
//! [`OffsetBackend`] is the storage contract behind the host's checkpoint
//! read and write paths. Model types live in [`streamtap_types::offset`]
//! and [`streamtap_types::state`].

use streamtap_types::offset::{SourceOffset, SourcePartition};
use streamtap_types::state::{StoredOffset, TaskId};

use crate::error;

/// Storage contract for source offsets.
///
/// The engine borrows a backend as `&dyn OffsetBackend` for a whole run,
/// across await points; implementations must be `Send + Sync`.
pub trait OffsetBackend: Send + Sync {
    /// Read the offset persisted for a (task, partition) pair.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn get_offset(
        &self,
        task: &TaskId,
        partition: &SourcePartition,
    ) -> error::Result<Option<StoredOffset>>;

    /// Upsert the offset for a (task, partition) pair.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn set_offset(
        &self,
        task: &TaskId,
        partition: &SourcePartition,
        offset: &SourceOffset,
    ) -> error::Result<()>;

    /// All offsets persisted for a task, ordered by partition.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn list_offsets(&self, task: &TaskId) -> error::Result<Vec<StoredOffset>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the trait is object-safe (can be used as `dyn OffsetBackend`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn OffsetBackend) {}
    }

    #[test]
    fn borrowed_backend_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<&dyn OffsetBackend>();
        assert_send::<&crate::SqliteOffsetBackend>();
    }
}
