//! Source task lifecycle driven by the host.

use serde::de::DeserializeOwned;

use crate::error::ConnectorError;
use crate::offset::OffsetReader;
use crate::record::PollOutcome;
use crate::shutdown::ShutdownHandle;

/// A task the host drives as `start` → repeated `poll` → `stop`.
///
/// The host never calls `poll` concurrently with itself for one instance.
/// `stop` may be called at any point, including before `start` succeeded,
/// and must not fail.
#[allow(async_fn_in_trait)]
pub trait SourceTask {
    type Config: DeserializeOwned;

    /// Connector identifier used in logs.
    const NAME: &'static str;

    async fn start(
        &mut self,
        config: Self::Config,
        offsets: &dyn OffsetReader,
    ) -> Result<(), ConnectorError>;

    async fn poll(&mut self) -> Result<PollOutcome, ConnectorError>;

    async fn stop(&mut self);

    /// Handle that interrupts an in-flight `poll` from another task.
    fn shutdown_handle(&self) -> ShutdownHandle;
}
