//! Source task error taxonomy and its mapping onto [`ConnectorError`].

use streamtap_types::ConnectorError;

use crate::client::StoreError;
use crate::task::TaskState;

/// Errors raised by the task lifecycle.
///
/// `Connection`, `ConfigType`, `InvalidConfig` and `OffsetLookup` are fatal
/// to `start`. `Read` is raised per poll cycle and left to the host to retry;
/// it also fails `start` when a `$` offset cannot be resolved.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("store connection failed: {0}")]
    Connection(#[source] StoreError),

    #[error("recovered offset for stream '{stream}' must be a string, found {found}")]
    ConfigType { stream: String, found: &'static str },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("read from stream '{stream}' failed: {source}")]
    Read {
        stream: String,
        #[source]
        source: StoreError,
    },

    #[error("offset lookup failed: {0}")]
    OffsetLookup(#[source] ConnectorError),

    #[error("poll requires a running task (state: {0})")]
    NotRunning(TaskState),

    #[error("task already started (state: {0})")]
    AlreadyStarted(TaskState),
}

impl From<TaskError> for ConnectorError {
    fn from(err: TaskError) -> Self {
        let message = err.to_string();
        match err {
            TaskError::Connection(_) => {
                ConnectorError::transient_network("CONNECTION_FAILED", message)
            }
            TaskError::ConfigType { stream, .. } => {
                ConnectorError::config("OFFSET_TYPE_MISMATCH", message)
                    .with_details(serde_json::json!({ "stream": stream }))
            }
            TaskError::InvalidConfig(_) => ConnectorError::config("INVALID_CONFIG", message),
            TaskError::Read { stream, source } => {
                ConnectorError::transient_network("READ_FAILED", message)
                    .with_backoff(source.backoff_class())
                    .with_details(serde_json::json!({ "stream": stream }))
            }
            TaskError::OffsetLookup(_) => {
                ConnectorError::internal("OFFSET_LOOKUP_FAILED", message)
            }
            TaskError::NotRunning(_) | TaskError::AlreadyStarted(_) => {
                ConnectorError::internal("INVALID_LIFECYCLE", message)
            }
        }
    }
}
