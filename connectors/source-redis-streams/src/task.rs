//! Task lifecycle: `start` → repeated `poll` → `stop`.

use std::fmt;
use std::future::Future;

use streamtap_types::{
    ConnectorError, OffsetReader, PollOutcome, ShutdownHandle, SourcePartition, SourceTask,
};

use crate::client::{ConnectionManager, RedisStore, StreamStore};
use crate::config::Config;
use crate::error::TaskError;
use crate::mapper;
use crate::reader::{ReadOutcome, StreamCursorReader};

/// Lifecycle state imposed by the host's call pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Uninitialized,
    Running,
    Stopped,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Source task reading one Redis stream.
///
/// # Lifecycle
///
/// 1. Create with [`RedisStreamSource::new`]
/// 2. Call `start()` to resolve the start offset and connect
/// 3. Call `poll()` in a loop; it never runs concurrently with itself
/// 4. Call `stop()` for shutdown. Trigger [`shutdown_handle`](Self::shutdown_handle)
///    from another task to cut an in-flight `poll()` short first.
pub struct RedisStreamSource<S = RedisStore> {
    state: TaskState,
    config: Option<Config>,
    connection: ConnectionManager<S>,
    reader: Option<StreamCursorReader>,
    shutdown: ShutdownHandle,
}

impl<S: StreamStore> RedisStreamSource<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: TaskState::Uninitialized,
            config: None,
            connection: ConnectionManager::disconnected(),
            reader: None,
            shutdown: ShutdownHandle::new(),
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Cursor of the running reader, for diagnostics.
    pub fn current_offset(&self) -> Option<&str> {
        self.reader.as_ref().map(StreamCursorReader::current_offset)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Start with a caller-supplied connection step.
    ///
    /// The checkpoint is looked up and validated before `connect` runs. Once
    /// connected, a `$` start offset is pinned to the stream's last id; if
    /// that fails the connection is closed again. On any error the task
    /// stays `Uninitialized`.
    ///
    /// # Errors
    ///
    /// [`TaskError::AlreadyStarted`] outside `Uninitialized`,
    /// [`TaskError::InvalidConfig`], [`TaskError::OffsetLookup`],
    /// [`TaskError::ConfigType`] for a mistyped checkpoint, whatever
    /// `connect` returns, or [`TaskError::Read`] when resolving `$` fails.
    pub async fn start_with<F, Fut>(
        &mut self,
        config: Config,
        offsets: &dyn OffsetReader,
        connect: F,
    ) -> Result<(), TaskError>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<ConnectionManager<S>, TaskError>>,
    {
        if self.state != TaskState::Uninitialized {
            return Err(TaskError::AlreadyStarted(self.state));
        }
        config.validate()?;

        let partition = SourcePartition::new(config.stream_name.clone());
        let recovered = offsets
            .offset(&partition)
            .map_err(TaskError::OffsetLookup)?;
        let mut reader = StreamCursorReader::initialize(
            &config.stream_name,
            config.batch_size,
            config.block_wait(),
            &config.stream_offset,
            recovered.as_ref(),
        )?;

        let mut connection = connect(config.redis_uri.clone()).await?;
        if let Some(store) = connection.store_mut() {
            if let Err(e) = reader.resolve_start(store).await {
                connection.close().await;
                return Err(e);
            }
        }
        self.connection = connection;

        tracing::info!(
            stream = %config.stream_name,
            offset = %reader.current_offset(),
            batch_size = config.batch_size,
            block_ms = config.block_ms,
            "Source task started"
        );
        self.reader = Some(reader);
        self.config = Some(config);
        self.state = TaskState::Running;
        Ok(())
    }

    /// Run one read and map its entries.
    ///
    /// # Errors
    ///
    /// [`TaskError::NotRunning`] outside `Running`; [`TaskError::Read`] when
    /// the store read fails.
    pub async fn poll(&mut self) -> Result<PollOutcome, TaskError> {
        if self.state != TaskState::Running {
            return Err(TaskError::NotRunning(self.state));
        }
        let (Some(config), Some(reader), Some(store)) = (
            self.config.as_ref(),
            self.reader.as_mut(),
            self.connection.store_mut(),
        ) else {
            return Err(TaskError::NotRunning(self.state));
        };

        tracing::debug!(
            stream = %reader.stream_name(),
            offset = %reader.current_offset(),
            "Reading from stream"
        );
        let entries = match reader.read(store, &self.shutdown).await? {
            ReadOutcome::Entries(entries) => entries,
            ReadOutcome::Interrupted => {
                tracing::debug!(stream = %reader.stream_name(), "Read interrupted by shutdown");
                return Ok(PollOutcome::Interrupted);
            }
        };

        let outcome = mapper::map_batch(
            &config.stream_name,
            entries,
            &config.topic_name_format,
            chrono::Utc::now().timestamp(),
        );
        if let PollOutcome::Records(records) = &outcome {
            tracing::info!(
                stream = %config.stream_name,
                count = records.len(),
                offset = %reader.current_offset(),
                "Returning source records"
            );
        }
        Ok(outcome)
    }

    /// Stop the task. Safe before `start`, during an interrupted `poll`, and
    /// when repeated.
    pub async fn stop(&mut self) {
        self.shutdown.trigger();
        if let Some(reader) = self.reader.as_mut() {
            reader.close();
        }
        self.connection.close().await;
        if self.state != TaskState::Stopped {
            tracing::info!(
                previous_state = %self.state,
                offset = self.current_offset(),
                "Source task stopped"
            );
            self.state = TaskState::Stopped;
        }
    }
}

impl RedisStreamSource<RedisStore> {
    /// Start against the Redis server named by `config.redis_uri`.
    ///
    /// # Errors
    ///
    /// See [`start_with`](Self::start_with); connection failures surface as
    /// [`TaskError::Connection`].
    pub async fn start(
        &mut self,
        config: Config,
        offsets: &dyn OffsetReader,
    ) -> Result<(), TaskError> {
        self.start_with(config, offsets, |uri| async move {
            ConnectionManager::open(&uri).await
        })
        .await
    }
}

impl<S: StreamStore> Default for RedisStreamSource<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceTask for RedisStreamSource<RedisStore> {
    type Config = Config;

    const NAME: &'static str = "source-redis-streams";

    async fn start(
        &mut self,
        config: Self::Config,
        offsets: &dyn OffsetReader,
    ) -> Result<(), ConnectorError> {
        RedisStreamSource::start(self, config, offsets)
            .await
            .map_err(ConnectorError::from)
    }

    async fn poll(&mut self) -> Result<PollOutcome, ConnectorError> {
        RedisStreamSource::poll(self).await.map_err(ConnectorError::from)
    }

    async fn stop(&mut self) {
        RedisStreamSource::stop(self).await;
    }

    fn shutdown_handle(&self) -> ShutdownHandle {
        RedisStreamSource::shutdown_handle(self)
    }
}
