//! Store connection lifecycle.
//!
//! [`ConnectionManager`] owns the single connection a task uses for its whole
//! lifetime. Reads go through the [`StreamStore`] trait so the reader does not
//! depend on the Redis driver directly.

use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::{Cmd, ErrorKind, RedisError, Value};
use streamtap_types::error::BackoffClass;
use streamtap_types::StreamEntry;

use crate::error::TaskError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stream id meaning "only entries appended from now on".
pub const LATEST_OFFSET: &str = "$";

/// Start id used for a `$` offset on an empty stream.
const EMPTY_STREAM_OFFSET: &str = "0-0";

/// Failures reported by a [`StreamStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("no reply from store within {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// How soon a retry is worth attempting.
    ///
    /// A server still loading its dataset answers `LOADING` for seconds to
    /// minutes; `TRYAGAIN` clears within milliseconds.
    pub fn backoff_class(&self) -> BackoffClass {
        match self {
            Self::Redis(e) => match e.kind() {
                ErrorKind::BusyLoadingError => BackoffClass::Slow,
                ErrorKind::TryAgain => BackoffClass::Fast,
                _ => BackoffClass::Normal,
            },
            Self::Timeout(_) => BackoffClass::Normal,
        }
    }
}

/// Range-read primitive over an append-only stream.
#[allow(async_fn_in_trait)]
pub trait StreamStore {
    /// Turn `offset` into a concrete entry id.
    ///
    /// [`LATEST_OFFSET`] resolves to the id of the newest entry, or `0-0`
    /// for an empty stream. Any other offset is returned unchanged.
    async fn resolve_offset(&mut self, stream: &str, offset: &str) -> Result<String, StoreError>;

    /// Read up to `count` entries with ids strictly greater than `after`,
    /// in ascending id order.
    ///
    /// With `block = Some(wait)` the call waits up to `wait` for entries to
    /// arrive; with `None` it returns immediately.
    async fn read_after(
        &mut self,
        stream: &str,
        after: &str,
        count: usize,
        block: Option<Duration>,
    ) -> Result<Vec<StreamEntry>, StoreError>;

    /// Shutdown handshake with the store. Called at most once, right before
    /// the store is dropped; dropping it is what releases the socket.
    async fn close(&mut self) -> Result<(), StoreError>;
}

/// [`StreamStore`] backed by a multiplexed Redis connection.
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    /// Parse `uri` and connect.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Redis`] for a malformed URI or refused
    /// connection and [`StoreError::Timeout`] if the handshake stalls.
    pub async fn open(uri: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(uri)?;
        let conn = tokio::time::timeout(
            CONNECT_TIMEOUT,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| StoreError::Timeout(CONNECT_TIMEOUT))??;
        Ok(Self { conn })
    }
}

impl StreamStore for RedisStore {
    async fn resolve_offset(&mut self, stream: &str, offset: &str) -> Result<String, StoreError> {
        if offset != LATEST_OFFSET {
            return Ok(offset.to_string());
        }
        let reply: Value = last_entry_cmd(stream).query_async(&mut self.conn).await?;
        Ok(decode_last_id(&reply)?.unwrap_or_else(|| EMPTY_STREAM_OFFSET.to_string()))
    }

    async fn read_after(
        &mut self,
        stream: &str,
        after: &str,
        count: usize,
        block: Option<Duration>,
    ) -> Result<Vec<StreamEntry>, StoreError> {
        let reply: Value = xread_cmd(stream, after, count, block)
            .query_async(&mut self.conn)
            .await?;
        decode_xread(&reply, stream)
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        // The multiplexed driver has no QUIT handshake.
        Ok(())
    }
}

/// `XREAD COUNT <count> [BLOCK <ms>] STREAMS <stream> <after>`.
///
/// `BLOCK 0` would wait forever, so a zero wait is sent without `BLOCK`.
pub(crate) fn xread_cmd(stream: &str, after: &str, count: usize, block: Option<Duration>) -> Cmd {
    let mut cmd = redis::cmd("XREAD");
    cmd.arg("COUNT").arg(count);
    if let Some(wait) = block.filter(|wait| !wait.is_zero()) {
        cmd.arg("BLOCK")
            .arg(u64::try_from(wait.as_millis()).unwrap_or(u64::MAX));
    }
    cmd.arg("STREAMS").arg(stream).arg(after);
    cmd
}

/// `XREVRANGE <stream> + - COUNT 1`: the newest entry, if any.
pub(crate) fn last_entry_cmd(stream: &str) -> Cmd {
    let mut cmd = redis::cmd("XREVRANGE");
    cmd.arg(stream).arg("+").arg("-").arg("COUNT").arg(1);
    cmd
}

/// Entries of `stream` from an `XREAD` reply. A nil reply (wait elapsed)
/// yields no entries; other streams in the reply are skipped.
pub(crate) fn decode_xread(reply: &Value, stream: &str) -> Result<Vec<StreamEntry>, StoreError> {
    let streams: Vec<(&Value, &Value)> = match reply {
        Value::Nil => return Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Array(pair) if pair.len() == 2 => Ok((&pair[0], &pair[1])),
                other => Err(unexpected("XREAD stream", other)),
            })
            .collect::<Result<_, _>>()?,
        // RESP3 servers answer with a map keyed by stream name.
        Value::Map(pairs) => pairs.iter().map(|(key, value)| (key, value)).collect(),
        other => return Err(unexpected("XREAD reply", other)),
    };

    let mut entries = Vec::new();
    for (key, items) in streams {
        if redis::from_redis_value::<String>(key)? != stream {
            continue;
        }
        let Value::Array(items) = items else {
            return Err(unexpected("XREAD entries", items));
        };
        for item in items {
            entries.push(decode_entry(item)?);
        }
    }
    Ok(entries)
}

/// Id of the first entry of an `XREVRANGE` reply.
pub(crate) fn decode_last_id(reply: &Value) -> Result<Option<String>, StoreError> {
    match reply {
        Value::Nil => Ok(None),
        Value::Array(items) => items
            .first()
            .map(|item| decode_entry(item).map(|entry| entry.id))
            .transpose(),
        other => Err(unexpected("XREVRANGE reply", other)),
    }
}

/// `[id, [field, value, ...]]`
fn decode_entry(item: &Value) -> Result<StreamEntry, StoreError> {
    let Value::Array(parts) = item else {
        return Err(unexpected("stream entry", item));
    };
    let [id, fields] = parts.as_slice() else {
        return Err(unexpected("stream entry", item));
    };
    let id: String = redis::from_redis_value(id)?;
    let fields = match fields {
        Value::Array(flat) if flat.len() % 2 == 0 => flat
            .chunks_exact(2)
            .map(|pair| {
                Ok((
                    redis::from_redis_value(&pair[0])?,
                    redis::from_redis_value(&pair[1])?,
                ))
            })
            .collect::<Result<Vec<(String, String)>, RedisError>>()?,
        Value::Map(pairs) => pairs
            .iter()
            .map(|(field, value)| {
                Ok((redis::from_redis_value(field)?, redis::from_redis_value(value)?))
            })
            .collect::<Result<Vec<(String, String)>, RedisError>>()?,
        other => return Err(unexpected("entry fields", other)),
    };
    Ok(StreamEntry::new(id, fields))
}

fn unexpected(what: &'static str, value: &Value) -> StoreError {
    StoreError::Redis(RedisError::from((
        ErrorKind::TypeError,
        "unexpected reply shape",
        format!("{what}: {value:?}"),
    )))
}

/// Owns the store connection for one task instance.
pub struct ConnectionManager<S> {
    store: Option<S>,
}

impl ConnectionManager<RedisStore> {
    /// Connect to the Redis server at `uri`. No retry: a failure here is
    /// fatal to task start.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Connection`] if the URI is malformed or the
    /// store is unreachable.
    pub async fn open(uri: &str) -> Result<Self, TaskError> {
        RedisStore::open(uri)
            .await
            .map(Self::from_store)
            .map_err(TaskError::Connection)
    }
}

impl<S: StreamStore> ConnectionManager<S> {
    /// A manager with nothing to close.
    pub fn disconnected() -> Self {
        Self { store: None }
    }

    pub fn from_store(store: S) -> Self {
        Self { store: Some(store) }
    }

    pub fn is_open(&self) -> bool {
        self.store.is_some()
    }

    pub fn store_mut(&mut self) -> Option<&mut S> {
        self.store.as_mut()
    }

    /// Close the connection and drop the store, releasing its socket. Safe
    /// to call when never opened or already closed; close failures are
    /// logged, never returned.
    pub async fn close(&mut self) {
        let Some(mut store) = self.store.take() else {
            return;
        };
        match store.close().await {
            Ok(()) => tracing::debug!("Store connection closed"),
            Err(e) => tracing::warn!(error = %e, "Error while closing store connection"),
        }
        drop(store);
    }
}

impl<S: StreamStore> Default for ConnectionManager<S> {
    fn default() -> Self {
        Self::disconnected()
    }
}
