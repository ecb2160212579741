//! Scripted in-memory store for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use redis::{ErrorKind, RedisError};
use streamtap_types::StreamEntry;

use crate::client::{StoreError, StreamStore, LATEST_OFFSET};

/// One scripted reply to `read_after`.
pub enum Step {
    Entries(Vec<StreamEntry>),
    Fail(&'static str),
    /// Fails with a specific driver error kind.
    FailWith(ErrorKind, &'static str),
    /// Never replies.
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCall {
    pub stream: String,
    pub after: String,
    pub count: usize,
    pub block: Option<Duration>,
}

/// Shared view of what a [`ScriptedStore`] observed, usable after the store
/// has been moved into a task.
#[derive(Clone, Default)]
pub struct StoreLog {
    calls: Arc<Mutex<Vec<ReadCall>>>,
    resolved: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}

impl StoreLog {
    pub fn calls(&self) -> Vec<ReadCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn afters(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.after).collect()
    }

    /// Offsets passed to `resolve_offset`, in call order.
    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn drop_count(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

/// Replays scripted steps. Behaves like Redis for the `$` id: a read after
/// `$` only sees entries appended while it waits, so whatever step was
/// scripted for it is dropped.
pub struct ScriptedStore {
    steps: VecDeque<Step>,
    log: StoreLog,
    last_id: Option<String>,
    fail_on_close: bool,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            steps: VecDeque::new(),
            log: StoreLog::default(),
            last_id: None,
            fail_on_close: false,
        }
    }

    pub fn then(mut self, step: Step) -> Self {
        self.steps.push_back(step);
        self
    }

    pub fn then_entries(self, ids: &[&str]) -> Self {
        self.then(Step::Entries(ids.iter().map(|id| entry(id)).collect()))
    }

    /// Id of the newest entry already in the stream when the task starts.
    pub fn with_last_id(mut self, id: &str) -> Self {
        self.last_id = Some(id.to_string());
        self
    }

    pub fn fail_on_close(mut self) -> Self {
        self.fail_on_close = true;
        self
    }

    pub fn log(&self) -> StoreLog {
        self.log.clone()
    }
}

impl StreamStore for ScriptedStore {
    async fn resolve_offset(&mut self, _stream: &str, offset: &str) -> Result<String, StoreError> {
        self.log.resolved.lock().unwrap().push(offset.to_string());
        if offset != LATEST_OFFSET {
            return Ok(offset.to_string());
        }
        Ok(self.last_id.clone().unwrap_or_else(|| "0-0".to_string()))
    }

    async fn read_after(
        &mut self,
        stream: &str,
        after: &str,
        count: usize,
        block: Option<Duration>,
    ) -> Result<Vec<StreamEntry>, StoreError> {
        self.log.calls.lock().unwrap().push(ReadCall {
            stream: stream.to_string(),
            after: after.to_string(),
            count,
            block,
        });
        match self.steps.pop_front() {
            Some(Step::Entries(_)) if after == LATEST_OFFSET => Ok(Vec::new()),
            Some(Step::Entries(mut entries)) => {
                entries.truncate(count);
                Ok(entries)
            }
            Some(Step::Fail(message)) => Err(io_error(message)),
            Some(Step::FailWith(kind, message)) => Err(RedisError::from((kind, message)).into()),
            Some(Step::Hang) => std::future::pending().await,
            None => {
                if let Some(wait) = block {
                    tokio::time::sleep(wait).await;
                }
                Ok(Vec::new())
            }
        }
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_close {
            Err(io_error("socket already gone"))
        } else {
            Ok(())
        }
    }
}

impl Drop for ScriptedStore {
    fn drop(&mut self) {
        self.log.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Driver I/O failure, as raised for a dropped socket.
pub fn io_error(message: &'static str) -> StoreError {
    StoreError::Redis(RedisError::from((ErrorKind::IoError, message)))
}

/// Entry with a single `n` field echoing the id.
pub fn entry(id: &str) -> StreamEntry {
    StreamEntry::new(id, vec![("n".to_string(), id.to_string())])
}
