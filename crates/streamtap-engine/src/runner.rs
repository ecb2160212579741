//! Poll loop driving a single source task.
//!
//! One run is `start` → repeated `poll` → `stop`. Delivered batches are
//! written to the sink before their offsets are committed, so a crash in
//! between redelivers the batch on restart (at-least-once).

use std::time::{Duration, Instant};

use anyhow::Context;
use streamtap_state::OffsetBackend;
use streamtap_types::state::TaskId;
use streamtap_types::{ConnectorError, PollOutcome, ShutdownHandle, SourceTask};

use crate::checkpoint::{commit_batch_offsets, StateOffsetReader};
use crate::config::types::{PipelineConfig, PollConfig};
use crate::errors::{compute_backoff, EngineError};
use crate::sink::RecordSink;

/// Counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub polls: u64,
    pub idle_polls: u64,
    pub records_delivered: u64,
    pub offsets_committed: u64,
    pub retry_count: u32,
    pub duration_secs: f64,
}

/// Exponential delay applied after consecutive idle polls.
#[derive(Debug, Clone)]
pub struct IdleBackoff {
    base: Duration,
    max: Duration,
    next: Duration,
}

impl IdleBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            next: base,
        }
    }

    pub fn from_config(config: &PollConfig) -> Self {
        Self::new(config.idle_backoff(), config.max_idle_backoff())
    }

    /// Delay for this idle poll; doubles the following one up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = self.next.saturating_mul(2).min(self.max);
        delay
    }

    /// Back to the base delay once data flows again.
    pub fn reset(&mut self) {
        self.next = self.base;
    }
}

/// Run `task` until it is interrupted through its shutdown handle or fails.
///
/// Retryable poll errors are retried up to `config.poll.max_retries`
/// consecutive times with [`compute_backoff`] delays. `stop` is always
/// called before returning, including when `start` fails.
///
/// # Errors
///
/// Returns [`EngineError::Connector`] when `start` fails or a poll error is
/// not retryable or exhausts its retries, and [`EngineError::Infrastructure`]
/// when config decoding, the sink, or the offset store fails.
pub async fn run_task<T: SourceTask>(
    task: &mut T,
    config: &PipelineConfig,
    state: &dyn OffsetBackend,
    sink: &mut dyn RecordSink,
) -> Result<RunSummary, EngineError> {
    let started = Instant::now();
    let task_id = TaskId::new(config.pipeline.clone());
    let shutdown = task.shutdown_handle();

    let task_config: T::Config = match serde_json::from_value(config.source.clone()) {
        Ok(c) => c,
        Err(e) => {
            task.stop().await;
            return Err(EngineError::Connector(ConnectorError::config(
                "INVALID_CONFIG",
                format!("invalid {} config: {e}", T::NAME),
            )));
        }
    };

    tracing::info!(pipeline = config.pipeline, connector = T::NAME, "Starting source task");
    let start_result = task
        .start(task_config, &StateOffsetReader::new(state, &task_id))
        .await;
    if let Err(err) = start_result {
        tracing::error!(
            pipeline = config.pipeline,
            category = %err.category,
            code = %err.code,
            "Source task failed to start"
        );
        task.stop().await;
        return Err(EngineError::Connector(err));
    }

    let mut summary = RunSummary::default();
    let result = poll_loop(task, config, &task_id, state, sink, &shutdown, &mut summary).await;
    task.stop().await;
    summary.duration_secs = started.elapsed().as_secs_f64();

    result?;

    tracing::info!(
        pipeline = config.pipeline,
        polls = summary.polls,
        records = summary.records_delivered,
        retries = summary.retry_count,
        "Source task finished"
    );
    Ok(summary)
}

async fn poll_loop<T: SourceTask>(
    task: &mut T,
    config: &PipelineConfig,
    task_id: &TaskId,
    state: &dyn OffsetBackend,
    sink: &mut dyn RecordSink,
    shutdown: &ShutdownHandle,
    summary: &mut RunSummary,
) -> Result<(), EngineError> {
    let max_retries = config.poll.max_retries;
    let mut idle = IdleBackoff::from_config(&config.poll);
    let mut attempt = 0u32;

    while !shutdown.is_triggered() {
        summary.polls += 1;
        match task.poll().await {
            Ok(PollOutcome::Records(records)) => {
                attempt = 0;
                idle.reset();
                sink.write_batch(&records).context("Failed to deliver batch")?;
                summary.records_delivered += records.len() as u64;
                summary.offsets_committed += commit_batch_offsets(state, task_id, &records)?;
            }
            Ok(PollOutcome::Idle) => {
                attempt = 0;
                summary.idle_polls += 1;
                let delay = idle.next_delay();
                tracing::trace!(delay_ms = delay_millis(delay), "Idle poll, backing off");
                if !sleep_unless_shutdown(delay, shutdown).await {
                    break;
                }
            }
            Ok(PollOutcome::Interrupted) => break,
            Err(err) if err.retryable && attempt < max_retries => {
                attempt += 1;
                summary.retry_count += 1;
                let delay = compute_backoff(&err, attempt);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms = delay_millis(delay),
                    category = %err.category,
                    code = %err.code,
                    "Retryable poll error, will retry"
                );
                if !sleep_unless_shutdown(delay, shutdown).await {
                    break;
                }
            }
            Err(err) => {
                if err.retryable {
                    tracing::error!(
                        attempt,
                        max_retries,
                        category = %err.category,
                        code = %err.code,
                        "Max retries exhausted, failing task"
                    );
                } else {
                    tracing::error!(
                        category = %err.category,
                        code = %err.code,
                        "Non-retryable poll error, failing task"
                    );
                }
                return Err(EngineError::Connector(err));
            }
        }
    }
    Ok(())
}

/// Returns `false` if shutdown fired before `delay` elapsed.
async fn sleep_unless_shutdown(delay: Duration, shutdown: &ShutdownHandle) -> bool {
    tokio::select! {
        biased;
        () = shutdown.triggered() => false,
        () = tokio::time::sleep(delay) => true,
    }
}

fn delay_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_backoff_doubles_to_cap() {
        let mut backoff = IdleBackoff::new(Duration::from_millis(100), Duration::from_millis(500));
        let delays: Vec<u128> = (0..5).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
    }

    #[test]
    fn test_idle_backoff_reset() {
        let mut backoff = IdleBackoff::new(Duration::from_millis(100), Duration::from_secs(5));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_idle_backoff_cap_below_base_uses_base() {
        let mut backoff = IdleBackoff::new(Duration::from_millis(300), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(300));
        assert_eq!(backoff.next_delay(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_cut_short_by_shutdown() {
        let shutdown = ShutdownHandle::new();
        let remote = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remote.trigger();
        });
        assert!(!sleep_unless_shutdown(Duration::from_secs(60), &shutdown).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_shutdown() {
        let shutdown = ShutdownHandle::new();
        assert!(sleep_unless_shutdown(Duration::from_millis(10), &shutdown).await);
    }
}
