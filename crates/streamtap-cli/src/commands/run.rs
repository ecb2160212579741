use std::path::Path;

use anyhow::{Context, Result};
use source_redis_streams::RedisStreamSource;
use streamtap_engine::config::{parser, validator};
use streamtap_engine::{open_sink, run_task};
use streamtap_state::SqliteOffsetBackend;

/// Execute the `run` command: parse, validate, and run a pipeline until
/// Ctrl-C or a fatal error.
pub async fn execute(pipeline_path: &Path) -> Result<()> {
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;
    validator::validate_pipeline(&config)?;

    let state = SqliteOffsetBackend::open(&config.state.path).with_context(|| {
        format!("Failed to open state database: {}", config.state.path.display())
    })?;
    let mut sink = open_sink(&config.sink)?;

    tracing::info!(
        pipeline = config.pipeline,
        state = %config.state.path.display(),
        "Pipeline validated"
    );

    let mut task: RedisStreamSource = RedisStreamSource::new();
    let shutdown = task.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            shutdown.trigger();
        }
    });

    let summary = run_task(&mut task, &config, &state, sink.as_mut()).await?;

    eprintln!("Pipeline '{}' stopped.", config.pipeline);
    eprintln!("  Polls:             {}", summary.polls);
    eprintln!("  Idle polls:        {}", summary.idle_polls);
    eprintln!("  Records delivered: {}", summary.records_delivered);
    eprintln!("  Offsets committed: {}", summary.offsets_committed);
    if summary.retry_count > 0 {
        eprintln!("  Retries:           {}", summary.retry_count);
    }
    eprintln!("  Duration:          {:.2}s", summary.duration_secs);
    Ok(())
}
