//! Semantic validation for parsed pipeline configuration values.
//!
//! Connector-specific settings under `source` are validated by the task
//! itself at start; only host-side settings are checked here.

use anyhow::{bail, Result};

use crate::config::types::{PipelineConfig, SinkConfig};

/// Validate a parsed pipeline configuration.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the pipeline config.
pub fn validate_pipeline(config: &PipelineConfig) -> Result<()> {
    let mut errors = Vec::new();

    if config.pipeline.trim().is_empty() {
        errors.push("Pipeline name must not be empty".to_string());
    }

    if !config.source.is_object() {
        errors.push("Source config must be a mapping".to_string());
    }

    if config.state.path.as_os_str().is_empty() {
        errors.push("state.path must not be empty".to_string());
    }

    if let SinkConfig::File { path } = &config.sink {
        if path.as_os_str().is_empty() {
            errors.push("sink.path must not be empty for a file sink".to_string());
        }
    }

    if config.poll.idle_backoff_ms == 0 {
        errors.push("poll.idle_backoff_ms must be > 0".to_string());
    }
    if config.poll.max_idle_backoff_ms < config.poll.idle_backoff_ms {
        errors.push(format!(
            "poll.max_idle_backoff_ms ({}) must be >= poll.idle_backoff_ms ({})",
            config.poll.max_idle_backoff_ms, config.poll.idle_backoff_ms
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Pipeline validation failed:\n  - {}", errors.join("\n  - "))
    }
}
