//! Source task configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::TaskError;
use crate::mapper::STREAM_PLACEHOLDER;

/// Redis stream source config from pipeline YAML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "default_redis_uri")]
    pub redis_uri: String,
    /// Stream to read. Required.
    pub stream_name: String,
    /// Destination topic template; `${stream}` is replaced by the stream name.
    #[serde(default = "default_topic_name_format")]
    pub topic_name_format: String,
    /// Maximum entries per read.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum time a read waits for new entries. `0` means do not wait.
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
    /// Start offset used when no checkpoint has been persisted. `$` reads
    /// only entries appended after the first read.
    #[serde(default = "default_stream_offset")]
    pub stream_offset: String,
}

fn default_redis_uri() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_topic_name_format() -> String {
    STREAM_PLACEHOLDER.to_string()
}

fn default_batch_size() -> usize {
    50
}

fn default_block_ms() -> u64 {
    100
}

fn default_stream_offset() -> String {
    "$".to_string()
}

impl Config {
    /// Config with defaults for everything but the stream name.
    pub fn for_stream(stream_name: impl Into<String>) -> Self {
        Self {
            redis_uri: default_redis_uri(),
            stream_name: stream_name.into(),
            topic_name_format: default_topic_name_format(),
            batch_size: default_batch_size(),
            block_ms: default_block_ms(),
            stream_offset: default_stream_offset(),
        }
    }

    pub fn validate(&self) -> Result<(), TaskError> {
        if self.stream_name.is_empty() {
            return Err(TaskError::InvalidConfig(
                "stream_name must not be empty".to_string(),
            ));
        }
        if self.redis_uri.is_empty() {
            return Err(TaskError::InvalidConfig(
                "redis_uri must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(TaskError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.stream_offset.is_empty() {
            return Err(TaskError::InvalidConfig(
                "stream_offset must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn block_wait(&self) -> Duration {
        Duration::from_millis(self.block_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_stream_is_given() {
        let config: Config =
            serde_json::from_value(serde_json::json!({"stream_name": "orders"})).unwrap();
        assert_eq!(config, Config::for_stream("orders"));
        assert_eq!(config.topic_name_format, "${stream}");
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.block_wait(), Duration::from_millis(100));
        assert_eq!(config.stream_offset, "$");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn stream_name_is_required() {
        let result: Result<Config, _> = serde_json::from_value(serde_json::json!({}));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("stream_name"), "got: {err}");
    }

    #[test]
    fn empty_stream_name_is_rejected() {
        let config = Config::for_stream("");
        assert!(matches!(config.validate(), Err(TaskError::InvalidConfig(_))));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut config = Config::for_stream("orders");
        config.batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn zero_block_is_allowed() {
        let mut config = Config::for_stream("orders");
        config.block_ms = 0;
        assert!(config.validate().is_ok());
        assert!(config.block_wait().is_zero());
    }
}
