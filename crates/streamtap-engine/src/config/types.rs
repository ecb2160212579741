use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level pipeline YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Task id. Persisted offsets are scoped by this name.
    pub pipeline: String,
    /// Connector config, deserialized by the task into its own config type.
    pub source: serde_json::Value,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// SQLite database file holding committed offsets.
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("streamtap.db")
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

/// Where delivered records go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// JSON lines on standard output.
    #[default]
    Stdout,
    /// JSON lines appended to a file.
    File { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// First delay after an idle poll; doubles per consecutive idle poll.
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
    #[serde(default = "default_max_idle_backoff_ms")]
    pub max_idle_backoff_ms: u64,
    /// Consecutive retryable poll failures tolerated before the run fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_idle_backoff_ms() -> u64 {
    100
}
fn default_max_idle_backoff_ms() -> u64 {
    5_000
}
fn default_max_retries() -> u32 {
    3
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            idle_backoff_ms: default_idle_backoff_ms(),
            max_idle_backoff_ms: default_max_idle_backoff_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl PollConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn max_idle_backoff(&self) -> Duration {
        Duration::from_millis(self.max_idle_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_pipeline() {
        let yaml = r#"
pipeline: orders-ingest
source:
  stream_name: orders
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pipeline, "orders-ingest");
        assert_eq!(config.source["stream_name"], "orders");
        assert_eq!(config.state.path, PathBuf::from("streamtap.db"));
        assert_eq!(config.sink, SinkConfig::Stdout);
        assert_eq!(config.poll, PollConfig::default());
    }

    #[test]
    fn test_deserialize_full_pipeline() {
        let yaml = r#"
pipeline: orders-ingest
source:
  redis_uri: redis://localhost:6379
  stream_name: orders
  topic_name_format: "events.${stream}"
  batch_size: 10
state:
  path: /var/lib/streamtap/state.db
sink:
  kind: file
  path: /tmp/orders.jsonl
poll:
  idle_backoff_ms: 50
  max_idle_backoff_ms: 1000
  max_retries: 5
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.source["batch_size"], 10);
        assert_eq!(config.source["topic_name_format"], "events.${stream}");
        assert_eq!(
            config.sink,
            SinkConfig::File {
                path: PathBuf::from("/tmp/orders.jsonl")
            }
        );
        assert_eq!(config.poll.idle_backoff(), Duration::from_millis(50));
        assert_eq!(config.poll.max_idle_backoff(), Duration::from_secs(1));
        assert_eq!(config.poll.max_retries, 5);
    }

    #[test]
    fn test_unknown_sink_kind_rejected() {
        let yaml = r"
pipeline: p
source: {}
sink:
  kind: kafka
";
        assert!(serde_yaml::from_str::<PipelineConfig>(yaml).is_err());
    }

    #[test]
    fn test_file_sink_requires_path() {
        let yaml = r"
pipeline: p
source: {}
sink:
  kind: file
";
        assert!(serde_yaml::from_str::<PipelineConfig>(yaml).is_err());
    }
}
