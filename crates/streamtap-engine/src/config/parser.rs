//! Pipeline YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::types::PipelineConfig;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Placeholder names resolved by connectors at runtime, never from the
/// environment.
const RESERVED_PLACEHOLDERS: &[&str] = &["stream"];

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// Reserved placeholders such as `${stream}` are left untouched.
///
/// # Errors
///
/// Returns an error naming every referenced environment variable that is
/// not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut missing = Vec::new();

    let result = ENV_VAR_RE.replace_all(input, |cap: &regex::Captures<'_>| {
        let var_name = &cap[1];
        if RESERVED_PLACEHOLDERS.contains(&var_name) {
            return cap[0].to_string();
        }
        std::env::var(var_name).unwrap_or_else(|_| {
            if !missing.iter().any(|m| m == var_name) {
                missing.push(var_name.to_string());
            }
            String::new()
        })
    });

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result.into_owned())
}

/// Parse a pipeline YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_pipeline_str(yaml_str: &str) -> Result<PipelineConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    let config: PipelineConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse pipeline YAML")?;
    Ok(config)
}

/// Parse a pipeline YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_pipeline(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline file: {}", path.display()))?;
    parse_pipeline_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::SinkConfig;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("ST_TEST_HOST", "cache.example.com");
        let input = "redis_uri: redis://${ST_TEST_HOST}:6379";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "redis_uri: redis://cache.example.com:6379");
        std::env::remove_var("ST_TEST_HOST");
    }

    #[test]
    fn test_stream_placeholder_left_verbatim() {
        let input = "topic_name_format: \"events.${stream}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_no_env_vars_passthrough() {
        let input = "stream_name: orders\nbatch_size: 50";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_multiple_missing_env_vars_all_reported_once() {
        let input = "${ST_MISSING_X} and ${ST_MISSING_Y} and ${ST_MISSING_X}";
        let err_msg = substitute_env_vars(input).unwrap_err().to_string();
        assert_eq!(
            err_msg,
            "Missing environment variable(s): ST_MISSING_X, ST_MISSING_Y"
        );
    }

    #[test]
    fn test_substituted_value_is_not_rescanned() {
        std::env::set_var("ST_TEST_LITERAL", "${ST_NOT_SET_ANYWHERE}");
        let result = substitute_env_vars("x: ${ST_TEST_LITERAL}").unwrap();
        assert_eq!(result, "x: ${ST_NOT_SET_ANYWHERE}");
        std::env::remove_var("ST_TEST_LITERAL");
    }

    #[test]
    fn test_parse_pipeline_from_string() {
        std::env::set_var("ST_TEST_REDIS_URI", "redis://10.0.0.5:6379");
        let yaml = r#"
pipeline: orders-ingest
source:
  redis_uri: ${ST_TEST_REDIS_URI}
  stream_name: orders
  topic_name_format: "events.${stream}"
sink:
  kind: stdout
"#;
        let config = parse_pipeline_str(yaml).unwrap();
        assert_eq!(config.source["redis_uri"], "redis://10.0.0.5:6379");
        assert_eq!(config.source["topic_name_format"], "events.${stream}");
        assert_eq!(config.sink, SinkConfig::Stdout);
        std::env::remove_var("ST_TEST_REDIS_URI");
    }

    #[test]
    fn test_parse_invalid_yaml_errors() {
        let yaml = "this is not: [valid: yaml: {{{}}}";
        assert!(parse_pipeline_str(yaml).is_err());
    }

    #[test]
    fn test_parse_pipeline_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        std::fs::write(&path, "pipeline: p\nsource:\n  stream_name: orders\n").unwrap();
        let config = parse_pipeline(&path).unwrap();
        assert_eq!(config.pipeline, "p");
    }

    #[test]
    fn test_parse_pipeline_file_not_found() {
        let result = parse_pipeline(Path::new("/nonexistent/pipeline.yaml"));
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("Failed to read pipeline file"));
    }
}
