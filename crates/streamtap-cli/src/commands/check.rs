use std::path::Path;

use anyhow::{Context, Result};
use source_redis_streams::client::ConnectionManager;
use source_redis_streams::Config;
use streamtap_engine::config::{parser, validator};
use streamtap_state::SqliteOffsetBackend;

/// Execute the `check` command: validate pipeline config, source config,
/// state database, and store connectivity.
pub async fn execute(pipeline_path: &Path) -> Result<()> {
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;

    validator::validate_pipeline(&config)?;
    println!("Pipeline structure: OK");

    let source: Config =
        serde_json::from_value(config.source.clone()).context("Invalid source config")?;
    source.validate()?;
    println!("Source config:      OK");

    let state_ok = match SqliteOffsetBackend::open(&config.state.path) {
        Ok(_) => {
            println!("State database:     OK");
            true
        }
        Err(e) => {
            println!("State database:     FAILED");
            println!("  {e}");
            false
        }
    };

    let store_ok = match ConnectionManager::open(&source.redis_uri).await {
        Ok(mut connection) => {
            connection.close().await;
            println!("Redis connection:   OK");
            true
        }
        Err(e) => {
            println!("Redis connection:   FAILED");
            println!("  {e}");
            false
        }
    };

    if state_ok && store_ok {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("One or more checks failed")
    }
}
