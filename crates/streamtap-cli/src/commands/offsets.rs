use std::path::Path;

use anyhow::{Context, Result};
use streamtap_engine::config::parser;
use streamtap_state::{OffsetBackend, SqliteOffsetBackend};
use streamtap_types::state::TaskId;

/// Execute the `offsets` command: print committed offsets as JSON lines.
pub fn execute(pipeline_path: &Path) -> Result<()> {
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;

    let state = SqliteOffsetBackend::open(&config.state.path).with_context(|| {
        format!("Failed to open state database: {}", config.state.path.display())
    })?;
    let offsets = state.list_offsets(&TaskId::new(config.pipeline.clone()))?;

    if offsets.is_empty() {
        eprintln!("No offsets committed for pipeline '{}'.", config.pipeline);
    }
    for stored in &offsets {
        println!("{}", serde_json::to_string(stored)?);
    }
    Ok(())
}
