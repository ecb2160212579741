//! Record delivery targets.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use streamtap_types::OutputRecord;

use crate::config::types::SinkConfig;

/// Downstream delivery for polled records.
///
/// `write_batch` returning `Ok` means the batch is delivered; the engine
/// commits offsets only after that.
pub trait RecordSink {
    /// # Errors
    ///
    /// Returns an error if any record of the batch could not be delivered.
    fn write_batch(&mut self, records: &[OutputRecord]) -> Result<()>;
}

/// Writes each record as one JSON object per line and flushes per batch.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Open `path` for appending, creating it and its parent directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn append(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create sink directory: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open sink file: {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write_batch(&mut self, records: &[OutputRecord]) -> Result<()> {
        for record in records {
            serde_json::to_writer(&mut self.writer, record)
                .context("Failed to serialize record")?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush().context("Failed to flush sink")?;
        Ok(())
    }
}

/// Build the sink named by `config`.
///
/// # Errors
///
/// Returns an error if a file sink cannot be opened.
pub fn open_sink(config: &SinkConfig) -> Result<Box<dyn RecordSink>> {
    match config {
        SinkConfig::Stdout => Ok(Box::new(JsonLinesSink::stdout())),
        SinkConfig::File { path } => Ok(Box::new(JsonLinesSink::append(path)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamtap_types::ResumePosition;

    fn record(id: &str) -> OutputRecord {
        OutputRecord {
            partition_key: id.to_string(),
            destination: "events.orders".to_string(),
            value: vec![("sku".to_string(), "a1".to_string()), ("qty".to_string(), "2".to_string())],
            resume_position: ResumePosition::new("orders", id),
            ingest_timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_json_lines_one_record_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.write_batch(&[record("1-0"), record("2-0")]).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["partition_key"], "1-0");
        assert_eq!(first["destination"], "events.orders");
        assert_eq!(first["value"], serde_json::json!([["sku", "a1"], ["qty", "2"]]));
        assert_eq!(first["resume_position"]["offset_token"], "1-0");
    }

    #[test]
    fn test_file_sink_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("records.jsonl");

        JsonLinesSink::append(&path).unwrap().write_batch(&[record("1-0")]).unwrap();
        JsonLinesSink::append(&path).unwrap().write_batch(&[record("2-0")]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_open_sink_for_file_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let mut sink = open_sink(&SinkConfig::File { path: path.clone() }).unwrap();
        sink.write_batch(&[record("1-0")]).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("\"1-0\""));
    }
}
