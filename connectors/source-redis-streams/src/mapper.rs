//! Entry to output record mapping for one poll cycle.

use streamtap_types::{OutputRecord, PollOutcome, ResumePosition, StreamEntry};

/// Placeholder in a topic template replaced by the stream name.
pub const STREAM_PLACEHOLDER: &str = "${stream}";

/// Destination topic for `stream_name`: a literal replacement of every
/// `${stream}` in `topic_template`, nothing else.
pub fn destination(topic_template: &str, stream_name: &str) -> String {
    topic_template.replace(STREAM_PLACEHOLDER, stream_name)
}

/// Map a batch read from `stream_name`, preserving order.
///
/// An empty batch yields [`PollOutcome::Idle`].
pub fn map_batch(
    stream_name: &str,
    entries: Vec<StreamEntry>,
    topic_template: &str,
    ingest_timestamp: i64,
) -> PollOutcome {
    let topic = destination(topic_template, stream_name);
    let records = entries
        .into_iter()
        .map(|entry| OutputRecord {
            resume_position: ResumePosition::new(stream_name, entry.id.clone()),
            partition_key: entry.id,
            destination: topic.clone(),
            value: entry.fields,
            ingest_timestamp,
        })
        .collect();
    PollOutcome::from_records(records)
}
