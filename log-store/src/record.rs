//! Core data models used by the library.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON object stored next to each vector.
pub type Payload = serde_json::Map<String, Value>;

/// Payload key holding the original log line.
pub const RAW_FIELD: &str = "raw";

/// One parsed log line. All fields are kept as the strings found in the line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub raw: String,
    pub ip: String,
    /// Log-native timestamp, e.g. `10/Oct/2023:13:55:36 +0000`.
    pub timestamp: String,
    pub request_type: String,
    pub endpoint: String,
    pub status: String,
    pub size: String,
    pub referer: String,
    pub user_agent: String,
    pub response_time: String,
}

impl LogRecord {
    /// Payload stored in Qdrant: every field plus `raw`.
    pub fn to_payload(&self) -> Payload {
        let mut p = Payload::new();
        for (k, v) in [
            ("ip", &self.ip),
            ("timestamp", &self.timestamp),
            ("request_type", &self.request_type),
            ("endpoint", &self.endpoint),
            ("status", &self.status),
            ("size", &self.size),
            ("referer", &self.referer),
            ("user_agent", &self.user_agent),
            ("response_time", &self.response_time),
            (RAW_FIELD, &self.raw),
        ] {
            p.insert(k.to_string(), Value::String(v.clone()));
        }
        p
    }
}

/// Point as written to the store.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VectorPoint {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// Optional metadata constraints; present fields are AND-ed.
///
/// The timestamp range only applies when both bounds are present.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub timestamp_start: Option<String>,
    pub timestamp_end: Option<String>,
    pub status: Option<String>,
    pub ip: Option<String>,
    pub request_type: Option<String>,
    pub endpoint: Option<String>,
    pub size: Option<String>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub response_time: Option<String>,
}

/// Point read back by scroll or retrieve (no vector).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredPoint {
    pub id: u64,
    #[serde(default)]
    pub payload: Payload,
}

/// Nearest-neighbour hit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: u64,
    pub score: f32,
    #[serde(default)]
    pub payload: Payload,
}

/// One page of a scroll, with the cursor of the following page if any.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollPage {
    pub points: Vec<StoredPoint>,
    #[serde(rename = "next_page_offset", default)]
    pub next_offset: Option<u64>,
}

/// Outcome of ingesting one chunk of lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Lines handed in.
    pub received: usize,
    /// Lines that did not match the log grammar.
    pub unparsed: usize,
    /// Lines skipped because their id was already stored or repeated in the chunk.
    pub already_stored: usize,
    /// Points written by the bulk upsert.
    pub inserted: usize,
}

/// Totals over a chunked ingestion run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub chunks: usize,
    pub failed_chunks: usize,
    pub received: usize,
    pub unparsed: usize,
    pub already_stored: usize,
    pub inserted: usize,
}

impl IngestSummary {
    pub fn absorb(&mut self, r: &IngestReport) {
        self.chunks += 1;
        self.received += r.received;
        self.unparsed += r.unparsed;
        self.already_stored += r.already_stored;
        self.inserted += r.inserted;
    }

    pub fn record_failure(&mut self, lines: usize) {
        self.chunks += 1;
        self.failed_chunks += 1;
        self.received += lines;
    }
}

/// Renders a payload value as the string used for tallies and scan results.
pub fn payload_value_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
