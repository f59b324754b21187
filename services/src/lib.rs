//! Small shared helpers used by the ingestion crates.

pub mod content_id;
