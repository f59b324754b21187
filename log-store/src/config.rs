//! Runtime and collection configuration.
//!
//! # Environment variables
//!
//! - `QDRANT_URL`                    = REST endpoint (default `http://localhost:6333`)
//! - `QDRANT_API_KEY`                = optional `api-key` header
//! - `QDRANT_COLLECTION_NAME`        = target collection (default `logs`)
//! - `QDRANT_TIMEOUT_SECS`           = per-request timeout (default `30`)
//! - `QDRANT_MAX_RETRIES`            = upsert attempts (default `5`)
//! - `QDRANT_INITIAL_BACKOFF_MS`     = first retry delay, doubled each time (default `500`)
//! - `QDRANT_SCROLL_LIMIT`           = page size for scroll (default `10000`)
//! - `QDRANT_SEARCH_EF`              = HNSW `ef` for search (default `64`)
//! - `QDRANT_INSERT_LOG_MESSAGES`    = ingest `LOG_FILE_PATH` at bootstrap (default `false`)
//! - `QDRANT_PROCESSING_CHUNK_SIZE`  = lines per ingestion chunk (default `1000`)
//! - `EMBEDDING_DIM`                 = collection vector size (default `1536`)
//! - `LOG_FILE_PATH`                 = bootstrap log file (default `logfiles.log`)
//! - `SCAN_WORKERS`                  = scanner concurrency (default: available parallelism)
//! - `SCAN_VALUE_FIELD`              = payload field collected by the scanner (default `raw`)
//! - `SCAN_SHUTDOWN_WAIT_SECS`       = grace period for scanner tasks (default `3600`)

use std::{path::PathBuf, time::Duration};

use crate::{errors::StoreError, retry::RetryPolicy};

/// Distance function used for the vector space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistanceKind {
    /// Cosine distance (what the embedding model is trained for).
    Cosine,
    /// Dot product (useful for normalized vectors).
    Dot,
    /// Euclidean distance (L2).
    Euclid,
}

impl DistanceKind {
    /// Name used by the Qdrant REST API.
    pub fn as_qdrant(self) -> &'static str {
        match self {
            DistanceKind::Cosine => "Cosine",
            DistanceKind::Dot => "Dot",
            DistanceKind::Euclid => "Euclid",
        }
    }
}

/// Describes the vector space of the collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Dimensionality of vectors.
    pub size: usize,
    /// Distance function.
    pub distance: DistanceKind,
}

/// Scanner tuning.
#[derive(Clone, Debug)]
pub struct ScanConfig {
    pub workers: usize,
    pub value_field: String,
    pub shutdown_wait: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            value_field: "raw".into(),
            shutdown_wait: Duration::from_secs(3600),
        }
    }
}

/// Configuration for log ingestion and retrieval.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Qdrant REST endpoint, e.g. `http://localhost:6333`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Target collection name.
    pub collection: String,
    pub timeout: Duration,
    /// Backoff for point upserts.
    pub retry: RetryPolicy,
    pub scroll_limit: u64,
    pub search_ef: u64,
    pub vectors: CollectionSpec,
    /// Whether bootstrap ingests `log_file_path`.
    pub insert_log_messages: bool,
    /// Lines per ingestion chunk.
    pub chunk_size: usize,
    pub log_file_path: PathBuf,
    pub scan: ScanConfig,
}

impl StoreConfig {
    /// Creates a default config for a given Qdrant endpoint and collection name.
    pub fn new_default(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            collection: collection.into(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            scroll_limit: 10_000,
            search_ef: 64,
            vectors: CollectionSpec {
                size: 1536,
                distance: DistanceKind::Cosine,
            },
            insert_log_messages: false,
            chunk_size: 1000,
            log_file_path: PathBuf::from("logfiles.log"),
            scan: ScanConfig::default(),
        }
    }

    /// Reads the config from the process environment.
    ///
    /// # Errors
    /// See [`StoreConfig::from_lookup`].
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Reads the config from an env-like lookup; unset or blank values take defaults.
    ///
    /// # Errors
    /// `StoreError::Config` for unparsable values or failed validation.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut cfg = Self::new_default(
            get("QDRANT_URL").unwrap_or_else(|| "http://localhost:6333".into()),
            get("QDRANT_COLLECTION_NAME").unwrap_or_else(|| "logs".into()),
        );
        cfg.qdrant_api_key = get("QDRANT_API_KEY");

        if let Some(v) = parse_num(&get, "QDRANT_TIMEOUT_SECS")? {
            cfg.timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_num(&get, "QDRANT_MAX_RETRIES")? {
            cfg.retry.max_attempts = v.try_into().map_err(|_| {
                StoreError::Config("QDRANT_MAX_RETRIES does not fit in u32".into())
            })?;
        }
        if let Some(v) = parse_num(&get, "QDRANT_INITIAL_BACKOFF_MS")? {
            cfg.retry.initial_backoff = Duration::from_millis(v);
        }
        if let Some(v) = parse_num(&get, "QDRANT_SCROLL_LIMIT")? {
            cfg.scroll_limit = v;
        }
        if let Some(v) = parse_num(&get, "QDRANT_SEARCH_EF")? {
            cfg.search_ef = v;
        }
        if let Some(v) = parse_num(&get, "EMBEDDING_DIM")? {
            cfg.vectors.size = v as usize;
        }
        if let Some(v) = parse_num(&get, "QDRANT_PROCESSING_CHUNK_SIZE")? {
            cfg.chunk_size = v as usize;
        }
        if let Some(v) = get("QDRANT_INSERT_LOG_MESSAGES") {
            cfg.insert_log_messages = parse_bool("QDRANT_INSERT_LOG_MESSAGES", &v)?;
        }
        if let Some(v) = get("LOG_FILE_PATH") {
            cfg.log_file_path = PathBuf::from(v);
        }
        if let Some(v) = parse_num(&get, "SCAN_WORKERS")? {
            cfg.scan.workers = v as usize;
        }
        if let Some(v) = get("SCAN_VALUE_FIELD") {
            cfg.scan.value_field = v;
        }
        if let Some(v) = parse_num(&get, "SCAN_SHUTDOWN_WAIT_SECS")? {
            cfg.scan.shutdown_wait = Duration::from_secs(v);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.qdrant_url.trim().is_empty() {
            return Err(StoreError::Config("qdrant_url is empty".into()));
        }
        if !(self.qdrant_url.starts_with("http://") || self.qdrant_url.starts_with("https://")) {
            return Err(StoreError::Config(
                "qdrant_url must start with http:// or https://".into(),
            ));
        }
        if self.collection.trim().is_empty() {
            return Err(StoreError::Config("collection is empty".into()));
        }
        if self.vectors.size == 0 {
            return Err(StoreError::Config("vector size must be > 0".into()));
        }
        if self.chunk_size == 0 {
            return Err(StoreError::Config("chunk_size must be > 0".into()));
        }
        if self.scroll_limit == 0 {
            return Err(StoreError::Config("scroll_limit must be > 0".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(StoreError::Config("max retries must be > 0".into()));
        }
        if self.scan.workers == 0 {
            return Err(StoreError::Config("scan workers must be > 0".into()));
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(4, |n| n.get())
}

fn parse_num<G>(get: &G, name: &str) -> Result<Option<u64>, StoreError>
where
    G: Fn(&str) -> Option<String>,
{
    get(name)
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map_err(|_| StoreError::Config(format!("{name}: expected unsigned integer, got {v:?}")))
        })
        .transpose()
}

fn parse_bool(name: &str, v: &str) -> Result<bool, StoreError> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(StoreError::Config(format!("{name}: expected boolean, got {v:?}"))),
    }
}
