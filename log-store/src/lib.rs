//! Log ingestion and retrieval over Qdrant.
//!
//! This crate provides a clean API to:
//! - Parse access-log lines and sync them into a collection without duplicates
//! - Scan the whole collection concurrently
//! - Search, count and aggregate by metadata
//!
//! The design is flat (no deep nesting) and splits responsibilities into focused modules.

pub mod config;
pub mod errors;
pub mod filters;
pub mod ingest;
pub mod log_source;
pub mod parser;
pub mod qdrant_facade;
pub mod record;
pub mod retrieve;
pub mod retry;
pub mod scanner;

pub use config::{CollectionSpec, DistanceKind, ScanConfig, StoreConfig};
pub use errors::StoreError;
pub use filters::{Filter, build_filter};
pub use qdrant_facade::QdrantFacade;
pub use record::{
    FilterCriteria, IngestReport, IngestSummary, LogRecord, ScoredPoint, ScrollPage, StoredPoint,
    VectorPoint,
};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use scanner::{PageScanner, PageSource};

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    path::Path,
    sync::Arc,
};

use embedding_service::EmbeddingGateway;
use tracing::{debug, trace};

/// High-level facade that wires configuration, the Qdrant client and the embedding gateway.
///
/// Every operation targets the configured collection.
pub struct LogStore {
    cfg: StoreConfig,
    client: Arc<QdrantFacade>,
    gateway: Arc<EmbeddingGateway>,
}

impl LogStore {
    /// Constructs a new store from the given configuration.
    ///
    /// # Errors
    /// Returns `StoreError::Config` if the config is invalid.
    pub fn new(cfg: StoreConfig, gateway: Arc<EmbeddingGateway>) -> Result<Self, StoreError> {
        let client = QdrantFacade::new(&cfg)?;
        Ok(Self::with_client(cfg, client, gateway))
    }

    /// Constructs a store around an already built client (custom sleeper, tests).
    pub fn with_client(cfg: StoreConfig, client: QdrantFacade, gateway: Arc<EmbeddingGateway>) -> Self {
        trace!("LogStore::with_client collection={}", cfg.collection);
        Self {
            cfg,
            client: Arc::new(client),
            gateway,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    pub fn collection(&self) -> &str {
        &self.cfg.collection
    }

    pub fn client(&self) -> &QdrantFacade {
        &self.client
    }

    pub fn gateway(&self) -> &EmbeddingGateway {
        &self.gateway
    }

    /// Creates the collection when missing; returns whether it did.
    ///
    /// # Errors
    /// Transport failures while creating.
    pub async fn ensure_collection(&self) -> Result<bool, StoreError> {
        self.client.ensure_collection(self.collection()).await
    }

    /// Ingests one chunk of lines.
    ///
    /// # Errors
    /// See [`ingest::ingest_lines`].
    pub async fn ingest_lines(&self, lines: &[String]) -> Result<IngestReport, StoreError> {
        ingest::ingest_lines(&self.client, &self.gateway, self.collection(), lines).await
    }

    /// Ingests lines in chunks of the configured size.
    pub async fn ingest_chunked(&self, lines: &[String]) -> IngestSummary {
        ingest::ingest_chunked(
            &self.client,
            &self.gateway,
            self.collection(),
            lines,
            self.cfg.chunk_size,
        )
        .await
    }

    /// Reads a log file and ingests it in chunks.
    ///
    /// # Errors
    /// `StoreError::Io` if the file cannot be read.
    pub async fn ingest_file(&self, path: impl AsRef<Path>) -> Result<IngestSummary, StoreError> {
        debug!("LogStore::ingest_file path={:?}", path.as_ref());
        let lines = log_source::read_log_lines(path)?;
        Ok(self.ingest_chunked(&lines).await)
    }

    /// Embeds raw texts (no storage).
    ///
    /// # Errors
    /// `StoreError::Embedding`.
    pub async fn embed_messages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, StoreError> {
        Ok(self.gateway.embed(texts).await?)
    }

    /// Scanner over the configured collection.
    pub fn scanner(&self) -> PageScanner {
        let source: Arc<dyn PageSource> = self.client.clone();
        PageScanner::new(source, self.cfg.scan.clone())
    }

    /// Every stored point as `id -> payload[scan.value_field]`.
    pub async fn scan_all(&self, start: Option<u64>) -> HashMap<u64, String> {
        self.scanner().scan_all(self.collection(), start).await
    }

    /// Retrieves points by id.
    ///
    /// # Errors
    /// Store failures.
    pub async fn get_points(&self, ids: &[u64]) -> Result<Vec<StoredPoint>, StoreError> {
        self.client.get_points(self.collection(), ids).await
    }

    /// Nearest neighbours of `vector`.
    ///
    /// # Errors
    /// Store failures.
    pub async fn search(&self, vector: &[f32], limit: u64) -> Result<Vec<ScoredPoint>, StoreError> {
        self.client.search(self.collection(), vector, limit, None).await
    }

    /// Embeds `query` and returns its nearest neighbours.
    ///
    /// # Errors
    /// Embedding or store failures.
    pub async fn search_text(&self, query: &str, limit: u64) -> Result<Vec<ScoredPoint>, StoreError> {
        let v = self.gateway.embed_query(query).await?;
        self.search(&v, limit).await
    }

    /// Points matching `criteria`, ranked by `vector` when one is given.
    ///
    /// # Errors
    /// Store failures.
    pub async fn search_by_filter(
        &self,
        criteria: &FilterCriteria,
        vector: Option<&[f32]>,
        limit: u64,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let filter = build_filter(criteria);
        retrieve::search_by_filter(&self.client, self.collection(), &filter, vector, limit).await
    }

    /// Number of points matching `criteria`.
    ///
    /// # Errors
    /// Store failures.
    pub async fn count_by_filter(&self, criteria: &FilterCriteria) -> Result<u64, StoreError> {
        let filter = build_filter(criteria);
        self.client.count(self.collection(), Some(&filter)).await
    }

    /// `value -> occurrences` of `field` over points matching `criteria`.
    ///
    /// # Errors
    /// Store failures.
    pub async fn aggregate_by_filter(
        &self,
        field: &str,
        criteria: &FilterCriteria,
    ) -> Result<BTreeMap<String, u64>, StoreError> {
        let filter = build_filter(criteria);
        retrieve::aggregate_by_filter(&self.client, self.collection(), field, &filter).await
    }

    /// Distinct values of `field` across the collection.
    ///
    /// # Errors
    /// Store failures.
    pub async fn distinct_values(&self, field: &str) -> Result<BTreeSet<String>, StoreError> {
        retrieve::distinct_values(&self.client, self.collection(), field).await
    }
}
