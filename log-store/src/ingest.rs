//! Ingestion pipeline: parse → embed (one batch) → dedupe by content id → bulk upsert.
//!
//! Ids come from [`services::content_id::point_id_for`], so re-ingesting the
//! same lines is a no-op. Chunks run sequentially; a failed chunk is logged
//! and the next one still runs.

use std::collections::HashSet;

use embedding_service::EmbeddingGateway;
use services::content_id::point_id_for;
use tracing::{debug, error, info};

use crate::{
    errors::StoreError,
    parser::parse_line,
    qdrant_facade::QdrantFacade,
    record::{IngestReport, IngestSummary, LogRecord, VectorPoint},
};

/// Ingests one chunk of raw lines.
///
/// 1. Parse every line, dropping those that do not match.
/// 2. Embed the survivors in a single batch; failure aborts the chunk.
/// 3. Skip ids repeated inside the chunk or already present in the store.
/// 4. Upsert the rest in one request.
///
/// # Errors
/// Embedding failures and upsert failures (rejection or exhausted retries).
pub async fn ingest_lines(
    client: &QdrantFacade,
    gateway: &EmbeddingGateway,
    collection: &str,
    lines: &[String],
) -> Result<IngestReport, StoreError> {
    let mut report = IngestReport {
        received: lines.len(),
        ..Default::default()
    };

    let records: Vec<LogRecord> = lines.iter().filter_map(|l| parse_line(l)).collect();
    report.unparsed = lines.len() - records.len();
    if records.is_empty() {
        debug!(collection, received = report.received, "no parsable lines in chunk");
        return Ok(report);
    }

    let texts: Vec<String> = records.iter().map(|r| r.raw.clone()).collect();
    let vectors = gateway.embed(&texts).await.inspect_err(|e| {
        error!(collection, batch = texts.len(), error = %e, "embedding failed, chunk aborted");
    })?;

    let mut seen = HashSet::with_capacity(records.len());
    let mut points = Vec::with_capacity(records.len());
    for (record, vector) in records.iter().zip(vectors) {
        let id = point_id_for(&record.raw);
        if !seen.insert(id) || client.point_exists(collection, id).await {
            report.already_stored += 1;
            continue;
        }
        points.push(VectorPoint {
            id,
            vector,
            payload: record.to_payload(),
        });
    }

    report.inserted = client.upsert_bulk(collection, &points).await?;

    info!(
        collection,
        received = report.received,
        unparsed = report.unparsed,
        already_stored = report.already_stored,
        inserted = report.inserted,
        "chunk ingested"
    );
    Ok(report)
}

/// Splits `lines` into chunks of `chunk_size` and ingests them one after another.
///
/// Failed chunks are counted and logged, never fatal.
pub async fn ingest_chunked(
    client: &QdrantFacade,
    gateway: &EmbeddingGateway,
    collection: &str,
    lines: &[String],
    chunk_size: usize,
) -> IngestSummary {
    let mut summary = IngestSummary::default();
    let total_chunks = lines.len().div_ceil(chunk_size.max(1));

    for (i, chunk) in lines.chunks(chunk_size.max(1)).enumerate() {
        match ingest_lines(client, gateway, collection, chunk).await {
            Ok(r) => summary.absorb(&r),
            Err(e) => {
                error!(collection, chunk = i + 1, total_chunks, lines = chunk.len(), error = %e, "chunk failed, continuing");
                summary.record_failure(chunk.len());
            }
        }
    }

    info!(
        collection,
        chunks = summary.chunks,
        failed_chunks = summary.failed_chunks,
        inserted = summary.inserted,
        already_stored = summary.already_stored,
        "ingestion finished"
    );
    summary
}
