//! Metadata-driven reads: filtered search, counts, aggregations, distinct values.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::{
    errors::StoreError,
    filters::Filter,
    qdrant_facade::QdrantFacade,
    record::{ScoredPoint, StoredPoint, payload_value_string},
};

/// Filtered nearest-neighbour search, or a filtered scroll when no vector is given.
///
/// Without a vector the points come back in store order with a score of `0.0`.
///
/// # Errors
/// Store failures.
pub async fn search_by_filter(
    client: &QdrantFacade,
    collection: &str,
    filter: &Filter,
    vector: Option<&[f32]>,
    limit: u64,
) -> Result<Vec<ScoredPoint>, StoreError> {
    trace!(collection, with_vector = vector.is_some(), limit, "retrieve::search_by_filter");
    match vector {
        Some(v) => client.search(collection, v, limit, Some(filter)).await,
        None => {
            let page = client.scroll_page(collection, None, limit, Some(filter)).await?;
            Ok(page
                .points
                .into_iter()
                .map(|p| ScoredPoint {
                    id: p.id,
                    score: 0.0,
                    payload: p.payload,
                })
                .collect())
        }
    }
}

/// Walks every page matching `filter`, calling `visit` per point.
async fn for_each_point<F>(
    client: &QdrantFacade,
    collection: &str,
    filter: Option<&Filter>,
    mut visit: F,
) -> Result<usize, StoreError>
where
    F: FnMut(StoredPoint),
{
    let mut offset = None;
    let mut pages = 0usize;
    loop {
        let page = client
            .scroll_page(collection, offset, client.scroll_limit(), filter)
            .await?;
        pages += 1;
        page.points.into_iter().for_each(&mut visit);
        match page.next_offset {
            Some(next) => offset = Some(next),
            None => return Ok(pages),
        }
    }
}

/// Tallies values of `field` over every point matching `filter`.
///
/// Points without the field are not counted.
///
/// # Errors
/// Store failures; a failure on any page fails the whole aggregation.
pub async fn aggregate_by_filter(
    client: &QdrantFacade,
    collection: &str,
    field: &str,
    filter: &Filter,
) -> Result<BTreeMap<String, u64>, StoreError> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let pages = for_each_point(client, collection, Some(filter), |p| {
        if let Some(v) = p.payload.get(field) {
            *counts.entry(payload_value_string(v)).or_default() += 1;
        }
    })
    .await?;
    debug!(collection, field, pages, buckets = counts.len(), "aggregation complete");
    Ok(counts)
}

/// Distinct values of `field` across the whole collection.
///
/// # Errors
/// Store failures.
pub async fn distinct_values(
    client: &QdrantFacade,
    collection: &str,
    field: &str,
) -> Result<BTreeSet<String>, StoreError> {
    let mut values = BTreeSet::new();
    let pages = for_each_point(client, collection, None, |p| {
        if let Some(v) = p.payload.get(field) {
            values.insert(payload_value_string(v));
        }
    })
    .await?;
    debug!(collection, field, pages, distinct = values.len(), "distinct values collected");
    Ok(values)
}
