//! Thin adapter over the Qdrant REST API.
//!
//! This facade concentrates all Qdrant interactions behind a minimal API and
//! keeps the rest of the crate free of URLs and wire shapes. Only point
//! upserts are retried (see [`crate::retry`]); reads fail fast.

use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::{
    config::{CollectionSpec, StoreConfig},
    errors::StoreError,
    filters::Filter,
    record::{ScoredPoint, ScrollPage, StoredPoint, VectorPoint},
    retry::{HttpOutcome, RetryPolicy, Sleeper, TokioSleeper, send_with_backoff},
    scanner::{PageFuture, PageSource},
};

/// REST client bound to one Qdrant instance.
pub struct QdrantFacade {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    vectors: CollectionSpec,
    scroll_limit: u64,
    search_ef: u64,
}

impl std::fmt::Debug for QdrantFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantFacade")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .field("vectors", &self.vectors)
            .finish_non_exhaustive()
    }
}

/// `{"result": ...}` envelope of every Qdrant response.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: u64,
}

#[derive(Debug, Serialize)]
struct UpsertBody<'a> {
    points: &'a [VectorPoint],
}

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    vector: &'a [f32],
    limit: u64,
    with_payload: bool,
    params: SearchParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Filter>,
}

#[derive(Debug, Serialize)]
struct SearchParams {
    ef: u64,
}

#[derive(Debug, Serialize)]
struct ScrollBody<'a> {
    with_payload: bool,
    with_vector: bool,
    limit: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Filter>,
}

#[derive(Debug, Serialize)]
struct CountBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Filter>,
}

impl QdrantFacade {
    /// Creates a new facade from the given configuration.
    ///
    /// # Errors
    /// `StoreError::Config` for an invalid config or API key,
    /// `StoreError::Transport` if the HTTP client cannot be built.
    pub fn new(cfg: &StoreConfig) -> Result<Self, StoreError> {
        cfg.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &cfg.qdrant_api_key {
            let v = HeaderValue::from_str(key.trim())
                .map_err(|_| StoreError::Config("QDRANT_API_KEY is not a valid header value".into()))?;
            headers.insert("api-key", v);
        }

        let http = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .default_headers(headers)
            .build()?;

        info!(url = %cfg.qdrant_url, collection = %cfg.collection, "QdrantFacade initialized");

        Ok(Self {
            http,
            base_url: cfg.qdrant_url.trim_end_matches('/').to_string(),
            retry: cfg.retry,
            sleeper: Arc::new(TokioSleeper),
            vectors: cfg.vectors,
            scroll_limit: cfg.scroll_limit,
            search_ef: cfg.search_ef,
        })
    }

    /// Replaces the backoff sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn scroll_limit(&self) -> u64 {
        self.scroll_limit
    }

    fn collection_url(&self, name: &str) -> String {
        format!("{}/collections/{}", self.base_url, name)
    }

    /// `true` on a 2xx answer; transport failures are logged and read as `false`.
    pub async fn collection_exists(&self, name: &str) -> bool {
        let url = self.collection_url(name);
        match self.http.get(&url).send().await {
            Ok(resp) => {
                debug!(collection = name, status = %resp.status(), "collection lookup");
                resp.status().is_success()
            }
            Err(e) => {
                warn!(collection = name, error = %e, "collection lookup failed");
                false
            }
        }
    }

    /// Creates the collection (int8 scalar quantization, HNSW m=16/ef_construct=100).
    ///
    /// The response status is logged, not acted on.
    ///
    /// # Errors
    /// `StoreError::Transport` when the request cannot be sent.
    pub async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        let body = json!({
            "vectors": {
                "size": self.vectors.size,
                "distance": self.vectors.distance.as_qdrant(),
            },
            "hnsw_config": { "m": 16, "ef_construct": 100 },
            "quantization_config": {
                "scalar": { "type": "int8", "always_ram": true }
            }
        });

        let resp = self.http.put(self.collection_url(name)).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if status.is_success() {
            info!(collection = name, size = self.vectors.size, "collection created");
        } else {
            warn!(collection = name, %status, body = %text, "create collection answered non-success");
        }
        Ok(())
    }

    /// Creates the collection when missing; returns whether it did.
    ///
    /// # Errors
    /// See [`Self::create_collection`].
    pub async fn ensure_collection(&self, name: &str) -> Result<bool, StoreError> {
        if self.collection_exists(name).await {
            debug!(collection = name, "collection already exists");
            return Ok(false);
        }
        info!(collection = name, "collection not found, creating");
        self.create_collection(name).await?;
        Ok(true)
    }

    /// Upserts a single point (retried).
    ///
    /// # Errors
    /// `StoreError::Rejected` or `StoreError::RetriesExhausted`.
    pub async fn upsert_one(&self, collection: &str, point: &VectorPoint) -> Result<(), StoreError> {
        self.put_points(collection, std::slice::from_ref(point), "upsert_one")
            .await
    }

    /// Upserts a batch in one request (retried, all-or-nothing).
    ///
    /// Returns the number of points written; an empty batch makes no request.
    ///
    /// # Errors
    /// `StoreError::Rejected` or `StoreError::RetriesExhausted`.
    pub async fn upsert_bulk(&self, collection: &str, points: &[VectorPoint]) -> Result<usize, StoreError> {
        if points.is_empty() {
            debug!(collection, "no points provided for upsert");
            return Ok(0);
        }
        self.put_points(collection, points, "upsert_bulk").await?;
        info!(collection, points = points.len(), "bulk upsert complete");
        Ok(points.len())
    }

    async fn put_points(
        &self,
        collection: &str,
        points: &[VectorPoint],
        op: &'static str,
    ) -> Result<(), StoreError> {
        let url = format!("{}/points?wait=true", self.collection_url(collection));
        let body = UpsertBody { points };
        let (http, url, body) = (&self.http, url.as_str(), &body);

        send_with_backoff(&self.retry, self.sleeper.as_ref(), op, move || async move {
            let resp = http.put(url).json(body).send().await?;
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Ok::<_, reqwest::Error>(HttpOutcome { status, body })
        })
        .await
        .map(|_| ())
        .inspect_err(|e| error!(collection, points = points.len(), error = %e, "{op} failed"))
    }

    /// `true` if the point is stored; transport failures are logged and read as `false`.
    pub async fn point_exists(&self, collection: &str, id: u64) -> bool {
        let url = format!("{}/points/{id}", self.collection_url(collection));
        match self.http.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!(collection, id, error = %e, "point lookup failed");
                false
            }
        }
    }

    /// Retrieves points by id (payload only).
    ///
    /// # Errors
    /// Transport, rejection or decode errors.
    pub async fn get_points(&self, collection: &str, ids: &[u64]) -> Result<Vec<StoredPoint>, StoreError> {
        let url = format!("{}/points", self.collection_url(collection));
        let body = json!({ "ids": ids, "with_payload": true });
        self.post_json("get_points", &url, &body).await
    }

    /// Nearest-neighbour search with an optional filter.
    ///
    /// # Errors
    /// Transport, rejection or decode errors.
    pub async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: u64,
        filter: Option<&Filter>,
    ) -> Result<Vec<ScoredPoint>, StoreError> {
        let url = format!("{}/points/search", self.collection_url(collection));
        let body = SearchBody {
            vector,
            limit,
            with_payload: true,
            params: SearchParams { ef: self.search_ef },
            filter: Filter::non_empty(filter),
        };
        let hits: Vec<ScoredPoint> = self.post_json("search", &url, &body).await?;
        debug!(collection, hits = hits.len(), "search completed");
        Ok(hits)
    }

    /// One scroll page starting at `offset` (`None` = beginning).
    ///
    /// # Errors
    /// Transport, rejection or decode errors.
    pub async fn scroll_page(
        &self,
        collection: &str,
        offset: Option<u64>,
        limit: u64,
        filter: Option<&Filter>,
    ) -> Result<ScrollPage, StoreError> {
        let url = format!("{}/points/scroll", self.collection_url(collection));
        let body = ScrollBody {
            with_payload: true,
            with_vector: false,
            limit,
            offset,
            filter: Filter::non_empty(filter),
        };
        let page: ScrollPage = self.post_json("scroll", &url, &body).await?;
        debug!(
            collection,
            ?offset,
            points = page.points.len(),
            next = ?page.next_offset,
            "scroll page"
        );
        Ok(page)
    }

    /// Number of points matching the filter.
    ///
    /// # Errors
    /// Transport, rejection or decode errors.
    pub async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<u64, StoreError> {
        let url = format!("{}/points/count", self.collection_url(collection));
        let body = CountBody {
            filter: Filter::non_empty(filter),
        };
        let res: CountResult = self.post_json("count", &url, &body).await?;
        Ok(res.count)
    }

    async fn post_json<B, T>(&self, op: &'static str, url: &str, body: &B) -> Result<T, StoreError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self.http.post(url).json(body).send().await.inspect_err(|e| {
            error!(op, url, error = %e, "request failed");
        })?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            error!(op, url, %status, body = %text, "store rejected request");
            return Err(StoreError::Rejected {
                op,
                status,
                body: text,
            });
        }
        serde_json::from_str::<Envelope<T>>(&text)
            .map(|e| e.result)
            .map_err(|e| StoreError::Decode {
                op,
                reason: e.to_string(),
            })
    }
}

impl PageSource for QdrantFacade {
    fn fetch_page<'a>(&'a self, collection: &'a str, offset: Option<u64>) -> PageFuture<'a> {
        Box::pin(self.scroll_page(collection, offset, self.scroll_limit, None))
    }
}
