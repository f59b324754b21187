//! In-process fake Qdrant (axum) and a deterministic embedder.
#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use embedding_service::{
    EmbeddingError, EmbeddingGateway, EmbeddingsProvider, RateLimitConfig, RateLimitWindow,
    services::EmbedFuture,
};
use log_store::{LogStore, QdrantFacade, Sleeper, StoreConfig, retry::SleepFuture};
use serde_json::{Map, Value, json};

pub const DIM: usize = 4;

pub const SAMPLE: &str = r#"10.0.0.1 - - [10/Oct/2023:13:55:36 +0000] "GET /index.html HTTP/1.1" 200 1024 "-" "curl/7.0" 12"#;

/// Builds a combined-log line.
pub fn line(ip: &str, method: &str, endpoint: &str, status: u16, rt: u32) -> String {
    format!(
        r#"{ip} - - [10/Oct/2023:13:55:{:02} +0000] "{method} {endpoint} HTTP/1.1" {status} 512 "-" "curl/7.0" {rt}"#,
        rt % 60
    )
}

/* ---------------------------------------------------------------------------
Fake Qdrant
--------------------------------------------------------------------------- */

#[derive(Clone, Debug)]
pub struct StoredEntry {
    pub vector: Vec<f32>,
    pub payload: Map<String, Value>,
}

#[derive(Default)]
pub struct FakeState {
    pub collections: Mutex<HashMap<String, BTreeMap<u64, StoredEntry>>>,
    pub created_bodies: Mutex<Vec<Value>>,
    /// Statuses returned by the next upsert requests, front first.
    pub upsert_script: Mutex<VecDeque<u16>>,
    pub upsert_calls: AtomicUsize,
    pub scroll_bodies: Mutex<Vec<Value>>,
    pub search_bodies: Mutex<Vec<Value>>,
    pub count_bodies: Mutex<Vec<Value>>,
    /// Scroll requests starting at this offset answer 500.
    pub fail_scroll_at: Mutex<Option<u64>>,
}

impl FakeState {
    pub fn stored(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    pub fn script_upserts(&self, statuses: &[u16]) {
        self.upsert_script.lock().unwrap().extend(statuses.iter().copied());
    }

    /// Inserts points directly, bypassing the HTTP API.
    pub fn seed(&self, collection: &str, points: impl IntoIterator<Item = (u64, Map<String, Value>)>) {
        let mut cols = self.collections.lock().unwrap();
        let col = cols.entry(collection.to_string()).or_default();
        for (id, payload) in points {
            col.insert(
                id,
                StoredEntry {
                    vector: vec![0.0; DIM],
                    payload,
                },
            );
        }
    }
}

pub struct FakeQdrant {
    pub base_url: String,
    pub state: Arc<FakeState>,
}

impl FakeQdrant {
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let app = Router::new()
            .route("/collections/{name}", get(get_collection).put(create_collection))
            .route("/collections/{name}/points", put(upsert_points).post(retrieve_points))
            .route("/collections/{name}/points/{id}", get(get_point))
            .route("/collections/{name}/points/search", post(search_points))
            .route("/collections/{name}/points/scroll", post(scroll_points))
            .route("/collections/{name}/points/count", post(count_points))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }
}

type Shared = State<Arc<FakeState>>;

fn ok(result: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "result": result, "status": "ok", "time": 0.001 })))
}

fn status_only(code: StatusCode) -> (StatusCode, Json<Value>) {
    (code, Json(json!({ "status": { "error": code.to_string() } })))
}

async fn get_collection(State(s): Shared, Path(name): Path<String>) -> (StatusCode, Json<Value>) {
    if s.collections.lock().unwrap().contains_key(&name) {
        ok(json!({ "status": "green" }))
    } else {
        status_only(StatusCode::NOT_FOUND)
    }
}

async fn create_collection(
    State(s): Shared,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    s.created_bodies.lock().unwrap().push(body);
    s.collections.lock().unwrap().entry(name).or_default();
    ok(json!(true))
}

async fn upsert_points(
    State(s): Shared,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    s.upsert_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(code) = s.upsert_script.lock().unwrap().pop_front() {
        let code = StatusCode::from_u16(code).unwrap();
        if !code.is_success() {
            return status_only(code);
        }
    }

    let mut cols = s.collections.lock().unwrap();
    let col = cols.entry(name).or_default();
    for p in body["points"].as_array().cloned().unwrap_or_default() {
        let id = p["id"].as_u64().unwrap();
        let vector = p["vector"]
            .as_array()
            .unwrap()
            .iter()
            .map(|x| x.as_f64().unwrap() as f32)
            .collect();
        let payload = p["payload"].as_object().cloned().unwrap_or_default();
        col.insert(id, StoredEntry { vector, payload });
    }
    ok(json!({ "operation_id": 1, "status": "completed" }))
}

async fn get_point(
    State(s): Shared,
    Path((name, id)): Path<(String, u64)>,
) -> (StatusCode, Json<Value>) {
    let cols = s.collections.lock().unwrap();
    match cols.get(&name).and_then(|c| c.get(&id)) {
        Some(e) => ok(json!({ "id": id, "payload": e.payload })),
        None => status_only(StatusCode::NOT_FOUND),
    }
}

async fn retrieve_points(
    State(s): Shared,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let cols = s.collections.lock().unwrap();
    let Some(col) = cols.get(&name) else {
        return status_only(StatusCode::NOT_FOUND);
    };
    let found: Vec<Value> = body["ids"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_u64)
        .filter_map(|id| col.get(&id).map(|e| json!({ "id": id, "payload": e.payload })))
        .collect();
    ok(Value::Array(found))
}

fn matches(filter: Option<&Value>, payload: &Map<String, Value>) -> bool {
    let Some(must) = filter.and_then(|f| f.get("must")).and_then(Value::as_array) else {
        return true;
    };
    must.iter().all(|c| {
        let key = c["key"].as_str().unwrap_or_default();
        let actual = payload.get(key).and_then(Value::as_str);
        if let Some(m) = c.get("match") {
            actual.is_some() && actual == m["value"].as_str()
        } else if let Some(r) = c.get("range") {
            actual.is_some_and(|a| {
                r["gte"].as_str().is_none_or(|g| a >= g) && r["lte"].as_str().is_none_or(|l| a <= l)
            })
        } else {
            false
        }
    })
}

async fn search_points(
    State(s): Shared,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    s.search_bodies.lock().unwrap().push(body.clone());
    let query: Vec<f32> = body["vector"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(|x| x.as_f64().unwrap_or_default() as f32)
        .collect();
    let limit = body["limit"].as_u64().unwrap_or(10) as usize;

    let cols = s.collections.lock().unwrap();
    let Some(col) = cols.get(&name) else {
        return status_only(StatusCode::NOT_FOUND);
    };
    let mut hits: Vec<(u64, f32, &StoredEntry)> = col
        .iter()
        .filter(|(_, e)| matches(body.get("filter"), &e.payload))
        .map(|(id, e)| {
            let score = e.vector.iter().zip(&query).map(|(a, b)| a * b).sum::<f32>();
            (*id, score, e)
        })
        .collect();
    hits.sort_by(|a, b| b.1.total_cmp(&a.1));
    let out: Vec<Value> = hits
        .into_iter()
        .take(limit)
        .map(|(id, score, e)| json!({ "id": id, "version": 0, "score": score, "payload": e.payload }))
        .collect();
    ok(Value::Array(out))
}

async fn scroll_points(
    State(s): Shared,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    s.scroll_bodies.lock().unwrap().push(body.clone());
    let offset = body["offset"].as_u64();
    if offset.is_some() && offset == *s.fail_scroll_at.lock().unwrap() {
        return status_only(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let limit = body["limit"].as_u64().unwrap_or(10) as usize;

    let cols = s.collections.lock().unwrap();
    let Some(col) = cols.get(&name) else {
        return status_only(StatusCode::NOT_FOUND);
    };
    let matching: Vec<(&u64, &StoredEntry)> = col
        .range(offset.unwrap_or(0)..)
        .filter(|(_, e)| matches(body.get("filter"), &e.payload))
        .take(limit + 1)
        .collect();
    let next = matching.get(limit).map(|(id, _)| **id);
    let points: Vec<Value> = matching
        .iter()
        .take(limit)
        .map(|(id, e)| json!({ "id": id, "payload": e.payload }))
        .collect();
    ok(json!({ "points": points, "next_page_offset": next }))
}

async fn count_points(
    State(s): Shared,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    s.count_bodies.lock().unwrap().push(body.clone());
    let cols = s.collections.lock().unwrap();
    let Some(col) = cols.get(&name) else {
        return status_only(StatusCode::NOT_FOUND);
    };
    let count = col
        .values()
        .filter(|e| matches(body.get("filter"), &e.payload))
        .count();
    ok(json!({ "count": count }))
}

/* ---------------------------------------------------------------------------
Fake embedder and sleeper
--------------------------------------------------------------------------- */

/// Deterministic embeddings derived from the input bytes.
#[derive(Default)]
pub struct FakeEmbedder {
    /// Any batch containing this text fails.
    pub fail_marker: Option<String>,
    pub calls: AtomicUsize,
}

pub fn fake_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for (i, b) in text.bytes().enumerate() {
        v[i % DIM] += f32::from(b) / 1000.0;
    }
    v
}

impl EmbeddingsProvider for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-embedder"
    }

    fn embed_batch<'a>(&'a self, inputs: &'a [String]) -> EmbedFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = &self.fail_marker {
                if inputs.iter().any(|s| s.contains(marker.as_str())) {
                    return Err(EmbeddingError::Provider("scripted failure".into()));
                }
            }
            Ok(inputs.iter().map(|s| fake_vector(s)).collect())
        })
    }
}

/// Records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, d: Duration) -> SleepFuture<'_> {
        self.delays.lock().unwrap().push(d);
        Box::pin(async {})
    }
}

/* ---------------------------------------------------------------------------
Harness
--------------------------------------------------------------------------- */

pub struct Harness {
    pub fake: FakeQdrant,
    pub store: LogStore,
    pub embedder: Arc<FakeEmbedder>,
    pub sleeper: Arc<RecordingSleeper>,
}

pub async fn harness() -> Harness {
    harness_with(FakeEmbedder::default(), |_| {}).await
}

pub async fn harness_with(embedder: FakeEmbedder, tune: impl FnOnce(&mut StoreConfig)) -> Harness {
    let fake = FakeQdrant::start().await;

    let mut cfg = StoreConfig::new_default(fake.base_url.clone(), "logs");
    cfg.vectors.size = DIM;
    cfg.scan.workers = 4;
    cfg.scan.shutdown_wait = Duration::from_secs(5);
    tune(&mut cfg);

    let embedder = Arc::new(embedder);
    let gateway = Arc::new(EmbeddingGateway::new(
        embedder.clone(),
        RateLimitWindow::new(RateLimitConfig::default()),
        Some(DIM),
    ));

    let sleeper = Arc::new(RecordingSleeper::default());
    let client = QdrantFacade::new(&cfg).unwrap().with_sleeper(sleeper.clone());
    let store = LogStore::with_client(cfg, client, gateway);

    Harness {
        fake,
        store,
        embedder,
        sleeper,
    }
}

pub fn payload(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}
