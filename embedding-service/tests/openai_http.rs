//! `OpenAiService` + `EmbeddingGateway` against an in-process fake `/v1/embeddings`.

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use embedding_service::{
    EmbeddingError, EmbeddingGateway, EmbeddingModelConfig, RateLimitConfig,
};
use serde_json::{Value, json};

#[derive(Default)]
struct Seen {
    bodies: Vec<Value>,
    auth: Vec<String>,
}

#[derive(Clone)]
struct Fake {
    seen: Arc<Mutex<Seen>>,
    /// Status to answer with instead of embeddings.
    fail_with: Option<StatusCode>,
    dim: usize,
}

async fn embeddings(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    {
        let mut seen = fake.seen.lock().unwrap();
        seen.auth.push(
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
        );
        seen.bodies.push(body.clone());
    }
    if let Some(code) = fake.fail_with {
        return (code, Json(json!({"error": {"message": "slow down"}})));
    }

    // answer in reverse order; the client must restore input order by `index`
    let inputs = body["input"].as_array().cloned().unwrap_or_default();
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .rev()
        .map(|(i, s)| {
            let len = s.as_str().unwrap_or_default().len() as f32;
            json!({"object": "embedding", "index": i, "embedding": vec![len; fake.dim]})
        })
        .collect();
    (StatusCode::OK, Json(json!({"object": "list", "data": data, "model": body["model"]})))
}

async fn start(fail_with: Option<StatusCode>, dim: usize) -> (String, Arc<Mutex<Seen>>) {
    let seen = Arc::new(Mutex::new(Seen::default()));
    let app = Router::new()
        .route("/v1/embeddings", post(embeddings))
        .with_state(Fake {
            seen: seen.clone(),
            fail_with,
            dim,
        });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn cfg(endpoint: String, dim: usize) -> EmbeddingModelConfig {
    EmbeddingModelConfig {
        model: "text-embedding-3-small".into(),
        endpoint,
        api_key: Some("sk-test".into()),
        dim,
        timeout_secs: 5,
        rate_limit: RateLimitConfig::default(),
    }
}

#[tokio::test]
async fn batch_round_trip_restores_order() {
    let (url, seen) = start(None, 3).await;
    let gw = EmbeddingGateway::from_config(&cfg(url, 3)).unwrap();

    let inputs = vec!["a".to_string(), "bb".to_string(), "cccc".to_string()];
    let out = gw.embed(&inputs).await.unwrap();
    assert_eq!(out, vec![vec![1.0; 3], vec![2.0; 3], vec![4.0; 3]]);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.bodies.len(), 1);
    assert_eq!(
        seen.bodies[0],
        json!({"model": "text-embedding-3-small", "input": ["a", "bb", "cccc"]})
    );
    assert_eq!(seen.auth[0], "Bearer sk-test");
}

#[tokio::test]
async fn provider_error_status_is_surfaced_without_retry() {
    let (url, seen) = start(Some(StatusCode::TOO_MANY_REQUESTS), 3).await;
    let gw = EmbeddingGateway::from_config(&cfg(url, 3)).unwrap();

    let err = gw.embed(&["x".to_string()]).await.unwrap_err();
    match err {
        EmbeddingError::HttpStatus { status, snippet, .. } => {
            assert_eq!(status, StatusCode::TOO_MANY_REQUESTS.as_u16());
            assert!(snippet.contains("slow down"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(seen.lock().unwrap().bodies.len(), 1);
}

#[tokio::test]
async fn dimension_is_checked_against_config() {
    let (url, _) = start(None, 2).await;
    let gw = EmbeddingGateway::from_config(&cfg(url, 1536)).unwrap();
    let err = gw.embed_query("hello").await.unwrap_err();
    assert!(matches!(
        err,
        EmbeddingError::DimensionMismatch { got: 2, want: 1536 }
    ));
}
