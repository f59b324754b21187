//! Named operations callable with JSON arguments (`log-sync tool <name> '<json>'`).
//!
//! Each entry deserializes its own argument struct and answers with JSON.
//! Registration is explicit; nothing is discovered at runtime.

use std::{collections::BTreeMap, future::Future, pin::Pin};

use anyhow::{Context, anyhow};
use log_store::{FilterCriteria, LogStore};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::info;

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'a>>;

type Handler = Box<dyn for<'a> Fn(&'a LogStore, Value) -> ToolFuture<'a> + Send + Sync>;

struct ToolEntry {
    description: &'static str,
    handler: Handler,
}

/// Name → handler table.
pub struct ToolRegistry {
    tools: BTreeMap<&'static str, ToolEntry>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Registry with every log tool.
    pub fn with_defaults() -> Self {
        let mut r = Self::empty();
        r.register(
            "embed_messages",
            "Embed a list of messages and return their vectors",
            embed_messages,
        );
        r.register(
            "vector_similarity_search",
            "Nearest stored log lines for a text query or a raw vector",
            vector_similarity_search,
        );
        r.register(
            "get_all_points",
            "Every stored point as id -> raw log line (concurrent scan)",
            get_all_points,
        );
        r.register(
            "metadata_filtered_search",
            "Log lines matching metadata filters, optionally ranked by a text query",
            metadata_filtered_search,
        );
        r.register(
            "count_logs_by_filter",
            "Count log lines matching metadata filters",
            count_logs_by_filter,
        );
        r.register(
            "aggregate_logs",
            "Occurrences of each value of a field among log lines matching filters",
            aggregate_logs,
        );
        r.register(
            "distinct_metadata_values",
            "Distinct values of a metadata field across the collection",
            distinct_metadata_values,
        );
        r
    }

    /// Adds a tool whose arguments deserialize into `A`.
    pub fn register<A, F>(&mut self, name: &'static str, description: &'static str, f: F)
    where
        A: DeserializeOwned + Send + 'static,
        F: for<'a> Fn(&'a LogStore, A) -> ToolFuture<'a> + Send + Sync + 'static,
    {
        let handler: Handler = Box::new(move |store, raw| match serde_json::from_value::<A>(raw) {
            Ok(args) => f(store, args),
            Err(e) => invalid_args(name, e),
        });
        self.tools.insert(name, ToolEntry { description, handler });
    }

    /// `(name, description)` pairs in name order.
    pub fn list(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.tools.iter().map(|(n, e)| (*n, e.description))
    }

    /// Runs a tool by name.
    ///
    /// # Errors
    /// Unknown tool, invalid arguments or a failing operation.
    pub async fn call(&self, name: &str, store: &LogStore, args: Value) -> anyhow::Result<Value> {
        let entry = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow!("unknown tool `{name}`"))?;
        info!(tool = name, "running tool");
        (entry.handler)(store, args).await
    }
}

fn invalid_args(name: &'static str, e: serde_json::Error) -> ToolFuture<'static> {
    Box::pin(async move { Err::<Value, _>(anyhow!("invalid arguments for `{name}`: {e}")) })
}

/* ---------------------------------------------------------------------------
Argument types
--------------------------------------------------------------------------- */

#[derive(Debug, Deserialize)]
struct EmbedArgs {
    messages: Vec<String>,
}

fn default_similar_limit() -> u64 {
    5
}

fn default_filtered_limit() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
struct SimilarityArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    vector: Option<Vec<f32>>,
    #[serde(default = "default_similar_limit")]
    limit: u64,
}

#[derive(Debug, Default, Deserialize)]
struct ScanArgs {
    #[serde(default)]
    start_offset: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct FilteredSearchArgs {
    #[serde(flatten)]
    criteria: FilterCriteria,
    #[serde(default)]
    query: Option<String>,
    #[serde(default = "default_filtered_limit")]
    limit: u64,
}

#[derive(Debug, Deserialize)]
struct CountArgs {
    #[serde(flatten)]
    criteria: FilterCriteria,
}

#[derive(Debug, Deserialize)]
struct AggregateArgs {
    field: String,
    #[serde(flatten)]
    criteria: FilterCriteria,
}

#[derive(Debug, Deserialize)]
struct DistinctArgs {
    field: String,
}

/* ---------------------------------------------------------------------------
Handlers
--------------------------------------------------------------------------- */

fn embed_messages(store: &LogStore, args: EmbedArgs) -> ToolFuture<'_> {
    Box::pin(async move {
        let vectors = store.embed_messages(&args.messages).await?;
        Ok::<_, anyhow::Error>(json!({ "vectors": vectors }))
    })
}

fn vector_similarity_search(store: &LogStore, args: SimilarityArgs) -> ToolFuture<'_> {
    Box::pin(async move {
        let hits = match (args.vector, args.query) {
            (Some(v), _) => store.search(&v, args.limit).await?,
            (None, Some(q)) => store.search_text(&q, args.limit).await?,
            (None, None) => return Err(anyhow!("either `query` or `vector` is required")),
        };
        Ok::<_, anyhow::Error>(serde_json::to_value(hits)?)
    })
}

fn get_all_points(store: &LogStore, args: ScanArgs) -> ToolFuture<'_> {
    Box::pin(async move {
        let points = store.scan_all(args.start_offset).await;
        Ok::<_, anyhow::Error>(serde_json::to_value(points)?)
    })
}

fn metadata_filtered_search(store: &LogStore, args: FilteredSearchArgs) -> ToolFuture<'_> {
    Box::pin(async move {
        let vector = match &args.query {
            Some(q) => Some(
                store
                    .gateway()
                    .embed_query(q)
                    .await
                    .context("embedding the query")?,
            ),
            None => None,
        };
        let hits = store
            .search_by_filter(&args.criteria, vector.as_deref(), args.limit)
            .await?;
        Ok::<_, anyhow::Error>(serde_json::to_value(hits)?)
    })
}

fn count_logs_by_filter(store: &LogStore, args: CountArgs) -> ToolFuture<'_> {
    Box::pin(async move {
        let count = store.count_by_filter(&args.criteria).await?;
        Ok::<_, anyhow::Error>(json!({ "count": count }))
    })
}

fn aggregate_logs(store: &LogStore, args: AggregateArgs) -> ToolFuture<'_> {
    Box::pin(async move {
        let counts = store.aggregate_by_filter(&args.field, &args.criteria).await?;
        Ok::<_, anyhow::Error>(serde_json::to_value(counts)?)
    })
}

fn distinct_metadata_values(store: &LogStore, args: DistinctArgs) -> ToolFuture<'_> {
    Box::pin(async move {
        let values = store.distinct_values(&args.field).await?;
        Ok::<_, anyhow::Error>(serde_json::to_value(values)?)
    })
}
