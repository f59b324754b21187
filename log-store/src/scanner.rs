//! Concurrent full scan over a paginated collection.
//!
//! Pages are chained by cursor, so the scan fans out dynamically: each fetched
//! page enqueues the cursor of the next one. Termination is tracked with a
//! pending counter instead of waiting on the queue:
//!
//! - the counter is incremented *before* a cursor is sent;
//! - it is decremented by a drop guard when that fetch ends (success, failure
//!   or panic);
//! - the task that brings it to zero wakes the dispatcher.
//!
//! A failed page is logged and ends its branch; points beyond it are not
//! reached and there is no retry.

use std::{
    collections::HashMap,
    future::Future,
    pin::Pin,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};

use tokio::{
    sync::{Notify, Semaphore, mpsc},
    task::JoinSet,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::ScanConfig,
    errors::StoreError,
    record::{ScrollPage, payload_value_string},
};

/// Boxed future returned by [`PageSource::fetch_page`].
pub type PageFuture<'a> = Pin<Box<dyn Future<Output = Result<ScrollPage, StoreError>> + Send + 'a>>;

/// Anything that serves cursor-chained pages of points.
pub trait PageSource: Send + Sync + 'static {
    /// Fetches the page starting at `offset` (`None` = first page).
    fn fetch_page<'a>(&'a self, collection: &'a str, offset: Option<u64>) -> PageFuture<'a>;
}

/// Decrements the pending counter when a fetch ends, however it ends.
struct PendingGuard {
    pending: Arc<AtomicUsize>,
    done: Arc<Notify>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.done.notify_one();
        }
    }
}

/// Reads every page reachable from a starting cursor into `id -> value`.
pub struct PageScanner {
    source: Arc<dyn PageSource>,
    cfg: ScanConfig,
}

impl PageScanner {
    pub fn new(source: Arc<dyn PageSource>, cfg: ScanConfig) -> Self {
        Self { source, cfg }
    }

    /// Scans from `start` and returns `id -> payload[value_field]`.
    ///
    /// Points without the value field are skipped. Pages that fail are
    /// logged; the map then holds whatever the other branches collected.
    pub async fn scan_all(&self, collection: &str, start: Option<u64>) -> HashMap<u64, String> {
        let started = Instant::now();
        let collection: Arc<str> = Arc::from(collection);
        let field: Arc<str> = Arc::from(self.cfg.value_field.as_str());

        let results: Arc<Mutex<HashMap<u64, String>>> = Arc::default();
        let pending = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(Notify::new());
        let permits = Arc::new(Semaphore::new(self.cfg.workers.max(1)));
        let (tx, mut rx) = mpsc::unbounded_channel::<Option<u64>>();
        let mut tasks = JoinSet::new();

        pending.fetch_add(1, Ordering::AcqRel);
        // rx is alive until the end of this function
        let _ = tx.send(start);

        info!(collection = %collection, workers = self.cfg.workers, "scan started");

        loop {
            tokio::select! {
                biased;
                _ = done.notified() => break,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(collection = %collection, error = %e, "scan task ended abnormally");
                    }
                }
                Some(cursor) = rx.recv() => {
                    let Ok(permit) = permits.clone().acquire_owned().await else {
                        break;
                    };
                    let guard = PendingGuard {
                        pending: pending.clone(),
                        done: done.clone(),
                    };
                    let source = self.source.clone();
                    let collection = collection.clone();
                    let field = field.clone();
                    let results = results.clone();
                    let pending = pending.clone();
                    let tx = tx.clone();

                    tasks.spawn(async move {
                        let _guard = guard;
                        let _permit = permit;
                        match source.fetch_page(&collection, cursor).await {
                            Ok(page) => {
                                let fetched = page.points.len();
                                {
                                    let mut map = results.lock().unwrap_or_else(PoisonError::into_inner);
                                    for p in page.points {
                                        if let Some(v) = p.payload.get(&*field) {
                                            map.insert(p.id, payload_value_string(v));
                                        }
                                    }
                                }
                                debug!(collection = %collection, ?cursor, fetched, next = ?page.next_offset, "page merged");
                                if let Some(next) = page.next_offset {
                                    pending.fetch_add(1, Ordering::AcqRel);
                                    if tx.send(Some(next)).is_err() {
                                        pending.fetch_sub(1, Ordering::AcqRel);
                                    }
                                }
                            }
                            Err(e) => {
                                warn!(collection = %collection, ?cursor, error = %e, "page fetch failed, branch dropped");
                            }
                        }
                    });
                }
            }
        }

        self.drain(&collection, &mut tasks).await;

        let out = std::mem::take(&mut *results.lock().unwrap_or_else(PoisonError::into_inner));
        info!(
            collection = %collection,
            points = out.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "scan finished"
        );
        out
    }

    /// Waits for stragglers up to the configured grace period, then aborts them.
    async fn drain(&self, collection: &str, tasks: &mut JoinSet<()>) {
        let wait = self.cfg.shutdown_wait;
        let joined = tokio::time::timeout(wait, async {
            while let Some(r) = tasks.join_next().await {
                if let Err(e) = r {
                    error!(collection, error = %e, "scan task ended abnormally");
                }
            }
        })
        .await;

        if joined.is_err() {
            warn!(collection, left = tasks.len(), wait_secs = wait.as_secs(), "scan tasks still running, aborting");
            tasks.abort_all();
        }
    }
}

impl std::fmt::Debug for PageScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageScanner").field("cfg", &self.cfg).finish_non_exhaustive()
    }
}
