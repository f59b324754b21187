//! Fixed-window call ceiling for embedding requests.
//!
//! This is a hard ceiling, not a token bucket: each call counts once in the
//! current window; once the count passes `max_calls` callers wait (polling)
//! until the window rolls over. Windows are anchored at construction and roll
//! every `period` whether or not anything is calling. Bursts inside a window
//! are not smoothed.
//!
//! Time comes from an injected [`Clock`], so tests can move the window
//! forward without sleeping through a real period.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::config::embedding_model_config::RateLimitConfig;

/// Source of "now" for the window.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock (`Instant::now`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct WindowState {
    started: Instant,
    calls: u64,
    /// Bumped on every roll-over; blocked callers wait for it to change.
    generation: u64,
}

/// Process-local call counter with a fixed capacity and reset period.
pub struct RateLimitWindow {
    cfg: RateLimitConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<WindowState>,
}

impl std::fmt::Debug for RateLimitWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitWindow")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl RateLimitWindow {
    /// Window driven by the wall clock.
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self::with_clock(cfg, Arc::new(SystemClock))
    }

    /// Window driven by a custom clock.
    pub fn with_clock(cfg: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let started = clock.now();
        Self {
            cfg,
            clock,
            state: Mutex::new(WindowState {
                started,
                calls: 0,
                generation: 0,
            }),
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.cfg
    }

    /// Calls counted in the current window (after applying any pending roll-over).
    pub fn calls_in_window(&self) -> u64 {
        let mut st = self.lock();
        self.roll(&mut st);
        st.calls
    }

    /// Counts one call; `Err(generation)` when that pushed the window over capacity.
    fn try_count(&self) -> Result<(), u64> {
        let mut st = self.lock();
        self.roll(&mut st);
        st.calls += 1;
        if st.calls <= self.cfg.max_calls {
            Ok(())
        } else {
            Err(st.generation)
        }
    }

    fn generation(&self) -> u64 {
        let mut st = self.lock();
        self.roll(&mut st);
        st.generation
    }

    /// Counts one call, waiting for the next window while the ceiling is exceeded.
    ///
    /// A blocked caller re-counts itself in the window it wakes up in, so a
    /// large backlog drains over several windows instead of all at once.
    pub async fn acquire(&self) {
        loop {
            let blocked_at = match self.try_count() {
                Ok(()) => return,
                Err(generation) => generation,
            };

            warn!(
                max_calls = self.cfg.max_calls,
                period_secs = self.cfg.period.as_secs(),
                "embedding call ceiling reached, waiting for reset"
            );

            while self.generation() == blocked_at {
                tokio::time::sleep(self.cfg.poll_interval).await;
            }
        }
    }

    fn roll(&self, st: &mut WindowState) {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(st.started);
        if elapsed < self.cfg.period {
            return;
        }
        let periods = elapsed.as_nanos() / self.cfg.period.as_nanos().max(1);
        let advance = nanos_to_duration(self.cfg.period.as_nanos() * periods);
        st.started += advance;
        st.calls = 0;
        st.generation += 1;
        info!(generation = st.generation, "embedding call counter reset");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn nanos_to_duration(nanos: u128) -> Duration {
    let secs = (nanos / 1_000_000_000) as u64;
    let sub = (nanos % 1_000_000_000) as u32;
    Duration::new(secs, sub)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clock that only moves when told to.
    struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        fn advance(&self, by: Duration) {
            *self.offset.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock().unwrap()
        }
    }

    fn cfg(max_calls: u64) -> RateLimitConfig {
        RateLimitConfig {
            max_calls,
            period: Duration::from_secs(60),
            poll_interval: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn calls_under_capacity_pass_immediately() {
        let clock = Arc::new(ManualClock::new());
        let window = RateLimitWindow::with_clock(cfg(3), clock);
        for _ in 0..3 {
            window.acquire().await;
        }
        assert_eq!(window.calls_in_window(), 3);
    }

    #[tokio::test]
    async fn counter_resets_on_schedule_without_load() {
        let clock = Arc::new(ManualClock::new());
        let window = RateLimitWindow::with_clock(cfg(10), clock.clone());
        window.acquire().await;
        window.acquire().await;
        clock.advance(Duration::from_secs(59));
        assert_eq!(window.calls_in_window(), 2);
        clock.advance(Duration::from_secs(1));
        assert_eq!(window.calls_in_window(), 0);

        // long idle stretches skip whole windows; the schedule stays anchored
        clock.advance(Duration::from_secs(60 * 5 + 30));
        window.acquire().await;
        clock.advance(Duration::from_secs(29));
        assert_eq!(window.calls_in_window(), 1);
        clock.advance(Duration::from_secs(1));
        assert_eq!(window.calls_in_window(), 0);
    }

    #[tokio::test]
    async fn caller_over_ceiling_waits_for_reset() {
        let clock = Arc::new(ManualClock::new());
        let window = Arc::new(RateLimitWindow::with_clock(cfg(2), clock.clone()));
        window.acquire().await;
        window.acquire().await;

        let blocked = {
            let window = window.clone();
            tokio::spawn(async move { window.acquire().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished(), "third call must wait for the window");

        clock.advance(Duration::from_secs(60));
        tokio::time::timeout(Duration::from_secs(2), blocked)
            .await
            .expect("blocked caller released after reset")
            .unwrap();

        // it counted itself in the fresh window
        assert_eq!(window.calls_in_window(), 1);
    }
}
