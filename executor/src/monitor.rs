use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Local;
use once_cell::sync::Lazy;
use tracing::warn;

/// Counters sampled by SHOW-style introspection and tests.
#[derive(Debug, Default)]
pub struct Metrics {
    pub queries: AtomicU64,
    pub errors: AtomicU64,
    pub slow_queries: AtomicU64,
    pub rows_returned: AtomicU64,
    pub active_connections: AtomicI64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub queries: u64,
    pub errors: u64,
    pub slow_queries: u64,
    pub rows_returned: u64,
    pub active_connections: i64,
}

#[derive(Debug, Clone)]
pub struct SlowQuery {
    pub sql: String,
    pub millis: u64,
    pub at: String,
}

/// Slow-query ring capacity.
const SLOW_LOG_CAP: usize = 128;

/// Metrics and slow-query collector wrapped around the executor entry
/// point.
pub struct Monitor {
    metrics: Metrics,
    slow_threshold: Duration,
    slow_log: Mutex<VecDeque<SlowQuery>>,
}

impl Monitor {
    pub fn new(slow_threshold: Duration) -> Self {
        Monitor {
            metrics: Metrics::default(),
            slow_threshold,
            slow_log: Mutex::new(VecDeque::with_capacity(SLOW_LOG_CAP)),
        }
    }

    pub fn record_query(&self, sql: &str, elapsed: Duration, rows: usize, failed: bool) {
        self.metrics.queries.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .rows_returned
            .fetch_add(rows as u64, Ordering::Relaxed);
        if failed {
            self.metrics.errors.fetch_add(1, Ordering::Relaxed);
        }
        if elapsed >= self.slow_threshold && !self.slow_threshold.is_zero() {
            self.metrics.slow_queries.fetch_add(1, Ordering::Relaxed);
            warn!("slow query ({:?}): {}", elapsed, sql);
            let mut log = self.slow_log.lock().unwrap();
            if log.len() == SLOW_LOG_CAP {
                log.pop_front();
            }
            log.push_back(SlowQuery {
                sql: sql.to_string(),
                millis: elapsed.as_millis() as u64,
                at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            });
        }
    }

    pub fn connection_opened(&self) {
        self.metrics
            .active_connections
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.metrics
            .active_connections
            .fetch_sub(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries: self.metrics.queries.load(Ordering::Relaxed),
            errors: self.metrics.errors.load(Ordering::Relaxed),
            slow_queries: self.metrics.slow_queries.load(Ordering::Relaxed),
            rows_returned: self.metrics.rows_returned.load(Ordering::Relaxed),
            active_connections: self.metrics.active_connections.load(Ordering::Relaxed),
        }
    }

    pub fn slow_queries(&self) -> Vec<SlowQuery> {
        self.slow_log.lock().unwrap().iter().cloned().collect()
    }
}

static GLOBAL: Lazy<RwLock<Option<Arc<Monitor>>>> = Lazy::new(|| RwLock::new(None));

pub fn init(slow_threshold: Duration) {
    *GLOBAL.write().unwrap() = Some(Arc::new(Monitor::new(slow_threshold)));
}

pub fn shutdown() {
    *GLOBAL.write().unwrap() = None;
}

pub fn global() -> Option<Arc<Monitor>> {
    GLOBAL.read().unwrap().clone()
}
