use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::warn;

use crate::err::{CResult, EngineError};
use crate::query::{Filter, QueryOptions};
use crate::row::Row;
use crate::schema::TableInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    #[default]
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn parse(raw: &str) -> Option<IsolationLevel> {
        Some(match raw.trim().to_ascii_uppercase().as_str() {
            "READ UNCOMMITTED" => IsolationLevel::ReadUncommitted,
            "READ COMMITTED" => IsolationLevel::ReadCommitted,
            "REPEATABLE READ" => IsolationLevel::RepeatableRead,
            "SERIALIZABLE" => IsolationLevel::Serializable,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ-UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ-COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE-READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Ambient state every data-source call carries: the enclosing transaction
/// (if any) and the cooperative cancellation flag the executor polls.
#[derive(Debug, Clone, Default)]
pub struct QueryContext {
    pub txn: Option<u64>,
    pub cancel: Arc<AtomicBool>,
    pub deadline: Option<Instant>,
}

impl QueryContext {
    pub fn background() -> Self {
        QueryContext::default()
    }

    pub fn with_txn(txn: u64) -> Self {
        QueryContext {
            txn: Some(txn),
            ..Default::default()
        }
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        if self.cancel.load(Ordering::SeqCst) {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancel.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    /// Checked before each produced row.
    pub fn ensure_active(&self) -> CResult<()> {
        if self.is_canceled() {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(EngineError::Timeout(0));
                }
            }
            return Err(EngineError::Canceled);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub total: usize,
}

impl QueryResult {
    pub fn empty(columns: Vec<String>) -> Self {
        QueryResult {
            columns,
            rows: Vec::new(),
            total: 0,
        }
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let total = rows.len();
        QueryResult {
            columns,
            rows,
            total,
        }
    }
}

/// The boundary between the engine and a storage provider. Scan operators
/// talk to tables only through this trait.
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    fn connect(&self) -> CResult<()>;

    fn close(&self) -> CResult<()>;

    fn is_connected(&self) -> bool;

    fn is_writable(&self) -> bool;

    fn get_tables(&self, ctx: &QueryContext) -> CResult<Vec<String>>;

    fn get_table_info(&self, ctx: &QueryContext, table: &str) -> CResult<TableInfo>;

    /// Cardinality hint for the cost model. Sources that cannot count cheaply
    /// keep the default.
    fn estimated_rows(&self, _ctx: &QueryContext, _table: &str) -> usize {
        1000
    }

    fn query(&self, ctx: &QueryContext, table: &str, options: &QueryOptions)
        -> CResult<QueryResult>;

    fn insert(&self, ctx: &QueryContext, table: &str, rows: &[Row]) -> CResult<usize>;

    fn update(
        &self,
        ctx: &QueryContext,
        table: &str,
        filters: &[Filter],
        updates: &Row,
    ) -> CResult<usize>;

    fn delete(&self, ctx: &QueryContext, table: &str, filters: &[Filter]) -> CResult<usize>;

    fn create_table(&self, ctx: &QueryContext, info: &TableInfo) -> CResult<()>;

    fn drop_table(&self, ctx: &QueryContext, table: &str) -> CResult<()>;

    fn truncate_table(&self, ctx: &QueryContext, table: &str) -> CResult<()>;

    /// Raw statement passthrough; most sources do not support it.
    fn execute(&self, _ctx: &QueryContext, sql: &str) -> CResult<QueryResult> {
        Err(EngineError::Unsupported(format!(
            "data source does not execute raw SQL: {}",
            sql
        )))
    }

    /// Present when the source supports transactions.
    fn as_transactional(&self) -> Option<&dyn TransactionalSource> {
        None
    }
}

/// Extension for MVCC-capable sources.
pub trait TransactionalSource: Send + Sync {
    fn begin(&self, level: IsolationLevel) -> CResult<u64>;

    fn commit(&self, txn: u64) -> CResult<()>;

    fn rollback(&self, txn: u64) -> CResult<()>;

    /// Statement boundary notification; READ COMMITTED refreshes its
    /// snapshot here.
    fn begin_statement(&self, txn: u64) -> CResult<()>;
}

/// Catalog view the planner consults while building and costing plans.
pub trait Catalog {
    fn table_info(&self, table: &str) -> CResult<TableInfo>;

    fn table_rows(&self, table: &str) -> usize;
}

/// Connect with exponential backoff: 1s initial, doubling, 3 attempts.
/// Only connect is retried; query-time failures surface immediately.
pub fn connect_with_retry(source: &dyn DataSource) -> CResult<()> {
    let mut delay = Duration::from_secs(1);
    let mut last = None;
    for attempt in 1..=3 {
        match source.connect() {
            Ok(()) => return Ok(()),
            Err(err) => {
                warn!(
                    "connect to data source '{}' failed (attempt {}/3): {}",
                    source.name(),
                    attempt,
                    err
                );
                last = Some(err);
                if attempt < 3 {
                    std::thread::sleep(delay);
                    delay *= 2;
                }
            }
        }
    }
    Err(last.unwrap_or_else(|| EngineError::Connection("connect failed".to_string())))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn isolation_parsing() {
        assert_eq!(
            IsolationLevel::parse("repeatable read"),
            Some(IsolationLevel::RepeatableRead)
        );
        assert_eq!(
            IsolationLevel::parse("SERIALIZABLE"),
            Some(IsolationLevel::Serializable)
        );
        assert_eq!(IsolationLevel::parse("strict"), None);
    }

    #[test]
    fn context_cancellation() {
        let ctx = QueryContext::background();
        assert!(ctx.ensure_active().is_ok());
        ctx.cancel();
        assert!(matches!(ctx.ensure_active(), Err(EngineError::Canceled)));
    }

    #[test]
    fn deadline_trips_cancel_flag() {
        let mut ctx = QueryContext::background();
        ctx.deadline = Some(Instant::now() - Duration::from_millis(1));
        assert!(ctx.is_canceled());
        assert!(ctx.ensure_active().is_err());
    }
}
