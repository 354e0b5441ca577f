use std::sync::Arc;

use common::config::{DataSourceConfig, ServerConfig};
use common::datasource::{DataSource, QueryResult};
use common::err::CResult;
use common::value::Value;
use server::{Session, SourceSet, StatementOutcome};
use storage::MemoryEngine;

/// A session over a fresh in-memory engine named `main`.
pub fn fresh_session() -> (Session, Arc<SourceSet>) {
    let engine = MemoryEngine::from_config(&DataSourceConfig::memory("main"));
    engine.connect().expect("memory engine connects");
    let mut set = SourceSet::new();
    set.insert("main", engine);
    let set = Arc::new(set);
    (Session::new(1, Arc::clone(&set), ServerConfig::default()), set)
}

/// A second session sharing the first one's engine.
pub fn sibling_session(set: &Arc<SourceSet>, id: u64) -> Session {
    Session::new(id, Arc::clone(set), ServerConfig::default())
}

pub fn rows(session: &mut Session, sql: &str) -> CResult<QueryResult> {
    match session.execute(sql)? {
        StatementOutcome::Rows(result) => Ok(result),
        other => panic!("expected rows from {:?}, got {:?}", sql, other),
    }
}

pub fn affected(session: &mut Session, sql: &str) -> CResult<u64> {
    match session.execute(sql)? {
        StatementOutcome::Ok { affected, .. } => Ok(affected),
        other => panic!("expected ok from {:?}, got {:?}", sql, other),
    }
}

/// Single scalar out of a single-row result.
pub fn scalar(session: &mut Session, sql: &str) -> Value {
    let result = rows(session, sql).expect("query succeeds");
    assert_eq!(result.rows.len(), 1, "expected one row from {}", sql);
    let column = result.columns.first().expect("one column").clone();
    result.rows[0].value(&column)
}
