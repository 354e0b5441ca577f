use std::collections::HashMap;
use std::sync::Arc;

use common::datasource::{DataSource, QueryContext};
use common::row::Row;
use common::value::Value;

/// A materialized CTE binding visible to scans below the outer plan.
#[derive(Debug, Clone, Default)]
pub struct CteTable {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Everything an operator needs at runtime: the data source scans talk
/// to, the cancellation-carrying query context, materialized CTEs, and a
/// snapshot of session variables for `@@name` references.
pub struct ExecContext {
    pub source: Arc<dyn DataSource>,
    pub qctx: QueryContext,
    pub ctes: HashMap<String, CteTable>,
    pub vars: HashMap<String, Value>,
}

impl ExecContext {
    pub fn new(source: Arc<dyn DataSource>, qctx: QueryContext) -> Self {
        ExecContext {
            source,
            qctx,
            ctes: HashMap::new(),
            vars: HashMap::new(),
        }
    }

    pub fn var(&self, name: &str) -> Value {
        let key = name
            .trim_start_matches("@@")
            .trim_start_matches("session.")
            .trim_start_matches("global.");
        self.vars.get(key).cloned().unwrap_or(Value::Null)
    }
}
