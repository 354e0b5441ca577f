use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use common::config::ServerConfig;
use common::datasource::{
    Catalog, DataSource, IsolationLevel, QueryContext, QueryResult, TransactionalSource,
};
use common::err::{CResult, EngineError};
use common::query::Filter;
use common::row::Row;
use common::value::{like_match, Value};
use executor::{cache, monitor, ExecContext, Executor};
use planner::ast::statement::{SelectPlan, ShowKind, Statement};
use planner::physical::plan::{PhysicalPlan, PhysicalSelect};

use crate::SERVER_VERSION;

/// Named data sources the server multiplexes; the session's current
/// database selects one.
#[derive(Default)]
pub struct SourceSet {
    sources: HashMap<String, Arc<dyn DataSource>>,
}

impl SourceSet {
    pub fn new() -> Self {
        SourceSet::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: Arc<dyn DataSource>) {
        self.sources.insert(name.into(), source);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DataSource>> {
        self.sources.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Planner-facing catalog view over one data source.
pub struct SourceCatalog {
    source: Arc<dyn DataSource>,
}

impl SourceCatalog {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        SourceCatalog { source }
    }
}

impl Catalog for SourceCatalog {
    fn table_info(&self, table: &str) -> CResult<common::schema::TableInfo> {
        self.source
            .get_table_info(&QueryContext::background(), table)
    }

    fn table_rows(&self, table: &str) -> usize {
        self.source
            .estimated_rows(&QueryContext::background(), table)
    }
}

#[derive(Debug)]
pub enum StatementOutcome {
    Rows(QueryResult),
    Ok { affected: u64, last_insert_id: u64 },
}

#[derive(Debug, Clone)]
pub struct PreparedStatement {
    pub sql: String,
    pub param_count: usize,
}

/// Per-connection state: current database, autocommit, the open
/// transaction, prepared statements and session variables. Dropping the
/// session aborts whatever transaction is still open.
pub struct Session {
    pub id: u64,
    sources: Arc<SourceSet>,
    config: ServerConfig,
    pub current_db: String,
    pub autocommit: bool,
    isolation: IsolationLevel,
    txn: Option<u64>,
    /// Tables written inside the open transaction; their cache entries are
    /// purged again when the commit makes the writes visible.
    txn_tables: Vec<String>,
    prepared: HashMap<u32, PreparedStatement>,
    next_stmt_id: u32,
    vars: HashMap<String, Value>,
}

impl Session {
    pub fn new(id: u64, sources: Arc<SourceSet>, config: ServerConfig) -> Session {
        let mut vars: HashMap<String, Value> = HashMap::new();
        vars.insert("version".into(), Value::String(SERVER_VERSION.into()));
        vars.insert("version_comment".into(), Value::String("rsql".into()));
        vars.insert("autocommit".into(), Value::Int(1));
        vars.insert("character_set_client".into(), Value::String("utf8mb4".into()));
        vars.insert("character_set_results".into(), Value::String("utf8mb4".into()));
        vars.insert(
            "character_set_connection".into(),
            Value::String("utf8mb4".into()),
        );
        vars.insert(
            "collation_connection".into(),
            Value::String("utf8mb4_general_ci".into()),
        );
        vars.insert("max_allowed_packet".into(), Value::Int(16 * 1024 * 1024));
        vars.insert("sql_mode".into(), Value::String(String::new()));
        vars.insert(
            "transaction_isolation".into(),
            Value::String(IsolationLevel::default().name().into()),
        );
        let current_db = config.default_database.clone();
        Session {
            id,
            sources,
            config,
            current_db,
            autocommit: true,
            isolation: IsolationLevel::default(),
            txn: None,
            txn_tables: Vec::new(),
            prepared: HashMap::new(),
            next_stmt_id: 1,
            vars,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    fn source(&self) -> CResult<Arc<dyn DataSource>> {
        self.sources
            .get(&self.current_db)
            .ok_or_else(|| EngineError::SourceIo(format!("Unknown database '{}'", self.current_db)))
    }

    fn with_transactional<R>(
        &self,
        f: impl FnOnce(&dyn TransactionalSource) -> CResult<R>,
    ) -> CResult<R> {
        let source = self.source()?;
        match source.as_transactional() {
            Some(txn_source) => f(txn_source),
            None => Err(EngineError::Unsupported(format!(
                "data source '{}' does not support transactions",
                self.current_db
            ))),
        }
    }

    fn query_context(&self) -> QueryContext {
        let mut ctx = match self.txn {
            Some(txn) => QueryContext::with_txn(txn),
            None => QueryContext::background(),
        };
        if self.config.query_timeout_ms > 0 {
            ctx.deadline = Some(Instant::now() + Duration::from_millis(self.config.query_timeout_ms));
        }
        ctx
    }

    fn exec_context(&self, qctx: QueryContext) -> CResult<ExecContext> {
        let mut ctx = ExecContext::new(self.source()?, qctx);
        ctx.vars = self.vars.clone();
        ctx.vars
            .insert("database".into(), Value::String(self.current_db.clone()));
        Ok(ctx)
    }

    /// Execute a possibly multi-statement script in order, stopping at the
    /// first error. The caller gets the last statement's outcome.
    #[instrument(skip(self, sql), fields(session = self.id))]
    pub fn execute(&mut self, sql: &str) -> CResult<StatementOutcome> {
        let started = Instant::now();
        let result = self.execute_inner(sql);
        if let Some(monitor) = monitor::global() {
            let rows = match &result {
                Ok(StatementOutcome::Rows(r)) => r.rows.len(),
                _ => 0,
            };
            monitor.record_query(sql, started.elapsed(), rows, result.is_err());
        }
        result
    }

    fn execute_inner(&mut self, sql: &str) -> CResult<StatementOutcome> {
        let pieces = planner::split_statements(sql);
        if pieces.is_empty() {
            return Err(EngineError::Parse("empty statement".to_string()));
        }
        // each piece parses and runs on its own, so a broken later
        // statement cannot block the ones before it
        let mut last = None;
        for piece in pieces {
            let catalog = SourceCatalog::new(self.source()?);
            let statement = planner::ast::adapter::parse_single(&piece, &catalog)?;
            last = Some(self.execute_statement(statement, &piece)?);
        }
        Ok(last.expect("at least one statement"))
    }

    fn execute_statement(
        &mut self,
        statement: Statement,
        raw_sql: &str,
    ) -> CResult<StatementOutcome> {
        match statement {
            Statement::Select(select) => self.run_select(select, raw_sql),
            Statement::Insert {
                table,
                columns,
                rows,
            } => self.run_insert(&table, &columns, rows),
            Statement::Update {
                table,
                assignments,
                selection,
            } => self.run_update(&table, assignments, selection),
            Statement::Delete { table, selection } => self.run_delete(&table, selection),
            Statement::CreateTable(info) => {
                self.source()?
                    .create_table(&self.query_context(), &info)?;
                Ok(StatementOutcome::Ok {
                    affected: 0,
                    last_insert_id: 0,
                })
            }
            Statement::DropTable { name, if_exists } => {
                match self.source()?.drop_table(&self.query_context(), &name) {
                    Ok(()) => {}
                    Err(EngineError::TableNotFound(_)) if if_exists => {}
                    Err(err) => return Err(err),
                }
                self.invalidate(&name);
                Ok(StatementOutcome::Ok {
                    affected: 0,
                    last_insert_id: 0,
                })
            }
            Statement::TruncateTable { name } => {
                self.source()?
                    .truncate_table(&self.query_context(), &name)?;
                self.invalidate(&name);
                Ok(StatementOutcome::Ok {
                    affected: 0,
                    last_insert_id: 0,
                })
            }
            Statement::Set { name, value } => self.run_set(&name, &value),
            Statement::SetIsolation(level) => {
                self.isolation = level;
                self.vars.insert(
                    "transaction_isolation".into(),
                    Value::String(level.name().into()),
                );
                Ok(StatementOutcome::Ok {
                    affected: 0,
                    last_insert_id: 0,
                })
            }
            Statement::Use { database } => {
                if self.sources.get(&database).is_none() {
                    return Err(EngineError::SourceIo(format!(
                        "Unknown database '{}'",
                        database
                    )));
                }
                self.current_db = database;
                Ok(StatementOutcome::Ok {
                    affected: 0,
                    last_insert_id: 0,
                })
            }
            Statement::Begin => {
                // BEGIN implicitly commits a transaction already open
                if self.txn.is_some() {
                    self.commit_txn()?;
                }
                self.begin_txn()?;
                Ok(StatementOutcome::Ok {
                    affected: 0,
                    last_insert_id: 0,
                })
            }
            Statement::Commit => {
                self.commit_txn()?;
                Ok(StatementOutcome::Ok {
                    affected: 0,
                    last_insert_id: 0,
                })
            }
            Statement::Rollback => {
                self.rollback_txn()?;
                Ok(StatementOutcome::Ok {
                    affected: 0,
                    last_insert_id: 0,
                })
            }
            Statement::Show(kind) => self.run_show(kind),
            Statement::Describe { table } => self.describe(&table),
            Statement::Explain(select) => {
                let physical = planner::plan_select(&select)?;
                let lines = Executor::explain(&physical);
                let rows = lines
                    .into_iter()
                    .map(|line| Row::from_pairs([("EXPLAIN", Value::String(line))]))
                    .collect();
                Ok(StatementOutcome::Rows(QueryResult::new(
                    vec!["EXPLAIN".to_string()],
                    rows,
                )))
            }
        }
    }

    fn run_select(&mut self, select: SelectPlan, raw_sql: &str) -> CResult<StatementOutcome> {
        self.ensure_statement_txn()?;

        let cacheable = self.txn.is_none();
        let fingerprint = cache::QueryCache::fingerprint(&self.current_db, raw_sql);
        if cacheable {
            if let Some(cache) = cache::global() {
                if let Some(hit) = cache.get(&fingerprint) {
                    debug!("query cache hit for session {}", self.id);
                    return Ok(StatementOutcome::Rows((*hit).clone()));
                }
            }
        }

        let physical = planner::plan_select(&select)?;
        let mut ctx = self.exec_context(self.query_context())?;
        let result = Executor::execute_select(&physical, &mut ctx)?;

        if cacheable {
            if let Some(cache) = cache::global() {
                cache.put(
                    fingerprint,
                    Arc::new(result.clone()),
                    collect_tables(&physical),
                );
            }
        }
        Ok(StatementOutcome::Rows(result))
    }

    fn run_insert(
        &mut self,
        table: &str,
        columns: &[String],
        rows: Vec<Vec<planner::Expr>>,
    ) -> CResult<StatementOutcome> {
        self.ensure_statement_txn()?;
        let source = self.source()?;
        let info = source.get_table_info(&QueryContext::background(), table)?;
        let ctx = self.exec_context(QueryContext::background())?;
        let empty = Row::new();

        let target_columns: Vec<String> = if columns.is_empty() {
            info.column_names()
        } else {
            columns.to_vec()
        };

        let mut shaped = Vec::with_capacity(rows.len());
        for exprs in rows {
            if exprs.len() > target_columns.len() {
                return Err(EngineError::Parse(format!(
                    "row has {} values but {} columns",
                    exprs.len(),
                    target_columns.len()
                )));
            }
            let mut row = Row::new();
            for (column, expr) in target_columns.iter().zip(exprs) {
                row.set(column.clone(), executor::expression::evaluate(&expr, &empty, &ctx)?);
            }
            shaped.push(row);
        }

        let affected = source.insert(&self.query_context(), table, &shaped)?;
        self.note_write(table);
        Ok(StatementOutcome::Ok {
            affected: affected as u64,
            last_insert_id: 0,
        })
    }

    fn run_update(
        &mut self,
        table: &str,
        assignments: Vec<(String, planner::Expr)>,
        selection: Option<planner::Expr>,
    ) -> CResult<StatementOutcome> {
        self.ensure_statement_txn()?;
        let filters = selection_to_filters(selection)?;
        let ctx = self.exec_context(QueryContext::background())?;
        let empty = Row::new();
        let mut updates = Row::new();
        for (column, expr) in assignments {
            let value =
                executor::expression::evaluate(&expr, &empty, &ctx).map_err(|err| match err {
                    EngineError::ColumnNotFound(_) => EngineError::Unsupported(
                        "UPDATE expressions must be constant".to_string(),
                    ),
                    other => other,
                })?;
            updates.set(column, value);
        }
        let affected = self
            .source()?
            .update(&self.query_context(), table, &filters, &updates)?;
        self.note_write(table);
        Ok(StatementOutcome::Ok {
            affected: affected as u64,
            last_insert_id: 0,
        })
    }

    fn run_delete(
        &mut self,
        table: &str,
        selection: Option<planner::Expr>,
    ) -> CResult<StatementOutcome> {
        self.ensure_statement_txn()?;
        let filters = selection_to_filters(selection)?;
        let affected = self
            .source()?
            .delete(&self.query_context(), table, &filters)?;
        self.note_write(table);
        Ok(StatementOutcome::Ok {
            affected: affected as u64,
            last_insert_id: 0,
        })
    }

    fn run_set(&mut self, name: &str, value: &str) -> CResult<StatementOutcome> {
        match name {
            "autocommit" => {
                let on = matches!(value.to_ascii_lowercase().as_str(), "1" | "on" | "true");
                // switching autocommit back on commits the open transaction
                if on && self.txn.is_some() {
                    self.commit_txn()?;
                }
                self.autocommit = on;
                self.vars
                    .insert("autocommit".into(), Value::Int(on as i32));
            }
            "names" => {
                for var in [
                    "character_set_client",
                    "character_set_results",
                    "character_set_connection",
                ] {
                    self.vars.insert(var.into(), Value::String(value.to_string()));
                }
            }
            other => {
                let normalized = other.trim_start_matches("session.");
                self.vars
                    .insert(normalized.to_string(), Value::String(value.to_string()));
            }
        }
        Ok(StatementOutcome::Ok {
            affected: 0,
            last_insert_id: 0,
        })
    }

    fn run_show(&mut self, kind: ShowKind) -> CResult<StatementOutcome> {
        let result = match kind {
            ShowKind::Databases => QueryResult::new(
                vec!["Database".to_string()],
                self.sources
                    .names()
                    .into_iter()
                    .map(|name| Row::from_pairs([("Database", Value::String(name))]))
                    .collect(),
            ),
            ShowKind::Tables => {
                let column = format!("Tables_in_{}", self.current_db);
                let tables = self.source()?.get_tables(&self.query_context())?;
                QueryResult::new(
                    vec![column.clone()],
                    tables
                        .into_iter()
                        .map(|name| Row::from_pairs([(column.clone(), Value::String(name))]))
                        .collect(),
                )
            }
            ShowKind::Columns { table } => return self.describe(&table),
            ShowKind::Variables { like } => {
                let mut names: Vec<&String> = self.vars.keys().collect();
                names.sort();
                let rows = names
                    .into_iter()
                    .filter(|name| match &like {
                        Some(pattern) => like_match(name, pattern),
                        None => true,
                    })
                    .map(|name| {
                        Row::from_pairs([
                            ("Variable_name", Value::String(name.clone())),
                            ("Value", Value::String(self.vars[name].to_string())),
                        ])
                    })
                    .collect();
                QueryResult::new(
                    vec!["Variable_name".to_string(), "Value".to_string()],
                    rows,
                )
            }
        };
        Ok(StatementOutcome::Rows(result))
    }

    fn describe(&mut self, table: &str) -> CResult<StatementOutcome> {
        let info = self
            .source()?
            .get_table_info(&self.query_context(), table)?;
        let rows = info
            .columns
            .iter()
            .map(|col| {
                let key = if col.primary_key {
                    "PRI"
                } else if col.unique {
                    "UNI"
                } else {
                    ""
                };
                Row::from_pairs([
                    ("Field", Value::String(col.name.clone())),
                    ("Type", Value::String(col.data_type.name().to_string())),
                    (
                        "Null",
                        Value::String(if col.nullable { "YES" } else { "NO" }.to_string()),
                    ),
                    ("Key", Value::String(key.to_string())),
                    (
                        "Default",
                        col.default
                            .clone()
                            .map(|v| Value::String(v.to_string()))
                            .unwrap_or(Value::Null),
                    ),
                    (
                        "Extra",
                        Value::String(
                            if col.auto_increment {
                                "auto_increment"
                            } else {
                                ""
                            }
                            .to_string(),
                        ),
                    ),
                ])
            })
            .collect();
        Ok(StatementOutcome::Rows(QueryResult::new(
            ["Field", "Type", "Null", "Key", "Default", "Extra"]
                .into_iter()
                .map(String::from)
                .collect(),
            rows,
        )))
    }

    /// Autocommit-off sessions open their transaction lazily at the first
    /// statement; explicit transactions refresh per-statement state.
    fn ensure_statement_txn(&mut self) -> CResult<()> {
        if self.txn.is_none() && !self.autocommit {
            self.begin_txn()?;
        }
        if let Some(txn) = self.txn {
            self.with_transactional(|t| t.begin_statement(txn))?;
        }
        Ok(())
    }

    fn begin_txn(&mut self) -> CResult<()> {
        let isolation = self.isolation;
        let txn = self.with_transactional(|t| t.begin(isolation))?;
        debug!("session {} begins txn {}", self.id, txn);
        self.txn = Some(txn);
        Ok(())
    }

    fn commit_txn(&mut self) -> CResult<()> {
        let Some(txn) = self.txn.take() else {
            return Ok(());
        };
        let result = self.with_transactional(|t| t.commit(txn));
        // the commit just made these writes visible to other sessions
        for table in std::mem::take(&mut self.txn_tables) {
            self.invalidate(&table);
        }
        result
    }

    fn rollback_txn(&mut self) -> CResult<()> {
        let Some(txn) = self.txn.take() else {
            return Ok(());
        };
        self.txn_tables.clear();
        self.with_transactional(|t| t.rollback(txn))
    }

    fn invalidate(&self, table: &str) {
        if let Some(cache) = cache::global() {
            cache.invalidate_table(table);
        }
    }

    /// A write happened: purge cached reads now, and remember the table
    /// for a second purge at commit time when the write becomes visible.
    fn note_write(&mut self, table: &str) {
        self.invalidate(table);
        if self.txn.is_some() && !self.txn_tables.iter().any(|t| t == table) {
            self.txn_tables.push(table.to_string());
        }
    }

    //////////////////////
    // prepared statements
    //////////////////////

    pub fn prepare(&mut self, sql: &str) -> CResult<(u32, PreparedStatement)> {
        let param_count = count_placeholders(sql);
        let id = self.next_stmt_id;
        self.next_stmt_id += 1;
        let statement = PreparedStatement {
            sql: sql.to_string(),
            param_count,
        };
        self.prepared.insert(id, statement.clone());
        debug!(
            "session {} prepared stmt {} with {} params",
            self.id, id, param_count
        );
        Ok((id, statement))
    }

    pub fn prepared(&self, stmt_id: u32) -> CResult<&PreparedStatement> {
        self.prepared.get(&stmt_id).ok_or_else(|| {
            EngineError::Protocol(format!("unknown prepared statement {}", stmt_id))
        })
    }

    pub fn execute_prepared(
        &mut self,
        stmt_id: u32,
        params: Vec<Value>,
    ) -> CResult<StatementOutcome> {
        let statement = self.prepared(stmt_id)?.clone();
        if params.len() != statement.param_count {
            return Err(EngineError::Protocol(format!(
                "statement {} expects {} parameters, got {}",
                stmt_id,
                statement.param_count,
                params.len()
            )));
        }
        let bound = bind_placeholders(&statement.sql, &params);
        self.execute(&bound)
    }

    pub fn close_prepared(&mut self, stmt_id: u32) {
        self.prepared.remove(&stmt_id);
    }

    /// Connection teardown: whatever transaction is open gets aborted.
    /// Idempotent; `Drop` calls it as the backstop for sessions that go
    /// out of scope without an explicit disconnect.
    pub fn disconnect(&mut self) {
        if self.txn.is_some() {
            let _ = self.rollback_txn();
        }
        self.prepared.clear();
    }

    pub fn var(&self, name: &str) -> Value {
        self.vars.get(name).cloned().unwrap_or(Value::Null)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// WHERE clause → conjunction of source filters. Predicates the filter
/// form cannot express are refused rather than silently mis-applied.
fn selection_to_filters(selection: Option<planner::Expr>) -> CResult<Vec<Filter>> {
    let Some(expr) = selection else {
        return Ok(Vec::new());
    };
    match expr.to_filter() {
        Some(filter) => Ok(vec![filter]),
        None => Err(EngineError::Unsupported(
            "WHERE clause is not expressible as source filters".to_string(),
        )),
    }
}

/// Count `?` placeholders outside string literals.
fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' && q != '`' {
                    chars.next();
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => count += 1,
                _ => {}
            },
        }
    }
    count
}

/// Positional parameter binding by literal substitution, quote aware.
fn bind_placeholders(sql: &str, params: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len() + params.len() * 8);
    let mut quote: Option<char> = None;
    let mut next_param = 0;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == '\\' && q != '`' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                '?' => {
                    let value = params.get(next_param).unwrap_or(&Value::Null);
                    next_param += 1;
                    out.push_str(&literal_sql(value));
                }
                _ => out.push(c),
            },
        }
    }
    out
}

fn literal_sql(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Blob(bytes) => {
            let mut out = String::from("X'");
            for b in bytes {
                out.push_str(&format!("{:02x}", b));
            }
            out.push('\'');
            out
        }
        Value::Date(_) | Value::Time(_) | Value::DateTime(_) | Value::Timestamp(_) => {
            format!("'{}'", value)
        }
        other => other.to_string(),
    }
}

/// Tables a plan reads, recorded on cache entries for invalidation.
fn collect_tables(select: &PhysicalSelect) -> Vec<String> {
    fn walk(plan: &PhysicalPlan, out: &mut Vec<String>) {
        match plan {
            PhysicalPlan::TableScan { table, .. } => out.push(table.clone()),
            PhysicalPlan::Filter { input, .. }
            | PhysicalPlan::Project { input, .. }
            | PhysicalPlan::HashAggregate { input, .. }
            | PhysicalPlan::Sort { input, .. }
            | PhysicalPlan::Limit { input, .. }
            | PhysicalPlan::WindowOp { input, .. } => walk(input, out),
            PhysicalPlan::HashJoin { left, right, .. } => {
                walk(left, out);
                walk(right, out);
            }
            PhysicalPlan::UnionAll { inputs } => {
                for input in inputs {
                    walk(input, out);
                }
            }
            PhysicalPlan::Values { .. } => {}
        }
    }
    let mut out = Vec::new();
    for cte in &select.ctes {
        walk(&cte.plan, &mut out);
    }
    walk(&select.root, &mut out);
    out.sort();
    out.dedup();
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn placeholder_counting_ignores_strings() {
        assert_eq!(count_placeholders("SELECT ? WHERE a = '?' AND b = ?"), 2);
        assert_eq!(count_placeholders("SELECT 1"), 0);
    }

    #[test]
    fn binding_is_quote_aware() {
        let bound = bind_placeholders(
            "SELECT * FROM t WHERE name = ? AND tag = '?q' AND n = ?",
            &[Value::String("O'Brien".into()), Value::Int(5)],
        );
        assert_eq!(
            bound,
            "SELECT * FROM t WHERE name = 'O\\'Brien' AND tag = '?q' AND n = 5"
        );
    }

    #[test]
    fn literal_rendering() {
        assert_eq!(literal_sql(&Value::Null), "NULL");
        assert_eq!(literal_sql(&Value::Int(3)), "3");
        assert_eq!(literal_sql(&Value::Blob(vec![0xab, 0x01])), "X'ab01'");
    }
}
