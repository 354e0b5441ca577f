use std::sync::mpsc::sync_channel;

use common::err::{CResult, EngineError};
use common::query::QueryOptions;
use common::row::Row;
use planner::physical::plan::PhysicalPlan;
use tracing::debug;

use crate::context::ExecContext;
use crate::operator::Operator;
use crate::pool;

/// Rows per chunk handed to a scan worker.
const CHUNK_SIZE: usize = 1024;

/// Leaf scan: pushes filters, read cap and projection into the data
/// source, then streams the materialized batch. CTE bindings short-circuit
/// the source entirely.
///
/// Parallel mode fans the fetched batch out to the worker pool in chunks;
/// workers project their chunk and a bounded channel brings the chunks
/// back in order.
pub struct TableScanExec {
    table: String,
    options: QueryOptions,
    parallel: bool,
    from_cte: bool,
    projection: Vec<String>,
    rows: Vec<Row>,
    cursor: usize,
    /// Rows actually fetched from the source, before the read cap check in
    /// tests; mirrors what the source reported.
    pub rows_read: usize,
}

impl TableScanExec {
    pub fn new(plan: &PhysicalPlan) -> CResult<TableScanExec> {
        let PhysicalPlan::TableScan {
            table,
            filters,
            limit,
            projection,
            parallel,
            from_cte,
            ..
        } = plan
        else {
            return Err(EngineError::Internal("TableScanExec needs a scan node".into()));
        };
        Ok(TableScanExec {
            table: table.clone(),
            options: QueryOptions {
                filters: filters.clone(),
                order_by: None,
                order: Default::default(),
                limit: *limit,
                offset: None,
                columns: projection.clone(),
                select_all: projection.is_empty(),
            },
            parallel: *parallel,
            from_cte: *from_cte,
            projection: projection.clone(),
            rows: Vec::new(),
            cursor: 0,
            rows_read: 0,
        })
    }

    fn load_from_cte(&mut self, ctx: &ExecContext) -> CResult<()> {
        let cte = ctx.ctes.get(&self.table).ok_or_else(|| {
            EngineError::Internal(format!("CTE '{}' was not materialized", self.table))
        })?;
        let mut rows: Vec<Row> = cte
            .rows
            .iter()
            .filter(|row| self.options.filters.iter().all(|f| f.matches(row)))
            .cloned()
            .collect();
        if let Some(cap) = self.options.limit {
            rows.truncate(cap);
        }
        if !self.projection.is_empty() {
            rows = rows
                .into_iter()
                .map(|row| row.project(&self.projection))
                .collect();
        }
        self.rows_read = rows.len();
        self.rows = rows;
        Ok(())
    }

    fn project_parallel(&self, rows: Vec<Row>) -> Vec<Row> {
        let projection = self.projection.clone();
        let chunks: Vec<Vec<Row>> = rows
            .chunks(CHUNK_SIZE)
            .map(|c| c.to_vec())
            .collect();
        let total = chunks.len();
        let (tx, rx) = sync_channel::<(usize, Vec<Row>)>(pool::workers());
        for (index, chunk) in chunks.into_iter().enumerate() {
            let tx = tx.clone();
            let projection = projection.clone();
            pool::spawn_blocking(move || {
                let projected = if projection.is_empty() {
                    chunk
                } else {
                    chunk.into_iter().map(|r| r.project(&projection)).collect()
                };
                let _ = tx.send((index, projected));
            });
        }
        drop(tx);
        let mut parts: Vec<Option<Vec<Row>>> = (0..total).map(|_| None).collect();
        for (index, part) in rx {
            parts[index] = Some(part);
        }
        parts.into_iter().flatten().flatten().collect()
    }
}

impl Operator for TableScanExec {
    fn open(&mut self, ctx: &ExecContext) -> CResult<()> {
        if self.from_cte || ctx.ctes.contains_key(&self.table) {
            return self.load_from_cte(ctx);
        }
        if self.parallel {
            // workers project; the source only filters and caps
            let mut options = self.options.clone();
            options.columns = Vec::new();
            options.select_all = true;
            let result = ctx.source.query(&ctx.qctx, &self.table, &options)?;
            self.rows_read = result.rows.len();
            debug!(
                "parallel scan of '{}' fetched {} rows",
                self.table, self.rows_read
            );
            self.rows = self.project_parallel(result.rows);
        } else {
            let result = ctx.source.query(&ctx.qctx, &self.table, &self.options)?;
            self.rows_read = result.rows.len();
            self.rows = result.rows;
        }
        Ok(())
    }

    fn next(&mut self, ctx: &ExecContext) -> CResult<Option<Row>> {
        ctx.qctx.ensure_active()?;
        if self.cursor >= self.rows.len() {
            return Ok(None);
        }
        let row = self.rows[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(row))
    }

    fn close(&mut self, _ctx: &ExecContext) -> CResult<()> {
        self.rows.clear();
        self.cursor = 0;
        Ok(())
    }
}
