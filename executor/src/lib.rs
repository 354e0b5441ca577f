pub mod aggregate;
pub mod cache;
pub mod context;
pub mod cte;
pub mod expression;
pub mod hash_join;
pub mod limit;
pub mod monitor;
pub mod operator;
pub mod pool;
pub mod projection;
pub mod scan;
pub mod selection;
pub mod sort;
pub mod window;

use std::time::Instant;

use tracing::debug;

use common::datasource::QueryResult;
use common::err::CResult;
use planner::physical::plan::PhysicalSelect;

pub use context::ExecContext;
pub use operator::{build_operator, Operator};

/// Drive a physical plan to completion: materialize CTE bindings, then
/// pull the root operator dry. `close` runs on every exit path.
pub struct Executor;

impl Executor {
    pub fn execute_select(select: &PhysicalSelect, ctx: &mut ExecContext) -> CResult<QueryResult> {
        let started = Instant::now();
        for cte in &select.ctes {
            let table = cte::materialize(cte, ctx)?;
            ctx.ctes.insert(cte.name.clone(), table);
        }
        let result = execute_plan(&select.root, ctx);
        debug!(
            "plan finished in {:?}, rows={:?}",
            started.elapsed(),
            result.as_ref().map(|r| r.rows.len())
        );
        result
    }

    pub fn explain(select: &PhysicalSelect) -> Vec<String> {
        let mut lines = Vec::new();
        for cte in &select.ctes {
            lines.push(format!(
                "CTE {}{}",
                cte.name,
                if cte.recursive { " (recursive)" } else { "" }
            ));
            cte.plan.explain_into(1, &mut lines);
        }
        select.root.explain_into(0, &mut lines);
        lines
    }
}

/// Pull one operator tree dry, guaranteeing close on success and failure.
pub fn execute_plan(
    plan: &planner::physical::plan::PhysicalPlan,
    ctx: &ExecContext,
) -> CResult<QueryResult> {
    let mut op = build_operator(plan)?;
    if let Err(err) = op.open(ctx) {
        let _ = op.close(ctx);
        return Err(err);
    }
    let mut rows = Vec::new();
    let result = loop {
        match op.next(ctx) {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        }
    };
    let close_result = op.close(ctx);
    result?;
    close_result?;
    Ok(QueryResult::new(plan.output_columns(), rows))
}
