use common::err::{CResult, EngineError};
use common::row::Row;
use planner::physical::plan::{PhysicalCte, PhysicalPlan};
use tracing::debug;

use crate::context::{CteTable, ExecContext};
use crate::execute_plan;

/// Iteration cap for recursive CTEs that never stabilize.
const MAX_RECURSION: usize = 1000;

/// Materialize one CTE binding. Non-recursive bindings run once; a
/// recursive binding splits its UNION into base and recursive branches and
/// iterates the recursive branch against the working set until it stops
/// producing rows.
pub fn materialize(cte: &PhysicalCte, ctx: &mut ExecContext) -> CResult<CteTable> {
    if !cte.recursive {
        let result = execute_plan(&cte.plan, ctx)?;
        return Ok(CteTable {
            columns: rename_columns(&cte.columns, &result.columns),
            rows: remap_rows(result.rows, &result.columns, &cte.columns),
        });
    }

    // WITH RECURSIVE t AS (base UNION [ALL] recursive)
    let (base, recursive, dedup) = split_recursive_union(&cte.plan)?;

    let base_result = execute_plan(base, ctx)?;
    let source_columns = base_result.columns.clone();
    let mut total = remap_rows(base_result.rows, &source_columns, &cte.columns);
    let mut working = total.clone();
    let columns = rename_columns(&cte.columns, &source_columns);

    for iteration in 0..MAX_RECURSION {
        if working.is_empty() {
            break;
        }
        ctx.qctx.ensure_active()?;
        // rebind the CTE name to the previous iteration's rows
        ctx.ctes.insert(
            cte.name.clone(),
            CteTable {
                columns: columns.clone(),
                rows: working.clone(),
            },
        );
        let step = execute_plan(recursive, ctx)?;
        let mut fresh = remap_rows(step.rows, &step.columns, &cte.columns);
        if dedup {
            fresh.retain(|row| !total.contains(row));
        }
        if fresh.is_empty() {
            break;
        }
        debug!(
            "recursive CTE '{}' iteration {} added {} rows",
            cte.name,
            iteration,
            fresh.len()
        );
        total.extend(fresh.clone());
        working = fresh;
        if iteration + 1 == MAX_RECURSION {
            return Err(EngineError::Unsupported(format!(
                "recursive CTE '{}' exceeded {} iterations",
                cte.name, MAX_RECURSION
            )));
        }
    }

    ctx.ctes.remove(&cte.name);
    Ok(CteTable {
        columns,
        rows: total,
    })
}

/// A recursive CTE plan must bottom out in a UNION [ALL] of base and
/// recursive branches; UNION DISTINCT arrives wrapped in the dedup
/// aggregate.
fn split_recursive_union(plan: &PhysicalPlan) -> CResult<(&PhysicalPlan, &PhysicalPlan, bool)> {
    match plan {
        PhysicalPlan::UnionAll { inputs } if inputs.len() == 2 => {
            Ok((&inputs[0], &inputs[1], false))
        }
        PhysicalPlan::HashAggregate {
            aggregates, input, ..
        } if aggregates.is_empty() => match input.as_ref() {
            PhysicalPlan::UnionAll { inputs } if inputs.len() == 2 => {
                Ok((&inputs[0], &inputs[1], true))
            }
            _ => Err(EngineError::Unsupported(
                "recursive CTE must be base UNION recursive".to_string(),
            )),
        },
        _ => Err(EngineError::Unsupported(
            "recursive CTE must be base UNION recursive".to_string(),
        )),
    }
}

/// Declared CTE column names win over the branch's own output names.
fn rename_columns(declared: &[String], actual: &[String]) -> Vec<String> {
    if declared.is_empty() {
        actual.to_vec()
    } else {
        declared.to_vec()
    }
}

fn remap_rows(rows: Vec<Row>, source: &[String], declared: &[String]) -> Vec<Row> {
    if declared.is_empty() || declared == source {
        return rows;
    }
    rows.into_iter()
        .map(|row| {
            let mut out = Row::new();
            for (i, name) in declared.iter().enumerate() {
                let value = source
                    .get(i)
                    .and_then(|s| row.get(s).cloned())
                    .unwrap_or(common::value::Value::Null);
                out.set(name.clone(), value);
            }
            out
        })
        .collect()
}
