use common::query::Filter;

use crate::ast::expr::Expr;
use crate::logical::plan::{AggExpr, JoinType, NamedExpr, SortKey, WindowExpr};
use crate::physical::cost::{self, PlanEstimate};

/// Physical operator tree: the logical shape annotated with algorithm
/// choices, exact output projections and cost estimates.
#[derive(Debug, Clone)]
pub enum PhysicalPlan {
    TableScan {
        table: String,
        filters: Vec<Filter>,
        limit: Option<usize>,
        projection: Vec<String>,
        /// Full schema when no projection applies.
        schema: Vec<String>,
        parallel: bool,
        base_rows: usize,
        from_cte: bool,
    },
    Values {
        columns: Vec<String>,
        rows: Vec<Vec<Expr>>,
    },
    Filter {
        predicate: Expr,
        input: Box<PhysicalPlan>,
    },
    Project {
        exprs: Vec<NamedExpr>,
        input: Box<PhysicalPlan>,
    },
    HashJoin {
        join_type: JoinType,
        semi: bool,
        left_key: Expr,
        right_key: Expr,
        residual: Option<Expr>,
        right_qualifier: String,
        /// Build the hash table from the left child instead of the right.
        build_left: bool,
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
    },
    HashAggregate {
        group_by: Vec<NamedExpr>,
        aggregates: Vec<AggExpr>,
        input: Box<PhysicalPlan>,
    },
    Sort {
        keys: Vec<SortKey>,
        input: Box<PhysicalPlan>,
    },
    Limit {
        limit: Option<usize>,
        offset: usize,
        input: Box<PhysicalPlan>,
    },
    WindowOp {
        funcs: Vec<WindowExpr>,
        input: Box<PhysicalPlan>,
    },
    UnionAll {
        inputs: Vec<PhysicalPlan>,
    },
}

/// A planned SELECT: materialized CTEs plus the root tree.
#[derive(Debug, Clone)]
pub struct PhysicalSelect {
    pub ctes: Vec<PhysicalCte>,
    pub root: PhysicalPlan,
}

#[derive(Debug, Clone)]
pub struct PhysicalCte {
    pub name: String,
    pub columns: Vec<String>,
    pub plan: PhysicalPlan,
    pub recursive: bool,
}

impl PhysicalPlan {
    /// Algorithm label; also the deterministic tie break when candidate
    /// costs match.
    pub fn algorithm(&self) -> &'static str {
        match self {
            PhysicalPlan::TableScan { parallel: false, .. } => "TableScan(serial)",
            PhysicalPlan::TableScan { parallel: true, .. } => "TableScan(parallel)",
            PhysicalPlan::Values { .. } => "Values",
            PhysicalPlan::Filter { .. } => "Selection",
            PhysicalPlan::Project { .. } => "Projection",
            PhysicalPlan::HashJoin { .. } => "HashJoin",
            PhysicalPlan::HashAggregate { .. } => "HashAggregate",
            PhysicalPlan::Sort { .. } => "Sort(in-memory)",
            PhysicalPlan::Limit { .. } => "Limit",
            PhysicalPlan::WindowOp { .. } => "Window",
            PhysicalPlan::UnionAll { .. } => "UnionAll",
        }
    }

    pub fn estimate(&self) -> PlanEstimate {
        match self {
            PhysicalPlan::TableScan {
                filters,
                limit,
                base_rows,
                ..
            } => {
                let mut rows = *base_rows as f64;
                if !filters.is_empty() {
                    rows *= cost::DEFAULT_SELECTIVITY;
                }
                if let Some(cap) = limit {
                    rows = rows.min(*cap as f64);
                }
                PlanEstimate {
                    rows,
                    cost: cost::scan_cost(rows),
                }
            }
            PhysicalPlan::Values { rows, .. } => PlanEstimate {
                rows: rows.len() as f64,
                cost: rows.len() as f64 * cost::PROJECT_CPU,
            },
            PhysicalPlan::Filter { input, .. } => {
                let child = input.estimate();
                PlanEstimate {
                    rows: child.rows * cost::DEFAULT_SELECTIVITY,
                    cost: cost::filter_cost(child.rows, child.cost),
                }
            }
            PhysicalPlan::Project { input, .. } => {
                let child = input.estimate();
                PlanEstimate {
                    rows: child.rows,
                    cost: cost::project_cost(child.rows, child.cost),
                }
            }
            PhysicalPlan::HashJoin {
                left,
                right,
                residual,
                left_key,
                ..
            } => {
                let l = left.estimate();
                let r = right.estimate();
                let equi = !matches!(left_key, Expr::Literal(_));
                let rows = if equi {
                    // left.rows × right.rows / max(left.rows, right.rows)
                    l.rows.min(r.rows).max(0.0)
                } else {
                    l.rows * r.rows * cost::CROSS_JOIN_SELECTIVITY
                };
                let rows = if residual.is_some() && equi {
                    rows * cost::DEFAULT_SELECTIVITY
                } else {
                    rows
                };
                PlanEstimate {
                    rows,
                    cost: cost::hash_join_cost(l.rows, r.rows, l.cost + r.cost),
                }
            }
            PhysicalPlan::HashAggregate { input, .. } => {
                let child = input.estimate();
                PlanEstimate {
                    rows: (child.rows * cost::DEFAULT_SELECTIVITY).max(1.0),
                    cost: cost::hash_aggregate_cost(child.rows, child.cost),
                }
            }
            PhysicalPlan::Sort { input, .. } => {
                let child = input.estimate();
                PlanEstimate {
                    rows: child.rows,
                    cost: cost::sort_cost(child.rows, child.cost),
                }
            }
            PhysicalPlan::Limit { limit, input, .. } => {
                let child = input.estimate();
                let rows = match limit {
                    Some(n) => child.rows.min(*n as f64),
                    None => child.rows,
                };
                PlanEstimate {
                    rows,
                    cost: cost::limit_cost(child.rows, *limit, child.cost),
                }
            }
            PhysicalPlan::WindowOp { input, .. } => {
                let child = input.estimate();
                PlanEstimate {
                    rows: child.rows,
                    cost: cost::sort_cost(child.rows, child.cost),
                }
            }
            PhysicalPlan::UnionAll { inputs } => {
                let mut rows = 0.0;
                let mut total = 0.0;
                for input in inputs {
                    let e = input.estimate();
                    rows += e.rows;
                    total += e.cost;
                }
                PlanEstimate { rows, cost: total }
            }
        }
    }

    pub fn output_columns(&self) -> Vec<String> {
        match self {
            PhysicalPlan::TableScan {
                schema, projection, ..
            } => {
                if projection.is_empty() {
                    schema.clone()
                } else {
                    projection.clone()
                }
            }
            PhysicalPlan::Values { columns, .. } => columns.clone(),
            PhysicalPlan::Filter { input, .. }
            | PhysicalPlan::Limit { input, .. }
            | PhysicalPlan::Sort { input, .. } => input.output_columns(),
            PhysicalPlan::Project { exprs, .. } => exprs.iter().map(|e| e.name()).collect(),
            PhysicalPlan::HashJoin {
                left,
                right,
                semi,
                right_qualifier,
                ..
            } => {
                let mut out = left.output_columns();
                if !*semi {
                    for col in right.output_columns() {
                        if out.contains(&col) {
                            out.push(format!("{}.{}", right_qualifier, col));
                        } else {
                            out.push(col);
                        }
                    }
                }
                out
            }
            PhysicalPlan::HashAggregate {
                group_by,
                aggregates,
                ..
            } => group_by
                .iter()
                .map(|g| g.name())
                .chain(aggregates.iter().map(|a| a.alias.clone()))
                .collect(),
            PhysicalPlan::WindowOp { funcs, input } => {
                let mut out = input.output_columns();
                out.extend(funcs.iter().map(|f| f.alias.clone()));
                out
            }
            PhysicalPlan::UnionAll { inputs } => inputs
                .first()
                .map(|p| p.output_columns())
                .unwrap_or_default(),
        }
    }

    /// EXPLAIN rendering: one line per node, children indented.
    pub fn explain_into(&self, depth: usize, out: &mut Vec<String>) {
        let est = self.estimate();
        let detail = match self {
            PhysicalPlan::TableScan {
                table,
                filters,
                limit,
                projection,
                ..
            } => {
                let mut s = format!("table={}", table);
                if !filters.is_empty() {
                    s.push_str(&format!(", pushed_filters={}", filters.len()));
                }
                if let Some(n) = limit {
                    s.push_str(&format!(", read_cap={}", n));
                }
                if !projection.is_empty() {
                    s.push_str(&format!(", columns=[{}]", projection.join(", ")));
                }
                s
            }
            PhysicalPlan::Filter { predicate, .. } => format!("predicate={}", predicate),
            PhysicalPlan::Project { exprs, .. } => format!(
                "exprs=[{}]",
                exprs.iter().map(|e| e.name()).collect::<Vec<_>>().join(", ")
            ),
            PhysicalPlan::HashJoin {
                join_type,
                semi,
                left_key,
                right_key,
                build_left,
                ..
            } => format!(
                "type={}{}, key={}={}, build={}",
                join_type.name(),
                if *semi { " SEMI" } else { "" },
                left_key,
                right_key,
                if *build_left { "left" } else { "right" }
            ),
            PhysicalPlan::HashAggregate {
                group_by,
                aggregates,
                ..
            } => format!(
                "group_by=[{}], aggs=[{}]",
                group_by.iter().map(|g| g.name()).collect::<Vec<_>>().join(", "),
                aggregates
                    .iter()
                    .map(|a| a.alias.clone())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            PhysicalPlan::Sort { keys, .. } => format!(
                "keys=[{}]",
                keys.iter()
                    .map(|k| k.expr.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            PhysicalPlan::Limit { limit, offset, .. } => {
                format!("limit={:?}, offset={}", limit, offset)
            }
            PhysicalPlan::WindowOp { funcs, .. } => format!("funcs={}", funcs.len()),
            PhysicalPlan::Values { rows, .. } => format!("rows={}", rows.len()),
            PhysicalPlan::UnionAll { inputs } => format!("branches={}", inputs.len()),
        };
        out.push(format!(
            "{}{} [{}] (rows≈{:.0}, cost≈{:.1})",
            "  ".repeat(depth),
            self.algorithm(),
            detail,
            est.rows,
            est.cost
        ));
        match self {
            PhysicalPlan::Filter { input, .. }
            | PhysicalPlan::Project { input, .. }
            | PhysicalPlan::HashAggregate { input, .. }
            | PhysicalPlan::Sort { input, .. }
            | PhysicalPlan::Limit { input, .. }
            | PhysicalPlan::WindowOp { input, .. } => input.explain_into(depth + 1, out),
            PhysicalPlan::HashJoin { left, right, .. } => {
                left.explain_into(depth + 1, out);
                right.explain_into(depth + 1, out);
            }
            PhysicalPlan::UnionAll { inputs } => {
                for input in inputs {
                    input.explain_into(depth + 1, out);
                }
            }
            _ => {}
        }
    }
}
