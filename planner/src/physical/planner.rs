use common::err::{CResult, EngineError};
use common::value::Value;

use crate::ast::expr::{BinOp, Expr};
use crate::ast::statement::SelectPlan;
use crate::logical::plan::{JoinType, LogicalPlan, NamedExpr};
use crate::physical::plan::{PhysicalCte, PhysicalPlan, PhysicalSelect};
use crate::rules::{conjoin, split_conjuncts};

/// Scans at or past this cardinality fan out across the worker pool.
const PARALLEL_SCAN_THRESHOLD: usize = 8192;

/// Chooses one physical tree for a logical tree. Today exactly one
/// candidate exists per node; `choose` already ranks a list so
/// enumeration can grow without an interface change.
pub struct PhysicalPlanner {
    parallel_threshold: usize,
}

impl Default for PhysicalPlanner {
    fn default() -> Self {
        PhysicalPlanner::new()
    }
}

impl PhysicalPlanner {
    pub fn new() -> Self {
        PhysicalPlanner {
            parallel_threshold: PARALLEL_SCAN_THRESHOLD,
        }
    }

    pub fn plan_select(&self, select: &SelectPlan) -> CResult<PhysicalSelect> {
        let mut ctes = Vec::with_capacity(select.ctes.len());
        for cte in &select.ctes {
            ctes.push(PhysicalCte {
                name: cte.name.clone(),
                columns: cte.columns.clone(),
                plan: self.plan(&cte.plan)?,
                recursive: cte.recursive,
            });
        }
        Ok(PhysicalSelect {
            ctes,
            root: self.plan(&select.root)?,
        })
    }

    pub fn plan(&self, logical: &LogicalPlan) -> CResult<PhysicalPlan> {
        let candidates = self.candidates(logical)?;
        Ok(Self::choose(candidates))
    }

    /// Minimum cost wins; equal costs break lexicographically by
    /// algorithm name so plans stay deterministic.
    fn choose(mut candidates: Vec<PhysicalPlan>) -> PhysicalPlan {
        debug_assert!(!candidates.is_empty());
        candidates.sort_by(|a, b| {
            let ca = a.estimate().cost;
            let cb = b.estimate().cost;
            ca.partial_cmp(&cb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.algorithm().cmp(b.algorithm()))
        });
        candidates.remove(0)
    }

    fn candidates(&self, logical: &LogicalPlan) -> CResult<Vec<PhysicalPlan>> {
        let plan = match logical {
            LogicalPlan::DataSource {
                table,
                schema,
                filters,
                pushed_limit,
                projection,
                estimated_rows,
                from_cte,
                ..
            } => PhysicalPlan::TableScan {
                table: table.clone(),
                filters: filters.clone(),
                limit: *pushed_limit,
                projection: projection.clone(),
                schema: schema.clone(),
                parallel: !*from_cte && *estimated_rows >= self.parallel_threshold,
                base_rows: *estimated_rows,
                from_cte: *from_cte,
            },
            LogicalPlan::Values { columns, rows } => PhysicalPlan::Values {
                columns: columns.clone(),
                rows: rows.clone(),
            },
            LogicalPlan::Selection { predicate, input } => {
                if predicate.contains_subquery() {
                    return Err(EngineError::Unsupported(
                        "subquery predicate did not rewrite to a join".to_string(),
                    ));
                }
                PhysicalPlan::Filter {
                    predicate: predicate.clone(),
                    input: Box::new(self.plan(input)?),
                }
            }
            LogicalPlan::Projection { exprs, input } => PhysicalPlan::Project {
                exprs: exprs.clone(),
                input: Box::new(self.plan(input)?),
            },
            LogicalPlan::Limit {
                limit,
                offset,
                input,
            } => PhysicalPlan::Limit {
                limit: *limit,
                offset: *offset,
                input: Box::new(self.plan(input)?),
            },
            LogicalPlan::Sort { keys, input } => PhysicalPlan::Sort {
                keys: keys.clone(),
                input: Box::new(self.plan(input)?),
            },
            LogicalPlan::Join {
                join_type,
                condition,
                semi,
                right_qualifier,
                left,
                right,
            } => {
                let physical_left = self.plan(left)?;
                let physical_right = self.plan(right)?;
                let (keys, residual) = split_join_condition(condition, left, right);
                let (left_key, right_key) = match keys {
                    Some(pair) => pair,
                    // single-bucket build: a cross product filtered by the
                    // residual predicate
                    None => (
                        Expr::Literal(Value::Int(1)),
                        Expr::Literal(Value::Int(1)),
                    ),
                };
                // outer joins probe the preserved side; inner joins build
                // the smaller side; semi joins always build the subquery
                let build_left = if *semi {
                    false
                } else {
                    match join_type {
                        JoinType::Left => false,
                        JoinType::Right => true,
                        JoinType::Inner => {
                            physical_left.estimate().rows <= physical_right.estimate().rows
                        }
                    }
                };
                PhysicalPlan::HashJoin {
                    join_type: *join_type,
                    semi: *semi,
                    left_key,
                    right_key,
                    residual,
                    right_qualifier: right_qualifier.clone(),
                    build_left,
                    left: Box::new(physical_left),
                    right: Box::new(physical_right),
                }
            }
            LogicalPlan::Aggregate {
                group_by,
                aggregates,
                input,
            } => PhysicalPlan::HashAggregate {
                group_by: group_by.clone(),
                aggregates: aggregates.clone(),
                input: Box::new(self.plan(input)?),
            },
            LogicalPlan::Window { funcs, input } => PhysicalPlan::WindowOp {
                funcs: funcs.clone(),
                input: Box::new(self.plan(input)?),
            },
            LogicalPlan::Union { inputs, all } => {
                let mut branches = Vec::with_capacity(inputs.len());
                for input in inputs {
                    branches.push(self.plan(input)?);
                }
                let union = PhysicalPlan::UnionAll { inputs: branches };
                if *all {
                    union
                } else {
                    // UNION DISTINCT dedups by grouping on every column
                    let group_by = union
                        .output_columns()
                        .into_iter()
                        .map(|c| NamedExpr::new(Expr::Column(c)))
                        .collect();
                    PhysicalPlan::HashAggregate {
                        group_by,
                        aggregates: Vec::new(),
                        input: Box::new(union),
                    }
                }
            }
        };
        Ok(vec![plan])
    }
}

/// Pull one `left_col = right_col` equi pair out of the join condition;
/// everything else becomes a residual predicate evaluated on the merged
/// row.
fn split_join_condition(
    condition: &Option<Expr>,
    left: &LogicalPlan,
    right: &LogicalPlan,
) -> (Option<(Expr, Expr)>, Option<Expr>) {
    let Some(condition) = condition else {
        return (None, None);
    };
    let mut conjuncts = Vec::new();
    split_conjuncts(condition.clone(), &mut conjuncts);
    let mut keys = None;
    let mut rest = Vec::new();
    for conjunct in conjuncts {
        if keys.is_none() {
            if let Expr::BinaryOp {
                left: a,
                op: BinOp::Eq,
                right: b,
            } = &conjunct
            {
                if let (Expr::Column(ca), Expr::Column(cb)) = (&**a, &**b) {
                    if left.resolves_column(ca) && right.resolves_column(cb) {
                        keys = Some((Expr::Column(ca.clone()), Expr::Column(cb.clone())));
                        continue;
                    }
                    if left.resolves_column(cb) && right.resolves_column(ca) {
                        keys = Some((Expr::Column(cb.clone()), Expr::Column(ca.clone())));
                        continue;
                    }
                }
            }
        }
        rest.push(conjunct);
    }
    (keys, conjoin(rest))
}

#[cfg(test)]
mod test {
    use super::*;

    fn scan(table: &str, cols: &[&str], rows: usize) -> LogicalPlan {
        LogicalPlan::DataSource {
            table: table.into(),
            alias: None,
            schema: cols.iter().map(|c| c.to_string()).collect(),
            filters: vec![],
            pushed_limit: None,
            projection: vec![],
            estimated_rows: rows,
            from_cte: false,
        }
    }

    #[test]
    fn small_scan_stays_serial_large_goes_parallel() {
        let planner = PhysicalPlanner::new();
        let plan = planner.plan(&scan("t", &["a"], 100)).unwrap();
        assert_eq!(plan.algorithm(), "TableScan(serial)");
        let plan = planner.plan(&scan("t", &["a"], 100_000)).unwrap();
        assert_eq!(plan.algorithm(), "TableScan(parallel)");
    }

    #[test]
    fn smaller_side_builds_inner_join() {
        let planner = PhysicalPlanner::new();
        let logical = LogicalPlan::Join {
            join_type: JoinType::Inner,
            condition: Some(Expr::binary(
                Expr::col("id"),
                BinOp::Eq,
                Expr::col("user_id"),
            )),
            semi: false,
            right_qualifier: "o".into(),
            left: Box::new(scan("users", &["id"], 10)),
            right: Box::new(scan("orders", &["user_id"], 1000)),
        };
        let plan = planner.plan(&logical).unwrap();
        let PhysicalPlan::HashJoin { build_left, .. } = plan else {
            panic!()
        };
        assert!(build_left);
    }

    #[test]
    fn left_join_builds_right_side() {
        let planner = PhysicalPlanner::new();
        let logical = LogicalPlan::Join {
            join_type: JoinType::Left,
            condition: Some(Expr::binary(
                Expr::col("id"),
                BinOp::Eq,
                Expr::col("user_id"),
            )),
            semi: false,
            right_qualifier: "o".into(),
            left: Box::new(scan("users", &["id"], 100_000)),
            right: Box::new(scan("orders", &["user_id"], 10)),
        };
        let plan = planner.plan(&logical).unwrap();
        let PhysicalPlan::HashJoin { build_left, .. } = plan else {
            panic!()
        };
        assert!(!build_left);
    }

    #[test]
    fn equi_join_estimates_min_side() {
        let planner = PhysicalPlanner::new();
        let logical = LogicalPlan::Join {
            join_type: JoinType::Inner,
            condition: Some(Expr::binary(
                Expr::col("id"),
                BinOp::Eq,
                Expr::col("user_id"),
            )),
            semi: false,
            right_qualifier: "o".into(),
            left: Box::new(scan("users", &["id"], 10)),
            right: Box::new(scan("orders", &["user_id"], 1000)),
        };
        let est = planner.plan(&logical).unwrap().estimate();
        assert_eq!(est.rows, 10.0);
    }
}
