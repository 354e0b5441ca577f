use std::collections::HashMap;

use common::err::{CResult, EngineError};
use common::row::Row;
use common::value::Value;
use planner::ast::expr::Expr;
use planner::logical::plan::JoinType;
use planner::physical::plan::PhysicalPlan;

use crate::context::ExecContext;
use crate::expression::{evaluate, matches};
use crate::operator::{build_operator, Operator};

/// Hash join: drain the build side into a table keyed by the join key,
/// then stream the probe side against it.
///
/// Outer joins probe the preserved side, so unmatched probe rows emit
/// with the other side's columns null. Semi joins emit each probe row at
/// most once and never append build columns. Name collisions on the right
/// side get the plan's qualifier prefix.
pub struct HashJoinExec {
    join_type: JoinType,
    semi: bool,
    build_left: bool,
    left_key: Expr,
    right_key: Expr,
    residual: Option<Expr>,
    right_qualifier: String,
    left: Box<dyn Operator>,
    right: Box<dyn Operator>,
    /// Build-side columns for null padding of unmatched probe rows.
    build_columns: Vec<String>,
    table: HashMap<String, Vec<Row>>,
    pending: Vec<Row>,
    done: bool,
}

impl HashJoinExec {
    pub fn new(plan: &PhysicalPlan) -> CResult<HashJoinExec> {
        let PhysicalPlan::HashJoin {
            join_type,
            semi,
            left_key,
            right_key,
            residual,
            right_qualifier,
            build_left,
            left,
            right,
        } = plan
        else {
            return Err(EngineError::Internal("HashJoinExec needs a join node".into()));
        };
        let build_columns = if *build_left {
            left.output_columns()
        } else {
            right.output_columns()
        };
        Ok(HashJoinExec {
            join_type: *join_type,
            semi: *semi,
            build_left: *build_left,
            left_key: left_key.clone(),
            right_key: right_key.clone(),
            residual: residual.clone(),
            right_qualifier: right_qualifier.clone(),
            left: build_operator(left)?,
            right: build_operator(right)?,
            build_columns,
            table: HashMap::new(),
            pending: Vec::new(),
            done: false,
        })
    }

    fn build_key(&self) -> &Expr {
        if self.build_left {
            &self.left_key
        } else {
            &self.right_key
        }
    }

    fn probe_key(&self) -> &Expr {
        if self.build_left {
            &self.right_key
        } else {
            &self.left_key
        }
    }

    /// Left row first, right row second, collisions qualified: the output
    /// shape is fixed by the plan, not by which side built.
    fn merge(&self, probe: &Row, build: &Row) -> Row {
        let (left_row, right_row) = if self.build_left {
            (build, probe)
        } else {
            (probe, build)
        };
        let mut out = left_row.clone();
        out.merge_qualified(&self.right_qualifier, right_row);
        out
    }

    fn null_build_row(&self) -> Row {
        Row::from_pairs(
            self.build_columns
                .iter()
                .map(|c| (c.clone(), Value::Null)),
        )
    }

    /// Null-extension applies when the probe side is the preserved side of
    /// an outer join.
    fn pads_unmatched(&self) -> bool {
        matches!(
            (self.join_type, self.build_left),
            (JoinType::Left, false) | (JoinType::Right, true)
        )
    }
}

impl Operator for HashJoinExec {
    fn open(&mut self, ctx: &ExecContext) -> CResult<()> {
        self.left.open(ctx)?;
        self.right.open(ctx)?;

        let build_key = self.build_key().clone();
        let build_side: &mut Box<dyn Operator> = if self.build_left {
            &mut self.left
        } else {
            &mut self.right
        };
        loop {
            ctx.qctx.ensure_active()?;
            let Some(row) = build_side.next(ctx)? else {
                break;
            };
            let key = evaluate(&build_key, &row, ctx)?;
            // null keys never match anything
            if key.is_null() {
                continue;
            }
            self.table.entry(key.key()).or_default().push(row);
        }
        Ok(())
    }

    fn next(&mut self, ctx: &ExecContext) -> CResult<Option<Row>> {
        loop {
            ctx.qctx.ensure_active()?;
            if let Some(row) = self.pending.pop() {
                return Ok(Some(row));
            }
            if self.done {
                return Ok(None);
            }
            let probe_side: &mut Box<dyn Operator> = if self.build_left {
                &mut self.right
            } else {
                &mut self.left
            };
            let Some(probe) = probe_side.next(ctx)? else {
                self.done = true;
                continue;
            };
            let key = evaluate(&self.probe_key().clone(), &probe, ctx)?;
            let matches_bucket: Vec<Row> = if key.is_null() {
                Vec::new()
            } else {
                self.table.get(&key.key()).cloned().unwrap_or_default()
            };

            let mut emitted = Vec::new();
            for build_row in &matches_bucket {
                let merged = self.merge(&probe, build_row);
                let keep = match &self.residual {
                    Some(predicate) => matches(predicate, &merged, ctx)?,
                    None => true,
                };
                if keep {
                    if self.semi {
                        // one hit is enough, no build columns appended
                        return Ok(Some(probe));
                    }
                    emitted.push(merged);
                }
            }
            if emitted.is_empty() && !self.semi && self.pads_unmatched() {
                emitted.push(self.merge(&probe, &self.null_build_row()));
            }
            // preserve match order under the stack-like pending buffer
            emitted.reverse();
            self.pending = emitted;
        }
    }

    fn close(&mut self, ctx: &ExecContext) -> CResult<()> {
        self.table.clear();
        self.pending.clear();
        let left = self.left.close(ctx);
        let right = self.right.close(ctx);
        left?;
        right
    }
}

#[cfg(test)]
mod test {
    use planner::ast::expr::BinOp;
    use planner::physical::plan::PhysicalPlan;

    use super::*;
    use crate::expression::test::test_ctx;

    fn values(columns: &[&str], rows: Vec<Vec<Value>>) -> PhysicalPlan {
        PhysicalPlan::Values {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Expr::Literal).collect())
                .collect(),
        }
    }

    fn drain(plan: &PhysicalPlan) -> Vec<Row> {
        let ctx = test_ctx();
        crate::execute_plan(plan, &ctx).unwrap().rows
    }

    fn join_plan(join_type: JoinType, build_left: bool) -> PhysicalPlan {
        PhysicalPlan::HashJoin {
            join_type,
            semi: false,
            left_key: Expr::col("id"),
            right_key: Expr::col("user_id"),
            residual: None,
            right_qualifier: "o".into(),
            build_left,
            left: Box::new(values(
                &["id", "name"],
                vec![
                    vec![Value::Int(1), Value::String("A".into())],
                    vec![Value::Int(2), Value::String("B".into())],
                ],
            )),
            right: Box::new(values(
                &["user_id", "total"],
                vec![
                    vec![Value::Int(1), Value::Int(10)],
                    vec![Value::Int(3), Value::Int(20)],
                ],
            )),
        }
    }

    #[test]
    fn inner_join_matches_once() {
        let rows = drain(&join_plan(JoinType::Inner, false));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("name"), Value::String("A".into()));
        assert_eq!(rows[0].value("total"), Value::Int(10));
    }

    #[test]
    fn left_join_pads_unmatched_with_nulls() {
        let rows = drain(&join_plan(JoinType::Left, false));
        assert_eq!(rows.len(), 2);
        let b = rows
            .iter()
            .find(|r| r.value("name") == Value::String("B".into()))
            .unwrap();
        assert_eq!(b.value("total"), Value::Null);
    }

    #[test]
    fn semi_join_emits_probe_once() {
        let PhysicalPlan::HashJoin {
            join_type,
            left_key,
            right_key,
            right_qualifier,
            left,
            right,
            ..
        } = join_plan(JoinType::Inner, false)
        else {
            unreachable!()
        };
        let plan = PhysicalPlan::HashJoin {
            join_type,
            semi: true,
            left_key,
            right_key,
            residual: None,
            right_qualifier,
            build_left: false,
            left,
            right: Box::new(PhysicalPlan::UnionAll {
                inputs: vec![*right.clone(), *right],
            }),
        };
        let rows = drain(&plan);
        // duplicated build rows still yield each probe row at most once
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("id"), Value::Int(1));
        assert!(rows[0].get("total").is_none());
    }
}
