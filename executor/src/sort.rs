use std::cmp::Ordering;

use common::err::CResult;
use common::query::SortOrder;
use common::row::Row;
use planner::logical::plan::SortKey;

use crate::context::ExecContext;
use crate::expression::evaluate;
use crate::operator::Operator;

/// In-memory stable sort. Key values are computed once per row; ties keep
/// input order, and mixed-type keys follow the total value order (null
/// lowest, numeric widening, byte-wise strings).
pub struct SortExec {
    keys: Vec<SortKey>,
    child: Box<dyn Operator>,
    output: Vec<Row>,
    cursor: usize,
}

impl SortExec {
    pub fn new(keys: Vec<SortKey>, child: Box<dyn Operator>) -> Self {
        SortExec {
            keys,
            child,
            output: Vec::new(),
            cursor: 0,
        }
    }
}

impl Operator for SortExec {
    fn open(&mut self, ctx: &ExecContext) -> CResult<()> {
        self.child.open(ctx)?;
        let mut decorated: Vec<(Vec<common::value::Value>, Row)> = Vec::new();
        loop {
            ctx.qctx.ensure_active()?;
            let Some(row) = self.child.next(ctx)? else {
                break;
            };
            let mut key_values = Vec::with_capacity(self.keys.len());
            for key in &self.keys {
                key_values.push(evaluate(&key.expr, &row, ctx)?);
            }
            decorated.push((key_values, row));
        }
        decorated.sort_by(|(a, _), (b, _)| {
            for (i, key) in self.keys.iter().enumerate() {
                let ord = a[i].total_cmp(&b[i]);
                let ord = match key.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        self.output = decorated.into_iter().map(|(_, row)| row).collect();
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self, ctx: &ExecContext) -> CResult<Option<Row>> {
        ctx.qctx.ensure_active()?;
        if self.cursor >= self.output.len() {
            return Ok(None);
        }
        let row = self.output[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(row))
    }

    fn close(&mut self, ctx: &ExecContext) -> CResult<()> {
        self.output.clear();
        self.child.close(ctx)
    }
}

#[cfg(test)]
mod test {
    use common::value::Value;
    use planner::ast::expr::Expr;
    use planner::physical::plan::PhysicalPlan;

    use super::*;
    use crate::expression::test::test_ctx;

    #[test]
    fn null_sorts_lowest_and_sort_is_stable() {
        let input = PhysicalPlan::Values {
            columns: vec!["v".into(), "tag".into()],
            rows: vec![
                vec![Expr::Literal(Value::Int(2)), Expr::Literal(Value::Int(1))],
                vec![Expr::Literal(Value::Null), Expr::Literal(Value::Int(2))],
                vec![Expr::Literal(Value::Int(1)), Expr::Literal(Value::Int(3))],
                vec![Expr::Literal(Value::Int(2)), Expr::Literal(Value::Int(4))],
            ],
        };
        let plan = PhysicalPlan::Sort {
            keys: vec![SortKey {
                expr: Expr::col("v"),
                order: SortOrder::Asc,
            }],
            input: Box::new(input),
        };
        let ctx = test_ctx();
        let rows = crate::execute_plan(&plan, &ctx).unwrap().rows;
        let tags: Vec<Value> = rows.iter().map(|r| r.value("tag")).collect();
        // null first, then 1, then both 2s in input order
        assert_eq!(
            tags,
            vec![
                Value::Int(2),
                Value::Int(3),
                Value::Int(1),
                Value::Int(4)
            ]
        );
    }

    #[test]
    fn mixed_types_fall_back_to_string_order() {
        let input = PhysicalPlan::Values {
            columns: vec!["v".into()],
            rows: vec![
                vec![Expr::Literal(Value::String("b".into()))],
                vec![Expr::Literal(Value::Int(10))],
                vec![Expr::Literal(Value::String("5".into()))],
            ],
        };
        let plan = PhysicalPlan::Sort {
            keys: vec![SortKey {
                expr: Expr::col("v"),
                order: SortOrder::Asc,
            }],
            input: Box::new(input),
        };
        let ctx = test_ctx();
        let rows = crate::execute_plan(&plan, &ctx).unwrap().rows;
        // "5" and 10 compare numerically, "b" falls back to text
        assert_eq!(rows[0].value("v"), Value::String("5".into()));
        assert_eq!(rows[1].value("v"), Value::Int(10));
        assert_eq!(rows[2].value("v"), Value::String("b".into()));
    }
}
