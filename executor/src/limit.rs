use common::err::CResult;
use common::row::Row;

use crate::context::ExecContext;
use crate::operator::Operator;

/// Skips `offset` rows, passes at most `limit`, then reports end without
/// draining the child further.
pub struct LimitExec {
    limit: Option<usize>,
    offset: usize,
    child: Box<dyn Operator>,
    skipped: usize,
    emitted: usize,
}

impl LimitExec {
    pub fn new(limit: Option<usize>, offset: usize, child: Box<dyn Operator>) -> Self {
        LimitExec {
            limit,
            offset,
            child,
            skipped: 0,
            emitted: 0,
        }
    }
}

impl Operator for LimitExec {
    fn open(&mut self, ctx: &ExecContext) -> CResult<()> {
        self.skipped = 0;
        self.emitted = 0;
        self.child.open(ctx)
    }

    fn next(&mut self, ctx: &ExecContext) -> CResult<Option<Row>> {
        if let Some(limit) = self.limit {
            if self.emitted >= limit {
                return Ok(None);
            }
        }
        loop {
            ctx.qctx.ensure_active()?;
            let Some(row) = self.child.next(ctx)? else {
                return Ok(None);
            };
            if self.skipped < self.offset {
                self.skipped += 1;
                continue;
            }
            self.emitted += 1;
            return Ok(Some(row));
        }
    }

    fn close(&mut self, ctx: &ExecContext) -> CResult<()> {
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

    fn numbers(n: i32) -> PhysicalPlan {
        PhysicalPlan::Values {
            columns: vec!["v".into()],
            rows: (0..n)
                .map(|i| vec![Expr::Literal(Value::Int(i))])
                .collect(),
        }
    }

    fn run(plan: PhysicalPlan) -> Vec<Row> {
        let ctx = test_ctx();
        crate::execute_plan(&plan, &ctx).unwrap().rows
    }

    #[test]
    fn limit_zero_returns_no_rows_successfully() {
        let plan = PhysicalPlan::Limit {
            limit: Some(0),
            offset: 0,
            input: Box::new(numbers(5)),
        };
        assert!(run(plan).is_empty());
    }

    #[test]
    fn offset_past_end_returns_empty() {
        let plan = PhysicalPlan::Limit {
            limit: Some(10),
            offset: 100,
            input: Box::new(numbers(5)),
        };
        assert!(run(plan).is_empty());
    }

    #[test]
    fn offset_then_limit() {
        let plan = PhysicalPlan::Limit {
            limit: Some(2),
            offset: 1,
            input: Box::new(numbers(5)),
        };
        let rows = run(plan);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value("v"), Value::Int(1));
        assert_eq!(rows[1].value("v"), Value::Int(2));
    }
}
