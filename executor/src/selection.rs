use common::err::CResult;
use common::row::Row;
use planner::ast::expr::Expr;

use crate::context::ExecContext;
use crate::expression;
use crate::operator::Operator;

/// Residual predicate the scan could not absorb. Null evaluates as
/// unknown and the row is dropped.
pub struct FilterExec {
    predicate: Expr,
    child: Box<dyn Operator>,
}

impl FilterExec {
    pub fn new(predicate: Expr, child: Box<dyn Operator>) -> Self {
        FilterExec { predicate, child }
    }
}

impl Operator for FilterExec {
    fn open(&mut self, ctx: &ExecContext) -> CResult<()> {
        self.child.open(ctx)
    }

    fn next(&mut self, ctx: &ExecContext) -> CResult<Option<Row>> {
        loop {
            ctx.qctx.ensure_active()?;
            let Some(row) = self.child.next(ctx)? else {
                return Ok(None);
            };
            if expression::matches(&self.predicate, &row, ctx)? {
                return Ok(Some(row));
            }
        }
    }

    fn close(&mut self, ctx: &ExecContext) -> CResult<()> {
        self.child.close(ctx)
    }
}
