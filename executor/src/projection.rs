use common::err::CResult;
use common::row::Row;
use planner::ast::expr::Expr;
use planner::logical::plan::NamedExpr;

use crate::context::ExecContext;
use crate::expression::evaluate;
use crate::operator::Operator;

/// Evaluates the projection list against each input row.
pub struct ProjectExec {
    exprs: Vec<NamedExpr>,
    child: Box<dyn Operator>,
}

impl ProjectExec {
    pub fn new(exprs: Vec<NamedExpr>, child: Box<dyn Operator>) -> Self {
        ProjectExec { exprs, child }
    }
}

impl Operator for ProjectExec {
    fn open(&mut self, ctx: &ExecContext) -> CResult<()> {
        self.child.open(ctx)
    }

    fn next(&mut self, ctx: &ExecContext) -> CResult<Option<Row>> {
        ctx.qctx.ensure_active()?;
        let Some(row) = self.child.next(ctx)? else {
            return Ok(None);
        };
        let mut out = Row::new();
        for item in &self.exprs {
            out.set(item.name(), evaluate(&item.expr, &row, ctx)?);
        }
        Ok(Some(out))
    }

    fn close(&mut self, ctx: &ExecContext) -> CResult<()> {
        self.child.close(ctx)
    }
}

/// Literal rows (`SELECT 1+2`, `VALUES ...`): every expression list is
/// evaluated against an empty row.
pub struct ValuesExec {
    columns: Vec<String>,
    rows: Vec<Vec<Expr>>,
    cursor: usize,
}

impl ValuesExec {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Expr>>) -> Self {
        ValuesExec {
            columns,
            rows,
            cursor: 0,
        }
    }
}

impl Operator for ValuesExec {
    fn open(&mut self, _ctx: &ExecContext) -> CResult<()> {
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self, ctx: &ExecContext) -> CResult<Option<Row>> {
        ctx.qctx.ensure_active()?;
        let Some(exprs) = self.rows.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let empty = Row::new();
        let mut out = Row::new();
        for (i, expr) in exprs.iter().enumerate() {
            let name = self
                .columns
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("column_{}", i));
            out.set(name, evaluate(expr, &empty, ctx)?);
        }
        Ok(Some(out))
    }

    fn close(&mut self, _ctx: &ExecContext) -> CResult<()> {
        Ok(())
    }
}
