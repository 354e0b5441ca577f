use common::err::CResult;
use common::row::Row;
use planner::physical::plan::PhysicalPlan;

use crate::aggregate::HashAggregateExec;
use crate::context::ExecContext;
use crate::hash_join::HashJoinExec;
use crate::limit::LimitExec;
use crate::projection::ProjectExec;
use crate::scan::TableScanExec;
use crate::selection::FilterExec;
use crate::sort::SortExec;
use crate::window::WindowExec;

/// Volcano iterator. Implementations may materialize internally, but the
/// outside contract is strictly open / next / close.
pub trait Operator: Send {
    fn open(&mut self, ctx: &ExecContext) -> CResult<()>;

    fn next(&mut self, ctx: &ExecContext) -> CResult<Option<Row>>;

    fn close(&mut self, ctx: &ExecContext) -> CResult<()>;
}

/// Physical node → executable operator.
pub fn build_operator(plan: &PhysicalPlan) -> CResult<Box<dyn Operator>> {
    Ok(match plan {
        PhysicalPlan::TableScan { .. } => Box::new(TableScanExec::new(plan)?),
        PhysicalPlan::Values { columns, rows } => {
            Box::new(crate::projection::ValuesExec::new(columns.clone(), rows.clone()))
        }
        PhysicalPlan::Filter { predicate, input } => Box::new(FilterExec::new(
            predicate.clone(),
            build_operator(input)?,
        )),
        PhysicalPlan::Project { exprs, input } => {
            Box::new(ProjectExec::new(exprs.clone(), build_operator(input)?))
        }
        PhysicalPlan::HashJoin { .. } => Box::new(HashJoinExec::new(plan)?),
        PhysicalPlan::HashAggregate {
            group_by,
            aggregates,
            input,
        } => Box::new(HashAggregateExec::new(
            group_by.clone(),
            aggregates.clone(),
            build_operator(input)?,
        )),
        PhysicalPlan::Sort { keys, input } => {
            Box::new(SortExec::new(keys.clone(), build_operator(input)?))
        }
        PhysicalPlan::Limit {
            limit,
            offset,
            input,
        } => Box::new(LimitExec::new(*limit, *offset, build_operator(input)?)),
        PhysicalPlan::WindowOp { funcs, input } => {
            Box::new(WindowExec::new(funcs.clone(), build_operator(input)?))
        }
        PhysicalPlan::UnionAll { inputs } => {
            let mut children = Vec::with_capacity(inputs.len());
            for input in inputs {
                children.push(build_operator(input)?);
            }
            Box::new(UnionAllExec::new(children))
        }
    })
}

/// Concatenates its children in order.
pub struct UnionAllExec {
    children: Vec<Box<dyn Operator>>,
    current: usize,
}

impl UnionAllExec {
    pub fn new(children: Vec<Box<dyn Operator>>) -> Self {
        UnionAllExec {
            children,
            current: 0,
        }
    }
}

impl Operator for UnionAllExec {
    fn open(&mut self, ctx: &ExecContext) -> CResult<()> {
        for child in &mut self.children {
            child.open(ctx)?;
        }
        Ok(())
    }

    fn next(&mut self, ctx: &ExecContext) -> CResult<Option<Row>> {
        while self.current < self.children.len() {
            ctx.qctx.ensure_active()?;
            match self.children[self.current].next(ctx)? {
                Some(row) => return Ok(Some(row)),
                None => self.current += 1,
            }
        }
        Ok(None)
    }

    fn close(&mut self, ctx: &ExecContext) -> CResult<()> {
        let mut first_err = None;
        for child in &mut self.children {
            if let Err(err) = child.close(ctx) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
