pub mod ast;
pub mod logical;
pub mod physical;
pub mod rules;

pub use ast::adapter::{parse_script, split_statements};
pub use ast::expr::{BinOp, Expr};
pub use ast::statement::{SelectPlan, ShowKind, Statement};
pub use logical::plan::LogicalPlan;
pub use physical::plan::PhysicalPlan;

use common::datasource::Catalog;
use common::err::CResult;

/// Full pipeline for one SELECT: rewrite to fixed point, then pick the
/// physical plan.
pub fn plan_select(select: &SelectPlan) -> CResult<physical::plan::PhysicalSelect> {
    let optimized = rules::optimize_select(select.clone());
    physical::planner::PhysicalPlanner::new().plan_select(&optimized)
}

/// Parse + plan convenience used by tests and the session layer.
pub fn prepare(sql: &str, catalog: &dyn Catalog) -> CResult<Vec<Statement>> {
    parse_script(sql, catalog)
}
