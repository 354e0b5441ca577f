use tracing::debug;

use crate::ast::statement::{CteDef, SelectPlan};
use crate::logical::plan::LogicalPlan;

pub mod column_pruning;
pub mod constant_folding;
pub mod limit_pushdown;
pub mod predicate_pushdown;
pub mod projection_elimination;
pub mod semi_join;

pub use column_pruning::ColumnPruning;
pub use constant_folding::ConstantFolding;
pub use limit_pushdown::LimitPushdown;
pub use predicate_pushdown::PredicatePushdown;
pub use projection_elimination::ProjectionElimination;
pub use semi_join::SemiJoinRewrite;

/// A rewrite rule consumes the tree and reports whether it changed it.
pub trait RewriteRule {
    fn name(&self) -> &'static str;

    fn apply(&self, plan: LogicalPlan) -> (LogicalPlan, bool);
}

/// Hard cap on rewrite iterations; the driver normally reaches the fixed
/// point much earlier.
pub const MAX_REWRITE_ITERATIONS: usize = 16;

/// Run all rules in order until none of them changes the tree.
pub fn optimize(plan: LogicalPlan) -> LogicalPlan {
    let rules: [&dyn RewriteRule; 6] = [
        &ConstantFolding,
        &PredicatePushdown,
        &ColumnPruning,
        &ProjectionElimination,
        &LimitPushdown,
        &SemiJoinRewrite,
    ];
    let mut plan = plan;
    for iteration in 0..MAX_REWRITE_ITERATIONS {
        let mut changed = false;
        for rule in rules {
            let (next, rule_changed) = rule.apply(plan);
            plan = next;
            if rule_changed {
                debug!("rewrite {} changed the plan in iteration {}", rule.name(), iteration);
            }
            changed |= rule_changed;
        }
        if !changed {
            break;
        }
    }
    plan
}

pub fn optimize_select(select: SelectPlan) -> SelectPlan {
    SelectPlan {
        ctes: select
            .ctes
            .into_iter()
            .map(|cte| {
                let CteDef {
                    name,
                    columns,
                    plan,
                    recursive,
                } = cte;
                CteDef {
                    name,
                    columns,
                    plan: optimize(plan),
                    recursive,
                }
            })
            .collect(),
        root: optimize(select.root),
    }
}

/// Rebuild a node around freshly rewritten children, sharing the recursion
/// boilerplate between rules.
pub(crate) fn map_children(
    plan: LogicalPlan,
    f: &mut dyn FnMut(LogicalPlan) -> LogicalPlan,
) -> LogicalPlan {
    match plan {
        LogicalPlan::Selection { predicate, input } => LogicalPlan::Selection {
            predicate,
            input: Box::new(f(*input)),
        },
        LogicalPlan::Projection { exprs, input } => LogicalPlan::Projection {
            exprs,
            input: Box::new(f(*input)),
        },
        LogicalPlan::Limit {
            limit,
            offset,
            input,
        } => LogicalPlan::Limit {
            limit,
            offset,
            input: Box::new(f(*input)),
        },
        LogicalPlan::Sort { keys, input } => LogicalPlan::Sort {
            keys,
            input: Box::new(f(*input)),
        },
        LogicalPlan::Join {
            join_type,
            condition,
            semi,
            right_qualifier,
            left,
            right,
        } => LogicalPlan::Join {
            join_type,
            condition,
            semi,
            right_qualifier,
            left: Box::new(f(*left)),
            right: Box::new(f(*right)),
        },
        LogicalPlan::Aggregate {
            group_by,
            aggregates,
            input,
        } => LogicalPlan::Aggregate {
            group_by,
            aggregates,
            input: Box::new(f(*input)),
        },
        LogicalPlan::Window { funcs, input } => LogicalPlan::Window {
            funcs,
            input: Box::new(f(*input)),
        },
        LogicalPlan::Union { inputs, all } => LogicalPlan::Union {
            inputs: inputs.into_iter().map(f).collect(),
            all,
        },
        leaf => leaf,
    }
}

/// Split an AND tree into its conjuncts.
pub(crate) fn split_conjuncts(expr: crate::ast::expr::Expr, out: &mut Vec<crate::ast::expr::Expr>) {
    use crate::ast::expr::{BinOp, Expr};
    match expr {
        Expr::BinaryOp {
            left,
            op: BinOp::And,
            right,
        } => {
            split_conjuncts(*left, out);
            split_conjuncts(*right, out);
        }
        other => out.push(other),
    }
}

/// Rebuild an AND tree; `None` when the list is empty.
pub(crate) fn conjoin(exprs: Vec<crate::ast::expr::Expr>) -> Option<crate::ast::expr::Expr> {
    use crate::ast::expr::Expr;
    let mut it = exprs.into_iter();
    let first = it.next()?;
    Some(it.fold(first, Expr::and))
}
