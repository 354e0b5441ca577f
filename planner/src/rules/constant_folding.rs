use common::value::Value;

use crate::ast::expr::{BinOp, Expr};
use crate::logical::plan::{eval_const, LogicalPlan};
use crate::rules::{map_children, RewriteRule};

/// Evaluate literal sub-expressions and collapse boolean identities:
/// `x AND true → x`, `x AND false → false`, symmetric for OR.
pub struct ConstantFolding;

impl RewriteRule for ConstantFolding {
    fn name(&self) -> &'static str {
        "ConstantFolding"
    }

    fn apply(&self, plan: LogicalPlan) -> (LogicalPlan, bool) {
        let mut changed = false;
        let plan = fold_plan(plan, &mut changed);
        (plan, changed)
    }
}

fn fold_plan(plan: LogicalPlan, changed: &mut bool) -> LogicalPlan {
    let plan = map_children(plan, &mut |child| fold_plan(child, changed));
    match plan {
        LogicalPlan::Selection { predicate, input } => LogicalPlan::Selection {
            predicate: fold_expr(predicate, changed),
            input,
        },
        LogicalPlan::Projection { mut exprs, input } => {
            for item in &mut exprs {
                let expr = std::mem::replace(&mut item.expr, Expr::Wildcard);
                item.expr = fold_expr(expr, changed);
            }
            LogicalPlan::Projection { exprs, input }
        }
        LogicalPlan::Sort { mut keys, input } => {
            for key in &mut keys {
                let expr = std::mem::replace(&mut key.expr, Expr::Wildcard);
                key.expr = fold_expr(expr, changed);
            }
            LogicalPlan::Sort { keys, input }
        }
        LogicalPlan::Join {
            join_type,
            condition,
            semi,
            right_qualifier,
            left,
            right,
        } => LogicalPlan::Join {
            join_type,
            condition: condition.map(|c| fold_expr(c, changed)),
            semi,
            right_qualifier,
            left,
            right,
        },
        other => other,
    }
}

fn fold_expr(expr: Expr, changed: &mut bool) -> Expr {
    // fold leaves first so parents see literal children
    let expr = match expr {
        Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
            left: Box::new(fold_expr(*left, changed)),
            op,
            right: Box::new(fold_expr(*right, changed)),
        },
        Expr::Not(e) => Expr::Not(Box::new(fold_expr(*e, changed))),
        Expr::Neg(e) => Expr::Neg(Box::new(fold_expr(*e, changed))),
        other => other,
    };

    if !matches!(expr, Expr::Literal(_)) {
        if let Some(value) = eval_const(&expr) {
            *changed = true;
            return Expr::Literal(value);
        }
    }

    if let Expr::BinaryOp { left, op, right } = &expr {
        let (lit, other) = match (left.as_literal(), right.as_literal()) {
            (Some(v), None) => (Some(v.clone()), (**right).clone()),
            (None, Some(v)) => (Some(v.clone()), (**left).clone()),
            _ => (None, Expr::Wildcard),
        };
        if let Some(lit) = lit {
            match (op, lit.truthy()) {
                (BinOp::And, Some(true)) | (BinOp::Or, Some(false)) => {
                    *changed = true;
                    return other;
                }
                (BinOp::And, Some(false)) => {
                    *changed = true;
                    return Expr::Literal(Value::Bool(false));
                }
                (BinOp::Or, Some(true)) => {
                    *changed = true;
                    return Expr::Literal(Value::Bool(true));
                }
                _ => {}
            }
        }
    }
    expr
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn folds_arithmetic() {
        let mut changed = false;
        let e = Expr::binary(
            Expr::lit(Value::Int(1)),
            BinOp::Plus,
            Expr::lit(Value::Int(2)),
        );
        let folded = fold_expr(e, &mut changed);
        assert!(changed);
        assert_eq!(folded, Expr::Literal(Value::BigInt(3)));
    }

    #[test]
    fn collapses_boolean_identities() {
        let mut changed = false;
        let e = Expr::and(Expr::col("a"), Expr::lit(Value::Bool(true)));
        assert_eq!(fold_expr(e, &mut changed), Expr::col("a"));

        let e = Expr::and(Expr::col("a"), Expr::lit(Value::Bool(false)));
        assert_eq!(
            fold_expr(e, &mut changed),
            Expr::Literal(Value::Bool(false))
        );

        let e = Expr::binary(Expr::col("a"), BinOp::Or, Expr::lit(Value::Bool(true)));
        assert_eq!(fold_expr(e, &mut changed), Expr::Literal(Value::Bool(true)));
    }

    #[test]
    fn fixed_point_on_plain_columns() {
        let mut changed = false;
        let e = Expr::binary(Expr::col("a"), BinOp::Gt, Expr::lit(Value::Int(1)));
        let folded = fold_expr(e.clone(), &mut changed);
        assert!(!changed);
        assert_eq!(folded, e);
    }
}
