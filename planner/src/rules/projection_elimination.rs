use crate::ast::expr::Expr;
use crate::logical::plan::LogicalPlan;
use crate::rules::{map_children, RewriteRule};

/// Drop projection nodes whose output is exactly their input's schema.
pub struct ProjectionElimination;

impl RewriteRule for ProjectionElimination {
    fn name(&self) -> &'static str {
        "ProjectionElimination"
    }

    fn apply(&self, plan: LogicalPlan) -> (LogicalPlan, bool) {
        let mut changed = false;
        let plan = eliminate(plan, &mut changed);
        (plan, changed)
    }
}

fn eliminate(plan: LogicalPlan, changed: &mut bool) -> LogicalPlan {
    let plan = map_children(plan, &mut |child| eliminate(child, changed));
    if let LogicalPlan::Projection { exprs, input } = &plan {
        let identical = {
            let input_columns = input.output_columns();
            exprs.len() == input_columns.len()
                && exprs.iter().zip(&input_columns).all(|(item, col)| {
                    item.alias.is_none() && item.expr == Expr::Column(col.clone())
                })
        };
        if identical {
            *changed = true;
            let LogicalPlan::Projection { input, .. } = plan else {
                unreachable!()
            };
            return *input;
        }
    }
    plan
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::logical::plan::NamedExpr;

    fn scan() -> LogicalPlan {
        LogicalPlan::DataSource {
            table: "t".into(),
            alias: None,
            schema: vec!["a".into(), "b".into()],
            filters: vec![],
            pushed_limit: None,
            projection: vec![],
            estimated_rows: 10,
            from_cte: false,
        }
    }

    #[test]
    fn removes_identity_projection() {
        let plan = LogicalPlan::Projection {
            exprs: vec![
                NamedExpr::new(Expr::col("a")),
                NamedExpr::new(Expr::col("b")),
            ],
            input: Box::new(scan()),
        };
        let (out, changed) = ProjectionElimination.apply(plan);
        assert!(changed);
        assert!(matches!(out, LogicalPlan::DataSource { .. }));
    }

    #[test]
    fn keeps_narrowing_projection() {
        let plan = LogicalPlan::Projection {
            exprs: vec![NamedExpr::new(Expr::col("a"))],
            input: Box::new(scan()),
        };
        let (out, changed) = ProjectionElimination.apply(plan);
        assert!(!changed);
        assert!(matches!(out, LogicalPlan::Projection { .. }));
    }

    #[test]
    fn keeps_renaming_projection() {
        let plan = LogicalPlan::Projection {
            exprs: vec![
                NamedExpr::aliased(Expr::col("a"), "x"),
                NamedExpr::new(Expr::col("b")),
            ],
            input: Box::new(scan()),
        };
        let (_, changed) = ProjectionElimination.apply(plan);
        assert!(!changed);
    }
}
