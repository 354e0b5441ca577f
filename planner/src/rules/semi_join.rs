use crate::ast::expr::{BinOp, Expr};
use crate::logical::plan::{JoinType, LogicalPlan};
use crate::rules::{conjoin, map_children, split_conjuncts, RewriteRule};

/// Rewrite `IN (SELECT ...)` and equi-correlated `EXISTS (SELECT ...)`
/// into semi joins: an inner hash join that emits each probe row at most
/// once and carries no build-side columns.
pub struct SemiJoinRewrite;

impl RewriteRule for SemiJoinRewrite {
    fn name(&self) -> &'static str {
        "SemiJoinRewrite"
    }

    fn apply(&self, plan: LogicalPlan) -> (LogicalPlan, bool) {
        let mut changed = false;
        let plan = rewrite(plan, &mut changed);
        (plan, changed)
    }
}

fn rewrite(plan: LogicalPlan, changed: &mut bool) -> LogicalPlan {
    let plan = map_children(plan, &mut |child| rewrite(child, changed));
    let LogicalPlan::Selection { predicate, input } = plan else {
        return plan;
    };

    let mut conjuncts = Vec::new();
    split_conjuncts(predicate, &mut conjuncts);

    let mut current = *input;
    let mut kept = Vec::new();
    for conjunct in conjuncts {
        match conjunct {
            Expr::InSubquery {
                expr,
                subquery,
                negated: false,
            } => {
                if let Expr::Column(outer) = *expr {
                    let inner = subquery
                        .output_columns()
                        .first()
                        .cloned()
                        .unwrap_or_default();
                    *changed = true;
                    current = semi_join(current, *subquery, outer, inner);
                } else {
                    kept.push(Expr::InSubquery {
                        expr,
                        subquery,
                        negated: false,
                    });
                }
            }
            Expr::Exists {
                mut subquery,
                negated: false,
            } => match extract_correlation(&mut subquery) {
                Some((outer, inner)) => {
                    *changed = true;
                    current = semi_join(current, *subquery, outer, inner);
                }
                None => kept.push(Expr::Exists {
                    subquery,
                    negated: false,
                }),
            },
            other => kept.push(other),
        }
    }

    match conjoin(kept) {
        Some(rest) => LogicalPlan::Selection {
            predicate: rest,
            input: Box::new(current),
        },
        None => current,
    }
}

fn semi_join(left: LogicalPlan, right: LogicalPlan, outer: String, inner: String) -> LogicalPlan {
    LogicalPlan::Join {
        join_type: JoinType::Inner,
        condition: Some(Expr::binary(
            Expr::Column(outer),
            BinOp::Eq,
            Expr::Column(inner),
        )),
        semi: true,
        right_qualifier: "semi".to_string(),
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Find and remove one `outer_col = inner_col` conjunct inside the
/// subquery: the side the subquery itself cannot resolve is the outer
/// correlation. Returns (outer, inner) column names.
fn extract_correlation(plan: &mut LogicalPlan) -> Option<(String, String)> {
    match plan {
        LogicalPlan::Selection { predicate, input } => {
            let mut conjuncts = Vec::new();
            split_conjuncts(predicate.clone(), &mut conjuncts);
            let mut found = None;
            let mut rest = Vec::new();
            for conjunct in conjuncts {
                if found.is_none() {
                    if let Expr::BinaryOp { left, op: BinOp::Eq, right } = &conjunct {
                        if let (Expr::Column(a), Expr::Column(b)) = (&**left, &**right) {
                            let a_inner = input.resolves_column(a);
                            let b_inner = input.resolves_column(b);
                            match (a_inner, b_inner) {
                                (false, true) => {
                                    found = Some((a.clone(), b.clone()));
                                    continue;
                                }
                                (true, false) => {
                                    found = Some((b.clone(), a.clone()));
                                    continue;
                                }
                                _ => {}
                            }
                        }
                    }
                }
                rest.push(conjunct);
            }
            let found = found?;
            match conjoin(rest) {
                Some(p) => *predicate = p,
                None => {
                    let input = std::mem::replace(input, Box::new(LogicalPlan::empty()));
                    *plan = *input;
                }
            }
            Some(found)
        }
        LogicalPlan::Projection { input, .. }
        | LogicalPlan::Limit { input, .. }
        | LogicalPlan::Sort { input, .. } => extract_correlation(input),
        _ => None,
    }
}
