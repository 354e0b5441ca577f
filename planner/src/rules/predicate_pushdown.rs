use crate::ast::expr::Expr;
use crate::logical::plan::LogicalPlan;
use crate::rules::{conjoin, map_children, split_conjuncts, RewriteRule};

/// Move predicates toward the data: merge stacked selections, slide them
/// through projections, split them across joins, and turn source-shaped
/// conjuncts into pushed filters on the scan itself.
pub struct PredicatePushdown;

impl RewriteRule for PredicatePushdown {
    fn name(&self) -> &'static str {
        "PredicatePushdown"
    }

    fn apply(&self, plan: LogicalPlan) -> (LogicalPlan, bool) {
        let mut changed = false;
        let plan = push(plan, &mut changed);
        (plan, changed)
    }
}

fn push(plan: LogicalPlan, changed: &mut bool) -> LogicalPlan {
    let plan = map_children(plan, &mut |child| push(child, changed));
    let LogicalPlan::Selection { predicate, input } = plan else {
        return plan;
    };

    match *input {
        // merge adjacent selections under AND
        LogicalPlan::Selection {
            predicate: inner,
            input: deeper,
        } => {
            *changed = true;
            push(
                LogicalPlan::Selection {
                    predicate: Expr::and(predicate, inner),
                    input: deeper,
                },
                changed,
            )
        }

        // conjuncts expressible as source filters move into the scan
        LogicalPlan::DataSource {
            table,
            alias,
            schema,
            mut filters,
            pushed_limit,
            projection,
            estimated_rows,
            from_cte,
        } => {
            let mut conjuncts = Vec::new();
            split_conjuncts(predicate, &mut conjuncts);
            let mut residual = Vec::new();
            for conjunct in conjuncts {
                match conjunct.to_filter() {
                    Some(filter) => {
                        *changed = true;
                        filters.push(filter);
                    }
                    None => residual.push(conjunct),
                }
            }
            let source = LogicalPlan::DataSource {
                table,
                alias,
                schema,
                filters,
                pushed_limit,
                projection,
                estimated_rows,
                from_cte,
            };
            match conjoin(residual) {
                Some(rest) => LogicalPlan::Selection {
                    predicate: rest,
                    input: Box::new(source),
                },
                None => source,
            }
        }

        // slide below a projection when the predicate only references
        // columns the projection passes through
        LogicalPlan::Projection { exprs, input } => {
            let mut refs = std::collections::HashSet::new();
            predicate.referenced_columns(&mut refs);
            let pushable = !predicate.contains_subquery()
                && refs.iter().all(|r| input.resolves_column(r));
            if pushable {
                *changed = true;
                LogicalPlan::Projection {
                    exprs,
                    input: Box::new(push(
                        LogicalPlan::Selection {
                            predicate,
                            input,
                        },
                        changed,
                    )),
                }
            } else {
                LogicalPlan::Selection {
                    predicate,
                    input: Box::new(LogicalPlan::Projection { exprs, input }),
                }
            }
        }

        // split across a join: single-sided conjuncts sink into that side
        LogicalPlan::Join {
            join_type,
            condition,
            semi,
            right_qualifier,
            left,
            right,
        } => {
            let mut conjuncts = Vec::new();
            split_conjuncts(predicate, &mut conjuncts);
            let mut left_parts = Vec::new();
            let mut right_parts = Vec::new();
            let mut kept = Vec::new();
            for conjunct in conjuncts {
                if conjunct.contains_subquery() {
                    kept.push(conjunct);
                    continue;
                }
                let mut refs = std::collections::HashSet::new();
                conjunct.referenced_columns(&mut refs);
                let all_left = refs.iter().all(|r| left.resolves_column(r));
                let all_right = refs.iter().all(|r| right.resolves_column(r));
                match (all_left, all_right) {
                    (true, false) => left_parts.push(conjunct),
                    (false, true) => right_parts.push(conjunct),
                    _ => kept.push(conjunct),
                }
            }
            if left_parts.is_empty() && right_parts.is_empty() {
                LogicalPlan::Selection {
                    predicate: conjoin(kept).expect("kept conjuncts cannot be empty"),
                    input: Box::new(LogicalPlan::Join {
                        join_type,
                        condition,
                        semi,
                        right_qualifier,
                        left,
                        right,
                    }),
                }
            } else {
                *changed = true;
                let wrap = |side: Box<LogicalPlan>, parts: Vec<Expr>, changed: &mut bool| {
                    match conjoin(parts) {
                        Some(p) => Box::new(push(
                            LogicalPlan::Selection {
                                predicate: p,
                                input: side,
                            },
                            changed,
                        )),
                        None => side,
                    }
                };
                let joined = LogicalPlan::Join {
                    join_type,
                    condition,
                    semi,
                    right_qualifier,
                    left: wrap(left, left_parts, changed),
                    right: wrap(right, right_parts, changed),
                };
                match conjoin(kept) {
                    Some(rest) => LogicalPlan::Selection {
                        predicate: rest,
                        input: Box::new(joined),
                    },
                    None => joined,
                }
            }
        }

        other => LogicalPlan::Selection {
            predicate,
            input: Box::new(other),
        },
    }
}

#[cfg(test)]
mod test {
    use common::value::Value;

    use super::*;
    use crate::ast::expr::BinOp;

    fn scan(table: &str, cols: &[&str]) -> LogicalPlan {
        LogicalPlan::DataSource {
            table: table.into(),
            alias: None,
            schema: cols.iter().map(|c| c.to_string()).collect(),
            filters: vec![],
            pushed_limit: None,
            projection: vec![],
            estimated_rows: 100,
            from_cte: false,
        }
    }

    #[test]
    fn pushes_into_source_filters() {
        let plan = LogicalPlan::Selection {
            predicate: Expr::binary(Expr::col("age"), BinOp::Gt, Expr::lit(Value::Int(30))),
            input: Box::new(scan("t", &["age", "name"])),
        };
        let (out, changed) = PredicatePushdown.apply(plan);
        assert!(changed);
        let LogicalPlan::DataSource { filters, .. } = out else {
            panic!("selection should dissolve into the scan: {:?}", out)
        };
        assert_eq!(filters.len(), 1);
    }

    #[test]
    fn merges_adjacent_selections() {
        let plan = LogicalPlan::Selection {
            predicate: Expr::binary(Expr::col("a"), BinOp::Gt, Expr::lit(Value::Int(1))),
            input: Box::new(LogicalPlan::Selection {
                predicate: Expr::binary(Expr::col("b"), BinOp::Lt, Expr::lit(Value::Int(5))),
                input: Box::new(scan("t", &["a", "b"])),
            }),
        };
        let (out, changed) = PredicatePushdown.apply(plan);
        assert!(changed);
        let LogicalPlan::DataSource { filters, .. } = out else {
            panic!("expected fused scan, got {:?}", out)
        };
        assert_eq!(filters.len(), 2);
    }

    #[test]
    fn splits_across_join() {
        let join = LogicalPlan::Join {
            join_type: crate::logical::plan::JoinType::Inner,
            condition: Some(Expr::binary(
                Expr::col("u.id"),
                BinOp::Eq,
                Expr::col("o.user_id"),
            )),
            semi: false,
            right_qualifier: "o".into(),
            left: Box::new(scan("users", &["id", "age"])),
            right: Box::new(scan("orders", &["user_id", "total"])),
        };
        let plan = LogicalPlan::Selection {
            predicate: Expr::and(
                Expr::binary(Expr::col("age"), BinOp::Gt, Expr::lit(Value::Int(30))),
                Expr::binary(Expr::col("total"), BinOp::Gt, Expr::lit(Value::Int(10))),
            ),
            input: Box::new(join),
        };
        let (out, changed) = PredicatePushdown.apply(plan);
        assert!(changed);
        let LogicalPlan::Join { left, right, .. } = out else {
            panic!("join should surface, got {:?}", out)
        };
        let LogicalPlan::DataSource { filters, .. } = *left else {
            panic!("left side should be a filtered scan")
        };
        assert_eq!(filters[0].field, "age");
        let LogicalPlan::DataSource { filters, .. } = *right else {
            panic!("right side should be a filtered scan")
        };
        assert_eq!(filters[0].field, "total");
    }
}
