use crate::logical::plan::LogicalPlan;
use crate::rules::{map_children, RewriteRule};

/// Turn `Limit(n, offset 0)` into a read cap on the scan below. The cap
/// never crosses Selection, Sort, Join or Aggregate: all of them change
/// how many input rows are needed. (The memory source gives no ordering
/// guarantee, so the sort-prefix exception never applies to it.)
pub struct LimitPushdown;

impl RewriteRule for LimitPushdown {
    fn name(&self) -> &'static str {
        "LimitPushdown"
    }

    fn apply(&self, plan: LogicalPlan) -> (LogicalPlan, bool) {
        let mut changed = false;
        let plan = descend(plan, &mut changed);
        (plan, changed)
    }
}

fn descend(plan: LogicalPlan, changed: &mut bool) -> LogicalPlan {
    let plan = map_children(plan, &mut |child| descend(child, changed));
    if let LogicalPlan::Limit {
        limit: Some(n),
        offset: 0,
        input,
    } = plan
    {
        let capped = cap(*input, n, changed);
        LogicalPlan::Limit {
            limit: Some(n),
            offset: 0,
            input: Box::new(capped),
        }
    } else {
        plan
    }
}

fn cap(plan: LogicalPlan, n: usize, changed: &mut bool) -> LogicalPlan {
    match plan {
        LogicalPlan::DataSource {
            table,
            alias,
            schema,
            filters,
            pushed_limit,
            projection,
            estimated_rows,
            from_cte,
        } => {
            let new_cap = Some(pushed_limit.map_or(n, |old| old.min(n)));
            if new_cap != pushed_limit {
                *changed = true;
            }
            LogicalPlan::DataSource {
                table,
                alias,
                schema,
                filters,
                pushed_limit: new_cap,
                projection,
                estimated_rows,
                from_cte,
            }
        }
        // projections preserve row counts, the cap slides through
        LogicalPlan::Projection { exprs, input } => LogicalPlan::Projection {
            exprs,
            input: Box::new(cap(*input, n, changed)),
        },
        other => other,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn scan() -> LogicalPlan {
        LogicalPlan::DataSource {
            table: "t".into(),
            alias: None,
            schema: vec!["a".into()],
            filters: vec![],
            pushed_limit: None,
            projection: vec![],
            estimated_rows: 10_000,
            from_cte: false,
        }
    }

    #[test]
    fn caps_scan_through_projection() {
        let plan = LogicalPlan::Limit {
            limit: Some(10),
            offset: 0,
            input: Box::new(LogicalPlan::Projection {
                exprs: vec![crate::logical::plan::NamedExpr::new(
                    crate::ast::expr::Expr::col("a"),
                )],
                input: Box::new(scan()),
            }),
        };
        let (out, changed) = LimitPushdown.apply(plan);
        assert!(changed);
        let LogicalPlan::Limit { input, .. } = out else { panic!() };
        let LogicalPlan::Projection { input, .. } = *input else { panic!() };
        let LogicalPlan::DataSource { pushed_limit, .. } = *input else { panic!() };
        assert_eq!(pushed_limit, Some(10));
    }

    #[test]
    fn does_not_cross_sort() {
        let plan = LogicalPlan::Limit {
            limit: Some(10),
            offset: 0,
            input: Box::new(LogicalPlan::Sort {
                keys: vec![],
                input: Box::new(scan()),
            }),
        };
        let (out, changed) = LimitPushdown.apply(plan);
        assert!(!changed);
        let LogicalPlan::Limit { input, .. } = out else { panic!() };
        let LogicalPlan::Sort { input, .. } = *input else { panic!() };
        let LogicalPlan::DataSource { pushed_limit, .. } = *input else { panic!() };
        assert_eq!(pushed_limit, None);
    }

    #[test]
    fn offset_blocks_pushdown() {
        let plan = LogicalPlan::Limit {
            limit: Some(10),
            offset: 5,
            input: Box::new(scan()),
        };
        let (_, changed) = LimitPushdown.apply(plan);
        assert!(!changed);
    }
}
