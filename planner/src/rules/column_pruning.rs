use std::collections::HashSet;

use crate::logical::plan::LogicalPlan;
use crate::rules::RewriteRule;

/// Propagate the column set each parent needs down to the scans, so a
/// DataSource reads only what the query touches.
pub struct ColumnPruning;

impl RewriteRule for ColumnPruning {
    fn name(&self) -> &'static str {
        "ColumnPruning"
    }

    fn apply(&self, plan: LogicalPlan) -> (LogicalPlan, bool) {
        let mut changed = false;
        let plan = prune(plan, None, &mut changed);
        (plan, changed)
    }
}

fn bare(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, b)| b).unwrap_or(name)
}

/// `required = None` means the parent needs every column.
fn prune(plan: LogicalPlan, required: Option<HashSet<String>>, changed: &mut bool) -> LogicalPlan {
    match plan {
        LogicalPlan::Projection { exprs, input } => {
            let mut needs = HashSet::new();
            for item in &exprs {
                item.expr.referenced_columns(&mut needs);
            }
            LogicalPlan::Projection {
                exprs,
                input: Box::new(prune(*input, Some(needs), changed)),
            }
        }
        LogicalPlan::Selection { predicate, input } => {
            let needs = required.map(|mut r| {
                predicate.referenced_columns(&mut r);
                r
            });
            LogicalPlan::Selection {
                predicate,
                input: Box::new(prune(*input, needs, changed)),
            }
        }
        LogicalPlan::Sort { keys, input } => {
            let needs = required.map(|mut r| {
                for key in &keys {
                    key.expr.referenced_columns(&mut r);
                }
                r
            });
            LogicalPlan::Sort {
                keys,
                input: Box::new(prune(*input, needs, changed)),
            }
        }
        LogicalPlan::Limit {
            limit,
            offset,
            input,
        } => LogicalPlan::Limit {
            limit,
            offset,
            input: Box::new(prune(*input, required, changed)),
        },
        LogicalPlan::Aggregate {
            group_by,
            aggregates,
            input,
        } => {
            // aggregates fully define their input needs
            let mut needs = HashSet::new();
            for g in &group_by {
                g.expr.referenced_columns(&mut needs);
            }
            for a in &aggregates {
                if let Some(arg) = &a.arg {
                    arg.referenced_columns(&mut needs);
                }
            }
            let needs = if needs.is_empty() { None } else { Some(needs) };
            LogicalPlan::Aggregate {
                group_by,
                aggregates,
                input: Box::new(prune(*input, needs, changed)),
            }
        }
        LogicalPlan::Window { funcs, input } => {
            let needs = required.map(|r| {
                let mut needs: HashSet<String> = r
                    .into_iter()
                    .filter(|c| !funcs.iter().any(|f| &f.alias == c))
                    .collect();
                for f in &funcs {
                    if let Some(arg) = &f.arg {
                        arg.referenced_columns(&mut needs);
                    }
                    for p in &f.partition_by {
                        p.referenced_columns(&mut needs);
                    }
                    for k in &f.order_by {
                        k.expr.referenced_columns(&mut needs);
                    }
                }
                needs
            });
            LogicalPlan::Window {
                funcs,
                input: Box::new(prune(*input, needs, changed)),
            }
        }
        LogicalPlan::Join {
            join_type,
            condition,
            semi,
            right_qualifier,
            left,
            right,
        } => {
            let needs = required.map(|mut r| {
                if let Some(c) = &condition {
                    c.referenced_columns(&mut r);
                }
                r
            });
            let (left_needs, right_needs) = match &needs {
                None => (None, None),
                Some(all) => {
                    let l: HashSet<String> = all
                        .iter()
                        .filter(|c| left.resolves_column(c))
                        .cloned()
                        .collect();
                    let r: HashSet<String> = all
                        .iter()
                        .filter(|c| right.resolves_column(c))
                        .cloned()
                        .collect();
                    (Some(l), Some(r))
                }
            };
            LogicalPlan::Join {
                join_type,
                condition,
                semi,
                right_qualifier,
                left: Box::new(prune(*left, left_needs, changed)),
                right: Box::new(prune(*right, right_needs, changed)),
            }
        }
        LogicalPlan::Union { inputs, all } => LogicalPlan::Union {
            // branch column names differ; pruning through a union would
            // need positional mapping
            inputs: inputs
                .into_iter()
                .map(|p| prune(p, None, changed))
                .collect(),
            all,
        },
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
            let new_projection = match &required {
                None => projection.clone(),
                Some(req) => {
                    let wanted: Vec<String> = schema
                        .iter()
                        .filter(|col| req.iter().any(|r| bare(r) == bare(col)))
                        .cloned()
                        .collect();
                    if wanted.is_empty() || wanted.len() == schema.len() {
                        // nothing referenced (COUNT(*)) still reads one
                        // column to keep row shape
                        if wanted.is_empty() && !schema.is_empty() && required.is_some() {
                            vec![schema[0].clone()]
                        } else {
                            projection.clone()
                        }
                    } else {
                        wanted
                    }
                }
            };
            if new_projection != projection {
                *changed = true;
            }
            LogicalPlan::DataSource {
                table,
                alias,
                schema,
                filters,
                pushed_limit,
                projection: new_projection,
                estimated_rows,
                from_cte,
            }
        }
        leaf @ LogicalPlan::Values { .. } => leaf,
    }
}

#[cfg(test)]
mod test {
    use common::value::Value;

    use super::*;
    use crate::ast::expr::{BinOp, Expr};
    use crate::logical::plan::NamedExpr;

    #[test]
    fn scan_reads_only_referenced_columns() {
        let scan = LogicalPlan::DataSource {
            table: "t".into(),
            alias: None,
            schema: vec!["a".into(), "b".into(), "c".into()],
            filters: vec![],
            pushed_limit: None,
            projection: vec![],
            estimated_rows: 10,
            from_cte: false,
        };
        let plan = LogicalPlan::Projection {
            exprs: vec![NamedExpr::new(Expr::binary(
                Expr::col("a"),
                BinOp::Plus,
                Expr::lit(Value::Int(1)),
            ))],
            input: Box::new(scan),
        };
        let (out, changed) = ColumnPruning.apply(plan);
        assert!(changed);
        let LogicalPlan::Projection { input, .. } = out else {
            panic!()
        };
        let LogicalPlan::DataSource { projection, .. } = *input else {
            panic!()
        };
        assert_eq!(projection, vec!["a".to_string()]);
    }

    #[test]
    fn reaches_fixed_point() {
        let scan = LogicalPlan::DataSource {
            table: "t".into(),
            alias: None,
            schema: vec!["a".into(), "b".into()],
            filters: vec![],
            pushed_limit: None,
            projection: vec![],
            estimated_rows: 10,
            from_cte: false,
        };
        let plan = LogicalPlan::Projection {
            exprs: vec![NamedExpr::new(Expr::col("a"))],
            input: Box::new(scan),
        };
        let (out, first) = ColumnPruning.apply(plan);
        assert!(first);
        let (_, second) = ColumnPruning.apply(out);
        assert!(!second);
    }
}
