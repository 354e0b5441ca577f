use std::cmp::Ordering;
use std::collections::HashMap;

use common::err::CResult;
use common::row::Row;
use common::value::Value;
use planner::logical::plan::{AggExpr, AggFunc, NamedExpr};

use crate::context::ExecContext;
use crate::expression::evaluate;
use crate::operator::Operator;

/// Running state of one aggregate inside one group.
#[derive(Debug, Clone)]
pub enum AggState {
    Count(u64),
    Sum(Value),
    Avg { sum: Value, count: u64 },
    Min(Value),
    Max(Value),
}

impl AggState {
    pub fn new(func: AggFunc) -> AggState {
        match func {
            AggFunc::CountStar | AggFunc::Count => AggState::Count(0),
            AggFunc::Sum => AggState::Sum(Value::Null),
            AggFunc::Avg => AggState::Avg {
                sum: Value::Null,
                count: 0,
            },
            AggFunc::Min => AggState::Min(Value::Null),
            AggFunc::Max => AggState::Max(Value::Null),
        }
    }

    /// Fold one input. Null inputs are skipped by everything except
    /// COUNT(*), whose callers pass a non-null marker.
    pub fn update(&mut self, value: &Value) -> CResult<()> {
        if value.is_null() {
            return Ok(());
        }
        match self {
            AggState::Count(n) => *n += 1,
            AggState::Sum(acc) => {
                *acc = if acc.is_null() {
                    value.clone()
                } else {
                    acc.add(value)?
                };
            }
            AggState::Avg { sum, count } => {
                *sum = if sum.is_null() {
                    value.clone()
                } else {
                    sum.add(value)?
                };
                *count += 1;
            }
            AggState::Min(acc) => {
                if acc.is_null() || value.compare(acc) == Some(Ordering::Less) {
                    *acc = value.clone();
                }
            }
            AggState::Max(acc) => {
                if acc.is_null() || value.compare(acc) == Some(Ordering::Greater) {
                    *acc = value.clone();
                }
            }
        }
        Ok(())
    }

    pub fn finalize(&self) -> CResult<Value> {
        Ok(match self {
            AggState::Count(n) => Value::BigInt(*n as i64),
            AggState::Sum(acc) | AggState::Min(acc) | AggState::Max(acc) => acc.clone(),
            AggState::Avg { sum, count } => {
                if *count == 0 {
                    Value::Null
                } else {
                    sum.div(&Value::BigInt(*count as i64))?
                }
            }
        })
    }
}

/// Hash aggregation: one bucket per distinct group key, keyed by the
/// deterministic serialization of the group expressions.
pub struct HashAggregateExec {
    group_by: Vec<NamedExpr>,
    aggregates: Vec<AggExpr>,
    child: Box<dyn Operator>,
    output: Vec<Row>,
    cursor: usize,
}

impl HashAggregateExec {
    pub fn new(
        group_by: Vec<NamedExpr>,
        aggregates: Vec<AggExpr>,
        child: Box<dyn Operator>,
    ) -> Self {
        HashAggregateExec {
            group_by,
            aggregates,
            child,
            output: Vec::new(),
            cursor: 0,
        }
    }
}

impl Operator for HashAggregateExec {
    fn open(&mut self, ctx: &ExecContext) -> CResult<()> {
        self.child.open(ctx)?;

        // group key → (key values, aggregate states), insertion-ordered
        // through the side vector for deterministic output
        let mut buckets: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Value>, Vec<AggState>)> = Vec::new();

        loop {
            ctx.qctx.ensure_active()?;
            let Some(row) = self.child.next(ctx)? else {
                break;
            };
            let mut key_values = Vec::with_capacity(self.group_by.len());
            let mut key = String::new();
            for g in &self.group_by {
                let v = evaluate(&g.expr, &row, ctx)?;
                key.push_str(&v.key());
                key.push('\u{1f}');
                key_values.push(v);
            }
            let index = match buckets.get(&key) {
                Some(i) => *i,
                None => {
                    let states = self
                        .aggregates
                        .iter()
                        .map(|a| AggState::new(a.func))
                        .collect();
                    groups.push((key_values, states));
                    buckets.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            let states = &mut groups[index].1;
            for (agg, state) in self.aggregates.iter().zip(states.iter_mut()) {
                let input = match (&agg.func, &agg.arg) {
                    (AggFunc::CountStar, _) => Value::BigInt(1),
                    (_, Some(arg)) => evaluate(arg, &row, ctx)?,
                    (_, None) => Value::BigInt(1),
                };
                state.update(&input)?;
            }
        }

        // an empty input without GROUP BY still yields one row:
        // COUNT = 0, SUM/AVG/MIN/MAX = null
        if groups.is_empty() && self.group_by.is_empty() && !self.aggregates.is_empty() {
            groups.push((
                Vec::new(),
                self.aggregates.iter().map(|a| AggState::new(a.func)).collect(),
            ));
        }

        let mut output = Vec::with_capacity(groups.len());
        for (key_values, states) in groups {
            let mut row = Row::new();
            for (g, v) in self.group_by.iter().zip(key_values) {
                row.set(g.name(), v);
            }
            for (agg, state) in self.aggregates.iter().zip(states) {
                row.set(agg.alias.clone(), state.finalize()?);
            }
            output.push(row);
        }
        self.output = output;
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self, ctx: &ExecContext) -> CResult<Option<Row>> {
        ctx.qctx.ensure_active()?;
        if self.cursor >= self.output.len() {
            return Ok(None);
        }
        let row = self.output[self.cursor].clone();
        self.cursor += 1;
        Ok(Some(row))
    }

    fn close(&mut self, ctx: &ExecContext) -> CResult<()> {
        self.output.clear();
        self.child.close(ctx)
    }
}

#[cfg(test)]
mod test {
    use planner::ast::expr::Expr;
    use planner::physical::plan::PhysicalPlan;

    use super::*;
    use crate::expression::test::test_ctx;

    fn values(columns: &[&str], rows: Vec<Vec<Value>>) -> PhysicalPlan {
        PhysicalPlan::Values {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Expr::Literal).collect())
                .collect(),
        }
    }

    fn aggregate(
        input: PhysicalPlan,
        group: &[&str],
        aggs: Vec<(AggFunc, Option<&str>, &str)>,
    ) -> PhysicalPlan {
        PhysicalPlan::HashAggregate {
            group_by: group.iter().map(|g| NamedExpr::new(Expr::col(*g))).collect(),
            aggregates: aggs
                .into_iter()
                .map(|(func, arg, alias)| AggExpr {
                    func,
                    arg: arg.map(Expr::col),
                    alias: alias.to_string(),
                })
                .collect(),
            input: Box::new(input),
        }
    }

    #[test]
    fn groups_and_null_skipping() {
        let input = values(
            &["k", "v"],
            vec![
                vec![Value::String("a".into()), Value::Int(1)],
                vec![Value::String("a".into()), Value::Null],
                vec![Value::String("b".into()), Value::Int(5)],
            ],
        );
        let plan = aggregate(
            input,
            &["k"],
            vec![
                (AggFunc::CountStar, None, "count(*)"),
                (AggFunc::Count, Some("v"), "count(v)"),
                (AggFunc::Sum, Some("v"), "sum(v)"),
                (AggFunc::Avg, Some("v"), "avg(v)"),
            ],
        );
        let ctx = test_ctx();
        let rows = crate::execute_plan(&plan, &ctx).unwrap().rows;
        assert_eq!(rows.len(), 2);
        let a = rows
            .iter()
            .find(|r| r.value("k") == Value::String("a".into()))
            .unwrap();
        assert_eq!(a.value("count(*)"), Value::BigInt(2));
        assert_eq!(a.value("count(v)"), Value::BigInt(1));
        assert_eq!(a.value("sum(v)"), Value::Int(1));
        assert_eq!(a.value("avg(v)"), Value::Double(1.0));
    }

    #[test]
    fn empty_input_yields_single_zero_row() {
        let plan = aggregate(
            values(&["v"], vec![]),
            &[],
            vec![
                (AggFunc::CountStar, None, "count(*)"),
                (AggFunc::Sum, Some("v"), "sum(v)"),
                (AggFunc::Min, Some("v"), "min(v)"),
            ],
        );
        let ctx = test_ctx();
        let rows = crate::execute_plan(&plan, &ctx).unwrap().rows;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("count(*)"), Value::BigInt(0));
        assert_eq!(rows[0].value("sum(v)"), Value::Null);
        assert_eq!(rows[0].value("min(v)"), Value::Null);
    }

    #[test]
    fn distinct_via_empty_aggregate_list() {
        let input = values(
            &["k"],
            vec![
                vec![Value::Int(1)],
                vec![Value::Int(1)],
                vec![Value::Int(2)],
            ],
        );
        let plan = aggregate(input, &["k"], vec![]);
        let ctx = test_ctx();
        let rows = crate::execute_plan(&plan, &ctx).unwrap().rows;
        assert_eq!(rows.len(), 2);
    }
}
