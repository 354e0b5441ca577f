use std::cmp::Ordering;
use std::collections::HashMap;

use common::err::CResult;
use common::query::SortOrder;
use common::row::Row;
use common::value::Value;
use planner::logical::plan::{WindowExpr, WindowFrameSpec, WindowFuncKind};

use crate::aggregate::AggState;
use crate::context::ExecContext;
use crate::expression::evaluate;
use crate::operator::Operator;

/// Window functions: partition the input, order each partition, compute
/// one extra column per function. Input columns pass through untouched;
/// rows leave in partition-sorted order.
pub struct WindowExec {
    funcs: Vec<WindowExpr>,
    child: Box<dyn Operator>,
    output: Vec<Row>,
    cursor: usize,
}

impl WindowExec {
    pub fn new(funcs: Vec<WindowExpr>, child: Box<dyn Operator>) -> Self {
        WindowExec {
            funcs,
            child,
            output: Vec::new(),
            cursor: 0,
        }
    }

    fn compute_function(
        func: &WindowExpr,
        rows: &mut [Row],
        indices: &[usize],
        ctx: &ExecContext,
    ) -> CResult<()> {
        // indices are the partition's row positions, already in window order
        let ordered: Vec<usize> = indices.to_vec();
        match &func.func {
            WindowFuncKind::RowNumber => {
                for (pos, &i) in ordered.iter().enumerate() {
                    rows[i].set(func.alias.clone(), Value::BigInt(pos as i64 + 1));
                }
            }
            WindowFuncKind::Rank | WindowFuncKind::DenseRank => {
                let dense = func.func == WindowFuncKind::DenseRank;
                let mut rank = 0i64;
                let mut dense_rank = 0i64;
                let mut previous: Option<Vec<Value>> = None;
                for (pos, &i) in ordered.iter().enumerate() {
                    let mut key = Vec::with_capacity(func.order_by.len());
                    for k in &func.order_by {
                        key.push(evaluate(&k.expr, &rows[i], ctx)?);
                    }
                    let tied = previous
                        .as_ref()
                        .map(|p| {
                            p.len() == key.len()
                                && p.iter()
                                    .zip(&key)
                                    .all(|(a, b)| a.total_cmp(b) == Ordering::Equal)
                        })
                        .unwrap_or(false);
                    if !tied {
                        rank = pos as i64 + 1;
                        dense_rank += 1;
                    }
                    previous = Some(key);
                    let value = if dense { dense_rank } else { rank };
                    rows[i].set(func.alias.clone(), Value::BigInt(value));
                }
            }
            WindowFuncKind::Lag | WindowFuncKind::Lead => {
                let arg = func.arg.as_ref().ok_or_else(|| {
                    common::err::EngineError::Internal("lag/lead without argument".into())
                })?;
                let values: Vec<Value> = ordered
                    .iter()
                    .map(|&i| evaluate(arg, &rows[i], ctx))
                    .collect::<CResult<_>>()?;
                for (pos, &i) in ordered.iter().enumerate() {
                    let source = if func.func == WindowFuncKind::Lag {
                        pos.checked_sub(func.offset)
                    } else {
                        pos.checked_add(func.offset).filter(|p| *p < values.len())
                    };
                    let value = source.map(|p| values[p].clone()).unwrap_or(Value::Null);
                    rows[i].set(func.alias.clone(), value);
                }
            }
            WindowFuncKind::Aggregate(agg) => {
                let frame = func.frame.unwrap_or(WindowFrameSpec {
                    preceding: None,
                    following: Some(0),
                });
                for (pos, &i) in ordered.iter().enumerate() {
                    let start = match frame.preceding {
                        Some(p) => pos.saturating_sub(p),
                        None => 0,
                    };
                    let end = match frame.following {
                        Some(f) => (pos + f).min(ordered.len() - 1),
                        None => ordered.len() - 1,
                    };
                    let mut state = AggState::new(*agg);
                    for &j in &ordered[start..=end] {
                        let input = match &func.arg {
                            Some(arg) => evaluate(arg, &rows[j], ctx)?,
                            None => Value::BigInt(1),
                        };
                        state.update(&input)?;
                    }
                    rows[i].set(func.alias.clone(), state.finalize()?);
                }
            }
        }
        Ok(())
    }
}

impl Operator for WindowExec {
    fn open(&mut self, ctx: &ExecContext) -> CResult<()> {
        self.child.open(ctx)?;
        let mut rows = Vec::new();
        loop {
            ctx.qctx.ensure_active()?;
            let Some(row) = self.child.next(ctx)? else {
                break;
            };
            rows.push(row);
        }

        for func in &self.funcs {
            // bucket rows by partition key
            let mut partitions: HashMap<String, Vec<usize>> = HashMap::new();
            let mut order: Vec<String> = Vec::new();
            for (i, row) in rows.iter().enumerate() {
                let mut key = String::new();
                for p in &func.partition_by {
                    key.push_str(&evaluate(p, row, ctx)?.key());
                    key.push('\u{1f}');
                }
                if !partitions.contains_key(&key) {
                    order.push(key.clone());
                }
                partitions.entry(key).or_default().push(i);
            }

            for key in order {
                let mut indices = partitions.remove(&key).unwrap_or_default();
                if !func.order_by.is_empty() {
                    // stable sort by the window's ORDER BY
                    let mut decorated: Vec<(Vec<Value>, usize)> = Vec::new();
                    for &i in &indices {
                        let mut sort_key = Vec::with_capacity(func.order_by.len());
                        for k in &func.order_by {
                            sort_key.push(evaluate(&k.expr, &rows[i], ctx)?);
                        }
                        decorated.push((sort_key, i));
                    }
                    decorated.sort_by(|(a, _), (b, _)| {
                        for (idx, k) in func.order_by.iter().enumerate() {
                            let ord = a[idx].total_cmp(&b[idx]);
                            let ord = match k.order {
                                SortOrder::Asc => ord,
                                SortOrder::Desc => ord.reverse(),
                            };
                            if ord != Ordering::Equal {
                                return ord;
                            }
                        }
                        Ordering::Equal
                    });
                    indices = decorated.into_iter().map(|(_, i)| i).collect();
                }
                Self::compute_function(func, &mut rows, &indices, ctx)?;
            }
        }

        self.output = rows;
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
