use common::query::{Filter, SortOrder};
use common::value::Value;

use crate::ast::expr::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl JoinType {
    pub fn name(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub expr: Expr,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    CountStar,
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    pub fn parse(name: &str) -> Option<AggFunc> {
        Some(match name.to_ascii_lowercase().as_str() {
            "count" => AggFunc::Count,
            "sum" => AggFunc::Sum,
            "avg" => AggFunc::Avg,
            "min" => AggFunc::Min,
            "max" => AggFunc::Max,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggFunc::CountStar => "count",
            AggFunc::Count => "count",
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggExpr {
    pub func: AggFunc,
    /// None for COUNT(*).
    pub arg: Option<Expr>,
    /// Output column name.
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl NamedExpr {
    pub fn new(expr: Expr) -> NamedExpr {
        NamedExpr { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> NamedExpr {
        NamedExpr {
            expr,
            alias: Some(alias.into()),
        }
    }

    pub fn name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.expr.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFuncKind {
    RowNumber,
    Rank,
    DenseRank,
    Lag,
    Lead,
    Aggregate(AggFunc),
}

/// ROWS frame with literal bounds; `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFrameSpec {
    pub preceding: Option<usize>,
    pub following: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowExpr {
    pub func: WindowFuncKind,
    pub arg: Option<Expr>,
    /// LAG/LEAD distance.
    pub offset: usize,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<SortKey>,
    pub frame: Option<WindowFrameSpec>,
    pub alias: String,
}

/// Logical operator tree. Parents own children exclusively; rewrite rules
/// consume and return whole trees.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    DataSource {
        table: String,
        /// FROM-clause alias, used to resolve qualified column references.
        alias: Option<String>,
        /// Full column list of the underlying table (or CTE).
        schema: Vec<String>,
        /// Predicates pushed into the source.
        filters: Vec<Filter>,
        /// Read cap pushed into the source.
        pushed_limit: Option<usize>,
        /// Columns the source must emit; empty means all.
        projection: Vec<String>,
        estimated_rows: usize,
        from_cte: bool,
    },
    /// Literal rows, e.g. SELECT without FROM.
    Values {
        columns: Vec<String>,
        rows: Vec<Vec<Expr>>,
    },
    Selection {
        predicate: Expr,
        input: Box<LogicalPlan>,
    },
    Projection {
        exprs: Vec<NamedExpr>,
        input: Box<LogicalPlan>,
    },
    Limit {
        limit: Option<usize>,
        offset: usize,
        input: Box<LogicalPlan>,
    },
    Sort {
        keys: Vec<SortKey>,
        input: Box<LogicalPlan>,
    },
    Join {
        join_type: JoinType,
        condition: Option<Expr>,
        /// Emit probe rows at most once, no build columns (semi join).
        semi: bool,
        /// Qualifier for right-side columns on name collision.
        right_qualifier: String,
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
    },
    Aggregate {
        group_by: Vec<NamedExpr>,
        aggregates: Vec<AggExpr>,
        input: Box<LogicalPlan>,
    },
    Window {
        funcs: Vec<WindowExpr>,
        input: Box<LogicalPlan>,
    },
    Union {
        inputs: Vec<LogicalPlan>,
        all: bool,
    },
}

impl LogicalPlan {
    pub fn values_one_row(exprs: &[NamedExpr]) -> LogicalPlan {
        LogicalPlan::Values {
            columns: exprs.iter().map(|e| e.name()).collect(),
            rows: vec![exprs.iter().map(|e| e.expr.clone()).collect()],
        }
    }

    /// Placeholder schema-less empty relation.
    pub fn empty() -> LogicalPlan {
        LogicalPlan::Values {
            columns: Vec::new(),
            rows: vec![Vec::new()],
        }
    }

    /// Output column order as seen by the parent operator.
    pub fn output_columns(&self) -> Vec<String> {
        match self {
            LogicalPlan::DataSource {
                schema, projection, ..
            } => {
                if projection.is_empty() {
                    schema.clone()
                } else {
                    projection.clone()
                }
            }
            LogicalPlan::Values { columns, .. } => columns.clone(),
            LogicalPlan::Selection { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::Sort { input, .. } => input.output_columns(),
            LogicalPlan::Projection { exprs, .. } => exprs.iter().map(|e| e.name()).collect(),
            LogicalPlan::Join {
                left,
                right,
                semi,
                right_qualifier,
                ..
            } => {
                let mut out = left.output_columns();
                if !*semi {
                    for col in right.output_columns() {
                        if out.contains(&col) {
                            out.push(format!("{}.{}", right_qualifier, col));
                        } else {
                            out.push(col);
                        }
                    }
                }
                out
            }
            LogicalPlan::Aggregate {
                group_by,
                aggregates,
                ..
            } => group_by
                .iter()
                .map(|g| g.name())
                .chain(aggregates.iter().map(|a| a.alias.clone()))
                .collect(),
            LogicalPlan::Window { funcs, input } => {
                let mut out = input.output_columns();
                out.extend(funcs.iter().map(|f| f.alias.clone()));
                out
            }
            LogicalPlan::Union { inputs, .. } => inputs
                .first()
                .map(|p| p.output_columns())
                .unwrap_or_default(),
        }
    }

    /// Cardinality guess: source-reported rows, halved per unconstrained
    /// selection, min-side for equi joins.
    pub fn estimated_rows(&self) -> usize {
        match self {
            LogicalPlan::DataSource {
                estimated_rows,
                filters,
                pushed_limit,
                ..
            } => {
                let mut rows = *estimated_rows;
                if !filters.is_empty() {
                    rows /= 2;
                }
                if let Some(cap) = pushed_limit {
                    rows = rows.min(*cap);
                }
                rows
            }
            LogicalPlan::Values { rows, .. } => rows.len(),
            LogicalPlan::Selection { input, .. } => input.estimated_rows() / 2,
            LogicalPlan::Projection { input, .. } | LogicalPlan::Window { input, .. } => {
                input.estimated_rows()
            }
            LogicalPlan::Limit { limit, input, .. } => match limit {
                Some(n) => input.estimated_rows().min(*n),
                None => input.estimated_rows(),
            },
            LogicalPlan::Sort { input, .. } => input.estimated_rows(),
            LogicalPlan::Join {
                left,
                right,
                condition,
                ..
            } => {
                let l = left.estimated_rows();
                let r = right.estimated_rows();
                if is_equi_condition(condition) {
                    l.min(r)
                } else {
                    (l.saturating_mul(r)) / 10
                }
            }
            LogicalPlan::Aggregate { input, .. } => (input.estimated_rows() / 2).max(1),
            LogicalPlan::Union { inputs, .. } => {
                inputs.iter().map(|p| p.estimated_rows()).sum()
            }
        }
    }

    /// Table names and aliases reachable in this subtree; used to decide
    /// which join side a qualified column reference belongs to.
    pub fn qualifiers(&self) -> Vec<String> {
        match self {
            LogicalPlan::DataSource { table, alias, .. } => match alias {
                Some(a) => vec![a.clone(), table.clone()],
                None => vec![table.clone()],
            },
            LogicalPlan::Values { .. } => Vec::new(),
            LogicalPlan::Join { left, right, .. } => {
                let mut out = left.qualifiers();
                out.extend(right.qualifiers());
                out
            }
            other => other
                .children()
                .into_iter()
                .flat_map(|c| c.qualifiers())
                .collect(),
        }
    }

    /// Can `column` be resolved against this subtree's output? Qualified
    /// names resolve through table names/aliases, bare names through the
    /// output column list.
    pub fn resolves_column(&self, column: &str) -> bool {
        if let Some((qualifier, bare)) = column.rsplit_once('.') {
            return self.qualifiers().iter().any(|q| q == qualifier)
                && self
                    .output_columns()
                    .iter()
                    .any(|c| c == bare || c == column || c.ends_with(&format!(".{}", bare)));
        }
        self.output_columns()
            .iter()
            .any(|c| c == column || c.rsplit_once('.').map(|(_, b)| b == column).unwrap_or(false))
    }

    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::DataSource { .. } | LogicalPlan::Values { .. } => Vec::new(),
            LogicalPlan::Selection { input, .. }
            | LogicalPlan::Projection { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Window { input, .. } => vec![input],
            LogicalPlan::Join { left, right, .. } => vec![left, right],
            LogicalPlan::Union { inputs, .. } => inputs.iter().collect(),
        }
    }
}

/// An equi join compares one column from each side for equality.
pub fn is_equi_condition(condition: &Option<Expr>) -> bool {
    matches!(
        condition,
        Some(Expr::BinaryOp {
            left,
            op: crate::ast::expr::BinOp::Eq,
            right,
        }) if matches!(&**left, Expr::Column(_)) && matches!(&**right, Expr::Column(_))
    )
}

/// Fold a literal-only expression down to a value, the planner-side subset
/// of the executor's evaluator that constant folding needs.
pub fn eval_const(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Literal(v) => Some(v.clone()),
        Expr::Neg(e) => eval_const(e).and_then(|v| v.neg().ok()),
        Expr::Not(e) => match eval_const(e)?.truthy() {
            Some(b) => Some(Value::Bool(!b)),
            None => Some(Value::Null),
        },
        Expr::BinaryOp { left, op, right } => {
            let l = eval_const(left)?;
            let r = eval_const(right)?;
            match op {
                BinOpRef::Plus => l.add(&r).ok(),
                BinOpRef::Minus => l.sub(&r).ok(),
                BinOpRef::Multiply => l.mul(&r).ok(),
                BinOpRef::Divide => l.div(&r).ok(),
                BinOpRef::Modulo => l.rem(&r).ok(),
                BinOpRef::And => match (l.truthy(), r.truthy()) {
                    (Some(false), _) | (_, Some(false)) => Some(Value::Bool(false)),
                    (Some(true), Some(true)) => Some(Value::Bool(true)),
                    _ => Some(Value::Null),
                },
                BinOpRef::Or => match (l.truthy(), r.truthy()) {
                    (Some(true), _) | (_, Some(true)) => Some(Value::Bool(true)),
                    (Some(false), Some(false)) => Some(Value::Bool(false)),
                    _ => Some(Value::Null),
                },
                cmp => {
                    if l.is_null() || r.is_null() {
                        return Some(Value::Null);
                    }
                    let ord = l.compare(&r)?;
                    let hit = match cmp {
                        BinOpRef::Eq => ord == std::cmp::Ordering::Equal,
                        BinOpRef::NotEq => ord != std::cmp::Ordering::Equal,
                        BinOpRef::Lt => ord == std::cmp::Ordering::Less,
                        BinOpRef::LtEq => ord != std::cmp::Ordering::Greater,
                        BinOpRef::Gt => ord == std::cmp::Ordering::Greater,
                        BinOpRef::GtEq => ord != std::cmp::Ordering::Less,
                        _ => unreachable!(),
                    };
                    Some(Value::Bool(hit))
                }
            }
        }
        _ => None,
    }
}

use crate::ast::expr::BinOp as BinOpRef;

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::expr::BinOp;

    #[test]
    fn const_eval() {
        let e = Expr::binary(Expr::lit(Value::Int(1)), BinOp::Plus, Expr::lit(Value::Int(2)));
        assert_eq!(eval_const(&e), Some(Value::BigInt(3)));

        let cmp = Expr::binary(Expr::lit(Value::Int(1)), BinOp::Lt, Expr::lit(Value::Int(2)));
        assert_eq!(eval_const(&cmp), Some(Value::Bool(true)));

        let col = Expr::binary(Expr::col("a"), BinOp::Plus, Expr::lit(Value::Int(2)));
        assert_eq!(eval_const(&col), None);
    }

    #[test]
    fn join_output_qualifies_collisions() {
        let left = LogicalPlan::DataSource {
            table: "users".into(),
            alias: Some("u".into()),
            schema: vec!["id".into(), "name".into()],
            filters: vec![],
            pushed_limit: None,
            projection: vec![],
            estimated_rows: 10,
            from_cte: false,
        };
        let right = LogicalPlan::DataSource {
            table: "orders".into(),
            alias: Some("o".into()),
            schema: vec!["id".into(), "total".into()],
            filters: vec![],
            pushed_limit: None,
            projection: vec![],
            estimated_rows: 5,
            from_cte: false,
        };
        let join = LogicalPlan::Join {
            join_type: JoinType::Inner,
            condition: None,
            semi: false,
            right_qualifier: "o".into(),
            left: Box::new(left),
            right: Box::new(right),
        };
        assert_eq!(
            join.output_columns(),
            vec!["id", "name", "o.id", "total"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn estimates() {
        let src = LogicalPlan::DataSource {
            table: "t".into(),
            alias: None,
            schema: vec!["a".into()],
            filters: vec![],
            pushed_limit: None,
            projection: vec![],
            estimated_rows: 1000,
            from_cte: false,
        };
        assert_eq!(src.estimated_rows(), 1000);
        let sel = LogicalPlan::Selection {
            predicate: Expr::col("a"),
            input: Box::new(src),
        };
        assert_eq!(sel.estimated_rows(), 500);
    }
}
