use std::collections::HashSet;
use std::fmt;

use common::query::{Filter, FilterOp};
use common::value::Value;

use crate::logical::plan::LogicalPlan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Plus => "+",
            BinOp::Minus => "-",
            BinOp::Multiply => "*",
            BinOp::Divide => "/",
            BinOp::Modulo => "%",
            BinOp::Eq => "=",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::And => "AND",
            BinOp::Or => "OR",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq
        )
    }

    pub fn filter_op(&self) -> Option<FilterOp> {
        Some(match self {
            BinOp::Eq => FilterOp::Eq,
            BinOp::NotEq => FilterOp::Ne,
            BinOp::Lt => FilterOp::Lt,
            BinOp::LtEq => FilterOp::Le,
            BinOp::Gt => FilterOp::Gt,
            BinOp::GtEq => FilterOp::Ge,
            _ => return None,
        })
    }
}

/// Scalar expression IR the executor evaluates row by row. Subquery
/// variants only survive until the semi-join rewrite; the executor refuses
/// whatever the rewrite could not eliminate.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Literal(Value),
    BinaryOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Neg(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<LogicalPlan>,
        negated: bool,
    },
    Exists {
        subquery: Box<LogicalPlan>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        else_expr: Option<Box<Expr>>,
    },
    Func {
        name: String,
        args: Vec<Expr>,
    },
    /// `*` inside COUNT(*).
    Wildcard,
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Expr {
        Expr::Column(name.into())
    }

    pub fn lit(value: Value) -> Expr {
        Expr::Literal(value)
    }

    pub fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::binary(left, BinOp::And, right)
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Expr::Literal(v) => Some(v),
            _ => None,
        }
    }

    pub fn referenced_columns(&self, out: &mut HashSet<String>) {
        match self {
            Expr::Column(name) => {
                out.insert(name.clone());
            }
            Expr::Literal(_) | Expr::Wildcard => {}
            Expr::BinaryOp { left, right, .. } => {
                left.referenced_columns(out);
                right.referenced_columns(out);
            }
            Expr::Not(e) | Expr::Neg(e) => e.referenced_columns(out),
            Expr::IsNull { expr, .. } => expr.referenced_columns(out),
            Expr::Like { expr, pattern, .. } => {
                expr.referenced_columns(out);
                pattern.referenced_columns(out);
            }
            Expr::InList { expr, list, .. } => {
                expr.referenced_columns(out);
                for e in list {
                    e.referenced_columns(out);
                }
            }
            Expr::InSubquery { expr, .. } => expr.referenced_columns(out),
            Expr::Exists { .. } => {}
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.referenced_columns(out);
                low.referenced_columns(out);
                high.referenced_columns(out);
            }
            Expr::Case {
                operand,
                branches,
                else_expr,
            } => {
                if let Some(op) = operand {
                    op.referenced_columns(out);
                }
                for (when, then) in branches {
                    when.referenced_columns(out);
                    then.referenced_columns(out);
                }
                if let Some(e) = else_expr {
                    e.referenced_columns(out);
                }
            }
            Expr::Func { args, .. } => {
                for a in args {
                    a.referenced_columns(out);
                }
            }
        }
    }

    pub fn contains_subquery(&self) -> bool {
        match self {
            Expr::InSubquery { .. } | Expr::Exists { .. } => true,
            Expr::BinaryOp { left, right, .. } => {
                left.contains_subquery() || right.contains_subquery()
            }
            Expr::Not(e) | Expr::Neg(e) => e.contains_subquery(),
            Expr::IsNull { expr, .. } => expr.contains_subquery(),
            Expr::Like { expr, pattern, .. } => {
                expr.contains_subquery() || pattern.contains_subquery()
            }
            Expr::InList { expr, list, .. } => {
                expr.contains_subquery() || list.iter().any(|e| e.contains_subquery())
            }
            Expr::Between {
                expr, low, high, ..
            } => expr.contains_subquery() || low.contains_subquery() || high.contains_subquery(),
            Expr::Case {
                operand,
                branches,
                else_expr,
            } => {
                operand.as_deref().map(Expr::contains_subquery).unwrap_or(false)
                    || branches
                        .iter()
                        .any(|(w, t)| w.contains_subquery() || t.contains_subquery())
                    || else_expr.as_deref().map(Expr::contains_subquery).unwrap_or(false)
            }
            Expr::Func { args, .. } => args.iter().any(|e| e.contains_subquery()),
            _ => false,
        }
    }

    /// Convert a predicate into the data-source filter form, when it is
    /// expressible there: leaves are `column op literal`, groups are
    /// AND/OR of expressible children.
    pub fn to_filter(&self) -> Option<Filter> {
        match self {
            Expr::BinaryOp { left, op, right } => match op {
                BinOp::And | BinOp::Or => {
                    let l = left.to_filter()?;
                    let r = right.to_filter()?;
                    Some(if *op == BinOp::And {
                        Filter::and(vec![l, r])
                    } else {
                        Filter::or(vec![l, r])
                    })
                }
                _ => {
                    let fop = op.filter_op()?;
                    match (&**left, &**right) {
                        (Expr::Column(c), Expr::Literal(v)) => {
                            Some(Filter::cmp(c.clone(), fop, v.clone()))
                        }
                        // literal op column flips the comparison
                        (Expr::Literal(v), Expr::Column(c)) => {
                            let flipped = match fop {
                                FilterOp::Lt => FilterOp::Gt,
                                FilterOp::Le => FilterOp::Ge,
                                FilterOp::Gt => FilterOp::Lt,
                                FilterOp::Ge => FilterOp::Le,
                                other => other,
                            };
                            Some(Filter::cmp(c.clone(), flipped, v.clone()))
                        }
                        _ => None,
                    }
                }
            },
            Expr::Like {
                expr,
                pattern,
                negated,
            } => match (&**expr, &**pattern) {
                (Expr::Column(c), Expr::Literal(v)) => Some(Filter::cmp(
                    c.clone(),
                    if *negated {
                        FilterOp::NotLike
                    } else {
                        FilterOp::Like
                    },
                    v.clone(),
                )),
                _ => None,
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => match &**expr {
                Expr::Column(c) => {
                    let values: Option<Vec<Value>> =
                        list.iter().map(|e| e.as_literal().cloned()).collect();
                    let mut filter = Filter::in_list(c.clone(), values?);
                    if *negated {
                        filter.op = FilterOp::NotIn;
                    }
                    Some(filter)
                }
                _ => None,
            },
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => match (&**expr, &**low, &**high) {
                (Expr::Column(c), Expr::Literal(lo), Expr::Literal(hi)) => {
                    let mut filter = Filter::between(c.clone(), lo.clone(), hi.clone());
                    if *negated {
                        filter.op = FilterOp::NotBetween;
                    }
                    Some(filter)
                }
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(name) => write!(f, "{}", name),
            Expr::Literal(v) => match v {
                Value::String(s) => write!(f, "'{}'", s),
                other => write!(f, "{}", other),
            },
            Expr::BinaryOp { left, op, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Expr::Not(e) => write!(f, "NOT {}", e),
            Expr::Neg(e) => write!(f, "-{}", e),
            Expr::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => write!(
                f,
                "{} {}LIKE {}",
                expr,
                if *negated { "NOT " } else { "" },
                pattern
            ),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                write!(f, "{} {}IN (", expr, if *negated { "NOT " } else { "" })?;
                for (i, e) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Expr::InSubquery { expr, negated, .. } => write!(
                f,
                "{} {}IN (subquery)",
                expr,
                if *negated { "NOT " } else { "" }
            ),
            Expr::Exists { negated, .. } => {
                write!(f, "{}EXISTS (subquery)", if *negated { "NOT " } else { "" })
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => write!(
                f,
                "{} {}BETWEEN {} AND {}",
                expr,
                if *negated { "NOT " } else { "" },
                low,
                high
            ),
            Expr::Case { .. } => write!(f, "CASE"),
            Expr::Func { name, args } => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Expr::Wildcard => write!(f, "*"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn filter_conversion() {
        let e = Expr::binary(Expr::col("age"), BinOp::Gt, Expr::lit(Value::Int(30)));
        let f = e.to_filter().unwrap();
        assert_eq!(f.field, "age");
        assert_eq!(f.op, FilterOp::Gt);

        // flipped operand order
        let e = Expr::binary(Expr::lit(Value::Int(30)), BinOp::Lt, Expr::col("age"));
        let f = e.to_filter().unwrap();
        assert_eq!(f.op, FilterOp::Gt);

        // computed left side is not expressible
        let e = Expr::binary(
            Expr::binary(Expr::col("a"), BinOp::Plus, Expr::lit(Value::Int(1))),
            BinOp::Eq,
            Expr::lit(Value::Int(2)),
        );
        assert!(e.to_filter().is_none());
    }

    #[test]
    fn display_names() {
        let e = Expr::binary(Expr::col("a"), BinOp::Plus, Expr::lit(Value::Int(1)));
        assert_eq!(e.to_string(), "a + 1");
        let f = Expr::Func {
            name: "sum".into(),
            args: vec![Expr::col("v")],
        };
        assert_eq!(f.to_string(), "sum(v)");
    }
}
