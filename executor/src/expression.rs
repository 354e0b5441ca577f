use std::cmp::Ordering;

use common::err::{CResult, EngineError};
use common::row::Row;
use common::value::{like_match, Date, DateTime, Value};
use planner::ast::expr::{BinOp, Expr};

use crate::context::ExecContext;

/// Evaluate a scalar expression against one row. Comparisons follow SQL
/// three-valued logic: a null operand yields null, which callers treat as
/// false.
pub fn evaluate(expr: &Expr, row: &Row, ctx: &ExecContext) -> CResult<Value> {
    match expr {
        Expr::Column(name) => {
            if name.starts_with("@@") {
                return Ok(ctx.var(name));
            }
            match row.lookup(name) {
                Some(v) => Ok(v.clone()),
                None => Err(EngineError::ColumnNotFound(name.clone())),
            }
        }
        Expr::Literal(v) => Ok(v.clone()),
        Expr::BinaryOp { left, op, right } => match op {
            BinOp::And => {
                // short circuit: false wins over null
                match evaluate(left, row, ctx)?.truthy() {
                    Some(false) => return Ok(Value::Bool(false)),
                    l => match evaluate(right, row, ctx)?.truthy() {
                        Some(false) => Ok(Value::Bool(false)),
                        Some(true) => match l {
                            Some(true) => Ok(Value::Bool(true)),
                            _ => Ok(Value::Null),
                        },
                        None => Ok(Value::Null),
                    },
                }
            }
            BinOp::Or => match evaluate(left, row, ctx)?.truthy() {
                Some(true) => return Ok(Value::Bool(true)),
                l => match evaluate(right, row, ctx)?.truthy() {
                    Some(true) => Ok(Value::Bool(true)),
                    Some(false) => match l {
                        Some(false) => Ok(Value::Bool(false)),
                        _ => Ok(Value::Null),
                    },
                    None => Ok(Value::Null),
                },
            },
            BinOp::Plus => evaluate(left, row, ctx)?.add(&evaluate(right, row, ctx)?),
            BinOp::Minus => evaluate(left, row, ctx)?.sub(&evaluate(right, row, ctx)?),
            BinOp::Multiply => evaluate(left, row, ctx)?.mul(&evaluate(right, row, ctx)?),
            BinOp::Divide => evaluate(left, row, ctx)?.div(&evaluate(right, row, ctx)?),
            BinOp::Modulo => evaluate(left, row, ctx)?.rem(&evaluate(right, row, ctx)?),
            cmp => {
                let l = evaluate(left, row, ctx)?;
                let r = evaluate(right, row, ctx)?;
                if l.is_null() || r.is_null() {
                    return Ok(Value::Null);
                }
                let ord = match l.compare(&r) {
                    Some(ord) => ord,
                    None => {
                        return Err(EngineError::TypeMismatch(format!(
                            "cannot compare {} with {}",
                            l.data_type().name(),
                            r.data_type().name()
                        )))
                    }
                };
                let hit = match cmp {
                    BinOp::Eq => ord == Ordering::Equal,
                    BinOp::NotEq => ord != Ordering::Equal,
                    BinOp::Lt => ord == Ordering::Less,
                    BinOp::LtEq => ord != Ordering::Greater,
                    BinOp::Gt => ord == Ordering::Greater,
                    BinOp::GtEq => ord != Ordering::Less,
                    _ => unreachable!("arithmetic handled above"),
                };
                Ok(Value::Bool(hit))
            }
        },
        Expr::Not(e) => match evaluate(e, row, ctx)?.truthy() {
            Some(b) => Ok(Value::Bool(!b)),
            None => Ok(Value::Null),
        },
        Expr::Neg(e) => evaluate(e, row, ctx)?.neg(),
        Expr::IsNull { expr, negated } => {
            let v = evaluate(expr, row, ctx)?;
            Ok(Value::Bool(v.is_null() != *negated))
        }
        Expr::Like {
            expr,
            pattern,
            negated,
        } => {
            let v = evaluate(expr, row, ctx)?;
            let p = evaluate(pattern, row, ctx)?;
            if v.is_null() || p.is_null() {
                return Ok(Value::Null);
            }
            let hit = like_match(&v.to_string(), &p.to_string());
            Ok(Value::Bool(hit != *negated))
        }
        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let v = evaluate(expr, row, ctx)?;
            if v.is_null() {
                return Ok(Value::Null);
            }
            let mut saw_null = false;
            for candidate in list {
                let c = evaluate(candidate, row, ctx)?;
                if c.is_null() {
                    saw_null = true;
                    continue;
                }
                if v.compare(&c) == Some(Ordering::Equal) {
                    return Ok(Value::Bool(!negated));
                }
            }
            if saw_null {
                // x IN (..., null) is unknown when nothing matched
                return Ok(Value::Null);
            }
            Ok(Value::Bool(*negated))
        }
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let v = evaluate(expr, row, ctx)?;
            let lo = evaluate(low, row, ctx)?;
            let hi = evaluate(high, row, ctx)?;
            if v.is_null() || lo.is_null() || hi.is_null() {
                return Ok(Value::Null);
            }
            let inside = matches!(
                v.compare(&lo),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ) && matches!(v.compare(&hi), Some(Ordering::Less) | Some(Ordering::Equal));
            Ok(Value::Bool(inside != *negated))
        }
        Expr::Case {
            operand,
            branches,
            else_expr,
        } => {
            for (when, then) in branches {
                let hit = match operand {
                    Some(op) => {
                        let lhs = evaluate(op, row, ctx)?;
                        let rhs = evaluate(when, row, ctx)?;
                        !lhs.is_null() && lhs.compare(&rhs) == Some(Ordering::Equal)
                    }
                    None => evaluate(when, row, ctx)?.truthy() == Some(true),
                };
                if hit {
                    return evaluate(then, row, ctx);
                }
            }
            match else_expr {
                Some(e) => evaluate(e, row, ctx),
                None => Ok(Value::Null),
            }
        }
        Expr::Func { name, args } => evaluate_function(name, args, row, ctx),
        Expr::Wildcard => Err(EngineError::Internal("bare * outside COUNT".to_string())),
        Expr::InSubquery { .. } | Expr::Exists { .. } => Err(EngineError::Unsupported(
            "subquery was not rewritten to a join".to_string(),
        )),
    }
}

/// True when the predicate definitely holds for the row.
pub fn matches(predicate: &Expr, row: &Row, ctx: &ExecContext) -> CResult<bool> {
    Ok(evaluate(predicate, row, ctx)?.truthy() == Some(true))
}

fn evaluate_function(name: &str, args: &[Expr], row: &Row, ctx: &ExecContext) -> CResult<Value> {
    let eval_arg = |i: usize| -> CResult<Value> {
        args.get(i)
            .map(|a| evaluate(a, row, ctx))
            .transpose()?
            .ok_or_else(|| EngineError::Parse(format!("{} is missing argument {}", name, i + 1)))
    };
    match name {
        "abs" => {
            let v = eval_arg(0)?;
            if v.is_null() {
                return Ok(Value::Null);
            }
            match v.as_f64() {
                Some(f) if f < 0.0 => v.neg(),
                Some(_) => Ok(v),
                None => Err(EngineError::TypeMismatch(format!("ABS({})", v))),
            }
        }
        "round" => {
            let v = eval_arg(0)?;
            if v.is_null() {
                return Ok(Value::Null);
            }
            let digits = match args.get(1) {
                Some(a) => evaluate(a, row, ctx)?.as_i64().unwrap_or(0),
                None => 0,
            };
            let f = v
                .as_f64()
                .ok_or_else(|| EngineError::TypeMismatch(format!("ROUND({})", v)))?;
            let factor = 10f64.powi(digits as i32);
            Ok(Value::Double((f * factor).round() / factor))
        }
        "floor" | "ceil" | "ceiling" => {
            let v = eval_arg(0)?;
            if v.is_null() {
                return Ok(Value::Null);
            }
            let f = v
                .as_f64()
                .ok_or_else(|| EngineError::TypeMismatch(format!("{}({})", name, v)))?;
            let out = if name == "floor" { f.floor() } else { f.ceil() };
            Ok(Value::BigInt(out as i64))
        }
        "mod" => eval_arg(0)?.rem(&eval_arg(1)?),
        "upper" | "ucase" => Ok(map_string(eval_arg(0)?, |s| s.to_uppercase())),
        "lower" | "lcase" => Ok(map_string(eval_arg(0)?, |s| s.to_lowercase())),
        "length" | "char_length" => {
            let v = eval_arg(0)?;
            if v.is_null() {
                return Ok(Value::Null);
            }
            Ok(Value::BigInt(v.to_string().len() as i64))
        }
        "concat" => {
            let mut out = String::new();
            for arg in args {
                let v = evaluate(arg, row, ctx)?;
                if v.is_null() {
                    return Ok(Value::Null);
                }
                out.push_str(&v.to_string());
            }
            Ok(Value::String(out))
        }
        "substring" | "substr" => {
            let v = eval_arg(0)?;
            if v.is_null() {
                return Ok(Value::Null);
            }
            let text = v.to_string();
            // SQL positions are one-based
            let start = eval_arg(1)?.as_i64().unwrap_or(1).max(1) as usize - 1;
            let len = match args.get(2) {
                Some(a) => evaluate(a, row, ctx)?.as_i64().unwrap_or(0).max(0) as usize,
                None => usize::MAX,
            };
            let out: String = text.chars().skip(start).take(len).collect();
            Ok(Value::String(out))
        }
        "trim" => Ok(map_string(eval_arg(0)?, |s| s.trim().to_string())),
        "coalesce" | "ifnull" => {
            for arg in args {
                let v = evaluate(arg, row, ctx)?;
                if !v.is_null() {
                    return Ok(v);
                }
            }
            Ok(Value::Null)
        }
        "if" => {
            let cond = eval_arg(0)?;
            if cond.truthy() == Some(true) {
                eval_arg(1)
            } else {
                eval_arg(2)
            }
        }
        "now" | "current_timestamp" => Ok(Value::DateTime(DateTime::now())),
        "current_date" | "curdate" => Ok(Value::Date(Date::today())),
        "version" => Ok(ctx.var("@@version")),
        "database" | "schema" => Ok(ctx.var("@@database")),
        other => Err(EngineError::Unsupported(format!("function {}", other))),
    }
}

fn map_string(v: Value, f: impl Fn(&str) -> String) -> Value {
    match v {
        Value::Null => Value::Null,
        other => Value::String(f(&other.to_string())),
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::Arc;

    use common::datasource::QueryContext;

    use super::*;
    use crate::context::ExecContext;

    struct NullSource;

    impl common::datasource::DataSource for NullSource {
        fn name(&self) -> &str {
            "null"
        }
        fn connect(&self) -> CResult<()> {
            Ok(())
        }
        fn close(&self) -> CResult<()> {
            Ok(())
        }
        fn is_connected(&self) -> bool {
            true
        }
        fn is_writable(&self) -> bool {
            false
        }
        fn get_tables(&self, _: &QueryContext) -> CResult<Vec<String>> {
            Ok(vec![])
        }
        fn get_table_info(
            &self,
            _: &QueryContext,
            table: &str,
        ) -> CResult<common::schema::TableInfo> {
            Err(EngineError::TableNotFound(table.to_string()))
        }
        fn query(
            &self,
            _: &QueryContext,
            table: &str,
            _: &common::query::QueryOptions,
        ) -> CResult<common::datasource::QueryResult> {
            Err(EngineError::TableNotFound(table.to_string()))
        }
        fn insert(&self, _: &QueryContext, _: &str, _: &[Row]) -> CResult<usize> {
            Ok(0)
        }
        fn update(
            &self,
            _: &QueryContext,
            _: &str,
            _: &[common::query::Filter],
            _: &Row,
        ) -> CResult<usize> {
            Ok(0)
        }
        fn delete(&self, _: &QueryContext, _: &str, _: &[common::query::Filter]) -> CResult<usize> {
            Ok(0)
        }
        fn create_table(&self, _: &QueryContext, _: &common::schema::TableInfo) -> CResult<()> {
            Ok(())
        }
        fn drop_table(&self, _: &QueryContext, _: &str) -> CResult<()> {
            Ok(())
        }
        fn truncate_table(&self, _: &QueryContext, _: &str) -> CResult<()> {
            Ok(())
        }
    }

    pub(crate) fn test_ctx() -> ExecContext {
        ExecContext::new(Arc::new(NullSource), QueryContext::background())
    }

    #[test]
    fn arithmetic_and_comparison() {
        let ctx = test_ctx();
        let row = Row::from_pairs([("a", Value::Int(7))]);
        let e = Expr::binary(Expr::col("a"), BinOp::Plus, Expr::lit(Value::Int(3)));
        assert_eq!(evaluate(&e, &row, &ctx).unwrap(), Value::BigInt(10));

        let e = Expr::binary(Expr::col("a"), BinOp::Gt, Expr::lit(Value::Int(3)));
        assert_eq!(evaluate(&e, &row, &ctx).unwrap(), Value::Bool(true));
    }

    #[test]
    fn null_comparison_is_unknown() {
        let ctx = test_ctx();
        let row = Row::from_pairs([("a", Value::Null)]);
        let e = Expr::binary(Expr::col("a"), BinOp::Eq, Expr::lit(Value::Int(1)));
        assert_eq!(evaluate(&e, &row, &ctx).unwrap(), Value::Null);
        assert!(!matches(&e, &row, &ctx).unwrap());
    }

    #[test]
    fn short_circuit_logic() {
        let ctx = test_ctx();
        let row = Row::new();
        // false AND <error> must not evaluate the right side
        let e = Expr::and(
            Expr::lit(Value::Bool(false)),
            Expr::col("missing"),
        );
        assert_eq!(evaluate(&e, &row, &ctx).unwrap(), Value::Bool(false));
    }

    #[test]
    fn functions() {
        let ctx = test_ctx();
        let row = Row::from_pairs([("s", Value::String("  hi  ".into()))]);
        let upper = Expr::Func {
            name: "upper".into(),
            args: vec![Expr::Func {
                name: "trim".into(),
                args: vec![Expr::col("s")],
            }],
        };
        assert_eq!(
            evaluate(&upper, &row, &ctx).unwrap(),
            Value::String("HI".into())
        );

        let coalesce = Expr::Func {
            name: "coalesce".into(),
            args: vec![Expr::lit(Value::Null), Expr::lit(Value::Int(5))],
        };
        assert_eq!(evaluate(&coalesce, &row, &ctx).unwrap(), Value::Int(5));
    }

    #[test]
    fn in_list_with_null_member() {
        let ctx = test_ctx();
        let row = Row::from_pairs([("a", Value::Int(1))]);
        let e = Expr::InList {
            expr: Box::new(Expr::col("a")),
            list: vec![Expr::lit(Value::Int(2)), Expr::lit(Value::Null)],
            negated: false,
        };
        assert_eq!(evaluate(&e, &row, &ctx).unwrap(), Value::Null);
    }
}
