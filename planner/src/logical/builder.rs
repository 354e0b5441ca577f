use std::collections::HashMap;

use sqlparser::ast as sql;

use common::datasource::Catalog;
use common::err::{CResult, EngineError};
use common::query::SortOrder;
use common::value::Value;

use crate::ast::expr::{BinOp, Expr};
use crate::ast::statement::{CteDef, SelectPlan};
use crate::logical::plan::{
    AggExpr, AggFunc, JoinType, LogicalPlan, NamedExpr, SortKey, WindowExpr, WindowFrameSpec,
    WindowFuncKind,
};

fn unsupported(what: impl Into<String>) -> EngineError {
    EngineError::Unsupported(what.into())
}

pub struct PlanBuilder<'a> {
    catalog: &'a dyn Catalog,
    /// CTE name → output columns, for scans that target a CTE instead of a
    /// catalog table.
    cte_columns: HashMap<String, Vec<String>>,
    /// Window calls collected while converting expressions; projection
    /// walking swaps the markers for output-column references.
    pending_windows: Vec<WindowExpr>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        PlanBuilder {
            catalog,
            cte_columns: HashMap::new(),
            pending_windows: Vec::new(),
        }
    }

    /// Top level entry: WITH bindings first, then the operator tree.
    pub fn build_select(&mut self, query: &sql::Query) -> CResult<SelectPlan> {
        let mut ctes = Vec::new();
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                let name = cte.alias.name.value.clone();
                let recursive = with.recursive;
                // a recursive CTE sees itself; pre-register with declared
                // column names so the body's self-scan resolves
                let declared: Vec<String> = cte
                    .alias
                    .columns
                    .iter()
                    .map(|c| c.value.clone())
                    .collect();
                if recursive && !declared.is_empty() {
                    self.cte_columns.insert(name.clone(), declared.clone());
                }
                let plan = self.build_query(&cte.query)?;
                let columns = if declared.is_empty() {
                    plan.output_columns()
                } else {
                    declared
                };
                self.cte_columns.insert(name.clone(), columns.clone());
                ctes.push(CteDef {
                    name,
                    columns,
                    plan,
                    recursive,
                });
            }
        }
        let root = self.build_query_body(query)?;
        Ok(SelectPlan { ctes, root })
    }

    /// Query without WITH handling (subqueries, CTE bodies).
    pub fn build_query(&mut self, query: &sql::Query) -> CResult<LogicalPlan> {
        if query.with.is_some() {
            return Err(unsupported("nested WITH"));
        }
        self.build_query_body(query)
    }

    fn build_query_body(&mut self, query: &sql::Query) -> CResult<LogicalPlan> {
        let mut plan = self.build_set_expr(&query.body)?;

        // ORDER BY between the body and LIMIT, per the canonical
        // Projection(Limit(Sort(...))) shape, with aliases resolved into
        // the underlying expressions
        if !query.order_by.is_empty() {
            let alias_map = projection_alias_map(&plan);
            let mut keys = Vec::with_capacity(query.order_by.len());
            for item in &query.order_by {
                let mut expr = self.convert_expr(&item.expr)?;
                if let Expr::Column(name) = &expr {
                    if let Some(resolved) = alias_map.get(name) {
                        expr = resolved.clone();
                    }
                }
                // aggregate calls in ORDER BY resolve to the aggregate
                // node's output column
                replace_known_aggregates(&mut expr);
                keys.push(SortKey {
                    expr,
                    order: if item.asc.unwrap_or(true) {
                        SortOrder::Asc
                    } else {
                        SortOrder::Desc
                    },
                });
            }
            // sort runs below the projection so it can see source columns
            plan = push_below_projection(plan, |input| LogicalPlan::Sort {
                keys: keys.clone(),
                input: Box::new(input),
            });
        }

        let limit = match &query.limit {
            Some(e) => Some(self.expr_as_usize(e)?),
            None => None,
        };
        let offset = match &query.offset {
            Some(o) => self.expr_as_usize(&o.value)?,
            None => 0,
        };
        if limit.is_some() || offset > 0 {
            plan = push_below_projection(plan, |input| LogicalPlan::Limit {
                limit,
                offset,
                input: Box::new(input),
            });
        }
        Ok(plan)
    }

    fn build_set_expr(&mut self, body: &sql::SetExpr) -> CResult<LogicalPlan> {
        match body {
            sql::SetExpr::Select(select) => self.build_select_core(select),
            sql::SetExpr::Query(query) => self.build_query(query),
            sql::SetExpr::SetOperation {
                op: sql::SetOperator::Union,
                set_quantifier,
                left,
                right,
            } => {
                let all = matches!(set_quantifier, sql::SetQuantifier::All);
                let left = self.build_set_expr(left)?;
                let right = self.build_set_expr(right)?;
                if left.output_columns().len() != right.output_columns().len() {
                    return Err(EngineError::Parse(
                        "UNION branches must produce the same column count".to_string(),
                    ));
                }
                let mut inputs = Vec::new();
                // flatten nested unions into one node
                for branch in [left, right] {
                    match branch {
                        LogicalPlan::Union {
                            inputs: nested,
                            all: nested_all,
                        } if nested_all == all => inputs.extend(nested),
                        other => inputs.push(other),
                    }
                }
                Ok(LogicalPlan::Union { inputs, all })
            }
            sql::SetExpr::SetOperation { op, .. } => {
                Err(unsupported(format!("set operation {:?}", op)))
            }
            sql::SetExpr::Values(values) => {
                let mut rows = Vec::with_capacity(values.rows.len());
                let mut width = 0;
                for row in &values.rows {
                    let converted: CResult<Vec<Expr>> =
                        row.iter().map(|e| self.convert_expr(e)).collect();
                    let converted = converted?;
                    width = width.max(converted.len());
                    rows.push(converted);
                }
                let columns = (0..width).map(|i| format!("column_{}", i)).collect();
                Ok(LogicalPlan::Values { columns, rows })
            }
            other => Err(unsupported(format!("query body {:?}", other))),
        }
    }

    fn build_select_core(&mut self, select: &sql::Select) -> CResult<LogicalPlan> {
        // FROM: comma-separated relations cross join, explicit joins fold
        // left to right
        let mut plan: Option<LogicalPlan> = None;
        for twj in &select.from {
            let (mut relation, _) = self.build_relation(&twj.relation)?;
            for join in &twj.joins {
                relation = self.build_join(relation, join)?;
            }
            plan = Some(match plan {
                None => relation,
                Some(left) => {
                    let qualifier = relation
                        .qualifiers()
                        .first()
                        .cloned()
                        .unwrap_or_else(|| "right".to_string());
                    LogicalPlan::Join {
                        join_type: JoinType::Inner,
                        condition: None,
                        semi: false,
                        right_qualifier: qualifier,
                        left: Box::new(left),
                        right: Box::new(relation),
                    }
                }
            });
        }
        let mut plan = plan.unwrap_or_else(LogicalPlan::empty);

        if let Some(selection) = &select.selection {
            plan = LogicalPlan::Selection {
                predicate: self.convert_expr(selection)?,
                input: Box::new(plan),
            };
        }

        // projection items, with aggregates and window functions pulled out
        let mut items: Vec<NamedExpr> = Vec::new();
        let mut wildcard = false;
        for item in &select.projection {
            match item {
                sql::SelectItem::UnnamedExpr(e) => {
                    items.push(NamedExpr::new(self.convert_expr(e)?));
                }
                sql::SelectItem::ExprWithAlias { expr, alias } => {
                    items.push(NamedExpr::aliased(
                        self.convert_expr(expr)?,
                        alias.value.clone(),
                    ));
                }
                sql::SelectItem::Wildcard(_) => {
                    wildcard = true;
                    for col in plan.output_columns() {
                        items.push(NamedExpr::new(Expr::Column(col)));
                    }
                }
                sql::SelectItem::QualifiedWildcard(name, _) => {
                    wildcard = true;
                    let qualifier = object_name(name);
                    for col in plan.output_columns() {
                        let bare = col.rsplit_once('.').map(|(_, b)| b).unwrap_or(&col);
                        items.push(NamedExpr::new(Expr::Column(format!(
                            "{}.{}",
                            qualifier, bare
                        ))));
                    }
                }
            }
        }

        let group_exprs: Vec<Expr> = match &select.group_by {
            sql::GroupByExpr::Expressions(exprs) => exprs
                .iter()
                .map(|e| self.convert_expr(e))
                .collect::<CResult<Vec<_>>>()?,
            sql::GroupByExpr::All => return Err(unsupported("GROUP BY ALL")),
        };

        let mut aggregates = Vec::new();
        for item in &mut items {
            extract_aggregates(&mut item.expr, &mut aggregates)?;
        }
        let mut having = match &select.having {
            Some(h) => {
                let mut e = self.convert_expr(h)?;
                extract_aggregates(&mut e, &mut aggregates)?;
                Some(e)
            }
            None => None,
        };

        let mut windows = Vec::new();
        for item in &mut items {
            self.extract_windows(&mut item.expr, &mut windows)?;
        }

        if !aggregates.is_empty() || !group_exprs.is_empty() {
            if !windows.is_empty() {
                return Err(unsupported("window functions mixed with GROUP BY"));
            }
            let group_by: Vec<NamedExpr> = group_exprs.into_iter().map(NamedExpr::new).collect();
            plan = LogicalPlan::Aggregate {
                group_by,
                aggregates,
                input: Box::new(plan),
            };
            if let Some(h) = having.take() {
                plan = LogicalPlan::Selection {
                    predicate: h,
                    input: Box::new(plan),
                };
            }
        } else if having.is_some() {
            return Err(EngineError::Parse("HAVING requires GROUP BY".to_string()));
        }

        if !windows.is_empty() {
            plan = LogicalPlan::Window {
                funcs: windows,
                input: Box::new(plan),
            };
        }

        // a bare `SELECT *` needs no projection node; the scan already
        // produces exactly these columns
        let passthrough = wildcard
            && items.len() == plan.output_columns().len()
            && items
                .iter()
                .zip(plan.output_columns())
                .all(|(item, col)| item.alias.is_none() && item.expr == Expr::Column(col));
        if !passthrough {
            plan = LogicalPlan::Projection {
                exprs: items,
                input: Box::new(plan),
            };
        }

        if select.distinct.is_some() {
            let group_by = plan
                .output_columns()
                .into_iter()
                .map(|c| NamedExpr::new(Expr::Column(c)))
                .collect();
            plan = LogicalPlan::Aggregate {
                group_by,
                aggregates: Vec::new(),
                input: Box::new(plan),
            };
        }
        Ok(plan)
    }

    fn build_join(&mut self, left: LogicalPlan, join: &sql::Join) -> CResult<LogicalPlan> {
        let (right, qualifier) = self.build_relation(&join.relation)?;
        let (join_type, constraint) = match &join.join_operator {
            sql::JoinOperator::Inner(c) => (JoinType::Inner, Some(c)),
            sql::JoinOperator::LeftOuter(c) => (JoinType::Left, Some(c)),
            sql::JoinOperator::RightOuter(c) => (JoinType::Right, Some(c)),
            sql::JoinOperator::CrossJoin => (JoinType::Inner, None),
            other => return Err(unsupported(format!("join operator {:?}", other))),
        };
        let condition = match constraint {
            Some(sql::JoinConstraint::On(e)) => Some(self.convert_expr(e)?),
            Some(sql::JoinConstraint::Using(cols)) => {
                // USING (a, b) → l.a = r.a AND l.b = r.b over bare names
                let mut cond: Option<Expr> = None;
                for col in cols {
                    let eq = Expr::binary(
                        Expr::Column(col.value.clone()),
                        BinOp::Eq,
                        Expr::Column(format!("{}.{}", qualifier, col.value)),
                    );
                    cond = Some(match cond {
                        None => eq,
                        Some(prev) => Expr::and(prev, eq),
                    });
                }
                cond
            }
            Some(sql::JoinConstraint::None) | None => None,
            Some(other) => return Err(unsupported(format!("join constraint {:?}", other))),
        };
        Ok(LogicalPlan::Join {
            join_type,
            condition,
            semi: false,
            right_qualifier: qualifier,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn build_relation(&mut self, relation: &sql::TableFactor) -> CResult<(LogicalPlan, String)> {
        match relation {
            sql::TableFactor::Table { name, alias, .. } => {
                let table = object_name(name);
                let alias = alias.as_ref().map(|a| a.name.value.clone());
                let qualifier = alias.clone().unwrap_or_else(|| table.clone());
                let plan = self.scan(&table, alias)?;
                Ok((plan, qualifier))
            }
            sql::TableFactor::Derived {
                subquery, alias, ..
            } => {
                let plan = self.build_query(subquery)?;
                let qualifier = alias
                    .as_ref()
                    .map(|a| a.name.value.clone())
                    .unwrap_or_else(|| "subquery".to_string());
                Ok((plan, qualifier))
            }
            sql::TableFactor::NestedJoin {
                table_with_joins, ..
            } => {
                let (mut plan, qualifier) = self.build_relation(&table_with_joins.relation)?;
                for join in &table_with_joins.joins {
                    plan = self.build_join(plan, join)?;
                }
                Ok((plan, qualifier))
            }
            other => Err(unsupported(format!("table factor {:?}", other))),
        }
    }

    fn scan(&mut self, table: &str, alias: Option<String>) -> CResult<LogicalPlan> {
        if let Some(columns) = self.cte_columns.get(table) {
            return Ok(LogicalPlan::DataSource {
                table: table.to_string(),
                alias,
                schema: columns.clone(),
                filters: Vec::new(),
                pushed_limit: None,
                projection: Vec::new(),
                estimated_rows: 100,
                from_cte: true,
            });
        }
        let info = self.catalog.table_info(table)?;
        Ok(LogicalPlan::DataSource {
            table: table.to_string(),
            alias,
            schema: info.column_names(),
            filters: Vec::new(),
            pushed_limit: None,
            projection: Vec::new(),
            estimated_rows: self.catalog.table_rows(table),
            from_cte: false,
        })
    }

    fn expr_as_usize(&mut self, e: &sql::Expr) -> CResult<usize> {
        match self.convert_expr(e)? {
            Expr::Literal(v) => v
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| EngineError::Parse(format!("expected unsigned integer, got {}", v))),
            other => Err(EngineError::Parse(format!(
                "expected literal limit/offset, got {}",
                other
            ))),
        }
    }

    /// sqlparser expression → IR, normalizing operators into the canonical
    /// set and literals into engine values.
    pub fn convert_expr(&mut self, e: &sql::Expr) -> CResult<Expr> {
        Ok(match e {
            sql::Expr::Identifier(ident) => Expr::Column(ident.value.clone()),
            sql::Expr::CompoundIdentifier(parts) => Expr::Column(
                parts
                    .iter()
                    .map(|p| p.value.clone())
                    .collect::<Vec<_>>()
                    .join("."),
            ),
            sql::Expr::Value(v) => Expr::Literal(convert_value(v)?),
            sql::Expr::BinaryOp { left, op, right } => {
                let op = convert_binop(op)?;
                Expr::binary(self.convert_expr(left)?, op, self.convert_expr(right)?)
            }
            sql::Expr::UnaryOp { op, expr } => match op {
                sql::UnaryOperator::Not => Expr::Not(Box::new(self.convert_expr(expr)?)),
                sql::UnaryOperator::Minus => Expr::Neg(Box::new(self.convert_expr(expr)?)),
                sql::UnaryOperator::Plus => self.convert_expr(expr)?,
                other => return Err(unsupported(format!("unary operator {:?}", other))),
            },
            sql::Expr::Nested(inner) => self.convert_expr(inner)?,
            sql::Expr::IsNull(inner) => Expr::IsNull {
                expr: Box::new(self.convert_expr(inner)?),
                negated: false,
            },
            sql::Expr::IsNotNull(inner) => Expr::IsNull {
                expr: Box::new(self.convert_expr(inner)?),
                negated: true,
            },
            sql::Expr::Like {
                negated,
                expr,
                pattern,
                ..
            } => Expr::Like {
                expr: Box::new(self.convert_expr(expr)?),
                pattern: Box::new(self.convert_expr(pattern)?),
                negated: *negated,
            },
            sql::Expr::InList {
                expr,
                list,
                negated,
            } => Expr::InList {
                expr: Box::new(self.convert_expr(expr)?),
                list: list
                    .iter()
                    .map(|e| self.convert_expr(e))
                    .collect::<CResult<Vec<_>>>()?,
                negated: *negated,
            },
            sql::Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => Expr::InSubquery {
                expr: Box::new(self.convert_expr(expr)?),
                subquery: Box::new(self.build_query(subquery)?),
                negated: *negated,
            },
            sql::Expr::Exists { subquery, negated } => Expr::Exists {
                subquery: Box::new(self.build_query(subquery)?),
                negated: *negated,
            },
            sql::Expr::Between {
                expr,
                negated,
                low,
                high,
            } => Expr::Between {
                expr: Box::new(self.convert_expr(expr)?),
                low: Box::new(self.convert_expr(low)?),
                high: Box::new(self.convert_expr(high)?),
                negated: *negated,
            },
            sql::Expr::Case {
                operand,
                conditions,
                results,
                else_result,
            } => {
                let operand = match operand {
                    Some(op) => Some(Box::new(self.convert_expr(op)?)),
                    None => None,
                };
                let mut branches = Vec::with_capacity(conditions.len());
                for (when, then) in conditions.iter().zip(results.iter()) {
                    branches.push((self.convert_expr(when)?, self.convert_expr(then)?));
                }
                let else_expr = match else_result {
                    Some(e) => Some(Box::new(self.convert_expr(e)?)),
                    None => None,
                };
                Expr::Case {
                    operand,
                    branches,
                    else_expr,
                }
            }
            sql::Expr::Function(func) => self.convert_function(func)?,
            other => return Err(unsupported(format!("expression {}", other))),
        })
    }

    fn convert_function(&mut self, func: &sql::Function) -> CResult<Expr> {
        let name = object_name(&func.name).to_ascii_lowercase();
        let mut args = Vec::with_capacity(func.args.len());
        for arg in &func.args {
            match arg {
                sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Expr(e)) => {
                    args.push(self.convert_expr(e)?);
                }
                sql::FunctionArg::Unnamed(sql::FunctionArgExpr::Wildcard) => {
                    args.push(Expr::Wildcard);
                }
                other => return Err(unsupported(format!("function argument {:?}", other))),
            }
        }
        if func.distinct {
            return Err(unsupported(format!("{}(DISTINCT ...)", name)));
        }
        // window usage is recognized later, when the projection is walked;
        // keep the OVER clause attached through a marker wrapper
        if let Some(over) = &func.over {
            return self.convert_window(&name, args, over);
        }
        Ok(Expr::Func { name, args })
    }

    fn convert_window(
        &mut self,
        name: &str,
        args: Vec<Expr>,
        over: &sql::WindowType,
    ) -> CResult<Expr> {
        let spec = match over {
            sql::WindowType::WindowSpec(spec) => spec,
            sql::WindowType::NamedWindow(_) => return Err(unsupported("named windows")),
        };
        let partition_by = spec
            .partition_by
            .iter()
            .map(|e| self.convert_expr(e))
            .collect::<CResult<Vec<_>>>()?;
        let mut order_by = Vec::with_capacity(spec.order_by.len());
        for item in &spec.order_by {
            order_by.push(SortKey {
                expr: self.convert_expr(&item.expr)?,
                order: if item.asc.unwrap_or(true) {
                    SortOrder::Asc
                } else {
                    SortOrder::Desc
                },
            });
        }
        let frame = match &spec.window_frame {
            None => None,
            Some(frame) => {
                if frame.units != sql::WindowFrameUnits::Rows {
                    return Err(unsupported("RANGE/GROUPS window frames"));
                }
                let preceding = frame_bound(&frame.start_bound)?;
                let following = match &frame.end_bound {
                    Some(end) => frame_bound(end)?,
                    None => Some(0),
                };
                Some(WindowFrameSpec {
                    preceding,
                    following,
                })
            }
        };

        let (func, arg, offset) = match name {
            "row_number" => (WindowFuncKind::RowNumber, None, 0),
            "rank" => (WindowFuncKind::Rank, None, 0),
            "dense_rank" => (WindowFuncKind::DenseRank, None, 0),
            "lag" | "lead" => {
                let arg = args
                    .first()
                    .cloned()
                    .ok_or_else(|| EngineError::Parse(format!("{} needs an argument", name)))?;
                let offset = match args.get(1) {
                    Some(Expr::Literal(v)) => v.as_u64().unwrap_or(1) as usize,
                    Some(_) => return Err(unsupported(format!("non-literal {} offset", name))),
                    None => 1,
                };
                (
                    if name == "lag" {
                        WindowFuncKind::Lag
                    } else {
                        WindowFuncKind::Lead
                    },
                    Some(arg),
                    offset,
                )
            }
            other => {
                let agg = AggFunc::parse(other)
                    .ok_or_else(|| unsupported(format!("window function {}", other)))?;
                let (agg, arg) = match args.first() {
                    Some(Expr::Wildcard) | None if agg == AggFunc::Count => {
                        (AggFunc::CountStar, None)
                    }
                    Some(e) => (agg, Some(e.clone())),
                    None => return Err(EngineError::Parse(format!("{} needs an argument", other))),
                };
                (WindowFuncKind::Aggregate(agg), arg, 0)
            }
        };

        let display = match &func {
            WindowFuncKind::Aggregate(agg) => format!(
                "{}({})",
                agg.name(),
                arg.as_ref()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "*".into())
            ),
            WindowFuncKind::Lag | WindowFuncKind::Lead => format!(
                "{}({})",
                name,
                arg.as_ref()
                    .map(|a| a.to_string())
                    .unwrap_or_default()
            ),
            _ => format!("{}()", name),
        };
        let index = self.pending_windows.len();
        self.pending_windows.push(WindowExpr {
            func,
            arg,
            offset,
            partition_by,
            order_by,
            frame,
            alias: display,
        });
        Ok(Expr::Func {
            name: WINDOW_MARKER.to_string(),
            args: vec![Expr::Literal(Value::UBigInt(index as u64))],
        })
    }

    /// Swap window markers for references to the window operator's output
    /// columns, collecting the calls in projection order.
    fn extract_windows(&mut self, expr: &mut Expr, out: &mut Vec<WindowExpr>) -> CResult<()> {
        if let Expr::Func { name, args } = expr {
            if name == WINDOW_MARKER {
                let index = match args.first() {
                    Some(Expr::Literal(Value::UBigInt(i))) => *i as usize,
                    _ => return Err(EngineError::Internal("orphan window marker".into())),
                };
                let mut w = self
                    .pending_windows
                    .get(index)
                    .cloned()
                    .ok_or_else(|| EngineError::Internal("orphan window marker".into()))?;
                if out.iter().any(|o| o.alias == w.alias) {
                    w.alias = format!("{}#{}", w.alias, out.len());
                }
                let alias = w.alias.clone();
                out.push(w);
                *expr = Expr::Column(alias);
                return Ok(());
            }
        }
        match expr {
            Expr::BinaryOp { left, right, .. } => {
                self.extract_windows(left, out)?;
                self.extract_windows(right, out)?;
            }
            Expr::Not(e) | Expr::Neg(e) => self.extract_windows(e, out)?,
            Expr::IsNull { expr, .. } => self.extract_windows(expr, out)?,
            Expr::Like { expr, pattern, .. } => {
                self.extract_windows(expr, out)?;
                self.extract_windows(pattern, out)?;
            }
            Expr::InList { expr, list, .. } => {
                self.extract_windows(expr, out)?;
                for e in list {
                    self.extract_windows(e, out)?;
                }
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.extract_windows(expr, out)?;
                self.extract_windows(low, out)?;
                self.extract_windows(high, out)?;
            }
            Expr::Case {
                operand,
                branches,
                else_expr,
            } => {
                if let Some(op) = operand {
                    self.extract_windows(op, out)?;
                }
                for (w, t) in branches {
                    self.extract_windows(w, out)?;
                    self.extract_windows(t, out)?;
                }
                if let Some(e) = else_expr {
                    self.extract_windows(e, out)?;
                }
            }
            Expr::Func { args, .. } => {
                for a in args {
                    self.extract_windows(a, out)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Internal marker name for window calls while they travel through the
/// projection list.
const WINDOW_MARKER: &str = "__window__";

fn frame_bound(bound: &sql::WindowFrameBound) -> CResult<Option<usize>> {
    match bound {
        sql::WindowFrameBound::CurrentRow => Ok(Some(0)),
        sql::WindowFrameBound::Preceding(None) | sql::WindowFrameBound::Following(None) => Ok(None),
        sql::WindowFrameBound::Preceding(Some(e)) | sql::WindowFrameBound::Following(Some(e)) => {
            match &**e {
                sql::Expr::Value(sql::Value::Number(n, _)) => n
                    .parse::<usize>()
                    .map(Some)
                    .map_err(|_| EngineError::Parse(format!("bad frame bound {}", n))),
                other => Err(EngineError::Unsupported(format!(
                    "non-literal frame bound {}",
                    other
                ))),
            }
        }
    }
}

/// Aggregate calls inside a projection item are replaced by references to
/// the aggregate node's output column.
fn extract_aggregates(expr: &mut Expr, out: &mut Vec<AggExpr>) -> CResult<()> {
    if let Expr::Func { name, args } = expr {
        if let Some(func) = AggFunc::parse(name) {
            // window markers never reach here with an aggregate name
            let (func, arg) = match args.first() {
                Some(Expr::Wildcard) | None if func == AggFunc::Count => (AggFunc::CountStar, None),
                Some(a) => (func, Some(a.clone())),
                None => {
                    return Err(EngineError::Parse(format!("{} needs an argument", name)));
                }
            };
            let alias = match &arg {
                Some(a) => format!("{}({})", func.name(), a),
                None => "count(*)".to_string(),
            };
            if !out.iter().any(|a| a.alias == alias) {
                out.push(AggExpr {
                    func,
                    arg,
                    alias: alias.clone(),
                });
            }
            *expr = Expr::Column(alias);
            return Ok(());
        }
    }
    match expr {
        Expr::BinaryOp { left, right, .. } => {
            extract_aggregates(left, out)?;
            extract_aggregates(right, out)?;
        }
        Expr::Not(e) | Expr::Neg(e) => extract_aggregates(e, out)?,
        Expr::IsNull { expr, .. } => extract_aggregates(expr, out)?,
        Expr::Like { expr, pattern, .. } => {
            extract_aggregates(expr, out)?;
            extract_aggregates(pattern, out)?;
        }
        Expr::InList { expr, list, .. } => {
            extract_aggregates(expr, out)?;
            for e in list {
                extract_aggregates(e, out)?;
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            extract_aggregates(expr, out)?;
            extract_aggregates(low, out)?;
            extract_aggregates(high, out)?;
        }
        Expr::Case {
            operand,
            branches,
            else_expr,
        } => {
            if let Some(op) = operand {
                extract_aggregates(op, out)?;
            }
            for (w, t) in branches {
                extract_aggregates(w, out)?;
                extract_aggregates(t, out)?;
            }
            if let Some(e) = else_expr {
                extract_aggregates(e, out)?;
            }
        }
        Expr::Func { args, .. } => {
            for a in args {
                extract_aggregates(a, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Rewrite aggregate calls to the column name the aggregate node exposes
/// (`sum(v)` → column "sum(v)"), without registering new aggregates.
fn replace_known_aggregates(expr: &mut Expr) {
    if let Expr::Func { name, args } = expr {
        if let Some(func) = AggFunc::parse(name) {
            let alias = match args.first() {
                Some(Expr::Wildcard) | None if func == AggFunc::Count => "count(*)".to_string(),
                Some(a) => format!("{}({})", func.name(), a),
                None => return,
            };
            *expr = Expr::Column(alias);
            return;
        }
    }
    if let Expr::BinaryOp { left, right, .. } = expr {
        replace_known_aggregates(left);
        replace_known_aggregates(right);
    }
}

/// Alias → expression map of the topmost projection, for ORDER BY
/// resolution.
fn projection_alias_map(plan: &LogicalPlan) -> HashMap<String, Expr> {
    match plan {
        LogicalPlan::Projection { exprs, .. } => exprs
            .iter()
            .filter_map(|e| {
                e.alias
                    .as_ref()
                    .map(|alias| (alias.clone(), e.expr.clone()))
            })
            .collect(),
        LogicalPlan::Aggregate { input, .. }
        | LogicalPlan::Selection { input, .. }
        | LogicalPlan::Limit { input, .. }
        | LogicalPlan::Sort { input, .. } => projection_alias_map(input),
        _ => HashMap::new(),
    }
}

/// Wrap `plan`'s input with `build`, keeping a top-level Projection on top
/// so the canonical Projection(Limit(Sort(...))) shape holds.
fn push_below_projection(
    plan: LogicalPlan,
    build: impl FnOnce(LogicalPlan) -> LogicalPlan,
) -> LogicalPlan {
    match plan {
        LogicalPlan::Projection { exprs, input } => {
            // only safe when the node below still resolves the columns the
            // wrapped operator needs; Sort keys were alias-resolved already
            LogicalPlan::Projection {
                exprs,
                input: Box::new(build(*input)),
            }
        }
        other => build(other),
    }
}

pub fn object_name(name: &sql::ObjectName) -> String {
    name.0
        .iter()
        .map(|i| i.value.clone())
        .collect::<Vec<_>>()
        .join(".")
}

pub fn convert_binop(op: &sql::BinaryOperator) -> CResult<BinOp> {
    Ok(match op {
        sql::BinaryOperator::Plus => BinOp::Plus,
        sql::BinaryOperator::Minus => BinOp::Minus,
        sql::BinaryOperator::Multiply => BinOp::Multiply,
        sql::BinaryOperator::Divide => BinOp::Divide,
        sql::BinaryOperator::Modulo => BinOp::Modulo,
        sql::BinaryOperator::Eq => BinOp::Eq,
        sql::BinaryOperator::NotEq => BinOp::NotEq,
        sql::BinaryOperator::Lt => BinOp::Lt,
        sql::BinaryOperator::LtEq => BinOp::LtEq,
        sql::BinaryOperator::Gt => BinOp::Gt,
        sql::BinaryOperator::GtEq => BinOp::GtEq,
        sql::BinaryOperator::And => BinOp::And,
        sql::BinaryOperator::Or => BinOp::Or,
        other => {
            return Err(EngineError::Unsupported(format!(
                "comparison operator {:?}",
                other
            )))
        }
    })
}

/// Literal conversion, preserving integer width where the literal fits.
pub fn convert_value(v: &sql::Value) -> CResult<Value> {
    Ok(match v {
        sql::Value::Number(text, _) => {
            if let Ok(i) = text.parse::<i64>() {
                if let Ok(small) = i32::try_from(i) {
                    Value::Int(small)
                } else {
                    Value::BigInt(i)
                }
            } else if let Ok(u) = text.parse::<u64>() {
                Value::UBigInt(u)
            } else {
                text.parse::<f64>()
                    .map(Value::Double)
                    .map_err(|_| EngineError::Parse(format!("bad number literal {}", text)))?
            }
        }
        sql::Value::SingleQuotedString(s) | sql::Value::DoubleQuotedString(s) => {
            Value::String(s.clone())
        }
        sql::Value::Boolean(b) => Value::Bool(*b),
        sql::Value::Null => Value::Null,
        sql::Value::HexStringLiteral(s) => {
            let mut bytes = Vec::with_capacity(s.len() / 2);
            let chars: Vec<char> = s.chars().collect();
            for pair in chars.chunks(2) {
                let hi = pair[0].to_digit(16);
                let lo = pair.get(1).and_then(|c| c.to_digit(16));
                match (hi, lo) {
                    (Some(h), Some(l)) => bytes.push((h * 16 + l) as u8),
                    _ => return Err(EngineError::Parse(format!("bad hex literal {}", s))),
                }
            }
            Value::Blob(bytes)
        }
        other => {
            return Err(EngineError::Unsupported(format!(
                "literal {:?}",
                other
            )))
        }
    })
}
