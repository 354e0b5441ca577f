use sqlparser::ast as sql;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use common::datasource::{Catalog, IsolationLevel};
use common::err::{CResult, EngineError};
use common::schema::{ColumnInfo, DataType, ForeignKeyRef, ReferentialPolicy, TableInfo};

use crate::ast::expr::Expr;
use crate::ast::statement::{ShowKind, Statement};
use crate::logical::builder::{convert_value, object_name, PlanBuilder};

/// Split a script into single statements at top-level semicolons,
/// respecting quoted strings and backtick identifiers.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == '\\' && q != '`' {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    current.push(c);
                }
                ';' => {
                    if !current.trim().is_empty() {
                        out.push(current.trim().to_string());
                    }
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

/// Parse a possibly multi-statement script. Statements are independent; the
/// session executes them in order and stops at the first error.
pub fn parse_script(sql: &str, catalog: &dyn Catalog) -> CResult<Vec<Statement>> {
    split_statements(sql)
        .iter()
        .map(|stmt| parse_single(stmt, catalog))
        .collect()
}

fn first_word(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// One statement → normalized form. Session-control verbs MySQL clients
/// send in dialect-specific spellings are matched on the leading token
/// before the full parser runs.
pub fn parse_single(sql_text: &str, catalog: &dyn Catalog) -> CResult<Statement> {
    let trimmed = sql_text.trim().trim_end_matches(';').trim();
    if trimmed.is_empty() {
        return Err(EngineError::Parse("empty statement".to_string()));
    }
    match first_word(trimmed).as_str() {
        "use" => return parse_use(trimmed),
        "begin" => return Ok(Statement::Begin),
        "start" => {
            if trimmed.to_ascii_lowercase().contains("transaction") {
                return Ok(Statement::Begin);
            }
        }
        "commit" => return Ok(Statement::Commit),
        "rollback" => return Ok(Statement::Rollback),
        "set" => return parse_set(trimmed),
        "show" => return parse_show(trimmed),
        "desc" | "describe" => return parse_describe(trimmed),
        "explain" => {
            let rest = trimmed[7..].trim();
            let inner = parse_single(rest, catalog)?;
            return match inner {
                Statement::Select(plan) => Ok(Statement::Explain(plan)),
                _ => Err(EngineError::Unsupported(
                    "EXPLAIN supports SELECT only".to_string(),
                )),
            };
        }
        "truncate" => {
            // TRUNCATE [TABLE] name
            let mut words = trimmed.split_whitespace().skip(1);
            let name = match words.next() {
                Some(w) if w.eq_ignore_ascii_case("table") => words.next(),
                other => other,
            };
            if let Some(name) = name {
                return Ok(Statement::TruncateTable {
                    name: unquote_ident(name),
                });
            }
            return Err(EngineError::Parse("TRUNCATE needs a table name".to_string()));
        }
        _ => {}
    }

    let parsed = Parser::parse_sql(&MySqlDialect {}, trimmed).map_err(|e| {
        debug!("parse failed for [{}]: {}", trimmed, e);
        EngineError::Parse(e.to_string())
    })?;
    if parsed.len() != 1 {
        return Err(EngineError::Parse(format!(
            "expected one statement, found {}",
            parsed.len()
        )));
    }
    convert_statement(&parsed[0], catalog)
}

fn convert_statement(stmt: &sql::Statement, catalog: &dyn Catalog) -> CResult<Statement> {
    match stmt {
        sql::Statement::Query(query) => {
            let mut builder = PlanBuilder::new(catalog);
            Ok(Statement::Select(builder.build_select(query)?))
        }
        sql::Statement::Insert {
            table_name,
            columns,
            source,
            ..
        } => {
            let table = object_name(table_name);
            let column_names: Vec<String> = columns.iter().map(|c| c.value.clone()).collect();
            let mut builder = PlanBuilder::new(catalog);
            let rows = match source.body.as_ref() {
                sql::SetExpr::Values(values) => {
                    let mut rows = Vec::with_capacity(values.rows.len());
                    for row in &values.rows {
                        rows.push(
                            row.iter()
                                .map(|e| builder.convert_expr(e))
                                .collect::<CResult<Vec<Expr>>>()?,
                        );
                    }
                    rows
                }
                _ => {
                    return Err(EngineError::Unsupported(
                        "INSERT supports VALUES lists only".to_string(),
                    ))
                }
            };
            Ok(Statement::Insert {
                table,
                columns: column_names,
                rows,
            })
        }
        sql::Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            let name = match &table.relation {
                sql::TableFactor::Table { name, .. } => object_name(name),
                other => {
                    return Err(EngineError::Unsupported(format!(
                        "UPDATE target {:?}",
                        other
                    )))
                }
            };
            let mut builder = PlanBuilder::new(catalog);
            let mut pairs = Vec::with_capacity(assignments.len());
            for assignment in assignments {
                let column = assignment
                    .id
                    .iter()
                    .map(|i| i.value.clone())
                    .collect::<Vec<_>>()
                    .join(".");
                pairs.push((column, builder.convert_expr(&assignment.value)?));
            }
            let selection = match selection {
                Some(e) => Some(builder.convert_expr(e)?),
                None => None,
            };
            Ok(Statement::Update {
                table: name,
                assignments: pairs,
                selection,
            })
        }
        sql::Statement::Delete {
            from, selection, ..
        } => {
            let name = match from.first().map(|t| &t.relation) {
                Some(sql::TableFactor::Table { name, .. }) => object_name(name),
                _ => {
                    return Err(EngineError::Parse(
                        "DELETE needs a single target table".to_string(),
                    ))
                }
            };
            let mut builder = PlanBuilder::new(catalog);
            let selection = match selection {
                Some(e) => Some(builder.convert_expr(e)?),
                None => None,
            };
            Ok(Statement::Delete {
                table: name,
                selection,
            })
        }
        sql::Statement::CreateTable {
            name,
            columns,
            constraints,
            ..
        } => convert_create_table(name, columns, constraints),
        sql::Statement::Drop {
            object_type: sql::ObjectType::Table,
            if_exists,
            names,
            ..
        } => {
            let name = names
                .first()
                .map(object_name)
                .ok_or_else(|| EngineError::Parse("DROP TABLE needs a name".to_string()))?;
            Ok(Statement::DropTable {
                name,
                if_exists: *if_exists,
            })
        }
        sql::Statement::Truncate { table_name, .. } => Ok(Statement::TruncateTable {
            name: object_name(table_name),
        }),
        other => Err(EngineError::Unsupported(format!(
            "statement {}",
            other
        ))),
    }
}

fn convert_create_table(
    name: &sql::ObjectName,
    columns: &[sql::ColumnDef],
    constraints: &[sql::TableConstraint],
) -> CResult<Statement> {
    let mut infos = Vec::with_capacity(columns.len());
    for col in columns {
        let mut info = ColumnInfo::new(col.name.value.clone(), convert_data_type(&col.data_type)?);
        for option in &col.options {
            match &option.option {
                sql::ColumnOption::NotNull => info.nullable = false,
                sql::ColumnOption::Null => info.nullable = true,
                sql::ColumnOption::Unique { is_primary, .. } => {
                    if *is_primary {
                        info.primary_key = true;
                        info.nullable = false;
                    } else {
                        info.unique = true;
                    }
                }
                sql::ColumnOption::Default(e) => {
                    info.default = Some(match e {
                        sql::Expr::Value(v) => convert_value(v)?,
                        sql::Expr::UnaryOp {
                            op: sql::UnaryOperator::Minus,
                            expr,
                        } => match &**expr {
                            sql::Expr::Value(v) => convert_value(v)?.neg()?,
                            other => {
                                return Err(EngineError::Unsupported(format!(
                                    "default expression {}",
                                    other
                                )))
                            }
                        },
                        other => {
                            return Err(EngineError::Unsupported(format!(
                                "default expression {}",
                                other
                            )))
                        }
                    });
                }
                sql::ColumnOption::ForeignKey {
                    foreign_table,
                    referred_columns,
                    on_delete,
                    on_update,
                    ..
                } => {
                    info.foreign_key = Some(ForeignKeyRef {
                        table: object_name(foreign_table),
                        column: referred_columns
                            .first()
                            .map(|c| c.value.clone())
                            .unwrap_or_else(|| "id".to_string()),
                        on_delete: convert_referential(on_delete),
                        on_update: convert_referential(on_update),
                    });
                }
                sql::ColumnOption::DialectSpecific(tokens) => {
                    let auto = tokens.iter().any(|t| {
                        matches!(
                            t,
                            sqlparser::tokenizer::Token::Word(w)
                                if w.value.eq_ignore_ascii_case("AUTO_INCREMENT")
                        )
                    });
                    if auto {
                        info.auto_increment = true;
                    }
                }
                _ => {}
            }
        }
        infos.push(info);
    }

    // table-level constraints fold into the column list
    for constraint in constraints {
        match constraint {
            sql::TableConstraint::Unique {
                columns: cols,
                is_primary,
                ..
            } => {
                for col in cols {
                    if let Some(info) = infos.iter_mut().find(|i| i.name == col.value) {
                        if *is_primary {
                            info.primary_key = true;
                            info.nullable = false;
                        } else {
                            info.unique = true;
                        }
                    }
                }
            }
            sql::TableConstraint::ForeignKey {
                columns: cols,
                foreign_table,
                referred_columns,
                on_delete,
                on_update,
                ..
            } => {
                for (i, col) in cols.iter().enumerate() {
                    if let Some(info) = infos.iter_mut().find(|inf| inf.name == col.value) {
                        info.foreign_key = Some(ForeignKeyRef {
                            table: object_name(foreign_table),
                            column: referred_columns
                                .get(i)
                                .map(|c| c.value.clone())
                                .unwrap_or_else(|| "id".to_string()),
                            on_delete: convert_referential(on_delete),
                            on_update: convert_referential(on_update),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    let table = TableInfo::new(object_name(name), infos);
    table.validate()?;
    Ok(Statement::CreateTable(table))
}

fn convert_referential(action: &Option<sql::ReferentialAction>) -> ReferentialPolicy {
    match action {
        Some(sql::ReferentialAction::Cascade) => ReferentialPolicy::Cascade,
        Some(sql::ReferentialAction::SetNull) => ReferentialPolicy::SetNull,
        Some(sql::ReferentialAction::NoAction) => ReferentialPolicy::NoAction,
        Some(sql::ReferentialAction::Restrict) | Some(sql::ReferentialAction::SetDefault) | None => {
            ReferentialPolicy::Restrict
        }
    }
}

pub fn convert_data_type(dt: &sql::DataType) -> CResult<DataType> {
    Ok(match dt {
        sql::DataType::TinyInt(_) => DataType::TinyInt,
        sql::DataType::SmallInt(_) => DataType::SmallInt,
        sql::DataType::Int(_) | sql::DataType::Integer(_) | sql::DataType::MediumInt(_) => {
            DataType::Int
        }
        sql::DataType::BigInt(_) => DataType::BigInt,
        sql::DataType::UnsignedTinyInt(_) => DataType::UTinyInt,
        sql::DataType::UnsignedSmallInt(_) => DataType::USmallInt,
        sql::DataType::UnsignedInt(_)
        | sql::DataType::UnsignedInteger(_)
        | sql::DataType::UnsignedMediumInt(_) => DataType::UInt,
        sql::DataType::UnsignedBigInt(_) => DataType::UBigInt,
        sql::DataType::Float(_) | sql::DataType::Real => DataType::Float,
        sql::DataType::Double | sql::DataType::DoublePrecision => DataType::Double,
        sql::DataType::Boolean => DataType::Boolean,
        sql::DataType::Char(_) | sql::DataType::Varchar(_) | sql::DataType::Text => {
            DataType::Varchar
        }
        sql::DataType::Blob(_) | sql::DataType::Bytea | sql::DataType::Binary(_)
        | sql::DataType::Varbinary(_) => DataType::Blob,
        sql::DataType::Date => DataType::Date,
        sql::DataType::Time(_, _) => DataType::Time,
        sql::DataType::Datetime(_) => DataType::DateTime,
        sql::DataType::Timestamp(_, _) => DataType::Timestamp,
        sql::DataType::Decimal(_) | sql::DataType::Numeric(_) => DataType::Double,
        other => {
            return Err(EngineError::Unsupported(format!(
                "column type {}",
                other
            )))
        }
    })
}

fn unquote_ident(raw: &str) -> String {
    raw.trim_matches('`').trim_matches('"').to_string()
}

fn parse_use(sql_text: &str) -> CResult<Statement> {
    let database = sql_text
        .split_whitespace()
        .nth(1)
        .map(unquote_ident)
        .ok_or_else(|| EngineError::Parse("USE needs a database name".to_string()))?;
    Ok(Statement::Use { database })
}

/// SET takes several dialect shapes the parser does not cover uniformly:
/// `SET NAMES utf8mb4`, `SET autocommit = 0`, `SET SESSION x = y`,
/// `SET [SESSION] TRANSACTION ISOLATION LEVEL ...`.
fn parse_set(sql_text: &str) -> CResult<Statement> {
    let rest = sql_text[3..].trim();
    let lower = rest.to_ascii_lowercase();
    if let Some(pos) = lower.find("isolation level") {
        let level_text = &rest[pos + "isolation level".len()..];
        let level = IsolationLevel::parse(level_text).ok_or_else(|| {
            EngineError::Parse(format!("unknown isolation level{}", level_text))
        })?;
        return Ok(Statement::SetIsolation(level));
    }
    let rest = strip_leading_keyword(rest, &["session", "global", "local"]);
    if let Some(names_arg) = rest
        .to_ascii_lowercase()
        .strip_prefix("names")
        .map(|r| r.trim().to_string())
    {
        let charset = names_arg
            .split_whitespace()
            .next()
            .unwrap_or("utf8mb4")
            .trim_matches('\'')
            .to_string();
        return Ok(Statement::Set {
            name: "names".to_string(),
            value: charset,
        });
    }
    match rest.split_once('=') {
        Some((name, value)) => Ok(Statement::Set {
            name: name.trim().trim_start_matches("@@").to_ascii_lowercase(),
            value: value.trim().trim_matches('\'').trim_matches('"').to_string(),
        }),
        None => Err(EngineError::Parse(format!("cannot parse SET: {}", sql_text))),
    }
}

fn strip_leading_keyword<'a>(text: &'a str, keywords: &[&str]) -> &'a str {
    let lower = text.to_ascii_lowercase();
    for kw in keywords {
        if lower.starts_with(kw) {
            let rest = &text[kw.len()..];
            if rest.starts_with(char::is_whitespace) {
                return rest.trim_start();
            }
        }
    }
    text
}

fn parse_show(sql_text: &str) -> CResult<Statement> {
    let lower = sql_text.to_ascii_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    match words.get(1).copied() {
        Some("databases") | Some("schemas") => Ok(Statement::Show(ShowKind::Databases)),
        Some("tables") => Ok(Statement::Show(ShowKind::Tables)),
        Some("columns") | Some("fields") => {
            // SHOW COLUMNS FROM t
            let original: Vec<&str> = sql_text.split_whitespace().collect();
            let table = original
                .iter()
                .position(|w| w.eq_ignore_ascii_case("from"))
                .and_then(|i| original.get(i + 1))
                .map(|w| unquote_ident(w))
                .ok_or_else(|| EngineError::Parse("SHOW COLUMNS needs FROM <table>".to_string()))?;
            Ok(Statement::Show(ShowKind::Columns { table }))
        }
        Some("variables") => {
            let like = lower
                .find("like")
                .map(|pos| sql_text[pos + 4..].trim().trim_matches('\'').to_string());
            Ok(Statement::Show(ShowKind::Variables { like }))
        }
        other => Err(EngineError::Unsupported(format!(
            "SHOW {}",
            other.unwrap_or("")
        ))),
    }
}

fn parse_describe(sql_text: &str) -> CResult<Statement> {
    let table = sql_text
        .split_whitespace()
        .nth(1)
        .map(unquote_ident)
        .ok_or_else(|| EngineError::Parse("DESCRIBE needs a table name".to_string()))?;
    Ok(Statement::Describe { table })
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use common::schema::{ColumnInfo, TableInfo};
    use common::value::Value;

    use super::*;
    use crate::logical::plan::LogicalPlan;

    struct FakeCatalog {
        tables: HashMap<String, TableInfo>,
    }

    impl FakeCatalog {
        fn new() -> Self {
            let mut tables = HashMap::new();
            tables.insert(
                "users".to_string(),
                TableInfo::new(
                    "users",
                    vec![
                        ColumnInfo::new("id", DataType::Int).primary(),
                        ColumnInfo::new("name", DataType::Varchar),
                        ColumnInfo::new("age", DataType::Int),
                    ],
                ),
            );
            FakeCatalog { tables }
        }
    }

    impl Catalog for FakeCatalog {
        fn table_info(&self, table: &str) -> CResult<TableInfo> {
            self.tables
                .get(table)
                .cloned()
                .ok_or_else(|| EngineError::TableNotFound(table.to_string()))
        }

        fn table_rows(&self, _table: &str) -> usize {
            1000
        }
    }

    #[test]
    fn splits_on_top_level_semicolons() {
        let parts = split_statements("select 1; select 'a;b'; select 2");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], "select 'a;b'");
    }

    #[test]
    fn select_builds_canonical_shape() {
        let catalog = FakeCatalog::new();
        let stmts =
            parse_script("SELECT name FROM users WHERE age > 30 ORDER BY name LIMIT 10", &catalog)
                .unwrap();
        assert_eq!(stmts.len(), 1);
        let Statement::Select(plan) = &stmts[0] else {
            panic!("expected select")
        };
        // Projection(Limit(Sort(Selection(DataSource))))
        let LogicalPlan::Projection { input, .. } = &plan.root else {
            panic!("no projection: {:?}", plan.root)
        };
        let LogicalPlan::Limit { limit, input, .. } = &**input else {
            panic!("no limit")
        };
        assert_eq!(*limit, Some(10));
        let LogicalPlan::Sort { input, .. } = &**input else {
            panic!("no sort")
        };
        assert!(matches!(&**input, LogicalPlan::Selection { .. }));
    }

    #[test]
    fn session_statements_bypass_parser() {
        let catalog = FakeCatalog::new();
        assert!(matches!(
            parse_single("SET NAMES utf8mb4", &catalog).unwrap(),
            Statement::Set { .. }
        ));
        assert!(matches!(
            parse_single("set session transaction isolation level repeatable read", &catalog)
                .unwrap(),
            Statement::SetIsolation(IsolationLevel::RepeatableRead)
        ));
        assert!(matches!(
            parse_single("USE main", &catalog).unwrap(),
            Statement::Use { .. }
        ));
        assert!(matches!(
            parse_single("START TRANSACTION", &catalog).unwrap(),
            Statement::Begin
        ));
        assert!(matches!(
            parse_single("SHOW TABLES", &catalog).unwrap(),
            Statement::Show(ShowKind::Tables)
        ));
    }

    #[test]
    fn create_table_with_constraints() {
        let catalog = FakeCatalog::new();
        let stmt = parse_single(
            "CREATE TABLE orders (
                id INT PRIMARY KEY AUTO_INCREMENT,
                user_id INT NOT NULL,
                total DOUBLE DEFAULT 0,
                FOREIGN KEY (user_id) REFERENCES users(id)
            )",
            &catalog,
        )
        .unwrap();
        let Statement::CreateTable(info) = stmt else {
            panic!("expected create table")
        };
        assert_eq!(info.name, "orders");
        let id = info.column("id").unwrap();
        assert!(id.primary_key && id.auto_increment && !id.nullable);
        let user_id = info.column("user_id").unwrap();
        assert_eq!(user_id.foreign_key.as_ref().unwrap().table, "users");
        assert_eq!(
            info.column("total").unwrap().default,
            Some(Value::Int(0))
        );
    }

    #[test]
    fn unknown_operator_is_unsupported() {
        let catalog = FakeCatalog::new();
        let err = parse_single("SELECT * FROM users WHERE name ~ 'x'", &catalog).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Unsupported(_) | EngineError::Parse(_)
        ));
    }

    #[test]
    fn unknown_table_fails_at_plan_time() {
        let catalog = FakeCatalog::new();
        let err = parse_single("SELECT * FROM missing", &catalog).unwrap_err();
        assert!(matches!(err, EngineError::TableNotFound(_)));
    }
}
