use common::datasource::IsolationLevel;
use common::schema::TableInfo;

use crate::ast::expr::Expr;
use crate::logical::plan::LogicalPlan;

/// One CTE binding. Recursive CTEs reference their own name inside `plan`.
#[derive(Debug, Clone, PartialEq)]
pub struct CteDef {
    pub name: String,
    pub columns: Vec<String>,
    pub plan: LogicalPlan,
    pub recursive: bool,
}

/// A SELECT ready for the optimizer: CTE bindings plus the operator tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectPlan {
    pub ctes: Vec<CteDef>,
    pub root: LogicalPlan,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShowKind {
    Databases,
    Tables,
    Columns { table: String },
    Variables { like: Option<String> },
}

/// Normalized statement forms the session dispatches on.
#[derive(Debug, Clone)]
pub enum Statement {
    Select(SelectPlan),
    Insert {
        table: String,
        columns: Vec<String>,
        rows: Vec<Vec<Expr>>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Expr)>,
        selection: Option<Expr>,
    },
    Delete {
        table: String,
        selection: Option<Expr>,
    },
    CreateTable(TableInfo),
    DropTable {
        name: String,
        if_exists: bool,
    },
    TruncateTable {
        name: String,
    },
    /// SET name = value, including SET NAMES / autocommit.
    Set {
        name: String,
        value: String,
    },
    SetIsolation(IsolationLevel),
    Use {
        database: String,
    },
    Begin,
    Commit,
    Rollback,
    Show(ShowKind),
    Describe {
        table: String,
    },
    Explain(SelectPlan),
}
