use serde::Serialize;

use crate::err::{CResult, EngineError};
use crate::schema::data_type::DataType;
use crate::value::Value;

/// Action taken on the child side when the referenced parent row changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReferentialPolicy {
    #[default]
    Restrict,
    Cascade,
    SetNull,
    NoAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
    pub on_delete: ReferentialPolicy,
    pub on_update: ReferentialPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub default: Option<Value>,
    pub foreign_key: Option<ForeignKeyRef>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        ColumnInfo {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
            unique: false,
            auto_increment: false,
            default: None,
            foreign_key: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn default_value(mut self, v: Value) -> Self {
        self.default = Some(v);
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKeyRef {
            table: table.into(),
            column: column.into(),
            on_delete: ReferentialPolicy::Restrict,
            on_update: ReferentialPolicy::Restrict,
        });
        self
    }

    /// Columns enforced through the unique index: explicit UNIQUE and the
    /// primary key both land there.
    pub fn needs_unique_index(&self) -> bool {
        self.unique || self.primary_key
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub name: String,
    /// Owning database name; empty means the source's default.
    pub schema: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        TableInfo {
            name: name.into(),
            schema: String::new(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn primary_key(&self) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.primary_key)
    }

    pub fn auto_increment_column(&self) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.auto_increment)
    }

    /// Schema invariants: unique column names, at most one auto-increment
    /// column, primary key columns non-nullable.
    pub fn validate(&self) -> CResult<()> {
        if self.name.is_empty() {
            return Err(EngineError::Parse("table name must not be empty".to_string()));
        }
        if self.columns.is_empty() {
            return Err(EngineError::Parse(format!(
                "table '{}' must declare at least one column",
                self.name
            )));
        }
        for (i, col) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == col.name) {
                return Err(EngineError::Parse(format!(
                    "duplicate column name '{}' in table '{}'",
                    col.name, self.name
                )));
            }
            if col.primary_key && col.nullable {
                return Err(EngineError::Parse(format!(
                    "primary key column '{}' must be NOT NULL",
                    col.name
                )));
            }
        }
        let auto = self.columns.iter().filter(|c| c.auto_increment).count();
        if auto > 1 {
            return Err(EngineError::Parse(format!(
                "table '{}' declares {} auto increment columns, at most one allowed",
                self.name, auto
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn users() -> TableInfo {
        TableInfo::new(
            "users",
            vec![
                ColumnInfo::new("id", DataType::Int).primary().auto_increment(),
                ColumnInfo::new("email", DataType::Varchar).unique(),
            ],
        )
    }

    #[test]
    fn validates_clean_schema() {
        assert!(users().validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_columns() {
        let mut t = users();
        t.columns.push(ColumnInfo::new("id", DataType::Int));
        assert!(t.validate().is_err());
    }

    #[test]
    fn rejects_two_auto_increments() {
        let mut t = users();
        t.columns.push(ColumnInfo::new("seq", DataType::Int).auto_increment());
        assert!(t.validate().is_err());
    }

    #[test]
    fn primary_key_implies_not_null() {
        let col = ColumnInfo::new("id", DataType::Int).primary();
        assert!(!col.nullable);
        assert!(col.needs_unique_index());
    }
}
