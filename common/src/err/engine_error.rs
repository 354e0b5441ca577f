use std::fmt::Display;
use std::string::FromUtf8Error;
use std::str::Utf8Error;
use std::{fmt, io};

use thiserror::Error;

/// Constraint failures keep their own sub-kind so callers can distinguish
/// which guarantee was violated without string matching.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstraintKind {
    #[error("Duplicate entry '{value}' for unique column '{column}' in table '{table}'")]
    Unique {
        table: String,
        column: String,
        value: String,
    },

    #[error("Cannot add or update a child row: column '{column}' of table '{table}' references missing '{parent}'")]
    ForeignKey {
        table: String,
        column: String,
        parent: String,
    },

    /// RESTRICT policy refused a parent-row delete while child rows exist.
    #[error("Cannot delete a parent row: table '{child_table}' still references '{table}'")]
    ForeignKeyRestrict { table: String, child_table: String },

    #[error("Column '{column}' of table '{table}' cannot be null")]
    NotNull { table: String, column: String },

    #[error("Auto increment counter exhausted for table '{table}'")]
    AutoIncrementOverflow { table: String },
}

#[derive(Debug)]
pub enum EngineError {
    //////////////////////
    // SQL front
    //////////////////////
    /// Malformed SQL. Surfaced to the client, connection stays open.
    Parse(String),
    /// Parsed but the engine refuses to execute it.
    Unsupported(String),

    //////////////////////
    // Catalog
    //////////////////////
    TableNotFound(String),
    ColumnNotFound(String),
    TableExists(String),

    //////////////////////
    // Execution
    //////////////////////
    TypeMismatch(String),
    Constraint(ConstraintKind),
    /// Commit-time validation found a conflicting concurrent commit.
    Serialization(String),
    LockConflict(String),
    Deadlock(String),
    Canceled,
    /// Query ran past its deadline (millis).
    Timeout(u64),

    //////////////////////
    // Data sources / IO
    //////////////////////
    SourceIo(String),
    Connection(String),
    Config(String),

    //////////////////////
    // Wire
    //////////////////////
    /// Packet framing failure. Fatal to the connection.
    Protocol(String),

    /// 一定不会出现的异常。如果出现，一定是BUG
    Internal(String),

    Io(io::Error),
    Utf8(Utf8Error),
    FromUtf8(FromUtf8Error),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> fmt::Result {
        match self {
            EngineError::Parse(s) | EngineError::Unsupported(s)
            | EngineError::TypeMismatch(s) | EngineError::Serialization(s)
            | EngineError::LockConflict(s) | EngineError::Deadlock(s)
            | EngineError::SourceIo(s) | EngineError::Connection(s)
            | EngineError::Config(s) | EngineError::Protocol(s)
            | EngineError::Internal(s) => {
                write!(f, "{}", s)
            }
            EngineError::TableNotFound(t) => {
                write!(f, "Table '{}' doesn't exist", t)
            }
            EngineError::ColumnNotFound(c) => {
                write!(f, "Unknown column '{}'", c)
            }
            EngineError::TableExists(t) => {
                write!(f, "Table '{}' already exists", t)
            }
            EngineError::Constraint(kind) => {
                write!(f, "{}", kind)
            }
            EngineError::Canceled => {
                write!(f, "Query execution was interrupted")
            }
            EngineError::Timeout(ms) => {
                write!(f, "Query execution was interrupted, deadline of {}ms exceeded", ms)
            }
            EngineError::Io(err) => {
                write!(f, "{}", err)
            }
            EngineError::Utf8(err) => {
                write!(f, "{}", err)
            }
            EngineError::FromUtf8(err) => {
                write!(f, "{}", err)
            }
        }
    }
}

impl From<io::Error> for EngineError {
    fn from(error: io::Error) -> Self {
        EngineError::Io(error)
    }
}

impl From<Utf8Error> for EngineError {
    fn from(error: Utf8Error) -> Self {
        EngineError::Utf8(error)
    }
}

impl From<FromUtf8Error> for EngineError {
    fn from(error: FromUtf8Error) -> Self {
        EngineError::FromUtf8(error)
    }
}

impl From<ConstraintKind> for EngineError {
    fn from(kind: ConstraintKind) -> Self {
        EngineError::Constraint(kind)
    }
}

impl EngineError {
    /// MySQL error code carried by the ERR packet.
    pub fn mysql_code(&self) -> u16 {
        match self {
            EngineError::Parse(_) => 1064,
            EngineError::Unsupported(_) => 1235,
            EngineError::TableNotFound(_) => 1146,
            EngineError::ColumnNotFound(_) => 1054,
            EngineError::TableExists(_) => 1050,
            EngineError::TypeMismatch(_) => 1366,
            EngineError::Constraint(ConstraintKind::Unique { .. }) => 1062,
            EngineError::Constraint(ConstraintKind::ForeignKey { .. }) => 1452,
            EngineError::Constraint(ConstraintKind::ForeignKeyRestrict { .. }) => 1451,
            EngineError::Constraint(ConstraintKind::NotNull { .. }) => 1048,
            EngineError::Constraint(ConstraintKind::AutoIncrementOverflow { .. }) => 1467,
            EngineError::Serialization(_) | EngineError::Deadlock(_) => 1213,
            EngineError::LockConflict(_) => 1205,
            EngineError::Canceled => 1317,
            EngineError::Timeout(_) => 3024,
            EngineError::Protocol(_) => 1043,
            EngineError::Connection(_) => 2002,
            _ => 1105,
        }
    }

    /// Five character SQLSTATE matching `mysql_code`.
    pub fn sql_state(&self) -> &'static str {
        match self {
            EngineError::Parse(_) | EngineError::Unsupported(_) => "42000",
            EngineError::TableNotFound(_) => "42S02",
            EngineError::ColumnNotFound(_) => "42S22",
            EngineError::TableExists(_) => "42S01",
            EngineError::Constraint(
                ConstraintKind::Unique { .. }
                | ConstraintKind::ForeignKey { .. }
                | ConstraintKind::ForeignKeyRestrict { .. }
                | ConstraintKind::NotNull { .. },
            ) => "23000",
            EngineError::Serialization(_) | EngineError::Deadlock(_) => "40001",
            EngineError::Canceled => "70100",
            EngineError::Protocol(_) => "08S01",
            _ => "HY000",
        }
    }

    /// Only invariant violations take the whole process down.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Internal(_))
    }

    /// Framing errors terminate the connection, everything else returns it
    /// to COMMAND_READY.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, EngineError::Protocol(_) | EngineError::Io(_))
    }

    /// The client may retry the transaction from the top.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Serialization(_) | EngineError::LockConflict(_) | EngineError::Deadlock(_)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn code_and_state_pairing() {
        let err = EngineError::Constraint(ConstraintKind::Unique {
            table: "t".into(),
            column: "email".into(),
            value: "b".into(),
        });
        assert_eq!(err.mysql_code(), 1062);
        assert_eq!(err.sql_state(), "23000");
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn fatality() {
        assert!(EngineError::Internal("broken".into()).is_fatal());
        assert!(EngineError::Protocol("bad frame".into()).is_connection_fatal());
        assert!(!EngineError::Parse("x".into()).is_connection_fatal());
        assert!(EngineError::LockConflict("t".into()).is_retryable());
    }
}
