use serde::{Deserialize, Serialize};

/// Column type tags the engine understands. The wire layer maps these onto
/// MySQL protocol column types; the planner maps sqlparser types into them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    UTinyInt,
    USmallInt,
    UInt,
    UBigInt,
    Float,
    Double,
    Boolean,
    Varchar,
    Blob,
    Date,
    Time,
    DateTime,
    Timestamp,
}

impl DataType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt
                | DataType::SmallInt
                | DataType::Int
                | DataType::BigInt
                | DataType::UTinyInt
                | DataType::USmallInt
                | DataType::UInt
                | DataType::UBigInt
        )
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            DataType::UTinyInt | DataType::USmallInt | DataType::UInt | DataType::UBigInt
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, DataType::Float | DataType::Double)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            DataType::Date | DataType::Time | DataType::DateTime | DataType::Timestamp
        )
    }

    /// Lowercase name as shown by SHOW COLUMNS / DESCRIBE.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::TinyInt => "tinyint",
            DataType::SmallInt => "smallint",
            DataType::Int => "int",
            DataType::BigInt => "bigint",
            DataType::UTinyInt => "tinyint unsigned",
            DataType::USmallInt => "smallint unsigned",
            DataType::UInt => "int unsigned",
            DataType::UBigInt => "bigint unsigned",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Boolean => "tinyint(1)",
            DataType::Varchar => "varchar",
            DataType::Blob => "blob",
            DataType::Date => "date",
            DataType::Time => "time",
            DataType::DateTime => "datetime",
            DataType::Timestamp => "timestamp",
        }
    }
}
