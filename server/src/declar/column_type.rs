use common::schema::{ColumnInfo, DataType};

/// Protocol column type codes (a subset of the full MySQL table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MysqlColumnType {
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Date = 0x0a,
    Time = 0x0b,
    Datetime = 0x0c,
    VarChar = 0x0f,
    Blob = 0xfc,
    VarString = 0xfd,
}

/// Column definition flags.
pub(crate) const NOT_NULL_FLAG: u16 = 0x0001;
pub(crate) const PRI_KEY_FLAG: u16 = 0x0002;
pub(crate) const UNIQUE_KEY_FLAG: u16 = 0x0004;
pub(crate) const UNSIGNED_FLAG: u16 = 0x0020;
pub(crate) const BINARY_FLAG: u16 = 0x0080;
pub(crate) const AUTO_INCREMENT_FLAG: u16 = 0x0200;

/// Engine type tag → wire type code.
pub fn mysql_type_of(data_type: &DataType) -> MysqlColumnType {
    match data_type {
        DataType::TinyInt | DataType::UTinyInt | DataType::Boolean => MysqlColumnType::Tiny,
        DataType::SmallInt | DataType::USmallInt => MysqlColumnType::Short,
        DataType::Int | DataType::UInt => MysqlColumnType::Long,
        DataType::BigInt | DataType::UBigInt => MysqlColumnType::LongLong,
        DataType::Float => MysqlColumnType::Float,
        DataType::Double => MysqlColumnType::Double,
        DataType::Varchar => MysqlColumnType::VarString,
        DataType::Blob => MysqlColumnType::Blob,
        DataType::Date => MysqlColumnType::Date,
        DataType::Time => MysqlColumnType::Time,
        DataType::DateTime => MysqlColumnType::Datetime,
        DataType::Timestamp => MysqlColumnType::Timestamp,
    }
}

pub fn column_flags(column: &ColumnInfo) -> u16 {
    let mut flags = 0;
    if !column.nullable {
        flags |= NOT_NULL_FLAG;
    }
    if column.primary_key {
        flags |= PRI_KEY_FLAG | NOT_NULL_FLAG;
    }
    if column.unique {
        flags |= UNIQUE_KEY_FLAG;
    }
    if column.data_type.is_unsigned() {
        flags |= UNSIGNED_FLAG;
    }
    if column.data_type == DataType::Blob {
        flags |= BINARY_FLAG;
    }
    if column.auto_increment {
        flags |= AUTO_INCREMENT_FLAG;
    }
    flags
}
