pub mod data_type;
pub mod table_info;

pub use data_type::DataType;
pub use table_info::{ColumnInfo, ForeignKeyRef, ReferentialPolicy, TableInfo};
