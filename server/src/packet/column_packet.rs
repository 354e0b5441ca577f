use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use common::err::CResult;
use common::schema::{ColumnInfo, DataType};

use crate::declar::column_type::{column_flags, mysql_type_of, MysqlColumnType};
use crate::packet::len_enc::{read_len_enc_num, read_len_enc_str, write_len_enc_str};

const UTF8_MB4_CHARSET: u16 = 45;
/// Charset code for binary columns.
const BINARY_CHARSET: u16 = 63;

/// ColumnDefinition41, one per result-set column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinitionPacket {
    pub schema: String,
    pub table: String,
    pub name: String,
    pub character_set: u16,
    pub column_length: u32,
    pub column_type: u8,
    pub flags: u16,
    pub decimals: u8,
}

impl ColumnDefinitionPacket {
    /// Definition for a typed catalog column.
    pub fn from_column(schema: &str, table: &str, column: &ColumnInfo) -> Self {
        let wire_type = mysql_type_of(&column.data_type);
        ColumnDefinitionPacket {
            schema: schema.to_string(),
            table: table.to_string(),
            name: column.name.clone(),
            character_set: if column.data_type == DataType::Blob {
                BINARY_CHARSET
            } else {
                UTF8_MB4_CHARSET
            },
            column_length: default_display_length(&column.data_type),
            column_type: wire_type as u8,
            flags: column_flags(column),
            decimals: if column.data_type.is_numeric() && !column.data_type.is_integer() {
                0x1f
            } else {
                0
            },
        }
    }

    /// Definition for a computed column with no catalog backing.
    pub fn computed(schema: &str, name: &str, data_type: &DataType) -> Self {
        ColumnDefinitionPacket {
            schema: schema.to_string(),
            table: String::new(),
            name: name.to_string(),
            character_set: UTF8_MB4_CHARSET,
            column_length: default_display_length(data_type),
            column_type: mysql_type_of(data_type) as u8,
            flags: 0,
            decimals: 0,
        }
    }

    pub fn serialize(&self) -> CResult<Vec<u8>> {
        let mut out = Vec::with_capacity(64);
        write_len_enc_str(&mut out, "def");
        write_len_enc_str(&mut out, &self.schema);
        write_len_enc_str(&mut out, &self.table);
        write_len_enc_str(&mut out, &self.table); // org_table
        write_len_enc_str(&mut out, &self.name);
        write_len_enc_str(&mut out, &self.name); // org_name
        out.push(0x0c); // fixed-length fields below
        out.write_u16::<LittleEndian>(self.character_set)?;
        out.write_u32::<LittleEndian>(self.column_length)?;
        out.push(self.column_type);
        out.write_u16::<LittleEndian>(self.flags)?;
        out.push(self.decimals);
        out.extend_from_slice(&[0, 0]); // filler
        Ok(out)
    }

    pub fn parse(packet: &[u8]) -> CResult<Self> {
        let mut cursor = Cursor::new(packet);
        let _catalog = read_len_enc_str(&mut cursor)?;
        let schema = read_len_enc_str(&mut cursor)?;
        let table = read_len_enc_str(&mut cursor)?;
        let _org_table = read_len_enc_str(&mut cursor)?;
        let name = read_len_enc_str(&mut cursor)?;
        let _org_name = read_len_enc_str(&mut cursor)?;
        let _fixed_len = read_len_enc_num(&mut cursor)?;
        let character_set = cursor.read_u16::<LittleEndian>()?;
        let column_length = cursor.read_u32::<LittleEndian>()?;
        let column_type = cursor.read_u8()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let decimals = cursor.read_u8()?;
        Ok(ColumnDefinitionPacket {
            schema,
            table,
            name,
            character_set,
            column_length,
            column_type,
            flags,
            decimals,
        })
    }
}

fn default_display_length(data_type: &DataType) -> u32 {
    match data_type {
        DataType::TinyInt | DataType::UTinyInt | DataType::Boolean => 4,
        DataType::SmallInt | DataType::USmallInt => 6,
        DataType::Int | DataType::UInt => 11,
        DataType::BigInt | DataType::UBigInt => 20,
        DataType::Float => 12,
        DataType::Double => 22,
        DataType::Date => 10,
        DataType::Time => 10,
        DataType::DateTime | DataType::Timestamp => 19,
        DataType::Varchar => 1024,
        DataType::Blob => 65_535,
    }
}

/// Guess the wire type of a computed column from its first non-null value.
pub fn infer_data_type(values: impl Iterator<Item = DataType>) -> DataType {
    for dt in values {
        return dt;
    }
    DataType::Varchar
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn round_trip() {
        let column = ColumnInfo::new("id", DataType::Int).primary().auto_increment();
        let def = ColumnDefinitionPacket::from_column("main", "users", &column);
        let decoded = ColumnDefinitionPacket::parse(&def.serialize().unwrap()).unwrap();
        assert_eq!(decoded, def);
        assert_eq!(decoded.column_type, MysqlColumnType::Long as u8);
    }
}
