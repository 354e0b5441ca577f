use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use common::err::{CResult, EngineError};
use common::value::Value;

use crate::declar::response_type::ResponseType;
use crate::packet::len_enc::{
    read_len_enc_str_allow_null, write_len_enc_num, write_len_enc_str,
};

/// Text protocol row: each cell a length-encoded string, null as 0xFB.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSetRowPacket {
    pub cells: Vec<Option<String>>,
}

impl ResultSetRowPacket {
    pub fn from_values(values: &[Value]) -> Self {
        ResultSetRowPacket {
            cells: values.iter().map(|v| v.to_text()).collect(),
        }
    }

    pub fn serialize(&self) -> CResult<Vec<u8>> {
        let mut out = Vec::with_capacity(self.cells.len() * 8);
        for cell in &self.cells {
            match cell {
                None => out.push(ResponseType::NULL_VALUE),
                Some(text) => write_len_enc_str(&mut out, text),
            }
        }
        Ok(out)
    }

    pub fn parse(packet: &[u8]) -> CResult<Self> {
        let mut cursor = Cursor::new(packet);
        let len = cursor.get_ref().len() as u64;
        let mut cells = Vec::new();
        while cursor.position() < len {
            cells.push(read_len_enc_str_allow_null(&mut cursor)?);
        }
        Ok(Self { cells })
    }
}

/// Binary protocol row (COM_STMT_EXECUTE responses): 0x00 header, a null
/// bitmap with 2 bits of offset, then type-specific little-endian values.
pub fn serialize_binary_row(values: &[Value]) -> CResult<Vec<u8>> {
    let mut out = Vec::with_capacity(values.len() * 8 + 4);
    out.push(0x00);
    let bitmap_len = (values.len() + 7 + 2) / 8;
    let bitmap_start = out.len();
    out.extend(std::iter::repeat(0u8).take(bitmap_len));
    for (i, value) in values.iter().enumerate() {
        if value.is_null() {
            let bit = i + 2;
            out[bitmap_start + bit / 8] |= 1 << (bit % 8);
            continue;
        }
        match value {
            Value::TinyInt(v) => out.push(*v as u8),
            Value::UTinyInt(v) => out.push(*v),
            Value::Bool(b) => out.push(*b as u8),
            Value::SmallInt(v) => out.write_i16::<LittleEndian>(*v)?,
            Value::USmallInt(v) => out.write_u16::<LittleEndian>(*v)?,
            Value::Int(v) => out.write_i32::<LittleEndian>(*v)?,
            Value::UInt(v) => out.write_u32::<LittleEndian>(*v)?,
            Value::BigInt(v) => out.write_i64::<LittleEndian>(*v)?,
            Value::UBigInt(v) => out.write_u64::<LittleEndian>(*v)?,
            Value::Float(v) => out.write_f32::<LittleEndian>(*v)?,
            Value::Double(v) => out.write_f64::<LittleEndian>(*v)?,
            other => {
                // temporal and text values travel as length-encoded strings
                write_len_enc_str(&mut out, &other.to_string());
            }
        }
    }
    Ok(out)
}

/// Decode COM_STMT_EXECUTE parameters: null bitmap (no offset), the
/// new-params-bound flag, per-parameter type codes, then the values.
pub fn parse_binary_params(payload: &[u8], param_count: usize) -> CResult<Vec<Value>> {
    if param_count == 0 {
        return Ok(Vec::new());
    }
    let mut cursor = Cursor::new(payload);
    let bitmap_len = (param_count + 7) / 8;
    let mut bitmap = vec![0u8; bitmap_len];
    cursor.read_exact(&mut bitmap)?;
    let new_params_bound = cursor.read_u8()?;
    let mut types = Vec::with_capacity(param_count);
    if new_params_bound == 1 {
        for _ in 0..param_count {
            let type_code = cursor.read_u8()?;
            let flags = cursor.read_u8()?;
            types.push((type_code, flags & 0x80 != 0));
        }
    } else {
        return Err(EngineError::Protocol(
            "rebound prepared parameters without type block".to_string(),
        ));
    }

    let mut values = Vec::with_capacity(param_count);
    for (i, (type_code, unsigned)) in types.iter().enumerate() {
        if bitmap[i / 8] & (1 << (i % 8)) != 0 {
            values.push(Value::Null);
            continue;
        }
        let value = match type_code {
            0x01 => {
                let v = cursor.read_u8()?;
                if *unsigned {
                    Value::UTinyInt(v)
                } else {
                    Value::TinyInt(v as i8)
                }
            }
            0x02 => {
                if *unsigned {
                    Value::USmallInt(cursor.read_u16::<LittleEndian>()?)
                } else {
                    Value::SmallInt(cursor.read_i16::<LittleEndian>()?)
                }
            }
            0x03 | 0x09 => {
                if *unsigned {
                    Value::UInt(cursor.read_u32::<LittleEndian>()?)
                } else {
                    Value::Int(cursor.read_i32::<LittleEndian>()?)
                }
            }
            0x08 => {
                if *unsigned {
                    Value::UBigInt(cursor.read_u64::<LittleEndian>()?)
                } else {
                    Value::BigInt(cursor.read_i64::<LittleEndian>()?)
                }
            }
            0x04 => Value::Float(cursor.read_f32::<LittleEndian>()?),
            0x05 => Value::Double(cursor.read_f64::<LittleEndian>()?),
            0x06 => Value::Null,
            // strings, decimals, temporals: read as length-encoded text
            _ => {
                let slice_cursor_pos = cursor.position() as usize;
                let remaining = &cursor.get_ref()[slice_cursor_pos..];
                let mut inner = Cursor::new(remaining);
                let text = crate::packet::len_enc::read_len_enc_str(&mut inner)?;
                cursor.set_position((slice_cursor_pos + inner.position() as usize) as u64);
                Value::String(text)
            }
        };
        values.push(value);
    }
    Ok(values)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn text_row_round_trip() {
        let row = ResultSetRowPacket::from_values(&[
            Value::Int(3),
            Value::Null,
            Value::String("abc".into()),
        ]);
        let decoded = ResultSetRowPacket::parse(&row.serialize().unwrap()).unwrap();
        assert_eq!(
            decoded.cells,
            vec![Some("3".to_string()), None, Some("abc".to_string())]
        );
    }

    #[test]
    fn binary_row_null_bitmap() {
        let out = serialize_binary_row(&[Value::Null, Value::Int(7)]).unwrap();
        assert_eq!(out[0], 0x00);
        // first value null: bit 2 of the bitmap byte
        assert_eq!(out[1] & 0b0000_0100, 0b0000_0100);
        assert_eq!(&out[2..6], &7i32.to_le_bytes());
    }

    #[test]
    fn binary_params_round_trip() {
        // one INT param, value 5
        let mut payload = Vec::new();
        payload.push(0x00); // null bitmap
        payload.push(0x01); // new params bound
        payload.push(0x03); // MYSQL_TYPE_LONG
        payload.push(0x00);
        payload.extend_from_slice(&5i32.to_le_bytes());
        let values = parse_binary_params(&payload, 1).unwrap();
        assert_eq!(values, vec![Value::Int(5)]);
    }

    #[test]
    fn binary_params_null() {
        let mut payload = Vec::new();
        payload.push(0x01); // first param null
        payload.push(0x01);
        payload.push(0x06); // MYSQL_TYPE_NULL
        payload.push(0x00);
        let values = parse_binary_params(&payload, 1).unwrap();
        assert_eq!(values, vec![Value::Null]);
    }
}
