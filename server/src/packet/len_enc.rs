use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Buf;

use common::err::{CResult, EngineError};

/// Length-encoded integer:
/// `< 0xFB` one byte, `0xFC` + 2 bytes, `0xFD` + 3 bytes, `0xFE` + 8 bytes.
pub fn read_len_enc_num(cursor: &mut Cursor<&[u8]>) -> CResult<u64> {
    let lead = cursor.read_u8()?;
    Ok(match lead {
        0x00..=0xFA => lead as u64,
        0xFC => cursor.read_u16::<LittleEndian>()? as u64,
        0xFD => cursor.read_u24::<LittleEndian>()? as u64,
        0xFE => cursor.read_u64::<LittleEndian>()?,
        other => {
            return Err(EngineError::Protocol(format!(
                "invalid length-encoded integer lead byte 0x{:02x}",
                other
            )))
        }
    })
}

pub fn write_len_enc_num(out: &mut Vec<u8>, value: u64) {
    if value < 251 {
        out.push(value as u8);
    } else if value < (1 << 16) {
        out.push(0xFC);
        let _ = out.write_u16::<LittleEndian>(value as u16);
    } else if value < (1 << 24) {
        out.push(0xFD);
        let _ = out.write_u24::<LittleEndian>(value as u32);
    } else {
        out.push(0xFE);
        let _ = out.write_u64::<LittleEndian>(value);
    }
}

pub fn read_len_enc_str(cursor: &mut Cursor<&[u8]>) -> CResult<String> {
    let bytes = read_len_enc_bytes(cursor)?;
    Ok(String::from_utf8(bytes)?)
}

pub fn read_len_enc_bytes(cursor: &mut Cursor<&[u8]>) -> CResult<Vec<u8>> {
    let len = read_len_enc_num(cursor)? as usize;
    if cursor.remaining() < len {
        return Err(EngineError::Protocol(format!(
            "length-encoded payload truncated: need {}, have {}",
            len,
            cursor.remaining()
        )));
    }
    let mut buffer = vec![0u8; len];
    cursor.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Text-protocol cell: 0xFB stands for null.
pub fn read_len_enc_str_allow_null(cursor: &mut Cursor<&[u8]>) -> CResult<Option<String>> {
    if cursor.remaining() == 0 {
        return Err(EngineError::Protocol("empty cell".to_string()));
    }
    let lead = cursor.get_ref()[cursor.position() as usize];
    if lead == 0xFB {
        cursor.read_u8()?;
        return Ok(None);
    }
    Ok(Some(read_len_enc_str(cursor)?))
}

pub fn write_len_enc_str(out: &mut Vec<u8>, value: &str) {
    write_len_enc_num(out, value.len() as u64);
    out.extend_from_slice(value.as_bytes());
}

pub fn write_null_term_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(value.as_bytes());
    out.push(crate::NULL_TERMINATOR);
}

pub fn read_null_term_string(cursor: &mut Cursor<&[u8]>) -> CResult<String> {
    let mut bytes = Vec::new();
    loop {
        let b = cursor.read_u8()?;
        if b == crate::NULL_TERMINATOR {
            break;
        }
        bytes.push(b);
    }
    Ok(String::from_utf8(bytes)?)
}
