use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use common::err::{CResult, EngineError};

use crate::declar::response_type::ResponseType;

/// ERR packet: `{0xFF, code (2), '#', sqlstate (5), message}`.
#[derive(Debug)]
pub struct ErrorPacket {
    pub code: u16,
    pub sql_state: String,
    pub message: String,
}

impl ErrorPacket {
    pub fn from_error(err: &EngineError) -> Self {
        ErrorPacket {
            code: err.mysql_code(),
            sql_state: err.sql_state().to_string(),
            message: err.to_string(),
        }
    }

    pub fn serialize(&self) -> CResult<Vec<u8>> {
        let mut out = Vec::with_capacity(16 + self.message.len());
        out.push(ResponseType::ERROR);
        out.write_u16::<LittleEndian>(self.code)?;
        out.push(b'#');
        let state = if self.sql_state.len() == 5 {
            self.sql_state.as_bytes()
        } else {
            b"HY000"
        };
        out.extend_from_slice(state);
        out.extend_from_slice(self.message.as_bytes());
        Ok(out)
    }

    pub fn parse(packet: &[u8]) -> CResult<Self> {
        let mut cursor = Cursor::new(packet);
        let _header = cursor.read_u8()?;
        let code = cursor.read_u16::<LittleEndian>()?;
        let marker = cursor.read_u8()?;
        let sql_state = if marker == b'#' {
            let mut state = [0u8; 5];
            cursor.read_exact(&mut state)?;
            String::from_utf8_lossy(&state).to_string()
        } else {
            cursor.set_position(cursor.position() - 1);
            String::new()
        };
        let mut message = String::new();
        cursor.read_to_string(&mut message)?;
        Ok(ErrorPacket {
            code,
            sql_state,
            message,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_from_engine_error() {
        let err = EngineError::TableNotFound("users".to_string());
        let packet = ErrorPacket::from_error(&err);
        let decoded = ErrorPacket::parse(&packet.serialize().unwrap()).unwrap();
        assert_eq!(decoded.code, 1146);
        assert_eq!(decoded.sql_state, "42S02");
        assert!(decoded.message.contains("users"));
    }
}
