use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Buf;

use common::err::CResult;

use crate::declar::response_type::ResponseType;
use crate::declar::status_flags::StatusFlags;
use crate::packet::len_enc::{read_len_enc_num, write_len_enc_num};

/// OK packet: `{0x00, affected (lenenc), last insert id (lenenc),
/// status (2), warnings (2), info}`.
#[derive(Debug)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: StatusFlags,
    pub warnings: u16,
    pub info: String,
}

impl OkPacket {
    pub fn new(affected_rows: u64, last_insert_id: u64, status_flags: StatusFlags) -> Self {
        OkPacket {
            affected_rows,
            last_insert_id,
            status_flags,
            warnings: 0,
            info: String::new(),
        }
    }

    pub fn serialize(&self) -> CResult<Vec<u8>> {
        let mut out = Vec::with_capacity(16);
        out.push(ResponseType::OK);
        write_len_enc_num(&mut out, self.affected_rows);
        write_len_enc_num(&mut out, self.last_insert_id);
        out.write_u16::<LittleEndian>(self.status_flags.value())?;
        out.write_u16::<LittleEndian>(self.warnings)?;
        out.extend_from_slice(self.info.as_bytes());
        Ok(out)
    }

    pub fn parse(packet: &[u8]) -> CResult<Self> {
        let mut cursor = Cursor::new(packet);

        let _header = cursor.read_u8()?;
        let mut affected_rows = 0;
        if cursor.has_remaining() {
            affected_rows = read_len_enc_num(&mut cursor)?;
        }
        let mut last_insert_id = 0;
        if cursor.has_remaining() {
            last_insert_id = read_len_enc_num(&mut cursor)?;
        }
        let mut status = 0u16;
        if cursor.remaining() >= 2 {
            status = cursor.read_u16::<LittleEndian>()?;
        }
        let mut warnings = 0u16;
        if cursor.remaining() >= 2 {
            warnings = cursor.read_u16::<LittleEndian>()?;
        }
        let mut info = String::new();
        cursor.read_to_string(&mut info)?;

        Ok(Self {
            affected_rows,
            last_insert_id,
            status_flags: StatusFlags::new(status),
            warnings,
            info,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip() {
        let ok = OkPacket::new(3, 17, StatusFlags::new(0x0002));
        let decoded = OkPacket::parse(&ok.serialize().unwrap()).unwrap();
        assert_eq!(decoded.affected_rows, 3);
        assert_eq!(decoded.last_insert_id, 17);
        assert_eq!(decoded.status_flags.value(), 0x0002);
        assert_eq!(decoded.warnings, 0);
    }
}
