use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use common::err::CResult;

use crate::declar::response_type::ResponseType;
use crate::declar::status_flags::StatusFlags;

/// EOF packet: `{0xFE, warnings (2), status (2)}`. Terminates the column
/// definition block and the row stream.
#[derive(Debug)]
pub struct EndOfFilePacket {
    pub warnings: u16,
    pub status_flags: StatusFlags,
}

impl EndOfFilePacket {
    pub fn new(status_flags: StatusFlags) -> Self {
        EndOfFilePacket {
            warnings: 0,
            status_flags,
        }
    }

    pub fn serialize(&self) -> CResult<Vec<u8>> {
        let mut out = Vec::with_capacity(5);
        out.push(ResponseType::EOF);
        out.write_u16::<LittleEndian>(self.warnings)?;
        out.write_u16::<LittleEndian>(self.status_flags.value())?;
        Ok(out)
    }

    pub fn parse(packet: &[u8]) -> CResult<Self> {
        let mut cursor = Cursor::new(packet);
        let _header = cursor.read_u8()?;
        let warnings = cursor.read_u16::<LittleEndian>()?;
        let status = cursor.read_u16::<LittleEndian>()?;
        Ok(EndOfFilePacket {
            warnings,
            status_flags: StatusFlags::new(status),
        })
    }
}
