use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use common::err::CResult;

/// COM_STMT_PREPARE OK response header: `{0x00, stmt id (4), columns (2),
/// params (2), filler, warnings (2)}`, followed by parameter and column
/// definition blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct StmtPrepareOkPacket {
    pub statement_id: u32,
    pub num_columns: u16,
    pub num_params: u16,
    pub warnings: u16,
}

impl StmtPrepareOkPacket {
    pub fn serialize(&self) -> CResult<Vec<u8>> {
        let mut out = Vec::with_capacity(12);
        out.push(0x00);
        out.write_u32::<LittleEndian>(self.statement_id)?;
        out.write_u16::<LittleEndian>(self.num_columns)?;
        out.write_u16::<LittleEndian>(self.num_params)?;
        out.push(0x00);
        out.write_u16::<LittleEndian>(self.warnings)?;
        Ok(out)
    }

    pub fn parse(packet: &[u8]) -> CResult<Self> {
        let mut cursor = Cursor::new(packet);
        let _header = cursor.read_u8()?;
        let statement_id = cursor.read_u32::<LittleEndian>()?;
        let num_columns = cursor.read_u16::<LittleEndian>()?;
        let num_params = cursor.read_u16::<LittleEndian>()?;
        let _filler = cursor.read_u8()?;
        let warnings = cursor.read_u16::<LittleEndian>()?;
        Ok(StmtPrepareOkPacket {
            statement_id,
            num_columns,
            num_params,
            warnings,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip() {
        let packet = StmtPrepareOkPacket {
            statement_id: 3,
            num_columns: 2,
            num_params: 1,
            warnings: 0,
        };
        assert_eq!(
            StmtPrepareOkPacket::parse(&packet.serialize().unwrap()).unwrap(),
            packet
        );
    }
}
