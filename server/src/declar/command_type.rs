/// First payload byte of a command packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Quit = 0x01,
    InitDb = 0x02,
    Query = 0x03,
    FieldList = 0x04,
    Ping = 0x0e,
    StmtPrepare = 0x16,
    StmtExecute = 0x17,
    StmtSendLongData = 0x18,
    StmtClose = 0x19,
    StmtReset = 0x1a,
}

impl CommandType {
    pub fn from_u8(byte: u8) -> Option<CommandType> {
        Some(match byte {
            0x01 => CommandType::Quit,
            0x02 => CommandType::InitDb,
            0x03 => CommandType::Query,
            0x04 => CommandType::FieldList,
            0x0e => CommandType::Ping,
            0x16 => CommandType::StmtPrepare,
            0x17 => CommandType::StmtExecute,
            0x18 => CommandType::StmtSendLongData,
            0x19 => CommandType::StmtClose,
            0x1a => CommandType::StmtReset,
            _ => return None,
        })
    }
}
