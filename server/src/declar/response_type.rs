/// First payload byte of server response packets.
pub struct ResponseType;

impl ResponseType {
    pub const OK: u8 = 0x00;

    pub const AUTH_PLUGIN_SWITCH: u8 = 0xFE;

    pub const EOF: u8 = 0xFE;

    pub const ERROR: u8 = 0xFF;

    /// Null cell marker in text protocol rows.
    pub const NULL_VALUE: u8 = 0xFB;
}
