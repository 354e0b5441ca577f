/// Client/server capability bits exchanged in the handshake.

pub(crate) const CLIENT_LONG_PASSWORD: u32 = 0x0000_0001;

pub(crate) const CLIENT_FOUND_ROWS: u32 = 0x0000_0002;

pub(crate) const CLIENT_LONG_FLAG: u32 = 0x0000_0004;

/// The handshake response carries an initial database name.
pub(crate) const CLIENT_CONNECT_WITH_DB: u32 = 0x0000_0008;

pub(crate) const CLIENT_IGNORE_SPACE: u32 = 0x0000_0100;

/// 4.1 protocol. Mandatory; pre-4.1 clients are rejected.
pub(crate) const CLIENT_PROTOCOL_41: u32 = 0x0000_0200;

pub(crate) const CLIENT_INTERACTIVE: u32 = 0x0000_0400;

pub(crate) const CLIENT_SSL: u32 = 0x0000_0800;

pub(crate) const CLIENT_TRANSACTIONS: u32 = 0x0000_2000;

/// Auth token is sent length-prefixed instead of null terminated.
pub(crate) const CLIENT_SECURE_CONNECTION: u32 = 0x0000_8000;

pub(crate) const CLIENT_MULTI_STATEMENTS: u32 = 0x0001_0000;

pub(crate) const CLIENT_MULTI_RESULTS: u32 = 0x0002_0000;

/// The handshake response names its auth plugin.
pub(crate) const CLIENT_PLUGIN_AUTH: u32 = 0x0008_0000;

pub(crate) const CLIENT_CONNECT_ATTRS: u32 = 0x0010_0000;

pub(crate) const CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA: u32 = 0x0020_0000;

/// Result sets replace the trailing EOF with an OK packet. Not advertised:
/// this server speaks the classic EOF-terminated form.
pub(crate) const CLIENT_DEPRECATE_EOF: u32 = 0x0100_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityFlags {
    capability_flags: u32,
}

impl CapabilityFlags {
    pub fn new(capability_flags: u32) -> Self {
        CapabilityFlags { capability_flags }
    }

    pub fn empty() -> Self {
        CapabilityFlags::new(0)
    }

    /// The capability set this server advertises.
    pub fn server_default() -> Self {
        CapabilityFlags::new(
            CLIENT_LONG_PASSWORD
                | CLIENT_FOUND_ROWS
                | CLIENT_LONG_FLAG
                | CLIENT_CONNECT_WITH_DB
                | CLIENT_PROTOCOL_41
                | CLIENT_TRANSACTIONS
                | CLIENT_SECURE_CONNECTION
                | CLIENT_MULTI_STATEMENTS
                | CLIENT_MULTI_RESULTS
                | CLIENT_PLUGIN_AUTH,
        )
    }

    pub fn contains(&self, capability_flag: u32) -> bool {
        (self.capability_flags & capability_flag) != 0
    }

    pub fn value(&self) -> u32 {
        self.capability_flags
    }
}
