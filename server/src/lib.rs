pub mod auth;
pub mod conn;
pub mod declar;
pub mod packet;
pub mod server;
pub mod session;

/// Version string advertised in the handshake. Clients key feature checks
/// off the leading MySQL version.
pub const SERVER_VERSION: &str = "8.0.32-rsql-0.1";

pub const NULL_TERMINATOR: u8 = 0x00;

/// 3 byte length + 1 byte sequence id.
pub const PACKET_HEADER_SIZE: usize = 4;

pub const UTF8_MB4_GENERAL_CI: u8 = 45;

pub use server::MySqlServer;
pub use session::{Session, SourceSet, StatementOutcome};
