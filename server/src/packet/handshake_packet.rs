use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Buf;

use common::err::{CResult, EngineError};

use crate::declar::capability_flags::{
    CLIENT_CONNECT_WITH_DB, CLIENT_PLUGIN_AUTH, CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA,
    CLIENT_PROTOCOL_41, CLIENT_SECURE_CONNECTION,
};
use crate::packet::len_enc::{read_len_enc_bytes, read_null_term_string, write_null_term_string};

pub const NATIVE_PASSWORD_PLUGIN: &str = "mysql_native_password";

/// Initial handshake (protocol version 10), server → client.
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeV10 {
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    /// 20 byte scramble, split 8 + 12 on the wire.
    pub scramble: Vec<u8>,
    pub capabilities: u32,
    pub character_set: u8,
    pub status_flags: u16,
}

impl HandshakeV10 {
    pub fn new(
        server_version: &str,
        connection_id: u32,
        scramble: Vec<u8>,
        capabilities: u32,
        character_set: u8,
        status_flags: u16,
    ) -> Self {
        HandshakeV10 {
            protocol_version: 10,
            server_version: server_version.to_string(),
            connection_id,
            scramble,
            capabilities,
            character_set,
            status_flags,
        }
    }

    pub fn serialize(&self) -> CResult<Vec<u8>> {
        let mut out = Vec::with_capacity(96);
        out.push(self.protocol_version);
        write_null_term_string(&mut out, &self.server_version);
        out.write_u32::<LittleEndian>(self.connection_id)?;
        out.extend_from_slice(&self.scramble[..8]);
        out.push(0); // filler
        out.write_u16::<LittleEndian>((self.capabilities & 0xFFFF) as u16)?;
        out.push(self.character_set);
        out.write_u16::<LittleEndian>(self.status_flags)?;
        out.write_u16::<LittleEndian>((self.capabilities >> 16) as u16)?;
        // auth plugin data length, then 10 reserved bytes
        out.push((self.scramble.len() + 1) as u8);
        out.extend_from_slice(&[0u8; 10]);
        out.extend_from_slice(&self.scramble[8..]);
        out.push(0);
        write_null_term_string(&mut out, NATIVE_PASSWORD_PLUGIN);
        Ok(out)
    }

    pub fn parse(packet: &[u8]) -> CResult<Self> {
        let mut cursor = Cursor::new(packet);
        let protocol_version = cursor.read_u8()?;
        let server_version = read_null_term_string(&mut cursor)?;
        let connection_id = cursor.read_u32::<LittleEndian>()?;
        let mut scramble = vec![0u8; 8];
        std::io::Read::read_exact(&mut cursor, &mut scramble)?;
        cursor.read_u8()?; // filler
        let cap_low = cursor.read_u16::<LittleEndian>()? as u32;
        let character_set = cursor.read_u8()?;
        let status_flags = cursor.read_u16::<LittleEndian>()?;
        let cap_high = cursor.read_u16::<LittleEndian>()? as u32;
        let auth_data_len = cursor.read_u8()? as usize;
        let mut reserved = [0u8; 10];
        std::io::Read::read_exact(&mut cursor, &mut reserved)?;
        let rest_len = auth_data_len.saturating_sub(9).max(12);
        let mut rest = vec![0u8; rest_len];
        std::io::Read::read_exact(&mut cursor, &mut rest)?;
        scramble.extend_from_slice(&rest);
        Ok(HandshakeV10 {
            protocol_version,
            server_version,
            connection_id,
            scramble,
            capabilities: cap_low | (cap_high << 16),
            character_set,
            status_flags,
        })
    }
}

/// Handshake response, client → server (4.1 form).
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeResponse41 {
    pub capabilities: u32,
    pub max_packet_size: u32,
    pub character_set: u8,
    pub username: String,
    pub auth_response: Vec<u8>,
    pub database: Option<String>,
    pub auth_plugin: Option<String>,
}

impl HandshakeResponse41 {
    pub fn parse(packet: &[u8]) -> CResult<Self> {
        let mut cursor = Cursor::new(packet);
        let capabilities = cursor.read_u32::<LittleEndian>()?;
        if capabilities & CLIENT_PROTOCOL_41 == 0 {
            return Err(EngineError::Protocol(
                "client does not speak protocol 4.1".to_string(),
            ));
        }
        let max_packet_size = cursor.read_u32::<LittleEndian>()?;
        let character_set = cursor.read_u8()?;
        let mut reserved = [0u8; 23];
        std::io::Read::read_exact(&mut cursor, &mut reserved)?;
        let username = read_null_term_string(&mut cursor)?;

        let auth_response = if capabilities & CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA != 0 {
            read_len_enc_bytes(&mut cursor)?
        } else if capabilities & CLIENT_SECURE_CONNECTION != 0 {
            let len = cursor.read_u8()? as usize;
            let mut buffer = vec![0u8; len];
            std::io::Read::read_exact(&mut cursor, &mut buffer)?;
            buffer
        } else {
            let text = read_null_term_string(&mut cursor)?;
            text.into_bytes()
        };

        let database = if capabilities & CLIENT_CONNECT_WITH_DB != 0 && cursor.has_remaining() {
            Some(read_null_term_string(&mut cursor)?)
        } else {
            None
        };
        let auth_plugin = if capabilities & CLIENT_PLUGIN_AUTH != 0 && cursor.has_remaining() {
            Some(read_null_term_string(&mut cursor)?)
        } else {
            None
        };

        Ok(HandshakeResponse41 {
            capabilities,
            max_packet_size,
            character_set,
            username,
            auth_response,
            database,
            auth_plugin,
        })
    }

    pub fn serialize(&self) -> CResult<Vec<u8>> {
        let mut out = Vec::with_capacity(64);
        out.write_u32::<LittleEndian>(self.capabilities)?;
        out.write_u32::<LittleEndian>(self.max_packet_size)?;
        out.push(self.character_set);
        out.extend_from_slice(&[0u8; 23]);
        write_null_term_string(&mut out, &self.username);
        if self.capabilities & CLIENT_SECURE_CONNECTION != 0 {
            out.push(self.auth_response.len() as u8);
            out.extend_from_slice(&self.auth_response);
        } else {
            out.extend_from_slice(&self.auth_response);
            out.push(0);
        }
        if self.capabilities & CLIENT_CONNECT_WITH_DB != 0 {
            if let Some(db) = &self.database {
                write_null_term_string(&mut out, db);
            }
        }
        if self.capabilities & CLIENT_PLUGIN_AUTH != 0 {
            if let Some(plugin) = &self.auth_plugin {
                write_null_term_string(&mut out, plugin);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::declar::capability_flags::CapabilityFlags;

    #[test]
    fn handshake_v10_round_trip() {
        let scramble: Vec<u8> = (1..=20).collect();
        let packet = HandshakeV10::new(
            "8.0.32-test",
            42,
            scramble,
            CapabilityFlags::server_default().value(),
            crate::UTF8_MB4_GENERAL_CI,
            0x0002,
        );
        let decoded = HandshakeV10::parse(&packet.serialize().unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn response_round_trip() {
        let response = HandshakeResponse41 {
            capabilities: CLIENT_PROTOCOL_41
                | CLIENT_SECURE_CONNECTION
                | CLIENT_CONNECT_WITH_DB
                | CLIENT_PLUGIN_AUTH,
            max_packet_size: 1 << 24,
            character_set: crate::UTF8_MB4_GENERAL_CI,
            username: "root".to_string(),
            auth_response: vec![9; 20],
            database: Some("main".to_string()),
            auth_plugin: Some(NATIVE_PASSWORD_PLUGIN.to_string()),
        };
        let decoded = HandshakeResponse41::parse(&response.serialize().unwrap()).unwrap();
        assert_eq!(decoded, response);
    }

    #[test]
    fn pre_41_client_is_rejected() {
        let mut packet = vec![0u8; 32];
        packet[0] = 0x00; // no PROTOCOL_41 bit
        assert!(HandshakeResponse41::parse(&packet).is_err());
    }
}
