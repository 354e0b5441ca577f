use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use common::err::{CResult, EngineError};

use crate::PACKET_HEADER_SIZE;

/// Packets above this payload size would need the continuation framing,
/// which this server does not speak.
const MAX_PAYLOAD: usize = 0x00FF_FFFF - 1;

/// Packet framing over any byte stream: 3-byte little-endian payload
/// length plus a 1-byte sequence id. The caller owns the sequence-id
/// discipline; this layer only moves frames.
#[derive(Debug)]
pub struct PacketChannel<S: Read + Write> {
    stream: S,
}

impl<S: Read + Write> PacketChannel<S> {
    pub fn new(stream: S) -> Self {
        PacketChannel { stream }
    }

    pub fn read_packet(&mut self) -> CResult<(Vec<u8>, u8)> {
        let mut header_buffer = [0; PACKET_HEADER_SIZE];
        self.stream.read_exact(&mut header_buffer)?;
        let packet_size = (&header_buffer[0..3]).read_u24::<LittleEndian>()?;
        let seq_num = header_buffer[3];

        let mut packet: Vec<u8> = vec![0; packet_size as usize];
        self.stream.read_exact(&mut packet)?;

        Ok((packet, seq_num))
    }

    pub fn write_packet(&mut self, packet: &[u8], seq_num: u8) -> CResult<()> {
        if packet.len() > MAX_PAYLOAD {
            return Err(EngineError::Protocol(format!(
                "payload of {} bytes exceeds the single-packet maximum",
                packet.len()
            )));
        }
        self.stream.write_u24::<LittleEndian>(packet.len() as u32)?;
        self.stream.write_u8(seq_num)?;
        self.stream.write_all(packet)?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}
