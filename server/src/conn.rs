use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::{debug, warn};

use common::datasource::QueryResult;
use common::err::{CResult, EngineError};
use common::schema::DataType;
use common::value::Value;

use crate::auth;
use crate::declar::capability_flags::CapabilityFlags;
use crate::declar::command_type::CommandType;
use crate::declar::status_flags::{session_status, StatusFlags};
use crate::packet::column_packet::ColumnDefinitionPacket;
use crate::packet::end_of_file_packet::EndOfFilePacket;
use crate::packet::error_packet::ErrorPacket;
use crate::packet::handshake_packet::{HandshakeResponse41, HandshakeV10};
use crate::packet::len_enc::write_len_enc_num;
use crate::packet::ok_packet::OkPacket;
use crate::packet::packet_channel::PacketChannel;
use crate::packet::prepare_packet::StmtPrepareOkPacket;
use crate::packet::result_set_row_packet::{
    parse_binary_params, serialize_binary_row, ResultSetRowPacket,
};
use crate::session::{Session, StatementOutcome};
use crate::{SERVER_VERSION, UTF8_MB4_GENERAL_CI};

/// Drives one connection through the protocol state machine: handshake,
/// auth, then the command cycle until COM_QUIT or a fatal framing error.
pub struct ConnectionHandler<S: Read + Write> {
    channel: PacketChannel<S>,
    session: Session,
    user: String,
    password: String,
}

impl<S: Read + Write> ConnectionHandler<S> {
    pub fn new(stream: S, session: Session, user: &str, password: &str) -> Self {
        ConnectionHandler {
            channel: PacketChannel::new(stream),
            session,
            user: user.to_string(),
            password: password.to_string(),
        }
    }

    pub fn run(mut self) -> CResult<()> {
        // session teardown (transaction abort) runs in Session::drop
        self.run_inner()
    }

    fn run_inner(&mut self) -> CResult<()> {
        if !self.handshake()? {
            return Ok(());
        }
        loop {
            let (payload, seq) = match self.channel.read_packet() {
                Ok(packet) => packet,
                // the peer hanging up between commands is a normal exit
                Err(EngineError::Io(_)) => return Ok(()),
                Err(err) => return Err(err),
            };
            // each command restarts the sequence
            if seq != 0 {
                return Err(EngineError::Protocol(format!(
                    "command packet carries sequence id {}, expected 0",
                    seq
                )));
            }
            let Some(&command_byte) = payload.first() else {
                return Err(EngineError::Protocol("empty command packet".to_string()));
            };
            match CommandType::from_u8(command_byte) {
                Some(CommandType::Quit) => {
                    debug!("session {} quit", self.session.id);
                    return Ok(());
                }
                Some(CommandType::Ping) => self.send_ok(1, 0)?,
                Some(CommandType::InitDb) => {
                    let database = String::from_utf8_lossy(&payload[1..]).to_string();
                    let outcome = self.session.execute(&format!("USE {}", database));
                    self.respond(outcome, false)?;
                }
                Some(CommandType::Query) => {
                    let sql = String::from_utf8_lossy(&payload[1..]).to_string();
                    let outcome = self.session.execute(&sql);
                    self.respond(outcome, false)?;
                }
                Some(CommandType::StmtPrepare) => {
                    let sql = String::from_utf8_lossy(&payload[1..]).to_string();
                    match self.session.prepare(&sql) {
                        Ok((id, statement)) => self.send_prepare_ok(id, &statement)?,
                        Err(err) => self.send_error(1, &err)?,
                    }
                }
                Some(CommandType::StmtExecute) => {
                    let outcome = self.execute_prepared(&payload);
                    self.respond(outcome, true)?;
                }
                Some(CommandType::StmtClose) => {
                    // no response by protocol definition
                    if payload.len() >= 5 {
                        let stmt_id = (&payload[1..5]).read_u32::<LittleEndian>()?;
                        self.session.close_prepared(stmt_id);
                    }
                }
                Some(CommandType::StmtReset) => self.send_ok(1, 0)?,
                Some(CommandType::FieldList) => {
                    // minimal answer: no fields, then EOF
                    let eof = EndOfFilePacket::new(self.status());
                    self.channel.write_packet(&eof.serialize()?, 1)?;
                }
                Some(CommandType::StmtSendLongData) | None => {
                    let err = EngineError::Unsupported(format!(
                        "command 0x{:02x}",
                        command_byte
                    ));
                    self.send_error(1, &err)?;
                }
            }
        }
    }

    /// Server greeting (seq 0), client response (seq 1), verdict (seq 2).
    fn handshake(&mut self) -> CResult<bool> {
        let scramble = auth::generate_scramble();
        let greeting = HandshakeV10::new(
            SERVER_VERSION,
            self.session.id as u32,
            scramble.clone(),
            CapabilityFlags::server_default().value(),
            UTF8_MB4_GENERAL_CI,
            self.status().value(),
        );
        self.channel.write_packet(&greeting.serialize()?, 0)?;

        let (payload, seq) = self.channel.read_packet()?;
        if seq != 1 {
            return Err(EngineError::Protocol(format!(
                "handshake response carries sequence id {}, expected 1",
                seq
            )));
        }
        let response = HandshakeResponse41::parse(&payload)?;

        let authenticated = response.username == self.user
            && auth::verify_native_password(&self.password, &scramble, &response.auth_response);
        if !authenticated {
            warn!("access denied for user '{}'", response.username);
            let err = ErrorPacket {
                code: 1045,
                sql_state: "28000".to_string(),
                message: format!("Access denied for user '{}'", response.username),
            };
            self.channel.write_packet(&err.serialize()?, 2)?;
            return Ok(false);
        }

        if let Some(database) = &response.database {
            if let Err(err) = self.session.execute(&format!("USE {}", database)) {
                self.send_error(2, &err)?;
                return Ok(false);
            }
        }

        self.send_ok(2, 0)?;
        debug!("session {} authenticated as '{}'", self.session.id, self.user);
        Ok(true)
    }

    fn status(&self) -> StatusFlags {
        session_status(self.session.autocommit, self.session.in_transaction())
    }

    fn respond(&mut self, outcome: CResult<StatementOutcome>, binary: bool) -> CResult<()> {
        match outcome {
            Ok(StatementOutcome::Rows(result)) => self.send_result_set(&result, binary),
            Ok(StatementOutcome::Ok {
                affected,
                last_insert_id,
            }) => {
                let ok = OkPacket::new(affected, last_insert_id, self.status());
                self.channel.write_packet(&ok.serialize()?, 1)
            }
            Err(err) if err.is_connection_fatal() => Err(err),
            Err(err) => self.send_error(1, &err),
        }
    }

    fn send_ok(&mut self, seq: u8, affected: u64) -> CResult<()> {
        let ok = OkPacket::new(affected, 0, self.status());
        self.channel.write_packet(&ok.serialize()?, seq)
    }

    fn send_error(&mut self, seq: u8, err: &EngineError) -> CResult<()> {
        debug!("session {} statement failed: {}", self.session.id, err);
        let packet = ErrorPacket::from_error(err);
        self.channel.write_packet(&packet.serialize()?, seq)
    }

    /// Column count, column definitions, EOF, row packets, trailing EOF.
    fn send_result_set(&mut self, result: &QueryResult, binary: bool) -> CResult<()> {
        let mut seq = 1u8;
        let types = infer_column_types(result);

        let mut count_packet = Vec::new();
        write_len_enc_num(&mut count_packet, result.columns.len() as u64);
        self.channel.write_packet(&count_packet, seq)?;
        seq = seq.wrapping_add(1);

        for (name, data_type) in result.columns.iter().zip(&types) {
            let def =
                ColumnDefinitionPacket::computed(&self.session.current_db, name, data_type);
            self.channel.write_packet(&def.serialize()?, seq)?;
            seq = seq.wrapping_add(1);
        }

        let eof = EndOfFilePacket::new(self.status());
        self.channel.write_packet(&eof.serialize()?, seq)?;
        seq = seq.wrapping_add(1);

        for row in &result.rows {
            let values: Vec<Value> = result
                .columns
                .iter()
                .map(|column| row.value(column))
                .collect();
            let payload = if binary {
                let coerced: CResult<Vec<Value>> = values
                    .iter()
                    .zip(&types)
                    .map(|(value, data_type)| {
                        if value.is_null() {
                            Ok(Value::Null)
                        } else {
                            value.coerce_to(data_type)
                        }
                    })
                    .collect();
                serialize_binary_row(&coerced?)?
            } else {
                ResultSetRowPacket::from_values(&values).serialize()?
            };
            self.channel.write_packet(&payload, seq)?;
            seq = seq.wrapping_add(1);
        }

        let trailer = EndOfFilePacket::new(self.status());
        self.channel.write_packet(&trailer.serialize()?, seq)
    }

    fn send_prepare_ok(
        &mut self,
        id: u32,
        statement: &crate::session::PreparedStatement,
    ) -> CResult<()> {
        let header = StmtPrepareOkPacket {
            statement_id: id,
            num_columns: 0,
            num_params: statement.param_count as u16,
            warnings: 0,
        };
        let mut seq = 1u8;
        self.channel.write_packet(&header.serialize()?, seq)?;
        seq = seq.wrapping_add(1);
        if statement.param_count > 0 {
            for _ in 0..statement.param_count {
                let def = ColumnDefinitionPacket::computed("", "?", &DataType::Varchar);
                self.channel.write_packet(&def.serialize()?, seq)?;
                seq = seq.wrapping_add(1);
            }
            let eof = EndOfFilePacket::new(self.status());
            self.channel.write_packet(&eof.serialize()?, seq)?;
        }
        Ok(())
    }

    fn execute_prepared(&mut self, payload: &[u8]) -> CResult<StatementOutcome> {
        if payload.len() < 10 {
            return Err(EngineError::Protocol(
                "COM_STMT_EXECUTE payload too short".to_string(),
            ));
        }
        let stmt_id = (&payload[1..5]).read_u32::<LittleEndian>()?;
        // flags (1) + iteration count (4) precede the parameter block
        let params_payload = &payload[10..];
        let param_count = self.session.prepared(stmt_id)?.param_count;
        let params = parse_binary_params(params_payload, param_count)?;
        self.session.execute_prepared(stmt_id, params)
    }
}

/// Per-column wire type, widened across the rows actually present.
fn infer_column_types(result: &QueryResult) -> Vec<DataType> {
    result
        .columns
        .iter()
        .map(|column| {
            let mut inferred: Option<DataType> = None;
            for row in &result.rows {
                let Some(value) = row.get(column) else { continue };
                if value.is_null() {
                    continue;
                }
                let tag = value.data_type();
                inferred = Some(match inferred {
                    None => tag,
                    Some(current) if current == tag => current,
                    Some(current) if current.is_integer() && tag.is_integer() => DataType::BigInt,
                    Some(current) if current.is_numeric() && tag.is_numeric() => DataType::Double,
                    _ => DataType::Varchar,
                });
            }
            inferred.unwrap_or(DataType::Varchar)
        })
        .collect()
}

#[cfg(test)]
mod test {
    use common::row::Row;

    use super::*;

    #[test]
    fn column_type_inference_widens() {
        let result = QueryResult::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                Row::from_pairs([
                    ("a", Value::Int(1)),
                    ("b", Value::Int(1)),
                    ("c", Value::Null),
                ]),
                Row::from_pairs([
                    ("a", Value::BigInt(5)),
                    ("b", Value::Double(0.5)),
                    ("c", Value::Null),
                ]),
            ],
        );
        let types = infer_column_types(&result);
        assert_eq!(types[0], DataType::BigInt);
        assert_eq!(types[1], DataType::Double);
        assert_eq!(types[2], DataType::Varchar);
    }
}
