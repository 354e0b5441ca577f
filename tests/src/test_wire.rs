#[cfg(test)]
mod test_wire {
    use std::net::TcpStream;
    use std::time::Duration;

    use common::config::EngineConfig;
    use common::err::CResult;
    use pretty_assertions::assert_eq;
    use server::declar::capability_flags::CapabilityFlags;
    use server::packet::end_of_file_packet::EndOfFilePacket;
    use server::packet::error_packet::ErrorPacket;
    use server::packet::handshake_packet::{
        HandshakeResponse41, HandshakeV10, NATIVE_PASSWORD_PLUGIN,
    };
    use server::packet::len_enc::read_len_enc_num;
    use server::packet::ok_packet::OkPacket;
    use server::packet::packet_channel::PacketChannel;
    use server::packet::result_set_row_packet::ResultSetRowPacket;
    use server::MySqlServer;

    const TEST_PORT: u16 = 33061;

    /// Minimal text-protocol client speaking to the real listener.
    struct TestClient {
        channel: PacketChannel<TcpStream>,
    }

    impl TestClient {
        fn connect(port: u16) -> CResult<TestClient> {
            let mut last_err = None;
            for _ in 0..50 {
                match TcpStream::connect(("127.0.0.1", port)) {
                    Ok(stream) => {
                        stream.set_read_timeout(Some(Duration::from_secs(5))).ok();
                        let mut client = TestClient {
                            channel: PacketChannel::new(stream),
                        };
                        client.handshake()?;
                        return Ok(client);
                    }
                    Err(err) => {
                        last_err = Some(err);
                        std::thread::sleep(Duration::from_millis(100));
                    }
                }
            }
            Err(last_err.expect("at least one connect attempt").into())
        }

        fn handshake(&mut self) -> CResult<()> {
            let (greeting, seq) = self.channel.read_packet()?;
            assert_eq!(seq, 0);
            let greeting = HandshakeV10::parse(&greeting)?;
            assert_eq!(greeting.protocol_version, 10);
            assert!(greeting.server_version.starts_with("8.0"));

            let response = HandshakeResponse41 {
                capabilities: CapabilityFlags::server_default().value(),
                max_packet_size: 1 << 24,
                character_set: 45,
                username: "root".to_string(),
                // empty password: empty token
                auth_response: Vec::new(),
                database: Some("main".to_string()),
                auth_plugin: Some(NATIVE_PASSWORD_PLUGIN.to_string()),
            };
            self.channel.write_packet(&response.serialize()?, 1)?;

            let (verdict, seq) = self.channel.read_packet()?;
            assert_eq!(seq, 2);
            assert_eq!(verdict[0], 0x00, "auth should succeed: {:?}", verdict);
            OkPacket::parse(&verdict)?;
            Ok(())
        }

        /// COM_QUERY returning a result set.
        fn query(&mut self, sql: &str) -> CResult<(Vec<String>, Vec<Vec<Option<String>>>)> {
            let mut payload = vec![0x03u8];
            payload.extend_from_slice(sql.as_bytes());
            self.channel.write_packet(&payload, 0)?;

            let (first, _) = self.channel.read_packet()?;
            if first[0] == 0xFF {
                let err = ErrorPacket::parse(&first)?;
                panic!("query failed: {} ({})", err.message, err.code);
            }
            let mut cursor = std::io::Cursor::new(first.as_slice());
            let column_count = read_len_enc_num(&mut cursor)? as usize;

            let mut columns = Vec::with_capacity(column_count);
            for _ in 0..column_count {
                let (def, _) = self.channel.read_packet()?;
                let def = server::packet::column_packet::ColumnDefinitionPacket::parse(&def)?;
                columns.push(def.name);
            }
            let (eof, _) = self.channel.read_packet()?;
            EndOfFilePacket::parse(&eof)?;

            let mut rows = Vec::new();
            loop {
                let (packet, _) = self.channel.read_packet()?;
                if packet[0] == 0xFE && packet.len() < 9 {
                    EndOfFilePacket::parse(&packet)?;
                    break;
                }
                rows.push(ResultSetRowPacket::parse(&packet)?.cells);
            }
            Ok((columns, rows))
        }

        /// COM_QUERY returning OK (DDL/DML).
        fn execute(&mut self, sql: &str) -> CResult<OkPacket> {
            let mut payload = vec![0x03u8];
            payload.extend_from_slice(sql.as_bytes());
            self.channel.write_packet(&payload, 0)?;
            let (packet, _) = self.channel.read_packet()?;
            if packet[0] == 0xFF {
                let err = ErrorPacket::parse(&packet)?;
                panic!("statement failed: {} ({})", err.message, err.code);
            }
            OkPacket::parse(&packet)
        }

        fn ping(&mut self) -> CResult<()> {
            self.channel.write_packet(&[0x0e], 0)?;
            let (packet, _) = self.channel.read_packet()?;
            assert_eq!(packet[0], 0x00);
            Ok(())
        }

        fn quit(mut self) {
            let _ = self.channel.write_packet(&[0x01], 0);
        }
    }

    fn start_server(port: u16) {
        let mut config = EngineConfig::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = port;
        config.server.password = String::new();
        let srv = MySqlServer::new(config).expect("server builds");
        std::thread::spawn(move || {
            let _ = srv.serve_blocking();
        });
    }

    /// Spec scenario: connect, SELECT 1+2 AS x → one column `x`, one row
    /// `3`, connection stays usable.
    #[test]
    fn select_arithmetic_over_the_wire() {
        start_server(TEST_PORT);
        let mut client = TestClient::connect(TEST_PORT).expect("client connects");

        let (columns, rows) = client.query("SELECT 1+2 AS x").unwrap();
        assert_eq!(columns, vec!["x".to_string()]);
        assert_eq!(rows, vec![vec![Some("3".to_string())]]);

        // the connection must return to COMMAND_READY
        client.ping().unwrap();
        let (columns, rows) = client.query("SELECT 40 + 2 AS answer").unwrap();
        assert_eq!(columns, vec!["answer".to_string()]);
        assert_eq!(rows[0][0], Some("42".to_string()));
        client.quit();
    }

    #[test]
    fn ddl_dml_and_nulls_over_the_wire() {
        start_server(TEST_PORT + 1);
        let mut client = TestClient::connect(TEST_PORT + 1).expect("client connects");

        client
            .execute("CREATE TABLE wire_t (id INT PRIMARY KEY, name VARCHAR(16))")
            .unwrap();
        let ok = client
            .execute("INSERT INTO wire_t VALUES (1, 'a'), (2, NULL)")
            .unwrap();
        assert_eq!(ok.affected_rows, 2);

        let (columns, rows) = client
            .query("SELECT id, name FROM wire_t ORDER BY id")
            .unwrap();
        assert_eq!(columns, vec!["id".to_string(), "name".to_string()]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec![Some("1".to_string()), Some("a".to_string())]);
        // null travels as the 0xFB marker, decoded to None
        assert_eq!(rows[1], vec![Some("2".to_string()), None]);

        // execution errors leave the connection open
        let mut payload = vec![0x03u8];
        payload.extend_from_slice(b"SELECT * FROM missing_table");
        client.channel.write_packet(&payload, 0).unwrap();
        let (packet, _) = client.channel.read_packet().unwrap();
        assert_eq!(packet[0], 0xFF);
        let err = ErrorPacket::parse(&packet).unwrap();
        assert_eq!(err.code, 1146);

        client.ping().unwrap();
        client.quit();
    }
}
