#[cfg(test)]
mod test_session {
    use common::value::Value;
    use pretty_assertions::assert_eq;
    use server::StatementOutcome;

    use crate::util::{affected, fresh_session, rows, scalar};

    #[test]
    fn insert_then_select_round_trip() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE rt (id INT PRIMARY KEY, name VARCHAR(32))").unwrap();
        assert_eq!(
            affected(&mut s, "INSERT INTO rt VALUES (1, 'a'), (2, 'b')").unwrap(),
            2
        );
        let result = rows(&mut s, "SELECT id, name FROM rt ORDER BY id").unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].value("id"), Value::Int(1));
        assert_eq!(result.rows[1].value("name"), Value::String("b".into()));
    }

    #[test]
    fn multi_statement_stops_at_first_error() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE ms (v INT)").unwrap();
        let err = s
            .execute("INSERT INTO ms VALUES (1); INSERT INTO missing VALUES (2); INSERT INTO ms VALUES (3)")
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
        // the first statement took effect, the third never ran
        assert_eq!(scalar(&mut s, "SELECT count(*) FROM ms"), Value::BigInt(1));
    }

    #[test]
    fn show_and_describe() {
        let (mut s, _) = fresh_session();
        affected(
            &mut s,
            "CREATE TABLE sd (id INT PRIMARY KEY AUTO_INCREMENT, name VARCHAR(16) NOT NULL)",
        )
        .unwrap();

        let dbs = rows(&mut s, "SHOW DATABASES").unwrap();
        assert!(dbs
            .rows
            .iter()
            .any(|r| r.value("Database") == Value::String("main".into())));

        let tables = rows(&mut s, "SHOW TABLES").unwrap();
        assert!(tables
            .rows
            .iter()
            .any(|r| r.value("Tables_in_main") == Value::String("sd".into())));

        let described = rows(&mut s, "DESCRIBE sd").unwrap();
        assert_eq!(described.rows.len(), 2);
        let id_row = &described.rows[0];
        assert_eq!(id_row.value("Field"), Value::String("id".into()));
        assert_eq!(id_row.value("Key"), Value::String("PRI".into()));
        assert_eq!(id_row.value("Extra"), Value::String("auto_increment".into()));
    }

    #[test]
    fn session_variables_and_set() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "SET NAMES utf8mb4").unwrap();
        affected(&mut s, "SET autocommit = 0").unwrap();
        assert!(!s.autocommit);

        let vars = rows(&mut s, "SHOW VARIABLES LIKE 'character_set%'").unwrap();
        assert!(vars.rows.len() >= 3);
    }

    #[test]
    fn autocommit_off_opens_implicit_transaction() {
        let (mut s, set) = fresh_session();
        let mut other = crate::util::sibling_session(&set, 2);
        affected(&mut s, "CREATE TABLE ac (v INT)").unwrap();
        affected(&mut s, "SET autocommit = 0").unwrap();
        affected(&mut s, "INSERT INTO ac VALUES (1)").unwrap();
        assert!(s.in_transaction());
        // invisible elsewhere until committed
        assert_eq!(scalar(&mut other, "SELECT count(*) FROM ac"), Value::BigInt(0));
        affected(&mut s, "COMMIT").unwrap();
        assert_eq!(scalar(&mut other, "SELECT count(*) FROM ac"), Value::BigInt(1));
    }

    #[test]
    fn prepared_statement_binding() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE ps (id INT PRIMARY KEY, name VARCHAR(32))").unwrap();
        affected(&mut s, "INSERT INTO ps VALUES (1, 'alpha'), (2, 'beta')").unwrap();

        let (id, statement) = s.prepare("SELECT name FROM ps WHERE id = ?").unwrap();
        assert_eq!(statement.param_count, 1);
        let outcome = s.execute_prepared(id, vec![Value::Int(2)]).unwrap();
        let StatementOutcome::Rows(result) = outcome else {
            panic!("expected rows");
        };
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].value("name"), Value::String("beta".into()));

        s.close_prepared(id);
        assert!(s.execute_prepared(id, vec![Value::Int(1)]).is_err());
    }

    #[test]
    fn explain_renders_physical_plan() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE ex (v INT)").unwrap();
        let result = rows(&mut s, "EXPLAIN SELECT v FROM ex WHERE v > 1 LIMIT 3").unwrap();
        assert_eq!(result.columns, vec!["EXPLAIN".to_string()]);
        let text: Vec<String> = result
            .rows
            .iter()
            .map(|r| r.value("EXPLAIN").to_string())
            .collect();
        assert!(text.iter().any(|line| line.contains("TableScan")));
        assert!(text.iter().any(|line| line.contains("Limit")));
    }

    #[test]
    fn use_unknown_database_fails() {
        let (mut s, _) = fresh_session();
        assert!(s.execute("USE nowhere").is_err());
        // the session stays on the old database
        assert_eq!(s.current_db, "main");
    }

    #[test]
    fn select_session_variable() {
        let (mut s, _) = fresh_session();
        let value = scalar(&mut s, "SELECT @@version_comment");
        assert_eq!(value, Value::String("rsql".into()));
    }
}
