#[cfg(test)]
mod test_constraints {
    use common::err::{ConstraintKind, EngineError};
    use common::value::Value;
    use pretty_assertions::assert_eq;

    use crate::util::{affected, fresh_session, rows, scalar};

    #[test]
    fn unique_violation_on_update_leaves_row_unchanged() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE u_upd (id INT PRIMARY KEY, email VARCHAR(64) UNIQUE)")
            .unwrap();
        affected(&mut s, "INSERT INTO u_upd VALUES (1, 'a'), (2, 'b')").unwrap();

        let err = s
            .execute("UPDATE u_upd SET email = 'b' WHERE id = 1")
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Constraint(ConstraintKind::Unique { .. })
        ));
        assert_eq!(err.mysql_code(), 1062);

        // original row untouched
        assert_eq!(
            scalar(&mut s, "SELECT email FROM u_upd WHERE id = 1"),
            Value::String("a".into())
        );
    }

    #[test]
    fn unique_insert_violation() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE u_ins (email VARCHAR(64) UNIQUE)").unwrap();
        affected(&mut s, "INSERT INTO u_ins VALUES ('x')").unwrap();
        let err = s.execute("INSERT INTO u_ins VALUES ('x')").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Constraint(ConstraintKind::Unique { .. })
        ));
        // nulls never collide
        affected(&mut s, "INSERT INTO u_ins VALUES (NULL)").unwrap();
        affected(&mut s, "INSERT INTO u_ins VALUES (NULL)").unwrap();
    }

    #[test]
    fn foreign_key_restrict_on_delete() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE fk_users (id INT PRIMARY KEY)").unwrap();
        affected(
            &mut s,
            "CREATE TABLE fk_orders (id INT PRIMARY KEY, user_id INT, \
             FOREIGN KEY (user_id) REFERENCES fk_users(id))",
        )
        .unwrap();
        affected(&mut s, "INSERT INTO fk_users VALUES (1)").unwrap();
        affected(&mut s, "INSERT INTO fk_orders VALUES (10, 1)").unwrap();

        let err = s.execute("DELETE FROM fk_users WHERE id = 1").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Constraint(ConstraintKind::ForeignKeyRestrict { .. })
        ));
        assert_eq!(err.mysql_code(), 1451);

        // children first, then the parent delete goes through
        assert_eq!(affected(&mut s, "DELETE FROM fk_orders WHERE user_id = 1").unwrap(), 1);
        assert_eq!(affected(&mut s, "DELETE FROM fk_users WHERE id = 1").unwrap(), 1);
    }

    #[test]
    fn missing_foreign_parent_rejects_insert() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE fp_users (id INT PRIMARY KEY)").unwrap();
        affected(
            &mut s,
            "CREATE TABLE fp_orders (id INT PRIMARY KEY, user_id INT, \
             FOREIGN KEY (user_id) REFERENCES fp_users(id))",
        )
        .unwrap();
        let err = s.execute("INSERT INTO fp_orders VALUES (1, 42)").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Constraint(ConstraintKind::ForeignKey { .. })
        ));
    }

    #[test]
    fn not_null_without_default_rejects_omission() {
        let (mut s, _) = fresh_session();
        affected(
            &mut s,
            "CREATE TABLE nn (id INT PRIMARY KEY, name VARCHAR(32) NOT NULL)",
        )
        .unwrap();
        let err = s.execute("INSERT INTO nn (id) VALUES (1)").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Constraint(ConstraintKind::NotNull { .. })
        ));
    }

    #[test]
    fn auto_increment_never_reuses_after_delete() {
        let (mut s, _) = fresh_session();
        affected(
            &mut s,
            "CREATE TABLE ai (id INT PRIMARY KEY AUTO_INCREMENT, v INT)",
        )
        .unwrap();
        affected(&mut s, "INSERT INTO ai (v) VALUES (1), (2), (3)").unwrap();
        assert_eq!(scalar(&mut s, "SELECT max(id) FROM ai"), Value::Int(3));

        affected(&mut s, "DELETE FROM ai WHERE id = 3").unwrap();
        affected(&mut s, "INSERT INTO ai (v) VALUES (4)").unwrap();
        // counter + 1, not max + 1
        assert_eq!(scalar(&mut s, "SELECT max(id) FROM ai"), Value::Int(4));
        assert_eq!(
            scalar(&mut s, "SELECT count(*) FROM ai WHERE id = 3"),
            Value::BigInt(0)
        );
    }

    #[test]
    fn create_drop_create_round_trip() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE cdc_t (id INT PRIMARY KEY)").unwrap();
        let err = s.execute("CREATE TABLE cdc_t (id INT)").unwrap_err();
        assert!(matches!(err, EngineError::TableExists(_)));
        affected(&mut s, "DROP TABLE cdc_t").unwrap();
        affected(&mut s, "CREATE TABLE cdc_t (id INT PRIMARY KEY)").unwrap();
    }

    #[test]
    fn truncate_resets_auto_increment() {
        let (mut s, _) = fresh_session();
        affected(
            &mut s,
            "CREATE TABLE tr (id INT PRIMARY KEY AUTO_INCREMENT, v INT)",
        )
        .unwrap();
        affected(&mut s, "INSERT INTO tr (v) VALUES (1), (2)").unwrap();
        affected(&mut s, "TRUNCATE TABLE tr").unwrap();
        assert_eq!(rows(&mut s, "SELECT * FROM tr").unwrap().rows.len(), 0);
        affected(&mut s, "INSERT INTO tr (v) VALUES (9)").unwrap();
        assert_eq!(scalar(&mut s, "SELECT id FROM tr"), Value::Int(1));
    }

    #[test]
    fn unique_values_stay_unique_under_snapshot() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE uu (email VARCHAR(32) UNIQUE)").unwrap();
        affected(&mut s, "INSERT INTO uu VALUES ('a'), ('b'), ('c')").unwrap();
        let result = rows(&mut s, "SELECT email FROM uu").unwrap();
        let mut seen: Vec<String> = result
            .rows
            .iter()
            .map(|r| r.value("email").to_string())
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 3);
    }
}
