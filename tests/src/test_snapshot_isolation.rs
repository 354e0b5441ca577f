#[cfg(test)]
mod test_snapshot_isolation {
    use common::value::Value;
    use pretty_assertions::assert_eq;

    use crate::util::{affected, fresh_session, rows, scalar, sibling_session};

    #[test]
    fn open_snapshot_does_not_see_concurrent_commits() {
        let (mut a, set) = fresh_session();
        let mut b = sibling_session(&set, 2);

        affected(&mut a, "CREATE TABLE t_iso (v INT)").unwrap();
        affected(&mut a, "INSERT INTO t_iso VALUES (4), (6)").unwrap();

        affected(&mut a, "BEGIN").unwrap();
        assert_eq!(scalar(&mut a, "SELECT sum(v) FROM t_iso"), Value::BigInt(10));

        // B commits an insert while A's snapshot is open
        affected(&mut b, "INSERT INTO t_iso VALUES (5)").unwrap();

        assert_eq!(
            scalar(&mut a, "SELECT sum(v) FROM t_iso"),
            Value::BigInt(10),
            "repeatable read must keep the first snapshot"
        );

        affected(&mut a, "COMMIT").unwrap();
        assert_eq!(scalar(&mut a, "SELECT sum(v) FROM t_iso"), Value::BigInt(15));
    }

    #[test]
    fn rolled_back_writes_are_never_observed() {
        let (mut a, set) = fresh_session();
        let mut b = sibling_session(&set, 2);

        affected(&mut a, "CREATE TABLE t_rollback (v INT)").unwrap();
        affected(&mut a, "BEGIN").unwrap();
        affected(&mut a, "INSERT INTO t_rollback VALUES (1), (2)").unwrap();

        // uncommitted writes are invisible to everyone else
        assert_eq!(rows(&mut b, "SELECT * FROM t_rollback").unwrap().rows.len(), 0);

        affected(&mut a, "ROLLBACK").unwrap();
        assert_eq!(rows(&mut a, "SELECT * FROM t_rollback").unwrap().rows.len(), 0);
        assert_eq!(rows(&mut b, "SELECT * FROM t_rollback").unwrap().rows.len(), 0);
    }

    #[test]
    fn own_writes_are_visible_inside_the_transaction() {
        let (mut a, _set) = fresh_session();
        affected(&mut a, "CREATE TABLE t_own (v INT)").unwrap();
        affected(&mut a, "BEGIN").unwrap();
        affected(&mut a, "INSERT INTO t_own VALUES (7)").unwrap();
        assert_eq!(scalar(&mut a, "SELECT count(*) FROM t_own"), Value::BigInt(1));
        affected(&mut a, "DELETE FROM t_own WHERE v = 7").unwrap();
        assert_eq!(scalar(&mut a, "SELECT count(*) FROM t_own"), Value::BigInt(0));
        affected(&mut a, "COMMIT").unwrap();
    }

    #[test]
    fn committed_transaction_is_visible_to_later_snapshots() {
        let (mut a, set) = fresh_session();
        let mut b = sibling_session(&set, 2);

        affected(&mut a, "CREATE TABLE t_commit (v INT)").unwrap();
        affected(&mut a, "BEGIN").unwrap();
        affected(&mut a, "INSERT INTO t_commit VALUES (1)").unwrap();
        affected(&mut a, "DELETE FROM t_commit WHERE v = 99").unwrap();
        affected(&mut a, "COMMIT").unwrap();

        let result = rows(&mut b, "SELECT v FROM t_commit").unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].value("v"), Value::Int(1));
    }

    #[test]
    fn update_inside_transaction_keeps_old_version_for_others() {
        let (mut a, set) = fresh_session();
        let mut b = sibling_session(&set, 2);

        affected(&mut a, "CREATE TABLE t_upd (id INT PRIMARY KEY, v INT)").unwrap();
        affected(&mut a, "INSERT INTO t_upd VALUES (1, 10)").unwrap();

        affected(&mut a, "BEGIN").unwrap();
        affected(&mut a, "UPDATE t_upd SET v = 20 WHERE id = 1").unwrap();
        assert_eq!(scalar(&mut a, "SELECT v FROM t_upd"), Value::Int(20));
        // B still reads the committed version
        assert_eq!(scalar(&mut b, "SELECT v FROM t_upd"), Value::Int(10));

        affected(&mut a, "COMMIT").unwrap();
        assert_eq!(scalar(&mut b, "SELECT v FROM t_upd"), Value::Int(20));
    }
}
