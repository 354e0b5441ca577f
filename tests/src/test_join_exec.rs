#[cfg(test)]
mod test_join_exec {
    use common::value::Value;
    use pretty_assertions::assert_eq;

    use crate::util::{affected, fresh_session, rows, scalar};

    fn seed(s: &mut server::Session) {
        affected(s, "CREATE TABLE j_users (id INT PRIMARY KEY, name VARCHAR(32))").unwrap();
        affected(s, "CREATE TABLE j_orders (user_id INT, total INT)").unwrap();
        affected(s, "INSERT INTO j_users VALUES (1, 'A'), (2, 'B')").unwrap();
        affected(s, "INSERT INTO j_orders VALUES (1, 10), (3, 20)").unwrap();
    }

    /// Spec scenario: LEFT JOIN emits ('A', 10) and ('B', null), nothing
    /// else.
    #[test]
    fn left_join_null_handling() {
        let (mut s, _) = fresh_session();
        seed(&mut s);
        let result = rows(
            &mut s,
            "SELECT u.name, o.total FROM j_users u LEFT JOIN j_orders o ON u.id = o.user_id",
        )
        .unwrap();
        assert_eq!(result.rows.len(), 2);
        let mut pairs: Vec<(String, Value)> = result
            .rows
            .iter()
            .map(|r| (r.value("name").to_string(), r.value("total")))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), Value::Int(10)),
                ("B".to_string(), Value::Null),
            ]
        );
    }

    #[test]
    fn inner_join_drops_unmatched() {
        let (mut s, _) = fresh_session();
        seed(&mut s);
        let result = rows(
            &mut s,
            "SELECT u.name, o.total FROM j_users u JOIN j_orders o ON u.id = o.user_id",
        )
        .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].value("name"), Value::String("A".into()));
    }

    #[test]
    fn right_join_preserves_right_side() {
        let (mut s, _) = fresh_session();
        seed(&mut s);
        let result = rows(
            &mut s,
            "SELECT o.total FROM j_users u RIGHT JOIN j_orders o ON u.id = o.user_id",
        )
        .unwrap();
        let mut totals: Vec<Value> = result.rows.iter().map(|r| r.value("total")).collect();
        totals.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(totals, vec![Value::Int(10), Value::Int(20)]);
    }

    #[test]
    fn group_by_with_aggregates() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE g_sales (region VARCHAR(16), amount INT)").unwrap();
        affected(
            &mut s,
            "INSERT INTO g_sales VALUES ('east', 10), ('east', 20), ('west', 5)",
        )
        .unwrap();
        let result = rows(
            &mut s,
            "SELECT region, count(*), sum(amount), avg(amount) \
             FROM g_sales GROUP BY region ORDER BY region",
        )
        .unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].value("region"), Value::String("east".into()));
        assert_eq!(result.rows[0].value("count(*)"), Value::BigInt(2));
        assert_eq!(result.rows[0].value("sum(amount)"), Value::BigInt(30));
        assert_eq!(result.rows[0].value("avg(amount)"), Value::Double(15.0));
    }

    #[test]
    fn semi_join_from_in_subquery() {
        let (mut s, _) = fresh_session();
        seed(&mut s);
        let result = rows(
            &mut s,
            "SELECT name FROM j_users WHERE id IN (SELECT user_id FROM j_orders)",
        )
        .unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].value("name"), Value::String("A".into()));
    }

    #[test]
    fn window_row_number_over_partition() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE w_emp (dept VARCHAR(8), salary INT)").unwrap();
        affected(
            &mut s,
            "INSERT INTO w_emp VALUES ('a', 100), ('a', 200), ('b', 50)",
        )
        .unwrap();
        let result = rows(
            &mut s,
            "SELECT dept, salary, row_number() OVER (PARTITION BY dept ORDER BY salary DESC) AS rn \
             FROM w_emp",
        )
        .unwrap();
        let top = result
            .rows
            .iter()
            .find(|r| r.value("salary") == Value::Int(200))
            .unwrap();
        assert_eq!(top.value("rn"), Value::BigInt(1));
    }

    #[test]
    fn recursive_cte_counts_up() {
        let (mut s, _) = fresh_session();
        let result = rows(
            &mut s,
            "WITH RECURSIVE seq (n) AS ( \
               SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 5 \
             ) SELECT n FROM seq",
        )
        .unwrap();
        let mut values: Vec<i64> = result
            .rows
            .iter()
            .map(|r| r.value("n").as_i64().unwrap())
            .collect();
        values.sort();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn union_distinct_and_all() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE un_a (v INT)").unwrap();
        affected(&mut s, "INSERT INTO un_a VALUES (1), (2)").unwrap();
        assert_eq!(
            rows(&mut s, "SELECT v FROM un_a UNION ALL SELECT v FROM un_a")
                .unwrap()
                .rows
                .len(),
            4
        );
        assert_eq!(
            rows(&mut s, "SELECT v FROM un_a UNION SELECT v FROM un_a")
                .unwrap()
                .rows
                .len(),
            2
        );
    }

    #[test]
    fn expression_scalar_query() {
        let (mut s, _) = fresh_session();
        assert_eq!(scalar(&mut s, "SELECT 1 + 2 AS x"), Value::BigInt(3));
        assert_eq!(
            scalar(&mut s, "SELECT upper(concat('a', 'b')) AS x"),
            Value::String("AB".into())
        );
    }
}
