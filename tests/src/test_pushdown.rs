#[cfg(test)]
mod test_pushdown {
    use common::config::DataSourceConfig;
    use common::datasource::{DataSource, QueryContext};
    use common::row::Row;
    use common::value::Value;
    use executor::scan::TableScanExec;
    use executor::{ExecContext, Operator};
    use planner::physical::plan::PhysicalPlan;
    use planner::rules;
    use planner::LogicalPlan;
    use pretty_assertions::assert_eq;
    use server::session::SourceCatalog;
    use storage::MemoryEngine;

    use crate::util::{affected, fresh_session, rows};

    fn seeded_engine(rows_total: i32) -> std::sync::Arc<MemoryEngine> {
        let engine = MemoryEngine::from_config(&DataSourceConfig::memory("main"));
        engine.connect().unwrap();
        let info = common::schema::TableInfo::new(
            "people",
            vec![
                common::schema::ColumnInfo::new("id", common::schema::DataType::Int).primary(),
                common::schema::ColumnInfo::new("name", common::schema::DataType::Varchar),
                common::schema::ColumnInfo::new("age", common::schema::DataType::Int),
            ],
        );
        let ctx = QueryContext::background();
        engine.create_table(&ctx, &info).unwrap();
        let batch: Vec<Row> = (0..rows_total)
            .map(|i| {
                Row::from_pairs([
                    ("id", Value::Int(i)),
                    ("name", Value::String(format!("p{}", i))),
                    // every 100th row is older than 30
                    ("age", Value::Int(if i % 100 == 0 { 35 } else { 20 })),
                ])
            })
            .collect();
        engine.insert(&ctx, "people", &batch).unwrap();
        engine
    }

    /// Spec scenario: with the filter applied at the source and the limit
    /// capping the scan, the operator must materialize far fewer rows than
    /// the table holds.
    #[test]
    fn filter_and_limit_bound_the_scan() {
        let engine = seeded_engine(10_000);
        let catalog = SourceCatalog::new(engine.clone());

        let statements = planner::parse_script(
            "SELECT name FROM people WHERE age > 30 LIMIT 10",
            &catalog,
        )
        .unwrap();
        let planner::Statement::Select(select) = &statements[0] else {
            panic!("expected select");
        };
        let optimized = rules::optimize_select(select.clone());
        let physical = planner::physical::planner::PhysicalPlanner::new()
            .plan_select(&optimized)
            .unwrap();

        // find the scan node and check what it pushed
        fn find_scan(plan: &PhysicalPlan) -> &PhysicalPlan {
            match plan {
                PhysicalPlan::TableScan { .. } => plan,
                PhysicalPlan::Filter { input, .. }
                | PhysicalPlan::Project { input, .. }
                | PhysicalPlan::Limit { input, .. }
                | PhysicalPlan::Sort { input, .. }
                | PhysicalPlan::HashAggregate { input, .. }
                | PhysicalPlan::WindowOp { input, .. } => find_scan(input),
                other => panic!("unexpected node {:?}", other.algorithm()),
            }
        }
        let scan = find_scan(&physical.root);
        let PhysicalPlan::TableScan { filters, limit, .. } = scan else {
            unreachable!()
        };
        assert!(!filters.is_empty(), "predicate must reach the source");
        assert_eq!(*limit, Some(10), "read cap must reach the source");

        // drive the scan operator alone and observe how much it read
        let mut exec = TableScanExec::new(scan).unwrap();
        let ctx = ExecContext::new(engine, QueryContext::background());
        exec.open(&ctx).unwrap();
        assert!(
            exec.rows_read <= 10,
            "scan read {} rows, the cap allows 10",
            exec.rows_read
        );
        exec.close(&ctx).unwrap();
    }

    /// Optimized and unoptimized plans must agree on the result multiset.
    #[test]
    fn rewrites_preserve_results() {
        let engine = seeded_engine(500);
        let catalog = SourceCatalog::new(engine.clone());
        let statements = planner::parse_script(
            "SELECT name FROM people WHERE age > 30 AND 1 = 1",
            &catalog,
        )
        .unwrap();
        let planner::Statement::Select(select) = &statements[0] else {
            panic!("expected select");
        };

        let planner_impl = planner::physical::planner::PhysicalPlanner::new();
        let raw = planner_impl.plan_select(select).unwrap();
        let optimized = planner_impl
            .plan_select(&rules::optimize_select(select.clone()))
            .unwrap();

        let run = |physical| {
            let mut ctx = ExecContext::new(engine.clone(), QueryContext::background());
            executor::Executor::execute_select(physical, &mut ctx).unwrap()
        };
        let mut raw_names: Vec<String> = run(&raw)
            .rows
            .iter()
            .map(|r| r.value("name").to_string())
            .collect();
        let mut opt_names: Vec<String> = run(&optimized)
            .rows
            .iter()
            .map(|r| r.value("name").to_string())
            .collect();
        raw_names.sort();
        opt_names.sort();
        assert_eq!(raw_names, opt_names);
        assert_eq!(raw_names.len(), 5);
    }

    /// The fixed-point driver must terminate and produce a stable plan.
    #[test]
    fn optimizer_reaches_fixed_point() {
        let engine = seeded_engine(100);
        let catalog = SourceCatalog::new(engine);
        let statements = planner::parse_script(
            "SELECT name FROM people WHERE age > 30 AND age < 60 LIMIT 5",
            &catalog,
        )
        .unwrap();
        let planner::Statement::Select(select) = &statements[0] else {
            panic!("expected select");
        };
        let once = rules::optimize(select.root.clone());
        let twice = rules::optimize(once.clone());
        assert_eq!(once, twice);
        // pushdown dissolved the selection into the scan
        fn has_selection(plan: &LogicalPlan) -> bool {
            matches!(plan, LogicalPlan::Selection { .. })
                || plan.children().iter().any(|c| has_selection(c))
        }
        assert!(!has_selection(&once));
    }

    /// LIMIT 0 and OFFSET past the end behave per spec at the SQL surface.
    #[test]
    fn limit_boundaries() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE lb (v INT)").unwrap();
        affected(&mut s, "INSERT INTO lb VALUES (1), (2), (3)").unwrap();

        let result = rows(&mut s, "SELECT v FROM lb LIMIT 0").unwrap();
        assert_eq!(result.rows.len(), 0);
        assert_eq!(result.columns, vec!["v".to_string()]);

        let result = rows(&mut s, "SELECT v FROM lb LIMIT 10 OFFSET 99").unwrap();
        assert_eq!(result.rows.len(), 0);

        let result = rows(&mut s, "SELECT v FROM lb ORDER BY v LIMIT 2 OFFSET 1").unwrap();
        let values: Vec<Value> = result.rows.iter().map(|r| r.value("v")).collect();
        assert_eq!(values, vec![Value::Int(2), Value::Int(3)]);
    }

    /// Empty tables produce the declared schema and no rows.
    #[test]
    fn empty_table_keeps_schema() {
        let (mut s, _) = fresh_session();
        affected(&mut s, "CREATE TABLE empty_t (a INT, b VARCHAR(8))").unwrap();
        let result = rows(&mut s, "SELECT * FROM empty_t").unwrap();
        assert_eq!(result.columns, vec!["a".to_string(), "b".to_string()]);
        assert!(result.rows.is_empty());
    }
}
