use std::collections::VecDeque;

use anyhow::bail;
use joinscan::{
    ast::{DERIVED_TABLE, JoinDescriptor, JoinType},
    catalog::{Catalog, SchemaOracle},
    validation::{
        SampleRow, TableName, ValidationExecutor, ValidationOptions, ValidationQueries,
        ValidationStatus, plan_validation, quote_column, validate_join, validate_joins,
    },
};

const CATALOG: &str = r#"
{
  "schema_objects": [
    {
      "name": "db.sch.orders",
      "kind": {
        "table": {
          "columns": [
            { "name": "id", "dtype": "NUMBER" },
            { "name": "customer_id", "dtype": "NUMBER" }
          ]
        }
      }
    },
    {
      "name": "DB.SCH.CUSTOMERS",
      "kind": { "table": { "columns": [{ "name": "ID", "dtype": "NUMBER" }] } }
    },
    {
      "name": "db.sch.events",
      "kind": { "view": {} }
    }
  ]
}
"#;

fn catalog() -> Catalog {
    Catalog::from_json_str(CATALOG).expect("Cannot parse test catalog")
}

fn descriptor(left_table: &str, right_table: &str, join_type: JoinType) -> JoinDescriptor {
    JoinDescriptor {
        left_table: left_table.to_owned(),
        left_alias: Some("o".to_owned()),
        right_table: right_table.to_owned(),
        right_alias: Some("c".to_owned()),
        join_type,
        left_keys: vec!["customer_id".to_owned()],
        right_keys: vec!["id".to_owned()],
        flags: vec![],
    }
}

fn orders_customers() -> JoinDescriptor {
    descriptor("db.sch.orders", "db.sch.customers", JoinType::Inner)
}

struct FailingOracle;

impl SchemaOracle for FailingOracle {
    fn table_exists(&self, _database: &str, _schema: &str, _table: &str) -> anyhow::Result<bool> {
        bail!("connection refused")
    }
}

#[derive(Default)]
struct ScriptedExecutor {
    counts: VecDeque<anyhow::Result<Option<u64>>>,
    sample: Option<Vec<SampleRow>>,
    executed: Vec<String>,
}

impl ScriptedExecutor {
    fn new(counts: Vec<anyhow::Result<Option<u64>>>, sample: Option<Vec<SampleRow>>) -> Self {
        Self {
            counts: counts.into(),
            sample,
            executed: vec![],
        }
    }
}

impl ValidationExecutor for ScriptedExecutor {
    fn count(&mut self, sql: &str) -> anyhow::Result<Option<u64>> {
        self.executed.push(sql.to_owned());
        match self.counts.pop_front() {
            Some(count) => count,
            None => bail!("no scripted count left"),
        }
    }

    fn sample(&mut self, sql: &str) -> anyhow::Result<Vec<SampleRow>> {
        self.executed.push(sql.to_owned());
        match &self.sample {
            Some(rows) => Ok(rows.clone()),
            None => bail!("sampling disabled"),
        }
    }
}

fn sample_row(id: i64) -> SampleRow {
    let mut row = SampleRow::new();
    row.insert("customer_id".to_owned(), serde_json::json!(id));
    row.insert("id".to_owned(), serde_json::json!(id));
    row
}

#[test]
fn test_table_name() {
    let name: TableName = " db . sch . tbl ".parse().unwrap();
    assert_eq!(
        name,
        TableName {
            database: "db".to_owned(),
            schema: "sch".to_owned(),
            table: "tbl".to_owned(),
        }
    );
    assert_eq!(name.to_string(), "db.sch.tbl");

    for bad in ["sch.tbl", "a.b.c.d", "a..b", "", DERIVED_TABLE] {
        let err = bad.parse::<TableName>().unwrap_err();
        assert_eq!(err.to_string(), format!("Invalid table name format: {}", bad));
    }
}

#[test]
fn test_quote_column() {
    assert_eq!(quote_column("a", "customer_id"), "a.customer_id");
    assert_eq!(quote_column("a", "OrderId"), "a.\"OrderId\"");
    assert_eq!(quote_column("b", "order date"), "b.\"order date\"");
    assert_eq!(quote_column("b", "ship-to"), "b.\"ship-to\"");
    assert_eq!(quote_column("b", "col#1"), "b.\"col#1\"");
    assert_eq!(quote_column("b", "amt$"), "b.\"amt$\"");
    assert_eq!(quote_column("a", "123"), "a.\"123\"");
    assert_eq!(quote_column("a", "we\"ird"), "a.\"we\"\"ird\"");
    assert_eq!(quote_column("", "id"), "id");
}

#[test]
fn test_validation_queries() {
    let queries = ValidationQueries::new(
        "db.sch.orders",
        "db.sch.customers",
        &[("customer_id", "id"), ("Region", "region")],
        5,
    );
    assert_eq!(
        queries.anti_join,
        "SELECT COUNT(*)\n\
         FROM (\n    \
         SELECT a.customer_id, a.\"Region\"\n    \
         FROM db.sch.orders a\n    \
         LEFT JOIN db.sch.customers b\n      \
         ON a.customer_id = b.id AND a.\"Region\" = b.region\n    \
         WHERE b.id IS NULL AND b.region IS NULL\n\
         )"
    );
    assert_eq!(
        queries.multiplicity,
        "SELECT SUM(multi_count - 1)\n\
         FROM (\n    \
         SELECT COUNT(*) AS multi_count\n    \
         FROM db.sch.orders a\n    \
         JOIN db.sch.customers b\n      \
         ON a.customer_id = b.id AND a.\"Region\" = b.region\n    \
         GROUP BY a.customer_id, a.\"Region\"\n\
         )"
    );
    assert_eq!(
        queries.null_keys,
        "SELECT COUNT(*)\nFROM db.sch.orders a\nWHERE a.customer_id IS NULL OR a.\"Region\" IS NULL"
    );
    assert_eq!(
        queries.spot_check,
        "SELECT a.*, b.*\nFROM db.sch.orders a\nJOIN db.sch.customers b\n  \
         ON a.customer_id = b.id AND a.\"Region\" = b.region\nLIMIT 5"
    );
}

#[test]
fn test_plan_validation_skip_reasons() {
    let catalog = catalog();
    let options = ValidationOptions::default();

    let mut no_keys = orders_customers();
    no_keys.left_keys.clear();
    no_keys.right_keys.clear();

    let mut unknown_column = orders_customers();
    unknown_column.right_keys = vec!["cid".to_owned()];

    let cases = [
        (
            descriptor("db.sch.orders", "db.sch.customers", JoinType::Left),
            "Skipped - Non-Inner Join",
        ),
        (
            descriptor(DERIVED_TABLE, "db.sch.customers", JoinType::Inner),
            "Skipped - Derived/Temp table",
        ),
        (no_keys, "Skipped - No equality keys"),
        (
            descriptor("orders", "db.sch.customers", JoinType::Inner),
            "Skipped - Invalid table name format: orders",
        ),
        (
            descriptor("db.sch.orders", "db.tmp.customers", JoinType::Inner),
            "Skipped - Temp/Derived Table (Not Found)",
        ),
        (
            unknown_column,
            "Skipped - Unknown join key column db.sch.customers.cid",
        ),
    ];
    for (descriptor, status) in cases {
        println!("Testing plan for: {:?}", descriptor);
        let outcome = plan_validation(&descriptor, &catalog, &options);
        assert_eq!(outcome.status.to_string(), status);
        assert!(outcome.queries.is_none());
        assert_eq!(outcome.descriptor, descriptor);
    }
}

#[test]
fn test_plan_validation_ready() {
    let catalog = catalog();
    let outcome = plan_validation(&orders_customers(), &catalog, &ValidationOptions::default());
    assert_eq!(outcome.status, ValidationStatus::Planned);
    let queries = outcome.queries.expect("Queries should be rendered");
    assert!(queries.spot_check.ends_with("LIMIT 20"));
    assert!(outcome.missing_records.is_none());

    // columns are not checked for tables without column information
    let mut events = descriptor("db.sch.orders", "db.sch.events", JoinType::Inner);
    events.right_keys = vec!["anything".to_owned()];
    let outcome = plan_validation(&events, &catalog, &ValidationOptions::default());
    assert_eq!(outcome.status, ValidationStatus::Planned);
}

#[test]
fn test_plan_validation_non_inner_when_enabled() {
    let options = ValidationOptions {
        spot_check_limit: 3,
        validate_non_inner: true,
    };
    let left = descriptor("db.sch.orders", "db.sch.customers", JoinType::LeftOuter);
    let outcome = plan_validation(&left, &catalog(), &options);
    assert_eq!(outcome.status, ValidationStatus::Planned);
    assert!(outcome.queries.unwrap().spot_check.ends_with("LIMIT 3"));
}

#[test]
fn test_oracle_failure() {
    let outcome = plan_validation(
        &orders_customers(),
        &FailingOracle,
        &ValidationOptions::default(),
    );
    assert_eq!(outcome.status.to_string(), "Failed - connection refused");

    let mut executor = ScriptedExecutor::default();
    let outcome = validate_join(
        &orders_customers(),
        &FailingOracle,
        &mut executor,
        &ValidationOptions::default(),
    );
    assert_eq!(
        outcome.status,
        ValidationStatus::Failed("connection refused".to_owned())
    );
    assert!(executor.executed.is_empty());
}

#[test]
fn test_validate_join() {
    let mut executor = ScriptedExecutor::new(
        vec![Ok(Some(3)), Ok(None), Ok(Some(1))],
        Some(vec![sample_row(1), sample_row(2)]),
    );
    let outcome = validate_join(
        &orders_customers(),
        &catalog(),
        &mut executor,
        &ValidationOptions::default(),
    );
    assert_eq!(outcome.status, ValidationStatus::Validated);
    assert_eq!(outcome.status.to_string(), "Validated");
    assert_eq!(outcome.missing_records, Some(3));
    assert_eq!(outcome.join_explosion, Some(0));
    assert_eq!(outcome.null_join_keys, Some(1));
    assert_eq!(outcome.spot_check.as_ref().map(Vec::len), Some(2));

    let queries = outcome.queries.expect("Queries should be rendered");
    assert_eq!(
        executor.executed,
        vec![
            queries.anti_join,
            queries.multiplicity,
            queries.null_keys,
            queries.spot_check,
        ]
    );
}

#[test]
fn test_validate_join_failures() {
    let options = ValidationOptions::default();

    let mut executor =
        ScriptedExecutor::new(vec![Ok(Some(0)), Err(anyhow::anyhow!("bad sql"))], None);
    let outcome = validate_join(&orders_customers(), &catalog(), &mut executor, &options);
    assert_eq!(outcome.status.to_string(), "Failed - bad sql");
    assert!(outcome.queries.is_some());
    assert!(outcome.missing_records.is_none());

    let mut executor = ScriptedExecutor::new(vec![Ok(Some(0)), Ok(Some(0)), Ok(None)], None);
    let outcome = validate_join(&orders_customers(), &catalog(), &mut executor, &options);
    assert_eq!(
        outcome.status.to_string(),
        "Failed - Null key query returned no count"
    );

    // a failed sample does not fail the validation
    let mut executor = ScriptedExecutor::new(vec![Ok(Some(0)), Ok(Some(0)), Ok(Some(0))], None);
    let outcome = validate_join(&orders_customers(), &catalog(), &mut executor, &options);
    assert_eq!(outcome.status, ValidationStatus::Validated);
    assert!(outcome.spot_check.is_none());
}

#[test]
fn test_validate_joins_keeps_order() {
    let descriptors = vec![
        descriptor("db.sch.orders", "db.sch.customers", JoinType::Left),
        orders_customers(),
        descriptor("db.sch.orders", "db.tmp.customers", JoinType::Inner),
    ];
    let mut executor =
        ScriptedExecutor::new(vec![Ok(Some(0)), Ok(Some(0)), Ok(Some(0))], Some(vec![]));
    let outcomes = validate_joins(
        &descriptors,
        &catalog(),
        &mut executor,
        &ValidationOptions::default(),
    );
    let statuses = outcomes
        .iter()
        .map(|outcome| outcome.status.to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        statuses,
        vec![
            "Skipped - Non-Inner Join",
            "Validated",
            "Skipped - Temp/Derived Table (Not Found)",
        ]
    );
}

#[test]
fn test_catalog_oracle() {
    let catalog = catalog();
    assert!(catalog.table_exists("DB", "sch", "Orders").unwrap());
    assert!(catalog.table_exists("db", "sch", "customers").unwrap());
    assert!(!catalog.table_exists("db", "sch", "missing").unwrap());
    assert_eq!(
        catalog
            .column_exists("db", "sch", "customers", "id")
            .unwrap(),
        Some(true)
    );
    assert_eq!(
        catalog
            .column_exists("db", "sch", "orders", "total")
            .unwrap(),
        Some(false)
    );
    assert_eq!(
        catalog.column_exists("db", "sch", "events", "id").unwrap(),
        None
    );
    assert_eq!(
        catalog.column_exists("db", "sch", "missing", "id").unwrap(),
        None
    );

    assert!(Catalog::from_json_str("{\"schema_objects\": 1}").is_err());
}
