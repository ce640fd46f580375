use anyhow::bail;
use joinscan::{
    ast::JoinDescriptor,
    catalog::Catalog,
    parser::extract_joins,
    report::{PARSED_JOINS_SHEET, Report, SPOT_CHECK_SHEET_PREFIX, VALIDATION_SHEET, to_json},
    validation::{SampleRow, ValidationExecutor, ValidationOptions, plan_validation, validate_joins},
};
use serde_json::{Value, json};

const SQL: &str = r#"
SELECT *
FROM db.sch.orders o
JOIN db.sch.customers c ON o.customer_id = c.id
LEFT JOIN db.sch.regions r ON c.region_id = r.id OR r.id = 0
"#;

const CATALOG: &str = r#"
{
  "schema_objects": [
    { "name": "db.sch.orders", "kind": { "table": { "columns": [] } } },
    { "name": "db.sch.customers", "kind": { "table": { "columns": [] } } },
    { "name": "db.sch.regions", "kind": { "table": { "columns": [] } } }
  ]
}
"#;

struct StaticExecutor;

impl ValidationExecutor for StaticExecutor {
    fn count(&mut self, _sql: &str) -> anyhow::Result<Option<u64>> {
        Ok(Some(2))
    }

    fn sample(&mut self, sql: &str) -> anyhow::Result<Vec<SampleRow>> {
        if !sql.contains("LIMIT") {
            bail!("not a spot check: {}", sql);
        }
        let mut first = SampleRow::new();
        first.insert("customer_id".to_owned(), json!(7));
        first.insert("id".to_owned(), json!(7));
        let mut second = SampleRow::new();
        second.insert("customer_id".to_owned(), json!(8));
        second.insert("name".to_owned(), json!("acme"));
        Ok(vec![first, second])
    }
}

fn catalog() -> Catalog {
    Catalog::from_json_str(CATALOG).expect("Cannot parse test catalog")
}

#[test]
fn test_report_sheets() {
    let descriptors = extract_joins(SQL);
    assert_eq!(descriptors.len(), 2);
    let outcomes = validate_joins(
        &descriptors,
        &catalog(),
        &mut StaticExecutor,
        &ValidationOptions::default(),
    );
    let report = Report::from_outcomes(&descriptors, &outcomes);

    let names = report.sheets.keys().cloned().collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            PARSED_JOINS_SHEET.to_owned(),
            VALIDATION_SHEET.to_owned(),
            format!("{}1", SPOT_CHECK_SHEET_PREFIX),
        ]
    );

    let parsed = &report.sheets[PARSED_JOINS_SHEET];
    assert_eq!(
        parsed.columns,
        vec![
            "Left_Table",
            "Left_Alias",
            "Right_Table",
            "Right_Alias",
            "Join_Type",
            "Left_Join_Columns",
            "Right_Join_Columns",
            "Flags",
            "Validation_Status",
        ]
    );
    assert_eq!(
        parsed.rows[0],
        vec![
            json!("db.sch.orders"),
            json!("o"),
            json!("db.sch.customers"),
            json!("c"),
            json!("INNER JOIN"),
            json!("customer_id"),
            json!("id"),
            json!(""),
            json!("Validated"),
        ]
    );
    assert_eq!(parsed.rows[1][4], json!("LEFT JOIN"));
    assert_eq!(parsed.rows[1][8], json!("Skipped - Non-Inner Join"));

    let validation = &report.sheets[VALIDATION_SHEET];
    assert_eq!(validation.columns.len(), 16);
    assert_eq!(validation.columns[13], "Missing_Records");
    let row = &validation.rows[0];
    assert_eq!(row[8], json!("Validated"));
    assert!(row[9].as_str().is_some_and(|sql| sql.starts_with("SELECT COUNT(*)")));
    assert_eq!(&row[13..], &[json!(2), json!(2), json!(2)]);
    let skipped = &validation.rows[1];
    assert_eq!(skipped.len(), 16);
    assert!(skipped[9..].iter().all(Value::is_null));

    let spot_check = &report.sheets[&format!("{}1", SPOT_CHECK_SHEET_PREFIX)];
    assert!(spot_check.columns.is_empty());
    assert_eq!(
        spot_check.rows,
        vec![
            vec![json!("Left Table"), json!("db.sch.orders")],
            vec![json!("Right Table"), json!("db.sch.customers")],
            vec![json!("Join Keys"), json!("customer_id")],
            vec![],
            vec![json!("customer_id"), json!("id"), json!("name")],
            vec![json!(7), json!(7), Value::Null],
            vec![json!(8), Value::Null, json!("acme")],
        ]
    );
}

#[test]
fn test_disjunction_flags_in_report() {
    let descriptors = extract_joins(SQL);
    let report = Report::from_outcomes(&descriptors, &[]);
    let flags = report.sheets[PARSED_JOINS_SHEET].rows[1][7].clone();
    assert_eq!(
        flags,
        json!("equality `c.region_id = r.id` is part of a disjunction")
    );
    assert_eq!(report.sheets[PARSED_JOINS_SHEET].rows[1][5], json!(""));
}

#[test]
fn test_planned_report() {
    let descriptors = extract_joins(SQL);
    let options = ValidationOptions::default();
    let catalog = catalog();
    let outcomes = descriptors
        .iter()
        .map(|descriptor| plan_validation(descriptor, &catalog, &options))
        .collect::<Vec<_>>();
    let report = Report::from_outcomes(&descriptors, &outcomes);

    // nothing was executed, so there is no sample to show
    assert_eq!(report.sheets.len(), 2);
    let parsed = &report.sheets[PARSED_JOINS_SHEET];
    assert_eq!(parsed.rows[0][8], json!("Planned"));
    let validation = &report.sheets[VALIDATION_SHEET];
    assert!(validation.rows[0][12].as_str().is_some_and(|sql| sql.ends_with("LIMIT 20")));
    assert_eq!(validation.rows[0][13], Value::Null);
}

#[test]
fn test_pending_status_without_outcomes() {
    let descriptors = extract_joins(SQL);
    let sheet = Report::parsed_joins_sheet(&descriptors, &[]);
    assert!(sheet.rows.iter().all(|row| row[8] == json!("Pending")));
}

#[test]
fn test_report_json() {
    let descriptors = extract_joins(SQL);
    let outcomes = validate_joins(
        &descriptors,
        &catalog(),
        &mut StaticExecutor,
        &ValidationOptions::default(),
    );
    let report = Report::from_outcomes(&descriptors, &outcomes);

    let compact = report.to_json(false).unwrap();
    let pretty = report.to_json(true).unwrap();
    assert!(!compact.contains('\n'));
    assert!(pretty.contains('\n'));

    let value: Value = serde_json::from_str(&compact).unwrap();
    assert_eq!(value, serde_json::from_str::<Value>(&pretty).unwrap());
    let sheets = value["sheets"].as_object().unwrap();
    assert_eq!(
        sheets.keys().collect::<Vec<_>>(),
        vec!["Parsed_Joins_Summary", "Join_Validation_Summary", "Spot_Check_1"]
    );
    assert_eq!(value["sheets"]["Spot_Check_1"]["rows"][0][0], json!("Left Table"));
}

#[test]
fn test_descriptors_json() {
    let descriptors = extract_joins(SQL);
    let compact = to_json(&descriptors, false).unwrap();
    let pretty = to_json(descriptors.as_slice(), true).unwrap();
    assert!(!compact.contains('\n'));
    assert!(pretty.contains('\n'));

    let parsed: Vec<JoinDescriptor> = serde_json::from_str(&pretty).unwrap();
    assert_eq!(parsed, descriptors);
    let value: Value = serde_json::from_str(&compact).unwrap();
    assert_eq!(value[1]["flags"][0]["flag"], json!("disjunction"));

    let report = Report::from_outcomes(&descriptors, &[]);
    assert_eq!(report.to_json(true).unwrap(), to_json(&report, true).unwrap());
}
