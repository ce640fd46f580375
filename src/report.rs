use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;

use crate::ast::JoinDescriptor;
use crate::validation::{SampleRow, ValidationOutcome, ValidationStatus};

pub const PARSED_JOINS_SHEET: &str = "Parsed_Joins_Summary";
pub const VALIDATION_SHEET: &str = "Join_Validation_Summary";
pub const SPOT_CHECK_SHEET_PREFIX: &str = "Spot_Check_";

const DESCRIPTOR_COLUMNS: [&str; 8] = [
    "Left_Table",
    "Left_Alias",
    "Right_Table",
    "Right_Alias",
    "Join_Type",
    "Left_Join_Columns",
    "Right_Join_Columns",
    "Flags",
];

const VALIDATION_COLUMNS: [&str; 8] = [
    "Validation_Status",
    "Anti_Join_Query",
    "Multiplicity_Query",
    "Null_Key_Query",
    "Spot_Check_Query",
    "Missing_Records",
    "Join_Explosion",
    "Null_Join_Keys",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sheet {
    /// Header row. Empty for free-form sheets whose rows carry their own headers.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Multi-sheet tabular document. Sheet order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub sheets: IndexMap<String, Sheet>,
}

fn text(value: impl Into<String>) -> Value {
    Value::String(value.into())
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |value| text(value))
}

fn descriptor_row(descriptor: &JoinDescriptor) -> Vec<Value> {
    vec![
        text(&descriptor.left_table),
        optional_text(descriptor.left_alias.as_deref()),
        text(&descriptor.right_table),
        optional_text(descriptor.right_alias.as_deref()),
        text(descriptor.join_type.sql()),
        text(descriptor.left_keys.join(", ")),
        text(descriptor.right_keys.join(", ")),
        text(
            descriptor
                .flags
                .iter()
                .map(|flag| flag.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        ),
    ]
}

fn count_value(count: Option<u64>) -> Value {
    count.map_or(Value::Null, Value::from)
}

fn spot_check_sheet(outcome: &ValidationOutcome, sample: &[SampleRow]) -> Sheet {
    let descriptor = &outcome.descriptor;
    let mut rows = vec![
        vec![text("Left Table"), text(&descriptor.left_table)],
        vec![text("Right Table"), text(&descriptor.right_table)],
        vec![text("Join Keys"), text(descriptor.left_keys.join(", "))],
        vec![],
    ];
    let header = sample
        .iter()
        .flat_map(|row| row.keys().cloned())
        .collect::<IndexSet<_>>();
    rows.push(header.iter().map(|col| text(col.as_str())).collect());
    for row in sample {
        rows.push(
            header
                .iter()
                .map(|col| row.get(col).cloned().unwrap_or(Value::Null))
                .collect(),
        );
    }
    Sheet {
        columns: vec![],
        rows,
    }
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, name: &str, sheet: Sheet) {
        self.sheets.insert(name.to_owned(), sheet);
    }

    /// Parsed joins summary with each join's validation status; `outcomes`
    /// is matched to `descriptors` by position, missing entries are `Pending`.
    pub fn parsed_joins_sheet(
        descriptors: &[JoinDescriptor],
        outcomes: &[ValidationOutcome],
    ) -> Sheet {
        let mut columns = DESCRIPTOR_COLUMNS.map(String::from).to_vec();
        columns.push("Validation_Status".to_owned());
        let rows = descriptors
            .iter()
            .enumerate()
            .map(|(idx, descriptor)| {
                let mut row = descriptor_row(descriptor);
                row.push(text(
                    outcomes
                        .get(idx)
                        .map_or("Pending".to_owned(), |outcome| outcome.status.to_string()),
                ));
                row
            })
            .collect();
        Sheet { columns, rows }
    }

    pub fn validation_sheet(outcomes: &[ValidationOutcome]) -> Sheet {
        let columns = DESCRIPTOR_COLUMNS
            .iter()
            .chain(&VALIDATION_COLUMNS)
            .map(|col| col.to_string())
            .collect();
        let rows = outcomes
            .iter()
            .map(|outcome| {
                let queries = outcome.queries.as_ref();
                let mut row = descriptor_row(&outcome.descriptor);
                row.extend([
                    text(outcome.status.to_string()),
                    optional_text(queries.map(|q| q.anti_join.as_str())),
                    optional_text(queries.map(|q| q.multiplicity.as_str())),
                    optional_text(queries.map(|q| q.null_keys.as_str())),
                    optional_text(queries.map(|q| q.spot_check.as_str())),
                    count_value(outcome.missing_records),
                    count_value(outcome.join_explosion),
                    count_value(outcome.null_join_keys),
                ]);
                row
            })
            .collect();
        Sheet { columns, rows }
    }

    /// The full report: parsed joins, validation summary and one spot-check
    /// sheet per validated join that has a sample.
    pub fn from_outcomes(descriptors: &[JoinDescriptor], outcomes: &[ValidationOutcome]) -> Self {
        let mut report = Report::new();
        report.add_sheet(
            PARSED_JOINS_SHEET,
            Self::parsed_joins_sheet(descriptors, outcomes),
        );
        report.add_sheet(VALIDATION_SHEET, Self::validation_sheet(outcomes));

        let samples = outcomes.iter().filter_map(|outcome| {
            match (&outcome.status, &outcome.spot_check) {
                (ValidationStatus::Validated, Some(sample)) => Some((outcome, sample)),
                _ => None,
            }
        });
        for (idx, (outcome, sample)) in samples.enumerate() {
            report.add_sheet(
                &format!("{}{}", SPOT_CHECK_SHEET_PREFIX, idx + 1),
                spot_check_sheet(outcome, sample),
            );
        }
        report
    }

    pub fn to_json(&self, pretty: bool) -> anyhow::Result<String> {
        to_json(self, pretty)
    }
}

/// Serializes any CLI output, pretty-printed on request.
pub fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> anyhow::Result<String> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(out)
}
