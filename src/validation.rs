use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, bail};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::ast::{JoinDescriptor, JoinType};
use crate::catalog::SchemaOracle;

pub const DEFAULT_SPOT_CHECK_LIMIT: usize = 20;

/// One row of a spot-check sample, column name to value.
pub type SampleRow = IndexMap<String, serde_json::Value>;

/// Runs read-only validation queries against the warehouse.
pub trait ValidationExecutor {
    /// Runs a query returning a single scalar count. `Ok(None)` for `NULL`.
    fn count(&mut self, sql: &str) -> anyhow::Result<Option<u64>>;

    fn sample(&mut self, sql: &str) -> anyhow::Result<Vec<SampleRow>>;
}

/// Fully qualified `database.schema.table` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl FromStr for TableName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .trim()
            .split('.')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>();
        match parts.as_slice() {
            [database, schema, table] => Ok(TableName {
                database: database.to_string(),
                schema: schema.to_string(),
                table: table.to_string(),
            }),
            _ => bail!("Invalid table name format: {}", s),
        }
    }
}

impl Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.table)
    }
}

/// `alias.column`, with the column double-quoted when it is not a plain
/// lower-case identifier.
pub fn quote_column(alias: &str, column: &str) -> String {
    let is_lower =
        column.chars().any(char::is_lowercase) && !column.chars().any(char::is_uppercase);
    let needs_quotes = !is_lower || column.contains([' ', '-', '#', '$']);
    let column = if needs_quotes {
        format!("\"{}\"", column.replace('"', "\"\""))
    } else {
        column.to_owned()
    };
    if alias.is_empty() {
        column
    } else {
        format!("{}.{}", alias, column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationQueries {
    pub anti_join: String,
    pub multiplicity: String,
    pub null_keys: String,
    pub spot_check: String,
}

impl ValidationQueries {
    /// Left side is aliased `a`, right side `b`.
    pub fn new(
        left_table: &str,
        right_table: &str,
        key_pairs: &[(&str, &str)],
        spot_check_limit: usize,
    ) -> Self {
        let join_condition = key_pairs
            .iter()
            .map(|(l, r)| format!("{} = {}", quote_column("a", l), quote_column("b", r)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let left_columns = key_pairs
            .iter()
            .map(|(l, _)| quote_column("a", l))
            .collect::<Vec<_>>()
            .join(", ");
        let right_missing = key_pairs
            .iter()
            .map(|(_, r)| format!("{} IS NULL", quote_column("b", r)))
            .collect::<Vec<_>>()
            .join(" AND ");
        let left_null = key_pairs
            .iter()
            .map(|(l, _)| format!("{} IS NULL", quote_column("a", l)))
            .collect::<Vec<_>>()
            .join(" OR ");

        let anti_join = format!(
            "SELECT COUNT(*)\nFROM (\n    SELECT {left_columns}\n    FROM {left_table} a\n    \
             LEFT JOIN {right_table} b\n      ON {join_condition}\n    WHERE {right_missing}\n)"
        );
        let multiplicity = format!(
            "SELECT SUM(multi_count - 1)\nFROM (\n    SELECT COUNT(*) AS multi_count\n    \
             FROM {left_table} a\n    JOIN {right_table} b\n      ON {join_condition}\n    \
             GROUP BY {left_columns}\n)"
        );
        let null_keys = format!("SELECT COUNT(*)\nFROM {left_table} a\nWHERE {left_null}");
        let spot_check = format!(
            "SELECT a.*, b.*\nFROM {left_table} a\nJOIN {right_table} b\n  ON {join_condition}\n\
             LIMIT {spot_check_limit}"
        );
        Self {
            anti_join,
            multiplicity,
            null_keys,
            spot_check,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationStatus {
    /// Queries rendered but not executed.
    Planned,
    Validated,
    Skipped(String),
    Failed(String),
}

impl Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationStatus::Planned => write!(f, "Planned"),
            ValidationStatus::Validated => write!(f, "Validated"),
            ValidationStatus::Skipped(reason) => write!(f, "Skipped - {}", reason),
            ValidationStatus::Failed(reason) => write!(f, "Failed - {}", reason),
        }
    }
}

impl Serialize for ValidationStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOptions {
    pub spot_check_limit: usize,
    /// Validate LEFT/RIGHT/FULL joins as well. Anti-join counts of outer joins
    /// are expected to be non-zero, so they are skipped by default.
    pub validate_non_inner: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            spot_check_limit: DEFAULT_SPOT_CHECK_LIMIT,
            validate_non_inner: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub descriptor: JoinDescriptor,
    pub status: ValidationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queries: Option<ValidationQueries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_records: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_explosion: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub null_join_keys: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_check: Option<Vec<SampleRow>>,
}

impl ValidationOutcome {
    fn new(descriptor: &JoinDescriptor, status: ValidationStatus) -> Self {
        Self {
            descriptor: descriptor.clone(),
            status,
            queries: None,
            missing_records: None,
            join_explosion: None,
            null_join_keys: None,
            spot_check: None,
        }
    }
}

enum Plan {
    Ready(ValidationQueries),
    Skipped(String),
}

fn check_columns(
    oracle: &dyn SchemaOracle,
    table: &TableName,
    columns: &[String],
) -> anyhow::Result<Option<String>> {
    for column in columns {
        let exists =
            oracle.column_exists(&table.database, &table.schema, &table.table, column)?;
        if exists == Some(false) {
            return Ok(Some(format!("Unknown join key column {}.{}", table, column)));
        }
    }
    Ok(None)
}

fn plan(
    descriptor: &JoinDescriptor,
    oracle: &dyn SchemaOracle,
    options: &ValidationOptions,
) -> anyhow::Result<Plan> {
    if descriptor.join_type != JoinType::Inner && !options.validate_non_inner {
        return Ok(Plan::Skipped("Non-Inner Join".to_owned()));
    }
    if descriptor.is_derived() {
        return Ok(Plan::Skipped("Derived/Temp table".to_owned()));
    }
    if !descriptor.has_keys() {
        return Ok(Plan::Skipped("No equality keys".to_owned()));
    }
    let (left, right) = match (
        descriptor.left_table.parse::<TableName>(),
        descriptor.right_table.parse::<TableName>(),
    ) {
        (Ok(left), Ok(right)) => (left, right),
        (Err(err), _) | (_, Err(err)) => return Ok(Plan::Skipped(err.to_string())),
    };

    for table in [&left, &right] {
        if !oracle.table_exists(&table.database, &table.schema, &table.table)? {
            return Ok(Plan::Skipped("Temp/Derived Table (Not Found)".to_owned()));
        }
    }
    if let Some(reason) = check_columns(oracle, &left, &descriptor.left_keys)? {
        return Ok(Plan::Skipped(reason));
    }
    if let Some(reason) = check_columns(oracle, &right, &descriptor.right_keys)? {
        return Ok(Plan::Skipped(reason));
    }

    let key_pairs = descriptor.key_pairs().collect::<Vec<_>>();
    Ok(Plan::Ready(ValidationQueries::new(
        &left.to_string(),
        &right.to_string(),
        &key_pairs,
        options.spot_check_limit,
    )))
}

fn outcome_from_plan(
    descriptor: &JoinDescriptor,
    oracle: &dyn SchemaOracle,
    options: &ValidationOptions,
) -> Result<ValidationQueries, ValidationOutcome> {
    match plan(descriptor, oracle, options) {
        Ok(Plan::Ready(queries)) => Ok(queries),
        Ok(Plan::Skipped(reason)) => {
            log::info!(
                "Skipped {} {} {}: {}",
                descriptor.left_table,
                descriptor.join_type.sql(),
                descriptor.right_table,
                reason
            );
            Err(ValidationOutcome::new(
                descriptor,
                ValidationStatus::Skipped(reason),
            ))
        }
        Err(err) => {
            log::warn!("Schema lookup failed for {:?}: {}", descriptor, err);
            Err(ValidationOutcome::new(
                descriptor,
                ValidationStatus::Failed(err.to_string()),
            ))
        }
    }
}

/// Decides whether `descriptor` can be validated and renders its queries
/// without running them.
pub fn plan_validation(
    descriptor: &JoinDescriptor,
    oracle: &dyn SchemaOracle,
    options: &ValidationOptions,
) -> ValidationOutcome {
    match outcome_from_plan(descriptor, oracle, options) {
        Ok(queries) => ValidationOutcome {
            queries: Some(queries),
            ..ValidationOutcome::new(descriptor, ValidationStatus::Planned)
        },
        Err(outcome) => outcome,
    }
}

fn run_counts(
    executor: &mut dyn ValidationExecutor,
    queries: &ValidationQueries,
) -> anyhow::Result<(u64, u64, u64)> {
    log::debug!("Executing anti-join query:\n{}", queries.anti_join);
    let missing = executor.count(&queries.anti_join)?.unwrap_or(0);
    log::debug!("Executing multiplicity query:\n{}", queries.multiplicity);
    let explosion = executor.count(&queries.multiplicity)?.unwrap_or(0);
    log::debug!("Executing null key query:\n{}", queries.null_keys);
    let null_keys = executor
        .count(&queries.null_keys)?
        .ok_or_else(|| anyhow!("Null key query returned no count"))?;
    Ok((missing, explosion, null_keys))
}

/// Validates one join: existence checks through `oracle`, then the anti-join,
/// multiplicity and null-key counts and a spot-check sample through
/// `executor`. Never fails: errors become a `Failed` status.
pub fn validate_join(
    descriptor: &JoinDescriptor,
    oracle: &dyn SchemaOracle,
    executor: &mut dyn ValidationExecutor,
    options: &ValidationOptions,
) -> ValidationOutcome {
    let queries = match outcome_from_plan(descriptor, oracle, options) {
        Ok(queries) => queries,
        Err(outcome) => return outcome,
    };

    let (missing, explosion, null_keys) = match run_counts(executor, &queries) {
        Ok(counts) => counts,
        Err(err) => {
            log::warn!(
                "Validation failed for {} {} {}: {}",
                descriptor.left_table,
                descriptor.join_type.sql(),
                descriptor.right_table,
                err
            );
            return ValidationOutcome {
                queries: Some(queries),
                ..ValidationOutcome::new(descriptor, ValidationStatus::Failed(err.to_string()))
            };
        }
    };

    let spot_check = match executor.sample(&queries.spot_check) {
        Ok(rows) => Some(rows),
        Err(err) => {
            log::warn!("Failed to capture spot check sample: {}", err);
            None
        }
    };

    ValidationOutcome {
        descriptor: descriptor.clone(),
        status: ValidationStatus::Validated,
        queries: Some(queries),
        missing_records: Some(missing),
        join_explosion: Some(explosion),
        null_join_keys: Some(null_keys),
        spot_check,
    }
}

pub fn validate_joins(
    descriptors: &[JoinDescriptor],
    oracle: &dyn SchemaOracle,
    executor: &mut dyn ValidationExecutor,
    options: &ValidationOptions,
) -> Vec<ValidationOutcome> {
    descriptors
        .iter()
        .map(|descriptor| validate_join(descriptor, oracle, executor, options))
        .collect()
}
