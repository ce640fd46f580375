use std::path::Path;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Answers whether tables and columns exist in the warehouse. Join validation
/// skips descriptors whose tables the oracle does not know.
pub trait SchemaOracle {
    fn table_exists(&self, database: &str, schema: &str, table: &str) -> anyhow::Result<bool>;

    /// `Ok(None)` when the oracle has no column information for the table.
    fn column_exists(
        &self,
        _database: &str,
        _schema: &str,
        _table: &str,
        _column: &str,
    ) -> anyhow::Result<Option<bool>> {
        Ok(None)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub dtype: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SchemaObjectKind {
    Table {
        #[serde(default)]
        columns: Vec<Column>,
    },
    View {
        #[serde(default)]
        columns: Vec<Column>,
    },
}

impl SchemaObjectKind {
    pub fn columns(&self) -> &[Column] {
        match self {
            SchemaObjectKind::Table { columns } | SchemaObjectKind::View { columns } => columns,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct SchemaObject {
    pub name: String, // database.schema.name
    pub kind: SchemaObjectKind,
}

/// Static schema snapshot, e.g. exported from `INFORMATION_SCHEMA`.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Catalog {
    pub schema_objects: Vec<SchemaObject>,
}

impl Catalog {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| anyhow!("Failed to parse JSON catalog due to error: {}", err))
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|_| anyhow!("Failed to read catalog file: {}", path.display()))?;
        Self::from_json_str(&json).map_err(|err| anyhow!("{} ({})", err, path.display()))
    }

    /// Case-insensitive lookup of `database.schema.table`. Later duplicates win.
    fn find(&self, database: &str, schema: &str, table: &str) -> Option<&SchemaObject> {
        let name = format!("{}.{}.{}", database, schema, table);
        self.schema_objects
            .iter()
            .rev()
            .find(|obj| obj.name.eq_ignore_ascii_case(&name))
    }
}

impl SchemaOracle for Catalog {
    fn table_exists(&self, database: &str, schema: &str, table: &str) -> anyhow::Result<bool> {
        Ok(self.find(database, schema, table).is_some())
    }

    fn column_exists(
        &self,
        database: &str,
        schema: &str,
        table: &str,
        column: &str,
    ) -> anyhow::Result<Option<bool>> {
        let Some(obj) = self.find(database, schema, table) else {
            return Ok(None);
        };
        let columns = obj.kind.columns();
        if columns.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            columns.iter().any(|col| col.name.eq_ignore_ascii_case(column)),
        ))
    }
}
