use std::fmt::Display;

use serde::Deserialize;

use crate::ast::{ConditionFlag, JoinDescriptor, JoinType};

pub const EXTRACTION_TESTS_FILE: &str = "tests/extraction_tests.toml";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TestJoin {
    pub left_table: String,
    pub left_alias: Option<String>,
    pub right_table: String,
    pub right_alias: Option<String>,
    pub join_type: JoinType,
    pub left_keys: Vec<String>,
    pub right_keys: Vec<String>,
    #[serde(default)]
    pub flags: Vec<ConditionFlag>,
}

impl From<&JoinDescriptor> for TestJoin {
    fn from(descriptor: &JoinDescriptor) -> Self {
        Self {
            left_table: descriptor.left_table.clone(),
            left_alias: descriptor.left_alias.clone(),
            right_table: descriptor.right_table.clone(),
            right_alias: descriptor.right_alias.clone(),
            join_type: descriptor.join_type,
            left_keys: descriptor.left_keys.clone(),
            right_keys: descriptor.right_keys.clone(),
            flags: descriptor.flags.clone(),
        }
    }
}

impl Display for TestJoin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:?}) {} {} ({:?}) ON {:?} = {:?}",
            self.left_table,
            self.left_alias,
            self.join_type.sql(),
            self.right_table,
            self.right_alias,
            self.left_keys,
            self.right_keys
        )
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct TestExtraction {
    pub name: String,
    pub sql: String,
    #[serde(default)]
    pub joins: Vec<TestJoin>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TestExtractionData {
    pub tests: Vec<TestExtraction>,
}
