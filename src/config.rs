use std::path::Path;

use anyhow::anyhow;
use serde::Deserialize;

use crate::binder::ReservedWords;
use crate::parser::JoinExtractor;
use crate::validation::{DEFAULT_SPOT_CHECK_LIMIT, ValidationOptions};

/// Settings read from a TOML file, e.g.
///
/// ```toml
/// extra_reserved_words = ["sample", "tablesample"]
/// spot_check_limit = 10
/// validate_non_inner = false
/// clean = true
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Words that are never read as table aliases, on top of the defaults.
    pub extra_reserved_words: Vec<String>,
    pub spot_check_limit: usize,
    pub validate_non_inner: bool,
    /// Normalize SQL text before extraction.
    pub clean: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extra_reserved_words: vec![],
            spot_check_limit: DEFAULT_SPOT_CHECK_LIMIT,
            validate_non_inner: false,
            clean: true,
        }
    }
}

impl Config {
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str(toml_str).map_err(|err| anyhow!("Failed to parse config due to: {}", err))
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let toml_str = std::fs::read_to_string(path)
            .map_err(|_| anyhow!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&toml_str).map_err(|err| anyhow!("{} ({})", err, path.display()))
    }

    pub fn reserved_words(&self) -> ReservedWords {
        ReservedWords::default().with_words(&self.extra_reserved_words)
    }

    pub fn extractor(&self) -> JoinExtractor {
        JoinExtractor::new(self.reserved_words())
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            spot_check_limit: self.spot_check_limit,
            validate_non_inner: self.validate_non_inner,
        }
    }
}
