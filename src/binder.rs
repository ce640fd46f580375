use std::collections::HashSet;

use indexmap::IndexMap;

use crate::ast::Token;

/// Words that may directly follow a table reference without being its alias.
const BASE_RESERVED_WORDS: [&str; 12] = [
    "ON", "WHERE", "GROUP", "ORDER", "JOIN", "INNER", "LEFT", "RIGHT", "OUTER", "BY", "SELECT",
    "FROM",
];

const EXTENDED_RESERVED_WORDS: [&str; 10] = [
    "FULL",
    "CROSS",
    "USING",
    "HAVING",
    "LIMIT",
    "UNION",
    "QUALIFY",
    "WINDOW",
    "EXCEPT",
    "INTERSECT",
];

/// The alias-vs-keyword heuristic: a word following a table reference is its
/// alias unless it belongs to this set. Stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedWords {
    words: HashSet<String>,
}

impl Default for ReservedWords {
    fn default() -> Self {
        Self::from_words(BASE_RESERVED_WORDS.iter().chain(&EXTENDED_RESERVED_WORDS))
    }
}

impl ReservedWords {
    /// Only the minimal clause/join keyword set.
    pub fn base() -> Self {
        Self::from_words(BASE_RESERVED_WORDS.iter())
    }

    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|word| word.as_ref().to_uppercase())
                .collect(),
        }
    }

    pub fn with_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.words
            .extend(words.into_iter().map(|word| word.as_ref().to_uppercase()));
        self
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_uppercase())
    }

    /// Whether `token` can be read as an alias.
    pub fn is_alias_candidate(&self, token: &Token) -> bool {
        token.is_word() && !self.contains(&token.text)
    }
}

/// Alias (or bare table reference) to table reference, for one statement.
/// Insertion ordered so that dumps are deterministic.
#[derive(Debug, Default, Clone)]
pub struct AliasBinder {
    bindings: IndexMap<String, String>,
}

impl AliasBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `alias -> table`, or `table -> table` when no alias is given.
    /// Returns the key the table can be looked up with.
    pub fn bind(&mut self, table: &str, alias: Option<&str>) -> String {
        let key = alias.unwrap_or(table).to_owned();
        log::debug!("Binding `{}` -> `{}`", key, table);
        self.bindings.insert(key.clone(), table.to_owned());
        key
    }

    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.bindings.get(key).map(String::as_str)
    }

    pub fn bindings(&self) -> &IndexMap<String, String> {
        &self.bindings
    }
}
