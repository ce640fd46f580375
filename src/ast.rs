use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Placeholder table name used when the left side of a join cannot be resolved
/// to a table reference (derived tables, subqueries, missing `FROM`).
pub const DERIVED_TABLE: &str = "Derived/Temp";

#[derive(
    PartialEq, Eq, Hash, Clone, Copy, Debug, EnumString, Display, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Keyword {
    And,
    As,
    By,
    Cast,
    Cross,
    Except,
    From,
    Full,
    Group,
    Having,
    Inner,
    Intersect,
    Join,
    Left,
    Limit,
    Not,
    On,
    Or,
    Order,
    Outer,
    Qualify,
    Right,
    Select,
    Union,
    Using,
    Where,
    Window,
    With,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize, Deserialize)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier,
    QuotedIdentifier,
    Literal,
    Punctuation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Normalized content: quotes are stripped from quoted identifiers.
    pub text: String,
    /// Raw source slice.
    pub lexeme: String,
    pub line: u32,
    pub col: u32,
}

impl Token {
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    pub fn keyword(&self) -> Option<Keyword> {
        match self.kind {
            TokenKind::Keyword(keyword) => Some(keyword),
            _ => None,
        }
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.text == punct
    }

    /// Identifiers, quoted identifiers and keywords.
    pub fn is_word(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Identifier | TokenKind::QuotedIdentifier | TokenKind::Keyword(_)
        )
    }

    pub fn is_identifier(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Identifier | TokenKind::QuotedIdentifier
        )
    }

    /// Case-insensitive match of an unquoted identifier, used for non reserved
    /// keywords such as function names.
    pub fn is_non_reserved_keyword(&self, value: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text.eq_ignore_ascii_case(value)
    }
}

#[derive(
    PartialEq, Eq, Hash, Clone, Copy, Debug, Display, AsRefStr, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinType {
    Inner,
    Left,
    LeftOuter,
    Right,
    Full,
}

impl JoinType {
    pub fn sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::LeftOuter => "LEFT OUTER JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
        }
    }
}

/// Something in a join condition that the extractor did not turn into a key
/// pair, or turned into one it cannot vouch for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flag", rename_all = "snake_case")]
pub enum ConditionFlag {
    /// `ON id = b.id`: one side of a column equality has no qualifier.
    UnqualifiedColumn { column: String },
    /// A qualifier that names neither side of the join.
    ForeignQualifier { qualifier: String },
    /// An equality adjacent to `OR`.
    Disjunction { predicate: String },
}

impl std::fmt::Display for ConditionFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionFlag::UnqualifiedColumn { column } => {
                write!(f, "unqualified column `{}`", column)
            }
            ConditionFlag::ForeignQualifier { qualifier } => {
                write!(f, "qualifier `{}` names neither join side", qualifier)
            }
            ConditionFlag::Disjunction { predicate } => {
                write!(f, "equality `{}` is part of a disjunction", predicate)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinDescriptor {
    pub left_table: String,
    pub left_alias: Option<String>,
    pub right_table: String,
    pub right_alias: Option<String>,
    pub join_type: JoinType,
    pub left_keys: Vec<String>,
    pub right_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<ConditionFlag>,
}

impl JoinDescriptor {
    pub fn is_derived(&self) -> bool {
        self.left_table == DERIVED_TABLE || self.right_table == DERIVED_TABLE
    }

    pub fn has_keys(&self) -> bool {
        !self.left_keys.is_empty()
    }

    pub fn key_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.left_keys
            .iter()
            .zip(&self.right_keys)
            .map(|(l, r)| (l.as_str(), r.as_str()))
    }
}
