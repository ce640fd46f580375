use crate::ast::{ConditionFlag, Keyword, Token, TokenKind};

/// Single argument scalar functions that do not change which column a join
/// key refers to.
const STRIPPED_FUNCTIONS: [&str; 3] = ["trim", "upper", "lower"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub column: String,
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}.{}", qualifier, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionKeys {
    pub left_keys: Vec<String>,
    pub right_keys: Vec<String>,
    pub flags: Vec<ConditionFlag>,
}

impl ConditionKeys {
    /// `USING (c1, c2)`: the same column names on both sides.
    pub fn using(columns: Vec<String>) -> Self {
        Self {
            left_keys: columns.clone(),
            right_keys: columns,
            flags: vec![],
        }
    }
}

/// Index of the `)` matching the `(` at `open`.
pub(crate) fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, tok) in tokens.iter().enumerate().skip(open) {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(idx);
            }
        }
    }
    None
}

/// Position of the first token satisfying `pred` outside of nested parentheses.
fn find_top_level(tokens: &[Token], pred: impl Fn(&Token) -> bool) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, tok) in tokens.iter().enumerate() {
        if tok.is_punct("(") {
            depth += 1;
        } else if tok.is_punct(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && pred(tok) {
            return Some(idx);
        }
    }
    None
}

/// The operand of a strippable call, given the function name token and the
/// tokens between its parentheses.
fn stripped_operand<'a>(name: &Token, args: &'a [Token]) -> Option<&'a [Token]> {
    if args.is_empty() {
        return None;
    }
    if name.is_keyword(Keyword::Cast) {
        let as_idx = find_top_level(args, |tok| tok.is_keyword(Keyword::As))?;
        return (as_idx > 0).then(|| &args[..as_idx]);
    }
    let strippable = STRIPPED_FUNCTIONS
        .iter()
        .any(|func| name.is_non_reserved_keyword(func));
    if strippable && find_top_level(args, |tok| tok.is_punct(",")).is_none() {
        Some(args)
    } else {
        None
    }
}

/// Replaces `TRIM(x)`, `UPPER(x)`, `LOWER(x)` and `CAST(x AS type)` with `x`,
/// recursively. Any other call is left untouched.
pub fn strip_functions(tokens: &[Token]) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut idx = 0;
    while idx < tokens.len() {
        let tok = &tokens[idx];
        let is_call = tokens.get(idx + 1).is_some_and(|next| next.is_punct("("))
            && !idx
                .checked_sub(1)
                .is_some_and(|prev| tokens[prev].is_punct("."));
        if is_call {
            if let Some(close) = matching_paren(tokens, idx + 1) {
                if let Some(operand) = stripped_operand(tok, &tokens[idx + 2..close]) {
                    out.extend(strip_functions(operand));
                    idx = close + 1;
                    continue;
                }
            }
        }
        out.push(tok.clone());
        idx += 1;
    }
    out
}

fn is_literal_word(tok: &Token) -> bool {
    ["null", "true", "false"]
        .iter()
        .any(|word| tok.is_non_reserved_keyword(word))
}

fn is_segment(tok: &Token, after_dot: bool) -> bool {
    match tok.kind {
        TokenKind::Identifier => after_dot || !is_literal_word(tok),
        TokenKind::QuotedIdentifier => true,
        TokenKind::Keyword(_) => after_dot,
        TokenKind::Literal | TokenKind::Punctuation => false,
    }
}

fn column_ref(segments: &[Token]) -> ColumnRef {
    let (column, qualifier) = segments
        .split_last()
        .map(|(last, rest)| (last.text.clone(), rest))
        .unwrap_or_default();
    ColumnRef {
        qualifier: (!qualifier.is_empty()).then(|| {
            qualifier
                .iter()
                .map(|tok| tok.text.as_str())
                .collect::<Vec<_>>()
                .join(".")
        }),
        column,
    }
}

/// Dotted path ending right before `end`: returns its start and its segments.
fn path_ending_at(tokens: &[Token], end: usize) -> Option<(usize, ColumnRef)> {
    let mut start = end.checked_sub(1)?;
    let mut after_dot = start > 0 && tokens[start - 1].is_punct(".");
    if !is_segment(&tokens[start], after_dot) {
        return None;
    }
    while after_dot && start >= 2 {
        let prev_after_dot = start >= 3 && tokens[start - 3].is_punct(".");
        if !is_segment(&tokens[start - 2], prev_after_dot) {
            return None;
        }
        start -= 2;
        after_dot = prev_after_dot;
    }
    if after_dot {
        // a leading dot without a qualifier
        return None;
    }
    let segments = tokens[start..end]
        .iter()
        .filter(|tok| !tok.is_punct("."))
        .cloned()
        .collect::<Vec<_>>();
    Some((start, column_ref(&segments)))
}

/// Dotted path starting at `start`: returns the index past it and its segments.
fn path_starting_at(tokens: &[Token], start: usize) -> Option<(usize, ColumnRef)> {
    let mut end = start;
    let mut segments = vec![];
    loop {
        let tok = tokens.get(end)?;
        if !is_segment(tok, !segments.is_empty()) {
            return None;
        }
        segments.push(tok.clone());
        end += 1;
        let continues = tokens.get(end).is_some_and(|tok| tok.is_punct("."))
            && tokens.get(end + 1).is_some_and(|tok| is_segment(tok, true));
        if !continues {
            break;
        }
        end += 1;
    }
    if tokens.get(end).is_some_and(|tok| tok.is_punct("(")) {
        // function call
        return None;
    }
    Some((end, column_ref(&segments)))
}

fn is_boundary(tok: Option<&Token>) -> bool {
    match tok {
        None => true,
        Some(tok) => {
            tok.is_punct("(")
                || tok.is_punct(")")
                || tok.is_keyword(Keyword::And)
                || tok.is_keyword(Keyword::Or)
        }
    }
}

fn qualifier_matches(qualifier: &str, sides: &[&str]) -> bool {
    sides.is_empty() || sides.iter().any(|side| side.eq_ignore_ascii_case(qualifier))
}

/// Extracts the ordered equality key pairs of a join condition.
///
/// `sides` are the names (aliases and table references) the two join
/// operands can be referred to with; qualifiers naming anything else are
/// flagged. An empty `sides` disables the check.
pub fn extract_condition(condition: &[Token], sides: &[&str]) -> ConditionKeys {
    let tokens = strip_functions(condition);
    let mut keys = ConditionKeys::default();

    for (idx, tok) in tokens.iter().enumerate() {
        if !tok.is_punct("=") {
            continue;
        }
        let Some((left_start, left)) = path_ending_at(&tokens, idx) else {
            continue;
        };
        let Some((right_end, right)) = path_starting_at(&tokens, idx + 1) else {
            continue;
        };
        let before = left_start.checked_sub(1).map(|i| &tokens[i]);
        let after = tokens.get(right_end);
        if !is_boundary(before) || !is_boundary(after) {
            continue;
        }

        let predicate = format!("{} = {}", left, right);
        if before.is_some_and(|tok| tok.is_keyword(Keyword::Or))
            || after.is_some_and(|tok| tok.is_keyword(Keyword::Or))
        {
            log::warn!("Ignoring equality `{}` joined with OR", predicate);
            keys.flags.push(ConditionFlag::Disjunction { predicate });
            continue;
        }

        let unqualified = [&left, &right]
            .into_iter()
            .filter(|col| col.qualifier.is_none())
            .map(|col| col.column.clone())
            .collect::<Vec<_>>();
        if !unqualified.is_empty() {
            log::warn!("Ignoring equality `{}` with unqualified columns", predicate);
            keys.flags.extend(
                unqualified
                    .into_iter()
                    .map(|column| ConditionFlag::UnqualifiedColumn { column }),
            );
            continue;
        }

        for qualifier in [&left, &right]
            .into_iter()
            .filter_map(|col| col.qualifier.as_deref())
        {
            if !qualifier_matches(qualifier, sides) {
                log::warn!(
                    "Qualifier `{}` in `{}` names neither side of the join",
                    qualifier,
                    predicate
                );
                keys.flags.push(ConditionFlag::ForeignQualifier {
                    qualifier: qualifier.to_owned(),
                });
            }
        }

        keys.left_keys.push(left.column);
        keys.right_keys.push(right.column);
    }
    keys
}
