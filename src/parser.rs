use rayon::prelude::*;

use crate::ast::{DERIVED_TABLE, JoinDescriptor, JoinType, Keyword, Token};
use crate::binder::{AliasBinder, ReservedWords};
use crate::condition::{ConditionKeys, extract_condition, matching_paren};
use crate::scanner::tokenize;

/// Keywords that end a join condition (besides the join keywords themselves).
const CLAUSE_BOUNDARIES: [Keyword; 12] = [
    Keyword::Where,
    Keyword::Group,
    Keyword::Order,
    Keyword::Having,
    Keyword::Limit,
    Keyword::Union,
    Keyword::Qualify,
    Keyword::Window,
    Keyword::Except,
    Keyword::Intersect,
    Keyword::Select,
    Keyword::From,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
    Conditional(JoinType),
    Cross,
}

/// A join operand as written: a table reference, an alias, or both. Derived
/// tables only have an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Operand {
    table: Option<String>,
    alias: Option<String>,
}

impl Operand {
    fn derived(alias: Option<String>) -> Self {
        Self { table: None, alias }
    }

    fn lookup_key(&self) -> Option<&str> {
        self.alias.as_deref().or(self.table.as_deref())
    }
}

#[derive(Debug, Clone)]
struct PendingJoin {
    join_type: JoinType,
    right_table: String,
    right_alias: Option<String>,
}

#[derive(Debug)]
enum ScanState {
    /// Looking for `FROM` or a join keyword.
    Scanning,
    /// Consumed a join keyword, expecting a table and an optional alias.
    AwaitingRightTable(JoinKind),
    /// Skipping to `ON`/`USING` or the next boundary.
    AwaitingOn(PendingJoin),
    /// Accumulating the condition tokens that start at `start`.
    CapturingCondition { pending: PendingJoin, start: usize },
}

/// Extracts the join topology of SQL statements.
///
/// The extractor holds no state between calls: every [`JoinExtractor::extract`]
/// call scans its own token sequence with a fresh alias binder, so an
/// extractor can be shared between threads.
#[derive(Debug, Clone, Default)]
pub struct JoinExtractor {
    reserved_words: ReservedWords,
}

impl JoinExtractor {
    pub fn new(reserved_words: ReservedWords) -> Self {
        Self { reserved_words }
    }

    pub fn reserved_words(&self) -> &ReservedWords {
        &self.reserved_words
    }

    pub fn extract(&self, sql: &str) -> Vec<JoinDescriptor> {
        log::debug!("Extracting joins from {}", sql.chars().take(50).collect::<String>());
        let tokens = tokenize(sql);
        log::debug!("Tokens:");
        tokens.iter().for_each(|tok| log::debug!("{:?}", tok));
        self.extract_tokens(&tokens)
    }

    pub fn extract_tokens(&self, tokens: &[Token]) -> Vec<JoinDescriptor> {
        let mut scan = Scan::new(tokens, &self.reserved_words);
        let mut state = ScanState::Scanning;
        while scan.pos < tokens.len() {
            state = match state {
                ScanState::Scanning => scan.scanning(),
                ScanState::AwaitingRightTable(kind) => scan.awaiting_right_table(kind),
                ScanState::AwaitingOn(pending) => scan.awaiting_on(pending),
                ScanState::CapturingCondition { pending, start } => {
                    scan.capturing_condition(pending, start)
                }
            };
        }
        // input ended inside a join
        match state {
            ScanState::AwaitingOn(pending) => scan.emit(pending, ConditionKeys::default()),
            ScanState::CapturingCondition { pending, start } => {
                let keys = scan.condition_keys(&pending, start, tokens.len());
                scan.emit(pending, keys);
            }
            ScanState::Scanning | ScanState::AwaitingRightTable(_) => {}
        }
        scan.descriptors
    }
}

/// Scan state for one call: cursor, parenthesis depth, alias bindings and
/// the left operand the next join chains onto.
struct Scan<'a> {
    tokens: &'a [Token],
    reserved_words: &'a ReservedWords,
    pos: usize,
    depth: usize,
    /// Depths at which a `FROM (...)` derived table was opened.
    derived_groups: Vec<usize>,
    binder: AliasBinder,
    current_left: Option<Operand>,
    descriptors: Vec<JoinDescriptor>,
}

impl<'a> Scan<'a> {
    fn new(tokens: &'a [Token], reserved_words: &'a ReservedWords) -> Self {
        Self {
            tokens,
            reserved_words,
            pos: 0,
            depth: 0,
            derived_groups: vec![],
            binder: AliasBinder::new(),
            current_left: None,
            descriptors: vec![],
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.peek_next_i(0)
    }

    fn peek_next_i(&self, i: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + i)
    }

    fn check_keyword_at(&self, i: usize, keyword: Keyword) -> bool {
        self.peek_next_i(i).is_some_and(|tok| tok.is_keyword(keyword))
    }

    fn match_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword_at(0, keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn match_punct(&mut self, punct: &str) -> bool {
        if self.peek().is_some_and(|tok| tok.is_punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // join_op -> ["INNER"] "JOIN" | "LEFT" ["OUTER"] "JOIN" | "RIGHT" ["OUTER"] "JOIN"
    //          | "FULL" ["OUTER"] "JOIN" | "CROSS" "JOIN"
    fn join_kind_at_cursor(&self) -> Option<(JoinKind, usize)> {
        let tok = self.peek()?;
        let outer = self.check_keyword_at(1, Keyword::Outer);
        let join_at = |i| self.check_keyword_at(i, Keyword::Join);
        match tok.keyword()? {
            Keyword::Join => Some((JoinKind::Conditional(JoinType::Inner), 1)),
            Keyword::Inner if join_at(1) => Some((JoinKind::Conditional(JoinType::Inner), 2)),
            Keyword::Left if outer && join_at(2) => {
                Some((JoinKind::Conditional(JoinType::LeftOuter), 3))
            }
            Keyword::Left if join_at(1) => Some((JoinKind::Conditional(JoinType::Left), 2)),
            Keyword::Right if outer && join_at(2) => {
                Some((JoinKind::Conditional(JoinType::Right), 3))
            }
            Keyword::Right if join_at(1) => Some((JoinKind::Conditional(JoinType::Right), 2)),
            Keyword::Full if outer && join_at(2) => {
                Some((JoinKind::Conditional(JoinType::Full), 3))
            }
            Keyword::Full if join_at(1) => Some((JoinKind::Conditional(JoinType::Full), 2)),
            Keyword::Cross if join_at(1) => Some((JoinKind::Cross, 2)),
            _ => None,
        }
    }

    /// Whether the cursor is on something that ends the current join clause.
    fn at_boundary(&self) -> bool {
        let Some(tok) = self.peek() else {
            return true;
        };
        tok.is_punct(";")
            || tok
                .keyword()
                .is_some_and(|keyword| CLAUSE_BOUNDARIES.contains(&keyword))
            || self.join_kind_at_cursor().is_some()
    }

    /// Number of consecutive `(` at the cursor.
    fn opening_parens(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len())..]
            .iter()
            .take_while(|tok| tok.is_punct("("))
            .count()
    }

    // table_ref -> identifier ("." word)*
    fn parse_table_ref(&mut self) -> Option<String> {
        let first = self.peek().filter(|tok| tok.is_identifier())?;
        let mut parts = vec![first.text.as_str()];
        self.pos += 1;
        while let (Some(dot), Some(part)) = (self.peek(), self.peek_next_i(1)) {
            if !dot.is_punct(".") || !part.is_word() {
                break;
            }
            parts.push(part.text.as_str());
            self.pos += 2;
        }
        Some(parts.join("."))
    }

    // as_alias -> ["AS"] alias
    fn parse_alias(&mut self) -> Option<String> {
        self.match_keyword(Keyword::As);
        let tok = self.peek()?;
        if self.reserved_words.is_alias_candidate(tok) {
            self.pos += 1;
            Some(tok.text.clone())
        } else {
            None
        }
    }

    /// Skips the parenthesized group starting at the cursor.
    fn skip_group(&mut self) {
        self.pos = matching_paren(self.tokens, self.pos)
            .map(|close| close + 1)
            .unwrap_or(self.tokens.len());
    }

    /// Consumes tokens up to the next join keyword or clause boundary outside
    /// of nested parentheses, or up to a `)` closing an enclosing group.
    fn skip_to_boundary(&mut self) {
        while let Some(tok) = self.peek() {
            if tok.is_punct("(") {
                self.skip_group();
                continue;
            }
            if tok.is_punct(")") || tok.is_punct(",") || self.at_boundary() {
                break;
            }
            self.pos += 1;
        }
    }

    /// A subquery or table function operand: no descriptor is emitted, its
    /// alias becomes an unbound left operand for what follows.
    fn skip_derived_operand(&mut self) {
        if self.peek().is_some_and(|tok| tok.is_punct("(")) {
            self.skip_group();
        } else {
            // bare `SELECT` with no parentheses: nothing sensible to skip to
            self.pos += 1;
        }
        let alias = self.parse_alias();
        log::debug!("Skipping derived join operand (alias: {:?})", alias);
        self.current_left = Some(Operand::derived(alias));
    }

    fn scanning(&mut self) -> ScanState {
        let Some(tok) = self.peek() else {
            return ScanState::Scanning;
        };

        if let Some((kind, len)) = self.join_kind_at_cursor() {
            self.pos += len;
            return ScanState::AwaitingRightTable(kind);
        }

        if tok.is_punct("(") {
            self.depth += 1;
            self.pos += 1;
        } else if tok.is_punct(")") {
            self.depth = self.depth.saturating_sub(1);
            self.pos += 1;
            if self.derived_groups.last() == Some(&self.depth) {
                self.derived_groups.pop();
                let alias = self.parse_alias();
                log::debug!("Derived table closed (alias: {:?})", alias);
                self.current_left = Some(Operand::derived(alias));
                if self.match_punct(",") {
                    self.parse_from_items();
                }
            }
        } else if tok.is_punct(";") {
            // next statement
            self.pos += 1;
            self.binder = AliasBinder::new();
            self.current_left = None;
            self.derived_groups.clear();
            self.depth = 0;
        } else if tok.is_keyword(Keyword::From) {
            self.pos += 1;
            self.parse_from_items();
        } else {
            self.pos += 1;
        }
        ScanState::Scanning
    }

    // from_items -> from_item ("," from_item)*
    // from_item -> table_ref [as_alias] | "(" from_item ... ")" | "(" ...
    fn parse_from_items(&mut self) {
        loop {
            let opening = self.opening_parens();
            if opening > 0 {
                if self
                    .peek_next_i(opening)
                    .is_some_and(|tok| tok.is_identifier())
                {
                    // parenthesized join: its tables are bound as usual and
                    // its closing parens leave the chain untouched
                    self.depth += opening;
                    self.pos += opening;
                    continue;
                }
                // scanned as a nested scope; its alias is read when it closes
                self.derived_groups.push(self.depth);
                return;
            }
            let Some(table) = self.parse_table_ref() else {
                return;
            };
            if self.peek().is_some_and(|tok| tok.is_punct("(")) {
                // table function
                self.skip_derived_operand();
            } else {
                let alias = self.parse_alias();
                self.binder.bind(&table, alias.as_deref());
                self.current_left = Some(Operand {
                    table: Some(table),
                    alias,
                });
            }
            if !self.match_punct(",") {
                return;
            }
        }
    }

    fn awaiting_right_table(&mut self, kind: JoinKind) -> ScanState {
        let is_subquery = self
            .peek()
            .is_some_and(|tok| tok.is_punct("(") || tok.is_keyword(Keyword::Select));
        if is_subquery {
            self.skip_derived_operand();
            self.skip_to_boundary();
            return ScanState::Scanning;
        }

        let Some(right_table) = self.parse_table_ref() else {
            return ScanState::Scanning;
        };
        if self.peek().is_some_and(|tok| tok.is_punct("(")) {
            self.skip_derived_operand();
            self.skip_to_boundary();
            return ScanState::Scanning;
        }
        let right_alias = self.parse_alias();
        self.binder.bind(&right_table, right_alias.as_deref());

        match kind {
            JoinKind::Cross => {
                self.current_left = Some(Operand {
                    table: Some(right_table),
                    alias: right_alias,
                });
                ScanState::Scanning
            }
            JoinKind::Conditional(join_type) => ScanState::AwaitingOn(PendingJoin {
                join_type,
                right_table,
                right_alias,
            }),
        }
    }

    fn awaiting_on(&mut self, pending: PendingJoin) -> ScanState {
        let Some(tok) = self.peek() else {
            return ScanState::AwaitingOn(pending);
        };
        if tok.is_keyword(Keyword::On) {
            self.pos += 1;
            return ScanState::CapturingCondition {
                pending,
                start: self.pos,
            };
        }
        if tok.is_keyword(Keyword::Using) {
            self.pos += 1;
            let columns = self.parse_using_columns();
            self.emit(pending, ConditionKeys::using(columns));
            return ScanState::Scanning;
        }
        if tok.is_punct(")") || tok.is_punct(",") || self.at_boundary() {
            self.emit(pending, ConditionKeys::default());
            return ScanState::Scanning;
        }
        if tok.is_punct("(") {
            self.skip_group();
        } else {
            self.pos += 1;
        }
        ScanState::AwaitingOn(pending)
    }

    // using -> "(" identifier ("," identifier)* ")"
    fn parse_using_columns(&mut self) -> Vec<String> {
        let mut columns = vec![];
        if !self.match_punct("(") {
            return columns;
        }
        while let Some(tok) = self.peek() {
            self.pos += 1;
            if tok.is_punct(")") {
                break;
            }
            if tok.is_word() {
                columns.push(tok.text.clone());
            }
        }
        columns
    }

    fn capturing_condition(&mut self, pending: PendingJoin, start: usize) -> ScanState {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if tok.is_punct("(") {
                depth += 1;
            } else if tok.is_punct(")") {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            } else if depth == 0 && (tok.is_punct(",") || self.at_boundary()) {
                break;
            }
            self.pos += 1;
        }
        let keys = self.condition_keys(&pending, start, self.pos);
        self.emit(pending, keys);
        ScanState::Scanning
    }

    fn condition_keys(&self, pending: &PendingJoin, start: usize, end: usize) -> ConditionKeys {
        let left = self.current_left.as_ref();
        let left_table = left
            .and_then(Operand::lookup_key)
            .and_then(|key| self.binder.resolve(key));
        let mut sides = vec![];
        if let Some(alias) = left.and_then(|left| left.alias.as_deref()) {
            sides.push(alias);
        }
        for table in left_table.into_iter().chain([pending.right_table.as_str()]) {
            sides.push(table);
            if let Some((_, last)) = table.rsplit_once('.') {
                sides.push(last);
            }
        }
        if let Some(alias) = pending.right_alias.as_deref() {
            sides.push(alias);
        }
        extract_condition(&self.tokens[start..end], &sides)
    }

    fn emit(&mut self, pending: PendingJoin, keys: ConditionKeys) {
        let left = self.current_left.take();
        let left_table = left
            .as_ref()
            .and_then(Operand::lookup_key)
            .and_then(|key| self.binder.resolve(key))
            .unwrap_or(DERIVED_TABLE)
            .to_owned();

        let descriptor = JoinDescriptor {
            left_table,
            left_alias: left.and_then(|left| left.alias),
            right_table: pending.right_table.clone(),
            right_alias: pending.right_alias.clone(),
            join_type: pending.join_type,
            left_keys: keys.left_keys,
            right_keys: keys.right_keys,
            flags: keys.flags,
        };
        log::debug!("Join: {:?}", descriptor);
        self.descriptors.push(descriptor);

        self.current_left = Some(Operand {
            table: Some(pending.right_table),
            alias: pending.right_alias,
        });
    }
}

/// Extracts the joins of `sql` with the default reserved word set.
pub fn extract_joins(sql: &str) -> Vec<JoinDescriptor> {
    JoinExtractor::default().extract(sql)
}

/// Extracts the joins of several independent SQL texts, optionally in parallel.
/// Output order follows input order.
pub fn extract_joins_many<S: AsRef<str> + Sync>(
    extractor: &JoinExtractor,
    sqls: &[S],
    parallel: bool,
) -> Vec<Vec<JoinDescriptor>> {
    if parallel {
        sqls.par_iter()
            .map(|sql| extractor.extract(sql.as_ref()))
            .collect()
    } else {
        sqls.iter()
            .map(|sql| extractor.extract(sql.as_ref()))
            .collect()
    }
}
