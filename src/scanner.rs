use std::str::FromStr;

use crate::ast::{Keyword, Token, TokenKind};

/// Lexer for the ANSI `SELECT` family.
///
/// Scanning never fails: characters it does not understand become
/// punctuation tokens, and unterminated strings, quoted identifiers and block
/// comments run to the end of the input.
pub struct Scanner {
    source_chars: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: u32,
    col: u32,
    start_line: u32,
    start_col: u32,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            source_chars: source.chars().collect(),
            tokens: vec![],
            start: 0,
            current: 0,
            line: 1,
            col: 1,
            start_line: 1,
            start_col: 1,
        }
    }

    pub fn tokens(&self) -> &Vec<Token> {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    fn advance(&mut self) -> char {
        let c = self.source_chars[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        c
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source_chars.len()
    }

    fn peek(&self) -> char {
        self.peek_next_i(0)
    }

    fn peek_next_i(&self, i: usize) -> char {
        self.source_chars
            .get(self.current + i)
            .copied()
            .unwrap_or('\0')
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            return false;
        };
        self.advance();
        true
    }

    fn current_source_str(&self) -> String {
        self.source_chars[self.start..self.current].iter().collect()
    }

    fn add_token_with_text(&mut self, kind: TokenKind, text: String) {
        self.tokens.push(Token {
            kind,
            text,
            lexeme: self.current_source_str(),
            line: self.start_line,
            col: self.start_col,
        });
    }

    fn add_token(&mut self, kind: TokenKind) {
        let text = self.current_source_str();
        self.add_token_with_text(kind, text);
    }

    fn reset(&mut self) {
        self.tokens.clear();
        self.start = 0;
        self.current = 0;
        self.line = 1;
        self.col = 1;
    }

    pub fn scan(&mut self) -> &Vec<Token> {
        self.reset();
        while !self.is_at_end() {
            self.start = self.current;
            self.start_line = self.line;
            self.start_col = self.col;
            self.scan_token();
        }
        &self.tokens
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.peek() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        while !self.is_at_end() {
            if self.peek() == '*' && self.peek_next_i(1) == '/' {
                self.advance();
                self.advance();
                return;
            }
            self.advance();
        }
    }

    fn match_number(&mut self) {
        loop {
            let peek_char = self.peek();
            if peek_char.is_ascii_digit() || peek_char == '.' {
                self.advance();
            } else if (peek_char == 'e' || peek_char == 'E')
                && (self.peek_next_i(1).is_ascii_digit()
                    || (matches!(self.peek_next_i(1), '+' | '-')
                        && self.peek_next_i(2).is_ascii_digit()))
            {
                self.advance();
                self.advance();
            } else {
                break;
            }
        }
        self.add_token(TokenKind::Literal);
    }

    /// Scans up to the closing `delimiter`. A doubled delimiter is an escaped
    /// delimiter; inside string literals a backslash escapes the next char.
    fn scan_delimited(&mut self, delimiter: char, backslash_escapes: bool) -> String {
        let mut content = String::new();
        while !self.is_at_end() {
            let c = self.advance();
            if backslash_escapes && c == '\\' && !self.is_at_end() {
                content.push(c);
                content.push(self.advance());
                continue;
            }
            if c == delimiter {
                if self.peek() == delimiter {
                    content.push(self.advance());
                    continue;
                }
                break;
            }
            content.push(c);
        }
        content
    }

    fn match_string(&mut self) {
        self.scan_delimited('\'', true);
        self.add_token(TokenKind::Literal);
    }

    fn match_quoted_identifier(&mut self, delimiter: char) {
        let ident = self.scan_delimited(delimiter, false);
        self.add_token_with_text(TokenKind::QuotedIdentifier, ident);
    }

    fn match_keyword_or_identifier(&mut self) {
        loop {
            let peek_char = self.peek();
            if !(peek_char.is_alphanumeric() || matches!(peek_char, '_' | '$' | '#')) {
                break;
            }
            self.advance();
        }
        let identifier = self.current_source_str();
        match Keyword::from_str(&identifier) {
            Ok(keyword) => self.add_token(TokenKind::Keyword(keyword)),
            Err(_) => self.add_token(TokenKind::Identifier),
        }
    }

    fn follows_word(&self) -> bool {
        self.tokens
            .last()
            .is_some_and(|tok| tok.is_word() || tok.is_punct(")"))
    }

    fn scan_token(&mut self) {
        let curr_char = self.advance();
        match curr_char {
            '\n' | '\r' | ' ' | '\t' => {}
            '-' if self.peek() == '-' => self.skip_line_comment(),
            // `# ` comments, `acct#no` columns and `#tmp` temp tables
            '#' if self.peek().is_whitespace() || self.is_at_end() => self.skip_line_comment(),
            '#' if self.peek().is_alphabetic() || matches!(self.peek(), '_' | '#') => {
                self.match_keyword_or_identifier()
            }
            '/' if self.peek() == '*' => {
                self.advance();
                self.skip_block_comment();
            }
            '<' => {
                if !self.match_char('>') {
                    self.match_char('=');
                }
                self.add_token(TokenKind::Punctuation);
            }
            '>' | '!' => {
                self.match_char('=');
                self.add_token(TokenKind::Punctuation);
            }
            '|' => {
                self.match_char('|');
                self.add_token(TokenKind::Punctuation);
            }
            ':' => {
                self.match_char(':');
                self.add_token(TokenKind::Punctuation);
            }
            '.' if self.peek().is_ascii_digit() && !self.follows_word() => self.match_number(),
            '\'' => self.match_string(),
            '"' | '`' => self.match_quoted_identifier(curr_char),
            c if c.is_ascii_digit() => self.match_number(),
            c if c.is_alphabetic() || c == '_' => self.match_keyword_or_identifier(),
            _ => self.add_token(TokenKind::Punctuation),
        }
    }
}

/// Scans `sql` into its token sequence.
pub fn tokenize(sql: &str) -> Vec<Token> {
    let mut scanner = Scanner::new(sql);
    scanner.scan();
    scanner.into_tokens()
}
