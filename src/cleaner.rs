use crate::ast::{Keyword, Token, TokenKind};
use crate::scanner::tokenize;

fn normalized(token: &Token) -> String {
    match token.kind {
        TokenKind::Keyword(keyword) => keyword.as_ref().to_owned(),
        TokenKind::Identifier => token.text.to_lowercase(),
        TokenKind::QuotedIdentifier | TokenKind::Literal => token.lexeme.clone(),
        TokenKind::Punctuation => token.text.clone(),
    }
}

fn space_between(prev: &Token, next: &Token) -> bool {
    // a `#` followed by a space would read back as a comment
    if prev.is_punct("(") || prev.is_punct(".") || prev.is_punct("::") || prev.is_punct("#") {
        return false;
    }
    if next.is_punct(",")
        || next.is_punct(")")
        || next.is_punct(".")
        || next.is_punct(";")
        || next.is_punct("::")
    {
        return false;
    }
    // function calls: `trim(x)`, `CAST(x AS int)`
    if next.is_punct("(") && (prev.is_identifier() || prev.is_keyword(Keyword::Cast)) {
        return false;
    }
    true
}

/// Normalizes SQL text before join extraction: comments are dropped,
/// keywords are upper-cased, unquoted identifiers are lower-cased and every
/// whitespace run becomes a single space. Literals and quoted identifiers are
/// kept verbatim, so `clean(clean(sql)) == clean(sql)`.
pub fn clean(raw_sql: &str) -> String {
    let tokens = tokenize(raw_sql);
    let mut out = String::with_capacity(raw_sql.len());
    let mut prev: Option<&Token> = None;
    for token in &tokens {
        if prev.is_some_and(|prev| space_between(prev, token)) {
            out.push(' ');
        }
        out.push_str(&normalized(token));
        prev = Some(token);
    }
    log::debug!("Cleaned SQL: {}", &out);
    out
}
