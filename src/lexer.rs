//! Token stream for declaration documents.
//!
//! The lexer is deliberately forgiving: unknown characters become single
//! punctuation tokens and unterminated strings or comments run to the end of
//! the input. The declaration parser decides what to make of the result.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Str,
    Number,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
    /// A line break separates this token from the previous one.
    pub line_start: bool,
}

impl Token<'_> {
    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_ident(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == word
    }

    /// Identifiers, strings and numbers can all name an object member.
    pub fn is_member_name(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Ident | TokenKind::Str | TokenKind::Number
        )
    }

    /// Member name with string quotes removed.
    pub fn name_text(&self) -> &str {
        match self.kind {
            TokenKind::Str => strip_quotes(self.text),
            _ => self.text,
        }
    }
}

const MULTI_CHAR_PUNCT: &[&str] = &["...", "=>"];

pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0usize;
    let mut line_start = true;

    while pos < bytes.len() {
        let b = bytes[pos];

        if b == b'\n' {
            line_start = true;
            pos += 1;
            continue;
        }
        if b.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        if src[pos..].starts_with("//") {
            pos = src[pos..].find('\n').map_or(bytes.len(), |i| pos + i);
            continue;
        }
        if src[pos..].starts_with("/*") {
            let end = src[pos + 2..]
                .find("*/")
                .map_or(bytes.len(), |i| pos + 2 + i + 2);
            if src[pos..end].contains('\n') {
                line_start = true;
            }
            pos = end;
            continue;
        }

        let start = pos;
        let kind = if b == b'"' || b == b'\'' || b == b'`' {
            pos = scan_string(bytes, pos);
            TokenKind::Str
        } else if b.is_ascii_digit() {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'.') {
                pos += 1;
            }
            TokenKind::Number
        } else if is_ident_start(src, pos) {
            while pos < bytes.len() && is_ident_continue(src, pos) {
                pos += char_len(src, pos);
            }
            TokenKind::Ident
        } else {
            let len = MULTI_CHAR_PUNCT
                .iter()
                .find(|p| src[start..].starts_with(**p))
                .map_or_else(|| char_len(src, start), |p| p.len());
            pos += len;
            TokenKind::Punct
        };

        tokens.push(Token {
            kind,
            text: &src[start..pos],
            start,
            end: pos,
            line_start,
        });
        line_start = false;
    }

    tokens
}

pub fn strip_quotes(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

fn scan_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            c if c == quote => return pos + 1,
            b'\n' if quote != b'`' => return pos,
            _ => pos += 1,
        }
    }
    bytes.len()
}

fn char_len(src: &str, pos: usize) -> usize {
    src[pos..].chars().next().map_or(1, char::len_utf8)
}

fn is_ident_start(src: &str, pos: usize) -> bool {
    src[pos..]
        .chars()
        .next()
        .is_some_and(|c| c == '_' || c == '$' || c.is_alphabetic())
}

fn is_ident_continue(src: &str, pos: usize) -> bool {
    src[pos..]
        .chars()
        .next()
        .is_some_and(|c| c == '_' || c == '$' || c.is_alphanumeric())
}
