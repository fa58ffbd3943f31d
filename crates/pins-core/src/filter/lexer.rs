//! Tokenizer for filter expressions.

use crate::error::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Unsigned magnitude; the parser applies any leading `-`.
    Int(u64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Colon,
    AndAnd,
    OrOr,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token in the source text.
    pub offset: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;

        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        // Raw strings: r"..." / r'...'
        if (c == b'r' || c == b'R')
            && matches!(bytes.get(pos + 1), Some(b'"') | Some(b'\''))
        {
            let quote = bytes[pos + 1];
            let body_start = pos + 2;
            let end = source[body_start..]
                .find(quote as char)
                .map(|i| body_start + i)
                .ok_or_else(|| unterminated(start))?;
            tokens.push(Token {
                kind: TokenKind::Str(source[body_start..end].to_string()),
                offset: start,
            });
            pos = end + 1;
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
                pos += 1;
            }
            tokens.push(Token {
                kind: TokenKind::Ident(source[start..pos].to_string()),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_digit() {
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            let literal = &source[start..pos];
            let value = literal.parse::<u64>().map_err(|e| CompileError::InvalidLiteral {
                offset: start,
                kind: "int",
                literal: literal.to_string(),
                reason: e.to_string(),
            })?;
            tokens.push(Token {
                kind: TokenKind::Int(value),
                offset: start,
            });
            continue;
        }

        if c == b'"' || c == b'\'' {
            let (value, next) = lex_string(source, pos)?;
            tokens.push(Token {
                kind: TokenKind::Str(value),
                offset: start,
            });
            pos = next;
            continue;
        }

        let two = bytes.get(pos + 1).copied();
        let (kind, len) = match (c, two) {
            (b'&', Some(b'&')) => (TokenKind::AndAnd, 2),
            (b'|', Some(b'|')) => (TokenKind::OrOr, 2),
            (b'=', Some(b'=')) => (TokenKind::EqEq, 2),
            (b'!', Some(b'=')) => (TokenKind::NotEq, 2),
            (b'<', Some(b'=')) => (TokenKind::Le, 2),
            (b'>', Some(b'=')) => (TokenKind::Ge, 2),
            (b'!', _) => (TokenKind::Bang, 1),
            (b'<', _) => (TokenKind::Lt, 1),
            (b'>', _) => (TokenKind::Gt, 1),
            (b'(', _) => (TokenKind::LParen, 1),
            (b')', _) => (TokenKind::RParen, 1),
            (b'[', _) => (TokenKind::LBracket, 1),
            (b']', _) => (TokenKind::RBracket, 1),
            (b',', _) => (TokenKind::Comma, 1),
            (b'.', _) => (TokenKind::Dot, 1),
            (b'?', _) => (TokenKind::Question, 1),
            (b':', _) => (TokenKind::Colon, 1),
            (b'+', _) => (TokenKind::Plus, 1),
            (b'-', _) => (TokenKind::Minus, 1),
            (b'*', _) => (TokenKind::Star, 1),
            (b'/', _) => (TokenKind::Slash, 1),
            (b'%', _) => (TokenKind::Percent, 1),
            _ => {
                let ch = source[pos..].chars().next().unwrap_or('?');
                return Err(CompileError::Syntax {
                    offset: start,
                    message: format!("unexpected character {:?}", ch),
                });
            }
        };
        tokens.push(Token {
            kind,
            offset: start,
        });
        pos += len;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: source.len(),
    });
    Ok(tokens)
}

/// Lex a quoted string starting at `start`; returns the value and the
/// offset just past the closing quote.
fn lex_string(source: &str, start: usize) -> Result<(String, usize), CompileError> {
    let mut chars = source[start..].char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return Err(unterminated(start)),
    };
    let mut value = String::new();

    while let Some((i, ch)) = chars.next() {
        match ch {
            c if c == quote => return Ok((value, start + i + c.len_utf8())),
            '\\' => {
                let (j, esc) = chars.next().ok_or_else(|| unterminated(start))?;
                let decoded = match esc {
                    '\\' => '\\',
                    '"' => '"',
                    '\'' => '\'',
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    other => {
                        return Err(CompileError::Syntax {
                            offset: start + j,
                            message: format!("invalid escape sequence \\{}", other),
                        })
                    }
                };
                value.push(decoded);
            }
            '\n' => return Err(unterminated(start)),
            c => value.push(c),
        }
    }

    Err(unterminated(start))
}

fn unterminated(offset: usize) -> CompileError {
    CompileError::Syntax {
        offset,
        message: "unterminated string literal".to_string(),
    }
}
