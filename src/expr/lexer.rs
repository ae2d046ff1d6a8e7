use crate::error::OpSpecError;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    String(String),
    Char(char),
    Bool(bool),
    Null,
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
    Dot,
    Bang,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, OpSpecError> {
    let mut chars = input.char_indices().peekable();
    let mut tokens = Vec::new();

    while let Some((idx, ch)) = chars.peek().copied() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        match ch {
            '0'..='9' => {
                let start = idx;
                let mut end = idx;
                let mut seen_dot = false;
                while let Some((i, c)) = chars.peek().copied() {
                    if c.is_ascii_digit() {
                        end = i;
                        chars.next();
                    } else if c == '.' && !seen_dot {
                        seen_dot = true;
                        end = i;
                        chars.next();
                    } else {
                        break;
                    }
                }
                let raw = &input[start..=end];
                let suffix = match chars.peek().copied() {
                    Some((_, c @ ('L' | 'l' | 'F' | 'f' | 'D' | 'd'))) => {
                        chars.next();
                        Some(c.to_ascii_lowercase())
                    }
                    _ => None,
                };
                let kind = if seen_dot || matches!(suffix, Some('f' | 'd')) {
                    TokenKind::Float(raw.parse().map_err(|e| {
                        OpSpecError::Expression(format!(
                            "invalid number literal '{raw}' at {start}: {e}"
                        ))
                    })?)
                } else {
                    TokenKind::Int(raw.parse().map_err(|e| {
                        OpSpecError::Expression(format!(
                            "invalid integer literal '{raw}' at {start}: {e}"
                        ))
                    })?)
                };
                tokens.push(Token { kind, pos: start });
            }
            '"' => {
                chars.next();
                let start = idx;
                let mut out = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    if c == '"' {
                        closed = true;
                        break;
                    }
                    if c == '\\' {
                        out.push(unescape(chars.next().map(|(_, c)| c))?);
                    } else {
                        out.push(c);
                    }
                }

                if !closed {
                    return Err(OpSpecError::Expression(format!(
                        "unterminated string literal starting at {start}"
                    )));
                }

                tokens.push(Token {
                    kind: TokenKind::String(out),
                    pos: start,
                });
            }
            '\'' => {
                chars.next();
                let value = match chars.next() {
                    Some((_, '\\')) => unescape(chars.next().map(|(_, c)| c))?,
                    Some((_, '\'')) | None => {
                        return Err(OpSpecError::Expression(format!(
                            "empty character literal at {idx}"
                        )))
                    }
                    Some((_, c)) => c,
                };
                if !matches!(chars.next(), Some((_, '\''))) {
                    return Err(OpSpecError::Expression(format!(
                        "unterminated character literal at {idx}"
                    )));
                }
                tokens.push(Token {
                    kind: TokenKind::Char(value),
                    pos: idx,
                });
            }
            '+' | '-' | '*' | '/' | '%' | '(' | ')' | ',' | '.' => {
                chars.next();
                let kind = match ch {
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Minus,
                    '*' => TokenKind::Star,
                    '/' => TokenKind::Slash,
                    '%' => TokenKind::Percent,
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    ',' => TokenKind::Comma,
                    _ => TokenKind::Dot,
                };
                tokens.push(Token { kind, pos: idx });
            }
            '!' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token {
                        kind: TokenKind::NotEq,
                        pos: idx,
                    });
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Bang,
                        pos: idx,
                    });
                }
            }
            '=' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token {
                        kind: TokenKind::EqEq,
                        pos: idx,
                    });
                } else {
                    return Err(OpSpecError::Expression(format!(
                        "unexpected '=' at {idx}; use '==' for equality"
                    )));
                }
            }
            '<' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token {
                        kind: TokenKind::Lte,
                        pos: idx,
                    });
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Lt,
                        pos: idx,
                    });
                }
            }
            '>' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    tokens.push(Token {
                        kind: TokenKind::Gte,
                        pos: idx,
                    });
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Gt,
                        pos: idx,
                    });
                }
            }
            '&' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '&'))) {
                    chars.next();
                    tokens.push(Token {
                        kind: TokenKind::AndAnd,
                        pos: idx,
                    });
                } else {
                    return Err(OpSpecError::Expression(format!(
                        "unexpected '&' at {idx}; expected '&&'"
                    )));
                }
            }
            '|' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '|'))) {
                    chars.next();
                    tokens.push(Token {
                        kind: TokenKind::OrOr,
                        pos: idx,
                    });
                } else {
                    return Err(OpSpecError::Expression(format!(
                        "unexpected '|' at {idx}; expected '||'"
                    )));
                }
            }
            c if is_ident_start(c) => {
                let start = idx;
                let mut end = idx;
                while let Some((i, cc)) = chars.peek().copied() {
                    if is_ident_continue(cc) {
                        end = i;
                        chars.next();
                    } else {
                        break;
                    }
                }
                let raw = &input[start..=end];
                let kind = match raw {
                    "true" => TokenKind::Bool(true),
                    "false" => TokenKind::Bool(false),
                    "null" => TokenKind::Null,
                    _ => TokenKind::Ident(raw.to_string()),
                };
                tokens.push(Token { kind, pos: start });
            }
            _ => {
                return Err(OpSpecError::Expression(format!(
                    "unexpected character '{}' at {}",
                    ch, idx
                )))
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: input.len(),
    });
    Ok(tokens)
}

fn unescape(esc: Option<char>) -> Result<char, OpSpecError> {
    match esc {
        Some('"') => Ok('"'),
        Some('\'') => Ok('\''),
        Some('\\') => Ok('\\'),
        Some('n') => Ok('\n'),
        Some('t') => Ok('\t'),
        Some('r') => Ok('\r'),
        Some('0') => Ok('\0'),
        Some(other) => Ok(other),
        None => Err(OpSpecError::Expression(
            "unterminated escape sequence".to_string(),
        )),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}
