//! Parsing of textual type names into [`TypeTerm`]s.
//!
//! Accepted forms: primitive keywords, qualified class names (nested classes
//! with `$`), `T[]` array suffixes, type arguments in angle brackets,
//! wildcards, and JVM descriptor array names such as `[I` or
//! `[Ljava.lang.String;`. Whitespace between tokens is ignored.

use crate::error::OpSpecError;
use crate::reflect::Reflection;

use super::{PrimitiveKind, TypeTerm, TypeVariable, Wildcard};

/// Resolves a type name against the class path.
///
/// Every class name, qualified or bare, must be declared in `reflection`;
/// otherwise the result is [`OpSpecError::TypeNotFound`]. Type variables are
/// not accepted here.
pub fn for_name(name: &str, reflection: &dyn Reflection) -> Result<TypeTerm, OpSpecError> {
    parse_with(name, reflection, false)
}

/// Like [`for_name`], but an unresolvable bare name parses as a type variable,
/// optionally followed by `extends B1 & B2`.
pub fn parse_type_with_variables(
    name: &str,
    reflection: &dyn Reflection,
) -> Result<TypeTerm, OpSpecError> {
    parse_with(name, reflection, true)
}

/// Canonicalizes a raw type name without consulting a class path: strips
/// whitespace and rewrites descriptor array names into `[]` form.
pub fn normalize_type_name(name: &str) -> Result<String, OpSpecError> {
    let compact: String = name.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(OpSpecError::invalid_type(name, "empty type name"));
    }
    if compact.starts_with('[') {
        return decode_descriptor(&compact);
    }
    Ok(compact)
}

fn parse_with(
    name: &str,
    reflection: &dyn Reflection,
    allow_variables: bool,
) -> Result<TypeTerm, OpSpecError> {
    let trimmed = name.trim();
    let source = if trimmed.starts_with('[') {
        decode_descriptor(trimmed)?
    } else {
        trimmed.to_string()
    };

    let tokens = tokenize(&source)?;
    let mut parser = TypeParser {
        input: name,
        tokens,
        pos: 0,
        reflection,
        allow_variables,
    };
    let ty = parser.parse_type()?;
    if parser.pos != parser.tokens.len() {
        return Err(OpSpecError::invalid_type(
            name,
            format!("unexpected {} after type", parser.describe_current()),
        ));
    }
    Ok(ty)
}

fn decode_descriptor(descriptor: &str) -> Result<String, OpSpecError> {
    let dims = descriptor.chars().take_while(|c| *c == '[').count();
    let rest = &descriptor[dims..];
    let mut chars = rest.chars();
    let element = match chars.next() {
        Some('L') => {
            let class = rest[1..].strip_suffix(';').ok_or_else(|| {
                OpSpecError::invalid_type(descriptor, "class descriptor must end with ';'")
            })?;
            if class.is_empty() {
                return Err(OpSpecError::invalid_type(descriptor, "empty class descriptor"));
            }
            class.replace('/', ".")
        }
        Some(c) if chars.next().is_none() => PrimitiveKind::from_descriptor(c)
            .filter(|kind| *kind != PrimitiveKind::Void)
            .map(|kind| kind.name().to_string())
            .ok_or_else(|| {
                OpSpecError::invalid_type(descriptor, format!("unknown descriptor '{c}'"))
            })?,
        _ => return Err(OpSpecError::invalid_type(descriptor, "malformed array descriptor")),
    };
    Ok(format!("{element}{}", "[]".repeat(dims)))
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Name(String),
    Lt,
    Gt,
    Comma,
    LBracket,
    RBracket,
    Question,
    Amp,
}

fn tokenize(input: &str) -> Result<Vec<Tok>, OpSpecError> {
    let mut chars = input.chars().peekable();
    let mut tokens = Vec::new();

    while let Some(ch) = chars.peek().copied() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        let tok = match ch {
            '<' => Tok::Lt,
            '>' => Tok::Gt,
            ',' => Tok::Comma,
            '[' => Tok::LBracket,
            ']' => Tok::RBracket,
            '?' => Tok::Question,
            '&' => Tok::Amp,
            c if is_name_char(c) => {
                let mut name = String::new();
                while let Some(c) = chars.peek().copied() {
                    if !is_name_char(c) {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                if name.starts_with('.') || name.ends_with('.') || name.contains("..") {
                    return Err(OpSpecError::invalid_type(input, format!("malformed name '{name}'")));
                }
                tokens.push(Tok::Name(name));
                continue;
            }
            other => {
                return Err(OpSpecError::invalid_type(
                    input,
                    format!("unexpected character '{other}'"),
                ))
            }
        };
        chars.next();
        tokens.push(tok);
    }

    if tokens.is_empty() {
        return Err(OpSpecError::invalid_type(input, "empty type name"));
    }
    Ok(tokens)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
}

struct TypeParser<'a> {
    input: &'a str,
    tokens: Vec<Tok>,
    pos: usize,
    reflection: &'a dyn Reflection,
    allow_variables: bool,
}

impl<'a> TypeParser<'a> {
    fn parse_type(&mut self) -> Result<TypeTerm, OpSpecError> {
        if self.eat(&Tok::Question) {
            return self.parse_wildcard();
        }

        let mut ty = self.parse_simple(true)?;
        while self.eat(&Tok::LBracket) {
            self.expect(&Tok::RBracket, "expected ']'")?;
            if ty.is_void() {
                return Err(OpSpecError::invalid_type(self.input, "array of void"));
            }
            ty = TypeTerm::array_of(ty);
        }
        Ok(ty)
    }

    fn parse_wildcard(&mut self) -> Result<TypeTerm, OpSpecError> {
        let bound = match self.current() {
            Some(Tok::Name(word)) if word == "extends" => {
                self.pos += 1;
                Wildcard::Extends(Box::new(self.parse_type()?))
            }
            Some(Tok::Name(word)) if word == "super" => {
                self.pos += 1;
                Wildcard::Super(Box::new(self.parse_type()?))
            }
            _ => Wildcard::Unbounded,
        };
        Ok(TypeTerm::Wildcard(bound))
    }

    fn parse_simple(&mut self, allow_bounds: bool) -> Result<TypeTerm, OpSpecError> {
        let name = match self.current() {
            Some(Tok::Name(name)) if name != "extends" && name != "super" => name.clone(),
            _ => {
                return Err(OpSpecError::invalid_type(
                    self.input,
                    format!("expected a type name, found {}", self.describe_current()),
                ))
            }
        };
        self.pos += 1;

        let mut args = Vec::new();
        if self.eat(&Tok::Lt) {
            loop {
                args.push(self.parse_type()?);
                if self.eat(&Tok::Comma) {
                    continue;
                }
                self.expect(&Tok::Gt, "expected '>' after type arguments")?;
                break;
            }
        }

        if let Some(kind) = PrimitiveKind::from_name(&name) {
            if !args.is_empty() {
                return Err(OpSpecError::invalid_type(
                    self.input,
                    format!("primitive '{name}' cannot take type arguments"),
                ));
            }
            return Ok(TypeTerm::Primitive(kind));
        }

        if self.reflection.resolve_class(&name).is_some() {
            return Ok(if args.is_empty() {
                TypeTerm::Class(name)
            } else {
                TypeTerm::Parameterized { raw: name, args }
            });
        }

        if self.allow_variables && !name.contains('.') && args.is_empty() {
            let mut bounds = Vec::new();
            if allow_bounds && matches!(self.current(), Some(Tok::Name(word)) if word == "extends")
            {
                self.pos += 1;
                loop {
                    bounds.push(self.parse_simple(false)?);
                    if !self.eat(&Tok::Amp) {
                        break;
                    }
                }
            }
            return Ok(TypeTerm::Variable(TypeVariable { name, bounds }));
        }

        Err(OpSpecError::TypeNotFound(name))
    }

    fn current(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn describe_current(&self) -> String {
        match self.current() {
            Some(tok) => format!("{tok:?}"),
            None => "end of input".to_string(),
        }
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.current() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok, message: &str) -> Result<(), OpSpecError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(OpSpecError::invalid_type(
                self.input,
                format!("{message}, found {}", self.describe_current()),
            ))
        }
    }
}
