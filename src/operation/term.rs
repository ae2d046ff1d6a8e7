//! Literal values that materialize without a receiver.

use crate::error::OpSpecError;
use crate::reflect::Value;
use crate::types::{PrimitiveKind, TypeTerm};

#[derive(Debug, Clone)]
/// A typed literal: null, a primitive or boxed primitive, or a string.
pub struct NonreceiverTerm {
    ty: TypeTerm,
    value: Value,
}

impl NonreceiverTerm {
    /// Checks that `value` is a literal of `ty`.
    pub fn new(ty: TypeTerm, value: Value) -> Result<Self, OpSpecError> {
        if ty.is_void() {
            return Err(OpSpecError::PreconditionViolation(
                "a literal cannot have type void".to_string(),
            ));
        }
        let accepted = match &value {
            Value::Null => !ty.is_primitive(),
            Value::String(_) => ty.is_string(),
            Value::Object(_) | Value::Array(_) => false,
            primitive => primitive.primitive_kind() == ty.unboxed_kind(),
        };
        if !accepted {
            return Err(OpSpecError::PreconditionViolation(format!(
                "value {value} is not a literal of type {ty}"
            )));
        }
        Ok(Self { ty, value })
    }

    /// Null of reference type `ty`.
    pub fn null_of(ty: TypeTerm) -> Result<Self, OpSpecError> {
        Self::new(ty, Value::Null)
    }

    /// Zero of a primitive or boxed primitive type, null for other references.
    pub fn zero_of(ty: TypeTerm) -> Result<Self, OpSpecError> {
        let value = match ty.unboxed_kind() {
            Some(PrimitiveKind::Void) => {
                return Err(OpSpecError::PreconditionViolation(
                    "void has no zero value".to_string(),
                ))
            }
            Some(kind) => zero_value(kind),
            None => Value::Null,
        };
        Self::new(ty, value)
    }

    pub fn ty(&self) -> &TypeTerm {
        &self.ty
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Source-language form of the literal.
    pub fn code(&self) -> String {
        match &self.value {
            Value::Null if self.ty.is_object() => "null".to_string(),
            Value::Null => format!("({}) null", self.ty.source_name()),
            Value::Boolean(v) => v.to_string(),
            Value::Byte(v) => format!("(byte){v}"),
            Value::Short(v) => format!("(short){v}"),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => format!("{v}L"),
            Value::Float(v) => float_code(f64::from(*v), "Float", 'f'),
            Value::Double(v) => float_code(*v, "Double", 'd'),
            Value::Char(c) => format!("'{}'", escape(&c.to_string(), '\'')),
            Value::String(s) => format!("\"{}\"", escape(s, '"')),
            // Rejected by the constructor.
            Value::Object(_) | Value::Array(_) => "null".to_string(),
        }
    }

    /// Parses the output of [`NonreceiverTerm::code`] back into a term of `ty`.
    pub fn parse_code(ty: TypeTerm, code: &str) -> Result<Self, OpSpecError> {
        let invalid = || OpSpecError::invalid_parsable(code, format!("not a literal of type {ty}"));

        if code == "null" || code.ends_with(") null") {
            return Self::null_of(ty.clone()).map_err(|_| invalid());
        }
        if ty.is_string() {
            let inner = code
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .ok_or_else(invalid)?;
            return Self::new(ty.clone(), Value::String(unescape(inner).ok_or_else(invalid)?));
        }

        let kind = ty.unboxed_kind().ok_or_else(invalid)?;
        let value = match kind {
            PrimitiveKind::Boolean => match code {
                "true" => Value::Boolean(true),
                "false" => Value::Boolean(false),
                _ => return Err(invalid()),
            },
            PrimitiveKind::Byte => Value::Byte(
                code.strip_prefix("(byte)")
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(invalid)?,
            ),
            PrimitiveKind::Short => Value::Short(
                code.strip_prefix("(short)")
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(invalid)?,
            ),
            PrimitiveKind::Int => Value::Int(code.parse().map_err(|_| invalid())?),
            PrimitiveKind::Long => Value::Long(
                code.strip_suffix('L')
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(invalid)?,
            ),
            PrimitiveKind::Float => Value::Float(
                parse_float(code, "Float", 'f').ok_or_else(invalid)? as f32,
            ),
            PrimitiveKind::Double => {
                Value::Double(parse_float(code, "Double", 'd').ok_or_else(invalid)?)
            }
            PrimitiveKind::Char => {
                let inner = code
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
                    .and_then(unescape)
                    .ok_or_else(invalid)?;
                let mut chars = inner.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err(invalid()),
                }
            }
            PrimitiveKind::Void => return Err(invalid()),
        };
        Self::new(ty, value)
    }

    /// Equality with floating-point values compared bitwise, so that `NaN`
    /// literals equal themselves.
    pub fn same_literal(&self, other: &NonreceiverTerm) -> bool {
        self.ty == other.ty
            && match (&self.value, &other.value) {
                (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
                (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
                (a, b) => a == b,
            }
    }
}

fn zero_value(kind: PrimitiveKind) -> Value {
    match kind {
        PrimitiveKind::Boolean => Value::Boolean(false),
        PrimitiveKind::Byte => Value::Byte(0),
        PrimitiveKind::Char => Value::Char('\0'),
        PrimitiveKind::Short => Value::Short(0),
        PrimitiveKind::Int => Value::Int(0),
        PrimitiveKind::Long => Value::Long(0),
        PrimitiveKind::Float => Value::Float(0.0),
        PrimitiveKind::Double => Value::Double(0.0),
        PrimitiveKind::Void => Value::Null,
    }
}

fn float_code(v: f64, class: &str, suffix: char) -> String {
    if v.is_nan() {
        format!("{class}.NaN")
    } else if v == f64::INFINITY {
        format!("{class}.POSITIVE_INFINITY")
    } else if v == f64::NEG_INFINITY {
        format!("{class}.NEGATIVE_INFINITY")
    } else if suffix == 'f' {
        format!("{:?}{suffix}", v as f32)
    } else {
        format!("{v:?}{suffix}")
    }
}

fn parse_float(code: &str, class: &str, suffix: char) -> Option<f64> {
    if let Some(constant) = code
        .strip_prefix(class)
        .and_then(|rest| rest.strip_prefix('.'))
    {
        return match constant {
            "NaN" => Some(f64::NAN),
            "POSITIVE_INFINITY" => Some(f64::INFINITY),
            "NEGATIVE_INFINITY" => Some(f64::NEG_INFINITY),
            _ => None,
        };
    }
    code.strip_suffix(suffix)?.parse().ok()
}

fn escape(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
            c => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> Option<String> {
    let mut units: Vec<u16> = Vec::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u16; 2];
            units.extend_from_slice(c.encode_utf16(&mut buf));
            continue;
        }
        let decoded = match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '0' => '\0',
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return None;
                }
                units.push(u16::from_str_radix(&hex, 16).ok()?);
                continue;
            }
            other => other,
        };
        let mut buf = [0u16; 2];
        units.extend_from_slice(decoded.encode_utf16(&mut buf));
    }
    String::from_utf16(&units).ok()
}
