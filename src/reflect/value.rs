//! Runtime values passed to and returned from operations.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::{PrimitiveKind, TypeTerm};

#[derive(Debug, Clone)]
/// A runtime value: null, a primitive, a string, or a reference.
pub enum Value {
    Null,
    Boolean(bool),
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Object(ObjectRef),
    Array(ArrayRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Primitive kind for primitive values (boxed or not).
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        Some(match self {
            Self::Boolean(_) => PrimitiveKind::Boolean,
            Self::Byte(_) => PrimitiveKind::Byte,
            Self::Char(_) => PrimitiveKind::Char,
            Self::Short(_) => PrimitiveKind::Short,
            Self::Int(_) => PrimitiveKind::Int,
            Self::Long(_) => PrimitiveKind::Long,
            Self::Float(_) => PrimitiveKind::Float,
            Self::Double(_) => PrimitiveKind::Double,
            _ => return None,
        })
    }

    /// Runtime class name of the value; `None` for null.
    pub fn runtime_class(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::String(_) => Some("java.lang.String".to_string()),
            Self::Object(obj) => Some(obj.class_name().to_string()),
            Self::Array(arr) => Some(format!("{}[]", arr.element_type().erased_name())),
            other => other.primitive_kind().map(|k| k.boxed_name().to_string()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral value, `char` included.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Byte(v) => Some(i64::from(*v)),
            Self::Char(v) => Some(i64::from(u32::from(*v))),
            Self::Short(v) => Some(i64::from(*v)),
            Self::Int(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(arr) => Some(arr),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    /// Primitives and strings compare by value, objects and arrays by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Byte(a), Self::Byte(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Short(a), Self::Short(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v}"),
            Self::Short(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Double(v) => write!(f, "{v:?}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Object(obj) => write!(f, "{}@{:x}", obj.class_name(), obj.identity()),
            Self::Array(arr) => {
                f.write_str("[")?;
                for (idx, item) in arr.to_vec().iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[derive(Debug)]
struct ObjectData {
    class_name: String,
    fields: RwLock<BTreeMap<String, Value>>,
}

#[derive(Debug, Clone)]
/// Shared handle to an object instance; clones alias the same instance.
pub struct ObjectRef(Arc<ObjectData>);

impl ObjectRef {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self(Arc::new(ObjectData {
            class_name: class_name.into(),
            fields: RwLock::new(BTreeMap::new()),
        }))
    }

    pub fn with_fields<I, S>(class_name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let obj = Self::new(class_name);
        {
            let mut map = obj.0.fields.write();
            for (name, value) in fields {
                map.insert(name.into(), value);
            }
        }
        obj
    }

    pub fn class_name(&self) -> &str {
        &self.0.class_name
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.0.fields.read().get(name).cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: Value) {
        self.0.fields.write().insert(name.into(), value);
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

#[derive(Debug)]
struct ArrayData {
    element_type: TypeTerm,
    elements: RwLock<Vec<Value>>,
}

#[derive(Debug, Clone)]
/// Shared handle to an array instance.
pub struct ArrayRef(Arc<ArrayData>);

impl ArrayRef {
    pub fn new(element_type: TypeTerm, elements: Vec<Value>) -> Self {
        Self(Arc::new(ArrayData {
            element_type,
            elements: RwLock::new(elements),
        }))
    }

    pub fn element_type(&self) -> &TypeTerm {
        &self.0.element_type
    }

    pub fn len(&self) -> usize {
        self.0.elements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.elements.read().get(index).cloned()
    }

    /// Stores `value` at `index`; returns `false` when out of bounds.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.0.elements.write().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.elements.read().clone()
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// An exception raised by an operation body.
pub struct Thrown {
    pub exception_type: String,
    pub message: Option<String>,
}

impl Thrown {
    pub fn new(exception_type: impl Into<String>) -> Self {
        Self {
            exception_type: exception_type.into(),
            message: None,
        }
    }

    pub fn with_message(exception_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exception_type: exception_type.into(),
            message: Some(message.into()),
        }
    }

    pub fn null_pointer() -> Self {
        Self::new("java.lang.NullPointerException")
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::with_message("java.lang.IllegalArgumentException", message)
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.exception_type, message),
            None => f.write_str(&self.exception_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_compare_by_identity() {
        let a = ObjectRef::new("p.C");
        let b = ObjectRef::new("p.C");
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
        assert_eq!(Value::from("x"), Value::String("x".into()));
    }

    #[test]
    fn object_fields_are_shared_between_clones() {
        let a = ObjectRef::new("p.C");
        let alias = a.clone();
        alias.set_field("count", Value::Int(3));
        assert_eq!(a.field("count"), Some(Value::Int(3)));
        assert_eq!(a.field("missing"), None);
    }

    #[test]
    fn runtime_class_reports_boxed_names() {
        assert_eq!(Value::Int(1).runtime_class().as_deref(), Some("java.lang.Integer"));
        assert_eq!(Value::Null.runtime_class(), None);
        let arr = ArrayRef::new(TypeTerm::Primitive(PrimitiveKind::Int), vec![Value::Int(1)]);
        assert_eq!(Value::Array(arr).runtime_class().as_deref(), Some("int[]"));
    }
}
