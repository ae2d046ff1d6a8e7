//! Type terms: the closed type language operations are typed in.
//!
//! A [`TypeTerm`] is a tree over primitives, raw classes, arrays, type
//! variables, parameterized classes and wildcards. Equality is structural.
//! A term is *generic* when the tree contains a type variable or wildcard.

mod assign;
mod parse;
mod primitive;
mod substitution;
mod tuple;

use std::collections::BTreeSet;
use std::fmt;

pub use assign::{is_assignable_from, is_subclass, supertype_view};
pub use parse::{for_name, normalize_type_name, parse_type_with_variables};
pub use primitive::{boxing_equivalent, PrimitiveKind};
pub use substitution::{unify, Substitution};
pub use tuple::TypeTuple;

use crate::reflect::ClassDef;

pub(crate) const OBJECT: &str = "java.lang.Object";
pub(crate) const STRING: &str = "java.lang.String";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// A type in the target language.
pub enum TypeTerm {
    /// Primitive type, `void` included.
    Primitive(PrimitiveKind),
    /// Raw (non-parameterized) class or interface, by qualified name.
    Class(String),
    /// Array of the element type.
    Array(Box<TypeTerm>),
    /// Type variable.
    Variable(TypeVariable),
    /// Class or interface applied to type arguments.
    Parameterized { raw: String, args: Vec<TypeTerm> },
    /// Wildcard type argument.
    Wildcard(Wildcard),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// A declared type variable with its upper bounds.
///
/// A reference to the variable from inside its own bounds carries no bounds.
pub struct TypeVariable {
    pub name: String,
    pub bounds: Vec<TypeTerm>,
}

impl TypeVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bounds: Vec::new(),
        }
    }

    pub fn bounded(name: impl Into<String>, bounds: Vec<TypeTerm>) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Wildcard bound.
pub enum Wildcard {
    /// `?`
    Unbounded,
    /// `? extends T`
    Extends(Box<TypeTerm>),
    /// `? super T`
    Super(Box<TypeTerm>),
}

impl TypeTerm {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::Primitive(kind)
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::Class(name.into())
    }

    pub fn array_of(element: TypeTerm) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(TypeVariable::new(name))
    }

    pub fn parameterized(raw: impl Into<String>, args: Vec<TypeTerm>) -> Self {
        Self::Parameterized {
            raw: raw.into(),
            args,
        }
    }

    pub fn object() -> Self {
        Self::Class(OBJECT.to_string())
    }

    pub fn string() -> Self {
        Self::Class(STRING.to_string())
    }

    /// The generic type of a declared class: parameterized by its own type
    /// variables when it declares any, raw otherwise.
    pub fn for_class(class: &ClassDef) -> Self {
        if class.type_parameters().is_empty() {
            Self::Class(class.name().to_string())
        } else {
            Self::Parameterized {
                raw: class.name().to_string(),
                args: class
                    .type_parameters()
                    .iter()
                    .cloned()
                    .map(TypeTerm::Variable)
                    .collect(),
            }
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive(kind) if *kind != PrimitiveKind::Void)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Primitive(PrimitiveKind::Void))
    }

    pub fn is_reference(&self) -> bool {
        !matches!(self, Self::Primitive(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Self::Class(name) if name == OBJECT)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::Class(name) if name == STRING)
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Primitive kind of this type or of the primitive it boxes.
    pub fn unboxed_kind(&self) -> Option<PrimitiveKind> {
        match self {
            Self::Primitive(kind) => Some(*kind),
            Self::Class(name) => PrimitiveKind::from_boxed_name(name),
            _ => None,
        }
    }

    pub fn is_boxed_primitive(&self) -> bool {
        matches!(self, Self::Class(name) if PrimitiveKind::from_boxed_name(name).is_some())
    }

    pub fn element_type(&self) -> Option<&TypeTerm> {
        match self {
            Self::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_generic(&self) -> bool {
        match self {
            Self::Primitive(_) | Self::Class(_) => false,
            Self::Variable(_) | Self::Wildcard(_) => true,
            Self::Array(element) => element.is_generic(),
            Self::Parameterized { args, .. } => args.iter().any(TypeTerm::is_generic),
        }
    }

    /// Names of the type variables occurring in this term, bounds excluded.
    pub fn type_variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_type_variables(&mut out);
        out
    }

    fn collect_type_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Self::Primitive(_) | Self::Class(_) => {}
            Self::Variable(var) => {
                out.insert(var.name.clone());
            }
            Self::Array(element) => element.collect_type_variables(out),
            Self::Parameterized { args, .. } => {
                for arg in args {
                    arg.collect_type_variables(out);
                }
            }
            Self::Wildcard(Wildcard::Unbounded) => {}
            Self::Wildcard(Wildcard::Extends(bound) | Wildcard::Super(bound)) => {
                bound.collect_type_variables(out)
            }
        }
    }

    /// Erasure of this term.
    pub fn erasure(&self) -> TypeTerm {
        match self {
            Self::Primitive(_) | Self::Class(_) => self.clone(),
            Self::Array(element) => Self::Array(Box::new(element.erasure())),
            Self::Parameterized { raw, .. } => Self::Class(raw.clone()),
            Self::Variable(var) => var
                .bounds
                .first()
                .map(TypeTerm::erasure)
                .unwrap_or_else(TypeTerm::object),
            Self::Wildcard(Wildcard::Extends(bound)) => bound.erasure(),
            Self::Wildcard(_) => TypeTerm::object(),
        }
    }

    /// Qualified name of the erasure, arrays written with a `[]` suffix.
    pub fn erased_name(&self) -> String {
        match self.erasure() {
            Self::Primitive(kind) => kind.name().to_string(),
            Self::Class(name) => name,
            Self::Array(element) => format!("{}[]", element.erased_name()),
            other => other.to_string(),
        }
    }

    /// Source-language spelling used in emitted code: nested classes use `.`
    /// and type variables appear without bounds.
    pub fn source_name(&self) -> String {
        match self {
            Self::Primitive(kind) => kind.name().to_string(),
            Self::Class(name) => name.replace('$', "."),
            Self::Array(element) => format!("{}[]", element.source_name()),
            Self::Variable(var) => var.name.clone(),
            Self::Parameterized { raw, args } => {
                let args: Vec<String> = args.iter().map(TypeTerm::source_name).collect();
                format!("{}<{}>", raw.replace('$', "."), args.join(", "))
            }
            Self::Wildcard(Wildcard::Unbounded) => "?".to_string(),
            Self::Wildcard(Wildcard::Extends(bound)) => {
                format!("? extends {}", bound.source_name())
            }
            Self::Wildcard(Wildcard::Super(bound)) => format!("? super {}", bound.source_name()),
        }
    }
}

impl fmt::Display for TypeTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => f.write_str(kind.name()),
            Self::Class(name) => f.write_str(name),
            Self::Array(element) => write!(f, "{element}[]"),
            Self::Variable(var) => write!(f, "{var}"),
            Self::Parameterized { raw, args } => {
                write!(f, "{raw}<")?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            Self::Wildcard(Wildcard::Unbounded) => f.write_str("?"),
            Self::Wildcard(Wildcard::Extends(bound)) => write!(f, "? extends {bound}"),
            Self::Wildcard(Wildcard::Super(bound)) => write!(f, "? super {bound}"),
        }
    }
}

impl fmt::Display for TypeVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (idx, bound) in self.bounds.iter().enumerate() {
            f.write_str(if idx == 0 { " extends " } else { " & " })?;
            write!(f, "{bound}")?;
        }
        Ok(())
    }
}
