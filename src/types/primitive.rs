//! Primitive kinds, their boxed counterparts and widening conversions.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
/// Primitive types of the target language, including `void`.
pub enum PrimitiveKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

const ALL: [PrimitiveKind; 9] = [
    PrimitiveKind::Boolean,
    PrimitiveKind::Byte,
    PrimitiveKind::Char,
    PrimitiveKind::Short,
    PrimitiveKind::Int,
    PrimitiveKind::Long,
    PrimitiveKind::Float,
    PrimitiveKind::Double,
    PrimitiveKind::Void,
];

impl PrimitiveKind {
    /// Source-language keyword for this primitive.
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Void => "void",
        }
    }

    /// Fully-qualified name of the boxed class.
    pub fn boxed_name(self) -> &'static str {
        match self {
            Self::Boolean => "java.lang.Boolean",
            Self::Byte => "java.lang.Byte",
            Self::Char => "java.lang.Character",
            Self::Short => "java.lang.Short",
            Self::Int => "java.lang.Integer",
            Self::Long => "java.lang.Long",
            Self::Float => "java.lang.Float",
            Self::Double => "java.lang.Double",
            Self::Void => "java.lang.Void",
        }
    }

    /// Single-character JVM descriptor (`I`, `J`, `Z`, ...).
    pub fn descriptor(self) -> char {
        match self {
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Char => 'C',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
            Self::Void => 'V',
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn from_boxed_name(name: &str) -> Option<Self> {
        ALL.into_iter().find(|kind| kind.boxed_name() == name)
    }

    pub fn from_descriptor(c: char) -> Option<Self> {
        ALL.into_iter().find(|kind| kind.descriptor() == c)
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Boolean | Self::Void)
    }

    /// Returns `true` when a value of `self` converts to `target` by identity
    /// or widening primitive conversion.
    pub fn widens_to(self, target: PrimitiveKind) -> bool {
        use PrimitiveKind::*;

        if self == target {
            return self != Void;
        }
        match self {
            Byte => matches!(target, Short | Int | Long | Float | Double),
            Short | Char => matches!(target, Int | Long | Float | Double),
            Int => matches!(target, Long | Float | Double),
            Long => matches!(target, Float | Double),
            Float => matches!(target, Double),
            Boolean | Double | Void => false,
        }
    }
}

/// Returns `true` when `a` and `b` name the same type up to boxing
/// (`int` and `java.lang.Integer`, for example).
pub fn boxing_equivalent(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (PrimitiveKind::from_name(a), PrimitiveKind::from_name(b)) {
        (Some(kind), None) => kind.boxed_name() == b,
        (None, Some(kind)) => kind.boxed_name() == a,
        _ => false,
    }
}
