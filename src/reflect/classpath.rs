use std::collections::BTreeMap;
use std::sync::Arc;

use super::{body, ClassDef, ClassHandle, Reflection, Value};
use crate::types::{PrimitiveKind, TypeTerm, TypeVariable, OBJECT, STRING};

const SERIALIZABLE: &str = "java.io.Serializable";
const COMPARABLE: &str = "java.lang.Comparable";

/// Standard exception hierarchy as `(class, superclass)` pairs, parents first.
const EXCEPTIONS: [(&str, &str); 10] = [
    ("java.lang.Throwable", OBJECT),
    ("java.lang.Exception", "java.lang.Throwable"),
    ("java.lang.Error", "java.lang.Throwable"),
    ("java.lang.RuntimeException", "java.lang.Exception"),
    ("java.lang.IllegalArgumentException", "java.lang.RuntimeException"),
    ("java.lang.IllegalStateException", "java.lang.RuntimeException"),
    ("java.lang.NullPointerException", "java.lang.RuntimeException"),
    ("java.lang.ArithmeticException", "java.lang.RuntimeException"),
    ("java.lang.IndexOutOfBoundsException", "java.lang.RuntimeException"),
    ("java.lang.UnsupportedOperationException", "java.lang.RuntimeException"),
];

#[derive(Debug, Default, Clone)]
/// In-memory class registry keyed by qualified name.
pub struct ClassPath {
    classes: BTreeMap<String, ClassHandle>,
}

impl ClassPath {
    /// Empty class path. Even `java.lang.Object` is absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Class path holding the core `java.lang` types, the boxed primitives
    /// and the standard exception hierarchy.
    pub fn with_builtins() -> Self {
        let mut cp = Self::new();
        cp.register(
            ClassDef::builder(OBJECT)
                .constructor(vec![], body(|_| Ok(Value::Object(super::ObjectRef::new(OBJECT)))))
                .build(),
        );
        cp.register(ClassDef::builder(SERIALIZABLE).interface().build());
        cp.register(ClassDef::builder("java.lang.Cloneable").interface().build());
        cp.register(ClassDef::builder("java.lang.CharSequence").interface().build());
        cp.register(
            ClassDef::builder(COMPARABLE)
                .interface()
                .type_parameter(TypeVariable::new("T"))
                .build(),
        );
        cp.register(
            ClassDef::builder(STRING)
                .implements(TypeTerm::class(SERIALIZABLE))
                .implements(TypeTerm::parameterized(COMPARABLE, vec![TypeTerm::string()]))
                .implements(TypeTerm::class("java.lang.CharSequence"))
                .build(),
        );
        cp.register(
            ClassDef::builder("java.lang.Number")
                .implements(TypeTerm::class(SERIALIZABLE))
                .build(),
        );

        for kind in [
            PrimitiveKind::Boolean,
            PrimitiveKind::Byte,
            PrimitiveKind::Char,
            PrimitiveKind::Short,
            PrimitiveKind::Int,
            PrimitiveKind::Long,
            PrimitiveKind::Float,
            PrimitiveKind::Double,
        ] {
            let boxed = kind.boxed_name();
            let mut builder = ClassDef::builder(boxed);
            if !matches!(kind, PrimitiveKind::Boolean | PrimitiveKind::Char) {
                builder = builder.extends(TypeTerm::class("java.lang.Number"));
            } else {
                builder = builder.implements(TypeTerm::class(SERIALIZABLE));
            }
            cp.register(
                builder
                    .implements(TypeTerm::parameterized(COMPARABLE, vec![TypeTerm::class(boxed)]))
                    .build(),
            );
        }

        for (name, parent) in EXCEPTIONS {
            let superclass = if parent == OBJECT {
                TypeTerm::object()
            } else {
                TypeTerm::class(parent)
            };
            let mut builder = ClassDef::builder(name).extends(superclass);
            if parent == OBJECT {
                builder = builder.implements(TypeTerm::class(SERIALIZABLE));
            }
            cp.register(builder.build());
        }

        cp
    }

    /// Adds or replaces a class.
    pub fn register(&mut self, class: ClassDef) -> ClassHandle {
        let handle = Arc::new(class);
        self.classes
            .insert(handle.name().to_string(), Arc::clone(&handle));
        handle
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Registered classes in name order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassHandle> {
        self.classes.values()
    }
}

impl Reflection for ClassPath {
    fn resolve_class(&self, name: &str) -> Option<ClassHandle> {
        self.classes.get(name).cloned()
    }
}
