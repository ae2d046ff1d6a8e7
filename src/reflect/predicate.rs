//! Filters over reflected members, used to decide which callables a
//! generator may use.

use regex::Regex;

use super::{ClassDef, ConstructorDef, MethodDef, Visibility};
use crate::error::OpSpecError;

/// Reflection-level filter over classes and their members.
pub trait ReflectionPredicate: Send + Sync {
    fn test_class(&self, _class: &ClassDef) -> bool {
        true
    }

    fn test_constructor(&self, constructor: &ConstructorDef) -> bool;

    fn test_method(&self, method: &MethodDef) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
/// Accepts public members of public classes.
pub struct PublicOnly;

impl ReflectionPredicate for PublicOnly {
    fn test_class(&self, class: &ClassDef) -> bool {
        class.visibility() == Visibility::Public
    }

    fn test_constructor(&self, constructor: &ConstructorDef) -> bool {
        constructor.visibility() == Visibility::Public
    }

    fn test_method(&self, method: &MethodDef) -> bool {
        method.visibility() == Visibility::Public
    }
}

#[derive(Debug, Clone)]
/// Rejects members whose qualified form `pkg.Class.name(T1,T2)` matches any
/// of the patterns. Constructors use the simple class name as their name.
pub struct OmitPattern {
    patterns: Vec<Regex>,
}

impl OmitPattern {
    pub fn new<I, S>(patterns: I) -> Result<Self, OpSpecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|err| {
                    OpSpecError::parse(format!("invalid omit pattern '{}': {err}", p.as_ref()))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    fn omits(&self, text: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(text))
    }
}

impl ReflectionPredicate for OmitPattern {
    fn test_constructor(&self, constructor: &ConstructorDef) -> bool {
        let class = constructor.declaring_class();
        let simple = class.rsplit(['.', '$']).next().unwrap_or(class);
        !self.omits(&qualified_form(
            class,
            simple,
            &constructor.erased_parameter_names(),
        ))
    }

    fn test_method(&self, method: &MethodDef) -> bool {
        !self.omits(&qualified_form(
            method.declaring_class(),
            method.name(),
            &method.erased_parameter_names(),
        ))
    }
}

fn qualified_form(class: &str, name: &str, params: &[String]) -> String {
    format!("{class}.{name}({})", params.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{body, Value};
    use crate::types::{PrimitiveKind, TypeTerm};

    fn sample() -> ClassDef {
        ClassDef::builder("p.C")
            .constructor(vec![], body(|_| Ok(Value::Null)))
            .method(
                "hashCode",
                vec![],
                TypeTerm::Primitive(PrimitiveKind::Int),
                body(|_| Ok(Value::Int(0))),
            )
            .member_visibility(Visibility::Private)
            .method(
                "secret",
                vec![TypeTerm::string()],
                TypeTerm::Primitive(PrimitiveKind::Void),
                body(|_| Ok(Value::Null)),
            )
            .build()
    }

    #[test]
    fn public_only_filters_by_visibility() {
        let class = sample();
        assert!(PublicOnly.test_class(&class));
        assert!(PublicOnly.test_method(&class.methods()[0]));
        assert!(!PublicOnly.test_method(&class.methods()[1]));
    }

    #[test]
    fn omit_pattern_matches_qualified_form() {
        let class = sample();
        let omit = OmitPattern::new([r"\.hashCode\(\)$", r"^p\.C\.C\("]).unwrap();
        assert!(!omit.test_method(&class.methods()[0]));
        assert!(omit.test_method(&class.methods()[1]));
        assert!(!omit.test_constructor(&class.constructors()[0]));
    }

    #[test]
    fn omit_pattern_rejects_bad_regex() {
        assert!(matches!(OmitPattern::new(["("]), Err(OpSpecError::Parse(_))));
    }
}
