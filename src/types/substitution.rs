//! Substitutions from type variables to type terms.

use std::collections::BTreeMap;

use super::{TypeTerm, Wildcard};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Mapping from type-variable name to replacement term.
pub struct Substitution {
    map: BTreeMap<String, TypeTerm>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, TypeTerm)>,
        S: Into<String>,
    {
        Self {
            map: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Binds `variable` to `term`, returning the previous binding.
    pub fn bind(&mut self, variable: impl Into<String>, term: TypeTerm) -> Option<TypeTerm> {
        self.map.insert(variable.into(), term)
    }

    pub fn get(&self, variable: &str) -> Option<&TypeTerm> {
        self.map.get(variable)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypeTerm)> {
        self.map.iter()
    }

    /// Replaces every variable bound by this substitution. Unbound variables
    /// are kept as they are, bounds included.
    pub fn apply(&self, term: &TypeTerm) -> TypeTerm {
        match term {
            TypeTerm::Primitive(_) | TypeTerm::Class(_) => term.clone(),
            TypeTerm::Variable(var) => self
                .map
                .get(&var.name)
                .cloned()
                .unwrap_or_else(|| term.clone()),
            TypeTerm::Array(element) => TypeTerm::Array(Box::new(self.apply(element))),
            TypeTerm::Parameterized { raw, args } => TypeTerm::Parameterized {
                raw: raw.clone(),
                args: args.iter().map(|arg| self.apply(arg)).collect(),
            },
            TypeTerm::Wildcard(Wildcard::Unbounded) => term.clone(),
            TypeTerm::Wildcard(Wildcard::Extends(bound)) => {
                TypeTerm::Wildcard(Wildcard::Extends(Box::new(self.apply(bound))))
            }
            TypeTerm::Wildcard(Wildcard::Super(bound)) => {
                TypeTerm::Wildcard(Wildcard::Super(Box::new(self.apply(bound))))
            }
        }
    }

    /// `true` when applying this substitution to `term` leaves a non-generic
    /// term: no type variable and no wildcard remains.
    pub fn is_complete_for(&self, term: &TypeTerm) -> bool {
        !self.apply(term).is_generic()
    }
}

/// Extends `substitution` so that it instantiates `declared` to `concrete`.
///
/// Returns `false` when no consistent instantiation exists. Wildcards in
/// `declared` match any reference type; raw and parameterized uses of the
/// same class match each other.
pub fn unify(declared: &TypeTerm, concrete: &TypeTerm, substitution: &mut Substitution) -> bool {
    match (declared, concrete) {
        (TypeTerm::Variable(var), _) => {
            if concrete.is_primitive() || concrete.is_void() {
                return false;
            }
            match substitution.get(&var.name) {
                Some(existing) => existing == concrete,
                None => {
                    substitution.bind(var.name.clone(), concrete.clone());
                    true
                }
            }
        }
        (TypeTerm::Wildcard(_), _) => concrete.is_reference(),
        (TypeTerm::Array(d), TypeTerm::Array(c)) => unify(d, c, substitution),
        (
            TypeTerm::Parameterized { raw, args },
            TypeTerm::Parameterized {
                raw: c_raw,
                args: c_args,
            },
        ) => {
            raw == c_raw
                && args.len() == c_args.len()
                && args
                    .iter()
                    .zip(c_args)
                    .all(|(d, c)| unify(d, c, substitution))
        }
        (TypeTerm::Parameterized { raw, .. }, TypeTerm::Class(c_raw))
        | (TypeTerm::Class(raw), TypeTerm::Parameterized { raw: c_raw, .. }) => raw == c_raw,
        _ => declared == concrete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrimitiveKind, TypeVariable};

    fn list_of(arg: TypeTerm) -> TypeTerm {
        TypeTerm::parameterized("java.util.List", vec![arg])
    }

    #[test]
    fn apply_replaces_bound_variables_only() {
        let sigma = Substitution::from_pairs([("T", TypeTerm::string())]);
        let term = TypeTerm::parameterized(
            "java.util.Map",
            vec![TypeTerm::variable("T"), TypeTerm::variable("U")],
        );
        let out = sigma.apply(&term);
        assert_eq!(
            out,
            TypeTerm::parameterized(
                "java.util.Map",
                vec![TypeTerm::string(), TypeTerm::variable("U")]
            )
        );
        assert!(out.is_generic());
        assert!(!sigma.is_complete_for(&term));
    }

    #[test]
    fn complete_substitution_yields_concrete_terms() {
        let bounded = TypeTerm::Variable(TypeVariable::bounded(
            "T",
            vec![TypeTerm::class("java.lang.Number")],
        ));
        let sigma = Substitution::from_pairs([("T", TypeTerm::class("java.lang.Integer"))]);
        let term = TypeTerm::array_of(list_of(bounded));
        assert!(sigma.is_complete_for(&term));
        assert!(!sigma.apply(&term).is_generic());
    }

    #[test]
    fn unify_binds_consistently() {
        let mut sigma = Substitution::new();
        let declared = TypeTerm::parameterized(
            "java.util.Map",
            vec![TypeTerm::variable("K"), TypeTerm::variable("K")],
        );
        let ok = TypeTerm::parameterized(
            "java.util.Map",
            vec![TypeTerm::string(), TypeTerm::string()],
        );
        assert!(unify(&declared, &ok, &mut sigma));
        assert_eq!(sigma.get("K"), Some(&TypeTerm::string()));

        let mut sigma = Substitution::new();
        let clash = TypeTerm::parameterized(
            "java.util.Map",
            vec![TypeTerm::string(), TypeTerm::object()],
        );
        assert!(!unify(&declared, &clash, &mut sigma));
    }

    #[test]
    fn unify_rejects_primitives_for_variables() {
        let mut sigma = Substitution::new();
        assert!(!unify(
            &TypeTerm::variable("T"),
            &TypeTerm::Primitive(PrimitiveKind::Int),
            &mut sigma
        ));
        assert!(unify(
            &TypeTerm::Primitive(PrimitiveKind::Int),
            &TypeTerm::Primitive(PrimitiveKind::Int),
            &mut sigma
        ));
    }
}
