//! Assignment compatibility over type terms, boxing included.

use std::collections::{HashSet, VecDeque};

use crate::reflect::Reflection;

use super::{PrimitiveKind, Substitution, TypeTerm, Wildcard, OBJECT};

const ARRAY_SUPERTYPES: [&str; 3] = [OBJECT, "java.lang.Cloneable", "java.io.Serializable"];

/// Returns `ty` viewed as the class `target`, walking declared supertypes and
/// substituting type arguments along the way.
///
/// `java.util.ArrayList<String>` viewed as `java.util.List` yields
/// `java.util.List<String>`. Raw input yields raw supertypes.
pub fn supertype_view(
    ty: &TypeTerm,
    target: &str,
    reflection: &dyn Reflection,
) -> Option<TypeTerm> {
    match ty {
        TypeTerm::Class(_) | TypeTerm::Parameterized { .. } => {}
        _ => return None,
    }

    let mut queue = VecDeque::from([ty.clone()]);
    let mut seen = HashSet::new();

    while let Some(current) = queue.pop_front() {
        let raw = current.erased_name();
        if raw == target {
            return Some(current);
        }
        if !seen.insert(raw.clone()) {
            continue;
        }
        let Some(class) = reflection.resolve_class(&raw) else {
            continue;
        };

        let substitution = match &current {
            TypeTerm::Parameterized { args, .. } if args.len() == class.type_parameters().len() => {
                Some(Substitution::from_pairs(
                    class
                        .type_parameters()
                        .iter()
                        .map(|tp| tp.name.clone())
                        .zip(args.iter().cloned()),
                ))
            }
            _ => None,
        };

        for supertype in class.supertypes() {
            let next = match &substitution {
                Some(sigma) => sigma.apply(supertype),
                None => supertype.erasure(),
            };
            queue.push_back(next);
        }
    }

    if target == OBJECT {
        return Some(TypeTerm::object());
    }
    None
}

/// `true` when the class named `sub` is `sup` or one of its subclasses or
/// implementors.
pub fn is_subclass(sub: &str, sup: &str, reflection: &dyn Reflection) -> bool {
    supertype_view(&TypeTerm::class(sub), sup, reflection).is_some()
}

/// Returns `true` when a value of type `sub` may be assigned to a variable of
/// type `sup`: identity, widening primitive conversion, boxing or unboxing
/// followed by widening, and reference subtyping with type-argument
/// containment.
pub fn is_assignable_from(sup: &TypeTerm, sub: &TypeTerm, reflection: &dyn Reflection) -> bool {
    if sup == sub {
        return !sup.is_void();
    }

    match (sup, sub) {
        (TypeTerm::Primitive(p), TypeTerm::Primitive(q)) => q.widens_to(*p),
        (TypeTerm::Primitive(p), _) => sub.unboxed_kind().map_or(false, |q| q.widens_to(*p)),
        (_, TypeTerm::Primitive(PrimitiveKind::Void)) => false,
        (_, TypeTerm::Primitive(q)) => {
            is_assignable_from(sup, &TypeTerm::class(q.boxed_name()), reflection)
        }
        (TypeTerm::Wildcard(bound), _) => match bound {
            Wildcard::Unbounded => true,
            Wildcard::Extends(upper) => is_assignable_from(upper, sub, reflection),
            Wildcard::Super(lower) => is_assignable_from(sub, lower, reflection),
        },
        (_, TypeTerm::Wildcard(bound)) => match bound {
            Wildcard::Extends(upper) => is_assignable_from(sup, upper, reflection),
            _ => sup.is_object(),
        },
        (_, _) if sup.is_object() => true,
        (TypeTerm::Variable(a), TypeTerm::Variable(b)) if a.name == b.name => true,
        (_, TypeTerm::Variable(b)) => b
            .bounds
            .iter()
            .any(|bound| is_assignable_from(sup, bound, reflection)),
        (TypeTerm::Variable(_), _) => false,
        (TypeTerm::Array(se), TypeTerm::Array(be)) => {
            if se.is_primitive() || be.is_primitive() {
                se == be
            } else {
                is_assignable_from(se, be, reflection)
            }
        }
        (TypeTerm::Class(name), TypeTerm::Array(_)) => ARRAY_SUPERTYPES.contains(&name.as_str()),
        (_, TypeTerm::Array(_)) | (TypeTerm::Array(_), _) => false,
        (TypeTerm::Class(raw), _) => supertype_view(sub, raw, reflection).is_some(),
        (TypeTerm::Parameterized { raw, args }, _) => {
            match supertype_view(sub, raw, reflection) {
                Some(TypeTerm::Parameterized { args: view_args, .. }) => {
                    args.len() == view_args.len()
                        && args
                            .iter()
                            .zip(&view_args)
                            .all(|(a, b)| contains(a, b, reflection))
                }
                // Unchecked conversion from a raw type.
                Some(_) => true,
                None => false,
            }
        }
    }
}

/// Type-argument containment: does argument `outer` admit argument `inner`?
fn contains(outer: &TypeTerm, inner: &TypeTerm, reflection: &dyn Reflection) -> bool {
    match (outer, inner) {
        (TypeTerm::Wildcard(Wildcard::Unbounded), _) => true,
        (TypeTerm::Wildcard(Wildcard::Extends(upper)), TypeTerm::Wildcard(Wildcard::Extends(b))) => {
            is_assignable_from(upper, b, reflection)
        }
        (TypeTerm::Wildcard(Wildcard::Extends(upper)), TypeTerm::Wildcard(_)) => upper.is_object(),
        (TypeTerm::Wildcard(Wildcard::Extends(upper)), _) => {
            is_assignable_from(upper, inner, reflection)
        }
        (TypeTerm::Wildcard(Wildcard::Super(lower)), TypeTerm::Wildcard(Wildcard::Super(b))) => {
            is_assignable_from(b, lower, reflection)
        }
        (TypeTerm::Wildcard(Wildcard::Super(_)), TypeTerm::Wildcard(_)) => false,
        (TypeTerm::Wildcard(Wildcard::Super(lower)), _) => {
            is_assignable_from(inner, lower, reflection)
        }
        (TypeTerm::Variable(a), TypeTerm::Variable(b)) => a.name == b.name,
        _ => outer == inner,
    }
}
