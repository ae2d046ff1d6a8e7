use std::fmt;
use std::ops::Index;

use super::{Substitution, TypeTerm};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Ordered, fixed-length sequence of type terms.
pub struct TypeTuple {
    types: Vec<TypeTerm>,
}

impl TypeTuple {
    pub fn new(types: Vec<TypeTerm>) -> Self {
        Self { types }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TypeTerm> {
        self.types.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TypeTerm> {
        self.types.iter()
    }

    pub fn as_slice(&self) -> &[TypeTerm] {
        &self.types
    }

    pub fn is_generic(&self) -> bool {
        self.types.iter().any(TypeTerm::is_generic)
    }

    /// Pointwise substitution.
    pub fn apply(&self, substitution: &Substitution) -> TypeTuple {
        TypeTuple {
            types: self.types.iter().map(|t| substitution.apply(t)).collect(),
        }
    }
}

impl Index<usize> for TypeTuple {
    type Output = TypeTerm;

    fn index(&self, index: usize) -> &Self::Output {
        &self.types[index]
    }
}

impl<'a> IntoIterator for &'a TypeTuple {
    type Item = &'a TypeTerm;
    type IntoIter = std::slice::Iter<'a, TypeTerm>;

    fn into_iter(self) -> Self::IntoIter {
        self.types.iter()
    }
}

impl FromIterator<TypeTerm> for TypeTuple {
    fn from_iter<I: IntoIterator<Item = TypeTerm>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for TypeTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (idx, ty) in self.types.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ty}")?;
        }
        f.write_str(")")
    }
}
