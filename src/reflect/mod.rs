//! Reflection collaborator: classes, constructors and methods that operations
//! are built from.
//!
//! [`Reflection`] is the seam the rest of the crate talks to. [`ClassPath`] is
//! the in-memory implementation; member bodies are host closures.

mod classpath;
mod predicate;
mod value;

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

pub use classpath::ClassPath;
pub use predicate::{OmitPattern, PublicOnly, ReflectionPredicate};
pub use value::{ArrayRef, ObjectRef, Thrown, Value};

use crate::operation::DeadlineToken;
use crate::signature::OperationSignature;
use crate::types::{TypeTerm, TypeVariable};

/// Class-path view used to resolve names and find members.
pub trait Reflection: Send + Sync {
    /// Looks up a class by qualified name.
    fn resolve_class(&self, name: &str) -> Option<ClassHandle>;

    /// Finds the constructor whose erased parameter type names equal `parameter_types`.
    fn find_constructor(
        &self,
        class: &ClassDef,
        parameter_types: &[String],
    ) -> Option<ConstructorHandle> {
        class
            .constructors()
            .iter()
            .find(|c| c.erased_parameter_names() == parameter_types)
            .cloned()
    }

    /// Finds the method named `name` whose erased parameter type names equal `parameter_types`.
    fn find_method(
        &self,
        class: &ClassDef,
        name: &str,
        parameter_types: &[String],
    ) -> Option<MethodHandle> {
        class
            .methods()
            .iter()
            .find(|m| m.name() == name && m.erased_parameter_names() == parameter_types)
            .cloned()
    }
}

pub type ClassHandle = Arc<ClassDef>;
pub type ConstructorHandle = Arc<ConstructorDef>;
pub type MethodHandle = Arc<MethodDef>;

/// Host implementation of a constructor or method.
pub type Body = Arc<dyn Fn(&Invocation<'_>) -> Result<Value, Thrown> + Send + Sync>;

/// Wraps a closure as a member [`Body`].
pub fn body<F>(f: F) -> Body
where
    F: Fn(&Invocation<'_>) -> Result<Value, Thrown> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Arguments of a single call, handed to a member body.
pub struct Invocation<'a> {
    receiver: Option<&'a Value>,
    args: &'a [Value],
    deadline: &'a DeadlineToken,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        receiver: Option<&'a Value>,
        args: &'a [Value],
        deadline: &'a DeadlineToken,
    ) -> Self {
        Self {
            receiver,
            args,
            deadline,
        }
    }

    /// Receiver of an instance-method call.
    pub fn receiver(&self) -> Option<&Value> {
        self.receiver
    }

    /// Receiver as an object reference.
    pub fn this(&self) -> Result<&ObjectRef, Thrown> {
        self.receiver
            .and_then(Value::as_object)
            .ok_or_else(Thrown::null_pointer)
    }

    pub fn args(&self) -> &[Value] {
        self.args
    }

    pub fn arg(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&Value::Null)
    }

    /// `true` once the caller's deadline has passed or the call was cancelled.
    /// Long-running bodies should poll this and return early.
    pub fn is_interrupted(&self) -> bool {
        self.deadline.is_expired()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    Package,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
}

/// A declared class or interface.
pub struct ClassDef {
    name: String,
    kind: ClassKind,
    visibility: Visibility,
    type_parameters: Vec<TypeVariable>,
    superclass: Option<TypeTerm>,
    interfaces: Vec<TypeTerm>,
    supertypes: Vec<TypeTerm>,
    constructors: Vec<ConstructorHandle>,
    methods: Vec<MethodHandle>,
}

impl ClassDef {
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn type_parameters(&self) -> &[TypeVariable] {
        &self.type_parameters
    }

    pub fn superclass(&self) -> Option<&TypeTerm> {
        self.superclass.as_ref()
    }

    pub fn interfaces(&self) -> &[TypeTerm] {
        &self.interfaces
    }

    /// Direct supertypes: superclass first, then interfaces in declaration order.
    pub fn supertypes(&self) -> &[TypeTerm] {
        &self.supertypes
    }

    /// Constructors in declaration order.
    pub fn constructors(&self) -> &[ConstructorHandle] {
        &self.constructors
    }

    /// Methods in declaration order.
    pub fn methods(&self) -> &[MethodHandle] {
        &self.methods
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("type_parameters", &self.type_parameters)
            .field("supertypes", &self.supertypes)
            .field("constructors", &self.constructors.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// A declared constructor.
pub struct ConstructorDef {
    declaring_class: String,
    declaring_type: TypeTerm,
    parameter_types: Vec<TypeTerm>,
    visibility: Visibility,
    body: Body,
}

impl ConstructorDef {
    pub fn declaring_class(&self) -> &str {
        &self.declaring_class
    }

    /// Generic type of the declaring class.
    pub fn declaring_type(&self) -> &TypeTerm {
        &self.declaring_type
    }

    /// Declared (generic) parameter types.
    pub fn parameter_types(&self) -> &[TypeTerm] {
        &self.parameter_types
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_types.len()
    }

    pub fn erased_parameter_names(&self) -> Vec<String> {
        self.parameter_types.iter().map(TypeTerm::erased_name).collect()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn signature(&self) -> OperationSignature {
        OperationSignature::of_constructor(self)
    }

    pub(crate) fn invoke(&self, invocation: &Invocation<'_>) -> Result<Value, Thrown> {
        (self.body)(invocation)
    }
}

impl fmt::Debug for ConstructorDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConstructorDef({})", self.signature())
    }
}

/// A declared method.
pub struct MethodDef {
    declaring_class: String,
    declaring_type: TypeTerm,
    name: String,
    parameter_types: Vec<TypeTerm>,
    return_type: TypeTerm,
    is_static: bool,
    visibility: Visibility,
    body: Body,
}

impl MethodDef {
    pub fn declaring_class(&self) -> &str {
        &self.declaring_class
    }

    /// Generic type of the declaring class.
    pub fn declaring_type(&self) -> &TypeTerm {
        &self.declaring_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared (generic) parameter types, receiver excluded.
    pub fn parameter_types(&self) -> &[TypeTerm] {
        &self.parameter_types
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_types.len()
    }

    pub fn erased_parameter_names(&self) -> Vec<String> {
        self.parameter_types.iter().map(TypeTerm::erased_name).collect()
    }

    /// Declared (generic) return type.
    pub fn return_type(&self) -> &TypeTerm {
        &self.return_type
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn signature(&self) -> OperationSignature {
        OperationSignature::of_method(self)
    }

    pub(crate) fn invoke(&self, invocation: &Invocation<'_>) -> Result<Value, Thrown> {
        (self.body)(invocation)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodDef({}, static={})", self.signature(), self.is_static)
    }
}

#[derive(Debug, Clone)]
/// A resolved constructor or method.
pub enum CallableHandle {
    Constructor(ConstructorHandle),
    Method(MethodHandle),
}

impl CallableHandle {
    pub fn signature(&self) -> OperationSignature {
        match self {
            Self::Constructor(c) => c.signature(),
            Self::Method(m) => m.signature(),
        }
    }

    pub fn declaring_class(&self) -> &str {
        match self {
            Self::Constructor(c) => c.declaring_class(),
            Self::Method(m) => m.declaring_class(),
        }
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self, Self::Constructor(_))
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Self::Method(m) if m.is_static())
    }

    pub fn parameter_count(&self) -> usize {
        match self {
            Self::Constructor(c) => c.parameter_count(),
            Self::Method(m) => m.parameter_count(),
        }
    }

    pub fn ptr_eq(&self, other: &CallableHandle) -> bool {
        match (self, other) {
            (Self::Constructor(a), Self::Constructor(b)) => Arc::ptr_eq(a, b),
            (Self::Method(a), Self::Method(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Builder for [`ClassDef`]. Members added after [`ClassBuilder::member_visibility`]
/// take that visibility; the default is public.
pub struct ClassBuilder {
    name: String,
    kind: ClassKind,
    visibility: Visibility,
    member_visibility: Visibility,
    type_parameters: Vec<TypeVariable>,
    superclass: Option<TypeTerm>,
    interfaces: Vec<TypeTerm>,
    constructors: Vec<(Vec<TypeTerm>, Visibility, Body)>,
    methods: Vec<PendingMethod>,
}

struct PendingMethod {
    name: String,
    parameter_types: Vec<TypeTerm>,
    return_type: TypeTerm,
    is_static: bool,
    visibility: Visibility,
    body: Body,
}

impl ClassBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            kind: ClassKind::Class,
            visibility: Visibility::Public,
            member_visibility: Visibility::Public,
            type_parameters: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn interface(mut self) -> Self {
        self.kind = ClassKind::Interface;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn member_visibility(mut self, visibility: Visibility) -> Self {
        self.member_visibility = visibility;
        self
    }

    pub fn type_parameter(mut self, variable: TypeVariable) -> Self {
        self.type_parameters.push(variable);
        self
    }

    pub fn extends(mut self, superclass: TypeTerm) -> Self {
        self.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: TypeTerm) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn constructor(mut self, parameter_types: Vec<TypeTerm>, body: Body) -> Self {
        self.constructors
            .push((parameter_types, self.member_visibility, body));
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        parameter_types: Vec<TypeTerm>,
        return_type: TypeTerm,
        body: Body,
    ) -> Self {
        self.methods.push(PendingMethod {
            name: name.into(),
            parameter_types,
            return_type,
            is_static: false,
            visibility: self.member_visibility,
            body,
        });
        self
    }

    pub fn static_method(
        mut self,
        name: impl Into<String>,
        parameter_types: Vec<TypeTerm>,
        return_type: TypeTerm,
        body: Body,
    ) -> Self {
        self.methods.push(PendingMethod {
            name: name.into(),
            parameter_types,
            return_type,
            is_static: true,
            visibility: self.member_visibility,
            body,
        });
        self
    }

    pub fn build(self) -> ClassDef {
        let declaring_type = if self.type_parameters.is_empty() {
            TypeTerm::Class(self.name.clone())
        } else {
            TypeTerm::Parameterized {
                raw: self.name.clone(),
                args: self
                    .type_parameters
                    .iter()
                    .cloned()
                    .map(TypeTerm::Variable)
                    .collect(),
            }
        };

        let superclass = match (self.kind, self.superclass) {
            (ClassKind::Class, None) if self.name != crate::types::OBJECT => {
                Some(TypeTerm::object())
            }
            (_, superclass) => superclass,
        };
        let supertypes = superclass
            .iter()
            .chain(self.interfaces.iter())
            .cloned()
            .collect();

        let constructors = self
            .constructors
            .into_iter()
            .map(|(parameter_types, visibility, body)| {
                Arc::new(ConstructorDef {
                    declaring_class: self.name.clone(),
                    declaring_type: declaring_type.clone(),
                    parameter_types,
                    visibility,
                    body,
                })
            })
            .collect();

        let methods = self
            .methods
            .into_iter()
            .map(|m| {
                Arc::new(MethodDef {
                    declaring_class: self.name.clone(),
                    declaring_type: declaring_type.clone(),
                    name: m.name,
                    parameter_types: m.parameter_types,
                    return_type: m.return_type,
                    is_static: m.is_static,
                    visibility: m.visibility,
                    body: m.body,
                })
            })
            .collect();

        ClassDef {
            name: self.name,
            kind: self.kind,
            visibility: self.visibility,
            type_parameters: self.type_parameters,
            superclass,
            interfaces: self.interfaces,
            supertypes,
            constructors,
            methods,
        }
    }
}

/// Proper ancestors of `class` in method-resolution order: the superclass
/// chain first, then interfaces breadth-first. Each class appears once.
pub fn method_resolution_order(class: &ClassDef, reflection: &dyn Reflection) -> Vec<ClassHandle> {
    let mut visited: HashSet<String> = HashSet::from([class.name().to_string()]);
    let mut out = Vec::new();

    let mut chain = class.superclass().map(TypeTerm::erased_name);
    while let Some(name) = chain {
        if !visited.insert(name.clone()) {
            break;
        }
        let Some(next) = reflection.resolve_class(&name) else {
            break;
        };
        chain = next.superclass().map(TypeTerm::erased_name);
        out.push(next);
    }

    let mut queue: VecDeque<String> = std::iter::once(class)
        .chain(out.iter().map(|c| c.as_ref()))
        .flat_map(|c| c.interfaces().iter().map(TypeTerm::erased_name))
        .collect();
    while let Some(name) = queue.pop_front() {
        if !visited.insert(name.clone()) {
            continue;
        }
        let Some(next) = reflection.resolve_class(&name) else {
            continue;
        };
        queue.extend(next.interfaces().iter().map(TypeTerm::erased_name));
        out.push(next);
    }

    out
}
