//! Operations decorated with their input and output types.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::OpSpecError;
use crate::reflect::{CallableHandle, ConstructorHandle, MethodHandle, Reflection, Value};
use crate::types::{Substitution, TypeTerm, TypeTuple};

use super::callable::{ArrayCreation, CallableOperation};
use super::outcome::{ExecutionContext, ExecutionOutcome};
use super::parsable;
use super::term::NonreceiverTerm;

#[derive(Debug, Clone)]
/// A callable operation together with its input-type tuple and output type.
///
/// For an instance method the receiver is the first input. Equality, hashing
/// and ordering all use the key `(kind, declaring type, name, input types,
/// output type)`.
pub struct TypedOperation {
    operation: CallableOperation,
    declaring_type: Option<TypeTerm>,
    input_types: TypeTuple,
    output_type: TypeTerm,
}

impl TypedOperation {
    pub(crate) fn from_parts(
        operation: CallableOperation,
        declaring_type: Option<TypeTerm>,
        input_types: TypeTuple,
        output_type: TypeTerm,
    ) -> Self {
        Self {
            operation,
            declaring_type,
            input_types,
            output_type,
        }
    }

    /// Operation creating an instance of the constructor's declaring type.
    pub fn for_constructor(constructor: &ConstructorHandle) -> Self {
        let declaring = constructor.declaring_type().clone();
        Self {
            operation: CallableOperation::Constructor(constructor.clone()),
            declaring_type: Some(declaring.clone()),
            input_types: TypeTuple::new(constructor.parameter_types().to_vec()),
            output_type: declaring,
        }
    }

    /// Operation calling `method`; an instance method takes its receiver as
    /// the first input.
    pub fn for_method(method: &MethodHandle) -> Self {
        let declaring = method.declaring_type().clone();
        let (operation, inputs) = if method.is_static() {
            (
                CallableOperation::StaticMethod(method.clone()),
                method.parameter_types().to_vec(),
            )
        } else {
            let mut inputs = Vec::with_capacity(method.parameter_count() + 1);
            inputs.push(declaring.clone());
            inputs.extend(method.parameter_types().iter().cloned());
            (CallableOperation::InstanceMethod(method.clone()), inputs)
        };
        Self {
            operation,
            declaring_type: Some(declaring),
            input_types: TypeTuple::new(inputs),
            output_type: method.return_type().clone(),
        }
    }

    pub fn for_callable(handle: &CallableHandle) -> Self {
        match handle {
            CallableHandle::Constructor(c) => Self::for_constructor(c),
            CallableHandle::Method(m) => Self::for_method(m),
        }
    }

    /// `null` of a reference type.
    pub fn create_null_initialization_with_type(ty: TypeTerm) -> Result<Self, OpSpecError> {
        if !ty.is_reference() {
            return Err(OpSpecError::PreconditionViolation(format!(
                "cannot initialize primitive type {ty} with null"
            )));
        }
        Ok(Self::create_nonreceiver_initialization(NonreceiverTerm::null_of(ty)?))
    }

    /// Zero of a primitive or boxed type, `null` of any other reference type.
    pub fn create_null_or_zero_initialization_for_type(ty: TypeTerm) -> Result<Self, OpSpecError> {
        Ok(Self::create_nonreceiver_initialization(NonreceiverTerm::zero_of(ty)?))
    }

    /// Literal of a primitive, boxed primitive or string type.
    pub fn create_primitive_initialization(ty: TypeTerm, value: Value) -> Result<Self, OpSpecError> {
        if !(ty.is_primitive() || ty.is_boxed_primitive() || ty.is_string()) {
            return Err(OpSpecError::PreconditionViolation(format!(
                "{ty} is not a primitive, boxed primitive or string type"
            )));
        }
        Ok(Self::create_nonreceiver_initialization(NonreceiverTerm::new(ty, value)?))
    }

    pub fn create_nonreceiver_initialization(term: NonreceiverTerm) -> Self {
        let ty = term.ty().clone();
        Self {
            operation: CallableOperation::Nonreceiver(term),
            declaring_type: None,
            input_types: TypeTuple::empty(),
            output_type: ty,
        }
    }

    /// Creation of an array of `array_type` holding `length` inputs.
    pub fn create_array_creation(array_type: TypeTerm, length: usize) -> Result<Self, OpSpecError> {
        let TypeTerm::Array(element) = &array_type else {
            return Err(OpSpecError::PreconditionViolation(format!(
                "{array_type} is not an array type"
            )));
        };
        let element = element.as_ref().clone();
        Ok(Self {
            operation: CallableOperation::ArrayCreation(ArrayCreation::new(element.clone(), length)),
            declaring_type: None,
            input_types: TypeTuple::new(vec![element; length]),
            output_type: array_type,
        })
    }

    pub fn operation(&self) -> &CallableOperation {
        &self.operation
    }

    /// Declaring type of a constructor or method operation.
    pub fn declaring_type(&self) -> Option<&TypeTerm> {
        self.declaring_type.as_ref()
    }

    pub fn input_types(&self) -> &TypeTuple {
        &self.input_types
    }

    pub fn output_type(&self) -> &TypeTerm {
        &self.output_type
    }

    pub fn name(&self) -> String {
        self.operation.name()
    }

    pub fn is_constructor_call(&self) -> bool {
        self.operation.is_constructor()
    }

    pub fn is_method_call(&self) -> bool {
        self.operation.is_method()
    }

    pub fn is_static(&self) -> bool {
        self.operation.is_static()
    }

    pub fn is_nonreceiving_value(&self) -> bool {
        self.operation.is_nonreceiver()
    }

    pub fn is_array_creation(&self) -> bool {
        self.operation.is_array_creation()
    }

    /// `true` when an input or output type mentions a type variable or wildcard.
    pub fn is_generic(&self) -> bool {
        self.input_types.is_generic() || self.output_type.is_generic()
    }

    /// Reflective handle of a constructor or method operation.
    pub fn callable_handle(&self) -> Option<CallableHandle> {
        match &self.operation {
            CallableOperation::Constructor(c) => Some(CallableHandle::Constructor(c.clone())),
            CallableOperation::InstanceMethod(m) | CallableOperation::StaticMethod(m) => {
                Some(CallableHandle::Method(m.clone()))
            }
            _ => None,
        }
    }

    /// Applies `substitution` to every type of the operation.
    ///
    /// The result stays generic wherever the substitution leaves a variable
    /// unbound.
    pub fn apply(&self, substitution: &Substitution) -> TypedOperation {
        let operation = match &self.operation {
            CallableOperation::ArrayCreation(creation) => {
                CallableOperation::ArrayCreation(ArrayCreation::new(
                    substitution.apply(creation.element_type()),
                    creation.length(),
                ))
            }
            CallableOperation::Nonreceiver(term) => {
                match NonreceiverTerm::new(substitution.apply(term.ty()), term.value().clone()) {
                    Ok(term) => CallableOperation::Nonreceiver(term),
                    Err(_) => self.operation.clone(),
                }
            }
            other => other.clone(),
        };
        TypedOperation {
            operation,
            declaring_type: self.declaring_type.as_ref().map(|t| substitution.apply(t)),
            input_types: self.input_types.apply(substitution),
            output_type: substitution.apply(&self.output_type),
        }
    }

    /// Executes the operation on `inputs`.
    ///
    /// # Panics
    ///
    /// Panics when `inputs.len()` differs from the number of input types.
    pub fn execute(&self, inputs: &[Value], ctx: &ExecutionContext) -> ExecutionOutcome {
        assert_eq!(
            inputs.len(),
            self.input_types.len(),
            "{} expects {} inputs",
            self,
            self.input_types.len()
        );
        let outcome = self.operation.execute(inputs, ctx);
        if let ExecutionOutcome::ExceptionalReturn { exception, .. } = &outcome {
            tracing::debug!(
                target: "opspec.operation",
                operation = %self,
                exception = %exception,
                "operation threw"
            );
        }
        ctx.record(&self.to_parsable(), &outcome);
        outcome
    }

    /// Appends a source-language expression for this operation, with
    /// `vars[i]` standing for input `i`.
    pub fn append_code(&self, vars: &[&str], out: &mut String) {
        debug_assert_eq!(vars.len(), self.input_types.len());
        match &self.operation {
            CallableOperation::Constructor(_) => {
                let ty = self.declaring_type.as_ref().unwrap_or(&self.output_type);
                out.push_str("new ");
                out.push_str(&ty.source_name());
                push_arguments(out, vars);
            }
            CallableOperation::InstanceMethod(m) => {
                let (receiver, args) = vars.split_first().map_or(("null", &[][..]), |(r, a)| (*r, a));
                out.push_str(receiver);
                out.push('.');
                out.push_str(m.name());
                push_arguments(out, args);
            }
            CallableOperation::StaticMethod(m) => {
                let owner = self
                    .declaring_type
                    .as_ref()
                    .map(|t| t.erasure().source_name())
                    .unwrap_or_else(|| m.declaring_class().replace('$', "."));
                out.push_str(&owner);
                out.push('.');
                out.push_str(m.name());
                push_arguments(out, vars);
            }
            CallableOperation::Nonreceiver(term) => out.push_str(&term.code()),
            CallableOperation::ArrayCreation(creation) => {
                out.push_str("new ");
                out.push_str(&creation.element_type().erasure().source_name());
                out.push_str("[]{");
                out.push_str(&vars.join(", "));
                out.push('}');
            }
        }
    }

    /// Compact textual form `kind : declaring . name (inputs) -> output`.
    pub fn to_parsable(&self) -> String {
        let declaring = self.declaring_type.as_ref().unwrap_or(&self.output_type);
        let inputs: Vec<String> = self.input_types.iter().map(ToString::to_string).collect();
        format!(
            "{} : {} . {} ({}) -> {}",
            self.operation.kind_tag(),
            declaring,
            self.operation.name(),
            inputs.join(", "),
            self.output_type
        )
    }

    /// Inverse of [`TypedOperation::to_parsable`].
    pub fn from_parsable(text: &str, reflection: &dyn Reflection) -> Result<Self, OpSpecError> {
        parsable::parse(text, reflection)
    }

    fn sort_key(&self) -> (u8, String, String, Vec<String>, String) {
        (
            self.operation.kind_rank(),
            self.declaring_type
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            self.operation.name(),
            self.input_types.iter().map(ToString::to_string).collect(),
            self.output_type.to_string(),
        )
    }
}

fn push_arguments(out: &mut String, args: &[&str]) {
    out.push('(');
    out.push_str(&args.join(", "));
    out.push(')');
}

impl PartialEq for TypedOperation {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for TypedOperation {}

impl Hash for TypedOperation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sort_key().hash(state);
    }
}

impl PartialOrd for TypedOperation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypedOperation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for TypedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_parsable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{body, ClassDef, ObjectRef};
    use crate::types::{PrimitiveKind, TypeVariable};

    fn int() -> TypeTerm {
        TypeTerm::Primitive(PrimitiveKind::Int)
    }

    fn sample() -> ClassDef {
        ClassDef::builder("p.C")
            .constructor(
                vec![int(), TypeTerm::string()],
                body(|_| Ok(Value::Object(ObjectRef::new("p.C")))),
            )
            .method("size", vec![], int(), body(|_| Ok(Value::Int(0))))
            .static_method("of", vec![int()], TypeTerm::class("p.C"), body(|_| Ok(Value::Null)))
            .build()
    }

    fn code(op: &TypedOperation, vars: &[&str]) -> String {
        let mut out = String::new();
        op.append_code(vars, &mut out);
        out
    }

    #[test]
    fn input_shapes_follow_operation_kind() {
        let class = sample();
        let ctor = TypedOperation::for_constructor(&class.constructors()[0]);
        assert_eq!(ctor.input_types().len(), 2);
        assert_eq!(ctor.output_type(), &TypeTerm::class("p.C"));

        let size = TypedOperation::for_method(&class.methods()[0]);
        assert_eq!(size.input_types().as_slice(), &[TypeTerm::class("p.C")]);
        assert_eq!(size.output_type(), &int());

        let of = TypedOperation::for_method(&class.methods()[1]);
        assert!(of.is_static());
        assert_eq!(of.input_types().as_slice(), &[int()]);
    }

    #[test]
    fn code_for_each_kind() {
        let class = sample();
        let ctor = TypedOperation::for_constructor(&class.constructors()[0]);
        assert_eq!(code(&ctor, &["x", "s"]), "new p.C(x, s)");
        let size = TypedOperation::for_method(&class.methods()[0]);
        assert_eq!(code(&size, &["c0"]), "c0.size()");
        let of = TypedOperation::for_method(&class.methods()[1]);
        assert_eq!(code(&of, &["i"]), "p.C.of(i)");
        let arr = TypedOperation::create_array_creation(TypeTerm::array_of(int()), 2).unwrap();
        assert_eq!(code(&arr, &["a", "b"]), "new int[]{a, b}");
        let lit = TypedOperation::create_primitive_initialization(
            TypeTerm::Primitive(PrimitiveKind::Long),
            Value::Long(9),
        )
        .unwrap();
        assert_eq!(code(&lit, &[]), "9L");
    }

    #[test]
    fn factories_reject_misuse() {
        assert!(matches!(
            TypedOperation::create_null_initialization_with_type(int()),
            Err(OpSpecError::PreconditionViolation(_))
        ));
        assert!(matches!(
            TypedOperation::create_primitive_initialization(TypeTerm::class("p.C"), Value::Null),
            Err(OpSpecError::PreconditionViolation(_))
        ));
        assert!(matches!(
            TypedOperation::create_array_creation(int(), 1),
            Err(OpSpecError::PreconditionViolation(_))
        ));
        let zero = TypedOperation::create_null_or_zero_initialization_for_type(int()).unwrap();
        assert_eq!(
            zero.execute(&[], &ExecutionContext::new()).value(),
            Some(&Value::Int(0))
        );
    }

    #[test]
    fn apply_substitutes_generic_types() {
        let class = ClassDef::builder("p.Box")
            .type_parameter(TypeVariable::new("T"))
            .constructor(vec![TypeTerm::variable("T")], body(|_| Ok(Value::Null)))
            .build();
        let ctor = TypedOperation::for_constructor(&class.constructors()[0]);
        assert!(ctor.is_generic());

        let sigma = Substitution::from_pairs([("T", TypeTerm::string())]);
        let concrete = ctor.apply(&sigma);
        assert!(!concrete.is_generic());
        assert_eq!(
            concrete.output_type(),
            &TypeTerm::parameterized("p.Box", vec![TypeTerm::string()])
        );
        assert_eq!(code(&concrete, &["s"]), "new p.Box<java.lang.String>(s)");

        let partial = ctor.apply(&Substitution::new());
        assert!(partial.is_generic());
    }

    #[test]
    fn ordering_puts_constructors_first() {
        let class = sample();
        let mut ops = vec![
            TypedOperation::create_null_initialization_with_type(TypeTerm::string()).unwrap(),
            TypedOperation::for_method(&class.methods()[1]),
            TypedOperation::for_method(&class.methods()[0]),
            TypedOperation::for_constructor(&class.constructors()[0]),
        ];
        ops.sort();
        let tags: Vec<&str> = ops.iter().map(|op| op.operation().kind_tag()).collect();
        assert_eq!(tags, vec!["ctor", "method", "static", "literal"]);
    }

    #[test]
    #[should_panic(expected = "expects 3 inputs")]
    fn execute_asserts_input_arity() {
        let arr = TypedOperation::create_array_creation(TypeTerm::array_of(int()), 3).unwrap();
        arr.execute(&[Value::Int(1), Value::Int(2)], &ExecutionContext::new());
    }
}
