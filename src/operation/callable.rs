//! The executable kinds behind a typed operation.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use crate::reflect::{
    ArrayRef, ConstructorHandle, Invocation, MethodHandle, ReflectionPredicate, Thrown, Value,
};
use crate::types::TypeTerm;

use super::outcome::{ExecutionContext, ExecutionOutcome};
use super::term::NonreceiverTerm;

/// Operation name used for constructors in parsable form.
pub(crate) const CONSTRUCTOR_NAME: &str = "<init>";
/// Operation name used for array creation in parsable form.
pub(crate) const ARRAY_NAME: &str = "new";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Creation of a one-dimensional array filled from the inputs.
pub struct ArrayCreation {
    element_type: TypeTerm,
    length: usize,
}

impl ArrayCreation {
    pub fn new(element_type: TypeTerm, length: usize) -> Self {
        Self {
            element_type,
            length,
        }
    }

    pub fn element_type(&self) -> &TypeTerm {
        &self.element_type
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn array_type(&self) -> TypeTerm {
        TypeTerm::array_of(self.element_type.clone())
    }
}

#[derive(Debug, Clone)]
/// A callable or value-producing program element.
pub enum CallableOperation {
    Constructor(ConstructorHandle),
    InstanceMethod(MethodHandle),
    StaticMethod(MethodHandle),
    Nonreceiver(NonreceiverTerm),
    ArrayCreation(ArrayCreation),
}

impl CallableOperation {
    /// Name of the operation: the method name, `<init>` for constructors,
    /// the literal code for terms and `new` for array creation.
    pub fn name(&self) -> String {
        match self {
            Self::Constructor(_) => CONSTRUCTOR_NAME.to_string(),
            Self::InstanceMethod(m) | Self::StaticMethod(m) => m.name().to_string(),
            Self::Nonreceiver(term) => term.code(),
            Self::ArrayCreation(_) => ARRAY_NAME.to_string(),
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Self::StaticMethod(_))
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self, Self::Constructor(_))
    }

    /// `true` for instance and static method calls.
    pub fn is_method(&self) -> bool {
        matches!(self, Self::InstanceMethod(_) | Self::StaticMethod(_))
    }

    pub fn is_nonreceiver(&self) -> bool {
        matches!(self, Self::Nonreceiver(_))
    }

    pub fn is_array_creation(&self) -> bool {
        matches!(self, Self::ArrayCreation(_))
    }

    /// Tag used in parsable form and as the primary sort key.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Self::Constructor(_) => "ctor",
            Self::InstanceMethod(_) => "method",
            Self::StaticMethod(_) => "static",
            Self::Nonreceiver(_) => "literal",
            Self::ArrayCreation(_) => "array",
        }
    }

    pub(crate) fn kind_rank(&self) -> u8 {
        match self {
            Self::Constructor(_) => 0,
            Self::InstanceMethod(_) => 1,
            Self::StaticMethod(_) => 2,
            Self::Nonreceiver(_) => 3,
            Self::ArrayCreation(_) => 4,
        }
    }

    /// Reflection-level filter. Literals and array creations always pass.
    pub fn satisfies(&self, predicate: &dyn ReflectionPredicate) -> bool {
        match self {
            Self::Constructor(c) => predicate.test_constructor(c),
            Self::InstanceMethod(m) | Self::StaticMethod(m) => predicate.test_method(m),
            Self::Nonreceiver(_) | Self::ArrayCreation(_) => true,
        }
    }

    /// Declaring class name of a constructor or method.
    pub fn declaring_class(&self) -> Option<&str> {
        match self {
            Self::Constructor(c) => Some(c.declaring_class()),
            Self::InstanceMethod(m) | Self::StaticMethod(m) => Some(m.declaring_class()),
            _ => None,
        }
    }

    /// Runs the operation. `inputs` must already match the operation's input
    /// types in length; exceptions thrown by the callee become outcomes.
    pub fn execute(&self, inputs: &[Value], ctx: &ExecutionContext) -> ExecutionOutcome {
        match self {
            Self::Nonreceiver(term) => ExecutionOutcome::NormalReturn {
                value: term.value().clone(),
                elapsed: Duration::ZERO,
            },
            Self::ArrayCreation(creation) => {
                let start = Instant::now();
                let array = ArrayRef::new(creation.element_type.clone(), inputs.to_vec());
                ExecutionOutcome::NormalReturn {
                    value: Value::Array(array),
                    elapsed: start.elapsed(),
                }
            }
            Self::Constructor(c) => {
                if let Some(outcome) = reject_null_primitives(c.parameter_types(), inputs) {
                    return outcome;
                }
                invoke(c.declaring_class(), ctx, None, inputs, |inv| c.invoke(inv))
            }
            Self::StaticMethod(m) => {
                if let Some(outcome) = reject_null_primitives(m.parameter_types(), inputs) {
                    return outcome;
                }
                invoke(m.declaring_class(), ctx, None, inputs, |inv| m.invoke(inv))
            }
            Self::InstanceMethod(m) => {
                let Some((receiver, args)) = inputs.split_first() else {
                    return ExecutionOutcome::ExceptionalReturn {
                        exception: Thrown::null_pointer(),
                        elapsed: Duration::ZERO,
                    };
                };
                if receiver.is_null() {
                    return ExecutionOutcome::ExceptionalReturn {
                        exception: Thrown::null_pointer(),
                        elapsed: Duration::ZERO,
                    };
                }
                if let Some(outcome) = reject_null_primitives(m.parameter_types(), args) {
                    return outcome;
                }
                invoke(m.declaring_class(), ctx, Some(receiver), args, |inv| {
                    m.invoke(inv)
                })
            }
        }
    }
}

fn reject_null_primitives(parameters: &[TypeTerm], args: &[Value]) -> Option<ExecutionOutcome> {
    parameters
        .iter()
        .zip(args)
        .position(|(ty, arg)| ty.is_primitive() && arg.is_null())
        .map(|idx| ExecutionOutcome::ExceptionalReturn {
            exception: Thrown::illegal_argument(format!(
                "null passed for primitive parameter {idx}"
            )),
            elapsed: Duration::ZERO,
        })
}

fn invoke<F>(
    declaring_class: &str,
    ctx: &ExecutionContext,
    receiver: Option<&Value>,
    args: &[Value],
    call: F,
) -> ExecutionOutcome
where
    F: FnOnce(&Invocation<'_>) -> Result<Value, Thrown>,
{
    let deadline = ctx.deadline();
    if deadline.is_expired() {
        return ExecutionOutcome::NotExecuted;
    }
    if let Some(probe) = ctx.probe() {
        probe.mark_used(declaring_class);
    }

    let invocation = Invocation::new(receiver, args, deadline);
    let start = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| call(&invocation)));
    let elapsed = start.elapsed();

    if deadline.is_expired() {
        return ExecutionOutcome::Timeout { elapsed };
    }
    match result {
        Ok(Ok(value)) => ExecutionOutcome::NormalReturn { value, elapsed },
        Ok(Err(exception)) => ExecutionOutcome::ExceptionalReturn { exception, elapsed },
        Err(payload) => ExecutionOutcome::ExceptionalReturn {
            exception: Thrown::with_message("java.lang.Error", panic_message(payload.as_ref())),
            elapsed,
        },
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "operation body panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{ClassUsageProbe, CoverageProbe};
    use crate::operation::DeadlineToken;
    use crate::reflect::{body, ClassDef, ObjectRef};
    use crate::types::PrimitiveKind;
    use std::sync::Arc;

    fn int() -> TypeTerm {
        TypeTerm::Primitive(PrimitiveKind::Int)
    }

    fn counter() -> ClassDef {
        ClassDef::builder("p.Counter")
            .constructor(
                vec![int()],
                body(|inv| {
                    Ok(Value::Object(ObjectRef::with_fields(
                        "p.Counter",
                        [("count", inv.arg(0).clone())],
                    )))
                }),
            )
            .method(
                "get",
                vec![],
                int(),
                body(|inv| Ok(inv.this()?.field("count").unwrap_or(Value::Null))),
            )
            .static_method(
                "explode",
                vec![],
                int(),
                body(|_| panic!("boom")),
            )
            .build()
    }

    #[test]
    fn constructor_then_method() {
        let class = counter();
        let ctx = ExecutionContext::new();
        let ctor = CallableOperation::Constructor(class.constructors()[0].clone());
        let made = ctor.execute(&[Value::Int(4)], &ctx);
        let receiver = made.value().cloned().unwrap();

        let get = CallableOperation::InstanceMethod(class.methods()[0].clone());
        let out = get.execute(&[receiver], &ctx);
        assert_eq!(out.value(), Some(&Value::Int(4)));
    }

    #[test]
    fn null_receiver_and_null_primitive_are_exceptional() {
        let class = counter();
        let ctx = ExecutionContext::new();
        let get = CallableOperation::InstanceMethod(class.methods()[0].clone());
        let out = get.execute(&[Value::Null], &ctx);
        assert_eq!(
            out.exception().map(|t| t.exception_type.as_str()),
            Some("java.lang.NullPointerException")
        );
        assert_eq!(out.elapsed(), Duration::ZERO);

        let ctor = CallableOperation::Constructor(class.constructors()[0].clone());
        let out = ctor.execute(&[Value::Null], &ctx);
        assert_eq!(
            out.exception().map(|t| t.exception_type.as_str()),
            Some("java.lang.IllegalArgumentException")
        );
    }

    #[test]
    fn panics_are_captured() {
        let class = counter();
        let op = CallableOperation::StaticMethod(class.methods()[1].clone());
        let out = op.execute(&[], &ExecutionContext::new());
        let thrown = out.exception().unwrap();
        assert_eq!(thrown.exception_type, "java.lang.Error");
        assert_eq!(thrown.message.as_deref(), Some("boom"));
    }

    #[test]
    fn expired_deadline_skips_invocation() {
        let class = counter();
        let probe = Arc::new(ClassUsageProbe::new());
        let deadline = DeadlineToken::never();
        deadline.cancel();
        let ctx = ExecutionContext::new()
            .with_deadline(deadline)
            .with_probe(probe.clone());
        let ctor = CallableOperation::Constructor(class.constructors()[0].clone());
        assert!(ctor.execute(&[Value::Int(1)], &ctx).is_not_executed());
        assert!(!probe.was_used("p.Counter"));
    }

    #[test]
    fn probe_marks_declaring_class() {
        let class = counter();
        let probe = Arc::new(ClassUsageProbe::new());
        let ctx = ExecutionContext::new().with_probe(probe.clone());
        let ctor = CallableOperation::Constructor(class.constructors()[0].clone());
        assert!(ctor.execute(&[Value::Int(1)], &ctx).is_normal());
        assert!(probe.check_and_reset("p.Counter"));
    }
}
