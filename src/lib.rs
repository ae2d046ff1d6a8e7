pub mod collection;
pub mod condition;
pub mod conditions;
pub mod coverage;
pub mod error;
pub mod expr;
pub mod operation;
pub mod reflect;
pub mod signature;
pub mod spec;
pub mod types;

pub use collection::{LoadOptions, SpecificationCollection};
pub use condition::{Guard, Identifiers, Property};
pub use conditions::{ConditionViolation, OperationConditions, PreconditionCheck};
pub use coverage::{ClassUsageProbe, CoverageProbe};
pub use error::{LoadError, OpSpecError};
pub use expr::{CompiledExpr, DefaultEvaluator, ExpressionEvaluator};
pub use operation::{
    ArrayCreation, CallableOperation, DeadlineToken, ExecutionContext, ExecutionOutcome,
    NonreceiverTerm, OutputSink, TypedOperation,
};
pub use reflect::{
    ArrayRef, CallableHandle, ClassDef, ClassPath, ObjectRef, Reflection, ReflectionPredicate,
    Thrown, Value,
};
pub use signature::OperationSignature;
pub use spec::{
    parse_documents, OperationSpecification, Postcondition, Precondition, ThrowsCondition,
};
pub use types::{Substitution, TypeTerm, TypeTuple};
