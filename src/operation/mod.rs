//! Typed operations: constructors, methods, literals and array creations
//! with their input and output types.

mod callable;
mod outcome;
mod parsable;
mod term;
mod typed;

pub use callable::{ArrayCreation, CallableOperation};
pub(crate) use callable::panic_message;
pub use outcome::{DeadlineToken, ExecutionContext, ExecutionOutcome, OutputSink};
pub use term::NonreceiverTerm;
pub use typed::TypedOperation;
