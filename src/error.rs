//! Error definitions for specification loading, type resolution and
//! operation construction.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
/// Top-level error type returned by public APIs.
pub enum OpSpecError {
    /// Malformed JSON, unknown field, or a value of the wrong JSON type.
    #[error("parse error: {0}")]
    Parse(String),
    /// No callable in the declaring class matches the signature.
    #[error("signature not found: {0}")]
    SignatureNotFound(String),
    /// More than one callable matches the signature equally well.
    #[error("ambiguous signature: {signature} matches {candidates} callables")]
    AmbiguousSignature { signature: String, candidates: usize },
    /// Parameter-name count differs from the signature's parameter count.
    #[error("identifier count mismatch: expected {expected} parameter names, got {actual}")]
    IdentifierCount { expected: usize, actual: usize },
    /// The same name is bound twice across parameters, receiver and return.
    #[error("duplicate identifier '{0}'")]
    DuplicateIdentifier(String),
    /// Condition text references a name that the binding does not declare.
    #[error("unknown identifier '{name}' in condition '{text}'")]
    UnknownIdentifier { name: String, text: String },
    /// Condition text could not be tokenized or parsed.
    #[error("expression error: {0}")]
    Expression(String),
    /// Condition evaluation failed at runtime.
    #[error("evaluation error: {0}")]
    Evaluation(String),
    /// A factory was called with arguments it does not accept.
    #[error("precondition violation: {0}")]
    PreconditionViolation(String),
    /// A type name could not be resolved against the class path.
    #[error("type not found: {0}")]
    TypeNotFound(String),
    /// A type name is syntactically malformed.
    #[error("invalid type name '{name}': {message}")]
    InvalidTypeName { name: String, message: String },
    /// A parsable operation string is malformed or names an unknown callable.
    #[error("invalid parsable operation '{text}': {message}")]
    InvalidParsable { text: String, message: String },
    /// Filesystem I/O error while reading specification files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl OpSpecError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub(crate) fn invalid_type(name: &str, message: impl Into<String>) -> Self {
        Self::InvalidTypeName {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_parsable(text: &str, message: impl Into<String>) -> Self {
        Self::InvalidParsable {
            text: text.to_string(),
            message: message.into(),
        }
    }
}

/// A single failure collected while loading a batch of specification documents.
#[derive(Debug)]
pub struct LoadError {
    /// File path or caller-supplied label of the document.
    pub source: String,
    /// JSON pointer to the offending value inside the document.
    pub pointer: String,
    /// Underlying failure.
    pub error: OpSpecError,
}

impl LoadError {
    pub(crate) fn new(source: &str, pointer: impl Into<String>, error: OpSpecError) -> Self {
        Self {
            source: source.to_string(),
            pointer: pointer.into(),
            error,
        }
    }

    /// Error at `pointer` whose source is filled in by the caller.
    pub(crate) fn at(pointer: impl Into<String>, error: OpSpecError) -> Self {
        Self::new("", pointer, error)
    }

    pub(crate) fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pointer.is_empty() {
            write!(f, "{}: {}", self.source, self.error)
        } else {
            write!(f, "{}#{}: {}", self.source, self.pointer, self.error)
        }
    }
}
