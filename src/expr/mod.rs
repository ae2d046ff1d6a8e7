//! Expression language used by guard and property conditions.

/// Expression evaluator and runtime support.
pub mod eval;
/// Tokenizer for expression source text.
pub mod lexer;
/// Parser and expression AST definitions.
pub mod parser;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::error::OpSpecError;
use crate::reflect::{Reflection, Value};

/// Parses expression source into an AST.
pub fn parse_expression(input: &str) -> Result<parser::Expr, OpSpecError> {
    let tokens = lexer::tokenize(input)?;
    parser::parse(&tokens)
}

#[derive(Debug, Clone, PartialEq)]
/// A condition parsed against a fixed set of identifiers.
pub struct CompiledExpr {
    text: String,
    expr: parser::Expr,
    identifiers: BTreeSet<String>,
}

impl CompiledExpr {
    /// Source text the expression was parsed from.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn expr(&self) -> &parser::Expr {
        &self.expr
    }

    /// Identifiers the expression reads.
    pub fn identifiers(&self) -> &BTreeSet<String> {
        &self.identifiers
    }
}

impl fmt::Display for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Parses and evaluates condition text.
pub trait ExpressionEvaluator: Send + Sync {
    /// Parses `text`, rejecting references to names outside `scope`.
    fn parse(&self, text: &str, scope: &BTreeSet<String>) -> Result<CompiledExpr, OpSpecError>;

    /// Evaluates a compiled condition to a boolean.
    fn evaluate(
        &self,
        expr: &CompiledExpr,
        bindings: &BTreeMap<String, Value>,
    ) -> Result<bool, OpSpecError>;
}

#[derive(Clone, Default)]
/// Evaluator for the built-in expression language.
pub struct DefaultEvaluator {
    reflection: Option<Arc<dyn Reflection>>,
}

impl DefaultEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluator that can call methods declared on the class path.
    pub fn with_reflection(reflection: Arc<dyn Reflection>) -> Self {
        Self {
            reflection: Some(reflection),
        }
    }
}

impl fmt::Debug for DefaultEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultEvaluator")
            .field("reflection", &self.reflection.is_some())
            .finish()
    }
}

impl ExpressionEvaluator for DefaultEvaluator {
    fn parse(&self, text: &str, scope: &BTreeSet<String>) -> Result<CompiledExpr, OpSpecError> {
        let expr = parse_expression(text)?;
        let identifiers = expr.referenced_identifiers();
        if let Some(name) = identifiers.iter().find(|name| !scope.contains(*name)) {
            return Err(OpSpecError::UnknownIdentifier {
                name: name.clone(),
                text: text.to_string(),
            });
        }
        Ok(CompiledExpr {
            text: text.to_string(),
            expr,
            identifiers,
        })
    }

    fn evaluate(
        &self,
        expr: &CompiledExpr,
        bindings: &BTreeMap<String, Value>,
    ) -> Result<bool, OpSpecError> {
        let ctx = eval::EvalContext {
            bindings,
            reflection: self.reflection.as_deref(),
        };
        eval::evaluate_condition(&expr.expr, &ctx)
    }
}
