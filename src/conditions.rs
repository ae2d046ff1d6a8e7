//! Compiled pre, post and throws clauses of one callable.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::condition::Identifiers;
use crate::error::OpSpecError;
use crate::expr::{CompiledExpr, ExpressionEvaluator};
use crate::operation::ExecutionOutcome;
use crate::reflect::{Reflection, Value};
use crate::signature::OperationSignature;
use crate::spec::OperationSpecification;
use crate::types::is_subclass;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of checking preconditions.
pub enum PreconditionCheck {
    Satisfied,
    /// The first failing precondition.
    Violated { description: String },
}

impl PreconditionCheck {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A clause broken by an observed outcome.
pub enum ConditionViolation {
    /// A postcondition's guard held but its property did not.
    Postcondition { description: String, property: String },
    /// A throws clause's guard held but the call did not throw a matching
    /// exception.
    ExpectedException {
        expected: BTreeSet<String>,
        outcome: String,
    },
}

impl fmt::Display for ConditionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postcondition {
                description,
                property,
            } => write!(f, "postcondition '{description}' failed: {property}"),
            Self::ExpectedException { expected, outcome } => {
                let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
                write!(f, "expected one of [{}], got {outcome}", expected.join(", "))
            }
        }
    }
}

struct CompiledPre {
    description: String,
    guard: CompiledExpr,
}

struct CompiledPost {
    description: String,
    guard: CompiledExpr,
    property: CompiledExpr,
}

struct CompiledThrows {
    guard: CompiledExpr,
    exception: String,
}

/// Clauses written against one identifier binding.
struct ClauseGroup {
    identifiers: Identifiers,
    pre: Vec<CompiledPre>,
    post: Vec<CompiledPost>,
    throws: Vec<CompiledThrows>,
}

/// Evaluators for the merged specifications of one callable.
///
/// `args` passed to the checks are the operation's inputs: for an instance
/// method the receiver comes first, followed by the parameters.
pub struct OperationConditions {
    signature: OperationSignature,
    has_receiver: bool,
    groups: Vec<ClauseGroup>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    reflection: Arc<dyn Reflection>,
}

impl OperationConditions {
    /// Compiles `specs`, which must all describe the callable `signature`.
    pub fn compile(
        signature: OperationSignature,
        has_receiver: bool,
        specs: &[OperationSpecification],
        evaluator: Arc<dyn ExpressionEvaluator>,
        reflection: Arc<dyn Reflection>,
    ) -> Result<Self, OpSpecError> {
        let mut groups = Vec::with_capacity(specs.len());
        for spec in specs {
            let ids = spec.identifiers();
            let guard_scope = ids.guard_scope();
            let property_scope = ids.property_scope();

            let pre = spec
                .preconditions()
                .iter()
                .map(|p| {
                    Ok(CompiledPre {
                        description: describe(p.description(), p.guard().description()),
                        guard: evaluator.parse(p.guard().condition_text(), &guard_scope)?,
                    })
                })
                .collect::<Result<_, OpSpecError>>()?;
            let post = spec
                .postconditions()
                .iter()
                .map(|p| {
                    Ok(CompiledPost {
                        description: describe(p.description(), p.property().description()),
                        guard: evaluator.parse(p.guard().condition_text(), &guard_scope)?,
                        property: evaluator
                            .parse(p.property().condition_text(), &property_scope)?,
                    })
                })
                .collect::<Result<_, OpSpecError>>()?;
            let throws = spec
                .throws_conditions()
                .iter()
                .map(|t| {
                    Ok(CompiledThrows {
                        guard: evaluator.parse(t.guard().condition_text(), &guard_scope)?,
                        exception: t.exception_type().to_string(),
                    })
                })
                .collect::<Result<_, OpSpecError>>()?;

            groups.push(ClauseGroup {
                identifiers: ids.clone(),
                pre,
                post,
                throws,
            });
        }

        Ok(Self {
            signature,
            has_receiver,
            groups,
            evaluator,
            reflection,
        })
    }

    /// Signature of the callable whose specifications these are.
    pub fn signature(&self) -> &OperationSignature {
        &self.signature
    }

    pub fn precondition_count(&self) -> usize {
        self.groups.iter().map(|g| g.pre.len()).sum()
    }

    pub fn postcondition_count(&self) -> usize {
        self.groups.iter().map(|g| g.post.len()).sum()
    }

    pub fn throws_count(&self) -> usize {
        self.groups.iter().map(|g| g.throws.len()).sum()
    }

    /// Guard texts of the preconditions, in order.
    pub fn precondition_texts(&self) -> Vec<&str> {
        self.groups
            .iter()
            .flat_map(|g| g.pre.iter().map(|p| p.guard.text()))
            .collect()
    }

    /// Checks every precondition; a guard that fails to evaluate counts as
    /// violated.
    pub fn check_preconditions(&self, args: &[Value]) -> PreconditionCheck {
        for group in &self.groups {
            let bindings = self.bind(&group.identifiers, args, None);
            for pre in &group.pre {
                if !self.holds(&pre.guard, &bindings) {
                    return PreconditionCheck::Violated {
                        description: pre.description.clone(),
                    };
                }
            }
        }
        PreconditionCheck::Satisfied
    }

    /// Exception types whose throws guards hold for `args`.
    pub fn expected_exceptions(&self, args: &[Value]) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for group in &self.groups {
            let bindings = self.bind(&group.identifiers, args, None);
            for throws in &group.throws {
                if self.holds(&throws.guard, &bindings) {
                    out.insert(throws.exception.clone());
                }
            }
        }
        out
    }

    /// Checks an observed outcome against the throws clauses and
    /// postconditions.
    ///
    /// When a throws guard holds the call must throw a subclass of one of the
    /// expected types. Otherwise, on a normal return, every postcondition
    /// whose guard holds must have a true property.
    pub fn check_postconditions(
        &self,
        args: &[Value],
        outcome: &ExecutionOutcome,
    ) -> Vec<ConditionViolation> {
        let expected = self.expected_exceptions(args);
        if !expected.is_empty() {
            let matched = match outcome {
                ExecutionOutcome::ExceptionalReturn { exception, .. } => expected
                    .iter()
                    .any(|e| is_subclass(&exception.exception_type, e, self.reflection.as_ref())),
                ExecutionOutcome::Timeout { .. } | ExecutionOutcome::NotExecuted => true,
                ExecutionOutcome::NormalReturn { .. } => false,
            };
            if matched {
                return Vec::new();
            }
            return vec![ConditionViolation::ExpectedException {
                expected,
                outcome: outcome.to_string(),
            }];
        }

        let ExecutionOutcome::NormalReturn { value, .. } = outcome else {
            return Vec::new();
        };

        let mut violations = Vec::new();
        for group in &self.groups {
            let guard_bindings = self.bind(&group.identifiers, args, None);
            let property_bindings = self.bind(&group.identifiers, args, Some(value));
            for post in &group.post {
                if self.holds(&post.guard, &guard_bindings)
                    && !self.holds(&post.property, &property_bindings)
                {
                    violations.push(ConditionViolation::Postcondition {
                        description: post.description.clone(),
                        property: post.property.text().to_string(),
                    });
                }
            }
        }
        violations
    }

    fn bind(
        &self,
        identifiers: &Identifiers,
        args: &[Value],
        result: Option<&Value>,
    ) -> BTreeMap<String, Value> {
        let mut bindings = BTreeMap::new();
        let params = if self.has_receiver {
            match args.split_first() {
                Some((receiver, rest)) => {
                    if let Some(name) = identifiers.receiver_name() {
                        bindings.insert(name.to_string(), receiver.clone());
                    }
                    rest
                }
                None => args,
            }
        } else {
            args
        };
        for (name, value) in identifiers.parameters().iter().zip(params) {
            bindings.insert(name.clone(), value.clone());
        }
        if let (Some(name), Some(value)) = (identifiers.return_name(), result) {
            bindings.insert(name.to_string(), value.clone());
        }
        bindings
    }

    fn holds(&self, expr: &CompiledExpr, bindings: &BTreeMap<String, Value>) -> bool {
        match self.evaluator.evaluate(expr, bindings) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(
                    target: "opspec.conditions",
                    signature = %self.signature,
                    condition = %expr,
                    error = %err,
                    "condition evaluation failed"
                );
                false
            }
        }
    }
}

impl fmt::Debug for OperationConditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationConditions")
            .field("signature", &self.signature)
            .field("pre", &self.precondition_count())
            .field("post", &self.postcondition_count())
            .field("throws", &self.throws_count())
            .finish()
    }
}

/// Clause section of a specification document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClauseSection {
    Pre,
    Post,
    Throws,
}

/// A clause whose condition text does not compile.
#[derive(Debug)]
pub(crate) struct InvalidClause {
    pub section: ClauseSection,
    pub index: usize,
    /// Pointer relative to the document.
    pub pointer: String,
    pub error: OpSpecError,
}

/// Checks that every clause of `spec` parses against its identifier
/// binding.
pub(crate) fn validate_clauses(
    spec: &OperationSpecification,
    evaluator: &dyn ExpressionEvaluator,
) -> Vec<InvalidClause> {
    let ids = spec.identifiers();
    let guard_scope = ids.guard_scope();
    let property_scope = ids.property_scope();
    let mut failures = Vec::new();
    let mut check = |section: ClauseSection,
                     index: usize,
                     field: &str,
                     text: &str,
                     scope: &BTreeSet<String>| {
        if let Err(error) = evaluator.parse(text, scope) {
            let name = match section {
                ClauseSection::Pre => "pre",
                ClauseSection::Post => "post",
                ClauseSection::Throws => "throws",
            };
            failures.push(InvalidClause {
                section,
                index,
                pointer: format!("/{name}/{index}/{field}/conditionText"),
                error,
            });
        }
    };

    for (idx, pre) in spec.preconditions().iter().enumerate() {
        check(ClauseSection::Pre, idx, "guard", pre.guard().condition_text(), &guard_scope);
    }
    for (idx, post) in spec.postconditions().iter().enumerate() {
        check(ClauseSection::Post, idx, "guard", post.guard().condition_text(), &guard_scope);
        check(
            ClauseSection::Post,
            idx,
            "property",
            post.property().condition_text(),
            &property_scope,
        );
    }
    for (idx, throws) in spec.throws_conditions().iter().enumerate() {
        check(
            ClauseSection::Throws,
            idx,
            "guard",
            throws.guard().condition_text(),
            &guard_scope,
        );
    }
    failures
}

fn describe(description: &str, fallback: &str) -> String {
    if description.is_empty() {
        fallback.to_string()
    } else {
        description.to_string()
    }
}
