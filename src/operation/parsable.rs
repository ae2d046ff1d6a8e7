//! Parser for the `kind : declaring . name (inputs) -> output` form.

use crate::error::OpSpecError;
use crate::reflect::{ClassHandle, Reflection};
use crate::types::{parse_type_with_variables, unify, Substitution, TypeTerm, TypeTuple};

use super::callable::{ArrayCreation, CallableOperation, ARRAY_NAME, CONSTRUCTOR_NAME};
use super::term::NonreceiverTerm;
use super::typed::TypedOperation;

struct Parts<'a> {
    kind: &'a str,
    declaring: &'a str,
    name: &'a str,
    inputs: Vec<&'a str>,
    output: &'a str,
}

pub(crate) fn parse(text: &str, reflection: &dyn Reflection) -> Result<TypedOperation, OpSpecError> {
    let parts = split(text)?;
    let invalid = |message: String| OpSpecError::invalid_parsable(text, message);

    let declaring = parse_type_with_variables(parts.declaring, reflection)?;
    let output = parse_type_with_variables(parts.output, reflection)?;
    let inputs: TypeTuple = parts
        .inputs
        .iter()
        .map(|name| parse_type_with_variables(name, reflection))
        .collect::<Result<_, _>>()?;

    match parts.kind {
        "ctor" => {
            if parts.name != CONSTRUCTOR_NAME {
                return Err(invalid(format!("constructor name must be {CONSTRUCTOR_NAME}")));
            }
            let class = resolve(&declaring, reflection, text)?;
            let constructor = class
                .constructors()
                .iter()
                .find(|c| {
                    let mut sigma = Substitution::new();
                    unify(c.declaring_type(), &declaring, &mut sigma)
                        && unify_all(c.parameter_types(), inputs.as_slice(), &mut sigma)
                        && unify(c.declaring_type(), &output, &mut sigma)
                })
                .ok_or_else(|| invalid(format!("no matching constructor in {}", class.name())))?;
            Ok(TypedOperation::from_parts(
                CallableOperation::Constructor(constructor.clone()),
                Some(declaring),
                inputs,
                output,
            ))
        }
        "method" | "static" => {
            let is_static = parts.kind == "static";
            let class = resolve(&declaring, reflection, text)?;
            let method = class
                .methods()
                .iter()
                .find(|m| {
                    if m.is_static() != is_static || m.name() != parts.name {
                        return false;
                    }
                    let mut sigma = Substitution::new();
                    let args = if is_static {
                        inputs.as_slice()
                    } else {
                        match inputs.as_slice().split_first() {
                            Some((receiver, rest))
                                if unify(m.declaring_type(), receiver, &mut sigma) =>
                            {
                                rest
                            }
                            _ => return false,
                        }
                    };
                    unify_all(m.parameter_types(), args, &mut sigma)
                        && unify(m.return_type(), &output, &mut sigma)
                })
                .ok_or_else(|| {
                    invalid(format!("no matching method {} in {}", parts.name, class.name()))
                })?;
            let operation = if is_static {
                CallableOperation::StaticMethod(method.clone())
            } else {
                CallableOperation::InstanceMethod(method.clone())
            };
            Ok(TypedOperation::from_parts(operation, Some(declaring), inputs, output))
        }
        "literal" => {
            if !inputs.is_empty() || declaring != output {
                return Err(invalid("a literal takes no inputs and has its own type".into()));
            }
            let term = NonreceiverTerm::parse_code(declaring, parts.name)?;
            Ok(TypedOperation::create_nonreceiver_initialization(term))
        }
        "array" => {
            let Some(element) = declaring.element_type() else {
                return Err(invalid(format!("{declaring} is not an array type")));
            };
            if parts.name != ARRAY_NAME
                || declaring != output
                || inputs.iter().any(|input| input != element)
            {
                return Err(invalid(
                    "array creation takes element-typed inputs and yields its declaring type"
                        .into(),
                ));
            }
            let creation = ArrayCreation::new(element.clone(), inputs.len());
            Ok(TypedOperation::from_parts(
                CallableOperation::ArrayCreation(creation),
                None,
                inputs,
                output,
            ))
        }
        other => Err(invalid(format!("unknown operation kind '{other}'"))),
    }
}

fn split(text: &str) -> Result<Parts<'_>, OpSpecError> {
    let malformed = || OpSpecError::invalid_parsable(text, "expected 'kind : type . name (inputs) -> output'");

    let (head, output) = text.rsplit_once(" -> ").ok_or_else(malformed)?;
    let head = head.strip_suffix(')').ok_or_else(malformed)?;
    let open = head.rfind('(').ok_or_else(malformed)?;
    let params = &head[open + 1..];
    let prefix = head[..open].strip_suffix(' ').ok_or_else(malformed)?;
    let (kind, rest) = prefix.split_once(" : ").ok_or_else(malformed)?;
    let (declaring, name) = rest.split_once(" . ").ok_or_else(malformed)?;

    Ok(Parts {
        kind: kind.trim(),
        declaring: declaring.trim(),
        name,
        inputs: split_top_level(params),
        output: output.trim(),
    })
}

/// Splits on commas outside angle brackets.
fn split_top_level(text: &str) -> Vec<&str> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in text.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(text[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    out.push(text[start..].trim());
    out
}

fn resolve(
    declaring: &TypeTerm,
    reflection: &dyn Reflection,
    text: &str,
) -> Result<ClassHandle, OpSpecError> {
    let name = declaring.erased_name();
    reflection
        .resolve_class(&name)
        .ok_or_else(|| OpSpecError::invalid_parsable(text, format!("class {name} not found")))
}

fn unify_all(declared: &[TypeTerm], concrete: &[TypeTerm], sigma: &mut Substitution) -> bool {
    declared.len() == concrete.len()
        && declared
            .iter()
            .zip(concrete)
            .all(|(d, c)| unify(d, c, sigma))
}
