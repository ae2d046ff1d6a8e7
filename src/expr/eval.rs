//! Runtime evaluator for condition expressions over [`Value`]s.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};

use crate::error::OpSpecError;
use crate::operation::{panic_message, DeadlineToken};
use crate::reflect::{method_resolution_order, Invocation, MethodHandle, Reflection, Value};
use crate::types::{is_assignable_from, TypeTerm};

use super::parser::{BinaryOp, Expr, UnaryOp};

/// Context object passed to expression evaluation.
pub struct EvalContext<'a> {
    /// Values bound to the identifiers of the condition.
    pub bindings: &'a BTreeMap<String, Value>,
    /// Class path used to call methods on object values. Without one, only
    /// built-in string, array and `equals` calls are available.
    pub reflection: Option<&'a dyn Reflection>,
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Num> {
        match value {
            Value::Float(_) | Value::Double(_) => value.as_f64().map(Num::Float),
            _ => value.as_i64().map(Num::Int),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::Float(v) => v,
        }
    }
}

/// Evaluates an expression AST node into a value.
pub fn evaluate(expr: &Expr, ctx: &EvalContext<'_>) -> Result<Value, OpSpecError> {
    match expr {
        Expr::Int(n) => Ok(Value::Long(*n)),
        Expr::Float(n) => Ok(Value::Double(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Char(c) => Ok(Value::Char(*c)),
        Expr::Bool(b) => Ok(Value::Boolean(*b)),
        Expr::Null => Ok(Value::Null),
        Expr::Var(name) => ctx
            .bindings
            .get(name)
            .cloned()
            .ok_or_else(|| eval_error(format!("unbound identifier '{name}'"))),
        Expr::Field { target, name } => {
            let target = evaluate(target, ctx)?;
            read_field(&target, name)
        }
        Expr::MethodCall { target, name, args } => {
            let target = evaluate(target, ctx)?;
            let args = evaluate_all(args, ctx)?;
            call_method(&target, name, &args, ctx)
        }
        Expr::Call { name, args } => {
            let args = evaluate_all(args, ctx)?;
            call_builtin(name, &args)
        }
        Expr::Unary { op, expr } => {
            let value = evaluate(expr, ctx)?;
            match op {
                UnaryOp::Neg => match numeric(&value)? {
                    Num::Int(v) => Ok(Value::Long(v.wrapping_neg())),
                    Num::Float(v) => Ok(Value::Double(-v)),
                },
                UnaryOp::Not => Ok(Value::Boolean(!as_bool(&value)?)),
            }
        }
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            if !as_bool(&evaluate(left, ctx)?)? {
                return Ok(Value::Boolean(false));
            }
            Ok(Value::Boolean(as_bool(&evaluate(right, ctx)?)?))
        }
        Expr::Binary {
            op: BinaryOp::Or,
            left,
            right,
        } => {
            if as_bool(&evaluate(left, ctx)?)? {
                return Ok(Value::Boolean(true));
            }
            Ok(Value::Boolean(as_bool(&evaluate(right, ctx)?)?))
        }
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            eval_binary(*op, l, r)
        }
    }
}

/// Evaluates `expr` and requires a boolean result.
pub fn evaluate_condition(expr: &Expr, ctx: &EvalContext<'_>) -> Result<bool, OpSpecError> {
    as_bool(&evaluate(expr, ctx)?)
}

fn evaluate_all(args: &[Expr], ctx: &EvalContext<'_>) -> Result<Vec<Value>, OpSpecError> {
    args.iter().map(|arg| evaluate(arg, ctx)).collect()
}

fn read_field(target: &Value, name: &str) -> Result<Value, OpSpecError> {
    match target {
        Value::Null => Err(eval_error(format!("null dereference reading '{name}'"))),
        Value::Array(arr) if name == "length" => Ok(Value::Int(arr.len() as i32)),
        Value::Object(obj) => obj.field(name).ok_or_else(|| {
            eval_error(format!(
                "class {} has no field '{name}'",
                obj.class_name()
            ))
        }),
        other => Err(eval_error(format!(
            "cannot read field '{name}' of {}",
            type_name(other)
        ))),
    }
}

fn call_method(
    target: &Value,
    name: &str,
    args: &[Value],
    ctx: &EvalContext<'_>,
) -> Result<Value, OpSpecError> {
    if target.is_null() {
        return Err(eval_error(format!("null dereference calling '{name}'")));
    }
    if name == "equals" {
        require_arity(name, args, 1)?;
        return Ok(Value::Boolean(values_equal(target, &args[0])));
    }
    if let Value::String(s) = target {
        return call_string_method(s, name, args);
    }
    if let Value::Object(obj) = target {
        if let Some(reflection) = ctx.reflection {
            return invoke_reflective(target, obj.class_name(), name, args, reflection);
        }
    }
    Err(eval_error(format!(
        "unknown method '{name}' on {}",
        type_name(target)
    )))
}

fn call_string_method(s: &str, name: &str, args: &[Value]) -> Result<Value, OpSpecError> {
    match name {
        "length" => {
            require_arity(name, args, 0)?;
            Ok(Value::Int(s.encode_utf16().count() as i32))
        }
        "isEmpty" => {
            require_arity(name, args, 0)?;
            Ok(Value::Boolean(s.is_empty()))
        }
        "contains" | "startsWith" | "endsWith" => {
            require_arity(name, args, 1)?;
            let other = args[0]
                .as_str()
                .ok_or_else(|| eval_error(format!("{name} expects a string argument")))?;
            Ok(Value::Boolean(match name {
                "contains" => s.contains(other),
                "startsWith" => s.starts_with(other),
                _ => s.ends_with(other),
            }))
        }
        "equalsIgnoreCase" => {
            require_arity(name, args, 1)?;
            Ok(Value::Boolean(
                args[0]
                    .as_str()
                    .map_or(false, |other| other.to_lowercase() == s.to_lowercase()),
            ))
        }
        "charAt" => {
            require_arity(name, args, 1)?;
            let index = integer(&args[0])?;
            usize::try_from(index)
                .ok()
                .and_then(|i| s.encode_utf16().nth(i))
                .map(|unit| Value::Char(char::from_u32(unit.into()).unwrap_or('\u{FFFD}')))
                .ok_or_else(|| eval_error(format!("string index {index} out of range")))
        }
        _ => Err(eval_error(format!("unknown method '{name}' on string"))),
    }
}

fn invoke_reflective(
    receiver: &Value,
    class_name: &str,
    name: &str,
    args: &[Value],
    reflection: &dyn Reflection,
) -> Result<Value, OpSpecError> {
    let class = reflection
        .resolve_class(class_name)
        .ok_or_else(|| eval_error(format!("class {class_name} is not on the class path")))?;
    let candidates: Vec<MethodHandle> = std::iter::once(class.clone())
        .chain(method_resolution_order(&class, reflection))
        .flat_map(|c| {
            c.methods()
                .iter()
                .filter(|m| !m.is_static() && m.name() == name && m.parameter_count() == args.len())
                .cloned()
                .collect::<Vec<_>>()
        })
        .collect();
    // Integer literals evaluate to long, so fall back to the first
    // same-arity method when no overload accepts the runtime arguments.
    let method = candidates
        .iter()
        .find(|m| accepts_arguments(m, args, reflection))
        .or_else(|| candidates.first())
        .ok_or_else(|| eval_error(format!("unknown method '{name}' on {class_name}")))?;

    let deadline = DeadlineToken::never();
    let invocation = Invocation::new(Some(receiver), args, &deadline);
    match panic::catch_unwind(AssertUnwindSafe(|| method.invoke(&invocation))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(thrown)) => Err(eval_error(format!("{class_name}.{name} threw {thrown}"))),
        Err(payload) => Err(eval_error(format!(
            "{class_name}.{name} panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn accepts_arguments(method: &MethodHandle, args: &[Value], reflection: &dyn Reflection) -> bool {
    method
        .parameter_types()
        .iter()
        .zip(args)
        .all(|(param, arg)| match runtime_type(arg) {
            None => !param.is_primitive(),
            Some(actual) => is_assignable_from(&param.erasure(), &actual, reflection),
        })
}

fn runtime_type(value: &Value) -> Option<TypeTerm> {
    match value {
        Value::Array(arr) => Some(TypeTerm::array_of(arr.element_type().erasure())),
        other => other.runtime_class().map(TypeTerm::class),
    }
}

fn call_builtin(name: &str, args: &[Value]) -> Result<Value, OpSpecError> {
    match name {
        "abs" => {
            require_arity(name, args, 1)?;
            Ok(match numeric(&args[0])? {
                Num::Int(v) => Value::Long(v.wrapping_abs()),
                Num::Float(v) => Value::Double(v.abs()),
            })
        }
        "min" | "max" => {
            require_arity(name, args, 2)?;
            let (a, b) = (numeric(&args[0])?, numeric(&args[1])?);
            let pick_first = match name {
                "min" => compare_num(a, b, |x, y| x <= y, |x, y| x <= y),
                _ => compare_num(a, b, |x, y| x >= y, |x, y| x >= y),
            };
            Ok(match if pick_first { a } else { b } {
                Num::Int(v) => Value::Long(v),
                Num::Float(v) => Value::Double(v),
            })
        }
        _ => Err(eval_error(format!("unknown function 'Math.{name}'"))),
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, OpSpecError> {
    match op {
        BinaryOp::Add if left.as_str().is_some() || right.as_str().is_some() => {
            Ok(Value::String(format!("{}{}", concat_text(&left), concat_text(&right))))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            arithmetic(op, numeric(&left)?, numeric(&right)?)
        }
        BinaryOp::Eq => Ok(Value::Boolean(values_equal(&left, &right))),
        BinaryOp::NotEq => Ok(Value::Boolean(!values_equal(&left, &right))),
        BinaryOp::Lt => compare(&left, &right, |a, b| a < b, |a, b| a < b),
        BinaryOp::Lte => compare(&left, &right, |a, b| a <= b, |a, b| a <= b),
        BinaryOp::Gt => compare(&left, &right, |a, b| a > b, |a, b| a > b),
        BinaryOp::Gte => compare(&left, &right, |a, b| a >= b, |a, b| a >= b),
        BinaryOp::And | BinaryOp::Or => {
            let (l, r) = (as_bool(&left)?, as_bool(&right)?);
            Ok(Value::Boolean(if op == BinaryOp::And { l && r } else { l || r }))
        }
    }
}

fn arithmetic(op: BinaryOp, left: Num, right: Num) -> Result<Value, OpSpecError> {
    match (left, right) {
        (Num::Int(a), Num::Int(b)) => {
            let v = match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div | BinaryOp::Mod if b == 0 => {
                    return Err(eval_error("integer division by zero"));
                }
                BinaryOp::Div => a.wrapping_div(b),
                _ => a.wrapping_rem(b),
            };
            Ok(Value::Long(v))
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            Ok(Value::Double(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            }))
        }
    }
}

fn compare(
    left: &Value,
    right: &Value,
    int_cmp: fn(i64, i64) -> bool,
    float_cmp: fn(f64, f64) -> bool,
) -> Result<Value, OpSpecError> {
    Ok(Value::Boolean(compare_num(
        numeric(left)?,
        numeric(right)?,
        int_cmp,
        float_cmp,
    )))
}

fn compare_num(
    left: Num,
    right: Num,
    int_cmp: fn(i64, i64) -> bool,
    float_cmp: fn(f64, f64) -> bool,
) -> bool {
    match (left, right) {
        (Num::Int(a), Num::Int(b)) => int_cmp(a, b),
        (a, b) => float_cmp(a.as_f64(), b.as_f64()),
    }
}

/// Numeric values compare by value across widths; strings by content;
/// objects and arrays by identity.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (Num::of(left), Num::of(right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn numeric(value: &Value) -> Result<Num, OpSpecError> {
    Num::of(value)
        .ok_or_else(|| eval_error(format!("expected number, got {}", type_name(value))))
}

fn integer(value: &Value) -> Result<i64, OpSpecError> {
    value
        .as_i64()
        .ok_or_else(|| eval_error(format!("expected integer, got {}", type_name(value))))
}

fn as_bool(value: &Value) -> Result<bool, OpSpecError> {
    value
        .as_bool()
        .ok_or_else(|| eval_error(format!("expected boolean, got {}", type_name(value))))
}

fn require_arity(name: &str, args: &[Value], expected: usize) -> Result<(), OpSpecError> {
    if args.len() != expected {
        return Err(eval_error(format!(
            "{name} expects {expected} arguments, got {}",
            args.len()
        )));
    }
    Ok(())
}

fn concat_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> String {
    value.runtime_class().unwrap_or_else(|| "null".to_string())
}

fn eval_error(message: impl Into<String>) -> OpSpecError {
    OpSpecError::Evaluation(message.into())
}
