//! Specification documents: an operation signature, its identifier binding,
//! and the pre, post and throws clauses written against it.

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::condition::{Guard, Identifiers, Property};
use crate::error::{LoadError, OpSpecError};
use crate::signature::OperationSignature;

use self::json::{
    expect_array, expect_object, optional_str, reject_unknown, required, required_str,
    string_list,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
/// Condition that must hold before the call.
pub struct Precondition {
    description: String,
    guard: Guard,
}

impl Precondition {
    pub fn new(description: impl Into<String>, guard: Guard) -> Self {
        Self {
            description: description.into(),
            guard,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
/// If the guard holds before the call, the property must hold after it.
pub struct Postcondition {
    description: String,
    guard: Guard,
    property: Property,
}

impl Postcondition {
    pub fn new(description: impl Into<String>, guard: Guard, property: Property) -> Self {
        Self {
            description: description.into(),
            guard,
            property,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn property(&self) -> &Property {
        &self.property
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
/// If the guard holds before the call, the call must throw `exception` or a
/// subclass of it.
pub struct ThrowsCondition {
    description: String,
    guard: Guard,
    exception: String,
}

impl ThrowsCondition {
    pub fn new(
        description: impl Into<String>,
        guard: Guard,
        exception: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            guard,
            exception: exception.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    /// Qualified name of the expected exception type.
    pub fn exception_type(&self) -> &str {
        &self.exception
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
/// One specification document.
pub struct OperationSpecification {
    operation: OperationSignature,
    identifiers: Identifiers,
    pre: Vec<Precondition>,
    post: Vec<Postcondition>,
    throws: Vec<ThrowsCondition>,
}

impl OperationSpecification {
    pub fn new(operation: OperationSignature, identifiers: Identifiers) -> Self {
        Self {
            operation,
            identifiers,
            pre: Vec::new(),
            post: Vec::new(),
            throws: Vec::new(),
        }
    }

    pub fn with_precondition(mut self, pre: Precondition) -> Self {
        self.pre.push(pre);
        self
    }

    pub fn with_postcondition(mut self, post: Postcondition) -> Self {
        self.post.push(post);
        self
    }

    pub fn with_throws(mut self, throws: ThrowsCondition) -> Self {
        self.throws.push(throws);
        self
    }

    pub fn operation(&self) -> &OperationSignature {
        &self.operation
    }

    pub fn identifiers(&self) -> &Identifiers {
        &self.identifiers
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.pre
    }

    pub fn postconditions(&self) -> &[Postcondition] {
        &self.post
    }

    pub fn throws_conditions(&self) -> &[ThrowsCondition] {
        &self.throws
    }

    /// `true` when the document has no clauses at all.
    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty() && self.throws.is_empty()
    }

    /// Appends the clauses of `other` in order, skipping clauses already present.
    pub fn merge(&mut self, other: &OperationSpecification) {
        append_unique(&mut self.pre, &other.pre);
        append_unique(&mut self.post, &other.post);
        append_unique(&mut self.throws, &other.throws);
    }

    /// Keeps only the clauses accepted by the filters, in order.
    pub(crate) fn retain_clauses(
        &mut self,
        mut keep_pre: impl FnMut(usize, &Precondition) -> bool,
        mut keep_post: impl FnMut(usize, &Postcondition) -> bool,
        mut keep_throws: impl FnMut(usize, &ThrowsCondition) -> bool,
    ) {
        self.pre = retain_indexed(std::mem::take(&mut self.pre), &mut keep_pre);
        self.post = retain_indexed(std::mem::take(&mut self.post), &mut keep_post);
        self.throws = retain_indexed(std::mem::take(&mut self.throws), &mut keep_throws);
    }

    /// Parses and validates one document. `pointer` locates the document in
    /// its source and prefixes every reported error.
    pub fn from_json(value: &JsonValue, pointer: &str) -> Result<Self, LoadError> {
        let map = expect_object(value, pointer)?;
        reject_unknown(
            map,
            &["operation", "identifiers", "pre", "post", "throws"],
            pointer,
        )?;

        let operation =
            OperationSignature::from_json(required(map, "operation", pointer)?, &format!("{pointer}/operation"))?;

        let identifiers_pointer = format!("{pointer}/identifiers");
        let identifiers = match map.get("identifiers") {
            Some(value) => parse_identifiers(value, &identifiers_pointer)?,
            None => Identifiers::default(),
        };
        identifiers
            .validate(operation.parameter_type_names().len())
            .map_err(|err| LoadError::at(identifiers_pointer.as_str(), err))?;

        let mut spec = Self::new(operation, identifiers);

        if let Some(value) = map.get("pre") {
            let list_pointer = format!("{pointer}/pre");
            for (idx, item) in expect_array(value, &list_pointer)?.iter().enumerate() {
                spec.pre
                    .push(parse_precondition(item, &format!("{list_pointer}/{idx}"))?);
            }
        }
        if let Some(value) = map.get("post") {
            let list_pointer = format!("{pointer}/post");
            for (idx, item) in expect_array(value, &list_pointer)?.iter().enumerate() {
                spec.post
                    .push(parse_postcondition(item, &format!("{list_pointer}/{idx}"))?);
            }
        }
        if let Some(value) = map.get("throws") {
            let list_pointer = format!("{pointer}/throws");
            for (idx, item) in expect_array(value, &list_pointer)?.iter().enumerate() {
                spec.throws
                    .push(parse_throws(item, &format!("{list_pointer}/{idx}"))?);
            }
        }

        Ok(spec)
    }
}

/// Parses JSON text holding either one document or an array of documents.
///
/// Documents that fail to parse are reported individually; the others are
/// still returned.
pub fn parse_documents(text: &str) -> (Vec<OperationSpecification>, Vec<LoadError>) {
    let root: JsonValue = match serde_json::from_str(text) {
        Ok(root) => root,
        Err(err) => {
            return (
                Vec::new(),
                vec![LoadError::at("", OpSpecError::parse(format!("malformed JSON: {err}")))],
            )
        }
    };

    let mut specs = Vec::new();
    let mut errors = Vec::new();
    match &root {
        JsonValue::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                match OperationSpecification::from_json(item, &format!("/{idx}")) {
                    Ok(spec) => specs.push(spec),
                    Err(err) => errors.push(err),
                }
            }
        }
        JsonValue::Object(_) => match OperationSpecification::from_json(&root, "") {
            Ok(spec) => specs.push(spec),
            Err(err) => errors.push(err),
        },
        _ => errors.push(LoadError::at(
            "",
            OpSpecError::parse("top level must be a specification object or an array of them"),
        )),
    }
    (specs, errors)
}

fn parse_identifiers(value: &JsonValue, pointer: &str) -> Result<Identifiers, LoadError> {
    let map = expect_object(value, pointer)?;
    reject_unknown(map, &["parameters", "receiverName", "returnName"], pointer)?;
    let parameters = match map.get("parameters") {
        Some(value) => string_list(value, &format!("{pointer}/parameters"))?,
        None => Vec::new(),
    };
    let mut identifiers = Identifiers::new(parameters);
    if let Some(name) = optional_str(map, "receiverName", pointer)? {
        identifiers = identifiers.with_receiver(name);
    }
    if let Some(name) = optional_str(map, "returnName", pointer)? {
        identifiers = identifiers.with_return(name);
    }
    Ok(identifiers)
}

fn parse_guard(value: &JsonValue, pointer: &str) -> Result<Guard, LoadError> {
    let map = expect_object(value, pointer)?;
    reject_unknown(map, &["conditionText", "description"], pointer)?;
    Ok(Guard::new(
        required_str(map, "conditionText", pointer)?,
        optional_str(map, "description", pointer)?.unwrap_or_default(),
    ))
}

fn parse_property(value: &JsonValue, pointer: &str) -> Result<Property, LoadError> {
    let map = expect_object(value, pointer)?;
    reject_unknown(map, &["conditionText", "description"], pointer)?;
    Ok(Property::new(
        required_str(map, "conditionText", pointer)?,
        optional_str(map, "description", pointer)?.unwrap_or_default(),
    ))
}

fn parse_precondition(value: &JsonValue, pointer: &str) -> Result<Precondition, LoadError> {
    let map = expect_object(value, pointer)?;
    reject_unknown(map, &["description", "guard"], pointer)?;
    Ok(Precondition::new(
        optional_str(map, "description", pointer)?.unwrap_or_default(),
        parse_guard(required(map, "guard", pointer)?, &format!("{pointer}/guard"))?,
    ))
}

fn parse_postcondition(value: &JsonValue, pointer: &str) -> Result<Postcondition, LoadError> {
    let map = expect_object(value, pointer)?;
    reject_unknown(map, &["description", "guard", "property"], pointer)?;
    Ok(Postcondition::new(
        optional_str(map, "description", pointer)?.unwrap_or_default(),
        parse_guard(required(map, "guard", pointer)?, &format!("{pointer}/guard"))?,
        parse_property(
            required(map, "property", pointer)?,
            &format!("{pointer}/property"),
        )?,
    ))
}

fn parse_throws(value: &JsonValue, pointer: &str) -> Result<ThrowsCondition, LoadError> {
    let map = expect_object(value, pointer)?;
    reject_unknown(map, &["description", "guard", "exception"], pointer)?;
    Ok(ThrowsCondition::new(
        optional_str(map, "description", pointer)?.unwrap_or_default(),
        parse_guard(required(map, "guard", pointer)?, &format!("{pointer}/guard"))?,
        required_str(map, "exception", pointer)?,
    ))
}

fn append_unique<T: Clone + PartialEq>(target: &mut Vec<T>, items: &[T]) {
    for item in items {
        if !target.contains(item) {
            target.push(item.clone());
        }
    }
}

fn retain_indexed<T>(items: Vec<T>, keep: &mut impl FnMut(usize, &T) -> bool) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter(|(idx, item)| keep(*idx, item))
        .map(|(_, item)| item)
        .collect()
}

/// Field-level JSON helpers reporting errors as JSON pointers.
pub(crate) mod json {
    use serde_json::{Map as JsonMap, Value as JsonValue};

    use crate::error::{LoadError, OpSpecError};

    pub(crate) fn expect_object<'a>(
        value: &'a JsonValue,
        pointer: &str,
    ) -> Result<&'a JsonMap<String, JsonValue>, LoadError> {
        value.as_object().ok_or_else(|| {
            LoadError::at(
                pointer,
                OpSpecError::parse(format!("expected object, got {}", type_name(value))),
            )
        })
    }

    pub(crate) fn expect_array<'a>(
        value: &'a JsonValue,
        pointer: &str,
    ) -> Result<&'a Vec<JsonValue>, LoadError> {
        value.as_array().ok_or_else(|| {
            LoadError::at(
                pointer,
                OpSpecError::parse(format!("expected array, got {}", type_name(value))),
            )
        })
    }

    pub(crate) fn reject_unknown(
        map: &JsonMap<String, JsonValue>,
        allowed: &[&str],
        pointer: &str,
    ) -> Result<(), LoadError> {
        match map.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) => Err(LoadError::at(
                child(pointer, key),
                OpSpecError::parse(format!("unknown field '{key}'")),
            )),
            None => Ok(()),
        }
    }

    pub(crate) fn required<'a>(
        map: &'a JsonMap<String, JsonValue>,
        key: &str,
        pointer: &str,
    ) -> Result<&'a JsonValue, LoadError> {
        map.get(key).ok_or_else(|| {
            LoadError::at(
                pointer,
                OpSpecError::parse(format!("missing required field '{key}'")),
            )
        })
    }

    pub(crate) fn required_str(
        map: &JsonMap<String, JsonValue>,
        key: &str,
        pointer: &str,
    ) -> Result<String, LoadError> {
        let value = required(map, key, pointer)?;
        as_string(value, &child(pointer, key))
    }

    pub(crate) fn optional_str(
        map: &JsonMap<String, JsonValue>,
        key: &str,
        pointer: &str,
    ) -> Result<Option<String>, LoadError> {
        match map.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(value) => as_string(value, &child(pointer, key)).map(Some),
        }
    }

    pub(crate) fn string_list(value: &JsonValue, pointer: &str) -> Result<Vec<String>, LoadError> {
        expect_array(value, pointer)?
            .iter()
            .enumerate()
            .map(|(idx, item)| as_string(item, &format!("{pointer}/{idx}")))
            .collect()
    }

    fn as_string(value: &JsonValue, pointer: &str) -> Result<String, LoadError> {
        value.as_str().map(str::to_string).ok_or_else(|| {
            LoadError::at(
                pointer,
                OpSpecError::parse(format!("expected string, got {}", type_name(value))),
            )
        })
    }

    /// Appends `key` to `pointer`, escaping `~` and `/`.
    pub(crate) fn child(pointer: &str, key: &str) -> String {
        format!("{pointer}/{}", key.replace('~', "~0").replace('/', "~1"))
    }

    fn type_name(value: &JsonValue) -> &'static str {
        match value {
            JsonValue::Null => "null",
            JsonValue::Bool(_) => "boolean",
            JsonValue::Number(_) => "number",
            JsonValue::String(_) => "string",
            JsonValue::Array(_) => "array",
            JsonValue::Object(_) => "object",
        }
    }
}
