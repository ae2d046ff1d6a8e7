//! Textual identity of a constructor or method.

use std::fmt;

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::{LoadError, OpSpecError};
use crate::reflect::{ConstructorDef, MethodDef};
use crate::spec::json::{expect_object, reject_unknown, required_str, string_list};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
/// Declaring class, operation name and parameter type names of a callable.
///
/// A constructor's name is its declaring class name.
pub struct OperationSignature {
    classname: String,
    name: String,
    parameter_types: Vec<String>,
}

impl OperationSignature {
    pub fn for_constructor(classname: impl Into<String>, parameter_types: Vec<String>) -> Self {
        let classname = classname.into();
        Self {
            name: classname.clone(),
            classname,
            parameter_types,
        }
    }

    pub fn for_method(
        classname: impl Into<String>,
        name: impl Into<String>,
        parameter_types: Vec<String>,
    ) -> Self {
        Self {
            classname: classname.into(),
            name: name.into(),
            parameter_types,
        }
    }

    pub fn of_constructor(constructor: &ConstructorDef) -> Self {
        Self::for_constructor(
            constructor.declaring_class(),
            constructor.erased_parameter_names(),
        )
    }

    pub fn of_method(method: &MethodDef) -> Self {
        Self::for_method(
            method.declaring_class(),
            method.name(),
            method.erased_parameter_names(),
        )
    }

    pub fn is_constructor(&self) -> bool {
        self.name == self.classname
    }

    pub fn is_valid(&self) -> bool {
        !self.classname.is_empty() && !self.name.is_empty()
    }

    pub fn declaring_class(&self) -> &str {
        &self.classname
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter_type_names(&self) -> &[String] {
        &self.parameter_types
    }

    /// Parses the `operation` object of a specification document.
    pub fn from_json(value: &JsonValue, pointer: &str) -> Result<Self, LoadError> {
        let map = expect_object(value, pointer)?;
        reject_unknown(map, &["classname", "name", "parameterTypes"], pointer)?;
        let classname = required_str(map, "classname", pointer)?;
        let name = required_str(map, "name", pointer)?;
        let parameter_types = match map.get("parameterTypes") {
            Some(value) => string_list(value, &format!("{pointer}/parameterTypes"))?,
            None => Vec::new(),
        };
        let signature = Self {
            classname,
            name,
            parameter_types,
        };
        if !signature.is_valid() {
            return Err(LoadError::at(
                pointer,
                OpSpecError::parse(format!("invalid operation signature {signature}")),
            ));
        }
        Ok(signature)
    }
}

impl fmt::Display for OperationSignature {
    /// Canonical JSON form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn constructor_shape_follows_name() {
        let ctor = OperationSignature::for_constructor("p.C", vec!["int".into()]);
        assert!(ctor.is_constructor());
        assert_eq!(ctor.name(), "p.C");
        let method = OperationSignature::for_method("p.C", "m", vec![]);
        assert!(!method.is_constructor());
    }

    #[test]
    fn display_is_canonical_json() {
        let sig = OperationSignature::for_method("net.Connection", "send", vec!["int".into()]);
        assert_eq!(
            sig.to_string(),
            r#"{"classname":"net.Connection","name":"send","parameterTypes":["int"]}"#
        );
    }

    #[test]
    fn from_json_rejects_unknown_fields_with_pointer() {
        let err = OperationSignature::from_json(
            &json!({"classname": "p.C", "name": "m", "params": []}),
            "/0/operation",
        )
        .unwrap_err();
        assert_eq!(err.pointer, "/0/operation/params");
        assert!(matches!(err.error, OpSpecError::Parse(_)));
    }

    #[test]
    fn from_json_rejects_empty_names() {
        let err =
            OperationSignature::from_json(&json!({"classname": "", "name": "m"}), "/operation")
                .unwrap_err();
        assert_eq!(err.pointer, "/operation");
    }
}
