//! Condition text and the identifier binding it is written against.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::OpSpecError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
/// Names that condition text uses for the call's parameters, receiver and
/// return value.
pub struct Identifiers {
    parameters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    receiver_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_name: Option<String>,
}

impl Identifiers {
    pub fn new(parameters: Vec<String>) -> Self {
        Self {
            parameters,
            receiver_name: None,
            return_name: None,
        }
    }

    pub fn with_receiver(mut self, name: impl Into<String>) -> Self {
        self.receiver_name = Some(name.into());
        self
    }

    pub fn with_return(mut self, name: impl Into<String>) -> Self {
        self.return_name = Some(name.into());
        self
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn receiver_name(&self) -> Option<&str> {
        self.receiver_name.as_deref()
    }

    pub fn return_name(&self) -> Option<&str> {
        self.return_name.as_deref()
    }

    /// Checks that every name is distinct and that there is one parameter
    /// name per declared parameter.
    pub fn validate(&self, parameter_count: usize) -> Result<(), OpSpecError> {
        if self.parameters.len() != parameter_count {
            return Err(OpSpecError::IdentifierCount {
                expected: parameter_count,
                actual: self.parameters.len(),
            });
        }
        let mut seen = BTreeSet::new();
        for name in self
            .parameters
            .iter()
            .chain(self.receiver_name.iter())
            .chain(self.return_name.iter())
        {
            if !seen.insert(name.as_str()) {
                return Err(OpSpecError::DuplicateIdentifier(name.clone()));
            }
        }
        Ok(())
    }

    /// Names visible to guards: parameters and receiver.
    pub fn guard_scope(&self) -> BTreeSet<String> {
        self.parameters
            .iter()
            .chain(self.receiver_name.iter())
            .cloned()
            .collect()
    }

    /// Names visible to properties: the guard scope plus the return name.
    pub fn property_scope(&self) -> BTreeSet<String> {
        let mut scope = self.guard_scope();
        scope.extend(self.return_name.iter().cloned());
        scope
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
/// Boolean condition evaluated before the call.
pub struct Guard {
    condition_text: String,
    description: String,
}

impl Guard {
    pub fn new(condition_text: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            condition_text: condition_text.into(),
            description: description.into(),
        }
    }

    pub fn condition_text(&self) -> &str {
        &self.condition_text
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
/// Boolean condition evaluated after a normal return; may read the return name.
pub struct Property {
    condition_text: String,
    description: String,
}

impl Property {
    pub fn new(condition_text: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            condition_text: condition_text.into(),
            description: description.into(),
        }
    }

    pub fn condition_text(&self) -> &str {
        &self.condition_text
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn validate_checks_count_then_duplicates() {
        let ids = Identifiers::new(names(&["a", "b"])).with_receiver("a");
        assert!(matches!(
            ids.validate(3),
            Err(OpSpecError::IdentifierCount { expected: 3, actual: 2 })
        ));
        assert!(matches!(
            ids.validate(2),
            Err(OpSpecError::DuplicateIdentifier(name)) if name == "a"
        ));
        let ok = Identifiers::new(names(&["a"]))
            .with_receiver("self")
            .with_return("result");
        assert!(ok.validate(1).is_ok());
    }

    #[test]
    fn return_name_is_only_in_property_scope() {
        let ids = Identifiers::new(names(&["x"]))
            .with_receiver("r")
            .with_return("out");
        assert!(!ids.guard_scope().contains("out"));
        assert!(ids.guard_scope().contains("r"));
        assert!(ids.property_scope().contains("out"));
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(Identifiers::new(names(&["x"])).with_return("result"))
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"parameters": ["x"], "returnName": "result"})
        );
        let guard = serde_json::to_value(Guard::new("x > 0", "positive")).unwrap();
        assert_eq!(guard["conditionText"], "x > 0");
    }
}
