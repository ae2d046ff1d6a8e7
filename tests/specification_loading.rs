mod common;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use opspec::reflect::{CallableHandle, Reflection};
use opspec::{
    parse_documents, CompiledExpr, DefaultEvaluator, ExpressionEvaluator, LoadOptions,
    OpSpecError, OperationSignature, OperationSpecification, SpecificationCollection, Value,
};

use common::{shared_classpath, TempDir};

fn method(cp: &dyn Reflection, class: &str, name: &str) -> CallableHandle {
    let class = cp.resolve_class(class).expect("class");
    let method = class
        .methods()
        .iter()
        .find(|m| m.name() == name)
        .cloned()
        .expect("method");
    CallableHandle::Method(method)
}

fn constructor(cp: &dyn Reflection, class: &str) -> CallableHandle {
    let class = cp.resolve_class(class).expect("class");
    CallableHandle::Constructor(class.constructors()[0].clone())
}

fn send_document(parameter_type: &str) -> String {
    json!([{
        "operation": {
            "classname": "net.Connection",
            "name": "send",
            "parameterTypes": [parameter_type]
        },
        "identifiers": {"parameters": ["signalValue"]},
        "pre": [{
            "description": "positive",
            "guard": {"conditionText": "signalValue > 0", "description": "positive"}
        }],
        "post": [],
        "throws": []
    }])
    .to_string()
}

#[test]
fn loads_precondition_for_declared_method() {
    let cp = shared_classpath();
    let text = send_document("int");
    let collection = SpecificationCollection::load(cp.clone(), [("send.json", text.as_str())]);
    assert!(collection.errors().is_empty(), "{:?}", collection.errors());

    let conditions = collection
        .for_callable(&method(cp.as_ref(), "net.Connection", "send"))
        .expect("conditions for send");
    assert_eq!(conditions.precondition_count(), 1);
    assert_eq!(conditions.precondition_texts(), vec!["signalValue > 0"]);
}

#[test]
fn boxed_parameter_names_resolve_to_the_same_entry() {
    let cp = shared_classpath();
    let exact = send_document("int");
    let boxed = send_document("java.lang.Integer");

    let from_exact = SpecificationCollection::load(cp.clone(), [("a.json", exact.as_str())]);
    let from_boxed = SpecificationCollection::load(cp.clone(), [("b.json", boxed.as_str())]);
    assert!(from_boxed.errors().is_empty(), "{:?}", from_boxed.errors());
    assert_eq!(from_exact.to_json().unwrap(), from_boxed.to_json().unwrap());

    let key: Vec<&OperationSignature> =
        from_boxed.specifications().map(|s| s.operation()).collect();
    assert_eq!(
        key,
        vec![&OperationSignature::for_method(
            "net.Connection",
            "send",
            vec!["int".to_string()]
        )]
    );
}

#[test]
fn loading_a_document_twice_is_idempotent() {
    let cp = shared_classpath();
    let text = send_document("int");
    let once = SpecificationCollection::load(cp.clone(), [("a.json", text.as_str())]);
    let twice = SpecificationCollection::load(
        cp.clone(),
        [("a.json", text.as_str()), ("b.json", text.as_str())],
    );
    assert_eq!(once.to_json().unwrap(), twice.to_json().unwrap());
    assert_eq!(twice.len(), 1);
    let conditions = twice
        .for_callable(&method(cp.as_ref(), "net.Connection", "send"))
        .unwrap();
    assert_eq!(conditions.precondition_count(), 1);
}

#[test]
fn documents_with_the_same_binding_merge_in_order() {
    let cp = shared_classpath();
    let text = json!([
        {
            "operation": {"classname": "net.Connection", "name": "send", "parameterTypes": ["int"]},
            "identifiers": {"parameters": ["v"]},
            "pre": [{"description": "a", "guard": {"conditionText": "v > 0", "description": ""}}]
        },
        {
            "operation": {"classname": "net.Connection", "name": "send", "parameterTypes": ["int"]},
            "identifiers": {"parameters": ["v"]},
            "pre": [
                {"description": "a", "guard": {"conditionText": "v > 0", "description": ""}},
                {"description": "b", "guard": {"conditionText": "v < 100", "description": ""}}
            ]
        },
        {
            "operation": {"classname": "net.Connection", "name": "send", "parameterTypes": ["int"]},
            "identifiers": {"parameters": ["w"]},
            "pre": [{"description": "c", "guard": {"conditionText": "w != 7", "description": ""}}]
        }
    ])
    .to_string();
    let collection = SpecificationCollection::load(cp.clone(), [("m.json", text.as_str())]);
    assert!(collection.errors().is_empty(), "{:?}", collection.errors());

    let conditions = collection
        .for_callable(&method(cp.as_ref(), "net.Connection", "send"))
        .unwrap();
    assert_eq!(
        conditions.precondition_texts(),
        vec!["v > 0", "v < 100", "w != 7"]
    );
    assert_eq!(collection.specifications().count(), 2);
}

#[test]
fn unknown_fields_report_json_pointers() {
    let cp = shared_classpath();
    let text = json!([
        {"operation": {"classname": "net.Connection", "name": "open"}},
        {"operation": {"classname": "net.Connection", "name": "open", "paramTypes": []}},
        {
            "operation": {"classname": "net.Connection", "name": "send", "parameterTypes": ["int"]},
            "identifiers": {"parameters": ["v"]},
            "pre": [{"description": "", "guard": {"conditionText": "v > 0", "text": ""}}]
        }
    ])
    .to_string();
    let collection = SpecificationCollection::load(cp, [("skew.json", text.as_str())]);

    let pointers: Vec<&str> = collection
        .errors()
        .iter()
        .map(|e| e.pointer.as_str())
        .collect();
    assert_eq!(pointers, vec!["/1/operation/paramTypes", "/2/pre/0/guard/text"]);
    assert!(collection
        .errors()
        .iter()
        .all(|e| e.source == "skew.json" && matches!(e.error, OpSpecError::Parse(_))));
    assert_eq!(collection.len(), 1);
}

#[test]
fn identifier_errors_reject_the_document() {
    let cp = shared_classpath();
    let text = json!([
        {
            "operation": {"classname": "net.Connection", "name": "send", "parameterTypes": ["int"]},
            "identifiers": {"parameters": ["a", "b"]}
        },
        {
            "operation": {"classname": "net.Connection", "name": "send", "parameterTypes": ["int"]},
            "identifiers": {"parameters": ["a"], "receiverName": "a"}
        },
        {
            "operation": {"classname": "net.Connection", "name": "send", "parameterTypes": ["int"]},
            "identifiers": {"parameters": ["a"]},
            "pre": [{"description": "", "guard": {"conditionText": "b > 0", "description": ""}}]
        }
    ])
    .to_string();
    let collection = SpecificationCollection::load(cp, [("ids.json", text.as_str())]);
    let errors = collection.errors();
    assert_eq!(errors.len(), 3, "{errors:?}");

    assert_eq!(errors[0].pointer, "/0/identifiers");
    assert!(matches!(
        errors[0].error,
        OpSpecError::IdentifierCount {
            expected: 1,
            actual: 2
        }
    ));
    assert_eq!(errors[1].pointer, "/1/identifiers");
    assert!(matches!(&errors[1].error, OpSpecError::DuplicateIdentifier(name) if name == "a"));
    assert_eq!(errors[2].pointer, "/2/pre/0/guard/conditionText");
    assert!(matches!(&errors[2].error, OpSpecError::UnknownIdentifier { name, .. } if name == "b"));
    assert!(collection.is_empty());
}

#[test]
fn invalid_conditions_can_be_dropped() {
    let cp = shared_classpath();
    let text = json!({
        "operation": {"classname": "net.Connection", "name": "send", "parameterTypes": ["int"]},
        "identifiers": {"parameters": ["v"]},
        "pre": [
            {"description": "broken", "guard": {"conditionText": "v >", "description": ""}},
            {"description": "kept", "guard": {"conditionText": "v > 0", "description": ""}}
        ]
    })
    .to_string();

    let strict = SpecificationCollection::load(cp.clone(), [("one.json", text.as_str())]);
    assert_eq!(strict.errors().len(), 1);
    assert_eq!(strict.errors()[0].pointer, "/pre/0/guard/conditionText");
    assert!(matches!(strict.errors()[0].error, OpSpecError::Expression(_)));
    assert!(strict.is_empty());

    let evaluator = Arc::new(opspec::DefaultEvaluator::with_reflection(cp.clone()));
    let lenient = SpecificationCollection::load_with(
        cp.clone(),
        evaluator,
        LoadOptions {
            ignore_invalid_conditions: true,
        },
        [("one.json", text.as_str())],
    );
    assert!(lenient.errors().is_empty());
    let conditions = lenient
        .for_callable(&method(cp.as_ref(), "net.Connection", "send"))
        .unwrap();
    assert_eq!(conditions.precondition_texts(), vec!["v > 0"]);
}

#[test]
fn unresolvable_signatures_do_not_abort_the_load() {
    let cp = shared_classpath();
    let text = json!([
        {"operation": {"classname": "net.Connection", "name": "close"}},
        {"operation": {"classname": "net.Missing", "name": "close"}},
        {"operation": {"classname": "net.Connection", "name": "open"}}
    ])
    .to_string();
    let collection = SpecificationCollection::load(cp.clone(), [("r.json", text.as_str())]);
    let errors = collection.errors();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].pointer, "/0/operation");
    assert!(matches!(errors[0].error, OpSpecError::SignatureNotFound(_)));
    assert_eq!(errors[1].pointer, "/1/operation");
    assert!(matches!(errors[1].error, OpSpecError::TypeNotFound(_)));
    assert!(collection
        .for_callable(&method(cp.as_ref(), "net.Connection", "open"))
        .is_some());
}

#[test]
fn malformed_json_is_reported_against_its_source() {
    let cp = shared_classpath();
    let collection = SpecificationCollection::load(cp, [("bad.json", "[{")]);
    assert_eq!(collection.errors().len(), 1);
    let err = &collection.errors()[0];
    assert_eq!(err.source, "bad.json");
    assert_eq!(err.pointer, "");
    assert!(err.to_string().starts_with("bad.json: parse error"));
}

#[test]
fn methods_inherit_specifications_but_constructors_do_not() {
    let cp = shared_classpath();
    let text = json!([
        {
            "operation": {"classname": "p.Base", "name": "describe", "parameterTypes": ["int"]},
            "identifiers": {"parameters": ["i"], "returnName": "result"},
            "post": [{
                "description": "non-empty",
                "guard": {"conditionText": "true", "description": ""},
                "property": {"conditionText": "result.length() > 0", "description": ""}
            }]
        },
        {
            "operation": {"classname": "p.Base", "name": "p.Base", "parameterTypes": []},
            "identifiers": {"parameters": []}
        }
    ])
    .to_string();
    let collection = SpecificationCollection::load(cp.clone(), [("base.json", text.as_str())]);
    assert!(collection.errors().is_empty(), "{:?}", collection.errors());

    let inherited = collection
        .for_callable(&method(cp.as_ref(), "p.Derived", "describe"))
        .expect("inherited conditions");
    assert_eq!(
        inherited.signature(),
        &OperationSignature::for_method("p.Base", "describe", vec!["int".to_string()])
    );
    assert!(collection
        .for_callable(&constructor(cp.as_ref(), "p.Base"))
        .is_some());
    assert!(collection
        .for_callable(&constructor(cp.as_ref(), "p.Derived"))
        .is_none());
}

#[test]
fn generic_overrides_inherit_interface_specifications() {
    let cp = shared_classpath();
    let text = json!({
        "operation": {"classname": "p.Cmp", "name": "cmp", "parameterTypes": ["java.lang.Object"]},
        "identifiers": {"parameters": ["other"], "returnName": "r"},
        "post": [{
            "description": "non-negative",
            "guard": {"conditionText": "true", "description": ""},
            "property": {"conditionText": "r >= 0", "description": ""}
        }]
    })
    .to_string();
    let collection = SpecificationCollection::load(cp.clone(), [("cmp.json", text.as_str())]);
    assert!(collection.errors().is_empty(), "{:?}", collection.errors());

    let inherited = collection
        .for_callable(&method(cp.as_ref(), "p.Word", "cmp"))
        .expect("p.Word.cmp(String) overrides p.Cmp<T>.cmp(T)");
    assert_eq!(
        inherited.signature(),
        &OperationSignature::for_method("p.Cmp", "cmp", vec!["java.lang.Object".to_string()])
    );
}

/// Accepts each condition text the first time it is parsed only.
struct ParseOnce {
    seen: Mutex<HashSet<String>>,
    inner: DefaultEvaluator,
}

impl ExpressionEvaluator for ParseOnce {
    fn parse(&self, text: &str, scope: &BTreeSet<String>) -> Result<CompiledExpr, OpSpecError> {
        if !self.seen.lock().insert(text.to_string()) {
            return Err(OpSpecError::Expression(format!("'{text}' parsed twice")));
        }
        self.inner.parse(text, scope)
    }

    fn evaluate(
        &self,
        expr: &CompiledExpr,
        bindings: &BTreeMap<String, Value>,
    ) -> Result<bool, OpSpecError> {
        self.inner.evaluate(expr, bindings)
    }
}

#[test]
fn condition_compile_failures_keep_their_document_location() {
    let cp = shared_classpath();
    let evaluator = Arc::new(ParseOnce {
        seen: Mutex::new(HashSet::new()),
        inner: DefaultEvaluator::new(),
    });
    let text = json!([
        {"operation": {"classname": "net.Connection", "name": "open"}},
        {
            "operation": {"classname": "net.Connection", "name": "send", "parameterTypes": ["int"]},
            "identifiers": {"parameters": ["v"]},
            "pre": [{"description": "", "guard": {"conditionText": "v > 0", "description": ""}}]
        }
    ])
    .to_string();
    let collection = SpecificationCollection::load_with(
        cp,
        evaluator,
        LoadOptions::default(),
        [("once.json", text.as_str())],
    );

    let errors = collection.errors();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(errors[0].source, "once.json");
    assert_eq!(errors[0].pointer, "/1");
    assert!(matches!(errors[0].error, OpSpecError::Expression(_)));
}

#[test]
fn canonical_json_reloads_to_the_same_documents() {
    let cp = shared_classpath();
    let text = json!([{
        "operation": {"classname": "net.Connection", "name": "send", "parameterTypes": ["java.lang.Integer"]},
        "identifiers": {"parameters": ["v"], "receiverName": "conn"},
        "pre": [{"description": "open", "guard": {"conditionText": "conn.isOpen()", "description": ""}}],
        "throws": [{
            "description": "non-positive",
            "guard": {"conditionText": "v <= 0", "description": "v is not positive"},
            "exception": "java.lang.IllegalArgumentException"
        }]
    }])
    .to_string();
    let collection = SpecificationCollection::load(cp, [("c.json", text.as_str())]);
    let written = collection.to_json().unwrap();

    let (reloaded, errors) = parse_documents(&written);
    assert!(errors.is_empty(), "{errors:?}");
    let original: Vec<OperationSpecification> = collection.specifications().cloned().collect();
    assert_eq!(reloaded, original);

    let value: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(value[0]["operation"]["parameterTypes"], json!(["int"]));
    assert_eq!(value[0]["identifiers"]["receiverName"], json!("conn"));
    assert!(value[0]["identifiers"].get("returnName").is_none());
}

#[test]
fn load_paths_walks_directories_in_sorted_order() {
    let cp = shared_classpath();
    let dir = TempDir::new("load_paths");
    dir.write(
        "b/open.json",
        &json!({"operation": {"classname": "net.Connection", "name": "open"}}).to_string(),
    );
    dir.write("a/send.json", &send_document("int"));
    dir.write("a/notes.txt", "not a specification");
    dir.write("c/broken.json", "{\"operation\":");

    let collection = SpecificationCollection::load_paths(
        cp.clone(),
        LoadOptions::default(),
        &[dir.path().to_path_buf(), dir.path().join("missing.json")],
    );
    assert_eq!(collection.len(), 2);

    let errors = collection.errors();
    assert_eq!(errors.len(), 2, "{errors:?}");
    assert!(errors[0].source.ends_with("broken.json"));
    assert!(matches!(errors[0].error, OpSpecError::Parse(_)));
    assert!(errors[1].source.ends_with("missing.json"));
    assert!(matches!(errors[1].error, OpSpecError::Io(_)));

    assert!(collection
        .for_callable(&method(cp.as_ref(), "net.Connection", "send"))
        .is_some());
}

#[test]
fn every_declared_callable_resolves_from_its_signature() {
    let cp = shared_classpath();
    let collection = SpecificationCollection::new(cp.clone());
    let mut checked = 0;
    for class in cp.classes() {
        let handles = class
            .constructors()
            .iter()
            .cloned()
            .map(CallableHandle::Constructor)
            .chain(class.methods().iter().cloned().map(CallableHandle::Method));
        for handle in handles {
            let resolved = collection
                .resolve(&handle.signature())
                .unwrap_or_else(|e| panic!("{}: {e}", handle.signature()));
            assert!(resolved.ptr_eq(&handle), "{}", handle.signature());
            checked += 1;
        }
    }
    assert!(checked >= 15);
}
