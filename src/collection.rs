//! Index of specification documents keyed by the callables they resolve to.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::conditions::{validate_clauses, ClauseSection, OperationConditions};
use crate::error::{LoadError, OpSpecError};
use crate::expr::{DefaultEvaluator, ExpressionEvaluator};
use crate::operation::TypedOperation;
use crate::reflect::{method_resolution_order, CallableHandle, ClassDef, MethodDef, Reflection};
use crate::signature::OperationSignature;
use crate::spec::{parse_documents, OperationSpecification};
use crate::types::{
    boxing_equivalent, normalize_type_name, supertype_view, Substitution, TypeTerm,
};

/// Options for building a [`SpecificationCollection`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Drop clauses whose condition text does not compile instead of
    /// rejecting the whole document.
    pub ignore_invalid_conditions: bool,
}

struct Entry {
    handle: CallableHandle,
    /// One merged document per distinct identifier binding, in load order.
    documents: Vec<OperationSpecification>,
    conditions: Option<Arc<OperationConditions>>,
    /// Source and JSON pointer of the first document for this callable.
    origin: (String, String),
}

/// Specifications resolved against a class path.
///
/// A collection is built once by one of the `load` constructors and is
/// read-only afterwards, apart from its append-only signature cache.
pub struct SpecificationCollection {
    reflection: Arc<dyn Reflection>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    options: LoadOptions,
    entries: BTreeMap<OperationSignature, Entry>,
    handles: RwLock<HashMap<OperationSignature, Option<CallableHandle>>>,
    errors: Vec<LoadError>,
}

impl SpecificationCollection {
    /// An empty collection using [`DefaultEvaluator`] over `reflection`.
    pub fn new(reflection: Arc<dyn Reflection>) -> Self {
        let evaluator = Arc::new(DefaultEvaluator::with_reflection(reflection.clone()));
        Self::with_evaluator(reflection, evaluator, LoadOptions::default())
    }

    pub fn with_evaluator(
        reflection: Arc<dyn Reflection>,
        evaluator: Arc<dyn ExpressionEvaluator>,
        options: LoadOptions,
    ) -> Self {
        Self {
            reflection,
            evaluator,
            options,
            entries: BTreeMap::new(),
            handles: RwLock::new(HashMap::new()),
            errors: Vec::new(),
        }
    }

    /// Loads `(source, json_text)` pairs with default options.
    pub fn load<'a, I>(reflection: Arc<dyn Reflection>, documents: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut collection = Self::new(reflection);
        for (source, text) in documents {
            collection.add_json(source, text);
        }
        collection.compile();
        collection
    }

    pub fn load_with<'a, I>(
        reflection: Arc<dyn Reflection>,
        evaluator: Arc<dyn ExpressionEvaluator>,
        options: LoadOptions,
        documents: I,
    ) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut collection = Self::with_evaluator(reflection, evaluator, options);
        for (source, text) in documents {
            collection.add_json(source, text);
        }
        collection.compile();
        collection
    }

    /// Loads already-parsed documents.
    pub fn load_specifications<I>(reflection: Arc<dyn Reflection>, specs: I) -> Self
    where
        I: IntoIterator<Item = OperationSpecification>,
    {
        let mut collection = Self::new(reflection);
        for (idx, spec) in specs.into_iter().enumerate() {
            collection.add_specification("<memory>", &format!("/{idx}"), spec);
        }
        collection.compile();
        collection
    }

    /// Loads every `*.json` file named by `paths`. Directories are walked
    /// recursively and their files loaded in sorted order.
    pub fn load_paths<P: AsRef<Path>>(
        reflection: Arc<dyn Reflection>,
        options: LoadOptions,
        paths: &[P],
    ) -> Self {
        let evaluator = Arc::new(DefaultEvaluator::with_reflection(reflection.clone()));
        let mut collection = Self::with_evaluator(reflection, evaluator, options);
        for path in paths {
            let path = path.as_ref();
            let files = match collect_json_files(path) {
                Ok(files) => files,
                Err(err) => {
                    collection.record(LoadError::new(&path.display().to_string(), "", err.into()));
                    continue;
                }
            };
            for file in files {
                let source = file.display().to_string();
                match fs::read_to_string(&file) {
                    Ok(text) => collection.add_json(&source, &text),
                    Err(err) => collection.record(LoadError::new(&source, "", err.into())),
                }
            }
        }
        collection.compile();
        collection
    }

    /// Failures collected while loading, in the order they occurred.
    pub fn errors(&self) -> &[LoadError] {
        &self.errors
    }

    /// Number of callables with at least one specification.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merged documents ordered by callable signature.
    pub fn specifications(&self) -> impl Iterator<Item = &OperationSpecification> {
        self.entries.values().flat_map(|entry| entry.documents.iter())
    }

    /// Canonical JSON array of the merged documents.
    pub fn to_json(&self) -> Result<String, OpSpecError> {
        let documents: Vec<&OperationSpecification> = self.specifications().collect();
        serde_json::to_string_pretty(&documents).map_err(|err| OpSpecError::parse(err.to_string()))
    }

    /// Conditions for `callable`, falling back to the nearest specified
    /// overridden method for instance methods.
    pub fn for_callable(&self, callable: &CallableHandle) -> Option<Arc<OperationConditions>> {
        let signature = callable.signature();
        if let Some(conditions) = self.conditions_for(&signature) {
            return Some(conditions);
        }

        let CallableHandle::Method(method) = callable else {
            return None;
        };
        if method.is_static() {
            return None;
        }
        let class = self.reflection.resolve_class(method.declaring_class())?;
        let class_type = TypeTerm::for_class(&class);
        let parameters = method.erased_parameter_names();
        for ancestor in method_resolution_order(&class, self.reflection.as_ref()) {
            let view = supertype_view(&class_type, ancestor.name(), self.reflection.as_ref());
            let sigma = ancestor_substitution(&ancestor, view.as_ref());
            let Some(overridden) = ancestor.methods().iter().find(|m| {
                !m.is_static()
                    && m.name() == method.name()
                    && overridden_parameter_names(m, sigma.as_ref()) == parameters
            }) else {
                continue;
            };
            if let Some(conditions) = self.conditions_for(&overridden.signature()) {
                tracing::debug!(
                    target: "opspec.collection",
                    signature = %signature,
                    inherited_from = %ancestor.name(),
                    "using inherited specification"
                );
                return Some(conditions);
            }
        }
        None
    }

    /// Conditions for the callable wrapped by `operation`, if any.
    pub fn for_operation(&self, operation: &TypedOperation) -> Option<Arc<OperationConditions>> {
        self.for_callable(&operation.callable_handle()?)
    }

    /// Resolves `signature` to a declared callable, or `None`.
    pub fn get_accessible_object(&self, signature: &OperationSignature) -> Option<CallableHandle> {
        self.resolve(signature).ok()
    }

    /// Resolves `signature` to the callable declared by its class whose
    /// parameter types match, preferring exact names over boxing-equivalent
    /// ones. Results, including failures, are cached by signature.
    pub fn resolve(&self, signature: &OperationSignature) -> Result<CallableHandle, OpSpecError> {
        if let Some(cached) = self.handles.read().get(signature) {
            return cached
                .clone()
                .ok_or_else(|| OpSpecError::SignatureNotFound(signature.to_string()));
        }
        let resolved = self.resolve_uncached(signature);
        self.handles
            .write()
            .entry(signature.clone())
            .or_insert_with(|| resolved.as_ref().ok().cloned());
        resolved
    }

    fn resolve_uncached(&self, signature: &OperationSignature) -> Result<CallableHandle, OpSpecError> {
        if !signature.is_valid() {
            return Err(OpSpecError::SignatureNotFound(signature.to_string()));
        }
        let classname = normalize_type_name(signature.declaring_class())?;
        let class = self
            .reflection
            .resolve_class(&classname)
            .ok_or_else(|| OpSpecError::TypeNotFound(classname.clone()))?;
        let wanted = signature
            .parameter_type_names()
            .iter()
            .map(|name| normalize_type_name(name))
            .collect::<Result<Vec<_>, _>>()?;

        let candidates: Vec<(CallableHandle, Vec<String>)> = if signature.is_constructor() {
            class
                .constructors()
                .iter()
                .map(|c| (CallableHandle::Constructor(c.clone()), c.erased_parameter_names()))
                .collect()
        } else {
            class
                .methods()
                .iter()
                .filter(|m| m.name() == signature.name())
                .map(|m| (CallableHandle::Method(m.clone()), m.erased_parameter_names()))
                .collect()
        };

        let mut best: Vec<CallableHandle> = Vec::new();
        let mut best_rank = usize::MAX;
        for (handle, declared) in candidates {
            let Some(rank) = match_rank(&declared, &wanted) else {
                continue;
            };
            if rank < best_rank {
                best_rank = rank;
                best.clear();
            }
            if rank == best_rank {
                best.push(handle);
            }
        }

        if best.len() > 1 {
            let err = OpSpecError::AmbiguousSignature {
                signature: signature.to_string(),
                candidates: best.len(),
            };
            tracing::warn!(target: "opspec.collection", error = %err, "using first declared candidate");
        }
        best.into_iter()
            .next()
            .ok_or_else(|| OpSpecError::SignatureNotFound(signature.to_string()))
    }

    fn conditions_for(&self, signature: &OperationSignature) -> Option<Arc<OperationConditions>> {
        self.entries.get(signature)?.conditions.clone()
    }

    fn add_json(&mut self, source: &str, text: &str) {
        let (specs, errors) = parse_documents(text);
        for err in errors {
            self.record(err.with_source(source));
        }
        let pointers = document_pointers(text);
        for (spec, pointer) in specs.into_iter().zip(pointers) {
            self.add_specification(source, &pointer, spec);
        }
    }

    fn add_specification(&mut self, source: &str, pointer: &str, mut spec: OperationSpecification) {
        let invalid = validate_clauses(&spec, self.evaluator.as_ref());
        if !invalid.is_empty() {
            if !self.options.ignore_invalid_conditions {
                for clause in invalid {
                    self.record(LoadError::new(
                        source,
                        format!("{pointer}{}", clause.pointer),
                        clause.error,
                    ));
                }
                return;
            }
            for clause in &invalid {
                tracing::warn!(
                    target: "opspec.collection",
                    source,
                    pointer = %format!("{pointer}{}", clause.pointer),
                    error = %clause.error,
                    "dropping clause with invalid condition"
                );
            }
            let drops = |section: ClauseSection, idx: usize| {
                invalid
                    .iter()
                    .any(|clause| clause.section == section && clause.index == idx)
            };
            spec.retain_clauses(
                |idx, _| !drops(ClauseSection::Pre, idx),
                |idx, _| !drops(ClauseSection::Post, idx),
                |idx, _| !drops(ClauseSection::Throws, idx),
            );
        }

        let handle = match self.resolve(spec.operation()) {
            Ok(handle) => handle,
            Err(err) => {
                self.record(LoadError::new(source, format!("{pointer}/operation"), err));
                return;
            }
        };

        let key = handle.signature();
        let entry = self.entries.entry(key.clone()).or_insert_with(|| Entry {
            handle,
            documents: Vec::new(),
            conditions: None,
            origin: (source.to_string(), pointer.to_string()),
        });
        match entry
            .documents
            .iter_mut()
            .find(|doc| doc.identifiers() == spec.identifiers())
        {
            Some(existing) => existing.merge(&spec),
            None => {
                let mut canonical = OperationSpecification::new(key, spec.identifiers().clone());
                canonical.merge(&spec);
                entry.documents.push(canonical);
            }
        }
    }

    fn compile(&mut self) {
        let mut failures = Vec::new();
        for (signature, entry) in &mut self.entries {
            let has_receiver = matches!(&entry.handle, CallableHandle::Method(m) if !m.is_static());
            match OperationConditions::compile(
                signature.clone(),
                has_receiver,
                &entry.documents,
                self.evaluator.clone(),
                self.reflection.clone(),
            ) {
                Ok(conditions) => entry.conditions = Some(Arc::new(conditions)),
                Err(err) => {
                    let (source, pointer) = &entry.origin;
                    failures.push(LoadError::new(source, pointer.as_str(), err));
                }
            }
        }
        for failure in failures {
            self.record(failure);
        }
        tracing::debug!(
            target: "opspec.collection",
            callables = self.entries.len(),
            errors = self.errors.len(),
            "specifications loaded"
        );
    }

    fn record(&mut self, error: LoadError) {
        tracing::warn!(target: "opspec.collection", error = %error, "specification load error");
        self.errors.push(error);
    }
}

impl std::fmt::Debug for SpecificationCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecificationCollection")
            .field("signatures", &self.entries.keys().collect::<Vec<_>>())
            .field("errors", &self.errors.len())
            .finish()
    }
}

/// Maps the type parameters of `ancestor` to the arguments it is viewed with
/// from a subclass. `None` for raw or non-generic views.
fn ancestor_substitution(ancestor: &ClassDef, view: Option<&TypeTerm>) -> Option<Substitution> {
    match view? {
        TypeTerm::Parameterized { args, .. } if args.len() == ancestor.type_parameters().len() => {
            Some(Substitution::from_pairs(
                ancestor
                    .type_parameters()
                    .iter()
                    .map(|tp| tp.name.clone())
                    .zip(args.iter().cloned()),
            ))
        }
        _ => None,
    }
}

/// Erased parameter names of `method` as seen from a subclass.
fn overridden_parameter_names(method: &MethodDef, sigma: Option<&Substitution>) -> Vec<String> {
    match sigma {
        Some(sigma) => method
            .parameter_types()
            .iter()
            .map(|ty| sigma.apply(ty).erased_name())
            .collect(),
        None => method.erased_parameter_names(),
    }
}

/// 0 for an exact match, 1 when some names only match up to boxing.
fn match_rank(declared: &[String], wanted: &[String]) -> Option<usize> {
    if declared.len() != wanted.len() {
        return None;
    }
    let mut rank = 0;
    for (d, w) in declared.iter().zip(wanted) {
        if d == w {
            continue;
        }
        if !boxing_equivalent(d, w) {
            return None;
        }
        rank = 1;
    }
    Some(rank)
}

/// Pointers of the documents [`parse_documents`] returns successfully, in
/// the same order.
fn document_pointers(text: &str) -> Vec<String> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter(|(idx, item)| OperationSpecification::from_json(item, &format!("/{idx}")).is_ok())
            .map(|(idx, _)| format!("/{idx}"))
            .collect(),
        Ok(_) => vec![String::new()],
        Err(_) => Vec::new(),
    }
}

fn collect_json_files(path: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut out = Vec::new();
    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry_path = entry?.path();
            if entry_path.is_dir() {
                pending.push(entry_path);
            } else if entry_path.extension().is_some_and(|ext| ext == "json") {
                out.push(entry_path);
            }
        }
    }
    out.sort();
    Ok(out)
}
