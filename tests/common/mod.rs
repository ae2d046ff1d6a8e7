#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use opspec::reflect::{body, ClassDef, ClassPath, ObjectRef, Thrown, Value};
use opspec::types::{PrimitiveKind, TypeTerm, TypeVariable};

pub fn int() -> TypeTerm {
    TypeTerm::primitive(PrimitiveKind::Int)
}

pub fn long() -> TypeTerm {
    TypeTerm::primitive(PrimitiveKind::Long)
}

pub fn boolean() -> TypeTerm {
    TypeTerm::primitive(PrimitiveKind::Boolean)
}

pub fn void() -> TypeTerm {
    TypeTerm::primitive(PrimitiveKind::Void)
}

pub fn string() -> TypeTerm {
    TypeTerm::string()
}

/// Built-in classes plus the fixture classes:
///
/// - `net.Connection`: `open()`, `send(int)`, `isOpen()`, `lastSent()`
/// - `p.C(int, String)` with `getN()`
/// - `p.Box<T>(T)` with `get()`, `set(T)` and static `empty()`
/// - `p.Base` / `p.Derived extends p.Base` with an overridden `describe()`
/// - `p.Util` with static `max(int, int)`, `slow(long)` and `boom()`
/// - `p.Cmp<T>` with `cmp(T)`, implemented by `p.Word` as `cmp(String)`
/// - `p.Gadget` with `label(int)` / `label(String)` overloads and a
///   panicking `fragile()`
pub fn classpath() -> ClassPath {
    let mut cp = ClassPath::with_builtins();

    cp.register(
        ClassDef::builder("net.Connection")
            .constructor(
                vec![],
                body(|_| {
                    Ok(Value::Object(ObjectRef::with_fields(
                        "net.Connection",
                        [("open", Value::Boolean(false)), ("last", Value::Int(0))],
                    )))
                }),
            )
            .method(
                "open",
                vec![],
                void(),
                body(|inv| {
                    inv.this()?.set_field("open", Value::Boolean(true));
                    Ok(Value::Null)
                }),
            )
            .method(
                "send",
                vec![int()],
                void(),
                body(|inv| {
                    let this = inv.this()?;
                    if this.field("open").and_then(|v| v.as_bool()) != Some(true) {
                        return Err(Thrown::with_message(
                            "java.lang.IllegalStateException",
                            "connection closed",
                        ));
                    }
                    let signal = inv.arg(0).as_i64().unwrap_or(0);
                    if signal <= 0 {
                        return Err(Thrown::illegal_argument("signal must be positive"));
                    }
                    this.set_field("last", inv.arg(0).clone());
                    Ok(Value::Null)
                }),
            )
            .method(
                "isOpen",
                vec![],
                boolean(),
                body(|inv| Ok(inv.this()?.field("open").unwrap_or(Value::Boolean(false)))),
            )
            .method(
                "lastSent",
                vec![],
                int(),
                body(|inv| Ok(inv.this()?.field("last").unwrap_or(Value::Int(0)))),
            )
            .build(),
    );

    cp.register(
        ClassDef::builder("p.C")
            .constructor(
                vec![int(), string()],
                body(|inv| {
                    Ok(Value::Object(ObjectRef::with_fields(
                        "p.C",
                        [("n", inv.arg(0).clone()), ("s", inv.arg(1).clone())],
                    )))
                }),
            )
            .method(
                "getN",
                vec![],
                int(),
                body(|inv| Ok(inv.this()?.field("n").unwrap_or(Value::Null))),
            )
            .build(),
    );

    let t = TypeTerm::variable("T");
    cp.register(
        ClassDef::builder("p.Box")
            .type_parameter(TypeVariable::new("T"))
            .constructor(
                vec![t.clone()],
                body(|inv| {
                    Ok(Value::Object(ObjectRef::with_fields(
                        "p.Box",
                        [("value", inv.arg(0).clone())],
                    )))
                }),
            )
            .method(
                "get",
                vec![],
                t.clone(),
                body(|inv| Ok(inv.this()?.field("value").unwrap_or(Value::Null))),
            )
            .method(
                "set",
                vec![t.clone()],
                void(),
                body(|inv| {
                    inv.this()?.set_field("value", inv.arg(0).clone());
                    Ok(Value::Null)
                }),
            )
            .static_method(
                "empty",
                vec![],
                TypeTerm::parameterized("p.Box", vec![t]),
                body(|_| {
                    Ok(Value::Object(ObjectRef::with_fields(
                        "p.Box",
                        [("value", Value::Null)],
                    )))
                }),
            )
            .build(),
    );

    cp.register(
        ClassDef::builder("p.Base")
            .constructor(vec![], body(|_| Ok(Value::Object(ObjectRef::new("p.Base")))))
            .method("describe", vec![int()], string(), body(|_| Ok(Value::from("base"))))
            .build(),
    );
    cp.register(
        ClassDef::builder("p.Derived")
            .extends(TypeTerm::class("p.Base"))
            .constructor(vec![], body(|_| Ok(Value::Object(ObjectRef::new("p.Derived")))))
            .method(
                "describe",
                vec![int()],
                string(),
                body(|inv| {
                    if inv.arg(0).as_i64().unwrap_or(0) < 0 {
                        return Ok(Value::from(""));
                    }
                    Ok(Value::from("derived"))
                }),
            )
            .build(),
    );

    cp.register(
        ClassDef::builder("p.Util")
            .static_method(
                "max",
                vec![int(), int()],
                int(),
                body(|inv| {
                    let a = inv.arg(0).as_i64().unwrap_or(0);
                    let b = inv.arg(1).as_i64().unwrap_or(0);
                    Ok(Value::Int(a.max(b) as i32))
                }),
            )
            .static_method(
                "slow",
                vec![long()],
                void(),
                body(|inv| {
                    let millis = inv.arg(0).as_i64().unwrap_or(0);
                    for _ in 0..millis {
                        if inv.is_interrupted() {
                            break;
                        }
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    Ok(Value::Null)
                }),
            )
            .static_method("boom", vec![], void(), body(|_| panic!("boom")))
            .build(),
    );

    cp.register(
        ClassDef::builder("p.Cmp")
            .interface()
            .type_parameter(TypeVariable::new("T"))
            .method(
                "cmp",
                vec![TypeTerm::variable("T")],
                int(),
                body(|_| Err(Thrown::new("java.lang.AbstractMethodError"))),
            )
            .build(),
    );
    cp.register(
        ClassDef::builder("p.Word")
            .implements(TypeTerm::parameterized("p.Cmp", vec![string()]))
            .constructor(vec![], body(|_| Ok(Value::Object(ObjectRef::new("p.Word")))))
            .method(
                "cmp",
                vec![string()],
                int(),
                body(|inv| Ok(Value::Int(inv.arg(0).as_str().map_or(0, |s| s.len() as i32)))),
            )
            .build(),
    );

    cp.register(
        ClassDef::builder("p.Gadget")
            .constructor(vec![], body(|_| Ok(Value::Object(ObjectRef::new("p.Gadget")))))
            .method("label", vec![int()], string(), body(|_| Ok(Value::from("number"))))
            .method("label", vec![string()], string(), body(|_| Ok(Value::from("text"))))
            .method("fragile", vec![], boolean(), body(|_| panic!("fragile body")))
            .build(),
    );

    cp
}

pub fn shared_classpath() -> Arc<ClassPath> {
    Arc::new(classpath())
}

pub struct TempDir {
    pub path: PathBuf,
}

impl TempDir {
    pub fn new(prefix: &str) -> Self {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "opspec_{prefix}_{}_{}",
            std::process::id(),
            stamp
        ));
        fs::create_dir_all(&path).expect("create temp dir");
        Self { path }
    }

    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(&path, content).expect("write file");
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}
