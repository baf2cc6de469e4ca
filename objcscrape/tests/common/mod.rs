//! Shared test helpers: fixture loading and a scripted compiler frontend.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use objcscrape::ast::DeclarationTree;
use objcscrape::error::InvokeError;
use objcscrape::invoke::{Frontend, Mode, ParseRequest};
use serde_json::{Value, json};

pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../tests/fixtures")
}

/// The widgets declaration tree exactly as stored (locations name `Widgets.h`).
pub fn widgets_json() -> Value {
    let path = fixtures_dir().join("widgets/widgets.ast.json");
    let text = std::fs::read_to_string(&path).expect("read widgets fixture");
    serde_json::from_str(&text).expect("parse widgets fixture")
}

/// The widgets tree with `Widgets.h` rewritten to the fixture's absolute path,
/// so a worker's source cache can read the real header text.
pub fn widgets_json_absolute() -> Value {
    let header = fixtures_dir().join("widgets/Widgets.h");
    let text = std::fs::read_to_string(fixtures_dir().join("widgets/widgets.ast.json"))
        .expect("read widgets fixture");
    let header = serde_json::to_string(&header.display().to_string()).expect("quote path");
    let text = text.replace("\"Widgets.h\"", &header);
    serde_json::from_str(&text).expect("parse widgets fixture")
}

pub fn widgets_header() -> String {
    std::fs::read_to_string(fixtures_dir().join("widgets/Widgets.h")).expect("read widgets header")
}

pub fn tree(value: &Value) -> DeclarationTree {
    DeclarationTree::from_json(&serde_json::to_vec(value).expect("serialize tree"))
        .expect("deserialize tree")
}

// ---------------------------------------------------------------------------
// Tiny tree builders
// ---------------------------------------------------------------------------

pub fn unit(decls: Vec<Value>) -> Value {
    json!({ "id": "0x1", "kind": "TranslationUnitDecl", "inner": decls })
}

pub fn method(selector: &str, ret: &str) -> Value {
    json!({
        "id": format!("m-{selector}"),
        "kind": "ObjCMethodDecl",
        "name": selector,
        "returnType": { "qualType": ret },
        "instance": true
    })
}

pub fn interface(name: &str, superclass: Option<&str>, protocols: &[&str], methods: Vec<Value>) -> Value {
    let mut node = json!({
        "id": format!("i-{name}"),
        "kind": "ObjCInterfaceDecl",
        "name": name,
        "protocols": protocols
            .iter()
            .map(|p| json!({ "id": format!("p-{p}"), "kind": "ObjCProtocolDecl", "name": p }))
            .collect::<Vec<_>>(),
        "inner": methods
    });
    if let Some(s) = superclass {
        node["super"] = json!({ "id": format!("i-{s}"), "kind": "ObjCInterfaceDecl", "name": s });
    }
    node
}

pub fn category(class: &str, name: &str, methods: Vec<Value>) -> Value {
    json!({
        "id": format!("c-{class}-{name}"),
        "kind": "ObjCCategoryDecl",
        "name": name,
        "interface": { "id": format!("i-{class}"), "kind": "ObjCInterfaceDecl", "name": class },
        "inner": methods
    })
}

pub fn protocol(name: &str, parents: &[&str], methods: Vec<Value>) -> Value {
    json!({
        "id": format!("p-{name}"),
        "kind": "ObjCProtocolDecl",
        "name": name,
        "protocols": parents
            .iter()
            .map(|p| json!({ "id": format!("p-{p}"), "kind": "ObjCProtocolDecl", "name": p }))
            .collect::<Vec<_>>(),
        "inner": methods
    })
}

// ---------------------------------------------------------------------------
// Scripted frontend
// ---------------------------------------------------------------------------

/// What the scripted frontend does for one (framework, mode) pair.
#[derive(Clone)]
pub enum Script {
    Tree(Value),
    Fail,
    Panic,
}

/// A [`Frontend`] that answers from a table instead of running clang.
/// Unscripted requests fail like a missing compiler would.
#[derive(Default)]
pub struct ScriptedFrontend {
    scripts: HashMap<(String, Mode), Script>,
    calls: Mutex<Vec<(String, Mode)>>,
}

impl ScriptedFrontend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, framework: &str, mode: Mode, script: Script) -> Self {
        self.scripts.insert((framework.to_string(), mode), script);
        self
    }

    /// Every request seen so far, in order.
    pub fn calls(&self) -> Vec<(String, Mode)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Frontend for ScriptedFrontend {
    async fn parse(&self, request: &ParseRequest) -> Result<DeclarationTree, InvokeError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.framework.clone(), request.mode));
        match self.scripts.get(&(request.framework.clone(), request.mode)) {
            Some(Script::Tree(value)) => Ok(DeclarationTree::from_json(&serde_json::to_vec(value)?)?),
            Some(Script::Panic) => panic!("scripted frontend panic for {}", request.framework),
            Some(Script::Fail) | None => Err(InvokeError::Spawn {
                program: "scripted-clang".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no script"),
            }),
        }
    }
}
