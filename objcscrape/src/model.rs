//! Intermediate model types: the bridge between tree extraction and type resolution.
//!
//! These types are compiler-independent and host-language-independent, making the
//! extractor, the scheduler merge and the resolver easy to test in isolation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

/// Declaration names requested from one framework, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets {
    pub classes: BTreeSet<String>,
    pub protocols: BTreeSet<String>,
    pub integer_enums: BTreeSet<String>,
    pub string_enums: BTreeSet<String>,
}

impl Targets {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
            && self.protocols.is_empty()
            && self.integer_enums.is_empty()
            && self.string_enums.is_empty()
    }

    /// Total number of requested names across all categories.
    pub fn len(&self) -> usize {
        self.classes.len() + self.protocols.len() + self.integer_enums.len() + self.string_enums.len()
    }
}

/// One unit of work for the worker pool: every header of one framework plus
/// the names the worker must find in them.
#[derive(Debug, Clone)]
pub struct BatchTask {
    pub framework: String,
    pub headers: Vec<PathBuf>,
    pub targets: Targets,
    /// Headers force-included when falling back to pre-include mode.
    pub pre_includes: Vec<PathBuf>,
    /// Extra compiler flags for this batch only.
    pub clang_args: Vec<String>,
    /// Framework binary used for exported string-constant lookup.
    pub binary: Option<PathBuf>,
}

/// Deprecation state of a declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deprecation {
    pub deprecated: bool,
    pub message: Option<String>,
}

impl Deprecation {
    pub fn none() -> Self {
        Self::default()
    }

    /// Combine structural and textual detection (logical OR, first message wins).
    pub fn or(self, other: Deprecation) -> Deprecation {
        Deprecation {
            deprecated: self.deprecated || other.deprecated,
            message: self.message.or(other.message),
        }
    }
}

/// A method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    /// Raw type spelling as printed by the compiler.
    pub ty: String,
    /// Parameter names recovered from the header for a block-typed parameter.
    /// Empty when the parameter is not a block or nothing could be recovered.
    pub block_param_names: Vec<Option<String>>,
}

/// An Objective-C method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub selector: String,
    pub return_type: String,
    pub params: Vec<ParamDecl>,
    pub is_class: bool,
    pub deprecation: Deprecation,
    pub doc: Option<String>,
    /// Block parameter names recovered for a block-typed return value.
    pub return_block_param_names: Vec<Option<String>>,
}

/// An Objective-C property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDecl {
    pub name: String,
    pub ty: String,
    pub is_class: bool,
    pub readonly: bool,
    pub deprecation: Deprecation,
    pub doc: Option<String>,
    pub block_param_names: Vec<Option<String>>,
}

/// Members shared by classes and protocols.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Members {
    pub instance_methods: Vec<MethodDecl>,
    pub class_methods: Vec<MethodDecl>,
    pub properties: Vec<PropertyDecl>,
}

impl Members {
    fn has_method(&self, m: &MethodDecl) -> bool {
        let list = if m.is_class {
            &self.class_methods
        } else {
            &self.instance_methods
        };
        list.iter().any(|existing| existing.selector == m.selector)
    }

    /// Add a method unless one with the same selector (and the same
    /// class/instance side) is already present. Returns whether it was added.
    pub fn add_method(&mut self, m: MethodDecl) -> bool {
        if self.has_method(&m) {
            return false;
        }
        if m.is_class {
            self.class_methods.push(m);
        } else {
            self.instance_methods.push(m);
        }
        true
    }

    /// Add a property unless one with the same name and side already exists.
    pub fn add_property(&mut self, p: PropertyDecl) -> bool {
        if self
            .properties
            .iter()
            .any(|existing| existing.name == p.name && existing.is_class == p.is_class)
        {
            return false;
        }
        self.properties.push(p);
        true
    }

    /// Additive union: members already present keep their first definition.
    pub fn merge(&mut self, other: Members) {
        for m in other.instance_methods.into_iter().chain(other.class_methods) {
            self.add_method(m);
        }
        for p in other.properties {
            self.add_property(p);
        }
    }

    pub fn len(&self) -> usize {
        self.instance_methods.len() + self.class_methods.len() + self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An Objective-C class, including everything merged in from categories,
/// extensions and a same-named root protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: String,
    pub superclass: Option<String>,
    pub protocols: Vec<String>,
    /// Lightweight generic parameters (`NSArray<ObjectType>`).
    pub type_params: Vec<String>,
    pub members: Members,
    pub deprecation: Deprecation,
    pub doc: Option<String>,
}

impl ClassDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Fold another record for the same class into this one without
    /// replacing anything already known.
    pub fn merge(&mut self, other: ClassDecl) {
        if self.superclass.is_none() {
            self.superclass = other.superclass;
        }
        push_unique(&mut self.protocols, other.protocols);
        push_unique(&mut self.type_params, other.type_params);
        self.members.merge(other.members);
        self.deprecation = std::mem::take(&mut self.deprecation).or(other.deprecation);
        if self.doc.is_none() {
            self.doc = other.doc;
        }
    }
}

/// An Objective-C protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolDecl {
    pub name: String,
    /// Protocols this protocol extends.
    pub parents: Vec<String>,
    pub members: Members,
    pub deprecation: Deprecation,
    pub doc: Option<String>,
}

impl ProtocolDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn merge(&mut self, other: ProtocolDecl) {
        push_unique(&mut self.parents, other.parents);
        self.members.merge(other.members);
        self.deprecation = std::mem::take(&mut self.deprecation).or(other.deprecation);
        if self.doc.is_none() {
            self.doc = other.doc;
        }
    }
}

/// A single integer enum constant with its resolved value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConstant {
    pub name: String,
    pub value: i64,
    pub deprecation: Deprecation,
    pub doc: Option<String>,
}

/// An `NS_ENUM` / `NS_OPTIONS` style integer enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegerEnumDecl {
    pub name: String,
    /// Underlying integer type spelling (e.g. `NSInteger`).
    pub underlying: String,
    pub is_bitmask: bool,
    pub constants: Vec<EnumConstant>,
    pub doc: Option<String>,
}

/// One exported string constant belonging to a string enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEnumValue {
    /// Exported symbol name (e.g. `NSFileTypeDirectory`).
    pub symbol: String,
    /// Symbol with the enum name stripped (e.g. `Directory`).
    pub short_name: String,
    /// Resolved value; `None` until the string-constant lookup fills it.
    pub value: Option<String>,
    pub deprecation: Deprecation,
    pub doc: Option<String>,
}

/// An `NS_TYPED_ENUM` / `NS_STRING_ENUM` style string enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEnumDecl {
    pub name: String,
    pub values: Vec<StringEnumValue>,
    pub doc: Option<String>,
}

/// A struct field with its raw type spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: String,
}

/// A C struct. `internal_name` is set when a public typedef exposes an
/// otherwise-private `_Prefixed` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDecl {
    pub name: String,
    pub internal_name: Option<String>,
    pub fields: Vec<FieldDecl>,
}

/// Everything the extractor pulls out of one declaration tree.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub classes: BTreeMap<String, ClassDecl>,
    pub protocols: BTreeMap<String, ProtocolDecl>,
    pub integer_enums: BTreeMap<String, IntegerEnumDecl>,
    pub string_enums: BTreeMap<String, StringEnumDecl>,
    pub structs: BTreeMap<String, StructDecl>,
    /// Typedef name → existing public struct name.
    pub struct_aliases: BTreeMap<String, String>,
    /// Typedef name → underlying raw type spelling.
    pub typedefs: BTreeMap<String, String>,
    /// Block typedef name → parameter names declared in its header.
    pub block_typedefs: BTreeMap<String, Vec<Option<String>>>,
    /// Root protocols folded into a same-named class record.
    pub root_protocols: BTreeSet<String>,
}

impl Extraction {
    /// Whether a requested protocol was produced, either as its own record or
    /// folded into the same-named root class.
    pub fn has_protocol(&self, name: &str) -> bool {
        self.protocols.contains_key(name) || self.root_protocols.contains(name)
    }

    /// Names requested by `targets` that this extraction does not contain.
    pub fn missing(&self, targets: &Targets) -> Targets {
        Targets {
            classes: missing_names(&targets.classes, &self.classes),
            protocols: targets
                .protocols
                .iter()
                .filter(|name| !self.has_protocol(name))
                .cloned()
                .collect(),
            integer_enums: missing_names(&targets.integer_enums, &self.integer_enums),
            string_enums: missing_names(&targets.string_enums, &self.string_enums),
        }
    }

    /// Take only entries this extraction does not already have. Entries found
    /// earlier are never overwritten. Returns the names that disagreed in
    /// shape between the two passes (both kept the first version).
    pub fn merge_missing(&mut self, other: Extraction) -> Vec<String> {
        let mut conflicts = Vec::new();
        fill_missing(&mut self.classes, other.classes, &mut conflicts);
        fill_missing(&mut self.protocols, other.protocols, &mut conflicts);
        fill_missing(&mut self.integer_enums, other.integer_enums, &mut conflicts);
        fill_missing(&mut self.string_enums, other.string_enums, &mut conflicts);
        fill_missing(&mut self.structs, other.structs, &mut conflicts);
        fill_missing(&mut self.struct_aliases, other.struct_aliases, &mut conflicts);
        fill_missing(&mut self.typedefs, other.typedefs, &mut conflicts);
        fill_missing(&mut self.block_typedefs, other.block_typedefs, &mut conflicts);
        // A folded root protocol only counts if its class record is the one kept.
        for name in other.root_protocols {
            if self.classes.contains_key(&name) && !self.root_protocols.contains(&name) {
                self.root_protocols.insert(name);
            }
        }
        conflicts
    }
}

fn missing_names<V>(wanted: &BTreeSet<String>, found: &BTreeMap<String, V>) -> BTreeSet<String> {
    wanted
        .iter()
        .filter(|name| !found.contains_key(*name))
        .cloned()
        .collect()
}

fn fill_missing<V: PartialEq>(
    into: &mut BTreeMap<String, V>,
    from: BTreeMap<String, V>,
    conflicts: &mut Vec<String>,
) {
    for (name, value) in from {
        match into.get(&name) {
            Some(existing) => {
                if *existing != value {
                    conflicts.push(name);
                }
            }
            None => {
                into.insert(name, value);
            }
        }
    }
}

/// Result of one batch, as handed back by a worker.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub framework: String,
    pub targets: Targets,
    pub extraction: Extraction,
    /// Whether the pre-include fallback pass ran.
    pub used_fallback: bool,
    /// Names both passes produced with a different shape (primary kept).
    pub conflicts: Vec<String>,
    pub binary: Option<PathBuf>,
}

/// How many of the requested declarations a framework actually produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Coverage {
    pub framework: String,
    pub classes: (usize, usize),
    pub protocols: (usize, usize),
    pub integer_enums: (usize, usize),
    pub string_enums: (usize, usize),
    pub failed: bool,
}

impl Coverage {
    pub fn from_result(result: &BatchResult) -> Self {
        let t = &result.targets;
        let e = &result.extraction;
        let count = |wanted: &BTreeSet<String>, found: &dyn Fn(&str) -> bool| {
            (wanted.iter().filter(|n| found(n)).count(), wanted.len())
        };
        Coverage {
            framework: result.framework.clone(),
            classes: count(&t.classes, &|n| e.classes.contains_key(n)),
            protocols: count(&t.protocols, &|n| e.has_protocol(n)),
            integer_enums: count(&t.integer_enums, &|n| e.integer_enums.contains_key(n)),
            string_enums: count(&t.string_enums, &|n| e.string_enums.contains_key(n)),
            failed: false,
        }
    }

    pub fn failed(framework: &str, targets: &Targets) -> Self {
        Coverage {
            framework: framework.to_string(),
            classes: (0, targets.classes.len()),
            protocols: (0, targets.protocols.len()),
            integer_enums: (0, targets.integer_enums.len()),
            string_enums: (0, targets.string_enums.len()),
            failed: true,
        }
    }
}

/// Global tables merged from every batch.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub classes: BTreeMap<String, ClassDecl>,
    pub protocols: BTreeMap<String, ProtocolDecl>,
    pub integer_enums: BTreeMap<String, IntegerEnumDecl>,
    pub string_enums: BTreeMap<String, StringEnumDecl>,
    pub structs: BTreeMap<String, StructDecl>,
    pub struct_aliases: BTreeMap<String, String>,
    pub typedefs: BTreeMap<String, String>,
    pub block_typedefs: BTreeMap<String, Vec<Option<String>>>,
    /// Framework that first produced each class/protocol/enum.
    pub owners: HashMap<String, String>,
    /// Framework binary per framework, for string-constant lookup.
    pub binaries: HashMap<String, PathBuf>,
    pub coverage: Vec<Coverage>,
}

impl Model {
    /// Merge a batch's extraction by name. Classes and protocols union their
    /// members; enums, structs and typedefs keep the first complete record.
    pub fn absorb(&mut self, result: BatchResult) {
        let framework = result.framework;
        let e = result.extraction;
        if let Some(binary) = result.binary {
            self.binaries.insert(framework.clone(), binary);
        }
        for (name, class) in e.classes {
            self.owners.entry(name.clone()).or_insert_with(|| framework.clone());
            match self.classes.get_mut(&name) {
                Some(existing) => existing.merge(class),
                None => {
                    self.classes.insert(name, class);
                }
            }
        }
        for (name, protocol) in e.protocols {
            self.owners.entry(name.clone()).or_insert_with(|| framework.clone());
            match self.protocols.get_mut(&name) {
                Some(existing) => existing.merge(protocol),
                None => {
                    self.protocols.insert(name, protocol);
                }
            }
        }
        for (name, en) in e.integer_enums {
            self.owners.entry(name.clone()).or_insert_with(|| framework.clone());
            self.integer_enums.entry(name).or_insert(en);
        }
        for (name, en) in e.string_enums {
            self.owners.entry(name.clone()).or_insert_with(|| framework.clone());
            self.string_enums.entry(name).or_insert(en);
        }
        for (name, s) in e.structs {
            self.structs.entry(name).or_insert(s);
        }
        for (name, target) in e.struct_aliases {
            self.struct_aliases.entry(name).or_insert(target);
        }
        for (name, underlying) in e.typedefs {
            self.typedefs.entry(name).or_insert(underlying);
        }
        for (name, names) in e.block_typedefs {
            self.block_typedefs.entry(name).or_insert(names);
        }
    }
}

fn push_unique(into: &mut Vec<String>, from: Vec<String>) {
    for item in from {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}
