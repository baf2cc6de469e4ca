//! Extraction: declaration tree nodes → intermediate model types.
//!
//! One ordered pass over the filtered top-level declarations. Classes and
//! protocols merge additively; enums only become records once they have
//! constants; structs, struct aliases and the typedef table are collected
//! from every header in the unit because type resolution needs them
//! regardless of which framework declared them.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::ast::{AstNode, DeclarationTree};
use crate::model::*;
use crate::source::SourceCache;
use crate::typetext::strip_annotations;

/// Lines of a declaration scanned for textual metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    /// Only the declaration's first line (containers whose range covers a body).
    Head,
    /// The declaration's full range (members, constants).
    Full,
}

/// Resolved position of a node in the original headers.
#[derive(Debug, Clone)]
struct Position {
    file: Arc<str>,
    line: u32,
    end_line: u32,
}

/// Extract the requested declarations (and every struct/typedef) from a tree.
pub fn extract_tree(tree: &DeclarationTree, targets: &Targets, sources: &mut SourceCache) -> Extraction {
    let mut walker = Walker::new(targets, sources);
    for node in &tree.decls {
        walker.visit(node);
    }
    let out = walker.finish();

    info!(
        classes = out.classes.len(),
        protocols = out.protocols.len(),
        integer_enums = out.integer_enums.len(),
        string_enums = out.string_enums.len(),
        structs = out.structs.len(),
        struct_aliases = out.struct_aliases.len(),
        typedefs = out.typedefs.len(),
        "tree extraction complete"
    );
    out
}

struct Walker<'a, 's> {
    targets: &'a Targets,
    sources: &'s mut SourceCache,
    out: Extraction,
    /// Category and root-protocol members whose class interface has not been
    /// seen yet.
    pending: BTreeMap<String, ClassDecl>,
    /// Root protocols folded (or waiting to fold) into a same-named class.
    root_protocols: BTreeSet<String>,
    /// Every record seen so far, by node id.
    records: HashMap<&'a str, &'a AstNode>,
    /// Named records with a definition, by name.
    records_by_name: HashMap<&'a str, &'a AstNode>,
    /// Anonymous enums waiting for a naming typedef, by node id.
    anonymous_enums: HashMap<&'a str, &'a AstNode>,
    /// String-enum typedef node id → enum name.
    string_enum_ids: HashMap<&'a str, String>,
    /// Every enumerator evaluated so far (for references between constants).
    enumerators: HashMap<String, i64>,
}

impl<'a, 's> Walker<'a, 's> {
    fn new(targets: &'a Targets, sources: &'s mut SourceCache) -> Self {
        Self {
            targets,
            sources,
            out: Extraction::default(),
            pending: BTreeMap::new(),
            root_protocols: BTreeSet::new(),
            records: HashMap::new(),
            records_by_name: HashMap::new(),
            anonymous_enums: HashMap::new(),
            string_enum_ids: HashMap::new(),
            enumerators: HashMap::new(),
        }
    }

    fn visit(&mut self, node: &'a AstNode) {
        match node.kind.as_str() {
            "ObjCInterfaceDecl" => self.collect_interface(node),
            "ObjCCategoryDecl" => self.collect_category(node),
            "ObjCProtocolDecl" => self.collect_protocol(node),
            "EnumDecl" => self.collect_enum(node),
            "RecordDecl" => self.collect_record(node),
            "TypedefDecl" => self.collect_typedef(node),
            "VarDecl" => self.collect_string_enum_value(node),
            other => trace!(kind = other, "ignoring node"),
        }
    }

    // -----------------------------------------------------------------------
    // Positions and textual metadata
    // -----------------------------------------------------------------------

    fn position(&self, node: &AstNode) -> Option<Position> {
        match &node.anchor {
            Some(anchor) => Some(Position {
                file: anchor.file.clone(),
                line: anchor.line,
                end_line: anchor.end_line,
            }),
            None => {
                trace!(kind = %node.kind, "node without location");
                None
            }
        }
    }

    fn deprecation(&mut self, node: &AstNode, span: Span) -> Deprecation {
        let structural = match node.deprecated_attr() {
            Some(message) => Deprecation {
                deprecated: true,
                message,
            },
            None => Deprecation::none(),
        };
        let textual = match self.position(node) {
            Some(pos) => {
                let end = match span {
                    Span::Head => pos.line,
                    Span::Full => pos.end_line,
                };
                self.sources.deprecation_near(&pos.file, pos.line, end)
            }
            None => Deprecation::none(),
        };
        structural.or(textual)
    }

    fn doc(&mut self, node: &AstNode) -> Option<String> {
        if let Some(text) = node.comment_text() {
            return Some(text);
        }
        let pos = self.position(node)?;
        self.sources.doc_comment_before(&pos.file, pos.line)
    }

    fn block_names(&mut self, node: &AstNode) -> Vec<Vec<Option<String>>> {
        match self.position(node) {
            Some(pos) => self.sources.block_param_names(&pos.file, pos.line, pos.end_line),
            None => Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Classes, categories, protocols
    // -----------------------------------------------------------------------

    fn collect_interface(&mut self, node: &'a AstNode) {
        let Some(name) = node.name() else { return };
        if !self.targets.classes.contains(name) {
            return;
        }
        if node.inner.is_empty() && node.superclass.is_none() && node.protocols.is_empty() {
            trace!(name, "skipping forward class declaration");
            return;
        }

        let mut class = ClassDecl::new(name);
        class.superclass = node
            .superclass
            .as_ref()
            .and_then(|s| s.name.clone())
            .filter(|s| !s.is_empty());
        class.protocols = ref_names(&node.protocols);
        class.type_params = node
            .children("ObjCTypeParamDecl")
            .filter_map(|p| p.name().map(str::to_string))
            .collect();
        class.deprecation = self.deprecation(node, Span::Head);
        class.doc = self.doc(node);
        class.members = self.collect_members(node);

        debug!(
            name,
            superclass = ?class.superclass,
            members = class.members.len(),
            "extracted class"
        );
        self.merge_class(class);
    }

    fn collect_category(&mut self, node: &'a AstNode) {
        let Some(class_name) = node.interface.as_ref().and_then(|i| i.name.as_deref()) else {
            return;
        };
        if !self.targets.classes.contains(class_name) {
            return;
        }
        let mut class = ClassDecl::new(class_name);
        class.protocols = ref_names(&node.protocols);
        class.members = self.collect_members(node);
        debug!(
            class = class_name,
            category = node.name().unwrap_or("<extension>"),
            members = class.members.len(),
            "merging category"
        );
        self.merge_partial(class);
    }

    fn collect_protocol(&mut self, node: &'a AstNode) {
        let Some(name) = node.name() else { return };
        let is_definition = !node.inner.is_empty() || !node.protocols.is_empty();
        if !is_definition {
            trace!(name, "skipping forward protocol declaration");
            return;
        }

        // A root class's own basic protocol (NSObject/<NSObject>) folds into
        // the class record instead of becoming a separate protocol.
        if self.targets.classes.contains(name) {
            let mut class = ClassDecl::new(name);
            class.members = self.collect_members(node);
            debug!(name, members = class.members.len(), "merging root protocol into class");
            self.root_protocols.insert(name.to_string());
            self.merge_partial(class);
            return;
        }

        if !self.targets.protocols.contains(name) {
            return;
        }
        let mut protocol = ProtocolDecl::new(name);
        protocol.parents = ref_names(&node.protocols);
        protocol.deprecation = self.deprecation(node, Span::Head);
        protocol.doc = self.doc(node);
        protocol.members = self.collect_members(node);
        debug!(name, parents = ?protocol.parents, members = protocol.members.len(), "extracted protocol");
        match self.out.protocols.get_mut(name) {
            Some(existing) => existing.merge(protocol),
            None => {
                self.out.protocols.insert(name.to_string(), protocol);
            }
        }
    }

    /// An interface creates the class record, picking up anything categories
    /// contributed before it.
    fn merge_class(&mut self, mut class: ClassDecl) {
        match self.out.classes.get_mut(&class.name) {
            Some(existing) => existing.merge(class),
            None => {
                if let Some(early) = self.pending.remove(&class.name) {
                    class.merge(early);
                }
                self.out.classes.insert(class.name.clone(), class);
            }
        }
    }

    /// Categories, extensions and root protocols only add to an interface.
    fn merge_partial(&mut self, class: ClassDecl) {
        if let Some(existing) = self.out.classes.get_mut(&class.name) {
            existing.merge(class);
            return;
        }
        match self.pending.get_mut(&class.name) {
            Some(early) => early.merge(class),
            None => {
                self.pending.insert(class.name.clone(), class);
            }
        }
    }

    fn finish(mut self) -> Extraction {
        for (name, orphan) in &self.pending {
            debug!(
                class = %name,
                members = orphan.members.len(),
                "dropping category members, class interface not in this unit"
            );
        }
        let classes = &self.out.classes;
        self.out.root_protocols = self
            .root_protocols
            .into_iter()
            .filter(|name| classes.contains_key(name))
            .collect();
        self.out
    }

    fn collect_members(&mut self, container: &'a AstNode) -> Members {
        let mut members = Members::default();
        for child in &container.inner {
            if child.is_implicit {
                continue;
            }
            match child.kind.as_str() {
                "ObjCMethodDecl" => {
                    let method = self.extract_method(child);
                    trace!(selector = %method.selector, "  method");
                    members.add_method(method);
                }
                "ObjCPropertyDecl" => {
                    let property = self.extract_property(child);
                    trace!(name = %property.name, "  property");
                    members.add_property(property);
                }
                _ => {}
            }
        }
        members
    }

    fn extract_method(&mut self, node: &AstNode) -> MethodDecl {
        let return_type = node
            .return_type
            .as_ref()
            .map(|t| t.qual_type.clone())
            .unwrap_or_else(|| "id".to_string());
        let params: Vec<(String, String)> = node
            .children("ParmVarDecl")
            .enumerate()
            .map(|(i, p)| {
                let name = p.name().map(str::to_string).unwrap_or_else(|| format!("arg{i}"));
                (name, p.qual_type().unwrap_or("id").to_string())
            })
            .collect();

        let has_block = return_type.contains("(^") || params.iter().any(|(_, ty)| ty.contains("(^"));
        let mut signatures = if has_block {
            self.block_names(node).into_iter()
        } else {
            Vec::new().into_iter()
        };
        let mut next_names = |ty: &str| {
            if ty.contains("(^") {
                signatures.next().unwrap_or_default()
            } else {
                Vec::new()
            }
        };

        let return_block_param_names = next_names(&return_type);
        let params = params
            .into_iter()
            .map(|(name, ty)| ParamDecl {
                block_param_names: next_names(&ty),
                name,
                ty,
            })
            .collect();

        MethodDecl {
            selector: node.name().unwrap_or_default().to_string(),
            return_type,
            params,
            is_class: !node.instance,
            deprecation: self.deprecation(node, Span::Full),
            doc: self.doc(node),
            return_block_param_names,
        }
    }

    fn extract_property(&mut self, node: &AstNode) -> PropertyDecl {
        let ty = node.qual_type().unwrap_or("id").to_string();
        let block_param_names = if ty.contains("(^") {
            self.block_names(node).into_iter().next().unwrap_or_default()
        } else {
            Vec::new()
        };
        PropertyDecl {
            name: node.name().unwrap_or_default().to_string(),
            ty,
            is_class: node.class,
            readonly: node.readonly,
            deprecation: self.deprecation(node, Span::Full),
            doc: self.doc(node),
            block_param_names,
        }
    }

    // -----------------------------------------------------------------------
    // Integer enums
    // -----------------------------------------------------------------------

    fn collect_enum(&mut self, node: &'a AstNode) {
        let Some(name) = node.name() else {
            // Possibly named later by `typedef enum { … } Name;`.
            self.anonymous_enums.insert(node.id.as_str(), node);
            return;
        };
        if !self.targets.integer_enums.contains(name) {
            // Still evaluate so later enums can reference these constants.
            self.evaluate_constants(node);
            return;
        }
        self.record_enum(name, node);
    }

    fn record_enum(&mut self, name: &str, node: &'a AstNode) {
        if !node.has_child("EnumConstantDecl") {
            trace!(name, "skipping enum forward declaration");
            return;
        }
        if self.out.integer_enums.contains_key(name) {
            trace!(name, "enum already recorded, keeping first complete definition");
            return;
        }

        let values = self.evaluate_constants(node);
        let mut constants = Vec::with_capacity(values.len());
        for (constant_node, value) in node.children("EnumConstantDecl").zip(values) {
            let doc = match constant_node.comment_text() {
                Some(text) => Some(text),
                None => {
                    let trailing = self
                        .position(constant_node)
                        .and_then(|pos| self.sources.trailing_comment(&pos.file, pos.line));
                    match trailing {
                        Some(text) => Some(text),
                        None => self.doc(constant_node),
                    }
                }
            };
            constants.push(EnumConstant {
                name: constant_node.name().unwrap_or_default().to_string(),
                value,
                deprecation: self.deprecation(constant_node, Span::Full),
                doc,
            });
        }

        let en = IntegerEnumDecl {
            name: name.to_string(),
            underlying: node
                .fixed_underlying_type
                .as_ref()
                .map(|t| t.qual_type.clone())
                .unwrap_or_else(|| "int".to_string()),
            is_bitmask: node.has_child("FlagEnumAttr"),
            constants,
            doc: self.doc(node),
        };
        debug!(
            name,
            constants = en.constants.len(),
            bitmask = en.is_bitmask,
            "extracted integer enum"
        );
        self.out.integer_enums.insert(name.to_string(), en);
    }

    /// C enumeration semantics: an explicit value resets the running counter
    /// to value + 1; an omitted value takes the counter.
    fn evaluate_constants(&mut self, node: &AstNode) -> Vec<i64> {
        let mut next = 0i64;
        let mut values = Vec::new();
        for constant in node.children("EnumConstantDecl") {
            let name = constant.name().unwrap_or_default();
            let value = match constant.inner.iter().find(|c| !c.kind.ends_with("Attr")) {
                Some(expr) => match eval_expr(expr, &self.enumerators) {
                    Some(v) => v,
                    None => {
                        warn!(constant = name, "cannot evaluate enumerator value, using counter");
                        next
                    }
                },
                None => next,
            };
            next = value.wrapping_add(1);
            self.enumerators.insert(name.to_string(), value);
            values.push(value);
        }
        values
    }

    // -----------------------------------------------------------------------
    // Structs
    // -----------------------------------------------------------------------

    fn collect_record(&mut self, node: &'a AstNode) {
        if node.tag_used.as_deref() != Some("struct") {
            return;
        }
        self.records.insert(node.id.as_str(), node);
        let Some(name) = node.name() else { return };
        if !node.complete_definition && !node.has_child("FieldDecl") {
            return;
        }
        self.records_by_name.insert(name, node);
        if is_internal_name(name) {
            // Exposed later, if at all, through a public typedef.
            return;
        }
        if self.out.structs.contains_key(name) {
            return;
        }
        let fields = record_fields(node);
        debug!(name, fields = fields.len(), "extracted struct");
        self.out.structs.insert(
            name.to_string(),
            StructDecl {
                name: name.to_string(),
                internal_name: None,
                fields,
            },
        );
    }

    /// Struct-shaped typedefs: anonymous records, internal-name exposure and
    /// aliases of existing structs.
    fn collect_struct_typedef(&mut self, name: &str, node: &'a AstNode) -> bool {
        if let Some(owned) = find_owned_tag(node) {
            let Some(record) = self.records.get(owned.id.as_str()).copied() else {
                return false;
            };
            return match record.name() {
                None => self.insert_struct(name, None, record),
                Some(record_name) if record_name == name => true,
                Some(record_name) if is_internal_name(record_name) => {
                    self.insert_struct(name, Some(record_name), record)
                }
                Some(record_name) => self.insert_alias(name, record_name),
            };
        }

        let Some(underlying) = node.qual_type() else { return false };
        let target = strip_annotations(underlying);
        let target = target.strip_prefix("struct ").unwrap_or(&target).trim();
        if target == name || !crate::typetext::is_identifier(target) {
            return false;
        }
        if self.out.structs.contains_key(target) {
            return self.insert_alias(name, target);
        }
        if let Some(alias_target) = self.out.struct_aliases.get(target).cloned() {
            return self.insert_alias(name, &alias_target);
        }
        if is_internal_name(target)
            && let Some(record) = self.records_by_name.get(target).copied()
        {
            return self.insert_struct(name, Some(target), record);
        }
        false
    }

    fn insert_struct(&mut self, name: &str, internal: Option<&str>, record: &AstNode) -> bool {
        if self.out.structs.contains_key(name) {
            return true;
        }
        let fields = record_fields(record);
        debug!(name, internal = ?internal, fields = fields.len(), "extracted struct via typedef");
        self.out.structs.insert(
            name.to_string(),
            StructDecl {
                name: name.to_string(),
                internal_name: internal.map(str::to_string),
                fields,
            },
        );
        true
    }

    fn insert_alias(&mut self, name: &str, target: &str) -> bool {
        if self.out.structs.contains_key(name) {
            return true;
        }
        debug!(name, target, "extracted struct alias");
        self.out
            .struct_aliases
            .entry(name.to_string())
            .or_insert_with(|| target.to_string());
        true
    }

    // -----------------------------------------------------------------------
    // Typedefs and string enums
    // -----------------------------------------------------------------------

    fn collect_typedef(&mut self, node: &'a AstNode) {
        let Some(name) = node.name() else { return };

        // `typedef enum { … } Name;`
        if let Some(owned) = find_owned_tag(node)
            && let Some(en) = self.anonymous_enums.get(owned.id.as_str()).copied()
        {
            if self.targets.integer_enums.contains(name) {
                self.record_enum(name, en);
            } else {
                self.evaluate_constants(en);
            }
        }

        if self.targets.string_enums.contains(name) && is_string_enum_root(node) {
            self.string_enum_ids.insert(node.id.as_str(), name.to_string());
            if !self.out.string_enums.contains_key(name) {
                let doc = self.doc(node);
                debug!(name, "extracted string enum");
                self.out.string_enums.insert(
                    name.to_string(),
                    StringEnumDecl {
                        name: name.to_string(),
                        values: Vec::new(),
                        doc,
                    },
                );
            }
        }

        self.collect_struct_typedef(name, node);

        let Some(underlying) = node.qual_type() else { return };
        if underlying == name || is_reserved_name(name) {
            return;
        }
        if underlying.contains("(^") && !self.out.block_typedefs.contains_key(name) {
            let names = self.block_names(node).into_iter().next().unwrap_or_default();
            if names.iter().any(Option::is_some) {
                trace!(name, ?names, "block typedef parameter names");
                self.out.block_typedefs.insert(name.to_string(), names);
            }
        }
        self.out
            .typedefs
            .entry(name.to_string())
            .or_insert_with(|| underlying.to_string());
    }

    fn collect_string_enum_value(&mut self, node: &'a AstNode) {
        if node.storage_class.as_deref() != Some("extern") {
            return;
        }
        let Some(alias_id) = node.ty.as_ref().and_then(|t| t.type_alias_decl_id.as_deref()) else {
            return;
        };
        let Some(enum_name) = self.string_enum_ids.get(alias_id).cloned() else {
            return;
        };
        let Some(symbol) = node.name() else { return };

        let deprecation = self.deprecation(node, Span::Full);
        let doc = self.doc(node);
        let Some(en) = self.out.string_enums.get_mut(&enum_name) else {
            return;
        };
        if en.values.iter().any(|v| v.symbol == symbol) {
            return;
        }
        trace!(enum_name = %enum_name, symbol, "  string enum value");
        en.values.push(StringEnumValue {
            symbol: symbol.to_string(),
            short_name: short_name(symbol, &enum_name),
            value: None,
            deprecation,
            doc,
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ref_names(refs: &[crate::ast::DeclRef]) -> Vec<String> {
    refs.iter()
        .filter_map(|r| r.name.clone())
        .filter(|n| !n.is_empty())
        .collect()
}

/// Fields of a record; unnamed fields get positional names.
fn record_fields(record: &AstNode) -> Vec<FieldDecl> {
    record
        .children("FieldDecl")
        .enumerate()
        .map(|(i, f)| FieldDecl {
            name: f.name().map(str::to_string).unwrap_or_else(|| format!("field{i}")),
            ty: f.qual_type().unwrap_or("int").to_string(),
        })
        .collect()
}

/// The record/enum a typedef defines in place (`typedef struct { … } X;`).
fn find_owned_tag(node: &AstNode) -> Option<&crate::ast::DeclRef> {
    if let Some(owned) = &node.owned_tag_decl {
        return Some(owned);
    }
    node.inner
        .iter()
        .filter(|c| c.kind.ends_with("Type"))
        .find_map(find_owned_tag)
}

/// `_Foo` records have no public identity of their own.
fn is_internal_name(name: &str) -> bool {
    name.starts_with('_')
}

/// Reserved identifiers (`__x`, `_X`) never enter the typedef table.
fn is_reserved_name(name: &str) -> bool {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some('_'), Some(c)) => c == '_' || c.is_ascii_uppercase(),
        _ => false,
    }
}

/// A string enum root aliases the platform string pointer type *and* carries
/// the "new named type" marker.
fn is_string_enum_root(node: &AstNode) -> bool {
    let Some(underlying) = node.qual_type() else {
        return false;
    };
    let cleaned = strip_annotations(underlying);
    let cleaned = cleaned.replace("const", " ");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let is_string = matches!(cleaned.as_str(), "NSString *" | "NSMutableString *");
    is_string && node.has_child("SwiftNewTypeAttr")
}

/// Strip the enum name from the symbol; keep the full symbol when that would
/// leave nothing or something that cannot start an identifier.
pub fn short_name(symbol: &str, enum_name: &str) -> String {
    match symbol.strip_prefix(enum_name) {
        Some(rest) if !rest.is_empty() && !rest.starts_with(|c: char| c.is_ascii_digit()) => {
            rest.to_string()
        }
        _ => symbol.to_string(),
    }
}

/// Evaluate an enumerator initializer.
fn eval_expr(node: &AstNode, known: &HashMap<String, i64>) -> Option<i64> {
    match node.kind.as_str() {
        "ConstantExpr" => node
            .value_str()
            .and_then(|v| parse_int_literal(&v))
            .or_else(|| eval_expr(node.inner.first()?, known)),
        "IntegerLiteral" | "CharacterLiteral" => parse_int_literal(&node.value_str()?),
        "ParenExpr" | "ImplicitCastExpr" | "CStyleCastExpr" | "ExprWithCleanups" => {
            eval_expr(node.inner.first()?, known)
        }
        "UnaryOperator" => {
            let v = eval_expr(node.inner.first()?, known)?;
            match node.opcode.as_deref()? {
                "-" => Some(v.wrapping_neg()),
                "+" => Some(v),
                "~" => Some(!v),
                "!" => Some((v == 0) as i64),
                _ => None,
            }
        }
        "BinaryOperator" => {
            let l = eval_expr(node.inner.first()?, known)?;
            let r = eval_expr(node.inner.get(1)?, known)?;
            match node.opcode.as_deref()? {
                "<<" => Some(l.wrapping_shl(r as u32)),
                ">>" => Some(l.wrapping_shr(r as u32)),
                "|" => Some(l | r),
                "&" => Some(l & r),
                "^" => Some(l ^ r),
                "+" => Some(l.wrapping_add(r)),
                "-" => Some(l.wrapping_sub(r)),
                "*" => Some(l.wrapping_mul(r)),
                "/" if r != 0 => Some(l.wrapping_div(r)),
                _ => None,
            }
        }
        "DeclRefExpr" => {
            let name = node.referenced_decl.as_ref()?.name.as_deref()?;
            known.get(name).copied()
        }
        _ => None,
    }
}

/// Parse a decimal, hex or octal literal with optional sign and integer
/// suffixes. Values beyond `i64::MAX` wrap, matching unsigned enums.
pub fn parse_int_literal(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negated, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest.trim()),
        None => (false, s),
    };
    let s = s.trim_end_matches(['u', 'U', 'l', 'L']);

    let magnitude = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(octal) = s.strip_prefix('0') {
        if octal.is_empty() {
            0
        } else if octal.chars().all(|c| c.is_ascii_digit()) {
            u64::from_str_radix(octal, 8).ok()?
        } else {
            return None;
        }
    } else if let Ok(v) = s.parse::<u64>() {
        v
    } else {
        return None;
    };

    let value = magnitude as i64;
    Some(if negated { value.wrapping_neg() } else { value })
}
