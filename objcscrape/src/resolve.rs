//! Type resolution: raw Objective-C type spellings → host-language types.
//!
//! [`ResolutionContext`] is built once, after every batch has been merged,
//! and is read-only from then on. Resolution is a pure function of the
//! context and its inputs, so it needs no locking and always terminates:
//! typedef chains carry an explicit visited set and a repeat visit simply
//! falls through to the next rule.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::{debug, trace};

use crate::conformance::{ConformerMap, build_conformer_map};
use crate::host::{HostParam, HostType};
use crate::model::{Model, StructDecl};
use crate::typetext::{
    find_block_caret, find_function_pointer, group_open, is_identifier, is_top_level_nullable,
    matching_close, outer_angle_free, param_name_of, split_top_level, strip_annotations,
};

/// Largest conformer set a single-protocol return type is narrowed to.
pub const CONFORMER_UNION_LIMIT: usize = 30;

/// Where a type appears. Returns may be narrowed to known conformers;
/// parameters always accept the protocol type itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Return,
    Parameter,
}

/// Exact spellings with a direct host mapping.
const DIRECT: &[(&str, HostType)] = &[
    ("void", HostType::Void),
    ("BOOL", HostType::Boolean),
    ("bool", HostType::Boolean),
    ("_Bool", HostType::Boolean),
    ("Boolean", HostType::Boolean),
    ("SEL", HostType::String),
    ("char *", HostType::String),
    ("id", HostType::Object),
    ("Class", HostType::Object),
    ("IMP", HostType::Object),
    ("Protocol *", HostType::Object),
];

/// Spellings that map to the host's number type.
const NUMERIC: &[&str] = &[
    "char", "signed char", "unsigned char", "short", "unsigned short", "int", "unsigned int",
    "unsigned", "signed", "long", "unsigned long", "long long", "unsigned long long", "float",
    "double", "long double", "NSInteger", "NSUInteger", "CGFloat", "NSTimeInterval", "CFIndex",
    "CFTimeInterval", "OSStatus", "OSType", "FourCharCode", "unichar", "UniChar", "UTF32Char",
    "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t", "uint64_t",
    "UInt8", "UInt16", "UInt32", "UInt64", "SInt8", "SInt16", "SInt32", "SInt64", "Float32",
    "Float64", "size_t", "ssize_t", "intptr_t", "uintptr_t", "ptrdiff_t", "NSStringEncoding",
];

/// Pointees whose pointer is a raw byte buffer.
const BYTE_POINTEES: &[&str] = &["uint8_t", "unsigned char", "UInt8", "Byte", "char"];

/// Conventional lightweight-generic parameter names.
const GENERIC_PLACEHOLDERS: &[&str] = &[
    "ObjectType",
    "KeyType",
    "ValueType",
    "ElementType",
    "ResultType",
    "SectionIdentifierType",
    "ItemIdentifierType",
    "UnitType",
    "AnchorType",
];

/// Host-language reserved words that cannot be parameter names.
const RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "enum", "export", "extends", "false", "finally", "for", "function", "if",
    "import", "in", "instanceof", "new", "null", "return", "super", "switch", "this", "throw",
    "true", "try", "typeof", "var", "void", "while", "with", "as", "implements", "interface",
    "let", "package", "private", "protected", "public", "static", "yield", "any", "boolean",
    "number", "string", "symbol", "type", "from", "of",
];

/// A struct with resolved field types and recovered field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostStruct {
    pub name: String,
    pub internal_name: Option<String>,
    pub fields: Vec<HostParam>,
}

/// Shared, read-only lookup tables for type resolution.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    /// Parsed class name → lightweight generic parameter names.
    classes: HashMap<String, Vec<String>>,
    protocols: HashSet<String>,
    integer_enums: HashSet<String>,
    string_enums: HashSet<String>,
    structs: HashMap<String, StructDecl>,
    /// Internal record name → public struct name.
    internal_structs: HashMap<String, String>,
    struct_aliases: HashMap<String, String>,
    typedefs: HashMap<String, String>,
    /// Parameter names declared on block typedefs.
    block_typedefs: HashMap<String, Vec<Option<String>>>,
    conformers: ConformerMap,
    field_names: HashMap<String, Vec<String>>,
}

impl ResolutionContext {
    /// Build the context from merged, parsed records. Only parsed records
    /// become "known"; names that were requested but never parsed resolve to
    /// the opaque object type.
    pub fn from_model(model: &Model, field_names: HashMap<String, Vec<String>>) -> Self {
        let conformers = build_conformer_map(&model.classes, &model.protocols);
        Self::new(model, conformers, field_names)
    }

    pub fn new(
        model: &Model,
        conformers: ConformerMap,
        field_names: HashMap<String, Vec<String>>,
    ) -> Self {
        let internal_structs = model
            .structs
            .values()
            .filter_map(|s| s.internal_name.clone().map(|internal| (internal, s.name.clone())))
            .collect();
        let ctx = Self {
            classes: model
                .classes
                .values()
                .map(|c| (c.name.clone(), c.type_params.clone()))
                .collect(),
            protocols: model.protocols.keys().cloned().collect(),
            integer_enums: model.integer_enums.keys().cloned().collect(),
            string_enums: model.string_enums.keys().cloned().collect(),
            structs: model.structs.clone().into_iter().collect(),
            internal_structs,
            struct_aliases: model.struct_aliases.clone().into_iter().collect(),
            typedefs: model.typedefs.clone().into_iter().collect(),
            block_typedefs: model.block_typedefs.clone().into_iter().collect(),
            conformers,
            field_names,
        };
        debug!(
            classes = ctx.classes.len(),
            protocols = ctx.protocols.len(),
            enums = ctx.integer_enums.len() + ctx.string_enums.len(),
            structs = ctx.structs.len(),
            typedefs = ctx.typedefs.len(),
            "built resolution context"
        );
        ctx
    }

    pub fn is_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn is_protocol(&self, name: &str) -> bool {
        self.protocols.contains(name)
    }

    pub fn is_enum(&self, name: &str) -> bool {
        self.integer_enums.contains(name) || self.string_enums.contains(name)
    }

    pub fn is_struct(&self, name: &str) -> bool {
        self.structs.contains_key(name)
    }

    pub fn conformers(&self, protocol: &str) -> Option<&BTreeSet<String>> {
        self.conformers.get(protocol)
    }

    /// Resolve `raw` as it appears inside `containing` (a class or protocol
    /// name, used for `instancetype` and generic parameters).
    pub fn resolve_type(&self, raw: &str, containing: &str, position: Position) -> HostType {
        self.resolve_type_with_names(raw, containing, position, &[])
    }

    /// Like [`resolve_type`](Self::resolve_type), with parameter names the
    /// header declared for a block type's parameters.
    pub fn resolve_type_with_names(
        &self,
        raw: &str,
        containing: &str,
        position: Position,
        block_names: &[Option<String>],
    ) -> HostType {
        let mut visited = Vec::new();
        self.resolve(raw, containing, position, block_names, &mut visited)
    }

    fn resolve(
        &self,
        raw: &str,
        containing: &str,
        position: Position,
        block_names: &[Option<String>],
        visited: &mut Vec<String>,
    ) -> HostType {
        let nullable = is_top_level_nullable(raw);
        let ty = self.resolve_nonnull(raw, containing, position, block_names, visited);
        trace!(raw, resolved = %ty, nullable, "resolved type");
        if nullable { ty.optional() } else { ty }
    }

    fn resolve_nonnull(
        &self,
        raw: &str,
        containing: &str,
        position: Position,
        block_names: &[Option<String>],
        visited: &mut Vec<String>,
    ) -> HostType {
        // 1. Annotations never change identity.
        let cleaned = strip_annotations(raw);
        let bare = strip_const(&cleaned);
        let name = strip_tag(&bare);

        // 2. Direct mappings.
        if let Some((_, ty)) = DIRECT.iter().find(|(spelling, _)| *spelling == bare) {
            return ty.clone();
        }

        // 3. Numbers.
        if NUMERIC.contains(&name) {
            return HostType::Number;
        }

        // 4. Generic placeholders are erased at the native boundary.
        let pointee = name.strip_suffix(" *").unwrap_or(name);
        if GENERIC_PLACEHOLDERS.contains(&pointee)
            || self
                .classes
                .get(containing)
                .is_some_and(|params| params.iter().any(|p| p == pointee))
        {
            return HostType::Object;
        }

        // 5. The containing declaration's own type.
        if name == "instancetype" {
            return self.self_type(containing);
        }

        // 6. Structs by value.
        if let Some(ty) = self.struct_type(name) {
            return ty;
        }

        // 7. Blocks.
        if find_block_caret(raw).is_some() {
            if let Some(ty) = self.resolve_block(raw, containing, block_names, visited) {
                return ty;
            }
            return HostType::Object;
        }

        // 8. Function pointers, out-parameters and raw pointers.
        if find_function_pointer(&cleaned).is_some() || bare.ends_with("**") {
            return HostType::Object;
        }
        if let Some(pointee) = bare.strip_suffix(" *") {
            let pointee = pointee.trim();
            if pointee == "void" {
                return HostType::Object;
            }
            if BYTE_POINTEES.contains(&pointee) || NUMERIC.contains(&pointee) {
                return HostType::Buffer;
            }
        }

        // 9. Object pointers, with or without generic arguments.
        if let Some(pointee) = bare.strip_suffix('*') {
            let base = outer_angle_free(pointee);
            let base = base.trim();
            if base != "id" {
                if self.is_class(base) {
                    return HostType::Class(base.to_string());
                }
                if base.is_empty() || is_identifier(base) {
                    return HostType::Object;
                }
            }
        }

        // 10. Enums keep their own type.
        if self.is_enum(name) {
            return HostType::Enum(name.to_string());
        }

        // 11. Typedef chains.
        if let Some(underlying) = self.typedefs.get(name) {
            if visited.iter().any(|v| v == name) {
                trace!(name, "typedef cycle, falling through");
            } else {
                // Names at the use site win over the typedef's own.
                let names = match self.block_typedefs.get(name) {
                    Some(declared) if block_names.iter().all(Option::is_none) => declared.as_slice(),
                    _ => block_names,
                };
                visited.push(name.to_string());
                let ty = self.resolve(underlying, containing, position, names, visited);
                visited.pop();
                return ty;
            }
        }

        // 12. Protocol existentials.
        if let Some(list) = name.strip_prefix("id<").and_then(|rest| rest.strip_suffix('>')) {
            let protocols = split_top_level(list);
            return self.existential(&protocols, position);
        }

        // 13. Arrays.
        if name.contains('[') {
            return HostType::Object;
        }

        // 14. Anything else.
        trace!(raw, "unresolvable type, using opaque object");
        HostType::Object
    }

    fn self_type(&self, containing: &str) -> HostType {
        if self.is_class(containing) {
            HostType::Class(containing.to_string())
        } else if self.is_protocol(containing) {
            HostType::Protocol(containing.to_string())
        } else {
            HostType::Object
        }
    }

    /// Public struct type for a name, following internal names and aliases.
    fn struct_type(&self, name: &str) -> Option<HostType> {
        self.public_struct_name(name).map(HostType::Struct)
    }

    fn public_struct_name(&self, name: &str) -> Option<String> {
        let mut current = name;
        let mut seen = HashSet::new();
        loop {
            if self.structs.contains_key(current) {
                return Some(current.to_string());
            }
            if let Some(public) = self.internal_structs.get(current) {
                return Some(public.clone());
            }
            if !seen.insert(current) {
                return None;
            }
            current = self.struct_aliases.get(current)?;
        }
    }

    /// `R (^)(A, B)` → `(a: A, b: B) => R`. Callback parameters flow into the
    /// host like return values do, and the callback's result flows back into
    /// native code like an argument.
    fn resolve_block(
        &self,
        raw: &str,
        containing: &str,
        block_names: &[Option<String>],
        visited: &mut Vec<String>,
    ) -> Option<HostType> {
        let caret = find_block_caret(raw)?;
        let open = group_open(raw, caret)?;
        let close = matching_close(raw, open)?;
        let after = &raw[close + 1..];
        let args_open = after.find('(')?;
        let args_close = matching_close(after, args_open)?;

        let return_spelling = raw[..open].trim();
        let returns = self.resolve(return_spelling, containing, Position::Parameter, &[], visited);

        let mut params = Vec::new();
        let mut used = HashSet::new();
        let spelled = split_top_level(&after[args_open + 1..args_close]);
        let spelled: Vec<&String> = spelled.iter().filter(|p| p.as_str() != "void").collect();
        for (i, param) in spelled.into_iter().enumerate() {
            let embedded = param_name_of(param);
            let declared = block_names.get(i).cloned().flatten();
            let type_spelling = match &embedded {
                Some(n) => remove_param_name(param, n),
                None => param.clone(),
            };
            let name = declared
                .or(embedded)
                .unwrap_or_else(|| format!("arg{i}"));
            let mut name = sanitize_param_name(&name);
            while !used.insert(name.clone()) {
                name = format!("{name}{i}");
            }
            let ty = self.resolve(&type_spelling, containing, Position::Return, &[], visited);
            params.push(HostParam { name, ty });
        }

        Some(HostType::Function {
            params,
            returns: Box::new(returns),
        })
    }

    /// `id<P, Q>` in the given position.
    fn existential(&self, protocols: &[String], position: Position) -> HostType {
        if position == Position::Return
            && let [single] = protocols
            && let Some(conformers) = self.conformers.get(single.as_str())
            && !conformers.is_empty()
            && conformers.len() <= CONFORMER_UNION_LIMIT
        {
            let concrete: Vec<HostType> = conformers
                .iter()
                .filter(|c| self.is_class(c))
                .map(|c| HostType::Class(c.clone()))
                .collect();
            if !concrete.is_empty() {
                return HostType::union(concrete);
            }
        }

        let interfaces = protocols.iter().filter_map(|p| {
            let p = p.trim();
            if self.is_protocol(p) {
                Some(HostType::Protocol(p.to_string()))
            } else if self.is_class(p) {
                // Root protocols are folded into their same-named class.
                Some(HostType::Class(p.to_string()))
            } else {
                None
            }
        });
        HostType::union(interfaces)
    }

    /// Resolve a struct's fields, naming them from the field-name table when
    /// its entry has exactly as many names as the struct has fields.
    pub fn resolve_struct(&self, name: &str) -> Option<HostStruct> {
        let public = self.public_struct_name(name)?;
        let decl = self.structs.get(&public)?;
        let table = self
            .field_names
            .get(&public)
            .or_else(|| decl.internal_name.as_ref().and_then(|n| self.field_names.get(n)))
            .filter(|names| names.len() == decl.fields.len());
        if table.is_none() && self.field_names.contains_key(&public) {
            debug!(name = %public, "field-name table entry does not match field count, keeping positional names");
        }

        let fields = decl
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| HostParam {
                name: table.map_or_else(|| f.name.clone(), |names| names[i].clone()),
                ty: self.resolve_type(&f.ty, &public, Position::Return),
            })
            .collect();
        Some(HostStruct {
            name: public,
            internal_name: decl.internal_name.clone(),
            fields,
        })
    }
}

/// Drop `const` qualifiers that do not affect identity.
fn strip_const(s: &str) -> String {
    let tokens: Vec<&str> = s.split(' ').filter(|t| *t != "const").collect();
    let joined = tokens.join(" ");
    joined.replace("*const", "*").trim().to_string()
}

/// Drop a leading `struct`/`enum`/`union` tag keyword.
fn strip_tag(s: &str) -> &str {
    for tag in ["struct ", "enum ", "union "] {
        if let Some(rest) = s.strip_prefix(tag) {
            return rest.trim();
        }
    }
    s
}

/// Remove an embedded parameter name from a parameter spelling.
fn remove_param_name(param: &str, name: &str) -> String {
    if let Some(marker) = find_block_caret(param).or_else(|| find_function_pointer(param))
        && let Some(open) = group_open(param, marker)
        && let Some(close) = matching_close(param, open)
    {
        let group = &param[marker + 1..close];
        let group = group.replacen(name, "", 1);
        return format!("{}{}{}{}", &param[..=marker], group, ")", &param[close + 1..]);
    }
    let trimmed = param.trim_end();
    let without_arrays = match trimmed.find('[') {
        Some(i) => &trimmed[..i],
        None => trimmed,
    };
    without_arrays
        .trim_end()
        .strip_suffix(name)
        .unwrap_or(without_arrays)
        .trim_end()
        .to_string()
}

/// Append `_` to names the host language reserves.
pub fn sanitize_param_name(name: &str) -> String {
    if RESERVED_WORDS.contains(&name) {
        format!("{name}_")
    } else {
        name.to_string()
    }
}
