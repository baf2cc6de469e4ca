//! Resolved model: every extracted declaration with host types attached,
//! ready for an emission stage.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use anyhow::Result;
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::constants::StringConstantResolver;
use crate::host::{HostType, RefKind};
use crate::model::{Coverage, Deprecation, Members, MethodDecl, Model, PropertyDecl};
use crate::resolve::{Position, ResolutionContext, sanitize_param_name};

/// A host type, serialized as its rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType(pub HostType);

impl Serialize for ResolvedType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ResolvedType,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedMethod {
    pub selector: String,
    pub params: Vec<ResolvedParam>,
    pub return_type: ResolvedType,
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ResolvedType,
    pub readonly: bool,
    pub is_class: bool,
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedMembers {
    pub instance_methods: Vec<ResolvedMethod>,
    pub class_methods: Vec<ResolvedMethod>,
    pub properties: Vec<ResolvedProperty>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedClass {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superclass: Option<String>,
    pub protocols: Vec<String>,
    #[serde(flatten)]
    pub members: ResolvedMembers,
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedProtocol {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    pub parents: Vec<String>,
    /// Known classes conforming directly or through protocol extension.
    pub conformers: Vec<String>,
    #[serde(flatten)]
    pub members: ResolvedMembers,
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedEnumConstant {
    pub name: String,
    pub value: i64,
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedIntegerEnum {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    pub underlying: String,
    pub is_bitmask: bool,
    pub constants: Vec<ResolvedEnumConstant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedStringValue {
    pub symbol: String,
    pub name: String,
    /// `None` when the exported value could not be looked up.
    pub value: Option<String>,
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedStringEnum {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    pub values: Vec<ResolvedStringValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedStruct {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_name: Option<String>,
    pub fields: Vec<ResolvedParam>,
}

/// Everything the emission stage consumes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedModel {
    pub classes: Vec<ResolvedClass>,
    pub protocols: Vec<ResolvedProtocol>,
    pub integer_enums: Vec<ResolvedIntegerEnum>,
    pub string_enums: Vec<ResolvedStringEnum>,
    pub structs: Vec<ResolvedStruct>,
    /// Typedef name → public struct it aliases.
    pub struct_aliases: BTreeMap<String, String>,
    pub coverage: Vec<Coverage>,
}

impl ResolvedModel {
    pub fn class(&self, name: &str) -> Option<&ResolvedClass> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn protocol(&self, name: &str) -> Option<&ResolvedProtocol> {
        self.protocols.iter().find(|p| p.name == name)
    }

    pub fn strukt(&self, name: &str) -> Option<&ResolvedStruct> {
        self.structs.iter().find(|s| s.name == name)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// Resolve every type in `model` against `ctx`.
pub fn bind(
    model: &Model,
    ctx: &ResolutionContext,
    constants: &dyn StringConstantResolver,
) -> ResolvedModel {
    let framework_of = |name: &str| model.owners.get(name).cloned();

    let classes = model
        .classes
        .values()
        .map(|c| {
            let (deprecated, deprecation_message) = split_deprecation(&c.deprecation);
            ResolvedClass {
                name: c.name.clone(),
                framework: framework_of(&c.name),
                superclass: c.superclass.clone().filter(|s| ctx.is_class(s)),
                protocols: c
                    .protocols
                    .iter()
                    .filter(|p| ctx.is_protocol(p))
                    .cloned()
                    .collect(),
                members: bind_members(ctx, &c.name, &c.members),
                deprecated,
                deprecation_message,
                doc: c.doc.clone(),
            }
        })
        .collect();

    let protocols = model
        .protocols
        .values()
        .map(|p| {
            let (deprecated, deprecation_message) = split_deprecation(&p.deprecation);
            ResolvedProtocol {
                name: p.name.clone(),
                framework: framework_of(&p.name),
                parents: p
                    .parents
                    .iter()
                    .filter(|parent| ctx.is_protocol(parent))
                    .cloned()
                    .collect(),
                conformers: ctx
                    .conformers(&p.name)
                    .map(|set| set.iter().cloned().collect())
                    .unwrap_or_default(),
                members: bind_members(ctx, &p.name, &p.members),
                deprecated,
                deprecation_message,
                doc: p.doc.clone(),
            }
        })
        .collect();

    let integer_enums = model
        .integer_enums
        .values()
        .map(|e| ResolvedIntegerEnum {
            name: e.name.clone(),
            framework: framework_of(&e.name),
            underlying: e.underlying.clone(),
            is_bitmask: e.is_bitmask,
            constants: e
                .constants
                .iter()
                .map(|c| ResolvedEnumConstant {
                    name: c.name.clone(),
                    value: c.value,
                    deprecated: c.deprecation.deprecated,
                    doc: c.doc.clone(),
                })
                .collect(),
            doc: e.doc.clone(),
        })
        .collect();

    let string_enums = model
        .string_enums
        .values()
        .map(|e| {
            let framework = framework_of(&e.name);
            let binary = framework.as_ref().and_then(|f| model.binaries.get(f));
            let symbols: Vec<&str> = e
                .values
                .iter()
                .filter(|v| v.value.is_none())
                .map(|v| v.symbol.as_str())
                .collect();
            let looked_up = if symbols.is_empty() {
                Default::default()
            } else {
                constants.resolve(binary.map(|b| b.as_path()), &symbols)
            };
            let values = e
                .values
                .iter()
                .map(|v| ResolvedStringValue {
                    symbol: v.symbol.clone(),
                    name: v.short_name.clone(),
                    value: v.value.clone().or_else(|| looked_up.get(&v.symbol).cloned()),
                    deprecated: v.deprecation.deprecated,
                    doc: v.doc.clone(),
                })
                .collect::<Vec<_>>();
            let unresolved = values.iter().filter(|v| v.value.is_none()).count();
            if unresolved > 0 {
                debug!(name = %e.name, unresolved, "string enum members left without values");
            }
            ResolvedStringEnum {
                name: e.name.clone(),
                framework,
                values,
                doc: e.doc.clone(),
            }
        })
        .collect();

    let structs = model
        .structs
        .keys()
        .filter_map(|name| ctx.resolve_struct(name))
        .map(|s| ResolvedStruct {
            name: s.name,
            internal_name: s.internal_name,
            fields: s
                .fields
                .into_iter()
                .map(|f| ResolvedParam {
                    name: f.name,
                    ty: ResolvedType(f.ty),
                })
                .collect(),
        })
        .collect();

    let struct_aliases = model
        .struct_aliases
        .iter()
        .filter(|(_, target)| ctx.is_struct(target))
        .map(|(alias, target)| (alias.clone(), target.clone()))
        .collect();

    ResolvedModel {
        classes,
        protocols,
        integer_enums,
        string_enums,
        structs,
        struct_aliases,
        coverage: model.coverage.clone(),
    }
}

fn split_deprecation(d: &Deprecation) -> (bool, Option<String>) {
    (d.deprecated, d.message.clone())
}

fn bind_members(
    ctx: &ResolutionContext,
    owner: &str,
    members: &Members,
) -> ResolvedMembers {
    ResolvedMembers {
        instance_methods: members
            .instance_methods
            .iter()
            .map(|m| bind_method(ctx, owner, m))
            .collect(),
        class_methods: members
            .class_methods
            .iter()
            .map(|m| bind_method(ctx, owner, m))
            .collect(),
        properties: members
            .properties
            .iter()
            .map(|p| bind_property(ctx, owner, p))
            .collect(),
    }
}

fn bind_method(ctx: &ResolutionContext, owner: &str, m: &MethodDecl) -> ResolvedMethod {
    let return_type = ctx.resolve_type_with_names(
        &m.return_type,
        owner,
        Position::Return,
        &m.return_block_param_names,
    );
    let params = m
        .params
        .iter()
        .map(|p| ResolvedParam {
            name: sanitize_param_name(&p.name),
            ty: ResolvedType(ctx.resolve_type_with_names(
                &p.ty,
                owner,
                Position::Parameter,
                &p.block_param_names,
            )),
        })
        .collect();
    ResolvedMethod {
        selector: m.selector.clone(),
        params,
        return_type: ResolvedType(return_type),
        deprecated: m.deprecation.deprecated,
        deprecation_message: m.deprecation.message.clone(),
        doc: m.doc.clone(),
    }
}

fn bind_property(ctx: &ResolutionContext, owner: &str, p: &PropertyDecl) -> ResolvedProperty {
    ResolvedProperty {
        name: p.name.clone(),
        ty: ResolvedType(ctx.resolve_type_with_names(
            &p.ty,
            owner,
            Position::Return,
            &p.block_param_names,
        )),
        readonly: p.readonly,
        is_class: p.is_class,
        deprecated: p.deprecation.deprecated,
        deprecation_message: p.deprecation.message.clone(),
        doc: p.doc.clone(),
    }
}

// ---------------------------------------------------------------------------
// Cross-reference validation
// ---------------------------------------------------------------------------

/// A single dangling reference with context about where it was found.
struct UnresolvedRef {
    kind: RefKind,
    name: String,
    context: String,
}

/// Verify that every class, protocol, enum and struct named by a resolved
/// type is itself part of the model.
pub fn validate_references(model: &ResolvedModel) -> Result<()> {
    let classes: HashSet<&str> = model.classes.iter().map(|c| c.name.as_str()).collect();
    let protocols: HashSet<&str> = model.protocols.iter().map(|p| p.name.as_str()).collect();
    let enums: HashSet<&str> = model
        .integer_enums
        .iter()
        .map(|e| e.name.as_str())
        .chain(model.string_enums.iter().map(|e| e.name.as_str()))
        .collect();
    let structs: HashSet<&str> = model.structs.iter().map(|s| s.name.as_str()).collect();

    let known = |kind: RefKind, name: &str| match kind {
        RefKind::Class => classes.contains(name),
        RefKind::Protocol => protocols.contains(name),
        RefKind::Enum => enums.contains(name),
        RefKind::Struct => structs.contains(name),
    };

    let mut unresolved = Vec::new();
    let mut check = |ty: &ResolvedType, context: &dyn Fn() -> String| {
        for (kind, name) in ty.0.references() {
            if !known(kind, name) {
                unresolved.push(UnresolvedRef {
                    kind,
                    name: name.to_string(),
                    context: context(),
                });
            }
        }
    };

    for class in &model.classes {
        check_members(&class.name, &class.members, &mut check);
        if let Some(superclass) = &class.superclass
            && !classes.contains(superclass.as_str())
        {
            warn!(class = %class.name, superclass = %superclass, "superclass not in model");
        }
    }
    for protocol in &model.protocols {
        check_members(&protocol.name, &protocol.members, &mut check);
    }
    for s in &model.structs {
        for field in &s.fields {
            check(&field.ty, &|| format!("field `{}` of struct `{}`", field.name, s.name));
        }
    }

    if unresolved.is_empty() {
        return Ok(());
    }

    let mut seen = HashSet::new();
    let mut msg = String::new();
    let mut count = 0usize;
    for r in &unresolved {
        if seen.insert(&r.name) {
            count += 1;
            msg.push_str(&format!(
                "\n  • {:?} `{}` referenced in {}",
                r.kind, r.name, r.context
            ));
        }
    }
    anyhow::bail!("{count} unresolved type reference(s) in resolved model:{msg}");
}

fn check_members(
    owner: &str,
    members: &ResolvedMembers,
    check: &mut impl FnMut(&ResolvedType, &dyn Fn() -> String),
) {
    for m in members.instance_methods.iter().chain(&members.class_methods) {
        check(&m.return_type, &|| {
            format!("return type of `{}` on `{owner}`", m.selector)
        });
        for p in &m.params {
            check(&p.ty, &|| {
                format!("param `{}` of `{}` on `{owner}`", p.name, m.selector)
            });
        }
    }
    for p in &members.properties {
        check(&p.ty, &|| format!("property `{}` on `{owner}`", p.name));
    }
}
