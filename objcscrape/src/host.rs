//! Host-language types: what the resolver produces and the emitter prints.
//!
//! The host language is statically typed with structural unions and
//! nullable optionals (`T | null`).

use std::fmt;

/// Opaque handle for any native object the host cannot type more precisely.
pub const OPAQUE_OBJECT: &str = "NobjcObject";

/// Fixed-size byte buffer used for raw byte pointers.
pub const BUFFER: &str = "Uint8Array";

/// A resolved host-language type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostType {
    Void,
    Boolean,
    Number,
    String,
    /// Opaque native object (`NobjcObject`): the universal fallback.
    Object,
    Buffer,
    Class(String),
    Protocol(String),
    Enum(String),
    Struct(String),
    Function {
        params: Vec<HostParam>,
        returns: Box<HostType>,
    },
    Union(Vec<HostType>),
    Optional(Box<HostType>),
}

/// A named parameter of a function type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostParam {
    pub name: String,
    pub ty: HostType,
}

/// Kind of record a named host type points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Class,
    Protocol,
    Enum,
    Struct,
}

impl HostType {
    /// Wrap in an optional unless already optional (or void).
    pub fn optional(self) -> HostType {
        match self {
            HostType::Optional(_) | HostType::Void => self,
            other => HostType::Optional(Box::new(other)),
        }
    }

    /// Union of `members`, flattened, de-duplicated and sorted. A single
    /// member collapses to itself; no members yields the opaque object.
    pub fn union(members: impl IntoIterator<Item = HostType>) -> HostType {
        let mut flat = Vec::new();
        for m in members {
            match m {
                HostType::Union(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        flat.sort();
        flat.dedup();
        match flat.len() {
            0 => HostType::Object,
            1 => flat.remove(0),
            _ => HostType::Union(flat),
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, HostType::Function { .. })
    }

    /// Every named record reference inside this type, in order.
    pub fn references(&self) -> Vec<(RefKind, &str)> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<(RefKind, &'a str)>) {
        match self {
            HostType::Class(n) => out.push((RefKind::Class, n)),
            HostType::Protocol(n) => out.push((RefKind::Protocol, n)),
            HostType::Enum(n) => out.push((RefKind::Enum, n)),
            HostType::Struct(n) => out.push((RefKind::Struct, n)),
            HostType::Function { params, returns } => {
                for p in params {
                    p.ty.collect_references(out);
                }
                returns.collect_references(out);
            }
            HostType::Union(members) => {
                for m in members {
                    m.collect_references(out);
                }
            }
            HostType::Optional(inner) => inner.collect_references(out),
            _ => {}
        }
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Void => f.write_str("void"),
            HostType::Boolean => f.write_str("boolean"),
            HostType::Number => f.write_str("number"),
            HostType::String => f.write_str("string"),
            HostType::Object => f.write_str(OPAQUE_OBJECT),
            HostType::Buffer => f.write_str(BUFFER),
            HostType::Class(n)
            | HostType::Protocol(n)
            | HostType::Enum(n)
            | HostType::Struct(n) => f.write_str(n),
            HostType::Function { params, returns } => {
                f.write_str("(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", p.name, p.ty)?;
                }
                write!(f, ") => {returns}")
            }
            HostType::Union(members) => {
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    if m.is_function() {
                        write!(f, "({m})")?;
                    } else {
                        write!(f, "{m}")?;
                    }
                }
                Ok(())
            }
            // `(() => void) | null`, never `() => void | null`.
            HostType::Optional(inner) if inner.is_function() => write!(f, "({inner}) | null"),
            HostType::Optional(inner) => write!(f, "{inner} | null"),
        }
    }
}
