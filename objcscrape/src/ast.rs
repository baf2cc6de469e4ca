//! Declaration tree: the subset of clang's `-ast-dump=json` output the
//! extractor reads.
//!
//! clang delta-encodes source locations: a location only carries `file` when
//! it differs from the previously printed location, and only carries `line`
//! when the file or the line changed. Both are tracked across the *whole*
//! document, including nodes we later throw away, so [`DeclarationTree::new`]
//! resolves every location to an absolute [`Anchor`] in one ordered walk
//! before it discards irrelevant top-level nodes.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Top-level node kinds the extractor consumes. Everything else is dropped
/// right after anchoring.
pub const RELEVANT_KINDS: &[&str] = &[
    "ObjCInterfaceDecl",
    "ObjCCategoryDecl",
    "ObjCProtocolDecl",
    "EnumDecl",
    "TypedefDecl",
    "RecordDecl",
    "VarDecl",
];

/// A `type`/`returnType` object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualType {
    #[serde(default)]
    pub qual_type: String,
    #[serde(default)]
    pub desugared_qual_type: Option<String>,
    /// Id of the typedef this type names, when it is a typedef type.
    #[serde(default)]
    pub type_alias_decl_id: Option<String>,
}

/// A bare reference to another declaration (`super`, `decl`, `ownedTagDecl`, …).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeclRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// One serialized source location, possibly split into spelling/expansion
/// halves for macro locations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLoc {
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub spelling_loc: Option<Box<SourceLoc>>,
    #[serde(default)]
    pub expansion_loc: Option<Box<SourceLoc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceRange {
    #[serde(default)]
    pub begin: SourceLoc,
    #[serde(default)]
    pub end: SourceLoc,
}

/// Absolute position of a node after delta decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub file: Arc<str>,
    pub line: u32,
    /// Last line of the node's range in the same file (>= `line`).
    pub end_line: u32,
}

/// A node of the declaration tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub loc: Option<SourceLoc>,
    #[serde(default)]
    pub range: Option<SourceRange>,
    #[serde(default, rename = "type")]
    pub ty: Option<QualType>,
    #[serde(default)]
    pub inner: Vec<AstNode>,

    #[serde(default)]
    pub is_implicit: bool,
    #[serde(default)]
    pub tag_used: Option<String>,
    #[serde(default)]
    pub complete_definition: bool,
    #[serde(default)]
    pub storage_class: Option<String>,
    /// Literal/constant value. clang prints most as strings but some as numbers.
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub opcode: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub message: Option<String>,

    // Objective-C specifics
    #[serde(default)]
    pub instance: bool,
    #[serde(default)]
    pub return_type: Option<QualType>,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub class: bool,
    #[serde(default, rename = "super")]
    pub superclass: Option<DeclRef>,
    #[serde(default)]
    pub protocols: Vec<DeclRef>,
    #[serde(default)]
    pub interface: Option<DeclRef>,

    // References
    #[serde(default)]
    pub decl: Option<DeclRef>,
    #[serde(default)]
    pub owned_tag_decl: Option<DeclRef>,
    #[serde(default)]
    pub referenced_decl: Option<DeclRef>,
    #[serde(default)]
    pub fixed_underlying_type: Option<QualType>,

    /// Filled in by the anchoring pass; never present in the JSON.
    #[serde(skip)]
    pub anchor: Option<Anchor>,
}

impl AstNode {
    /// Non-empty name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }

    pub fn qual_type(&self) -> Option<&str> {
        self.ty.as_ref().map(|t| t.qual_type.as_str())
    }

    pub fn children<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a AstNode> + 'a {
        self.inner.iter().filter(move |c| c.kind == kind)
    }

    pub fn has_child(&self, kind: &str) -> bool {
        self.inner.iter().any(|c| c.kind == kind)
    }

    /// Literal value as text, whatever JSON type clang chose for it.
    pub fn value_str(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            _ => None,
        }
    }

    /// Text of an attached structural documentation comment, flattened to a
    /// single line.
    pub fn comment_text(&self) -> Option<String> {
        let full = self.inner.iter().find(|c| c.kind == "FullComment")?;
        let mut parts = Vec::new();
        collect_comment_text(full, &mut parts);
        let joined = parts.join(" ");
        let normalized = joined.split_whitespace().collect::<Vec<_>>().join(" ");
        (!normalized.is_empty()).then_some(normalized)
    }

    /// Structural `deprecated` attribute, with its message when clang kept one.
    pub fn deprecated_attr(&self) -> Option<Option<String>> {
        self.inner
            .iter()
            .find(|c| c.kind == "DeprecatedAttr")
            .map(|attr| attr.message.clone().filter(|m| !m.is_empty()))
    }
}

fn collect_comment_text(node: &AstNode, out: &mut Vec<String>) {
    if node.kind == "TextComment"
        && let Some(text) = &node.text
    {
        out.push(text.trim().to_string());
    }
    for child in &node.inner {
        collect_comment_text(child, out);
    }
}

/// Running "last printed location" state, mirroring clang's serializer.
#[derive(Debug, Default)]
pub struct LocationTracker {
    file: Option<Arc<str>>,
    line: u32,
}

impl LocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn bare(&mut self, loc: &SourceLoc) -> Option<(Arc<str>, u32)> {
        if let Some(file) = &loc.file {
            if self.file.as_deref() != Some(file.as_str()) {
                self.file = Some(Arc::from(file.as_str()));
            }
        }
        if let Some(line) = loc.line {
            self.line = line;
        }
        if loc.offset.is_none() && loc.file.is_none() && loc.line.is_none() {
            // Invalid location: clang printed nothing, so nothing changes.
            return None;
        }
        self.file.clone().map(|f| (f, self.line))
    }

    /// Consume one location (spelling half before expansion half) and return
    /// the resolved expansion position.
    pub fn observe(&mut self, loc: &SourceLoc) -> Option<(Arc<str>, u32)> {
        match (&loc.spelling_loc, &loc.expansion_loc) {
            (None, None) => self.bare(loc),
            (spelling, expansion) => {
                let spelled = spelling.as_deref().and_then(|s| self.bare(s));
                let expanded = expansion.as_deref().and_then(|e| self.bare(e));
                expanded.or(spelled)
            }
        }
    }

    /// Resolve every location under `node` in document order.
    pub fn anchor(&mut self, node: &mut AstNode) {
        let at = node.loc.as_ref().and_then(|loc| self.observe(loc));
        let (begin, end) = match &node.range {
            Some(range) => (self.observe(&range.begin), self.observe(&range.end)),
            None => (None, None),
        };
        let start = at.or(begin);
        node.anchor = match start {
            Some((file, line)) => {
                let end_line = match end {
                    Some((end_file, end_line)) if end_file == file && end_line >= line => end_line,
                    _ => line,
                };
                Some(Anchor {
                    file,
                    line,
                    end_line,
                })
            }
            // Nodes without a location of their own sit where the walk is.
            None => self.file.clone().map(|file| Anchor {
                file,
                line: self.line,
                end_line: self.line,
            }),
        };
        for child in &mut node.inner {
            self.anchor(child);
        }
    }
}

/// A filtered, anchored declaration tree for one compilation unit.
#[derive(Debug, Default)]
pub struct DeclarationTree {
    /// Relevant top-level declarations in document order.
    pub decls: Vec<AstNode>,
}

impl DeclarationTree {
    /// Anchor every location of `root`, then keep only the top-level node
    /// kinds in [`RELEVANT_KINDS`].
    pub fn new(root: AstNode) -> Self {
        let mut tracker = LocationTracker::new();
        let total = root.inner.len();
        let decls: Vec<AstNode> = root
            .inner
            .into_iter()
            .filter_map(|mut node| {
                tracker.anchor(&mut node);
                RELEVANT_KINDS
                    .contains(&node.kind.as_str())
                    .then_some(node)
            })
            .collect();
        debug!(total, kept = decls.len(), "filtered declaration tree");
        Self { decls }
    }

    /// Parse clang's JSON output. Deeply nested constant expressions are
    /// common in option enums, so serde_json's recursion limit is lifted.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let mut de = serde_json::Deserializer::from_slice(bytes);
        de.disable_recursion_limit();
        let root = AstNode::deserialize(&mut de)?;
        de.end()?;
        Ok(Self::new(root))
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}
