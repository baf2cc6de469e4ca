//! Raw header text access.
//!
//! The declaration tree does not reliably carry deprecation macros, plain
//! (non-doc) comments or the parameter names of block types, and in a merged
//! compilation unit structural attributes can be ambiguous about where they
//! came from. This module recovers them from the header lines around a
//! declaration.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::trace;

use crate::model::Deprecation;
use crate::typetext::{find_block_caret, group_open, matching_close, param_name_of, split_top_level};

/// Deprecation macros carrying a quoted message (or replacement) as their
/// first argument.
static DEPRECATED_WITH_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\b(API_DEPRECATED_WITH_REPLACEMENT|API_DEPRECATED|__API_DEPRECATED_MSG\w*|__deprecated_msg|DEPRECATED_MSG_ATTRIBUTE|deprecated)\s*\(\s*"((?:[^"\\]|\\.)*)""#,
    )
    .expect("deprecation message pattern is valid")
});

/// Deprecation macros without (or with unquoted) arguments.
static DEPRECATED_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:API_DEPRECATED\w*|__API_DEPRECATED\w*|NS_DEPRECATED\w*|NS_CLASS_DEPRECATED\w*|NS_ENUM_DEPRECATED\w*|CF_DEPRECATED\w*|DEPRECATED_ATTRIBUTE|DEPRECATED_MSG_ATTRIBUTE|__deprecated(?:_msg)?)\b|__attribute__\s*\(\(\s*deprecated",
    )
    .expect("deprecation marker pattern is valid")
});

/// A line holding nothing but attribute/availability macros.
static MACRO_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Z_][A-Z0-9_]*(?:\s*\(.*\))?\s*)+$").expect("macro line pattern is valid")
});

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\*.*?\*/").expect("block comment pattern is valid"));

static HEADERDOC_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(?:abstract|brief|discussion|description)\b|@(?:const|constant|enum|typedef|class|protocol|property|method|struct)\b(?:\s+[A-Za-z_]\w*:?)?")
        .expect("headerdoc tag pattern is valid")
});

/// Lines scanned past the start of a member declaration.
const MAX_DECL_SPAN: u32 = 12;

/// Lazily-loaded header lines, one cache per worker.
#[derive(Debug, Default)]
pub struct SourceCache {
    files: HashMap<Arc<str>, Option<Arc<Vec<String>>>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register in-memory contents for `file` (used for synthetic units).
    pub fn insert(&mut self, file: &str, text: &str) {
        let lines = text.lines().map(str::to_string).collect();
        self.files.insert(Arc::from(file), Some(Arc::new(lines)));
    }

    /// All lines of `file`, or `None` if it cannot be read.
    pub fn lines(&mut self, file: &str) -> Option<Arc<Vec<String>>> {
        if let Some(cached) = self.files.get(file) {
            return cached.clone();
        }
        let loaded: Option<Arc<Vec<String>>> = std::fs::read(file).ok().map(|bytes| {
            Arc::new(
                String::from_utf8_lossy(&bytes)
                    .lines()
                    .map(str::to_string)
                    .collect(),
            )
        });
        if loaded.is_none() {
            trace!(file, "header text unavailable");
        }
        self.files.insert(Arc::from(file), loaded.clone());
        loaded
    }

    /// 1-based line lookup.
    pub fn line(&mut self, file: &str, line: u32) -> Option<String> {
        let lines = self.lines(file)?;
        line.checked_sub(1).and_then(|i| lines.get(i as usize)).cloned()
    }

    /// Scan the declaration's own lines (`line..=end_line`, capped) plus a
    /// preceding macro-only line for deprecation markers.
    pub fn deprecation_near(&mut self, file: &str, line: u32, end_line: u32) -> Deprecation {
        let Some(lines) = self.lines(file) else {
            return Deprecation::none();
        };
        let last = end_line.clamp(line, line + MAX_DECL_SPAN);
        let mut window = Vec::new();
        if line > 1
            && let Some(prev) = lines.get(line as usize - 2)
        {
            let code = strip_comments(prev);
            if !code.is_empty() && MACRO_LINE.is_match(&code) {
                window.push(code);
            }
        }
        for n in line..=last {
            if let Some(text) = n.checked_sub(1).and_then(|i| lines.get(i as usize)) {
                window.push(strip_comments(text));
            }
        }
        let text = window.join(" ");
        scan_deprecation(&text)
    }

    /// Documentation comment immediately above `line`: a block comment or a
    /// contiguous run of line comments, skipping blank and macro-only lines.
    pub fn doc_comment_before(&mut self, file: &str, line: u32) -> Option<String> {
        let lines = self.lines(file)?;
        let mut idx = (line as usize).checked_sub(2)?;
        loop {
            let trimmed = lines.get(idx)?.trim();
            if trimmed.is_empty() || MACRO_LINE.is_match(trimmed) {
                idx = idx.checked_sub(1)?;
                continue;
            }
            break;
        }

        let trimmed = lines[idx].trim();
        if trimmed.ends_with("*/") {
            let mut start = idx;
            while !lines[start].contains("/*") {
                start = start.checked_sub(1)?;
            }
            let opener = &lines[start];
            let before = &opener[..opener.find("/*")?];
            if !before.trim().is_empty() {
                // A trailing comment of some earlier code line, not a doc block.
                return None;
            }
            let block = lines[start..=idx].join("\n");
            return normalize_comment(&block);
        }

        if trimmed.starts_with("//") {
            let mut start = idx;
            while start > 0 && lines[start - 1].trim().starts_with("//") {
                start -= 1;
            }
            let block = lines[start..=idx].join("\n");
            return normalize_comment(&block);
        }

        None
    }

    /// Comment trailing the code on `line` (`NSFooBar = 1, // the bar`).
    pub fn trailing_comment(&mut self, file: &str, line: u32) -> Option<String> {
        let text = self.line(file, line)?;
        let start = code_comment_start(&text)?;
        if text[..start].trim().is_empty() {
            return None;
        }
        normalize_comment(&text[start..])
    }

    /// Parameter names of every `(^)(…)` block signature spelled in the
    /// declaration's lines, in order of appearance.
    pub fn block_param_names(&mut self, file: &str, line: u32, end_line: u32) -> Vec<Vec<Option<String>>> {
        let Some(lines) = self.lines(file) else {
            return Vec::new();
        };
        let last = end_line.clamp(line, line + MAX_DECL_SPAN);
        let text = (line..=last)
            .filter_map(|n| n.checked_sub(1).and_then(|i| lines.get(i as usize)))
            .map(|l| strip_comments(l))
            .collect::<Vec<_>>()
            .join(" ");
        block_signatures(&text)
    }
}

/// Deprecation markers found anywhere in `text`.
pub fn scan_deprecation(text: &str) -> Deprecation {
    if let Some(caps) = DEPRECATED_WITH_MESSAGE.captures(text) {
        let macro_name = caps.get(1).map_or("", |m| m.as_str());
        let raw = caps.get(2).map_or("", |m| m.as_str()).trim();
        let message = if raw.is_empty() {
            None
        } else if macro_name == "API_DEPRECATED_WITH_REPLACEMENT" {
            Some(format!("Use {raw} instead"))
        } else {
            Some(raw.replace("\\\"", "\""))
        };
        return Deprecation {
            deprecated: true,
            message,
        };
    }
    Deprecation {
        deprecated: DEPRECATED_MARKER.is_match(text),
        message: None,
    }
}

/// Names declared in each block signature of `text`.
pub fn block_signatures(text: &str) -> Vec<Vec<Option<String>>> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(caret) = find_block_caret(rest) {
        let Some(open) = group_open(rest, caret) else {
            break;
        };
        let Some(close) = matching_close(rest, open) else {
            break;
        };
        let after = &rest[close + 1..];
        let args_open = after.len() - after.trim_start().len();
        if !after[args_open..].starts_with('(') {
            rest = after;
            continue;
        }
        let Some(args_close) = matching_close(after, args_open) else {
            break;
        };
        let params = &after[args_open + 1..args_close];
        let names = split_top_level(params)
            .iter()
            .filter(|p| p.as_str() != "void")
            .map(|p| param_name_of(p))
            .collect();
        out.push(names);
        rest = &after[args_close + 1..];
    }
    out
}

/// Strip comment delimiters and leading markers, drop headerdoc tags, and
/// collapse the result to one line.
pub fn normalize_comment(block: &str) -> Option<String> {
    let mut parts = Vec::new();
    for raw in block.lines() {
        let mut l = raw.trim();
        for prefix in ["/**<", "///<", "//!<", "/*!<", "/**", "/*!", "/*", "///", "//!", "//"] {
            if let Some(stripped) = l.strip_prefix(prefix) {
                l = stripped;
                break;
            }
        }
        let l = l.trim_end();
        let l = l.strip_suffix("*/").unwrap_or(l).trim();
        let l = l.trim_start_matches('*').trim();
        if !l.is_empty() {
            parts.push(l.to_string());
        }
    }
    let joined = parts.join(" ");
    let cleaned = HEADERDOC_TAG.replace_all(&joined, "");
    let normalized = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    (!normalized.is_empty()).then_some(normalized)
}

/// Remove `/* … */` spans and any `//` tail from a single line.
fn strip_comments(line: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(line, " ");
    match code_comment_start(&without_blocks) {
        Some(i) => without_blocks[..i].trim().to_string(),
        None => without_blocks.trim().to_string(),
    }
}

/// Start of a `//` or `/*` comment outside string literals.
fn code_comment_start(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if in_string => i += 1,
            b'"' => in_string = !in_string,
            b'/' if !in_string && matches!(bytes.get(i + 1), Some(b'/') | Some(b'*')) => {
                return Some(i);
            }
            _ => {}
        }
        i += 1;
    }
    None
}
