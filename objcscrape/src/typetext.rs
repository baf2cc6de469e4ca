//! Helpers for reading C/Objective-C type spellings as text.
//!
//! clang prints types as strings (`NSArray<NSString *> * _Nullable`,
//! `void (^)(NSError * _Nullable)`), so the resolver and the header scanner
//! both need bracket-aware splitting and a little token knowledge.

use std::sync::LazyLock;

use regex::Regex;

/// Nullability, ownership and availability tokens that never change type
/// identity.
static ANNOTATIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:_Nullable_result|_Nullable|_Nonnull|_Null_unspecified|__nullable|__nonnull|__null_unspecified|nullable|nonnull|null_unspecified|null_resettable|__strong|__weak|__unsafe_unretained|__autoreleasing|__kindof|__covariant|__contravariant|_Atomic|__unused|__block|NS_NOESCAPE|NS_RELEASES_ARGUMENT|NS_VALID_UNTIL_END_OF_SCOPE)\b",
    )
    .expect("annotation pattern is valid")
});

static NULLABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:_Nullable_result|_Nullable|__nullable|nullable)\b")
        .expect("nullable pattern is valid")
});

static IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("ident pattern is valid"));

/// Words that can end a parameter spelling without being its name.
const TYPE_WORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "_Bool",
    "bool", "BOOL", "id", "SEL", "Class", "IMP", "const", "volatile", "restrict", "struct",
    "enum", "union", "instancetype", "_Nullable", "_Nonnull", "_Null_unspecified",
    "_Nullable_result", "__nullable", "__nonnull", "__strong", "__weak", "__autoreleasing",
    "__unsafe_unretained", "__kindof", "nullable", "nonnull",
];

/// Remove annotation tokens and collapse whitespace.
pub fn strip_annotations(raw: &str) -> String {
    let stripped = ANNOTATIONS.replace_all(raw, " ");
    normalize_spaces(&stripped)
}

/// Collapse runs of whitespace and normalize spacing around `*` so that
/// `NSError * *` and `NSError**` both read `NSError **`.
pub fn normalize_spaces(s: &str) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    let chars: Vec<char> = collapsed.chars().collect();
    let mut out = String::with_capacity(collapsed.len());
    for (i, &c) in chars.iter().enumerate() {
        match c {
            ' ' => {
                if chars.get(i + 1) == Some(&'*') || out.ends_with('*') {
                    continue;
                }
                out.push(' ');
            }
            '*' => {
                if let Some(prev) = out.chars().last()
                    && prev != '*'
                    && prev != ' '
                    && prev != '('
                {
                    out.push(' ');
                }
                out.push('*');
            }
            _ => {
                if out.ends_with('*') && (c.is_alphanumeric() || c == '_') {
                    out.push(' ');
                }
                out.push(c);
            }
        }
    }
    out.trim().to_string()
}

/// Whether the outermost level of `raw` carries a nullable annotation.
/// Annotations nested inside `<…>` or inside a block's parameter list belong
/// to those inner types and are ignored.
pub fn is_top_level_nullable(raw: &str) -> bool {
    if let Some(caret) = find_block_caret(raw).or_else(|| find_function_pointer(raw)) {
        // `R (^ _Nullable)(Args)`: only the marker group speaks for the type.
        if let Some(open) = group_open(raw, caret)
            && let Some(close) = matching_close(raw, open)
        {
            return NULLABLE.is_match(&raw[caret + 1..close]);
        }
        return false;
    }
    NULLABLE.is_match(&outer_level(raw))
}

/// `raw` with every bracketed `<…>`/`(…)`/`[…]` group removed.
pub fn outer_level(raw: &str) -> String {
    let mut depth = 0usize;
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Byte index of the `^` of the first top-level `(^…)` group.
pub fn find_block_caret(raw: &str) -> Option<usize> {
    find_group_marker(raw, '^')
}

/// Byte index of the `*` of the first top-level `(*…)` group.
pub fn find_function_pointer(raw: &str) -> Option<usize> {
    find_group_marker(raw, '*')
}

fn find_group_marker(raw: &str, marker: char) -> Option<usize> {
    let bytes = raw.as_bytes();
    let mut angle = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'<' => angle += 1,
            b'>' => angle = angle.saturating_sub(1),
            b'(' if angle == 0 => {
                let rest = raw[i + 1..].trim_start();
                if rest.starts_with(marker) {
                    return Some(raw.len() - rest.len());
                }
            }
            _ => {}
        }
    }
    None
}

/// Index of the `(` that opens the group whose marker sits at `marker`.
pub fn group_open(raw: &str, marker: usize) -> Option<usize> {
    raw[..marker].rfind('(')
}

/// Index of the bracket closing the one at `open`.
pub fn matching_close(s: &str, open: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let (o, c) = match bytes.get(open)? {
        b'(' => (b'(', b')'),
        b'<' => (b'<', b'>'),
        b'[' => (b'[', b']'),
        _ => return None,
    };
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if b == o {
            depth += 1;
        } else if b == c {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split on commas that are not nested in any bracket pair.
pub fn split_top_level(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in s.chars() {
        match c {
            '<' | '(' | '[' => {
                depth += 1;
                current.push(c);
            }
            '>' | ')' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Name embedded in a parameter spelling such as `NSError *error`,
/// `NSInteger count` or `void (^handler)(BOOL)`. `None` when the spelling is
/// a bare type.
pub fn param_name_of(param: &str) -> Option<String> {
    let param = param.trim();
    if param.is_empty() || param == "void" || param == "..." {
        return None;
    }

    // Nested block or function pointer: the name sits inside the marker group.
    if let Some(marker) = find_block_caret(param).or_else(|| find_function_pointer(param)) {
        let close = matching_close(param, group_open(param, marker)?)?;
        let inside = strip_annotations(&param[marker + 1..close]);
        return IDENT.is_match(&inside).then_some(inside);
    }

    let without_arrays = match param.find('[') {
        Some(i) => &param[..i],
        None => param,
    };
    let cleaned = strip_annotations(&outer_angle_free(without_arrays));
    let last_break = cleaned.rfind([' ', '*'])?;
    let candidate = cleaned[last_break + 1..].trim();
    let before = cleaned[..last_break].trim();
    if before.is_empty() || !IDENT.is_match(candidate) || TYPE_WORDS.contains(&candidate) {
        return None;
    }
    if matches!(before, "struct" | "enum" | "union" | "unsigned" | "signed" | "const") {
        return None;
    }
    Some(candidate.to_string())
}

/// Drop `<…>` groups (generic arguments, protocol lists) from a spelling.
pub fn outer_angle_free(s: &str) -> String {
    let mut depth = 0usize;
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Whether `s` is a plain C identifier.
pub fn is_identifier(s: &str) -> bool {
    IDENT.is_match(s)
}
