//! String-constant lookup for string enum members.
//!
//! Values of exported `NSString *` constants only exist in the framework
//! binary. Lookup is best-effort: a symbol the resolver cannot answer stays
//! valueless and is emitted as a type-only member.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

/// Resolves exported string constants of a framework binary.
pub trait StringConstantResolver {
    /// Values for whichever of `symbols` can be resolved. Missing symbols
    /// are simply absent from the map.
    fn resolve(&self, binary: Option<&Path>, symbols: &[&str]) -> HashMap<String, String>;
}

/// Resolver backed by a fixed symbol → value table (`[string_constants]`).
#[derive(Debug, Clone, Default)]
pub struct TableResolver {
    values: HashMap<String, String>,
}

impl TableResolver {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl StringConstantResolver for TableResolver {
    fn resolve(&self, binary: Option<&Path>, symbols: &[&str]) -> HashMap<String, String> {
        let found: HashMap<String, String> = symbols
            .iter()
            .filter_map(|s| self.values.get(*s).map(|v| (s.to_string(), v.clone())))
            .collect();
        debug!(
            binary = ?binary,
            requested = symbols.len(),
            resolved = found.len(),
            "resolved string constants"
        );
        found
    }
}

/// Resolver that never knows anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConstants;

impl StringConstantResolver for NoConstants {
    fn resolve(&self, _binary: Option<&Path>, _symbols: &[&str]) -> HashMap<String, String> {
        HashMap::new()
    }
}
