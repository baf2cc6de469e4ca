//! Protocol → conforming-class closure.
//!
//! Conformance is a global property: this must only run once every batch
//! has been merged, otherwise a parent and child class that mention the same
//! protocol could see different conformer sets.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::{debug, trace};

use crate::model::{ClassDecl, ProtocolDecl};

/// Protocol name → classes conforming to it directly or through protocol
/// extension chains.
pub type ConformerMap = BTreeMap<String, BTreeSet<String>>;

/// Build the conformer map.
///
/// Pass one collects every direct `(class, protocol)` pair. Pass two walks
/// the parent list of each protocol that has conformers, depth-first with a
/// visited set, and unions those conformers into every ancestor reached.
pub fn build_conformer_map(
    classes: &BTreeMap<String, ClassDecl>,
    protocols: &BTreeMap<String, ProtocolDecl>,
) -> ConformerMap {
    let mut map = ConformerMap::new();
    for class in classes.values() {
        for protocol in &class.protocols {
            map.entry(protocol.clone())
                .or_default()
                .insert(class.name.clone());
        }
    }

    let direct: Vec<(String, BTreeSet<String>)> = map
        .iter()
        .filter(|(_, conformers)| !conformers.is_empty())
        .map(|(p, c)| (p.clone(), c.clone()))
        .collect();

    for (protocol, conformers) in direct {
        let mut visited = HashSet::new();
        visited.insert(protocol.clone());
        let mut stack: Vec<&str> = parents_of(protocols, &protocol).collect();
        while let Some(ancestor) = stack.pop() {
            if !visited.insert(ancestor.to_string()) {
                continue;
            }
            trace!(protocol = %protocol, ancestor, "propagating conformers");
            map.entry(ancestor.to_string())
                .or_default()
                .extend(conformers.iter().cloned());
            stack.extend(parents_of(protocols, ancestor));
        }
    }

    debug!(protocols = map.len(), "built conformer map");
    map
}

fn parents_of<'a>(
    protocols: &'a BTreeMap<String, ProtocolDecl>,
    name: &str,
) -> impl Iterator<Item = &'a str> + use<'a> {
    protocols
        .get(name)
        .into_iter()
        .flat_map(|p| p.parents.iter().map(String::as_str))
}
