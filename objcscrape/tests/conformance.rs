//! Conformer closure over protocol extension chains.

use std::collections::BTreeMap;

use objcscrape::conformance::build_conformer_map;
use objcscrape::model::{ClassDecl, ProtocolDecl};

fn classes(pairs: &[(&str, &[&str])]) -> BTreeMap<String, ClassDecl> {
    pairs
        .iter()
        .map(|(name, protocols)| {
            let mut c = ClassDecl::new(*name);
            c.protocols = protocols.iter().map(|p| p.to_string()).collect();
            (name.to_string(), c)
        })
        .collect()
}

fn protocols(pairs: &[(&str, &[&str])]) -> BTreeMap<String, ProtocolDecl> {
    pairs
        .iter()
        .map(|(name, parents)| {
            let mut p = ProtocolDecl::new(*name);
            p.parents = parents.iter().map(|s| s.to_string()).collect();
            (name.to_string(), p)
        })
        .collect()
}

fn names(map: &objcscrape::conformance::ConformerMap, protocol: &str) -> Vec<String> {
    map.get(protocol)
        .map(|s| s.iter().cloned().collect())
        .unwrap_or_default()
}

#[test]
fn conformance_propagates_up_extension_chains() {
    let c = classes(&[("Leaf", &["Child"]), ("Direct", &["Root"])]);
    let p = protocols(&[("Child", &["Middle"]), ("Middle", &["Root"]), ("Root", &[])]);
    let map = build_conformer_map(&c, &p);

    assert_eq!(names(&map, "Child"), vec!["Leaf"]);
    assert_eq!(names(&map, "Middle"), vec!["Leaf"]);
    assert_eq!(names(&map, "Root"), vec!["Direct", "Leaf"]);
}

#[test]
fn conformance_does_not_flow_down() {
    let c = classes(&[("OnlyRoot", &["Root"])]);
    let p = protocols(&[("Child", &["Root"]), ("Root", &[])]);
    let map = build_conformer_map(&c, &p);
    assert!(names(&map, "Child").is_empty(), "map: {map:?}");
}

#[test]
fn cyclic_protocol_parents_terminate() {
    let c = classes(&[("X", &["P"]), ("Y", &["Q"])]);
    let p = protocols(&[("P", &["Q"]), ("Q", &["P"])]);
    let map = build_conformer_map(&c, &p);
    assert_eq!(names(&map, "P"), vec!["X", "Y"]);
    assert_eq!(names(&map, "Q"), vec!["X", "Y"]);
}

#[test]
fn unparsed_protocols_still_collect_direct_conformers() {
    let c = classes(&[("Widget", &["NSCopying", "NSCoding"])]);
    let map = build_conformer_map(&c, &BTreeMap::new());
    assert_eq!(names(&map, "NSCopying"), vec!["Widget"]);
    assert_eq!(names(&map, "NSCoding"), vec!["Widget"]);
}

#[test]
fn diamond_inheritance_counts_each_class_once() {
    let c = classes(&[("Impl", &["Left", "Right"])]);
    let p = protocols(&[("Left", &["Base"]), ("Right", &["Base"]), ("Base", &[])]);
    let map = build_conformer_map(&c, &p);
    assert_eq!(names(&map, "Base"), vec!["Impl"]);
}
