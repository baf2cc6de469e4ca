//! Extraction rules exercised on small hand-built trees.

mod common;

use common::{category, interface, method, protocol, unit};
use objcscrape::extract::{extract_tree, parse_int_literal, short_name};
use objcscrape::model::{Extraction, Targets};
use objcscrape::source::SourceCache;
use serde_json::{Value, json};

fn targets(classes: &[&str], protocols: &[&str], ints: &[&str], strings: &[&str]) -> Targets {
    let set = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
    Targets {
        classes: set(classes),
        protocols: set(protocols),
        integer_enums: set(ints),
        string_enums: set(strings),
    }
}

fn extract(decls: Vec<Value>, targets: &Targets) -> Extraction {
    let tree = common::tree(&unit(decls));
    extract_tree(&tree, targets, &mut SourceCache::new())
}

fn selectors(ex: &Extraction, class: &str) -> Vec<String> {
    let mut s: Vec<String> = ex.classes[class]
        .members
        .instance_methods
        .iter()
        .map(|m| m.selector.clone())
        .collect();
    s.sort();
    s
}

fn enum_decl(id: &str, name: Option<&str>, constants: &[(&str, Option<i64>)]) -> Value {
    let inner: Vec<Value> = constants
        .iter()
        .map(|(n, v)| {
            let mut c = json!({ "id": format!("{id}-{n}"), "kind": "EnumConstantDecl", "name": n });
            if let Some(v) = v {
                c["inner"] = json!([{ "id": format!("{id}-{n}-v"), "kind": "IntegerLiteral", "value": v.to_string() }]);
            }
            c
        })
        .collect();
    let mut node = json!({ "id": id, "kind": "EnumDecl", "inner": inner });
    if let Some(n) = name {
        node["name"] = json!(n);
    }
    node
}

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

#[test]
fn category_before_interface_merges_the_same() {
    let t = targets(&["Foo"], &[], &[], &[]);
    let iface = interface("Foo", Some("NSObject"), &[], vec![method("a", "void"), method("b", "void")]);
    let cat = category("Foo", "More", vec![method("b", "void"), method("c", "void")]);

    let forward = extract(vec![iface.clone(), cat.clone()], &t);
    let backward = extract(vec![cat, iface], &t);

    assert_eq!(selectors(&forward, "Foo"), vec!["a", "b", "c"]);
    assert_eq!(selectors(&backward, "Foo"), vec!["a", "b", "c"]);
    assert_eq!(forward.classes["Foo"].superclass.as_deref(), Some("NSObject"));
    assert_eq!(
        backward.classes["Foo"].superclass.as_deref(),
        Some("NSObject"),
        "the interface's superclass survives a category seen first"
    );
}

#[test]
fn forward_class_declaration_is_not_a_record() {
    let t = targets(&["Foo"], &[], &[], &[]);
    let ex = extract(vec![json!({ "id": "f", "kind": "ObjCInterfaceDecl", "name": "Foo" })], &t);
    assert!(ex.classes.is_empty(), "classes: {:?}", ex.classes.keys());
    assert_eq!(ex.missing(&t).classes.len(), 1);
}

#[test]
fn root_protocol_folds_into_same_named_class() {
    let t = targets(&["NSObject"], &[], &[], &[]);
    let ex = extract(
        vec![
            protocol("NSObject", &[], vec![method("isEqual:", "BOOL")]),
            interface("NSObject", None, &["NSObject"], vec![method("init", "instancetype")]),
        ],
        &t,
    );
    assert!(ex.protocols.is_empty(), "NSObject should not become a protocol record");
    assert_eq!(selectors(&ex, "NSObject"), vec!["init", "isEqual:"]);
}

#[test]
fn category_without_interface_is_not_a_class() {
    let t = targets(&["Foo"], &[], &[], &[]);
    let ex = extract(vec![category("Foo", "Extras", vec![method("extra", "void")])], &t);
    assert!(ex.classes.is_empty(), "classes: {:?}", ex.classes.keys());
    assert_eq!(ex.missing(&t).classes.into_iter().collect::<Vec<_>>(), vec!["Foo"]);
}

#[test]
fn root_protocol_target_is_satisfied_by_the_folded_class() {
    let t = targets(&["NSObject"], &["NSObject"], &[], &[]);
    let ex = extract(
        vec![
            protocol("NSObject", &[], vec![method("isEqual:", "BOOL")]),
            interface("NSObject", None, &["NSObject"], vec![method("init", "instancetype")]),
        ],
        &t,
    );
    assert!(ex.root_protocols.contains("NSObject"));
    assert!(ex.missing(&t).is_empty(), "missing: {:?}", ex.missing(&t));

    // Without the class the protocol has nowhere to fold.
    let alone = extract(vec![protocol("NSObject", &[], vec![method("isEqual:", "BOOL")])], &t);
    assert!(alone.root_protocols.is_empty());
    assert_eq!(alone.missing(&t).protocols.len(), 1);
}

#[test]
fn protocols_are_merged_and_forward_declarations_skipped() {
    let t = targets(&[], &["P"], &[], &[]);
    let ex = extract(
        vec![
            json!({ "id": "fwd", "kind": "ObjCProtocolDecl", "name": "P" }),
            protocol("P", &["Q"], vec![method("one", "void")]),
            protocol("P", &[], vec![method("two", "void")]),
        ],
        &t,
    );
    let p = &ex.protocols["P"];
    assert_eq!(p.parents, vec!["Q"]);
    assert_eq!(p.members.instance_methods.len(), 2);
}

#[test]
fn class_methods_and_properties_are_separated() {
    let t = targets(&["Foo"], &[], &[], &[]);
    let mut shared = method("shared", "instancetype");
    shared["instance"] = json!(false);
    let property = json!({
        "id": "prop", "kind": "ObjCPropertyDecl", "name": "count",
        "type": { "qualType": "NSUInteger" }, "readonly": true
    });
    let ex = extract(vec![interface("Foo", Some("NSObject"), &[], vec![shared, property])], &t);
    let foo = &ex.classes["Foo"];
    assert!(foo.members.instance_methods.is_empty());
    assert_eq!(foo.members.class_methods[0].selector, "shared");
    assert!(foo.members.class_methods[0].is_class);
    assert_eq!(foo.members.properties[0].name, "count");
    assert!(foo.members.properties[0].readonly);
}

#[test]
fn unnamed_parameters_get_positional_names() {
    let t = targets(&["Foo"], &[], &[], &[]);
    let mut m = method("set::", "void");
    m["inner"] = json!([
        { "id": "p0", "kind": "ParmVarDecl", "name": "", "type": { "qualType": "int" } },
        { "id": "p1", "kind": "ParmVarDecl", "name": "value", "type": { "qualType": "id" } }
    ]);
    let ex = extract(vec![interface("Foo", Some("NSObject"), &[], vec![m])], &t);
    let params: Vec<&str> = ex.classes["Foo"].members.instance_methods[0]
        .params
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(params, vec!["arg0", "value"]);
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[test]
fn enum_forward_declaration_then_definition() {
    let t = targets(&[], &[], &["E"], &[]);
    let ex = extract(
        vec![
            enum_decl("fwd", Some("E"), &[]),
            enum_decl("def", Some("E"), &[("EOne", Some(1)), ("ETwo", None)]),
        ],
        &t,
    );
    let e = ex.integer_enums.get("E").expect("definition after forward decl");
    assert_eq!(e.constants.len(), 2);
    assert_eq!(e.constants[1].value, 2);
}

#[test]
fn first_complete_enum_definition_wins() {
    let t = targets(&[], &[], &["E"], &[]);
    let ex = extract(
        vec![
            enum_decl("a", Some("E"), &[("EOne", Some(1))]),
            enum_decl("b", Some("E"), &[("EOne", Some(7)), ("EMore", None)]),
        ],
        &t,
    );
    let e = &ex.integer_enums["E"];
    assert_eq!(e.constants.len(), 1);
    assert_eq!(e.constants[0].value, 1);
}

#[test]
fn anonymous_enum_named_by_typedef() {
    let t = targets(&[], &[], &["Anon"], &[]);
    let ex = extract(
        vec![
            enum_decl("0xa", None, &[("AnonX", None), ("AnonY", Some(10))]),
            json!({
                "id": "0xb", "kind": "TypedefDecl", "name": "Anon",
                "type": { "qualType": "enum Anon" },
                "inner": [{ "id": "0xc", "kind": "ElaboratedType",
                            "ownedTagDecl": { "id": "0xa", "kind": "EnumDecl", "name": "" } }]
            }),
        ],
        &t,
    );
    let values: Vec<i64> = ex.integer_enums["Anon"].constants.iter().map(|c| c.value).collect();
    assert_eq!(values, vec![0, 10]);
}

#[test]
fn enumerators_may_reference_untargeted_enums() {
    let t = targets(&[], &[], &["Derived"], &[]);
    let derived = json!({
        "id": "d", "kind": "EnumDecl", "name": "Derived",
        "inner": [{
            "id": "d1", "kind": "EnumConstantDecl", "name": "DerivedAll",
            "inner": [{
                "id": "d1e", "kind": "BinaryOperator", "opcode": "+",
                "inner": [
                    { "id": "r", "kind": "DeclRefExpr",
                      "referencedDecl": { "id": "b-BaseHigh", "kind": "EnumConstantDecl", "name": "BaseHigh" } },
                    { "id": "one", "kind": "IntegerLiteral", "value": "1" }
                ]
            }]
        }]
    });
    let ex = extract(
        vec![enum_decl("b", Some("Base"), &[("BaseLow", None), ("BaseHigh", Some(0x40))]), derived],
        &t,
    );
    assert!(!ex.integer_enums.contains_key("Base"));
    assert_eq!(ex.integer_enums["Derived"].constants[0].value, 0x41);
}

#[test]
fn negative_and_unary_values() {
    let t = targets(&[], &[], &["Signed"], &[]);
    let node = json!({
        "id": "s", "kind": "EnumDecl", "name": "Signed",
        "inner": [
            { "id": "s1", "kind": "EnumConstantDecl", "name": "SignedNeg", "inner": [
                { "id": "u", "kind": "UnaryOperator", "opcode": "-", "inner": [
                    { "id": "l", "kind": "IntegerLiteral", "value": "3" } ] } ] },
            { "id": "s2", "kind": "EnumConstantDecl", "name": "SignedNext" }
        ]
    });
    let ex = extract(vec![node], &t);
    let values: Vec<i64> = ex.integer_enums["Signed"].constants.iter().map(|c| c.value).collect();
    assert_eq!(values, vec![-3, -2]);
}

#[test]
fn integer_literal_forms() {
    assert_eq!(parse_int_literal("42"), Some(42));
    assert_eq!(parse_int_literal("0x1F"), Some(31));
    assert_eq!(parse_int_literal("010"), Some(8));
    assert_eq!(parse_int_literal("-5"), Some(-5));
    assert_eq!(parse_int_literal("7UL"), Some(7));
    assert_eq!(parse_int_literal("18446744073709551615"), Some(-1));
    assert_eq!(parse_int_literal("abc"), None);
}

// ---------------------------------------------------------------------------
// String enums
// ---------------------------------------------------------------------------

#[test]
fn string_enum_requires_new_type_marker() {
    let t = targets(&[], &[], &[], &["Plain", "Marked"]);
    let ex = extract(
        vec![
            json!({ "id": "p", "kind": "TypedefDecl", "name": "Plain",
                    "type": { "qualType": "NSString *" } }),
            json!({ "id": "m", "kind": "TypedefDecl", "name": "Marked",
                    "type": { "qualType": "NSString *" },
                    "inner": [{ "id": "attr", "kind": "SwiftNewTypeAttr" }] }),
            json!({ "id": "v", "kind": "VarDecl", "name": "MarkedFirst", "storageClass": "extern",
                    "type": { "qualType": "const Marked", "typeAliasDeclId": "m" } }),
            json!({ "id": "w", "kind": "VarDecl", "name": "PlainFirst", "storageClass": "extern",
                    "type": { "qualType": "const Plain", "typeAliasDeclId": "p" } }),
        ],
        &t,
    );
    assert!(!ex.string_enums.contains_key("Plain"));
    let marked = &ex.string_enums["Marked"];
    assert_eq!(marked.values.len(), 1);
    assert_eq!(marked.values[0].short_name, "First");
}

#[test]
fn short_names() {
    assert_eq!(short_name("NSFooBar", "NSFoo"), "Bar");
    assert_eq!(short_name("NSFoo", "NSFoo"), "NSFoo");
    assert_eq!(short_name("NSFoo2D", "NSFoo"), "NSFoo2D");
    assert_eq!(short_name("OtherName", "NSFoo"), "OtherName");
}

// ---------------------------------------------------------------------------
// Structs
// ---------------------------------------------------------------------------

fn record(id: &str, name: Option<&str>, fields: &[(&str, &str)]) -> Value {
    let inner: Vec<Value> = fields
        .iter()
        .map(|(n, ty)| json!({ "id": format!("{id}-{n}"), "kind": "FieldDecl", "name": n, "type": { "qualType": ty } }))
        .collect();
    let mut node = json!({
        "id": id, "kind": "RecordDecl", "tagUsed": "struct",
        "completeDefinition": true, "inner": inner
    });
    if let Some(n) = name {
        node["name"] = json!(n);
    }
    node
}

fn owning_typedef(id: &str, name: &str, qual: &str, owned: &str) -> Value {
    json!({
        "id": id, "kind": "TypedefDecl", "name": name, "type": { "qualType": qual },
        "inner": [{ "id": format!("{id}-t"), "kind": "ElaboratedType",
                    "ownedTagDecl": { "id": owned, "kind": "RecordDecl" } }]
    })
}

#[test]
fn named_struct_is_recorded_directly() {
    let ex = extract(vec![record("r", Some("Size"), &[("w", "double"), ("h", "double")])], &Targets::default());
    let size = &ex.structs["Size"];
    assert_eq!(size.internal_name, None);
    assert_eq!(size.fields.len(), 2);
}

#[test]
fn anonymous_struct_named_by_typedef() {
    let ex = extract(
        vec![
            record("r", None, &[("lo", "int"), ("hi", "int")]),
            owning_typedef("t", "Range", "struct Range", "r"),
        ],
        &Targets::default(),
    );
    let range = ex.structs.get("Range").expect("Range");
    assert_eq!(range.internal_name, None);
    assert_eq!(range.fields[1].name, "hi");
}

#[test]
fn typedef_of_existing_struct_is_an_alias() {
    let ex = extract(
        vec![
            record("r", Some("CGPoint"), &[("x", "CGFloat"), ("y", "CGFloat")]),
            json!({ "id": "t", "kind": "TypedefDecl", "name": "NSPoint",
                    "type": { "qualType": "struct CGPoint" } }),
            json!({ "id": "u", "kind": "TypedefDecl", "name": "NSPointAlias",
                    "type": { "qualType": "NSPoint" } }),
        ],
        &Targets::default(),
    );
    assert_eq!(ex.struct_aliases.get("NSPoint").map(String::as_str), Some("CGPoint"));
    assert_eq!(
        ex.struct_aliases.get("NSPointAlias").map(String::as_str),
        Some("CGPoint"),
        "aliases of aliases point at the real struct"
    );
    assert!(!ex.structs.contains_key("NSPoint"));
}

#[test]
fn internal_struct_exposed_by_plain_typedef() {
    let ex = extract(
        vec![
            record("r", Some("_Opaque"), &[("a", "int")]),
            json!({ "id": "t", "kind": "TypedefDecl", "name": "Opaque",
                    "type": { "qualType": "struct _Opaque" } }),
        ],
        &Targets::default(),
    );
    assert!(!ex.structs.contains_key("_Opaque"));
    assert_eq!(ex.structs["Opaque"].internal_name.as_deref(), Some("_Opaque"));
}

#[test]
fn unions_and_incomplete_records_are_ignored() {
    let mut union = record("u", Some("Either"), &[("i", "int")]);
    union["tagUsed"] = json!("union");
    let incomplete = json!({ "id": "i", "kind": "RecordDecl", "tagUsed": "struct", "name": "Later" });
    let ex = extract(vec![union, incomplete], &Targets::default());
    assert!(ex.structs.is_empty(), "structs: {:?}", ex.structs.keys());
}

const BLOCKS_H: &str = "\
#import <Foundation/Foundation.h>

typedef void (^WKCompletion)(BOOL finished, NSError * _Nullable error);
typedef void (^WKTick)(int);
";

#[test]
fn block_typedefs_keep_declared_parameter_names() {
    let typedef = |id: &str, name: &str, line: u32, qual: &str| {
        json!({ "id": id, "kind": "TypedefDecl", "name": name,
                "loc": { "offset": line * 40, "file": "Blocks.h", "line": line, "col": 16 },
                "range": { "begin": { "offset": line * 40, "col": 1 },
                           "end": { "offset": line * 40 + 30, "col": 70 } },
                "type": { "qualType": qual } })
    };
    let tree = common::tree(&unit(vec![
        typedef("t1", "WKCompletion", 3, "void (^)(BOOL, NSError * _Nullable)"),
        typedef("t2", "WKTick", 4, "void (^)(int)"),
    ]));
    let mut sources = SourceCache::new();
    sources.insert("Blocks.h", BLOCKS_H);
    let ex = extract_tree(&tree, &Targets::default(), &mut sources);

    assert_eq!(
        ex.block_typedefs.get("WKCompletion"),
        Some(&vec![Some("finished".to_string()), Some("error".to_string())])
    );
    assert!(!ex.block_typedefs.contains_key("WKTick"), "unnamed parameters record nothing");
    assert_eq!(ex.typedefs["WKTick"], "void (^)(int)");
}
