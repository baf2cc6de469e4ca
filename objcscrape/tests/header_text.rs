//! Type-spelling helpers and header-text recovery.

use objcscrape::source::{SourceCache, block_signatures, normalize_comment, scan_deprecation};
use objcscrape::typetext::*;

// ---------------------------------------------------------------------------
// Type spellings
// ---------------------------------------------------------------------------

#[test]
fn annotations_are_stripped_and_spacing_normalized() {
    assert_eq!(strip_annotations("NSString * _Nullable"), "NSString *");
    assert_eq!(strip_annotations("__kindof  NSView *"), "NSView *");
    assert_eq!(strip_annotations("NSError * _Nullable * _Nullable"), "NSError **");
    assert_eq!(normalize_spaces("NSError**"), "NSError **");
    assert_eq!(normalize_spaces("id<NSCopying>*"), "id<NSCopying> *");
}

#[test]
fn top_level_nullability() {
    assert!(is_top_level_nullable("NSString * _Nullable"));
    assert!(!is_top_level_nullable("NSArray<NSString *> *"));
    assert!(!is_top_level_nullable("NSArray<NSString * _Nullable> *"));
    assert!(is_top_level_nullable("void (^ _Nullable)(NSError * _Nonnull)"));
    assert!(!is_top_level_nullable("void (^)(NSError * _Nullable)"));
    assert!(is_top_level_nullable("int (* _Nullable)(int)"));
}

#[test]
fn bracket_aware_splitting() {
    assert_eq!(
        split_top_level("NSDictionary<NSString *, id> *dict, void (^cb)(int, int), int n"),
        vec!["NSDictionary<NSString *, id> *dict", "void (^cb)(int, int)", "int n"]
    );
    assert!(split_top_level("").is_empty());
    let s = "void (^)(int (^)(void))";
    let caret = find_block_caret(s).unwrap();
    let open = group_open(s, caret).unwrap();
    assert_eq!(matching_close(s, open), Some(7));
}

#[test]
fn embedded_parameter_names() {
    assert_eq!(param_name_of("NSError *error").as_deref(), Some("error"));
    assert_eq!(param_name_of("NSInteger count").as_deref(), Some("count"));
    assert_eq!(param_name_of("void (^handler)(BOOL)").as_deref(), Some("handler"));
    assert_eq!(param_name_of("NSArray<NSString *> *items").as_deref(), Some("items"));
    assert_eq!(param_name_of("char buffer[16]").as_deref(), Some("buffer"));
    assert_eq!(param_name_of("NSError *"), None);
    assert_eq!(param_name_of("unsigned int"), None);
    assert_eq!(param_name_of("struct Point"), None);
    assert_eq!(param_name_of("BOOL"), None);
    assert_eq!(param_name_of("void"), None);
}

#[test]
fn identifiers_and_angle_groups() {
    assert!(is_identifier("NSObject"));
    assert!(!is_identifier("NSObject *"));
    assert_eq!(outer_angle_free("NSArray<NSArray<id> *> *"), "NSArray *");
    assert_eq!(outer_level("void (^)(int)"), "void ");
}

// ---------------------------------------------------------------------------
// Header text
// ---------------------------------------------------------------------------

#[test]
fn deprecation_macros() {
    let d = scan_deprecation(r#"- (void)old API_DEPRECATED("Use new", macos(10.0, 11.0));"#);
    assert!(d.deprecated);
    assert_eq!(d.message.as_deref(), Some("Use new"));

    let d = scan_deprecation(r#"API_DEPRECATED_WITH_REPLACEMENT("newThing", ios(2.0, 9.0))"#);
    assert_eq!(d.message.as_deref(), Some("Use newThing instead"));

    let d = scan_deprecation("- (void)x NS_DEPRECATED_MAC(10_0, 10_5);");
    assert!(d.deprecated);
    assert_eq!(d.message, None);

    let d = scan_deprecation("- (void)x __attribute__((deprecated));");
    assert!(d.deprecated);

    assert!(!scan_deprecation("- (void)fine API_AVAILABLE(macos(10.15));").deprecated);
}

#[test]
fn comment_normalization() {
    assert_eq!(
        normalize_comment("/**\n * @abstract Does things.\n * More.\n */").as_deref(),
        Some("Does things. More.")
    );
    assert_eq!(normalize_comment("/// one\n/// two").as_deref(), Some("one two"));
    assert_eq!(normalize_comment("//"), None);
}

#[test]
fn block_signature_names() {
    assert_eq!(
        block_signatures("- (void)run:(void (^)(BOOL ok, NSError *err))done other:(void (^)(void))tick;"),
        vec![vec![Some("ok".to_string()), Some("err".to_string())], vec![]]
    );
    assert_eq!(block_signatures("void (^)(BOOL, int)"), vec![vec![None, None]]);
}

const HEADER: &str = "\
#import <Foundation/Foundation.h>

/// Line one.
/// Line two.
API_AVAILABLE(macos(10.15))
@interface Thing : NSObject
- (void)a; // trailing
/* not mine */ - (void)b;
- (void)c
    API_DEPRECATED(\"gone\", macos(10.0, 10.1));
@end
";

#[test]
fn source_cache_queries() {
    let mut cache = SourceCache::new();
    cache.insert("Thing.h", HEADER);

    assert_eq!(
        cache.doc_comment_before("Thing.h", 6).as_deref(),
        Some("Line one. Line two."),
        "availability-only lines between doc and decl are skipped"
    );
    assert_eq!(cache.trailing_comment("Thing.h", 7).as_deref(), Some("trailing"));
    assert_eq!(cache.trailing_comment("Thing.h", 3), None, "a comment-only line is not trailing");

    let dep = cache.deprecation_near("Thing.h", 9, 10);
    assert!(dep.deprecated);
    assert_eq!(dep.message.as_deref(), Some("gone"));
    assert!(!cache.deprecation_near("Thing.h", 7, 7).deprecated);

    assert_eq!(cache.line("Thing.h", 6).as_deref(), Some("@interface Thing : NSObject"));
    assert!(cache.lines("Missing.h").is_none(), "unreadable files are remembered as absent");
}
