use strata::errors::ErrorKind;
use strata::schema::{
    DiffOptions, ObjectSchema, PropertyDescriptor, PropertyType, SchemaChange, SchemaDiffer,
};
use strata_int_test::test_util::{article_schema, asset_schema, catalog, issue_schema, person_v1};

// ==================== Round-Trip Tests ====================

#[test]
fn test_compound_catalog_diff_round_trip() {
    // v1: magazine domain without articles
    let stored = catalog(1, vec![asset_schema(), issue_schema()]);

    // v2: adds Article, indexes Asset.url, widens Asset.size
    let mut asset_v2 = ObjectSchema::new("Asset");
    asset_v2
        .add_property(PropertyDescriptor::new("url", PropertyType::String).with_indexed(true))
        .expect("Failed to add property");
    asset_v2
        .add_property(PropertyDescriptor::new("size", PropertyType::Double))
        .expect("Failed to add property");
    let declared = catalog(2, vec![asset_v2, issue_schema(), article_schema()]);

    let changes = SchemaDiffer::new()
        .diff(&stored, &declared)
        .expect("Diff failed");
    assert!(!changes.is_empty());

    let migrated = changes.apply_to(&stored).expect("Apply failed");
    assert!(migrated.structural_eq(&declared));
}

#[test]
fn test_diff_of_equal_catalogs_is_empty() {
    let stored = catalog(1, vec![asset_schema(), issue_schema(), article_schema()]);
    let declared = catalog(5, vec![article_schema(), issue_schema(), asset_schema()]);

    let changes = SchemaDiffer::new()
        .diff(&stored, &declared)
        .expect("Diff failed");
    assert!(changes.is_empty());
}

// ==================== Ordering Tests ====================

#[test]
fn test_additions_precede_removals() {
    let stored = catalog(1, vec![person_v1(), asset_schema()]);
    let mut renamed = ObjectSchema::new("Person");
    renamed
        .add_property(PropertyDescriptor::new("display_name", PropertyType::String))
        .expect("Failed to add property");
    let declared = catalog(2, vec![renamed]);

    let changes = SchemaDiffer::new()
        .diff(&stored, &declared)
        .expect("Diff failed");
    let ops: Vec<_> = changes.iter().collect();

    let last_add = ops
        .iter()
        .rposition(|c| matches!(c, SchemaChange::AddProperty { .. } | SchemaChange::AddType { .. }))
        .expect("Expected an addition");
    let first_remove = ops
        .iter()
        .position(|c| {
            matches!(
                c,
                SchemaChange::RemoveProperty { .. } | SchemaChange::RemoveType { .. }
            )
        })
        .expect("Expected a removal");
    assert!(last_add < first_remove);
}

// ==================== Error Tests ====================

#[test]
fn test_dangling_link_is_rejected() {
    let stored = catalog(1, vec![asset_schema(), issue_schema()]);
    // Declared drops Asset but Issue.cover still links to it
    let declared = catalog(2, vec![issue_schema()]);

    let err = SchemaDiffer::new()
        .diff(&stored, &declared)
        .expect_err("Diff should have failed");
    assert_eq!(err.kind(), &ErrorKind::DanglingReference);
}

#[test]
fn test_incompatible_type_change_is_rejected() {
    let stored = catalog(1, vec![asset_schema()]);
    let mut asset_v2 = ObjectSchema::new("Asset");
    asset_v2
        .add_property(PropertyDescriptor::new("url", PropertyType::Data))
        .expect("Failed to add property");
    asset_v2
        .add_property(PropertyDescriptor::new("size", PropertyType::Int))
        .expect("Failed to add property");
    let declared = catalog(2, vec![asset_v2]);

    let err = SchemaDiffer::new()
        .diff(&stored, &declared)
        .expect_err("Diff should have failed");
    assert_eq!(err.kind(), &ErrorKind::IncompatibleTypeChange);
}

#[test]
fn test_required_flip_policy_is_honored() {
    let mut optional_size = ObjectSchema::new("Asset");
    optional_size
        .add_property(PropertyDescriptor::new("url", PropertyType::String))
        .expect("Failed to add property");
    optional_size
        .add_property(PropertyDescriptor::new("size", PropertyType::Int).with_optional(true))
        .expect("Failed to add property");
    let stored = catalog(1, vec![optional_size]);
    let declared = catalog(2, vec![asset_schema()]);

    let err = SchemaDiffer::new()
        .diff(&stored, &declared)
        .expect_err("Diff should have failed");
    assert_eq!(err.kind(), &ErrorKind::AmbiguousDefault);

    let differ = SchemaDiffer::with_options(DiffOptions {
        fill_required_defaults: true,
    });
    let changes = differ.diff(&stored, &declared).expect("Diff failed");
    let migrated = changes.apply_to(&stored).expect("Apply failed");
    assert!(migrated.structural_eq(&declared));
}
