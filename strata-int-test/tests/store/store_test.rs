use strata::common::Value;
use strata::errors::ErrorKind;
use strata::migration::MigrationExecutor;
use strata::schema::{PropertyDescriptor, PropertyType, SchemaDiffer};
use strata::strata::Strata;
use strata_int_test::test_util::{catalog, memory_engine, person_v1, person_v2};

// ==================== Transaction Contract Tests ====================

#[test]
fn test_interrupted_migration_leaves_store_unchanged() {
    let engine = memory_engine();
    let db = Strata::builder()
        .schema(person_v1())
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");
    db.insert("Person", vec![Value::from("Ada")])
        .expect("Failed to insert row");

    let stored = engine.stored_catalog().expect("Failed to read catalog");
    let declared = catalog(2, vec![person_v2()]);
    let changes = SchemaDiffer::new()
        .diff(&stored, &declared)
        .expect("Diff failed");

    // Apply structural changes and the catalog inside a transaction, then
    // abandon it before commit, like a crash mid-migration.
    engine
        .begin_exclusive_transaction()
        .expect("Failed to begin transaction");
    MigrationExecutor::new(&engine)
        .apply(&changes, None)
        .expect("Apply failed");
    engine
        .write_catalog(&declared)
        .expect("Failed to write catalog");
    engine
        .rollback_transaction()
        .expect("Failed to roll back");

    // Stored version and catalog are unchanged from pre-migration values
    assert_eq!(engine.stored_version().expect("Failed to read version"), 1);
    let persisted = engine.stored_catalog().expect("Failed to read catalog");
    assert!(persisted.structural_eq(&stored));
    assert!(engine.column_index("Person", "age").is_err());
    assert_eq!(engine.row_count("Person").expect("Failed to count rows"), 1);
}

#[test]
fn test_nested_transaction_is_rejected() {
    let engine = memory_engine();
    let _db = Strata::builder()
        .schema(person_v1())
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");

    engine
        .begin_exclusive_transaction()
        .expect("Failed to begin transaction");
    let err = engine
        .begin_exclusive_transaction()
        .expect_err("Nested begin should fail");
    assert_eq!(err.kind(), &ErrorKind::TransactionAlreadyActive);
    engine
        .rollback_transaction()
        .expect("Failed to roll back");
}

#[test]
fn test_structure_changes_require_transaction() {
    let engine = memory_engine();
    let _db = Strata::builder()
        .schema(person_v1())
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");

    let err = engine
        .add_column(
            "Person",
            &PropertyDescriptor::new("age", PropertyType::Int),
            &Value::Int(0),
        )
        .expect_err("DDL outside a transaction should fail");
    assert_eq!(err.kind(), &ErrorKind::TransactionNotActive);
}

// ==================== Metadata Region Tests ====================

#[test]
fn test_metadata_region_is_written_on_bootstrap() {
    let engine = memory_engine();
    let _db = Strata::builder()
        .schema(person_v1())
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");

    let metadata = engine.metadata().expect("Failed to read metadata");
    assert!(metadata.is_initialized());
    assert_eq!(metadata.schema_version, 1);
    assert_eq!(metadata.engine_version, engine.engine_version());
    assert!(!metadata.library_version.is_empty());
}

#[test]
fn test_stored_catalog_read_before_user_data() {
    let engine = memory_engine();
    let _db = Strata::builder()
        .schema(person_v1())
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");

    let persisted = engine.stored_catalog().expect("Failed to read catalog");
    assert!(persisted.contains("Person"));
    assert_eq!(persisted.version(), 1);
}

// ==================== Rename Primitive Tests ====================

#[test]
fn test_rename_column_primitive() {
    let engine = memory_engine();
    let db = Strata::builder()
        .schema(person_v1())
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");
    db.insert("Person", vec![Value::from("Ada")])
        .expect("Failed to insert row");

    engine
        .begin_exclusive_transaction()
        .expect("Failed to begin transaction");
    engine
        .rename_column("Person", "name", "full_name")
        .expect("Rename failed");
    engine
        .commit_transaction()
        .expect("Failed to commit");

    let index = engine
        .column_index("Person", "full_name")
        .expect("Renamed column missing");
    let row = engine
        .rows("Person")
        .expect("Failed to open cursor")
        .next()
        .expect("Missing row")
        .expect("Failed to read row");
    assert_eq!(row.get(index).expect("Failed to read value"), Value::from("Ada"));
}
