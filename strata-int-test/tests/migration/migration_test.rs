use std::time::Duration;

use strata::common::Value;
use strata::errors::ErrorKind;
use strata::migration::{Migration, MigrationOutcome};
use strata::schema::{ObjectSchema, PropertyDescriptor, PropertyType};
use strata::strata::Strata;
use strata_int_test::test_util::{memory_engine, person_v1, person_v2};

// ==================== Basic Migration Tests ====================

#[test]
fn test_add_property_migration_end_to_end() {
    // Open at version 1 with Person{name} and seed some rows
    let engine = memory_engine();
    let db = Strata::builder()
        .schema(person_v1())
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");

    for name in ["Ada", "Grace", "Edsger"] {
        db.insert("Person", vec![Value::from(name)])
            .expect("Failed to insert row");
    }

    // Reopen at version 2 with Person{name, age: Int}
    let migrated = Strata::builder()
        .schema(person_v2())
        .schema_version(2)
        .storage(engine.clone())
        .open_or_create()
        .expect("Migration failed");

    assert_eq!(
        migrated.open_outcome(),
        Some(MigrationOutcome::Migrated {
            from_version: 1,
            to_version: 2
        })
    );
    assert_eq!(migrated.version().expect("Failed to read version"), 2);

    // Every existing row reads 0 for the new property
    let age = migrated
        .column_index("Person", "age")
        .expect("age column missing");
    let mut rows = 0;
    for row in migrated.rows("Person").expect("Failed to open cursor") {
        let row = row.expect("Failed to read row");
        assert_eq!(row.get(age).expect("Failed to read age"), Value::Int(0));
        rows += 1;
    }
    assert_eq!(rows, 3);

    // Reopening with the same declared schema is a no-op open
    let reopened = Strata::builder()
        .schema(person_v2())
        .schema_version(2)
        .storage(engine)
        .open_or_create()
        .expect("Reopen failed");
    assert_eq!(reopened.open_outcome(), Some(MigrationOutcome::NoOp));
}

#[test]
fn test_type_change_migration_converts_values() {
    let engine = memory_engine();
    let db = Strata::builder()
        .schema(person_v2())
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");
    db.insert("Person", vec![Value::from("Ada"), Value::Int(36)])
        .expect("Failed to insert row");

    let mut person_double = person_v1();
    person_double
        .add_property(PropertyDescriptor::new("age", PropertyType::Double))
        .expect("Failed to add property");

    let migrated = Strata::builder()
        .schema(person_double)
        .schema_version(2)
        .storage(engine)
        .open_or_create()
        .expect("Migration failed");

    let age = migrated
        .column_index("Person", "age")
        .expect("age column missing");
    let row = migrated
        .rows("Person")
        .expect("Failed to open cursor")
        .next()
        .expect("Missing row")
        .expect("Failed to read row");
    assert_eq!(row.get(age).expect("Failed to read age"), Value::Double(36.0));
}

#[test]
fn test_failed_conversion_aborts_whole_migration() {
    let engine = memory_engine();
    let mut person_string_age = person_v1();
    person_string_age
        .add_property(PropertyDescriptor::new("age", PropertyType::String))
        .expect("Failed to add property");

    let db = Strata::builder()
        .schema(person_string_age)
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");
    db.insert("Person", vec![Value::from("Ada"), Value::from("36")])
        .expect("Failed to insert row");
    db.insert("Person", vec![Value::from("Grace"), Value::from("unknown")])
        .expect("Failed to insert row");

    let result = Strata::builder()
        .schema(person_v2())
        .schema_version(2)
        .storage(engine.clone())
        .open_or_create();

    let err = result.expect_err("Migration should have failed");
    assert_eq!(err.kind(), &ErrorKind::ConversionFailed);

    // The store is still at its pre-migration version with string values
    assert_eq!(engine.stored_version().expect("Failed to read version"), 1);
    let age = engine
        .column_index("Person", "age")
        .expect("age column missing");
    let row = engine
        .rows("Person")
        .expect("Failed to open cursor")
        .next()
        .expect("Missing row")
        .expect("Failed to read row");
    assert_eq!(row.get(age).expect("Failed to read age"), Value::from("36"));
}

// ==================== Callback Tests ====================

#[test]
fn test_callback_populates_new_property_from_old_ones() {
    let engine = memory_engine();
    let mut contact = ObjectSchema::new("Contact");
    contact
        .add_property(PropertyDescriptor::new("first", PropertyType::String))
        .expect("Failed to add property");
    contact
        .add_property(PropertyDescriptor::new("last", PropertyType::String))
        .expect("Failed to add property");

    let db = Strata::builder()
        .schema(contact.clone())
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");
    db.insert(
        "Contact",
        vec![Value::from("Ada"), Value::from("Lovelace")],
    )
    .expect("Failed to insert row");

    // v2 adds a composed property alongside the split ones
    let mut contact_v2 = contact;
    contact_v2
        .add_property(PropertyDescriptor::new("full_name", PropertyType::String))
        .expect("Failed to add property");

    let migrated = Strata::builder()
        .schema(contact_v2)
        .schema_version(2)
        .add_migration(Migration::new(1, 2, |ctx| {
            // Structural changes ran first, so full_name already exists
            assert_eq!(ctx.version(), 2);
            let first = ctx.property_index("Contact", "first")?;
            let last = ctx.property_index("Contact", "last")?;
            let full = ctx.property_index("Contact", "full_name")?;
            for row in ctx.rows("Contact")? {
                let row = row?;
                let composed = format!(
                    "{} {}",
                    row.get(first)?.as_str().unwrap_or(""),
                    row.get(last)?.as_str().unwrap_or("")
                );
                row.set(full, Value::from(composed))?;
            }
            Ok(())
        }))
        .storage(engine)
        .open_or_create()
        .expect("Migration failed");

    let full = migrated
        .column_index("Contact", "full_name")
        .expect("full_name column missing");
    let row = migrated
        .rows("Contact")
        .expect("Failed to open cursor")
        .next()
        .expect("Missing row")
        .expect("Failed to read row");
    assert_eq!(
        row.get(full).expect("Failed to read full_name"),
        Value::from("Ada Lovelace")
    );
}

#[test]
fn test_multi_step_migration_runs_each_callback_once() {
    let engine = memory_engine();
    let db = Strata::builder()
        .schema(person_v1())
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");
    db.insert("Person", vec![Value::from("Ada")])
        .expect("Failed to insert row");

    let migrated = Strata::builder()
        .schema(person_v2())
        .schema_version(3)
        .add_migration(Migration::new(1, 2, |ctx| {
            assert_eq!(ctx.version(), 2);
            Ok(())
        }))
        .add_migration(Migration::new(2, 3, |ctx| {
            assert_eq!(ctx.version(), 3);
            let age = ctx.property_index("Person", "age")?;
            for row in ctx.rows("Person")? {
                row?.set(age, Value::Int(1))?;
            }
            Ok(())
        }))
        .storage(engine)
        .open_or_create()
        .expect("Migration failed");

    assert_eq!(
        migrated.open_outcome(),
        Some(MigrationOutcome::Migrated {
            from_version: 1,
            to_version: 3
        })
    );
    let age = migrated
        .column_index("Person", "age")
        .expect("age column missing");
    let row = migrated
        .rows("Person")
        .expect("Failed to open cursor")
        .next()
        .expect("Missing row")
        .expect("Failed to read row");
    assert_eq!(row.get(age).expect("Failed to read age"), Value::Int(1));
}

#[test]
fn test_callback_error_rolls_back_everything() {
    let engine = memory_engine();
    let db = Strata::builder()
        .schema(person_v1())
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");
    db.insert("Person", vec![Value::from("Ada")])
        .expect("Failed to insert row");

    let result = Strata::builder()
        .schema(person_v2())
        .schema_version(2)
        .add_migration(Migration::new(1, 2, |_ctx| {
            Err(strata::errors::StrataError::new(
                "user decided against it",
                ErrorKind::InternalError,
            ))
        }))
        .storage(engine.clone())
        .open_or_create();

    let err = result.expect_err("Migration should have failed");
    assert_eq!(err.kind(), &ErrorKind::UserCallbackFailed);
    assert_eq!(engine.stored_version().expect("Failed to read version"), 1);
    assert!(engine.column_index("Person", "age").is_err());
}

// ==================== Path Building Tests ====================

#[test]
fn test_gap_between_registered_migrations_fails() {
    let engine = memory_engine();
    let _db = Strata::builder()
        .schema(person_v1())
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");

    let result = Strata::builder()
        .schema(person_v2())
        .schema_version(4)
        .add_migration(Migration::new(1, 2, |_| Ok(())))
        .add_migration(Migration::new(3, 4, |_| Ok(())))
        .storage(engine.clone())
        .open_or_create();

    assert_eq!(
        result.expect_err("Open should have failed").kind(),
        &ErrorKind::NoPathFound
    );
    assert_eq!(engine.stored_version().expect("Failed to read version"), 1);
}

#[test]
fn test_downgrade_fails_and_store_is_untouched() {
    let engine = memory_engine();
    let db = Strata::builder()
        .schema(person_v1())
        .schema_version(3)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");
    db.insert("Person", vec![Value::from("Ada")])
        .expect("Failed to insert row");

    let result = Strata::builder()
        .schema(person_v1())
        .schema_version(2)
        .storage(engine.clone())
        .open_or_create();

    assert_eq!(
        result.expect_err("Open should have failed").kind(),
        &ErrorKind::DowngradeNotSupported
    );
    assert_eq!(engine.stored_version().expect("Failed to read version"), 3);
    assert_eq!(engine.row_count("Person").expect("Failed to count rows"), 1);
}

// ==================== Policy Tests ====================

#[test]
fn test_timeout_surfaces_and_rolls_back() {
    let engine = memory_engine();
    let _db = Strata::builder()
        .schema(person_v1())
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");

    let result = Strata::builder()
        .schema(person_v2())
        .schema_version(2)
        .migration_timeout(Duration::from_secs(0))
        .storage(engine.clone())
        .open_or_create();

    assert_eq!(
        result.expect_err("Open should have failed").kind(),
        &ErrorKind::MigrationTimeout
    );
    assert_eq!(engine.stored_version().expect("Failed to read version"), 1);
}

#[test]
fn test_delete_if_migration_needed_recreates_store() {
    let engine = memory_engine();
    let db = Strata::builder()
        .schema(person_v1())
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");
    db.insert("Person", vec![Value::from("Ada")])
        .expect("Failed to insert row");

    let recreated = Strata::builder()
        .schema(person_v2())
        .schema_version(2)
        .delete_if_migration_needed(true)
        .storage(engine)
        .open_or_create()
        .expect("Recreate failed");

    assert_eq!(recreated.open_outcome(), Some(MigrationOutcome::Recreated));
    assert_eq!(recreated.version().expect("Failed to read version"), 2);
    assert_eq!(
        recreated.row_count("Person").expect("Failed to count rows"),
        0
    );
}

#[test]
fn test_optional_to_required_needs_policy() {
    let engine = memory_engine();
    let mut optional_age = person_v1();
    optional_age
        .add_property(PropertyDescriptor::new("age", PropertyType::Int).with_optional(true))
        .expect("Failed to add property");

    let db = Strata::builder()
        .schema(optional_age)
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");
    db.insert("Person", vec![Value::from("Ada"), Value::Null])
        .expect("Failed to insert row");

    // Without a default policy the diff is ambiguous
    let result = Strata::builder()
        .schema(person_v2())
        .schema_version(2)
        .storage(engine.clone())
        .open_or_create();
    assert_eq!(
        result.expect_err("Open should have failed").kind(),
        &ErrorKind::AmbiguousDefault
    );

    // With zero-fill enabled the null is back-filled
    let migrated = Strata::builder()
        .schema(person_v2())
        .schema_version(2)
        .fill_required_defaults(true)
        .storage(engine)
        .open_or_create()
        .expect("Migration failed");

    let age = migrated
        .column_index("Person", "age")
        .expect("age column missing");
    let row = migrated
        .rows("Person")
        .expect("Failed to open cursor")
        .next()
        .expect("Missing row")
        .expect("Failed to read row");
    assert_eq!(row.get(age).expect("Failed to read age"), Value::Int(0));
}

// ==================== Index / Primary Key Tests ====================

#[test]
fn test_index_and_primary_key_adoption() {
    let engine = memory_engine();
    let db = Strata::builder()
        .schema(person_v2())
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()
        .expect("Failed to open database");
    db.insert("Person", vec![Value::from("Ada"), Value::Int(1)])
        .expect("Failed to insert row");
    db.insert("Person", vec![Value::from("Grace"), Value::Int(2)])
        .expect("Failed to insert row");

    let mut keyed = person_v1();
    keyed
        .add_property(PropertyDescriptor::new("age", PropertyType::Int).with_indexed(true))
        .expect("Failed to add property");
    keyed
        .set_primary_key(Some("age"))
        .expect("Failed to set primary key");

    let migrated = Strata::builder()
        .schema(keyed)
        .schema_version(2)
        .storage(engine)
        .open_or_create()
        .expect("Migration failed");

    let catalog = migrated.catalog().expect("Failed to read catalog");
    let person = catalog.schema("Person").expect("Person schema missing");
    assert_eq!(person.primary_key(), Some("age"));
    assert!(person.property("age").expect("age missing").indexed);

    // The adopted key is enforced for new rows
    let err = migrated
        .insert("Person", vec![Value::from("Edsger"), Value::Int(2)])
        .expect_err("Duplicate key should be rejected");
    assert_eq!(err.kind(), &ErrorKind::UniqueConstraintViolation);
}
