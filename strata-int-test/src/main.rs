use strata::common::Value;
use strata::errors::StrataResult;
use strata::migration::Migration;
use strata::strata::Strata;
use strata_int_test::test_util::{memory_engine, person_v1, person_v2};

fn main() -> StrataResult<()> {
    println!("Starting migration stress test...");
    let engine = memory_engine();

    let db = Strata::builder()
        .schema(person_v1())
        .schema_version(1)
        .storage(engine.clone())
        .open_or_create()?;

    let count = 1_000_000;
    let start = std::time::Instant::now();
    for i in 0..count {
        db.insert("Person", vec![Value::from(format!("person-{}", i))])?;
    }
    println!("Inserted {} rows in {:?}", count, start.elapsed());

    let start = std::time::Instant::now();
    let migrated = Strata::builder()
        .schema(person_v2())
        .schema_version(2)
        .add_migration(Migration::new(1, 2, |ctx| {
            let age = ctx.property_index("Person", "age")?;
            for row in ctx.rows("Person")? {
                row?.set(age, Value::Int(42))?;
            }
            Ok(())
        }))
        .storage(engine)
        .open_or_create()?;
    println!(
        "Migrated {} rows to schema version {} in {:?}",
        migrated.row_count("Person")?,
        migrated.version()?,
        start.elapsed()
    );

    migrated.close()
}
