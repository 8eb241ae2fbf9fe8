use strata::schema::{ObjectSchema, PropertyDescriptor, PropertyType, SchemaCatalog};
use strata::store::memory::InMemoryAdapter;
use strata::store::StorageEngine;

/// Creates a fresh in-memory storage engine. Share the returned handle
/// between opens to simulate reopening the same store.
pub fn memory_engine() -> StorageEngine {
    StorageEngine::new(InMemoryAdapter::new())
}

/// Builds a catalog at the given version from the given schemas.
pub fn catalog(version: u32, schemas: Vec<ObjectSchema>) -> SchemaCatalog {
    let mut catalog = SchemaCatalog::new(version);
    for schema in schemas {
        catalog
            .add_schema(schema)
            .expect("Failed to add schema to catalog");
    }
    catalog
}

pub fn person_v1() -> ObjectSchema {
    let mut schema = ObjectSchema::new("Person");
    schema
        .add_property(PropertyDescriptor::new("name", PropertyType::String))
        .expect("Failed to add property");
    schema
}

pub fn person_v2() -> ObjectSchema {
    let mut schema = person_v1();
    schema
        .add_property(PropertyDescriptor::new("age", PropertyType::Int))
        .expect("Failed to add property");
    schema
}

/// A magazine issue with a cover asset link, for compound-catalog tests.
pub fn issue_schema() -> ObjectSchema {
    let mut schema = ObjectSchema::new("Issue");
    schema
        .add_property(PropertyDescriptor::new("title", PropertyType::String).with_indexed(true))
        .expect("Failed to add property");
    schema
        .add_property(PropertyDescriptor::new("published", PropertyType::Date))
        .expect("Failed to add property");
    schema
        .add_property(PropertyDescriptor::linked(
            "cover",
            PropertyType::Object,
            "Asset",
        ))
        .expect("Failed to add property");
    schema
}

pub fn article_schema() -> ObjectSchema {
    let mut schema = ObjectSchema::new("Article");
    schema
        .add_property(PropertyDescriptor::new("title", PropertyType::String))
        .expect("Failed to add property");
    schema
        .add_property(PropertyDescriptor::new("body", PropertyType::String))
        .expect("Failed to add property");
    schema
        .add_property(PropertyDescriptor::linked(
            "assets",
            PropertyType::List,
            "Asset",
        ))
        .expect("Failed to add property");
    schema
}

pub fn asset_schema() -> ObjectSchema {
    let mut schema = ObjectSchema::new("Asset");
    schema
        .add_property(PropertyDescriptor::new("url", PropertyType::String))
        .expect("Failed to add property");
    schema
        .add_property(PropertyDescriptor::new("size", PropertyType::Int))
        .expect("Failed to add property");
    schema
}
