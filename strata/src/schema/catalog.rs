use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::schema::ObjectSchema;
use indexmap::IndexMap;

/// The complete set of object-type schemas for one database version.
///
/// # Purpose
/// A `SchemaCatalog` maps class names to [`ObjectSchema`]s and carries the
/// monotonically increasing schema version. Two catalogs take part in every
/// migration: the *stored* catalog read from the persisted metadata region
/// (authoritative for existing data) and the *declared* catalog supplied by
/// the application for the target version.
///
/// # Characteristics
/// - **Immutable snapshot**: the driver owns catalog snapshots for the
///   duration of one migration; the executor only borrows them
/// - **Structural equality**: [`structural_eq`](SchemaCatalog::structural_eq)
///   ignores the version and registration order; schemas are compared by
///   name-addressed content
/// - **Self-validating**: [`validate`](SchemaCatalog::validate) rejects link
///   properties whose target class is absent from the catalog
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SchemaCatalog {
    version: u32,
    schemas: IndexMap<String, ObjectSchema>,
}

impl SchemaCatalog {
    /// Creates an empty catalog at the given version.
    pub fn new(version: u32) -> Self {
        SchemaCatalog {
            version,
            schemas: IndexMap::new(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns a copy of this catalog stamped with a different version.
    pub fn with_version(&self, version: u32) -> Self {
        let mut copy = self.clone();
        copy.version = version;
        copy
    }

    /// Registers an object schema.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidSchema` when a type of the same name is already
    /// registered or the schema itself is invalid.
    pub fn add_schema(&mut self, schema: ObjectSchema) -> StrataResult<()> {
        schema.validate()?;

        if self.schemas.contains_key(schema.class_name()) {
            log::error!("Type '{}' already registered in catalog", schema.class_name());
            return Err(StrataError::new(
                &format!("Type '{}' already registered in catalog", schema.class_name()),
                ErrorKind::InvalidSchema,
            ));
        }

        self.schemas.insert(schema.class_name().to_string(), schema);
        Ok(())
    }

    /// Looks up a schema by class name.
    pub fn schema(&self, class_name: &str) -> Option<&ObjectSchema> {
        self.schemas.get(class_name)
    }

    /// Looks up a schema by class name, failing with `TypeNotFound`.
    pub fn require_schema(&self, class_name: &str) -> StrataResult<&ObjectSchema> {
        self.schema(class_name).ok_or_else(|| {
            StrataError::new(
                &format!("Type '{}' not present in catalog", class_name),
                ErrorKind::TypeNotFound,
            )
        })
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.schemas.contains_key(class_name)
    }

    /// Iterates schemas in registration order.
    pub fn schemas(&self) -> impl Iterator<Item = &ObjectSchema> {
        self.schemas.values()
    }

    /// Iterates class names in registration order.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Validates every schema plus cross-type link references.
    ///
    /// # Errors
    ///
    /// Fails with `DanglingReference` when a link property targets a class
    /// that does not exist in this catalog.
    pub fn validate(&self) -> StrataResult<()> {
        for schema in self.schemas.values() {
            schema.validate()?;

            for property in schema.properties() {
                if let Some(target) = &property.object_class_name {
                    if !self.schemas.contains_key(target) {
                        log::error!(
                            "Property '{}.{}' links to unknown type '{}'",
                            schema.class_name(),
                            property.name,
                            target
                        );
                        return Err(StrataError::new(
                            &format!(
                                "Property '{}.{}' links to unknown type '{}'",
                                schema.class_name(),
                                property.name,
                                target
                            ),
                            ErrorKind::DanglingReference,
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Compares schema content, ignoring version and type registration order.
    pub fn structural_eq(&self, other: &SchemaCatalog) -> bool {
        if self.schemas.len() != other.schemas.len() {
            return false;
        }
        self.schemas.iter().all(|(name, schema)| {
            other
                .schemas
                .get(name)
                .map(|other_schema| schema == other_schema)
                .unwrap_or(false)
        })
    }

    /// Removes a schema from the catalog.
    pub(crate) fn remove_schema(&mut self, class_name: &str) -> StrataResult<ObjectSchema> {
        self.schemas.shift_remove(class_name).ok_or_else(|| {
            StrataError::new(
                &format!("Type '{}' not present in catalog", class_name),
                ErrorKind::TypeNotFound,
            )
        })
    }

    /// Grants mutable access to a schema for structural edits.
    pub(crate) fn schema_mut(&mut self, class_name: &str) -> Option<&mut ObjectSchema> {
        self.schemas.get_mut(class_name)
    }
}
