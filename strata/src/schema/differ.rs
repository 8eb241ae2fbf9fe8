use crate::common::Value;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::migration::conversions;
use crate::schema::{ObjectSchema, PropertyDescriptor, PropertyType, SchemaCatalog};

/// One atomic structural change between two catalogs.
///
/// Changes are emitted by the [`SchemaDiffer`] in dependency order: additions
/// before alterations referencing them, removals after every other operation,
/// and primary key changes last, once the referenced property is guaranteed
/// to exist.
#[derive(Debug, Clone)]
pub enum SchemaChange {
    /// Introduce a new object type with all of its properties.
    AddType { schema: ObjectSchema },
    /// Drop an object type and all of its stored rows.
    RemoveType { class_name: String },
    /// Append a property; every existing row is initialized to `default`
    /// before any later change runs.
    AddProperty {
        class_name: String,
        property: PropertyDescriptor,
        default: Value,
    },
    /// Drop a property and its stored column.
    RemoveProperty {
        class_name: String,
        property_name: String,
    },
    /// Re-encode a property under a new representation using the registered
    /// conversion for the `(from, to)` pair.
    ChangePropertyType {
        class_name: String,
        property_name: String,
        from: PropertyType,
        to: PropertyType,
    },
    /// Add or drop the index on a property.
    ChangeIndexed {
        class_name: String,
        property_name: String,
        indexed: bool,
    },
    /// Flip a property between optional and required. Moving to required
    /// carries the default that back-fills stored nulls.
    ChangeOptional {
        class_name: String,
        property_name: String,
        optional: bool,
        default: Option<Value>,
    },
    /// Designate (or clear) the primary key of a type.
    SetPrimaryKey {
        class_name: String,
        primary_key: Option<String>,
    },
}

/// Ordered structural delta between two catalogs.
///
/// Invariant: applying a change set to the stored catalog yields a catalog
/// structurally equal to the declared catalog.
/// [`ChangeSet::apply_to`] realizes the delta on a catalog snapshot so the
/// invariant is checkable without touching storage.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<SchemaChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        ChangeSet { changes: Vec::new() }
    }

    pub fn push(&mut self, change: SchemaChange) {
        self.changes.push(change);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaChange> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Applies the structural delta to a catalog snapshot, producing the
    /// transformed catalog. Purely an in-memory transformation; stored data
    /// is only ever changed by the migration executor.
    pub fn apply_to(&self, base: &SchemaCatalog) -> StrataResult<SchemaCatalog> {
        let mut catalog = base.clone();

        for change in &self.changes {
            match change {
                SchemaChange::AddType { schema } => {
                    catalog.add_schema(schema.clone())?;
                }
                SchemaChange::RemoveType { class_name } => {
                    catalog.remove_schema(class_name)?;
                }
                SchemaChange::AddProperty {
                    class_name,
                    property,
                    ..
                } => {
                    let schema = require_schema_mut(&mut catalog, class_name)?;
                    schema.add_property(property.clone())?;
                }
                SchemaChange::RemoveProperty {
                    class_name,
                    property_name,
                } => {
                    let schema = require_schema_mut(&mut catalog, class_name)?;
                    schema.remove_property(property_name)?;
                }
                SchemaChange::ChangePropertyType {
                    class_name,
                    property_name,
                    to,
                    ..
                } => {
                    let schema = require_schema_mut(&mut catalog, class_name)?;
                    let property = require_property_mut(schema, class_name, property_name)?;
                    property.property_type = *to;
                }
                SchemaChange::ChangeIndexed {
                    class_name,
                    property_name,
                    indexed,
                } => {
                    let schema = require_schema_mut(&mut catalog, class_name)?;
                    let property = require_property_mut(schema, class_name, property_name)?;
                    property.indexed = *indexed;
                }
                SchemaChange::ChangeOptional {
                    class_name,
                    property_name,
                    optional,
                    ..
                } => {
                    let schema = require_schema_mut(&mut catalog, class_name)?;
                    let property = require_property_mut(schema, class_name, property_name)?;
                    property.optional = *optional;
                }
                SchemaChange::SetPrimaryKey {
                    class_name,
                    primary_key,
                } => {
                    let schema = require_schema_mut(&mut catalog, class_name)?;
                    schema.set_primary_key(primary_key.as_deref())?;
                }
            }
        }

        Ok(catalog)
    }
}

fn require_schema_mut<'a>(
    catalog: &'a mut SchemaCatalog,
    class_name: &str,
) -> StrataResult<&'a mut ObjectSchema> {
    catalog.schema_mut(class_name).ok_or_else(|| {
        StrataError::new(
            &format!("Type '{}' not present in catalog", class_name),
            ErrorKind::TypeNotFound,
        )
    })
}

fn require_property_mut<'a>(
    schema: &'a mut ObjectSchema,
    class_name: &str,
    property_name: &str,
) -> StrataResult<&'a mut PropertyDescriptor> {
    schema.property_mut(property_name).ok_or_else(|| {
        StrataError::new(
            &format!(
                "Property '{}.{}' not present in catalog",
                class_name, property_name
            ),
            ErrorKind::PropertyNotFound,
        )
    })
}

/// Policy knobs consulted while diffing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// When an optional property becomes required, back-fill stored nulls
    /// with the type's zero value instead of failing with `AmbiguousDefault`.
    pub fill_required_defaults: bool,
}

/// Computes the ordered set of structural changes needed to transform a
/// stored catalog into a declared catalog.
///
/// The differ is purely static: it fails with a schema error before any
/// transaction opens when the two catalogs are irreconcilable
/// (`IncompatibleTypeChange`, `AmbiguousDefault`, `DanglingReference`).
pub struct SchemaDiffer {
    options: DiffOptions,
}

impl SchemaDiffer {
    pub fn new() -> Self {
        SchemaDiffer {
            options: DiffOptions::default(),
        }
    }

    pub fn with_options(options: DiffOptions) -> Self {
        SchemaDiffer { options }
    }

    /// Diffs `stored` against `declared`.
    ///
    /// Emission order: `AddType` (declared order, each carrying its full
    /// property set), `AddProperty`, then per-property alterations, then
    /// `RemoveProperty`, then `RemoveType`, and `SetPrimaryKey` last.
    pub fn diff(
        &self,
        stored: &SchemaCatalog,
        declared: &SchemaCatalog,
    ) -> StrataResult<ChangeSet> {
        stored.validate()?;
        declared.validate()?;

        let mut changes = ChangeSet::new();

        // New types, with all their properties as one atomic sub-step.
        for schema in declared.schemas() {
            if !stored.contains(schema.class_name()) {
                changes.push(SchemaChange::AddType {
                    schema: schema.clone(),
                });
            }
        }

        // New properties on surviving types.
        for schema in declared.schemas() {
            let Some(stored_schema) = stored.schema(schema.class_name()) else {
                continue;
            };
            for property in schema.properties() {
                if stored_schema.property(&property.name).is_none() {
                    changes.push(SchemaChange::AddProperty {
                        class_name: schema.class_name().to_string(),
                        property: property.clone(),
                        default: property.default_value(),
                    });
                }
            }
        }

        // Alterations of surviving properties.
        for schema in declared.schemas() {
            let Some(stored_schema) = stored.schema(schema.class_name()) else {
                continue;
            };
            for property in schema.properties() {
                let Some(stored_property) = stored_schema.property(&property.name) else {
                    continue;
                };
                self.diff_property(schema.class_name(), stored_property, property, &mut changes)?;
            }
        }

        // Dropped properties on surviving types.
        for schema in declared.schemas() {
            let Some(stored_schema) = stored.schema(schema.class_name()) else {
                continue;
            };
            for stored_property in stored_schema.properties() {
                if schema.property(&stored_property.name).is_none() {
                    changes.push(SchemaChange::RemoveProperty {
                        class_name: schema.class_name().to_string(),
                        property_name: stored_property.name.clone(),
                    });
                }
            }
        }

        // Dropped types.
        for stored_schema in stored.schemas() {
            if !declared.contains(stored_schema.class_name()) {
                changes.push(SchemaChange::RemoveType {
                    class_name: stored_schema.class_name().to_string(),
                });
            }
        }

        // Primary key changes, after the referenced property exists.
        for schema in declared.schemas() {
            let Some(stored_schema) = stored.schema(schema.class_name()) else {
                continue;
            };
            if stored_schema.primary_key() != schema.primary_key() {
                changes.push(SchemaChange::SetPrimaryKey {
                    class_name: schema.class_name().to_string(),
                    primary_key: schema.primary_key().map(|pk| pk.to_string()),
                });
            }
        }

        Ok(changes)
    }

    fn diff_property(
        &self,
        class_name: &str,
        stored: &PropertyDescriptor,
        declared: &PropertyDescriptor,
        changes: &mut ChangeSet,
    ) -> StrataResult<()> {
        if stored.property_type != declared.property_type {
            if stored.property_type.is_link()
                || declared.property_type.is_link()
                || !conversions().supports(stored.property_type, declared.property_type)
            {
                log::error!(
                    "No conversion from {} to {} for '{}.{}'",
                    stored.property_type,
                    declared.property_type,
                    class_name,
                    declared.name
                );
                return Err(StrataError::new(
                    &format!(
                        "Property '{}.{}' cannot change type from {} to {}",
                        class_name, declared.name, stored.property_type, declared.property_type
                    ),
                    ErrorKind::IncompatibleTypeChange,
                ));
            }

            changes.push(SchemaChange::ChangePropertyType {
                class_name: class_name.to_string(),
                property_name: declared.name.clone(),
                from: stored.property_type,
                to: declared.property_type,
            });
        } else if stored.object_class_name != declared.object_class_name {
            // Same link kind, different target type. Data cannot be carried
            // across, so this is a breaking change.
            return Err(StrataError::new(
                &format!(
                    "Link property '{}.{}' cannot change target from '{}' to '{}'",
                    class_name,
                    declared.name,
                    stored.object_class_name.as_deref().unwrap_or("?"),
                    declared.object_class_name.as_deref().unwrap_or("?")
                ),
                ErrorKind::IncompatibleTypeChange,
            ));
        }

        if stored.optional != declared.optional {
            if stored.optional && !declared.optional {
                if !self.options.fill_required_defaults {
                    return Err(StrataError::new(
                        &format!(
                            "Property '{}.{}' became required with no default policy",
                            class_name, declared.name
                        ),
                        ErrorKind::AmbiguousDefault,
                    ));
                }
                changes.push(SchemaChange::ChangeOptional {
                    class_name: class_name.to_string(),
                    property_name: declared.name.clone(),
                    optional: false,
                    default: Some(declared.property_type.zero_value()),
                });
            } else {
                changes.push(SchemaChange::ChangeOptional {
                    class_name: class_name.to_string(),
                    property_name: declared.name.clone(),
                    optional: true,
                    default: None,
                });
            }
        }

        if stored.indexed != declared.indexed {
            changes.push(SchemaChange::ChangeIndexed {
                class_name: class_name.to_string(),
                property_name: declared.name.clone(),
                indexed: declared.indexed,
            });
        }

        Ok(())
    }
}

impl Default for SchemaDiffer {
    fn default() -> Self {
        Self::new()
    }
}
