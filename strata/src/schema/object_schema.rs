use crate::common::RESERVED_NAMES;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::schema::{PropertyDescriptor, PropertyType};
use indexmap::IndexMap;

/// The ordered property set of one object type.
///
/// # Purpose
/// `ObjectSchema` describes the shape of one persisted object type: its
/// class name, the declared-order sequence of property descriptors (names
/// unique within the type), and the optional primary key.
///
/// # Characteristics
/// - **Ordered**: the declared property sequence is preserved, and property
///   lookups resolve to a stable index usable on the hot path; physical
///   column order is owned by the storage adapter
/// - **Validated**: descriptors are validated as they are added; primary keys
///   must reference an existing non-optional `Int` or `String` property
/// - **Cloneable**: schemas are plain data and are cloned into catalog
///   snapshots for the duration of a migration
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectSchema {
    class_name: String,
    properties: IndexMap<String, PropertyDescriptor>,
    primary_key: Option<String>,
}

impl ObjectSchema {
    /// Creates an empty schema for the given class name.
    pub fn new(class_name: &str) -> Self {
        ObjectSchema {
            class_name: class_name.to_string(),
            properties: IndexMap::new(),
            primary_key: None,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Appends a property to the schema.
    ///
    /// # Errors
    ///
    /// Fails with `DuplicateProperty` when a property of the same name exists,
    /// or with `InvalidSchema` when the descriptor violates its invariants.
    pub fn add_property(&mut self, property: PropertyDescriptor) -> StrataResult<()> {
        property.validate()?;

        if self.properties.contains_key(&property.name) {
            log::error!(
                "Property '{}' already declared on type '{}'",
                property.name,
                self.class_name
            );
            return Err(StrataError::new(
                &format!(
                    "Property '{}' already declared on type '{}'",
                    property.name, self.class_name
                ),
                ErrorKind::DuplicateProperty,
            ));
        }

        self.properties.insert(property.name.clone(), property);
        Ok(())
    }

    /// Designates a property as the primary key, or clears it with `None`.
    ///
    /// # Errors
    ///
    /// Fails with `PropertyNotFound` when the property does not exist, or
    /// with `InvalidSchema` when it is optional or not an `Int`/`String`
    /// property (the only representations with object-identity semantics).
    pub fn set_primary_key(&mut self, property_name: Option<&str>) -> StrataResult<()> {
        let Some(name) = property_name else {
            self.primary_key = None;
            return Ok(());
        };

        let property = self.properties.get(name).ok_or_else(|| {
            StrataError::new(
                &format!(
                    "Primary key property '{}' not declared on type '{}'",
                    name, self.class_name
                ),
                ErrorKind::PropertyNotFound,
            )
        })?;

        if !matches!(property.property_type, PropertyType::Int | PropertyType::String) {
            return Err(StrataError::new(
                &format!(
                    "Primary key '{}' on type '{}' must be int or string, found {}",
                    name, self.class_name, property.property_type
                ),
                ErrorKind::InvalidSchema,
            ));
        }

        if property.optional {
            return Err(StrataError::new(
                &format!(
                    "Primary key '{}' on type '{}' cannot be optional",
                    name, self.class_name
                ),
                ErrorKind::InvalidSchema,
            ));
        }

        self.primary_key = Some(name.to_string());
        Ok(())
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    /// Returns the property stored at the given column index.
    pub fn property_at(&self, index: usize) -> Option<&PropertyDescriptor> {
        self.properties.get_index(index).map(|(_, p)| p)
    }

    /// Resolves a property name to its stable column index.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.properties.get_index_of(name)
    }

    /// Resolves a property name to its column index, failing with
    /// `PropertyNotFound` when absent.
    pub fn require_index(&self, name: &str) -> StrataResult<usize> {
        self.index_of(name).ok_or_else(|| {
            StrataError::new(
                &format!(
                    "Property '{}' not declared on type '{}'",
                    name, self.class_name
                ),
                ErrorKind::PropertyNotFound,
            )
        })
    }

    /// Iterates properties in declared order.
    pub fn properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.values()
    }

    /// Iterates property names in declared order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Validates every descriptor plus the primary key designation.
    pub fn validate(&self) -> StrataResult<()> {
        if self.class_name.is_empty() {
            return Err(StrataError::new(
                "Class name cannot be empty",
                ErrorKind::InvalidSchema,
            ));
        }

        if RESERVED_NAMES.contains(&self.class_name.as_str()) {
            return Err(StrataError::new(
                &format!("Class name '{}' is reserved", self.class_name),
                ErrorKind::InvalidSchema,
            ));
        }

        for property in self.properties.values() {
            property.validate()?;
        }

        if let Some(pk) = &self.primary_key {
            if !self.properties.contains_key(pk) {
                return Err(StrataError::new(
                    &format!(
                        "Primary key '{}' not declared on type '{}'",
                        pk, self.class_name
                    ),
                    ErrorKind::PropertyNotFound,
                ));
            }
        }

        Ok(())
    }

    /// Removes a property, preserving the order of the remaining columns.
    pub(crate) fn remove_property(&mut self, name: &str) -> StrataResult<PropertyDescriptor> {
        if self.primary_key.as_deref() == Some(name) {
            self.primary_key = None;
        }
        self.properties.shift_remove(name).ok_or_else(|| {
            StrataError::new(
                &format!(
                    "Property '{}' not declared on type '{}'",
                    name, self.class_name
                ),
                ErrorKind::PropertyNotFound,
            )
        })
    }

    /// Grants mutable access to a property descriptor for structural edits.
    pub(crate) fn property_mut(&mut self, name: &str) -> Option<&mut PropertyDescriptor> {
        self.properties.get_mut(name)
    }
}

// Structural equality: same class name, same primary key, and the same
// properties addressed by name. Declaration order is not part of a schema's
// identity; physical column order belongs to the storage adapter, which the
// change model only ever appends to.
impl PartialEq for ObjectSchema {
    fn eq(&self, other: &Self) -> bool {
        self.class_name == other.class_name
            && self.primary_key == other.primary_key
            && self.properties.len() == other.properties.len()
            && self
                .properties
                .iter()
                .all(|(name, prop)| other.properties.get(name) == Some(prop))
    }
}
