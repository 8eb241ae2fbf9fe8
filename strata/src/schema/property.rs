use crate::common::Value;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use chrono::{DateTime, Utc};
use std::fmt::{Display, Formatter};

/// The closed set of property representations.
///
/// `Object` and `List` are link types: they reference rows of another object
/// type and always carry a target class name in their descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropertyType {
    Int,
    Bool,
    Double,
    Float,
    String,
    Data,
    Date,
    Object,
    List,
}

impl PropertyType {
    /// Returns true for types that reference another object type.
    pub fn is_link(&self) -> bool {
        matches!(self, PropertyType::Object | PropertyType::List)
    }

    /// Returns true for types that support an index.
    ///
    /// Floating-point, binary, and link properties are not indexable.
    pub fn is_indexable(&self) -> bool {
        matches!(
            self,
            PropertyType::Int | PropertyType::Bool | PropertyType::String | PropertyType::Date
        )
    }

    /// Returns the type-specific zero value used to initialize required
    /// columns for existing rows.
    pub fn zero_value(&self) -> Value {
        match self {
            PropertyType::Int => Value::Int(0),
            PropertyType::Bool => Value::Bool(false),
            PropertyType::Double => Value::Double(0.0),
            PropertyType::Float => Value::Float(0.0),
            PropertyType::String => Value::String(String::new()),
            PropertyType::Data => Value::Data(Vec::new()),
            PropertyType::Date => Value::Date(DateTime::<Utc>::UNIX_EPOCH),
            PropertyType::Object => Value::Link(None),
            PropertyType::List => Value::List(Vec::new()),
        }
    }

    /// Returns true when the given value is an acceptable representation for
    /// this type. `Null` is acceptable only for optional properties and is
    /// checked separately by the caller.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PropertyType::Int, Value::Int(_))
                | (PropertyType::Bool, Value::Bool(_))
                | (PropertyType::Double, Value::Double(_))
                | (PropertyType::Float, Value::Float(_))
                | (PropertyType::String, Value::String(_))
                | (PropertyType::Data, Value::Data(_))
                | (PropertyType::Date, Value::Date(_))
                | (PropertyType::Object, Value::Link(_))
                | (PropertyType::List, Value::List(_))
        )
    }
}

impl Display for PropertyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PropertyType::Int => "int",
            PropertyType::Bool => "bool",
            PropertyType::Double => "double",
            PropertyType::Float => "float",
            PropertyType::String => "string",
            PropertyType::Data => "data",
            PropertyType::Date => "date",
            PropertyType::Object => "object",
            PropertyType::List => "list",
        };
        write!(f, "{}", name)
    }
}

/// Metadata for one property of an object type.
///
/// # Invariants
///
/// - `object_class_name` is `Some` exactly when the type is a link type
/// - `indexed` is only valid for indexable types
///
/// Both invariants are enforced by [`PropertyDescriptor::validate`], which
/// runs whenever a property joins an [`ObjectSchema`](super::ObjectSchema).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyDescriptor {
    pub name: String,
    pub property_type: PropertyType,
    pub indexed: bool,
    pub optional: bool,
    pub object_class_name: Option<String>,
}

impl PropertyDescriptor {
    /// Creates a descriptor for a non-link property.
    pub fn new(name: &str, property_type: PropertyType) -> Self {
        PropertyDescriptor {
            name: name.to_string(),
            property_type,
            indexed: false,
            optional: false,
            object_class_name: None,
        }
    }

    /// Creates a descriptor for a link property targeting another type.
    pub fn linked(name: &str, property_type: PropertyType, target_class: &str) -> Self {
        PropertyDescriptor {
            name: name.to_string(),
            property_type,
            indexed: false,
            optional: false,
            object_class_name: Some(target_class.to_string()),
        }
    }

    /// Marks the property as indexed.
    pub fn with_indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }

    /// Marks the property as optional.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Validates the descriptor invariants.
    pub fn validate(&self) -> StrataResult<()> {
        if self.name.is_empty() {
            return Err(StrataError::new(
                "Property name cannot be empty",
                ErrorKind::InvalidSchema,
            ));
        }

        if self.property_type.is_link() && self.object_class_name.is_none() {
            return Err(StrataError::new(
                &format!(
                    "Link property '{}' must declare a target class",
                    self.name
                ),
                ErrorKind::InvalidSchema,
            ));
        }

        if !self.property_type.is_link() && self.object_class_name.is_some() {
            return Err(StrataError::new(
                &format!(
                    "Property '{}' of type {} cannot declare a target class",
                    self.name, self.property_type
                ),
                ErrorKind::InvalidSchema,
            ));
        }

        if self.indexed && !self.property_type.is_indexable() {
            return Err(StrataError::new(
                &format!(
                    "Property '{}' of type {} cannot be indexed",
                    self.name, self.property_type
                ),
                ErrorKind::InvalidSchema,
            ));
        }

        Ok(())
    }

    /// Returns the value a freshly added column holds for existing rows:
    /// `Null` when the property is optional, the type's zero value otherwise.
    pub fn default_value(&self) -> Value {
        if self.optional {
            Value::Null
        } else {
            self.property_type.zero_value()
        }
    }

    /// Returns true when `value` may be stored under this descriptor.
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.optional;
        }
        self.property_type.accepts(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== PropertyType Tests ====================

    #[test]
    fn test_link_types() {
        assert!(PropertyType::Object.is_link());
        assert!(PropertyType::List.is_link());
        assert!(!PropertyType::Int.is_link());
        assert!(!PropertyType::String.is_link());
    }

    #[test]
    fn test_indexable_types() {
        assert!(PropertyType::Int.is_indexable());
        assert!(PropertyType::Bool.is_indexable());
        assert!(PropertyType::String.is_indexable());
        assert!(PropertyType::Date.is_indexable());
        assert!(!PropertyType::Double.is_indexable());
        assert!(!PropertyType::Float.is_indexable());
        assert!(!PropertyType::Data.is_indexable());
        assert!(!PropertyType::Object.is_indexable());
        assert!(!PropertyType::List.is_indexable());
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(PropertyType::Int.zero_value(), Value::Int(0));
        assert_eq!(PropertyType::Bool.zero_value(), Value::Bool(false));
        assert_eq!(PropertyType::Double.zero_value(), Value::Double(0.0));
        assert_eq!(PropertyType::String.zero_value(), Value::String(String::new()));
        assert_eq!(PropertyType::Object.zero_value(), Value::Link(None));
        assert_eq!(PropertyType::List.zero_value(), Value::List(Vec::new()));
    }

    #[test]
    fn test_accepts_matching_variants() {
        assert!(PropertyType::Int.accepts(&Value::Int(1)));
        assert!(PropertyType::String.accepts(&Value::from("x")));
        assert!(PropertyType::Object.accepts(&Value::Link(None)));
        assert!(!PropertyType::Int.accepts(&Value::Double(1.0)));
        assert!(!PropertyType::Bool.accepts(&Value::Null));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", PropertyType::Int), "int");
        assert_eq!(format!("{}", PropertyType::Object), "object");
    }

    // ==================== PropertyDescriptor Tests ====================

    #[test]
    fn test_new_descriptor_defaults() {
        let prop = PropertyDescriptor::new("age", PropertyType::Int);
        assert_eq!(prop.name, "age");
        assert_eq!(prop.property_type, PropertyType::Int);
        assert!(!prop.indexed);
        assert!(!prop.optional);
        assert!(prop.object_class_name.is_none());
        assert!(prop.validate().is_ok());
    }

    #[test]
    fn test_linked_descriptor() {
        let prop = PropertyDescriptor::linked("author", PropertyType::Object, "Person");
        assert_eq!(prop.object_class_name.as_deref(), Some("Person"));
        assert!(prop.validate().is_ok());
    }

    #[test]
    fn test_builder_style_flags() {
        let prop = PropertyDescriptor::new("email", PropertyType::String)
            .with_indexed(true)
            .with_optional(true);
        assert!(prop.indexed);
        assert!(prop.optional);
        assert!(prop.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let prop = PropertyDescriptor::new("", PropertyType::Int);
        let err = prop.validate().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidSchema);
    }

    #[test]
    fn test_validate_rejects_link_without_target() {
        let prop = PropertyDescriptor::new("author", PropertyType::Object);
        let err = prop.validate().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidSchema);
    }

    #[test]
    fn test_validate_rejects_target_on_non_link() {
        let prop = PropertyDescriptor::linked("age", PropertyType::Int, "Person");
        let err = prop.validate().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidSchema);
    }

    #[test]
    fn test_validate_rejects_index_on_unindexable_type() {
        let prop = PropertyDescriptor::new("score", PropertyType::Double).with_indexed(true);
        let err = prop.validate().unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidSchema);
    }

    #[test]
    fn test_default_value_respects_optionality() {
        let required = PropertyDescriptor::new("age", PropertyType::Int);
        assert_eq!(required.default_value(), Value::Int(0));

        let optional = PropertyDescriptor::new("age", PropertyType::Int).with_optional(true);
        assert_eq!(optional.default_value(), Value::Null);
    }

    #[test]
    fn test_descriptor_accepts() {
        let required = PropertyDescriptor::new("age", PropertyType::Int);
        assert!(required.accepts(&Value::Int(5)));
        assert!(!required.accepts(&Value::Null));
        assert!(!required.accepts(&Value::from("5")));

        let optional = PropertyDescriptor::new("nick", PropertyType::String).with_optional(true);
        assert!(optional.accepts(&Value::Null));
        assert!(optional.accepts(&Value::from("joe")));
    }
}
