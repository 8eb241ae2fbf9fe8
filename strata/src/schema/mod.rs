//! Typed object schemas and catalog diffing.
//!
//! This module contains the in-memory schema model:
//!
//! - [`PropertyType`] / [`PropertyDescriptor`] describe one property of an
//!   object type: its representation, whether it is indexed or optional, and
//!   the target class for link-typed properties.
//! - [`ObjectSchema`] is the ordered, name-unique set of properties for one
//!   object type, plus an optional primary key.
//! - [`SchemaCatalog`] maps class names to object schemas for one schema
//!   version. Two catalogs exist per migration: the *stored* catalog read
//!   from the persisted metadata region, and the *declared* catalog supplied
//!   by the application.
//! - [`SchemaDiffer`] computes the ordered [`ChangeSet`] transforming a
//!   stored catalog into a declared catalog, failing with a schema error
//!   when the two are irreconcilable.
//!
//! Catalogs are immutable snapshots during a migration; nothing in this
//! module mutates persisted state.

mod catalog;
mod differ;
mod object_schema;
mod property;

pub use catalog::*;
pub use differ::*;
pub use object_schema::*;
pub use property::*;
