#![allow(
    dead_code,
    unused_imports,
)]
//! # Strata - Embedded Object Database Core
//!
//! Strata is a lightweight, embedded object-persistence core written in Rust.
//! It stores typed objects described by declared schemas and reconciles those
//! declarations with the schema persisted on disk through a transactional
//! schema migration engine.
//!
//! ## Key Features
//!
//! - **Embedded**: No separate server process required
//! - **Typed Schemas**: Object types described by property descriptors with
//!   indexed, optional, and linked-type metadata
//! - **Versioned Catalogs**: Every store carries a monotonically increasing
//!   schema version alongside its serialized schema set
//! - **Schema Migration**: Declared vs. stored catalogs are diffed into an
//!   ordered change set and applied inside one exclusive transaction
//! - **Crash Safety**: A failed or interrupted migration leaves the store
//!   exactly at its pre-migration state
//! - **Pluggable Storage**: Storage is abstracted behind a transactional
//!   adapter trait; an in-memory reference adapter ships in the crate
//! - **Clean API**: PIMPL pattern provides stable, encapsulated interfaces
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata::schema::{ObjectSchema, PropertyDescriptor, PropertyType};
//! use strata::strata::Strata;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut person = ObjectSchema::new("Person");
//! person.add_property(PropertyDescriptor::new("name", PropertyType::String))?;
//!
//! let db = Strata::builder()
//!     .schema(person)
//!     .schema_version(1)
//!     .open_or_create()?;
//!
//! let name_idx = db.column_index("Person", "name")?;
//! db.insert("Person", vec!["Ada".into()])?;
//! db.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Design Pattern
//!
//! Strata uses the **PIMPL (Pointer To IMPLementation)** design pattern:
//! public handles (`Strata`, `StrataConfig`, `StorageEngine`) wrap an
//! `Arc`-shared inner implementation, so clones are cheap, state is shared,
//! and the public surface stays stable while internals evolve.
//!
//! ## Module Organization
//!
//! - [`common`] - Common types, values, locks, and constants
//! - [`errors`] - Error types and result definitions
//! - [`metadata`] - Persisted database metadata
//! - [`migration`] - Schema migration engine (differ consumers, executor, driver)
//! - [`schema`] - Property descriptors, object schemas, catalogs, and diffing
//! - [`store`] - Storage adapter abstractions and the in-memory adapter
//! - [`strata`] - Core database handle
//! - [`strata_builder`] - Database builder for initialization
//! - [`strata_config`] - Database configuration

use crate::common::LockRegistry;
use std::sync::LazyLock;

pub mod common;
pub mod errors;
pub mod metadata;
pub mod migration;
pub mod schema;
pub mod store;
pub mod strata;
pub mod strata_builder;
pub mod strata_config;

/// Process-wide registry of per-store migration locks.
///
/// The migration driver holds the write side of the lock named after the
/// storage adapter's identity for the whole Executing/Verifying span, so two
/// threads can never migrate the same store concurrently.
pub(crate) static MIGRATION_LOCKS: LazyLock<LockRegistry> = LazyLock::new(LockRegistry::new);
