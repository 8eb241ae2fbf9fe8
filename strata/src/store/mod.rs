//! Storage adapter abstractions.
//!
//! The migration engine never talks to a concrete storage engine directly.
//! It drives the [`StorageAdapter`] trait, which exposes exactly the
//! primitives a migration needs: one exclusive transaction, catalog and
//! metadata access in a reserved region, column-level structure changes, and
//! lazy, restartable row iteration with typed access by validated property
//! index.
//!
//! # Storage Providers
//!
//! Adapters are wrapped in a cloneable [`StorageEngine`] handle
//! (`Arc<dyn StorageAdapter>`), so the same open store can be shared between
//! the database handle, the migration driver, and user callbacks. The crate
//! ships [`memory::InMemoryAdapter`], a complete reference implementation
//! whose transaction works on a working copy of the committed state:
//! rollback or a crash before commit leaves the committed state untouched.

pub mod memory;

mod adapter;
mod rows;

pub use adapter::*;
pub use rows::*;
