//! Schema migration engine.
//!
//! This module reconciles the schema persisted in a store with the schema an
//! application declares, transforming stored data to match across versions
//! without data loss or corruption on interruption.
//!
//! # Migration Process
//!
//! A migration:
//! 1. Compares the stored catalog and version against the declared ones
//! 2. Builds a linear path of [`MigrationStep`]s spanning the two versions
//! 3. Applies each step's structural changes and optional user callback
//!    inside one exclusive transaction, then verifies and commits
//!
//! # Registering Migrations
//!
//! ```rust,ignore
//! use strata::migration::Migration;
//!
//! let migration = Migration::new(1, 2, |ctx| {
//!     // populate the new property from existing data
//!     Ok(())
//! });
//!
//! let db = Strata::builder()
//!     .schema_version(2)
//!     .add_migration(migration)
//!     .open_or_create()?;
//! ```
//!
//! # Atomicity
//!
//! Migrations are applied atomically: either every step succeeds and the
//! transaction commits, or the store remains at its pre-migration state.
//! The driver rolls back on the first failing operation, and an interrupted
//! run (process crash before commit) has the same effect.

mod convert;
mod driver;
mod executor;
mod step;

pub use convert::*;
pub use driver::{DriverState, MigrationDriver, MigrationOutcome};
pub use executor::MigrationExecutor;
pub use step::*;

pub(crate) use driver::bootstrap_store;
