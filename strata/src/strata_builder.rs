use crate::errors::{StrataError, StrataResult};
use crate::migration::Migration;
use crate::schema::ObjectSchema;
use crate::store::memory::InMemoryAdapter;
use crate::store::StorageEngine;
use crate::strata::Strata;
use crate::strata_config::StrataConfig;
use std::time::Duration;

/// Builder for creating and configuring a Strata database instance.
///
/// `StrataBuilder` provides a fluent API for declaring schemas, the target
/// schema version, migrations, and open policies before opening or creating
/// a database. It follows the builder pattern and captures errors during
/// configuration so they are propagated when opening the database.
///
/// # Examples
///
/// ```rust,ignore
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Create a database with default settings
/// let db = Strata::builder()
///     .schema(person_schema)
///     .open_or_create()?;
///
/// // Open with a schema bump and a migration callback
/// let db = Strata::builder()
///     .schema(person_schema_v2)
///     .schema_version(2)
///     .add_migration(Migration::new(1, 2, |ctx| Ok(())))
///     .open_or_create()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct StrataBuilder {
    error: Option<StrataError>,
    config: StrataConfig,
    engine: Option<StorageEngine>,
}

impl StrataBuilder {
    /// Creates a new `StrataBuilder` with default configuration.
    ///
    /// The default configuration uses an in-memory store and schema
    /// version 1.
    pub fn new() -> Self {
        StrataBuilder {
            error: None,
            config: StrataConfig::new(),
            engine: None,
        }
    }

    /// Declares an object schema. Repeatable; the declared schemas form the
    /// declared catalog for the target version.
    pub fn schema(mut self, schema: ObjectSchema) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.add_schema(schema) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Sets the declared schema version.
    ///
    /// When opening an existing store, the version is compared against the
    /// stored one to decide whether a migration runs.
    pub fn schema_version(mut self, schema_version: u32) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_schema_version(schema_version) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Adds a migration to be executed when opening the database.
    ///
    /// Migrations are executed in version order when the stored schema
    /// version lags the declared one.
    pub fn add_migration(mut self, migration: Migration) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.add_migration(migration) {
                self.error = Some(e);
            }
        }
        self
    }

    /// When the store needs a migration, wipe it and recreate it with the
    /// declared catalog instead of migrating.
    pub fn delete_if_migration_needed(mut self, value: bool) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_delete_if_migration_needed(value) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Aborts a migration (with rollback) once this much time has elapsed.
    pub fn migration_timeout(mut self, timeout: Duration) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_migration_timeout(timeout) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Fail fast with `AlreadyMigrating` when another migration holds the
    /// store's lock, instead of blocking until it is released.
    pub fn fail_fast_on_concurrent_migration(mut self, value: bool) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_fail_fast_on_concurrent_migration(value) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Back-fill properties that turn required with their type's zero value
    /// instead of failing the diff with `AmbiguousDefault`.
    pub fn fill_required_defaults(mut self, value: bool) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_fill_required_defaults(value) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Supplies the storage engine to open against. Defaults to a fresh
    /// in-memory adapter; pass a shared engine to reopen the same store.
    pub fn storage(mut self, engine: StorageEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Opens or creates a database with the configured settings.
    ///
    /// This finalizes the builder configuration and resolves the stored
    /// schema against the declared one: a no-op open, a fresh bootstrap, or
    /// a migration. Any errors captured during configuration are returned
    /// here.
    pub fn open_or_create(self) -> StrataResult<Strata> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let engine = self
            .engine
            .unwrap_or_else(|| StorageEngine::new(InMemoryAdapter::new()));
        let strata = Strata::new(self.config, engine);
        strata.initialize()?;
        Ok(strata)
    }
}
