//! Configuration management for a Strata database.

use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::common::DEFAULT_SCHEMA_VERSION;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::migration::Migration;
use crate::schema::{ObjectSchema, SchemaCatalog};

/// Public interface for Strata database configuration.
///
/// Carries the declared schema catalog, the target schema version, the
/// registered migrations, and the policies consulted while migrating.
/// Settings reject mutation once the configuration has been used to open a
/// database.
///
/// # Examples
///
/// ```rust,ignore
/// let db = Strata::builder()
///     .schema(person_schema)
///     .schema_version(2)
///     .open_or_create()?;
/// ```
#[derive(Clone)]
pub struct StrataConfig {
    /// The pointer to implementation. Uses Arc for cheap cloning and thread
    /// safety.
    inner: Arc<StrataConfigInner>,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StrataConfig {
    /// Creates a new configuration instance with default values.
    pub fn new() -> Self {
        StrataConfig {
            inner: Arc::new(StrataConfigInner::new()),
        }
    }

    /// Returns the declared schema version.
    pub fn schema_version(&self) -> u32 {
        self.inner.schema_version.load(Ordering::Relaxed)
    }

    /// Sets the declared schema version.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration has already been initialized.
    pub fn set_schema_version(&self, version: u32) -> StrataResult<()> {
        self.inner.reject_after_init("Schema version")?;
        self.inner.schema_version.store(version, Ordering::Relaxed);
        Ok(())
    }

    /// Registers an object schema in the declared catalog.
    ///
    /// # Errors
    ///
    /// Returns error if already initialized or a type of the same name is
    /// already declared.
    pub fn add_schema(&self, schema: ObjectSchema) -> StrataResult<()> {
        self.inner.reject_after_init("Declared schemas")?;
        schema.validate()?;

        let mut schemas = self.inner.schemas.write();
        if schemas.contains_key(schema.class_name()) {
            log::error!("Type '{}' already declared", schema.class_name());
            return Err(StrataError::new(
                &format!("Type '{}' already declared", schema.class_name()),
                ErrorKind::InvalidSchema,
            ));
        }
        schemas.insert(schema.class_name().to_string(), schema);
        Ok(())
    }

    /// Builds the declared catalog at the configured schema version.
    ///
    /// # Errors
    ///
    /// Returns error when the declared schemas are invalid as a whole, e.g.
    /// a link property targets an undeclared type.
    pub fn declared_catalog(&self) -> StrataResult<SchemaCatalog> {
        let mut catalog = SchemaCatalog::new(self.schema_version());
        for schema in self.inner.schemas.read().values() {
            catalog.add_schema(schema.clone())?;
        }
        catalog.validate()?;
        Ok(catalog)
    }

    /// Adds a migration to the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if already initialized or the migration does not move
    /// forward.
    pub fn add_migration(&self, migration: Migration) -> StrataResult<()> {
        self.inner.reject_after_init("Migrations")?;
        if migration.from_version() >= migration.to_version() {
            log::error!(
                "Migration {} -> {} does not advance the schema version",
                migration.from_version(),
                migration.to_version()
            );
            return Err(StrataError::new(
                &format!(
                    "Migration {} -> {} does not advance the schema version",
                    migration.from_version(),
                    migration.to_version()
                ),
                ErrorKind::ValidationError,
            ));
        }

        self.inner
            .migrations
            .entry(migration.from_version())
            .or_default()
            .insert(migration.to_version(), migration);
        Ok(())
    }

    /// Gets all registered migrations, indexed from-version -> to-version.
    pub fn migrations(&self) -> DashMap<u32, BTreeMap<u32, Migration>> {
        self.inner.migrations.clone()
    }

    /// Whether a store needing migration is wiped and recreated instead.
    pub fn delete_if_migration_needed(&self) -> bool {
        self.inner.delete_if_migration_needed.load(Ordering::Relaxed)
    }

    pub fn set_delete_if_migration_needed(&self, value: bool) -> StrataResult<()> {
        self.inner.reject_after_init("delete_if_migration_needed")?;
        self.inner
            .delete_if_migration_needed
            .store(value, Ordering::Relaxed);
        Ok(())
    }

    /// Whether a contended migration lock fails fast with `AlreadyMigrating`
    /// instead of blocking.
    pub fn fail_fast_on_concurrent_migration(&self) -> bool {
        self.inner
            .fail_fast_on_concurrent_migration
            .load(Ordering::Relaxed)
    }

    pub fn set_fail_fast_on_concurrent_migration(&self, value: bool) -> StrataResult<()> {
        self.inner
            .reject_after_init("fail_fast_on_concurrent_migration")?;
        self.inner
            .fail_fast_on_concurrent_migration
            .store(value, Ordering::Relaxed);
        Ok(())
    }

    /// Whether properties turning required are back-filled with zero values.
    pub fn fill_required_defaults(&self) -> bool {
        self.inner.fill_required_defaults.load(Ordering::Relaxed)
    }

    pub fn set_fill_required_defaults(&self, value: bool) -> StrataResult<()> {
        self.inner.reject_after_init("fill_required_defaults")?;
        self.inner
            .fill_required_defaults
            .store(value, Ordering::Relaxed);
        Ok(())
    }

    /// The caller-supplied migration timeout, if any.
    pub fn migration_timeout(&self) -> Option<Duration> {
        *self.inner.migration_timeout.read()
    }

    pub fn set_migration_timeout(&self, timeout: Duration) -> StrataResult<()> {
        self.inner.reject_after_init("migration_timeout")?;
        *self.inner.migration_timeout.write() = Some(timeout);
        Ok(())
    }

    /// Marks the configuration as initialized; settings are frozen from here.
    pub(crate) fn initialize(&self) {
        self.inner.configured.store(true, Ordering::Relaxed);
    }
}

/// Private implementation of Strata configuration.
///
/// This struct contains all internal state and implementation logic.
/// It is not exposed in the public API.
struct StrataConfigInner {
    /// Indicates whether this configuration has been initialized
    configured: AtomicBool,
    /// Declared schema version
    schema_version: AtomicU32,
    /// Declared object schemas, in declaration order
    schemas: RwLock<IndexMap<String, ObjectSchema>>,
    /// Map of migrations indexed by from_version -> to_version -> Migration
    migrations: DashMap<u32, BTreeMap<u32, Migration>>,
    delete_if_migration_needed: AtomicBool,
    fail_fast_on_concurrent_migration: AtomicBool,
    fill_required_defaults: AtomicBool,
    migration_timeout: RwLock<Option<Duration>>,
}

impl StrataConfigInner {
    fn new() -> Self {
        StrataConfigInner {
            configured: AtomicBool::new(false),
            schema_version: AtomicU32::new(DEFAULT_SCHEMA_VERSION),
            schemas: RwLock::new(IndexMap::new()),
            migrations: DashMap::new(),
            delete_if_migration_needed: AtomicBool::new(false),
            fail_fast_on_concurrent_migration: AtomicBool::new(false),
            fill_required_defaults: AtomicBool::new(false),
            migration_timeout: RwLock::new(None),
        }
    }

    fn reject_after_init(&self, what: &str) -> StrataResult<()> {
        if self.configured.load(Ordering::Relaxed) {
            log::error!("{} cannot be changed after initialization", what);
            return Err(StrataError::new(
                &format!("{} cannot be changed after initialization", what),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
