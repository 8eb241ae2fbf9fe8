//! Core database handle.

use crate::common::{RowId, Value};
use crate::errors::StrataResult;
use crate::migration::{bootstrap_store, MigrationDriver, MigrationOutcome};
use crate::schema::SchemaCatalog;
use crate::store::{RowCursor, StorageEngine};
use crate::strata_builder::StrataBuilder;
use crate::strata_config::StrataConfig;
use std::sync::{Arc, OnceLock};

/// An open Strata database.
///
/// # Purpose
/// `Strata` is the application-facing handle to one open store. Opening a
/// database resolves the declared catalog against the stored one: an
/// untouched open when they already match, a bootstrap for a fresh store,
/// or a schema migration, all before the handle is returned.
///
/// # Characteristics
/// - **PIMPL**: clones share the same underlying state through
///   `Arc<StrataInner>`
/// - **Resolved on open**: by the time `open_or_create` returns, the stored
///   catalog structurally equals the declared one
/// - **Minimal data surface**: row insertion and cursor access exist to
///   exercise the engine and to write migration callbacks; a full accessor
///   layer is out of scope
///
/// # Examples
///
/// ```rust,ignore
/// let db = Strata::builder()
///     .schema(person_schema)
///     .schema_version(1)
///     .open_or_create()?;
///
/// db.insert("Person", vec!["Ada".into()])?;
/// assert_eq!(db.row_count("Person")?, 1);
/// db.close()?;
/// ```
#[derive(Clone)]
pub struct Strata {
    inner: Arc<StrataInner>,
}

impl std::fmt::Debug for Strata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strata").finish_non_exhaustive()
    }
}

struct StrataInner {
    config: StrataConfig,
    engine: StorageEngine,
    outcome: OnceLock<MigrationOutcome>,
}

impl Strata {
    /// Returns a builder for configuring and opening a database.
    pub fn builder() -> StrataBuilder {
        StrataBuilder::new()
    }

    pub(crate) fn new(config: StrataConfig, engine: StorageEngine) -> Self {
        Strata {
            inner: Arc::new(StrataInner {
                config,
                engine,
                outcome: OnceLock::new(),
            }),
        }
    }

    /// Opens the store and resolves the declared schema against it.
    pub(crate) fn initialize(&self) -> StrataResult<()> {
        self.inner.config.initialize();
        self.inner.engine.open_or_create()?;

        let outcome = if !self.inner.engine.is_initialized()? {
            let declared = self.inner.config.declared_catalog()?;
            bootstrap_store(&self.inner.engine, &declared)?;
            MigrationOutcome::Created
        } else {
            let mut driver =
                MigrationDriver::new(self.inner.engine.clone(), self.inner.config.clone());
            driver.run()?
        };

        let _ = self.inner.outcome.set(outcome);
        Ok(())
    }

    /// How this open resolved: no-op, bootstrap, recreate, or migration.
    pub fn open_outcome(&self) -> Option<MigrationOutcome> {
        self.inner.outcome.get().cloned()
    }

    /// The stored schema version.
    pub fn version(&self) -> StrataResult<u32> {
        self.inner.engine.stored_version()
    }

    /// A snapshot of the stored catalog.
    pub fn catalog(&self) -> StrataResult<SchemaCatalog> {
        self.inner.engine.stored_catalog()
    }

    /// The configuration this database was opened with.
    pub fn config(&self) -> StrataConfig {
        self.inner.config.clone()
    }

    /// The underlying storage engine handle.
    pub fn engine(&self) -> StorageEngine {
        self.inner.engine.clone()
    }

    /// Inserts a row, values given in physical column order.
    pub fn insert(&self, class_name: &str, values: Vec<Value>) -> StrataResult<RowId> {
        self.inner.engine.insert_row(class_name, values)
    }

    /// Opens a cursor over the rows of one type.
    pub fn rows(&self, class_name: &str) -> StrataResult<RowCursor> {
        self.inner.engine.rows(class_name)
    }

    /// Counts the rows of one type.
    pub fn row_count(&self, class_name: &str) -> StrataResult<u64> {
        self.inner.engine.row_count(class_name)
    }

    /// Resolves a property name to the physical column index used by row
    /// handles.
    pub fn column_index(&self, class_name: &str, property_name: &str) -> StrataResult<usize> {
        self.inner.engine.column_index(class_name, property_name)
    }

    /// Closes the database.
    pub fn close(&self) -> StrataResult<()> {
        self.inner.engine.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.engine.is_closed()
    }
}
