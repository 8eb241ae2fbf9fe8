use crate::errors::StrataResult;
use crate::schema::{ChangeSet, ObjectSchema, SchemaCatalog};
use crate::store::{RowCursor, StorageEngine};
use std::sync::Arc;

/// Signature of a user-supplied migration callback.
///
/// Callbacks run after the structural portion of their step, inside the
/// migration transaction, with read/write views over the now-structurally
/// updated rows. Returning an error aborts the whole migration.
pub type MigrationCallback = Arc<dyn Fn(&MigrationContext) -> StrataResult<()> + Send + Sync>;

/// A user-registered migration for one version transition.
///
/// # Purpose
/// Carries the custom data transformation for the step `from_version ->
/// to_version`. Structural changes are computed by the schema differ, so a
/// migration registration only contributes its callback.
///
/// # Characteristics
/// - Immutable after creation
/// - Clone-able: clones share the same underlying callback via `Arc`
///
/// # Usage
/// ```ignore
/// let migration = Migration::new(1, 2, |ctx| {
///     let rows = ctx.rows("Person")?;
///     let full_name = ctx.property_index("Person", "full_name")?;
///     let first = ctx.property_index("Person", "first_name")?;
///     for row in rows {
///         let row = row?;
///         let value = row.get(first)?;
///         row.set(full_name, value)?;
///     }
///     Ok(())
/// });
/// ```
#[derive(Clone)]
pub struct Migration {
    inner: Arc<MigrationInner>,
}

struct MigrationInner {
    from_version: u32,
    to_version: u32,
    callback: MigrationCallback,
}

impl Migration {
    /// Creates a migration for upgrading from one schema version to another.
    pub fn new(
        from_version: u32,
        to_version: u32,
        callback: impl Fn(&MigrationContext) -> StrataResult<()> + Send + Sync + 'static,
    ) -> Self {
        Migration {
            inner: Arc::new(MigrationInner {
                from_version,
                to_version,
                callback: Arc::new(callback),
            }),
        }
    }

    pub fn from_version(&self) -> u32 {
        self.inner.from_version
    }

    pub fn to_version(&self) -> u32 {
        self.inner.to_version
    }

    pub fn callback(&self) -> MigrationCallback {
        self.inner.callback.clone()
    }
}

impl std::fmt::Debug for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migration")
            .field("from_version", &self.inner.from_version)
            .field("to_version", &self.inner.to_version)
            .field("callback", &"<callback>")
            .finish()
    }
}

/// One executable step of a migration path.
///
/// Constructed by the driver at migration start, consumed once by the
/// executor, and discarded after commit. The full structural change set is
/// attached to the first step of the path; later steps advance the version
/// and run their callbacks against the already-final structure.
#[derive(Clone)]
pub struct MigrationStep {
    pub from_version: u32,
    pub to_version: u32,
    pub change_set: ChangeSet,
    pub callback: Option<MigrationCallback>,
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("from_version", &self.from_version)
            .field("to_version", &self.to_version)
            .field("change_set", &self.change_set)
            .field(
                "callback",
                &self.callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

/// Read/write view handed to migration callbacks.
///
/// Exposes the pre-migration catalog (for interpreting what existed), the
/// catalog of the step's target version (already persisted when the callback
/// runs, so callbacks observe the new version), and row access through the
/// open migration transaction. Callbacks must not begin their own
/// transactions; the storage adapter rejects a nested `begin`.
pub struct MigrationContext<'a> {
    old_catalog: &'a SchemaCatalog,
    new_catalog: &'a SchemaCatalog,
    engine: &'a StorageEngine,
}

impl<'a> MigrationContext<'a> {
    pub(crate) fn new(
        old_catalog: &'a SchemaCatalog,
        new_catalog: &'a SchemaCatalog,
        engine: &'a StorageEngine,
    ) -> Self {
        MigrationContext {
            old_catalog,
            new_catalog,
            engine,
        }
    }

    /// The catalog as it was before the migration started.
    pub fn old_catalog(&self) -> &SchemaCatalog {
        self.old_catalog
    }

    /// The catalog of the step's target version.
    pub fn new_catalog(&self) -> &SchemaCatalog {
        self.new_catalog
    }

    /// The schema version the step advances to.
    pub fn version(&self) -> u32 {
        self.new_catalog.version()
    }

    /// Convenience lookup of a schema in the target catalog.
    pub fn schema(&self, class_name: &str) -> StrataResult<&ObjectSchema> {
        self.new_catalog.require_schema(class_name)
    }

    /// Opens a cursor over the rows of one type, observing the migration
    /// transaction's working state.
    pub fn rows(&self, class_name: &str) -> StrataResult<RowCursor> {
        self.engine.rows(class_name)
    }

    /// Resolves a property name to the physical column index used by row
    /// handles.
    pub fn property_index(&self, class_name: &str, property_name: &str) -> StrataResult<usize> {
        self.engine.column_index(class_name, property_name)
    }
}
