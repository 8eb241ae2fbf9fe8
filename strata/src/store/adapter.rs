use crate::common::{RowId, Value};
use crate::errors::StrataResult;
use crate::metadata::DatabaseMetadata;
use crate::schema::{ObjectSchema, PropertyDescriptor, PropertyType, SchemaCatalog};
use crate::store::RowCursor;
use std::ops::Deref;
use std::sync::Arc;

/// Low-level interface the migration engine requires from a storage engine.
///
/// # Purpose
/// Defines the contract all storage implementations must follow. An adapter
/// manages the persisted state of one store: the reserved metadata region
/// (integer schema version plus serialized schema set, read before any user
/// data access), per-type row tables, and one exclusive transaction.
///
/// # Key Responsibilities
/// - **Lifecycle**: open, close
/// - **Transaction**: begin/commit/rollback of a single exclusive transaction;
///   while it is open, outside readers observe only the committed state
/// - **Metadata Region**: read/write the stored catalog and database metadata
/// - **Structure**: add/remove types, add/remove/rename columns, flip index,
///   optionality and primary key designations
/// - **Rows**: insert, count, and lazily iterate row handles with typed
///   access by validated property index
///
/// # Implementations
/// - [`memory::InMemoryAdapter`](crate::store::memory::InMemoryAdapter):
///   in-memory reference implementation used for testing and temporary stores
///
/// # Thread Safety
/// Implementers must be `Send + Sync` for safe use in concurrent contexts.
pub trait StorageAdapter: Send + Sync {
    /// Opens or creates the store. Must be called before any other operation.
    fn open_or_create(&self) -> StrataResult<()>;

    /// Closes the store. An open transaction is rolled back first.
    fn close(&self) -> StrataResult<()>;

    /// Checks if the store has been closed.
    fn is_closed(&self) -> bool;

    /// A stable identifier for the underlying store (file path or equivalent),
    /// used to key the process-wide migration lock.
    fn identity(&self) -> String;

    /// The storage engine's own version string, recorded in fresh metadata.
    fn engine_version(&self) -> String;

    /// Returns true once a catalog and metadata have been bootstrapped.
    fn is_initialized(&self) -> StrataResult<bool>;

    /// Begins the store's single exclusive transaction.
    ///
    /// A second `begin` while a transaction is open is rejected; migration
    /// callbacks must not spawn nested transactions.
    fn begin_exclusive_transaction(&self) -> StrataResult<()>;

    /// Commits the open transaction, atomically publishing the working state.
    fn commit_transaction(&self) -> StrataResult<()>;

    /// Rolls back the open transaction, discarding the working state.
    fn rollback_transaction(&self) -> StrataResult<()>;

    /// Returns true while the exclusive transaction is open.
    fn in_transaction(&self) -> bool;

    /// Reads the stored schema version from the metadata region.
    fn stored_version(&self) -> StrataResult<u32>;

    /// Reads the stored catalog from the metadata region.
    fn stored_catalog(&self) -> StrataResult<SchemaCatalog>;

    /// Persists the catalog (and its version) to the metadata region.
    /// Requires an open transaction.
    fn write_catalog(&self, catalog: &SchemaCatalog) -> StrataResult<()>;

    /// Reads the database metadata.
    fn metadata(&self) -> StrataResult<DatabaseMetadata>;

    /// Persists the database metadata. Requires an open transaction.
    fn write_metadata(&self, metadata: &DatabaseMetadata) -> StrataResult<()>;

    /// Creates an empty table for a new object type. Requires an open
    /// transaction.
    fn add_type(&self, schema: &ObjectSchema) -> StrataResult<()>;

    /// Drops a type's table together with all stored rows. Requires an open
    /// transaction.
    fn remove_type(&self, class_name: &str) -> StrataResult<()>;

    /// Appends a column, initializing it to `default` for every existing row
    /// before returning. Requires an open transaction.
    fn add_column(
        &self,
        class_name: &str,
        property: &PropertyDescriptor,
        default: &Value,
    ) -> StrataResult<()>;

    /// Drops a column and its stored data. Requires an open transaction.
    fn remove_column(&self, class_name: &str, property_name: &str) -> StrataResult<()>;

    /// Renames a column in place. Requires an open transaction.
    fn rename_column(
        &self,
        class_name: &str,
        old_name: &str,
        new_name: &str,
    ) -> StrataResult<()>;

    /// Re-declares a column under a new representation. The caller is
    /// responsible for re-encoding stored values. Requires an open
    /// transaction.
    fn set_column_type(
        &self,
        class_name: &str,
        property_name: &str,
        new_type: PropertyType,
    ) -> StrataResult<()>;

    /// Builds or drops the index on a column. Requires an open transaction.
    fn set_indexed(&self, class_name: &str, property_name: &str, indexed: bool)
        -> StrataResult<()>;

    /// Flips a column between optional and required. Moving to required
    /// back-fills stored nulls with `default`. Requires an open transaction.
    fn set_optional(
        &self,
        class_name: &str,
        property_name: &str,
        optional: bool,
        default: Option<&Value>,
    ) -> StrataResult<()>;

    /// Designates (or clears) the primary key, verifying uniqueness and
    /// non-null of existing values. Requires an open transaction.
    fn set_primary_key(
        &self,
        class_name: &str,
        property_name: Option<&str>,
    ) -> StrataResult<()>;

    /// Resolves a property name to the physical column index of its table.
    fn column_index(&self, class_name: &str, property_name: &str) -> StrataResult<usize>;

    /// Inserts a row given values in physical column order.
    fn insert_row(&self, class_name: &str, values: Vec<Value>) -> StrataResult<RowId>;

    /// Counts the rows of one type.
    fn row_count(&self, class_name: &str) -> StrataResult<u64>;

    /// Opens a lazy, restartable cursor over the rows of one type. While a
    /// transaction is open the cursor observes the working state.
    fn rows(&self, class_name: &str) -> StrataResult<RowCursor>;

    /// Deletes all content, returning the store to its uninitialized state.
    /// Must not be called while a transaction is open.
    fn purge(&self) -> StrataResult<()>;
}

/// High-level wrapper for accessing a storage adapter.
///
/// # Purpose
/// `StorageEngine` provides the handle the rest of the crate passes around.
/// It wraps a concrete [`StorageAdapter`] implementation in an `Arc` for
/// efficient, thread-safe sharing between the database handle, the migration
/// driver, and user callbacks.
///
/// # Characteristics
/// - **Thread-Safe**: can be safely cloned and shared across threads
/// - **Adapter-Agnostic**: works with any `StorageAdapter` implementation
/// - **Ergonomic**: implements `Deref` for seamless access to adapter methods
/// - **Lightweight**: cloning only increments the reference count
#[derive(Clone)]
pub struct StorageEngine {
    inner: Arc<dyn StorageAdapter>,
}

impl StorageEngine {
    /// Creates a new `StorageEngine` wrapping an adapter implementation.
    pub fn new<T: StorageAdapter + 'static>(inner: T) -> Self {
        StorageEngine {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for StorageEngine {
    type Target = Arc<dyn StorageAdapter>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
