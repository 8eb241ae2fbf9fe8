use crate::common::{RowId, Value, MEMORY_STORE_PREFIX};
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::metadata::DatabaseMetadata;
use crate::schema::{ObjectSchema, PropertyDescriptor, PropertyType, SchemaCatalog};
use crate::store::{Row, RowCursor, RowIteratorProvider, RowProvider, StorageAdapter};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

const ENGINE_VERSION: &str = "in-memory/1.0";

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// In-memory implementation of a storage adapter.
///
/// # Purpose
/// `InMemoryAdapter` provides a complete store implementation suitable for
/// testing, temporary data, and scenarios where persistence is not required.
/// It is also the reference for the transactional contract the migration
/// engine depends on.
///
/// # Transaction Model
/// The committed state is never mutated while the exclusive transaction is
/// open. `begin_exclusive_transaction` deep-copies the committed state into a
/// working copy; every mutation lands in the copy; `commit_transaction`
/// atomically swaps the copy in. Rolling back, or simply dropping the adapter
/// mid-transaction (a simulated crash), leaves the committed state exactly as
/// it was. While the transaction is open the adapter serves the working view;
/// the migration driver holds the store's exclusive lock for that whole span,
/// so no independent reader runs against a partially migrated store.
///
/// # Characteristics
/// - **Thread-Safe**: state behind `parking_lot` locks, shared via `Arc`
/// - **No Persistence**: all data is lost when the adapter is dropped
#[derive(Clone)]
pub struct InMemoryAdapter {
    inner: Arc<InMemoryAdapterInner>,
}

impl InMemoryAdapter {
    /// Creates a new, uninitialized in-memory store.
    pub fn new() -> Self {
        let id = NEXT_STORE_ID.fetch_add(1, Ordering::SeqCst);
        InMemoryAdapter {
            inner: Arc::new(InMemoryAdapterInner {
                identity: format!("{}{}", MEMORY_STORE_PREFIX, id),
                committed: RwLock::new(StoreState::empty()),
                working: Mutex::new(None),
                opened: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

impl Default for InMemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

struct InMemoryAdapterInner {
    identity: String,
    /// State visible to readers outside the exclusive transaction.
    committed: RwLock<StoreState>,
    /// Working copy mutated while the exclusive transaction is open.
    working: Mutex<Option<StoreState>>,
    opened: AtomicBool,
    closed: AtomicBool,
}

/// One consistent snapshot of the whole store.
struct StoreState {
    metadata: DatabaseMetadata,
    catalog: SchemaCatalog,
    tables: HashMap<String, Arc<RwLock<Table>>>,
}

impl StoreState {
    fn empty() -> Self {
        StoreState {
            metadata: DatabaseMetadata::empty(),
            catalog: SchemaCatalog::new(0),
            tables: HashMap::new(),
        }
    }

    /// Deep copy; tables are cloned into fresh `Arc`s so row handles opened
    /// against the copy never alias the original.
    fn deep_clone(&self) -> StoreState {
        let tables = self
            .tables
            .iter()
            .map(|(name, table)| {
                (name.clone(), Arc::new(RwLock::new(table.read().clone())))
            })
            .collect();
        StoreState {
            metadata: self.metadata.clone(),
            catalog: self.catalog.clone(),
            tables,
        }
    }
}

/// Physical storage of one object type: column descriptors in physical
/// order plus rows as column-ordered value tuples.
#[derive(Clone)]
struct Table {
    columns: Vec<PropertyDescriptor>,
    primary_key: Option<String>,
    rows: BTreeMap<u64, Vec<Value>>,
    next_row_id: u64,
}

impl Table {
    fn from_schema(schema: &ObjectSchema) -> Self {
        Table {
            columns: schema.properties().cloned().collect(),
            primary_key: schema.primary_key().map(|pk| pk.to_string()),
            rows: BTreeMap::new(),
            next_row_id: 1,
        }
    }

    fn column_index(&self, property_name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == property_name)
    }

    fn require_column_index(&self, class_name: &str, property_name: &str) -> StrataResult<usize> {
        self.column_index(property_name).ok_or_else(|| {
            StrataError::new(
                &format!("Column '{}.{}' does not exist", class_name, property_name),
                ErrorKind::PropertyNotFound,
            )
        })
    }

    /// Encodes a primary key value for uniqueness checks. Only int and
    /// string keys exist; other variants are rejected before this runs.
    fn key_repr(value: &Value) -> Option<String> {
        match value {
            Value::Int(v) => Some(format!("i:{}", v)),
            Value::String(v) => Some(format!("s:{}", v)),
            _ => None,
        }
    }
}

impl InMemoryAdapterInner {
    fn ensure_open(&self) -> StrataResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StrataError::new(
                "Store has already been closed",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        if !self.opened.load(Ordering::SeqCst) {
            return Err(StrataError::new(
                "Store has not been opened",
                ErrorKind::StoreNotInitialized,
            ));
        }
        Ok(())
    }

    /// Runs a mutation against the working state; fails when no transaction
    /// is open. Every structure change goes through here, which is what makes
    /// rollback trivial and keeps the committed state untouched.
    fn with_working<R>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut StoreState) -> StrataResult<R>,
    ) -> StrataResult<R> {
        self.ensure_open()?;
        let mut working = self.working.lock();
        match working.as_mut() {
            Some(state) => f(state),
            None => {
                log::error!("{} requires an open exclusive transaction", operation);
                Err(StrataError::new(
                    &format!("{} requires an open exclusive transaction", operation),
                    ErrorKind::TransactionNotActive,
                ))
            }
        }
    }

    /// Reads from the working state when a transaction is open, otherwise
    /// from the committed state.
    fn read_state<R>(&self, f: impl FnOnce(&StoreState) -> R) -> StrataResult<R> {
        self.ensure_open()?;
        let working = self.working.lock();
        if let Some(state) = working.as_ref() {
            return Ok(f(state));
        }
        drop(working);
        let committed = self.committed.read();
        Ok(f(&committed))
    }

    fn table(&self, class_name: &str) -> StrataResult<Arc<RwLock<Table>>> {
        self.read_state(|state| state.tables.get(class_name).cloned())?
            .ok_or_else(|| {
                StrataError::new(
                    &format!("Type '{}' does not exist in store", class_name),
                    ErrorKind::TypeNotFound,
                )
            })
    }

    fn working_table(
        state: &mut StoreState,
        class_name: &str,
    ) -> StrataResult<Arc<RwLock<Table>>> {
        state.tables.get(class_name).cloned().ok_or_else(|| {
            StrataError::new(
                &format!("Type '{}' does not exist in store", class_name),
                ErrorKind::TypeNotFound,
            )
        })
    }
}

impl StorageAdapter for InMemoryAdapter {
    fn open_or_create(&self) -> StrataResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(StrataError::new(
                "Store has already been closed",
                ErrorKind::StoreAlreadyClosed,
            ));
        }
        self.inner.opened.store(true, Ordering::SeqCst);
        log::debug!("Opened in-memory store {}", self.inner.identity);
        Ok(())
    }

    fn close(&self) -> StrataResult<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut working = self.inner.working.lock();
        if working.take().is_some() {
            log::warn!(
                "Store {} closed with an open transaction; rolling back",
                self.inner.identity
            );
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn identity(&self) -> String {
        self.inner.identity.clone()
    }

    fn engine_version(&self) -> String {
        ENGINE_VERSION.to_string()
    }

    fn is_initialized(&self) -> StrataResult<bool> {
        self.inner
            .read_state(|state| state.metadata.is_initialized())
    }

    fn begin_exclusive_transaction(&self) -> StrataResult<()> {
        self.inner.ensure_open()?;
        let mut working = self.inner.working.lock();
        if working.is_some() {
            log::error!("Exclusive transaction already open on {}", self.inner.identity);
            return Err(StrataError::new(
                "An exclusive transaction is already open",
                ErrorKind::TransactionAlreadyActive,
            ));
        }
        *working = Some(self.inner.committed.read().deep_clone());
        log::debug!("Began exclusive transaction on {}", self.inner.identity);
        Ok(())
    }

    fn commit_transaction(&self) -> StrataResult<()> {
        self.inner.ensure_open()?;
        let mut working = self.inner.working.lock();
        let state = working.take().ok_or_else(|| {
            StrataError::new(
                "No exclusive transaction to commit",
                ErrorKind::TransactionNotActive,
            )
        })?;
        *self.inner.committed.write() = state;
        log::debug!("Committed exclusive transaction on {}", self.inner.identity);
        Ok(())
    }

    fn rollback_transaction(&self) -> StrataResult<()> {
        self.inner.ensure_open()?;
        let mut working = self.inner.working.lock();
        if working.take().is_none() {
            return Err(StrataError::new(
                "No exclusive transaction to roll back",
                ErrorKind::TransactionNotActive,
            ));
        }
        log::debug!("Rolled back exclusive transaction on {}", self.inner.identity);
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.inner.working.lock().is_some()
    }

    fn stored_version(&self) -> StrataResult<u32> {
        self.inner.read_state(|state| state.metadata.schema_version)
    }

    fn stored_catalog(&self) -> StrataResult<SchemaCatalog> {
        self.inner.read_state(|state| state.catalog.clone())
    }

    fn write_catalog(&self, catalog: &SchemaCatalog) -> StrataResult<()> {
        self.inner.with_working("write_catalog", |state| {
            state.catalog = catalog.clone();
            state.metadata.schema_version = catalog.version();
            Ok(())
        })
    }

    fn metadata(&self) -> StrataResult<DatabaseMetadata> {
        self.inner.read_state(|state| state.metadata.clone())
    }

    fn write_metadata(&self, metadata: &DatabaseMetadata) -> StrataResult<()> {
        self.inner.with_working("write_metadata", |state| {
            state.metadata = metadata.clone();
            Ok(())
        })
    }

    fn add_type(&self, schema: &ObjectSchema) -> StrataResult<()> {
        schema.validate()?;
        self.inner.with_working("add_type", |state| {
            if state.tables.contains_key(schema.class_name()) {
                return Err(StrataError::new(
                    &format!("Type '{}' already exists in store", schema.class_name()),
                    ErrorKind::InvalidOperation,
                ));
            }
            state.tables.insert(
                schema.class_name().to_string(),
                Arc::new(RwLock::new(Table::from_schema(schema))),
            );
            Ok(())
        })
    }

    fn remove_type(&self, class_name: &str) -> StrataResult<()> {
        self.inner.with_working("remove_type", |state| {
            state.tables.remove(class_name).ok_or_else(|| {
                StrataError::new(
                    &format!("Type '{}' does not exist in store", class_name),
                    ErrorKind::TypeNotFound,
                )
            })?;
            Ok(())
        })
    }

    fn add_column(
        &self,
        class_name: &str,
        property: &PropertyDescriptor,
        default: &Value,
    ) -> StrataResult<()> {
        property.validate()?;
        if !property.accepts(default) {
            return Err(StrataError::new(
                &format!(
                    "Default value of type {} is not valid for column '{}.{}'",
                    default.type_name(),
                    class_name,
                    property.name
                ),
                ErrorKind::ValidationError,
            ));
        }

        self.inner.with_working("add_column", |state| {
            let table = InMemoryAdapterInner::working_table(state, class_name)?;
            let mut table = table.write();
            if table.column_index(&property.name).is_some() {
                return Err(StrataError::new(
                    &format!("Column '{}.{}' already exists", class_name, property.name),
                    ErrorKind::DuplicateProperty,
                ));
            }
            table.columns.push(property.clone());
            for row in table.rows.values_mut() {
                row.push(default.clone());
            }
            Ok(())
        })
    }

    fn remove_column(&self, class_name: &str, property_name: &str) -> StrataResult<()> {
        self.inner.with_working("remove_column", |state| {
            let table = InMemoryAdapterInner::working_table(state, class_name)?;
            let mut table = table.write();
            let index = table.require_column_index(class_name, property_name)?;
            table.columns.remove(index);
            if table.primary_key.as_deref() == Some(property_name) {
                table.primary_key = None;
            }
            for row in table.rows.values_mut() {
                row.remove(index);
            }
            Ok(())
        })
    }

    fn rename_column(
        &self,
        class_name: &str,
        old_name: &str,
        new_name: &str,
    ) -> StrataResult<()> {
        self.inner.with_working("rename_column", |state| {
            let table = InMemoryAdapterInner::working_table(state, class_name)?;
            let mut table = table.write();
            if table.column_index(new_name).is_some() {
                return Err(StrataError::new(
                    &format!("Column '{}.{}' already exists", class_name, new_name),
                    ErrorKind::DuplicateProperty,
                ));
            }
            let index = table.require_column_index(class_name, old_name)?;
            table.columns[index].name = new_name.to_string();
            if table.primary_key.as_deref() == Some(old_name) {
                table.primary_key = Some(new_name.to_string());
            }
            Ok(())
        })
    }

    fn set_column_type(
        &self,
        class_name: &str,
        property_name: &str,
        new_type: PropertyType,
    ) -> StrataResult<()> {
        self.inner.with_working("set_column_type", |state| {
            let table = InMemoryAdapterInner::working_table(state, class_name)?;
            let mut table = table.write();
            let index = table.require_column_index(class_name, property_name)?;
            let column = &mut table.columns[index];
            if column.indexed && !new_type.is_indexable() {
                column.indexed = false;
            }
            column.property_type = new_type;
            Ok(())
        })
    }

    fn set_indexed(
        &self,
        class_name: &str,
        property_name: &str,
        indexed: bool,
    ) -> StrataResult<()> {
        self.inner.with_working("set_indexed", |state| {
            let table = InMemoryAdapterInner::working_table(state, class_name)?;
            let mut table = table.write();
            let index = table.require_column_index(class_name, property_name)?;
            let column = &mut table.columns[index];
            if indexed && !column.property_type.is_indexable() {
                return Err(StrataError::new(
                    &format!(
                        "Column '{}.{}' of type {} cannot be indexed",
                        class_name, property_name, column.property_type
                    ),
                    ErrorKind::ValidationError,
                ));
            }
            column.indexed = indexed;
            log::debug!(
                "{} index on '{}.{}'",
                if indexed { "Built" } else { "Dropped" },
                class_name,
                property_name
            );
            Ok(())
        })
    }

    fn set_optional(
        &self,
        class_name: &str,
        property_name: &str,
        optional: bool,
        default: Option<&Value>,
    ) -> StrataResult<()> {
        self.inner.with_working("set_optional", |state| {
            let table = InMemoryAdapterInner::working_table(state, class_name)?;
            let mut table = table.write();
            let index = table.require_column_index(class_name, property_name)?;

            if !optional {
                // Back-fill stored nulls before the column becomes required.
                for (row_id, row) in table.rows.iter_mut() {
                    if row[index].is_null() {
                        match default {
                            Some(value) => row[index] = value.clone(),
                            None => {
                                return Err(StrataError::new(
                                    &format!(
                                        "Row {} holds null for '{}.{}' and no default was supplied",
                                        row_id, class_name, property_name
                                    ),
                                    ErrorKind::ValidationError,
                                ));
                            }
                        }
                    }
                }
            }

            table.columns[index].optional = optional;
            Ok(())
        })
    }

    fn set_primary_key(
        &self,
        class_name: &str,
        property_name: Option<&str>,
    ) -> StrataResult<()> {
        self.inner.with_working("set_primary_key", |state| {
            let table = InMemoryAdapterInner::working_table(state, class_name)?;
            let mut table = table.write();

            let Some(name) = property_name else {
                table.primary_key = None;
                return Ok(());
            };

            let index = table.require_column_index(class_name, name)?;
            let column = &table.columns[index];
            if !matches!(
                column.property_type,
                PropertyType::Int | PropertyType::String
            ) {
                return Err(StrataError::new(
                    &format!(
                        "Primary key '{}.{}' must be int or string, found {}",
                        class_name, name, column.property_type
                    ),
                    ErrorKind::ValidationError,
                ));
            }

            let mut seen = std::collections::HashSet::new();
            for (row_id, row) in table.rows.iter() {
                let key = Table::key_repr(&row[index]).ok_or_else(|| {
                    StrataError::new(
                        &format!(
                            "Row {} holds a null or non-key value for primary key '{}.{}'",
                            row_id, class_name, name
                        ),
                        ErrorKind::UniqueConstraintViolation,
                    )
                })?;
                if !seen.insert(key) {
                    return Err(StrataError::new(
                        &format!(
                            "Duplicate primary key value in row {} for '{}.{}'",
                            row_id, class_name, name
                        ),
                        ErrorKind::UniqueConstraintViolation,
                    ));
                }
            }

            table.primary_key = Some(name.to_string());
            Ok(())
        })
    }

    fn column_index(&self, class_name: &str, property_name: &str) -> StrataResult<usize> {
        let table = self.inner.table(class_name)?;
        let table = table.read();
        table.require_column_index(class_name, property_name)
    }

    fn insert_row(&self, class_name: &str, values: Vec<Value>) -> StrataResult<RowId> {
        let table = self.inner.table(class_name)?;
        let mut table = table.write();

        if values.len() != table.columns.len() {
            return Err(StrataError::new(
                &format!(
                    "Type '{}' expects {} values per row, got {}",
                    class_name,
                    table.columns.len(),
                    values.len()
                ),
                ErrorKind::ValidationError,
            ));
        }

        for (column, value) in table.columns.iter().zip(values.iter()) {
            if !column.accepts(value) {
                return Err(StrataError::new(
                    &format!(
                        "Value of type {} is not valid for column '{}.{}'",
                        value.type_name(),
                        class_name,
                        column.name
                    ),
                    ErrorKind::ValidationError,
                ));
            }
        }

        if let Some(pk) = table.primary_key.clone() {
            let index = table.require_column_index(class_name, &pk)?;
            if let Some(key) = Table::key_repr(&values[index]) {
                for (row_id, row) in table.rows.iter() {
                    if Table::key_repr(&row[index]).as_deref() == Some(key.as_str()) {
                        return Err(StrataError::new(
                            &format!(
                                "Duplicate primary key value; row {} already holds it for '{}.{}'",
                                row_id, class_name, pk
                            ),
                            ErrorKind::UniqueConstraintViolation,
                        ));
                    }
                }
            }
        }

        let id = table.next_row_id;
        table.next_row_id += 1;
        table.rows.insert(id, values);
        Ok(RowId(id))
    }

    fn row_count(&self, class_name: &str) -> StrataResult<u64> {
        let table = self.inner.table(class_name)?;
        let count = table.read().rows.len() as u64;
        Ok(count)
    }

    fn rows(&self, class_name: &str) -> StrataResult<RowCursor> {
        let table = self.inner.table(class_name)?;
        let ids: Vec<u64> = table.read().rows.keys().copied().collect();
        Ok(RowCursor::new(Box::new(InMemoryRowIterator {
            table,
            class_name: class_name.to_string(),
            ids,
            pos: 0,
        })))
    }

    fn purge(&self) -> StrataResult<()> {
        self.inner.ensure_open()?;
        if self.in_transaction() {
            return Err(StrataError::new(
                "Cannot purge while an exclusive transaction is open",
                ErrorKind::InvalidOperation,
            ));
        }
        *self.inner.committed.write() = StoreState::empty();
        log::debug!("Purged in-memory store {}", self.inner.identity);
        Ok(())
    }
}

/// Lazy iterator over a snapshot of row ids; rows deleted concurrently are
/// skipped when the cursor reaches them.
struct InMemoryRowIterator {
    table: Arc<RwLock<Table>>,
    class_name: String,
    ids: Vec<u64>,
    pos: usize,
}

impl RowIteratorProvider for InMemoryRowIterator {
    fn next_row(&mut self) -> Option<StrataResult<Row>> {
        loop {
            let id = *self.ids.get(self.pos)?;
            self.pos += 1;
            if self.table.read().rows.contains_key(&id) {
                return Some(Ok(Row::new(InMemoryRow {
                    table: self.table.clone(),
                    class_name: self.class_name.clone(),
                    id,
                })));
            }
        }
    }
}

/// Row handle bound to the table incarnation it was opened against.
struct InMemoryRow {
    table: Arc<RwLock<Table>>,
    class_name: String,
    id: u64,
}

impl InMemoryRow {
    fn missing(&self) -> StrataError {
        StrataError::new(
            &format!("Row {} of type '{}' no longer exists", self.id, self.class_name),
            ErrorKind::ValidationError,
        )
    }
}

impl RowProvider for InMemoryRow {
    fn id(&self) -> RowId {
        RowId(self.id)
    }

    fn get(&self, index: usize) -> StrataResult<Value> {
        let table = self.table.read();
        let row = table.rows.get(&self.id).ok_or_else(|| self.missing())?;
        row.get(index).cloned().ok_or_else(|| {
            StrataError::new(
                &format!(
                    "Column index {} out of bounds for type '{}'",
                    index, self.class_name
                ),
                ErrorKind::ValidationError,
            )
        })
    }

    fn set(&self, index: usize, value: Value) -> StrataResult<()> {
        let mut table = self.table.write();
        let column = table.columns.get(index).cloned().ok_or_else(|| {
            StrataError::new(
                &format!(
                    "Column index {} out of bounds for type '{}'",
                    index, self.class_name
                ),
                ErrorKind::ValidationError,
            )
        })?;
        if !column.accepts(&value) {
            return Err(StrataError::new(
                &format!(
                    "Value of type {} is not valid for column '{}.{}'",
                    value.type_name(),
                    self.class_name,
                    column.name
                ),
                ErrorKind::ValidationError,
            ));
        }
        let row = table.rows.get_mut(&self.id).ok_or_else(|| self.missing())?;
        row[index] = value;
        Ok(())
    }
}
