use crate::common::{RowId, Value};
use crate::errors::StrataResult;
use std::ops::Deref;
use std::sync::Arc;

/// Typed access to one stored row.
///
/// # Purpose
///
/// `RowProvider` is the contract row handles expose to the migration engine
/// and to user callbacks: values are read and written by property index, the
/// index having been validated against the schema at lookup time. String
/// lookups never happen on this path.
///
/// # Characteristics
///
/// - **Positional**: `get`/`set` address columns by index, not by name
/// - **Live**: a handle reads and writes the store state it was opened
///   against (the working state while a migration transaction is active)
/// - **Thread-Safe**: requires `Send + Sync` for safe concurrent access
pub trait RowProvider: Send + Sync {
    /// The stable identifier of this row.
    fn id(&self) -> RowId;

    /// Reads the value stored at the given column index.
    fn get(&self, index: usize) -> StrataResult<Value>;

    /// Writes the value at the given column index.
    fn set(&self, index: usize, value: Value) -> StrataResult<()>;
}

/// Handle to one stored row.
///
/// Wraps a concrete [`RowProvider`] in an `Arc` so handles are cheap to
/// clone and can outlive the cursor that produced them.
#[derive(Clone)]
pub struct Row {
    inner: Arc<dyn RowProvider>,
}

impl Row {
    pub fn new<T: RowProvider + 'static>(inner: T) -> Self {
        Row {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for Row {
    type Target = Arc<dyn RowProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Trait for implementing row iteration over one object type.
///
/// Implementations are lazy: rows are resolved as the cursor advances, and a
/// fresh cursor can always be requested from the adapter, which makes the
/// sequence restartable.
pub trait RowIteratorProvider: Send {
    /// Get the next row handle
    fn next_row(&mut self) -> Option<StrataResult<Row>>;
}

/// Cursor over the rows of one object type.
pub struct RowCursor {
    provider: Box<dyn RowIteratorProvider>,
}

impl RowCursor {
    pub fn new(provider: Box<dyn RowIteratorProvider>) -> Self {
        RowCursor { provider }
    }
}

impl std::fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowCursor").finish_non_exhaustive()
    }
}

impl Iterator for RowCursor {
    type Item = StrataResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.provider.next_row()
    }
}
