use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for Strata operations
///
/// This enum represents all possible error types that can occur while opening
/// a database or migrating its schema. Schema kinds are raised at diff time,
/// before any transaction opens; migration kinds are raised at apply time and
/// always trigger a full rollback.
///
/// # Examples
///
/// ```rust,ignore
/// use strata::errors::{StrataError, ErrorKind, StrataResult};
///
/// fn example() -> StrataResult<()> {
///     Err(StrataError::new("Type not found", ErrorKind::TypeNotFound))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Schema Errors - static, raised while diffing or validating catalogs
    /// A schema or catalog violates a structural invariant
    InvalidSchema,
    /// A property name appears more than once within a type
    DuplicateProperty,
    /// The referenced object type does not exist
    TypeNotFound,
    /// The referenced property does not exist
    PropertyNotFound,
    /// A property type change has no registered conversion
    IncompatibleTypeChange,
    /// An optional property became required with no default policy
    AmbiguousDefault,
    /// A link property references a type absent from the target catalog
    DanglingReference,

    // Migration Errors - dynamic, raised while applying a migration
    /// A stored value could not be converted to the new property type
    ConversionFailed,
    /// A user-supplied migration callback returned an error
    UserCallbackFailed,
    /// No contiguous migration path spans the stored and declared versions
    NoPathFound,
    /// The stored schema version is newer than the declared version
    DowngradeNotSupported,
    /// The persisted catalog did not match the declared catalog after apply
    PostMigrationMismatch,
    /// Another migration already holds the store's migration lock
    AlreadyMigrating,
    /// The migration exceeded the caller-supplied timeout
    MigrationTimeout,

    // Constraint Violation Errors
    /// A unique constraint (e.g. primary key) was violated
    UniqueConstraintViolation,

    // Backend and Store Errors
    /// Error from the storage backend
    BackendError,
    /// Store has not been initialized
    StoreNotInitialized,
    /// Store has already been closed
    StoreAlreadyClosed,
    /// The operation requires an open transaction
    TransactionNotActive,
    /// An exclusive transaction is already open
    TransactionAlreadyActive,

    // Generic/Internal Errors - used as fallback
    /// The operation is not valid in the current context
    InvalidOperation,
    /// Generic validation error
    ValidationError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidSchema => write!(f, "Invalid schema"),
            ErrorKind::DuplicateProperty => write!(f, "Duplicate property"),
            ErrorKind::TypeNotFound => write!(f, "Type not found"),
            ErrorKind::PropertyNotFound => write!(f, "Property not found"),
            ErrorKind::IncompatibleTypeChange => write!(f, "Incompatible type change"),
            ErrorKind::AmbiguousDefault => write!(f, "Ambiguous default"),
            ErrorKind::DanglingReference => write!(f, "Dangling reference"),
            ErrorKind::ConversionFailed => write!(f, "Conversion failed"),
            ErrorKind::UserCallbackFailed => write!(f, "User callback failed"),
            ErrorKind::NoPathFound => write!(f, "No migration path found"),
            ErrorKind::DowngradeNotSupported => write!(f, "Downgrade not supported"),
            ErrorKind::PostMigrationMismatch => write!(f, "Post-migration mismatch"),
            ErrorKind::AlreadyMigrating => write!(f, "Already migrating"),
            ErrorKind::MigrationTimeout => write!(f, "Migration timeout"),
            ErrorKind::UniqueConstraintViolation => write!(f, "Unique constraint violation"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::StoreNotInitialized => write!(f, "Store not initialized"),
            ErrorKind::StoreAlreadyClosed => write!(f, "Store already closed"),
            ErrorKind::TransactionNotActive => write!(f, "Transaction not active"),
            ErrorKind::TransactionAlreadyActive => write!(f, "Transaction already active"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

impl ErrorKind {
    /// Returns true for kinds raised at diff time, before any transaction opens.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidSchema
                | ErrorKind::DuplicateProperty
                | ErrorKind::TypeNotFound
                | ErrorKind::PropertyNotFound
                | ErrorKind::IncompatibleTypeChange
                | ErrorKind::AmbiguousDefault
                | ErrorKind::DanglingReference
        )
    }

    /// Returns true for kinds raised while a migration is being applied.
    pub fn is_migration_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::ConversionFailed
                | ErrorKind::UserCallbackFailed
                | ErrorKind::NoPathFound
                | ErrorKind::DowngradeNotSupported
                | ErrorKind::PostMigrationMismatch
                | ErrorKind::AlreadyMigrating
                | ErrorKind::MigrationTimeout
        )
    }
}

/// Custom Strata error type.
///
/// `StrataError` encapsulates error information including the error message,
/// kind, and optional cause. It supports error chaining and backtraces for
/// debugging. Messages carry enough context (class name, property name, row
/// identifier where applicable) to diagnose a failed migration without
/// knowledge of the storage engine internals.
///
/// # Type alias
///
/// The `StrataResult<T>` type alias is equivalent to `Result<T, StrataError>`
/// and is used throughout the codebase for operations that can fail.
#[derive(Clone)]
pub struct StrataError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<StrataError>>,
    backtrace: Atomic<Backtrace>,
}

impl StrataError {
    /// Creates a new `StrataError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        StrataError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `StrataError` with a cause error.
    ///
    /// This creates an error chain where the cause error is preserved for
    /// debugging.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: StrataError) -> Self {
        StrataError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&StrataError> {
        self.cause.as_deref()
    }
}

impl Display for StrataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for StrataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for StrataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for Strata operations.
///
/// `StrataResult<T>` is shorthand for `Result<T, StrataError>`.
/// All fallible Strata operations return this type.
pub type StrataResult<T> = Result<T, StrataError>;
