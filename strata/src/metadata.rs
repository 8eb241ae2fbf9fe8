use crate::common::{INITIAL_SCHEMA_VERSION, STRATA_VERSION};
use chrono::Utc;

/// Database metadata persisted in the reserved metadata region.
///
/// `DatabaseMetadata` captures when a store was created and which versions
/// are in use: the storage engine's own version string, the library version
/// that last wrote the store, and the numeric schema version the migration
/// engine advances. It is read before any user data access and is the
/// authority for version-mismatch detection during open.
///
/// # Fields
/// - `create_time`: timestamp (milliseconds) when the store was bootstrapped;
///   zero means the store is uninitialized
/// - `engine_version`: version string of the storage engine
/// - `library_version`: version string of the library that wrote the store
/// - `schema_version`: numeric schema version, advanced only by a committed
///   migration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DatabaseMetadata {
    pub create_time: u128,
    pub engine_version: String,
    pub library_version: String,
    pub schema_version: u32,
}

impl DatabaseMetadata {
    /// Creates metadata for a freshly bootstrapped store.
    pub fn fresh(engine_version: &str, schema_version: u32) -> Self {
        DatabaseMetadata {
            create_time: Utc::now().timestamp_millis() as u128,
            engine_version: engine_version.to_string(),
            library_version: STRATA_VERSION.to_string(),
            schema_version,
        }
    }

    /// Creates the placeholder metadata of an uninitialized store.
    pub fn empty() -> Self {
        DatabaseMetadata {
            create_time: 0,
            engine_version: String::new(),
            library_version: String::new(),
            schema_version: INITIAL_SCHEMA_VERSION,
        }
    }

    /// Returns true once the store has been bootstrapped.
    pub fn is_initialized(&self) -> bool {
        self.create_time != 0
    }
}
