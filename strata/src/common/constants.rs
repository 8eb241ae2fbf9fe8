// store constants
pub const METADATA_REGION: &str = "$strata_metadata";
pub const CATALOG_REGION: &str = "$strata_catalog";
pub const MEMORY_STORE_PREFIX: &str = "mem:";

// schema constants
pub const INITIAL_SCHEMA_VERSION: u32 = 0;
pub const DEFAULT_SCHEMA_VERSION: u32 = 1;

// Names no object type may take; these address the reserved regions of the
// persisted layout.
pub const RESERVED_NAMES: [&str; 2] = [METADATA_REGION, CATALOG_REGION];

// Compile-time assertion for reserved names count
const _RESERVED_NAMES_CHECK: () = {
    const RESERVED_NAMES_COUNT: usize = 2;
    const ACTUAL_RESERVED_NAMES: usize = RESERVED_NAMES.len();
    const _: [(); 1] = [(); (ACTUAL_RESERVED_NAMES == RESERVED_NAMES_COUNT) as usize];
};

pub const STRATA_VERSION: &str = env!("CARGO_PKG_VERSION");
