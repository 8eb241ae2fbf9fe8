//! In-memory storage adapter.
//!
//! A complete, transactional reference implementation of
//! [`StorageAdapter`](crate::store::StorageAdapter) suitable for tests and
//! temporary stores. All data is lost when the adapter is dropped.

mod adapter;

pub use adapter::*;
