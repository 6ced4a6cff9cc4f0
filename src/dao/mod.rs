//! Storage layer.

/// Persisted representation of the roster.
pub mod models;
/// Roster persistence backends.
pub mod roster_store;
/// Storage abstraction layer for database operations.
pub mod storage;
