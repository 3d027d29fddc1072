/// Storage row definitions shared by every backend.
pub mod models;
/// Remote queue/table storage contract and its backends.
pub mod queue_store;
/// Local key-value snapshots backing local-only mode.
pub mod snapshot;
/// Storage abstraction layer for database operations.
pub mod storage;
