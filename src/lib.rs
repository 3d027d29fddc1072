//! Library crate for rummyq-back, exposing modules for binaries and integration tests.

/// Runtime configuration loading.
pub mod config;
/// Remote queue store, local snapshots and their row models.
pub mod dao;
/// Request and response payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// Queue, table, mode and sync operations.
pub mod services;
/// Shared application state.
pub mod state;
