/// Rules assistant backed by a hosted text-generation API.
pub mod assistant_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Connected / local-only mode switch.
pub mod mode_service;
/// Waiting queue operations.
pub mod queue_service;
/// Local-only snapshot persistence.
pub mod snapshot_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor with backoff.
pub mod storage_supervisor;
/// Remote change reconciliation and remote write plumbing.
pub mod sync_service;
/// Table lifecycle operations.
pub mod table_service;
