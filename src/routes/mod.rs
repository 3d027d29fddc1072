use axum::Router;

use crate::state::SharedState;

pub mod assistant;
pub mod docs;
pub mod health;
pub mod mode;
pub mod queue;
pub mod sse;
pub mod state;
pub mod tables;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(state::router())
        .merge(sse::router())
        .merge(queue::router())
        .merge(tables::router())
        .merge(mode::router())
        .merge(assistant::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
