use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for RummyQ Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::state::get_state,
        crate::routes::sse::state_stream,
        crate::routes::queue::join_queue,
        crate::routes::queue::leave_queue,
        crate::routes::queue::rename_player,
        crate::routes::queue::move_player,
        crate::routes::tables::create_table,
        crate::routes::tables::dissolve_table,
        crate::routes::tables::swap_players,
        crate::routes::tables::repair_overlaps,
        crate::routes::mode::get_mode,
        crate::routes::mode::switch_mode,
        crate::routes::assistant::ask,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::state::StateSnapshot,
            crate::dto::state::MutationResponse,
            crate::dto::queue::PlayerView,
            crate::dto::queue::JoinQueueRequest,
            crate::dto::queue::JoinQueueResponse,
            crate::dto::queue::RenamePlayerRequest,
            crate::dto::queue::MovePlayerRequest,
            crate::dto::queue::MoveDirectionDto,
            crate::dto::table::GameView,
            crate::dto::table::GameStatusDto,
            crate::dto::table::SwapPlayersRequest,
            crate::dto::table::CreateTableResponse,
            crate::dto::table::RepairResponse,
            crate::dto::mode::ModeView,
            crate::dto::mode::SwitchModeRequest,
            crate::dto::assistant::AssistantRequest,
            crate::dto::assistant::AssistantResponse,
            crate::state::model::Mode,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "state", description = "Queue and table snapshot"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "queue", description = "Waiting queue operations"),
        (name = "tables", description = "Running table operations"),
        (name = "mode", description = "Connected / local-only switch"),
        (name = "assistant", description = "Rules assistant"),
    )
)]
pub struct ApiDoc;
