pub mod health;
pub mod session;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/users", get(session::handle_list_users))
        .route("/api/v1/sessions", post(session::handle_create_session))
        .route("/api/v1/sessions/:id", get(session::handle_get_session))
        .route(
            "/api/v1/sessions/:id/identity/check",
            post(session::handle_check_identity),
        )
        .route(
            "/api/v1/sessions/:id/identity/continue",
            post(session::handle_continue_user),
        )
        .route(
            "/api/v1/sessions/:id/identity/onboard",
            post(session::handle_onboard_user),
        )
        .route(
            "/api/v1/sessions/:id/jobs",
            get(session::handle_list_jobs).post(session::handle_new_job),
        )
        .route(
            "/api/v1/sessions/:id/jobs/select",
            post(session::handle_select_job),
        )
        .route(
            "/api/v1/sessions/:id/generate",
            post(session::handle_generate),
        )
        .route(
            "/api/v1/sessions/:id/document",
            get(session::handle_download_document),
        )
        .route(
            "/api/v1/sessions/:id/chat",
            get(session::handle_get_transcript).post(session::handle_chat_turn),
        )
        .route("/api/v1/sessions/:id/menu", post(session::handle_menu))
        .with_state(state)
}
