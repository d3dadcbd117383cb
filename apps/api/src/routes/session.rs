//! Session handlers — thin translation between HTTP and workflow actions.
//! Every stage guard and side effect lives in the workflow engine; handlers
//! only lock the session, forward the action, and shape the response.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::chat::ChatTurn;
use crate::models::job::JobRow;
use crate::models::user::UserSummary;
use crate::state::AppState;
use crate::workflow::chat::ChatReply;
use crate::workflow::machine::Advance;
use crate::workflow::session::{SessionSnapshot, SessionState};
use crate::workflow::WorkflowError;

async fn session_handle(
    state: &AppState,
    id: Uuid,
) -> Result<Arc<Mutex<SessionState>>, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id}")))
}

// ── session lifecycle ───────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
    pub stage: crate::workflow::Stage,
}

/// POST /api/v1/sessions
pub async fn handle_create_session(State(state): State<AppState>) -> Json<SessionCreated> {
    let session_id = state.sessions.create().await;
    Json(SessionCreated {
        session_id,
        stage: crate::workflow::Stage::Start,
    })
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let session = session_handle(&state, id).await?;
    let guard = session.lock().await;
    Ok(Json(guard.snapshot()))
}

// ── start stage ─────────────────────────────────────────────────────────────

/// GET /api/v1/users
pub async fn handle_list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    let users = state.workflow.list_users().await?;
    Ok(Json(users))
}

#[derive(Deserialize)]
pub struct IdentityRequest {
    pub identity: String,
}

#[derive(Serialize)]
pub struct IdentityCheckResponse {
    pub exists: bool,
}

/// POST /api/v1/sessions/:id/identity/check
pub async fn handle_check_identity(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<IdentityRequest>,
) -> Result<Json<IdentityCheckResponse>, AppError> {
    let session = session_handle(&state, id).await?;
    let mut guard = session.lock().await;
    let exists = state
        .workflow
        .check_identity(&mut guard, &req.identity)
        .await?;
    Ok(Json(IdentityCheckResponse { exists }))
}

/// POST /api/v1/sessions/:id/identity/continue
pub async fn handle_continue_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<IdentityRequest>,
) -> Result<Json<Advance>, AppError> {
    let session = session_handle(&state, id).await?;
    let mut guard = session.lock().await;
    let advance = state
        .workflow
        .continue_existing_user(&mut guard, &req.identity)
        .await?;
    Ok(Json(advance))
}

/// POST /api/v1/sessions/:id/identity/onboard
///
/// Multipart form: `identity` (text), `resume` (PDF), `profile` (PDF).
pub async fn handle_onboard_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<Advance>, AppError> {
    let mut identity = String::new();
    let mut resume = Bytes::new();
    let mut profile = Bytes::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WorkflowError::Validation(format!("Malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "identity" => {
                identity = field
                    .text()
                    .await
                    .map_err(|e| WorkflowError::Validation(format!("Malformed upload: {e}")))?;
            }
            "resume" => {
                resume = field
                    .bytes()
                    .await
                    .map_err(|e| WorkflowError::Validation(format!("Malformed upload: {e}")))?;
            }
            "profile" => {
                profile = field
                    .bytes()
                    .await
                    .map_err(|e| WorkflowError::Validation(format!("Malformed upload: {e}")))?;
            }
            _ => {}
        }
    }

    let session = session_handle(&state, id).await?;
    let mut guard = session.lock().await;
    let advance = state
        .workflow
        .onboard_new_user(&mut guard, &identity, &resume, &profile)
        .await?;
    Ok(Json(advance))
}

// ── waiting_job_description stage ───────────────────────────────────────────

/// GET /api/v1/sessions/:id/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<JobRow>>, AppError> {
    let session = session_handle(&state, id).await?;
    let guard = session.lock().await;
    let jobs = state.workflow.list_jobs(&guard).await?;
    Ok(Json(jobs))
}

#[derive(Deserialize)]
pub struct NewJobRequest {
    pub job_text: String,
}

/// POST /api/v1/sessions/:id/jobs
pub async fn handle_new_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<NewJobRequest>,
) -> Result<Json<Advance>, AppError> {
    let session = session_handle(&state, id).await?;
    let mut guard = session.lock().await;
    let advance = state
        .workflow
        .submit_new_job(&mut guard, &req.job_text)
        .await?;
    Ok(Json(advance))
}

#[derive(Deserialize)]
pub struct SelectJobRequest {
    pub job_id: i64,
}

/// POST /api/v1/sessions/:id/jobs/select
pub async fn handle_select_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectJobRequest>,
) -> Result<Json<Advance>, AppError> {
    let session = session_handle(&state, id).await?;
    let mut guard = session.lock().await;
    let advance = state
        .workflow
        .select_existing_job(&mut guard, req.job_id)
        .await?;
    Ok(Json(advance))
}

// ── processing_llm stage ────────────────────────────────────────────────────

/// POST /api/v1/sessions/:id/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Advance>, AppError> {
    let session = session_handle(&state, id).await?;
    let mut guard = session.lock().await;
    let advance = state.workflow.run_generation(&mut guard).await?;
    Ok(Json(advance))
}

// ── job_exploration stage ───────────────────────────────────────────────────

/// GET /api/v1/sessions/:id/document
pub async fn handle_download_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let session = session_handle(&state, id).await?;
    let guard = session.lock().await;
    let document = state.workflow.document(&guard).await?;
    let filename = format!(
        "Tailored_Resume_{}.html",
        guard.identity.as_deref().unwrap_or("candidate")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/html".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        document,
    )
        .into_response())
}

/// GET /api/v1/sessions/:id/chat
pub async fn handle_get_transcript(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatTurn>>, AppError> {
    let session = session_handle(&state, id).await?;
    let mut guard = session.lock().await;
    let transcript = state.workflow.transcript(&mut guard).await?;
    Ok(Json(transcript.turns().to_vec()))
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// POST /api/v1/sessions/:id/chat
pub async fn handle_chat_turn(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    let session = session_handle(&state, id).await?;
    let mut guard = session.lock().await;
    let reply = state
        .workflow
        .send_chat_turn(&mut guard, &req.message)
        .await?;
    Ok(Json(reply))
}

/// POST /api/v1/sessions/:id/menu
pub async fn handle_menu(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Advance>, AppError> {
    let session = session_handle(&state, id).await?;
    let mut guard = session.lock().await;
    let advance = state.workflow.return_to_menu(&mut guard)?;
    Ok(Json(advance))
}
