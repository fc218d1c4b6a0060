//! API routes

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post, put},
    Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::config::ResponseMode;
use crate::conversation::{Category, Feedback, FeedbackError, UnknownCategory};
use crate::core::{Acknowledgement, PendingTurn, SessionHandle, SessionSnapshot};
use crate::AppState;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error(transparent)]
    Feedback(#[from] FeedbackError),

    #[error(transparent)]
    Category(#[from] UnknownCategory),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Feedback(FeedbackError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Feedback(FeedbackError::NotBotMessage(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Category(_) => StatusCode::BAD_REQUEST,
        };

        tracing::warn!("Rejected request: {}", self);
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    mode: ResponseMode,
}

#[derive(Debug, Serialize)]
struct CreatedSession {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Submits the current draft when absent
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub feedback: Feedback,
}

#[derive(Debug, Deserialize)]
pub struct CredentialRequest {
    pub credential: String,
}

#[derive(Debug, Serialize)]
pub struct TurnAccepted {
    pub accepted: bool,
    /// Index of the user message that started the turn
    pub index: Option<usize>,
}

async fn find_session(state: &AppState, id: Uuid) -> Result<Arc<SessionHandle>, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or(ApiError::SessionNotFound(id))
}

/// Let the reply arrive in the background so a dropped request never cancels a turn
fn spawn_turn(session: Arc<SessionHandle>, turn: Option<PendingTurn>) -> (StatusCode, Json<TurnAccepted>) {
    let accepted = match turn {
        Some(turn) => {
            let index = turn.user_index();
            tokio::spawn(async move {
                session.finish(turn).await;
            });
            TurnAccepted {
                accepted: true,
                index: Some(index),
            }
        }
        None => TurnAccepted {
            accepted: false,
            index: None,
        },
    };

    (StatusCode::ACCEPTED, Json(accepted))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        mode: state.config.mode,
    })
}

async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<CreatedSession>) {
    let session = state.sessions.create().await;
    (StatusCode::CREATED, Json(CreatedSession { id: session.id() }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id).await?;
    Ok(Json(session.snapshot().await))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound(id))
    }
}

async fn put_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DraftRequest>,
) -> Result<StatusCode, ApiError> {
    let session = find_session(&state, id).await?;
    session.set_draft(&request.text).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn submit_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitRequest>,
) -> Result<(StatusCode, Json<TurnAccepted>), ApiError> {
    let session = find_session(&state, id).await?;
    let turn = match request.content {
        Some(content) => session.begin_submit(&content).await,
        None => session.begin_submit_draft().await,
    };
    Ok(spawn_turn(session, turn))
}

async fn quick_select(
    State(state): State<AppState>,
    Path((id, category)): Path<(Uuid, String)>,
) -> Result<(StatusCode, Json<TurnAccepted>), ApiError> {
    let category: Category = category.parse()?;
    let session = find_session(&state, id).await?;
    let turn = session.begin_quick_select(category).await;
    Ok(spawn_turn(session, turn))
}

async fn set_feedback(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<Acknowledgement>, ApiError> {
    let session = find_session(&state, id).await?;
    let ack = session.set_feedback(index, request.feedback).await?;
    Ok(Json(ack))
}

async fn put_credential(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CredentialRequest>,
) -> Result<StatusCode, ApiError> {
    let session = find_session(&state, id).await?;
    session.set_credential(Some(&request.credential)).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_credential(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let session = find_session(&state, id).await?;
    session.set_credential(None).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Snapshot first, then every change as it happens
async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let session = find_session(&state, id).await?;
    let mut events = session.subscribe();
    let snapshot = session.snapshot().await;
    drop(session);

    let stream = async_stream::stream! {
        if let Ok(event) = Event::default().event("snapshot").json_data(&snapshot) {
            yield Ok::<_, Infallible>(event);
        }

        loop {
            match events.recv().await {
                Ok(event) => match Event::default().event(event.name()).json_data(&event) {
                    Ok(sse) => {
                        yield Ok(sse);
                    }
                    Err(e) => tracing::warn!("Failed to encode session event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(session = %id, skipped, "Event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/sessions", post(create_session))
        .route("/v1/sessions/:id", get(get_session).delete(delete_session))
        .route("/v1/sessions/:id/draft", put(put_draft))
        .route("/v1/sessions/:id/messages", post(submit_message))
        .route("/v1/sessions/:id/messages/:index/feedback", post(set_feedback))
        .route("/v1/sessions/:id/quick/:category", post(quick_select))
        .route(
            "/v1/sessions/:id/credential",
            put(put_credential).delete(delete_credential),
        )
        .route("/v1/sessions/:id/events", get(session_events))
}
