//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST /v1/chat`: Run a turn, get the transcript
//! - `POST /v1/chat/stream`: Run a turn, get an SSE stream of UI events
//! - `GET  /v1/sessions/{id}/transcript`: Current transcript of a session
//! - `GET  /v1/logs`: SSE stream of domain events (no message text)

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::{BroadcastStream, UnboundedReceiverStream};
use tracing::{error, info};

use relaychat_agent::TurnOutcome;
use relaychat_core::session::{ChannelRenderer, NullRenderer, TurnState, UiEvent};
use relaychat_core::transcript::ChatMessage;

use crate::SharedState;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .route("/sessions/{id}/transcript", get(transcript_handler))
        .route("/logs", get(log_stream_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Session to continue; a new one is created when absent
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub outcome: TurnOutcome,
    pub transcript: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub session_id: String,
    pub state: TurnState,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn validate(payload: &ChatRequest) -> Result<(), ApiError> {
    if payload.message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "message must not be empty"));
    }
    Ok(())
}

// ── Handlers ──────────────────────────────────────────────────────────────

/// `POST /v1/chat`: Run a turn and return the resulting transcript.
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    validate(&payload)?;

    let (session_id, session) = state
        .sessions
        .get_or_create(payload.session_id.as_deref())
        .await;
    info!(session_id = %session_id, message_len = payload.message.len(), "v1/chat request");

    let handle = state
        .driver
        .spawn_turn(session.clone(), payload.message, Box::new(NullRenderer));

    let outcome = match handle.await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!(session_id = %session_id, error = %e, "Turn failed");
            return Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Turn task failed");
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Turn task failed: {e}"),
            ));
        }
    };

    let transcript = session.lock().await.transcript().messages().to_vec();
    Ok(Json(ChatResponse {
        session_id,
        outcome,
        transcript,
    }))
}

/// `POST /v1/chat/stream`: Run a turn, streaming UI events as SSE.
///
/// The first event names the session; `render` events carry the full
/// transcript after each append; the stream ends with `done` or `error`.
async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    validate(&payload)?;

    let (session_id, session) = state
        .sessions
        .get_or_create(payload.session_id.as_deref())
        .await;
    info!(session_id = %session_id, message_len = payload.message.len(), "v1/chat/stream SSE request");

    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(UiEvent::Session {
        session_id: session_id.clone(),
    });

    let handle = state.driver.spawn_turn(
        session,
        payload.message,
        Box::new(ChannelRenderer::new(tx.clone())),
    );

    // Report how the turn ended, then drop the last sender to end the stream.
    tokio::spawn(async move {
        let last = match handle.await {
            Ok(Ok(TurnOutcome::Completed(summary))) => UiEvent::Done {
                halted: false,
                stop_reason: Some(summary.stop_reason),
            },
            Ok(Ok(TurnOutcome::Halted { .. })) => UiEvent::Done {
                halted: true,
                stop_reason: None,
            },
            Ok(Err(e)) => {
                error!(session_id = %session_id, error = %e, "Turn failed");
                UiEvent::Error {
                    message: e.to_string(),
                }
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Turn task failed");
                UiEvent::Error {
                    message: format!("Turn task failed: {e}"),
                }
            }
        };
        let _ = tx.send(last);
    });

    let stream = UnboundedReceiverStream::new(rx).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(SseEvent::default().event(event.event_type()).data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// `GET /v1/sessions/{id}/transcript`: Current transcript of a session.
async fn transcript_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Session not found: {id}")))?;

    let session = session.lock().await;
    Ok(Json(TranscriptResponse {
        session_id: id,
        state: session.state(),
        messages: session.transcript().messages().to_vec(),
    }))
}

/// `GET /v1/logs`: SSE stream of domain events (turns, relayed messages, tool calls).
async fn log_stream_handler(
    State(state): State<SharedState>,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.event_bus.subscribe();
    let stream = BroadcastStream::new(rx)
        .filter_map(|result| result.ok())
        .map(|event| {
            let data = serde_json::to_string(event.as_ref()).unwrap_or_default();
            Ok(SseEvent::default().event(event.event_type()).data(data))
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
