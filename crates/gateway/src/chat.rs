//! `POST /v1/chat/completions`: the OpenAI-compatible entry point.

use std::convert::Infallible;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Json, Response},
};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use agentbridge_bridge::{SESSION_HEADER, TurnRequest};
use agentbridge_core::error::Error;
use agentbridge_core::message::OutboundMessage;

use crate::SharedState;
use crate::openai::{
    ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, ErrorBody, ErrorResponse,
    StreamError, completion_id,
};

/// An error rendered as `{"error": {"message", "type"}}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            Error::UnknownModel { .. } => (StatusCode::NOT_FOUND, "model_not_found"),
            Error::MissingMessages => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            Error::Backend(_) => (StatusCode::BAD_GATEWAY, "backend_error"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let body = ErrorResponse {
            error: ErrorBody {
                message: self.0.to_string(),
                kind: kind.into(),
            },
        };
        (status, Json(body)).into_response()
    }
}

fn explicit_session_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok())
}

pub async fn chat_completions(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<ChatCompletionRequest>,
) -> Result<Response, ApiError> {
    let request = TurnRequest {
        model: &body.model,
        messages: &body.messages,
        tools: body.tools.as_deref(),
        tool_results: body.tool_results.as_deref().unwrap_or(&[]),
    };
    let turn = state
        .bridge
        .prepare_turn(request, explicit_session_key(&headers))
        .await?;

    info!(
        model = %body.model,
        session = %turn.session_key,
        overlay_changed = turn.overlay_changed,
        outbound = turn.batch.len(),
        stream = body.stream,
        "Forwarding to agent"
    );

    if body.stream {
        return Ok(stream_response(state, body.model, turn.agent.id, turn.batch));
    }

    if turn.batch.is_empty() {
        return Ok(Json(ChatCompletion::empty(&body.model)).into_response());
    }

    let response = state
        .bridge
        .backend()
        .send_messages(&turn.agent.id, turn.batch)
        .await
        .map_err(|e| {
            error!(agent_id = %turn.agent.id, error = %e, "Message exchange failed");
            Error::Backend(e)
        })?;
    debug!(events = response.events.len(), "Agent responded");

    let completion = ChatCompletion::from_agent_response(&body.model, &response, |name| {
        state.bridge.caller_tool_name(&turn.agent.id, name)
    });
    Ok(Json(completion).into_response())
}

fn json_event<T: serde::Serialize>(value: &T) -> SseEvent {
    SseEvent::default().data(serde_json::to_string(value).unwrap_or_default())
}

/// Stream the exchange as OpenAI chunks.
///
/// A relay task feeds the SSE body; backend failures after the primer are
/// reported in-band and every stream ends with `[DONE]`.
fn stream_response(
    state: SharedState,
    model: String,
    agent_id: String,
    batch: Vec<OutboundMessage>,
) -> Response {
    let (tx, rx) = mpsc::channel::<SseEvent>(64);
    tokio::spawn(relay(state, model, agent_id, batch, tx));

    let stream = ReceiverStream::new(rx).map(Ok::<_, Infallible>);
    (
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(stream),
    )
        .into_response()
}

async fn relay(
    state: SharedState,
    model: String,
    agent_id: String,
    batch: Vec<OutboundMessage>,
    tx: mpsc::Sender<SseEvent>,
) {
    let stream_id = completion_id();
    if tx
        .send(json_event(&ChatCompletionChunk::primer(&stream_id, &model)))
        .await
        .is_err()
    {
        return;
    }

    if !batch.is_empty() {
        forward_events(&state, &model, &agent_id, batch, &stream_id, &tx).await;
    }

    let _ = tx.send(SseEvent::default().data("[DONE]")).await;
}

async fn forward_events(
    state: &SharedState,
    model: &str,
    agent_id: &str,
    batch: Vec<OutboundMessage>,
    stream_id: &str,
    tx: &mpsc::Sender<SseEvent>,
) {
    let mut events = match state.bridge.backend().stream_messages(agent_id, batch).await {
        Ok(events) => events,
        Err(e) => {
            error!(agent_id, error = %e, "Streaming error");
            let _ = tx.send(json_event(&StreamError::new(stream_id, e))).await;
            return;
        }
    };

    while let Some(item) = events.recv().await {
        let frame = match item {
            Ok(event) => {
                let chunk = ChatCompletionChunk::from_event(stream_id, model, &event, |name| {
                    state.bridge.caller_tool_name(agent_id, name)
                });
                match chunk {
                    Some(chunk) => json_event(&chunk),
                    None => continue,
                }
            }
            Err(e) => {
                error!(agent_id, error = %e, "Streaming error");
                let _ = tx.send(json_event(&StreamError::new(stream_id, e))).await;
                return;
            }
        };
        if tx.send(frame).await.is_err() {
            debug!(agent_id, "Client disconnected mid-stream");
            return;
        }
    }
}
