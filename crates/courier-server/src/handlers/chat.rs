//! SSE-based chat relay handler.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use courier_core::{RelayError, StreamEvent};
use futures::stream::Stream;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use crate::dto::{ChatRequest, RelayMetadata};
use crate::error::AppError;
use crate::services::chat::{build_metadata, open_relay, RelayOutcome};
use crate::ServerState;

/// SSE event data types.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum SseData {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_call")]
    ToolCall {
        index: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        arguments_delta: Option<String>,
    },
    #[serde(rename = "end")]
    End { metadata: RelayMetadata },
    #[serde(rename = "error")]
    Error { message: String },
}

impl SseData {
    fn event_name(&self) -> &'static str {
        match self {
            SseData::Text { .. } => "text",
            SseData::ToolCall { .. } => "tool_call",
            SseData::End { .. } => "end",
            SseData::Error { .. } => "error",
        }
    }
}

type EventSender = mpsc::Sender<Result<Event, std::convert::Infallible>>;

/// SSE chat relay endpoint.
///
/// Returns the response before the upstream stream completes; fragments are
/// flushed to the caller as they arrive.
pub async fn chat(
    State(state): State<Arc<ServerState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>>, AppError> {
    if req.messages.is_empty() {
        return Err(AppError::BadRequest("messages must not be empty".into()));
    }

    info!(
        "Chat request: {} messages, {} tools, system: {}",
        req.messages.len(),
        req.tools.len(),
        req.system.is_some(),
    );

    let (tx, rx) = mpsc::channel::<Result<Event, std::convert::Infallible>>(100);

    tokio::spawn(async move {
        let start = Instant::now();
        let mut outcome = RelayOutcome::default();

        let ceiling = state.config.relay_timeout;
        let relayed = tokio::time::timeout(ceiling, run_relay(&tx, &state, req, &mut outcome));
        if relayed.await.is_err() {
            error!("Relay exceeded {}s ceiling, dropping upstream stream", ceiling.as_secs());
            send_event(&tx, SseData::Error { message: RelayError::Timeout.to_string() }).await;
        }

        let metadata = build_metadata(&outcome, start.elapsed().as_millis() as u64);
        info!("Relay finished: {}", metadata);
        send_event(&tx, SseData::End { metadata }).await;
    });

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}

/// Sends one event to the caller. Returns `false` once the caller has
/// disconnected and the channel is closed.
async fn send_event(tx: &EventSender, data: SseData) -> bool {
    let event = Event::default().event(data.event_name()).json_data(&data).unwrap();
    tx.send(Ok(event)).await.is_ok()
}

/// Pumps the upstream stream to the caller, one event at a time, in receipt
/// order. Returns when the upstream ends, fails, or the caller disconnects;
/// in every case the upstream stream is dropped and its connection released.
async fn run_relay(
    tx: &EventSender,
    state: &ServerState,
    req: ChatRequest,
    outcome: &mut RelayOutcome,
) {
    let mut stream = match open_relay(&state.anthropic, &req).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Upstream call failed: {}", e);
            send_event(tx, SseData::Error { message: e.to_string() }).await;
            return;
        }
    };

    while let Some(item) = stream.next().await {
        let data = match item {
            Ok(StreamEvent::TextDelta { text }) => SseData::Text { text },
            Ok(StreamEvent::ToolCallDelta { index, id, name, arguments_delta }) => {
                SseData::ToolCall { index, id, name, arguments_delta }
            }
            Ok(StreamEvent::Usage { input_tokens, output_tokens }) => {
                outcome.record_usage(input_tokens, output_tokens);
                continue;
            }
            Ok(StreamEvent::Done) => return,
            Err(e) => {
                error!("Stream error: {}", e);
                send_event(tx, SseData::Error { message: e.to_string() }).await;
                return;
            }
        };

        if !send_event(tx, data).await {
            info!("Caller disconnected, releasing upstream stream");
            return;
        }
    }
}
