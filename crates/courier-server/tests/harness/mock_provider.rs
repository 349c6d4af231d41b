//! Mock model-inference backend for integration tests
//!
//! Implements a minimal Anthropic-style messages endpoint that replays
//! scripted SSE streams and records what the relay sends upstream.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::json;
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// A scripted upstream response.
#[derive(Debug, Clone)]
pub struct Script {
    frames: Vec<String>,
    pace: Duration,
    /// Frame index to wait at until [`MockProvider::release_rest`] is called.
    hold_before: Option<usize>,
    /// Keep the connection open after the last frame instead of closing it.
    stall_after_frames: bool,
}

fn sse_frame(event: &str, data: serde_json::Value) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}

fn message_start_frame() -> String {
    sse_frame(
        "message_start",
        json!({
            "type": "message_start",
            "message": {"id": "msg_mock_01", "usage": {"input_tokens": 12, "output_tokens": 0}}
        }),
    )
}

fn message_end_frames(output_tokens: u32) -> Vec<String> {
    vec![
        sse_frame(
            "message_delta",
            json!({
                "type": "message_delta",
                "delta": {"stop_reason": "end_turn"},
                "usage": {"output_tokens": output_tokens}
            }),
        ),
        sse_frame("message_stop", json!({"type": "message_stop"})),
    ]
}

fn text_delta_frame(text: &str) -> String {
    sse_frame(
        "content_block_delta",
        json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": {"type": "text_delta", "text": text}
        }),
    )
}

impl Script {
    /// Streams the given text fragments, then a normal completion.
    pub fn text(fragments: &[&str]) -> Self {
        Self::text_paced(fragments, 0)
    }

    /// Like [`Script::text`] with a delay before every frame.
    pub fn text_paced(fragments: &[&str], pace_ms: u64) -> Self {
        let mut frames = vec![
            message_start_frame(),
            sse_frame(
                "content_block_start",
                json!({
                    "type": "content_block_start",
                    "index": 0,
                    "content_block": {"type": "text", "text": ""}
                }),
            ),
        ];
        frames.extend(fragments.iter().map(|f| text_delta_frame(f)));
        frames.push(sse_frame(
            "content_block_stop",
            json!({"type": "content_block_stop", "index": 0}),
        ));
        frames.extend(message_end_frames(7));

        Self {
            frames,
            pace: Duration::from_millis(pace_ms),
            hold_before: None,
            stall_after_frames: false,
        }
    }

    /// Streams a tool invocation: a start block carrying id and name, then
    /// the argument JSON in two fragments.
    pub fn tool_call() -> Self {
        let mut frames = vec![
            message_start_frame(),
            sse_frame(
                "content_block_start",
                json!({
                    "type": "content_block_start",
                    "index": 0,
                    "content_block": {"type": "tool_use", "id": "toolu_mock_01", "name": "get_weather", "input": {}}
                }),
            ),
            sse_frame(
                "content_block_delta",
                json!({
                    "type": "content_block_delta",
                    "index": 0,
                    "delta": {"type": "input_json_delta", "partial_json": "{\"city\":"}
                }),
            ),
            sse_frame(
                "content_block_delta",
                json!({
                    "type": "content_block_delta",
                    "index": 0,
                    "delta": {"type": "input_json_delta", "partial_json": "\"Paris\"}"}
                }),
            ),
            sse_frame(
                "content_block_stop",
                json!({"type": "content_block_stop", "index": 0}),
            ),
        ];
        frames.extend(message_end_frames(5));

        Self {
            frames,
            pace: Duration::ZERO,
            hold_before: None,
            stall_after_frames: false,
        }
    }

    /// Streams one text fragment, then a provider error event.
    pub fn mid_stream_error() -> Self {
        let frames = vec![
            message_start_frame(),
            text_delta_frame("partial"),
            sse_frame(
                "error",
                json!({
                    "type": "error",
                    "error": {"type": "overloaded_error", "message": "Overloaded"}
                }),
            ),
        ];

        Self {
            frames,
            pace: Duration::ZERO,
            hold_before: None,
            stall_after_frames: false,
        }
    }

    /// Streams the first text fragment, then waits for
    /// [`MockProvider::release_rest`] before continuing.
    pub fn hold_after_first(fragments: &[&str]) -> Self {
        let mut script = Self::text(fragments);
        // Hold before the second text delta: message_start, block_start and
        // the first delta go out immediately.
        script.hold_before = Some(3);
        script
    }

    /// Opens the stream, then never sends another byte.
    pub fn stalled() -> Self {
        Self {
            frames: vec![message_start_frame()],
            pace: Duration::ZERO,
            hold_before: None,
            stall_after_frames: true,
        }
    }
}

struct MockState {
    request_count: AtomicU32,
    bodies: Mutex<Vec<serde_json::Value>>,
    headers: Mutex<Vec<(String, String)>>,
    fail_status: Option<u16>,
    script: Script,
    release: Notify,
    dropped_tx: mpsc::UnboundedSender<()>,
}

/// Mock provider that replays a [`Script`] and records requests.
pub struct MockProvider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
    dropped_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<()>>,
}

impl MockProvider {
    /// Start a mock that streams a short two-fragment response.
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(Script::text(&["Hel", "lo"]), None).await
    }

    /// Start a mock that replays the given script.
    pub async fn start_with_script(script: Script) -> anyhow::Result<Self> {
        Self::start_inner(script, None).await
    }

    /// Start a mock that fails every request with the given status.
    pub async fn start_failing(status: u16) -> anyhow::Result<Self> {
        Self::start_inner(Script::text(&[]), Some(status)).await
    }

    async fn start_inner(script: Script, fail_status: Option<u16>) -> anyhow::Result<Self> {
        let (dropped_tx, dropped_rx) = mpsc::unbounded_channel();
        let state = Arc::new(MockState {
            request_count: AtomicU32::new(0),
            bodies: Mutex::new(Vec::new()),
            headers: Mutex::new(Vec::new()),
            fail_status,
            script,
            release: Notify::new(),
            dropped_tx,
        });

        let app = Router::new()
            .route("/v1/messages", routing::post(handle_messages))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            shutdown,
            state,
            dropped_rx: tokio::sync::Mutex::new(dropped_rx),
        })
    }

    /// URL to configure as the relay's upstream endpoint.
    pub fn messages_url(&self) -> String {
        format!("http://{}/v1/messages", self.addr)
    }

    /// Number of requests received.
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }

    /// JSON bodies received, in order.
    pub fn recorded_bodies(&self) -> Vec<serde_json::Value> {
        self.state.bodies.lock().unwrap().clone()
    }

    /// `(x-api-key, anthropic-version)` header pairs received, in order.
    pub fn recorded_headers(&self) -> Vec<(String, String)> {
        self.state.headers.lock().unwrap().clone()
    }

    /// Lets a held script continue streaming.
    pub fn release_rest(&self) {
        self.state.release.notify_one();
    }

    /// Waits until the relay drops the upstream response body.
    pub async fn upstream_dropped_within(&self, timeout: Duration) -> bool {
        let mut rx = self.dropped_rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.is_ok()
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_messages(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    state.bodies.lock().unwrap().push(body);

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned()
    };
    state
        .headers
        .lock()
        .unwrap()
        .push((header("x-api-key"), header("anthropic-version")));

    if let Some(status) = state.fail_status {
        return (
            StatusCode::from_u16(status).unwrap(),
            Json(json!({
                "type": "error",
                "error": {"type": "api_error", "message": "mock provider intentional failure"}
            })),
        )
            .into_response();
    }

    let script = state.script.clone();
    let (body_tx, body_rx) = mpsc::channel::<Result<Bytes, Infallible>>(1);
    let task_state = Arc::clone(&state);

    tokio::spawn(async move {
        for (i, frame) in script.frames.iter().enumerate() {
            if script.hold_before == Some(i) {
                task_state.release.notified().await;
            }
            if !script.pace.is_zero() {
                tokio::time::sleep(script.pace).await;
            }
            if body_tx.send(Ok(Bytes::from(frame.clone()))).await.is_err() {
                let _ = task_state.dropped_tx.send(());
                return;
            }
        }
        if script.stall_after_frames {
            body_tx.closed().await;
            let _ = task_state.dropped_tx.send(());
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/event-stream")
        .body(Body::from_stream(ReceiverStream::new(body_rx)))
        .unwrap()
}
