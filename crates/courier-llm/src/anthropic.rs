//! Anthropic messages-API client with streaming and tool support.

use std::collections::HashMap;
use std::pin::Pin;

use courier_config::RelayConfig;
use courier_core::{ChatMessage, MessageRole, RelayError, StreamEvent, ToolDefinition};
use futures::Stream;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::error;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A stream of relay events decoded from the provider response.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, RelayError>> + Send>>;

/// Tool definition in the provider's wire shape.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnthropicTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Translates the frontend tool mapping into the provider's tool shape.
///
/// A pure structural transform: the map key becomes the tool name, the
/// description and parameter schema are forwarded unchanged. Output is
/// sorted by name so the upstream request is deterministic.
pub fn translate_tools(tools: &HashMap<String, ToolDefinition>) -> Vec<AnthropicTool> {
    let mut translated: Vec<AnthropicTool> = tools
        .iter()
        .map(|(name, def)| AnthropicTool {
            name: name.clone(),
            description: def.description.clone(),
            input_schema: def.parameters.clone(),
        })
        .collect();
    translated.sort_by(|a, b| a.name.cmp(&b.name));
    translated
}

#[derive(Serialize)]
struct ApiMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<AnthropicTool>,
    stream: bool,
}

// === Wire events ===

#[derive(Deserialize)]
struct WireDelta {
    #[serde(rename = "type")]
    delta_type: Option<String>,
    text: Option<String>,
    partial_json: Option<String>,
}

#[derive(Deserialize)]
struct WireContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    id: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct WireMessage {
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireError {
    message: String,
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    event_type: String,
    index: Option<usize>,
    delta: Option<WireDelta>,
    content_block: Option<WireContentBlock>,
    usage: Option<WireUsage>,
    message: Option<WireMessage>,
    error: Option<WireError>,
}

/// Decodes one SSE `data:` payload into at most one relay event.
///
/// Unknown event types (pings, content_block_stop) decode to `None`.
fn decode_data(json: &str) -> Option<Result<StreamEvent, RelayError>> {
    let event: WireEvent = match serde_json::from_str(json) {
        Ok(e) => e,
        Err(e) => {
            error!("Failed to parse provider event: {} - {}", e, json);
            return Some(Err(RelayError::Decode(e.to_string())));
        }
    };

    match event.event_type.as_str() {
        "content_block_start" => {
            let block = event.content_block?;
            if block.block_type != "tool_use" {
                return None;
            }
            Some(Ok(StreamEvent::ToolCallDelta {
                index: event.index.unwrap_or(0),
                id: block.id,
                name: block.name,
                arguments_delta: None,
            }))
        }
        "content_block_delta" => {
            let delta = event.delta?;
            match delta.delta_type.as_deref() {
                Some("text_delta") => {
                    let text = delta.text?;
                    Some(Ok(StreamEvent::TextDelta { text }))
                }
                Some("input_json_delta") => Some(Ok(StreamEvent::ToolCallDelta {
                    index: event.index.unwrap_or(0),
                    id: None,
                    name: None,
                    arguments_delta: delta.partial_json,
                })),
                _ => None,
            }
        }
        "message_start" => {
            let usage = event.message?.usage?;
            Some(Ok(StreamEvent::Usage {
                input_tokens: usage.input_tokens.unwrap_or(0),
                output_tokens: 0,
            }))
        }
        "message_delta" => {
            let usage = event.usage?;
            Some(Ok(StreamEvent::Usage {
                input_tokens: usage.input_tokens.unwrap_or(0),
                output_tokens: usage.output_tokens.unwrap_or(0),
            }))
        }
        "message_stop" => Some(Ok(StreamEvent::Done)),
        "error" => {
            let message = event
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown provider error".to_string());
            Some(Err(RelayError::Upstream(message)))
        }
        _ => None,
    }
}

/// Appends a network chunk to the line buffer and decodes every complete
/// `data:` line. Incomplete trailing lines stay buffered for the next chunk.
fn decode_chunk(buffer: &mut String, text: &str) -> Vec<Result<StreamEvent, RelayError>> {
    buffer.push_str(text);

    let mut events = Vec::new();
    while let Some(newline_pos) = buffer.find('\n') {
        let line = buffer[..newline_pos].trim().to_string();
        *buffer = buffer[newline_pos + 1..].to_string();

        let Some(json) = line.strip_prefix("data: ") else {
            continue;
        };
        if let Some(event) = decode_data(json) {
            events.push(event);
        }
    }
    events
}

/// Client for Anthropic's messages API.
pub struct AnthropicClient {
    client: Client,
    api_url: String,
    model: String,
    max_tokens: u32,
    api_key: String,
}

impl AnthropicClient {
    /// Creates a new client from the relay configuration.
    pub fn new(client: Client, config: &RelayConfig) -> Self {
        tracing::info!(
            "AnthropicClient: model={}, api_key_len={}",
            config.model,
            config.api_key.len()
        );
        Self {
            client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key: config.api_key.clone(),
        }
    }

    /// Opens a streaming messages call and returns the decoded event stream.
    ///
    /// The history, system prompt, and translated tools are forwarded
    /// verbatim; `stream: true` requests incremental fragments, including
    /// tool-call argument deltas as they are generated.
    pub async fn message_stream(
        &self,
        system: Option<&str>,
        messages: &[ChatMessage],
        tools: Vec<AnthropicTool>,
    ) -> Result<EventStream, RelayError> {
        use futures::StreamExt;

        let api_messages: Vec<ApiMessage> = messages
            .iter()
            .map(|msg| ApiMessage {
                role: match msg.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                },
                content: msg.content.clone(),
            })
            .collect();

        let request = ApiRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: system.map(String::from),
            messages: api_messages,
            tools,
            stream: true,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Upstream(format!(
                "provider API error {}: {}",
                status, body
            )));
        }

        let byte_stream = response.bytes_stream();

        // Scan keeps a buffer across chunks for SSE lines split mid-line
        let mapped = byte_stream
            .scan(String::new(), |buffer, result| {
                let events: Vec<Result<StreamEvent, RelayError>> = match result {
                    Err(e) => vec![Err(RelayError::Upstream(e.to_string()))],
                    Ok(bytes) => match std::str::from_utf8(&bytes) {
                        Ok(text) => decode_chunk(buffer, text),
                        Err(_) => vec![],
                    },
                };
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(mapped))
    }
}
