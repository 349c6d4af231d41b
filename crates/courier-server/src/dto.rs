//! Data transfer objects for HTTP message serialization.

use std::collections::HashMap;
use std::fmt;

use courier_core::{ChatMessage, ToolDefinition};
use serde::{Deserialize, Serialize};

/// Request body for the chat relay endpoint.
///
/// `messages` is required; the system prompt and the tool mapping are
/// optional and forwarded verbatim when present.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub tools: HashMap<String, ToolDefinition>,
}

/// Metadata about a relayed response (timing, tokens), sent with the
/// terminal `end` event.
#[derive(Debug, Clone, Serialize, Default)]
pub struct RelayMetadata {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub elapsed_ms: u64,
}

impl fmt::Display for RelayMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ms, {}/{} tokens",
            self.elapsed_ms, self.input_tokens, self.output_tokens
        )
    }
}
