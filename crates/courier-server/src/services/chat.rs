//! Relay execution service - upstream call plumbing for the chat handler.

use courier_core::RelayError;
use courier_llm::{translate_tools, AnthropicClient, EventStream};
use tracing::info;

use crate::dto::{ChatRequest, RelayMetadata};

/// Token accounting accumulated while pumping a stream.
#[derive(Debug, Default)]
pub struct RelayOutcome {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl RelayOutcome {
    /// Records a usage report from the provider. Input arrives at stream
    /// start, output at stream end; zero values never overwrite a count.
    pub fn record_usage(&mut self, input_tokens: u32, output_tokens: u32) {
        if input_tokens > 0 {
            self.input_tokens = input_tokens;
        }
        if output_tokens > 0 {
            self.output_tokens = output_tokens;
        }
    }
}

/// Opens the upstream streaming call for a relay request.
///
/// Translates the frontend tool mapping and forwards the history and system
/// prompt unchanged. This is the only place a request leaves the process.
pub async fn open_relay(
    client: &AnthropicClient,
    req: &ChatRequest,
) -> Result<EventStream, RelayError> {
    let tools = translate_tools(&req.tools);
    if !tools.is_empty() {
        info!("Forwarding {} tool definitions upstream", tools.len());
    }

    client
        .message_stream(req.system.as_deref(), &req.messages, tools)
        .await
}

/// Builds the terminal event metadata from the pump outcome.
pub fn build_metadata(outcome: &RelayOutcome, elapsed_ms: u64) -> RelayMetadata {
    RelayMetadata {
        input_tokens: outcome.input_tokens,
        output_tokens: outcome.output_tokens,
        elapsed_ms,
    }
}
