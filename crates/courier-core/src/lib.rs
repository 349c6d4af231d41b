//! Core domain types and error definitions for courier.
//!
//! This crate provides the fundamental types shared across the relay:
//!
//! - [`RelayError`] — Error type for upstream and relay operations
//! - [`ChatMessage`] and [`MessageRole`] — Conversation message types
//! - [`ToolDefinition`] — Frontend-supplied tool schema
//! - [`StreamEvent`] — Tagged fragments of a streamed model response
//!
//! # Example
//!
//! ```rust
//! use courier_core::{ChatMessage, MessageRole, StreamEvent};
//!
//! let msg = ChatMessage::user("Hello!");
//! let reply = ChatMessage::assistant("Hi! How can I help?");
//!
//! let event = StreamEvent::TextDelta { text: "Hi".to_string() };
//! assert!(matches!(event, StreamEvent::TextDelta { .. }));
//! assert_eq!(msg.role, MessageRole::User);
//! assert_eq!(reply.role, MessageRole::Assistant);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while relaying a chat request upstream.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Upstream provider call or mid-stream transport failed.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// Provider emitted an event the relay could not decode.
    #[error("failed to decode provider event: {0}")]
    Decode(String),

    /// Relay exceeded its execution ceiling.
    #[error("relay timed out")]
    Timeout,
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Decode(err.to_string())
    }
}

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the assistant/LLM.
    Assistant,
}

/// A single message in a conversation history.
///
/// Histories are forwarded to the provider verbatim, in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Creates a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    /// Creates a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}

// ============================================================================
// Tool Types
// ============================================================================

/// Schema for a callable function supplied by the frontend.
///
/// The frontend sends tools as a mapping from tool name to definition. The
/// relay never executes tools; it translates the schema for the provider
/// call and streams tool-call intents back for the frontend to execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Human-readable description of what the tool does.
    #[serde(default)]
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

// ============================================================================
// Stream Events
// ============================================================================

/// A tagged fragment of a streamed model response.
///
/// Produced by the upstream client in receipt order and consumed by the
/// outbound writer in a forward-only loop. The sequence per request is
/// finite and not restartable; a dropped connection requires a new request.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Partial assistant text.
    TextDelta {
        /// The text fragment.
        text: String,
    },
    /// Partial tool invocation, index-based. The first delta for an index
    /// carries the call id and tool name; subsequent deltas carry fragments
    /// of the argument JSON.
    ToolCallDelta {
        /// Position of the tool call within the response.
        index: usize,
        /// Provider-assigned call id (first delta only).
        id: Option<String>,
        /// Tool name (first delta only).
        name: Option<String>,
        /// Fragment of the argument JSON.
        arguments_delta: Option<String>,
    },
    /// Token accounting as reported by the provider. May arrive once at
    /// stream start (input side) and once at stream end (output side).
    Usage {
        /// Tokens consumed by the request.
        input_tokens: u32,
        /// Tokens produced so far.
        output_tokens: u32,
    },
    /// Upstream signalled normal completion.
    Done,
}
