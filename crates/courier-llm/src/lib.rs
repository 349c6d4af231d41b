//! Streaming client for the hosted model-inference API.
//!
//! This crate owns the single upstream collaborator of the relay:
//!
//! - [`AnthropicClient`] — opens a streaming messages call and yields
//!   [`StreamEvent`]s as fragments arrive
//! - [`translate_tools`] — pure transform from the frontend tool mapping to
//!   the provider's tool shape
//! - [`EventStream`] — the pinned, boxed stream consumed by the relay pump
//!
//! # Streaming
//!
//! ```rust,ignore
//! use courier_llm::{AnthropicClient, translate_tools};
//! use courier_core::StreamEvent;
//! use futures::StreamExt;
//!
//! let client = AnthropicClient::new(reqwest::Client::new(), &config);
//! let mut stream = client.message_stream(None, &messages, vec![]).await?;
//!
//! while let Some(event) = stream.next().await {
//!     match event? {
//!         StreamEvent::TextDelta { text } => print!("{}", text),
//!         StreamEvent::ToolCallDelta { name, .. } => { /* forward */ }
//!         StreamEvent::Usage { input_tokens, output_tokens } => {}
//!         StreamEvent::Done => break,
//!     }
//! }
//! ```

mod anthropic;

pub use anthropic::{translate_tools, AnthropicClient, AnthropicTool, EventStream};
pub use courier_core::{ChatMessage, MessageRole, RelayError, StreamEvent, ToolDefinition};
