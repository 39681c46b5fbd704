//! Transport-boundary event model for streamed chat responses.
//!
//! Providers emit one JSON object per SSE data line. The wire format is a bag
//! of optional keys (`delta`, `thinking_delta`, `tool_start`, ...), so the
//! payload is decoded once here into the closed [`StreamEvent`] union and the
//! rendering core only ever switches over a finite set of variants.
//!
//! Unrecognized payloads decode to [`StreamEvent::Unknown`] — never an error;
//! a malformed line degrades a single message, not the session.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// One decoded stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental assistant-message text.
    Delta { text: String },
    /// A reasoning block opened (Anthropic-style providers).
    ThinkingStart,
    /// Incremental reasoning text.
    ThinkingDelta { text: String },
    /// The reasoning block closed.
    ThinkingEnd,
    /// A tool invocation started.
    ToolStart { id: String, name: String },
    /// Incremental tool-input JSON text.
    ToolInputUpdate { text: String },
    /// A complete tool call (id, name, accumulated input).
    ToolCall {
        id: String,
        name: String,
        input: Value,
    },
    /// A tool produced its result payload.
    ToolResult { value: Value },
    /// Provider metadata to merge into the message record.
    Metadata { value: Value },
    /// End-of-stream marker.
    Done,
    /// A payload with no recognized key, preserved for diagnostics.
    Unknown { raw: Value },
}

/// Wire shape: every known key optional, extra keys ignored.
#[derive(Debug, Default, Deserialize)]
struct RawStreamEvent {
    #[serde(default)]
    delta: Option<String>,
    #[serde(default)]
    thinking_start: Option<Value>,
    #[serde(default)]
    thinking_delta: Option<String>,
    #[serde(default)]
    thinking_end: Option<Value>,
    #[serde(default)]
    tool_start: Option<RawToolStart>,
    #[serde(default)]
    tool_input_update: Option<String>,
    #[serde(default)]
    tool_call: Option<RawToolCall>,
    #[serde(default)]
    tool_result: Option<Value>,
    #[serde(default)]
    metadata: Option<Value>,
    #[serde(default)]
    done: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawToolStart {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawToolCall {
    id: String,
    name: String,
    #[serde(default)]
    input: Value,
}

impl StreamEvent {
    /// Decode one SSE data line.
    ///
    /// Key precedence mirrors how providers are known to combine keys in one
    /// payload: thinking events win over text deltas, tool lifecycle events
    /// are checked next, then metadata and termination.
    pub fn decode(line: &str) -> Self {
        let raw_value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(_) => {
                return StreamEvent::Unknown {
                    raw: Value::String(line.to_string()),
                };
            }
        };
        let raw: RawStreamEvent = match RawStreamEvent::deserialize(&raw_value) {
            Ok(raw) => raw,
            Err(_) => RawStreamEvent::default(),
        };

        if raw.thinking_start.is_some() {
            return StreamEvent::ThinkingStart;
        }
        if let Some(text) = raw.thinking_delta {
            return StreamEvent::ThinkingDelta { text };
        }
        if raw.thinking_end.is_some() {
            return StreamEvent::ThinkingEnd;
        }
        if let Some(tool) = raw.tool_start {
            return StreamEvent::ToolStart {
                id: tool.id,
                name: tool.name,
            };
        }
        if let Some(text) = raw.tool_input_update {
            return StreamEvent::ToolInputUpdate { text };
        }
        if let Some(call) = raw.tool_call {
            return StreamEvent::ToolCall {
                id: call.id,
                name: call.name,
                input: call.input,
            };
        }
        if let Some(value) = raw.tool_result {
            return StreamEvent::ToolResult { value };
        }
        if let Some(text) = raw.delta {
            return StreamEvent::Delta { text };
        }
        if let Some(value) = raw.metadata {
            return StreamEvent::Metadata { value };
        }
        if raw.done == Some(true) {
            return StreamEvent::Done;
        }
        StreamEvent::Unknown { raw: raw_value }
    }

    /// Whether this event implicitly closes an active reasoning block.
    ///
    /// Some providers never send `thinking_end`; the first text delta while a
    /// reasoning block is active signals the transition instead. Consumers
    /// should treat a `true` here as an explicit `ThinkingEnd` followed by
    /// the event itself.
    pub fn ends_thinking(&self, thinking_active: bool) -> bool {
        match self {
            StreamEvent::ThinkingEnd => true,
            StreamEvent::Delta { .. } => thinking_active,
            _ => false,
        }
    }
}
