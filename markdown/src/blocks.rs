//! Per-message block data owned by one [`crate::MarkdownService`].
//!
//! All three block kinds share the same lifecycle: created when a scan first
//! opens the region, content mutated in place on later scans, destroyed with
//! the owning message renderer. `mounted` tracks whether the host confirmed a
//! widget for the block's placeholder element; the widget itself lives on the
//! host side.

/// One fenced code block, rendered by the host's code-highlight widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub id: String,
    pub content: String,
    pub language: String,
    pub mounted: bool,
}

impl CodeBlock {
    pub(crate) fn new(id: &str, content: String, language: &str) -> Self {
        Self {
            id: id.to_string(),
            content,
            language: language.to_string(),
            mounted: false,
        }
    }
}

/// One reasoning block, from inline `<think>` tags or discrete SSE events.
/// `content` holds the sanitized rendered HTML pushed to the widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkBlockData {
    pub id: String,
    pub content: String,
    pub mounted: bool,
}

impl ThinkBlockData {
    pub(crate) fn new(id: &str, content: String) -> Self {
        Self {
            id: id.to_string(),
            content,
            mounted: false,
        }
    }
}

/// Column alignment derived from the separator row's colon placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

/// Parsed pipe-table state, updated in place as rows stream in.
///
/// Invariant: every stored row has exactly `headers.len()` cells; rows that
/// arrive with the wrong arity are dropped, not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableData {
    pub id: String,
    pub headers: Vec<String>,
    pub alignments: Vec<Option<Alignment>>,
    pub rows: Vec<Vec<String>>,
    pub raw_content: String,
    pub is_complete: bool,
}
