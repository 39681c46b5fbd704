//! Incremental markdown rendering for streamed chat responses.
//!
//! Assistant output arrives as small text deltas. On every chunk the
//! transport layer hands [`MarkdownService::process_markdown`] the cumulative
//! message text plus a streaming flag; the service re-scans the buffer
//! line-by-line, classifies lines into block regions (code fence / table /
//! inline `<think>` / horizontal rule / paragraph), delegates to the
//! span-level processors, and produces sanitized HTML. Multi-line blocks are
//! backed by host widgets that are created once per stable block id and then
//! patched in place, so repeated scans of a growing prefix refine the output
//! instead of rebuilding it.
//!
//! The pipeline is deliberately a streaming-tolerant markdown subset for chat
//! output, not a general-purpose CommonMark renderer: an unterminated fence
//! or half-arrived table is rendered best-effort and finalized when the
//! stream ends, and no input is ever a fatal error.

mod blocks;
mod host;
mod inline;
mod lists;
mod math;
mod normalize;
mod patterns;
mod service;
mod sse;
mod tables;

pub use blocks::Alignment;
pub use blocks::CodeBlock;
pub use blocks::TableData;
pub use blocks::ThinkBlockData;
pub use host::HostSurface;
pub use host::WidgetKind;
pub use host::WidgetProps;
#[cfg(feature = "katex")]
pub use math::KatexRenderer;
pub use math::MathProcessor;
pub use math::MathRenderError;
pub use math::MathRenderer;
pub use service::MarkdownService;
pub use tables::TableProcessor;
pub use tables::WIDE_TABLE_COLUMNS;
pub use tables::WIDTH_SAMPLE_ROWS;
