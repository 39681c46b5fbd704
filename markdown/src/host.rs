//! Host-surface capability: how the pipeline reaches the rendering host.
//!
//! The service never touches a document directly. It emits placeholder
//! elements in its HTML output and asks the host to mount, patch, or destroy
//! widgets inside them. `layout_tick` is the pipeline's sole suspension
//! point: a placeholder can only be queried after the host has had one
//! layout pass to insert it. If the element is gone by then (message view
//! torn down mid-stream), the attach is silently skipped — that is the only
//! cancellation semantic the pipeline needs.

use async_trait::async_trait;

/// The widget kinds the pipeline mounts. Tables render as inline HTML and do
/// not get a widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    CodeHighlight,
    Thinking,
}

/// Properties pushed to a widget on create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WidgetProps {
    pub content: String,
    pub language: Option<String>,
    pub streaming: bool,
}

#[async_trait]
pub trait HostSurface {
    /// Yield once so a pending layout pass can insert freshly emitted
    /// placeholder elements.
    async fn layout_tick(&mut self);

    /// Whether the placeholder element is (still) present in the document.
    fn element_exists(&self, id: &str) -> bool;

    fn create_widget(&mut self, kind: WidgetKind, target_id: &str, props: WidgetProps);

    fn update_widget(&mut self, target_id: &str, props: WidgetProps);

    /// Replace a table placeholder's inner HTML (already sanitized) and set
    /// its streaming marker.
    fn set_table_html(&mut self, target_id: &str, html: &str, streaming: bool);

    fn destroy_widget(&mut self, target_id: &str);
}
