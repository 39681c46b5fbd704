//! Test doubles shared by the pipeline integration tests.

use std::collections::HashSet;

use async_trait::async_trait;
use tidemark_markdown::HostSurface;
use tidemark_markdown::MathRenderError;
use tidemark_markdown::MathRenderer;
use tidemark_markdown::WidgetKind;
use tidemark_markdown::WidgetProps;

/// Everything the pipeline asked the host to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Created {
        kind: WidgetKind,
        id: String,
        props: WidgetProps,
    },
    Updated {
        id: String,
        props: WidgetProps,
    },
    TableSet {
        id: String,
        html: String,
        streaming: bool,
    },
    Destroyed {
        id: String,
    },
}

/// Recording host: every call is appended to `events`; ids listed in
/// `missing` report their placeholder as absent (torn-down message view).
#[derive(Debug, Default)]
pub struct TestHost {
    pub events: Vec<HostEvent>,
    pub missing: HashSet<String>,
    pub ticks: usize,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_missing(ids: &[&str]) -> Self {
        Self {
            missing: ids.iter().map(|id| (*id).to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn created(&self) -> Vec<&HostEvent> {
        self.events
            .iter()
            .filter(|event| matches!(event, HostEvent::Created { .. }))
            .collect()
    }

    pub fn updated(&self) -> Vec<&HostEvent> {
        self.events
            .iter()
            .filter(|event| matches!(event, HostEvent::Updated { .. }))
            .collect()
    }

    pub fn table_sets(&self) -> Vec<&HostEvent> {
        self.events
            .iter()
            .filter(|event| matches!(event, HostEvent::TableSet { .. }))
            .collect()
    }
}

#[async_trait]
impl HostSurface for TestHost {
    async fn layout_tick(&mut self) {
        self.ticks += 1;
    }

    fn element_exists(&self, id: &str) -> bool {
        !self.missing.contains(id)
    }

    fn create_widget(&mut self, kind: WidgetKind, target_id: &str, props: WidgetProps) {
        self.events.push(HostEvent::Created {
            kind,
            id: target_id.to_string(),
            props,
        });
    }

    fn update_widget(&mut self, target_id: &str, props: WidgetProps) {
        self.events.push(HostEvent::Updated {
            id: target_id.to_string(),
            props,
        });
    }

    fn set_table_html(&mut self, target_id: &str, html: &str, streaming: bool) {
        self.events.push(HostEvent::TableSet {
            id: target_id.to_string(),
            html: html.to_string(),
            streaming,
        });
    }

    fn destroy_widget(&mut self, target_id: &str) {
        self.events.push(HostEvent::Destroyed {
            id: target_id.to_string(),
        });
    }
}

/// Deterministic math renderer for tests; fails on `\broken`.
pub struct TestRenderer;

impl MathRenderer for TestRenderer {
    fn render(&self, latex: &str, display_mode: bool) -> Result<String, MathRenderError> {
        if latex.contains("\\broken") {
            return Err(MathRenderError::new("unknown command"));
        }
        let mode = if display_mode { "display" } else { "inline" };
        Ok(format!("<mrow data-math=\"{mode}\">{latex}</mrow>"))
    }
}
