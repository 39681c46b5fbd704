//! End-to-end pipeline properties: idempotence, prefix stability, streaming
//! suppression, sanitization, and widget lifecycle.

mod common;

use common::HostEvent;
use common::TestHost;
use common::TestRenderer;
use pretty_assertions::assert_eq;
use tidemark_markdown::MarkdownService;
use tidemark_markdown::WidgetKind;

fn service_with(host: TestHost) -> MarkdownService<TestHost> {
    MarkdownService::new("m1", host, Box::new(TestRenderer))
}

fn service() -> MarkdownService<TestHost> {
    service_with(TestHost::new())
}

const MIXED_DOC: &str = "# Report\n\n\
Some **bold** text with `code` and $x^2$.\n\n\
```js\nconst a = 1;\nconst b = 2;\n```\n\n\
| a | b |\n|---|---|\n| 1 | 2 |\n\n\
- first\n  - nested\n- second\n\n\
<think>weighing options</think>\n\n\
tail paragraph\n";

#[tokio::test]
async fn complete_render_is_idempotent() {
    let mut service = service();
    let first = service.process_markdown(MIXED_DOC, false).await;
    let second = service.process_markdown(MIXED_DOC, false).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn streamed_prefixes_keep_block_ids_stable() {
    let mut service = service();
    let boundaries: Vec<usize> = MIXED_DOC
        .char_indices()
        .map(|(i, _)| i)
        .skip(1)
        .collect();
    for boundary in boundaries {
        let html = service.process_markdown(&MIXED_DOC[..boundary], true).await;
        if html.contains("code-block-wrapper") {
            assert!(
                html.contains("id=\"code-m1-0\""),
                "code block id moved at boundary {boundary}: {html}"
            );
        }
        if html.contains("markdown-table-wrapper\" id=") {
            assert!(
                html.contains("id=\"table-m1-1\""),
                "table id moved at boundary {boundary}: {html}"
            );
        }
    }
}

#[tokio::test]
async fn streamed_then_finalized_matches_fresh_full_render() {
    let mut streamed = service();
    let boundaries: Vec<usize> = MIXED_DOC
        .char_indices()
        .map(|(i, _)| i)
        .skip(1)
        .collect();
    for boundary in boundaries {
        let _ = streamed.process_markdown(&MIXED_DOC[..boundary], true).await;
    }
    let final_html = streamed.process_markdown(MIXED_DOC, false).await;

    let mut fresh = service();
    let fresh_html = fresh.process_markdown(MIXED_DOC, false).await;
    assert_eq!(final_html, fresh_html);
}

#[tokio::test]
async fn table_with_no_data_rows_is_suppressed_while_streaming() {
    let mut service = service();
    let html = service
        .process_markdown("| a | b |\n|---|---|", true)
        .await;
    assert!(
        service.host().table_sets().is_empty(),
        "header-only table must not render while streaming: {:?}",
        service.host().events
    );
    // The placeholder is still emitted so the position is fixed.
    assert!(html.contains("markdown-table-wrapper"), "{html}");
}

#[tokio::test]
async fn table_renders_once_first_data_row_arrives() {
    let mut service = service();
    let _ = service
        .process_markdown("| a | b |\n|---|---|", true)
        .await;
    let _ = service
        .process_markdown("| a | b |\n|---|---|\n| 1 | 2 |", true)
        .await;
    let sets = service.host().table_sets();
    assert!(!sets.is_empty(), "expected a table render after the first data row");
    let Some(HostEvent::TableSet { html, streaming, .. }) = sets.first() else {
        panic!("expected a TableSet event");
    };
    assert!(*streaming);
    assert!(html.contains("<td class=\"text-left\">1</td>"), "{html}");
    assert!(html.contains("<td class=\"text-left\">2</td>"), "{html}");
}

#[tokio::test]
async fn script_and_event_handlers_never_reach_output() {
    let mut service = service();
    let html = service
        .process_markdown(
            "Hello <script>alert('x')</script>\n\n<img src=x onerror=alert(1)>\n",
            false,
        )
        .await;
    assert!(!html.contains("<script"), "{html}");
    assert!(!html.contains("alert('x')"), "{html}");
    assert!(!html.contains("onerror"), "{html}");
}

#[tokio::test]
async fn code_widget_created_once_then_patched_in_place() {
    let mut service = service();
    let _ = service.process_markdown("```rust\nlet x = 1;", true).await;
    let _ = service
        .process_markdown("```rust\nlet x = 1;\nlet y = 2;", true)
        .await;

    assert_eq!(service.host().created().len(), 1);
    let Some(HostEvent::Created { kind, id, props }) = service.host().created().first().copied()
    else {
        panic!("expected a created widget");
    };
    assert_eq!(*kind, WidgetKind::CodeHighlight);
    assert_eq!(id, "code-m1-0");
    assert_eq!(props.language.as_deref(), Some("rust"));
    assert_eq!(props.content, "let x = 1;");

    assert_eq!(service.host().updated().len(), 1);
    let Some(HostEvent::Updated { props, .. }) = service.host().updated().first().copied() else {
        panic!("expected an update");
    };
    assert_eq!(props.content, "let x = 1;\nlet y = 2;");
}

#[tokio::test]
async fn unchanged_rescan_sends_no_widget_updates() {
    let mut service = service();
    let text = "```rust\nlet x = 1;\n```\n";
    let _ = service.process_markdown(text, true).await;
    let events_after_first = service.host().events.len();
    let _ = service.process_markdown(text, true).await;
    assert_eq!(service.host().events.len(), events_after_first);
}

#[tokio::test]
async fn inline_think_block_mounts_thinking_widget() {
    let mut service = service();
    let html = service
        .process_markdown("<think>weighing options</think>\n\nanswer\n", false)
        .await;
    assert!(html.contains("id=\"think-m1-0\""), "{html}");

    let created = service.host().created();
    assert_eq!(created.len(), 1);
    let Some(HostEvent::Created { kind, props, .. }) = created.first().copied() else {
        panic!("expected a created widget");
    };
    assert_eq!(*kind, WidgetKind::Thinking);
    assert!(props.content.contains("weighing options"), "{}", props.content);
    assert!(
        props.content.contains("markdown-paragraph"),
        "think content should be rendered markdown: {}",
        props.content
    );
}

#[tokio::test]
async fn multi_line_think_block_accumulates_until_closed() {
    let mut service = service();
    let _ = service
        .process_markdown("<think>\nstep one\nstep two\n", true)
        .await;
    let created = service.host().created();
    assert_eq!(created.len(), 1);
    let Some(HostEvent::Created { props, .. }) = created.first().copied() else {
        panic!("expected a created widget");
    };
    assert!(props.content.contains("step one step two"), "{}", props.content);

    let events_before_close = service.host().events.len();
    let _ = service
        .process_markdown("<think>\nstep one\nstep two\n</think>\ndone\n", true)
        .await;
    // Closing the block neither re-creates the widget nor re-sends unchanged
    // content — the update is change-detected away.
    assert_eq!(service.host().created().len(), 1);
    assert_eq!(service.host().events.len(), events_before_close);
}

#[tokio::test]
async fn sse_thinking_lifecycle_updates_one_widget() {
    let mut service = service();
    let placeholder = service.handle_sse_thinking_start().await;
    assert_eq!(
        placeholder,
        "<div class=\"thinking-block-wrapper\" id=\"think-m1-sse-0\"></div>"
    );
    // A second start while active is a no-op.
    assert_eq!(service.handle_sse_thinking_start().await, "");

    service.handle_sse_thinking_delta("Let me ").await;
    service.handle_sse_thinking_delta("think.").await;
    service.handle_sse_thinking_end().await;

    assert_eq!(service.host().created().len(), 1);
    let updates = service.host().updated();
    assert_eq!(updates.len(), 3);
    let Some(HostEvent::Updated { props, .. }) = updates.get(1).copied() else {
        panic!("expected an update");
    };
    assert!(props.streaming);
    assert!(props.content.contains("Let me think."), "{}", props.content);
    let Some(HostEvent::Updated { props, .. }) = updates.last().copied() else {
        panic!("expected a final update");
    };
    assert!(!props.streaming, "end must clear the streaming flag");
    assert!(
        props.content.contains("Let me think."),
        "end must not clear content: {}",
        props.content
    );

    // The machine is reusable with a fresh id afterwards.
    let placeholder = service.handle_sse_thinking_start().await;
    assert_eq!(
        placeholder,
        "<div class=\"thinking-block-wrapper\" id=\"think-m1-sse-1\"></div>"
    );
}

#[tokio::test]
async fn missing_placeholder_skips_mount_silently() {
    let mut service = service_with(TestHost::with_missing(&["code-m1-0"]));
    let _ = service.process_markdown("```rust\nlet x = 1;\n```\n", true).await;
    let _ = service
        .process_markdown("```rust\nlet x = 1;\nlet y = 2;\n```\n", true)
        .await;
    assert!(
        service.host().events.is_empty(),
        "no widget traffic for a missing placeholder: {:?}",
        service.host().events
    );
    assert!(service.host().ticks > 0, "attach still waited for layout");
}

#[tokio::test]
async fn destroy_components_destroys_mounted_widgets() {
    let mut service = service();
    let _ = service.process_markdown("```rust\nlet x = 1;\n```\n", false).await;
    assert_eq!(service.host().created().len(), 1);

    service.destroy_components();
    assert!(
        service
            .host()
            .events
            .iter()
            .any(|event| matches!(event, HostEvent::Destroyed { id } if id == "code-m1-0")),
        "{:?}",
        service.host().events
    );
    assert!(service.code_blocks().is_empty());
    assert!(service.think_blocks().is_empty());
    assert!(service.tables().is_empty());
}

#[tokio::test]
async fn horizontal_rule_and_heading_render() {
    let mut service = service();
    let html = service
        .process_markdown("# Title\n\n---\n\nbody\n", false)
        .await;
    assert!(html.contains("<h1 class=\"markdown-h1\">Title</h1>"), "{html}");
    assert!(html.contains("<hr class=\"markdown-hr\" />"), "{html}");
    assert!(
        html.contains("<p class=\"markdown-paragraph\">body</p>"),
        "{html}"
    );
}

#[tokio::test]
async fn math_survives_sanitization_and_currency_does_not_trigger_it() {
    let mut service = service();
    let html = service
        .process_markdown("Euler: $e^{i\\pi}$ costs $5,000 today\n", false)
        .await;
    assert!(html.contains("math-inline"), "{html}");
    assert!(html.contains("<mrow data-math=\"inline\">"), "{html}");
    assert!(html.contains("$5,000"), "currency must stay literal: {html}");
}

#[tokio::test]
async fn list_nesting_streams_into_one_outer_list() {
    let mut service = service();
    let html = service.process_markdown("- a\n  - b\n- c\n", false).await;
    let outer = html.matches("<ul class=\"markdown-list\">").count();
    assert_eq!(outer, 2, "one outer and one nested list: {html}");
    assert!(
        html.contains(
            "<li class=\"markdown-list-item\">a\
             <ul class=\"markdown-list\"><li class=\"markdown-list-item\">b</li></ul>\
             </li>"
        ),
        "{html}"
    );
}
