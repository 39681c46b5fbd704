//! The per-message orchestrator.
//!
//! One [`MarkdownService`] instance owns all parsing state for one rendered
//! chat message: the block maps, the inline-HTML cache, and the SSE thinking
//! state machine. [`MarkdownService::process_markdown`] is called on every
//! streamed delta with the cumulative message text and once more on stream
//! completion; it re-scans the whole buffer each time, which keeps the
//! operation idempotent and stable under repeated calls with growing input.
//!
//! The line scan is an explicit finite-state machine over four region states
//! (`Plain`, `Code`, `Table`, `Think`), with one transition function per
//! state. Exactly one region is open at a time; only the owning region's
//! close pattern can exit it, so a `---` or a fence marker inside a think
//! block stays content. The scan itself is a pure pass that yields the HTML
//! skeleton plus an ordered list of block operations; the operations are then
//! applied through the host in arrival order, keeping the single suspension
//! point (the layout tick before widget attach) out of the parser.
//!
//! Block ids are assigned from a scan-local ordinal, so the id of a block
//! opened before any prefix split point never changes as the buffer grows.
//! Event-driven thinking blocks draw from a separate `sse` namespace and can
//! never collide with scan ordinals.

use std::collections::HashMap;

use tidemark_sanitize::Policy;
use tidemark_sanitize::sanitize;
use tidemark_sanitize::sanitize_url;

use crate::blocks::CodeBlock;
use crate::blocks::TableData;
use crate::blocks::ThinkBlockData;
use crate::host::HostSurface;
use crate::host::WidgetKind;
use crate::host::WidgetProps;
use crate::inline;
use crate::lists;
use crate::math::MathProcessor;
use crate::math::MathRenderer;
use crate::normalize::normalize_stream_content;
use crate::normalize::normalize_text_blocks;
use crate::patterns;
use crate::sse::SseThinking;
use crate::tables::TableProcessor;

const HR_HTML: &str = "<div class=\"markdown-hr-container\"><hr class=\"markdown-hr\" /></div>";

/// Region state for the line scan. Exactly one is open at a time; the block
/// kinds do not nest in this subset.
enum Region {
    Plain,
    Code {
        id: String,
        language: String,
        lines: Vec<String>,
    },
    Table {
        id: String,
        lines: Vec<String>,
    },
    Think {
        id: String,
        lines: Vec<String>,
    },
}

/// One deferred widget/table side effect produced by a scan, applied in
/// arrival order after the pass completes.
enum BlockOp {
    Code {
        id: String,
        content: String,
        language: String,
    },
    Think {
        id: String,
        content: String,
        streaming: bool,
    },
    Table {
        id: String,
        content: String,
        streaming: bool,
    },
}

struct ScanCtx {
    buffer: Vec<String>,
    result: Vec<String>,
    ops: Vec<BlockOp>,
    ordinal: usize,
    is_streaming: bool,
}

/// Streaming markdown renderer for one chat message.
pub struct MarkdownService<H: HostSurface> {
    message_id: String,
    host: H,
    math: MathProcessor,
    table_processor: TableProcessor,
    policy: Policy,
    code_blocks: HashMap<String, CodeBlock>,
    think_blocks: HashMap<String, ThinkBlockData>,
    table_data: HashMap<String, TableData>,
    inline_cache: HashMap<String, String>,
    sse: SseThinking,
    sse_ordinal: usize,
}

impl<H: HostSurface> MarkdownService<H> {
    pub fn new(message_id: impl Into<String>, host: H, renderer: Box<dyn MathRenderer>) -> Self {
        Self {
            message_id: message_id.into(),
            host,
            math: MathProcessor::new(renderer),
            table_processor: TableProcessor::new(),
            policy: Policy::default(),
            code_blocks: HashMap::new(),
            think_blocks: HashMap::new(),
            table_data: HashMap::new(),
            inline_cache: HashMap::new(),
            sse: SseThinking::new(),
            sse_ordinal: 0,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn code_blocks(&self) -> &HashMap<String, CodeBlock> {
        &self.code_blocks
    }

    pub fn think_blocks(&self) -> &HashMap<String, ThinkBlockData> {
        &self.think_blocks
    }

    pub fn tables(&self) -> &HashMap<String, TableData> {
        &self.table_data
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Sanitize arbitrary content against this message's policy.
    pub fn sanitize_content(&self, content: &str) -> String {
        sanitize(content, &self.policy)
    }

    /// Render the cumulative message text. Called once per received chunk
    /// (with `is_streaming = true`) and once at stream end; repeated calls
    /// with a growing prefix refine the output without moving the placeholder
    /// of any block opened earlier. Never fails: malformed structure degrades
    /// to plain text, an unterminated region is rendered best-effort.
    pub async fn process_markdown(&mut self, text: &str, is_streaming: bool) -> String {
        if text.is_empty() {
            return String::new();
        }
        let normalized = normalize_stream_content(text, is_streaming);
        if normalized.is_empty() {
            return String::new();
        }
        tracing::trace!(chars = normalized.len(), is_streaming, "scanning message buffer");

        let (html, ops) = self.scan(&normalized, is_streaming);
        if !is_streaming {
            tracing::debug!(ops = ops.len(), "finalizing message render");
        }
        for op in ops {
            self.apply_op(op).await;
        }
        sanitize(&html, &self.policy)
    }

    /// Line scan over the normalized buffer: classify lines, emit placeholder
    /// divs and processed text blocks, and collect block operations.
    fn scan(&mut self, text: &str, is_streaming: bool) -> (String, Vec<BlockOp>) {
        let text = normalize_text_blocks(text);
        let lines: Vec<&str> = text.split('\n').collect();
        let mut ctx = ScanCtx {
            buffer: Vec::new(),
            result: Vec::new(),
            ops: Vec::new(),
            ordinal: 0,
            is_streaming,
        };
        let mut region = Region::Plain;

        for (index, line) in lines.iter().enumerate() {
            let is_last = index + 1 == lines.len();
            region = match region {
                Region::Plain => self.step_plain(line, is_last, &mut ctx),
                Region::Code {
                    id,
                    language,
                    lines,
                } => Self::step_code(id, language, lines, line, &mut ctx),
                Region::Table { id, lines } => self.step_table(id, lines, line, &mut ctx),
                Region::Think { id, lines } => Self::step_think(id, lines, line, &mut ctx),
            };
        }

        // Flush whatever is still open so mid-stream content renders
        // best-effort; the final non-streaming call closes it for good.
        if !ctx.buffer.is_empty() {
            let joined = ctx.buffer.join("\n");
            let processed = self.process_markdown_text(joined.trim_end());
            ctx.result.push(processed);
            ctx.buffer.clear();
        }
        match region {
            Region::Plain => {}
            Region::Code {
                id,
                language,
                lines,
            } => ctx.ops.push(BlockOp::Code {
                id,
                content: lines.join("\n").trim_end().to_string(),
                language,
            }),
            Region::Think { id, lines } => ctx.ops.push(BlockOp::Think {
                id,
                content: lines.join("\n").trim_end().to_string(),
                streaming: is_streaming,
            }),
            Region::Table { id, lines } => ctx.ops.push(BlockOp::Table {
                id,
                content: lines.join("\n").trim_end().to_string(),
                streaming: is_streaming,
            }),
        }

        let html = ctx.result.concat();
        let html = patterns::INTER_TAG_WHITESPACE.replace_all(&html, "><");
        (html.trim().to_string(), ctx.ops)
    }

    fn step_plain(&mut self, line: &str, is_last: bool, ctx: &mut ScanCtx) -> Region {
        if patterns::HORIZONTAL_RULE.is_match(line) {
            self.flush_plain(ctx);
            ctx.result.push(HR_HTML.to_string());
            return Region::Plain;
        }

        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            self.flush_plain(ctx);
            let language = trimmed
                .strip_prefix("```")
                .unwrap_or("")
                .trim()
                .split_whitespace()
                .next()
                .unwrap_or("plaintext")
                .to_string();
            let id = self.scan_block_id("code", ctx);
            ctx.result
                .push(format!("<div class=\"code-block-wrapper\" id=\"{id}\"></div>"));
            return Region::Code {
                id,
                language,
                lines: Vec::new(),
            };
        }

        if patterns::TABLE_ROW.is_match(line) {
            self.flush_plain(ctx);
            let id = self.scan_block_id("table", ctx);
            ctx.result.push(format!(
                "<div class=\"markdown-table-wrapper\" id=\"{id}\"></div>"
            ));
            let lines = vec![line.to_string()];
            self.stream_table_update(&id, &lines, ctx);
            return Region::Table { id, lines };
        }

        if line.contains("<think") {
            self.flush_plain(ctx);
            let id = self.scan_block_id("think", ctx);
            ctx.result.push(format!(
                "<div class=\"thinking-block-wrapper\" id=\"{id}\"></div>"
            ));
            // Content starts after the opening tag's `>`; while the tag is
            // still arriving there is nothing to keep yet.
            let after_tag = line
                .find("<think")
                .and_then(|pos| line[pos..].find('>').map(|gt| &line[pos + gt + 1..]))
                .unwrap_or("");
            if let Some(end) = after_tag.find("</think") {
                if after_tag.contains("</think>") {
                    ctx.ops.push(BlockOp::Think {
                        id,
                        content: after_tag[..end].to_string(),
                        streaming: ctx.is_streaming,
                    });
                    return Region::Plain;
                }
            }
            return Region::Think {
                id,
                lines: vec![after_tag.to_string()],
            };
        }

        // A blank final line is withheld while streaming: it may be the
        // leading edge of a block that has not fully arrived.
        if !line.trim().is_empty() || !ctx.is_streaming || !is_last {
            ctx.buffer.push(line.to_string());
        }
        Region::Plain
    }

    fn step_code(
        id: String,
        language: String,
        mut lines: Vec<String>,
        line: &str,
        ctx: &mut ScanCtx,
    ) -> Region {
        if line.trim().starts_with("```") {
            let content = lines.join("\n").trim_end_matches('\n').to_string();
            ctx.ops.push(BlockOp::Code {
                id,
                content,
                language,
            });
            return Region::Plain;
        }
        lines.push(line.to_string());
        Region::Code {
            id,
            language,
            lines,
        }
    }

    fn step_table(
        &mut self,
        id: String,
        mut lines: Vec<String>,
        line: &str,
        ctx: &mut ScanCtx,
    ) -> Region {
        if patterns::TABLE_ROW.is_match(line) && !line.trim().is_empty() {
            lines.push(line.to_string());
            self.stream_table_update(&id, &lines, ctx);
            return Region::Table { id, lines };
        }
        // Region closes on the first non-row or blank line; a non-blank
        // terminator returns to the plain buffer.
        ctx.ops.push(BlockOp::Table {
            id,
            content: lines.join("\n"),
            streaming: false,
        });
        if !line.trim().is_empty() {
            ctx.buffer.push(line.to_string());
        }
        Region::Plain
    }

    fn step_think(id: String, mut lines: Vec<String>, line: &str, ctx: &mut ScanCtx) -> Region {
        if line.contains("</think>") {
            let end = line.find("</think").unwrap_or(line.len());
            lines.push(line[..end].to_string());
            ctx.ops.push(BlockOp::Think {
                id,
                content: lines.join("\n"),
                streaming: ctx.is_streaming,
            });
            return Region::Plain;
        }
        lines.push(line.to_string());
        Region::Think { id, lines }
    }

    fn flush_plain(&mut self, ctx: &mut ScanCtx) {
        if ctx.buffer.is_empty() {
            return;
        }
        let joined = ctx.buffer.join("\n");
        let processed = self.process_markdown_text(&joined);
        ctx.result.push(processed);
        ctx.buffer.clear();
    }

    /// While streaming, a table is pushed to the host only once it is
    /// renderable; the final call always pushes.
    fn stream_table_update(&mut self, id: &str, lines: &[String], ctx: &mut ScanCtx) {
        if ctx.is_streaming {
            if self.table_processor.has_complete_table_row(lines) {
                ctx.ops.push(BlockOp::Table {
                    id: id.to_string(),
                    content: lines.join("\n"),
                    streaming: true,
                });
            }
        } else {
            ctx.ops.push(BlockOp::Table {
                id: id.to_string(),
                content: lines.join("\n"),
                streaming: false,
            });
        }
    }

    fn scan_block_id(&self, kind: &str, ctx: &mut ScanCtx) -> String {
        let id = format!("{kind}-{}-{}", self.message_id, ctx.ordinal);
        ctx.ordinal += 1;
        id
    }

    /// Text-block pipeline for spans outside code/table/think regions (and
    /// for think content): math, then lists, then headers/blockquotes, then
    /// paragraph grouping.
    pub fn process_markdown_text(&mut self, text: &str) -> String {
        if text.trim().is_empty() {
            return String::new();
        }
        let text = normalize_text_blocks(text);
        let text = self.math.process_math(&text);
        let text = {
            let mut inline_fn = |t: &str| self.process_inline(t);
            let text = lists::process_lists(&text, &mut inline_fn);
            inline::process_block_level(&text, &mut inline_fn)
        };

        let mut out: Vec<String> = Vec::new();
        let mut paragraph: Vec<String> = Vec::new();
        for line in text.split('\n') {
            if line.trim().is_empty() {
                self.flush_paragraph(&mut paragraph, &mut out);
            } else if is_block_html(line) {
                self.flush_paragraph(&mut paragraph, &mut out);
                out.push(line.to_string());
            } else {
                paragraph.push(line.to_string());
            }
        }
        self.flush_paragraph(&mut paragraph, &mut out);

        format!("<div class=\"markdown-content\">{}</div>", out.concat())
    }

    fn flush_paragraph(&mut self, paragraph: &mut Vec<String>, out: &mut Vec<String>) {
        if paragraph.is_empty() {
            return;
        }
        let content = self.process_inline(&paragraph.join(" "));
        out.push(format!("<p class=\"markdown-paragraph\">{content}</p>"));
        paragraph.clear();
    }

    /// Inline conversion through the per-message memoization cache. Inputs
    /// are immutable once produced by a scan, so entries never invalidate;
    /// the cache lives exactly as long as the message renderer.
    fn process_inline(&mut self, text: &str) -> String {
        if let Some(cached) = self.inline_cache.get(text) {
            return cached.clone();
        }
        let processed = inline::process_inline_markdown(text, &self.math, &sanitize_url);
        self.inline_cache.insert(text.to_string(), processed.clone());
        processed
    }

    fn render_table_html(&mut self, table: &TableData, is_streaming: bool) -> String {
        let Self {
            table_processor,
            inline_cache,
            math,
            ..
        } = self;
        table_processor.render_table(
            table,
            &mut |t: &str| {
                if let Some(cached) = inline_cache.get(t) {
                    return cached.clone();
                }
                let processed = inline::process_inline_markdown(t, math, &sanitize_url);
                inline_cache.insert(t.to_string(), processed.clone());
                processed
            },
            is_streaming,
        )
    }

    async fn apply_op(&mut self, op: BlockOp) {
        match op {
            BlockOp::Code {
                id,
                content,
                language,
            } => self.update_code_block(&id, &content, &language).await,
            BlockOp::Think {
                id,
                content,
                streaming,
            } => self.update_think_block(&id, &content, streaming).await,
            BlockOp::Table {
                id,
                content,
                streaming,
            } => self.update_table(&id, &content, streaming).await,
        }
    }

    /// Create or patch the code-highlight widget for `block_id`. Updates are
    /// change-detected on trimmed content so no-op patches never reach the
    /// host.
    pub async fn update_code_block(&mut self, block_id: &str, raw_content: &str, language: &str) {
        if raw_content.is_empty() {
            return;
        }
        let normalized = normalize_stream_content(raw_content, false);

        if let Some(block) = self.code_blocks.get_mut(block_id) {
            if block.content.trim() != normalized.trim() {
                block.content = normalized.clone();
                if block.mounted {
                    self.host.update_widget(
                        block_id,
                        WidgetProps {
                            content: normalized,
                            language: Some(language.to_string()),
                            streaming: false,
                        },
                    );
                }
            }
            return;
        }

        self.code_blocks.insert(
            block_id.to_string(),
            CodeBlock::new(block_id, normalized.clone(), language),
        );
        self.host.layout_tick().await;
        if !self.host.element_exists(block_id) {
            tracing::debug!(block_id, "placeholder missing, skipping code widget mount");
            return;
        }
        self.host.create_widget(
            WidgetKind::CodeHighlight,
            block_id,
            WidgetProps {
                content: normalized,
                language: Some(language.to_string()),
                streaming: false,
            },
        );
        if let Some(block) = self.code_blocks.get_mut(block_id) {
            block.mounted = true;
        }
    }

    /// Create or patch the reasoning widget for `block_id`. Content is run
    /// through the shared text pipeline and sanitized before it reaches the
    /// host.
    pub async fn update_think_block(&mut self, block_id: &str, raw_content: &str, streaming: bool) {
        if raw_content.is_empty() {
            return;
        }
        let normalized = normalize_stream_content(raw_content, streaming);
        let processed = self.process_markdown_text(&normalized);
        let sanitized = sanitize(&processed, &self.policy);

        if let Some(block) = self.think_blocks.get_mut(block_id) {
            if block.content.trim() != sanitized.trim() {
                block.content = sanitized.clone();
                if block.mounted {
                    self.host.update_widget(
                        block_id,
                        WidgetProps {
                            content: sanitized,
                            language: None,
                            streaming,
                        },
                    );
                }
            }
            return;
        }

        self.think_blocks.insert(
            block_id.to_string(),
            ThinkBlockData::new(block_id, sanitized.clone()),
        );
        self.host.layout_tick().await;
        if !self.host.element_exists(block_id) {
            tracing::debug!(block_id, "placeholder missing, skipping think widget mount");
            return;
        }
        self.host.create_widget(
            WidgetKind::Thinking,
            block_id,
            WidgetProps {
                content: sanitized,
                language: None,
                streaming,
            },
        );
        if let Some(block) = self.think_blocks.get_mut(block_id) {
            block.mounted = true;
        }
    }

    /// Re-parse a table region and push its rendered HTML into the
    /// placeholder. While streaming, a table with no body rows yet stays
    /// invisible — a header with no rows looks broken.
    pub async fn update_table(&mut self, table_id: &str, content: &str, is_streaming: bool) {
        if content.is_empty() {
            return;
        }
        if let Some(mut parsed) = self.table_processor.parse_table_data(content) {
            parsed.id = table_id.to_string();
            self.table_data.insert(table_id.to_string(), parsed);
        }
        let Some(table) = self.table_data.get(table_id) else {
            return;
        };
        if table.rows.is_empty() && is_streaming {
            return;
        }
        let table = table.clone();
        let html = self.render_table_html(&table, is_streaming);
        let sanitized = sanitize(&html, &self.policy);
        self.host.layout_tick().await;
        if !self.host.element_exists(table_id) {
            return;
        }
        self.host.set_table_html(table_id, &sanitized, is_streaming);
    }

    /// Open an event-driven reasoning block. Returns the placeholder HTML the
    /// caller splices into the message flow, or an empty string when a block
    /// is already active.
    pub async fn handle_sse_thinking_start(&mut self) -> String {
        if self.sse.is_active() {
            return String::new();
        }
        let block_id = format!("think-{}-sse-{}", self.message_id, self.sse_ordinal);
        self.sse_ordinal += 1;
        self.sse.start(&block_id);
        self.think_blocks
            .insert(block_id.clone(), ThinkBlockData::new(&block_id, String::new()));
        let placeholder = format!("<div class=\"thinking-block-wrapper\" id=\"{block_id}\"></div>");

        self.host.layout_tick().await;
        if self.host.element_exists(&block_id) {
            self.host.create_widget(
                WidgetKind::Thinking,
                &block_id,
                WidgetProps {
                    content: String::new(),
                    language: None,
                    streaming: true,
                },
            );
            if let Some(block) = self.think_blocks.get_mut(&block_id) {
                block.mounted = true;
            }
        }
        placeholder
    }

    /// Append reasoning text, re-render and push to the active widget. A
    /// no-op while idle.
    pub async fn handle_sse_thinking_delta(&mut self, delta: &str) {
        let Some(raw) = self.sse.append(delta) else {
            return;
        };
        let Some(block_id) = self.sse.active_id().map(str::to_string) else {
            return;
        };
        let processed = self.process_markdown_text(&raw);
        let sanitized = sanitize(&processed, &self.policy);
        if let Some(block) = self.think_blocks.get_mut(&block_id) {
            if block.content.trim() != sanitized.trim() {
                block.content = sanitized.clone();
                if block.mounted {
                    self.host.update_widget(
                        &block_id,
                        WidgetProps {
                            content: sanitized,
                            language: None,
                            streaming: true,
                        },
                    );
                }
            }
        }
    }

    /// Mark the active reasoning widget as no longer streaming without
    /// clearing its content. A no-op while idle.
    pub async fn handle_sse_thinking_end(&mut self) {
        let Some(block_id) = self.sse.end() else {
            return;
        };
        if let Some(block) = self.think_blocks.get(&block_id) {
            if block.mounted {
                self.host.update_widget(
                    &block_id,
                    WidgetProps {
                        content: block.content.clone(),
                        language: None,
                        streaming: false,
                    },
                );
            }
        }
    }

    /// Tear down every mounted widget and release all per-message state.
    pub fn destroy_components(&mut self) {
        for (id, block) in self.code_blocks.drain() {
            if block.mounted {
                self.host.destroy_widget(&id);
            }
        }
        for (id, block) in self.think_blocks.drain() {
            if block.mounted {
                self.host.destroy_widget(&id);
            }
        }
        self.table_data.clear();
        self.inline_cache.clear();
        self.table_processor.clear_cache();
        tracing::debug!(message_id = %self.message_id, "destroyed message renderer state");
    }
}

fn is_block_html(line: &str) -> bool {
    line.trim_start().starts_with('<')
        && (line.contains("class=\"markdown-")
            || line.contains("code-block-wrapper")
            || line.contains("table-wrapper"))
}
