//! Pipe-delimited table parsing and rendering.
//!
//! Parsing is strict about shape: the first line is the header row, the
//! second must be a separator row or the content is not a table, and body
//! rows are kept only when their arity matches the header (streaming
//! regularly produces transiently short rows — they are dropped, not
//! errors). Rendering estimates minimum column widths for wide tables while
//! streaming to keep the layout from re-wrapping under the user's eyes.

use std::collections::HashMap;

use unicode_width::UnicodeWidthStr;

use crate::blocks::Alignment;
use crate::blocks::TableData;
use crate::patterns;

/// Number of body rows sampled for column width estimation. Tunable.
pub const WIDTH_SAMPLE_ROWS: usize = 5;
/// Column count above which a streaming table gets fixed layout. Tunable.
pub const WIDE_TABLE_COLUMNS: usize = 4;

const MIN_COLUMN_PX: usize = 100;
const PX_PER_COLUMN_UNIT: usize = 8;

const COPY_ICON_SVG: &str = concat!(
    "<svg width=\"14\" height=\"14\" viewBox=\"0 0 24 24\" fill=\"none\" ",
    "stroke=\"currentColor\" stroke-width=\"2\">",
    "<rect x=\"9\" y=\"9\" width=\"13\" height=\"13\" rx=\"2\" ry=\"2\"/>",
    "<path d=\"M5 15H4a2 2 0 0 1-2-2V4a2 2 0 0 1 2-2h9a2 2 0 0 1 2 2v1\"/>",
    "</svg>"
);

/// Parses table blocks and renders them to HTML.
#[derive(Default)]
pub struct TableProcessor {
    width_cache: HashMap<String, Vec<usize>>,
}

impl TableProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a contiguous run of pipe rows. Returns `None` when the content
    /// is not (yet) a structurally valid table.
    pub fn parse_table_data(&self, content: &str) -> Option<TableData> {
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() < 2 {
            return None;
        }

        let header_caps = patterns::TABLE_ROW.captures(lines[0])?;
        let headers: Vec<String> = header_caps[1]
            .split('|')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .map(str::to_string)
            .collect();

        if !patterns::TABLE_SEPARATOR.is_match(lines[1]) {
            return None;
        }
        let separator_parts: Vec<&str> = lines[1].split('|').collect();
        let alignments: Vec<Option<Alignment>> = separator_parts
            [1..separator_parts.len().saturating_sub(1)]
            .iter()
            .map(|cell| {
                let cell = cell.trim();
                if cell.starts_with(':') && cell.ends_with(':') {
                    Some(Alignment::Center)
                } else if cell.ends_with(':') {
                    Some(Alignment::Right)
                } else if cell.starts_with(':') {
                    Some(Alignment::Left)
                } else {
                    None
                }
            })
            .collect();

        let mut rows: Vec<Vec<String>> = Vec::new();
        for line in &lines[2..] {
            let Some(caps) = patterns::TABLE_ROW.captures(line) else {
                continue;
            };
            let cells: Vec<String> = caps[1].split('|').map(|c| c.trim().to_string()).collect();
            if cells.len() == headers.len() {
                rows.push(cells);
            } else {
                tracing::warn!(
                    expected = headers.len(),
                    got = cells.len(),
                    "dropping table row with mismatched arity"
                );
            }
        }

        Some(TableData {
            id: String::new(),
            headers,
            alignments,
            rows,
            raw_content: content.to_string(),
            is_complete: true,
        })
    }

    /// Minimum pixel width per column: the widest of the header and the
    /// first few sampled rows, floored, cached per header signature.
    fn column_widths(&mut self, table: &TableData) -> Vec<usize> {
        let key = table.headers.join("|");
        if let Some(widths) = self.width_cache.get(&key) {
            return widths.clone();
        }
        let mut widths: Vec<usize> = table
            .headers
            .iter()
            .map(|header| UnicodeWidthStr::width(header.as_str()))
            .collect();
        for row in table.rows.iter().take(WIDTH_SAMPLE_ROWS) {
            for (column, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(column) {
                    *width = (*width).max(UnicodeWidthStr::width(cell.as_str()));
                }
            }
        }
        let widths: Vec<usize> = widths
            .into_iter()
            .map(|width| MIN_COLUMN_PX.max(width * PX_PER_COLUMN_UNIT))
            .collect();
        self.width_cache.insert(key, widths.clone());
        widths
    }

    /// Render a parsed table, running `inline` over every cell. Width pinning
    /// applies only to wide tables that are still streaming.
    pub fn render_table(
        &mut self,
        table: &TableData,
        inline: &mut dyn FnMut(&str) -> String,
        is_streaming: bool,
    ) -> String {
        if table.headers.is_empty() {
            return String::new();
        }

        let will_overflow = is_streaming && table.headers.len() > WIDE_TABLE_COLUMNS;
        let dom_id = format!("{}-inner", table.id);
        let streaming_attr = if is_streaming {
            " data-streaming=\"true\""
        } else {
            ""
        };

        let mut out = String::new();
        out.push_str(&format!(
            "<div class=\"markdown-table-wrapper\"{streaming_attr}>"
        ));
        out.push_str(&format!(
            "<div class=\"markdown-table-container\"{}>",
            if will_overflow {
                " style=\"overflow-x:auto;\""
            } else {
                ""
            }
        ));
        out.push_str(&format!(
            "<table id=\"{dom_id}\" class=\"markdown-table\"{streaming_attr}{}>",
            if will_overflow {
                " style=\"table-layout:fixed;\""
            } else {
                ""
            }
        ));

        let widths = will_overflow.then(|| self.column_widths(table));

        out.push_str("<thead><tr>");
        for (column, header) in table.headers.iter().enumerate() {
            let width_style = widths
                .as_ref()
                .and_then(|w| w.get(column))
                .map(|w| format!(" style=\"min-width:{w}px\""))
                .unwrap_or_default();
            out.push_str(&format!(
                "<th class=\"{}\"{width_style}>{}</th>",
                align_class(table.alignments.get(column).copied().flatten()),
                inline(header)
            ));
        }
        out.push_str("</tr></thead><tbody>");

        for row in &table.rows {
            out.push_str("<tr>");
            for (column, cell) in row.iter().enumerate() {
                out.push_str(&format!(
                    "<td class=\"{}\">{}</td>",
                    align_class(table.alignments.get(column).copied().flatten()),
                    inline(cell)
                ));
            }
            out.push_str("</tr>");
        }

        out.push_str("</tbody></table></div>");
        out.push_str(&format!(
            "<button class=\"markdown-table-copy\" onclick=\"copyTable('{dom_id}')\" \
             title=\"Copy table\">{COPY_ICON_SVG}<span>Copy</span></button>"
        ));
        out.push_str("</div>");
        out
    }

    /// Streaming readiness: a buffered table region is renderable once a
    /// separator row is present and the last non-blank line is itself a
    /// syntactically complete row.
    pub fn has_complete_table_row<S: AsRef<str>>(&self, lines: &[S]) -> bool {
        if lines.len() < 2 {
            return false;
        }
        if !lines
            .iter()
            .any(|line| patterns::TABLE_SEPARATOR.is_match(line.as_ref()))
        {
            return false;
        }
        let Some(last) = lines
            .iter()
            .map(AsRef::as_ref)
            .rev()
            .find(|line| !line.trim().is_empty())
        else {
            return false;
        };
        let last = last.trim();
        if !patterns::TABLE_ROW.is_match(last) {
            return false;
        }
        last.split('|').filter(|cell| !cell.is_empty()).count() > 1
    }

    /// Copy-affordance payload: tab-separated cells, newline-separated rows.
    pub fn to_tab_separated(&self, table: &TableData) -> String {
        let mut lines = vec![table.headers.join("\t")];
        lines.extend(table.rows.iter().map(|row| row.join("\t")));
        lines.join("\n")
    }

    pub fn clear_cache(&mut self) {
        self.width_cache.clear();
    }
}

fn align_class(alignment: Option<Alignment>) -> &'static str {
    match alignment {
        Some(Alignment::Center) => "text-center",
        Some(Alignment::Right) => "text-right",
        _ => "text-left",
    }
}
