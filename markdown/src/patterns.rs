//! Compiled line-classification and inline patterns, built once.
//!
//! The original emphasis rules relied on regex lookaround for word
//! boundaries; the `regex` family does not support lookaround, so those
//! checks live as explicit code around the match spans (see `inline.rs`) and
//! the patterns here only locate candidates.

use std::sync::LazyLock;

use regex_lite::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|_| std::process::abort())
}

pub(crate) static HEADER: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^(#{1,6})\s+(.+)$"));
pub(crate) static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(\s*)(\d+)\.\s+(.+)$"));
pub(crate) static UNORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(\s*)[*+-]\s+(.+)$"));
pub(crate) static BLOCKQUOTE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^>\s+(.+)$"));
pub(crate) static HORIZONTAL_RULE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^(={3,}|-{3,})\s*$"));

pub(crate) static TABLE_ROW: LazyLock<Regex> = LazyLock::new(|| compile(r"^\|(.+)\|$"));
pub(crate) static TABLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| compile(r"^\|[\s:]*-+[\s:]*(\|[\s:]*-+[\s:]*)*\|$"));

pub(crate) static MATH_BLOCK: LazyLock<Regex> = LazyLock::new(|| compile(r"\$\$([\s\S]+?)\$\$"));
pub(crate) static MATH_BLOCK_ALT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?m)^\\\[([\s\S]+?)\\\]$"));
pub(crate) static MATH_INLINE: LazyLock<Regex> = LazyLock::new(|| compile(r"\$([^\$\n]+?)\$"));
pub(crate) static MATH_INLINE_ALT: LazyLock<Regex> = LazyLock::new(|| compile(r"\\\((.+?)\\\)"));

pub(crate) static IMAGE: LazyLock<Regex> = LazyLock::new(|| compile(r"!\[([^\]]*)\]\(([^)]+)\)"));
pub(crate) static LINK: LazyLock<Regex> = LazyLock::new(|| compile(r"\[([^\]]+)\]\(([^)]+)\)"));
pub(crate) static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| compile(r"<[^>]*>"));

// Emphasis candidates, longest marker first. Word-boundary checks for the
// single-marker forms are applied in code.
pub(crate) static STRIKETHROUGH: LazyLock<Regex> = LazyLock::new(|| compile(r"~~([^~]+?)~~"));
pub(crate) static TRIPLE_ASTERISK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\*\*\*([^*]+?)\*\*\*"));
pub(crate) static TRIPLE_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| compile(r"___([^_]+?)___"));
pub(crate) static BOLD_WRAPPING_ITALIC_A: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\*\*_(.+?)_\*\*"));
pub(crate) static BOLD_WRAPPING_ITALIC_B: LazyLock<Regex> =
    LazyLock::new(|| compile(r"__\*(.+?)\*__"));
pub(crate) static ITALIC_WRAPPING_BOLD_A: LazyLock<Regex> =
    LazyLock::new(|| compile(r"_\*\*(.+?)\*\*_"));
pub(crate) static ITALIC_WRAPPING_BOLD_B: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\*__(.+?)__\*"));
pub(crate) static DOUBLE_ASTERISK: LazyLock<Regex> = LazyLock::new(|| compile(r"\*\*([^*]+?)\*\*"));
pub(crate) static DOUBLE_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| compile(r"__([^_]+?)__"));
pub(crate) static SINGLE_ASTERISK: LazyLock<Regex> = LazyLock::new(|| compile(r"\*([^*]+?)\*"));
pub(crate) static SINGLE_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| compile(r"_([^_]+?)_"));

pub(crate) static PROT_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| compile("\u{0}PROT([0-9]+)\u{0}"));
pub(crate) static CODE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| compile("\u{0}CODE([0-9]+)\u{0}"));

// Normalization rewrites applied before block scanning.
pub(crate) static NORM_MULTI_NEWLINE: LazyLock<Regex> = LazyLock::new(|| compile(r"\n{3,}"));
pub(crate) static NORM_HEADER_GAP: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(\n#{1,6}\s.*)\n+"));
pub(crate) static NORM_TIGHTEN_UNORDERED: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(\n[*+-]\s+.*)\n{2,}([*+-]\s+)"));
pub(crate) static NORM_TIGHTEN_ORDERED: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(\n[0-9]+\.\s+.*)\n{2,}([0-9]+\.\s+)"));
pub(crate) static NORM_PRE_LIST: LazyLock<Regex> =
    LazyLock::new(|| compile(r"([^\n])\n([*+-]\s+|[0-9]+\.\s+)"));
pub(crate) static NORM_PRE_CODE: LazyLock<Regex> = LazyLock::new(|| compile(r"([^\n])\n```"));
pub(crate) static NORM_CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"```(.*?)\n([\s\S]*?)```"));
pub(crate) static NORM_EXTRA_CODE: LazyLock<Regex> = LazyLock::new(|| compile("```\n\n"));

pub(crate) static INTER_TAG_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| compile(r">\s+<"));
