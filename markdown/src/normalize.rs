//! Buffer normalization applied before block scanning.

use crate::patterns;

/// Normalize raw streamed content: strip carriage returns, trim, and while
/// streaming drop a trailing `[done]` transport sentinel.
pub(crate) fn normalize_stream_content(text: &str, is_streaming: bool) -> String {
    let normalized = text.replace('\r', "");
    let normalized = normalized.trim();
    if is_streaming {
        let lower = normalized.to_ascii_lowercase();
        if let Some(stripped_len) = lower.strip_suffix("[done]").map(str::len) {
            return normalized[..stripped_len].to_string();
        }
    }
    normalized.to_string()
}

/// Rewrite the buffer so block detection is regular: collapse runs of blank
/// lines, put blank lines around headers, keep list runs tight, and force
/// code fences onto their own lines.
pub(crate) fn normalize_text_blocks(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = patterns::NORM_MULTI_NEWLINE.replace_all(text, "\n\n");
    let text = patterns::NORM_HEADER_GAP.replace_all(&text, "$1\n\n");
    // The tighten rewrites consume the following marker, so a single pass
    // misses every other gap; run to a fixpoint instead of using lookahead.
    let text = replace_to_fixpoint(&patterns::NORM_TIGHTEN_UNORDERED, &text, "$1\n$2");
    let text = replace_to_fixpoint(&patterns::NORM_TIGHTEN_ORDERED, &text, "$1\n$2");
    let text = patterns::NORM_PRE_LIST.replace_all(&text, "$1\n\n$2");
    let text = patterns::NORM_PRE_CODE.replace_all(&text, "$1\n\n```");
    let text = patterns::NORM_CODE_BLOCK.replace_all(&text, "```$1\n$2\n```");
    let text = patterns::NORM_EXTRA_CODE.replace_all(&text, "```\n");
    text.into_owned()
}

fn replace_to_fixpoint(re: &regex_lite::Regex, text: &str, replacement: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = re.replace_all(&current, replacement).into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::normalize_stream_content;
    use super::normalize_text_blocks;

    #[test]
    fn strips_carriage_returns_and_trims() {
        assert_eq!(normalize_stream_content("  a\r\nb\r\n  ", false), "a\nb");
    }

    #[test]
    fn strips_done_sentinel_only_while_streaming() {
        assert_eq!(normalize_stream_content("hello[DONE]", true), "hello");
        assert_eq!(normalize_stream_content("hello[done]", true), "hello");
        assert_eq!(normalize_stream_content("hello[done]", false), "hello[done]");
    }

    #[test]
    fn collapses_blank_line_runs() {
        assert_eq!(normalize_text_blocks("a\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn list_gaps_regularize_to_single_blank_lines() {
        // Multi-blank gaps are tightened to a fixpoint, then the pre-list
        // rule re-inserts exactly one separating blank line per marker; the
        // list builder's lookahead keeps such runs as one list.
        let input = "\n- one\n\n\n- two\n\n- three\n";
        assert_eq!(
            normalize_text_blocks(input),
            "\n- one\n\n- two\n\n- three\n"
        );
    }

    #[test]
    fn forces_closing_fence_onto_its_own_line() {
        let normalized = normalize_text_blocks("```rust\nlet x = 1;```");
        assert_eq!(normalized, "```rust\nlet x = 1;\n```");
    }

    #[test]
    fn inserts_break_before_fence_following_text() {
        let normalized = normalize_text_blocks("see:\n```rust\ncode\n```");
        assert!(normalized.starts_with("see:\n\n```rust"), "{normalized:?}");
    }
}
