//! Span-level markdown: emphasis, inline code, links, images.
//!
//! The step order is fixed because later steps must not re-interpret earlier
//! substitutions: math, then inline-code extraction into opaque placeholders,
//! then emphasis (longest marker first), then images, then links, then code
//! restoration with entity escaping, then orphan-backtick cleanup.

use regex_lite::Captures;
use regex_lite::Regex;
use tidemark_sanitize::escape_text;

use crate::math::MathProcessor;
use crate::patterns;

/// Convert inline markdown in `text` to HTML.
pub fn process_inline_markdown(
    text: &str,
    math: &MathProcessor,
    sanitize_url: &dyn Fn(&str) -> String,
) -> String {
    let text = math.process_math(text);

    let mut code_spans: Vec<String> = Vec::new();
    let text = extract_inline_code(&text, &mut code_spans);

    let text = process_emphasis(&text);

    let text = patterns::IMAGE.replace_all(&text, |caps: &Captures| {
        let alt = &caps[1];
        let src = &caps[2];
        let safe_src = sanitize_url(src);
        let lower = safe_src.to_ascii_lowercase();
        if safe_src != "#" && (lower.starts_with("http://") || lower.starts_with("https://")) {
            let clean_alt = patterns::HTML_TAG.replace_all(alt, "");
            format!(
                "<img src=\"{safe_src}\" alt=\"{}\" class=\"markdown-image\" loading=\"lazy\">",
                clean_alt.trim()
            )
        } else {
            // Unsafe or relative image sources drop the element entirely.
            String::new()
        }
    });

    let text = patterns::LINK.replace_all(&text, |caps: &Captures| {
        let link_text = &caps[1];
        let url = &caps[2];
        if link_text.trim().is_empty() {
            return String::new();
        }
        let safe_url = sanitize_url(url);
        let lower = safe_url.to_ascii_lowercase();
        let external = lower.starts_with("http://") || lower.starts_with("https://");
        let extra = if external {
            " target=\"_blank\" rel=\"noopener noreferrer\""
        } else {
            ""
        };
        format!("<a href=\"{safe_url}\" class=\"markdown-link\"{extra}>{link_text}</a>")
    });

    let text = patterns::CODE_PLACEHOLDER.replace_all(&text, |caps: &Captures| {
        let span = caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|idx| code_spans.get(idx));
        match span {
            Some(code) => format!("<code class=\"inline-code\">{}</code>", escape_text(code)),
            None => String::new(),
        }
    });

    escape_orphan_backticks(&text)
}

/// Headers and blockquotes, with the inline pipeline run over their content.
pub fn process_block_level(text: &str, inline: &mut dyn FnMut(&str) -> String) -> String {
    let text = patterns::HEADER.replace_all(text, |caps: &Captures| {
        let level = caps[1].len();
        format!(
            "<h{level} class=\"markdown-h{level}\">{}</h{level}>",
            inline(caps[2].trim())
        )
    });
    let text = patterns::BLOCKQUOTE.replace_all(&text, |caps: &Captures| {
        format!(
            "<blockquote class=\"markdown-blockquote\">{}</blockquote>",
            inline(&caps[1])
        )
    });
    text.into_owned()
}

/// Extract backtick code spans into `\x00CODE{n}\x00` placeholders.
///
/// Scans for the next unescaped backtick rather than using a greedy pattern:
/// a span only counts when a matching unescaped closer exists on the same
/// line; empty spans and spans containing a newline are not inline code.
fn extract_inline_code(text: &str, spans: &mut Vec<String>) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'`' && (i == 0 || bytes[i - 1] != b'\\') {
            let mut close = None;
            let mut j = i + 1;
            while j < bytes.len() {
                if bytes[j] == b'`' && bytes[j - 1] != b'\\' {
                    let code = &text[i + 1..j];
                    if !code.is_empty() && !code.contains('\n') {
                        close = Some(j);
                        break;
                    }
                }
                j += 1;
            }
            match close {
                Some(j) => {
                    out.push_str(&format!("\u{0}CODE{}\u{0}", spans.len()));
                    spans.push(text[i + 1..j].to_string());
                    i = j + 1;
                }
                None => {
                    out.push('`');
                    i += 1;
                }
            }
        } else if bytes[i] == b'`' {
            // Escaped backtick, keep literal.
            out.push('`');
            i += 1;
        } else {
            match text[i..].find('`') {
                Some(rel) => {
                    out.push_str(&text[i..i + rel]);
                    i += rel;
                }
                None => {
                    out.push_str(&text[i..]);
                    break;
                }
            }
        }
    }

    out
}

/// Emphasis ladder, longest marker first, every replacement protected by a
/// `\x00PROT{n}\x00` placeholder so later steps cannot re-match inside it.
fn process_emphasis(text: &str) -> String {
    let mut protected: Vec<String> = Vec::new();

    let text = protect(text, &patterns::STRIKETHROUGH, "<del>", "</del>", &mut protected);
    let text = protect(
        &text,
        &patterns::TRIPLE_ASTERISK,
        "<strong><em>",
        "</em></strong>",
        &mut protected,
    );
    let text = protect(
        &text,
        &patterns::TRIPLE_UNDERSCORE,
        "<strong><em>",
        "</em></strong>",
        &mut protected,
    );
    let text = protect(
        &text,
        &patterns::BOLD_WRAPPING_ITALIC_A,
        "<strong><em>",
        "</em></strong>",
        &mut protected,
    );
    let text = protect(
        &text,
        &patterns::BOLD_WRAPPING_ITALIC_B,
        "<strong><em>",
        "</em></strong>",
        &mut protected,
    );
    let text = protect(
        &text,
        &patterns::ITALIC_WRAPPING_BOLD_A,
        "<em><strong>",
        "</strong></em>",
        &mut protected,
    );
    let text = protect(
        &text,
        &patterns::ITALIC_WRAPPING_BOLD_B,
        "<em><strong>",
        "</strong></em>",
        &mut protected,
    );
    let text = protect(
        &text,
        &patterns::DOUBLE_ASTERISK,
        "<strong>",
        "</strong>",
        &mut protected,
    );
    let text = protect(
        &text,
        &patterns::DOUBLE_UNDERSCORE,
        "<strong>",
        "</strong>",
        &mut protected,
    );
    let text = protect_single(&text, &patterns::SINGLE_ASTERISK, '*', &mut protected);
    let text = protect_single(&text, &patterns::SINGLE_UNDERSCORE, '_', &mut protected);

    patterns::PROT_PLACEHOLDER
        .replace_all(&text, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|idx| protected.get(idx).cloned())
                .unwrap_or_default()
        })
        .into_owned()
}

fn protect(
    text: &str,
    re: &Regex,
    open: &str,
    close: &str,
    protected: &mut Vec<String>,
) -> String {
    re.replace_all(text, |caps: &Captures| {
        let idx = protected.len();
        protected.push(format!("{open}{}{close}", &caps[1]));
        format!("\u{0}PROT{idx}\u{0}")
    })
    .into_owned()
}

/// Single-marker emphasis with the word-boundary rule: the characters just
/// outside the span must not be word characters or the marker itself, and the
/// content must not begin or end with whitespace. `a*b*c` stays literal.
fn protect_single(
    text: &str,
    re: &Regex,
    marker: char,
    protected: &mut Vec<String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut consumed = 0;

    for caps in re.captures_iter(text) {
        let Some(span) = caps.get(0) else { continue };
        if span.start() < consumed {
            continue;
        }
        let content = &caps[1];
        let prev_ok = text[..span.start()]
            .chars()
            .next_back()
            .is_none_or(|ch| ch != marker && !is_word_char(ch));
        let next_ok = text[span.end()..]
            .chars()
            .next()
            .is_none_or(|ch| ch != marker && !is_word_char(ch));
        let edges_ok = !content.starts_with(char::is_whitespace)
            && !content.ends_with(char::is_whitespace);
        if prev_ok && next_ok && edges_ok {
            out.push_str(&text[consumed..span.start()]);
            out.push_str(&format!("\u{0}PROT{}\u{0}", protected.len()));
            protected.push(format!("<em>{content}</em>"));
            consumed = span.end();
        }
    }

    out.push_str(&text[consumed..]);
    out
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Escape any leftover unmatched backtick so it renders literally.
fn escape_orphan_backticks(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    for (i, ch) in text.char_indices() {
        if ch == '`' {
            let escaped = i > 0 && bytes[i - 1] == b'\\';
            let doubled = bytes.get(i + 1) == Some(&b'`');
            if !escaped && !doubled {
                out.push('\\');
            }
        }
        out.push(ch);
    }
    out
}
