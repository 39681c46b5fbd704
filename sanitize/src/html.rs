use memchr::memchr;

use crate::policy::Policy;

/// Sanitize an HTML fragment against `policy`.
///
/// Single pass over the input: well-formed tags with an allow-listed name are
/// re-emitted with only their allow-listed attributes (values re-escaped);
/// disallowed tags are dropped (for `script`/`style` the whole subtree is
/// dropped); malformed markup and plain text are entity-escaped. The function
/// is idempotent — sanitizing its own output changes nothing — and the result
/// is trimmed.
pub fn sanitize(html: &str, policy: &Policy) -> String {
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut i = 0;

    while i < html.len() {
        let Some(off) = memchr(b'<', &bytes[i..]) else {
            push_escaped(&mut out, &html[i..]);
            break;
        };
        let lt = i + off;
        push_escaped(&mut out, &html[i..lt]);

        match parse_tag(html, lt) {
            Some(tag) => {
                if policy.allows_tag(&tag.name) {
                    emit_tag(&mut out, &tag, policy);
                    i = tag.end;
                } else if !tag.closing && matches!(tag.name.as_str(), "script" | "style") {
                    i = skip_raw_element(html, tag.end, &tag.name);
                } else {
                    // Drop the tag, keep whatever follows it.
                    i = tag.end;
                }
            }
            None => {
                out.push_str("&lt;");
                i = lt + 1;
            }
        }
    }

    out.trim().to_string()
}

struct ParsedTag {
    name: String,
    closing: bool,
    self_closing: bool,
    attrs: Vec<(String, Option<String>)>,
    /// Byte index just past the terminating `>`.
    end: usize,
}

/// Parse one tag starting at the `<` at byte `lt`. Returns `None` when the
/// input is not a syntactically plausible tag (the caller escapes the `<`).
fn parse_tag(html: &str, lt: usize) -> Option<ParsedTag> {
    let bytes = html.as_bytes();
    let mut j = lt + 1;
    let closing = if bytes.get(j) == Some(&b'/') {
        j += 1;
        true
    } else {
        false
    };

    let name_start = j;
    while j < bytes.len() && bytes[j].is_ascii_alphanumeric() {
        j += 1;
    }
    if j == name_start {
        return None;
    }
    if !bytes[name_start].is_ascii_alphabetic() {
        return None;
    }
    let name = html[name_start..j].to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut self_closing = false;
    loop {
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        match bytes.get(j) {
            None => return None,
            Some(b'>') => {
                return Some(ParsedTag {
                    name,
                    closing,
                    self_closing,
                    attrs,
                    end: j + 1,
                });
            }
            Some(b'/') => {
                self_closing = true;
                j += 1;
            }
            _ => {
                let (attr, next) = parse_attr(html, j)?;
                attrs.push(attr);
                j = next;
            }
        }
    }
}

fn parse_attr(html: &str, start: usize) -> Option<((String, Option<String>), usize)> {
    let bytes = html.as_bytes();
    let mut j = start;
    let name_start = j;
    while j < bytes.len()
        && (bytes[j].is_ascii_alphanumeric() || matches!(bytes[j], b'-' | b'_' | b':'))
    {
        j += 1;
    }
    if j == name_start {
        return None;
    }
    // Attribute names keep their source casing (`viewBox` is case-sensitive
    // in inline SVG); the policy lookup lowercases for comparison.
    let name = html[name_start..j].to_string();

    let mut k = j;
    while k < bytes.len() && bytes[k].is_ascii_whitespace() {
        k += 1;
    }
    if bytes.get(k) != Some(&b'=') {
        return Some(((name, None), j));
    }
    k += 1;
    while k < bytes.len() && bytes[k].is_ascii_whitespace() {
        k += 1;
    }
    match bytes.get(k) {
        Some(&quote) if quote == b'"' || quote == b'\'' => {
            let value_start = k + 1;
            let rel = memchr(quote, &bytes[value_start..])?;
            let value_end = value_start + rel;
            Some((
                (name, Some(html[value_start..value_end].to_string())),
                value_end + 1,
            ))
        }
        Some(_) => {
            let value_start = k;
            while k < bytes.len() && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                k += 1;
            }
            Some(((name, Some(html[value_start..k].to_string())), k))
        }
        None => None,
    }
}

fn emit_tag(out: &mut String, tag: &ParsedTag, policy: &Policy) {
    if tag.closing {
        out.push_str("</");
        out.push_str(&tag.name);
        out.push('>');
        return;
    }
    out.push('<');
    out.push_str(&tag.name);
    for (name, value) in &tag.attrs {
        if !policy.allows_attr(name) {
            continue;
        }
        match value {
            None => {
                out.push(' ');
                out.push_str(name);
            }
            Some(value) => {
                if !policy.allows_attr_value(name, value) {
                    continue;
                }
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                push_escaped_attr(out, value);
                out.push('"');
            }
        }
    }
    if tag.self_closing {
        out.push_str(" /");
    }
    out.push('>');
}

/// Skip everything up to and including the matching `</name ...>` close tag.
fn skip_raw_element(html: &str, from: usize, name: &str) -> usize {
    let bytes = html.as_bytes();
    let needle = format!("</{name}");
    let needle = needle.as_bytes();
    let mut i = from;
    while i + needle.len() <= bytes.len() {
        if bytes[i..i + needle.len()].eq_ignore_ascii_case(needle) {
            return match memchr(b'>', &bytes[i..]) {
                Some(rel) => i + rel + 1,
                None => html.len(),
            };
        }
        i += 1;
    }
    html.len()
}

/// Escape text, leaving already-encoded entities intact so repeated
/// sanitization is a no-op.
fn push_escaped(out: &mut String, text: &str) {
    for (i, ch) in text.char_indices() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            '&' => {
                if starts_entity(&text[i..]) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            _ => out.push(ch),
        }
    }
}

/// Escape a value for emission inside a double-quoted attribute. Single
/// quotes are legal there and must survive (the copy-button `onclick` value
/// carries them).
fn push_escaped_attr(out: &mut String, value: &str) {
    for (i, ch) in value.char_indices() {
        match ch {
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '&' => {
                if starts_entity(&value[i..]) {
                    out.push('&');
                } else {
                    out.push_str("&amp;");
                }
            }
            _ => out.push(ch),
        }
    }
}

/// Recognizes `&name;`, `&#123;` and `&#x1f;` forms at the start of `s`.
fn starts_entity(s: &str) -> bool {
    let Some(rest) = s.strip_prefix('&') else {
        return false;
    };
    let Some(semi) = rest.find(';') else {
        return false;
    };
    if semi == 0 || semi > 32 {
        return false;
    }
    let body = &rest[..semi];
    if let Some(num) = body.strip_prefix('#') {
        if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            return !hex.is_empty() && hex.chars().all(|ch| ch.is_ascii_hexdigit());
        }
        return !num.is_empty() && num.chars().all(|ch| ch.is_ascii_digit());
    }
    body.chars().all(|ch| ch.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::sanitize;
    use crate::policy::Policy;

    fn clean(html: &str) -> String {
        sanitize(html, &Policy::default())
    }

    #[test]
    fn script_subtree_is_dropped_entirely() {
        assert_eq!(
            clean("<p>before</p><script>alert('x')</script><p>after</p>"),
            "<p>before</p><p>after</p>"
        );
    }

    #[test]
    fn event_handler_attributes_are_stripped() {
        assert_eq!(
            clean(r#"<img src="https://e.com/a.png" onerror="alert(1)" alt="x">"#),
            r#"<img src="https://e.com/a.png" alt="x">"#
        );
    }

    #[test]
    fn javascript_urls_are_stripped() {
        assert_eq!(
            clean(r#"<a href="javascript:alert(1)">x</a>"#),
            "<a>x</a>"
        );
    }

    #[test]
    fn disallowed_tags_keep_their_content() {
        assert_eq!(clean("<iframe>inner</iframe> tail"), "inner tail");
    }

    #[test]
    fn text_is_entity_escaped() {
        assert_eq!(clean("a < b & c"), "a &lt; b &amp; c");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let inputs = [
            "<p class=\"markdown-paragraph\">a &amp; b</p>",
            "a < b & c",
            "<script>alert(1)</script>ok",
            r#"<a href="https://e.com" target="_blank" rel="noopener noreferrer">t</a>"#,
        ];
        for input in inputs {
            let once = clean(input);
            let twice = clean(&once);
            assert_eq!(once, twice, "sanitize not idempotent for {input:?}");
        }
    }

    #[test]
    fn copy_button_affordance_survives() {
        let html = r#"<button class="markdown-table-copy" onclick="copyTable('table-m-1-inner')"><span>Copy</span></button>"#;
        assert_eq!(clean(html), html);
    }

    #[test]
    fn allowed_structure_passes_through_unchanged() {
        let html = "<div class=\"markdown-content\"><p class=\"markdown-paragraph\">hi <strong>there</strong></p></div>";
        assert_eq!(clean(html), html);
    }

    #[test]
    fn malformed_tag_is_escaped_literally() {
        assert_eq!(clean("1 < 2 and 3 > 2"), "1 &lt; 2 and 3 &gt; 2");
    }

    #[test]
    fn table_chrome_survives() {
        let html = concat!(
            "<table id=\"t1\" class=\"markdown-table\" style=\"table-layout:fixed\">",
            "<thead><tr><th class=\"text-left\" style=\"min-width:100px\">h</th></tr></thead>",
            "<tbody><tr><td class=\"text-left\">1</td></tr></tbody></table>"
        );
        assert_eq!(clean(html), html);
    }
}
