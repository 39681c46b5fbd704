/// Returns a safe form of `url`: the URL itself for `http(s)`, `mailto` and
/// fragment links, `#` for everything else.
pub fn sanitize_url(url: &str) -> String {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("mailto:")
    {
        return url.to_string();
    }
    if url.starts_with('#') {
        return url.to_string();
    }
    "#".to_string()
}

/// Allow-list check for `href`/`src` values.
///
/// Accepts `http(s)` and `mailto` URLs, fragment links, and non-URL-shaped
/// relative text (no scheme separator before the first path/query/fragment
/// character). Unknown schemes such as `javascript:` or `data:` are rejected,
/// including forms smuggled past naive prefix checks with embedded whitespace
/// or control characters.
pub fn is_allowed_uri(url: &str) -> bool {
    // Collapse whitespace/control characters before scheme detection so
    // "java\tscript:" style smuggling cannot hide the separator.
    let compact: String = url
        .chars()
        .filter(|ch| !ch.is_whitespace() && !ch.is_control())
        .collect();
    if compact.is_empty() {
        return false;
    }
    if compact.starts_with('#') {
        return true;
    }
    match compact.split_once(':') {
        None => true,
        Some((scheme, _)) => {
            if scheme.contains(['/', '?', '#']) {
                // The colon belongs to the path or query, not a scheme.
                return true;
            }
            let scheme = scheme.to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto")
        }
    }
}
