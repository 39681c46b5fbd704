use std::collections::HashSet;

use crate::url::is_allowed_uri;

/// Allow-list sanitization policy: which tags and attributes survive, plus
/// per-attribute value rules for the few attributes whose values are
/// themselves sensitive (`href`, `src`, `style`, `onclick`).
#[derive(Debug, Clone)]
pub struct Policy {
    allowed_tags: HashSet<String>,
    allowed_attrs: HashSet<String>,
}

const DEFAULT_TAGS: &[&str] = &[
    // Structural output of the markdown pipeline.
    "div", "p", "br", "strong", "em", "del", "code", "pre", "hr", "img", "span", "a", "blockquote",
    "details", "summary", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li",
    // Tables and their copy affordance.
    "table", "thead", "tbody", "tr", "th", "td", "button", "svg", "rect", "path",
    // MathML emitted by the math renderer.
    "math", "annotation", "semantics", "mrow", "mi", "mo", "mn", "msup", "msub", "mfrac", "mroot",
    "msqrt", "mtext", "mspace", "mover", "munder", "munderover", "mtable", "mtr", "mtd",
];

const DEFAULT_ATTRS: &[&str] = &[
    "class",
    "id",
    "open",
    "href",
    "src",
    "alt",
    "title",
    "value",
    "style",
    "loading",
    "start",
    "target",
    "rel",
    "onclick",
    "data-math",
    "data-display-mode",
    "data-streaming",
    // Copy-button SVG geometry.
    "width",
    "height",
    "viewBox",
    "fill",
    "stroke",
    "stroke-width",
    "x",
    "y",
    "rx",
    "ry",
    "d",
];

impl Default for Policy {
    fn default() -> Self {
        Self::new(DEFAULT_TAGS, DEFAULT_ATTRS)
    }
}

impl Policy {
    pub fn new(tags: &[&str], attrs: &[&str]) -> Self {
        Self {
            allowed_tags: tags.iter().map(|t| t.to_ascii_lowercase()).collect(),
            allowed_attrs: attrs.iter().map(|a| a.to_ascii_lowercase()).collect(),
        }
    }

    pub fn allows_tag(&self, name: &str) -> bool {
        self.allowed_tags.contains(&name.to_ascii_lowercase())
    }

    pub fn allows_attr(&self, name: &str) -> bool {
        self.allowed_attrs.contains(&name.to_ascii_lowercase())
    }

    /// Value-level check applied after the attribute name is allow-listed.
    pub fn allows_attr_value(&self, name: &str, value: &str) -> bool {
        match name.to_ascii_lowercase().as_str() {
            "href" | "src" => is_allowed_uri(value),
            "onclick" => is_copy_table_call(value),
            "style" => is_safe_style(value),
            _ => true,
        }
    }
}

/// The only scripted affordance the pipeline emits: `copyTable('<id>')`.
fn is_copy_table_call(value: &str) -> bool {
    let Some(rest) = value.strip_prefix("copyTable('") else {
        return false;
    };
    let Some(id) = rest.strip_suffix("')") else {
        return false;
    };
    !id.is_empty()
        && id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

/// Inline styles are limited to the layout-jitter properties the table
/// renderer emits.
fn is_safe_style(value: &str) -> bool {
    value.split(';').filter(|decl| !decl.trim().is_empty()).all(|decl| {
        let Some((prop, val)) = decl.split_once(':') else {
            return false;
        };
        let prop_ok = matches!(
            prop.trim(),
            "min-width" | "overflow-x" | "table-layout" | "text-align"
        );
        let val_ok = val
            .trim()
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, ' ' | '%' | '.' | '-'));
        prop_ok && val_ok
    })
}

#[cfg(test)]
mod tests {
    use super::Policy;

    #[test]
    fn default_policy_allows_pipeline_tags() {
        let policy = Policy::default();
        for tag in ["p", "table", "code", "math", "details"] {
            assert!(policy.allows_tag(tag), "expected {tag} to be allowed");
        }
        assert!(!policy.allows_tag("script"));
        assert!(!policy.allows_tag("iframe"));
    }

    #[test]
    fn event_handlers_other_than_copy_are_rejected() {
        let policy = Policy::default();
        assert!(!policy.allows_attr("onerror"));
        assert!(!policy.allows_attr_value("onclick", "alert(1)"));
        assert!(policy.allows_attr_value("onclick", "copyTable('table-m1-0-inner')"));
    }

    #[test]
    fn style_values_are_restricted() {
        let policy = Policy::default();
        assert!(policy.allows_attr_value("style", "min-width:120px"));
        assert!(policy.allows_attr_value("style", "overflow-x:auto;table-layout:fixed"));
        assert!(!policy.allows_attr_value("style", "background:url(javascript:x)"));
        assert!(!policy.allows_attr_value("style", "position:fixed"));
    }

    #[test]
    fn unsafe_urls_are_rejected_per_attribute() {
        let policy = Policy::default();
        assert!(policy.allows_attr_value("href", "https://example.com"));
        assert!(!policy.allows_attr_value("href", "javascript:alert(1)"));
        assert!(!policy.allows_attr_value("src", "data:image/png;base64,AAAA"));
    }
}
