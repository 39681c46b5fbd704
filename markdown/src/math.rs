//! LaTeX-like math detection and rendering.
//!
//! Actual TeX-to-markup conversion is delegated to an injected
//! [`MathRenderer`]; a render failure is never propagated, it degrades to an
//! escaped literal wrapped in an error-styled span. Single-dollar spans are
//! disambiguated from currency before they are treated as math.

use thiserror::Error;
use tidemark_sanitize::escape_text;

use crate::patterns;

/// Failure reported by a [`MathRenderer`] implementation.
#[derive(Debug, Error)]
#[error("math rendering failed: {message}")]
pub struct MathRenderError {
    pub message: String,
}

impl MathRenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// TeX-to-markup conversion seam.
pub trait MathRenderer: Send + Sync {
    fn render(&self, latex: &str, display_mode: bool) -> Result<String, MathRenderError>;
}

/// Detects math spans and replaces them with rendered markup.
pub struct MathProcessor {
    renderer: Box<dyn MathRenderer>,
}

impl MathProcessor {
    pub fn new(renderer: Box<dyn MathRenderer>) -> Self {
        Self { renderer }
    }

    fn render_math(&self, latex: &str, display_mode: bool) -> String {
        match self.renderer.render(latex, display_mode) {
            Ok(html) => html,
            Err(err) => {
                tracing::warn!(%err, "math render failed, falling back to literal");
                let delim = if display_mode { "$$" } else { "$" };
                format!(
                    "<span class=\"math-error\" title=\"LaTeX error\">{delim}{}{delim}</span>",
                    escape_text(latex)
                )
            }
        }
    }

    /// Replace block and inline math in `text` with rendered markup.
    pub fn process_math(&self, text: &str) -> String {
        // Block math first so `$$...$$` is never re-read as two inline spans.
        let text = patterns::MATH_BLOCK.replace_all(text, |caps: &regex_lite::Captures| {
            format!(
                "<div class=\"math-block\" data-display-mode=\"true\">{}</div>",
                self.render_math(caps[1].trim(), true)
            )
        });
        let text = patterns::MATH_BLOCK_ALT.replace_all(&text, |caps: &regex_lite::Captures| {
            format!(
                "<div class=\"math-block\" data-display-mode=\"true\">{}</div>",
                self.render_math(caps[1].trim(), true)
            )
        });

        let text = self.process_inline_dollars(&text);

        let text = patterns::MATH_INLINE_ALT.replace_all(&text, |caps: &regex_lite::Captures| {
            format!(
                "<span class=\"math-inline\" data-display-mode=\"false\">{}</span>",
                self.render_math(&caps[1], false)
            )
        });
        text.into_owned()
    }

    /// `$...$` spans become math only when all three guards hold: the content
    /// does not start with a digit or comma, the preceding character is not
    /// alphanumeric, and the content carries at least one math indicator.
    /// Everything else stays literal (`It costs $5,000 today`).
    fn process_inline_dollars(&self, text: &str) -> String {
        let mut out = String::new();
        let mut consumed = 0;
        let mut replaced_any = false;

        for caps in patterns::MATH_INLINE.captures_iter(text) {
            let Some(span) = caps.get(0) else { continue };
            if span.start() < consumed {
                continue;
            }
            let content = &caps[1];
            if content.starts_with(|ch: char| ch.is_ascii_digit() || ch == ',') {
                continue;
            }
            let preceded_by_word = text[..span.start()]
                .chars()
                .next_back()
                .is_some_and(|ch| ch.is_ascii_alphanumeric());
            if preceded_by_word {
                continue;
            }
            if !is_likely_math(content) {
                continue;
            }
            out.push_str(&text[consumed..span.start()]);
            out.push_str(&format!(
                "<span class=\"math-inline\" data-display-mode=\"false\">{}</span>",
                self.render_math(content, false)
            ));
            consumed = span.end();
            replaced_any = true;
        }

        if !replaced_any {
            return text.to_string();
        }
        out.push_str(&text[consumed..]);
        out
    }
}

/// Math indicator characters: a backslash command or `_ ^ { }`.
fn is_likely_math(content: &str) -> bool {
    content.contains(['\\', '_', '^', '{', '}'])
}

/// Production renderer backed by the `katex` crate. KaTeX has no session
/// state, so the shorthand macros ride along as a `\newcommand` prelude on
/// every expression.
#[cfg(feature = "katex")]
pub struct KatexRenderer;

#[cfg(feature = "katex")]
const MACRO_PRELUDE: &str = concat!(
    r"\newcommand{\RR}{\mathbb{R}}",
    r"\newcommand{\NN}{\mathbb{N}}",
    r"\newcommand{\ZZ}{\mathbb{Z}}",
    r"\newcommand{\QQ}{\mathbb{Q}}",
    r"\newcommand{\CC}{\mathbb{C}}",
);

#[cfg(feature = "katex")]
impl MathRenderer for KatexRenderer {
    fn render(&self, latex: &str, display_mode: bool) -> Result<String, MathRenderError> {
        let opts = katex::Opts::builder()
            .display_mode(display_mode)
            .output_type(katex::OutputType::HtmlAndMathml)
            .trust(false)
            .build()
            .map_err(|err| MathRenderError::new(err.to_string()))?;
        let source = format!("{MACRO_PRELUDE}{latex}");
        katex::render_with_opts(&source, &opts)
            .map_err(|err| MathRenderError::new(err.to_string()))
    }
}

#[cfg(test)]
pub(crate) struct FakeRenderer;

#[cfg(test)]
impl MathRenderer for FakeRenderer {
    fn render(&self, latex: &str, display_mode: bool) -> Result<String, MathRenderError> {
        if latex.contains("\\broken") {
            return Err(MathRenderError::new("unknown command"));
        }
        let mode = if display_mode { "display" } else { "inline" };
        Ok(format!("<math data-mode=\"{mode}\">{}</math>", escape_text(latex)))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::FakeRenderer;
    use super::MathProcessor;

    fn processor() -> MathProcessor {
        MathProcessor::new(Box::new(FakeRenderer))
    }

    #[test]
    fn currency_is_left_alone() {
        let out = processor().process_math("It costs $5,000 today");
        assert_eq!(out, "It costs $5,000 today");
    }

    #[test]
    fn two_prices_do_not_become_math() {
        let out = processor().process_math("between $5,000 and $6,000");
        assert_eq!(out, "between $5,000 and $6,000");
    }

    #[test]
    fn inline_math_with_indicator_renders() {
        let out = processor().process_math("$x^2$");
        assert_eq!(
            out,
            "<span class=\"math-inline\" data-display-mode=\"false\"><math data-mode=\"inline\">x^2</math></span>"
        );
    }

    #[test]
    fn plain_dollar_span_without_indicator_stays_literal() {
        let out = processor().process_math("$just words$");
        assert_eq!(out, "$just words$");
    }

    #[test]
    fn preceding_word_character_blocks_math() {
        let out = processor().process_math("price9$x^2$");
        assert_eq!(out, "price9$x^2$");
    }

    #[test]
    fn block_math_skips_currency_guard() {
        let out = processor().process_math("$$5 + 5$$");
        assert_eq!(
            out,
            "<div class=\"math-block\" data-display-mode=\"true\"><math data-mode=\"display\">5 + 5</math></div>"
        );
    }

    #[test]
    fn bracket_block_form_renders() {
        let out = processor().process_math("\\[E = mc^2\\]");
        assert_eq!(
            out,
            "<div class=\"math-block\" data-display-mode=\"true\"><math data-mode=\"display\">E = mc^2</math></div>"
        );
    }

    #[test]
    fn paren_inline_form_renders() {
        let out = processor().process_math("\\(a_1\\)");
        assert_eq!(
            out,
            "<span class=\"math-inline\" data-display-mode=\"false\"><math data-mode=\"inline\">a_1</math></span>"
        );
    }

    #[test]
    fn render_failure_degrades_to_error_span() {
        let out = processor().process_math("$\\broken{x}$");
        assert_eq!(
            out,
            "<span class=\"math-inline\" data-display-mode=\"false\"><span class=\"math-error\" title=\"LaTeX error\">$\\broken{x}$</span></span>"
        );
    }
}
