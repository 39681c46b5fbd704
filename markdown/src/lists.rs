//! Ordered/unordered list runs with indentation-based nesting.
//!
//! An explicit stack of open list levels keyed by (indent, kind). A blank
//! line does not close lists on its own — one line of lookahead decides,
//! which tolerates streaming arrival where a blank line momentarily separates
//! sibling items. Ordered numbering keeps the literal source number via
//! `value="N"`, so skipped or repeated numbers survive.

use crate::patterns;

struct ListLevel {
    ordered: bool,
    indent: usize,
    items: Vec<String>,
}

fn render_level(level: ListLevel) -> String {
    let tag = if level.ordered { "ol" } else { "ul" };
    let class = if level.ordered {
        "markdown-list ordered"
    } else {
        "markdown-list"
    };
    format!("<{tag} class=\"{class}\">{}</{tag}>", level.items.concat())
}

/// Close the innermost level, splicing its HTML into the parent's last item
/// (nested list) or emitting it to the output (top level).
fn close_one(stack: &mut Vec<ListLevel>, output: &mut Vec<String>) {
    let Some(level) = stack.pop() else { return };
    let html = render_level(level);
    match stack.last_mut() {
        Some(parent) => {
            if let Some(last) = parent.items.last_mut() {
                *last = last.replacen("</li>", &format!("{html}</li>"), 1);
            } else {
                output.push(html);
            }
        }
        None => output.push(html),
    }
}

fn close_deeper_than(stack: &mut Vec<ListLevel>, output: &mut Vec<String>, indent: usize) {
    while stack.last().is_some_and(|level| level.indent > indent) {
        close_one(stack, output);
    }
}

fn close_all(stack: &mut Vec<ListLevel>, output: &mut Vec<String>) {
    while !stack.is_empty() {
        close_one(stack, output);
    }
}

fn leading_spaces(line: &str) -> usize {
    line.chars().take_while(|ch| ch.is_whitespace()).count()
}

fn is_list_marker(line: &str) -> bool {
    patterns::ORDERED_ITEM.is_match(line) || patterns::UNORDERED_ITEM.is_match(line)
}

/// Replace list line-runs with nested `<ol>`/`<ul>` HTML; all other lines
/// pass through unchanged.
pub fn process_lists(input: &str, inline: &mut dyn FnMut(&str) -> String) -> String {
    let lines: Vec<&str> = input.split('\n').collect();
    let mut output: Vec<String> = Vec::new();
    let mut stack: Vec<ListLevel> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let ordered_caps = patterns::ORDERED_ITEM.captures(line);
        let unordered_caps = patterns::UNORDERED_ITEM.captures(line);

        if ordered_caps.is_some() || unordered_caps.is_some() {
            let indent = leading_spaces(line);
            let ordered = ordered_caps.is_some();
            let item = match (&ordered_caps, &unordered_caps) {
                (Some(caps), _) => format!(
                    "<li value=\"{}\" class=\"markdown-list-item\">{}</li>",
                    &caps[2],
                    inline(&caps[3])
                ),
                (None, Some(caps)) => format!(
                    "<li class=\"markdown-list-item\">{}</li>",
                    inline(&caps[2])
                ),
                (None, None) => continue,
            };

            close_deeper_than(&mut stack, &mut output, indent);

            let mut added = false;
            for level in stack.iter_mut().rev() {
                if level.indent == indent && level.ordered == ordered {
                    level.items.push(item.clone());
                    added = true;
                    break;
                }
                if level.indent < indent {
                    break;
                }
            }
            if !added {
                stack.push(ListLevel {
                    ordered,
                    indent,
                    items: vec![item],
                });
            }
        } else if !stack.is_empty() && !line.trim().is_empty() {
            let indent = leading_spaces(line);
            let innermost_indent = stack.last().map_or(0, |level| level.indent);
            if indent > innermost_indent {
                // Soft continuation of the previous item.
                let processed = inline(line.trim());
                if let Some(last) = stack.last_mut().and_then(|level| level.items.last_mut()) {
                    *last = last.replacen("</li>", &format!("<br>{processed}</li>"), 1);
                }
            } else {
                close_all(&mut stack, &mut output);
                output.push((*line).to_string());
            }
        } else if line.trim().is_empty() {
            // A blank line only closes lists when the next non-blank line is
            // not itself a list marker.
            if let Some(next) = lines.get(i + 1) {
                if !is_list_marker(next) {
                    close_all(&mut stack, &mut output);
                }
            }
            output.push((*line).to_string());
        } else {
            close_all(&mut stack, &mut output);
            output.push((*line).to_string());
        }
    }

    close_all(&mut stack, &mut output);
    output.join("\n")
}
