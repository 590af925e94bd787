//! Pretty-printer: turns a [`Tree`] back into HIT source text.

use crate::tree::{decode_value, NodeId, NodeKind, Tree};

fn indent_str(indent: u32, indent_text: &str) -> String {
    indent_text.repeat(indent as usize)
}

/// Renders the whole tree at the given indent unit and line-length limit
/// (`0` disables length-based reflow). The leading newline of the very
/// first top-level child is stripped so output never begins with a blank
/// line.
pub fn render_tree(tree: &Tree, indent_text: &str, maxlen: usize) -> String {
    let children = tree.children(tree.root()).to_vec();
    let mut out = String::new();
    for (i, &c) in children.iter().enumerate() {
        let s = render_node(tree, c, 0, indent_text, maxlen);
        if i == 0 {
            out.push_str(s.strip_prefix('\n').unwrap_or(&s));
        } else {
            out.push_str(&s);
        }
    }
    out
}

fn render_children(tree: &Tree, id: NodeId, indent: u32, indent_text: &str, maxlen: usize) -> String {
    let mut out = String::new();
    for &c in tree.children(id) {
        out.push_str(&render_node(tree, c, indent, indent_text, maxlen));
    }
    out
}

fn render_node(tree: &Tree, id: NodeId, indent: u32, indent_text: &str, maxlen: usize) -> String {
    match tree.kind(id).clone() {
        NodeKind::Root => String::new(),
        NodeKind::Section { path, open_marker, close_marker } => {
            let display_path = tree.override_path(id).map(str::to_string).unwrap_or(path);
            if display_path.is_empty() || display_path == "-" {
                render_children(tree, id, indent, indent_text, maxlen)
            } else {
                let ind = indent_str(indent, indent_text);
                let mut out = String::new();
                out.push('\n');
                out.push_str(&ind);
                out.push('[');
                out.push_str(&open_marker);
                out.push_str(&display_path);
                out.push(']');
                out.push_str(&render_children(tree, id, indent + 1, indent_text, maxlen));
                out.push('\n');
                out.push_str(&ind);
                out.push_str(&close_marker);
                out
            }
        }
        NodeKind::Field { name, raw_value, .. } => {
            let display_name = tree.override_path(id).map(str::to_string).unwrap_or(name);
            let ind = indent_str(indent, indent_text);
            let prefix_col = ind.len() + display_name.len() + 3;
            let value = format_value(&raw_value, prefix_col, maxlen);
            let mut out = String::new();
            out.push('\n');
            out.push_str(&ind);
            out.push_str(&display_name);
            out.push_str(" = ");
            out.push_str(&value);
            out.push_str(&render_children(tree, id, indent + 1, indent_text, maxlen));
            out
        }
        NodeKind::Comment { text, is_inline } => {
            if is_inline {
                format!(" {text}")
            } else {
                format!("\n{}{}", indent_str(indent, indent_text), text)
            }
        }
        NodeKind::Blank => "\n".to_string(),
    }
}

/// Formats a field's raw textual value for rendering: empty values become
/// `''`; unquoted values containing whitespace get single-quoted;
/// double-quoted values longer than the line-length budget are reflowed by
/// greedy word-boundary chunking with a hard-split fallback; double-quoted
/// values spanning multiple source lines are re-indented under the opening
/// quote column. Single-quoted values are never reflowed.
fn format_value(raw: &str, prefix_col: usize, maxlen: usize) -> String {
    let decoded = decode_value(raw);
    if decoded.is_empty() {
        return "''".to_string();
    }
    let is_double_quoted = raw.starts_with('"');
    let is_quoted = is_double_quoted || raw.starts_with('\'');
    if !is_quoted && decoded.chars().any(|c| c.is_whitespace()) {
        return format!("'{decoded}'");
    }
    if is_double_quoted {
        if raw.contains('\n') {
            return reflow_multiline(raw, prefix_col);
        }
        if maxlen > 0 && decoded.len() > maxlen.saturating_sub(prefix_col).saturating_sub(1) {
            return reflow_long(&decoded, prefix_col, maxlen);
        }
    }
    raw.to_string()
}

fn reflow_long(decoded: &str, prefix_col: usize, maxlen: usize) -> String {
    let width = maxlen.saturating_sub(prefix_col).saturating_sub(2).max(1);
    let mut chunks: Vec<&str> = Vec::new();
    let mut rest = decoded;
    while rest.len() > width {
        let window = &rest[..width.min(rest.len())];
        let cut = window.rfind(' ').filter(|&c| c > 0).unwrap_or(width);
        chunks.push(&rest[..cut]);
        rest = rest[cut..].trim_start_matches(' ');
    }
    chunks.push(rest);

    let pad = " ".repeat(prefix_col);
    let mut out = String::new();
    for (i, c) in chunks.iter().enumerate() {
        if i > 0 {
            out.push('\n');
            out.push_str(&pad);
        }
        out.push('"');
        out.push_str(c);
        out.push('"');
    }
    out
}

fn reflow_multiline(raw: &str, prefix_col: usize) -> String {
    let mut lines = raw.split('\n');
    let mut out = lines.next().unwrap_or("").to_string();
    let pad = " ".repeat(prefix_col);
    for line in lines {
        out.push('\n');
        out.push_str(&pad);
        out.push_str(line.trim_start());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn empty_value_renders_as_two_quotes() {
        let parsed = parse("t", "a = ''").unwrap();
        assert_eq!(render_tree(&parsed.tree, "  ", 0), "a = ''");
    }

    #[test]
    fn long_double_quoted_value_reflows() {
        let value = "one two three four five six seven eight nine ten";
        let src = format!("a = \"{value}\"");
        let parsed = parse("t", &src).unwrap();
        let out = render_tree(&parsed.tree, "  ", 20);
        assert!(out.contains('\n'), "expected reflow, got: {out}");
        for line in out.lines() {
            assert!(line.len() <= 24, "line too long: {line:?}");
        }
    }

    #[test]
    fn single_quoted_never_reflows() {
        let value = "one two three four five six seven eight nine ten eleven twelve";
        let src = format!("a = '{value}'");
        let parsed = parse("t", &src).unwrap();
        let out = render_tree(&parsed.tree, "  ", 20);
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn empty_input_renders_empty() {
        let parsed = parse("t", "").unwrap();
        assert_eq!(render_tree(&parsed.tree, "  ", 0), "");
    }
}
