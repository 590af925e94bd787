//! The brace-expression sub-grammar (`${ ... }`) and the expander that
//! interprets it against a registry of named evaluators.
//!
//! ```text
//! brace_node  := "${" brace_body "}"
//! brace_body  := ( word | brace_node )*
//! word        := [^ \t\n\r}]+
//! ```

use std::collections::HashMap;

use crate::error::{Error, ErrorKind, ErrorList};
use crate::tree::Tree;

/// A node in the brace sub-AST: a leaf carries a whitespace-delimited
/// `value`; an interior node represents a `${ ... }` group and owns its
/// children in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BraceNode {
    pub offset: usize,
    pub len: usize,
    pub value: Option<String>,
    pub children: Vec<BraceNode>,
}

fn skip_space(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\n' | b'\r') {
        i += 1;
    }
    i
}

fn until_space(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && !matches!(bytes[i], b' ' | b'\t' | b'\n' | b'\r' | b'}') {
        i += 1;
    }
    i
}

/// Parses a `${ ... }` expression starting at `start` (which must point at
/// the `$`). Returns the node and the byte offset just past the closing
/// `}`.
pub fn parse_brace_node(input: &str, start: usize) -> Result<(BraceNode, usize), String> {
    let mut node = BraceNode {
        offset: start,
        len: 0,
        value: None,
        children: Vec::new(),
    };
    let pos = start + 2; // eat opening "${"
    let pos = parse_brace_body(input, pos, &mut node)?;
    let bytes = input.as_bytes();
    let pos = skip_space(bytes, pos);
    if pos >= bytes.len() || bytes[pos] != b'}' {
        return Err("missing closing '}' in brace expression".to_string());
    }
    let pos = pos + 1; // eat closing "}"
    node.len = pos - start;
    Ok((node, pos))
}

fn parse_brace_body(input: &str, mut pos: usize, node: &mut BraceNode) -> Result<usize, String> {
    let bytes = input.as_bytes();
    pos = skip_space(bytes, pos);
    while pos < bytes.len() && bytes[pos] != b'}' {
        if input[pos..].starts_with("${") {
            let (child, end) = parse_brace_node(input, pos)?;
            node.children.push(child);
            pos = end;
        } else {
            let end = until_space(bytes, pos);
            node.children.push(BraceNode {
                offset: pos,
                len: end - pos,
                value: Some(input[pos..end].to_string()),
                children: Vec::new(),
            });
            pos = end;
        }
        pos = skip_space(bytes, pos);
    }
    Ok(pos)
}

/// Used by the lexer to skip a brace expression as opaque string contents:
/// returns only the end offset, discarding the parsed tree.
pub fn brace_expr_end(input: &str, start: usize) -> Result<usize, String> {
    parse_brace_node(input, start).map(|(_, end)| end)
}

type EvalFn = dyn Fn(&[String], &Tree) -> Result<String, String>;

/// A mapping from evaluator name to callable, built once at construction
/// and read-only afterwards -- the one piece of shared state the expander
/// owns.
pub struct Evaluators {
    fns: HashMap<String, Box<EvalFn>>,
}

impl Evaluators {
    pub fn new() -> Self {
        Evaluators { fns: HashMap::new() }
    }

    pub fn register(&mut self, name: impl Into<String>, f: impl Fn(&[String], &Tree) -> Result<String, String> + 'static) {
        self.fns.insert(name.into(), Box::new(f));
    }

    /// `env`, `raw` and `replace`, matching the evaluators named in the
    /// component design.
    pub fn with_defaults() -> Self {
        let mut e = Evaluators::new();
        e.register("env", |args, _tree| {
            let var = args.first().cloned().unwrap_or_default();
            Ok(std::env::var(var).unwrap_or_default())
        });
        e.register("raw", |args, _tree| Ok(args.concat()));
        e.register("replace", |args, tree| {
            let path = args.first().cloned().unwrap_or_default();
            tree.find_value(&path)
                .ok_or_else(|| format!("no parameter '{path}' found for brace-expression replacement"))
        });
        e
    }
}

impl Default for Evaluators {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Interprets brace expressions embedded in field values.
pub struct BraceExpander {
    evaluators: Evaluators,
}

impl BraceExpander {
    pub fn new(evaluators: Evaluators) -> Self {
        BraceExpander { evaluators }
    }

    fn expand_node(&self, node: &BraceNode, tree: &Tree) -> Result<String, String> {
        if node.children.is_empty() {
            return Ok(node.value.clone().unwrap_or_default());
        }
        let mut expanded_args = Vec::with_capacity(node.children.len());
        for child in &node.children {
            expanded_args.push(self.expand_node(child, tree)?);
        }
        let cmd = expanded_args.remove(0);
        let f = self
            .evaluators
            .fns
            .get(&cmd)
            .ok_or_else(|| format!("no valid evaler '{cmd}'"))?;
        f(&expanded_args, tree)
    }

    /// Repeatedly locates the next `${`, parses a brace node, and splices
    /// in the evaluator's result, to a fixpoint in one left-to-right pass.
    /// A brace node with fewer than two child words is the intra-input
    /// special case and is left untouched at this level.
    pub fn expand_str(&self, input: &str, tree: &Tree, file: &str, line: u32, column: u32) -> Result<String, Error> {
        let mut result = input.to_string();
        let mut start = 0usize;
        loop {
            let Some(rel) = result[start..].find("${") else {
                break;
            };
            let idx = start + rel;
            let (node, _end) = parse_brace_node(&result, idx)
                .map_err(|m| Error::new(ErrorKind::Brace, file, line, column, m))?;
            if node.children.len() < 2 {
                start = idx + node.len;
                continue;
            }
            let replacement = self
                .expand_node(&node, tree)
                .map_err(|m| Error::new(ErrorKind::Brace, file, line, column, m))?;
            result.replace_range(node.offset..node.offset + node.len, &replacement);
            start = node.offset + replacement.len();
        }
        Ok(result)
    }
}

fn expand_node_value(tree: &mut Tree, id: crate::tree::NodeId, expander: &BraceExpander, errors: &mut ErrorList) {
    if let Some(raw) = tree.raw_value(id) {
        let (file, line, column) = (tree.file(id).to_string(), tree.line(id), tree.column(id));
        log::trace!("expanding brace value at '{file}:{line}.{column}'");
        match expander.expand_str(raw, tree, &file, line, column) {
            Ok(expanded) => {
                let kind = tree.field_kind(id).unwrap_or(crate::tree::FieldKind::String);
                tree.set_value(id, expanded, kind);
            }
            Err(e) => errors.push(e),
        }
    }
    for c in tree.children(id).to_vec() {
        expand_node_value(tree, c, expander, errors);
    }
}

/// Expands every field's raw value in place, depth-first. Runs after
/// parsing (and after includes/merges are resolved) so the `replace`
/// evaluator can see the whole document, including fields defined after
/// the one being expanded.
///
/// Unlike `expand_str`, a single field's expansion failure doesn't abort the
/// walk -- every field is still visited, and every failure is collected, so
/// a caller validating a whole document sees all of its bad brace
/// expressions at once rather than just the first.
pub fn expand_tree(tree: &mut Tree, expander: &BraceExpander) -> Result<(), ErrorList> {
    let root = tree.root();
    let mut errors = ErrorList::new();
    expand_node_value(tree, root, expander, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        log::debug!("brace expansion collected {} error(s)", errors.iter().count());
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_brace_node() {
        let (node, end) = parse_brace_node("${ raw a ${ raw b c } }", 0).unwrap();
        assert_eq!(end, 23);
        assert_eq!(node.children.len(), 3);
        assert_eq!(node.children[0].value.as_deref(), Some("raw"));
        assert!(node.children[2].value.is_none());
    }

    #[test]
    fn missing_closer_errors() {
        assert!(parse_brace_node("${ raw a", 0).is_err());
    }

    #[test]
    fn env_evaluation() {
        std::env::set_var("HIT_TEST_HOME", "/u/x");
        let tree = Tree::new();
        let expander = BraceExpander::new(Evaluators::with_defaults());
        let out = expander.expand_str("${ env HIT_TEST_HOME }", &tree, "t", 1, 1).unwrap();
        assert_eq!(out, "/u/x");
    }

    #[test]
    fn expand_tree_collects_every_field_error_instead_of_stopping_at_first() {
        let parsed = crate::parser::parse("t", "a = '${ bogus x }' b = '${ bogus y }' c = plain").unwrap();
        let mut tree = parsed.tree;
        let expander = BraceExpander::new(Evaluators::with_defaults());
        let errors = expand_tree(&mut tree, &expander).unwrap_err();
        assert_eq!(errors.iter().count(), 2);
        assert!(errors.iter().all(|e| e.kind() == ErrorKind::Brace));
        let c = tree.find_from_root("c").unwrap();
        assert_eq!(tree.value_string(c).as_deref(), Some("plain"));
    }

    #[test]
    fn unknown_evaluator_errors() {
        let tree = Tree::new();
        let expander = BraceExpander::new(Evaluators::with_defaults());
        let err = expander.expand_str("${ bogus a b }", &tree, "t", 1, 1).unwrap_err();
        assert!(err.message().contains("no valid evaler"));
    }
}
