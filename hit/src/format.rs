//! The formatter: style-document-driven child reordering and canonical
//! section-marker normalization.
//!
//! The style document is itself HIT, parsed with the same [`crate::parser`]
//! used for ordinary input -- no separate configuration format or crate is
//! needed.

use regex::Regex;

use crate::error::Error;
use crate::parser::parse;
use crate::tree::{NodeId, NodeKind, Tree};

/// One `format/sorting` entry: children of any section whose fullpath fully
/// matches `section` are reordered according to `order`, split at the `**`
/// sentinel into a front and back group. `order` entries are the *names* of
/// the style document's own children -- their field values are ignored.
struct SortRule {
    section: Regex,
    front_order: Vec<Regex>,
    back_order: Vec<Regex>,
}

/// Wraps `pattern` so matching it behaves like `std::regex_match` (a full
/// match of the whole candidate string), matching the section-pattern half
/// of the ground-truth `matches()` helper -- as opposed to the order-entry
/// half, which searches for a partial match and is left unanchored.
fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

pub struct Formatter {
    pub indent_string: String,
    pub line_length: usize,
    pub canonical_section_markers: bool,
    rules: Vec<SortRule>,
}

impl Formatter {
    /// Parses a style document and extracts the recognized
    /// `format/indent_string`, `format/line_length`,
    /// `format/canonical_section_markers` and `format/sorting` keys.
    /// Unrecognized keys are ignored.
    pub fn from_style(file: &str, style: &str) -> Result<Formatter, Error> {
        let parsed = parse(file, style)?;
        let tree = &parsed.tree;

        let indent_string = tree
            .find_from_root("format/indent_string")
            .map(|id| tree.param_string(id))
            .unwrap_or_else(|| "  ".to_string());
        let line_length = tree
            .find_from_root("format/line_length")
            .map(|id| tree.param_int(id))
            .transpose()?
            .map(|n| n.max(0) as usize)
            .unwrap_or(0);
        let canonical_section_markers = tree
            .find_from_root("format/canonical_section_markers")
            .map(|id| tree.param_bool(id))
            .transpose()?
            .unwrap_or(false);

        let mut rules = Vec::new();
        if let Some(sorting) = tree.find_from_root("format/sorting") {
            walk_pattern_config(tree, "", sorting, &mut rules)?;
        }

        Ok(Formatter { indent_string, line_length, canonical_section_markers, rules })
    }

    /// Applies canonical marker normalization and sort-rule reordering to
    /// every section in `tree`, recursively.
    pub fn apply(&self, tree: &mut Tree) {
        self.apply_node(tree, tree.root());
    }

    fn apply_node(&self, tree: &mut Tree, id: NodeId) {
        if self.canonical_section_markers {
            if let NodeKind::Section { open_marker, close_marker, .. } = tree.kind_mut(id) {
                open_marker.clear();
                *close_marker = "[]".to_string();
            }
        }
        if tree.kind(id).is_section() || id == tree.root() {
            let fullpath = tree.fullpath(id);
            if let Some(rule) = self.rules.iter().find(|r| r.section.is_match(&fullpath)) {
                log::trace!("formatter sorting pattern matches section '{fullpath}'");
                self.reorder_children(tree, id, rule);
            }
        }
        for c in tree.children(id).to_vec() {
            self.apply_node(tree, c);
        }
    }

    fn reorder_children(&self, tree: &mut Tree, id: NodeId, rule: &SortRule) {
        let children = tree.children(id).to_vec();
        let units = group_with_leading_comments(tree, &children);
        let mut remaining: Vec<Option<Vec<NodeId>>> = units.into_iter().map(Some).collect();

        let mut front = Vec::new();
        for re in &rule.front_order {
            if let Some(idx) = find_matching_unit(tree, &remaining, re) {
                if let Some(unit) = remaining[idx].take() {
                    front.extend(unit);
                }
            }
        }
        let mut back = Vec::new();
        for re in &rule.back_order {
            if let Some(idx) = find_matching_unit(tree, &remaining, re) {
                if let Some(unit) = remaining[idx].take() {
                    back.extend(unit);
                }
            }
        }
        let middle: Vec<NodeId> = remaining.into_iter().flatten().flatten().collect();

        let mut new_order = Vec::with_capacity(children.len());
        new_order.extend(front);
        new_order.extend(middle);
        new_order.extend(back);

        for c in new_order.iter() {
            tree.detach(id, *c);
        }
        for c in new_order {
            tree.append_child(id, c);
        }
    }
}

/// Mirrors `walkPatternConfig`: every field or section that is a direct
/// child of `node` contributes its own name to `node`'s order list, and
/// every child that is itself a section recursively registers its own
/// pattern one nesting level deeper, so a style document's own shape (not
/// just its top level) drives the sections it configures.
fn walk_pattern_config(tree: &Tree, prefix: &str, node: NodeId, rules: &mut Vec<SortRule>) -> Result<(), Error> {
    let mut order = Vec::new();
    for &child in tree.children(node) {
        if !(tree.kind(child).is_field() || tree.kind(child).is_section()) {
            continue;
        }
        let name = tree.local_path(child).unwrap_or_default().to_string();
        order.push(name.clone());
        if tree.kind(child).is_section() {
            let subpath = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
            walk_pattern_config(tree, &subpath, child, rules)?;
        }
    }
    add_pattern(tree, node, prefix, &order, rules)
}

fn add_pattern(tree: &Tree, node: NodeId, prefix: &str, order: &[String], rules: &mut Vec<SortRule>) -> Result<(), Error> {
    let section = anchored(prefix).map_err(|e| invalid_regex(tree, node, &e.to_string()))?;
    let mut front_order = Vec::new();
    let mut back_order = Vec::new();
    let mut past_sentinel = false;
    for name in order {
        if name == "**" {
            past_sentinel = true;
            continue;
        }
        let re = Regex::new(name).map_err(|e| invalid_regex(tree, node, &e.to_string()))?;
        if past_sentinel {
            back_order.push(re);
        } else {
            front_order.push(re);
        }
    }
    rules.push(SortRule { section, front_order, back_order });
    Ok(())
}

fn invalid_regex(tree: &Tree, id: NodeId, msg: &str) -> Error {
    Error::new(crate::error::ErrorKind::Semantic, tree.file(id), tree.line(id), tree.column(id), msg.to_string())
}

/// Groups a flat child list into units: a leading run of comments/blanks
/// immediately preceding a field or section travels with it as a single
/// relocatable unit.
fn group_with_leading_comments(tree: &Tree, children: &[NodeId]) -> Vec<Vec<NodeId>> {
    let mut units = Vec::new();
    let mut pending = Vec::new();
    for &c in children {
        match tree.kind(c) {
            NodeKind::Comment { is_inline: false, .. } | NodeKind::Blank => pending.push(c),
            _ => {
                pending.push(c);
                units.push(std::mem::take(&mut pending));
            }
        }
    }
    if !pending.is_empty() {
        units.push(pending);
    }
    units
}

fn find_matching_unit(tree: &Tree, units: &[Option<Vec<NodeId>>], re: &Regex) -> Option<usize> {
    units.iter().position(|u| match u {
        Some(unit) => unit
            .last()
            .and_then(|&id| tree.local_path(id))
            .map(|name| re.is_match(name))
            .unwrap_or(false),
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::render::render_tree;

    #[test]
    fn canonical_markers_strip_legacy_syntax() {
        let mut tree = parse("t", "[./a] x = 1 [../]").unwrap().tree;
        let fmt = Formatter::from_style("style", "format/canonical_section_markers = true").unwrap();
        fmt.apply(&mut tree);
        assert_eq!(render_tree(&tree, "  ", 0), "[a]\n  x = 1\n[]");
    }

    #[test]
    fn sorting_splits_front_and_back_around_sentinel() {
        let mut tree = parse("t", "[A] c = 1 a = 2 b = 3 []").unwrap().tree;
        let style = "[format] [sorting] [A] a = x '**' = x c = x [] [] []";
        let fmt = Formatter::from_style("style", style).unwrap();
        fmt.apply(&mut tree);
        let a = tree.find_from_root("A").unwrap();
        let names: Vec<_> = tree.field_children(a).map(|f| tree.local_path(f).unwrap().to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn sorting_registers_patterns_recursively_per_nesting_depth() {
        let mut tree = parse("t", "[A] [B] second = 1 first = 2 [] []").unwrap().tree;
        let style = "[format] [sorting] [A] [B] first = x [] [] [] []";
        let fmt = Formatter::from_style("style", style).unwrap();
        fmt.apply(&mut tree);
        let b = tree.find_from_root("A/B").unwrap();
        let names: Vec<_> = tree.field_children(b).map(|f| tree.local_path(f).unwrap().to_string()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn sorting_top_level_of_style_orders_root_children() {
        let mut tree = parse("t", "[Second] [] [First] []").unwrap().tree;
        let style = "[format] [sorting] First = x Second = y [] []";
        let fmt = Formatter::from_style("style", style).unwrap();
        fmt.apply(&mut tree);
        let root = tree.root();
        let names: Vec<_> = tree.section_children(root).map(|s| tree.local_path(s).unwrap().to_string()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn default_style_has_two_space_indent() {
        let fmt = Formatter::from_style("style", "").unwrap();
        assert_eq!(fmt.indent_string, "  ");
        assert_eq!(fmt.line_length, 0);
        assert!(!fmt.canonical_section_markers);
    }
}
