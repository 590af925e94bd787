//! Tree-to-tree transforms: `explode` flattens slash-bearing names into
//! nesting, `merge` folds one tree's content into another, and
//! `merge_blocks` coalesces sibling sections sharing a path within a single
//! parse.

use crate::tree::{FieldKind, NodeId, NodeKind, Tree};

fn rename_local(tree: &mut Tree, id: NodeId, new_name: String) {
    match tree.kind_mut(id) {
        NodeKind::Section { path, .. } => *path = new_name,
        NodeKind::Field { name, .. } => *name = new_name,
        _ => {}
    }
}

fn find_or_create_section(tree: &mut Tree, parent: NodeId, seg: &str) -> NodeId {
    for &c in tree.children(parent) {
        if let NodeKind::Section { path, .. } = tree.kind(c) {
            if path == seg {
                return c;
            }
        }
    }
    let (file, line, column) = (tree.file(parent).to_string(), tree.line(parent), tree.column(parent));
    let id = tree.alloc(
        NodeKind::Section { path: seg.to_string(), open_marker: String::new(), close_marker: "[]".to_string() },
        file,
        line,
        column,
    );
    tree.append_child(parent, id);
    id
}

/// Rewrites every `Section`/`Field` whose local path contains `/` into
/// nested sections, one per slash-separated segment, with the final
/// segment becoming the leaf's new name. Existing intermediate sections are
/// reused rather than duplicated. Idempotent: once applied, no remaining
/// name contains `/`, so a second pass is a no-op.
pub fn explode(tree: &mut Tree) {
    explode_node(tree, tree.root());
}

fn explode_node(tree: &mut Tree, container: NodeId) {
    let mut children = tree.children(container).to_vec();
    let mut i = 0;
    while i < children.len() {
        let child = children[i];
        let local = tree.local_path(child).map(str::to_string);
        let Some(local) = local else {
            i += 1;
            continue;
        };
        if !local.contains('/') {
            i += 1;
            continue;
        }
        tree.detach(container, child);
        let mut segments: Vec<&str> = local.split('/').filter(|s| !s.is_empty()).collect();
        let last = segments.pop().unwrap_or("").to_string();
        let mut cursor = container;
        for seg in &segments {
            cursor = find_or_create_section(tree, cursor, seg);
        }
        rename_local(tree, child, last);
        tree.append_child(cursor, child);
        children = tree.children(container).to_vec();
    }

    let children = tree.children(container).to_vec();
    for c in children {
        if tree.kind(c).is_section() {
            explode_node(tree, c);
        }
    }
}

fn collect_fields(tree: &Tree, id: NodeId, out: &mut Vec<NodeId>) {
    if tree.kind(id).is_field() {
        out.push(id);
    }
    for &c in tree.children(id) {
        collect_fields(tree, c, out);
    }
}

fn collect_sections(tree: &Tree, id: NodeId, out: &mut Vec<NodeId>) {
    if tree.kind(id).is_section() {
        out.push(id);
    }
    for &c in tree.children(id) {
        collect_sections(tree, c, out);
    }
}

fn parent_fullpath(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

fn resolve_parent(into: &Tree, parent_path: &str) -> Option<NodeId> {
    if parent_path.is_empty() {
        Some(into.root())
    } else {
        into.find_from_root(parent_path)
    }
}

/// Folds `from` into `into` in two passes, per the merge algorithm: first
/// every field in `from` either overwrites the value of the same-path field
/// in `into`, or -- if `into` has no such field but does have the parent
/// section -- is cloned in. Second, every section in `from` absent from
/// `into` is cloned in wholesale (carrying its own fields, already merged
/// in pass one where a counterpart existed). Assumes `from` has already
/// been exploded, so no name contains `/`.
pub fn merge(from: &Tree, into: &mut Tree) {
    let mut fields = Vec::new();
    collect_fields(from, from.root(), &mut fields);
    log::debug!("merging {} field(s) into tree", fields.len());
    for field_id in fields {
        let fullpath = from.fullpath(field_id);
        match into.find_from_root(&fullpath) {
            Some(existing) if into.kind(existing).is_field() => {
                log::trace!("merge overwrites '{fullpath}'");
                let raw = from.raw_value(field_id).unwrap_or_default().to_string();
                let kind = from.field_kind(field_id).unwrap_or(FieldKind::None);
                into.set_value(existing, raw, kind);
            }
            Some(_) => {}
            None => {
                if let Some(parent_id) = resolve_parent(into, parent_fullpath(&fullpath)) {
                    let copy = from.copy_into(field_id, into);
                    into.append_child(parent_id, copy);
                }
            }
        }
    }

    let mut sections = Vec::new();
    collect_sections(from, from.root(), &mut sections);
    for section_id in sections {
        let fullpath = from.fullpath(section_id);
        if into.find_from_root(&fullpath).is_none() {
            if let Some(parent_id) = resolve_parent(into, parent_fullpath(&fullpath)) {
                let copy = from.copy_into(section_id, into);
                into.append_child(parent_id, copy);
            }
        }
    }
}

/// Coalesces sibling sections sharing the same local path within a single
/// container into the first occurrence, concatenating their children in
/// document order. Duplicate field names surviving a merge are left as-is
/// -- override resolution for those belongs to the include layer, which
/// runs before this pass sees cross-file content; two same-name fields
/// that both reach this point with no override marker are, per the
/// override policy, both kept.
pub fn merge_blocks(tree: &mut Tree) {
    merge_blocks_node(tree, tree.root());
}

fn merge_blocks_node(tree: &mut Tree, container: NodeId) {
    let children = tree.children(container).to_vec();
    let mut first_by_path: std::collections::HashMap<String, NodeId> = std::collections::HashMap::new();
    for &c in &children {
        let NodeKind::Section { path, .. } = tree.kind(c).clone() else { continue };
        match first_by_path.get(&path) {
            Some(&first) => {
                let grandchildren = tree.children(c).to_vec();
                for gc in grandchildren {
                    tree.detach(c, gc);
                    tree.append_child(first, gc);
                }
                tree.remove(c);
            }
            None => {
                first_by_path.insert(path, c);
            }
        }
    }

    let children = tree.children(container).to_vec();
    for c in children {
        if tree.kind(c).is_section() {
            merge_blocks_node(tree, c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::render::render_tree;

    #[test]
    fn explode_nests_slash_names() {
        let parsed = parse("t", "a/b/c = 1").unwrap();
        let mut tree = parsed.tree;
        explode(&mut tree);
        let field = tree.find_from_root("a/b/c").unwrap();
        assert_eq!(tree.value_string(field).as_deref(), Some("1"));
        assert_eq!(render_tree(&tree, "  ", 0), "[a]\n  [b]\n    c = 1\n  []\n[]");
    }

    #[test]
    fn explode_is_idempotent() {
        let parsed = parse("t", "a/b = 1").unwrap();
        let mut tree = parsed.tree;
        explode(&mut tree);
        let once = render_tree(&tree, "  ", 0);
        explode(&mut tree);
        assert_eq!(render_tree(&tree, "  ", 0), once);
    }

    #[test]
    fn explode_reuses_existing_section() {
        let parsed = parse("t", "[a] x = 1 [] a/y = 2").unwrap();
        let mut tree = parsed.tree;
        explode(&mut tree);
        let a = tree.find_from_root("a").unwrap();
        assert_eq!(tree.section_children(tree.root()).count(), 1);
        assert_eq!(tree.field_children(a).count(), 2);
    }

    #[test]
    fn merge_overwrites_and_adds() {
        let base = parse("t", "[B] p = 1 q = 2 [] ").unwrap().tree;
        let other = parse("t", "[B] p = 9 r = 3 []").unwrap().tree;
        let mut into = base;
        merge(&other, &mut into);
        assert_eq!(into.value_string(into.find_from_root("B/p").unwrap()).as_deref(), Some("9"));
        assert_eq!(into.value_string(into.find_from_root("B/q").unwrap()).as_deref(), Some("2"));
        assert_eq!(into.value_string(into.find_from_root("B/r").unwrap()).as_deref(), Some("3"));
    }

    #[test]
    fn merge_clones_missing_sections() {
        let base = parse("t", "[A] x = 1 []").unwrap().tree;
        let other = parse("t", "[A] [B] y = 2 [] []").unwrap().tree;
        let mut into = base;
        merge(&other, &mut into);
        assert_eq!(into.value_string(into.find_from_root("A/B/y").unwrap()).as_deref(), Some("2"));
    }

    #[test]
    fn merge_is_idempotent() {
        let base = parse("t", "[B] p = 1 []").unwrap().tree;
        let other = parse("t", "[B] p = 9 q = 2 []").unwrap().tree;
        let mut into = base;
        merge(&other, &mut into);
        let once = render_tree(&into, "  ", 0);
        merge(&other, &mut into);
        assert_eq!(render_tree(&into, "  ", 0), once);
    }

    #[test]
    fn merge_blocks_concatenates_duplicate_sections() {
        let parsed = parse("t", "[A] x = 1 [] [A] y = 2 []").unwrap();
        let mut tree = parsed.tree;
        merge_blocks(&mut tree);
        assert_eq!(tree.section_children(tree.root()).count(), 1);
        let a = tree.find_from_root("A").unwrap();
        assert_eq!(tree.field_children(a).count(), 2);
    }
}
