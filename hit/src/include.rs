//! Include resolution and override-conflict reconciliation.
//!
//! `!include <path>` directives don't fit the normal token grammar (`!` is
//! not an identifier character), so they're handled as a textual pre-parse
//! pass: each directive line is rewritten into an ordinary field
//! assignment (`__hit_include__ = '<path>'`) of identical line count before
//! tokenization, which keeps every other line's line number untouched.
//! Parsing then proceeds normally, and the placeholder fields are replaced
//! by the resolved file's content afterwards.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, ErrorKind};
use crate::parser::{parse, OverrideMarker};
use crate::tree::{NodeId, NodeKind, Tree};

const PLACEHOLDER_NAME: &str = "__hit_include__";

/// Abstracts include-file reads so the resolver can be exercised without
/// touching the real filesystem.
pub trait IncludeLoader {
    fn read(&self, path: &str) -> std::io::Result<String>;
}

/// Reads include targets from disk.
pub struct FsLoader;

impl IncludeLoader for FsLoader {
    fn read(&self, path: &str) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Rewrites every `!include <path>` occurrence into a plain field
/// assignment carrying the path as its value. Operates byte-wise over the
/// whole input (not line-by-line), since a directive may share a line with
/// other section/field content; because no `\n` bytes are added or
/// removed, every other line's line number is untouched.
fn splice_directives(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut plain_start = 0;
    while i < bytes.len() {
        let at_boundary = i == 0 || bytes[i - 1].is_ascii_whitespace();
        if at_boundary && input[i..].starts_with("!include") {
            let after_kw = i + "!include".len();
            if after_kw < bytes.len() && bytes[after_kw].is_ascii_whitespace() {
                let mut j = after_kw;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                let path_start = j;
                while j < bytes.len() && !bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                let path = &input[path_start..j];
                out.push_str(&input[plain_start..i]);
                out.push_str(PLACEHOLDER_NAME);
                out.push_str(" = '");
                out.push_str(path);
                out.push('\'');
                i = j;
                plain_start = i;
                continue;
            }
        }
        i += 1;
    }
    out.push_str(&input[plain_start..]);
    out
}

fn resolve_path(including_file: &str, target: &str) -> String {
    let dir = Path::new(including_file).parent().filter(|p| !p.as_os_str().is_empty());
    match dir {
        Some(d) => d.join(target).to_string_lossy().into_owned(),
        None => target.to_string(),
    }
}

fn collect_placeholders(tree: &Tree, id: NodeId, out: &mut Vec<NodeId>) {
    if let NodeKind::Field { name, .. } = tree.kind(id) {
        if name == PLACEHOLDER_NAME {
            out.push(id);
        }
    }
    for &c in tree.children(id).to_vec().iter() {
        collect_placeholders(tree, c, out);
    }
}

fn collect_field_fullpaths(tree: &Tree, id: NodeId, out: &mut HashMap<String, NodeId>) {
    if tree.kind(id).is_field() && tree.local_path(id) != Some(PLACEHOLDER_NAME) {
        out.insert(tree.fullpath(id), id);
    }
    for &c in tree.children(id) {
        collect_field_fullpaths(tree, c, out);
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

/// Deep-copies `id` from `src` into `dest`, returning the new root.
fn graft(src: &Tree, id: NodeId, dest: &mut Tree) -> NodeId {
    let new_id = dest.alloc(src.kind(id).clone(), src.file(id), src.line(id), src.column(id));
    dest.set_override_path(new_id, src.override_path(id).map(str::to_string));
    for &c in src.children(id) {
        let nc = graft(src, c, dest);
        dest.append_child(new_id, nc);
    }
    new_id
}

/// Parses `file` (read through `loader`), resolving every `!include`
/// directive it contains -- recursively, depth-first -- and reconciling
/// override conflicts between each file and the content it includes.
/// Returns the fully spliced tree.
pub fn resolve(file: &str, loader: &dyn IncludeLoader) -> Result<Tree, Error> {
    let mut stack = Vec::new();
    resolve_file(file, loader, &mut stack).map(|(tree, _)| tree)
}

/// Returns the resolved tree plus the fullpath-keyed override markers that
/// survived this file's own resolution without being consumed by a
/// conflict at this level -- carried upward so an ancestor include can
/// still detect a collision against a field several levels down.
fn resolve_file(
    file: &str,
    loader: &dyn IncludeLoader,
    stack: &mut Vec<String>,
) -> Result<(Tree, HashMap<String, OverrideMarker>), Error> {
    let text = loader
        .read(file)
        .map_err(|_| Error::new(ErrorKind::Include, file, 1, 1, format!("could not find '{file}'")))?;
    stack.push(file.to_string());
    let result = resolve_text(file, &text, loader, stack);
    stack.pop();
    result
}

fn resolve_text(
    file: &str,
    text: &str,
    loader: &dyn IncludeLoader,
    stack: &mut Vec<String>,
) -> Result<(Tree, HashMap<String, OverrideMarker>), Error> {
    let spliced = splice_directives(text);
    let parsed = parse(file, &spliced)?;
    let mut tree = parsed.tree;

    let mut base_fields = HashMap::new();
    collect_field_fullpaths(&tree, tree.root(), &mut base_fields);
    let mut own_conflicts: HashMap<String, OverrideMarker> = HashMap::new();
    for (&id, &marker) in &parsed.overrides {
        own_conflicts.insert(tree.fullpath(id), marker);
    }

    let mut placeholders = Vec::new();
    collect_placeholders(&tree, tree.root(), &mut placeholders);

    for placeholder in placeholders {
        let parent = tree.parent(placeholder).unwrap_or_else(|| tree.root());
        let index = tree.children(parent).iter().position(|&c| c == placeholder).unwrap_or(0);
        let target = tree.param_string(placeholder);
        let resolved_target = resolve_path(file, &target);

        if stack.contains(&resolved_target) {
            return Err(Error::new(
                ErrorKind::Include,
                file,
                tree.line(placeholder),
                tree.column(placeholder),
                format!("file include would create circular reference '{target}'"),
            ));
        }

        log::debug!("resolving include '{resolved_target}' from '{file}'");
        let (included, included_conflicts) = resolve_file(&resolved_target, loader, stack)?;
        let parent_prefix = tree.fullpath(parent);
        tree.remove(placeholder);

        let mut insert_at = index;
        let mut grafted_roots = Vec::new();
        for &c in included.children(included.root()) {
            let new_id = graft(&included, c, &mut tree);
            tree.insert_child(parent, insert_at, new_id);
            insert_at += 1;
            grafted_roots.push(new_id);
        }

        let mut grafted_fields = Vec::new();
        for &root in &grafted_roots {
            collect_fields(&tree, root, &mut grafted_fields);
        }

        for field_id in grafted_fields {
            let fullpath = tree.fullpath(field_id);
            if !base_fields.contains_key(&fullpath) {
                continue;
            }
            let local_fullpath = match parent_prefix.is_empty() {
                true => fullpath.clone(),
                false => fullpath.strip_prefix(&format!("{parent_prefix}/")).unwrap_or(&fullpath).to_string(),
            };
            let marker_base = own_conflicts.get(&fullpath).copied().unwrap_or(OverrideMarker::None);
            let marker_incl = included_conflicts.get(&local_fullpath).copied().unwrap_or(OverrideMarker::None);
            match (marker_base, marker_incl) {
                (OverrideMarker::None, OverrideMarker::None) => {}
                (OverrideMarker::None, _) => {
                    tree.remove(base_fields[&fullpath]);
                    base_fields.insert(fullpath.clone(), field_id);
                    own_conflicts.insert(fullpath, marker_incl);
                }
                (_, OverrideMarker::None) => {
                    tree.remove(field_id);
                }
                (_, _) => {
                    log::debug!("override conflict on both sides of include for '{fullpath}'");
                    return Err(Error::new(
                        ErrorKind::Override,
                        file,
                        tree.line(field_id),
                        tree.column(field_id),
                        format!("'{fullpath}' specified more than once with override syntax"),
                    ));
                }
            }
        }
    }

    Ok((tree, own_conflicts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render_tree;

    struct MapLoader(HashMap<&'static str, &'static str>);

    impl IncludeLoader for MapLoader {
        fn read(&self, path: &str) -> std::io::Result<String> {
            self.0
                .get(path)
                .map(|s| s.to_string())
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, path))
        }
    }

    #[test]
    fn non_ascii_text_survives_splice_unchanged() {
        let loader = MapLoader(HashMap::from([("A.i", "# caf\u{e9}\n!include B.i\nname = '\u{e9}cole'"), ("B.i", "x = 1")]));
        let tree = resolve("A.i", &loader).unwrap();
        let field = tree.find_from_root("name").unwrap();
        assert_eq!(tree.value_string(field).as_deref(), Some("\u{e9}cole"));
        let x = tree.find_from_root("x").unwrap();
        assert_eq!(tree.value_string(x).as_deref(), Some("1"));
    }

    #[test]
    fn simple_include_splices_content() {
        let loader = MapLoader(HashMap::from([("A.i", "[top]\n!include B.i\n[]"), ("B.i", "x = 1")]));
        let tree = resolve("A.i", &loader).unwrap();
        let field = tree.find_from_root("top/x").unwrap();
        assert_eq!(tree.value_string(field).as_deref(), Some("1"));
    }

    #[test]
    fn missing_include_errors() {
        let loader = MapLoader(HashMap::from([("A.i", "!include missing.i")]));
        let err = resolve("A.i", &loader).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Include);
        assert!(err.message().contains("could not find 'missing.i'"));
    }

    #[test]
    fn circular_include_errors() {
        let loader = MapLoader(HashMap::from([("A.i", "!include B.i"), ("B.i", "!include A.i")]));
        let err = resolve("A.i", &loader).unwrap_err();
        assert!(
            err.message().ends_with("file include would create circular reference 'A.i'"),
            "got: {}",
            err.message()
        );
    }

    #[test]
    fn override_marker_keeps_base_value() {
        let loader = MapLoader(HashMap::from([("A.i", "[B] p := v_a !include B.i []"), ("B.i", "p = v_b")]));
        let tree = resolve("A.i", &loader).unwrap();
        let field = tree.find_from_root("B/p").unwrap();
        assert_eq!(tree.value_string(field).as_deref(), Some("v_a"));
    }

    #[test]
    fn no_marker_keeps_both_assignments() {
        let loader = MapLoader(HashMap::from([("A.i", "[B] p = v_a !include B.i []"), ("B.i", "p = v_b")]));
        let tree = resolve("A.i", &loader).unwrap();
        let out = render_tree(&tree, "  ", 0);
        assert_eq!(out.matches("p = ").count(), 2);
    }

    #[test]
    fn both_marked_is_an_error() {
        let loader = MapLoader(HashMap::from([("A.i", "[B] p := v_a !include B.i []"), ("B.i", "p := v_b")]));
        let err = resolve("A.i", &loader).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Override);
        assert!(err.message().contains("specified more than once with override syntax"));
    }
}
