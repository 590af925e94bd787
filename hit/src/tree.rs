//! The document tree: an arena of nodes addressed by integer handles.
//!
//! Per the node-tree design note, the tree owns a flat `Vec` of node slots;
//! `NodeId` is an index into it. Parent/child links are stored as handles
//! rather than through an inheritance hierarchy or reference-counted
//! pointers, which keeps `remove`/`clone` free of lifetime entanglement.
//! Node kinds are a tagged sum (`NodeKind`) with per-variant fields, and
//! functions like `render` dispatch on the tag instead of virtual calls.

use crate::error::{Error, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    None,
    Bool,
    Int,
    Float,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Section {
        path: String,
        open_marker: String,
        close_marker: String,
    },
    Field {
        name: String,
        raw_value: String,
        kind: FieldKind,
    },
    Comment {
        text: String,
        is_inline: bool,
    },
    Blank,
}

impl NodeKind {
    pub fn is_section(&self) -> bool {
        matches!(self, NodeKind::Section { .. })
    }
    pub fn is_field(&self) -> bool {
        matches!(self, NodeKind::Field { .. })
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    file: String,
    line: u32,
    column: u32,
    override_path: Option<String>,
}

/// A forest rooted at a single implicit `Root` node. Every non-root node
/// has exactly one owning parent; removing a node removes its entire
/// subtree, and cloning produces a fully independent subtree.
#[derive(Debug, Clone)]
pub struct Tree {
    arena: Vec<Option<NodeData>>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        let root_data = NodeData {
            kind: NodeKind::Root,
            parent: None,
            children: Vec::new(),
            file: String::new(),
            line: 1,
            column: 1,
            override_path: None,
        };
        Tree {
            arena: vec![Some(root_data)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn data(&self, id: NodeId) -> &NodeData {
        self.arena[id.0 as usize].as_ref().expect("use of removed node")
    }

    fn data_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.arena[id.0 as usize].as_mut().expect("use of removed node")
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.data(id).kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.data_mut(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.data(id).children
    }

    pub fn file(&self, id: NodeId) -> &str {
        &self.data(id).file
    }

    pub fn line(&self, id: NodeId) -> u32 {
        self.data(id).line
    }

    pub fn column(&self, id: NodeId) -> u32 {
        self.data(id).column
    }

    pub fn override_path(&self, id: NodeId) -> Option<&str> {
        self.data(id).override_path.as_deref()
    }

    pub fn set_override_path(&mut self, id: NodeId, path: Option<String>) {
        self.data_mut(id).override_path = path;
    }

    pub fn alloc(&mut self, kind: NodeKind, file: impl Into<String>, line: u32, column: u32) -> NodeId {
        self.arena.push(Some(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            file: file.into(),
            line,
            column,
            override_path: None,
        }));
        NodeId((self.arena.len() - 1) as u32)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.data_mut(child).parent = Some(parent);
        self.data_mut(parent).children.push(child);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.data_mut(child).parent = Some(parent);
        self.data_mut(parent).children.insert(index, child);
    }

    /// Removes `child` from `parent`'s child list without freeing its
    /// subtree, leaving it detached (no parent) so it can be reattached
    /// elsewhere. Used by `explode` to relocate a node into newly
    /// synthesized nesting.
    pub fn detach(&mut self, parent: NodeId, child: NodeId) {
        let siblings = &mut self.data_mut(parent).children;
        if let Some(pos) = siblings.iter().position(|&c| c == child) {
            siblings.remove(pos);
        }
        self.data_mut(child).parent = None;
    }

    /// Deep-copies `id` from this tree into `dest`, returning the new,
    /// detached root of the copy. Used by cross-tree transforms (`merge`)
    /// that must move nodes between independently owned trees.
    pub fn copy_into(&self, id: NodeId, dest: &mut Tree) -> NodeId {
        let data = self.data(id);
        let new_id = dest.alloc(data.kind.clone(), data.file.clone(), data.line, data.column);
        dest.set_override_path(new_id, data.override_path.clone());
        for &c in &data.children {
            let nc = self.copy_into(c, dest);
            dest.append_child(new_id, nc);
        }
        new_id
    }

    /// Detaches `id` from its parent's child list and frees its entire
    /// subtree. Child-list order of the remaining siblings is preserved --
    /// tree operations (merge, the formatter's sort groups) depend on
    /// relative document order surviving a removal.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.data(id).parent {
            let siblings = &mut self.data_mut(parent).children;
            if let Some(pos) = siblings.iter().position(|&c| c == id) {
                siblings.remove(pos);
            }
        }
        self.free_subtree(id);
    }

    fn free_subtree(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.data_mut(id).children);
        for c in children {
            self.free_subtree(c);
        }
        self.arena[id.0 as usize] = None;
    }

    pub fn local_path(&self, id: NodeId) -> Option<&str> {
        match &self.data(id).kind {
            NodeKind::Section { path, .. } => Some(path.as_str()),
            NodeKind::Field { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    /// `/`-joined sequence of local paths from the root to `id`. The
    /// root-level anonymous-wrapper sentinel path `-` never contributes a
    /// segment.
    pub fn fullpath(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            if c == self.root {
                break;
            }
            if let Some(p) = self.local_path(c) {
                if !p.is_empty() && p != "-" {
                    parts.push(p.to_string());
                }
            }
            cur = self.data(c).parent;
        }
        parts.reverse();
        parts.join("/")
    }

    /// Breadth-first union lookup: tokenizes `path` on `/`, skipping
    /// empties, and at each step descends to *every* child whose local
    /// path matches the segment (not just the first). This mirrors the
    /// observed behavior of the original implementation rather than a
    /// cleaner depth-first-first-match alternative -- when several
    /// children share a local path (legal before `explode`/after a merge),
    /// this can surface a deeper hit than a naive reading would expect.
    /// Preserve it rather than "fixing" it.
    pub fn find(&self, start: NodeId, path: &str) -> Option<NodeId> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            return Some(start);
        }
        let mut candidates = vec![start];
        for seg in segments {
            let mut next = Vec::new();
            for &cand in &candidates {
                for &child in self.children(cand) {
                    if self.local_path(child) == Some(seg) {
                        next.push(child);
                    }
                }
            }
            if next.is_empty() {
                return None;
            }
            candidates = next;
        }
        candidates.into_iter().next()
    }

    pub fn find_from_root(&self, path: &str) -> Option<NodeId> {
        self.find(self.root, path)
    }

    /// Decoded string value of the field at `path`, for the `replace`
    /// brace evaluator and other by-path value lookups.
    pub fn find_value(&self, path: &str) -> Option<String> {
        let id = self.find_from_root(path)?;
        match &self.data(id).kind {
            NodeKind::Field { raw_value, .. } => Some(decode_value(raw_value)),
            _ => None,
        }
    }

    pub fn raw_value(&self, id: NodeId) -> Option<&str> {
        match &self.data(id).kind {
            NodeKind::Field { raw_value, .. } => Some(raw_value.as_str()),
            _ => None,
        }
    }

    pub fn field_kind(&self, id: NodeId) -> Option<FieldKind> {
        match &self.data(id).kind {
            NodeKind::Field { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn value_string(&self, id: NodeId) -> Option<String> {
        self.raw_value(id).map(decode_value)
    }

    pub fn set_value(&mut self, id: NodeId, raw_value: String, kind: FieldKind) {
        if let NodeKind::Field { raw_value: rv, kind: k, .. } = self.kind_mut(id) {
            *rv = raw_value;
            *k = kind;
        }
    }

    /// On-demand typed conversion, raised only at query time per the error
    /// handling policy -- a field can hold a textual value that never
    /// parses as the type being asked for.
    pub fn param_bool(&self, id: NodeId) -> Result<bool, Error> {
        let raw = self.raw_value(id).unwrap_or_default();
        let v = decode_value(raw).trim().to_lowercase();
        match v.as_str() {
            "true" | "yes" | "on" => Ok(true),
            "false" | "no" | "off" => Ok(false),
            _ => Err(self.type_error(id, &format!("'{v}' is not a valid boolean value"))),
        }
    }

    pub fn param_int(&self, id: NodeId) -> Result<i64, Error> {
        let raw = decode_value(self.raw_value(id).unwrap_or_default());
        raw.parse::<i64>()
            .map_err(|_| self.type_error(id, &format!("'{raw}' is not a valid integer value")))
    }

    pub fn param_float(&self, id: NodeId) -> Result<f64, Error> {
        let raw = decode_value(self.raw_value(id).unwrap_or_default());
        raw.parse::<f64>()
            .map_err(|_| self.type_error(id, &format!("'{raw}' is not a valid floating point value")))
    }

    pub fn param_string(&self, id: NodeId) -> String {
        decode_value(self.raw_value(id).unwrap_or_default())
    }

    fn type_error(&self, id: NodeId, msg: &str) -> Error {
        Error::new(ErrorKind::TypeConversion, self.file(id), self.line(id), self.column(id), msg)
    }

    /// Deep copy of `id`'s subtree. When `absolute_path` is set, the new
    /// top node's `override_path` is fixed to the node's fullpath in the
    /// source tree, so rendering emits e.g. `foo/bar/baz = 42` instead of
    /// just `baz = 42`.
    pub fn clone_subtree(&mut self, id: NodeId, absolute_path: bool) -> NodeId {
        let full = absolute_path.then(|| self.fullpath(id));
        let new_id = self.clone_subtree_inner(id);
        if let Some(f) = full {
            self.set_override_path(new_id, Some(f));
        }
        new_id
    }

    fn clone_subtree_inner(&mut self, id: NodeId) -> NodeId {
        let data = self.data(id).clone();
        let new_id = self.alloc(data.kind, data.file, data.line, data.column);
        self.set_override_path(new_id, data.override_path);
        for c in data.children {
            let nc = self.clone_subtree_inner(c);
            self.append_child(new_id, nc);
        }
        new_id
    }

    pub fn section_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).iter().copied().filter(|&c| self.kind(c).is_section())
    }

    pub fn field_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).iter().copied().filter(|&c| self.kind(c).is_field())
    }
}

/// Strips the textual value down to its semantic content: quote
/// characters are removed and `\<quote>` escapes are resolved, matching
/// the lexer's own quote handling. Used both by the typed `param_*`
/// accessors and the `replace` brace evaluator.
pub fn decode_value(raw: &str) -> String {
    let bytes = raw.as_bytes();
    if bytes.is_empty() {
        return String::new();
    }
    if bytes[0] == b'\'' || bytes[0] == b'"' {
        let quote = bytes[0];
        let mut out = String::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] != quote {
                i += 1;
                continue;
            }
            i += 1; // opening quote
            let start = i;
            while i < bytes.len() && !(bytes[i] == quote && (i == start || bytes[i - 1] != b'\\')) {
                i += 1;
            }
            let inner = &raw[start..i.min(raw.len())];
            out.push_str(&inner.replace(&format!("\\{}", quote as char), &(quote as char).to_string()));
            i += 1; // closing quote
        }
        out
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_strips_single_quotes() {
        assert_eq!(decode_value("'hello'"), "hello");
    }

    #[test]
    fn decode_concatenates_consecutive_literals() {
        assert_eq!(decode_value("'bar''baz'"), "barbaz");
    }

    #[test]
    fn decode_handles_escaped_quote() {
        assert_eq!(decode_value("\"a\\\"b\""), "a\"b");
    }

    #[test]
    fn decode_unquoted_passthrough() {
        assert_eq!(decode_value("42"), "42");
    }

    #[test]
    fn clone_is_isolated_from_original() {
        let mut tree = Tree::new();
        let root = tree.root();
        let section = tree.alloc(
            NodeKind::Section { path: "a".into(), open_marker: "".into(), close_marker: "[]".into() },
            "t",
            1,
            1,
        );
        tree.append_child(root, section);
        let field = tree.alloc(
            NodeKind::Field { name: "x".into(), raw_value: "1".into(), kind: FieldKind::Int },
            "t",
            1,
            1,
        );
        tree.append_child(section, field);

        let clone = tree.clone_subtree(section, false);
        if let NodeKind::Field { raw_value, .. } = tree.kind_mut(tree.children(clone)[0]) {
            *raw_value = "2".into();
        }
        assert_eq!(tree.raw_value(field), Some("1"));
    }

    #[test]
    fn find_is_breadth_first_union() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a1 = tree.alloc(NodeKind::Section { path: "a".into(), open_marker: "".into(), close_marker: "[]".into() }, "t", 1, 1);
        let a2 = tree.alloc(NodeKind::Section { path: "a".into(), open_marker: "".into(), close_marker: "[]".into() }, "t", 1, 1);
        tree.append_child(root, a1);
        tree.append_child(root, a2);
        let f = tree.alloc(NodeKind::Field { name: "x".into(), raw_value: "1".into(), kind: FieldKind::Int }, "t", 1, 1);
        tree.append_child(a2, f);
        assert_eq!(tree.find(root, "a/x"), Some(f));
    }
}
