//! Shared file-loading pipeline: every subcommand reads a file through the
//! same include-resolve -> merge-blocks -> explode sequence, so `find`,
//! `diff` and friends all see the same fully flattened document regardless
//! of how its source used `!include` or path-like names.

use std::collections::BTreeMap;

use hit::{explode, merge_blocks, resolve_includes, FsLoader, NodeId, Tree};

pub fn load_tree(path: &str) -> anyhow::Result<Tree> {
    let mut tree = resolve_includes(path, &FsLoader)?;
    merge_blocks(&mut tree);
    explode(&mut tree);
    Ok(tree)
}

/// Fullpath -> decoded value, for the comparison-oriented subcommands
/// (`diff`, `common`, `subtract`) that only care about flat parameter
/// identity, not document structure.
pub fn flatten(tree: &Tree) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    collect(tree, tree.root(), &mut out);
    out
}

fn collect(tree: &Tree, id: NodeId, out: &mut BTreeMap<String, String>) {
    if tree.kind(id).is_field() {
        out.insert(tree.fullpath(id), tree.param_string(id));
    }
    for &c in tree.children(id) {
        collect(tree, c, out);
    }
}
