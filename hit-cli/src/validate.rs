//! `hit validate <file...>`: structural check (the file parses and its
//! includes resolve) plus duplicate-parameter detection.

use std::collections::HashMap;

use hit::{NodeId, Tree};

use crate::pipeline::load_tree;

fn collect_fullpaths(tree: &Tree, id: NodeId, counts: &mut HashMap<String, usize>) {
    if tree.kind(id).is_field() {
        *counts.entry(tree.fullpath(id)).or_insert(0) += 1;
    }
    for &c in tree.children(id) {
        collect_fullpaths(tree, c, counts);
    }
}

pub fn run(files: &[String]) -> anyhow::Result<bool> {
    let mut ok = true;
    for file in files {
        match load_tree(file) {
            Ok(tree) => {
                let mut counts = HashMap::new();
                collect_fullpaths(&tree, tree.root(), &mut counts);
                let mut dups: Vec<_> = counts.into_iter().filter(|&(_, n)| n > 1).collect();
                dups.sort();
                for (path, count) in dups {
                    ok = false;
                    eprintln!("{file}: duplicate parameter '{path}' ({count} occurrences)");
                }
            }
            Err(e) => {
                ok = false;
                eprintln!("{file}: {e}");
            }
        }
    }
    Ok(ok)
}
