//! `hit merge -output <file> <file...>`: folds every input file into one
//! document, later files overlaying earlier ones, and writes the result.

use std::fs;

use hit::{merge, Tree};

use crate::pipeline::load_tree;

pub fn run(output: &str, files: &[String]) -> anyhow::Result<()> {
    let mut result = Tree::new();
    for file in files {
        let tree = load_tree(file)?;
        merge(&tree, &mut result);
    }
    fs::write(output, hit::render_tree(&result, "  ", 0))?;
    Ok(())
}
