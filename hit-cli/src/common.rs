//! `hit common <file...>`: prints the parameters shared, with identical
//! values, across every given file.

use crate::pipeline::{flatten, load_tree};

pub fn run(files: &[String]) -> anyhow::Result<()> {
    let mut maps = Vec::new();
    for file in files {
        maps.push(flatten(&load_tree(file)?));
    }
    let Some(first) = maps.first() else {
        return Ok(());
    };
    for (key, value) in first {
        if maps[1..].iter().all(|m| m.get(key) == Some(value)) {
            println!("{key} = {value}");
        }
    }
    Ok(())
}
