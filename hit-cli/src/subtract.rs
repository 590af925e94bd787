//! `hit subtract <base> <remove>`: prints `base`'s parameters, dropping any
//! whose name and value both also appear in `remove`.

use crate::pipeline::{flatten, load_tree};

pub fn run(base: &str, remove: &str) -> anyhow::Result<()> {
    let base_map = flatten(&load_tree(base)?);
    let remove_map = flatten(&load_tree(remove)?);
    for (key, value) in &base_map {
        if remove_map.get(key) != Some(value) {
            println!("{key} = {value}");
        }
    }
    Ok(())
}
