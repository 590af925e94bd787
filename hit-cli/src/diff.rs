//! `hit diff [left] [right]` (or `-left <files> -right <files>`): compares
//! two merged parameter sets and reports additions, removals and changed
//! values.

use hit::{merge, Tree};

use crate::pipeline::{flatten, load_tree};

pub struct DiffArgs<'a> {
    pub left: &'a [String],
    pub right: &'a [String],
    pub verbose: bool,
    pub show_common: bool,
    pub color: bool,
}

fn merged_tree(files: &[String]) -> anyhow::Result<Tree> {
    let mut result = Tree::new();
    for file in files {
        let tree = load_tree(file)?;
        merge(&tree, &mut result);
    }
    Ok(result)
}

fn print_removed(key: &str, value: &str, color: bool) {
    if color {
        println!("\x1b[31m- {key} = {value}\x1b[0m");
    } else {
        println!("- {key} = {value}");
    }
}

fn print_added(key: &str, value: &str, color: bool) {
    if color {
        println!("\x1b[32m+ {key} = {value}\x1b[0m");
    } else {
        println!("+ {key} = {value}");
    }
}

pub fn run(args: DiffArgs) -> anyhow::Result<()> {
    let left = flatten(&merged_tree(args.left)?);
    let right = flatten(&merged_tree(args.right)?);

    let mut keys: Vec<&String> = left.keys().chain(right.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        match (left.get(key), right.get(key)) {
            (Some(l), Some(r)) if l == r => {
                if args.show_common {
                    println!("  {key} = {l}");
                }
            }
            (Some(l), Some(r)) => {
                print_removed(key, l, args.color);
                print_added(key, r, args.color);
                if args.verbose {
                    println!("    ({key} changed)");
                }
            }
            (Some(l), None) => print_removed(key, l, args.color),
            (None, Some(r)) => print_added(key, r, args.color),
            (None, None) => unreachable!(),
        }
    }
    Ok(())
}
