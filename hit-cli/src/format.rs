//! `hit format [-i] [-style <file>] <file...>`: reformat to stdout, or
//! rewrite each file in place.

use std::fs;

use hit::Formatter;

use crate::pipeline::load_tree;

pub fn run(in_place: bool, style_file: Option<&str>, files: &[String]) -> anyhow::Result<bool> {
    let style_text = match style_file {
        Some(path) => fs::read_to_string(path)?,
        None => String::new(),
    };
    let formatter = Formatter::from_style(style_file.unwrap_or("<default style>"), &style_text)?;

    let mut ok = true;
    for file in files {
        match load_tree(file) {
            Ok(mut tree) => {
                formatter.apply(&mut tree);
                let out = hit::render_tree(&tree, &formatter.indent_string, formatter.line_length);
                if in_place {
                    fs::write(file, out)?;
                } else {
                    println!("{out}");
                }
            }
            Err(e) => {
                log::error!("{file}: {e}");
                ok = false;
            }
        }
    }
    Ok(ok)
}
