//! `hit find <pattern> <file...>`: searches parameters by name and
//! optionally by value, both given as glob patterns (`*`, `?`).

use std::collections::HashSet;

use regex::Regex;

use hit::{NodeId, Tree};

use crate::pipeline::load_tree;

pub struct FindArgs<'a> {
    pub pattern: &'a str,
    pub files: &'a [String],
    pub filenames_only: bool,
    pub case_insensitive: bool,
    pub invert: bool,
    pub parent_patterns: &'a [String],
}

fn glob_to_regex(pattern: &str, case_insensitive: bool) -> anyhow::Result<Regex> {
    let mut re = String::from("^");
    if case_insensitive {
        re.push_str("(?i)");
    }
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '\\' | '.' | '+' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' => {
                re.push('\\');
                re.push(c);
            }
            c => re.push(c),
        }
    }
    re.push('$');
    Ok(Regex::new(&re)?)
}

fn collect_fields(tree: &Tree, id: NodeId, out: &mut Vec<NodeId>) {
    if tree.kind(id).is_field() {
        out.push(id);
    }
    for &c in tree.children(id) {
        collect_fields(tree, c, out);
    }
}

fn ancestor_fullpaths(tree: &Tree, id: NodeId) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur = tree.parent(id);
    while let Some(p) = cur {
        if p == tree.root() {
            break;
        }
        out.push(tree.fullpath(p));
        cur = tree.parent(p);
    }
    out
}

/// Returns whether at least one parameter matched, across all files --
/// the caller uses this to decide the zero-matches exit code.
pub fn run(args: FindArgs) -> anyhow::Result<bool> {
    let (param_pat, value_pat) = match args.pattern.split_once('=') {
        Some((p, v)) => (p, Some(v)),
        None => (args.pattern, None),
    };
    let param_re = glob_to_regex(param_pat, args.case_insensitive)?;
    let value_re = value_pat.map(|v| glob_to_regex(v, args.case_insensitive)).transpose()?;
    let parent_res = args
        .parent_patterns
        .iter()
        .map(|p| glob_to_regex(p, args.case_insensitive))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut any_match = false;
    let mut printed_files = HashSet::new();
    for file in args.files {
        let tree = load_tree(file)?;
        let mut fields = Vec::new();
        collect_fields(&tree, tree.root(), &mut fields);
        for field in fields {
            let fullpath = tree.fullpath(field);
            let value = tree.param_string(field);
            let mut is_match = param_re.is_match(&fullpath) && value_re.as_ref().map_or(true, |re| re.is_match(&value));
            if is_match && !parent_res.is_empty() {
                let ancestors = ancestor_fullpaths(&tree, field);
                is_match = parent_res.iter().all(|re| ancestors.iter().any(|a| re.is_match(a)));
            }
            if args.invert {
                is_match = !is_match;
            }
            if !is_match {
                continue;
            }
            any_match = true;
            if args.filenames_only {
                if printed_files.insert(file.clone()) {
                    println!("{file}");
                }
            } else {
                println!("{file}:{fullpath} = {value}");
            }
        }
    }
    Ok(any_match)
}
