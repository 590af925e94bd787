//! Pattern-driven rewrite engine: matches a `[Match]` subtree (with
//! `<name>` placeholders) against the document, deletes what matched, and
//! merges in a `[Replace]` subtree with placeholders substituted.

use std::collections::HashMap;

use crate::error::{Error, ErrorKind};
use crate::tree::{decode_value, NodeId, NodeKind, Tree};
use crate::transform::merge;

type Bindings = HashMap<String, String>;

/// One compiled rule: `match_section`/`replace_section` are nodes living in
/// the (read-only, already-parsed-and-merged) rule-file tree.
#[derive(Debug)]
pub struct Rule {
    pub name: String,
    match_section: NodeId,
    replace_section: NodeId,
}

/// `pre<name>post` with at most one `<...>` per string. `Ok(None))` means
/// the string carries no placeholder and must match literally; `Err`
/// reports a malformed placeholder (mismatched or out-of-order `<`/`>`).
fn try_parse_placeholder(s: &str) -> Result<Option<(String, String, String)>, String> {
    let has_open = s.contains('<');
    let has_close = s.contains('>');
    if !has_open && !has_close {
        return Ok(None);
    }
    let open = s.find('<').ok_or_else(|| "malformed placeholder: '>' without '<'".to_string())?;
    if s[..open].contains('>') {
        return Err("malformed placeholder: closing '>' before opening '<'".to_string());
    }
    let close_rel = s[open + 1..].find('>').ok_or_else(|| "malformed placeholder: missing closing '>'".to_string())?;
    let close = open + 1 + close_rel;
    if close == open + 1 {
        return Err("malformed placeholder: empty name".to_string());
    }
    let rest = &s[close + 1..];
    if rest.contains('<') || rest.contains('>') {
        return Err("malformed placeholder: more than one placeholder".to_string());
    }
    Ok(Some((s[..open].to_string(), s[open + 1..close].to_string(), rest.to_string())))
}

/// Checks `value` against `prefix<name>suffix`, binding `name` to the
/// captured middle section. A symbol already bound must agree with the new
/// capture.
fn bind_try(prefix: &str, name: &str, suffix: &str, value: &str, bindings: &Bindings) -> Option<Bindings> {
    let rest = value.strip_prefix(prefix)?;
    let captured = rest.strip_suffix(suffix)?;
    if let Some(existing) = bindings.get(name) {
        if existing != captured {
            return None;
        }
        return Some(bindings.clone());
    }
    let mut b = bindings.clone();
    b.insert(name.to_string(), captured.to_string());
    Some(b)
}

/// Tentatively matches `rule_section`'s children against `input_section`'s,
/// returning the committed bindings and the list of input nodes to delete
/// (children before their own enclosing section, so a straightforward
/// left-to-right deletion pass naturally respects "sections only if
/// childless after deletions"). Returns `None` on any sub-failure without
/// touching the caller's state -- this is the "tentative state, commit
/// only on full success" transactional shape expressed as an
/// option-returning function rather than in/out parameters.
fn match_section(
    rules: &Tree,
    rule_section: NodeId,
    input: &Tree,
    input_section: NodeId,
    bindings: &Bindings,
) -> Option<(Bindings, Vec<NodeId>)> {
    let mut bindings = bindings.clone();
    let mut deletes = Vec::new();

    for rule_sub in rules.section_children(rule_section) {
        let rule_path = rules.local_path(rule_sub).unwrap_or_default();
        match try_parse_placeholder(rule_path).ok()? {
            Some((prefix, name, suffix)) => {
                let mut hit = None;
                for cand in input.section_children(input_section) {
                    let cand_name = input.local_path(cand).unwrap_or_default();
                    let Some(trial) = bind_try(&prefix, &name, &suffix, cand_name, &bindings) else { continue };
                    if let Some((b, mut d)) = match_section(rules, rule_sub, input, cand, &trial) {
                        d.push(cand);
                        hit = Some((b, d));
                        break;
                    }
                }
                let (b, d) = hit?;
                bindings = b;
                deletes.extend(d);
            }
            None => {
                let cand = input.section_children(input_section).find(|&c| input.local_path(c) == Some(rule_path))?;
                let (b, mut d) = match_section(rules, rule_sub, input, cand, &bindings)?;
                d.push(cand);
                bindings = b;
                deletes.extend(d);
            }
        }
    }

    for rule_field in rules.field_children(rule_section) {
        let name = rules.local_path(rule_field).unwrap_or_default();
        let cand = input.field_children(input_section).find(|&c| input.local_path(c) == Some(name))?;
        let rule_value = rules.param_string(rule_field);
        let cand_value = input.param_string(cand);
        match try_parse_placeholder(&rule_value).ok()? {
            Some((prefix, pname, suffix)) => {
                bindings = bind_try(&prefix, &pname, &suffix, &cand_value, &bindings)?;
            }
            None => {
                if rule_value != cand_value {
                    return None;
                }
            }
        }
        deletes.push(cand);
    }

    Some((bindings, deletes))
}

fn err_at(tree: &Tree, id: NodeId, msg: String) -> Error {
    Error::new(ErrorKind::Brace, tree.file(id), tree.line(id), tree.column(id), msg)
}

fn semantic_err_at(tree: &Tree, id: NodeId, msg: String) -> Error {
    Error::new(ErrorKind::Semantic, tree.file(id), tree.line(id), tree.column(id), msg)
}

fn validate_placeholders(tree: &Tree, id: NodeId) -> Result<(), Error> {
    match tree.kind(id) {
        NodeKind::Section { path, .. } => {
            try_parse_placeholder(path).map_err(|m| err_at(tree, id, m))?;
        }
        NodeKind::Field { name, raw_value, .. } => {
            try_parse_placeholder(name).map_err(|m| err_at(tree, id, m))?;
            try_parse_placeholder(&decode_value(raw_value)).map_err(|m| err_at(tree, id, m))?;
        }
        _ => {}
    }
    for &c in tree.children(id) {
        validate_placeholders(tree, c)?;
    }
    Ok(())
}

fn substitute_str(pattern: &str, bindings: &Bindings, tree: &Tree, id: NodeId) -> Result<String, Error> {
    match try_parse_placeholder(pattern).map_err(|m| err_at(tree, id, m))? {
        Some((prefix, name, suffix)) => {
            let value = bindings
                .get(&name)
                .ok_or_else(|| err_at(tree, id, format!("unbound placeholder '<{name}>' in rewrite replacement")))?;
            Ok(format!("{prefix}{value}{suffix}"))
        }
        None => Ok(pattern.to_string()),
    }
}

fn build_replacement(rules: &Tree, id: NodeId, bindings: &Bindings, dest: &mut Tree) -> Result<NodeId, Error> {
    let kind = match rules.kind(id) {
        NodeKind::Section { path, open_marker, close_marker } => NodeKind::Section {
            path: substitute_str(path, bindings, rules, id)?,
            open_marker: open_marker.clone(),
            close_marker: close_marker.clone(),
        },
        NodeKind::Field { name, raw_value, kind } => NodeKind::Field {
            name: substitute_str(name, bindings, rules, id)?,
            raw_value: substitute_str(raw_value, bindings, rules, id)?,
            kind: *kind,
        },
        other => other.clone(),
    };
    let new_id = dest.alloc(kind, rules.file(id), rules.line(id), rules.column(id));
    for &c in rules.children(id) {
        let nc = build_replacement(rules, c, bindings, dest)?;
        dest.append_child(new_id, nc);
    }
    Ok(new_id)
}

fn build_replacement_tree(rules: &Tree, replace_section: NodeId, bindings: &Bindings) -> Result<Tree, Error> {
    let mut dest = Tree::new();
    let root = dest.root();
    for &c in rules.children(replace_section) {
        let nc = build_replacement(rules, c, bindings, &mut dest)?;
        dest.append_child(root, nc);
    }
    Ok(dest)
}

/// Reads every `[ReplacementRules][rule_i][Match]...[Replace]...` entry
/// out of an already-parsed (and, for multiple rule files, already
/// `merge`d) rule tree.
pub fn load_rules(rules_tree: &Tree) -> Result<Vec<Rule>, Error> {
    let Some(root) = rules_tree.find_from_root("ReplacementRules") else {
        return Ok(Vec::new());
    };
    let mut rules = Vec::new();
    for rule_id in rules_tree.section_children(root) {
        let name = rules_tree.local_path(rule_id).unwrap_or_default().to_string();
        let find_sub = |want: &str| {
            rules_tree
                .section_children(rule_id)
                .find(|&c| rules_tree.local_path(c) == Some(want))
                .ok_or_else(|| semantic_err_at(rules_tree, rule_id, format!("rule '{name}' missing [{want}] section")))
        };
        let match_section = find_sub("Match")?;
        let replace_section = find_sub("Replace")?;
        validate_placeholders(rules_tree, match_section)?;
        validate_placeholders(rules_tree, replace_section)?;
        rules.push(Rule { name, match_section, replace_section });
    }
    Ok(rules)
}

/// Runs `rule` against `tree` a single time: finds one match (if any),
/// deletes the matched nodes, and merges the substituted `Replace`
/// content in. Returns whether a match was found and applied.
pub fn apply_once(tree: &mut Tree, rules_tree: &Tree, rule: &Rule) -> Result<bool, Error> {
    let Some((bindings, delete_list)) = match_section(rules_tree, rule.match_section, tree, tree.root(), &Bindings::new())
    else {
        return Ok(false);
    };
    for id in delete_list {
        if tree.kind(id).is_field() {
            tree.remove(id);
        } else if tree.kind(id).is_section() && tree.children(id).is_empty() {
            tree.remove(id);
        }
    }
    let replacement = build_replacement_tree(rules_tree, rule.replace_section, &bindings)?;
    merge(&replacement, tree);
    Ok(true)
}

/// Applies every rule to a fixpoint: each rule is re-applied until it no
/// longer matches, then the next rule runs, and the whole set repeats
/// until a full pass makes no change. A rule whose `Match` placeholder has
/// no anchoring prefix/suffix can match its own freshly substituted output
/// forever -- this driver does not guard against that; well-formed
/// rulesets anchor their placeholders.
pub fn apply_rules(tree: &mut Tree, rules_tree: &Tree, rules: &[Rule]) -> Result<usize, Error> {
    let mut total = 0;
    loop {
        let mut changed = false;
        for rule in rules {
            while apply_once(tree, rules_tree, rule)? {
                changed = true;
                total += 1;
            }
        }
        if !changed {
            break;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::render::render_tree;

    #[test]
    fn simple_placeholder_rewrite() {
        let mut tree = parse("t", "a = hello").unwrap().tree;
        let rules_tree = parse("rules", "[ReplacementRules] [r1] [Match] a = <v> [] [Replace] a = new_<v> [] [] []")
            .unwrap()
            .tree;
        let rules = load_rules(&rules_tree).unwrap();
        assert!(apply_once(&mut tree, &rules_tree, &rules[0]).unwrap());
        assert_eq!(render_tree(&tree, "  ", 0), "a = new_hello");
    }

    #[test]
    fn no_match_leaves_tree_untouched() {
        let mut tree = parse("t", "b = hello").unwrap().tree;
        let rules_tree = parse("rules", "[ReplacementRules] [r1] [Match] a = <v> [] [Replace] a = new_<v> [] [] []")
            .unwrap()
            .tree;
        let rules = load_rules(&rules_tree).unwrap();
        assert!(!apply_once(&mut tree, &rules_tree, &rules[0]).unwrap());
        assert_eq!(render_tree(&tree, "  ", 0), "b = hello");
    }

    #[test]
    fn section_placeholder_rewrite_deletes_emptied_section() {
        let mut tree = parse("t", "[block_foo] x = 1 []").unwrap().tree;
        let rules_tree = parse(
            "rules",
            "[ReplacementRules] [r1] [Match] [block_<n>] x = 1 [] [] [Replace] [done_<n>] y = 2 [] [] [] []",
        )
        .unwrap()
        .tree;
        let rules = load_rules(&rules_tree).unwrap();
        assert!(apply_once(&mut tree, &rules_tree, &rules[0]).unwrap());
        let y = tree.find_from_root("done_foo/y").unwrap();
        assert_eq!(tree.value_string(y).as_deref(), Some("2"));
        assert!(tree.find_from_root("block_foo").is_none());
    }

    #[test]
    fn malformed_placeholder_is_rejected() {
        let rules_tree = parse("rules", "[ReplacementRules] [r1] [Match] a = '>v<' [] [Replace] a = x [] [] []").unwrap().tree;
        let err = load_rules(&rules_tree).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Brace);
    }
}
