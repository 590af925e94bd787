//! Recursive-descent parser: token stream to document tree.

use std::collections::HashMap;

use crate::error::{Error, ErrorKind};
use crate::lex::{tokenize, TokKind, Token};
use crate::tree::{FieldKind, NodeId, NodeKind, Tree};

/// Which side of an include boundary a field's assignment marks as
/// authoritative. Not part of the committed [`Tree`] data model -- by the
/// time a tree is rendered, conflicts have already been resolved by the
/// include/override pass and the marker has served its purpose. Kept as a
/// side table returned alongside a single file's parse for the include
/// resolver to consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideMarker {
    None,
    /// `name := value` -- the declaring (included) side wins.
    Declaring,
    /// `name :override= value` -- the including (base) side wins.
    Including,
}

#[derive(Debug)]
pub struct Parsed {
    pub tree: Tree,
    pub overrides: HashMap<NodeId, OverrideMarker>,
}

fn err_at(tok: &Token, kind: ErrorKind, msg: impl Into<String>) -> Error {
    Error::new(kind, tok.file.clone(), tok.line, tok.column, msg)
}

/// The `:=`/`:override=` markers ride along on the identifier token itself,
/// since `:` is part of the identifier character class and the lexer has
/// no separate token kind for them.
/// `true`/`false`/`yes`/`no`/`on`/`off`, case-insensitive, trimmed -- the
/// literal set `toBool` recognizes in the original grammar. A bare
/// identifier value matching one of these is a `Bool` field; anything else
/// unquoted is plain `String`.
fn is_bool_literal(s: &str) -> bool {
    matches!(s.trim().to_lowercase().as_str(), "true" | "false" | "yes" | "no" | "on" | "off")
}

fn split_override(ident: &str) -> (String, OverrideMarker) {
    if let Some(stripped) = ident.strip_suffix(":override") {
        (stripped.to_string(), OverrideMarker::Including)
    } else if let Some(stripped) = ident.strip_suffix(':') {
        (stripped.to_string(), OverrideMarker::Declaring)
    } else {
        (ident.to_string(), OverrideMarker::None)
    }
}

struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn lookahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn bump(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }
}

/// Parses a single file's worth of tokens (no include resolution) into a
/// fresh [`Tree`]. Aborts and returns no tree on the first lex or parse
/// error, per the error propagation policy.
pub fn parse(file: &str, input: &str) -> Result<Parsed, Error> {
    log::trace!("parsing '{file}' ({} bytes)", input.len());
    let tokens = tokenize(file, input);
    if let Some(tok) = tokens.iter().find(|t| t.kind == TokKind::Error) {
        return Err(err_at(tok, ErrorKind::Lex, tok.text.clone()));
    }
    let mut tree = Tree::new();
    let mut overrides = HashMap::new();
    let root = tree.root();
    let mut cur = Cursor { tokens: &tokens, pos: 0 };
    let closer = parse_body(&mut cur, &mut tree, root, &mut overrides)?;
    if closer.is_some() {
        let tok = cur.peek().clone();
        return Err(err_at(&tok, ErrorKind::Parse, "unexpected section closer at top level"));
    }
    log::debug!("parsed '{file}': {} override marker(s)", overrides.len());
    Ok(Parsed { tree, overrides })
}

/// Consumes body items (fields, nested sections, comments, blanks) until
/// either end of input (root level) or a closer matching the current
/// section is found. Returns the closer's canonical marker text when one
/// was consumed.
fn parse_body(
    cur: &mut Cursor,
    tree: &mut Tree,
    parent: NodeId,
    overrides: &mut HashMap<NodeId, OverrideMarker>,
) -> Result<Option<String>, Error> {
    loop {
        let tok = cur.peek().clone();
        match tok.kind {
            TokKind::Eof => return Ok(None),
            TokKind::BlankLine => {
                let id = tree.alloc(NodeKind::Blank, tok.file.clone(), tok.line, tok.column);
                tree.append_child(parent, id);
                cur.bump();
            }
            TokKind::Comment => {
                let id = tree.alloc(
                    NodeKind::Comment { text: tok.text.clone(), is_inline: false },
                    tok.file.clone(),
                    tok.line,
                    tok.column,
                );
                tree.append_child(parent, id);
                cur.bump();
            }
            TokKind::InlineComment => {
                let id = tree.alloc(
                    NodeKind::Comment { text: tok.text.clone(), is_inline: true },
                    tok.file.clone(),
                    tok.line,
                    tok.column,
                );
                cur.bump();
                match tree.children(parent).last().copied() {
                    Some(last) => tree.append_child(last, id),
                    None => tree.append_child(parent, id),
                }
            }
            TokKind::Ident => {
                parse_field(cur, tree, parent, overrides)?;
            }
            TokKind::LeftBracket => {
                let path_tok = cur
                    .lookahead(1)
                    .cloned()
                    .ok_or_else(|| err_at(&tok, ErrorKind::Parse, "unterminated section"))?;
                let is_closer = parent != tree.root() && (path_tok.text.is_empty() || path_tok.text == "..");
                if is_closer {
                    cur.bump();
                    let path = cur.bump();
                    let rb = cur.peek().clone();
                    if rb.kind != TokKind::RightBracket {
                        return Err(err_at(&rb, ErrorKind::Parse, "expected ']' to close section"));
                    }
                    cur.bump();
                    let marker = if path.text.is_empty() { "[]".to_string() } else { "[../]".to_string() };
                    return Ok(Some(marker));
                }
                parse_section(cur, tree, parent, overrides)?;
            }
            TokKind::Error => return Err(err_at(&tok, ErrorKind::Lex, tok.text.clone())),
            other => {
                return Err(err_at(
                    &tok,
                    ErrorKind::Parse,
                    format!("unexpected {other:?} token '{}'", tok.text),
                ))
            }
        }
    }
}

fn parse_section(
    cur: &mut Cursor,
    tree: &mut Tree,
    parent: NodeId,
    overrides: &mut HashMap<NodeId, OverrideMarker>,
) -> Result<(), Error> {
    let lb = cur.bump();
    let path_tok = cur.peek().clone();
    if path_tok.kind != TokKind::Path {
        return Err(err_at(&path_tok, ErrorKind::Parse, "expected section path after '['"));
    }
    cur.bump();
    let rb = cur.peek().clone();
    if rb.kind != TokKind::RightBracket {
        return Err(err_at(&rb, ErrorKind::Parse, "expected ']'"));
    }
    cur.bump();

    let (open_marker, path) = match path_tok.text.strip_prefix("./") {
        Some(rest) => ("./".to_string(), rest.to_string()),
        None => (String::new(), path_tok.text.clone()),
    };
    if path.is_empty() {
        return Err(err_at(&path_tok, ErrorKind::Parse, "blank './' section name"));
    }

    let id = tree.alloc(
        NodeKind::Section { path, open_marker, close_marker: "[]".to_string() },
        lb.file.clone(),
        lb.line,
        lb.column,
    );
    tree.append_child(parent, id);

    match parse_body(cur, tree, id, overrides)? {
        Some(marker) => {
            if let NodeKind::Section { close_marker, .. } = tree.kind_mut(id) {
                *close_marker = marker;
            }
        }
        None => {
            let tok = cur.peek().clone();
            return Err(err_at(&tok, ErrorKind::Parse, "unterminated section"));
        }
    }
    Ok(())
}

fn parse_field(
    cur: &mut Cursor,
    tree: &mut Tree,
    parent: NodeId,
    overrides: &mut HashMap<NodeId, OverrideMarker>,
) -> Result<(), Error> {
    let name_tok = cur.bump();
    let eq = cur.peek().clone();
    if eq.kind != TokKind::Equals {
        return Err(err_at(
            &eq,
            ErrorKind::Parse,
            format!("missing '=' after identifier '{}'", name_tok.text),
        ));
    }
    cur.bump();

    let (name, marker) = split_override(&name_tok.text);
    let value_tok = cur.peek().clone();
    let (raw_value, kind) = match value_tok.kind {
        TokKind::Number => {
            cur.bump();
            let is_float = value_tok.text.contains(['.', 'e', 'E']);
            (value_tok.text, if is_float { FieldKind::Float } else { FieldKind::Int })
        }
        TokKind::String => {
            let mut raw = String::new();
            while cur.peek().kind == TokKind::String {
                raw.push_str(&cur.bump().text);
            }
            (raw, FieldKind::String)
        }
        TokKind::Ident | TokKind::Path => {
            cur.bump();
            let kind = if value_tok.kind == TokKind::Ident && is_bool_literal(&value_tok.text) {
                FieldKind::Bool
            } else {
                FieldKind::String
            };
            (value_tok.text, kind)
        }
        _ => return Err(err_at(&value_tok, ErrorKind::Parse, "missing value after '='")),
    };

    let id = tree.alloc(
        NodeKind::Field { name, raw_value, kind },
        name_tok.file.clone(),
        name_tok.line,
        name_tok.column,
    );
    if !matches!(marker, OverrideMarker::None) {
        overrides.insert(id, marker);
    }
    tree.append_child(parent, id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render_tree;

    #[test]
    fn basic_field_round_trips() {
        let parsed = parse("t", "[hello] foo=42 []").unwrap();
        assert_eq!(render_tree(&parsed.tree, "  ", 0), "[hello]\n  foo = 42\n[]");
        let field = parsed.tree.find_from_root("hello/foo").unwrap();
        assert_eq!(parsed.tree.field_kind(field), Some(FieldKind::Int));
        assert_eq!(parsed.tree.value_string(field).as_deref(), Some("42"));
    }

    #[test]
    fn consecutive_string_literals_concatenate() {
        let parsed = parse("t", "foo='bar''baz'").unwrap();
        let field = parsed.tree.find_from_root("foo").unwrap();
        assert_eq!(parsed.tree.value_string(field).as_deref(), Some("barbaz"));
        assert_eq!(parsed.tree.field_kind(field), Some(FieldKind::String));
    }

    #[test]
    fn inline_comment_round_trips() {
        let src = "[hello]\n  foo = '42'\n\n  # comment\n  bar = 'baz'\n[]";
        let parsed = parse("t", src).unwrap();
        assert_eq!(render_tree(&parsed.tree, "  ", 0), src);
    }

    #[test]
    fn override_marker_stripped_from_name() {
        let parsed = parse("t", "p := v").unwrap();
        let field = parsed.tree.find_from_root("p").unwrap();
        assert_eq!(parsed.tree.local_path(field), Some("p"));
        assert_eq!(parsed.overrides.get(&field), Some(&OverrideMarker::Declaring));
    }

    #[test]
    fn override_including_marker() {
        let parsed = parse("t", "p :override= v").unwrap();
        let field = parsed.tree.find_from_root("p").unwrap();
        assert_eq!(parsed.overrides.get(&field), Some(&OverrideMarker::Including));
    }

    #[test]
    fn bool_literal_is_recognized() {
        let parsed = parse("t", "a = true b = OFF c = maybe").unwrap();
        let a = parsed.tree.find_from_root("a").unwrap();
        let b = parsed.tree.find_from_root("b").unwrap();
        let c = parsed.tree.find_from_root("c").unwrap();
        assert_eq!(parsed.tree.field_kind(a), Some(FieldKind::Bool));
        assert_eq!(parsed.tree.field_kind(b), Some(FieldKind::Bool));
        assert_eq!(parsed.tree.field_kind(c), Some(FieldKind::String));
        assert!(parsed.tree.param_bool(a).unwrap());
        assert!(!parsed.tree.param_bool(b).unwrap());
    }

    #[test]
    fn missing_equals_is_parse_error() {
        let err = parse("t", "foo 42").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn unterminated_section_errors() {
        let err = parse("t", "[hello] foo=42").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }
}
