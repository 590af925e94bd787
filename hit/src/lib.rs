//! A lossless parser, formatter and rewrite engine for the HIT
//! configuration language used by the MOOSE finite-element framework.
//!
//! The pipeline is: [`lex`] tokenizes, [`parser`] builds a [`tree::Tree`]
//! (optionally resolving `${...}` brace expressions via [`brace`] as it
//! goes), [`include`] splices in `!include`d files, [`transform`] exposes
//! the structural rewrites (`explode`, `merge`, `merge_blocks`), [`render`]
//! turns a tree back into text, [`format`] applies a style document's
//! sorting and canonicalization rules, and [`rewrite`] runs pattern-based
//! find/replace over a tree.

pub mod brace;
pub mod error;
pub mod format;
pub mod include;
pub mod lex;
pub mod parser;
pub mod render;
pub mod rewrite;
pub mod transform;
pub mod tree;

pub use brace::{expand_tree, BraceExpander, Evaluators};
pub use error::{Error, ErrorKind, ErrorList, Result};
pub use format::Formatter;
pub use include::{resolve as resolve_includes, FsLoader, IncludeLoader};
pub use parser::{parse, OverrideMarker, Parsed};
pub use render::render_tree;
pub use rewrite::{apply_once, apply_rules, load_rules, Rule};
pub use transform::{explode, merge, merge_blocks};
pub use tree::{FieldKind, NodeId, NodeKind, Tree};
