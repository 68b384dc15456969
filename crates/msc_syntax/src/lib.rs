//! Lexing, parsing, and parse-tree infrastructure for MS source.
//!
//! MS is parsed into a *homogeneous* tree: an arena of nodes, each with a
//! [`NodeKind`](tree::NodeKind), a token range, and child node ids, with
//! every terminal token present as a leaf node. The elaborator patches
//! per-node values onto this tree and the translated-code buffer re-emits
//! it, preserving inter-token whitespace, so the tree must keep the full
//! token-level shape of the source rather than an abstracted AST.

#![warn(missing_docs)]

pub mod ast;
pub mod context;
pub mod imports;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod tree;

pub use parser::{parse_package, parse_source, ParseError};
pub use token::{Token, TokenKind};
pub use tree::{NodeKind, SyntaxDb};
