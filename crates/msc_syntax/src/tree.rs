//! The homogeneous parse-tree arena.
//!
//! All parsed files share one arena: a [`NodeId`] uniquely identifies a
//! syntax element across the whole session, which is what the elaborator's
//! value map, the source map, and diagnostic deduplication key on. Each node
//! records its kind, the file and token range it covers, and its children;
//! terminal tokens appear as leaf nodes so that re-emission can reproduce
//! the source token-for-token (including the whitespace between tokens,
//! recovered from the gaps between token spans).

use crate::token::{Token, TokenKind};
use msc_common::{Ident, Interner, NodeId, WellKnown};
use msc_source::{FileId, SourceDb, Span};
use std::collections::HashMap;

/// The kind of a parse-tree node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[allow(missing_docs)]
pub enum NodeKind {
    /// A leaf wrapping a single punctuation/keyword token.
    Token,
    /// A leaf identifier starting with a lower-case letter.
    LowerIdent,
    /// A leaf identifier starting with an upper-case letter.
    UpperIdent,
    /// A leaf identifier starting with `$`.
    DollarIdent,
    /// A leaf integer literal.
    IntLiteral,
    /// A leaf string literal.
    StringLiteral,
    /// The `?` don't-care expression.
    UndefinedExpr,

    PackageDef,
    ImportDecl,
    BsvImportDecl,
    TypeDefSynonym,
    TypeDefEnum,
    TypeDefStruct,
    StructMember,
    TypeId,
    ModuleDef,
    ModuleId,
    InputDef,
    SubmoduleDecl,
    MethodDef,
    RuleDef,
    FunctionDef,
    FunctionId,
    ParamFormals,
    ParamFormal,
    Params,
    Param,
    ArgFormals,
    ArgFormal,
    Args,
    Type,

    VarBinding,
    VarInit,
    LetBinding,
    VarAssign,
    RegWrite,
    SimpleLvalue,
    MemberLvalue,
    IndexLvalue,
    SliceLvalue,
    BeginEndBlock,
    IfStmt,
    CaseStmt,
    CaseItem,
    ForStmt,
    ReturnStmt,
    ExprStmt,

    CondExpr,
    CaseExpr,
    CaseExprItem,
    BinopExpr,
    UnopExpr,
    ParenExpr,
    VarExpr,
    MemberExpr,
    IndexExpr,
    SliceExpr,
    CallExpr,
    BitConcat,
    StructExpr,
}

impl NodeKind {
    /// Returns `true` for expression nodes (the nodes whose elaborated
    /// values the integer elaborator computes and consumes).
    pub fn is_expr(self) -> bool {
        use NodeKind::*;
        matches!(
            self,
            CondExpr
                | CaseExpr
                | BinopExpr
                | UnopExpr
                | ParenExpr
                | VarExpr
                | MemberExpr
                | IndexExpr
                | SliceExpr
                | CallExpr
                | BitConcat
                | StructExpr
                | IntLiteral
                | StringLiteral
                | UndefinedExpr
        )
    }

    /// Returns `true` for statement nodes.
    pub fn is_stmt(self) -> bool {
        use NodeKind::*;
        matches!(
            self,
            VarBinding
                | LetBinding
                | VarAssign
                | RegWrite
                | BeginEndBlock
                | IfStmt
                | CaseStmt
                | ForStmt
                | ReturnStmt
                | ExprStmt
        )
    }
}

/// A parse-tree node: kind, covered token range, and children.
pub struct Node {
    /// The kind of this node.
    pub kind: NodeKind,
    /// The file whose token stream this node indexes into.
    pub file: FileId,
    /// Index of the first token covered by this node.
    pub first_tok: u32,
    /// Index of the last token covered by this node (inclusive).
    pub last_tok: u32,
    /// Child node ids, in source order. Empty for leaves.
    pub children: Vec<NodeId>,
}

/// The syntax database: sources, interner, per-file token streams, and the
/// node arena for all parsed files.
pub struct SyntaxDb {
    /// The source files.
    pub sources: SourceDb,
    /// The shared identifier interner.
    pub interner: Interner,
    /// Pre-interned names with special elaboration-time meaning.
    pub names: WellKnown,
    tokens: HashMap<FileId, Vec<Token>>,
    nodes: Vec<Node>,
}

impl SyntaxDb {
    /// Creates an empty syntax database.
    pub fn new() -> Self {
        let interner = Interner::new();
        let names = WellKnown::new(&interner);
        Self {
            sources: SourceDb::new(),
            interner,
            names,
            tokens: HashMap::new(),
            nodes: Vec::new(),
        }
    }

    /// Installs the token stream for a file.
    pub fn add_tokens(&mut self, file: FileId, tokens: Vec<Token>) {
        self.tokens.insert(file, tokens);
    }

    /// Returns the token stream of a file.
    ///
    /// # Panics
    ///
    /// Panics if the file has not been lexed.
    pub fn tokens(&self, file: FileId) -> &[Token] {
        &self.tokens[&file]
    }

    /// Allocates a leaf node wrapping the given token index.
    pub fn leaf(&mut self, kind: NodeKind, file: FileId, tok: u32) -> NodeId {
        self.alloc(Node {
            kind,
            file,
            first_tok: tok,
            last_tok: tok,
            children: Vec::new(),
        })
    }

    /// Allocates an interior node covering its children's token range.
    ///
    /// # Panics
    ///
    /// Panics if `children` is empty; every interior node covers at least
    /// one terminal.
    pub fn node(&mut self, kind: NodeKind, file: FileId, children: Vec<NodeId>) -> NodeId {
        assert!(!children.is_empty(), "interior node must have children");
        let first_tok = self.node_ref(children[0]).first_tok;
        let last_tok = self.node_ref(*children.last().unwrap()).last_tok;
        self.alloc(Node {
            kind,
            file,
            first_tok,
            last_tok,
            children,
        })
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId::from_raw(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Returns the node for an id.
    pub fn node_ref(&self, id: NodeId) -> &Node {
        &self.nodes[id.as_raw() as usize]
    }

    /// Returns the kind of a node.
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node_ref(id).kind
    }

    /// Returns the children of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node_ref(id).children
    }

    /// Returns the first child with the given kind, if any.
    pub fn child_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.kind(c) == kind)
    }

    /// Returns all children with the given kind.
    pub fn children_of_kind(&self, id: NodeId, kind: NodeKind) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.kind(c) == kind)
            .collect()
    }

    /// Returns the first token covered by a node.
    pub fn first_token(&self, id: NodeId) -> Token {
        let node = self.node_ref(id);
        self.tokens(node.file)[node.first_tok as usize]
    }

    /// Returns the last token covered by a node.
    pub fn last_token(&self, id: NodeId) -> Token {
        let node = self.node_ref(id);
        self.tokens(node.file)[node.last_tok as usize]
    }

    /// Returns the token kind of a leaf node.
    pub fn leaf_token_kind(&self, id: NodeId) -> TokenKind {
        self.first_token(id).kind
    }

    /// Returns the source span covered by a node.
    pub fn span(&self, id: NodeId) -> Span {
        let node = self.node_ref(id);
        let toks = self.tokens(node.file);
        let first = toks[node.first_tok as usize].span;
        let last = toks[node.last_tok as usize].span;
        Span::new(node.file, first.start, last.end)
    }

    /// Returns the raw source text covered by a node, comments and
    /// whitespace between its tokens included.
    pub fn text(&self, id: NodeId) -> &str {
        self.sources.snippet(self.span(id))
    }

    /// Interns the text of a node (normally an identifier leaf).
    pub fn ident(&self, id: NodeId) -> Ident {
        self.interner.intern(self.text(id))
    }

    /// Returns the source text between two token indices of a file
    /// (exclusive of both tokens). This is the original whitespace and
    /// comment text, used to preserve layout when re-emitting.
    pub fn gap_text(&self, file: FileId, prev_tok: u32, next_tok: u32) -> &str {
        let toks = self.tokens(file);
        let start = toks[prev_tok as usize].span.end;
        let end = toks[next_tok as usize].span.start;
        if start >= end {
            return "";
        }
        self.sources.snippet(Span::new(file, start, end))
    }

    /// Renders `file:line:col` of a node's first token.
    pub fn loc(&self, id: NodeId) -> String {
        let span = self.first_token(id).span;
        let file = self.sources.file(span.file);
        let (line, col) = file.line_col(span.start);
        format!("{}:{}:{}", file.path.display(), line, col)
    }

    /// Renders a node's first-token location with the file name blanked out,
    /// for aligned sub-error lines under a main error.
    pub fn sub_loc(&self, id: NodeId) -> String {
        let span = self.first_token(id).span;
        let file = self.sources.file(span.file);
        let (line, col) = file.line_col(span.start);
        let pad = " ".repeat(file.path.display().to_string().len());
        format!("{pad} {line}:{col}")
    }
}

impl Default for SyntaxDb {
    fn default() -> Self {
        Self::new()
    }
}
