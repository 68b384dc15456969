//! Recursive descent parser for MS source.
//!
//! The parser consumes a lexed token stream and builds the homogeneous
//! parse tree in the [`SyntaxDb`] arena, pushing every consumed terminal as
//! a leaf node. There is no error recovery: the first error aborts the
//! parse, because recovered parses of HDL source tend to produce cascading
//! confusion rather than useful diagnostics.

use crate::lexer::lex;
use crate::token::{Token, TokenKind};
use crate::tree::{NodeKind, SyntaxDb};
use msc_common::NodeId;
use msc_diagnostics::{error_colored, hl_colored};
use msc_source::{FileId, Span};

/// A parse (or lex) error. Parsing bails on the first error.
#[derive(Debug)]
pub struct ParseError {
    /// The file being parsed.
    pub file: FileId,
    /// The byte range of the offending token.
    pub span: Span,
    /// The index of the offending token (0 if unknown, e.g. lexer errors).
    pub token_index: usize,
    /// Description of the error.
    pub message: String,
}

type PResult<T> = Result<T, ParseError>;

/// Parses the file's content (which must already be loaded in
/// `db.sources`) into a [`NodeKind::PackageDef`] tree.
pub fn parse_package(db: &mut SyntaxDb, file: FileId) -> Result<NodeId, ParseError> {
    let mut parser = Parser::new(db, file)?;
    parser.package()
}

/// Adds an in-memory source file and parses it. Convenience for tests and
/// for the re-parse of the top-level command-line argument.
pub fn parse_source(db: &mut SyntaxDb, name: &str, content: &str) -> Result<NodeId, ParseError> {
    let file = db.sources.add_source(name, content.to_string());
    parse_package(db, file)
}

/// Parses the file's content as a single primary expression (used for the
/// top-level argument, which must be an identifier optionally followed by
/// `#(params)`). The whole input must be consumed.
pub fn parse_expr_primary(db: &mut SyntaxDb, file: FileId) -> Result<NodeId, ParseError> {
    let mut parser = Parser::new(db, file)?;
    let expr = parser.primary()?;
    if !parser.at(TokenKind::Eof) {
        return Err(parser.err_expected("end of input"));
    }
    Ok(expr)
}

/// Renders a parse error in the compiler's diagnostic style: location
/// header, up to four preceding source lines when the error starts a line,
/// and the offending line with the bad token highlighted.
pub fn render_parse_error(db: &SyntaxDb, err: &ParseError) -> String {
    let file = db.sources.file(err.file);
    let (line, col) = file.line_col(err.span.start);
    let loc = format!("{}:{}:{}", file.path.display(), line, col);

    let mut out = String::new();
    out.push_str(&format!(
        "{} {}{}\n",
        hl_colored(&format!("{loc}:")),
        error_colored("error: "),
        err.message
    ));

    // Preceding context when the offending token begins its line.
    if err.token_index > 0 {
        let prev = db.tokens(err.file)[err.token_index - 1];
        let (prev_line, _) = file.line_col(prev.span.start);
        if prev_line < line && line - prev_line < 5 {
            for l in prev_line..line {
                out.push_str(&format!("    {}\n", file.line_text(l)));
            }
        }
    }

    // The error's line, with the offending token highlighted.
    let line_str = file.line_text(line);
    let start = (col - 1) as usize;
    let len = (err.span.len() as usize).min(line_str.len().saturating_sub(start));
    let end = start + len;
    out.push_str(&format!(
        "    {}{}{}\n",
        &line_str[..start],
        error_colored(&line_str[start..end]),
        &line_str[end..]
    ));
    out
}

struct Parser<'db> {
    db: &'db mut SyntaxDb,
    file: FileId,
    tokens: Vec<Token>,
    pos: usize,
}

fn leaf_kind(tok: TokenKind) -> NodeKind {
    match tok {
        TokenKind::LowerIdent => NodeKind::LowerIdent,
        TokenKind::UpperIdent => NodeKind::UpperIdent,
        TokenKind::DollarIdent => NodeKind::DollarIdent,
        TokenKind::IntLiteral => NodeKind::IntLiteral,
        TokenKind::StringLiteral => NodeKind::StringLiteral,
        _ => NodeKind::Token,
    }
}

impl<'db> Parser<'db> {
    fn new(db: &'db mut SyntaxDb, file: FileId) -> Result<Self, ParseError> {
        let source = db.sources.file(file).content.clone();
        let tokens = lex(&source, file).map_err(|e| ParseError {
            file,
            span: e.span,
            token_index: 0,
            message: e.message,
        })?;
        db.add_tokens(file, tokens.clone());
        Ok(Self {
            db,
            file,
            tokens,
            pos: 0,
        })
    }

    // ------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------

    fn cur(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn cur_token(&self) -> Token {
        self.tokens[self.pos]
    }

    fn peek_kind(&self, offset: usize) -> TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        self.tokens[idx].kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.cur() == kind
    }

    fn cur_text(&self) -> &str {
        if self.at(TokenKind::Eof) {
            return "<EOF>";
        }
        self.db.sources.snippet(self.cur_token().span)
    }

    fn err_expected(&self, what: &str) -> ParseError {
        ParseError {
            file: self.file,
            span: self.cur_token().span,
            token_index: self.pos,
            message: format!(
                "mismatched input {}, expected {}",
                error_colored(&format!("'{}'", self.cur_text())),
                hl_colored(what)
            ),
        }
    }

    /// Consumes the current token into a leaf node.
    fn bump(&mut self) -> NodeId {
        let kind = leaf_kind(self.cur());
        self.bump_as(kind)
    }

    /// Consumes the current token into a leaf node with an explicit kind.
    fn bump_as(&mut self, kind: NodeKind) -> NodeId {
        let id = self.db.leaf(kind, self.file, self.pos as u32);
        if !self.at(TokenKind::Eof) {
            self.pos += 1;
        }
        id
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<NodeId> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.err_expected(kind.describe()))
        }
    }

    fn lower_ident(&mut self) -> PResult<NodeId> {
        self.expect(TokenKind::LowerIdent)
    }

    fn upper_ident(&mut self) -> PResult<NodeId> {
        self.expect(TokenKind::UpperIdent)
    }

    fn any_ident(&mut self) -> PResult<NodeId> {
        if self.at(TokenKind::UpperIdent) || self.at(TokenKind::LowerIdent) {
            Ok(self.bump())
        } else {
            Err(self.err_expected("identifier"))
        }
    }

    fn node(&mut self, kind: NodeKind, children: Vec<NodeId>) -> NodeId {
        self.db.node(kind, self.file, children)
    }

    // ------------------------------------------------------------------
    // Package level
    // ------------------------------------------------------------------

    fn package(&mut self) -> PResult<NodeId> {
        let mut children = Vec::new();
        while !self.at(TokenKind::Eof) {
            children.push(self.package_stmt()?);
        }
        children.push(self.bump()); // EOF leaf
        Ok(self.node(NodeKind::PackageDef, children))
    }

    fn package_stmt(&mut self) -> PResult<NodeId> {
        match self.cur() {
            TokenKind::KwImport => self.import_decl(),
            TokenKind::KwBsvImport => self.bsvimport_decl(),
            TokenKind::KwTypedef => self.type_decl(),
            TokenKind::KwModule => self.module_def(),
            TokenKind::KwFunction => self.function_def(),
            TokenKind::KwLet => self.let_binding(),
            TokenKind::UpperIdent => self.var_binding(),
            _ => Err(self.err_expected(
                "import, typedef, module, function, or variable declaration",
            )),
        }
    }

    fn import_decl(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.expect(TokenKind::KwImport)?];
        ch.push(self.any_ident()?);
        while self.at(TokenKind::Comma) {
            ch.push(self.bump());
            ch.push(self.any_ident()?);
        }
        ch.push(self.expect(TokenKind::Semi)?);
        Ok(self.node(NodeKind::ImportDecl, ch))
    }

    fn bsvimport_decl(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.expect(TokenKind::KwBsvImport)?];
        ch.push(self.upper_ident()?);
        while self.at(TokenKind::Comma) {
            ch.push(self.bump());
            ch.push(self.upper_ident()?);
        }
        ch.push(self.expect(TokenKind::Semi)?);
        Ok(self.node(NodeKind::BsvImportDecl, ch))
    }

    fn type_decl(&mut self) -> PResult<NodeId> {
        match self.peek_kind(1) {
            TokenKind::KwEnum => self.typedef_enum(),
            TokenKind::KwStruct => self.typedef_struct(),
            _ => self.typedef_synonym(),
        }
    }

    fn typedef_synonym(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.expect(TokenKind::KwTypedef)?];
        ch.push(self.type_()?);
        ch.push(self.type_id()?);
        ch.push(self.expect(TokenKind::Semi)?);
        Ok(self.node(NodeKind::TypeDefSynonym, ch))
    }

    fn typedef_enum(&mut self) -> PResult<NodeId> {
        let mut ch = vec![
            self.expect(TokenKind::KwTypedef)?,
            self.expect(TokenKind::KwEnum)?,
            self.expect(TokenKind::LBrace)?,
        ];
        loop {
            ch.push(self.upper_ident()?);
            if self.at(TokenKind::Eq) {
                ch.push(self.bump());
                ch.push(self.expect(TokenKind::IntLiteral)?);
            }
            if self.at(TokenKind::Comma) {
                ch.push(self.bump());
            } else {
                break;
            }
        }
        ch.push(self.expect(TokenKind::RBrace)?);
        ch.push(self.upper_ident()?);
        ch.push(self.expect(TokenKind::Semi)?);
        Ok(self.node(NodeKind::TypeDefEnum, ch))
    }

    fn typedef_struct(&mut self) -> PResult<NodeId> {
        let mut ch = vec![
            self.expect(TokenKind::KwTypedef)?,
            self.expect(TokenKind::KwStruct)?,
            self.expect(TokenKind::LBrace)?,
        ];
        while !self.at(TokenKind::RBrace) {
            let m = vec![
                self.type_()?,
                self.lower_ident()?,
                self.expect(TokenKind::Semi)?,
            ];
            ch.push(self.node(NodeKind::StructMember, m));
        }
        ch.push(self.expect(TokenKind::RBrace)?);
        ch.push(self.type_id()?);
        ch.push(self.expect(TokenKind::Semi)?);
        Ok(self.node(NodeKind::TypeDefStruct, ch))
    }

    // ------------------------------------------------------------------
    // Types, params, formals
    // ------------------------------------------------------------------

    fn type_(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.upper_ident()?];
        if self.at(TokenKind::Hash) {
            ch.push(self.params()?);
        }
        Ok(self.node(NodeKind::Type, ch))
    }

    fn type_id(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.upper_ident()?];
        if self.at(TokenKind::Hash) {
            ch.push(self.param_formals()?);
        }
        Ok(self.node(NodeKind::TypeId, ch))
    }

    fn module_id(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.upper_ident()?];
        if self.at(TokenKind::Hash) {
            ch.push(self.param_formals()?);
        }
        Ok(self.node(NodeKind::ModuleId, ch))
    }

    fn function_id(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.lower_ident()?];
        if self.at(TokenKind::Hash) {
            ch.push(self.param_formals()?);
        }
        Ok(self.node(NodeKind::FunctionId, ch))
    }

    fn params(&mut self) -> PResult<NodeId> {
        let mut ch = vec![
            self.expect(TokenKind::Hash)?,
            self.expect(TokenKind::LParen)?,
        ];
        loop {
            ch.push(self.param()?);
            if self.at(TokenKind::Comma) {
                ch.push(self.bump());
            } else {
                break;
            }
        }
        ch.push(self.expect(TokenKind::RParen)?);
        Ok(self.node(NodeKind::Params, ch))
    }

    /// A parameter is a type when it starts with an upper-case identifier
    /// (MS value variables are always lower-case), an expression otherwise.
    fn param(&mut self) -> PResult<NodeId> {
        let inner = if self.at(TokenKind::UpperIdent) {
            self.type_()?
        } else {
            self.expression()?
        };
        Ok(self.node(NodeKind::Param, vec![inner]))
    }

    fn param_formals(&mut self) -> PResult<NodeId> {
        let mut ch = vec![
            self.expect(TokenKind::Hash)?,
            self.expect(TokenKind::LParen)?,
        ];
        loop {
            ch.push(self.param_formal()?);
            if self.at(TokenKind::Comma) {
                ch.push(self.bump());
            } else {
                break;
            }
        }
        ch.push(self.expect(TokenKind::RParen)?);
        Ok(self.node(NodeKind::ParamFormals, ch))
    }

    fn param_formal(&mut self) -> PResult<NodeId> {
        if self.at(TokenKind::UpperIdent)
            && self.cur_text() == "Integer"
            && self.peek_kind(1) == TokenKind::LowerIdent
        {
            let ch = vec![self.bump(), self.bump()];
            return Ok(self.node(NodeKind::ParamFormal, ch));
        }
        if self.at(TokenKind::KwType) {
            let ch = vec![self.bump(), self.upper_ident()?];
            return Ok(self.node(NodeKind::ParamFormal, ch));
        }
        let p = self.param()?;
        Ok(self.node(NodeKind::ParamFormal, vec![p]))
    }

    fn arg_formals(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.expect(TokenKind::LParen)?];
        if !self.at(TokenKind::RParen) {
            loop {
                let a = vec![self.type_()?, self.lower_ident()?];
                ch.push(self.node(NodeKind::ArgFormal, a));
                if self.at(TokenKind::Comma) {
                    ch.push(self.bump());
                } else {
                    break;
                }
            }
        }
        ch.push(self.expect(TokenKind::RParen)?);
        Ok(self.node(NodeKind::ArgFormals, ch))
    }

    fn args(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.expect(TokenKind::LParen)?];
        if !self.at(TokenKind::RParen) {
            loop {
                ch.push(self.expression()?);
                if self.at(TokenKind::Comma) {
                    ch.push(self.bump());
                } else {
                    break;
                }
            }
        }
        ch.push(self.expect(TokenKind::RParen)?);
        Ok(self.node(NodeKind::Args, ch))
    }

    // ------------------------------------------------------------------
    // Modules and functions
    // ------------------------------------------------------------------

    fn module_def(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.expect(TokenKind::KwModule)?];
        ch.push(self.module_id()?);
        if self.at(TokenKind::LParen) {
            ch.push(self.arg_formals()?);
        }
        ch.push(self.expect(TokenKind::Semi)?);
        while !self.at(TokenKind::KwEndModule) {
            if self.at(TokenKind::Eof) {
                return Err(self.err_expected("'endmodule'"));
            }
            ch.push(self.module_stmt()?);
        }
        ch.push(self.bump());
        Ok(self.node(NodeKind::ModuleDef, ch))
    }

    fn module_stmt(&mut self) -> PResult<NodeId> {
        match self.cur() {
            TokenKind::KwInput => self.input_def(),
            TokenKind::KwMethod => self.method_def(),
            TokenKind::KwRule => self.rule_def(),
            TokenKind::UpperIdent => self.submodule_or_var_binding(),
            _ => self.stmt(),
        }
    }

    fn input_def(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.expect(TokenKind::KwInput)?];
        ch.push(self.type_()?);
        ch.push(self.lower_ident()?);
        if self.at(TokenKind::KwDefault) {
            ch.push(self.bump());
            ch.push(self.expect(TokenKind::Eq)?);
            ch.push(self.expression()?);
        }
        ch.push(self.expect(TokenKind::Semi)?);
        Ok(self.node(NodeKind::InputDef, ch))
    }

    fn method_def(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.expect(TokenKind::KwMethod)?];
        ch.push(self.type_()?);
        ch.push(self.lower_ident()?);
        if self.at(TokenKind::LParen) {
            ch.push(self.arg_formals()?);
        }
        if self.at(TokenKind::Eq) {
            ch.push(self.bump());
            ch.push(self.expression()?);
            ch.push(self.expect(TokenKind::Semi)?);
        } else {
            ch.push(self.expect(TokenKind::Semi)?);
            while !self.at(TokenKind::KwEndMethod) {
                if self.at(TokenKind::Eof) {
                    return Err(self.err_expected("'endmethod'"));
                }
                ch.push(self.stmt()?);
            }
            ch.push(self.bump());
        }
        Ok(self.node(NodeKind::MethodDef, ch))
    }

    fn rule_def(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.expect(TokenKind::KwRule)?];
        ch.push(self.lower_ident()?);
        ch.push(self.expect(TokenKind::Semi)?);
        while !self.at(TokenKind::KwEndRule) {
            if self.at(TokenKind::Eof) {
                return Err(self.err_expected("'endrule'"));
            }
            ch.push(self.stmt()?);
        }
        ch.push(self.bump());
        Ok(self.node(NodeKind::RuleDef, ch))
    }

    fn function_def(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.expect(TokenKind::KwFunction)?];
        ch.push(self.type_()?);
        ch.push(self.function_id()?);
        if self.at(TokenKind::LParen) {
            ch.push(self.arg_formals()?);
        }
        if self.at(TokenKind::Eq) {
            ch.push(self.bump());
            ch.push(self.expression()?);
            ch.push(self.expect(TokenKind::Semi)?);
        } else {
            ch.push(self.expect(TokenKind::Semi)?);
            while !self.at(TokenKind::KwEndFunction) {
                if self.at(TokenKind::Eof) {
                    return Err(self.err_expected("'endfunction'"));
                }
                ch.push(self.stmt()?);
            }
            ch.push(self.bump());
        }
        Ok(self.node(NodeKind::FunctionDef, ch))
    }

    fn submodule_or_var_binding(&mut self) -> PResult<NodeId> {
        let ty = self.type_()?;
        let name = self.lower_ident()?;
        match self.cur() {
            TokenKind::LParen => {
                let args = self.args()?;
                let semi = self.expect(TokenKind::Semi)?;
                Ok(self.node(NodeKind::SubmoduleDecl, vec![ty, name, args, semi]))
            }
            TokenKind::Semi => {
                let semi = self.bump();
                Ok(self.node(NodeKind::SubmoduleDecl, vec![ty, name, semi]))
            }
            TokenKind::Eq | TokenKind::Comma => self.var_binding_tail(ty, name),
            _ => Err(self.err_expected("';', '=', '(', or ',' in declaration")),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn stmt(&mut self) -> PResult<NodeId> {
        match self.cur() {
            TokenKind::KwBegin => self.begin_end_block(),
            TokenKind::KwIf => self.if_stmt(),
            TokenKind::KwCase => self.case_stmt(),
            TokenKind::KwFor => self.for_stmt(),
            TokenKind::KwReturn => self.return_stmt(),
            TokenKind::KwLet => self.let_binding(),
            TokenKind::UpperIdent => self.var_binding(),
            TokenKind::LBrace => self.unpack_assign(),
            TokenKind::LowerIdent => self.assign_or_expr_stmt(),
            _ => self.expr_stmt(),
        }
    }

    fn begin_end_block(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.expect(TokenKind::KwBegin)?];
        while !self.at(TokenKind::KwEnd) {
            if self.at(TokenKind::Eof) {
                return Err(self.err_expected("'end'"));
            }
            ch.push(self.stmt()?);
        }
        ch.push(self.bump());
        Ok(self.node(NodeKind::BeginEndBlock, ch))
    }

    fn if_stmt(&mut self) -> PResult<NodeId> {
        let mut ch = vec![
            self.expect(TokenKind::KwIf)?,
            self.expect(TokenKind::LParen)?,
            self.expression()?,
            self.expect(TokenKind::RParen)?,
            self.stmt()?,
        ];
        if self.at(TokenKind::KwElse) {
            ch.push(self.bump());
            ch.push(self.stmt()?);
        }
        Ok(self.node(NodeKind::IfStmt, ch))
    }

    fn case_stmt(&mut self) -> PResult<NodeId> {
        let mut ch = vec![
            self.expect(TokenKind::KwCase)?,
            self.expect(TokenKind::LParen)?,
            self.expression()?,
            self.expect(TokenKind::RParen)?,
        ];
        while !self.at(TokenKind::KwEndCase) {
            if self.at(TokenKind::Eof) {
                return Err(self.err_expected("'endcase'"));
            }
            ch.push(self.case_item()?);
        }
        ch.push(self.bump());
        Ok(self.node(NodeKind::CaseStmt, ch))
    }

    fn case_item(&mut self) -> PResult<NodeId> {
        let mut ch = Vec::new();
        if self.at(TokenKind::KwDefault) {
            ch.push(self.bump());
        } else {
            ch.push(self.expression()?);
            while self.at(TokenKind::Comma) {
                ch.push(self.bump());
                ch.push(self.expression()?);
            }
        }
        ch.push(self.expect(TokenKind::Colon)?);
        ch.push(self.stmt()?);
        Ok(self.node(NodeKind::CaseItem, ch))
    }

    fn for_stmt(&mut self) -> PResult<NodeId> {
        let ch = vec![
            self.expect(TokenKind::KwFor)?,
            self.expect(TokenKind::LParen)?,
            self.type_()?,
            self.lower_ident()?,
            self.expect(TokenKind::Eq)?,
            self.expression()?,
            self.expect(TokenKind::Semi)?,
            self.expression()?,
            self.expect(TokenKind::Semi)?,
            self.lower_ident()?,
            self.expect(TokenKind::Eq)?,
            self.expression()?,
            self.expect(TokenKind::RParen)?,
            self.stmt()?,
        ];
        Ok(self.node(NodeKind::ForStmt, ch))
    }

    fn return_stmt(&mut self) -> PResult<NodeId> {
        let ch = vec![
            self.expect(TokenKind::KwReturn)?,
            self.expression()?,
            self.expect(TokenKind::Semi)?,
        ];
        Ok(self.node(NodeKind::ReturnStmt, ch))
    }

    fn let_binding(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.expect(TokenKind::KwLet)?];
        ch.push(self.lower_ident()?);
        while self.at(TokenKind::Comma) {
            ch.push(self.bump());
            ch.push(self.lower_ident()?);
        }
        ch.push(self.expect(TokenKind::Eq)?);
        ch.push(self.expression()?);
        ch.push(self.expect(TokenKind::Semi)?);
        Ok(self.node(NodeKind::LetBinding, ch))
    }

    fn var_binding(&mut self) -> PResult<NodeId> {
        let ty = self.type_()?;
        let name = self.lower_ident()?;
        self.var_binding_tail(ty, name)
    }

    fn var_binding_tail(&mut self, ty: NodeId, first_name: NodeId) -> PResult<NodeId> {
        let mut ch = vec![ty];
        let mut init = vec![first_name];
        if self.at(TokenKind::Eq) {
            init.push(self.bump());
            init.push(self.expression()?);
        }
        ch.push(self.node(NodeKind::VarInit, init));
        while self.at(TokenKind::Comma) {
            ch.push(self.bump());
            let mut init = vec![self.lower_ident()?];
            if self.at(TokenKind::Eq) {
                init.push(self.bump());
                init.push(self.expression()?);
            }
            ch.push(self.node(NodeKind::VarInit, init));
        }
        ch.push(self.expect(TokenKind::Semi)?);
        Ok(self.node(NodeKind::VarBinding, ch))
    }

    fn unpack_assign(&mut self) -> PResult<NodeId> {
        let mut ch = vec![self.expect(TokenKind::LBrace)?];
        ch.push(self.lvalue()?);
        while self.at(TokenKind::Comma) {
            ch.push(self.bump());
            ch.push(self.lvalue()?);
        }
        ch.push(self.expect(TokenKind::RBrace)?);
        ch.push(self.expect(TokenKind::Eq)?);
        ch.push(self.expression()?);
        ch.push(self.expect(TokenKind::Semi)?);
        Ok(self.node(NodeKind::VarAssign, ch))
    }

    fn assign_or_expr_stmt(&mut self) -> PResult<NodeId> {
        let saved = self.pos;
        if let Ok(lv) = self.lvalue() {
            if self.at(TokenKind::Eq) {
                let eq = self.bump();
                let rhs = self.expression()?;
                let semi = self.expect(TokenKind::Semi)?;
                return Ok(self.node(NodeKind::VarAssign, vec![lv, eq, rhs, semi]));
            }
            if self.at(TokenKind::LtEq) {
                let arrow = self.bump();
                let rhs = self.expression()?;
                let semi = self.expect(TokenKind::Semi)?;
                return Ok(self.node(NodeKind::RegWrite, vec![lv, arrow, rhs, semi]));
            }
        }
        self.pos = saved;
        self.expr_stmt()
    }

    fn expr_stmt(&mut self) -> PResult<NodeId> {
        let e = self.expression()?;
        let semi = self.expect(TokenKind::Semi)?;
        Ok(self.node(NodeKind::ExprStmt, vec![e, semi]))
    }

    fn lvalue(&mut self) -> PResult<NodeId> {
        let name = self.lower_ident()?;
        let mut lv = self.node(NodeKind::SimpleLvalue, vec![name]);
        loop {
            match self.cur() {
                TokenKind::Dot => {
                    let dot = self.bump();
                    let field = self.lower_ident()?;
                    lv = self.node(NodeKind::MemberLvalue, vec![lv, dot, field]);
                }
                TokenKind::LBracket => {
                    let lb = self.bump();
                    let idx = self.expression()?;
                    if self.at(TokenKind::Colon) {
                        let colon = self.bump();
                        let lsb = self.expression()?;
                        let rb = self.expect(TokenKind::RBracket)?;
                        lv = self.node(NodeKind::SliceLvalue, vec![lv, lb, idx, colon, lsb, rb]);
                    } else {
                        let rb = self.expect(TokenKind::RBracket)?;
                        lv = self.node(NodeKind::IndexLvalue, vec![lv, lb, idx, rb]);
                    }
                }
                _ => break,
            }
        }
        Ok(lv)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self) -> PResult<NodeId> {
        if self.at(TokenKind::KwCase) {
            return self.case_expr();
        }
        let lhs = self.binary(0)?;
        if self.at(TokenKind::Question) {
            let q = self.bump();
            let then = self.expression()?;
            let colon = self.expect(TokenKind::Colon)?;
            let els = self.expression()?;
            return Ok(self.node(NodeKind::CondExpr, vec![lhs, q, then, colon, els]));
        }
        Ok(lhs)
    }

    fn case_expr(&mut self) -> PResult<NodeId> {
        let mut ch = vec![
            self.expect(TokenKind::KwCase)?,
            self.expect(TokenKind::LParen)?,
            self.expression()?,
            self.expect(TokenKind::RParen)?,
        ];
        while !self.at(TokenKind::KwEndCase) {
            if self.at(TokenKind::Eof) {
                return Err(self.err_expected("'endcase'"));
            }
            ch.push(self.case_expr_item()?);
        }
        ch.push(self.bump());
        Ok(self.node(NodeKind::CaseExpr, ch))
    }

    fn case_expr_item(&mut self) -> PResult<NodeId> {
        let mut ch = Vec::new();
        if self.at(TokenKind::KwDefault) {
            ch.push(self.bump());
        } else {
            ch.push(self.expression()?);
            while self.at(TokenKind::Comma) {
                ch.push(self.bump());
                ch.push(self.expression()?);
            }
        }
        ch.push(self.expect(TokenKind::Colon)?);
        ch.push(self.expression()?); // the item's body
        ch.push(self.expect(TokenKind::Semi)?);
        Ok(self.node(NodeKind::CaseExprItem, ch))
    }

    /// Binary operator levels, loosest first.
    const BINOP_LEVELS: &'static [&'static [TokenKind]] = &[
        &[TokenKind::PipePipe],
        &[TokenKind::AmpAmp],
        &[TokenKind::Pipe],
        &[TokenKind::Caret, TokenKind::CaretTilde, TokenKind::TildeCaret],
        &[TokenKind::Amp],
        &[TokenKind::EqEq, TokenKind::NotEq],
        &[TokenKind::Lt, TokenKind::LtEq, TokenKind::Gt, TokenKind::GtEq],
        &[TokenKind::Shl, TokenKind::Shr],
        &[TokenKind::Plus, TokenKind::Minus],
        &[TokenKind::Star, TokenKind::Slash, TokenKind::Percent],
        &[TokenKind::StarStar],
    ];

    fn binary(&mut self, level: usize) -> PResult<NodeId> {
        if level == Self::BINOP_LEVELS.len() {
            return self.unary();
        }
        let mut lhs = self.binary(level + 1)?;
        while Self::BINOP_LEVELS[level].contains(&self.cur()) {
            let op = self.bump();
            let rhs = self.binary(level + 1)?;
            lhs = self.node(NodeKind::BinopExpr, vec![lhs, op, rhs]);
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> PResult<NodeId> {
        use TokenKind::*;
        match self.cur() {
            Plus | Minus | Bang | Tilde | Amp | TildeAmp | Pipe | TildePipe | Caret
            | CaretTilde | TildeCaret => {
                let op = self.bump();
                let operand = self.unary()?;
                Ok(self.node(NodeKind::UnopExpr, vec![op, operand]))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> PResult<NodeId> {
        let mut e = self.primary()?;
        loop {
            match self.cur() {
                TokenKind::Dot => {
                    let dot = self.bump();
                    let field = self.lower_ident()?;
                    e = self.node(NodeKind::MemberExpr, vec![e, dot, field]);
                }
                TokenKind::LBracket => {
                    let lb = self.bump();
                    let idx = self.expression()?;
                    if self.at(TokenKind::Colon) {
                        let colon = self.bump();
                        let lsb = self.expression()?;
                        let rb = self.expect(TokenKind::RBracket)?;
                        e = self.node(NodeKind::SliceExpr, vec![e, lb, idx, colon, lsb, rb]);
                    } else {
                        let rb = self.expect(TokenKind::RBracket)?;
                        e = self.node(NodeKind::IndexExpr, vec![e, lb, idx, rb]);
                    }
                }
                TokenKind::LParen => {
                    let mut ch = vec![e, self.bump()];
                    if !self.at(TokenKind::RParen) {
                        loop {
                            ch.push(self.expression()?);
                            if self.at(TokenKind::Comma) {
                                ch.push(self.bump());
                            } else {
                                break;
                            }
                        }
                    }
                    ch.push(self.expect(TokenKind::RParen)?);
                    e = self.node(NodeKind::CallExpr, ch);
                }
                _ => break,
            }
        }
        Ok(e)
    }

    fn primary(&mut self) -> PResult<NodeId> {
        match self.cur() {
            TokenKind::IntLiteral | TokenKind::StringLiteral => Ok(self.bump()),
            TokenKind::Question => Ok(self.bump_as(NodeKind::UndefinedExpr)),
            TokenKind::LParen => {
                let ch = vec![
                    self.bump(),
                    self.expression()?,
                    self.expect(TokenKind::RParen)?,
                ];
                Ok(self.node(NodeKind::ParenExpr, ch))
            }
            TokenKind::LBrace => {
                let mut ch = vec![self.bump()];
                loop {
                    ch.push(self.expression()?);
                    if self.at(TokenKind::Comma) {
                        ch.push(self.bump());
                    } else {
                        break;
                    }
                }
                ch.push(self.expect(TokenKind::RBrace)?);
                Ok(self.node(NodeKind::BitConcat, ch))
            }
            TokenKind::KwCase => self.case_expr(),
            TokenKind::LowerIdent | TokenKind::DollarIdent => {
                let mut ch = vec![self.bump()];
                if self.at(TokenKind::Hash) {
                    ch.push(self.params()?);
                }
                Ok(self.node(NodeKind::VarExpr, ch))
            }
            TokenKind::UpperIdent => {
                let name = self.bump();
                if self.at(TokenKind::LBrace) {
                    let mut ch = vec![name, self.bump()];
                    loop {
                        ch.push(self.lower_ident()?);
                        ch.push(self.expect(TokenKind::Colon)?);
                        ch.push(self.expression()?);
                        if self.at(TokenKind::Comma) {
                            ch.push(self.bump());
                        } else {
                            break;
                        }
                    }
                    ch.push(self.expect(TokenKind::RBrace)?);
                    return Ok(self.node(NodeKind::StructExpr, ch));
                }
                let mut ch = vec![name];
                if self.at(TokenKind::Hash) {
                    ch.push(self.params()?);
                }
                Ok(self.node(NodeKind::VarExpr, ch))
            }
            _ => Err(self.err_expected("expression")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (SyntaxDb, NodeId) {
        let mut db = SyntaxDb::new();
        let root = parse_source(&mut db, "test.ms", source).unwrap();
        (db, root)
    }

    fn kinds_of_children(db: &SyntaxDb, n: NodeId) -> Vec<NodeKind> {
        db.children(n).iter().map(|&c| db.kind(c)).collect()
    }

    #[test]
    fn empty_package() {
        let (db, root) = parse("");
        assert_eq!(db.kind(root), NodeKind::PackageDef);
        assert_eq!(db.children(root).len(), 1); // just EOF
    }

    #[test]
    fn simple_module() {
        let (db, root) = parse("module Counter; rule tick; endrule endmodule");
        let m = db.child_of_kind(root, NodeKind::ModuleDef).unwrap();
        assert!(db.child_of_kind(m, NodeKind::ModuleId).is_some());
        assert!(db.child_of_kind(m, NodeKind::RuleDef).is_some());
        assert_eq!(db.text(m), "module Counter; rule tick; endrule endmodule");
    }

    #[test]
    fn parametric_function() {
        let (db, root) = parse(
            "function Bit#(n) f#(Integer n); return 0; endfunction",
        );
        let f = db.child_of_kind(root, NodeKind::FunctionDef).unwrap();
        let fid = db.child_of_kind(f, NodeKind::FunctionId).unwrap();
        let pf = db.child_of_kind(fid, NodeKind::ParamFormals).unwrap();
        let formals = db.children_of_kind(pf, NodeKind::ParamFormal);
        assert_eq!(formals.len(), 1);
        assert_eq!(db.text(formals[0]), "Integer n");
    }

    #[test]
    fn submodule_vs_var_binding() {
        let (db, root) = parse(
            "module M; Counter c; Bit#(8) x = 3; endmodule",
        );
        let m = db.child_of_kind(root, NodeKind::ModuleDef).unwrap();
        assert!(db.child_of_kind(m, NodeKind::SubmoduleDecl).is_some());
        assert!(db.child_of_kind(m, NodeKind::VarBinding).is_some());
    }

    #[test]
    fn submodule_with_args() {
        let (db, root) = parse("module M; Counter c(4, x); endmodule");
        let m = db.child_of_kind(root, NodeKind::ModuleDef).unwrap();
        let s = db.child_of_kind(m, NodeKind::SubmoduleDecl).unwrap();
        let args = db.child_of_kind(s, NodeKind::Args).unwrap();
        assert_eq!(db.text(args), "(4, x)");
    }

    #[test]
    fn input_with_default() {
        let (db, root) = parse("module M; input Bit#(8) x default = 0; endmodule");
        let m = db.child_of_kind(root, NodeKind::ModuleDef).unwrap();
        let i = db.child_of_kind(m, NodeKind::InputDef).unwrap();
        assert_eq!(kinds_of_children(&db, i)[1], NodeKind::Type);
        assert!(db.child_of_kind(i, NodeKind::IntLiteral).is_some());
    }

    #[test]
    fn expression_precedence() {
        let (db, root) = parse("function Integer f; return 1 + 2 * 3; endfunction");
        let f = db.child_of_kind(root, NodeKind::FunctionDef).unwrap();
        let r = db.child_of_kind(f, NodeKind::ReturnStmt).unwrap();
        let add = db.child_of_kind(r, NodeKind::BinopExpr).unwrap();
        // The top-level binop is '+'; its right child is the '*' binop.
        let ch = db.children(add);
        assert_eq!(db.text(ch[1]), "+");
        assert_eq!(db.kind(ch[2]), NodeKind::BinopExpr);
    }

    #[test]
    fn conditional_expression() {
        let (db, root) = parse("Integer x = c ? 1 : 0;");
        let vb = db.child_of_kind(root, NodeKind::VarBinding).unwrap();
        let init = db.child_of_kind(vb, NodeKind::VarInit).unwrap();
        assert!(db.child_of_kind(init, NodeKind::CondExpr).is_some());
    }

    #[test]
    fn reg_write_vs_comparison() {
        let (db, root) = parse("module M; rule r; count <= count + 1; endrule endmodule");
        let m = db.child_of_kind(root, NodeKind::ModuleDef).unwrap();
        let r = db.child_of_kind(m, NodeKind::RuleDef).unwrap();
        assert!(db.child_of_kind(r, NodeKind::RegWrite).is_some());
    }

    #[test]
    fn call_statement_backtracks() {
        let (db, root) = parse(
            "module M; rule r; doit(1); endrule endmodule",
        );
        let m = db.child_of_kind(root, NodeKind::ModuleDef).unwrap();
        let r = db.child_of_kind(m, NodeKind::RuleDef).unwrap();
        let es = db.child_of_kind(r, NodeKind::ExprStmt).unwrap();
        assert!(db.child_of_kind(es, NodeKind::CallExpr).is_some());
    }

    #[test]
    fn member_lvalue_assign() {
        let (db, root) = parse("module M; rule r; sub.en = 1; endrule endmodule");
        let m = db.child_of_kind(root, NodeKind::ModuleDef).unwrap();
        let r = db.child_of_kind(m, NodeKind::RuleDef).unwrap();
        let va = db.child_of_kind(r, NodeKind::VarAssign).unwrap();
        assert!(db.child_of_kind(va, NodeKind::MemberLvalue).is_some());
    }

    #[test]
    fn typedef_enum_and_struct() {
        let (db, root) = parse(
            "typedef enum {Red, Green, Blue} Color;\n\
             typedef struct { Bit#(8) a; Bool b; } Pair;",
        );
        let e = db.child_of_kind(root, NodeKind::TypeDefEnum).unwrap();
        // Last UpperIdent child is the enum name.
        let uppers = db.children_of_kind(e, NodeKind::UpperIdent);
        assert_eq!(db.text(*uppers.last().unwrap()), "Color");
        let s = db.child_of_kind(root, NodeKind::TypeDefStruct).unwrap();
        assert_eq!(db.children_of_kind(s, NodeKind::StructMember).len(), 2);
    }

    #[test]
    fn for_statement_shape() {
        let (db, root) = parse(
            "function Integer f; for (Integer i = 0; i < 4; i = i + 1) x = x + i; endfunction",
        );
        let f = db.child_of_kind(root, NodeKind::FunctionDef).unwrap();
        let fs = db.child_of_kind(f, NodeKind::ForStmt).unwrap();
        let idents = db.children_of_kind(fs, NodeKind::LowerIdent);
        assert_eq!(idents.len(), 2);
        assert_eq!(db.text(idents[0]), "i");
        assert_eq!(db.text(idents[1]), "i");
    }

    #[test]
    fn case_expr_item_body_is_last_expr() {
        let (db, root) = parse("Integer x = case (y) 0: 1; default: 2; endcase;");
        let vb = db.child_of_kind(root, NodeKind::VarBinding).unwrap();
        let init = db.child_of_kind(vb, NodeKind::VarInit).unwrap();
        let ce = db.child_of_kind(init, NodeKind::CaseExpr).unwrap();
        assert_eq!(db.children_of_kind(ce, NodeKind::CaseExprItem).len(), 2);
    }

    #[test]
    fn parse_error_bails_with_message() {
        let mut db = SyntaxDb::new();
        let err = parse_source(&mut db, "bad.ms", "module ; endmodule").unwrap_err();
        assert!(err.message.contains("mismatched input"));
        let rendered = render_parse_error(&db, &err);
        assert!(rendered.contains("bad.ms:1:8"));
    }

    #[test]
    fn expr_primary_for_top_level() {
        let mut db = SyntaxDb::new();
        let file = db.sources.add_source("<top-level>", "f#(4)".to_string());
        let e = parse_expr_primary(&mut db, file).unwrap();
        assert_eq!(db.kind(e), NodeKind::VarExpr);
        assert!(db.child_of_kind(e, NodeKind::Params).is_some());
    }

    #[test]
    fn bsvimport_parses() {
        let (db, root) = parse("bsvimport Vector, FIFO;");
        let b = db.child_of_kind(root, NodeKind::BsvImportDecl).unwrap();
        assert_eq!(db.children_of_kind(b, NodeKind::UpperIdent).len(), 2);
    }
}
