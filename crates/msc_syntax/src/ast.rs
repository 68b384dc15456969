//! Typed accessor views over the homogeneous parse tree.
//!
//! The parser guarantees the child shape of each node kind; these helpers
//! recover the labeled parts (a for-loop's induction variable, a module's
//! statements, ...) from the flat child lists. Accessors that return plain
//! `NodeId` panic on malformed shapes, which would indicate a parser bug.

use crate::tree::{NodeKind, SyntaxDb};
use msc_common::NodeId;

fn expr_children(db: &SyntaxDb, n: NodeId) -> Vec<NodeId> {
    db.children(n)
        .iter()
        .copied()
        .filter(|&c| db.kind(c).is_expr())
        .collect()
}

fn stmt_children(db: &SyntaxDb, n: NodeId) -> Vec<NodeId> {
    db.children(n)
        .iter()
        .copied()
        .filter(|&c| db.kind(c).is_stmt())
        .collect()
}

/// Returns `true` for lvalue node kinds.
pub fn is_lvalue(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::SimpleLvalue
            | NodeKind::MemberLvalue
            | NodeKind::IndexLvalue
            | NodeKind::SliceLvalue
    )
}

// ---------------------------------------------------------------------------
// Types, params, formals
// ---------------------------------------------------------------------------

/// The name leaf of a `Type` node.
pub fn type_name(db: &SyntaxDb, ty: NodeId) -> NodeId {
    db.child_of_kind(ty, NodeKind::UpperIdent)
        .expect("Type node without name")
}

/// The `Params` child of a `Type` node, if present.
pub fn type_params(db: &SyntaxDb, ty: NodeId) -> Option<NodeId> {
    db.child_of_kind(ty, NodeKind::Params)
}

/// The `Param` children of a `Params` node.
pub fn params_list(db: &SyntaxDb, params: NodeId) -> Vec<NodeId> {
    db.children_of_kind(params, NodeKind::Param)
}

/// The single child of a `Param` node: a `Type` or an expression.
pub fn param_inner(db: &SyntaxDb, param: NodeId) -> NodeId {
    db.children(param)[0]
}

/// Returns `true` if this `Param` wraps an integer expression (not a type).
pub fn param_is_int(db: &SyntaxDb, param: NodeId) -> bool {
    db.kind(param_inner(db, param)) != NodeKind::Type
}

/// The `ParamFormal` children of a `ParamFormals` node.
pub fn param_formals_list(db: &SyntaxDb, pf: NodeId) -> Vec<NodeId> {
    db.children_of_kind(pf, NodeKind::ParamFormal)
}

/// For an `Integer n` formal, the `n` leaf.
pub fn param_formal_int_name(db: &SyntaxDb, pf: NodeId) -> Option<NodeId> {
    let ch = db.children(pf);
    if ch.len() == 2
        && db.kind(ch[0]) == NodeKind::UpperIdent
        && db.text(ch[0]) == "Integer"
        && db.kind(ch[1]) == NodeKind::LowerIdent
    {
        Some(ch[1])
    } else {
        None
    }
}

/// For a `type T` formal, the `T` leaf.
pub fn param_formal_type_name(db: &SyntaxDb, pf: NodeId) -> Option<NodeId> {
    let ch = db.children(pf);
    if ch.len() == 2 && db.kind(ch[1]) == NodeKind::UpperIdent && db.kind(ch[0]) == NodeKind::Token
    {
        Some(ch[1])
    } else {
        None
    }
}

/// For a concrete formal, the wrapped `Param` node.
pub fn param_formal_param(db: &SyntaxDb, pf: NodeId) -> Option<NodeId> {
    db.child_of_kind(pf, NodeKind::Param)
}

/// The `ArgFormal` children of an `ArgFormals` node.
pub fn arg_formals_list(db: &SyntaxDb, af: NodeId) -> Vec<NodeId> {
    db.children_of_kind(af, NodeKind::ArgFormal)
}

/// The type of an `ArgFormal`.
pub fn arg_formal_type(db: &SyntaxDb, af: NodeId) -> NodeId {
    db.child_of_kind(af, NodeKind::Type)
        .expect("ArgFormal without type")
}

/// The name leaf of an `ArgFormal`.
pub fn arg_formal_name(db: &SyntaxDb, af: NodeId) -> NodeId {
    db.child_of_kind(af, NodeKind::LowerIdent)
        .expect("ArgFormal without name")
}

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// The name leaf of a `ModuleId`, `TypeId`, or enum-name lookup.
pub fn id_name(db: &SyntaxDb, id: NodeId) -> NodeId {
    match db.kind(id) {
        NodeKind::FunctionId => db
            .child_of_kind(id, NodeKind::LowerIdent)
            .expect("FunctionId without name"),
        _ => db
            .child_of_kind(id, NodeKind::UpperIdent)
            .expect("id node without name"),
    }
}

/// The `ParamFormals` child of a `ModuleId`/`FunctionId`/`TypeId`, if present.
pub fn id_param_formals(db: &SyntaxDb, id: NodeId) -> Option<NodeId> {
    db.child_of_kind(id, NodeKind::ParamFormals)
}

/// The name of a `TypeDefEnum`: its last upper-case identifier child (the
/// tags come first).
pub fn enum_name(db: &SyntaxDb, e: NodeId) -> NodeId {
    *db.children_of_kind(e, NodeKind::UpperIdent)
        .last()
        .expect("enum without name")
}

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

/// The `ModuleId` of a `ModuleDef`.
pub fn module_def_id(db: &SyntaxDb, m: NodeId) -> NodeId {
    db.child_of_kind(m, NodeKind::ModuleId)
        .expect("ModuleDef without ModuleId")
}

/// The `ArgFormals` of a `ModuleDef`, if present.
pub fn module_def_arg_formals(db: &SyntaxDb, m: NodeId) -> Option<NodeId> {
    db.child_of_kind(m, NodeKind::ArgFormals)
}

/// The module-body statements of a `ModuleDef`: input definitions,
/// submodule declarations, methods, rules, and ordinary statements.
pub fn module_def_stmts(db: &SyntaxDb, m: NodeId) -> Vec<NodeId> {
    db.children(m)
        .iter()
        .copied()
        .filter(|&c| {
            matches!(
                db.kind(c),
                NodeKind::InputDef
                    | NodeKind::SubmoduleDecl
                    | NodeKind::MethodDef
                    | NodeKind::RuleDef
            ) || db.kind(c).is_stmt()
        })
        .collect()
}

/// The type of an `InputDef`.
pub fn input_def_type(db: &SyntaxDb, i: NodeId) -> NodeId {
    db.child_of_kind(i, NodeKind::Type)
        .expect("InputDef without type")
}

/// The name leaf of an `InputDef`.
pub fn input_def_name(db: &SyntaxDb, i: NodeId) -> NodeId {
    db.child_of_kind(i, NodeKind::LowerIdent)
        .expect("InputDef without name")
}

/// The default-value expression of an `InputDef`, if present.
pub fn input_def_default(db: &SyntaxDb, i: NodeId) -> Option<NodeId> {
    expr_children(db, i).into_iter().next()
}

/// The type of a `SubmoduleDecl`.
pub fn submodule_type(db: &SyntaxDb, s: NodeId) -> NodeId {
    db.child_of_kind(s, NodeKind::Type)
        .expect("SubmoduleDecl without type")
}

/// The name leaf of a `SubmoduleDecl`.
pub fn submodule_name(db: &SyntaxDb, s: NodeId) -> NodeId {
    db.child_of_kind(s, NodeKind::LowerIdent)
        .expect("SubmoduleDecl without name")
}

/// The `Args` of a `SubmoduleDecl`, if present.
pub fn submodule_args(db: &SyntaxDb, s: NodeId) -> Option<NodeId> {
    db.child_of_kind(s, NodeKind::Args)
}

/// The type of a `MethodDef`.
pub fn method_def_type(db: &SyntaxDb, m: NodeId) -> NodeId {
    db.child_of_kind(m, NodeKind::Type)
        .expect("MethodDef without type")
}

/// The name leaf of a `MethodDef`.
pub fn method_def_name(db: &SyntaxDb, m: NodeId) -> NodeId {
    db.child_of_kind(m, NodeKind::LowerIdent)
        .expect("MethodDef without name")
}

/// The `ArgFormals` of a `MethodDef`, if present.
pub fn method_def_arg_formals(db: &SyntaxDb, m: NodeId) -> Option<NodeId> {
    db.child_of_kind(m, NodeKind::ArgFormals)
}

// ---------------------------------------------------------------------------
// Functions
// ---------------------------------------------------------------------------

/// The return type of a `FunctionDef`.
pub fn function_def_type(db: &SyntaxDb, f: NodeId) -> NodeId {
    db.child_of_kind(f, NodeKind::Type)
        .expect("FunctionDef without type")
}

/// The `FunctionId` of a `FunctionDef`.
pub fn function_def_id(db: &SyntaxDb, f: NodeId) -> NodeId {
    db.child_of_kind(f, NodeKind::FunctionId)
        .expect("FunctionDef without FunctionId")
}

/// The `ArgFormals` of a `FunctionDef`, if present.
pub fn function_def_arg_formals(db: &SyntaxDb, f: NodeId) -> Option<NodeId> {
    db.child_of_kind(f, NodeKind::ArgFormals)
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// The type of a `VarBinding`.
pub fn var_binding_type(db: &SyntaxDb, vb: NodeId) -> NodeId {
    db.child_of_kind(vb, NodeKind::Type)
        .expect("VarBinding without type")
}

/// The `VarInit` children of a `VarBinding`.
pub fn var_binding_inits(db: &SyntaxDb, vb: NodeId) -> Vec<NodeId> {
    db.children_of_kind(vb, NodeKind::VarInit)
}

/// The name leaf of a `VarInit`.
pub fn var_init_name(db: &SyntaxDb, vi: NodeId) -> NodeId {
    db.child_of_kind(vi, NodeKind::LowerIdent)
        .expect("VarInit without name")
}

/// The initializer expression of a `VarInit`, if present.
pub fn var_init_rhs(db: &SyntaxDb, vi: NodeId) -> Option<NodeId> {
    expr_children(db, vi).into_iter().next()
}

/// The bound name leaves of a `LetBinding`.
pub fn let_binding_names(db: &SyntaxDb, lb: NodeId) -> Vec<NodeId> {
    db.children_of_kind(lb, NodeKind::LowerIdent)
}

/// The right-hand side of a `LetBinding`.
pub fn let_binding_rhs(db: &SyntaxDb, lb: NodeId) -> NodeId {
    expr_children(db, lb)
        .into_iter()
        .next()
        .expect("LetBinding without rhs")
}

/// The lvalue of a `VarAssign`, or `None` for the bit-unpacking form
/// (`{a, b} = e;`), which has several lvalues.
pub fn var_assign_lvalue(db: &SyntaxDb, va: NodeId) -> Option<NodeId> {
    let lvalues: Vec<NodeId> = db
        .children(va)
        .iter()
        .copied()
        .filter(|&c| is_lvalue(db.kind(c)))
        .collect();
    match (lvalues.len(), db.kind(db.children(va)[0])) {
        (1, k) if is_lvalue(k) => Some(lvalues[0]),
        _ => None,
    }
}

/// The right-hand side of a `VarAssign` or `RegWrite`.
pub fn assign_rhs(db: &SyntaxDb, va: NodeId) -> NodeId {
    *expr_children(db, va)
        .last()
        .expect("assignment without rhs")
}

/// The name leaf of a `SimpleLvalue`.
pub fn simple_lvalue_name(db: &SyntaxDb, lv: NodeId) -> NodeId {
    db.children(lv)[0]
}

/// The base lvalue of a `MemberLvalue`.
pub fn member_lvalue_base(db: &SyntaxDb, lv: NodeId) -> NodeId {
    db.children(lv)[0]
}

/// The field-name leaf of a `MemberLvalue`.
pub fn member_lvalue_field(db: &SyntaxDb, lv: NodeId) -> NodeId {
    db.children(lv)[2]
}

/// The condition expression of an `IfStmt`.
pub fn if_cond(db: &SyntaxDb, i: NodeId) -> NodeId {
    expr_children(db, i)
        .into_iter()
        .next()
        .expect("IfStmt without condition")
}

/// The arm statements of an `IfStmt`: the then-arm and, if present, the
/// else-arm.
pub fn if_arms(db: &SyntaxDb, i: NodeId) -> Vec<NodeId> {
    stmt_children(db, i)
}

/// The labeled parts of a `ForStmt`.
pub struct ForParts {
    /// The declared induction-variable type.
    pub ty: NodeId,
    /// The induction variable of the init clause.
    pub init_var: NodeId,
    /// The init expression.
    pub init: NodeId,
    /// The loop condition expression.
    pub cond: NodeId,
    /// The variable assigned by the update clause.
    pub upd_var: NodeId,
    /// The update expression.
    pub update: NodeId,
    /// The loop body statement.
    pub body: NodeId,
}

/// Decomposes a `ForStmt` into its labeled parts.
pub fn for_parts(db: &SyntaxDb, f: NodeId) -> ForParts {
    let ty = db
        .child_of_kind(f, NodeKind::Type)
        .expect("ForStmt without type");
    let idents = db.children_of_kind(f, NodeKind::LowerIdent);
    let exprs = expr_children(db, f);
    let body = stmt_children(db, f)[0];
    ForParts {
        ty,
        init_var: idents[0],
        init: exprs[0],
        cond: exprs[1],
        upd_var: idents[1],
        update: exprs[2],
        body,
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// `(pred, then, else)` of a `CondExpr`.
pub fn cond_expr_parts(db: &SyntaxDb, c: NodeId) -> (NodeId, NodeId, NodeId) {
    let ch = db.children(c);
    (ch[0], ch[2], ch[4])
}

/// `(left, op, right)` of a `BinopExpr`; `op` is the operator token leaf.
pub fn binop_parts(db: &SyntaxDb, b: NodeId) -> (NodeId, NodeId, NodeId) {
    let ch = db.children(b);
    (ch[0], ch[1], ch[2])
}

/// `(op, operand)` of a `UnopExpr`; `op` is the operator token leaf.
pub fn unop_parts(db: &SyntaxDb, u: NodeId) -> (NodeId, NodeId) {
    let ch = db.children(u);
    (ch[0], ch[1])
}

/// The inner expression of a `ParenExpr`.
pub fn paren_inner(db: &SyntaxDb, p: NodeId) -> NodeId {
    db.children(p)[1]
}

/// The name leaf of a `VarExpr`.
pub fn var_expr_name(db: &SyntaxDb, v: NodeId) -> NodeId {
    db.children(v)[0]
}

/// The `Params` of a `VarExpr`, if present.
pub fn var_expr_params(db: &SyntaxDb, v: NodeId) -> Option<NodeId> {
    db.child_of_kind(v, NodeKind::Params)
}

/// The callee of a `CallExpr`.
pub fn call_fcn(db: &SyntaxDb, c: NodeId) -> NodeId {
    db.children(c)[0]
}

/// The argument expressions of a `CallExpr`.
pub fn call_args(db: &SyntaxDb, c: NodeId) -> Vec<NodeId> {
    expr_children(db, c).into_iter().skip(1).collect()
}

/// The body expression of a `CaseExprItem` (the expression after the colon;
/// match labels come before it).
pub fn case_expr_item_body(db: &SyntaxDb, item: NodeId) -> NodeId {
    *expr_children(db, item)
        .last()
        .expect("CaseExprItem without body")
}

// ---------------------------------------------------------------------------
// Imports
// ---------------------------------------------------------------------------

/// The imported package-name leaves of an `ImportDecl`.
pub fn import_names(db: &SyntaxDb, i: NodeId) -> Vec<NodeId> {
    db.children(i)
        .iter()
        .copied()
        .filter(|&c| {
            matches!(db.kind(c), NodeKind::UpperIdent | NodeKind::LowerIdent)
        })
        .collect()
}

/// The imported backend-package-name leaves of a `BsvImportDecl`.
pub fn bsvimport_names(db: &SyntaxDb, i: NodeId) -> Vec<NodeId> {
    db.children_of_kind(i, NodeKind::UpperIdent)
}
