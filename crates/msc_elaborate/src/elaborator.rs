//! The elaborator: a tree walker that statically evaluates integer-typed
//! expressions, unrolls loops, specializes parametrics, and rewrites MS
//! constructs into backend constructs.
//!
//! Evaluation is bottom-up (each node's exit action computes its value
//! from its children's values) with selected top-down control: package
//! roots, module definitions, and for statements walk their subtrees
//! manually because their emitted code does not follow the source
//! structure.

use crate::context::{IntegerContext, IntegerState};
use crate::emit::TranslatedCode;
use crate::keywords::{is_bsv_keyword, is_sv_keyword};
use crate::parametric::{ParamValue, ParametricUse};
use crate::steps::{ElabOverflow, ElabStep, StepLimiter};
use crate::value::{
    render_basic_error, render_elab_error, BasicError, ElabValues, Value,
};
use msc_common::{Ident, NodeId};
use msc_diagnostics::{error_colored, hl_colored, note_colored, Reporter};
use msc_syntax::ast;
use msc_syntax::context::quote;
use msc_syntax::{NodeKind, SyntaxDb, TokenKind};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Value reported for unelaborable integer expressions after the error;
/// keeps later uses of the variable from piling on more errors.
const DUMMY_INT: i64 = 42_424_242;

/// The elaborator. One instance handles all files of a compilation plus
/// every parametric instantiation the driver requests.
pub struct Elaborator<'a> {
    pub(crate) db: &'a SyntaxDb,
    pub(crate) reporter: &'a Reporter,
    pub(crate) ic: IntegerContext,
    pub(crate) values: ElabValues,
    /// Bare name of each non-concrete parametric, to its definition node.
    pub(crate) parametrics: HashMap<Ident, NodeId>,
    parametrics_emitted: HashSet<ParametricUse>,
    local_type_names: HashSet<Ident>,
    submodule_names: HashSet<Ident>,
    top_level: Option<Rc<ParametricUse>>,
    limits: StepLimiter,
    fatal: Option<ElabOverflow>,
}

impl<'a> Elaborator<'a> {
    /// Creates an elaborator over the given syntax database.
    ///
    /// `local_type_names` must hold every type and module name declared in
    /// the compiled files; it decides whether a parametric use needs the
    /// backend's identifier-escape syntax. `top_level` is the user-supplied
    /// top-level parametric, used to emit the function synthesis wrapper.
    pub fn new(
        db: &'a SyntaxDb,
        reporter: &'a Reporter,
        local_type_names: HashSet<Ident>,
        top_level: Option<Rc<ParametricUse>>,
        limits: StepLimiter,
    ) -> Self {
        Self {
            db,
            reporter,
            ic: IntegerContext::new(),
            values: ElabValues::new(),
            parametrics: HashMap::new(),
            parametrics_emitted: HashSet::new(),
            local_type_names,
            submodule_names: HashSet::new(),
            top_level,
            limits,
            fatal: None,
        }
    }

    /// Returns the fatal budget overflow, if elaboration hit one.
    pub fn fatal(&self) -> Option<&ElabOverflow> {
        self.fatal.as_ref()
    }

    /// Returns `true` if this specialization has already been emitted.
    pub fn is_parametric_emitted(&self, pu: &ParametricUse) -> bool {
        self.parametrics_emitted.contains(pu)
    }

    /// Registers an elaboration step at the given worklist depth; on
    /// overflow, records the fatal state (which stops further walking).
    pub(crate) fn register_step(&mut self, step: ElabStep, depth: u64) -> bool {
        match self.limits.register(step, depth, self.db) {
            Ok(()) => true,
            Err(overflow) => {
                self.fatal = Some(overflow);
                false
            }
        }
    }

    /// Clears the elaborated values of a definition subtree so it can be
    /// re-elaborated under new parameter bindings.
    pub fn clear_values(&mut self, node: NodeId) {
        self.values.clear_subtree(self.db, node);
    }

    /// Opens the binding scope for one parametric instantiation.
    pub(crate) fn enter_instance_level(&mut self) {
        self.ic.enter_immutable();
    }

    /// Closes the instantiation binding scope.
    pub(crate) fn exit_instance_level(&mut self) {
        self.ic.exit_level();
    }

    /// Binds an integer formal for an instantiation.
    pub(crate) fn bind_int(&mut self, name: Ident, value: i64) {
        self.ic.define_var(name, true);
        self.ic.set(name, value);
    }

    /// Binds a type formal for an instantiation.
    pub(crate) fn bind_type(&mut self, name: Ident, pu: Rc<ParametricUse>) {
        self.ic.set_type(name, pu);
    }

    // ------------------------------------------------------------------
    // Error reporting
    // ------------------------------------------------------------------

    fn report_basic(&self, node: NodeId, msg: impl Into<String>) {
        let err = BasicError {
            node,
            msg: msg.into(),
        };
        self.reporter
            .error(render_basic_error(self.db, &err), "", Some(node));
    }

    fn report_elab(&self, node: NodeId, value: &Value, msg: Option<&str>) {
        self.reporter.error(
            render_elab_error(self.db, node, value, msg),
            "",
            Some(node),
        );
    }

    /// The value of an expression that must have elaborated to an integer;
    /// reports and returns a dummy otherwise.
    fn integer_value(&mut self, expr: NodeId) -> i64 {
        match self.values.get(expr) {
            Value::Int(v) => v,
            other => {
                self.report_elab(expr, &other, None);
                DUMMY_INT
            }
        }
    }

    // ------------------------------------------------------------------
    // Walking
    // ------------------------------------------------------------------

    /// Walks a subtree, running enter/exit actions per node. Package
    /// roots, module definitions, and for statements are handled manually.
    pub fn walk(&mut self, node: NodeId) {
        if self.fatal.is_some() {
            return;
        }
        match self.db.kind(node) {
            NodeKind::PackageDef => self.package_def(node),
            NodeKind::ModuleDef => self.module_def(node),
            NodeKind::ForStmt => self.for_stmt(node),
            _ => {
                self.enter(node);
                let db = self.db;
                for &child in db.children(node) {
                    self.walk(child);
                }
                self.exit(node);
            }
        }
    }

    fn enter(&mut self, node: NodeId) {
        let db = self.db;
        match db.kind(node) {
            NodeKind::MethodDef
            | NodeKind::RuleDef
            | NodeKind::FunctionDef
            | NodeKind::BeginEndBlock => self.ic.enter_mutable(),
            NodeKind::IfStmt | NodeKind::CaseStmt | NodeKind::CaseExpr => {
                self.ic.enter_poisoning()
            }
            NodeKind::SubmoduleDecl => {
                let name = db.ident(ast::submodule_name(db, node));
                self.ic.define_var(name, false);
            }
            NodeKind::ArgFormal => {
                let name = db.ident(ast::arg_formal_name(db, node));
                self.ic.define_var(name, false);
            }
            _ => {}
        }
    }

    fn exit(&mut self, node: NodeId) {
        match self.db.kind(node) {
            NodeKind::MethodDef
            | NodeKind::RuleDef
            | NodeKind::BeginEndBlock
            | NodeKind::CaseStmt
            | NodeKind::CaseExpr => self.ic.exit_level(),
            NodeKind::IfStmt => self.exit_if_stmt(node),
            NodeKind::FunctionDef => self.exit_function_def(node),
            NodeKind::VarBinding => self.exit_var_binding(node),
            NodeKind::LetBinding => self.exit_let_binding(node),
            NodeKind::VarAssign => self.exit_var_assign(node),
            NodeKind::ParamFormal => self.exit_param_formal(node),
            NodeKind::Param => self.exit_param(node),
            NodeKind::Params => self.check_elaborated_params(node),
            NodeKind::ArgFormal => self.exit_arg_formal(node),
            NodeKind::VarExpr => self.exit_var_expr(node),
            NodeKind::IntLiteral => self.exit_int_literal(node),
            NodeKind::BinopExpr => self.exit_binop_expr(node),
            NodeKind::UnopExpr => self.exit_unop_expr(node),
            NodeKind::CondExpr => self.exit_cond_expr(node),
            NodeKind::CaseExprItem => self.exit_case_expr_item(node),
            NodeKind::ParenExpr => {
                let inner = ast::paren_inner(self.db, node);
                let v = self.values.get(inner);
                self.values.set(node, v);
            }
            NodeKind::CallExpr => self.exit_call_expr(node),
            NodeKind::FunctionId | NodeKind::TypeId | NodeKind::ModuleId => {
                self.exit_parametric_id(node)
            }
            NodeKind::Type => self.exit_type(node),
            NodeKind::TypeDefEnum | NodeKind::TypeDefStruct => {
                let semi = *self.db.children(node).last().unwrap();
                self.values
                    .set(semi, Value::Text(" deriving(Bits, Eq, FShow);"));
            }
            NodeKind::ImportDecl => self.values.set(node, Value::Skip),
            NodeKind::BsvImportDecl => self.exit_bsvimport_decl(node),
            NodeKind::LowerIdent => self.check_lower_ident(node),
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Literals and expressions
    // ------------------------------------------------------------------

    fn exit_int_literal(&mut self, node: NodeId) {
        let text = self.db.text(node);
        if is_unsized_literal(text) {
            if let Some(v) = parse_unsized_literal(text) {
                self.values.set(node, Value::Int(v));
            }
        }
    }

    fn exit_binop_expr(&mut self, node: NodeId) {
        let db = self.db;
        let (left, op, right) = ast::binop_parts(db, node);
        let op_kind = db.leaf_token_kind(op);
        let op_text = db.text(op).to_string();
        let lv = self.values.get(left);
        let rv = self.values.get(right);
        let res = match (&lv, &rv) {
            (Value::Int(l), Value::Int(r)) => int_binop(node, op_kind, &op_text, *l, *r),
            (Value::Bool(l), Value::Bool(r)) => match op_kind {
                TokenKind::AmpAmp => Value::Bool(*l && *r),
                TokenKind::PipePipe => Value::Bool(*l || *r),
                _ => BasicError::value(
                    node,
                    format!(
                        "{} is not a valid operator for Bool values",
                        error_colored(&op_text)
                    ),
                ),
            },
            (Value::Int(_), Value::Bool(_)) => BasicError::value(
                node,
                "operands have values of incompatible types (Integer and Bool)",
            ),
            (Value::Bool(_), Value::Int(_)) => BasicError::value(
                node,
                "operands have values of incompatible types (Bool and Integer)",
            ),
            _ => Value::combine(&lv, &rv),
        };
        self.values.set(node, res);
    }

    fn exit_unop_expr(&mut self, node: NodeId) {
        let db = self.db;
        let (op, operand) = ast::unop_parts(db, node);
        let op_kind = db.leaf_token_kind(op);
        let op_text = db.text(op).to_string();
        let value = self.values.get(operand);
        let res = match value {
            Value::Int(v) => {
                let parity = (v.count_ones() & 1) as i64;
                match op_kind {
                    TokenKind::Tilde => Value::Int(!v),
                    TokenKind::Amp => Value::Int((v == -1) as i64),
                    TokenKind::TildeAmp => Value::Int((v != -1) as i64),
                    TokenKind::Pipe => Value::Int((v != 0) as i64),
                    TokenKind::TildePipe => Value::Int((v == 0) as i64),
                    TokenKind::Caret => Value::Int(parity),
                    TokenKind::CaretTilde | TokenKind::TildeCaret => Value::Int(1 - parity),
                    TokenKind::Plus => Value::Int(v),
                    TokenKind::Minus => Value::Int(v.wrapping_neg()),
                    _ => BasicError::value(
                        node,
                        format!(
                            "{} is not a valid unary operator for an Integer value",
                            error_colored(&op_text)
                        ),
                    ),
                }
            }
            Value::Bool(b) => match op_kind {
                TokenKind::Bang => Value::Bool(!b),
                _ => BasicError::value(
                    node,
                    format!(
                        "{} is not a valid unary operator for a Bool value",
                        error_colored(&op_text)
                    ),
                ),
            },
            other => other, // propagate errors and non-elaboration
        };
        self.values.set(node, res);
    }

    fn exit_cond_expr(&mut self, node: NodeId) {
        let db = self.db;
        let (pred, then_e, else_e) = ast::cond_expr_parts(db, node);
        let pred_v = self.values.get(pred);
        let res = match pred_v {
            Value::Bool(b) => {
                let taken = if b { then_e } else { else_e };
                match self.values.get(taken) {
                    v @ (Value::Int(_) | Value::Bool(_)) => v,
                    _ => {
                        let mut tc = TranslatedCode::new();
                        tc.start(node);
                        tc.text("(");
                        tc.node(taken, db, &self.values);
                        tc.text(")");
                        tc.end();
                        Value::Fragment(Rc::new(tc))
                    }
                }
            }
            Value::Int(_) => BasicError::value(pred, "$CTX has type Integer, should be Bool"),
            _ => {
                // Errors from the non-taken branch are suppressed only when
                // the predicate is static; here nothing is static, so pool
                // everything.
                let v = Value::combine(&pred_v, &self.values.get(then_e));
                Value::combine(&v, &self.values.get(else_e))
            }
        };
        self.values.set(node, res);
    }

    fn exit_case_expr_item(&mut self, node: NodeId) {
        // The backend does not parse compound expressions correctly in
        // case-expression bodies, so wrap each body in parentheses. The
        // value goes on the body node, not the item.
        let db = self.db;
        let body = ast::case_expr_item_body(db, node);
        let mut tc = TranslatedCode::new();
        tc.start(body);
        tc.text("(");
        tc.node(body, db, &self.values);
        tc.text(")");
        tc.end();
        self.values.set(body, Value::Fragment(Rc::new(tc)));
    }

    fn exit_call_expr(&mut self, node: NodeId) {
        let db = self.db;
        let fcn = ast::call_fcn(db, node);
        let args = ast::call_args(db, node);
        let is_log2 = db.kind(fcn) == NodeKind::VarExpr
            && ast::var_expr_params(db, fcn).is_none()
            && db.ident(ast::var_expr_name(db, fcn)) == db.names.log2;
        if !is_log2 || args.len() != 1 {
            return;
        }
        let v = self.values.get(args[0]);
        let res = match v {
            Value::Int(val) => {
                let log = if val > 0 {
                    63 - (val as u64).leading_zeros() as i64
                } else {
                    0
                };
                Value::Int(log)
            }
            Value::None | Value::Bool(_) => BasicError::value(
                node,
                "log2() requires an Integer expression as an argument",
            ),
            other => other, // propagate errors
        };
        self.values.set(node, res);
    }

    fn exit_var_expr(&mut self, node: NodeId) {
        let db = self.db;
        let name_node = ast::var_expr_name(db, node);
        match ast::var_expr_params(db, node) {
            None => {
                let name = db.ident(name_node);
                let res = if name == db.names.true_ {
                    Value::Bool(true)
                } else if name == db.names.false_ {
                    Value::Bool(false)
                } else {
                    match self.ic.get(name) {
                        None => {
                            BasicError::value(name_node, "$CTX is not an Integer variable")
                        }
                        Some(cell) => match cell.state {
                            IntegerState::Invalid => BasicError::value(
                                name_node,
                                "Integer variable $CTX is uninitialized",
                            ),
                            IntegerState::Poisoned => BasicError::value(
                                name_node,
                                "Integer variable $CTX is poisoned (it was set inside an \
                                 if/else or case statement, so its value is unknown at \
                                 compilation time)",
                            ),
                            IntegerState::Valid => Value::Int(cell.value),
                        },
                    }
                };
                self.values.set(node, res);
            }
            Some(params) => {
                self.check_elaborated_params(params);
                let name = db.text(name_node).to_string();
                let pu = self.pu_from_params(&name, Some(params));
                self.values.set(node, Value::Parametric(pu));
            }
        }
    }

    // ------------------------------------------------------------------
    // Bindings and assignments
    // ------------------------------------------------------------------

    fn exit_var_binding(&mut self, node: NodeId) {
        let db = self.db;
        let ty = ast::var_binding_type(db, node);
        if db.ident(ast::type_name(db, ty)) == db.names.integer {
            if ast::type_params(db, ty).is_some() {
                self.report_basic(node, "Integer type cannot have parameters");
            }
            for init in ast::var_binding_inits(db, node) {
                let name = db.ident(ast::var_init_name(db, init));
                self.ic.define_var(name, true);
                if let Some(rhs) = ast::var_init_rhs(db, init) {
                    let v = self.integer_value(rhs);
                    self.ic.set(name, v);
                }
            }
            self.values.set(node, Value::Skip);
        } else {
            for init in ast::var_binding_inits(db, node) {
                let name = db.ident(ast::var_init_name(db, init));
                self.ic.define_var(name, false);
            }
        }
    }

    fn exit_let_binding(&mut self, node: NodeId) {
        let db = self.db;
        let rhs = ast::let_binding_rhs(db, node);
        let names = ast::let_binding_names(db, node);
        if let Value::Int(v) = self.values.get(rhs) {
            if names.len() != 1 {
                self.report_basic(
                    node,
                    "cannot assign an Integer value to multiple variables with unknown types",
                );
            } else {
                let name = db.ident(names[0]);
                self.ic.define_var(name, true);
                self.ic.set(name, v);
                self.values.set(node, Value::Skip);
                return;
            }
        }
        for name_node in names {
            let name = db.ident(name_node);
            self.ic.define_var(name, false);
        }
    }

    fn exit_var_assign(&mut self, node: NodeId) {
        let db = self.db;
        // The bit-unpacking form never involves Integers (they cannot be
        // bit-unpacked), so only simple and member lvalues matter here.
        let Some(lvalue) = ast::var_assign_lvalue(db, node) else {
            return;
        };
        match db.kind(lvalue) {
            NodeKind::SimpleLvalue => {
                let name = db.ident(lvalue);
                if self.ic.is_integer(name) {
                    let rhs = ast::assign_rhs(db, node);
                    let v = self.integer_value(rhs);
                    self.ic.set(name, v);
                    self.values.set(node, Value::Skip);
                }
            }
            NodeKind::MemberLvalue => {
                let base = ast::member_lvalue_base(db, lvalue);
                if db.kind(base) != NodeKind::SimpleLvalue {
                    return;
                }
                if !self.submodule_names.contains(&db.ident(base)) {
                    return;
                }
                // Rewrite `sub.field = e;` into the synthesized input-wire
                // method call `sub.field___input(e);`.
                let field = ast::member_lvalue_field(db, lvalue);
                let rhs = ast::assign_rhs(db, node);
                let mut tc = TranslatedCode::new();
                tc.start(node);
                tc.start(lvalue);
                tc.node(base, db, &self.values);
                tc.text(&format!(".{}___input", db.text(field)));
                tc.end();
                tc.text("(");
                tc.node(rhs, db, &self.values);
                tc.text(");");
                tc.end();
                self.values.set(node, Value::Fragment(Rc::new(tc)));
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Formals and params
    // ------------------------------------------------------------------

    fn exit_param_formal(&mut self, node: NodeId) {
        let db = self.db;
        if let Some(int_name) = ast::param_formal_int_name(db, node) {
            // Bound when elaborating an instance; never poisoned because
            // the binding level is fresh per instantiation.
            if let Some(cell) = self.ic.get(db.ident(int_name)) {
                debug_assert_eq!(cell.state, IntegerState::Valid);
                self.values.set(node, Value::Int(cell.value));
            }
        } else if let Some(type_name) = ast::param_formal_type_name(db, node) {
            if let Some(pu) = self.ic.get_type(db.ident(type_name)) {
                self.values.set(node, Value::Parametric(pu));
            }
        } else if let Some(param) = ast::param_formal_param(db, node) {
            let v = self.values.get(param);
            self.values.set(node, v);
        }
    }

    fn exit_param(&mut self, node: NodeId) {
        let inner = ast::param_inner(self.db, node);
        let v = self.values.get(inner);
        self.values.set(node, v);
    }

    fn exit_arg_formal(&mut self, node: NodeId) {
        let db = self.db;
        let ty = ast::arg_formal_type(db, node);
        if db.ident(ast::type_name(db, ty)) == db.names.integer {
            self.report_basic(
                ty,
                "arguments cannot be of Integer type (use a parameter instead)",
            );
        }
    }

    /// Checks that every integer-typed expression under `node` has a
    /// statically evaluated value, reporting an elaboration error for each
    /// outermost expression that does not.
    fn check_elaborated_params(&mut self, node: NodeId) {
        let db = self.db;
        for &child in db.children(node) {
            if db.kind(child).is_expr() {
                let v = self.values.get(child);
                if !v.is_int() {
                    self.report_elab(child, &v, None);
                }
            } else {
                self.check_elaborated_params(child);
            }
        }
    }

    // ------------------------------------------------------------------
    // Parametric-use construction
    // ------------------------------------------------------------------

    fn escapes(&self, name: &str) -> bool {
        name.starts_with(|c: char| c.is_ascii_lowercase())
            || self
                .local_type_names
                .contains(&self.db.interner.intern(name))
    }

    /// Builds a parametric use from a `Params` list (a use site).
    fn pu_from_params(&mut self, name: &str, params: Option<NodeId>) -> Rc<ParametricUse> {
        let db = self.db;
        let mut result = ParametricUse {
            name: name.to_string(),
            escape: self.escapes(name),
            params: Vec::new(),
        };
        if let Some(params) = params {
            for p in ast::params_list(db, params) {
                if ast::param_is_int(db, p) {
                    match self.values.get(p) {
                        Value::Int(v) => result.params.push(ParamValue::Int(v)),
                        other => {
                            self.report_elab(ast::param_inner(db, p), &other, None)
                        }
                    }
                } else {
                    match self.values.get(p) {
                        Value::Parametric(pu) => result.params.push(ParamValue::Use(pu)),
                        _ => {
                            let ty = ast::param_inner(db, p);
                            let ty_name = db.text(ast::type_name(db, ty)).to_string();
                            let nested =
                                self.pu_from_params(&ty_name, ast::type_params(db, ty));
                            result.params.push(ParamValue::Use(nested));
                        }
                    }
                }
            }
        }
        Rc::new(result)
    }

    /// Builds a parametric use from elaborated `ParamFormals` (a
    /// definition being specialized, with its formals bound).
    fn pu_from_formals(&mut self, name: &str, formals: Option<NodeId>) -> Rc<ParametricUse> {
        let db = self.db;
        let mut result = ParametricUse {
            name: name.to_string(),
            escape: self.escapes(name),
            params: Vec::new(),
        };
        if let Some(formals) = formals {
            self.check_elaborated_params(formals);
            for pf in ast::param_formals_list(db, formals) {
                match self.values.get(pf) {
                    Value::Int(v) => result.params.push(ParamValue::Int(v)),
                    Value::Parametric(pu) => result.params.push(ParamValue::Use(pu)),
                    _ => {
                        let Some(p) = ast::param_formal_param(db, pf) else {
                            continue; // unbound formal; already diagnosed
                        };
                        if ast::param_is_int(db, p) {
                            match self.values.get(p) {
                                Value::Int(v) => result.params.push(ParamValue::Int(v)),
                                v => self.report_elab(ast::param_inner(db, p), &v, None),
                            }
                        } else if let Value::Parametric(pu) = self.values.get(p) {
                            result.params.push(ParamValue::Use(pu));
                        } else {
                            let ty = ast::param_inner(db, p);
                            let ty_name = db.text(ast::type_name(db, ty)).to_string();
                            let nested =
                                self.pu_from_params(&ty_name, ast::type_params(db, ty));
                            result.params.push(ParamValue::Use(nested));
                        }
                    }
                }
            }
        }
        Rc::new(result)
    }

    /// Shared exit action for `FunctionId`, `TypeId`, and `ModuleId`:
    /// parametric ids record themselves as emitted specializations.
    fn exit_parametric_id(&mut self, node: NodeId) {
        let db = self.db;
        if let Some(formals) = ast::id_param_formals(db, node) {
            let name = db.text(ast::id_name(db, node)).to_string();
            let pu = self.pu_from_formals(&name, Some(formals));
            self.parametrics_emitted.insert((*pu).clone());
            self.values.set(node, Value::Parametric(pu));
        }
    }

    fn exit_type(&mut self, node: NodeId) {
        let db = self.db;
        let name_node = ast::type_name(db, node);
        let name = db.text(name_node).to_string();
        let params = ast::type_params(db, node);
        if let Some(formal_pu) = self.ic.get_type(db.ident(name_node)) {
            match params {
                None => self.values.set(node, Value::Parametric(formal_pu)),
                Some(params) => {
                    // Curry: given T bound to Vector#(4), T#(Reg#(Bit#(8)))
                    // elaborates to Vector#(4, Reg#(Bit#(8))).
                    let extra = self.pu_from_params("", Some(params));
                    let mut merged = formal_pu.params.clone();
                    merged.extend(extra.params.iter().cloned());
                    let curried = ParametricUse {
                        name: formal_pu.name.clone(),
                        escape: formal_pu.escape,
                        params: merged,
                    };
                    self.values.set(node, Value::Parametric(Rc::new(curried)));
                }
            }
        } else if self.local_type_names.contains(&db.ident(name_node)) {
            if let Some(params) = params {
                self.check_elaborated_params(params);
                let pu = self.pu_from_params(&name, Some(params));
                self.values.set(node, Value::Parametric(pu));
            }
        }
    }

    // ------------------------------------------------------------------
    // Imports and identifier hygiene
    // ------------------------------------------------------------------

    fn exit_bsvimport_decl(&mut self, node: NodeId) {
        let db = self.db;
        let mut tc = TranslatedCode::new();
        tc.start(node);
        for name in ast::bsvimport_names(db, node) {
            tc.text("import ");
            tc.node(name, db, &self.values);
            tc.text("::*;");
            tc.newline();
        }
        tc.end();
        self.values.set(node, Value::Fragment(Rc::new(tc)));
    }

    fn check_lower_ident(&mut self, node: NodeId) {
        let db = self.db;
        let id = db.text(node);
        let err = |what: String| {
            format!(
                "lowercase identifier {} {}, which is forbidden",
                quote(db, node),
                what
            )
        };
        if id.starts_with("mk") {
            self.report_basic(node, err(format!("begins with {}", hl_colored("'mk'"))));
        }
        if id.contains("___input") {
            self.report_basic(node, err(format!("contains {}", hl_colored("'___input'"))));
        }
        if is_sv_keyword(id) {
            self.report_basic(node, err("is a SystemVerilog keyword".to_string()));
        }
        if is_bsv_keyword(id) {
            self.report_basic(node, err("is a Bluespec (BSV) keyword".to_string()));
        }
    }

    // ------------------------------------------------------------------
    // Control structures
    // ------------------------------------------------------------------

    fn exit_if_stmt(&mut self, node: NodeId) {
        self.ic.exit_level(); // the arm's poisoning level
        let db = self.db;
        let cond = ast::if_cond(db, node);
        let Some(taken) = self.values.get(cond).as_bool() else {
            // Condition not static: both branches stay; the poisoning
            // level already marked any mutated ancestors.
            return;
        };
        let arms = ast::if_arms(db, node);
        let has_else = arms.len() == 2;
        let mut tc = TranslatedCode::new();
        tc.start(node);
        tc.text(if taken {
            "/* taken if */ "
        } else if has_else {
            "/* taken else */ "
        } else {
            "/* non-taken if */ "
        });
        // The if statement opened a lexical scope, so the surviving branch
        // keeps one via begin/end.
        if taken {
            tc.text("begin ");
            tc.node(arms[0], db, &self.values);
            tc.text(" end");
        } else if has_else {
            tc.text("begin ");
            tc.node(arms[1], db, &self.values);
            tc.text(" end");
        }
        tc.end();
        self.values.set(node, Value::Fragment(Rc::new(tc)));
    }

    fn for_stmt(&mut self, node: NodeId) {
        let db = self.db;
        let parts = ast::for_parts(db, node);
        if db.ident(ast::type_name(db, parts.ty)) != db.names.integer {
            self.report_basic(parts.ty, "induction variable must be an Integer");
            return;
        }
        let var_text = db.text(parts.init_var).to_string();
        if db.text(parts.upd_var) != var_text {
            self.report_basic(
                parts.ty,
                format!(
                    "for loop must update (assign to the) induction variable, {var_text}"
                ),
            );
            return;
        }

        // The loop level is mutable: the body may modify the induction
        // variable, and a poisoning modification is caught by the
        // termination check below.
        self.ic.enter_mutable();
        self.walk(parts.init);
        let Value::Int(mut ind_var) = self.values.get(parts.init) else {
            let v = self.values.get(parts.init);
            self.report_elab(parts.init, &v, None);
            self.ic.exit_level();
            return;
        };
        let var = db.ident(parts.init_var);
        self.ic.define_var(var, true);
        self.ic.set(var, ind_var);

        let mut tc = TranslatedCode::new();
        tc.start(node);
        tc.text("/* for loop */");
        loop {
            self.clear_values(parts.cond);
            self.walk(parts.cond);
            let cond_v = self.values.get(parts.cond);
            let Some(cond) = cond_v.as_bool() else {
                self.report_elab(
                    parts.cond,
                    &cond_v,
                    Some(
                        "could not elaborate Boolean expression (make sure this is a \
                         comparison involving only Integers)",
                    ),
                );
                self.ic.exit_level();
                return;
            };
            if !cond {
                tc.end();
                self.values.set(node, Value::Fragment(Rc::new(tc)));
                self.ic.exit_level();
                return;
            }

            if !self.register_step(
                ElabStep::ForIteration {
                    node,
                    value: ind_var,
                },
                0,
            ) {
                self.ic.exit_level();
                return;
            }
            self.clear_values(parts.body);
            self.walk(parts.body);
            tc.start(parts.body);
            tc.text("begin ");
            tc.node(parts.body, db, &self.values);
            tc.text(" end");
            tc.newline();
            tc.end_with_info(format!(
                "for loop in {}, iteration with {}",
                hl_colored(&db.loc(node)),
                note_colored(&format!("{var_text} = {ind_var}"))
            ));

            self.clear_values(parts.update);
            self.walk(parts.update);
            let upd_v = self.values.get(parts.update);
            let Value::Int(next) = upd_v else {
                self.report_elab(parts.update, &upd_v, None);
                self.ic.exit_level();
                return;
            };
            ind_var = next;
            self.ic.set(var, ind_var);
        }
    }

    // ------------------------------------------------------------------
    // Modules
    // ------------------------------------------------------------------

    fn module_def(&mut self, node: NodeId) {
        let db = self.db;
        self.ic.enter_immutable();
        let module_id = ast::module_def_id(db, node);
        self.walk(module_id);
        let arg_formals = ast::module_def_arg_formals(db, node);
        if let Some(af) = arg_formals {
            self.walk(af);
        }
        self.submodule_names.clear();

        let stmts = ast::module_def_stmts(db, node);
        // Phase one: inputs, submodules, and plain statements (the
        // statements may define Integers that methods and rules read).
        for &stmt in &stmts {
            let kind = db.kind(stmt);
            if matches!(kind, NodeKind::InputDef | NodeKind::SubmoduleDecl) || kind.is_stmt()
            {
                self.walk(stmt);
            }
            if kind == NodeKind::SubmoduleDecl {
                self.submodule_names
                    .insert(db.ident(ast::submodule_name(db, stmt)));
            }
        }
        // Module arguments behave like submodules for input-wire rewrites.
        if let Some(af) = arg_formals {
            for formal in ast::arg_formals_list(db, af) {
                self.submodule_names
                    .insert(db.ident(ast::arg_formal_name(db, formal)));
            }
        }
        // Phase two: rules and methods (emitted rules-first, but
        // elaboration order between them does not matter).
        for &stmt in &stmts {
            if matches!(db.kind(stmt), NodeKind::RuleDef | NodeKind::MethodDef) {
                self.walk(stmt);
            }
        }
        self.ic.exit_level();

        if self.fatal.is_some() {
            return;
        }
        self.emit_module(node, module_id, arg_formals, &stmts);

        if let Some(top) = &self.top_level {
            if top.name == db.text(ast::id_name(db, module_id)) {
                if let Some(af) = arg_formals {
                    if !ast::arg_formals_list(db, af).is_empty() {
                        let msg = format!(
                            "top-level module {} cannot have arguments",
                            quote(db, ast::id_name(db, module_id))
                        );
                        self.report_basic(af, msg);
                    }
                }
            }
        }
    }

    /// Emits the interface/module pair for a module definition into a
    /// fresh fragment. The interface and module are separate recorded
    /// regions so backend errors reported at a module's first line anchor
    /// precisely.
    fn emit_module(
        &mut self,
        node: NodeId,
        module_id: NodeId,
        arg_formals: Option<NodeId>,
        stmts: &[NodeId],
    ) {
        let db = self.db;
        let mut tc = TranslatedCode::new();

        // Interface: every method's signature plus a synthesized setter
        // for every input.
        tc.start(node);
        tc.text("interface ");
        tc.node(module_id, db, &self.values);
        tc.text(";");
        tc.newline();
        for &stmt in stmts {
            match db.kind(stmt) {
                NodeKind::MethodDef => {
                    tc.text("  method ");
                    tc.node(ast::method_def_type(db, stmt), db, &self.values);
                    tc.text(" ");
                    tc.node(ast::method_def_name(db, stmt), db, &self.values);
                    tc.opt_node(ast::method_def_arg_formals(db, stmt), db, &self.values);
                    tc.text(";");
                    tc.newline();
                }
                NodeKind::InputDef => {
                    tc.text("  method Action ");
                    tc.node(ast::input_def_name(db, stmt), db, &self.values);
                    tc.text("___input(");
                    tc.node(ast::input_def_type(db, stmt), db, &self.values);
                    tc.text(" value);");
                    tc.newline();
                }
                _ => {}
            }
        }
        tc.text("endinterface");
        tc.newline();
        tc.newline();
        tc.end();

        // Module header, following the backend's constructor-naming
        // convention (mkName, escaped when parametric).
        tc.start(node);
        match self.values.get(module_id) {
            Value::Parametric(pu) => {
                tc.text("module \\mk");
                tc.text(&pu.render(true));
                tc.text(" ");
            }
            _ => {
                tc.text("module mk");
                tc.node(module_id, db, &self.values);
            }
        }
        if let Some(af) = arg_formals {
            tc.text("#");
            tc.node(af, db, &self.values);
        }
        tc.text("(");
        tc.node(module_id, db, &self.values);
        tc.text(");");
        tc.newline();

        // Body, in the order the backend requires: input wires and
        // submodules first, then rules, then methods.
        for &stmt in stmts {
            tc.start(stmt);
            match db.kind(stmt) {
                NodeKind::InputDef => {
                    let ty = ast::input_def_type(db, stmt);
                    let name = ast::input_def_name(db, stmt);
                    tc.text("  Wire#(");
                    tc.node(ty, db, &self.values);
                    tc.text(") ");
                    tc.node(name, db, &self.values);
                    match ast::input_def_default(db, stmt) {
                        Some(default) => {
                            tc.text(" <- mkDWire(");
                            tc.node(default, db, &self.values);
                            tc.text(");");
                        }
                        None => tc.text(" <- mkBypassWire;"),
                    }
                    tc.newline();
                }
                NodeKind::SubmoduleDecl => self.emit_submodule(&mut tc, stmt),
                kind if kind.is_stmt() => {
                    tc.text("  ");
                    tc.node(stmt, db, &self.values);
                    tc.newline();
                }
                _ => {}
            }
            tc.end();
        }
        for &stmt in stmts {
            tc.start(stmt);
            if db.kind(stmt) == NodeKind::RuleDef {
                // Every rule must fire every cycle.
                tc.text("  (* no_implicit_conditions, fire_when_enabled *) ");
                tc.node(stmt, db, &self.values);
                tc.newline();
            }
            tc.end();
        }
        for &stmt in stmts {
            tc.start(stmt);
            match db.kind(stmt) {
                NodeKind::MethodDef => {
                    tc.text("  ");
                    tc.node(stmt, db, &self.values);
                    tc.newline();
                }
                NodeKind::InputDef => {
                    let name = ast::input_def_name(db, stmt);
                    tc.text("  method Action ");
                    tc.node(name, db, &self.values);
                    tc.text("___input(");
                    tc.node(ast::input_def_type(db, stmt), db, &self.values);
                    tc.text(" value);");
                    tc.newline();
                    tc.text("    ");
                    tc.node(name, db, &self.values);
                    tc.text(" <= value;");
                    tc.newline();
                    tc.text("  endmethod");
                    tc.newline();
                }
                _ => {}
            }
            tc.end();
        }
        tc.text("endmodule");
        tc.newline();
        tc.newline();
        tc.end();
        self.values.set(node, Value::Fragment(Rc::new(tc)));
    }

    fn emit_submodule(&mut self, tc: &mut TranslatedCode, stmt: NodeId) {
        let db = self.db;
        let ty = ast::submodule_type(db, stmt);
        let name = ast::submodule_name(db, stmt);
        let args = ast::submodule_args(db, stmt);
        if db.ident(ast::type_name(db, ty)) == db.names.vector {
            // Vectors of submodules initialize through replicateM over the
            // element type's constructor.
            let Some(params) = ast::type_params(db, ty) else {
                self.report_basic(ty, "Vector must use parameters");
                return;
            };
            let param_list = ast::params_list(db, params);
            if param_list.len() != 2 {
                self.report_basic(ty, "Vector must use 2 parameters");
                return;
            }
            let elem = ast::param_inner(db, param_list[1]);
            if db.kind(elem) != NodeKind::Type {
                self.report_basic(param_list[1], "Vector's second parameter must be a type");
                return;
            }
            let ctor = self.module_ctor_name(elem);
            tc.text("  ");
            tc.node(ty, db, &self.values);
            tc.text(" ");
            tc.node(name, db, &self.values);
            tc.text(" <- replicateM(");
            tc.text(&ctor);
            tc.opt_node(args, db, &self.values);
            tc.text(");");
            tc.newline();
        } else {
            let ctor = self.module_ctor_name(ty);
            tc.text("  ");
            tc.node(ty, db, &self.values);
            tc.text(" ");
            tc.node(name, db, &self.values);
            tc.text(" <- ");
            tc.text(&ctor);
            tc.opt_node(args, db, &self.values);
            tc.text(";");
            tc.newline();
        }
    }

    /// Derives a module constructor name from an (elaborated) module type:
    /// `Counter` becomes `mkCounter`, and an escaped parametric type
    /// `\Shifter#(4) ` becomes `\mkShifter#(4) `.
    fn module_ctor_name(&self, ty: NodeId) -> String {
        let mut tc = TranslatedCode::new();
        tc.node(ty, self.db, &self.values);
        let type_name = tc.code().to_string();
        if let Some(rest) = type_name.strip_prefix('\\') {
            format!("\\mk{rest}")
        } else {
            let prefix = type_name.split('#').next().unwrap_or("");
            format!("mk{prefix}")
        }
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn exit_function_def(&mut self, node: NodeId) {
        let db = self.db;
        let fid = ast::function_def_id(db, node);
        let name = db.text(ast::id_name(db, fid)).to_string();
        let pu = self.pu_from_formals(&name, ast::id_param_formals(db, fid));
        if self.top_level.as_deref() == Some(&*pu) {
            self.emit_function_wrapper(node, &name, &pu);
        }
        self.ic.exit_level();
    }

    /// Emits the synthesis wrapper for the top-level function: an
    /// interface with a single `fn` method and a module implementing it by
    /// applying the function to the method arguments.
    fn emit_function_wrapper(&mut self, node: NodeId, name: &str, pu: &Rc<ParametricUse>) {
        let db = self.db;
        let fid = ast::function_def_id(db, node);
        let formals = ast::id_param_formals(db, fid);
        let mut ifc_name = name.to_string();
        if let Some(first) = ifc_name.get_mut(..1) {
            first.make_ascii_uppercase();
        }
        ifc_name.push_str("___");
        let mod_name = format!("mk{name}");
        let mut ifc_pu = (*self.pu_from_formals(&ifc_name, formals)).clone();
        ifc_pu.escape = true; // synthesized here, so never in the local-type set
        let mod_pu = self.pu_from_formals(&mod_name, formals);

        let ret_ty = ast::function_def_type(db, node);
        let arg_formals = ast::function_def_arg_formals(db, node);

        let mut tc = TranslatedCode::new();
        tc.start(node);
        tc.node(node, db, &self.values);
        tc.newline();
        tc.newline();
        tc.text("interface ");
        tc.text(&ifc_pu.render(false));
        tc.text(" ;");
        tc.newline();
        tc.text("  (* prefix=\"_\", result = \"out\" *)");
        tc.newline();
        tc.text("  method ");
        tc.node(ret_ty, db, &self.values);
        tc.text(" fn");
        tc.opt_node(arg_formals, db, &self.values);
        tc.text(";");
        tc.newline();
        tc.text("endinterface");
        tc.newline();
        tc.newline();
        tc.text("module ");
        tc.text(&mod_pu.render(false));
        tc.text(" ( ");
        tc.text(&ifc_pu.render(false));
        tc.text(" );");
        tc.newline();
        tc.text("  method ");
        tc.node(ret_ty, db, &self.values);
        tc.text(" fn");
        tc.opt_node(arg_formals, db, &self.values);
        tc.text(" = ");
        tc.text(&pu.render(false));
        tc.text(" (");
        if let Some(af) = arg_formals {
            let formals = ast::arg_formals_list(db, af);
            for (i, formal) in formals.iter().enumerate() {
                tc.node(ast::arg_formal_name(db, *formal), db, &self.values);
                if i + 1 < formals.len() {
                    tc.text(", ");
                }
            }
        }
        tc.text(");");
        tc.newline();
        tc.text("endmodule");
        tc.newline();
        tc.end();
        self.values.set(node, Value::Fragment(Rc::new(tc)));
    }

    // ------------------------------------------------------------------
    // Packages
    // ------------------------------------------------------------------

    fn package_def(&mut self, node: NodeId) {
        let db = self.db;
        for &decl in db.children(node) {
            let parametric = match db.kind(decl) {
                NodeKind::FunctionDef => {
                    let id = ast::function_def_id(db, decl);
                    ast::id_param_formals(db, id).map(|pf| (ast::id_name(db, id), pf))
                }
                NodeKind::ModuleDef => {
                    let id = ast::module_def_id(db, decl);
                    ast::id_param_formals(db, id).map(|pf| (ast::id_name(db, id), pf))
                }
                NodeKind::TypeDefSynonym | NodeKind::TypeDefStruct => {
                    let id = db
                        .child_of_kind(decl, NodeKind::TypeId)
                        .expect("type definition without TypeId");
                    ast::id_param_formals(db, id).map(|pf| (ast::id_name(db, id), pf))
                }
                NodeKind::Token => continue, // the EOF leaf
                _ => None,
            };
            match parametric {
                Some((name, formals)) => {
                    self.walk(formals);
                    if self.is_concrete(formals) {
                        self.walk(decl);
                    } else {
                        self.parametrics.insert(db.ident(name), decl);
                        self.values.set(decl, Value::Skip);
                    }
                }
                None => self.walk(decl),
            }
        }
    }

    /// A parametric definition is concrete when every formal already has a
    /// value (so it can be elaborated eagerly instead of on demand).
    fn is_concrete(&self, formals: NodeId) -> bool {
        let db = self.db;
        for pf in ast::param_formals_list(db, formals) {
            let v = self.values.get(pf);
            if ast::param_formal_int_name(db, pf).is_some() && !v.is_int() {
                return false;
            }
            if ast::param_formal_type_name(db, pf).is_some()
                && !matches!(v, Value::Parametric(_))
            {
                return false;
            }
        }
        true
    }
}

/// Returns `true` for integer literals without a size prefix (`42`,
/// `'h1F`), which are the ones the elaborator evaluates; sized literals
/// pass through to the backend as text.
pub fn is_unsized_literal(text: &str) -> bool {
    matches!(text.find('\''), None | Some(0))
}

/// Parses an unsized integer literal (decimal, or `'d`/`'b`/`'h` based).
pub fn parse_unsized_literal(text: &str) -> Option<i64> {
    let s = text.replace('_', "");
    match s.find('\'') {
        None => s.parse().ok(),
        Some(0) => {
            if s.len() < 3 {
                return None;
            }
            let digits = &s[2..];
            match s.as_bytes()[1].to_ascii_lowercase() {
                b'd' => digits.parse().ok(),
                b'b' => i64::from_str_radix(digits, 2).ok(),
                b'h' => i64::from_str_radix(digits, 16).ok(),
                _ => None,
            }
        }
        Some(_) => None,
    }
}

fn int_binop(node: NodeId, op: TokenKind, op_text: &str, l: i64, r: i64) -> Value {
    use TokenKind::*;
    match op {
        Plus => Value::Int(l.wrapping_add(r)),
        Minus => Value::Int(l.wrapping_sub(r)),
        Star => Value::Int(l.wrapping_mul(r)),
        Slash => Value::Int(if r != 0 { l / r } else { 0 }),
        Percent => Value::Int(if r != 0 { l % r } else { 0 }),
        StarStar => {
            let mut e: i64 = 1;
            let mut n = r;
            while n > 0 {
                e = e.wrapping_mul(l);
                n -= 1;
            }
            Value::Int(e)
        }
        Shl => Value::Int(l.wrapping_shl(r as u32)),
        Shr => Value::Int(l.wrapping_shr(r as u32)),
        Amp => Value::Int(l & r),
        Pipe => Value::Int(l | r),
        Caret => Value::Int(l ^ r),
        CaretTilde | TildeCaret => Value::Int(!(l ^ r)),
        Lt => Value::Bool(l < r),
        LtEq => Value::Bool(l <= r),
        Gt => Value::Bool(l > r),
        GtEq => Value::Bool(l >= r),
        EqEq => Value::Bool(l == r),
        NotEq => Value::Bool(l != r),
        _ => BasicError::value(
            node,
            format!(
                "{} is not a valid operator for Integer values",
                error_colored(op_text)
            ),
        ),
    }
}
