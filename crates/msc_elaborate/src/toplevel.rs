//! Validation of the top-level command-line argument.
//!
//! The `topLevel` string is re-parsed as a single primary expression: an
//! identifier optionally followed by `#(params)`. Integer parameters must
//! be unsized literals (the grammar admits arbitrary expressions, so the
//! check drills down to the literal); type parameters are validated
//! recursively.

use crate::driver::FatalError;
use crate::elaborator::{is_unsized_literal, parse_unsized_literal};
use crate::parametric::{ParamValue, ParametricUse};
use msc_diagnostics::error_colored;
use msc_syntax::parser::parse_expr_primary;
use msc_syntax::{ast, NodeKind, SyntaxDb};
use msc_common::NodeId;
use std::rc::Rc;

/// Validates and converts the top-level argument into a parametric use.
/// Returns `None` for an empty argument (typecheck-only runs).
pub fn validate_top_level(
    db: &mut SyntaxDb,
    top_level: &str,
) -> Result<Option<Rc<ParametricUse>>, FatalError> {
    if top_level.is_empty() {
        return Ok(None);
    }
    let fail = |detail: String| FatalError {
        message: format!(
            "{} invalid top-level argument {}: {}",
            error_colored("error:"),
            error_colored(&format!("'{top_level}'")),
            detail
        ),
    };

    let file = db.sources.add_source("<command line>", top_level.to_string());
    let expr = parse_expr_primary(db, file)
        .map_err(|_| fail("not a module or function id".to_string()))?;
    if db.kind(expr) != NodeKind::VarExpr {
        return Err(fail("not a module or function id".to_string()));
    }
    let name = db.text(ast::var_expr_name(db, expr)).to_string();
    let params = ast::var_expr_params(db, expr);
    build_use(db, &name, params, &fail).map(Some)
}

fn build_use(
    db: &SyntaxDb,
    name: &str,
    params: Option<NodeId>,
    fail: &dyn Fn(String) -> FatalError,
) -> Result<Rc<ParametricUse>, FatalError> {
    let mut result = ParametricUse {
        name: name.to_string(),
        escape: false,
        params: Vec::new(),
    };
    if let Some(params) = params {
        for p in ast::params_list(db, params) {
            let inner = ast::param_inner(db, p);
            if ast::param_is_int(db, p) {
                let text = db.text(inner);
                if db.kind(inner) != NodeKind::IntLiteral {
                    return Err(fail(format!(
                        "{} is not an integer literal",
                        error_colored(&format!("'{text}'"))
                    )));
                }
                if !is_unsized_literal(text) {
                    return Err(fail(format!(
                        "{} is a sized integer literal (must be unsized)",
                        error_colored(&format!("'{text}'"))
                    )));
                }
                let Some(v) = parse_unsized_literal(text) else {
                    return Err(fail(format!(
                        "{} is not an integer literal",
                        error_colored(&format!("'{text}'"))
                    )));
                };
                result.params.push(ParamValue::Int(v));
            } else {
                let ty_name = db.text(ast::type_name(db, inner)).to_string();
                let nested = build_use(db, &ty_name, ast::type_params(db, inner), fail)?;
                result.params.push(ParamValue::Use(nested));
            }
        }
    }
    Ok(Rc::new(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(s: &str) -> Result<Option<Rc<ParametricUse>>, FatalError> {
        let mut db = SyntaxDb::new();
        validate_top_level(&mut db, s)
    }

    #[test]
    fn empty_is_none() {
        assert!(validate("").unwrap().is_none());
    }

    #[test]
    fn bare_module_name() {
        let pu = validate("Top").unwrap().unwrap();
        assert_eq!(pu.name, "Top");
        assert!(pu.params.is_empty());
        assert!(!pu.escape);
    }

    #[test]
    fn function_with_int_param() {
        let pu = validate("f#(4)").unwrap().unwrap();
        assert_eq!(pu.name, "f");
        assert_eq!(pu.params.len(), 1);
        assert!(matches!(pu.params[0], ParamValue::Int(4)));
    }

    #[test]
    fn nested_type_params() {
        let pu = validate("Mod#(Bit#(8), 2)").unwrap().unwrap();
        assert_eq!(pu.params.len(), 2);
        match &pu.params[0] {
            ParamValue::Use(inner) => {
                assert_eq!(inner.name, "Bit");
                assert!(matches!(inner.params[0], ParamValue::Int(8)));
            }
            other => panic!("expected nested use, got {other:?}"),
        }
    }

    #[test]
    fn non_literal_param_rejected() {
        let err = validate("f#(n)").unwrap_err();
        assert!(err.message.contains("is not an integer literal"));
        let err = validate("f#(1+2)").unwrap_err();
        assert!(err.message.contains("is not an integer literal"));
    }

    #[test]
    fn sized_literal_rejected() {
        let err = validate("f#(8'hFF)").unwrap_err();
        assert!(err.message.contains("sized integer literal"));
    }

    #[test]
    fn non_identifier_rejected() {
        let err = validate("3").unwrap_err();
        assert!(err.message.contains("not a module or function id"));
        let err = validate("f#(").unwrap_err();
        assert!(err.message.contains("not a module or function id"));
    }
}
