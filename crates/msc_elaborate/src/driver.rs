//! The translation driver.
//!
//! Emits the prelude, runs the elaborator over each file in topological
//! order, then iterates the worklist of pending parametric uses until
//! fixpoint: elaborating an instance may itself discover further
//! parametric uses, so the queue is drained round by round, bounded by
//! the step and depth counters. Finally, a parametric top-level module
//! gets a non-parametric wrapper (backend tooling cannot digest `#()` in
//! a top module's name).

use crate::elaborator::Elaborator;
use crate::emit::TranslatedCode;
use crate::parametric::ParamValue;
use crate::source_map::SourceMap;
use crate::steps::{ElabStep, StepLimiter};
use crate::toplevel::validate_top_level;
use msc_common::{Ident, NodeId};
use msc_diagnostics::{error_colored, hl_colored, note_colored, Reporter};
use msc_syntax::context::context_str;
use msc_syntax::{ast, NodeKind, SyntaxDb};
use std::collections::HashSet;

/// A fatal, non-recoverable driver error (invalid top-level argument or
/// elaboration budget overflow), with a fully rendered message.
#[derive(Debug)]
pub struct FatalError {
    /// The printable diagnostic.
    pub message: String,
}

const PRELUDE_TEXT: &str = include_str!("prelude.bsv");

/// The fixed text emitted at the top of the translated file, headed by the
/// version stamp.
pub fn prelude() -> String {
    format!(
        "// Produced by msc, version {}\n\n{}",
        env!("CARGO_PKG_VERSION"),
        PRELUDE_TEXT
    )
}

/// Collects every type and module name declared across the compiled files.
/// Needed up front because a parametric use of a local type emits
/// differently (escaped) from a use of a backend type.
pub(crate) fn collect_local_type_names(db: &SyntaxDb, trees: &[NodeId]) -> HashSet<Ident> {
    let mut names = HashSet::new();
    for &tree in trees {
        for &decl in db.children(tree) {
            match db.kind(decl) {
                NodeKind::ModuleDef => {
                    names.insert(db.ident(ast::id_name(db, ast::module_def_id(db, decl))));
                }
                NodeKind::TypeDefSynonym | NodeKind::TypeDefStruct => {
                    let id = db
                        .child_of_kind(decl, NodeKind::TypeId)
                        .expect("type definition without TypeId");
                    names.insert(db.ident(ast::id_name(db, id)));
                }
                NodeKind::TypeDefEnum => {
                    names.insert(db.ident(ast::enum_name(db, decl)));
                }
                _ => {}
            }
        }
    }
    names
}

/// Translates the parsed files (in topological order) into backend source,
/// elaborating all parametric instances reachable from the files and the
/// given top-level argument. User-facing errors accumulate in `reporter`;
/// the returned map is still built on a best-effort basis unless a fatal
/// condition aborts the run.
pub fn translate_files(
    db: &mut SyntaxDb,
    trees: &[NodeId],
    top_level: &str,
    reporter: &Reporter,
    limits: StepLimiter,
) -> Result<SourceMap, FatalError> {
    let top_pu = validate_top_level(db, top_level)?;
    let db: &SyntaxDb = db;

    let local_type_names = collect_local_type_names(db, trees);
    let mut elab = Elaborator::new(db, reporter, local_type_names, top_pu.clone(), limits);

    // Pass one: elaborate and emit every file; non-concrete parametrics
    // register themselves and emit nothing.
    let mut tc = TranslatedCode::new();
    tc.text(&prelude());
    for &tree in trees {
        elab.walk(tree);
        if let Some(overflow) = elab.fatal() {
            return Err(FatalError {
                message: overflow.message.clone(),
            });
        }
        tc.node(tree, db, &elab.values);
        tc.newline();
    }

    // Pass two: drain the worklist of parametric uses until fixpoint.
    let mut depth: u64 = 0;
    loop {
        depth += 1;
        let mut uses = tc.dequeue_parametric_uses();
        if depth == 1 {
            if let Some(top) = &top_pu {
                if !top.params.is_empty() {
                    uses.push((top.clone(), None));
                }
            }
        }
        if uses.is_empty() {
            break;
        }

        for (pu, emit_ctx) in uses {
            // Uses of backend types and other external parametrics resolve
            // nowhere; drop them silently.
            let name = db.interner.intern(&pu.name);
            let Some(&def) = elab.parametrics.get(&name) else {
                continue;
            };
            if elab.is_parametric_emitted(&pu) {
                continue;
            }
            if !elab.register_step(ElabStep::Parametric(pu.clone()), depth) {
                let overflow = elab.fatal().unwrap();
                return Err(FatalError {
                    message: overflow.message.clone(),
                });
            }

            let (formals_node, kind_str) = match db.kind(def) {
                NodeKind::FunctionDef => (
                    ast::id_param_formals(db, ast::function_def_id(db, def)),
                    "function",
                ),
                NodeKind::ModuleDef => (
                    ast::id_param_formals(db, ast::module_def_id(db, def)),
                    "module",
                ),
                NodeKind::TypeDefSynonym => (
                    ast::id_param_formals(
                        db,
                        db.child_of_kind(def, NodeKind::TypeId).unwrap(),
                    ),
                    "typedef",
                ),
                NodeKind::TypeDefStruct => (
                    ast::id_param_formals(
                        db,
                        db.child_of_kind(def, NodeKind::TypeId).unwrap(),
                    ),
                    "struct",
                ),
                other => panic!("unhandled parametric definition kind {other:?}"),
            };
            let formals_node = formals_node.expect("registered parametric without formals");
            let formals = ast::param_formals_list(db, formals_node);

            // Render the abstract definition (own whitespace rules, no
            // comments), e.g. `f#(Integer n, type T)`.
            let formal_strs: Vec<String> = formals
                .iter()
                .map(|&pf| {
                    if let Some(n) = ast::param_formal_int_name(db, pf) {
                        format!("Integer {}", db.text(n))
                    } else if let Some(n) = ast::param_formal_type_name(db, pf) {
                        format!("type {}", db.text(n))
                    } else {
                        db.text(pf).to_string()
                    }
                })
                .collect();
            let def_str = format!("{}#({})", pu.name, formal_strs.join(", "));

            let instantiation_error = |detail: &str| {
                let loc = match emit_ctx {
                    Some(ctx) => db.loc(ctx),
                    None => "command-line arg".to_string(),
                };
                let mut msg = format!(
                    "{} {} cannot instantiate {} from parametric {} {} defined at {}: {}",
                    hl_colored(&format!("{loc}:")),
                    error_colored("error:"),
                    error_colored(&format!("'{}'", pu.render(true))),
                    kind_str,
                    hl_colored(&def_str),
                    hl_colored(&db.loc(def)),
                    detail
                );
                if let Some(ctx) = emit_ctx {
                    msg.push('\n');
                    msg.push_str(&context_str(db, ctx, &[]));
                }
                reporter.error(msg, "", emit_ctx);
            };

            if pu.params.len() != formals.len() {
                instantiation_error(&format!(
                    "{} parameter{} required, {} given",
                    formals.len(),
                    if formals.len() > 1 { "s" } else { "" },
                    pu.params.len()
                ));
                continue;
            }

            elab.enter_instance_level();
            let mut bind_error = false;
            let mut bound_strs: Vec<String> = Vec::new();
            for (i, &pf) in formals.iter().enumerate() {
                if let Some(int_name) = ast::param_formal_int_name(db, pf) {
                    let ParamValue::Int(v) = pu.params[i] else {
                        instantiation_error(&format!("parameter {} is not an Integer", i + 1));
                        bind_error = true;
                        continue;
                    };
                    elab.bind_int(db.ident(int_name), v);
                    bound_strs.push(format!("{} = {}", db.text(int_name), v));
                } else if let Some(type_name) = ast::param_formal_type_name(db, pf) {
                    let ParamValue::Use(ref nested) = pu.params[i] else {
                        instantiation_error(&format!("parameter {} is not a type", i + 1));
                        bind_error = true;
                        continue;
                    };
                    elab.bind_type(db.ident(type_name), nested.clone());
                    bound_strs.push(format!("{} = {}", db.text(type_name), nested.render(true)));
                } else {
                    instantiation_error("partially specialized parametrics not yet allowed");
                    bind_error = true;
                }
            }
            if bind_error {
                elab.exit_instance_level();
                continue;
            }

            let param_info = format!(
                "{} {} with {}",
                kind_str,
                hl_colored(&def_str),
                note_colored(&bound_strs.join(", "))
            );

            elab.clear_values(def);
            elab.walk(def);
            elab.exit_instance_level();
            if let Some(overflow) = elab.fatal() {
                return Err(FatalError {
                    message: overflow.message.clone(),
                });
            }

            tc.start(def);
            tc.newline();
            tc.node(def, db, &elab.values);
            tc.newline();
            tc.end_with_info(param_info);
        }
    }

    // The top module handed to the backend; parametric tops get a
    // non-parametric wrapper because `#()` in a module name breaks both
    // simulation builds and Verilog output downstream.
    let mut top_module = String::new();
    if let Some(top) = &top_pu {
        top_module = format!("mk{}", top.render(false));
        if !top.params.is_empty() {
            if !elab.is_parametric_emitted(top) {
                reporter.error(
                    format!(
                        "{} cannot find top-level parametric {}",
                        error_colored("error:"),
                        error_colored(&format!("'{}'", top.render(false)))
                    ),
                    "",
                    None,
                );
            }
            let mut ifc = (**top).clone();
            if !ifc.name.starts_with(|c: char| c.is_ascii_uppercase()) {
                if let Some(first) = ifc.name.get_mut(..1) {
                    first.make_ascii_uppercase();
                }
                ifc.name.push_str("___");
            }
            tc.text("\n// Top-level wrapper module");
            tc.newline();
            tc.text("module mkTopLevel___( \\");
            tc.text(&ifc.render(false));
            tc.text(" );");
            tc.newline();
            tc.text("  \\");
            tc.text(&ifc.render(false));
            tc.text(" res <- \\mk");
            tc.text(&top.render(false));
            tc.text(" ;");
            tc.newline();
            tc.text("  return res;");
            tc.newline();
            tc.text("endmodule");
            tc.newline();
            top_module = "mkTopLevel___".to_string();
        }
    }

    Ok(tc.finish(&top_module))
}

#[cfg(test)]
mod tests {
    use super::*;
    use msc_syntax::parse_source;

    fn translate(
        sources: &[(&str, &str)],
        top: &str,
    ) -> (SyntaxDb, Reporter, Result<SourceMap, FatalError>) {
        translate_with_limits(sources, top, StepLimiter::new())
    }

    fn translate_with_limits(
        sources: &[(&str, &str)],
        top: &str,
        limits: StepLimiter,
    ) -> (SyntaxDb, Reporter, Result<SourceMap, FatalError>) {
        let mut db = SyntaxDb::new();
        let mut trees = Vec::new();
        for (name, src) in sources {
            trees.push(parse_source(&mut db, name, src).unwrap());
        }
        let reporter = Reporter::new(false);
        let res = translate_files(&mut db, &trees, top, &reporter, limits);
        (db, reporter, res)
    }

    fn line_col_of(code: &str, pos: usize) -> (u32, u32) {
        let line = code[..pos].bytes().filter(|&b| b == b'\n').count() as u32 + 1;
        let col = (pos - code[..pos].rfind('\n').map(|p| p + 1).unwrap_or(0)) as u32 + 1;
        (line, col)
    }

    #[test]
    fn version_banner_heads_output() {
        let (_, _, res) = translate(&[("t.ms", "module Top; endmodule")], "");
        let sm = res.unwrap();
        assert!(sm.code().starts_with("// Produced by msc, version"));
    }

    #[test]
    fn plain_module_split_into_interface_and_module() {
        let (_, reporter, res) = translate(
            &[(
                "t.ms",
                "module Counter; method Bool done = True; endmodule",
            )],
            "Counter",
        );
        assert!(!reporter.has_errors());
        let sm = res.unwrap();
        assert!(sm.code().contains("interface Counter;"));
        assert!(sm.code().contains("  method Bool done;"));
        assert!(sm.code().contains("module mkCounter(Counter);"));
        assert!(sm.code().contains("  method Bool done = True;"));
        assert_eq!(sm.top_module(), "mkCounter");
    }

    #[test]
    fn input_and_rule_rewrites() {
        // Scenario: inputs become wires plus synthesized setter methods,
        // and rules get the always-fire annotations.
        let (_, reporter, res) = translate(
            &[(
                "t.ms",
                "module M; input Bit#(8) x default = 0; rule r; endrule endmodule",
            )],
            "",
        );
        assert!(!reporter.has_errors());
        let sm = res.unwrap();
        let code = sm.code();
        assert!(code.contains("  method Action x___input(Bit#(8) value);"));
        assert!(code.contains("  Wire#(Bit#(8)) x <- mkDWire(0);"));
        assert!(code.contains("(* no_implicit_conditions, fire_when_enabled *)"));
        assert!(code.contains("    x <= value;"));
        assert!(code.contains("  endmethod"));
    }

    #[test]
    fn input_without_default_uses_bypass_wire() {
        let (_, _, res) = translate(
            &[("t.ms", "module M; input Bool go; endmodule")],
            "",
        );
        let code_map = res.unwrap();
        assert!(code_map.code().contains("  Wire#(Bool) go <- mkBypassWire;"));
    }

    #[test]
    fn submodule_input_assignment_rewrites_to_setter_call() {
        let (_, reporter, res) = translate(
            &[(
                "t.ms",
                "module Inner; input Bool go; endmodule\n\
                 module Outer; Inner sub; rule r; sub.go = True; endrule endmodule",
            )],
            "",
        );
        assert!(!reporter.has_errors());
        let sm = res.unwrap();
        assert!(sm.code().contains("sub.go___input(True);"));
        assert!(sm.code().contains("  Inner sub <- mkInner;"));
    }

    #[test]
    fn loop_unrolling_with_breadcrumbs() {
        // Scenario: a parametric function whose loop unrolls once per
        // iteration, each tagged with an iteration breadcrumb.
        let (_, reporter, res) = translate(
            &[(
                "t.ms",
                "function Bit#(n) f#(Integer n); Integer s = 0; \
                 for (Integer i = 0; i < n; i = i + 1) s = s + i; \
                 return 0; endfunction",
            )],
            "f#(4)",
        );
        assert!(!reporter.has_errors());
        let sm = res.unwrap();
        let code = sm.code();
        // The specialized function is emitted under its escaped name.
        assert!(code.contains("\\f#(4) "));
        assert_eq!(code.matches("begin ").count(), 4);
        // Breadcrumbs name each iteration.
        let pos = code.find("begin ").unwrap();
        let (line, col) = line_col_of(code, pos);
        let info = sm.context_info(line, col);
        assert!(info.contains("i = 0"), "info was: {info}");
        assert!(info.contains("for loop in"));
        // The instantiation breadcrumb encloses the loop ones.
        assert!(info.contains("function"));
        // The parametric top level gets the wrapper as top module.
        assert_eq!(sm.top_module(), "mkTopLevel___");
        assert!(code.contains("module mkTopLevel___( \\F___#(4) );"));
    }

    #[test]
    fn parametric_module_instantiation() {
        // Scenario: a parametric module used through a submodule of
        // another parametric module, specialized on demand.
        let (_, reporter, res) = translate(
            &[(
                "t.ms",
                "module Holder#(type T); input T in default = 0; endmodule\n\
                 module Shifter#(Integer w); Holder#(Bit#(w)) h0; endmodule",
            )],
            "Shifter#(4)",
        );
        assert!(!reporter.has_errors());
        let sm = res.unwrap();
        let code = sm.code();
        assert!(code.contains("interface \\Shifter#(4) ;"));
        assert!(code.contains("module \\mkShifter#(4) (\\Shifter#(4) );"));
        // The submodule site instantiates the specialized holder.
        assert!(code.contains("<- \\mkHolder#(Bit#(4)) ;"));
        assert!(code.contains("interface \\Holder#(Bit#(4)) ;"));
        assert_eq!(sm.top_module(), "mkTopLevel___");
    }

    #[test]
    fn specializations_are_emitted_once() {
        let (_, _, res) = translate(
            &[(
                "t.ms",
                "module Holder#(type T); input T in default = 0; endmodule\n\
                 module A; Holder#(Bit#(4)) x0; endmodule\n\
                 module B; Holder#(Bit#(4)) y0; Holder#(Bit#(8)) y1; endmodule",
            )],
            "",
        );
        let sm = res.unwrap();
        let code = sm.code();
        assert_eq!(code.matches("module \\mkHolder#(Bit#(4)) ").count(), 1);
        assert_eq!(code.matches("module \\mkHolder#(Bit#(8)) ").count(), 1);
    }

    #[test]
    fn top_level_function_wrapper() {
        // Scenario: a parametric top-level function gets the synthesis
        // interface/module pair plus the top-level wrapper module.
        let (_, reporter, res) = translate(
            &[(
                "t.ms",
                "function Bit#(8) g#(Integer n)(Bit#(8) a); return a; endfunction",
            )],
            "g#(8)",
        );
        assert!(!reporter.has_errors());
        let sm = res.unwrap();
        let code = sm.code();
        assert!(code.contains("function Bit#(8) \\g#(8) (Bit#(8) a);"));
        assert!(code.contains("interface \\G___#(8) ;"));
        assert!(code.contains("(* prefix=\"_\", result = \"out\" *)"));
        assert!(code.contains("  method Bit#(8) fn(Bit#(8) a);"));
        assert!(code.contains("module \\mkg#(8) "));
        assert!(code.contains(" fn(Bit#(8) a) = \\g#(8)  (a);"));
        assert!(code.contains("module mkTopLevel___( \\G___#(8) );"));
        assert!(code.contains("  \\G___#(8) res <- \\mkg#(8) ;"));
        assert_eq!(sm.top_module(), "mkTopLevel___");
    }

    #[test]
    fn parametric_typedefs_specialize_and_derive() {
        let (_, reporter, res) = translate(
            &[(
                "t.ms",
                "typedef Bit#(n) Word#(Integer n);\n\
                 typedef enum {Lo, Hi} Level;\n\
                 module M; Word#(16) w; endmodule",
            )],
            "",
        );
        assert!(!reporter.has_errors());
        let sm = res.unwrap();
        let code = sm.code();
        assert!(code.contains("typedef Bit#(16) \\Word#(16) ;"));
        assert!(code.contains("typedef enum {Lo, Hi} Level deriving(Bits, Eq, FShow);"));
    }

    #[test]
    fn ms_imports_are_dropped_and_bsv_imports_lowered() {
        // The imported file's tree is translated separately (topological
        // order); the import statement itself emits nothing.
        let (_, _, res) = translate(
            &[
                ("lib.ms", "module Lib; endmodule"),
                ("t.ms", "import Lib;\nbsvimport FIFO, GetPut;\nmodule M; endmodule"),
            ],
            "",
        );
        let sm = res.unwrap();
        assert!(sm.code().contains("import FIFO::*;"));
        assert!(sm.code().contains("import GetPut::*;"));
        assert!(!sm.code().contains("import Lib"));
        assert!(sm.code().contains("module mkLib(Lib);"));
    }

    #[test]
    fn unknown_parametric_uses_are_dropped_silently() {
        let (_, reporter, res) = translate(
            &[(
                "t.ms",
                "module M; Vector#(4, Bit#(8)) v0; endmodule",
            )],
            "",
        );
        // Vector resolves to a backend type; no local registration, no
        // complaint.
        assert!(!reporter.has_errors());
        let sm = res.unwrap();
        assert!(sm.code().contains("<- replicateM(mkBit);"));
    }

    #[test]
    fn arity_mismatch_reports_instantiation_error() {
        let (_, reporter, res) = translate(
            &[(
                "t.ms",
                "function Bit#(n) f#(Integer n); return 0; endfunction\n\
                 module M; rule r; let x = f#(1, 2)(); endrule endmodule",
            )],
            "",
        );
        assert!(res.is_ok());
        assert!(reporter.has_errors());
        let msg = &reporter.printed_errors()[0];
        assert!(msg.contains("cannot instantiate"));
        assert!(msg.contains("1 parameter required, 2 given"));
    }

    #[test]
    fn kind_mismatch_reports_instantiation_error() {
        let (_, reporter, _) = translate(
            &[(
                "t.ms",
                "function Bit#(n) f#(Integer n); return 0; endfunction\n\
                 module M; rule r; let x = f#(Bool)(); endrule endmodule",
            )],
            "",
        );
        assert!(reporter.has_errors());
        assert!(reporter.printed_errors()[0].contains("parameter 1 is not an Integer"));
    }

    #[test]
    fn missing_top_level_parametric_reports() {
        let (_, reporter, res) = translate(
            &[("t.ms", "module Top; endmodule")],
            "nope#(3)",
        );
        assert!(res.is_ok());
        assert!(reporter.has_errors());
        assert!(reporter.printed_errors()[0].contains("cannot find top-level parametric"));
    }

    #[test]
    fn runaway_recursion_hits_depth_cap() {
        let (_, _, res) = translate_with_limits(
            &[(
                "t.ms",
                "function Bit#(n) f#(Integer n); let r = f#(n + 1); \
                 return 0; endfunction",
            )],
            "f#(1)",
            StepLimiter::with_limits(0, 8),
        );
        let err = res.unwrap_err();
        assert!(err.message.contains("exceeded maximum elaboration depth"));
        assert!(err.message.contains("The last elaboration steps are:"));
    }

    #[test]
    fn runaway_loop_hits_step_cap() {
        let (_, _, res) = translate_with_limits(
            &[(
                "t.ms",
                "function Integer f#(Integer n); Integer s = 0; \
                 for (Integer i = 0; i > -1; i = i + 1) s = s + 1; \
                 return s; endfunction",
            )],
            "f#(1)",
            StepLimiter::with_limits(100, 0),
        );
        let err = res.unwrap_err();
        assert!(err
            .message
            .contains("exceeded maximum number of elaboration steps"));
    }

    #[test]
    fn source_map_round_trip_for_emitted_identifier() {
        let (db, _, res) = translate(
            &[("t.ms", "module Top; method Bool done = nope; endmodule")],
            "",
        );
        let sm = res.unwrap();
        let code = sm.code();
        // The undefined identifier is emitted verbatim; its emitted
        // position maps back to the MS node.
        let pos = code.find("nope").unwrap();
        let (line, col) = line_col_of(code, pos);
        let node = sm.find_exact(line, col, "nope").unwrap();
        assert_eq!(db.text(node), "nope");
        assert!(db.loc(node).starts_with("t.ms:"));
    }

    #[test]
    fn top_level_module_with_arguments_rejected() {
        let (_, reporter, _) = translate(
            &[(
                "t.ms",
                "module Top(Bool flag); endmodule",
            )],
            "Top",
        );
        assert!(reporter.has_errors());
        assert!(reporter.printed_errors()[0].contains("cannot have arguments"));
    }
}
