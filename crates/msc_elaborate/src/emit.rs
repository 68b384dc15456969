//! The translated-code buffer.
//!
//! An append-only writer that accumulates rewritten backend source while
//! recording, for every emitted byte range, the originating parse-tree
//! node and an optional breadcrumb label. Emitting a node dispatches on
//! its elaborated value; nested fragments are spliced in by offset-shifting
//! their recorded ranges, so traceability survives composition.

use crate::parametric::ParametricUse;
use crate::source_map::SourceMap;
use crate::value::{ElabValues, Value};
use msc_common::NodeId;
use msc_syntax::SyntaxDb;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A parametric use recorded during emission, with the node that emitted
/// it (absent for the command-line top level).
pub type ParametricUseInfo = (Rc<ParametricUse>, Option<NodeId>);

/// The append-only translated-code writer.
#[derive(Debug, Default)]
pub struct TranslatedCode {
    code: String,
    dst_to_src: BTreeMap<(usize, usize), NodeId>,
    dst_to_info: BTreeMap<(usize, usize), String>,
    emit_stack: Vec<(NodeId, usize)>,
    parametric_uses: Vec<ParametricUseInfo>,
}

impl TranslatedCode {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends literal text.
    pub fn text(&mut self, s: &str) {
        self.code.push_str(s);
    }

    /// Appends a newline.
    pub fn newline(&mut self) {
        self.code.push('\n');
    }

    /// Emits a node if present; a no-op for `None`.
    pub fn opt_node(&mut self, node: Option<NodeId>, db: &SyntaxDb, values: &ElabValues) {
        if let Some(n) = node {
            self.node(n, db, values);
        }
    }

    /// Emits a node, dispatching on its elaborated value:
    ///
    /// - `Int`/`Bool` emit the literal rendering;
    /// - `Text` emits the replacement text;
    /// - `Parametric` emits the canonical (escaped) name and records the use;
    /// - `Skip` emits nothing;
    /// - `Fragment` splices the nested buffer, offset-shifting its maps;
    /// - `None` (and inert error carriers) recurse over the children with
    ///   the original inter-token whitespace, or emit the raw source text
    ///   for leaves.
    ///
    /// The emitted range is recorded against the node in the
    /// destination-to-source map.
    pub fn node(&mut self, node: NodeId, db: &SyntaxDb, values: &ElabValues) {
        self.start(node);
        match values.get(node) {
            Value::Int(v) => self.code.push_str(&v.to_string()),
            Value::Bool(b) => self.code.push_str(if b { "True" } else { "False" }),
            Value::Text(s) => self.code.push_str(s),
            Value::Parametric(pu) => {
                self.code.push_str(&pu.render(false));
                self.parametric_uses.push((pu, Some(node)));
            }
            Value::Skip => {}
            Value::Fragment(fragment) => self.splice(&fragment),
            Value::None | Value::Error(_) => {
                let n = db.node_ref(node);
                if n.children.is_empty() {
                    let text = db.text(node);
                    self.code.push_str(text);
                } else {
                    let file = n.file;
                    let children = n.children.clone();
                    for (i, &child) in children.iter().enumerate() {
                        if i > 0 {
                            let prev_last = db.node_ref(children[i - 1]).last_tok;
                            let cur_first = db.node_ref(child).first_tok;
                            let gap = db.gap_text(file, prev_last, cur_first);
                            self.code.push_str(gap);
                        }
                        self.node(child, db, values);
                    }
                }
            }
        }
        self.end();
    }

    /// Opens a recorded region for `node`.
    pub fn start(&mut self, node: NodeId) {
        self.emit_stack.push((node, self.code.len()));
    }

    /// Closes the innermost open region, recording its range. Empty
    /// regions are dropped.
    pub fn end(&mut self) {
        self.end_inner(None);
    }

    /// Closes the innermost open region, additionally recording a
    /// breadcrumb label for the range.
    pub fn end_with_info(&mut self, info: String) {
        self.end_inner(Some(info));
    }

    fn end_inner(&mut self, info: Option<String>) {
        let (node, start) = self
            .emit_stack
            .pop()
            .expect("emit region closed without a matching start");
        let end = self.code.len();
        if start == end {
            return;
        }
        self.dst_to_src.insert((start, end), node);
        if let Some(info) = info {
            self.dst_to_info.insert((start, end), info);
        }
    }

    /// Splices a nested buffer at the current position, offset-shifting
    /// its recorded ranges and appending its recorded parametric uses.
    fn splice(&mut self, other: &TranslatedCode) {
        debug_assert!(other.emit_stack.is_empty(), "spliced fragment left open");
        let offset = self.code.len();
        for (&(start, end), &node) in &other.dst_to_src {
            self.dst_to_src.insert((start + offset, end + offset), node);
        }
        for (&(start, end), info) in &other.dst_to_info {
            self.dst_to_info
                .insert((start + offset, end + offset), info.clone());
        }
        self.parametric_uses
            .extend(other.parametric_uses.iter().cloned());
        self.code.push_str(&other.code);
    }

    /// Returns and clears the parametric uses recorded so far. The driver
    /// drains this between worklist rounds.
    pub fn dequeue_parametric_uses(&mut self) -> Vec<ParametricUseInfo> {
        std::mem::take(&mut self.parametric_uses)
    }

    /// The emitted code so far.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Freezes the buffer into an immutable [`SourceMap`].
    pub fn finish(self, top_module: &str) -> SourceMap {
        debug_assert!(self.emit_stack.is_empty(), "finish with open emit regions");
        SourceMap::new(
            self.dst_to_src,
            self.dst_to_info,
            self.code,
            top_module.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use msc_syntax::{parse_source, NodeKind};

    fn parsed(source: &str) -> (SyntaxDb, NodeId) {
        let mut db = SyntaxDb::new();
        let root = parse_source(&mut db, "t.ms", source).unwrap();
        (db, root)
    }

    #[test]
    fn verbatim_emission_preserves_whitespace() {
        let (db, root) = parsed("module M;\n  rule r;  endrule\nendmodule");
        let values = ElabValues::new();
        let mut tc = TranslatedCode::new();
        tc.node(root, &db, &values);
        assert_eq!(tc.code(), "module M;\n  rule r;  endrule\nendmodule");
    }

    #[test]
    fn int_value_replaces_node() {
        let (db, root) = parsed("Integer x = y;");
        let vb = db.child_of_kind(root, NodeKind::VarBinding).unwrap();
        let init = db.child_of_kind(vb, NodeKind::VarInit).unwrap();
        let rhs = db.child_of_kind(init, NodeKind::VarExpr).unwrap();
        let mut values = ElabValues::new();
        values.set(rhs, Value::Int(42));
        let mut tc = TranslatedCode::new();
        tc.node(root, &db, &values);
        assert_eq!(tc.code(), "Integer x = 42;");
    }

    #[test]
    fn skip_value_drops_node() {
        let (db, root) = parsed("Integer x = 3; module M; endmodule");
        let vb = db.child_of_kind(root, NodeKind::VarBinding).unwrap();
        let mut values = ElabValues::new();
        values.set(vb, Value::Skip);
        let mut tc = TranslatedCode::new();
        tc.node(root, &db, &values);
        assert_eq!(tc.code(), " module M; endmodule");
    }

    #[test]
    fn parametric_value_is_recorded() {
        let (db, root) = parsed("Integer x = f#(4);");
        let vb = db.child_of_kind(root, NodeKind::VarBinding).unwrap();
        let init = db.child_of_kind(vb, NodeKind::VarInit).unwrap();
        let use_node = db.child_of_kind(init, NodeKind::VarExpr).unwrap();
        let pu = Rc::new(ParametricUse {
            name: "f".to_string(),
            escape: true,
            params: vec![crate::parametric::ParamValue::Int(4)],
        });
        let mut values = ElabValues::new();
        values.set(use_node, Value::Parametric(pu));
        let mut tc = TranslatedCode::new();
        tc.node(root, &db, &values);
        assert_eq!(tc.code(), "Integer x = \\f#(4) ;");
        let uses = tc.dequeue_parametric_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].0.name, "f");
        assert!(tc.dequeue_parametric_uses().is_empty());
    }

    #[test]
    fn fragment_splice_shifts_ranges() {
        let (db, root) = parsed("Integer x = y;");
        let vb = db.child_of_kind(root, NodeKind::VarBinding).unwrap();
        let init = db.child_of_kind(vb, NodeKind::VarInit).unwrap();
        let rhs = db.child_of_kind(init, NodeKind::VarExpr).unwrap();

        let mut inner = TranslatedCode::new();
        inner.start(rhs);
        inner.text("replaced");
        inner.end();

        let mut values = ElabValues::new();
        values.set(rhs, Value::Fragment(Rc::new(inner)));
        let mut tc = TranslatedCode::new();
        tc.node(root, &db, &values);
        assert_eq!(tc.code(), "Integer x = replaced;");

        // The spliced range must point at the rhs node at its shifted offset.
        let sm = tc.finish("");
        let pos = "Integer x = ".len();
        assert_eq!(sm.find(1, pos as u32 + 1), Some(rhs));
    }

    #[test]
    fn empty_regions_are_dropped() {
        let (db, root) = parsed("Integer x = 3;");
        let mut tc = TranslatedCode::new();
        tc.start(root);
        tc.end();
        let sm = tc.finish("");
        assert_eq!(sm.find(1, 1), None);
        let _ = db;
    }

    #[test]
    fn text_value_replaces_leaf() {
        let (db, root) = parsed("typedef enum {A, B} Color;");
        let e = db.child_of_kind(root, NodeKind::TypeDefEnum).unwrap();
        let semi = *db.children(e).last().unwrap();
        let mut values = ElabValues::new();
        values.set(semi, Value::Text(" deriving(Bits, Eq, FShow);"));
        let mut tc = TranslatedCode::new();
        tc.node(root, &db, &values);
        assert_eq!(
            tc.code(),
            "typedef enum {A, B} Color deriving(Bits, Eq, FShow);"
        );
    }
}
