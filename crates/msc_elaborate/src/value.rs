//! The elaboration value domain.
//!
//! Every parse-tree node may carry one value computed during elaboration:
//! an evaluated integer or boolean, a parametric-use reference, a skip
//! marker (emit nothing), a replacement text, a translated-code fragment,
//! or a semantic-error carrier. Nodes with no value elaborate to
//! [`Value::None`] and are re-emitted verbatim.

use crate::emit::TranslatedCode;
use crate::parametric::ParametricUse;
use msc_common::NodeId;
use msc_diagnostics::{error_colored, hl_colored};
use msc_syntax::context::{context_str, quote};
use msc_syntax::SyntaxDb;
use std::collections::HashMap;
use std::rc::Rc;

/// A basic elaboration error: an anchor node plus a message. The message
/// may contain the token `$CTX`, replaced at render time with the quoted
/// source text of the anchor.
#[derive(Debug)]
pub struct BasicError {
    /// The parse-tree node the error is anchored at.
    pub node: NodeId,
    /// The message, possibly containing `$CTX`.
    pub msg: String,
}

impl BasicError {
    /// Creates an error value from an anchor and a message.
    pub fn value(node: NodeId, msg: impl Into<String>) -> Value {
        Value::Error(ErrorVal::Basic(Rc::new(BasicError {
            node,
            msg: msg.into(),
        })))
    }

    /// Renders the message with `$CTX` substituted.
    pub fn message(&self, db: &SyntaxDb) -> String {
        self.msg.replace("$CTX", &quote(db, self.node))
    }
}

/// The error payload of [`Value::Error`]: one basic error or a flattened
/// list of several.
#[derive(Clone, Debug)]
pub enum ErrorVal {
    /// A single error.
    Basic(Rc<BasicError>),
    /// Several errors, flattened (never nested).
    Multi(Vec<Rc<BasicError>>),
}

impl ErrorVal {
    /// Returns the basic errors carried by this value.
    pub fn errors(&self) -> Vec<Rc<BasicError>> {
        match self {
            ErrorVal::Basic(e) => vec![e.clone()],
            ErrorVal::Multi(es) => es.clone(),
        }
    }
}

/// An elaboration-time value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Not elaborated; the node is re-emitted verbatim.
    #[default]
    None,
    /// A statically evaluated signed integer.
    Int(i64),
    /// A statically evaluated boolean.
    Bool(bool),
    /// Replacement text emitted instead of the node's source.
    Text(&'static str),
    /// Emit nothing for this node.
    Skip,
    /// A reference to a parametric specialization.
    Parametric(Rc<ParametricUse>),
    /// A self-contained rewritten sub-tree with its own sub-source-map.
    Fragment(Rc<TranslatedCode>),
    /// A semantic-error carrier.
    Error(ErrorVal),
}

impl Value {
    /// Returns `true` for [`Value::Int`].
    pub fn is_int(&self) -> bool {
        matches!(self, Value::Int(_))
    }

    /// Returns the integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns `true` for [`Value::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Collects the basic errors carried by this value (empty for
    /// non-error values).
    pub fn wrap(&self) -> Vec<Rc<BasicError>> {
        match self {
            Value::Error(e) => e.errors(),
            _ => Vec::new(),
        }
    }

    /// Merges the errors of two values into a single flattened error
    /// value; [`Value::None`] if neither carries errors.
    pub fn combine(left: &Value, right: &Value) -> Value {
        let mut errors = left.wrap();
        errors.extend(right.wrap());
        match errors.len() {
            0 => Value::None,
            1 => Value::Error(ErrorVal::Basic(errors.pop().unwrap())),
            _ => Value::Error(ErrorVal::Multi(errors)),
        }
    }
}

/// The per-node elaboration values of one elaborator.
#[derive(Default)]
pub struct ElabValues {
    map: HashMap<NodeId, Value>,
}

impl ElabValues {
    /// Creates an empty value map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of a node ([`Value::None`] when unset).
    pub fn get(&self, node: NodeId) -> Value {
        self.map.get(&node).cloned().unwrap_or(Value::None)
    }

    /// Sets the value of a node. Storing [`Value::None`] over an unset node
    /// is a no-op.
    pub fn set(&mut self, node: NodeId, value: Value) {
        if value.is_none() && !self.map.contains_key(&node) {
            return;
        }
        self.map.insert(node, value);
    }

    /// Clears the values of a node and its whole subtree, so a definition
    /// can be re-elaborated with different parameter bindings.
    pub fn clear_subtree(&mut self, db: &SyntaxDb, node: NodeId) {
        self.map.remove(&node);
        for &child in db.children(node) {
            self.clear_subtree(db, child);
        }
    }
}

/// Renders a basic error in full form: highlighted location, message, and
/// the anchored source context.
pub fn render_basic_error(db: &SyntaxDb, err: &BasicError) -> String {
    format!(
        "{} {}\n{}",
        hl_colored(&format!("{}:", db.loc(err.node))),
        err.message(db),
        context_str(db, err.node, &[err.node])
    )
}

/// Renders a composite elaboration error: a header at `node`, the carried
/// sub-errors (aligned under the header), and the source context with the
/// sub-error anchors highlighted.
pub fn render_elab_error(
    db: &SyntaxDb,
    node: NodeId,
    value: &Value,
    msg: Option<&str>,
) -> String {
    let mut out = format!(
        "{} {} {}\n",
        hl_colored(&format!("{}:", db.loc(node))),
        error_colored("error:"),
        msg.unwrap_or("could not elaborate Integer expression")
    );
    let subs = value.wrap();
    for sub in &subs {
        out.push_str(&format!(
            "{} {}\n",
            hl_colored(&format!("{}:", db.sub_loc(sub.node))),
            sub.message(db)
        ));
    }
    let highlights: Vec<NodeId> = if subs.is_empty() {
        vec![node]
    } else {
        subs.iter().map(|e| e.node).collect()
    };
    out.push_str(&context_str(db, node, &highlights));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use msc_syntax::parse_source;
    use msc_syntax::NodeKind;

    #[test]
    fn combine_of_non_errors_is_none() {
        let v = Value::combine(&Value::Int(3), &Value::Bool(true));
        assert!(v.is_none());
    }

    #[test]
    fn combine_flattens_errors() {
        let a = BasicError::value(NodeId::from_raw(1), "one");
        let b = BasicError::value(NodeId::from_raw(2), "two");
        let combined = Value::combine(&a, &b);
        assert_eq!(combined.wrap().len(), 2);
        // Combining again stays flat.
        let c = BasicError::value(NodeId::from_raw(3), "three");
        let combined = Value::combine(&combined, &c);
        assert_eq!(combined.wrap().len(), 3);
    }

    #[test]
    fn combine_single_error_stays_basic() {
        let a = BasicError::value(NodeId::from_raw(1), "one");
        let combined = Value::combine(&a, &Value::Int(5));
        match combined {
            Value::Error(ErrorVal::Basic(_)) => {}
            other => panic!("expected basic error, got {other:?}"),
        }
    }

    #[test]
    fn values_default_to_none() {
        let vals = ElabValues::new();
        assert!(vals.get(NodeId::from_raw(99)).is_none());
    }

    #[test]
    fn clear_subtree_removes_descendants() {
        let mut db = SyntaxDb::new();
        let root = parse_source(&mut db, "t.ms", "Integer x = 1 + 2;").unwrap();
        let vb = db.child_of_kind(root, NodeKind::VarBinding).unwrap();
        let init = db.child_of_kind(vb, NodeKind::VarInit).unwrap();
        let binop = db.child_of_kind(init, NodeKind::BinopExpr).unwrap();

        let mut vals = ElabValues::new();
        vals.set(vb, Value::Skip);
        vals.set(binop, Value::Int(3));
        vals.clear_subtree(&db, vb);
        assert!(vals.get(vb).is_none());
        assert!(vals.get(binop).is_none());
    }

    #[test]
    fn ctx_substitution_in_message() {
        let mut db = SyntaxDb::new();
        let root = parse_source(&mut db, "t.ms", "Integer x = 3;").unwrap();
        let vb = db.child_of_kind(root, NodeKind::VarBinding).unwrap();
        let init = db.child_of_kind(vb, NodeKind::VarInit).unwrap();
        let name = db.child_of_kind(init, NodeKind::LowerIdent).unwrap();
        let err = BasicError {
            node: name,
            msg: "$CTX is not an Integer variable".to_string(),
        };
        assert!(err.message(&db).contains('x'));
        let rendered = render_basic_error(&db, &err);
        assert!(rendered.contains("t.ms:1:9"));
    }
}
