//! Parametric-use fingerprints.
//!
//! A parametric use is the identity of one specialization of a parametric
//! function, module, type synonym, or struct: the bare name plus the vector
//! of parameter values, each an integer or a nested parametric use. Two
//! uses are equal by structural equality on name and parameters; the
//! `escape` flag is rendering state and does not participate in equality.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// One parameter of a parametric use.
#[derive(Clone, Debug)]
pub enum ParamValue {
    /// A statically evaluated integer parameter.
    Int(i64),
    /// A type parameter, itself a (possibly nested) parametric use.
    Use(Rc<ParametricUse>),
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Int(a), ParamValue::Int(b)) => a == b,
            (ParamValue::Use(a), ParamValue::Use(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParamValue {}

/// The fingerprint of one specialization of a parametric definition.
#[derive(Clone, Debug)]
pub struct ParametricUse {
    /// The bare name of the parametric (no parameters).
    pub name: String,
    /// Whether rendering must wrap the result in the backend's
    /// identifier-escape syntax (leading backslash, trailing space). Set
    /// when the name starts with a lower-case letter or names a
    /// locally-declared type or module.
    pub escape: bool,
    /// The parameter values, in declaration order.
    pub params: Vec<ParamValue>,
}

impl ParametricUse {
    /// Renders the canonical `name#(p1,p2,...)` form. When `escape` is set
    /// and no enclosing rendering has already escaped, the result is
    /// wrapped as `\name#(...) ` so it reads as a single backend
    /// identifier; nested uses inside an escaped rendering stay bare.
    pub fn render(&self, already_escaped: bool) -> String {
        let should_escape = self.escape && !already_escaped;
        let mut out = String::new();
        if should_escape {
            out.push('\\');
        }
        out.push_str(&self.name);
        if !self.params.is_empty() {
            out.push_str("#(");
            for (i, param) in self.params.iter().enumerate() {
                match param {
                    ParamValue::Int(v) => out.push_str(&v.to_string()),
                    ParamValue::Use(pu) => {
                        out.push_str(&pu.render(already_escaped || should_escape))
                    }
                }
                out.push(if i + 1 == self.params.len() { ')' } else { ',' });
            }
        }
        if should_escape {
            out.push(' ');
        }
        out
    }

    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.name.hash(&mut hasher);
        let mut res = hasher.finish();
        for param in &self.params {
            let h = match param {
                ParamValue::Int(v) => *v as u64,
                ParamValue::Use(pu) => pu.fingerprint(),
            };
            res = res.rotate_right(1) ^ h;
        }
        res
    }
}

impl PartialEq for ParametricUse {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.params == other.params
    }
}

impl Eq for ParametricUse {}

impl Hash for ParametricUse {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.fingerprint());
    }
}

impl fmt::Display for ParametricUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pu(name: &str, escape: bool, params: Vec<ParamValue>) -> ParametricUse {
        ParametricUse {
            name: name.to_string(),
            escape,
            params,
        }
    }

    #[test]
    fn render_plain() {
        assert_eq!(pu("Shifter", false, vec![ParamValue::Int(4)]).render(false), "Shifter#(4)");
        assert_eq!(pu("Bool", false, vec![]).render(false), "Bool");
    }

    #[test]
    fn render_escaped() {
        assert_eq!(pu("f", true, vec![ParamValue::Int(4)]).render(false), "\\f#(4) ");
        // Inside an already-escaped rendering, no second escape.
        assert_eq!(pu("f", true, vec![ParamValue::Int(4)]).render(true), "f#(4)");
    }

    #[test]
    fn render_nested() {
        let inner = Rc::new(pu("Bit", false, vec![ParamValue::Int(8)]));
        let outer = pu("Shifter", true, vec![ParamValue::Use(inner)]);
        assert_eq!(outer.render(false), "\\Shifter#(Bit#(8)) ");
    }

    #[test]
    fn nested_escape_suppressed_under_outer_escape() {
        let inner = Rc::new(pu("Color", true, vec![]));
        let outer = pu("Reg", true, vec![ParamValue::Use(inner)]);
        assert_eq!(outer.render(false), "\\Reg#(Color) ");
    }

    #[test]
    fn equality_ignores_escape() {
        let a = pu("f", true, vec![ParamValue::Int(4)]);
        let b = pu("f", false, vec![ParamValue::Int(4)]);
        assert_eq!(a, b);
    }

    #[test]
    fn inequality_on_params() {
        let a = pu("f", false, vec![ParamValue::Int(4)]);
        let b = pu("f", false, vec![ParamValue::Int(8)]);
        assert_ne!(a, b);
        let c = pu("g", false, vec![ParamValue::Int(4)]);
        assert_ne!(a, c);
    }

    #[test]
    fn hash_set_dedupes_structurally() {
        let mut set = HashSet::new();
        set.insert(pu("f", true, vec![ParamValue::Int(4)]));
        set.insert(pu("f", false, vec![ParamValue::Int(4)]));
        set.insert(pu("f", false, vec![ParamValue::Int(8)]));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn param_arity_distinguishes() {
        let a = pu("f", false, vec![ParamValue::Int(4)]);
        let b = pu("f", false, vec![ParamValue::Int(4), ParamValue::Int(4)]);
        assert_ne!(a, b);
    }
}
