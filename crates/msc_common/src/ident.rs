//! Interned MS identifiers.
//!
//! The elaborator compares names constantly: scope lookups in the integer
//! context, submodule-name sets for the input-wire rewrite, the local-type
//! set that decides identifier escaping, and the parametrics registry. All
//! of those key on [`Ident`], a `u32` handle into the session's interner,
//! so the hot path is integer equality instead of string comparison.
//!
//! Interning is one-way here: MS never needs to turn an `Ident` back into
//! text, because every name the compiler prints is sliced straight from
//! the source (or from a parametric-use rendering). The interner therefore
//! exposes only [`Interner::intern`].

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};

/// A handle to an interned identifier.
///
/// Two `Ident`s are equal exactly when their original texts are equal, so
/// they can serve as cheap map and set keys throughout the elaborator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

// SAFETY: `Ident` wraps a `u32`, which always fits in a `usize` on the
// platforms the compiler targets; `try_from_usize` rejects anything that
// does not fit back into a `u32`.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// The session-wide identifier interner, backed by [`lasso::ThreadedRodeo`].
///
/// One interner lives in the syntax database and is shared by the parser,
/// the elaborator, and the driver; interning the same text twice always
/// yields the same [`Ident`].
pub struct Interner {
    rodeo: ThreadedRodeo<Ident>,
}

impl Interner {
    /// Creates a new empty interner.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// Interns `text`, returning its handle. Re-interning known text is
    /// cheap and returns the existing handle.
    pub fn intern(&self, text: &str) -> Ident {
        self.rodeo.get_or_intern(text)
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

/// The identifiers the elaborator dispatches on, interned once up front.
///
/// MS gives a handful of names special elaboration-time meaning: the
/// `Integer` type exists only at elaboration time, `Vector` submodules
/// initialize through `replicateM`, `log2` is a built-in function, and
/// `True`/`False` are synthesized boolean values rather than variables.
/// Holding their handles here keeps the walker's dispatch on integer
/// comparisons.
pub struct WellKnown {
    /// `Integer`, the elaboration-time integer type.
    pub integer: Ident,
    /// `Vector`, the replicated-submodule container type.
    pub vector: Ident,
    /// `log2`, the built-in elaboration-time function.
    pub log2: Ident,
    /// `True`, the boolean literal.
    pub true_: Ident,
    /// `False`, the boolean literal.
    pub false_: Ident,
}

impl WellKnown {
    /// Interns the well-known names into `interner`.
    pub fn new(interner: &Interner) -> Self {
        Self {
            integer: interner.intern("Integer"),
            vector: interner.intern("Vector"),
            log2: interner.intern("log2"),
            true_: interner.intern("True"),
            false_: interner.intern("False"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn same_text_same_handle() {
        let interner = Interner::new();
        let a = interner.intern("shiftAmount");
        let b = interner.intern("shiftAmount");
        assert_eq!(a, b);
    }

    #[test]
    fn case_matters() {
        let interner = Interner::new();
        assert_ne!(interner.intern("counter"), interner.intern("Counter"));
    }

    #[test]
    fn idents_key_maps() {
        let interner = Interner::new();
        let mut scope: HashMap<Ident, i64> = HashMap::new();
        scope.insert(interner.intern("width"), 8);
        scope.insert(interner.intern("depth"), 4);
        assert_eq!(scope.get(&interner.intern("width")), Some(&8));
        assert_eq!(scope.get(&interner.intern("height")), None);
    }

    #[test]
    fn well_known_names_match_interned_text() {
        let interner = Interner::new();
        let names = WellKnown::new(&interner);
        assert_eq!(names.integer, interner.intern("Integer"));
        assert_eq!(names.vector, interner.intern("Vector"));
        assert_eq!(names.log2, interner.intern("log2"));
        assert_ne!(names.true_, names.false_);
    }

    #[test]
    fn serde_roundtrip() {
        let interner = Interner::new();
        let id = interner.intern("tick");
        let json = serde_json::to_string(&id).unwrap();
        let back: Ident = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
