//! The integer context: lexically scoped elaboration-time variables.
//!
//! A stack of levels maps identifiers to integer cells, non-integer name
//! markers, and bound type parameters. Levels come in three flavors:
//! immutable (file root, module body — children cannot reassign ancestor
//! integers), mutable (function/method/rule bodies, begin/end blocks, for
//! loops), and poisoning (if/else and case arms — children may reassign,
//! but doing so *poisons* the ancestor's cell).
//!
//! Poisoning is the essential invariant: a read after a conditional whose
//! body reassigned an ancestor integer must not succeed silently, because
//! only statically-known values survive elaboration. The poisoned state is
//! distinct from uninitialized so the user gets told *why* the value is
//! unknown.

use crate::parametric::ParametricUse;
use msc_common::Ident;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// The validity tri-state of an integer cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IntegerState {
    /// Declared but holding no value yet.
    Invalid,
    /// Holding a statically-known value.
    Valid,
    /// Its value was changed inside an if/else or case arm, so it is no
    /// longer statically known.
    Poisoned,
}

/// An integer variable's cell: validity state plus value.
#[derive(Clone, Copy, Debug)]
pub struct IntegerCell {
    /// The validity state.
    pub state: IntegerState,
    /// The value (meaningful only when `state` is [`IntegerState::Valid`]).
    pub value: i64,
}

struct Level {
    integers: HashMap<Ident, IntegerCell>,
    non_integers: HashSet<Ident>,
    types: HashMap<Ident, Rc<ParametricUse>>,
    children_can_mutate: bool,
    poisons_ancestors: bool,
}

impl Level {
    fn new(children_can_mutate: bool, poisons_ancestors: bool) -> Self {
        Self {
            integers: HashMap::new(),
            non_integers: HashSet::new(),
            types: HashMap::new(),
            children_can_mutate,
            poisons_ancestors,
        }
    }
}

/// The scoped name context for integer elaboration.
pub struct IntegerContext {
    levels: Vec<Level>,
}

impl IntegerContext {
    /// Creates a context with the outermost (immutable) level in place.
    pub fn new() -> Self {
        Self {
            levels: vec![Level::new(false, false)],
        }
    }

    /// Pushes an immutable level (file root, module body).
    pub fn enter_immutable(&mut self) {
        self.levels.push(Level::new(false, false));
    }

    /// Pushes a mutable level (function, method, rule, begin/end, for loop).
    pub fn enter_mutable(&mut self) {
        self.levels.push(Level::new(true, false));
    }

    /// Pushes a poisoning level (if/else and case arms).
    pub fn enter_poisoning(&mut self) {
        self.levels.push(Level::new(true, true));
    }

    /// Pops the innermost level.
    ///
    /// # Panics
    ///
    /// Panics if only the outermost level remains.
    pub fn exit_level(&mut self) {
        assert!(self.levels.len() > 1, "cannot pop the outermost level");
        self.levels.pop();
    }

    /// Declares a variable in the innermost level. Returns `false` if the
    /// name is already declared in that level.
    pub fn define_var(&mut self, name: Ident, is_integer: bool) -> bool {
        let level = self.levels.last_mut().unwrap();
        if level.non_integers.contains(&name) || level.integers.contains_key(&name) {
            return false;
        }
        if is_integer {
            level.integers.insert(
                name,
                IntegerCell {
                    state: IntegerState::Invalid,
                    value: 0,
                },
            );
        } else {
            level.non_integers.insert(name);
        }
        true
    }

    fn find_integer(&self, name: Ident) -> Option<&IntegerCell> {
        for level in self.levels.iter().rev() {
            if let Some(cell) = level.integers.get(&name) {
                return Some(cell);
            }
            if level.non_integers.contains(&name) {
                return None; // shadowed by a non-integer
            }
        }
        None
    }

    /// Returns `true` if `name` resolves to an integer variable.
    pub fn is_integer(&self, name: Ident) -> bool {
        self.find_integer(name).is_some()
    }

    /// Returns the cell for `name`, by value, or `None` if it is not
    /// defined (or is shadowed by a non-integer). The caller must still
    /// check the cell's validity state.
    pub fn get(&self, name: Ident) -> Option<IntegerCell> {
        self.find_integer(name).copied()
    }

    /// Assigns `value` to `name`.
    ///
    /// The search walks outward from the innermost level and stops at the
    /// first level (other than the innermost) that does not allow children
    /// to mutate it. If one or more poisoning levels were traversed before
    /// the variable was found, the found cell transitions to
    /// [`IntegerState::Poisoned`] and a fresh valid cell is installed in
    /// the outermost traversed poisoning level, so reads within the
    /// conditional still see the value while reads after it see the
    /// poisoned original. Returns `false` if the variable was not found
    /// before the mutability boundary.
    pub fn set(&mut self, name: Ident, value: i64) -> bool {
        let top = self.levels.len() - 1;
        let mut poisoning_level: Option<usize> = None;
        let mut found: Option<usize> = None;
        for idx in (0..self.levels.len()).rev() {
            let level = &self.levels[idx];
            if idx != top && !level.children_can_mutate {
                break;
            }
            if level.integers.contains_key(&name) {
                found = Some(idx);
                break;
            }
            if level.non_integers.contains(&name) {
                break;
            }
            if level.poisons_ancestors {
                // Keep the outermost poisoning level traversed so far.
                poisoning_level = Some(idx);
            }
        }
        let Some(found) = found else { return false };

        let fresh = IntegerCell {
            state: IntegerState::Valid,
            value,
        };
        match poisoning_level {
            Some(poisoning) => {
                self.levels[found]
                    .integers
                    .get_mut(&name)
                    .unwrap()
                    .state = IntegerState::Poisoned;
                self.levels[poisoning].integers.insert(name, fresh);
            }
            None => {
                self.levels[found].integers.insert(name, fresh);
            }
        }
        true
    }

    /// Binds a type parameter in the innermost level.
    pub fn set_type(&mut self, name: Ident, pu: Rc<ParametricUse>) {
        self.levels.last_mut().unwrap().types.insert(name, pu);
    }

    /// Looks up a type-parameter binding, innermost level first.
    pub fn get_type(&self, name: Ident) -> Option<Rc<ParametricUse>> {
        for level in self.levels.iter().rev() {
            if let Some(pu) = level.types.get(&name) {
                return Some(pu.clone());
            }
        }
        None
    }
}

impl Default for IntegerContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msc_common::Interner;

    fn ctx() -> (IntegerContext, Interner) {
        (IntegerContext::new(), Interner::new())
    }

    #[test]
    fn define_and_get() {
        let (mut ic, names) = ctx();
        let x = names.intern("x");
        assert!(ic.define_var(x, true));
        let cell = ic.get(x).unwrap();
        assert_eq!(cell.state, IntegerState::Invalid);
        assert!(ic.set(x, 3));
        let cell = ic.get(x).unwrap();
        assert_eq!(cell.state, IntegerState::Valid);
        assert_eq!(cell.value, 3);
    }

    #[test]
    fn double_define_fails() {
        let (mut ic, names) = ctx();
        let x = names.intern("x");
        assert!(ic.define_var(x, true));
        assert!(!ic.define_var(x, false));
    }

    #[test]
    fn undefined_not_found() {
        let (mut ic, names) = ctx();
        let x = names.intern("x");
        assert!(ic.get(x).is_none());
        assert!(!ic.set(x, 1));
    }

    #[test]
    fn non_integer_shadows_integer() {
        let (mut ic, names) = ctx();
        let x = names.intern("x");
        ic.define_var(x, true);
        ic.set(x, 1);
        ic.enter_mutable();
        ic.define_var(x, false);
        assert!(ic.get(x).is_none());
        ic.exit_level();
        assert!(ic.get(x).is_some());
    }

    #[test]
    fn mutable_level_can_set_ancestor() {
        let (mut ic, names) = ctx();
        ic.enter_mutable(); // function body
        let x = names.intern("x");
        ic.define_var(x, true);
        ic.set(x, 1);
        ic.enter_mutable(); // begin/end
        assert!(ic.set(x, 2));
        ic.exit_level();
        assert_eq!(ic.get(x).unwrap().value, 2);
        assert_eq!(ic.get(x).unwrap().state, IntegerState::Valid);
    }

    #[test]
    fn immutable_boundary_blocks_set() {
        let (mut ic, names) = ctx();
        let x = names.intern("x");
        ic.define_var(x, true); // file level (immutable)
        ic.set(x, 1);
        ic.enter_immutable(); // module body
        ic.enter_mutable(); // method body
        assert!(!ic.set(x, 2));
        ic.exit_level();
        ic.exit_level();
        assert_eq!(ic.get(x).unwrap().value, 1);
    }

    #[test]
    fn poisoning_set_poisons_ancestor() {
        let (mut ic, names) = ctx();
        ic.enter_mutable(); // function body
        let x = names.intern("x");
        ic.define_var(x, true);
        ic.set(x, 3);
        ic.enter_poisoning(); // if arm
        assert!(ic.set(x, 4));
        // Inside the arm, the value reads as valid 4.
        let cell = ic.get(x).unwrap();
        assert_eq!(cell.state, IntegerState::Valid);
        assert_eq!(cell.value, 4);
        ic.exit_level();
        // After the arm, the original cell is poisoned.
        assert_eq!(ic.get(x).unwrap().state, IntegerState::Poisoned);
    }

    #[test]
    fn fresh_cell_lives_in_outermost_poisoning_level() {
        let (mut ic, names) = ctx();
        ic.enter_mutable();
        let x = names.intern("x");
        ic.define_var(x, true);
        ic.set(x, 1);
        ic.enter_poisoning(); // outer if arm
        ic.enter_poisoning(); // nested if arm
        ic.set(x, 2);
        ic.exit_level(); // leave the nested arm
        // Still inside the outer arm: the fresh cell is visible there.
        let cell = ic.get(x).unwrap();
        assert_eq!(cell.state, IntegerState::Valid);
        assert_eq!(cell.value, 2);
        ic.exit_level();
        assert_eq!(ic.get(x).unwrap().state, IntegerState::Poisoned);
    }

    #[test]
    fn set_in_own_poisoning_level_does_not_poison() {
        let (mut ic, names) = ctx();
        ic.enter_poisoning();
        let x = names.intern("x");
        ic.define_var(x, true);
        assert!(ic.set(x, 5));
        assert_eq!(ic.get(x).unwrap().state, IntegerState::Valid);
        ic.exit_level();
    }

    #[test]
    fn type_bindings_resolve_innermost_first() {
        let (mut ic, names) = ctx();
        let t = names.intern("T");
        let bool_pu = Rc::new(ParametricUse {
            name: "Bool".to_string(),
            escape: false,
            params: vec![],
        });
        ic.set_type(t, bool_pu.clone());
        assert_eq!(ic.get_type(t).unwrap().name, "Bool");
        ic.enter_immutable();
        let bit_pu = Rc::new(ParametricUse {
            name: "Bit".to_string(),
            escape: false,
            params: vec![],
        });
        ic.set_type(t, bit_pu);
        assert_eq!(ic.get_type(t).unwrap().name, "Bit");
        ic.exit_level();
        assert_eq!(ic.get_type(t).unwrap().name, "Bool");
    }

    #[test]
    #[should_panic(expected = "outermost")]
    fn popping_outermost_level_panics() {
        let mut ic = IntegerContext::new();
        ic.exit_level();
    }
}
