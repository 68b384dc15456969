//! Elaboration step accounting.
//!
//! Parametric instantiation is a worklist fixpoint and for loops unroll at
//! elaboration time, so a buggy design can elaborate forever (e.g., a
//! parametric type recursing without its integer parameter decreasing).
//! The step counter and the per-round depth counter are the only
//! safeguards; exceeding either is fatal, and the diagnostic includes a
//! ring buffer of the most recent steps so the user can see the loop.

use crate::parametric::ParametricUse;
use msc_common::NodeId;
use msc_diagnostics::hl_colored;
use msc_syntax::{ast, SyntaxDb};
use std::collections::VecDeque;
use std::rc::Rc;

const RECENT_STEPS: usize = 16;
const DEFAULT_MAX_STEPS: u64 = 50_000;
const DEFAULT_MAX_DEPTH: u64 = 1_000;

/// One elaboration step, for the recent-steps ring.
#[derive(Clone)]
pub enum ElabStep {
    /// Instantiation of a parametric specialization.
    Parametric(Rc<ParametricUse>),
    /// One unrolled iteration of a for loop.
    ForIteration {
        /// The for-statement node.
        node: NodeId,
        /// The induction variable's value for this iteration.
        value: i64,
    },
}

/// A fatal elaboration-budget overflow, with a fully rendered message.
#[derive(Debug)]
pub struct ElabOverflow {
    /// The printable diagnostic, including the recent-steps listing.
    pub message: String,
}

/// Counts elaboration steps against the step and depth caps.
pub struct StepLimiter {
    recent: VecDeque<ElabStep>,
    count: u64,
    max_steps: u64,
    max_depth: u64,
}

impl StepLimiter {
    /// Creates a limiter with the default caps.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_STEPS, DEFAULT_MAX_DEPTH)
    }

    /// Creates a limiter with explicit caps (0 disables a cap).
    pub fn with_limits(max_steps: u64, max_depth: u64) -> Self {
        Self {
            recent: VecDeque::with_capacity(RECENT_STEPS),
            count: 0,
            max_steps,
            max_depth,
        }
    }

    /// Registers one step at the given worklist depth. Returns the fatal
    /// overflow diagnostic when a cap is exceeded.
    pub fn register(
        &mut self,
        step: ElabStep,
        depth: u64,
        db: &SyntaxDb,
    ) -> Result<(), ElabOverflow> {
        if self.recent.len() == RECENT_STEPS {
            self.recent.pop_front();
        }
        self.recent.push_back(step);
        self.count += 1;

        let over_steps = self.max_steps != 0 && self.count > self.max_steps;
        let over_depth = self.max_depth != 0 && depth > self.max_depth;
        if !over_steps && !over_depth {
            return Ok(());
        }

        let mut message = if over_steps {
            format!(
                "exceeded maximum number of elaboration steps ({}). The design may have a \
                 non-terminating loop or sequence of parametric functions, modules, or types. \
                 Fix the design to avoid non-termination, or increase the maximum number of \
                 elaboration steps if the design is correct.\n",
                self.max_steps
            )
        } else {
            format!(
                "exceeded maximum elaboration depth ({}). The design may have a \
                 non-terminating recursion of parametric functions, modules, or types. \
                 Fix the design to avoid non-termination, or increase the maximum \
                 elaboration depth if the design is correct.\n",
                self.max_depth
            )
        };
        message.push_str("The last elaboration steps are:\n");
        for (i, step) in self.recent.iter().rev().enumerate() {
            let step_str = match step {
                ElabStep::Parametric(pu) => pu.render(true),
                ElabStep::ForIteration { node, value } => {
                    let var = ast::for_parts(db, *node).init_var;
                    format!(
                        "for loop at {}, iteration {} = {}",
                        hl_colored(&db.loc(*node)),
                        db.text(var),
                        value
                    )
                }
            };
            message.push_str(&format!(
                "    {:>12}: {}\n",
                hl_colored(&(self.count - i as u64).to_string()),
                step_str
            ));
        }
        Err(ElabOverflow { message })
    }
}

impl Default for StepLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msc_syntax::parse_source;

    fn dummy_db() -> SyntaxDb {
        let mut db = SyntaxDb::new();
        parse_source(&mut db, "t.ms", "").unwrap();
        db
    }

    fn pu(name: &str) -> Rc<ParametricUse> {
        Rc::new(ParametricUse {
            name: name.to_string(),
            escape: false,
            params: vec![crate::parametric::ParamValue::Int(1)],
        })
    }

    #[test]
    fn under_cap_is_ok() {
        let db = dummy_db();
        let mut limits = StepLimiter::with_limits(10, 10);
        for _ in 0..10 {
            assert!(limits
                .register(ElabStep::Parametric(pu("f")), 1, &db)
                .is_ok());
        }
    }

    #[test]
    fn step_cap_overflows_with_recent_steps() {
        let db = dummy_db();
        let mut limits = StepLimiter::with_limits(3, 0);
        for _ in 0..3 {
            limits
                .register(ElabStep::Parametric(pu("f")), 1, &db)
                .unwrap();
        }
        let err = limits
            .register(ElabStep::Parametric(pu("g")), 1, &db)
            .unwrap_err();
        assert!(err.message.contains("maximum number of elaboration steps (3)"));
        assert!(err.message.contains("The last elaboration steps are:"));
        assert!(err.message.contains("g#(1)"));
    }

    #[test]
    fn depth_cap_overflows() {
        let db = dummy_db();
        let mut limits = StepLimiter::with_limits(0, 5);
        let err = limits
            .register(ElabStep::Parametric(pu("f")), 6, &db)
            .unwrap_err();
        assert!(err.message.contains("maximum elaboration depth (5)"));
    }

    #[test]
    fn ring_keeps_only_recent() {
        let db = dummy_db();
        let mut limits = StepLimiter::with_limits(100, 0);
        for i in 0..40 {
            limits
                .register(ElabStep::Parametric(pu(&format!("f{i}"))), 1, &db)
                .unwrap();
        }
        assert_eq!(limits.recent.len(), RECENT_STEPS);
    }

    #[test]
    fn zero_caps_disable_checks() {
        let db = dummy_db();
        let mut limits = StepLimiter::with_limits(0, 0);
        for _ in 0..1000 {
            assert!(limits
                .register(ElabStep::Parametric(pu("f")), 999, &db)
                .is_ok());
        }
    }
}
