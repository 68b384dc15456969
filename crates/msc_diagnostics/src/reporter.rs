//! Accumulating, deduplicating reporter for user-facing diagnostics.
//!
//! Errors and warnings are printed to stderr as they arrive, but repeats are
//! suppressed: a message is dropped if its exact text was already reported,
//! and (in the default "brief" mode) also if any earlier message was anchored
//! at the same parse-tree node. Elaborating a design usually re-visits the
//! same definitions many times, so without deduplication users would drown
//! in copies of the same complaint.

use crate::style::{hl_colored, note_colored};
use msc_common::NodeId;
use std::collections::HashSet;
use std::sync::Mutex;

struct Bag {
    msgs: HashSet<String>,
    nodes: HashSet<NodeId>,
    printed: Vec<String>,
    total: usize,
}

impl Bag {
    fn new() -> Self {
        Self {
            msgs: HashSet::new(),
            nodes: HashSet::new(),
            printed: Vec::new(),
            total: 0,
        }
    }
}

struct State {
    errors: Bag,
    warnings: Bag,
}

/// The reporter: two bags (errors and warnings) with message-text and
/// anchor-node deduplication.
///
/// In "brief" mode (the default), a message is suppressed if either its text
/// or its anchor node has already been seen. With `report_all`, only
/// byte-identical repeats are suppressed. Exact duplicates are not even
/// counted toward the totals; suppressed-but-distinct messages are, which is
/// what the omitted-errors hint is based on.
pub struct Reporter {
    state: Mutex<State>,
    report_all: bool,
}

impl Reporter {
    /// Creates a reporter. `report_all` disables anchor-node deduplication
    /// (the `--all-errors` mode).
    pub fn new(report_all: bool) -> Self {
        Self {
            state: Mutex::new(State {
                errors: Bag::new(),
                warnings: Bag::new(),
            }),
            report_all,
        }
    }

    /// Reports an error message, optionally anchored at a parse-tree node.
    ///
    /// `loc_info` carries breadcrumb context lines printed after the message.
    pub fn error(&self, msg: impl Into<String>, loc_info: &str, node: Option<NodeId>) {
        self.report(true, msg.into(), loc_info, node);
    }

    /// Reports a warning message, optionally anchored at a parse-tree node.
    pub fn warning(&self, msg: impl Into<String>, loc_info: &str, node: Option<NodeId>) {
        self.report(false, msg.into(), loc_info, node);
    }

    fn report(&self, is_error: bool, msg: String, loc_info: &str, node: Option<NodeId>) {
        let mut state = self.state.lock().unwrap();
        let bag = if is_error {
            &mut state.errors
        } else {
            &mut state.warnings
        };
        if bag.msgs.contains(&msg) {
            // The backend sometimes emits exactly the same diagnostic twice
            // (e.g., double-writes). Don't count byte-identical repeats at
            // all, regardless of mode.
            return;
        }
        let node_seen = node.is_some_and(|n| bag.nodes.contains(&n));
        if self.report_all || !node_seen {
            bag.msgs.insert(msg.clone());
            if let Some(n) = node {
                bag.nodes.insert(n);
            }
            let full = if loc_info.is_empty() {
                msg
            } else {
                format!("{msg}\n{loc_info}")
            };
            eprintln!("{full}");
            bag.printed.push(full);
        }
        bag.total += 1;
    }

    /// Returns `true` if any error has been reported (suppressed or not).
    pub fn has_errors(&self) -> bool {
        self.state.lock().unwrap().errors.total > 0
    }

    /// Returns the number of errors reported so far, counting suppressed
    /// (but not byte-identical) repeats.
    pub fn error_count(&self) -> usize {
        self.state.lock().unwrap().errors.total
    }

    /// If errors were suppressed by brief-mode deduplication, returns a hint
    /// telling the user how to see them all.
    pub fn omitted_note(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        let omitted = state.errors.total.saturating_sub(state.errors.msgs.len());
        if omitted == 0 {
            return None;
        }
        Some(format!(
            "{} omitted {} errors similar to those reported; run with {} to see all errors",
            note_colored("note:"),
            omitted,
            hl_colored("--all-errors")
        ))
    }

    /// Returns a snapshot of the error messages actually printed.
    pub fn printed_errors(&self) -> Vec<String> {
        self.state.lock().unwrap().errors.printed.clone()
    }

    /// Returns a snapshot of the warning messages actually printed.
    pub fn printed_warnings(&self) -> Vec<String> {
        self.state.lock().unwrap().warnings.printed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_reporter() {
        let r = Reporter::new(false);
        assert!(!r.has_errors());
        assert_eq!(r.error_count(), 0);
        assert!(r.omitted_note().is_none());
    }

    #[test]
    fn exact_duplicate_not_counted() {
        let r = Reporter::new(false);
        r.error("boom", "", None);
        r.error("boom", "", None);
        assert_eq!(r.error_count(), 1);
        assert_eq!(r.printed_errors().len(), 1);
        assert!(r.omitted_note().is_none());
    }

    #[test]
    fn same_node_suppressed_but_counted() {
        let r = Reporter::new(false);
        let n = NodeId::from_raw(3);
        r.error("first", "", Some(n));
        r.error("second", "", Some(n));
        assert_eq!(r.error_count(), 2);
        assert_eq!(r.printed_errors().len(), 1);
        let note = r.omitted_note().unwrap();
        assert!(note.contains("omitted 1 errors"));
        assert!(note.contains("--all-errors"));
    }

    #[test]
    fn all_mode_prints_same_node() {
        let r = Reporter::new(true);
        let n = NodeId::from_raw(3);
        r.error("first", "", Some(n));
        r.error("second", "", Some(n));
        assert_eq!(r.printed_errors().len(), 2);
        assert!(r.omitted_note().is_none());
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let r = Reporter::new(false);
        r.warning("meh", "", None);
        assert!(!r.has_errors());
        assert_eq!(r.printed_warnings().len(), 1);
    }

    #[test]
    fn loc_info_appended_after_message() {
        let r = Reporter::new(false);
        r.error("msg body", "In function f\n", None);
        let printed = r.printed_errors();
        assert!(printed[0].starts_with("msg body\n"));
        assert!(printed[0].contains("In function f"));
    }

    #[test]
    fn separate_bags_for_warnings_and_errors() {
        let r = Reporter::new(false);
        let n = NodeId::from_raw(7);
        r.warning("w", "", Some(n));
        r.error("e", "", Some(n));
        // The warning's node anchor must not suppress the error.
        assert_eq!(r.printed_errors().len(), 1);
    }
}
