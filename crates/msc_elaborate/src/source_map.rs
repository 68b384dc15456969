//! The immutable source map from emitted backend code to MS parse nodes.
//!
//! Built by [`TranslatedCode::finish`](crate::emit::TranslatedCode::finish).
//! Answers "which MS node produced emitted line L, column C?" and "what are
//! the breadcrumb labels enclosing that position?", which is what the
//! diagnostic back-translator uses to re-anchor backend messages.

use msc_common::NodeId;
use std::collections::BTreeMap;

/// The source map: emitted code, destination-to-source ranges, breadcrumb
/// ranges, a line index, and the name of the top module to hand to the
/// backend.
#[derive(Debug)]
pub struct SourceMap {
    code: String,
    dst_to_src: BTreeMap<(usize, usize), NodeId>,
    dst_to_info: BTreeMap<(usize, usize), String>,
    line_starts: Vec<usize>,
    top_module: String,
}

impl SourceMap {
    pub(crate) fn new(
        dst_to_src: BTreeMap<(usize, usize), NodeId>,
        dst_to_info: BTreeMap<(usize, usize), String>,
        code: String,
        top_module: String,
    ) -> Self {
        let mut line_starts = vec![0usize];
        for (i, b) in code.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            code,
            dst_to_src,
            dst_to_info,
            line_starts,
            top_module,
        }
    }

    /// Converts 1-indexed line/column coordinates into a byte offset, or
    /// `None` when the line is out of range.
    fn pos(&self, line: u32, col: u32) -> Option<usize> {
        if line == 0 || col == 0 || line as usize > self.line_starts.len() {
            return None;
        }
        Some(self.line_starts[(line - 1) as usize] + (col - 1) as usize)
    }

    /// Finds the source node of the smallest emitted range starting
    /// exactly at the given position.
    pub fn find(&self, line: u32, col: u32) -> Option<NodeId> {
        let pos = self.pos(line, col)?;
        let (&(start, _), &node) = self.dst_to_src.range((pos, pos)..).next()?;
        if start != pos {
            return None;
        }
        Some(node)
    }

    /// Finds the source node of the range starting at the given position
    /// whose emitted text is exactly `text`. Used when the backend message
    /// names a specific identifier.
    pub fn find_exact(&self, line: u32, col: u32, text: &str) -> Option<NodeId> {
        let pos = self.pos(line, col)?;
        let end = pos + text.len();
        let node = *self.dst_to_src.get(&(pos, end))?;
        if self.code.get(pos..end) != Some(text) {
            return None;
        }
        Some(node)
    }

    /// Returns the breadcrumb labels whose ranges enclose the given
    /// position, outermost first, each on its own `In ...` line.
    pub fn context_info(&self, line: u32, col: u32) -> String {
        let Some(pos) = self.pos(line, col) else {
            return String::new();
        };
        let mut out = String::new();
        for (&(start, end), info) in &self.dst_to_info {
            if start <= pos && end >= pos {
                out.push_str(&format!("In {info}\n"));
            }
            if start > pos {
                break; // nothing useful beyond this point
            }
        }
        out
    }

    /// The emitted backend code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The top module to hand to the backend (empty when only typechecking).
    pub fn top_module(&self) -> &str {
        &self.top_module
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(code: &str, ranges: &[((usize, usize), u32)], infos: &[((usize, usize), &str)]) -> SourceMap {
        let dst_to_src = ranges
            .iter()
            .map(|&(r, n)| (r, NodeId::from_raw(n)))
            .collect();
        let dst_to_info = infos
            .iter()
            .map(|&(r, s)| (r, s.to_string()))
            .collect();
        SourceMap::new(dst_to_src, dst_to_info, code.to_string(), String::new())
    }

    #[test]
    fn find_exact_start() {
        let sm = map("abc\ndef\n", &[((4, 7), 1)], &[]);
        assert_eq!(sm.find(2, 1), Some(NodeId::from_raw(1)));
        assert_eq!(sm.find(2, 2), None);
        assert_eq!(sm.find(1, 1), None);
    }

    #[test]
    fn find_prefers_smallest_range_at_position() {
        let sm = map("abcdef\n", &[((2, 4), 1), ((2, 6), 2)], &[]);
        // Both ranges start at offset 2; lexicographic order puts the
        // smaller end first.
        assert_eq!(sm.find(1, 3), Some(NodeId::from_raw(1)));
    }

    #[test]
    fn find_out_of_range_line() {
        let sm = map("abc\n", &[((0, 3), 1)], &[]);
        assert_eq!(sm.find(9, 1), None);
        assert_eq!(sm.find(0, 1), None);
    }

    #[test]
    fn find_exact_requires_text_match() {
        let sm = map("foo bar\n", &[((4, 7), 1)], &[]);
        assert_eq!(sm.find_exact(1, 5, "bar"), Some(NodeId::from_raw(1)));
        assert_eq!(sm.find_exact(1, 5, "baz"), None);
        assert_eq!(sm.find_exact(1, 5, "ba"), None); // wrong range length
    }

    #[test]
    fn context_info_outermost_first() {
        let sm = map(
            "0123456789\n",
            &[],
            &[((0, 9), "module M"), ((2, 6), "for loop, iteration with i = 1")],
        );
        let info = sm.context_info(1, 4);
        assert_eq!(
            info,
            "In module M\nIn for loop, iteration with i = 1\n"
        );
    }

    #[test]
    fn context_info_excludes_non_enclosing() {
        let sm = map("0123456789\n", &[], &[((0, 2), "early"), ((5, 9), "late")]);
        assert_eq!(sm.context_info(1, 4), "");
        assert_eq!(sm.context_info(1, 6), "In late\n");
    }

    #[test]
    fn top_module_is_kept() {
        let sm = SourceMap::new(
            BTreeMap::new(),
            BTreeMap::new(),
            String::new(),
            "mkTopLevel___".to_string(),
        );
        assert_eq!(sm.top_module(), "mkTopLevel___");
    }
}
