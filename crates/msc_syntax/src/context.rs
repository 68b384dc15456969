//! Source-context rendering for diagnostics.
//!
//! Errors anchored at a parse-tree node are printed with the node's source
//! lines indented underneath, with the offending sub-elements highlighted.

use crate::tree::SyntaxDb;
use msc_common::NodeId;
use msc_diagnostics::error_colored;

/// Renders the source lines covered by `node`, indented four spaces, with
/// each highlight node's text colored. Highlights nested inside an earlier
/// highlight are skipped.
pub fn context_str(db: &SyntaxDb, node: NodeId, highlights: &[NodeId]) -> String {
    let start_tok = db.first_token(node);
    let end_tok = db.last_token(node);
    let file = db.sources.file(start_tok.span.file);
    let (start_line, _) = file.line_col(start_tok.span.start);
    let (end_tok_line, _) = file.line_col(end_tok.span.start);
    let end_line = end_tok_line.max(start_line);

    let mut text = String::new();
    let mut line_offsets = vec![0usize];
    for line in start_line..=end_line {
        let line_str = file.line_text(line);
        text.push_str(line_str);
        text.push('\n');
        line_offsets.push(line_offsets.last().unwrap() + line_str.len() + 1);
    }

    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for &h in highlights {
        let tok = db.first_token(h);
        if tok.span.file != start_tok.span.file {
            continue;
        }
        let (line, col) = file.line_col(tok.span.start);
        if line < start_line || line > end_line {
            continue;
        }
        let start_pos = line_offsets[(line - start_line) as usize] + (col - 1) as usize;
        ranges.push((start_pos, db.text(h).len()));
    }
    ranges.sort_unstable();

    let mut out = String::new();
    let mut pos = 0usize;
    for (start, len) in ranges {
        if start < pos {
            continue; // nested within the previous highlight
        }
        let end = (start + len).min(text.len());
        out.push_str(&text[pos..start]);
        out.push_str(&error_colored(&text[start..end]));
        pos = end;
    }
    out.push_str(&text[pos..]);

    let indented = out.replace('\n', "\n    ");
    let mut res = format!("    {indented}");
    res.truncate(res.len().saturating_sub(4)); // drop the indent after the final newline
    res
}

/// Quotes a node's source text for inclusion in an error message, escaping
/// newlines and tabs and coloring the result.
pub fn quote(db: &SyntaxDb, node: NodeId) -> String {
    let escaped = db.text(node).replace('\n', "\\n").replace('\t', "\\t");
    error_colored(&format!("'{escaped}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::tree::NodeKind;

    #[test]
    fn context_covers_node_lines() {
        let mut db = SyntaxDb::new();
        let root = parse_source(
            &mut db,
            "t.ms",
            "module M;\n  rule r;\n  endrule\nendmodule",
        )
        .unwrap();
        let m = db.child_of_kind(root, NodeKind::ModuleDef).unwrap();
        let ctx = context_str(&db, m, &[]);
        assert!(ctx.contains("module M;"));
        assert!(ctx.contains("    endmodule"));
        assert!(ctx.ends_with('\n'));
    }

    #[test]
    fn highlight_is_colored() {
        let mut db = SyntaxDb::new();
        let root = parse_source(&mut db, "t.ms", "Integer x = 3;").unwrap();
        let vb = db.child_of_kind(root, NodeKind::VarBinding).unwrap();
        let init = db.child_of_kind(vb, NodeKind::VarInit).unwrap();
        let name = db.child_of_kind(init, NodeKind::LowerIdent).unwrap();
        let ctx = context_str(&db, vb, &[name]);
        assert!(ctx.contains("\x1b[1;31mx\x1b[0m"));
    }

    #[test]
    fn nested_highlight_skipped() {
        let mut db = SyntaxDb::new();
        let root = parse_source(&mut db, "t.ms", "Integer x = y + 1;").unwrap();
        let vb = db.child_of_kind(root, NodeKind::VarBinding).unwrap();
        let init = db.child_of_kind(vb, NodeKind::VarInit).unwrap();
        let binop = db.child_of_kind(init, NodeKind::BinopExpr).unwrap();
        let lhs = db.children(binop)[0];
        // Highlighting both the binop and its lhs colors only the binop.
        let ctx = context_str(&db, vb, &[binop, lhs]);
        assert_eq!(ctx.matches("\x1b[1;31m").count(), 1);
    }

    #[test]
    fn quote_escapes_newlines() {
        let mut db = SyntaxDb::new();
        let root = parse_source(&mut db, "t.ms", "Integer x =\n3;").unwrap();
        let vb = db.child_of_kind(root, NodeKind::VarBinding).unwrap();
        let q = quote(&db, vb);
        assert!(q.contains("\\n"));
        assert!(!q.contains('\n'));
    }
}
