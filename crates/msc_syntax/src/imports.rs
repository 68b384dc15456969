//! Import resolution and topological ordering of MS source files.
//!
//! `import Foo;` resolves `Foo.ms` against the search path. Files are
//! parsed once each, imports are followed recursively, and the result is a
//! list of package roots in dependency order (leaves first), the order the
//! driver elaborates and emits them in. Import cycles are fatal.

use crate::ast;
use crate::parser::{parse_package, render_parse_error};
use crate::tree::{NodeKind, SyntaxDb};
use msc_common::NodeId;
use msc_diagnostics::error_colored;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Parses `input` and, recursively, every file it imports, returning the
/// package roots in topological order (imported files before importers).
///
/// On failure returns a fully rendered, printable error message: a lex or
/// parse error with source context, a missing import, an unreadable file,
/// or an import cycle.
pub fn parse_file_and_imports(
    db: &mut SyntaxDb,
    input: &Path,
    search_path: &[PathBuf],
) -> Result<Vec<NodeId>, String> {
    let mut walker = ImportWalker {
        db,
        search_path,
        roots: HashMap::new(),
        visiting: Vec::new(),
        order: Vec::new(),
    };
    walker.visit(input.to_path_buf())?;
    Ok(walker.order)
}

struct ImportWalker<'a> {
    db: &'a mut SyntaxDb,
    search_path: &'a [PathBuf],
    /// Files already fully processed, by path string.
    roots: HashMap<String, NodeId>,
    /// DFS stack of files being processed, for cycle reporting.
    visiting: Vec<String>,
    /// Package roots in post-order (leaves first).
    order: Vec<NodeId>,
}

impl ImportWalker<'_> {
    fn visit(&mut self, path: PathBuf) -> Result<NodeId, String> {
        let key = path.display().to_string();
        if let Some(&root) = self.roots.get(&key) {
            return Ok(root);
        }
        if let Some(cycle_start) = self.visiting.iter().position(|p| *p == key) {
            let mut chain: Vec<&str> =
                self.visiting[cycle_start..].iter().map(|s| s.as_str()).collect();
            chain.push(&key);
            return Err(format!(
                "{} import cycle detected: {}",
                error_colored("error:"),
                chain.join(" -> ")
            ));
        }

        let file = self.db.sources.load_file(&path).map_err(|_| {
            format!(
                "{} could not read source file {}",
                error_colored("error:"),
                key
            )
        })?;
        let root = parse_package(self.db, file)
            .map_err(|e| render_parse_error(self.db, &e))?;

        self.visiting.push(key.clone());
        for decl in self.db.children_of_kind(root, NodeKind::ImportDecl) {
            for name in ast::import_names(self.db, decl) {
                let import_file = format!("{}.ms", self.db.text(name));
                let resolved = self.resolve(&import_file).ok_or_else(|| {
                    format!(
                        "{} could not find import {} from parsed file {}",
                        error_colored("error:"),
                        import_file,
                        key
                    )
                })?;
                self.visit(resolved)?;
            }
        }
        self.visiting.pop();

        self.roots.insert(key, root);
        self.order.push(root);
        Ok(root)
    }

    fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        for dir in self.search_path {
            let candidate = dir.join(file_name);
            if candidate.exists() {
                return Some(candidate);
            }
        }
        None
    }
}
