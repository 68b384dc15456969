//! Storage for all MS source text in a compilation.
//!
//! The input file and everything it transitively imports are loaded here,
//! plus any synthetic in-memory sources (the top-level argument). Every
//! piece of text the compiler ever prints or re-emits — node text,
//! inter-token gaps, quoted error snippets — is sliced out of this
//! database via [`snippet`](SourceDb::snippet), which is what lets the
//! parse tree store token indices instead of owned strings.

use crate::source_file::SourceFile;
use crate::span::{FileId, Span};
use std::io;
use std::path::{Path, PathBuf};

/// The source database. Owns all loaded text for the lifetime of the
/// compilation; [`FileId`]s index into it.
pub struct SourceDb {
    files: Vec<SourceFile>,
}

impl SourceDb {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Reads an `.ms` file from disk into the database, returning its id.
    /// The import resolver calls this once per distinct file.
    pub fn load_file(&mut self, path: &Path) -> Result<FileId, io::Error> {
        let content = std::fs::read_to_string(path)?;
        Ok(self.push(path.to_path_buf(), content))
    }

    /// Adds an in-memory source under a synthetic name, which appears as
    /// the file path in diagnostics. Used for the re-parsed top-level
    /// argument and for tests.
    pub fn add_source(&mut self, name: impl Into<PathBuf>, content: String) -> FileId {
        self.push(name.into(), content)
    }

    fn push(&mut self, path: PathBuf, content: String) -> FileId {
        let id = FileId::from_raw(self.files.len() as u32);
        self.files.push(SourceFile::new(id, path, content));
        id
    }

    /// The file behind an id.
    ///
    /// # Panics
    ///
    /// Panics on an id not produced by this database.
    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.as_raw() as usize]
    }

    /// The text a span covers.
    pub fn snippet(&self, span: Span) -> &str {
        self.file(span.file).snippet(span.start, span.end)
    }
}

impl Default for SourceDb {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_source_and_snippet() {
        let mut db = SourceDb::new();
        let id = db.add_source("adder.ms", "module Adder; endmodule".to_string());
        assert_eq!(db.file(id).content, "module Adder; endmodule");
        // "Adder" sits at bytes 7..12.
        assert_eq!(db.snippet(Span::new(id, 7, 12)), "Adder");
    }

    #[test]
    fn ids_are_dense_and_distinct() {
        let mut db = SourceDb::new();
        let first = db.add_source("a.ms", "let x = 1;".to_string());
        let second = db.add_source("b.ms", "let y = 2;".to_string());
        assert_ne!(first, second);
        assert_eq!(db.file(first).path, PathBuf::from("a.ms"));
        assert_eq!(db.file(second).path, PathBuf::from("b.ms"));
    }

    #[test]
    fn synthetic_name_shows_as_path() {
        let mut db = SourceDb::new();
        let id = db.add_source("<command line>", "f#(4)".to_string());
        assert_eq!(db.file(id).path, PathBuf::from("<command line>"));
    }

    #[test]
    fn load_file_reads_from_disk() {
        let dir = std::env::temp_dir().join("msc_source_db_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("Shifter.ms");
        std::fs::write(&path, "module Shifter; endmodule").unwrap();

        let mut db = SourceDb::new();
        let id = db.load_file(&path).unwrap();
        assert_eq!(db.file(id).content, "module Shifter; endmodule");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_file_missing_is_io_error() {
        let mut db = SourceDb::new();
        assert!(db
            .load_file(Path::new("/nonexistent/Nope.ms"))
            .is_err());
    }
}
