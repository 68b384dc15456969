//! MS source text storage and location tracking.
//!
//! [`SourceDb`] owns the text of every loaded `.ms` file (and synthetic
//! sources like the re-parsed top-level argument); [`FileId`] and
//! [`Span`] locate byte ranges within them; [`SourceFile`] resolves byte
//! offsets to the line/column coordinates diagnostics print.

#![warn(missing_docs)]

pub mod source_db;
pub mod source_file;
pub mod span;

pub use source_db::SourceDb;
pub use source_file::SourceFile;
pub use span::{FileId, Span};
