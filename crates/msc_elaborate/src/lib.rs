//! The MS elaborator: compile-time evaluation and source-to-source
//! translation into the backend HDL.
//!
//! The pipeline is: parse trees in, [`translate_files`] runs the
//! [`Elaborator`](elaborator::Elaborator) over every file, drains the
//! worklist of parametric specializations to a fixpoint, and produces a
//! [`SourceMap`] pairing the emitted backend source with the parse-tree
//! provenance of every emitted range.

#![warn(missing_docs)]

pub mod context;
pub mod driver;
pub mod elaborator;
pub mod emit;
pub mod keywords;
pub mod parametric;
pub mod source_map;
pub mod steps;
pub mod toplevel;
pub mod value;

pub use driver::{prelude, translate_files, FatalError};
pub use parametric::{ParamValue, ParametricUse};
pub use source_map::SourceMap;
pub use steps::StepLimiter;
