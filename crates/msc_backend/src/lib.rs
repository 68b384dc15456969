//! Backend (Bluespec compiler) invocation and diagnostic back-translation.
//!
//! The backend is run as a synchronous subprocess over the translated
//! file; its raw diagnostic text is parsed with regular expressions,
//! re-anchored to MS source through the source map, and specialized from a
//! catalogue of known backend error codes into MS-phrased messages.

#![warn(missing_docs)]

pub mod bsc;
pub mod report;

pub use bsc::{run_bsc, RunResult};
pub use report::report_backend_output;
