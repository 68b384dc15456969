//! Shared foundational types used across the MS compiler.
//!
//! This crate provides interned identifiers (including the pre-interned
//! well-known names the elaborator dispatches on), the opaque parse-tree
//! node id used to key elaboration state and diagnostic deduplication,
//! and the internal-error type for unrecoverable compiler bugs.

#![warn(missing_docs)]

pub mod ident;
pub mod ids;
pub mod result;

pub use ident::{Ident, Interner, WellKnown};
pub use ids::NodeId;
pub use result::{InternalError, MscResult};
