//! Opaque ID for parse-tree nodes.
//!
//! Every node of every parsed file lives in one arena, so a `NodeId` uniquely
//! identifies a syntax element across the whole compilation session. The
//! elaborator keys its per-node values on `NodeId`, the source map records
//! `NodeId`s for emitted ranges, and the reporter deduplicates diagnostics
//! anchored at the same `NodeId`.

use serde::{Deserialize, Serialize};

/// Opaque, copyable ID for a parse-tree node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates an ID from a raw `u32` index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}
