//! Node identification.

use std::fmt;

/// Dense identifier for a node in the build graph.
///
/// Ids are assigned positionally: the i-th rule in the rule file receives
/// id i. They index directly into the graph's parallel arrays and are the
/// sole cross-component handle for a target; names exist only for file I/O,
/// staleness checks, and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Index into one of the graph's parallel arrays.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(raw: u32) -> Self {
        NodeId(raw)
    }
}
