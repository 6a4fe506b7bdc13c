//! Sequence operations and change notifications
//!
//! Operations are submitted in groups. A group is the atomic unit: it applies
//! entirely or not at all, and remote replicas never observe a partial group.
//! Ops within a group apply sequentially, each against the sequence state
//! produced by the previous op in the same group, so a later op's position
//! accounts for slots inserted by earlier ops in the group.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::Range;
use uuid::Uuid;

/// Identifier for one connected replica
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaId(Uuid);

impl ReplicaId {
    /// Mint a fresh replica identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReplicaId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One primitive mutation of the shared sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SequenceOp {
    /// Insert text; each character occupies one slot starting at `pos`
    InsertText { pos: usize, text: String },

    /// Insert a zero-width marker carrying opaque metadata at `pos`
    InsertMarker { pos: usize, metadata: Value },

    /// Remove the half-open slot range `[begin, end)`
    RemoveRange { begin: usize, end: usize },
}

impl SequenceOp {
    /// Net slot-count change this op produces when applied
    pub fn delta(&self) -> isize {
        match self {
            SequenceOp::InsertText { text, .. } => text.chars().count() as isize,
            SequenceOp::InsertMarker { .. } => 1,
            SequenceOp::RemoveRange { begin, end } => -((end - begin) as isize),
        }
    }
}

/// Atomic submission unit
///
/// `base_version` is the sequence version the submitter computed its
/// positions against. The engine rejects a group whose base is stale rather
/// than rebasing it, because operation semantics are assigned by position at
/// submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpGroup {
    pub base_version: u64,
    pub ops: Vec<SequenceOp>,
}

impl OpGroup {
    pub fn new(base_version: u64, ops: Vec<SequenceOp>) -> Self {
        Self { base_version, ops }
    }

    /// Net slot-count change of the whole group
    pub fn delta(&self) -> isize {
        self.ops.iter().map(SequenceOp::delta).sum()
    }
}

/// Notification emitted once per applied group
///
/// Delivered to every replica in the same total order (version order).
/// `origin` lets a session distinguish echoes of its own submissions from
/// genuinely remote operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    /// Sequence version after this group applied
    pub version: u64,

    /// Affected slot span, in post-state coordinates
    pub range: Range<usize>,

    /// Net slot-count change of the group
    pub delta: isize,

    /// Replica that submitted the group
    pub origin: ReplicaId,
}

impl ChangeNotification {
    /// The affected span translated to pre-state coordinates
    pub fn pre_range(&self) -> Range<usize> {
        let end = (self.range.end as isize - self.delta).max(self.range.start as isize) as usize;
        self.range.start..end
    }
}
