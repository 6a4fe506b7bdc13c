//! Reference shared-sequence engine
//!
//! [`SharedSequence`] is the consumed interface of the external engine: an
//! ordered sequence with stable integer-offset addressing, atomic grouped
//! submission, and totally-ordered change notifications carrying an origin
//! flag. Production deployments back it with a real convergent engine;
//! [`MemorySequence`] backs it with a single in-process operation log, which
//! makes the same guarantees hold trivially for tests and single-process use.
//!
//! Notification delivery is pull-based: consumers drain [`changes_since`] in
//! version order. Version order is the engine's finalization order, identical
//! for every replica, and consumers must not reorder it.
//!
//! [`changes_since`]: SharedSequence::changes_since

use crate::error::{BridgeError, Result};
use crate::sequence::element::SequenceElement;
use crate::sequence::op::{ChangeNotification, OpGroup, ReplicaId, SequenceOp};

/// The shared sequence as consumed by the bridge
///
/// The engine behind this trait is the sole source of truth for document
/// content and structure. It guarantees that all replicas converge to the
/// same sequence given the same applied operations, regardless of arrival
/// order; the bridge never reimplements that.
pub trait SharedSequence {
    /// Current number of slots (characters and markers both count as one)
    fn len(&self) -> usize;

    /// Whether the sequence is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Version counter; incremented once per applied group
    fn version(&self) -> u64;

    /// Copy of the half-open slot range `[begin, end)`
    fn slice(&self, begin: usize, end: usize) -> Result<Vec<SequenceElement>>;

    /// Copy of the full current content (the load-existing path)
    fn snapshot(&self) -> Vec<SequenceElement>;

    /// Submit one group atomically; returns the version it applied at.
    ///
    /// Rejects the whole group, leaving the sequence untouched, when any op
    /// is out of bounds or when `base_version` is stale.
    fn submit(&mut self, origin: ReplicaId, group: OpGroup) -> Result<u64>;

    /// All notifications with version greater than `version`, in order
    fn changes_since(&self, version: u64) -> Vec<ChangeNotification>;
}

/// In-process reference engine: one totally-ordered op log
#[derive(Debug, Default)]
pub struct MemorySequence {
    elements: Vec<SequenceElement>,
    version: u64,
    log: Vec<ChangeNotification>,
    offline: bool,
}

impl MemorySequence {
    /// Create an empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a connectivity fault: while offline, `submit` fails with
    /// `TransportFailure` and nothing is applied.
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Plain-text view: all characters in order, markers skipped
    pub fn text(&self) -> String {
        self.elements
            .iter()
            .filter_map(|e| match e {
                SequenceElement::Char(c) => Some(*c),
                SequenceElement::Marker(_) => None,
            })
            .collect()
    }

    /// Apply one op to `elements`, updating the affected span `lo..hi`
    /// (tracked in the evolving coordinate frame) in place.
    fn apply_op(
        elements: &mut Vec<SequenceElement>,
        op: &SequenceOp,
        lo: &mut usize,
        hi: &mut usize,
    ) -> Result<()> {
        match op {
            SequenceOp::InsertText { pos, text } => {
                if *pos > elements.len() {
                    return Err(BridgeError::PositionOutOfBounds {
                        position: *pos,
                        length: elements.len(),
                    });
                }
                let count = text.chars().count();
                elements.splice(*pos..*pos, text.chars().map(SequenceElement::Char));
                Self::widen_after_insert(lo, hi, *pos, count);
            }
            SequenceOp::InsertMarker { pos, metadata } => {
                if *pos > elements.len() {
                    return Err(BridgeError::PositionOutOfBounds {
                        position: *pos,
                        length: elements.len(),
                    });
                }
                elements.insert(*pos, SequenceElement::Marker(metadata.clone()));
                Self::widen_after_insert(lo, hi, *pos, 1);
            }
            SequenceOp::RemoveRange { begin, end } => {
                if begin > end || *end > elements.len() {
                    return Err(BridgeError::RangeOutOfBounds {
                        begin: *begin,
                        end: *end,
                        length: elements.len(),
                    });
                }
                elements.drain(*begin..*end);
                Self::widen_after_remove(lo, hi, *begin, end - begin);
            }
        }
        Ok(())
    }

    fn widen_after_insert(lo: &mut usize, hi: &mut usize, pos: usize, count: usize) {
        if *lo != usize::MAX {
            // Shift the already-touched span past the insertion point
            if *lo >= pos {
                *lo += count;
            }
            if *hi > pos {
                *hi += count;
            }
        }
        *lo = (*lo).min(pos);
        *hi = (*hi).max(pos + count);
    }

    fn widen_after_remove(lo: &mut usize, hi: &mut usize, begin: usize, count: usize) {
        let end = begin + count;
        if *lo != usize::MAX {
            if *lo >= end {
                *lo -= count;
            } else if *lo > begin {
                *lo = begin;
            }
            if *hi >= end {
                *hi -= count;
            } else if *hi > begin {
                *hi = begin;
            }
        }
        *lo = (*lo).min(begin);
        *hi = (*hi).max(begin);
    }
}

impl SharedSequence for MemorySequence {
    fn len(&self) -> usize {
        self.elements.len()
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn slice(&self, begin: usize, end: usize) -> Result<Vec<SequenceElement>> {
        if begin > end || end > self.elements.len() {
            return Err(BridgeError::RangeOutOfBounds {
                begin,
                end,
                length: self.elements.len(),
            });
        }
        Ok(self.elements[begin..end].to_vec())
    }

    fn snapshot(&self) -> Vec<SequenceElement> {
        self.elements.clone()
    }

    fn submit(&mut self, origin: ReplicaId, group: OpGroup) -> Result<u64> {
        if self.offline {
            return Err(BridgeError::TransportFailure(
                "sequence engine unreachable".to_string(),
            ));
        }
        if group.base_version != self.version {
            return Err(BridgeError::StaleOffsetSubmission {
                base: group.base_version,
                current: self.version,
            });
        }

        // Apply to a scratch copy first: the group commits entirely or not
        // at all, so no replica ever observes a partial group.
        let mut scratch = self.elements.clone();
        let mut lo = usize::MAX;
        let mut hi = 0usize;
        for op in &group.ops {
            Self::apply_op(&mut scratch, op, &mut lo, &mut hi)?;
        }

        let range = if lo == usize::MAX { 0..0 } else { lo..hi };
        let delta = group.delta();

        self.elements = scratch;
        self.version += 1;
        self.log.push(ChangeNotification {
            version: self.version,
            range,
            delta,
            origin,
        });
        Ok(self.version)
    }

    fn changes_since(&self, version: u64) -> Vec<ChangeNotification> {
        // Log index v-1 holds the notification for version v
        let start = version as usize;
        self.log[start.min(self.log.len())..].to_vec()
    }
}
