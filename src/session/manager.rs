//! CollabSession: the collaboration manager
//!
//! Owns the mapping between the local tree projection and one shared
//! sequence instance. On local edits it computes grouped marker/character
//! operations and submits them; on sequence changes it re-decodes the
//! affected window and patches the corresponding subtree, falling back to a
//! full rebuild when the window cannot be bounded to a single top-level
//! node.
//!
//! # Lifecycle
//!
//! `Uninitialized -> Loading -> Synchronized -> Disposed`. `Synchronized` is
//! re-entered after every reconciled change; there is no externally visible
//! intermediate state because a patch pass always runs to completion before
//! anything can read the projection again.
//!
//! # Echo suppression
//!
//! A local edit patches the projection exactly once, at submission time.
//! When the engine later echoes the group back (same origin), the session
//! only confirms its pending bookkeeping; re-patching would double-apply the
//! edit. This is an optimization, not something remote correctness depends
//! on: the echoed group is already reflected in the tree either way.

use std::collections::VecDeque;

use crate::codec::{decode_region, encode_region, segment_top_level, SpanKind};
use crate::error::{BridgeError, Result};
use crate::sequence::{
    ChangeNotification, OpGroup, ReplicaId, SequenceElement, SequenceOp, SharedSequence,
};
use crate::session::edit::LocalEdit;
use crate::tree::{self, NodeId, TreeChild, TreeNode, TreeProjection};

/// Region label used for the document-structure marker channel when the
/// embedder does not pick its own
pub const DEFAULT_REGION_LABEL: &str = "richtext";

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Loading,
    Synchronized,
    Disposed,
}

/// Emitted once per patch pass for the view layer to re-render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeChanged {
    /// Ids of the nodes whose subtrees were patched
    pub affected: Vec<NodeId>,
}

/// One editing session binding a tree projection to a shared sequence
#[derive(Debug)]
pub struct CollabSession {
    replica: ReplicaId,
    region_label: String,
    state: SessionState,
    tree: TreeProjection,

    /// Highest sequence version reconciled into the tree via notifications
    last_seen_version: u64,

    /// Versions of own submitted groups whose echo has not arrived yet
    pending: VecDeque<u64>,

    next_node_id: NodeId,
    patches: u64,
    events: Vec<TreeChanged>,
}

impl CollabSession {
    /// Seed a fresh document with one region and optional initial text, as a
    /// single atomic group. Meant to run once before any session loads, on a
    /// newly created sequence.
    pub fn bootstrap<S: SharedSequence>(
        seq: &mut S,
        region_label: &str,
        node_type: &str,
        text: &str,
    ) -> Result<()> {
        let pos = seq.len();
        let [begin, end] = encode_region(region_label, pos, pos + 1, node_type)?;
        let mut ops = vec![begin, end];
        if !text.is_empty() {
            ops.push(SequenceOp::InsertText {
                pos: pos + 1,
                text: text.to_string(),
            });
        }
        seq.submit(ReplicaId::new(), OpGroup::new(seq.version(), ops))?;
        Ok(())
    }

    /// Open a session over an existing sequence: read the current snapshot,
    /// decode the full marker structure, and enter steady-state sync.
    pub fn load<S: SharedSequence>(seq: &S, region_label: &str) -> Result<Self> {
        let mut session = Self {
            replica: ReplicaId::new(),
            region_label: region_label.to_string(),
            state: SessionState::Uninitialized,
            tree: TreeProjection::default(),
            last_seen_version: 0,
            pending: VecDeque::new(),
            next_node_id: 0,
            patches: 0,
            events: Vec::new(),
        };
        session.state = SessionState::Loading;
        let snapshot = seq.snapshot();
        session.rebuild_snapshot(&snapshot);
        session.last_seen_version = seq.version();
        session.state = SessionState::Synchronized;
        Ok(session)
    }

    /// Read-only view of the current tree projection
    pub fn tree(&self) -> Result<&TreeProjection> {
        self.ensure_live()?;
        Ok(&self.tree)
    }

    /// Drain queued tree-changed events for the view layer
    pub fn take_tree_events(&mut self) -> Result<Vec<TreeChanged>> {
        self.ensure_live()?;
        Ok(std::mem::take(&mut self.events))
    }

    /// Number of patch passes applied to the projection so far
    pub fn patches_applied(&self) -> u64 {
        self.patches
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn replica(&self) -> ReplicaId {
        self.replica
    }

    /// Stop handling notifications. Operations already submitted are not
    /// rolled back; every later call on this session fails.
    pub fn dispose(&mut self) {
        self.state = SessionState::Disposed;
    }

    /// Apply one user edit: reconcile, compute grouped ops against current
    /// offsets, submit atomically, and patch the projection once.
    ///
    /// Transport and offset errors surface synchronously and leave the
    /// projection untouched; nothing is retried here.
    pub fn apply_local_edit<S: SharedSequence>(
        &mut self,
        seq: &mut S,
        edit: LocalEdit,
    ) -> Result<()> {
        self.ensure_live()?;
        // Never compute offsets against an unreconciled sequence: the engine
        // assigns op semantics by position at submission time.
        self.reconcile(seq)?;

        let ops = self.ops_for_edit(seq, &edit)?;
        let group = OpGroup::new(self.last_seen_version, ops);
        let version = seq.submit(self.replica, group)?;
        self.pending.push_back(version);

        // Patch now; the echo later only confirms bookkeeping.
        let note = seq
            .changes_since(version - 1)
            .into_iter()
            .find(|n| n.version == version);
        if let Some(note) = note {
            self.apply_change_set(seq, &[note])?;
        }
        Ok(())
    }

    /// Drain pending change notifications and reconcile the projection.
    /// Call whenever the engine may have applied new groups.
    pub fn pump<S: SharedSequence>(&mut self, seq: &S) -> Result<()> {
        self.ensure_live()?;
        self.reconcile(seq)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.state == SessionState::Disposed {
            return Err(BridgeError::SessionDisposed);
        }
        Ok(())
    }

    /// Process notifications in delivery order. Own echoes form a prefix of
    /// the undelivered notes (any later remote group was submitted against a
    /// version at or past ours), so popping the pending queue front is
    /// enough to match them.
    fn reconcile<S: SharedSequence>(&mut self, seq: &S) -> Result<()> {
        let notes = seq.changes_since(self.last_seen_version);
        if notes.is_empty() {
            return Ok(());
        }

        let mut remote = Vec::new();
        for note in notes {
            if note.origin == self.replica && self.pending.front() == Some(&note.version) {
                // Local echo: the projection already reflects this group
                self.pending.pop_front();
            } else {
                remote.push(note);
            }
        }
        self.apply_change_set(seq, &remote)?;
        self.last_seen_version = seq.version();
        Ok(())
    }

    /// One patch pass for a set of not-yet-reflected changes.
    ///
    /// A single change contained in one top-level node's content re-decodes
    /// just that node's window. Back-to-back changes, or changes touching
    /// top-level structure, coalesce into one full rebuild (the fallback
    /// path; also used at load).
    fn apply_change_set<S: SharedSequence>(
        &mut self,
        seq: &S,
        remote: &[ChangeNotification],
    ) -> Result<()> {
        match remote {
            [] => Ok(()),
            [note] => {
                let pre = note.pre_range();
                match self.tree.containing_top_level(&pre) {
                    Some(idx) => self.patch_window(seq, idx, note.delta),
                    None => {
                        let snapshot = seq.snapshot();
                        self.rebuild_snapshot(&snapshot);
                        Ok(())
                    }
                }
            }
            _ => {
                let snapshot = seq.snapshot();
                self.rebuild_snapshot(&snapshot);
                Ok(())
            }
        }
    }

    /// Re-decode the window of one top-level node and swap the subtree in,
    /// preserving its id. Decode failure marks this node invalid; siblings
    /// keep syncing.
    fn patch_window<S: SharedSequence>(&mut self, seq: &S, idx: usize, delta: isize) -> Result<()> {
        let old = match &self.tree.children[idx] {
            TreeChild::Node(n) => n.clone(),
            TreeChild::Text(_) => {
                // containing_top_level never points at a text run
                let snapshot = seq.snapshot();
                self.rebuild_snapshot(&snapshot);
                return Ok(());
            }
        };
        let new_end = (old.end as isize + delta) as usize;
        let window = seq.slice(old.begin, new_end + 1)?;

        let patched = match decode_region(&window, &self.region_label) {
            Ok(decoded) => {
                let mut fresh = tree::from_decoded(decoded, old.begin, &mut self.next_node_id);
                match (fresh.len(), fresh.pop()) {
                    (1, Some(TreeChild::Node(mut node))) => {
                        if node.node_type == old.node_type {
                            node.id = old.id;
                            tree::preserve_ids(&mut node.children, &old.children);
                        }
                        TreeChild::Node(node)
                    }
                    _ => TreeChild::Node(invalidate(old.clone(), new_end)),
                }
            }
            Err(BridgeError::MalformedStructure { .. }) => {
                TreeChild::Node(invalidate(old.clone(), new_end))
            }
            Err(e) => return Err(e),
        };

        let affected = match &patched {
            TreeChild::Node(n) => vec![n.id],
            TreeChild::Text(_) => Vec::new(),
        };
        self.tree.children[idx] = patched;
        self.tree.shift_from(old.end + 1, delta);
        self.patches += 1;
        self.events.push(TreeChanged { affected });
        Ok(())
    }

    /// Rebuild the whole projection from a snapshot, decoding each top-level
    /// span independently so a corrupt region yields one invalid placeholder
    /// instead of poisoning the document. Node ids carry over positionally
    /// where node types still match.
    fn rebuild_snapshot(&mut self, snapshot: &[SequenceElement]) {
        let old_children = std::mem::take(&mut self.tree.children);
        let mut children = Vec::new();

        for span in segment_top_level(snapshot, &self.region_label) {
            let slice = &snapshot[span.begin..span.end];
            let decoded = match span.kind {
                SpanKind::Broken => None,
                SpanKind::Loose | SpanKind::Region => {
                    decode_region(slice, &self.region_label).ok()
                }
            };
            match decoded {
                Some(roots) => children.extend(tree::from_decoded(
                    roots,
                    span.begin,
                    &mut self.next_node_id,
                )),
                None => {
                    children.push(TreeChild::Node(self.placeholder(slice, span.begin, span.end)))
                }
            }
        }

        tree::preserve_ids(&mut children, &old_children);
        self.tree = TreeProjection {
            children,
            len: snapshot.len(),
        };
        self.patches += 1;
        self.events.push(TreeChanged {
            affected: self.tree.node_ids(),
        });
    }

    /// Error placeholder covering an undecodable span
    fn placeholder(&mut self, slice: &[SequenceElement], begin: usize, end: usize) -> TreeNode {
        let node_type = slice
            .first()
            .and_then(|e| e.as_boundary_marker())
            .filter(|m| m.region_label == self.region_label)
            .map(|m| m.node_type)
            .unwrap_or_else(|| "unknown".to_string());
        let id = self.next_node_id;
        self.next_node_id += 1;
        TreeNode {
            id,
            node_type,
            children: Vec::new(),
            begin,
            end: end.saturating_sub(1),
            invalid: true,
        }
    }

    /// Translate one local edit into the op set to submit, using the cached
    /// projection's offsets (reconciled by the caller).
    fn ops_for_edit<S: SharedSequence>(&self, seq: &S, edit: &LocalEdit) -> Result<Vec<SequenceOp>> {
        match edit {
            LocalEdit::InsertNode {
                parent,
                index,
                node_type,
                text,
            } => {
                let pos = self.insert_pos(*parent, *index)?;
                let [begin, end] = encode_region(&self.region_label, pos, pos + 1, node_type)?;
                let mut ops = vec![begin, end];
                if let Some(text) = text {
                    if !text.is_empty() {
                        ops.push(SequenceOp::InsertText {
                            pos: pos + 1,
                            text: text.clone(),
                        });
                    }
                }
                Ok(ops)
            }
            LocalEdit::RemoveNode { id } => {
                let node = self.tree.find(*id).ok_or(BridgeError::NodeNotFound(*id))?;
                Ok(vec![SequenceOp::RemoveRange {
                    begin: node.begin,
                    end: node.end + 1,
                }])
            }
            LocalEdit::InsertText { node, offset, text } => {
                let n = self
                    .tree
                    .find(*node)
                    .ok_or(BridgeError::NodeNotFound(*node))?;
                if *offset > n.content_width() {
                    return Err(BridgeError::PositionOutOfBounds {
                        position: *offset,
                        length: n.content_width(),
                    });
                }
                Ok(vec![SequenceOp::InsertText {
                    pos: n.begin + 1 + offset,
                    text: text.clone(),
                }])
            }
            LocalEdit::RemoveText { node, begin, end } => {
                let n = self
                    .tree
                    .find(*node)
                    .ok_or(BridgeError::NodeNotFound(*node))?;
                if begin > end || *end > n.content_width() {
                    return Err(BridgeError::RangeOutOfBounds {
                        begin: *begin,
                        end: *end,
                        length: n.content_width(),
                    });
                }
                let abs_begin = n.begin + 1 + begin;
                let abs_end = n.begin + 1 + end;
                // Structural markers are not text; removing one this way
                // would corrupt the shared document for every replica.
                let covered = seq.slice(abs_begin, abs_end)?;
                let touches_structure = covered.iter().any(|e| {
                    e.as_boundary_marker()
                        .is_some_and(|m| m.region_label == self.region_label)
                });
                if touches_structure {
                    return Err(BridgeError::RangeOutOfBounds {
                        begin: *begin,
                        end: *end,
                        length: n.content_width(),
                    });
                }
                Ok(vec![SequenceOp::RemoveRange {
                    begin: abs_begin,
                    end: abs_end,
                }])
            }
            LocalEdit::MoveNode { id, parent, index } => {
                let node = self.tree.find(*id).ok_or(BridgeError::NodeNotFound(*id))?;
                let (span_begin, span_end) = (node.begin, node.end + 1);
                let width = node.width();
                let captured = seq.slice(span_begin, span_end)?;

                let dest = self.insert_pos(*parent, *index)?;
                // Destination inside the moved span means the target parent
                // lives in the moved subtree
                let dest = if dest >= span_end {
                    dest - width
                } else if dest <= span_begin {
                    dest
                } else {
                    return Err(BridgeError::RangeOutOfBounds {
                        begin: span_begin,
                        end: span_end,
                        length: dest,
                    });
                };

                let mut ops = vec![SequenceOp::RemoveRange {
                    begin: span_begin,
                    end: span_end,
                }];
                let mut at = dest;
                let mut run = String::new();
                for element in captured {
                    match element {
                        SequenceElement::Char(c) => run.push(c),
                        SequenceElement::Marker(metadata) => {
                            if !run.is_empty() {
                                let len = run.chars().count();
                                ops.push(SequenceOp::InsertText {
                                    pos: at,
                                    text: std::mem::take(&mut run),
                                });
                                at += len;
                            }
                            ops.push(SequenceOp::InsertMarker { pos: at, metadata });
                            at += 1;
                        }
                    }
                }
                if !run.is_empty() {
                    ops.push(SequenceOp::InsertText {
                        pos: at,
                        text: run,
                    });
                }
                Ok(ops)
            }
        }
    }

    /// Absolute offset where a new child at `index` under `parent` starts
    fn insert_pos(&self, parent: Option<NodeId>, index: usize) -> Result<usize> {
        match parent {
            None => {
                if index > self.tree.children.len() {
                    return Err(BridgeError::PositionOutOfBounds {
                        position: index,
                        length: self.tree.children.len(),
                    });
                }
                Ok(self.tree.root_insert_pos(index))
            }
            Some(id) => {
                let node = self.tree.find(id).ok_or(BridgeError::NodeNotFound(id))?;
                if index > node.children.len() {
                    return Err(BridgeError::PositionOutOfBounds {
                        position: index,
                        length: node.children.len(),
                    });
                }
                let offset: usize = node
                    .children
                    .iter()
                    .take(index)
                    .map(TreeChild::width)
                    .sum();
                Ok(node.begin + 1 + offset)
            }
        }
    }
}

fn invalidate(mut node: TreeNode, new_end: usize) -> TreeNode {
    node.invalid = true;
    node.children.clear();
    node.end = new_end;
    node
}
