//! The local-edit surface reported by the editor view
//!
//! Offsets inside a node count element slots of its content span: characters
//! and nested slots alike, starting at 0 just after the node's Begin marker.
//! Child indices count the node's (or the document root's) ordered children.

use crate::tree::NodeId;

/// One user edit reported by the view layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEdit {
    /// Insert a new structural node at `index` among the children of
    /// `parent` (`None` for the document root), optionally seeded with
    /// initial text. The node and its text land as one atomic group: remote
    /// replicas never see the node without its content or vice versa.
    InsertNode {
        parent: Option<NodeId>,
        index: usize,
        node_type: String,
        text: Option<String>,
    },

    /// Remove a node, its markers, and everything between them
    RemoveNode { id: NodeId },

    /// Insert text inside a node's content at `offset`
    InsertText {
        node: NodeId,
        offset: usize,
        text: String,
    },

    /// Remove the content slot range `[begin, end)` inside a node.
    /// The range must not cover structural markers; removing a nested node
    /// goes through [`LocalEdit::RemoveNode`].
    RemoveText {
        node: NodeId,
        begin: usize,
        end: usize,
    },

    /// Relocate a node (with its whole subtree) to `index` among the
    /// children of `parent`. Removal and reinsertion land as one atomic
    /// group.
    MoveNode {
        id: NodeId,
        parent: Option<NodeId>,
        index: usize,
    },
}
