//! Local tree projection over the shared sequence
//!
//! The tree is a cached, rebuildable view derived from decoding the
//! sequence's marker structure. It is never persisted separately: the
//! sequence is the sole source of truth, and the projection is rebuilt at
//! load and incrementally patched as the sequence changes. One session owns
//! its projection exclusively; nothing mutates it from outside.
//!
//! Offsets stored on nodes are absolute slot offsets into the sequence the
//! projection currently reflects. A node occupies `[begin, end]` inclusive of
//! its two marker slots; its content occupies `begin + 1 .. end`.

use crate::codec::{DecodedChild, DecodedNode};

/// Identifier for one node in the projection, stable across patches where
/// the patching strategy can preserve identity
pub type NodeId = u64;

/// One child slot of a node or of the document root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeChild {
    /// A run of plain characters
    Text(String),

    /// A nested structural node
    Node(TreeNode),
}

impl TreeChild {
    /// Number of sequence slots this child occupies
    pub fn width(&self) -> usize {
        match self {
            TreeChild::Text(s) => s.chars().count(),
            TreeChild::Node(n) => n.width(),
        }
    }
}

/// One structural region projected as a tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub id: NodeId,

    /// Tree-node kind (e.g. "paragraph", "heading", "list-item")
    pub node_type: String,

    /// Ordered content: text runs and nested nodes
    pub children: Vec<TreeChild>,

    /// Absolute offset of the Begin marker slot
    pub begin: usize,

    /// Absolute offset of the End marker slot
    pub end: usize,

    /// Set when this region failed to decode (`MalformedStructure`); the
    /// view renders it as an error placeholder while siblings keep syncing
    pub invalid: bool,
}

impl TreeNode {
    /// Slots occupied including both markers
    pub fn width(&self) -> usize {
        self.end - self.begin + 1
    }

    /// Slots occupied by content (between the markers). Zero for invalid
    /// placeholder nodes whose span may not hold a real marker pair.
    pub fn content_width(&self) -> usize {
        (self.end - self.begin).saturating_sub(1)
    }

    /// Concatenated direct and nested text content
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                TreeChild::Text(s) => out.push_str(s),
                TreeChild::Node(n) => out.push_str(&n.text()),
            }
        }
        out
    }
}

/// The document root: the session's cached hierarchical view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeProjection {
    /// Top-level children in sequence order
    pub children: Vec<TreeChild>,

    /// Sequence length this projection reflects
    pub len: usize,
}

impl TreeProjection {
    /// Find a node anywhere in the projection
    pub fn find(&self, id: NodeId) -> Option<&TreeNode> {
        find_in(&self.children, id)
    }

    /// Find a node anywhere in the projection, mutably
    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        find_in_mut(&mut self.children, id)
    }

    /// Absolute offset at which a new top-level child at `index` would start
    pub fn root_insert_pos(&self, index: usize) -> usize {
        self.children
            .iter()
            .take(index)
            .map(TreeChild::width)
            .sum()
    }

    /// Index of the single top-level node whose content span fully contains
    /// `range` (in the coordinates this projection reflects), if any.
    ///
    /// Used to bound a patch window: a change contained in one top-level
    /// node's content only requires re-decoding that node.
    pub fn containing_top_level(&self, range: &std::ops::Range<usize>) -> Option<usize> {
        self.children.iter().position(|child| match child {
            TreeChild::Node(n) => n.begin + 1 <= range.start && range.end <= n.end,
            TreeChild::Text(_) => false,
        })
    }

    /// Shift every top-level subtree starting at or after `pos` by `delta`
    pub fn shift_from(&mut self, pos: usize, delta: isize) {
        for child in &mut self.children {
            if let TreeChild::Node(n) = child {
                if n.begin >= pos {
                    shift_node(n, delta);
                }
            }
        }
        self.len = (self.len as isize + delta) as usize;
    }

    /// All node ids in the projection, in sequence order
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        collect_ids(&self.children, &mut ids);
        ids
    }
}

fn find_in(children: &[TreeChild], id: NodeId) -> Option<&TreeNode> {
    for child in children {
        if let TreeChild::Node(n) = child {
            if n.id == id {
                return Some(n);
            }
            if let Some(found) = find_in(&n.children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn find_in_mut(children: &mut [TreeChild], id: NodeId) -> Option<&mut TreeNode> {
    for child in children {
        if let TreeChild::Node(n) = child {
            if n.id == id {
                return Some(n);
            }
            if let Some(found) = find_in_mut(&mut n.children, id) {
                return Some(found);
            }
        }
    }
    None
}

fn shift_node(node: &mut TreeNode, delta: isize) {
    node.begin = (node.begin as isize + delta) as usize;
    node.end = (node.end as isize + delta) as usize;
    for child in &mut node.children {
        if let TreeChild::Node(n) = child {
            shift_node(n, delta);
        }
    }
}

fn collect_ids(children: &[TreeChild], ids: &mut Vec<NodeId>) {
    for child in children {
        if let TreeChild::Node(n) = child {
            ids.push(n.id);
            collect_ids(&n.children, ids);
        }
    }
}

/// Convert decoded slice roots into projection children.
///
/// Decoded offsets are slice-relative; `base` rebases them to absolute
/// offsets. Fresh ids are drawn from `next_id`.
pub fn from_decoded(decoded: Vec<DecodedChild>, base: usize, next_id: &mut NodeId) -> Vec<TreeChild> {
    decoded
        .into_iter()
        .map(|child| match child {
            DecodedChild::Text(s) => TreeChild::Text(s),
            DecodedChild::Node(n) => TreeChild::Node(node_from_decoded(n, base, next_id)),
        })
        .collect()
}

fn node_from_decoded(node: DecodedNode, base: usize, next_id: &mut NodeId) -> TreeNode {
    let id = *next_id;
    *next_id += 1;
    TreeNode {
        id,
        node_type: node.node_type,
        children: from_decoded(node.children, base, next_id),
        begin: base + node.begin,
        end: base + node.end,
        invalid: false,
    }
}

/// Carry node ids from an old child list onto a freshly rebuilt one,
/// matching positionally where the node type still agrees. Nodes without a
/// positional match keep their fresh ids.
pub fn preserve_ids(new_children: &mut [TreeChild], old_children: &[TreeChild]) {
    for (new, old) in new_children.iter_mut().zip(old_children) {
        if let (TreeChild::Node(new_node), TreeChild::Node(old_node)) = (new, old) {
            if new_node.node_type == old_node.node_type {
                new_node.id = old_node.id;
                preserve_ids(&mut new_node.children, &old_node.children);
            }
        }
    }
}
