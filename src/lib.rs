//! TreeSync Core - Tree-to-sequence bridge for collaborative rich-text editing
//!
//! This crate implements the bridge that lets a hierarchical document model
//! (a rich-text editor's node tree: paragraphs, headings, list items) be
//! represented and collaboratively edited as a single linear sequence of
//! characters plus zero-width structural boundary markers. It implements:
//! - Marker codec translating tree node boundaries into Begin/End marker pairs
//! - Local tree projection derived from the shared sequence's marker structure
//! - Collaboration session keeping tree and sequence synchronized both ways
//! - In-process reference sequence engine for tests and single-process use
//!
//! The shared sequence engine itself (conflict resolution, replication) is an
//! external collaborator behind the [`SharedSequence`] trait; this crate never
//! reimplements its convergence algorithm.
//!
//! # Examples
//!
//! ```rust
//! use treesync_core::{CollabSession, MemorySequence, LocalEdit};
//!
//! let mut seq = MemorySequence::new();
//! let mut session = CollabSession::load(&seq, "doc").unwrap();
//!
//! session.apply_local_edit(&mut seq, LocalEdit::InsertNode {
//!     parent: None,
//!     index: 0,
//!     node_type: "paragraph".to_string(),
//!     text: Some("Hello, world!".to_string()),
//! }).unwrap();
//!
//! let tree = session.tree().unwrap();
//! assert_eq!(tree.children.len(), 1);
//! ```

pub mod codec;
pub mod error;
pub mod sequence;
pub mod session;
pub mod tree;

// Re-exports for convenience
pub use codec::{decode_region, encode_region, segment_top_level};
pub use codec::{DecodedChild, DecodedNode, SpanKind, TopLevelSpan};
pub use error::{BridgeError, Result};
pub use sequence::{
    BoundaryMarker, ChangeNotification, MarkerRole, MemorySequence, OpGroup, ReplicaId,
    SequenceElement, SequenceOp, SharedSequence,
};
pub use session::{CollabSession, LocalEdit, SessionState, TreeChanged, DEFAULT_REGION_LABEL};
pub use tree::{NodeId, TreeChild, TreeNode, TreeProjection};

/// Node type tag type (e.g. "paragraph", "heading", "list-item")
pub type NodeType = String;

/// Region label type identifying one marker channel within a sequence
pub type RegionLabel = String;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_import() {
        // Smoke test that modules compile
        let _label: RegionLabel = "doc".to_string();
        let _seq = MemorySequence::new();
    }
}
