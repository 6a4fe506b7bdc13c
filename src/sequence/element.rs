//! Sequence elements and boundary marker metadata
//!
//! Each slot of the shared sequence holds either a character or a zero-width
//! marker. Marker metadata is opaque key-value data from the engine's point
//! of view; this module owns the typed schema the bridge reads out of it:
//!
//! ```json
//! { "regionLabel": "doc", "role": "begin", "nodeType": "paragraph" }
//! ```
//!
//! Several marker channels can coexist in one sequence (document structure
//! next to, say, comment ranges), distinguished by `regionLabel`. Markers of
//! a foreign label occupy a slot but are transparent to this channel's
//! structure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key carrying the region label (nesting channel)
pub const REGION_LABEL_KEY: &str = "regionLabel";

/// Metadata key carrying the marker role ("begin" or "end")
pub const ROLE_KEY: &str = "role";

/// Metadata key carrying the tree-node kind this region represents
pub const NODE_TYPE_KEY: &str = "nodeType";

/// One slot of the shared sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SequenceElement {
    /// A plain character; occupies one offset
    Char(char),

    /// A zero-width boundary marker with opaque metadata; occupies one offset
    Marker(Value),
}

impl SequenceElement {
    /// Whether this slot is a marker
    pub fn is_marker(&self) -> bool {
        matches!(self, SequenceElement::Marker(_))
    }

    /// Typed view of this slot's marker metadata, if it is a marker whose
    /// metadata matches the boundary-marker schema. Foreign schemas yield
    /// `None` and are skipped by decoders, never treated as an error.
    pub fn as_boundary_marker(&self) -> Option<BoundaryMarker> {
        match self {
            SequenceElement::Marker(meta) => BoundaryMarker::from_metadata(meta),
            SequenceElement::Char(_) => None,
        }
    }
}

/// Which endpoint of a structural region a marker represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerRole {
    Begin,
    End,
}

/// Typed view of one boundary marker's metadata
///
/// Represents one endpoint of a structural region corresponding to one tree
/// node. Every Begin marker on a given label has exactly one matching End
/// later in sequence order on the same label; regions on one label form a
/// well-nested (non-crossing) structure mirroring the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryMarker {
    /// Nesting channel this marker participates in
    pub region_label: String,

    /// Begin or End
    pub role: MarkerRole,

    /// Tree-node kind this region represents (e.g. "paragraph")
    pub node_type: String,
}

impl BoundaryMarker {
    /// Create a marker for one endpoint of a region
    pub fn new(region_label: &str, role: MarkerRole, node_type: &str) -> Self {
        Self {
            region_label: region_label.to_string(),
            role,
            node_type: node_type.to_string(),
        }
    }

    /// Encode as the opaque metadata value attached to a sequence slot
    pub fn to_metadata(&self) -> Value {
        // The schema is three plain string fields; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Decode from opaque metadata. Returns `None` when the metadata does
    /// not match the boundary-marker schema (foreign marker channel formats).
    pub fn from_metadata(meta: &Value) -> Option<Self> {
        serde_json::from_value(meta.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_schema_keys() {
        let marker = BoundaryMarker::new("doc", MarkerRole::Begin, "paragraph");
        let meta = marker.to_metadata();

        assert_eq!(meta[REGION_LABEL_KEY], "doc");
        assert_eq!(meta[ROLE_KEY], "begin");
        assert_eq!(meta[NODE_TYPE_KEY], "paragraph");
    }

    #[test]
    fn test_metadata_round_trip() {
        let marker = BoundaryMarker::new("doc", MarkerRole::End, "list-item");
        let decoded = BoundaryMarker::from_metadata(&marker.to_metadata());

        assert_eq!(decoded, Some(marker));
    }

    #[test]
    fn test_foreign_metadata_is_none() {
        let meta = serde_json::json!({ "commentId": "c-42", "author": "ada" });
        assert_eq!(BoundaryMarker::from_metadata(&meta), None);

        let element = SequenceElement::Marker(meta);
        assert!(element.is_marker());
        assert_eq!(element.as_boundary_marker(), None);
    }

    #[test]
    fn test_char_is_not_marker() {
        let element = SequenceElement::Char('a');
        assert!(!element.is_marker());
        assert_eq!(element.as_boundary_marker(), None);
    }
}
