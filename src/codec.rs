//! Marker codec: structural boundaries to and from marker pairs
//!
//! Pure, stateless translation between "a tree node spans this range" and the
//! two zero-width marker insertions that represent it in the flat sequence.
//!
//! Decoding reconstructs well-nested structure for one region label with a
//! stack discipline: push on Begin, pop and emit on the matching End. Markers
//! of other labels occupy a slot but are transparent to this channel. A
//! mismatch (End with nothing open, End of a different node type than the
//! open Begin, or Begins left open at the end of the slice) indicates a
//! bridge bug or a corrupted document and fails with `MalformedStructure`;
//! it is never silently repaired.

use crate::error::{BridgeError, Result};
use crate::sequence::{BoundaryMarker, MarkerRole, SequenceElement, SequenceOp};

/// One reconstructed tree node from a decoded slice
///
/// `begin` and `end` are the slice-relative offsets of the node's Begin and
/// End marker slots; the node's content occupies `begin + 1 .. end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedNode {
    pub node_type: String,
    pub children: Vec<DecodedChild>,
    pub begin: usize,
    pub end: usize,
}

/// Ordered content of a decoded scope: text runs and nested nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedChild {
    Text(String),
    Node(DecodedNode),
}

/// Produce the two marker-insertion ops for a region spanning
/// `[begin_pos, end_pos)` on `region_label`.
///
/// `end_pos` is interpreted after the begin marker has applied (ops in a
/// group apply sequentially), so `encode_region(l, p, p + 1, t)` yields an
/// adjacent empty region at `p`. The caller must submit both ops in a single
/// group so no replica ever observes a Begin without its End.
pub fn encode_region(
    region_label: &str,
    begin_pos: usize,
    end_pos: usize,
    node_type: &str,
) -> Result<[SequenceOp; 2]> {
    if begin_pos > end_pos {
        return Err(BridgeError::RangeOutOfBounds {
            begin: begin_pos,
            end: end_pos,
            length: end_pos,
        });
    }

    let begin = BoundaryMarker::new(region_label, MarkerRole::Begin, node_type);
    let end = BoundaryMarker::new(region_label, MarkerRole::End, node_type);

    Ok([
        SequenceOp::InsertMarker {
            pos: begin_pos,
            metadata: begin.to_metadata(),
        },
        SequenceOp::InsertMarker {
            pos: end_pos,
            metadata: end.to_metadata(),
        },
    ])
}

/// One open region (or the slice root) during decoding
struct Scope {
    /// `None` for the root scope, `Some((node_type, begin_offset))` otherwise
    node: Option<(String, usize)>,
    children: Vec<DecodedChild>,
    text: String,
}

impl Scope {
    fn root() -> Self {
        Self {
            node: None,
            children: Vec::new(),
            text: String::new(),
        }
    }

    fn open(node_type: String, begin: usize) -> Self {
        Self {
            node: Some((node_type, begin)),
            children: Vec::new(),
            text: String::new(),
        }
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            self.children
                .push(DecodedChild::Text(std::mem::take(&mut self.text)));
        }
    }
}

fn malformed(label: &str, reason: impl Into<String>) -> BridgeError {
    BridgeError::MalformedStructure {
        label: label.to_string(),
        reason: reason.into(),
    }
}

/// Reconstruct the well-nested region structure of `slice` for one label.
///
/// Returns the ordered roots of the slice: loose text runs and/or decoded
/// nodes. Characters and foreign-label markers never fail decoding; only a
/// broken marker structure on `region_label` does.
pub fn decode_region(
    slice: &[SequenceElement],
    region_label: &str,
) -> Result<Vec<DecodedChild>> {
    let mut stack: Vec<Scope> = vec![Scope::root()];

    for (offset, element) in slice.iter().enumerate() {
        let marker = element
            .as_boundary_marker()
            .filter(|m| m.region_label == region_label);

        match (marker, element) {
            (Some(m), _) if m.role == MarkerRole::Begin => {
                // Stack is never empty: the root scope is only popped below
                // when a matching End is found above it.
                if let Some(top) = stack.last_mut() {
                    top.flush_text();
                }
                stack.push(Scope::open(m.node_type, offset));
            }
            (Some(m), _) => {
                let popped = if stack.len() >= 2 { stack.pop() } else { None };
                let Some(mut scope) = popped else {
                    return Err(malformed(
                        region_label,
                        format!("end marker for {:?} at offset {offset} with no open region", m.node_type),
                    ));
                };
                scope.flush_text();
                let Some((node_type, begin)) = scope.node.take() else {
                    // Root scope is only reachable above the length guard
                    return Err(malformed(
                        region_label,
                        format!("end marker for {:?} at offset {offset} with no open region", m.node_type),
                    ));
                };
                if node_type != m.node_type {
                    return Err(malformed(
                        region_label,
                        format!(
                            "end marker for {:?} at offset {offset} closes open region of type {:?}",
                            m.node_type, node_type
                        ),
                    ));
                }
                let node = DecodedNode {
                    node_type,
                    children: scope.children,
                    begin,
                    end: offset,
                };
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(DecodedChild::Node(node));
                }
            }
            (None, SequenceElement::Char(c)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push(*c);
                }
            }
            // Zero-width marker on another channel: transparent here
            (None, SequenceElement::Marker(_)) => {}
        }
    }

    if stack.len() > 1 {
        return Err(malformed(
            region_label,
            format!("{} begin marker(s) left unmatched at end of slice", stack.len() - 1),
        ));
    }

    let Some(mut root) = stack.pop() else {
        // The root scope is pushed at entry and never popped without a guard
        return Err(malformed(region_label, "decoder lost its root scope"));
    };
    root.flush_text();
    Ok(root.children)
}

/// Kind of one top-level span produced by [`segment_top_level`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    /// Characters and foreign markers outside any region of this label
    Loose,

    /// A balanced top-level region (Begin through its matching End)
    Region,

    /// Structure broken from here on (End with nothing open, or a Begin
    /// never closed); decoding inside is unreliable
    Broken,
}

/// One half-open top-level span `[begin, end)` of a sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevelSpan {
    pub begin: usize,
    pub end: usize,
    pub kind: SpanKind,
}

/// Split a full sequence into top-level spans for one label.
///
/// Each span decodes independently, which is what contains a
/// `MalformedStructure` to the region that produced it: a corrupt span
/// becomes one error placeholder without poisoning its siblings. Marker
/// depth alone decides the split; type mismatches inside a balanced span are
/// left for [`decode_region`] to surface.
pub fn segment_top_level(slice: &[SequenceElement], region_label: &str) -> Vec<TopLevelSpan> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (offset, element) in slice.iter().enumerate() {
        let marker = element
            .as_boundary_marker()
            .filter(|m| m.region_label == region_label);
        let Some(m) = marker else { continue };

        match m.role {
            MarkerRole::Begin => {
                if depth == 0 {
                    if offset > start {
                        spans.push(TopLevelSpan {
                            begin: start,
                            end: offset,
                            kind: SpanKind::Loose,
                        });
                    }
                    start = offset;
                }
                depth += 1;
            }
            MarkerRole::End => {
                if depth == 0 {
                    // Nothing open: the rest of the sequence is suspect
                    if offset > start {
                        spans.push(TopLevelSpan {
                            begin: start,
                            end: offset,
                            kind: SpanKind::Loose,
                        });
                    }
                    spans.push(TopLevelSpan {
                        begin: offset,
                        end: slice.len(),
                        kind: SpanKind::Broken,
                    });
                    return spans;
                }
                depth -= 1;
                if depth == 0 {
                    spans.push(TopLevelSpan {
                        begin: start,
                        end: offset + 1,
                        kind: SpanKind::Region,
                    });
                    start = offset + 1;
                }
            }
        }
    }

    if depth > 0 {
        spans.push(TopLevelSpan {
            begin: start,
            end: slice.len(),
            kind: SpanKind::Broken,
        });
    } else if slice.len() > start {
        spans.push(TopLevelSpan {
            begin: start,
            end: slice.len(),
            kind: SpanKind::Loose,
        });
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const LABEL: &str = "doc";

    fn marker(role: MarkerRole, node_type: &str) -> SequenceElement {
        SequenceElement::Marker(BoundaryMarker::new(LABEL, role, node_type).to_metadata())
    }

    fn chars(s: &str) -> Vec<SequenceElement> {
        s.chars().map(SequenceElement::Char).collect()
    }

    #[test]
    fn test_encode_shapes_two_marker_ops() {
        let [begin, end] = encode_region(LABEL, 0, 1, "paragraph").unwrap();

        match begin {
            SequenceOp::InsertMarker { pos, metadata } => {
                assert_eq!(pos, 0);
                let m = BoundaryMarker::from_metadata(&metadata).unwrap();
                assert_eq!(m.role, MarkerRole::Begin);
                assert_eq!(m.node_type, "paragraph");
                assert_eq!(m.region_label, LABEL);
            }
            other => panic!("expected InsertMarker, got {:?}", other),
        }
        match end {
            SequenceOp::InsertMarker { pos, metadata } => {
                assert_eq!(pos, 1);
                let m = BoundaryMarker::from_metadata(&metadata).unwrap();
                assert_eq!(m.role, MarkerRole::End);
            }
            other => panic!("expected InsertMarker, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_rejects_inverted_range() {
        assert!(matches!(
            encode_region(LABEL, 5, 3, "paragraph"),
            Err(BridgeError::RangeOutOfBounds { begin: 5, end: 3, .. })
        ));
    }

    #[test]
    fn test_decode_single_paragraph() {
        let mut slice = vec![marker(MarkerRole::Begin, "paragraph")];
        slice.extend(chars("Hello, world!"));
        slice.push(marker(MarkerRole::End, "paragraph"));

        let roots = decode_region(&slice, LABEL).unwrap();
        assert_eq!(
            roots,
            vec![DecodedChild::Node(DecodedNode {
                node_type: "paragraph".to_string(),
                children: vec![DecodedChild::Text("Hello, world!".to_string())],
                begin: 0,
                end: 14,
            })]
        );
    }

    #[test]
    fn test_decode_empty_region() {
        let slice = vec![
            marker(MarkerRole::Begin, "paragraph"),
            marker(MarkerRole::End, "paragraph"),
        ];
        let roots = decode_region(&slice, LABEL).unwrap();
        match &roots[0] {
            DecodedChild::Node(node) => {
                assert!(node.children.is_empty());
                assert_eq!((node.begin, node.end), (0, 1));
            }
            other => panic!("expected node, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_nested_structure() {
        // <list> <list-item> "a" </list-item> <list-item> "b" </list-item> </list>
        let mut slice = vec![
            marker(MarkerRole::Begin, "list"),
            marker(MarkerRole::Begin, "list-item"),
        ];
        slice.extend(chars("a"));
        slice.push(marker(MarkerRole::End, "list-item"));
        slice.push(marker(MarkerRole::Begin, "list-item"));
        slice.extend(chars("b"));
        slice.push(marker(MarkerRole::End, "list-item"));
        slice.push(marker(MarkerRole::End, "list"));

        let roots = decode_region(&slice, LABEL).unwrap();
        assert_eq!(roots.len(), 1);
        let list = match &roots[0] {
            DecodedChild::Node(n) => n,
            other => panic!("expected node, got {:?}", other),
        };
        assert_eq!(list.node_type, "list");
        assert_eq!(list.children.len(), 2);
        for (child, text) in list.children.iter().zip(["a", "b"]) {
            match child {
                DecodedChild::Node(item) => {
                    assert_eq!(item.node_type, "list-item");
                    assert_eq!(item.children, vec![DecodedChild::Text(text.to_string())]);
                }
                other => panic!("expected list-item, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_decode_loose_text_between_siblings() {
        let mut slice = chars("ab");
        slice.push(marker(MarkerRole::Begin, "paragraph"));
        slice.push(marker(MarkerRole::End, "paragraph"));
        slice.extend(chars("cd"));

        let roots = decode_region(&slice, LABEL).unwrap();
        assert_eq!(roots.len(), 3);
        assert_eq!(roots[0], DecodedChild::Text("ab".to_string()));
        assert_eq!(roots[2], DecodedChild::Text("cd".to_string()));
    }

    #[test]
    fn test_decode_end_with_empty_stack() {
        let slice = vec![marker(MarkerRole::End, "paragraph")];
        let err = decode_region(&slice, LABEL).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedStructure { .. }));
    }

    #[test]
    fn test_decode_unmatched_begin() {
        let mut slice = vec![marker(MarkerRole::Begin, "paragraph")];
        slice.extend(chars("abc"));

        let err = decode_region(&slice, LABEL).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedStructure { .. }));
    }

    #[test]
    fn test_decode_crossing_regions_rejected() {
        // begin(heading) begin(paragraph) end(heading) end(paragraph) crosses
        let slice = vec![
            marker(MarkerRole::Begin, "heading"),
            marker(MarkerRole::Begin, "paragraph"),
            marker(MarkerRole::End, "heading"),
            marker(MarkerRole::End, "paragraph"),
        ];
        let err = decode_region(&slice, LABEL).unwrap_err();
        assert!(matches!(err, BridgeError::MalformedStructure { .. }));
    }

    #[test]
    fn test_foreign_channel_is_transparent() {
        // A comment-range marker channel interleaved with document structure
        let comment = SequenceElement::Marker(json!({ "commentId": "c-1" }));
        let other_label =
            SequenceElement::Marker(BoundaryMarker::new("comments", MarkerRole::Begin, "note").to_metadata());

        let mut slice = vec![marker(MarkerRole::Begin, "paragraph"), comment];
        slice.extend(chars("hi"));
        slice.push(other_label);
        slice.push(marker(MarkerRole::End, "paragraph"));

        let roots = decode_region(&slice, LABEL).unwrap();
        match &roots[0] {
            DecodedChild::Node(node) => {
                assert_eq!(node.children, vec![DecodedChild::Text("hi".to_string())]);
                // Foreign markers still occupy slots
                assert_eq!(node.end, 5);
            }
            other => panic!("expected node, got {:?}", other),
        }
    }

    #[test]
    fn test_segment_two_regions_and_loose_text() {
        let mut slice = vec![
            marker(MarkerRole::Begin, "paragraph"),
            marker(MarkerRole::End, "paragraph"),
        ];
        slice.extend(chars("xy"));
        slice.push(marker(MarkerRole::Begin, "heading"));
        slice.extend(chars("t"));
        slice.push(marker(MarkerRole::End, "heading"));

        let spans = segment_top_level(&slice, LABEL);
        assert_eq!(
            spans,
            vec![
                TopLevelSpan { begin: 0, end: 2, kind: SpanKind::Region },
                TopLevelSpan { begin: 2, end: 4, kind: SpanKind::Loose },
                TopLevelSpan { begin: 4, end: 7, kind: SpanKind::Region },
            ]
        );
    }

    #[test]
    fn test_segment_stray_end_breaks_tail_only() {
        let mut slice = vec![
            marker(MarkerRole::Begin, "paragraph"),
            marker(MarkerRole::End, "paragraph"),
            marker(MarkerRole::End, "paragraph"), // stray
        ];
        slice.extend(chars("rest"));

        let spans = segment_top_level(&slice, LABEL);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].kind, SpanKind::Region);
        assert_eq!(
            spans[1],
            TopLevelSpan { begin: 2, end: 7, kind: SpanKind::Broken }
        );
    }

    #[test]
    fn test_segment_unclosed_begin_is_broken() {
        let mut slice = vec![marker(MarkerRole::Begin, "paragraph")];
        slice.extend(chars("abc"));

        let spans = segment_top_level(&slice, LABEL);
        assert_eq!(
            spans,
            vec![TopLevelSpan { begin: 0, end: 4, kind: SpanKind::Broken }]
        );
    }

    #[test]
    fn test_round_trip_via_encode() {
        // Apply encode output by hand and decode it back
        let [begin, end] = encode_region(LABEL, 0, 1, "paragraph").unwrap();
        let mut slice: Vec<SequenceElement> = Vec::new();
        for op in [begin, end] {
            if let SequenceOp::InsertMarker { pos, metadata } = op {
                slice.insert(pos, SequenceElement::Marker(metadata));
            }
        }
        for (i, c) in "Hello".chars().enumerate() {
            slice.insert(1 + i, SequenceElement::Char(c));
        }

        let roots = decode_region(&slice, LABEL).unwrap();
        assert_eq!(
            roots,
            vec![DecodedChild::Node(DecodedNode {
                node_type: "paragraph".to_string(),
                children: vec![DecodedChild::Text("Hello".to_string())],
                begin: 0,
                end: 6,
            })]
        );
    }
}
