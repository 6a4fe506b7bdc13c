//! Error types for the tree-to-sequence bridge
//!
//! A single crate-level error enum covers all components. Structural decode
//! errors are contained per region by the session; offset and transport
//! errors surface synchronously to the caller of the local-edit API and are
//! never swallowed, since silent loss of a structural edit would
//! desynchronize replicas.

use thiserror::Error;

/// Errors produced by the bridge and the reference sequence engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Marker structure in a decoded slice is not well-nested.
    ///
    /// Indicates a bridge bug or a corrupted document. Regional: the session
    /// marks the affected subtree invalid and keeps syncing its siblings.
    #[error("malformed structure in region channel {label:?}: {reason}")]
    MalformedStructure { label: String, reason: String },

    /// A submission was computed against offsets that are no longer valid
    /// because a concurrent change has not been reconciled.
    ///
    /// The caller must reconcile to the latest sequence state and recompute
    /// the edit; resubmitting the original offsets is never correct because
    /// the engine assigns operation semantics by position at submission time.
    #[error("stale offset submission: group base version {base}, sequence at version {current}")]
    StaleOffsetSubmission { base: u64, current: u64 },

    /// The shared sequence could not accept a submission (connectivity).
    ///
    /// Not retried inside the bridge; reconnection and resubmission policy
    /// belongs to the transport layer.
    #[error("transport failure: {0}")]
    TransportFailure(String),

    /// Operation attempted after `dispose()`; always fatal to that call.
    #[error("session has been disposed")]
    SessionDisposed,

    /// Position is out of bounds for the current sequence length
    #[error("position {position} out of bounds (length {length})")]
    PositionOutOfBounds { position: usize, length: usize },

    /// Range is out of bounds or inverted
    #[error("range {begin}..{end} out of bounds (length {length})")]
    RangeOutOfBounds {
        begin: usize,
        end: usize,
        length: usize,
    },

    /// A local edit referenced a node absent from the tree projection
    #[error("node {0} not found in tree projection")]
    NodeNotFound(u64),
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
