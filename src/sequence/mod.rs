//! Shared sequence model and reference engine
//!
//! The shared sequence is an ordered, collaboratively mutable sequence of
//! elements, each either a plain character or a zero-width boundary marker.
//! Positions are addressed by integer offset into the current length; every
//! element, marker or character, occupies exactly one slot.
//!
//! Convergence across replicas is guaranteed by the engine behind the
//! [`SharedSequence`] trait, not by this crate. [`MemorySequence`] is the
//! in-process reference engine: a single totally-ordered operation log that
//! makes those guarantees real for tests and single-process use.

pub mod element;
pub mod memory;
pub mod op;

pub use element::{BoundaryMarker, MarkerRole, SequenceElement};
pub use element::{NODE_TYPE_KEY, REGION_LABEL_KEY, ROLE_KEY};
pub use memory::{MemorySequence, SharedSequence};
pub use op::{ChangeNotification, OpGroup, ReplicaId, SequenceOp};
