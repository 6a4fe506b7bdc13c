//! Collaboration session: bidirectional tree/sequence synchronization
//!
//! A [`CollabSession`] owns one local tree projection bound to one shared
//! sequence for the lifetime of an editing session. Local edits flow through
//! [`CollabSession::apply_local_edit`] into grouped sequence operations;
//! sequence changes flow back through [`CollabSession::pump`] into tree
//! patches. The session is single-threaded and cooperative: every reaction
//! runs to completion before the next notification is examined, so the tree
//! projection is never observed mid-patch.

pub mod edit;
pub mod manager;

pub use edit::LocalEdit;
pub use manager::{CollabSession, SessionState, TreeChanged, DEFAULT_REGION_LABEL};
