//! Domain model for ink/text notes.
//!
//! # Responsibility
//! - Define canonical data structures used by the sync engine and note store.
//!
//! # Invariants
//! - Every note is identified by a stable, caller-assigned id.
//! - Deletion is explicit and also erases the backing package.

pub mod note;
