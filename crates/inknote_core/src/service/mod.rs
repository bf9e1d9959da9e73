//! Core use-case services.
//!
//! # Responsibility
//! - Expose the handle-based editing facade to hosts.
//! - Orchestrate note store calls into use-case level APIs.

pub mod editing_service;
pub mod note_service;
