//! Content package access.
//!
//! # Responsibility
//! - Adapt the engine's package API into operations with typed sync errors.
//!
//! # Invariants
//! - Package paths are NFD-normalized before reaching the engine.
//! - A package returned by `open_or_create` has at least one part.

mod gateway;

pub use gateway::{normalize_package_path, PackageGateway};
