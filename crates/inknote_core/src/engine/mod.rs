//! Ink Engine collaborator contract.
//!
//! # Responsibility
//! - Describe the handwriting engine surface the core depends on: opening
//!   content packages, running an editor over a document part, importing and
//!   exporting text, and reporting an idle/busy state.
//! - Keep engine failures opaque (`EngineError`) so the gateway and editor
//!   session can map them to operation-specific sync errors.
//!
//! # Invariants
//! - An editor owns the package of the part bound to it; unbinding hands the
//!   package back to the caller.
//! - The idle state is advisory. Nothing in core waits on it.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub mod plain;

pub use plain::{FaultPoint, PlainTextEngine};

/// Part kind created when a package has no parts yet.
pub const DEFAULT_PART_KIND: &str = "Text";

pub type EngineResult<T> = Result<T, EngineError>;

/// Category of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// Storage read/write failed.
    Io,
    /// Package bytes could not be parsed.
    Corrupt,
    /// Package does not exist and creation was not requested.
    Missing,
    /// Part index or identity does not resolve.
    PartNotFound,
    /// Editor has no part bound.
    NoPart,
    /// Engine refused the requested content or operation.
    Rejected,
}

/// Opaque failure reported by the Ink Engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn io(err: &std::io::Error, context: impl Display) -> Self {
        Self::new(EngineErrorKind::Io, format!("{context}: {err}"))
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ink engine error ({:?}): {}", self.kind, self.message)
    }
}

impl Error for EngineError {}

/// How `InkEngine::open_package` treats a missing package file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOption {
    /// Fail with `EngineErrorKind::Missing` when absent.
    Existing,
    /// Create an empty package when absent.
    Create,
}

/// Descriptor of one document part inside a content package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub id: String,
    pub kind: String,
    pub index: usize,
}

/// Content block inside a bound part. The root block is the selection used
/// for in-place replacement imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: String,
}

/// Entry point of the external engine.
pub trait InkEngine {
    type Package: ContentPackage;
    type Editor: InkEditor<Package = Self::Package>;

    /// Opens the package at `path`; the caller has normalized the path.
    fn open_package(&self, path: &Path, option: OpenOption) -> EngineResult<Self::Package>;

    /// Allocates a fresh editor with no part bound.
    fn create_editor(&self) -> EngineResult<Self::Editor>;

    /// Removes the package at `path` from storage.
    fn remove_package(&self, path: &Path) -> std::io::Result<()>;
}

/// Container holding a note's ink document parts.
pub trait ContentPackage {
    fn path(&self) -> &Path;
    fn part_count(&self) -> usize;
    fn part(&self, index: usize) -> EngineResult<Part>;
    fn create_part(&mut self, kind: &str) -> EngineResult<Part>;
    fn remove_part(&mut self, part: &Part) -> EngineResult<()>;
    /// Commits package state to its path.
    fn save(&mut self) -> EngineResult<()>;
    /// Writes package state to a temporary location without touching the
    /// committed package.
    fn save_to_temp(&mut self) -> EngineResult<()>;
}

/// Editor running over at most one bound part.
pub trait InkEditor {
    type Package: ContentPackage;

    /// Binds `part` of `package`; any previously bound part is dropped.
    fn set_part(&mut self, package: Self::Package, part: Part) -> EngineResult<()>;
    /// Unbinds the current part and returns its package.
    fn take_part(&mut self) -> EngineResult<Option<Self::Package>>;
    fn part(&self) -> Option<&Part>;
    fn package_mut(&mut self) -> Option<&mut Self::Package>;
    /// Root block of the bound part, if it has content.
    fn root_block(&self) -> Option<Block>;
    /// Imports plain text. `Some(block)` replaces the block content; `None`
    /// lets the engine append or create content.
    fn import_text(&mut self, text: &str, selection: Option<&Block>) -> EngineResult<()>;
    fn export_text(&self, selection: Option<&Block>) -> EngineResult<String>;
    fn clear(&mut self) -> EngineResult<()>;
    fn is_idle(&self) -> bool;
}
