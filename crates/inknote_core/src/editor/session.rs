//! Editor session lifecycle.
//!
//! # Responsibility
//! - Own one engine editor and its optional part binding.
//! - Expose text operations only through `BoundEditor`, which can only be
//!   obtained while a part is bound.
//!
//! # Invariants
//! - States are `Unbound -> Bound -> Unbound ... -> Closed`; `Closed` is final.
//! - `close()` unbinds before releasing the editor and is idempotent.
//! - Persistence policy lives in the coordinators, never here.

use crate::engine::{
    Block, ContentPackage, EngineError, EngineErrorKind, InkEditor, InkEngine, Part,
};
use crate::package::PackageGateway;
use crate::sync::{SyncError, SyncResult};
use log::{debug, warn};
use std::path::PathBuf;
use uuid::Uuid;

/// Named lifecycle states of an editor session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Editor exists, no part bound.
    Unbound,
    /// Editor bound to a document part.
    Bound,
    /// Editor released.
    Closed,
}

/// One attached ink-editing session.
pub struct EditorSession<E: InkEngine> {
    id: Uuid,
    editor: Option<E::Editor>,
}

impl<E: InkEngine> EditorSession<E> {
    /// Allocates an unbound editor from `engine`.
    pub fn open(engine: &E) -> SyncResult<Self> {
        let editor = engine
            .create_editor()
            .map_err(|source| SyncError::ImportExport {
                operation: "editor allocation",
                source,
            })?;
        let id = Uuid::new_v4();
        debug!("event=session_open module=editor status=ok session_id={id}");
        Ok(Self {
            id,
            editor: Some(editor),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        match &self.editor {
            None => SessionState::Closed,
            Some(editor) if editor.part().is_some() => SessionState::Bound,
            Some(_) => SessionState::Unbound,
        }
    }

    /// Binds `part` of `package`, replacing any current binding.
    pub fn bind(&mut self, package: E::Package, part: Part) -> SyncResult<()> {
        let path = package.path().to_path_buf();
        let index = part.index;
        let editor = self.editor.as_mut().ok_or_else(|| closed("bind"))?;
        editor.set_part(package, part).map_err(|source| {
            if source.kind == EngineErrorKind::PartNotFound {
                SyncError::PartNotFound {
                    path: path.clone(),
                    index,
                    source,
                }
            } else {
                SyncError::ImportExport {
                    operation: "bind",
                    source,
                }
            }
        })?;
        debug!(
            "event=session_bind module=editor status=ok session_id={} path={}",
            self.id,
            path.display()
        );
        Ok(())
    }

    /// Unbinds the current part and hands back its package.
    pub fn unbind(&mut self) -> SyncResult<Option<E::Package>> {
        let Some(editor) = self.editor.as_mut() else {
            return Ok(None);
        };
        editor.take_part().map_err(|source| SyncError::ImportExport {
            operation: "unbind",
            source,
        })
    }

    /// Returns the bound view, or `None` when no part is bound.
    pub fn bound(&mut self) -> Option<BoundEditor<'_, E>> {
        let editor = self.editor.as_mut()?;
        let part = editor.part()?.clone();
        Some(BoundEditor { editor, part })
    }

    /// Unbinds and releases the editor. Calling it again is a no-op.
    ///
    /// The editor is released even when unbinding fails; the unbind failure
    /// is still returned.
    pub fn close(&mut self) -> SyncResult<()> {
        let Some(mut editor) = self.editor.take() else {
            return Ok(());
        };
        let unbound = editor.take_part();
        drop(editor);
        match unbound {
            Ok(_) => {
                debug!(
                    "event=session_close module=editor status=ok session_id={}",
                    self.id
                );
                Ok(())
            }
            Err(source) => {
                warn!(
                    "event=session_close module=editor status=error session_id={} error={}",
                    self.id, source
                );
                Err(SyncError::ImportExport {
                    operation: "unbind",
                    source,
                })
            }
        }
    }
}

impl<E: InkEngine> Drop for EditorSession<E> {
    fn drop(&mut self) {
        if self.editor.is_some() {
            warn!(
                "event=session_leak module=editor status=error session_id={} state={:?}",
                self.id,
                self.state()
            );
        }
    }
}

/// Editor view proven to have a bound part.
pub struct BoundEditor<'s, E: InkEngine> {
    editor: &'s mut E::Editor,
    part: Part,
}

impl<E: InkEngine> BoundEditor<'_, E> {
    pub fn part(&self) -> &Part {
        &self.part
    }

    pub fn package_path(&mut self) -> PathBuf {
        self.editor
            .package_mut()
            .map(|package| package.path().to_path_buf())
            .unwrap_or_default()
    }

    pub fn root_block(&self) -> Option<Block> {
        self.editor.root_block()
    }

    pub fn import_text(&mut self, text: &str, selection: Option<&Block>) -> SyncResult<()> {
        self.editor
            .import_text(text, selection)
            .map_err(|source| SyncError::ImportExport {
                operation: "import",
                source,
            })
    }

    pub fn export_text(&self) -> SyncResult<String> {
        self.editor
            .export_text(None)
            .map_err(|source| SyncError::ImportExport {
                operation: "export",
                source,
            })
    }

    pub fn clear(&mut self) -> SyncResult<()> {
        self.editor.clear().map_err(|source| SyncError::ImportExport {
            operation: "clear",
            source,
        })
    }

    /// Advisory only.
    pub fn is_idle(&self) -> bool {
        self.editor.is_idle()
    }

    /// Temp-saves then saves the bound part's package.
    pub fn save_all(&mut self, gateway: &PackageGateway<'_, E>) -> SyncResult<()> {
        let package = self.editor.package_mut().ok_or_else(|| SyncError::ImportExport {
            operation: "save",
            source: EngineError::new(EngineErrorKind::NoPart, "bound part lost its package"),
        })?;
        gateway.save_all(package)
    }
}

fn closed(operation: &'static str) -> SyncError {
    SyncError::ImportExport {
        operation,
        source: EngineError::new(EngineErrorKind::Rejected, "editor session is closed"),
    }
}
