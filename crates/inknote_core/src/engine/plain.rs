//! File-backed reference Ink Engine.
//!
//! # Responsibility
//! - Implement the engine contract over JSON package files so the core can be
//!   exercised end to end without a recognition runtime.
//! - Simulate the engine's advisory busy state and inject one-shot faults for
//!   failure-path tests.
//!
//! # Invariants
//! - `save` always lands through a rename from the sibling `.tmp` file, so a
//!   committed package is never partially written.
//! - Opening with `OpenOption::Create` materializes an empty package on disk.

use super::{
    Block, ContentPackage, EngineError, EngineErrorKind, EngineResult, InkEditor, InkEngine,
    OpenOption, Part,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use uuid::Uuid;

const PACKAGE_FORMAT_VERSION: u32 = 1;

/// Engine operation that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Open,
    Save,
    SaveToTemp,
    Import,
    Export,
    Remove,
}

#[derive(Debug, Default)]
struct EngineState {
    faults: HashSet<FaultPoint>,
    busy: bool,
}

type SharedState = Rc<RefCell<EngineState>>;

fn take_fault(state: &SharedState, point: FaultPoint) -> bool {
    state.borrow_mut().faults.remove(&point)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct PackageFile {
    format: u32,
    parts: Vec<PartRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PartRecord {
    id: String,
    kind: String,
    text: String,
}

/// Reference engine storing each package as a JSON document.
#[derive(Debug, Clone, Default)]
pub struct PlainTextEngine {
    state: SharedState,
}

impl PlainTextEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call at `point` fail.
    pub fn inject_fault(&self, point: FaultPoint) {
        self.state.borrow_mut().faults.insert(point);
    }

    pub fn clear_faults(&self) {
        self.state.borrow_mut().faults.clear();
    }

    /// Sets the idle signal reported by every editor of this engine.
    pub fn set_busy(&self, busy: bool) {
        self.state.borrow_mut().busy = busy;
    }
}

impl InkEngine for PlainTextEngine {
    type Package = PlainPackage;
    type Editor = PlainEditor;

    fn open_package(&self, path: &Path, option: OpenOption) -> EngineResult<PlainPackage> {
        if take_fault(&self.state, FaultPoint::Open) {
            return Err(EngineError::new(
                EngineErrorKind::Io,
                format!("cannot allocate package `{}`", path.display()),
            ));
        }

        let content = if path.exists() {
            let raw = fs::read_to_string(path)
                .map_err(|err| EngineError::io(&err, format!("read `{}`", path.display())))?;
            serde_json::from_str::<PackageFile>(&raw).map_err(|err| {
                EngineError::new(
                    EngineErrorKind::Corrupt,
                    format!("unparseable package `{}`: {err}", path.display()),
                )
            })?
        } else {
            if option == OpenOption::Existing {
                return Err(EngineError::new(
                    EngineErrorKind::Missing,
                    format!("package `{}` does not exist", path.display()),
                ));
            }
            let empty = PackageFile {
                format: PACKAGE_FORMAT_VERSION,
                parts: Vec::new(),
            };
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|err| {
                    EngineError::io(&err, format!("create `{}`", parent.display()))
                })?;
            }
            write_atomically(path, &encode(&empty)?)?;
            debug!(
                "event=package_create module=engine status=ok path={}",
                path.display()
            );
            empty
        };

        Ok(PlainPackage {
            path: path.to_path_buf(),
            content,
            state: Rc::clone(&self.state),
        })
    }

    fn create_editor(&self) -> EngineResult<PlainEditor> {
        Ok(PlainEditor {
            bound: None,
            state: Rc::clone(&self.state),
        })
    }

    fn remove_package(&self, path: &Path) -> io::Result<()> {
        if take_fault(&self.state, FaultPoint::Remove) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("cannot remove `{}`", path.display()),
            ));
        }
        fs::remove_file(path)?;
        match fs::remove_file(temp_path_for(path)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

/// Package handle of the reference engine.
#[derive(Debug)]
pub struct PlainPackage {
    path: PathBuf,
    content: PackageFile,
    state: SharedState,
}

impl PlainPackage {
    fn record(&self, part: &Part) -> EngineResult<&PartRecord> {
        self.content
            .parts
            .iter()
            .find(|record| record.id == part.id)
            .ok_or_else(|| part_not_found(part))
    }

    fn record_mut(&mut self, part: &Part) -> EngineResult<&mut PartRecord> {
        self.content
            .parts
            .iter_mut()
            .find(|record| record.id == part.id)
            .ok_or_else(|| part_not_found(part))
    }

    fn temp_path(&self) -> PathBuf {
        temp_path_for(&self.path)
    }
}

impl ContentPackage for PlainPackage {
    fn path(&self) -> &Path {
        &self.path
    }

    fn part_count(&self) -> usize {
        self.content.parts.len()
    }

    fn part(&self, index: usize) -> EngineResult<Part> {
        self.content
            .parts
            .get(index)
            .map(|record| Part {
                id: record.id.clone(),
                kind: record.kind.clone(),
                index,
            })
            .ok_or_else(|| {
                EngineError::new(
                    EngineErrorKind::PartNotFound,
                    format!(
                        "part index {index} out of range (count={})",
                        self.content.parts.len()
                    ),
                )
            })
    }

    fn create_part(&mut self, kind: &str) -> EngineResult<Part> {
        let record = PartRecord {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            text: String::new(),
        };
        let part = Part {
            id: record.id.clone(),
            kind: record.kind.clone(),
            index: self.content.parts.len(),
        };
        self.content.parts.push(record);
        Ok(part)
    }

    fn remove_part(&mut self, part: &Part) -> EngineResult<()> {
        let position = self
            .content
            .parts
            .iter()
            .position(|record| record.id == part.id)
            .ok_or_else(|| part_not_found(part))?;
        self.content.parts.remove(position);
        Ok(())
    }

    fn save(&mut self) -> EngineResult<()> {
        if take_fault(&self.state, FaultPoint::Save) {
            return Err(EngineError::new(
                EngineErrorKind::Io,
                format!("cannot save `{}`", self.path.display()),
            ));
        }

        let bytes = encode(&self.content)?;
        let temp = self.temp_path();
        let temp_is_current = fs::read(&temp).map(|b| b == bytes).unwrap_or(false);
        if !temp_is_current {
            fs::write(&temp, &bytes)
                .map_err(|err| EngineError::io(&err, format!("write `{}`", temp.display())))?;
        }
        fs::rename(&temp, &self.path)
            .map_err(|err| EngineError::io(&err, format!("commit `{}`", self.path.display())))
    }

    fn save_to_temp(&mut self) -> EngineResult<()> {
        if take_fault(&self.state, FaultPoint::SaveToTemp) {
            return Err(EngineError::new(
                EngineErrorKind::Io,
                format!("cannot write temp copy of `{}`", self.path.display()),
            ));
        }

        let temp = self.temp_path();
        fs::write(&temp, encode(&self.content)?)
            .map_err(|err| EngineError::io(&err, format!("write `{}`", temp.display())))
    }
}

/// Editor of the reference engine; recognised ink is stored as text.
#[derive(Debug)]
pub struct PlainEditor {
    bound: Option<(PlainPackage, Part)>,
    state: SharedState,
}

impl PlainEditor {
    fn bound_text(&self) -> EngineResult<&str> {
        let (package, part) = self.bound.as_ref().ok_or_else(no_part)?;
        Ok(package.record(part)?.text.as_str())
    }

    fn bound_text_mut(&mut self) -> EngineResult<&mut String> {
        let (package, part) = self.bound.as_mut().ok_or_else(no_part)?;
        Ok(&mut package.record_mut(part)?.text)
    }

    fn root_block_id(part: &Part) -> String {
        format!("{}/root", part.id)
    }
}

impl InkEditor for PlainEditor {
    type Package = PlainPackage;

    fn set_part(&mut self, package: PlainPackage, part: Part) -> EngineResult<()> {
        package.record(&part)?;
        self.bound = Some((package, part));
        Ok(())
    }

    fn take_part(&mut self) -> EngineResult<Option<PlainPackage>> {
        Ok(self.bound.take().map(|(package, _)| package))
    }

    fn part(&self) -> Option<&Part> {
        self.bound.as_ref().map(|(_, part)| part)
    }

    fn package_mut(&mut self) -> Option<&mut PlainPackage> {
        self.bound.as_mut().map(|(package, _)| package)
    }

    fn root_block(&self) -> Option<Block> {
        let (_, part) = self.bound.as_ref()?;
        match self.bound_text() {
            Ok(text) if !text.is_empty() => Some(Block {
                id: Self::root_block_id(part),
            }),
            _ => None,
        }
    }

    fn import_text(&mut self, text: &str, selection: Option<&Block>) -> EngineResult<()> {
        if take_fault(&self.state, FaultPoint::Import) {
            return Err(EngineError::new(
                EngineErrorKind::Rejected,
                "import refused by engine",
            ));
        }
        if text.contains('\0') {
            return Err(EngineError::new(
                EngineErrorKind::Rejected,
                "text contains characters the engine cannot represent",
            ));
        }
        if let Some(block) = selection {
            let part = self.part().ok_or_else(no_part)?;
            if block.id != Self::root_block_id(part) {
                return Err(EngineError::new(
                    EngineErrorKind::Rejected,
                    format!("unknown selection `{}`", block.id),
                ));
            }
        }

        let current = self.bound_text_mut()?;
        if selection.is_some() || current.is_empty() {
            *current = text.to_string();
        } else {
            current.push('\n');
            current.push_str(text);
        }
        Ok(())
    }

    fn export_text(&self, _selection: Option<&Block>) -> EngineResult<String> {
        if take_fault(&self.state, FaultPoint::Export) {
            return Err(EngineError::new(
                EngineErrorKind::Rejected,
                "export refused by engine",
            ));
        }
        self.bound_text().map(str::to_string)
    }

    fn clear(&mut self) -> EngineResult<()> {
        self.bound_text_mut()?.clear();
        Ok(())
    }

    fn is_idle(&self) -> bool {
        !self.state.borrow().busy
    }
}

fn encode(content: &PackageFile) -> EngineResult<Vec<u8>> {
    serde_json::to_vec_pretty(content).map_err(|err| {
        EngineError::new(
            EngineErrorKind::Io,
            format!("cannot encode package: {err}"),
        )
    })
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> EngineResult<()> {
    let temp = temp_path_for(path);
    fs::write(&temp, bytes)
        .map_err(|err| EngineError::io(&err, format!("write `{}`", temp.display())))?;
    fs::rename(&temp, path)
        .map_err(|err| EngineError::io(&err, format!("commit `{}`", path.display())))
}

fn no_part() -> EngineError {
    EngineError::new(EngineErrorKind::NoPart, "editor has no bound part")
}

fn part_not_found(part: &Part) -> EngineError {
    EngineError::new(
        EngineErrorKind::PartNotFound,
        format!("part `{}` not found in package", part.id),
    )
}
