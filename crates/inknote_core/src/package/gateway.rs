//! Gateway over the engine's content packages.

use crate::engine::{
    ContentPackage, EngineErrorKind, InkEngine, OpenOption, Part, DEFAULT_PART_KIND,
};
use crate::sync::{SyncError, SyncResult};
use log::{debug, error, info};
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Returns `path` in canonical decomposed (NFD) form.
///
/// Non-UTF-8 paths are returned unchanged.
pub fn normalize_package_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(raw) => PathBuf::from(raw.nfd().collect::<String>()),
        None => path.to_path_buf(),
    }
}

/// Thin adapter over an `InkEngine`'s package operations.
pub struct PackageGateway<'e, E: InkEngine> {
    engine: &'e E,
}

impl<'e, E: InkEngine> PackageGateway<'e, E> {
    pub fn new(engine: &'e E) -> Self {
        Self { engine }
    }

    /// Opens or creates the package at `path` and guarantees it has a part.
    ///
    /// # Errors
    /// - `PackageOpen` when the engine cannot allocate or parse the package,
    ///   or cannot create the default part.
    pub fn open_or_create(&self, path: &Path) -> SyncResult<E::Package> {
        let normalized = normalize_package_path(path);
        let mut package = self.open(&normalized, OpenOption::Create)?;

        if package.part_count() == 0 {
            package
                .create_part(DEFAULT_PART_KIND)
                .map_err(|source| SyncError::PackageOpen {
                    path: normalized.clone(),
                    source,
                })?;
            debug!(
                "event=package_default_part module=package status=ok path={}",
                normalized.display()
            );
        }
        Ok(package)
    }

    /// Opens an existing package as stored, without adding a default part.
    ///
    /// # Errors
    /// - `PackageOpen` when the package is missing or cannot be parsed.
    pub fn open_existing(&self, path: &Path) -> SyncResult<E::Package> {
        self.open(&normalize_package_path(path), OpenOption::Existing)
    }

    fn open(&self, normalized: &Path, option: OpenOption) -> SyncResult<E::Package> {
        self.engine.open_package(normalized, option).map_err(|source| {
            error!(
                "event=package_open module=package status=error path={} error={}",
                normalized.display(),
                source
            );
            SyncError::PackageOpen {
                path: normalized.to_path_buf(),
                source,
            }
        })
    }

    /// Returns the part at `index`.
    pub fn part(&self, package: &E::Package, index: usize) -> SyncResult<Part> {
        package.part(index).map_err(|source| SyncError::PartNotFound {
            path: package.path().to_path_buf(),
            index,
            source,
        })
    }

    pub fn remove_part(&self, package: &mut E::Package, part: &Part) -> SyncResult<()> {
        package.remove_part(part).map_err(|source| {
            if source.kind == EngineErrorKind::PartNotFound {
                SyncError::PartNotFound {
                    path: package.path().to_path_buf(),
                    index: part.index,
                    source,
                }
            } else {
                SyncError::Persistence {
                    path: package.path().to_path_buf(),
                    source,
                }
            }
        })
    }

    pub fn save(&self, package: &mut E::Package) -> SyncResult<()> {
        package.save().map_err(|source| SyncError::Persistence {
            path: package.path().to_path_buf(),
            source,
        })
    }

    pub fn save_to_temp(&self, package: &mut E::Package) -> SyncResult<()> {
        package.save_to_temp().map_err(|source| SyncError::Persistence {
            path: package.path().to_path_buf(),
            source,
        })
    }

    /// Temp-save then save, so an interrupted write leaves the committed
    /// package intact.
    pub fn save_all(&self, package: &mut E::Package) -> SyncResult<()> {
        self.save_to_temp(package)?;
        self.save(package)?;
        debug!(
            "event=package_save module=package status=ok path={}",
            package.path().display()
        );
        Ok(())
    }

    pub fn package_exists(&self, path: &Path) -> bool {
        normalize_package_path(path).exists()
    }

    /// Removes the package file from storage.
    pub fn remove_package_file(&self, path: &Path) -> std::io::Result<()> {
        let normalized = normalize_package_path(path);
        self.engine.remove_package(&normalized)?;
        info!(
            "event=package_remove module=package status=ok path={}",
            normalized.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize_package_path, PackageGateway};
    use crate::engine::{ContentPackage, FaultPoint, PlainTextEngine};
    use crate::sync::SyncError;
    use std::path::Path;

    #[test]
    fn normalize_decomposes_precomposed_characters() {
        let composed = Path::new("/notes/caf\u{e9}.iink");
        let normalized = normalize_package_path(composed);
        assert_eq!(normalized.to_str().unwrap(), "/notes/cafe\u{301}.iink");
    }

    #[test]
    fn open_or_create_guarantees_one_part() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PlainTextEngine::new();
        let gateway = PackageGateway::new(&engine);
        let path = dir.path().join("n.iink");

        let package = gateway.open_or_create(&path).unwrap();
        assert_eq!(package.part_count(), 1);
        assert_eq!(gateway.part(&package, 0).unwrap().kind, "Text");
        assert!(gateway.package_exists(&path));
    }

    #[test]
    fn part_out_of_range_is_part_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PlainTextEngine::new();
        let gateway = PackageGateway::new(&engine);
        let package = gateway.open_or_create(&dir.path().join("n.iink")).unwrap();

        let err = gateway.part(&package, 3).unwrap_err();
        assert!(matches!(err, SyncError::PartNotFound { index: 3, .. }));
    }

    #[test]
    fn engine_open_failure_is_package_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PlainTextEngine::new();
        engine.inject_fault(FaultPoint::Open);
        let gateway = PackageGateway::new(&engine);

        let err = gateway
            .open_or_create(&dir.path().join("n.iink"))
            .unwrap_err();
        assert!(matches!(err, SyncError::PackageOpen { .. }));
    }

    #[test]
    fn open_existing_reports_missing_package() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PlainTextEngine::new();
        let gateway = PackageGateway::new(&engine);
        let path = dir.path().join("absent.iink");

        let err = gateway.open_existing(&path).unwrap_err();
        assert!(matches!(err, SyncError::PackageOpen { .. }));
        assert!(!gateway.package_exists(&path));
    }

    #[test]
    fn failed_temp_save_skips_commit() {
        let dir = tempfile::tempdir().unwrap();
        let engine = PlainTextEngine::new();
        let gateway = PackageGateway::new(&engine);
        let mut package = gateway.open_or_create(&dir.path().join("n.iink")).unwrap();

        engine.inject_fault(FaultPoint::SaveToTemp);
        let err = gateway.save_all(&mut package).unwrap_err();
        assert!(matches!(err, SyncError::Persistence { .. }));
        gateway.save_all(&mut package).unwrap();
    }
}
