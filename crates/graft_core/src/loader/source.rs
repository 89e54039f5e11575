//! Loader collaborator contracts and the directory-backed unit source.
//!
//! # Responsibility
//! - Define where raw unit bytes and resources come from: local search
//!   locations, the delegating parent, and the trusted internal loader.
//! - Provide a filesystem-backed `UnitSource` for hosts that unpack module
//!   containers onto local storage.

use crate::model::name::UnitName;
use crate::model::unit::{LoadedUnit, Provenance, RawUnit};
use crate::origin::ResourceLocator;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// File suffix for serialized code units in local search locations.
pub const UNIT_FILE_SUFFIX: &str = ".unit";

/// One local search location for raw unit bytes and resources.
pub trait UnitSource: Send + Sync {
    /// Fetches the raw bytes for a unit name, if this source has them.
    fn find(&self, name: &UnitName) -> io::Result<Option<RawUnit>>;

    /// Locates a resource by path, if this source has it.
    fn locate(&self, path: &str) -> Option<ResourceLocator>;
}

/// Standard delegation target for names and resources this loader does not
/// serve itself.
pub trait ParentLoader: Send + Sync {
    fn load(&self, name: &UnitName) -> Result<Arc<LoadedUnit>, ParentError>;

    /// Where the parent would resolve the unit name, without loading it.
    fn locate_unit(&self, name: &UnitName) -> Option<ResourceLocator>;

    fn locate_resource(&self, path: &str) -> Option<ResourceLocator>;

    fn locate_resources(&self, path: &str) -> Vec<ResourceLocator>;
}

/// Parent delegation failure, preserved as the loader error cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentError(pub String);

impl std::fmt::Display for ParentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ParentError {}

/// Internal trusted loader for privileged-namespace units.
pub trait TrustedLoader: Send + Sync {
    fn load(&self, name: &UnitName) -> Result<Arc<LoadedUnit>, TrustedError>;
}

/// Trusted loader failure, surfaced as-is with no fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedError(pub String);

impl std::fmt::Display for TrustedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for TrustedError {}

/// Directory-backed unit source.
///
/// Serves `<root>/<internal/name>.unit` files; provenance is the directory
/// container so defined units never claim the loader's own origin.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn container(&self) -> ResourceLocator {
        ResourceLocator::direct(self.root.to_string_lossy().into_owned())
    }
}

impl UnitSource for DirSource {
    fn find(&self, name: &UnitName) -> io::Result<Option<RawUnit>> {
        let path = self
            .root
            .join(format!("{}{UNIT_FILE_SUFFIX}", name.as_internal()));
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(RawUnit::new(bytes, Provenance::new(self.container())))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn locate(&self, path: &str) -> Option<ResourceLocator> {
        let candidate = self.root.join(path);
        if candidate.is_file() {
            Some(ResourceLocator::archive(
                self.root.to_string_lossy().into_owned(),
                path,
            ))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DirSource, UnitSource};
    use crate::model::name::UnitName;
    use crate::origin::ResourceLocator;

    #[test]
    fn dir_source_serves_unit_files_with_container_provenance() {
        let dir = tempfile::tempdir().expect("temp dir");
        let nested = dir.path().join("a");
        std::fs::create_dir_all(&nested).expect("nested dir");
        std::fs::write(nested.join("B.unit"), [1u8, 2, 3]).expect("unit file");

        let source = DirSource::new(dir.path());
        let name = UnitName::new("a/B").expect("unit name");
        let raw = source
            .find(&name)
            .expect("source read")
            .expect("unit present");
        assert_eq!(raw.bytes.as_ref(), &[1, 2, 3]);
        assert_eq!(
            raw.provenance.container,
            ResourceLocator::direct(dir.path().to_string_lossy().into_owned())
        );
    }

    #[test]
    fn dir_source_reports_missing_units_as_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = DirSource::new(dir.path());
        let name = UnitName::new("a/Missing").expect("unit name");
        assert!(source.find(&name).expect("source read").is_none());
    }

    #[test]
    fn dir_source_locates_resources_as_archive_entries() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("config.json"), b"{}").expect("resource file");

        let source = DirSource::new(dir.path());
        let located = source.locate("config.json").expect("resource present");
        assert_eq!(
            located,
            ResourceLocator::archive(dir.path().to_string_lossy().into_owned(), "config.json")
        );
        assert!(source.locate("absent.json").is_none());
    }
}
