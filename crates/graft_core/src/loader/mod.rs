//! On-demand code loader with transformation and load isolation.
//!
//! # Responsibility
//! - Load named code units from local search locations, the trusted
//!   internal loader (privileged namespaces), or the delegating parent.
//! - Run the transform pipeline over every non-privileged unit before it
//!   is defined.
//! - Accept pre-rewritten bytes injected by the running system.
//!
//! # Invariants
//! - Each unit name is defined at most once; a redefinition race is
//!   resolved by preferring the existing definition, never by failing.
//! - Loads of the same name serialize behind a per-name lock; unrelated
//!   names load in parallel.
//! - A name the parent resolves only at the restricted origin is blocked
//!   with a distinguishable failure, never silently served.

pub mod locks;
pub mod source;

use crate::loader::locks::NameLocks;
use crate::loader::source::{ParentError, ParentLoader, TrustedError, TrustedLoader, UnitSource};
use crate::model::name::UnitName;
use crate::model::unit::{LoadedUnit, Provenance, RawUnit};
use crate::origin::{ResourceLocator, RestrictedOrigin};
use crate::transform::{TransformOutcome, TransformPipeline};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock};

/// Central on-demand loader for extension code units.
pub struct CodeLoader {
    privileged_prefixes: Vec<String>,
    sources: Vec<Arc<dyn UnitSource>>,
    parent: Arc<dyn ParentLoader>,
    trusted: Arc<dyn TrustedLoader>,
    pipeline: TransformPipeline,
    restricted: RestrictedOrigin,
    defined: RwLock<HashMap<UnitName, Arc<LoadedUnit>>>,
    locks: NameLocks,
}

impl CodeLoader {
    pub fn new(
        privileged_prefixes: Vec<String>,
        sources: Vec<Arc<dyn UnitSource>>,
        parent: Arc<dyn ParentLoader>,
        trusted: Arc<dyn TrustedLoader>,
        pipeline: TransformPipeline,
        restricted: RestrictedOrigin,
    ) -> Self {
        Self {
            privileged_prefixes,
            sources,
            parent,
            trusted,
            pipeline,
            restricted,
            defined: RwLock::new(HashMap::new()),
            locks: NameLocks::new(),
        }
    }

    /// Already-defined unit, if any. Read-only lookup, no locking beyond it.
    pub fn defined(&self, name: &UnitName) -> Option<Arc<LoadedUnit>> {
        let defined = self.defined.read().expect("defined map poisoned");
        defined.get(name).cloned()
    }

    fn is_privileged(&self, name: &UnitName) -> bool {
        self.privileged_prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix))
    }

    /// Loads one unit by name.
    ///
    /// Privileged-namespace names delegate entirely to the trusted loader
    /// and are never transformed. Ordinary names are fetched from the
    /// search path, rewritten by the transform pipeline and defined once;
    /// names absent from every search location fall through to the parent,
    /// with the restricted origin blocked.
    pub fn load(&self, name: &UnitName) -> Result<Arc<LoadedUnit>, LoaderError> {
        if let Some(unit) = self.defined(name) {
            log::debug!("load cache hit: {name}");
            return Ok(unit);
        }

        if self.is_privileged(name) {
            return self.trusted.load(name).map_err(|cause| {
                log::warn!("trusted load failed: {name}: {cause}");
                LoaderError::Privileged {
                    name: name.clone(),
                    cause,
                }
            });
        }

        let _guard = self.locks.lock(name.as_internal());
        // A waiter on the per-name lock observes the winner's definition.
        if let Some(unit) = self.defined(name) {
            return Ok(unit);
        }

        match self.fetch_raw(name)? {
            Some(raw) => self.transform_and_define(name, raw),
            None => self.delegate_to_parent(name),
        }
    }

    /// Defines a unit from pre-rewritten bytes supplied by the runtime.
    ///
    /// Bypasses the search path and the transform pipeline; same per-name
    /// exclusive lock and no-redefinition guard as ordinary loads.
    pub fn define_unit(
        &self,
        name: UnitName,
        bytes: Vec<u8>,
        provenance: Provenance,
    ) -> Result<Arc<LoadedUnit>, LoaderError> {
        let _guard = self.locks.lock(name.as_internal());
        if let Some(unit) = self.defined(&name) {
            return Ok(unit);
        }
        self.define(name, bytes, provenance, true)
    }

    /// Single-result resource lookup, filtered by the isolation boundary.
    pub fn resource(&self, path: &str) -> Option<ResourceLocator> {
        let located = self
            .sources
            .iter()
            .find_map(|source| source.locate(path))
            .or_else(|| self.parent.locate_resource(path))?;
        if self.restricted.is_foreign(&located) {
            None
        } else {
            Some(located)
        }
    }

    /// Multi-result resource lookup with foreign entries filtered out.
    pub fn resources(&self, path: &str) -> Vec<ResourceLocator> {
        let mut out: Vec<ResourceLocator> = self
            .sources
            .iter()
            .filter_map(|source| source.locate(path))
            .collect();
        out.extend(self.parent.locate_resources(path));
        out.retain(|locator| !self.restricted.is_foreign(locator));
        out
    }

    fn fetch_raw(&self, name: &UnitName) -> Result<Option<RawUnit>, LoaderError> {
        for source in &self.sources {
            match source.find(name) {
                Ok(Some(raw)) => return Ok(Some(raw)),
                Ok(None) => continue,
                Err(err) => {
                    return Err(LoaderError::Source {
                        name: name.clone(),
                        detail: err.to_string(),
                    })
                }
            }
        }
        Ok(None)
    }

    fn transform_and_define(
        &self,
        name: &UnitName,
        raw: RawUnit,
    ) -> Result<Arc<LoadedUnit>, LoaderError> {
        let outcome = self.pipeline.apply(name, &raw.bytes);
        // The transform may have recursively loaded this very name, whether
        // or not it rewrote the bytes; prefer that definition, redefinition
        // is illegal.
        if let Some(unit) = self.defined(name) {
            log::debug!("transform already defined {name}, keeping existing definition");
            return Ok(unit);
        }
        match outcome {
            TransformOutcome::Transformed(bytes) => {
                self.define(name.clone(), bytes, raw.provenance, true)
            }
            TransformOutcome::Unchanged => {
                self.define(name.clone(), raw.bytes.to_vec(), raw.provenance, false)
            }
        }
    }

    fn delegate_to_parent(&self, name: &UnitName) -> Result<Arc<LoadedUnit>, LoaderError> {
        if let Some(located) = self.parent.locate_unit(name) {
            if self.restricted.is_foreign(&located) {
                log::warn!("blocking load of {name} resolved at restricted origin {located}");
                return Err(LoaderError::Blocked(name.clone()));
            }
        }
        self.parent.load(name).map_err(|cause| LoaderError::Parent {
            name: name.clone(),
            cause,
        })
    }

    fn define(
        &self,
        name: UnitName,
        bytes: Vec<u8>,
        provenance: Provenance,
        transformed: bool,
    ) -> Result<Arc<LoadedUnit>, LoaderError> {
        let unit = LoadedUnit::define(name.clone(), bytes, provenance, transformed)
            .map_err(|_| LoaderError::Malformed(name.clone()))?;
        let unit = Arc::new(unit);
        let mut defined = self.defined.write().expect("defined map poisoned");
        defined.insert(name.clone(), Arc::clone(&unit));
        log::info!("defined unit {name} (transformed={transformed})");
        Ok(unit)
    }
}

/// Loader failures, distinguishable by cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    /// Name resolves only at the restricted origin.
    Blocked(UnitName),
    /// Trusted loader failure for a privileged name, surfaced as-is.
    Privileged { name: UnitName, cause: TrustedError },
    /// Parent delegation failure for a name no search location served.
    Parent { name: UnitName, cause: ParentError },
    /// Rewrite or injection produced structurally invalid bytes.
    Malformed(UnitName),
    /// A search location failed while fetching raw bytes.
    Source { name: UnitName, detail: String },
}

impl Display for LoaderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blocked(name) => {
                write!(f, "blocking access to restricted-origin unit: {name}")
            }
            Self::Privileged { name, cause } => {
                write!(f, "privileged unit not found in trusted loader: {name}: {cause}")
            }
            Self::Parent { name, cause } => {
                write!(f, "parent delegation failed for unit {name}: {cause}")
            }
            Self::Malformed(name) => write!(f, "rewritten unit is malformed: {name}"),
            Self::Source { name, detail } => {
                write!(f, "search location failed for unit {name}: {detail}")
            }
        }
    }
}

impl Error for LoaderError {}
