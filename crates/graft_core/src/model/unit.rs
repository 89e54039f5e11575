//! Raw and defined code units.
//!
//! # Responsibility
//! - Carry immutable unit bytes together with their container provenance.
//! - Apply structural validation when a unit is defined.
//!
//! # Invariants
//! - A `LoadedUnit` is defined at most once per name; redefinition is never
//!   attempted (loader re-check guard).
//! - Provenance always names the container the raw bytes came from, never
//!   the loader's own origin.

use crate::model::name::UnitName;
use crate::origin::ResourceLocator;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Origin token of one raw code unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Container the bytes were read from.
    pub container: ResourceLocator,
}

impl Provenance {
    pub fn new(container: ResourceLocator) -> Self {
        Self { container }
    }
}

/// Immutable raw bytes of one not-yet-defined code unit.
#[derive(Debug, Clone)]
pub struct RawUnit {
    pub bytes: Arc<[u8]>,
    pub provenance: Provenance,
}

impl RawUnit {
    pub fn new(bytes: impl Into<Arc<[u8]>>, provenance: Provenance) -> Self {
        Self {
            bytes: bytes.into(),
            provenance,
        }
    }
}

/// One defined code unit, cached by the loader for process lifetime.
#[derive(Debug)]
pub struct LoadedUnit {
    pub name: UnitName,
    pub bytes: Arc<[u8]>,
    pub provenance: Provenance,
    /// Whether the transform pipeline rewrote the raw bytes.
    pub transformed: bool,
}

impl LoadedUnit {
    /// Defines a unit from final bytes after structural validation.
    ///
    /// Validation is structural only: the bytes must be non-empty. Semantic
    /// correctness of rewritten code is outside this layer.
    pub fn define(
        name: UnitName,
        bytes: impl Into<Arc<[u8]>>,
        provenance: Provenance,
        transformed: bool,
    ) -> Result<Self, UnitError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(UnitError::EmptyUnit(name));
        }
        Ok(Self {
            name,
            bytes,
            provenance,
            transformed,
        })
    }
}

/// Structural unit validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitError {
    EmptyUnit(UnitName),
}

impl Display for UnitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUnit(name) => write!(f, "unit has empty code bytes: {name}"),
        }
    }
}

impl Error for UnitError {}

#[cfg(test)]
mod tests {
    use super::{LoadedUnit, Provenance, UnitError};
    use crate::model::name::UnitName;
    use crate::origin::ResourceLocator;

    fn provenance() -> Provenance {
        Provenance::new(ResourceLocator::direct("/plugins/demo.pack"))
    }

    #[test]
    fn defines_unit_with_container_provenance() {
        let name = UnitName::new("a/B").expect("valid name");
        let unit =
            LoadedUnit::define(name, vec![1u8, 2, 3], provenance(), true).expect("valid unit");
        assert!(unit.transformed);
        assert_eq!(
            unit.provenance.container,
            ResourceLocator::direct("/plugins/demo.pack")
        );
    }

    #[test]
    fn rejects_empty_unit_bytes() {
        let name = UnitName::new("a/B").expect("valid name");
        let err = LoadedUnit::define(name, Vec::<u8>::new(), provenance(), false)
            .expect_err("empty bytes must fail");
        assert!(matches!(err, UnitError::EmptyUnit(_)));
    }
}
