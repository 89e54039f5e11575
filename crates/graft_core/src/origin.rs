//! Load isolation boundary: restricted-origin classification.
//!
//! # Responsibility
//! - Decide whether a resource locator originates at the restricted origin
//!   (the hosting agent's own container).
//! - Stay a pure classifier; gating decisions happen in the loader.
//!
//! # Invariants
//! - Classification config is fixed at construction and read-only.
//! - Only direct references and archive references whose base matches the
//!   restricted origin are foreign; every other shape never is.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Separator between an archive base and an entry path inside it.
pub const ARCHIVE_ENTRY_SEPARATOR: &str = "!/";

/// Location of one loadable resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceLocator {
    /// Direct reference to a file or container.
    Direct(String),
    /// Reference to an entry inside an archive container.
    Archive { base: String, entry: String },
}

impl ResourceLocator {
    pub fn direct(location: impl Into<String>) -> Self {
        Self::Direct(location.into())
    }

    pub fn archive(base: impl Into<String>, entry: impl Into<String>) -> Self {
        Self::Archive {
            base: base.into(),
            entry: entry.into(),
        }
    }

    /// Parses the textual locator form, splitting archive references on the
    /// first container-entry separator.
    pub fn parse(value: &str) -> Self {
        match value.split_once(ARCHIVE_ENTRY_SEPARATOR) {
            Some((base, entry)) => Self::archive(base, entry),
            None => Self::direct(value),
        }
    }

    /// The container this locator points at or into.
    pub fn container(&self) -> &str {
        match self {
            Self::Direct(location) => location,
            Self::Archive { base, .. } => base,
        }
    }
}

impl Display for ResourceLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct(location) => f.write_str(location),
            Self::Archive { base, entry } => {
                write!(f, "{base}{ARCHIVE_ENTRY_SEPARATOR}{entry}")
            }
        }
    }
}

/// Read-only restricted-origin classification fixed at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictedOrigin {
    origin: String,
}

impl RestrictedOrigin {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.origin
    }

    /// Whether the locator originates at the restricted origin.
    ///
    /// Matches a direct reference equal to the origin, or an archive
    /// reference whose base equals the origin. Pure classification.
    pub fn is_foreign(&self, locator: &ResourceLocator) -> bool {
        locator.container() == self.origin
    }
}
