//! Module and code-unit identities.
//!
//! # Responsibility
//! - Define the stable keys used across loader, registry and binder.
//! - Normalize between internal (`a/b/C`) and dotted (`a.b.C`) unit names.
//!
//! # Invariants
//! - A `ModuleId` is immutable once assigned to a module.
//! - `UnitName` always stores the internal slash-separated form.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static INTERNAL_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(?:/[A-Za-z_$][A-Za-z0-9_$]*)*$")
        .expect("valid internal name regex")
});

/// Stable identifier of one extension module.
///
/// Top-level key into the symbol registry and lookup provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleId(String);

impl ModuleId {
    /// Creates a module id; empty or whitespace-only values are rejected.
    pub fn new(id: impl Into<String>) -> Result<Self, NameError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(NameError::EmptyModuleId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ModuleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully-qualified internal name of one loadable code unit.
///
/// Stored in internal form (`a/b/C`). Use [`UnitName::from_dotted`] when the
/// caller hands in the dotted form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitName(String);

impl UnitName {
    /// Creates a unit name from internal slash-separated form.
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        if !INTERNAL_NAME_RE.is_match(&name) {
            return Err(NameError::InvalidUnitName(name));
        }
        Ok(Self(name))
    }

    /// Creates a unit name from dotted form (`a.b.C`).
    pub fn from_dotted(name: &str) -> Result<Self, NameError> {
        Self::new(name.replace('.', "/"))
    }

    /// Internal slash-separated form.
    pub fn as_internal(&self) -> &str {
        &self.0
    }

    /// Dotted form used in user-facing diagnostics.
    pub fn to_dotted(&self) -> String {
        self.0.replace('/', ".")
    }

    /// Whether this name falls under the given internal-name prefix.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl Display for UnitName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    EmptyModuleId,
    InvalidUnitName(String),
}

impl Display for NameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyModuleId => write!(f, "module id must not be empty"),
            Self::InvalidUnitName(value) => {
                write!(f, "unit name is not a valid internal name: {value}")
            }
        }
    }
}

impl Error for NameError {}
