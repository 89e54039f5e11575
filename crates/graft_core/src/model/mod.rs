//! Core data model shared by loader, registry and binder.
//!
//! # Responsibility
//! - Define the stable identities keying every runtime map.
//! - Define symbol descriptors and raw/defined code-unit records.
//!
//! # Invariants
//! - Identities are immutable once assigned.
//! - Descriptor equality is structural.

pub mod descriptor;
pub mod name;
pub mod unit;
