//! Runtime patching and isolation core for extension modules.
//! This crate is the single source of truth for load and binding invariants.

pub mod binder;
pub mod loader;
pub mod logging;
pub mod lookup;
pub mod model;
pub mod origin;
pub mod registry;
pub mod transform;

pub use binder::{BindError, CallSite, CallSiteBinder, CallSiteError, InstanceOfSite};
pub use loader::source::{DirSource, ParentLoader, TrustedLoader, UnitSource};
pub use loader::{CodeLoader, LoaderError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use lookup::{
    Binding, ClassRef, InvokeError, LookupError, LookupProvider, LookupRegistry, ModuleLookup,
    Value,
};
pub use model::descriptor::{
    DescriptorError, FieldAccessOp, HandleTag, SymbolDescriptor, SymbolKind,
};
pub use model::name::{ModuleId, NameError, UnitName};
pub use model::unit::{LoadedUnit, Provenance, RawUnit, UnitError};
pub use origin::{ResourceLocator, RestrictedOrigin};
pub use registry::{RegistryError, SymbolRegistry};
pub use transform::{CodeTransformer, TransformOutcome, TransformPipeline};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
