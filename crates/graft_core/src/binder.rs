//! Dynamic call-site binder with one-time inline-cache binding.
//!
//! # Responsibility
//! - Resolve a rewritten call site to its registry binding on first
//!   execution and rewire the site permanently.
//! - Force-activate owners whose symbols are not yet resolved.
//!
//! # Invariants
//! - A call site transitions `Unbound -> Bound` at most once; later
//!   invocations bypass the binding algorithm entirely.
//! - An unregistered module, owner or descriptor is a fatal consistency
//!   error, never a silent no-op.

use crate::lookup::{Binding, ClassRef, InvokeError, LookupError, LookupProvider, Value};
use crate::model::descriptor::{DescriptorError, FieldAccessOp, SymbolDescriptor};
use crate::model::name::{ModuleId, UnitName};
use crate::registry::{RegistryError, SymbolRegistry};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Binds rewritten call sites against the symbol registry.
pub struct CallSiteBinder {
    registry: Arc<SymbolRegistry>,
    lookups: Arc<dyn LookupProvider>,
}

impl CallSiteBinder {
    pub fn new(registry: Arc<SymbolRegistry>, lookups: Arc<dyn LookupProvider>) -> Self {
        Self { registry, lookups }
    }

    /// Resolves the binding for one call site.
    ///
    /// Owners that are not yet ready are force-loaded through the module's
    /// privileged lookup; `resolve_all` then runs idempotently in case the
    /// load itself did not trigger it.
    pub fn bind(
        &self,
        module: &ModuleId,
        owner: &UnitName,
        descriptor: &SymbolDescriptor,
    ) -> Result<Binding, BindError> {
        if !self.registry.has_module(module) {
            return Err(BindError::ModuleNotConfigured(module.clone()));
        }
        if !self.registry.has_owner(module, owner) {
            return Err(BindError::OwnerNotDiscovered {
                module: module.clone(),
                owner: owner.clone(),
            });
        }

        if !self.registry.is_ready(module, owner) {
            let lookup = self.lookups.lookup_for(module).map_err(BindError::Lookup)?;
            lookup
                .ensure_loaded(owner)
                .map_err(BindError::Lookup)?;
            self.registry
                .resolve_all(module, owner, lookup.as_ref())
                .map_err(BindError::Registry)?;
        }

        self.registry
            .binding(module, owner, descriptor)
            .ok_or_else(|| BindError::SymbolNotDiscovered {
                module: module.clone(),
                owner: owner.clone(),
                descriptor: descriptor.clone(),
            })
    }

    /// Resolves a class reference for a dynamic instance-check site.
    pub fn resolve_class(&self, module: &ModuleId, owner: &UnitName) -> Result<ClassRef, BindError> {
        let lookup = self.lookups.lookup_for(module).map_err(BindError::Lookup)?;
        lookup.find_class(owner).map_err(BindError::Lookup)
    }
}

/// One rewritten call site: a mutable cell bound exactly once.
#[derive(Debug)]
pub struct CallSite {
    module: ModuleId,
    owner: UnitName,
    descriptor: SymbolDescriptor,
    bound: OnceCell<Binding>,
}

impl CallSite {
    pub fn new(module: ModuleId, owner: UnitName, descriptor: SymbolDescriptor) -> Self {
        Self {
            module,
            owner,
            descriptor,
            bound: OnceCell::new(),
        }
    }

    /// Call site synthesized from a field-access operation.
    pub fn for_field_op(
        module: ModuleId,
        owner: UnitName,
        op: FieldAccessOp,
        name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self::new(module, owner, SymbolDescriptor::from_field_op(op, name, signature))
    }

    /// Call site synthesized from a linked-method handle tag.
    ///
    /// An unrecognized tag is a fatal configuration error.
    pub fn for_handle_tag(
        module: ModuleId,
        owner: UnitName,
        tag: u8,
        name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Result<Self, DescriptorError> {
        Ok(Self::new(
            module,
            owner,
            SymbolDescriptor::from_handle_tag(tag, name, signature)?,
        ))
    }

    pub fn descriptor(&self) -> &SymbolDescriptor {
        &self.descriptor
    }

    pub fn is_bound(&self) -> bool {
        self.bound.get().is_some()
    }

    /// Invokes the call site, binding it on first execution.
    pub fn invoke(&self, binder: &CallSiteBinder, args: &[Value]) -> Result<Value, CallSiteError> {
        let binding = self
            .bound
            .get_or_try_init(|| binder.bind(&self.module, &self.owner, &self.descriptor))
            .map_err(CallSiteError::Bind)?;
        binding.invoke(args).map_err(CallSiteError::Invoke)
    }
}

/// One rewritten instance-check site, resolved to a class reference once.
pub struct InstanceOfSite {
    module: ModuleId,
    target: UnitName,
    class: OnceCell<ClassRef>,
}

impl InstanceOfSite {
    pub fn new(module: ModuleId, target: UnitName) -> Self {
        Self {
            module,
            target,
            class: OnceCell::new(),
        }
    }

    /// Checks a value against the target class, resolving it on first use.
    pub fn is_instance(
        &self,
        binder: &CallSiteBinder,
        value: &Value,
    ) -> Result<bool, CallSiteError> {
        let class = self
            .class
            .get_or_try_init(|| binder.resolve_class(&self.module, &self.target))
            .map_err(CallSiteError::Bind)?;
        Ok(class.is_instance(value))
    }
}

/// Fatal binding failures: analysis output and runtime are out of sync.
#[derive(Debug)]
pub enum BindError {
    ModuleNotConfigured(ModuleId),
    OwnerNotDiscovered {
        module: ModuleId,
        owner: UnitName,
    },
    SymbolNotDiscovered {
        module: ModuleId,
        owner: UnitName,
        descriptor: SymbolDescriptor,
    },
    Lookup(LookupError),
    Registry(RegistryError),
}

impl Display for BindError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModuleNotConfigured(module) => {
                write!(
                    f,
                    "module `{module}` invoked dynamically but is not configured for dynamic binding"
                )
            }
            Self::OwnerNotDiscovered { module, owner } => {
                write!(
                    f,
                    "owner {owner} of module `{module}` was not discovered during analysis"
                )
            }
            Self::SymbolNotDiscovered {
                module,
                owner,
                descriptor,
            } => {
                write!(
                    f,
                    "{descriptor} in owner {owner} of module `{module}` was not discovered during analysis but is being accessed"
                )
            }
            Self::Lookup(cause) => write!(f, "lookup failure while binding: {cause}"),
            Self::Registry(cause) => write!(f, "registry failure while binding: {cause}"),
        }
    }
}

impl Error for BindError {}

/// Call-site invocation failures.
#[derive(Debug)]
pub enum CallSiteError {
    Bind(BindError),
    Invoke(InvokeError),
}

impl Display for CallSiteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bind(cause) => write!(f, "call site binding failed: {cause}"),
            Self::Invoke(cause) => write!(f, "call site invocation failed: {cause}"),
        }
    }
}

impl Error for CallSiteError {}
