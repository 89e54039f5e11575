//! Symbol registry: required descriptors and lazily resolved bindings.
//!
//! # Responsibility
//! - Record, per (module, owning unit), the symbol descriptors the analysis
//!   pass discovered as required.
//! - Resolve all still-required descriptors exactly once when the owning
//!   unit becomes loaded and a privileged lookup context is available.
//!
//! # Invariants
//! - A descriptor present in `resolved` is never re-resolved.
//! - `ready` becomes true exactly once; afterwards `required` is empty.
//! - Resolution serializes per owner: `ready` is only observable after
//!   every drained descriptor's binding has been stored.
//! - Draining removes each descriptor before resolving it, so a re-entrant
//!   invocation never resolves the same descriptor twice.
//! - Partial readiness is not a state: one failed resolution fails the
//!   whole owner.

use crate::lookup::{Binding, LookupError, ModuleLookup};
use crate::model::descriptor::SymbolDescriptor;
use crate::model::name::{ModuleId, UnitName};
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread::{self, ThreadId};

/// Per-owner symbol table.
#[derive(Default)]
struct OwnerSymbols {
    required: Mutex<BTreeSet<SymbolDescriptor>>,
    resolved: RwLock<HashMap<SymbolDescriptor, Binding>>,
    ready: AtomicBool,
    resolving: Mutex<Option<ThreadId>>,
    resolver_done: Condvar,
}

impl OwnerSymbols {
    /// Removes and returns one still-required descriptor.
    fn take_required(&self) -> Option<SymbolDescriptor> {
        let mut required = self.required.lock().expect("required set poisoned");
        let next = required.iter().next().cloned()?;
        required.remove(&next);
        Some(next)
    }

    /// Acquires the per-owner resolve gate, waiting out a concurrent
    /// resolver thread.
    ///
    /// Returns `None` when the calling thread already holds the gate: a
    /// re-entrant activation helps drain without blocking and without
    /// publishing readiness itself.
    fn enter_gate(&self) -> Option<GateGuard<'_>> {
        let me = thread::current().id();
        let mut holder = self.resolving.lock().expect("resolve gate poisoned");
        loop {
            match *holder {
                None => {
                    *holder = Some(me);
                    return Some(GateGuard { symbols: self });
                }
                Some(resolver) if resolver == me => return None,
                Some(_) => {
                    holder = self
                        .resolver_done
                        .wait(holder)
                        .expect("resolve gate poisoned");
                }
            }
        }
    }

    fn leave_gate(&self) {
        let mut holder = self.resolving.lock().expect("resolve gate poisoned");
        *holder = None;
        self.resolver_done.notify_all();
    }
}

/// Guard releasing the per-owner resolve gate on drop.
struct GateGuard<'a> {
    symbols: &'a OwnerSymbols,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.symbols.leave_gate();
    }
}

type OwnerMap = HashMap<UnitName, Arc<OwnerSymbols>>;

/// Registry of required and resolved symbols, keyed by (module, owner).
#[derive(Default)]
pub struct SymbolRegistry {
    modules: RwLock<HashMap<ModuleId, Arc<RwLock<OwnerMap>>>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn module(&self, module: &ModuleId) -> Option<Arc<RwLock<OwnerMap>>> {
        let modules = self.modules.read().expect("module map poisoned");
        modules.get(module).cloned()
    }

    fn module_or_insert(&self, module: &ModuleId) -> Arc<RwLock<OwnerMap>> {
        if let Some(owners) = self.module(module) {
            return owners;
        }
        let mut modules = self.modules.write().expect("module map poisoned");
        Arc::clone(modules.entry(module.clone()).or_default())
    }

    fn owner(&self, module: &ModuleId, owner: &UnitName) -> Option<Arc<OwnerSymbols>> {
        let owners = self.module(module)?;
        let owners = owners.read().expect("owner map poisoned");
        owners.get(owner).cloned()
    }

    fn owner_or_insert(&self, module: &ModuleId, owner: &UnitName) -> Arc<OwnerSymbols> {
        let owners = self.module_or_insert(module);
        {
            let owners = owners.read().expect("owner map poisoned");
            if let Some(symbols) = owners.get(owner) {
                return Arc::clone(symbols);
            }
        }
        let mut owners = owners.write().expect("owner map poisoned");
        Arc::clone(owners.entry(owner.clone()).or_default())
    }

    /// Whether the module has any registered owner. Used by the binder to
    /// distinguish an unconfigured module from an undiscovered owner.
    pub fn has_module(&self, module: &ModuleId) -> bool {
        self.module(module).is_some()
    }

    pub fn has_owner(&self, module: &ModuleId, owner: &UnitName) -> bool {
        self.owner(module, owner).is_some()
    }

    /// Idempotently records one required descriptor, creating module and
    /// owner entries on demand. Safe under arbitrary concurrent callers.
    pub fn register(&self, module: &ModuleId, owner: &UnitName, descriptor: SymbolDescriptor) {
        let symbols = self.owner_or_insert(module, owner);
        let mut required = symbols.required.lock().expect("required set poisoned");
        required.insert(descriptor);
    }

    /// Read-only snapshot of still-required descriptors for one owner.
    pub fn required(&self, module: &ModuleId, owner: &UnitName) -> BTreeSet<SymbolDescriptor> {
        match self.owner(module, owner) {
            Some(symbols) => symbols
                .required
                .lock()
                .expect("required set poisoned")
                .clone(),
            None => BTreeSet::new(),
        }
    }

    /// All owners registered for a module.
    pub fn owners(&self, module: &ModuleId) -> Vec<UnitName> {
        match self.module(module) {
            Some(owners) => {
                let owners = owners.read().expect("owner map poisoned");
                owners.keys().cloned().collect()
            }
            None => Vec::new(),
        }
    }

    /// Whether all required descriptors of the owner have been resolved.
    pub fn is_ready(&self, module: &ModuleId, owner: &UnitName) -> bool {
        self.owner(module, owner)
            .map(|symbols| symbols.ready.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Resolves every still-required descriptor of a now-loaded owner.
    ///
    /// Concurrent invocations serialize behind a per-owner gate: a late
    /// entrant waits until the resolving thread has stored every binding
    /// and published readiness, so a ready owner always answers `binding`
    /// for each registered descriptor. The gate is re-entrant on the
    /// resolving thread, and each descriptor is removed from `required`
    /// before it is resolved, so a nested activation (e.g. resolution of
    /// one member triggering a load that activates the same owner)
    /// resolves each descriptor exactly once. Any single resolution
    /// failure is fatal for the owner.
    pub fn resolve_all(
        &self,
        module: &ModuleId,
        owner: &UnitName,
        lookup: &dyn ModuleLookup,
    ) -> Result<(), RegistryError> {
        let symbols = self
            .owner(module, owner)
            .ok_or_else(|| RegistryError::OwnerNotRegistered {
                module: module.clone(),
                owner: owner.clone(),
            })?;

        if symbols.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        let gate = symbols.enter_gate();
        if symbols.ready.load(Ordering::Acquire) {
            return Ok(());
        }

        while let Some(descriptor) = symbols.take_required() {
            let binding = lookup.resolve(owner, &descriptor).map_err(|cause| {
                RegistryError::Resolution {
                    module: module.clone(),
                    owner: owner.clone(),
                    descriptor: descriptor.clone(),
                    cause,
                }
            })?;
            let mut resolved = symbols.resolved.write().expect("resolved map poisoned");
            resolved.insert(descriptor, binding);
        }

        // Only the gate holder publishes readiness; a re-entrant helper
        // returns before the outer drain has stored its in-flight binding.
        if gate.is_some() {
            symbols.ready.store(true, Ordering::Release);
            log::debug!("owner {owner} of module `{module}` is ready");
        }
        Ok(())
    }

    /// Pure read of one resolved binding.
    pub fn binding(
        &self,
        module: &ModuleId,
        owner: &UnitName,
        descriptor: &SymbolDescriptor,
    ) -> Option<Binding> {
        let symbols = self.owner(module, owner)?;
        let resolved = symbols.resolved.read().expect("resolved map poisoned");
        resolved.get(descriptor).cloned()
    }
}

/// Registry consistency errors. All fatal; the analysis phase and the
/// runtime are out of sync.
#[derive(Debug)]
pub enum RegistryError {
    OwnerNotRegistered {
        module: ModuleId,
        owner: UnitName,
    },
    Resolution {
        module: ModuleId,
        owner: UnitName,
        descriptor: SymbolDescriptor,
        cause: LookupError,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OwnerNotRegistered { module, owner } => {
                write!(
                    f,
                    "owner {owner} of module `{module}` was never registered during analysis"
                )
            }
            Self::Resolution {
                module,
                owner,
                descriptor,
                cause,
            } => {
                write!(
                    f,
                    "failed to resolve {descriptor} in owner {owner} of module `{module}`: {cause}"
                )
            }
        }
    }
}

impl Error for RegistryError {}
