//! Privileged lookup contexts, bindings and the invocation value model.
//!
//! # Responsibility
//! - Define the contract the external module-lookup collaborator satisfies.
//! - Carry resolved bindings as opaque, directly invocable references.
//! - Keep one installed lookup context per module (install-once).
//!
//! # Invariants
//! - A binding stays tied to the lookup context that produced it.
//! - A module's lookup context is installed at most once.

use crate::model::descriptor::SymbolDescriptor;
use crate::model::name::{ModuleId, UnitName};
use std::any::Any;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Minimal argument/result model for invoking bindings.
#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Str(String),
    Ref(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn obj<T: Any + Send + Sync>(value: T) -> Self {
        Self::Ref(Arc::new(value))
    }
}

type BindingFn = dyn Fn(&[Value]) -> Result<Value, InvokeError> + Send + Sync;

/// Opaque, directly invocable reference to a resolved symbol.
#[derive(Clone)]
pub struct Binding {
    invoke: Arc<BindingFn>,
}

impl Binding {
    pub fn new(invoke: impl Fn(&[Value]) -> Result<Value, InvokeError> + Send + Sync + 'static) -> Self {
        Self {
            invoke: Arc::new(invoke),
        }
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, InvokeError> {
        (self.invoke)(args)
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Binding(..)")
    }
}

/// Resolved class reference exposing a reusable instance check.
#[derive(Clone)]
pub struct ClassRef {
    name: UnitName,
    check: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
}

impl ClassRef {
    pub fn new(name: UnitName, check: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name,
            check: Arc::new(check),
        }
    }

    /// Convenience constructor checking `Value::Ref` payloads by type.
    pub fn of_type<T: Any + Send + Sync>(name: UnitName) -> Self {
        Self::new(name, |value| match value {
            Value::Ref(obj) => obj.downcast_ref::<T>().is_some(),
            _ => false,
        })
    }

    pub fn name(&self) -> &UnitName {
        &self.name
    }

    pub fn is_instance(&self, value: &Value) -> bool {
        (self.check)(value)
    }
}

impl std::fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ClassRef({})", self.name)
    }
}

/// Privileged per-module lookup capability, supplied by the host.
///
/// `ensure_loaded` must force the owning unit into its loaded state; the
/// registry's resolve-all runs as part of that activation (or is run by the
/// binder right after, idempotently).
pub trait ModuleLookup: Send + Sync {
    /// Forces the owning unit to be loaded and activated.
    fn ensure_loaded(&self, owner: &UnitName) -> Result<(), LookupError>;

    /// Resolves one descriptor against the real, loaded owner.
    fn resolve(&self, owner: &UnitName, descriptor: &SymbolDescriptor)
        -> Result<Binding, LookupError>;

    /// Resolves a class reference for dynamic instance checks.
    fn find_class(&self, owner: &UnitName) -> Result<ClassRef, LookupError>;
}

/// Supplies the privileged lookup context for one module.
pub trait LookupProvider: Send + Sync {
    fn lookup_for(&self, module: &ModuleId) -> Result<Arc<dyn ModuleLookup>, LookupError>;
}

struct InstalledLookup {
    context_id: Uuid,
    lookup: Arc<dyn ModuleLookup>,
}

/// Install-once registry of per-module lookup contexts.
#[derive(Default)]
pub struct LookupRegistry {
    contexts: RwLock<HashMap<ModuleId, InstalledLookup>>,
}

impl LookupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the lookup context for a module.
    ///
    /// Returns the diagnostic context id. A second install for the same
    /// module is rejected.
    pub fn install(
        &self,
        module: ModuleId,
        lookup: Arc<dyn ModuleLookup>,
    ) -> Result<Uuid, LookupError> {
        let mut contexts = self.contexts.write().expect("lookup registry poisoned");
        if contexts.contains_key(&module) {
            return Err(LookupError::AlreadyInstalled(module));
        }
        let context_id = Uuid::new_v4();
        log::info!(
            "installed lookup context {context_id} for module `{module}`"
        );
        contexts.insert(module, InstalledLookup { context_id, lookup });
        Ok(context_id)
    }

    /// Diagnostic context id for an installed module, if any.
    pub fn context_id(&self, module: &ModuleId) -> Option<Uuid> {
        let contexts = self.contexts.read().expect("lookup registry poisoned");
        contexts.get(module).map(|entry| entry.context_id)
    }
}

impl LookupProvider for LookupRegistry {
    fn lookup_for(&self, module: &ModuleId) -> Result<Arc<dyn ModuleLookup>, LookupError> {
        let contexts = self.contexts.read().expect("lookup registry poisoned");
        contexts
            .get(module)
            .map(|entry| Arc::clone(&entry.lookup))
            .ok_or_else(|| LookupError::NotInstalled(module.clone()))
    }
}

/// Lookup context errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    AlreadyInstalled(ModuleId),
    NotInstalled(ModuleId),
    UnitNotLoadable { owner: UnitName, reason: String },
    SymbolAbsent { owner: UnitName, member: String },
}

impl Display for LookupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyInstalled(module) => {
                write!(f, "lookup context for module `{module}` is already installed")
            }
            Self::NotInstalled(module) => {
                write!(f, "lookup context for module `{module}` is not installed")
            }
            Self::UnitNotLoadable { owner, reason } => {
                write!(f, "owning unit `{owner}` could not be loaded: {reason}")
            }
            Self::SymbolAbsent { owner, member } => {
                write!(f, "symbol `{member}` is absent from loaded unit `{owner}`")
            }
        }
    }
}

impl Error for LookupError {}

/// Binding invocation errors surfaced by host-supplied closures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    ArityMismatch { expected: usize, got: usize },
    TypeMismatch(String),
    Failed(String),
}

impl Display for InvokeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArityMismatch { expected, got } => {
                write!(f, "binding expected {expected} arguments, got {got}")
            }
            Self::TypeMismatch(detail) => write!(f, "binding argument type mismatch: {detail}"),
            Self::Failed(detail) => write!(f, "binding invocation failed: {detail}"),
        }
    }
}

impl Error for InvokeError {}

#[cfg(test)]
mod tests {
    use super::{Binding, ClassRef, InvokeError, LookupError, LookupRegistry, ModuleLookup, Value};
    use super::LookupProvider;
    use crate::model::descriptor::SymbolDescriptor;
    use crate::model::name::{ModuleId, UnitName};
    use std::sync::Arc;

    struct NullLookup;

    impl ModuleLookup for NullLookup {
        fn ensure_loaded(&self, _owner: &UnitName) -> Result<(), LookupError> {
            Ok(())
        }

        fn resolve(
            &self,
            owner: &UnitName,
            descriptor: &SymbolDescriptor,
        ) -> Result<super::Binding, LookupError> {
            Err(LookupError::SymbolAbsent {
                owner: owner.clone(),
                member: descriptor.to_string(),
            })
        }

        fn find_class(&self, owner: &UnitName) -> Result<ClassRef, LookupError> {
            Ok(ClassRef::new(owner.clone(), |_| false))
        }
    }

    #[test]
    fn installs_lookup_context_once() {
        let registry = LookupRegistry::new();
        let module = ModuleId::new("demo").expect("module id");
        registry
            .install(module.clone(), Arc::new(NullLookup))
            .expect("first install");
        let err = registry
            .install(module.clone(), Arc::new(NullLookup))
            .expect_err("second install must fail");
        assert_eq!(err, LookupError::AlreadyInstalled(module));
    }

    #[test]
    fn lookup_for_uninstalled_module_fails() {
        let registry = LookupRegistry::new();
        let module = ModuleId::new("absent").expect("module id");
        let err = registry
            .lookup_for(&module)
            .err()
            .expect("uninstalled lookup must fail");
        assert_eq!(err, LookupError::NotInstalled(module));
    }

    #[test]
    fn binding_invokes_underlying_closure() {
        let binding = Binding::new(|args| match args {
            [Value::Int(a), Value::Int(b)] => Ok(Value::Int(a + b)),
            _ => Err(InvokeError::TypeMismatch("expected two ints".to_string())),
        });
        let out = binding
            .invoke(&[Value::Int(2), Value::Int(3)])
            .expect("binding invocation");
        assert!(matches!(out, Value::Int(5)));
    }

    #[test]
    fn class_ref_checks_payload_type() {
        struct Widget;
        let name = UnitName::new("demo/Widget").expect("unit name");
        let class_ref = ClassRef::of_type::<Widget>(name);
        assert!(class_ref.is_instance(&Value::obj(Widget)));
        assert!(!class_ref.is_instance(&Value::Int(1)));
    }
}
