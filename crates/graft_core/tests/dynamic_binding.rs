//! End-to-end dynamic binding: analysis registration, lazy owner
//! activation, call-site inline caching and fatal misconfiguration paths.

use graft_core::{
    BindError, Binding, CallSite, CallSiteBinder, CallSiteError, ClassRef, InstanceOfSite,
    InvokeError, LookupError, LookupRegistry, ModuleId, ModuleLookup, SymbolDescriptor,
    SymbolKind, SymbolRegistry, UnitName, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Host-side stand-in for the loaded owner class `a/B`.
struct UnitB;

impl UnitB {
    fn foo() -> i64 {
        41 + 1
    }
}

/// Lookup context backed by the fake host world.
///
/// `ensure_loaded` models class activation; per its contract the registry's
/// resolve-all runs right after (idempotently) in the binder.
struct HostLookup {
    activations: AtomicUsize,
}

impl ModuleLookup for HostLookup {
    fn ensure_loaded(&self, owner: &UnitName) -> Result<(), LookupError> {
        if owner.as_internal() != "a/B" {
            return Err(LookupError::UnitNotLoadable {
                owner: owner.clone(),
                reason: "unknown unit".to_string(),
            });
        }
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn resolve(
        &self,
        owner: &UnitName,
        descriptor: &SymbolDescriptor,
    ) -> Result<Binding, LookupError> {
        match (descriptor.kind, descriptor.name.as_str()) {
            (SymbolKind::VirtualMethod, "foo") => {
                // Instance dispatch consumes a leading receiver argument.
                let arity = usize::from(descriptor.kind.is_instance());
                Ok(Binding::new(move |args| {
                    if args.len() != arity {
                        return Err(InvokeError::ArityMismatch {
                            expected: arity,
                            got: args.len(),
                        });
                    }
                    Ok(Value::Int(UnitB::foo()))
                }))
            }
            _ => Err(LookupError::SymbolAbsent {
                owner: owner.clone(),
                member: descriptor.to_string(),
            }),
        }
    }

    fn find_class(&self, owner: &UnitName) -> Result<ClassRef, LookupError> {
        Ok(ClassRef::of_type::<UnitB>(owner.clone()))
    }
}

fn module() -> ModuleId {
    ModuleId::new("P").expect("module id")
}

fn owner() -> UnitName {
    UnitName::from_dotted("a.B").expect("unit name")
}

fn world() -> (Arc<SymbolRegistry>, CallSiteBinder, Arc<HostLookup>) {
    let registry = Arc::new(SymbolRegistry::new());
    let lookups = Arc::new(LookupRegistry::new());
    let host = Arc::new(HostLookup {
        activations: AtomicUsize::new(0),
    });
    lookups
        .install(module(), Arc::clone(&host) as Arc<dyn ModuleLookup>)
        .expect("lookup install");
    let binder = CallSiteBinder::new(Arc::clone(&registry), lookups);
    (registry, binder, host)
}

#[test]
fn registered_descriptor_binds_and_invokes_the_owner_member() {
    let (registry, binder, host) = world();
    let descriptor = SymbolDescriptor::new(SymbolKind::VirtualMethod, "foo", "()V");
    registry.register(&module(), &owner(), descriptor.clone());

    let site = CallSite::new(module(), owner(), descriptor);
    let receiver = Value::obj(UnitB);
    let out = site
        .invoke(&binder, std::slice::from_ref(&receiver))
        .expect("bound invocation");
    assert!(matches!(out, Value::Int(42)));

    // Owner activated lazily, exactly once, on first execution.
    assert_eq!(host.activations.load(Ordering::SeqCst), 1);
    assert!(registry.is_ready(&module(), &owner()));

    // Later invocations bypass the binding algorithm.
    site.invoke(&binder, std::slice::from_ref(&receiver))
        .expect("cached invocation");
    assert_eq!(host.activations.load(Ordering::SeqCst), 1);
}

#[test]
fn unregistered_descriptor_fails_naming_member_and_owner() {
    let (registry, binder, _host) = world();
    registry.register(
        &module(),
        &owner(),
        SymbolDescriptor::new(SymbolKind::VirtualMethod, "foo", "()V"),
    );

    let site = CallSite::new(
        module(),
        owner(),
        SymbolDescriptor::new(SymbolKind::VirtualMethod, "bar", "()V"),
    );
    let err = site
        .invoke(&binder, &[])
        .expect_err("unregistered descriptor must fail");
    assert!(matches!(
        err,
        CallSiteError::Bind(BindError::SymbolNotDiscovered { .. })
    ));
    let message = err.to_string();
    assert!(message.contains("bar"), "message should name the member: {message}");
    assert!(message.contains("a/B"), "message should name the owner: {message}");
}

#[test]
fn module_without_any_registration_is_a_configuration_error() {
    let (_registry, binder, _host) = world();
    let site = CallSite::new(
        module(),
        owner(),
        SymbolDescriptor::new(SymbolKind::VirtualMethod, "foo", "()V"),
    );
    let err = site
        .invoke(&binder, &[])
        .expect_err("module with no registrations must fail");
    assert!(matches!(
        err,
        CallSiteError::Bind(BindError::ModuleNotConfigured(_))
    ));
}

#[test]
fn required_snapshot_feeds_the_injection_collaborator() {
    let (registry, _binder, _host) = world();
    let d1 = SymbolDescriptor::new(SymbolKind::VirtualMethod, "foo", "()V");
    let d2 = SymbolDescriptor::new(SymbolKind::StaticGetter, "limit", "I");
    registry.register(&module(), &owner(), d1.clone());
    registry.register(&module(), &owner(), d2.clone());

    let required = registry.required(&module(), &owner());
    assert!(required.contains(&d1));
    assert!(required.contains(&d2));
    assert_eq!(required.len(), 2);
    assert_eq!(registry.owners(&module()), vec![owner()]);
}

#[test]
fn instance_of_site_binds_class_once_and_checks_values() {
    let (_registry, binder, _host) = world();
    let site = InstanceOfSite::new(module(), owner());

    assert!(site
        .is_instance(&binder, &Value::obj(UnitB))
        .expect("instance check"));
    assert!(!site
        .is_instance(&binder, &Value::Int(5))
        .expect("instance check"));
}
