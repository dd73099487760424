use super::{ContextKey, ContextValue};
use crate::error::RestError;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::any::TypeId;
use std::sync::Arc;
use tracing::{debug, error};

/// Lookup consulted before the registry's own entries.
pub trait ContextProvider: Send + Sync {
    fn provide(&self, key: &ContextKey) -> Option<ContextValue>;
}

type Factory = Box<dyn Fn(&ContextRegistry) -> Result<ContextValue, RestError> + Send + Sync>;

struct ContextSlot {
    key: ContextKey,
    cell: OnceCell<ContextValue>,
    factory: Option<Factory>,
}

impl ContextSlot {
    fn resolve(&self, registry: &ContextRegistry) -> Result<ContextValue, RestError> {
        self.cell
            .get_or_try_init(|| match &self.factory {
                Some(factory) => {
                    debug!(context = self.key.name(), "constructing context value");
                    factory(registry)
                }
                None => {
                    error!(context = self.key.name(), "context declared without a constructor");
                    Err(RestError::configuration(
                        self.key.name(),
                        "declared without an instance or a zero-argument constructor",
                    ))
                }
            })
            .map(Arc::clone)
    }
}

/// Typed singleton store used for argument injection and collaborator lookup.
///
/// Each entry is an instance, a constructor run once on first resolution, or a bare
/// declaration that fails to resolve. Resolved values are cached for the lifetime of
/// the registry; first resolution of a type is serialized by its cell.
#[derive(Default)]
pub struct ContextRegistry {
    slots: DashMap<TypeId, Arc<ContextSlot>>,
    extra: RwLock<Option<Arc<dyn ContextProvider>>>,
}

impl ContextRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn put(&self, key: ContextKey, cell: OnceCell<ContextValue>, factory: Option<Factory>) {
        self.slots.insert(
            key.id(),
            Arc::new(ContextSlot {
                key,
                cell,
                factory,
            }),
        );
    }

    /// Register a ready instance, replacing any previous entry for `T`.
    pub fn insert<T>(&self, value: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.put(
            ContextKey::of::<T>(),
            OnceCell::with_value(super::context_value(value)),
            None,
        );
    }

    /// Register a constructor run at most once, on first resolution.
    pub fn insert_factory<T, F>(&self, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ContextRegistry) -> Result<Arc<T>, RestError> + Send + Sync + 'static,
    {
        self.put(
            ContextKey::of::<T>(),
            OnceCell::new(),
            Some(Box::new(move |registry| {
                factory(registry).map(super::context_value)
            })),
        );
    }

    /// Register `T` to be built with `T::default()` on first resolution.
    pub fn insert_default<T>(&self)
    where
        T: Default + Send + Sync + 'static,
    {
        self.insert_factory::<T, _>(|_| Ok(Arc::new(T::default())));
    }

    /// Mark `T` as known but not constructible; resolving it is a configuration error.
    pub fn declare<T: ?Sized + 'static>(&self) {
        self.put(ContextKey::of::<T>(), OnceCell::new(), None);
    }

    /// Remove the entry for `T`. Returns whether one existed.
    pub fn remove<T: ?Sized + 'static>(&self) -> bool {
        self.slots.remove(&TypeId::of::<T>()).is_some()
    }

    #[must_use]
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.contains_key(&ContextKey::of::<T>())
    }

    #[must_use]
    pub fn contains_key(&self, key: &ContextKey) -> bool {
        self.slots.contains_key(&key.id())
    }

    /// True once the entry for `T` holds a value.
    #[must_use]
    pub fn is_resolved<T: ?Sized + 'static>(&self) -> bool {
        self.slots
            .get(&TypeId::of::<T>())
            .is_some_and(|slot| slot.cell.get().is_some())
    }

    /// Install or clear the provider consulted before the registry.
    pub fn set_extra_provider(&self, provider: Option<Arc<dyn ContextProvider>>) {
        *self.extra.write() = provider;
    }

    /// Resolve `T`, constructing and caching it on first use.
    ///
    /// `Ok(None)` means nothing is registered for `T`.
    pub fn resolve<T: ?Sized + 'static>(&self) -> Result<Option<Arc<T>>, RestError> {
        let key = ContextKey::of::<T>();
        match self.resolve_key(&key)? {
            Some(value) => super::downcast_context::<T>(&value).map(Some).ok_or_else(|| {
                RestError::configuration(key.name(), "registered value has a different type")
            }),
            None => Ok(None),
        }
    }

    /// Resolve by runtime key, returning the type-erased value.
    pub fn resolve_key(&self, key: &ContextKey) -> Result<Option<ContextValue>, RestError> {
        let extra = self.extra.read().clone();
        if let Some(value) = extra.and_then(|provider| provider.provide(key)) {
            return Ok(Some(value));
        }
        let slot = self.slots.get(&key.id()).map(|slot| Arc::clone(slot.value()));
        match slot {
            Some(slot) => slot.resolve(self).map(Some),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&'static str> = self.slots.iter().map(|s| s.key.name()).collect();
        f.debug_struct("ContextRegistry")
            .field("entries", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Clock;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[test]
    fn test_default_entry_is_built_once() {
        let registry = ContextRegistry::new();
        registry.insert_default::<Clock>();
        assert!(!registry.is_resolved::<Clock>());
        let a = registry.resolve::<Clock>().unwrap().unwrap();
        let b = registry.resolve::<Clock>().unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.is_resolved::<Clock>());
    }

    #[test]
    fn test_trait_object_entries() {
        let registry = ContextRegistry::new();
        registry.insert::<dyn Greeter>(Arc::new(English));
        let greeter = registry.resolve::<dyn Greeter>().unwrap().unwrap();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn test_declared_entry_is_a_configuration_error() {
        let registry = ContextRegistry::new();
        registry.declare::<Clock>();
        let err = registry.resolve::<Clock>().err().unwrap();
        assert!(matches!(err, RestError::Configuration { .. }));
        assert!(registry.resolve::<String>().unwrap().is_none());
    }

    #[test]
    fn test_factory_runs_once_under_contention() {
        let registry = Arc::new(ContextRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry.insert_factory::<Clock, _>(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Clock))
        });
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.resolve::<Clock>().unwrap().unwrap())
            })
            .collect();
        let first = registry.resolve::<Clock>().unwrap().unwrap();
        for handle in handles {
            assert!(Arc::ptr_eq(&first, &handle.join().unwrap()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_extra_provider_wins() {
        struct Fixed;
        impl ContextProvider for Fixed {
            fn provide(&self, key: &ContextKey) -> Option<ContextValue> {
                (key == &ContextKey::of::<String>())
                    .then(|| super::super::context_value(Arc::new("extra".to_string())))
            }
        }
        let registry = ContextRegistry::new();
        registry.insert(Arc::new("own".to_string()));
        registry.set_extra_provider(Some(Arc::new(Fixed)));
        assert_eq!(registry.resolve::<String>().unwrap().unwrap().as_str(), "extra");
        registry.set_extra_provider(None);
        assert_eq!(registry.resolve::<String>().unwrap().unwrap().as_str(), "own");
    }
}
