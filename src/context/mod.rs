//! # Context Module
//!
//! Typed dependency injection for handlers and resource instances.
//!
//! Values are stored type-erased as [`ContextValue`] (an `Arc<dyn Any>` wrapping an
//! `Arc<T>`), keyed by [`ContextKey`]. `T` may be unsized, so trait objects such as
//! `dyn Serializer` are registered and resolved directly.
//!
//! - [`ContextRegistry`] - process-wide, lazily populated singletons
//! - [`ContextMap`] - per-request values (request, response, request id) checked first

mod registry;

pub use registry::{ContextProvider, ContextRegistry};

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Type-erased context value holding an `Arc<T>`.
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// Wrap an `Arc<T>` for storage.
pub fn context_value<T>(value: Arc<T>) -> ContextValue
where
    T: ?Sized + Send + Sync + 'static,
{
    Arc::new(value)
}

/// Recover the `Arc<T>` stored by [`context_value`].
#[must_use]
pub fn downcast_context<T: ?Sized + 'static>(value: &ContextValue) -> Option<Arc<T>> {
    value.downcast_ref::<Arc<T>>().cloned()
}

/// Runtime identity of a context type.
#[derive(Debug, Clone, Copy)]
pub struct ContextKey {
    id: TypeId,
    name: &'static str,
}

impl ContextKey {
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ContextKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ContextKey {}

impl Hash for ContextKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Values scoped to one request.
#[derive(Default, Clone)]
pub struct ContextMap {
    entries: HashMap<TypeId, ContextValue>,
}

impl ContextMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T>(&mut self, value: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.entries
            .insert(TypeId::of::<T>(), context_value(value));
    }

    #[must_use]
    pub fn get(&self, key: &ContextKey) -> Option<ContextValue> {
        self.entries.get(&key.id()).map(Arc::clone)
    }
}
