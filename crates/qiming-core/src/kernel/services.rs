use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Type-keyed registry of shared services handed to plugins.
///
/// Reference tables (stroke counts, five-element mappings, ...) are inserted
/// here by whoever builds the engine and looked up by plugins during
/// `initialize`/`process`. Tests substitute fakes by inserting a different
/// instance of the same type.
#[derive(Default, Clone)]
pub struct ServiceRegistry {
    // Keyed by the TypeId of the concrete service type
    instances: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    names: HashMap<TypeId, &'static str>,
}

impl ServiceRegistry {
    /// Create a new empty service registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service instance, replacing any previous instance of the same type.
    pub fn insert<T>(&mut self, instance: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        let type_id = TypeId::of::<T>();
        self.instances.insert(type_id, instance);
        self.names.insert(type_id, type_name::<T>());
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with<T>(mut self, instance: Arc<T>) -> Self
    where
        T: Any + Send + Sync,
    {
        self.insert(instance);
        self
    }

    /// Get a service instance by concrete type.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.instances
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|service| Arc::downcast::<T>(service).ok())
    }

    /// Check whether a service of type `T` is registered.
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.instances.contains_key(&TypeId::of::<T>())
    }

    /// Remove a service, returning it if present.
    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<Arc<T>> {
        let type_id = TypeId::of::<T>();
        self.names.remove(&type_id);
        self.instances
            .remove(&type_id)
            .and_then(|service| Arc::downcast::<T>(service).ok())
    }

    /// Number of registered services
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names.values().copied().collect();
        names.sort_unstable();
        f.debug_struct("ServiceRegistry").field("services", &names).finish()
    }
}
