//! Service registry trait definition.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::RegistryError;

/// A type-erased service instance.
///
/// Holds an `Arc<T>` for the registered service type `T`.
pub type ErasedService = Arc<dyn Any + Send + Sync>;

/// Factory producing a fresh type-erased instance for scoped services.
pub type ScopedFactory = Arc<dyn Fn() -> ErasedService + Send + Sync>;

/// Identifies a registered service by its (possibly unsized) type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    type_id: TypeId,
    name: &'static str,
}

impl ServiceKey {
    /// Key for service type `T`, which may be a trait object.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Type name of the service.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// How long a registered service instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// One shared instance for the whole process.
    Singleton,
    /// A new instance for each resolution scope.
    Scoped,
}

/// Registry the authentication services are wired into.
///
/// Implementations must be safe to call from several startup paths at once.
pub trait ServiceRegistry: Send + Sync {
    /// Registers a shared instance.
    fn register_singleton_erased(&self, key: ServiceKey, instance: ErasedService);

    /// Registers a factory invoked once per scope.
    fn register_scoped_erased(&self, key: ServiceKey, factory: ScopedFactory);

    /// Returns an instance of the most recent registration for `key`.
    fn resolve_erased(&self, key: ServiceKey) -> Option<ErasedService>;
}

/// Typed helpers over [`ServiceRegistry`].
pub trait ServiceRegistryExt: ServiceRegistry {
    /// Registers `instance` as the singleton for service type `T`.
    fn register_singleton<T>(&self, instance: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register_singleton_erased(ServiceKey::of::<T>(), Arc::new(instance));
    }

    /// Registers `factory` as the scoped provider for service type `I`.
    fn register_scoped<I, F>(&self, factory: F)
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<I> + Send + Sync + 'static,
    {
        let erased: ScopedFactory = Arc::new(move || Arc::new(factory()) as ErasedService);
        self.register_scoped_erased(ServiceKey::of::<I>(), erased);
    }

    /// Resolves service type `T`.
    fn resolve<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve_erased(ServiceKey::of::<T>())?
            .downcast_ref::<Arc<T>>()
            .cloned()
    }

    /// Resolves service type `T`, failing if it is not registered.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] with the service type name.
    fn require<T>(&self) -> Result<Arc<T>, RegistryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.resolve::<T>()
            .ok_or(RegistryError::NotRegistered(std::any::type_name::<T>()))
    }
}

impl<R: ServiceRegistry + ?Sized> ServiceRegistryExt for R {}
