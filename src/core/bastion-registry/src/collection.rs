//! In-memory service registry.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::registry::{ErasedService, Lifetime, ScopedFactory, ServiceKey, ServiceRegistry};

/// Describes one registration, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Type name of the registered service.
    pub service: &'static str,
    /// Registration lifetime.
    pub lifetime: Lifetime,
}

#[derive(Clone)]
enum Provider {
    Singleton(ErasedService),
    Scoped(ScopedFactory),
}

impl Provider {
    fn lifetime(&self) -> Lifetime {
        match self {
            Provider::Singleton(_) => Lifetime::Singleton,
            Provider::Scoped(_) => Lifetime::Scoped,
        }
    }

    fn instance(&self) -> ErasedService {
        match self {
            Provider::Singleton(instance) => Arc::clone(instance),
            Provider::Scoped(factory) => factory(),
        }
    }
}

struct Registration {
    key: ServiceKey,
    provider: Provider,
}

/// Thread-safe, in-memory [`ServiceRegistry`].
///
/// Registrations are kept in order; resolving a service returns the most
/// recent registration for its type. Scoped services are built fresh on every
/// resolution; caching them per scope is left to the host.
#[derive(Default)]
pub struct ServiceCollection {
    registrations: RwLock<Vec<Registration>>,
}

impl ServiceCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, key: ServiceKey, provider: Provider) {
        debug!(service = key.name(), lifetime = ?provider.lifetime(), "Registering service");
        self.registrations.write().push(Registration { key, provider });
    }

    fn last_provider(&self, key: ServiceKey) -> Option<Provider> {
        self.registrations
            .read()
            .iter()
            .rev()
            .find(|r| r.key == key)
            .map(|r| r.provider.clone())
    }

    /// Number of registrations for service type `T`.
    pub fn count<T: ?Sized + 'static>(&self) -> usize {
        let key = ServiceKey::of::<T>();
        self.registrations
            .read()
            .iter()
            .filter(|r| r.key == key)
            .count()
    }

    /// Whether service type `T` has at least one registration.
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.count::<T>() > 0
    }

    /// All registrations in order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.registrations
            .read()
            .iter()
            .map(|r| ServiceDescriptor {
                service: r.key.name(),
                lifetime: r.provider.lifetime(),
            })
            .collect()
    }

    /// Total number of registrations.
    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.registrations.read().is_empty()
    }
}

impl ServiceRegistry for ServiceCollection {
    fn register_singleton_erased(&self, key: ServiceKey, instance: ErasedService) {
        self.push(key, Provider::Singleton(instance));
    }

    fn register_scoped_erased(&self, key: ServiceKey, factory: ScopedFactory) {
        self.push(key, Provider::Scoped(factory));
    }

    fn resolve_erased(&self, key: ServiceKey) -> Option<ErasedService> {
        // Lock is released before a scoped factory runs, so factories may
        // resolve their own dependencies.
        let provider = self.last_provider(key)?;
        Some(provider.instance())
    }
}

impl std::fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCollection")
            .field("registrations", &self.descriptors())
            .finish()
    }
}
