//! # Bastion Registry
//!
//! Service registry abstraction used to wire authentication services at
//! application startup.
//!
//! Provides the [`ServiceRegistry`] trait the host implements (or adapts its
//! own container to), plus [`ServiceCollection`], an in-memory implementation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod collection;
pub mod error;
pub mod registry;

pub use collection::{ServiceCollection, ServiceDescriptor};
pub use error::RegistryError;
pub use registry::{
    ErasedService, Lifetime, ScopedFactory, ServiceKey, ServiceRegistry, ServiceRegistryExt,
};
