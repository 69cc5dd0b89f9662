//! Registry error types.

use thiserror::Error;

/// Errors that can occur when resolving services.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No registration exists for the requested service.
    #[error("service not registered: {0}")]
    NotRegistered(&'static str),
}
