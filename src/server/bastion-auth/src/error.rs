//! Authentication error types.

use bastion_claims::ClaimsError;
use bastion_registry::RegistryError;
use thiserror::Error;

use crate::provider::Provider;

/// Errors that can occur during security registration or authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid credentials (bad token, wrong password, etc.).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token has expired.
    #[error("token expired")]
    TokenExpired,

    /// Missing authentication token.
    #[error("missing authentication token")]
    MissingToken,

    /// A setting required to configure security is absent.
    #[error("missing required setting: {setting}")]
    MissingRequiredSetting {
        /// Name of the missing setting.
        setting: String,
    },

    /// Two different authenticator types were bound to one provider.
    #[error("conflicting authenticators for provider {provider}: {first} and {second}")]
    DuplicateProviderAuthenticatorType {
        /// Provider being registered.
        provider: Provider,
        /// First authenticator type bound.
        first: &'static str,
        /// Conflicting authenticator type.
        second: &'static str,
    },

    /// A provider registration carried no authenticator.
    #[error("no authenticator supplied for provider {provider}")]
    MissingAuthenticator {
        /// Provider being registered.
        provider: Provider,
    },

    /// The bearer token scheme has not been configured.
    #[error("bearer token scheme not configured")]
    SchemeNotConfigured,

    /// Backend configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Token encoding failed.
    #[error("token error: {0}")]
    Token(String),

    /// Claims assembly failed.
    #[error(transparent)]
    Claims(#[from] ClaimsError),

    /// Service resolution failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl AuthError {
    pub(crate) fn missing(setting: impl Into<String>) -> Self {
        AuthError::MissingRequiredSetting {
            setting: setting.into(),
        }
    }
}
