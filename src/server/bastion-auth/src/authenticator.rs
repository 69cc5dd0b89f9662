//! Authenticator traits and the Argon2 password authenticator.
//!
//! Authenticators decide whether a login attempt is genuine. The host
//! supplies them (or uses [`PasswordHashAuthenticator`]); the registration
//! builder only wires them into the service registry.

use std::collections::HashMap;
use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use async_trait::async_trait;
use bastion_claims::AuthenticationUser;
use serde::Deserialize;
use tracing::debug;

use crate::error::AuthError;

/// Login request for the default credential flow.
#[derive(Clone, Deserialize)]
pub struct UserCredentials {
    /// User identifier.
    pub id: String,
    /// Plain-text password.
    pub password: String,
}

impl UserCredentials {
    /// Creates a login request.
    pub fn new(id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("id", &self.id)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Authenticator for the default id/password flow.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns whether the credentials identify a valid user.
    async fn is_valid_user(&self, credentials: &UserCredentials) -> Result<bool, AuthError>;
}

/// Authenticator for a custom or provider-specific user model.
#[async_trait]
pub trait UserAuthenticator<U: AuthenticationUser>: Send + Sync {
    /// Returns whether the user model identifies a valid user.
    async fn is_valid_user(&self, user: &U) -> Result<bool, AuthError>;
}

/// Callback returning the stored Argon2 PHC hash for a user id.
pub type CredentialHashFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Default [`Authenticator`] verifying passwords against Argon2 hashes.
///
/// Hash lookup goes through a callback so the authenticator stays decoupled
/// from wherever the host keeps its users.
#[derive(Clone)]
pub struct PasswordHashAuthenticator {
    lookup: CredentialHashFn,
}

impl PasswordHashAuthenticator {
    /// Creates an authenticator over a hash lookup callback.
    pub fn new(lookup: CredentialHashFn) -> Self {
        Self { lookup }
    }

    /// Creates an authenticator over a fixed id-to-hash map.
    pub fn with_static_hashes(hashes: HashMap<String, String>) -> Self {
        Self::new(Arc::new(move |id: &str| hashes.get(id).cloned()))
    }
}

#[async_trait]
impl Authenticator for PasswordHashAuthenticator {
    async fn is_valid_user(&self, credentials: &UserCredentials) -> Result<bool, AuthError> {
        let Some(hash) = (self.lookup)(&credentials.id) else {
            debug!(user = %credentials.id, "No password hash stored for user");
            return Ok(false);
        };

        let parsed_hash = PasswordHash::new(&hash).map_err(|_| {
            AuthError::Configuration(format!(
                "invalid password hash stored for user {}",
                credentials.id
            ))
        })?;

        Ok(Argon2::default()
            .verify_password(credentials.password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}
