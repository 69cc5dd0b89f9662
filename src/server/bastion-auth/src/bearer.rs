//! Bearer token authentication backend.
//!
//! Validates JWT tokens issued under the configured [`TokenValidationPolicy`].

use std::sync::Arc;

use async_trait::async_trait;
use bastion_claims::Claim;
use jsonwebtoken::decode;
use jsonwebtoken::errors::ErrorKind;
use serde_json::{Map, Value};
use tracing::debug;

use crate::context::AuthContext;
use crate::error::AuthError;
use crate::scheme::TokenValidationPolicy;
use crate::token::REGISTERED_CLAIMS;

/// Trait for authentication backends.
///
/// Implementations validate tokens and return an [`AuthContext`] on success.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Validates the given token and returns the authentication context.
    ///
    /// # Arguments
    ///
    /// * `token` - The bearer token, with or without the `Bearer ` prefix
    ///
    /// # Returns
    ///
    /// * `Ok(AuthContext)` - If the token is valid
    /// * `Err(AuthError)` - If validation fails
    async fn validate(&self, token: &str) -> Result<AuthContext, AuthError>;

    /// Returns the name of this backend for logging/debugging.
    fn name(&self) -> &'static str;
}

/// Authentication backend for bearer JWT tokens.
///
/// Tokens must be signed with HS256 under the shared secret and carry the
/// configured issuer and audience.
pub struct JwtBearerBackend {
    policy: Arc<TokenValidationPolicy>,
    subject_claim: Option<String>,
}

impl JwtBearerBackend {
    /// Creates a backend validating against `policy`.
    pub fn new(policy: Arc<TokenValidationPolicy>) -> Self {
        Self {
            policy,
            subject_claim: None,
        }
    }

    /// Reads the subject from `claim_type` instead of `sub`.
    pub fn with_subject_claim(mut self, claim_type: impl Into<String>) -> Self {
        self.subject_claim = Some(claim_type.into());
        self
    }
}

#[async_trait]
impl AuthBackend for JwtBearerBackend {
    async fn validate(&self, token: &str) -> Result<AuthContext, AuthError> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let token_data = decode::<Map<String, Value>>(
            token,
            &self.policy.decoding_key(),
            &self.policy.validation(),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            kind => {
                debug!(error = ?kind, "Rejected bearer token");
                AuthError::InvalidCredentials
            },
        })?;

        let payload = token_data.claims;
        let expires_at = payload.get("exp").and_then(Value::as_u64);

        let mut claims = Vec::new();
        for (claim_type, value) in &payload {
            if REGISTERED_CLAIMS.contains(&claim_type.as_str()) {
                continue;
            }
            match value {
                Value::Array(values) => {
                    claims.extend(values.iter().map(|v| Claim::new(claim_type.clone(), plain(v))));
                },
                other => claims.push(Claim::new(claim_type.clone(), plain(other))),
            }
        }

        let subject = self
            .subject_claim
            .as_deref()
            .and_then(|claim_type| payload.get(claim_type))
            .or_else(|| payload.get("sub"))
            .map(|value| match value {
                Value::Array(values) => values.first().map(plain).unwrap_or_default(),
                other => plain(other),
            });

        Ok(AuthContext {
            subject,
            claims,
            scheme: self.policy.scheme().to_string(),
            expires_at,
        })
    }

    fn name(&self) -> &'static str {
        "jwt-bearer"
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
