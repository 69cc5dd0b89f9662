//! Token issuance.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bastion_claims::Claim;
use jsonwebtoken::{encode, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AuthError;
use crate::scheme::{TokenValidationPolicy, SIGNING_ALGORITHM};

/// Registered JWT claim names set by the issuer.
pub(crate) const REGISTERED_CLAIMS: [&str; 5] = ["iss", "aud", "iat", "nbf", "exp"];

/// An issued bearer token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityToken {
    /// Encoded JWT.
    pub access_token: String,
    /// Expiration timestamp (Unix seconds).
    pub expires_at: u64,
}

impl std::fmt::Debug for SecurityToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Signs claim lists into bearer tokens accepted by the configured scheme.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    policy: Arc<TokenValidationPolicy>,
    lifetime: Duration,
}

impl TokenIssuer {
    /// Creates an issuer signing with `policy`'s key, issuer and audience.
    pub fn new(policy: Arc<TokenValidationPolicy>, lifetime: Duration) -> Self {
        Self { policy, lifetime }
    }

    /// Lifetime of issued tokens.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues a token carrying `claims`.
    ///
    /// A claim type appearing more than once becomes a JSON array, in claim
    /// order. User claims named like a registered claim are overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Token`] if signing fails.
    pub fn issue(&self, claims: &[Claim]) -> Result<SecurityToken, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| AuthError::Token(format!("system clock before epoch: {}", e)))?
            .as_secs();
        let expires_at = now.saturating_add(self.lifetime.as_secs());

        let mut payload = Map::new();
        for claim in claims {
            append_claim(&mut payload, claim);
        }
        payload.insert("iss".to_string(), Value::from(self.policy.issuer()));
        payload.insert("aud".to_string(), Value::from(self.policy.audience()));
        payload.insert("iat".to_string(), Value::from(now));
        payload.insert("nbf".to_string(), Value::from(now));
        payload.insert("exp".to_string(), Value::from(expires_at));

        let access_token = encode(
            &Header::new(SIGNING_ALGORITHM),
            &payload,
            &self.policy.encoding_key(),
        )
        .map_err(|e| AuthError::Token(e.to_string()))?;

        Ok(SecurityToken {
            access_token,
            expires_at,
        })
    }
}

fn append_claim(payload: &mut Map<String, Value>, claim: &Claim) {
    let value = Value::from(claim.value.as_str());
    match payload.get_mut(&claim.claim_type) {
        None => {
            payload.insert(claim.claim_type.clone(), value);
        },
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        },
    }
}
