//! Authentication context types.

use bastion_claims::Claim;
use serde::{Deserialize, Serialize};

/// Authenticated caller context.
///
/// Built from a validated bearer token and passed to handlers after
/// successful authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// User identifier carried by the token, if any.
    pub subject: Option<String>,

    /// Non-registered claims carried by the token, ordered by claim type.
    /// Values of one type keep their issued order.
    pub claims: Vec<Claim>,

    /// Scheme that authenticated the request.
    pub scheme: String,

    /// Token expiration timestamp (Unix seconds).
    pub expires_at: Option<u64>,
}

impl AuthContext {
    /// First value of the claim of `claim_type`.
    pub fn claim(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    /// All values of the claim of `claim_type`.
    pub fn claims_of<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.claims
            .iter()
            .filter(move |c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    /// Whether the context carries `claim_type` with `value`.
    pub fn has_claim(&self, claim_type: &str, value: &str) -> bool {
        self.claims
            .iter()
            .any(|c| c.claim_type == claim_type && c.value == value)
    }
}
