//! Claim value type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single fact about an authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
    /// Claim type (usually a canonical URI or a short JWT claim name).
    pub claim_type: String,
    /// Claim value.
    pub value: String,
}

impl Claim {
    /// Creates a new claim.
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.claim_type, self.value)
    }
}
