//! Claims error types.

use thiserror::Error;

/// Boxed error returned by fallible claim accessors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while resolving claim types or assembling claims.
#[derive(Debug, Error)]
pub enum ClaimsError {
    /// Claim type catalog not loaded, or identity type outside the known set.
    #[error("unknown id type: {0}")]
    UnknownIdType(String),

    /// A claim accessor failed for the bound user.
    #[error("failed to extract claim '{claim_type}': {source}")]
    ClaimExtraction {
        /// Claim type that was being produced.
        claim_type: String,
        /// Underlying accessor failure.
        #[source]
        source: BoxError,
    },
}
