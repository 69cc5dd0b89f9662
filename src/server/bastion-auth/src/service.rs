//! Security services.
//!
//! A security service is what a login endpoint calls: it asks the registered
//! authenticator whether the caller is genuine and, if so, issues a bearer
//! token carrying the caller's claims.

use std::fmt;
use std::sync::Arc;

use bastion_claims::{AuthenticationUser, Claim, ClaimsCustomizer};
use tracing::{debug, info};

use crate::authenticator::{Authenticator, UserAuthenticator, UserCredentials};
use crate::error::AuthError;
use crate::token::{SecurityToken, TokenIssuer};

/// Login service for the default id/password flow.
#[derive(Clone)]
pub struct SecurityService {
    authenticator: Arc<dyn Authenticator>,
    issuer: TokenIssuer,
    subject_claim_type: String,
}

impl SecurityService {
    /// Creates a service putting the user id under `subject_claim_type`.
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        issuer: TokenIssuer,
        subject_claim_type: impl Into<String>,
    ) -> Self {
        Self {
            authenticator,
            issuer,
            subject_claim_type: subject_claim_type.into(),
        }
    }

    /// Claim type carrying the user id.
    pub fn subject_claim_type(&self) -> &str {
        &self.subject_claim_type
    }

    /// Issues a token for `credentials` if the authenticator accepts them.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if the user is rejected, or
    /// any error raised by the authenticator or the token issuer.
    pub async fn generate_token(
        &self,
        credentials: &UserCredentials,
    ) -> Result<SecurityToken, AuthError> {
        if !self.authenticator.is_valid_user(credentials).await? {
            debug!(user = %credentials.id, "Rejected login");
            return Err(AuthError::InvalidCredentials);
        }

        let claims = [Claim::new(self.subject_claim_type.clone(), credentials.id.clone())];
        let token = self.issuer.issue(&claims)?;

        info!(user = %credentials.id, expires_at = token.expires_at, "Issued token");
        Ok(token)
    }
}

impl fmt::Debug for SecurityService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityService")
            .field("issuer", &self.issuer)
            .field("subject_claim_type", &self.subject_claim_type)
            .finish_non_exhaustive()
    }
}

/// Login service for a custom or provider user model.
pub struct UserSecurityService<U: AuthenticationUser> {
    authenticator: Arc<dyn UserAuthenticator<U>>,
    issuer: TokenIssuer,
    customizer: Option<ClaimsCustomizer<U>>,
}

impl<U: AuthenticationUser> UserSecurityService<U> {
    /// Creates a service; `customizer` decides the claims of issued tokens.
    pub fn new(
        authenticator: Arc<dyn UserAuthenticator<U>>,
        issuer: TokenIssuer,
        customizer: Option<ClaimsCustomizer<U>>,
    ) -> Self {
        Self {
            authenticator,
            issuer,
            customizer,
        }
    }

    /// Claims a token for `user` would carry, besides the registered ones.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Claims`] if an accessor of the customizer fails.
    pub fn claims_for(&self, user: &U) -> Result<Vec<Claim>, AuthError> {
        match &self.customizer {
            Some(customizer) => Ok(customizer.apply(user)?),
            None => Ok(Vec::new()),
        }
    }

    /// Issues a token for `user` if the authenticator accepts it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if the user is rejected,
    /// [`AuthError::Claims`] if claims assembly fails, or any error raised by
    /// the authenticator or the token issuer.
    pub async fn generate_token(&self, user: &U) -> Result<SecurityToken, AuthError> {
        if !self.authenticator.is_valid_user(user).await? {
            debug!(user_model = std::any::type_name::<U>(), "Rejected login");
            return Err(AuthError::InvalidCredentials);
        }

        let claims = self.claims_for(user)?;
        let token = self.issuer.issue(&claims)?;

        info!(
            user_model = std::any::type_name::<U>(),
            claims = claims.len(),
            expires_at = token.expires_at,
            "Issued token"
        );
        Ok(token)
    }
}

impl<U: AuthenticationUser> Clone for UserSecurityService<U> {
    fn clone(&self) -> Self {
        Self {
            authenticator: Arc::clone(&self.authenticator),
            issuer: self.issuer.clone(),
            customizer: self.customizer.clone(),
        }
    }
}

impl<U: AuthenticationUser> fmt::Debug for UserSecurityService<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSecurityService")
            .field("user_model", &std::any::type_name::<U>())
            .field("issuer", &self.issuer)
            .field("customized_claims", &self.customizer.is_some())
            .finish_non_exhaustive()
    }
}
