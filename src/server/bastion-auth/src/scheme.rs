//! Bearer token validation scheme.
//!
//! Establishes the single named policy every inbound bearer token is checked
//! against: HS256 signature with the shared secret, issuer, audience and
//! lifetime with a clock-skew tolerance. The policy is configured once per
//! [`RegistrationState`] and published to the service registry.

use std::sync::Arc;
use std::time::Duration;

use bastion_registry::{ServiceRegistry, ServiceRegistryExt};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Validation};
use tracing::{debug, info};

use crate::error::AuthError;
use crate::settings::{SecuritySettings, SigningSecret};
use crate::state::{Guarded, RegistrationFlag, RegistrationState};

/// Name of the bearer authentication scheme.
pub const BEARER_SCHEME: &str = "JwtBearer";

/// Signing algorithm used for issued and accepted tokens.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Token validation policy for the bearer scheme.
#[derive(Debug, Clone)]
pub struct TokenValidationPolicy {
    scheme: &'static str,
    signing_key: SigningSecret,
    issuer: String,
    audience: String,
    validate_lifetime: bool,
    clock_skew: Duration,
}

impl TokenValidationPolicy {
    /// Builds the policy from settings.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingRequiredSetting`] if the secret, issuer or
    /// audience is absent.
    pub fn from_settings(settings: &SecuritySettings) -> Result<Self, AuthError> {
        let (secret, issuer, audience) = settings.required()?;

        Ok(Self {
            scheme: BEARER_SCHEME,
            signing_key: secret.clone(),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            validate_lifetime: true,
            clock_skew: settings.clock_skew(),
        })
    }

    /// Scheme name.
    pub fn scheme(&self) -> &'static str {
        self.scheme
    }

    /// Accepted issuer.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Accepted audience.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Whether expiry and not-before are checked.
    pub fn validates_lifetime(&self) -> bool {
        self.validate_lifetime
    }

    /// Tolerance applied to lifetime checks.
    pub fn clock_skew(&self) -> Duration {
        self.clock_skew
    }

    /// Key for verifying token signatures.
    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(self.signing_key.as_bytes())
    }

    /// Key for signing issued tokens.
    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(self.signing_key.as_bytes())
    }

    /// `jsonwebtoken` validation rules equivalent to this policy.
    pub fn validation(&self) -> Validation {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_exp = self.validate_lifetime;
        validation.validate_nbf = self.validate_lifetime;
        validation.leeway = self.clock_skew.as_secs();
        validation
    }
}

/// Configures the bearer token scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSchemeConfigurator;

impl TokenSchemeConfigurator {
    /// Configures the bearer token scheme unless `state` says it already is.
    ///
    /// On first success, registers the [`TokenValidationPolicy`] and the shared
    /// [`SecuritySettings`] as singletons. Later calls leave both untouched,
    /// even when given different settings.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingRequiredSetting`] if the secret, issuer or
    /// audience is absent; the scheme then stays unconfigured.
    pub fn configure(
        settings: &Arc<SecuritySettings>,
        registry: &dyn ServiceRegistry,
        state: &RegistrationState,
    ) -> Result<(), AuthError> {
        let outcome = state.run_once(RegistrationFlag::TokenScheme, BEARER_SCHEME, || {
            let policy = TokenValidationPolicy::from_settings(settings)?;
            info!(
                scheme = policy.scheme(),
                issuer = policy.issuer(),
                audience = policy.audience(),
                clock_skew_secs = policy.clock_skew().as_secs(),
                "Configured bearer token scheme"
            );

            registry.register_singleton(Arc::clone(settings));
            registry.register_singleton(Arc::new(policy));
            Ok::<_, AuthError>(())
        })?;

        if let Guarded::AlreadySet { .. } = outcome {
            debug!(scheme = BEARER_SCHEME, "Bearer token scheme already configured");
        }

        Ok(())
    }
}
