//! Security settings.
//!
//! Settings are bound by the host from its configuration source and handed to
//! the [`SecurityBuilder`](crate::SecurityBuilder), which shares them as an
//! `Arc<SecuritySettings>` for the rest of the process.

use std::time::Duration;

use bastion_claims::IdType;
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::AuthError;

/// Default tolerance applied to token expiry and not-before checks.
pub const DEFAULT_CLOCK_SKEW_SECS: u64 = 300;

/// Default lifetime of issued tokens.
pub const DEFAULT_TOKEN_EXPIRY_HOURS: u64 = 2;

const DEFAULT_AZURE_AD_INSTANCE: &str = "https://login.microsoftonline.com/";

/// Secret string with automatic zeroization.
///
/// The value is erased from memory on drop and never printed by `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop, Deserialize)]
#[serde(transparent)]
pub struct SigningSecret(String);

impl SigningSecret {
    /// Wraps a secret value.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the raw secret bytes.
    ///
    /// Use with caution - the returned slice is not zeroized automatically.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns the raw secret.
    #[inline]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for SigningSecret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SigningSecret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Facebook application credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct FacebookSettings {
    /// Application id.
    pub app_id: String,
    /// Application secret.
    pub app_secret: SigningSecret,
}

/// Google OAuth client credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleSettings {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: SigningSecret,
    /// Redirect URI registered with Google.
    pub redirect_uri: String,
}

/// Twitter consumer credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct TwitterSettings {
    /// Consumer (API) key.
    pub consumer_key: String,
    /// Consumer (API) secret.
    pub consumer_secret: SigningSecret,
}

/// Azure Active Directory tenant and application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AzureAdSettings {
    /// Authority instance URL.
    #[serde(default = "default_azure_ad_instance")]
    pub instance: String,
    /// Directory (tenant) identifier.
    pub tenant: String,
    /// Resource (API) identifier.
    pub resource_id: String,
    /// Application (client) id.
    pub client_id: String,
    /// Application (client) secret.
    pub client_secret: SigningSecret,
}

impl AzureAdSettings {
    /// Authority URL for the tenant.
    pub fn authority(&self) -> String {
        format!("{}/{}", self.instance.trim_end_matches('/'), self.tenant)
    }
}

fn default_azure_ad_instance() -> String {
    DEFAULT_AZURE_AD_INSTANCE.to_string()
}

fn default_clock_skew_secs() -> u64 {
    DEFAULT_CLOCK_SKEW_SECS
}

fn default_token_expiry_hours() -> u64 {
    DEFAULT_TOKEN_EXPIRY_HOURS
}

/// Settings shared by every registered provider.
#[derive(Debug, Clone, Deserialize)]
pub struct SecuritySettings {
    /// Shared signing secret.
    #[serde(default)]
    pub secret: Option<SigningSecret>,
    /// Token issuer.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Token audience.
    #[serde(default)]
    pub audience: Option<String>,
    /// Clock skew tolerance in seconds.
    #[serde(default = "default_clock_skew_secs")]
    pub clock_skew_secs: u64,
    /// Claim type carrying the user id in the default flow.
    #[serde(default)]
    pub id_type: IdType,
    /// Lifetime of issued tokens in hours.
    #[serde(default = "default_token_expiry_hours")]
    pub token_expiry_hours: u64,
    /// Facebook provider settings.
    #[serde(default)]
    pub facebook: Option<FacebookSettings>,
    /// Google provider settings.
    #[serde(default)]
    pub google: Option<GoogleSettings>,
    /// Twitter provider settings.
    #[serde(default)]
    pub twitter: Option<TwitterSettings>,
    /// Azure AD provider settings.
    #[serde(default)]
    pub azure_ad: Option<AzureAdSettings>,
}

impl SecuritySettings {
    /// Creates settings with the required fields and defaults elsewhere.
    pub fn new(
        secret: impl Into<SigningSecret>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            secret: Some(secret.into()),
            issuer: Some(issuer.into()),
            audience: Some(audience.into()),
            clock_skew_secs: DEFAULT_CLOCK_SKEW_SECS,
            id_type: IdType::default(),
            token_expiry_hours: DEFAULT_TOKEN_EXPIRY_HOURS,
            facebook: None,
            google: None,
            twitter: None,
            azure_ad: None,
        }
    }

    /// Sets the claim type used for the user id in the default flow.
    pub fn with_id_type(mut self, id_type: IdType) -> Self {
        self.id_type = id_type;
        self
    }

    /// Sets the clock skew tolerance.
    pub fn with_clock_skew(mut self, skew: Duration) -> Self {
        self.clock_skew_secs = skew.as_secs();
        self
    }

    /// Sets the lifetime of issued tokens.
    pub fn with_token_expiry_hours(mut self, hours: u64) -> Self {
        self.token_expiry_hours = hours;
        self
    }

    /// Adds Facebook settings.
    pub fn with_facebook(mut self, facebook: FacebookSettings) -> Self {
        self.facebook = Some(facebook);
        self
    }

    /// Adds Google settings.
    pub fn with_google(mut self, google: GoogleSettings) -> Self {
        self.google = Some(google);
        self
    }

    /// Adds Twitter settings.
    pub fn with_twitter(mut self, twitter: TwitterSettings) -> Self {
        self.twitter = Some(twitter);
        self
    }

    /// Adds Azure AD settings.
    pub fn with_azure_ad(mut self, azure_ad: AzureAdSettings) -> Self {
        self.azure_ad = Some(azure_ad);
        self
    }

    /// Clock skew tolerance.
    pub fn clock_skew(&self) -> Duration {
        Duration::from_secs(self.clock_skew_secs)
    }

    /// Lifetime of issued tokens, saturating at the largest representable
    /// duration.
    pub fn token_expiry(&self) -> Duration {
        Duration::from_secs(self.token_expiry_hours.saturating_mul(3600))
    }

    /// Returns the secret, issuer and audience.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingRequiredSetting`] naming the first field
    /// that is absent or blank.
    pub fn required(&self) -> Result<(&SigningSecret, &str, &str), AuthError> {
        let secret = self
            .secret
            .as_ref()
            .filter(|s| !s.is_blank())
            .ok_or_else(|| AuthError::missing("secret"))?;
        let issuer = non_blank(self.issuer.as_deref()).ok_or_else(|| AuthError::missing("issuer"))?;
        let audience =
            non_blank(self.audience.as_deref()).ok_or_else(|| AuthError::missing("audience"))?;
        Ok((secret, issuer, audience))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
