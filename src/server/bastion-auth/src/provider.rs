//! Built-in authentication providers.
//!
//! Each provider has an auth model (the user-facing login payload), a
//! settings block inside [`SecuritySettings`], and a registration flag. The
//! network handshake with the provider itself belongs to the authenticator
//! the host binds through a [`ProviderRegistration`].

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use bastion_claims::{AuthenticationUser, ClaimsCustomizer};
use serde::{Deserialize, Serialize};

use crate::authenticator::UserAuthenticator;
use crate::error::AuthError;
use crate::settings::{
    AzureAdSettings, FacebookSettings, GoogleSettings, SecuritySettings, TwitterSettings,
};

/// Built-in provider identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Facebook login.
    Facebook,
    /// Google OAuth.
    Google,
    /// Twitter OAuth.
    Twitter,
    /// Azure Active Directory.
    AzureAd,
}

impl Provider {
    /// Settings key of the provider's block in [`SecuritySettings`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Facebook => "facebook",
            Provider::Google => "google",
            Provider::Twitter => "twitter",
            Provider::AzureAd => "azure_ad",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auth model of a built-in provider.
pub trait BuiltinProvider: AuthenticationUser {
    /// Provider the model belongs to.
    const PROVIDER: Provider;

    /// Provider-specific settings block.
    type Settings: fmt::Debug + Clone + Send + Sync + 'static;

    /// Extracts the provider's settings block.
    fn settings(settings: &SecuritySettings) -> Option<&Self::Settings>;
}

/// Facebook login payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookAuthModel {
    /// User access token obtained by the client.
    pub user_access_token: String,
}

impl AuthenticationUser for FacebookAuthModel {}

impl BuiltinProvider for FacebookAuthModel {
    const PROVIDER: Provider = Provider::Facebook;
    type Settings = FacebookSettings;

    fn settings(settings: &SecuritySettings) -> Option<&FacebookSettings> {
        settings.facebook.as_ref()
    }
}

/// Google login payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleAuthModel {
    /// Authorization code returned to the redirect URI.
    pub authorization_code: String,
}

impl AuthenticationUser for GoogleAuthModel {}

impl BuiltinProvider for GoogleAuthModel {
    const PROVIDER: Provider = Provider::Google;
    type Settings = GoogleSettings;

    fn settings(settings: &SecuritySettings) -> Option<&GoogleSettings> {
        settings.google.as_ref()
    }
}

/// Twitter login payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterAuthModel {
    /// Request token.
    pub oauth_token: String,
    /// Verifier returned by Twitter.
    pub oauth_verifier: String,
}

impl AuthenticationUser for TwitterAuthModel {}

impl BuiltinProvider for TwitterAuthModel {
    const PROVIDER: Provider = Provider::Twitter;
    type Settings = TwitterSettings;

    fn settings(settings: &SecuritySettings) -> Option<&TwitterSettings> {
        settings.twitter.as_ref()
    }
}

/// Azure AD login payload.
#[derive(Clone, Serialize, Deserialize)]
pub struct AzureAdAuthModel {
    /// User principal id.
    pub id: String,
    /// User secret.
    pub secret: String,
}

impl fmt::Debug for AzureAdAuthModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureAdAuthModel")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl AuthenticationUser for AzureAdAuthModel {}

impl BuiltinProvider for AzureAdAuthModel {
    const PROVIDER: Provider = Provider::AzureAd;
    type Settings = AzureAdSettings;

    fn settings(settings: &SecuritySettings) -> Option<&AzureAdSettings> {
        settings.azure_ad.as_ref()
    }
}

/// Factory building an authenticator for user model `U`.
pub type UserAuthenticatorFactory<U> =
    Arc<dyn Fn() -> Arc<dyn UserAuthenticator<U>> + Send + Sync>;

/// An authenticator type bound to a provider, with its factory.
pub(crate) struct AuthenticatorBinding<U: AuthenticationUser> {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) factory: UserAuthenticatorFactory<U>,
}

impl<U: AuthenticationUser> AuthenticatorBinding<U> {
    pub(crate) fn new<A, F>(factory: F) -> Self
    where
        A: UserAuthenticator<U> + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self {
            type_id: TypeId::of::<A>(),
            type_name: std::any::type_name::<A>(),
            factory: Arc::new(move || Arc::new(factory()) as Arc<dyn UserAuthenticator<U>>),
        }
    }
}

/// What to register for one built-in provider.
pub struct ProviderRegistration<M: BuiltinProvider> {
    authenticators: Vec<AuthenticatorBinding<M>>,
    customizer: Option<ClaimsCustomizer<M>>,
}

impl<M: BuiltinProvider> Default for ProviderRegistration<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: BuiltinProvider> ProviderRegistration<M> {
    /// Creates an empty registration.
    pub fn new() -> Self {
        Self {
            authenticators: Vec::new(),
            customizer: None,
        }
    }

    /// Binds authenticator type `A`, built with `Default`.
    pub fn authenticator<A>(self) -> Self
    where
        A: UserAuthenticator<M> + Default + 'static,
    {
        self.authenticator_with(A::default)
    }

    /// Binds the authenticator built by `factory`.
    pub fn authenticator_with<A, F>(mut self, factory: F) -> Self
    where
        A: UserAuthenticator<M> + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.authenticators.push(AuthenticatorBinding::new(factory));
        self
    }

    /// Customizes the claims put into tokens issued for this provider.
    pub fn claims(mut self, customizer: ClaimsCustomizer<M>) -> Self {
        self.customizer = Some(customizer);
        self
    }

    /// Checks the bindings and returns the single authenticator to register.
    ///
    /// The same type bound several times counts once.
    pub(crate) fn into_parts(
        self,
    ) -> Result<(AuthenticatorBinding<M>, Option<ClaimsCustomizer<M>>), AuthError> {
        let mut bindings = self.authenticators.into_iter();
        let first = bindings.next().ok_or(AuthError::MissingAuthenticator {
            provider: M::PROVIDER,
        })?;

        if let Some(other) = bindings.find(|b| b.type_id != first.type_id) {
            return Err(AuthError::DuplicateProviderAuthenticatorType {
                provider: M::PROVIDER,
                first: first.type_name,
                second: other.type_name,
            });
        }

        Ok((first, self.customizer))
    }
}

impl<M: BuiltinProvider> fmt::Debug for ProviderRegistration<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.authenticators.iter().map(|b| b.type_name).collect();
        f.debug_struct("ProviderRegistration")
            .field("provider", &M::PROVIDER)
            .field("authenticators", &names)
            .field("customized_claims", &self.customizer.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct AcceptAll;

    #[async_trait]
    impl UserAuthenticator<FacebookAuthModel> for AcceptAll {
        async fn is_valid_user(&self, _user: &FacebookAuthModel) -> Result<bool, AuthError> {
            Ok(true)
        }
    }

    #[derive(Default)]
    struct RejectAll;

    #[async_trait]
    impl UserAuthenticator<FacebookAuthModel> for RejectAll {
        async fn is_valid_user(&self, _user: &FacebookAuthModel) -> Result<bool, AuthError> {
            Ok(false)
        }
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(Provider::AzureAd.to_string(), "azure_ad");
        assert_eq!(FacebookAuthModel::PROVIDER, Provider::Facebook);
        assert_eq!(AzureAdAuthModel::PROVIDER.as_str(), "azure_ad");
    }

    #[test]
    fn test_single_authenticator() {
        let (binding, customizer) = ProviderRegistration::<FacebookAuthModel>::new()
            .authenticator::<AcceptAll>()
            .into_parts()
            .unwrap();
        assert!(binding.type_name.ends_with("AcceptAll"));
        assert!(customizer.is_none());
    }

    #[test]
    fn test_same_authenticator_twice_is_not_a_conflict() {
        let result = ProviderRegistration::<FacebookAuthModel>::new()
            .authenticator::<AcceptAll>()
            .authenticator_with(|| AcceptAll)
            .into_parts();
        assert!(result.is_ok());
    }

    #[test]
    fn test_conflicting_authenticators() {
        let result = ProviderRegistration::<FacebookAuthModel>::new()
            .authenticator::<AcceptAll>()
            .authenticator::<RejectAll>()
            .into_parts();

        match result {
            Err(AuthError::DuplicateProviderAuthenticatorType {
                provider,
                first,
                second,
            }) => {
                assert_eq!(provider, Provider::Facebook);
                assert!(first.ends_with("AcceptAll"));
                assert!(second.ends_with("RejectAll"));
            },
            other => panic!("expected duplicate error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_missing_authenticator() {
        let result = ProviderRegistration::<GoogleAuthModel>::new().into_parts();
        assert!(matches!(
            result,
            Err(AuthError::MissingAuthenticator {
                provider: Provider::Google
            })
        ));
    }

    #[test]
    fn test_provider_settings_lookup() {
        let settings = SecuritySettings::new("s", "i", "a").with_twitter(TwitterSettings {
            consumer_key: "ck".to_string(),
            consumer_secret: "cs".into(),
        });

        assert_eq!(
            TwitterAuthModel::settings(&settings).map(|t| t.consumer_key.as_str()),
            Some("ck")
        );
        assert!(FacebookAuthModel::settings(&settings).is_none());
    }
}
