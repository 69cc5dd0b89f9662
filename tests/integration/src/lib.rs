//! Integration tests for Bastion security wiring.
//!
//! These tests drive the complete workflow: registering security from one or
//! more startup paths, activating it on a request pipeline, issuing tokens
//! through the registered services and validating them through the bearer
//! backend.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use bastion_auth::{
    use_security, AuthBackend, DocumentationAnnotator, RegistrationState, RequestPipeline,
    SecurityBuilder, SecuritySettings,
};
use bastion_registry::ServiceCollection;
use parking_lot::Mutex;
use rand::rngs::OsRng;

// ============================================================================
// Test Host
// ============================================================================

/// Request pipeline recording what security activated on it.
#[derive(Default)]
pub struct RecordingPipeline {
    backends: Mutex<Vec<Arc<dyn AuthBackend>>>,
    documentation: AtomicUsize,
}

impl RecordingPipeline {
    /// Number of times authentication was activated.
    pub fn authentication_count(&self) -> usize {
        self.backends.lock().len()
    }

    /// Number of times documentation was activated.
    pub fn documentation_count(&self) -> usize {
        self.documentation.load(Ordering::SeqCst)
    }
}

impl RequestPipeline for RecordingPipeline {
    fn use_authentication(&self, backend: Arc<dyn AuthBackend>) {
        self.backends.lock().push(backend);
    }

    fn use_documentation(&self) {
        self.documentation.fetch_add(1, Ordering::SeqCst);
    }
}

/// A host application: one registry, one registration state, one pipeline.
#[derive(Default)]
pub struct TestHost {
    pub registry: ServiceCollection,
    pub state: RegistrationState,
    pub pipeline: RecordingPipeline,
}

impl TestHost {
    /// Creates a host with nothing registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a registration pass, as one startup path of the host would.
    pub fn builder(
        &self,
        settings: SecuritySettings,
        documentation: Option<&dyn DocumentationAnnotator>,
    ) -> Result<SecurityBuilder<'_>> {
        SecurityBuilder::new(settings, &self.registry, &self.state, documentation)
            .context("failed to configure security")
    }

    /// Activates security on the pipeline.
    pub fn activate(&self, with_documentation: bool) -> Result<()> {
        use_security(&self.pipeline, &self.registry, &self.state, with_documentation)
            .context("failed to activate security")
    }

    /// Bearer backend the pipeline authenticates with.
    pub fn backend(&self) -> Result<Arc<dyn AuthBackend>> {
        self.pipeline
            .backends
            .lock()
            .first()
            .cloned()
            .context("authentication is not active")
    }
}

/// Settings shared by the tests.
pub fn test_settings(issuer: &str) -> SecuritySettings {
    SecuritySettings::new("integration-secret-key-minimum-32!", issuer, "bastion-api")
}

/// Hashes a password the way the host stores it.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use bastion_auth::{
        AuthError, Authenticator, BearerSecurityScheme, FacebookAuthModel, GoogleAuthModel,
        GoogleSettings, PasswordHashAuthenticator, Provider, ProviderRegistration,
        RegistrationFlag, RegistryAnnotator, SecurityService, SigningSecret, TokenValidationPolicy,
        UserAuthenticator, UserCredentials, UserSecurityService,
    };
    use bastion_claims::{AuthenticationUser, ClaimsCustomizer, IdType};
    use bastion_registry::ServiceRegistryExt;

    use super::*;

    const NAME_CLAIM: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name";
    const ROLE_CLAIM: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

    fn password_authenticator() -> PasswordHashAuthenticator {
        let mut hashes = HashMap::new();
        hashes.insert("alice".to_string(), hash_password("correct horse").unwrap());
        PasswordHashAuthenticator::with_static_hashes(hashes)
    }

    #[derive(Default)]
    struct AllowAll;

    #[async_trait]
    impl Authenticator for AllowAll {
        async fn is_valid_user(&self, _credentials: &UserCredentials) -> Result<bool, AuthError> {
            Ok(true)
        }
    }

    struct Customer {
        account: String,
        tier: String,
    }

    impl AuthenticationUser for Customer {}

    #[derive(Default)]
    struct CustomerDirectory;

    #[async_trait]
    impl UserAuthenticator<Customer> for CustomerDirectory {
        async fn is_valid_user(&self, user: &Customer) -> Result<bool, AuthError> {
            Ok(!user.account.is_empty())
        }
    }

    #[derive(Default)]
    struct FacebookGraph;

    #[async_trait]
    impl UserAuthenticator<FacebookAuthModel> for FacebookGraph {
        async fn is_valid_user(&self, _user: &FacebookAuthModel) -> Result<bool, AuthError> {
            Ok(true)
        }
    }

    #[derive(Default)]
    struct FacebookTokenDebugger;

    #[async_trait]
    impl UserAuthenticator<FacebookAuthModel> for FacebookTokenDebugger {
        async fn is_valid_user(&self, user: &FacebookAuthModel) -> Result<bool, AuthError> {
            Ok(user.user_access_token.starts_with("EAA"))
        }
    }

    #[derive(Default)]
    struct GoogleCodeExchange;

    #[async_trait]
    impl UserAuthenticator<GoogleAuthModel> for GoogleCodeExchange {
        async fn is_valid_user(&self, user: &GoogleAuthModel) -> Result<bool, AuthError> {
            Ok(user.authorization_code == "valid-code")
        }
    }

    fn google_settings() -> GoogleSettings {
        GoogleSettings {
            client_id: "google-client".to_string(),
            client_secret: SigningSecret::new("google-secret"),
            redirect_uri: "https://app.example.com/signin-google".to_string(),
        }
    }

    #[tokio::test]
    async fn test_default_flow_login_and_validate() {
        let host = TestHost::new();
        let authenticator = password_authenticator();

        host.builder(test_settings("https://bastion.test"), None)
            .unwrap()
            .register_default_with(move || authenticator.clone())
            .unwrap()
            .register_default::<AllowAll>()
            .unwrap();
        host.activate(false).unwrap();

        assert_eq!(host.registry.count::<dyn Authenticator>(), 1);

        let service = host.registry.require::<SecurityService>().unwrap();
        let token = service
            .generate_token(&UserCredentials::new("alice", "correct horse"))
            .await
            .unwrap();

        let ctx = host.backend().unwrap().validate(&token.access_token).await.unwrap();
        assert_eq!(ctx.subject.as_deref(), Some("alice"));
        assert_eq!(ctx.claim(NAME_CLAIM), Some("alice"));
        assert_eq!(ctx.scheme, "JwtBearer");

        let rejected = service
            .generate_token(&UserCredentials::new("alice", "battery staple"))
            .await;
        assert!(matches!(rejected, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_subject_follows_configured_id_type() {
        let host = TestHost::new();

        host.builder(
            test_settings("https://bastion.test").with_id_type(IdType::Email),
            None,
        )
        .unwrap()
        .register_default::<AllowAll>()
        .unwrap();
        host.activate(false).unwrap();

        let token = host
            .registry
            .require::<SecurityService>()
            .unwrap()
            .generate_token(&UserCredentials::new("alice@example.com", "pw"))
            .await
            .unwrap();

        let ctx = host.backend().unwrap().validate(&token.access_token).await.unwrap();
        assert_eq!(ctx.subject.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_custom_and_default_are_exclusive() {
        let host = TestHost::new();

        host.builder(test_settings("https://bastion.test"), None)
            .unwrap()
            .register_custom::<CustomerDirectory, Customer>(None)
            .unwrap();
        host.builder(test_settings("https://bastion.test"), None)
            .unwrap()
            .register_default::<AllowAll>()
            .unwrap();

        assert!(host.state.is_set(RegistrationFlag::CustomProvider));
        assert!(!host.state.is_set(RegistrationFlag::DefaultProvider));
        assert!(!host.registry.is_registered::<SecurityService>());
        assert_eq!(host.registry.count::<UserSecurityService<Customer>>(), 1);
    }

    #[tokio::test]
    async fn test_custom_flow_claims_round_trip() {
        let host = TestHost::new();
        let customizer = ClaimsCustomizer::<Customer>::new(|claims| {
            claims
                .add_claim_from(IdType::Name, |c| c.account.clone())
                .add_claim_from(IdType::Role, |c| c.tier.clone())
                .add_claim(IdType::Role, "customer")
        });

        host.builder(test_settings("https://bastion.test"), None)
            .unwrap()
            .register_custom::<CustomerDirectory, Customer>(Some(customizer))
            .unwrap();
        host.activate(false).unwrap();

        let customer = Customer {
            account: "acct-42".to_string(),
            tier: "gold".to_string(),
        };
        let token = host
            .registry
            .require::<UserSecurityService<Customer>>()
            .unwrap()
            .generate_token(&customer)
            .await
            .unwrap();

        let ctx = host.backend().unwrap().validate(&token.access_token).await.unwrap();
        assert_eq!(ctx.subject.as_deref(), Some("acct-42"));
        assert_eq!(ctx.claims_of(ROLE_CLAIM).collect::<Vec<_>>(), vec!["gold", "customer"]);
    }

    #[tokio::test]
    async fn test_provider_flow_round_trip() {
        let host = TestHost::new();
        let settings = test_settings("https://bastion.test").with_google(google_settings());

        host.builder(settings, None)
            .unwrap()
            .register_provider(
                ProviderRegistration::<GoogleAuthModel>::new()
                    .authenticator::<GoogleCodeExchange>()
                    .claims(ClaimsCustomizer::<GoogleAuthModel>::new(|claims| {
                        claims
                            .add_claim("provider", "google")
                            .add_claim_from("code", |m| m.authorization_code.clone())
                    })),
            )
            .unwrap();
        host.activate(false).unwrap();

        let service = host
            .registry
            .require::<UserSecurityService<GoogleAuthModel>>()
            .unwrap();
        let token = service
            .generate_token(&GoogleAuthModel {
                authorization_code: "valid-code".to_string(),
            })
            .await
            .unwrap();

        let ctx = host.backend().unwrap().validate(&token.access_token).await.unwrap();
        assert!(ctx.has_claim("provider", "google"));
        assert!(ctx.has_claim("code", "valid-code"));

        let rejected = service
            .generate_token(&GoogleAuthModel {
                authorization_code: "forged".to_string(),
            })
            .await;
        assert!(matches!(rejected, Err(AuthError::InvalidCredentials)));

        let registered = host.registry.require::<GoogleSettings>().unwrap();
        assert_eq!(registered.client_id, "google-client");
    }

    #[test]
    fn test_provider_missing_settings_aborts() {
        let host = TestHost::new();

        let result = host
            .builder(test_settings("https://bastion.test"), None)
            .unwrap()
            .register_provider(
                ProviderRegistration::<GoogleAuthModel>::new()
                    .authenticator::<GoogleCodeExchange>(),
            )
            .map(|_| ());

        assert!(matches!(result, Err(AuthError::MissingRequiredSetting { setting }) if setting == "google"));
        assert!(!host.state.is_set(RegistrationFlag::Provider(Provider::Google)));
    }

    #[test]
    fn test_concurrent_startup_paths_register_once() {
        let host = TestHost::new();

        std::thread::scope(|scope| {
            for i in 0..8 {
                let host = &host;
                scope.spawn(move || {
                    host.builder(test_settings(&format!("https://issuer-{}", i)), None)
                        .unwrap()
                        .register_default::<AllowAll>()
                        .unwrap();
                });
            }
        });

        assert_eq!(host.registry.count::<TokenValidationPolicy>(), 1);
        assert_eq!(host.registry.count::<dyn Authenticator>(), 1);
        assert_eq!(host.registry.count::<SecurityService>(), 1);
    }

    #[test]
    fn test_concurrent_provider_registration() {
        let host = TestHost::new();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let host = &host;
                scope.spawn(move || {
                    let settings =
                        test_settings("https://bastion.test").with_google(google_settings());
                    host.builder(settings, None)
                        .unwrap()
                        .register_provider(
                            ProviderRegistration::<GoogleAuthModel>::new()
                                .authenticator::<GoogleCodeExchange>(),
                        )
                        .unwrap();
                });
            }
        });

        assert_eq!(
            host.registry.count::<dyn UserAuthenticator<GoogleAuthModel>>(),
            1
        );
        assert_eq!(host.registry.count::<GoogleSettings>(), 1);
    }

    #[test]
    fn test_conflicting_provider_authenticators_rejected() {
        let host = TestHost::new();

        let result = host
            .builder(test_settings("https://bastion.test"), None)
            .unwrap()
            .register_provider(
                ProviderRegistration::<FacebookAuthModel>::new()
                    .authenticator::<FacebookGraph>()
                    .authenticator_with(|| FacebookGraph)
                    .authenticator::<FacebookTokenDebugger>(),
            )
            .map(|_| ());

        assert!(matches!(
            result,
            Err(AuthError::DuplicateProviderAuthenticatorType {
                provider: Provider::Facebook,
                ..
            })
        ));
        assert!(!host.state.is_set(RegistrationFlag::Provider(Provider::Facebook)));
    }

    #[tokio::test]
    async fn test_first_settings_win() {
        let host = TestHost::new();

        host.builder(test_settings("https://first.test"), None)
            .unwrap()
            .register_default::<AllowAll>()
            .unwrap();
        host.builder(test_settings("https://second.test"), None).unwrap();
        host.activate(false).unwrap();

        let policy = host.registry.require::<TokenValidationPolicy>().unwrap();
        assert_eq!(policy.issuer(), "https://first.test");

        let token = host
            .registry
            .require::<SecurityService>()
            .unwrap()
            .generate_token(&UserCredentials::new("alice", "pw"))
            .await
            .unwrap();
        assert!(host.backend().unwrap().validate(&token.access_token).await.is_ok());
    }

    #[test]
    fn test_documentation_annotated_once() {
        let host = TestHost::new();
        let annotator = RegistryAnnotator::new(&host.registry);

        for _ in 0..3 {
            host.builder(test_settings("https://bastion.test"), Some(&annotator))
                .unwrap();
        }
        host.activate(true).unwrap();
        host.activate(true).unwrap();

        assert_eq!(host.registry.count::<BearerSecurityScheme>(), 1);
        assert_eq!(host.pipeline.documentation_count(), 1);
        assert_eq!(host.pipeline.authentication_count(), 1);
    }

    #[test]
    fn test_activation_requires_scheme() {
        let host = TestHost::new();
        let result = host.activate(false);
        assert!(result.is_err());
        assert_eq!(host.pipeline.authentication_count(), 0);
        assert!(!host.state.is_set(RegistrationFlag::PipelineActivated));
    }

    #[tokio::test]
    async fn test_tampered_payload_rejected() {
        let host = TestHost::new();

        host.builder(test_settings("https://bastion.test"), None)
            .unwrap()
            .register_default::<AllowAll>()
            .unwrap();
        host.activate(false).unwrap();

        let service = host.registry.require::<SecurityService>().unwrap();
        let alice = service
            .generate_token(&UserCredentials::new("alice", "pw"))
            .await
            .unwrap();
        let mallory = service
            .generate_token(&UserCredentials::new("mallory", "pw"))
            .await
            .unwrap();

        // Alice's signature over Mallory's payload
        let alice_parts: Vec<&str> = alice.access_token.split('.').collect();
        let mallory_parts: Vec<&str> = mallory.access_token.split('.').collect();
        let forged = format!("{}.{}.{}", alice_parts[0], mallory_parts[1], alice_parts[2]);

        let result = host.backend().unwrap().validate(&forged).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_token_from_other_secret_rejected() {
        let issuing = TestHost::new();
        issuing
            .builder(
                SecuritySettings::new(
                    "another-secret-key-minimum-32-ch!",
                    "https://bastion.test",
                    "bastion-api",
                ),
                None,
            )
            .unwrap()
            .register_default::<AllowAll>()
            .unwrap();
        let token = issuing
            .registry
            .require::<SecurityService>()
            .unwrap()
            .generate_token(&UserCredentials::new("alice", "pw"))
            .await
            .unwrap();

        let validating = TestHost::new();
        validating
            .builder(test_settings("https://bastion.test"), None)
            .unwrap();
        validating.activate(false).unwrap();

        let result = validating.backend().unwrap().validate(&token.access_token).await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }
}
