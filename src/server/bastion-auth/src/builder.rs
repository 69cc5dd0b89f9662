//! Security registration builder.
//!
//! The builder is the host's single entry point for wiring authentication at
//! startup. Every step is idempotent against the [`RegistrationState`] it is
//! given: the token scheme, the documentation annotation and each provider
//! are wired at most once, however many builders run and from however many
//! threads. A repeated or conflicting registration is a logged no-op, never
//! an error.

use std::sync::Arc;

use bastion_claims::{load_claim_types, AuthenticationUser, ClaimTypeCatalog, ClaimsCustomizer};
use bastion_registry::{ServiceRegistry, ServiceRegistryExt};
use tracing::{debug, info, warn};

use crate::authenticator::{Authenticator, UserAuthenticator};
use crate::docs::{annotate_documentation, DocumentationAnnotator};
use crate::error::AuthError;
use crate::provider::{
    AuthenticatorBinding, BuiltinProvider, ProviderRegistration, UserAuthenticatorFactory,
};
use crate::scheme::{TokenSchemeConfigurator, TokenValidationPolicy};
use crate::service::{SecurityService, UserSecurityService};
use crate::settings::SecuritySettings;
use crate::state::{Guarded, RegistrationFlag, RegistrationState};
use crate::token::TokenIssuer;

/// Default and custom registrations exclude each other.
const PRIMARY_FLAGS: [RegistrationFlag; 2] =
    [RegistrationFlag::DefaultProvider, RegistrationFlag::CustomProvider];

/// Wires authentication services into a [`ServiceRegistry`].
///
/// ```ignore
/// let state = RegistrationState::new();
/// let registry = ServiceCollection::new();
///
/// SecurityBuilder::new(settings, &registry, &state, None)?
///     .register_default_with(move || PasswordHashAuthenticator::new(lookup.clone()))?
///     .register_provider(
///         ProviderRegistration::<GoogleAuthModel>::new().authenticator::<GoogleAuthenticator>(),
///     )?;
/// ```
pub struct SecurityBuilder<'a> {
    settings: Arc<SecuritySettings>,
    registry: &'a dyn ServiceRegistry,
    state: &'a RegistrationState,
}

impl<'a> SecurityBuilder<'a> {
    /// Configures the bearer token scheme, annotates API documentation if an
    /// annotator is given, and loads the claim-type catalog.
    ///
    /// Each step is skipped if `state` shows it already ran.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingRequiredSetting`] if the scheme still
    /// needs configuring and the secret, issuer or audience is absent.
    pub fn new(
        settings: impl Into<Arc<SecuritySettings>>,
        registry: &'a dyn ServiceRegistry,
        state: &'a RegistrationState,
        documentation: Option<&dyn DocumentationAnnotator>,
    ) -> Result<Self, AuthError> {
        let settings = settings.into();

        TokenSchemeConfigurator::configure(&settings, registry, state)?;
        if let Some(annotator) = documentation {
            annotate_documentation(annotator, state)?;
        }
        load_claim_types();

        Ok(Self {
            settings,
            registry,
            state,
        })
    }

    /// Settings this builder was created with.
    pub fn settings(&self) -> &Arc<SecuritySettings> {
        &self.settings
    }

    /// Registry services are wired into.
    pub fn registry(&self) -> &'a dyn ServiceRegistry {
        self.registry
    }

    /// Registration state guarding this builder.
    pub fn state(&self) -> &'a RegistrationState {
        self.state
    }

    /// Registers built-in provider `M` unless it already is.
    ///
    /// On first success, registers the provider's settings block, a scoped
    /// `dyn UserAuthenticator<M>` and a scoped [`UserSecurityService<M>`]
    /// carrying the registration's claims customizer.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingAuthenticator`] if no authenticator is bound
    /// - [`AuthError::DuplicateProviderAuthenticatorType`] if two different
    ///   authenticator types are bound
    /// - [`AuthError::MissingRequiredSetting`] naming the provider if its
    ///   settings block is absent
    pub fn register_provider<M>(
        &self,
        registration: ProviderRegistration<M>,
    ) -> Result<&Self, AuthError>
    where
        M: BuiltinProvider,
    {
        let (binding, customizer) = registration.into_parts()?;
        let flag = RegistrationFlag::Provider(M::PROVIDER);
        let type_name = binding.type_name;

        let outcome = self.state.run_once(flag, type_name, || {
            let provider_settings = M::settings(&self.settings)
                .ok_or_else(|| AuthError::missing(M::PROVIDER.as_str()))?;
            let issuer = self.token_issuer()?;

            self.registry
                .register_singleton(Arc::new(provider_settings.clone()));
            self.bind_user_services(binding.factory, issuer, customizer);
            Ok::<_, AuthError>(())
        })?;

        report(M::PROVIDER.as_str(), flag, type_name, outcome);
        Ok(self)
    }

    /// Registers authenticator `A` for the default id/password flow.
    ///
    /// # Errors
    ///
    /// See [`register_default_with`](Self::register_default_with).
    pub fn register_default<A>(&self) -> Result<&Self, AuthError>
    where
        A: Authenticator + Default + 'static,
    {
        self.register_default_with(A::default)
    }

    /// Registers the authenticator built by `factory` for the default
    /// id/password flow, unless a default or custom flow already is.
    ///
    /// On first success, registers a scoped `dyn Authenticator` and a scoped
    /// [`SecurityService`] putting the user id under the configured id type.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SchemeNotConfigured`] or
    /// [`AuthError::Claims`] if the subject claim type cannot be resolved.
    pub fn register_default_with<A, F>(&self, factory: F) -> Result<&Self, AuthError>
    where
        A: Authenticator + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<A>();
        let flag = RegistrationFlag::DefaultProvider;

        let outcome = self.state.run_exclusive(&PRIMARY_FLAGS, flag, type_name, || {
            let issuer = self.token_issuer()?;
            let subject_claim_type = ClaimTypeCatalog::global()
                .resolve(self.settings.id_type)?
                .to_string();

            let factory = Arc::new(factory);
            let authenticators = Arc::clone(&factory);
            self.registry
                .register_scoped::<dyn Authenticator, _>(move || {
                    Arc::new(authenticators()) as Arc<dyn Authenticator>
                });
            self.registry.register_scoped::<SecurityService, _>(move || {
                Arc::new(SecurityService::new(
                    Arc::new(factory()),
                    issuer.clone(),
                    subject_claim_type.clone(),
                ))
            });
            Ok::<_, AuthError>(())
        })?;

        report("default", flag, type_name, outcome);
        Ok(self)
    }

    /// Registers authenticator `A` for custom user model `U`.
    ///
    /// # Errors
    ///
    /// See [`register_custom_with`](Self::register_custom_with).
    pub fn register_custom<A, U>(
        &self,
        customizer: Option<ClaimsCustomizer<U>>,
    ) -> Result<&Self, AuthError>
    where
        U: AuthenticationUser,
        A: UserAuthenticator<U> + Default + 'static,
    {
        self.register_custom_with(A::default, customizer)
    }

    /// Registers the authenticator built by `factory` for custom user model
    /// `U`, unless a default or custom flow already is.
    ///
    /// On first success, registers a scoped `dyn UserAuthenticator<U>`, the
    /// customizer if any, and a scoped [`UserSecurityService<U>`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SchemeNotConfigured`] if no token scheme is
    /// registered.
    pub fn register_custom_with<A, U, F>(
        &self,
        factory: F,
        customizer: Option<ClaimsCustomizer<U>>,
    ) -> Result<&Self, AuthError>
    where
        U: AuthenticationUser,
        A: UserAuthenticator<U> + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let binding = AuthenticatorBinding::<U>::new(factory);
        let type_name = binding.type_name;
        let flag = RegistrationFlag::CustomProvider;

        let outcome = self.state.run_exclusive(&PRIMARY_FLAGS, flag, type_name, || {
            let issuer = self.token_issuer()?;
            self.bind_user_services(binding.factory, issuer, customizer);
            Ok::<_, AuthError>(())
        })?;

        report("custom", flag, type_name, outcome);
        Ok(self)
    }

    fn token_issuer(&self) -> Result<TokenIssuer, AuthError> {
        let policy = self
            .registry
            .resolve::<TokenValidationPolicy>()
            .ok_or(AuthError::SchemeNotConfigured)?;
        Ok(TokenIssuer::new(policy, self.settings.token_expiry()))
    }

    fn bind_user_services<U: AuthenticationUser>(
        &self,
        factory: UserAuthenticatorFactory<U>,
        issuer: TokenIssuer,
        customizer: Option<ClaimsCustomizer<U>>,
    ) {
        let authenticators = Arc::clone(&factory);
        self.registry
            .register_scoped::<dyn UserAuthenticator<U>, _>(move || authenticators());

        if let Some(customizer) = &customizer {
            self.registry.register_singleton(Arc::new(customizer.clone()));
        }

        self.registry.register_scoped::<UserSecurityService<U>, _>(move || {
            Arc::new(UserSecurityService::new(
                factory(),
                issuer.clone(),
                customizer.clone(),
            ))
        });
    }
}

fn report(kind: &'static str, flag: RegistrationFlag, binding: &'static str, outcome: Guarded<()>) {
    match outcome {
        Guarded::Ran(()) => info!(kind, authenticator = binding, "Registered authenticator"),
        Guarded::AlreadySet {
            flag: active_flag,
            binding: active,
        } if active_flag == flag && active == binding => {
            debug!(kind, authenticator = binding, "Authenticator already registered");
        },
        Guarded::AlreadySet {
            flag: active_flag,
            binding: active,
        } => {
            warn!(
                kind,
                requested = binding,
                active,
                active_flag = ?active_flag,
                "Ignored conflicting authenticator registration"
            );
        },
    }
}

impl std::fmt::Debug for SecurityBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityBuilder")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
