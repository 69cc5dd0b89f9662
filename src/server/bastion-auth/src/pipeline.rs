//! Request pipeline activation.

use std::sync::Arc;

use bastion_claims::{load_claim_types, ClaimTypeCatalog};
use bastion_registry::{ServiceRegistry, ServiceRegistryExt};
use tracing::{debug, info};

use crate::bearer::{AuthBackend, JwtBearerBackend};
use crate::error::AuthError;
use crate::scheme::TokenValidationPolicy;
use crate::settings::SecuritySettings;
use crate::state::{Guarded, RegistrationFlag, RegistrationState};

/// Host request pipeline that security is activated on.
pub trait RequestPipeline: Send + Sync {
    /// Authenticates every request through `backend`.
    fn use_authentication(&self, backend: Arc<dyn AuthBackend>);

    /// Serves the API documentation.
    fn use_documentation(&self);
}

/// Activates authentication (and optionally documentation) on `pipeline`
/// unless `state` says it already was.
///
/// Documentation is activated before authentication.
///
/// # Errors
///
/// Returns [`AuthError::SchemeNotConfigured`] if no bearer token scheme is
/// registered; the pipeline then stays inactive. Returns [`AuthError::Claims`]
/// if the configured id type has no claim type.
pub fn use_security(
    pipeline: &dyn RequestPipeline,
    registry: &dyn ServiceRegistry,
    state: &RegistrationState,
    with_documentation: bool,
) -> Result<(), AuthError> {
    let outcome = state.run_once(RegistrationFlag::PipelineActivated, "pipeline", || {
        let policy = registry
            .resolve::<TokenValidationPolicy>()
            .ok_or(AuthError::SchemeNotConfigured)?;

        let mut backend = JwtBearerBackend::new(policy);
        if let Some(settings) = registry.resolve::<SecuritySettings>() {
            load_claim_types();
            let claim_type = ClaimTypeCatalog::global().resolve(settings.id_type)?;
            backend = backend.with_subject_claim(claim_type);
        }

        if with_documentation {
            pipeline.use_documentation();
        }
        pipeline.use_authentication(Arc::new(backend));
        Ok::<_, AuthError>(())
    })?;

    match outcome {
        Guarded::Ran(()) => info!(with_documentation, "Activated security on request pipeline"),
        Guarded::AlreadySet { .. } => debug!("Security already active on request pipeline"),
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use std::time::Duration;

    use bastion_claims::{Claim, IdType};
    use bastion_registry::ServiceCollection;
    use parking_lot::Mutex;

    use super::*;
    use crate::scheme::TokenSchemeConfigurator;
    use crate::token::TokenIssuer;

    #[derive(Default)]
    struct RecordingPipeline {
        steps: Mutex<Vec<&'static str>>,
        backend: Mutex<Option<Arc<dyn AuthBackend>>>,
    }

    impl RequestPipeline for RecordingPipeline {
        fn use_authentication(&self, backend: Arc<dyn AuthBackend>) {
            self.steps.lock().push(backend.name());
            *self.backend.lock() = Some(backend);
        }

        fn use_documentation(&self) {
            self.steps.lock().push("documentation");
        }
    }

    fn configured_registry(state: &RegistrationState) -> ServiceCollection {
        let registry = ServiceCollection::new();
        let settings = Arc::new(SecuritySettings::new("s", "i", "a"));
        TokenSchemeConfigurator::configure(&settings, &registry, state).unwrap();
        registry
    }

    #[test]
    fn test_activates_once_in_order() {
        let state = RegistrationState::new();
        let registry = configured_registry(&state);
        let pipeline = RecordingPipeline::default();

        use_security(&pipeline, &registry, &state, true).unwrap();
        use_security(&pipeline, &registry, &state, true).unwrap();

        assert_eq!(*pipeline.steps.lock(), vec!["documentation", "jwt-bearer"]);
        assert!(state.is_set(RegistrationFlag::PipelineActivated));
    }

    #[test]
    fn test_without_documentation() {
        let state = RegistrationState::new();
        let registry = configured_registry(&state);
        let pipeline = RecordingPipeline::default();

        use_security(&pipeline, &registry, &state, false).unwrap();
        assert_eq!(*pipeline.steps.lock(), vec!["jwt-bearer"]);
    }

    #[tokio::test]
    async fn test_subject_claim_follows_id_type_without_builder() {
        let state = RegistrationState::new();
        let registry = ServiceCollection::new();
        let settings = Arc::new(SecuritySettings::new("s", "i", "a").with_id_type(IdType::Email));
        TokenSchemeConfigurator::configure(&settings, &registry, &state).unwrap();
        let pipeline = RecordingPipeline::default();

        use_security(&pipeline, &registry, &state, false).unwrap();

        let policy = registry.require::<TokenValidationPolicy>().unwrap();
        let email = ClaimTypeCatalog::global().resolve(IdType::Email).unwrap();
        let token = TokenIssuer::new(policy, Duration::from_secs(60))
            .issue(&[Claim::new(email, "alice@example.com")])
            .unwrap();

        let backend = pipeline.backend.lock().clone().unwrap();
        let ctx = backend.validate(&token.access_token).await.unwrap();
        assert_eq!(ctx.subject.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_scheme_not_configured() {
        let state = RegistrationState::new();
        let pipeline = RecordingPipeline::default();

        let result = use_security(&pipeline, &ServiceCollection::new(), &state, false);
        assert!(matches!(result, Err(AuthError::SchemeNotConfigured)));
        assert!(pipeline.steps.lock().is_empty());
        assert!(!state.is_set(RegistrationFlag::PipelineActivated));
    }
}
