//! API documentation annotation.
//!
//! When a documentation generator is present, the API description is marked
//! as requiring a bearer token in the `Authorization` header. This happens at
//! most once per [`RegistrationState`].

use std::sync::Arc;

use bastion_registry::{ServiceRegistry, ServiceRegistryExt};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::AuthError;
use crate::state::{Guarded, RegistrationFlag, RegistrationState};

/// Name of the documented security requirement.
pub const BEARER_REQUIREMENT: &str = "Bearer";

/// Bearer token security scheme as described to API documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BearerSecurityScheme {
    /// Requirement name.
    #[serde(skip)]
    pub name: &'static str,
    /// Scheme type.
    #[serde(rename = "type")]
    pub scheme_type: &'static str,
    /// Where the token is carried.
    #[serde(rename = "in")]
    pub location: &'static str,
    /// Carrying header.
    #[serde(rename = "name")]
    pub parameter: &'static str,
    /// Human-readable description.
    pub description: &'static str,
}

impl Default for BearerSecurityScheme {
    fn default() -> Self {
        Self {
            name: BEARER_REQUIREMENT,
            scheme_type: "apiKey",
            location: "header",
            parameter: "Authorization",
            description: "JWT Authorization header using the Bearer scheme. \
                          Example: \"Authorization: Bearer {token}\"",
        }
    }
}

impl BearerSecurityScheme {
    /// Renders the scheme as an OpenAPI `securitySchemes` entry.
    pub fn to_openapi(&self) -> serde_json::Value {
        serde_json::json!({ self.name: self })
    }

    /// Renders the global security requirement referencing this scheme.
    pub fn requirement(&self) -> serde_json::Value {
        serde_json::json!([{ self.name: [] }])
    }
}

/// Documentation generator hook.
pub trait DocumentationAnnotator: Send + Sync {
    /// Marks every documented operation as requiring `scheme`.
    fn require_bearer(&self, scheme: &BearerSecurityScheme);
}

/// Annotator publishing the scheme to a service registry.
///
/// Documentation generators resolve [`BearerSecurityScheme`] from the
/// registry when rendering.
pub struct RegistryAnnotator<'r> {
    registry: &'r dyn ServiceRegistry,
}

impl<'r> RegistryAnnotator<'r> {
    /// Creates an annotator writing into `registry`.
    pub fn new(registry: &'r dyn ServiceRegistry) -> Self {
        Self { registry }
    }
}

impl DocumentationAnnotator for RegistryAnnotator<'_> {
    fn require_bearer(&self, scheme: &BearerSecurityScheme) {
        self.registry.register_singleton(Arc::new(scheme.clone()));
    }
}

/// Annotates API documentation with the bearer requirement unless `state`
/// says it already was.
pub fn annotate_documentation(
    annotator: &dyn DocumentationAnnotator,
    state: &RegistrationState,
) -> Result<(), AuthError> {
    let scheme = BearerSecurityScheme::default();
    let outcome = state.run_once(RegistrationFlag::Documentation, scheme.name, || {
        annotator.require_bearer(&scheme);
        Ok::<_, AuthError>(())
    })?;

    match outcome {
        Guarded::Ran(()) => info!(scheme = scheme.name, "Annotated API documentation with bearer requirement"),
        Guarded::AlreadySet { .. } => debug!("API documentation already annotated"),
    }

    Ok(())
}
