//! # Bastion Auth
//!
//! Authentication wiring for Bastion hosts.
//!
//! ## Features
//!
//! - Idempotent security registration through [`SecurityBuilder`]
//! - Bearer token scheme (HS256 JWT with issuer, audience and lifetime checks)
//! - Default id/password, custom user-model and built-in provider flows
//! - Claims-based token issuance and validation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authenticator;
pub mod bearer;
pub mod builder;
pub mod context;
pub mod docs;
pub mod error;
pub mod pipeline;
pub mod provider;
pub mod scheme;
pub mod service;
pub mod settings;
pub mod state;
pub mod token;

pub use authenticator::{
    Authenticator, CredentialHashFn, PasswordHashAuthenticator, UserAuthenticator,
    UserCredentials,
};
pub use bearer::{AuthBackend, JwtBearerBackend};
pub use builder::SecurityBuilder;
pub use context::AuthContext;
pub use docs::{
    annotate_documentation, BearerSecurityScheme, DocumentationAnnotator, RegistryAnnotator,
};
pub use error::AuthError;
pub use pipeline::{use_security, RequestPipeline};
pub use provider::{
    AzureAdAuthModel, BuiltinProvider, FacebookAuthModel, GoogleAuthModel, Provider,
    ProviderRegistration, TwitterAuthModel, UserAuthenticatorFactory,
};
pub use scheme::{TokenSchemeConfigurator, TokenValidationPolicy, BEARER_SCHEME};
pub use service::{SecurityService, UserSecurityService};
pub use settings::{
    AzureAdSettings, FacebookSettings, GoogleSettings, SecuritySettings, SigningSecret,
    TwitterSettings,
};
pub use state::{Guarded, RegistrationFlag, RegistrationState};
pub use token::{SecurityToken, TokenIssuer};
