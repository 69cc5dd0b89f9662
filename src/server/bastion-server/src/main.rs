//! Bastion Server - Main entry point.
//!
//! Wires the security services into an in-memory registry from command-line
//! settings, activates them on a request pipeline, and optionally issues or
//! validates a token.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use bastion_auth::{
    use_security, AuthBackend, BearerSecurityScheme, PasswordHashAuthenticator, RegistryAnnotator,
    RegistrationState, RequestPipeline, SecurityBuilder, SecurityService, SecuritySettings,
    UserCredentials,
};
use bastion_claims::IdType;
use bastion_registry::{ServiceCollection, ServiceRegistryExt};
use clap::Parser;
use parking_lot::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bastion-server")]
#[command(about = "Bastion - idempotent security wiring with claims-based bearer tokens")]
#[command(version)]
struct Cli {
    /// Token signing secret
    #[arg(long, env = "BASTION_SECRET", hide_env_values = true)]
    secret: String,

    /// Token issuer
    #[arg(long, env = "BASTION_ISSUER")]
    issuer: String,

    /// Token audience
    #[arg(long, env = "BASTION_AUDIENCE")]
    audience: String,

    /// Clock skew tolerance in seconds
    #[arg(long, default_value_t = 300, env = "BASTION_CLOCK_SKEW_SECS")]
    clock_skew_secs: u64,

    /// Claim type carrying the user id (e.g. Name, Email, NameIdentifier)
    #[arg(long, default_value = "Name", env = "BASTION_ID_TYPE")]
    id_type: IdType,

    /// Lifetime of issued tokens in hours
    #[arg(long, default_value_t = 2, env = "BASTION_TOKEN_EXPIRY_HOURS")]
    token_expiry_hours: u64,

    /// Known user as `id:argon2-phc-hash` (repeatable)
    #[arg(long = "user")]
    users: Vec<String>,

    /// Annotate API documentation with the bearer requirement
    #[arg(long, env = "BASTION_DOCUMENTATION")]
    documentation: bool,

    /// Issue a token for `id:password`
    #[arg(long)]
    login: Option<String>,

    /// Validate a bearer token
    #[arg(long)]
    token: Option<String>,
}

/// Request pipeline that records what security activated on it.
#[derive(Default)]
struct HostPipeline {
    backend: Mutex<Option<Arc<dyn AuthBackend>>>,
    documentation: AtomicBool,
}

impl HostPipeline {
    fn backend(&self) -> Option<Arc<dyn AuthBackend>> {
        self.backend.lock().clone()
    }
}

impl RequestPipeline for HostPipeline {
    fn use_authentication(&self, backend: Arc<dyn AuthBackend>) {
        tracing::info!(backend = backend.name(), "Authentication enabled");
        *self.backend.lock() = Some(backend);
    }

    fn use_documentation(&self) {
        tracing::info!("API documentation enabled");
        self.documentation.store(true, Ordering::SeqCst);
    }
}

fn split_pair<'a>(value: &'a str, what: &str) -> anyhow::Result<(&'a str, &'a str)> {
    match value.split_once(':') {
        Some((id, rest)) if !id.is_empty() => Ok((id, rest)),
        _ => bail!("invalid {} '{}', expected id:value", what, value),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting Bastion server...");

    let settings = SecuritySettings::new(cli.secret.as_str(), cli.issuer, cli.audience)
        .with_clock_skew(std::time::Duration::from_secs(cli.clock_skew_secs))
        .with_id_type(cli.id_type)
        .with_token_expiry_hours(cli.token_expiry_hours);

    let mut hashes = HashMap::new();
    for user in &cli.users {
        let (id, hash) = split_pair(user, "user")?;
        hashes.insert(id.to_string(), hash.to_string());
    }
    tracing::info!(users = hashes.len(), "Loaded user hashes");

    let registry = ServiceCollection::new();
    let state = RegistrationState::new();
    let annotator = RegistryAnnotator::new(&registry);
    let pipeline = HostPipeline::default();

    let authenticator = PasswordHashAuthenticator::with_static_hashes(hashes);
    SecurityBuilder::new(
        settings,
        &registry,
        &state,
        cli.documentation.then_some(&annotator as &dyn bastion_auth::DocumentationAnnotator),
    )
    .context("failed to configure security")?
    .register_default_with(move || authenticator.clone())?;

    use_security(&pipeline, &registry, &state, cli.documentation)?;

    for descriptor in registry.descriptors() {
        tracing::debug!(service = descriptor.service, lifetime = ?descriptor.lifetime, "Registered service");
    }

    if pipeline.documentation.load(Ordering::SeqCst) {
        if let Some(scheme) = registry.resolve::<BearerSecurityScheme>() {
            println!("{}", serde_json::to_string_pretty(&scheme.to_openapi())?);
        }
    }

    if let Some(login) = &cli.login {
        let (id, password) = split_pair(login, "login")?;
        let service = registry.require::<SecurityService>()?;
        let token = service
            .generate_token(&UserCredentials::new(id, password))
            .await
            .context("login failed")?;
        println!("{}", serde_json::to_string_pretty(&token)?);
    }

    if let Some(token) = &cli.token {
        let Some(backend) = pipeline.backend() else {
            bail!("authentication is not active on the pipeline");
        };
        let context = backend.validate(token).await.context("token rejected")?;
        println!("{}", serde_json::to_string_pretty(&context)?);
    }

    tracing::info!("Bastion server finished");

    Ok(())
}
