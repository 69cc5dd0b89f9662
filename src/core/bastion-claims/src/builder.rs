//! Claims assembly.
//!
//! [`ClaimsBuilder`] collects claims whose values are known up front.
//! [`UserClaimsBuilder`] is bound to one user model and can also pull values
//! out of it through accessor functions, evaluated when the claims are built.
//!
//! Both builders are value-returning accumulators: every `add_*` call takes
//! the builder by value and hands it back, and `build` borrows it so the
//! same builder can be built again after further additions.

use std::fmt;
use std::sync::Arc;

use crate::claim::Claim;
use crate::error::{BoxError, ClaimsError};
use crate::id_type::{ClaimTypeCatalog, IdType};
use crate::AuthenticationUser;

/// Claim type selector: a literal type string or a canonical [`IdType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimKind {
    /// Literal claim type, used as-is.
    Named(String),
    /// Canonical identity type, resolved through the catalog.
    Id(IdType),
}

impl ClaimKind {
    fn resolve(&self, catalog: &ClaimTypeCatalog) -> Result<String, ClaimsError> {
        match self {
            ClaimKind::Named(name) => Ok(name.clone()),
            ClaimKind::Id(id_type) => catalog.resolve(*id_type).map(str::to_string),
        }
    }
}

impl From<&str> for ClaimKind {
    fn from(value: &str) -> Self {
        ClaimKind::Named(value.to_string())
    }
}

impl From<String> for ClaimKind {
    fn from(value: String) -> Self {
        ClaimKind::Named(value)
    }
}

impl From<IdType> for ClaimKind {
    fn from(value: IdType) -> Self {
        ClaimKind::Id(value)
    }
}

/// Builder for claims with static values.
#[derive(Debug, Clone)]
pub struct ClaimsBuilder<'c> {
    catalog: &'c ClaimTypeCatalog,
    entries: Vec<(ClaimKind, String)>,
}

impl ClaimsBuilder<'static> {
    /// Creates a builder backed by the process-wide catalog.
    pub fn new() -> Self {
        Self::with_catalog(ClaimTypeCatalog::global())
    }
}

impl Default for ClaimsBuilder<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'c> ClaimsBuilder<'c> {
    /// Creates a builder backed by the given catalog.
    pub fn with_catalog(catalog: &'c ClaimTypeCatalog) -> Self {
        Self {
            catalog,
            entries: Vec::new(),
        }
    }

    /// Appends one claim.
    pub fn add_claim(mut self, kind: impl Into<ClaimKind>, value: impl Into<String>) -> Self {
        self.entries.push((kind.into(), value.into()));
        self
    }

    /// Number of claims added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no claims have been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the claims in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::UnknownIdType`] if an [`IdType`] claim cannot be
    /// resolved.
    pub fn build(&self) -> Result<Vec<Claim>, ClaimsError> {
        self.entries
            .iter()
            .map(|(kind, value)| Ok(Claim::new(kind.resolve(self.catalog)?, value.clone())))
            .collect()
    }
}

type Extractor<'u, U> = Box<dyn Fn(&U) -> Result<String, BoxError> + 'u>;

enum ClaimValue<'u, U> {
    Literal(String),
    Extract(Extractor<'u, U>),
}

/// Builder for claims about one user model instance.
pub struct UserClaimsBuilder<'u, U: AuthenticationUser> {
    user: &'u U,
    catalog: &'u ClaimTypeCatalog,
    entries: Vec<(ClaimKind, ClaimValue<'u, U>)>,
}

impl<'u, U: AuthenticationUser> UserClaimsBuilder<'u, U> {
    /// Creates a builder for `user` backed by the process-wide catalog.
    pub fn new(user: &'u U) -> Self {
        Self::with_catalog(user, ClaimTypeCatalog::global())
    }

    /// Creates a builder for `user` backed by the given catalog.
    pub fn with_catalog(user: &'u U, catalog: &'u ClaimTypeCatalog) -> Self {
        Self {
            user,
            catalog,
            entries: Vec::new(),
        }
    }

    /// The bound user.
    pub fn user(&self) -> &U {
        self.user
    }

    /// Appends one claim with a fixed value.
    pub fn add_claim(mut self, kind: impl Into<ClaimKind>, value: impl Into<String>) -> Self {
        self.entries.push((kind.into(), ClaimValue::Literal(value.into())));
        self
    }

    /// Appends one claim whose value is read from the user at build time.
    pub fn add_claim_from<F>(self, kind: impl Into<ClaimKind>, accessor: F) -> Self
    where
        F: Fn(&U) -> String + 'u,
    {
        self.try_add_claim_from(kind, move |user: &U| Ok::<_, BoxError>(accessor(user)))
    }

    /// Appends one claim whose value is read from the user at build time by a
    /// fallible accessor.
    ///
    /// A failing accessor makes [`build`](Self::build) fail; no claim is
    /// dropped silently.
    pub fn try_add_claim_from<F, E>(mut self, kind: impl Into<ClaimKind>, accessor: F) -> Self
    where
        F: Fn(&U) -> Result<String, E> + 'u,
        E: Into<BoxError>,
    {
        let extractor: Extractor<'u, U> = Box::new(move |user| accessor(user).map_err(Into::into));
        self.entries.push((kind.into(), ClaimValue::Extract(extractor)));
        self
    }

    /// Number of claims added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no claims have been added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evaluates every claim against the bound user, in insertion order.
    ///
    /// Either all claims are produced or an error is returned.
    ///
    /// # Errors
    ///
    /// - [`ClaimsError::UnknownIdType`] if an [`IdType`] cannot be resolved
    /// - [`ClaimsError::ClaimExtraction`] if an accessor fails
    pub fn build(&self) -> Result<Vec<Claim>, ClaimsError> {
        let mut claims = Vec::with_capacity(self.entries.len());

        for (kind, value) in &self.entries {
            let claim_type = kind.resolve(self.catalog)?;
            let value = match value {
                ClaimValue::Literal(value) => value.clone(),
                ClaimValue::Extract(extract) => match extract(self.user) {
                    Ok(value) => value,
                    Err(source) => {
                        return Err(ClaimsError::ClaimExtraction { claim_type, source });
                    },
                },
            };
            claims.push(Claim::new(claim_type, value));
        }

        Ok(claims)
    }

    /// Consumes the builder and returns its claims.
    pub fn into_claims(self) -> Result<Vec<Claim>, ClaimsError> {
        self.build()
    }
}

impl<U: AuthenticationUser> fmt::Debug for UserClaimsBuilder<'_, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&ClaimKind> = self.entries.iter().map(|(kind, _)| kind).collect();
        f.debug_struct("UserClaimsBuilder")
            .field("entries", &kinds)
            .finish_non_exhaustive()
    }
}

type CustomizeFn<U> =
    dyn for<'u> Fn(UserClaimsBuilder<'u, U>) -> UserClaimsBuilder<'u, U> + Send + Sync;

/// Host-supplied claim customization for a user model type.
///
/// Registered once at startup and applied to every user the model's
/// security service issues tokens for.
pub struct ClaimsCustomizer<U: AuthenticationUser> {
    customize: Arc<CustomizeFn<U>>,
}

impl<U: AuthenticationUser> ClaimsCustomizer<U> {
    /// Wraps a customization function.
    pub fn new<F>(customize: F) -> Self
    where
        F: for<'u> Fn(UserClaimsBuilder<'u, U>) -> UserClaimsBuilder<'u, U>
            + Send
            + Sync
            + 'static,
    {
        Self {
            customize: Arc::new(customize),
        }
    }

    /// Runs the customization on an existing builder.
    pub fn customize<'u>(&self, builder: UserClaimsBuilder<'u, U>) -> UserClaimsBuilder<'u, U> {
        (self.customize)(builder)
    }

    /// Builds the customized claims for `user`.
    pub fn apply(&self, user: &U) -> Result<Vec<Claim>, ClaimsError> {
        self.customize(UserClaimsBuilder::new(user)).into_claims()
    }
}

impl<U: AuthenticationUser> Clone for ClaimsCustomizer<U> {
    fn clone(&self) -> Self {
        Self {
            customize: Arc::clone(&self.customize),
        }
    }
}

impl<U: AuthenticationUser> fmt::Debug for ClaimsCustomizer<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimsCustomizer")
            .field("user_model", &std::any::type_name::<U>())
            .finish()
    }
}
