//! # Bastion Claims
//!
//! Identity claims for authenticated principals.
//!
//! This crate provides:
//! - The canonical claim-type catalog ([`IdType`] to claim-type URI)
//! - The [`Claim`] value type
//! - Claims assembly from static values or from a user model through accessors

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod claim;
pub mod error;
pub mod id_type;

pub use builder::{ClaimKind, ClaimsBuilder, ClaimsCustomizer, UserClaimsBuilder};
pub use claim::Claim;
pub use error::ClaimsError;
pub use id_type::{load_claim_types, ClaimTypeCatalog, IdType};

/// Capability implemented by any user model the host application authenticates.
///
/// Claims assembly never looks at the model's fields directly; values are
/// pulled out through accessor functions supplied by the host.
pub trait AuthenticationUser: Send + Sync + 'static {}
