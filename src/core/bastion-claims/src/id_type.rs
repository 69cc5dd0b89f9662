//! Canonical identity types and the claim-type catalog.
//!
//! Every [`IdType`] maps to exactly one canonical claim-type URI. The mapping
//! lives in a [`ClaimTypeCatalog`] that is populated once and is read-only
//! afterwards. Resolution fails until the catalog has been loaded.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::error::ClaimsError;

const WS_2005: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/";
const WS_2008: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/";
const WS_2009: &str = "http://schemas.xmlsoap.org/ws/2009/09/identity/claims/";

macro_rules! id_types {
    ($($variant:ident => ($ns:ident, $suffix:literal),)+) => {
        /// Canonical identity field.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[allow(missing_docs)]
        pub enum IdType {
            $($variant,)+
        }

        impl IdType {
            /// Every identity type, in declaration order.
            pub const ALL: &'static [IdType] = &[$(IdType::$variant,)+];

            /// Returns the variant name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(IdType::$variant => stringify!($variant),)+
                }
            }
        }

        /// Builds the claim-type table. Only called by [`ClaimTypeCatalog::load`].
        fn claim_type_table() -> HashMap<IdType, String> {
            let mut table = HashMap::with_capacity(IdType::ALL.len());
            $(table.insert(IdType::$variant, format!("{}{}", $ns, $suffix));)+
            table
        }
    };
}

id_types! {
    Actor => (WS_2009, "actor"),
    Anonymous => (WS_2005, "anonymous"),
    Authentication => (WS_2005, "authentication"),
    AuthenticationInstant => (WS_2008, "authenticationinstant"),
    AuthenticationMethod => (WS_2008, "authenticationmethod"),
    AuthorizationDecision => (WS_2005, "authorizationdecision"),
    CookiePath => (WS_2008, "cookiepath"),
    Country => (WS_2005, "country"),
    DateOfBirth => (WS_2005, "dateofbirth"),
    DenyOnlyPrimaryGroupSid => (WS_2008, "denyonlyprimarygroupsid"),
    DenyOnlyPrimarySid => (WS_2008, "denyonlyprimarysid"),
    DenyOnlySid => (WS_2005, "denyonlysid"),
    DenyOnlyWindowsDeviceGroup => (WS_2008, "denyonlywindowsdevicegroup"),
    Dns => (WS_2005, "dns"),
    Dsa => (WS_2008, "dsa"),
    Email => (WS_2005, "emailaddress"),
    Expiration => (WS_2008, "expiration"),
    Expired => (WS_2008, "expired"),
    Gender => (WS_2005, "gender"),
    GivenName => (WS_2005, "givenname"),
    GroupSid => (WS_2008, "groupsid"),
    Hash => (WS_2005, "hash"),
    HomePhone => (WS_2005, "homephone"),
    IsPersistent => (WS_2008, "ispersistent"),
    Locality => (WS_2005, "locality"),
    MobilePhone => (WS_2005, "mobilephone"),
    Name => (WS_2005, "name"),
    NameIdentifier => (WS_2005, "nameidentifier"),
    OtherPhone => (WS_2005, "otherphone"),
    PostalCode => (WS_2005, "postalcode"),
    PrimaryGroupSid => (WS_2008, "primarygroupsid"),
    PrimarySid => (WS_2008, "primarysid"),
    Role => (WS_2008, "role"),
    Rsa => (WS_2005, "rsa"),
    SerialNumber => (WS_2008, "serialnumber"),
    Sid => (WS_2005, "sid"),
    Spn => (WS_2005, "spn"),
    StateOrProvince => (WS_2005, "stateorprovince"),
    StreetAddress => (WS_2005, "streetaddress"),
    Surname => (WS_2005, "surname"),
    System => (WS_2005, "system"),
    Thumbprint => (WS_2005, "thumbprint"),
    Upn => (WS_2005, "upn"),
    Uri => (WS_2005, "uri"),
    UserData => (WS_2008, "userdata"),
    Version => (WS_2008, "version"),
    Webpage => (WS_2005, "webpage"),
    WindowsAccountName => (WS_2008, "windowsaccountname"),
    WindowsDeviceClaim => (WS_2008, "windowsdeviceclaim"),
    WindowsDeviceGroup => (WS_2008, "windowsdevicegroup"),
    WindowsFqbnVersion => (WS_2008, "windowsfqbnversion"),
    WindowsSubAuthority => (WS_2008, "windowssubauthority"),
    WindowsUserClaim => (WS_2008, "windowsuserclaim"),
    X500DistinguishedName => (WS_2005, "x500distinguishedname"),
}

impl Default for IdType {
    fn default() -> Self {
        IdType::Name
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdType {
    type Err = ClaimsError;

    /// Parses a variant name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IdType::ALL
            .iter()
            .copied()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ClaimsError::UnknownIdType(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for IdType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Mapping from [`IdType`] to canonical claim-type strings.
///
/// The mapping is populated at most once; concurrent `load` calls race on a
/// [`OnceLock`] and all observe the same table.
#[derive(Debug, Default)]
pub struct ClaimTypeCatalog {
    table: OnceLock<HashMap<IdType, String>>,
}

static GLOBAL_CATALOG: ClaimTypeCatalog = ClaimTypeCatalog::new();

impl ClaimTypeCatalog {
    /// Creates an empty, unloaded catalog.
    pub const fn new() -> Self {
        Self {
            table: OnceLock::new(),
        }
    }

    /// Returns the process-wide catalog.
    pub fn global() -> &'static ClaimTypeCatalog {
        &GLOBAL_CATALOG
    }

    /// Populates the catalog if it has not been populated yet.
    pub fn load(&self) {
        self.table.get_or_init(|| {
            debug!(count = IdType::ALL.len(), "Loading claim type catalog");
            claim_type_table()
        });
    }

    /// Whether [`load`](Self::load) has completed.
    pub fn is_loaded(&self) -> bool {
        self.table.get().is_some()
    }

    /// Resolves an identity type to its canonical claim-type string.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::UnknownIdType`] if the catalog is not loaded.
    pub fn resolve(&self, id_type: IdType) -> Result<&str, ClaimsError> {
        self.table
            .get()
            .and_then(|table| table.get(&id_type))
            .map(String::as_str)
            .ok_or_else(|| ClaimsError::UnknownIdType(id_type.to_string()))
    }

    /// Resolves an identity type given by name.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimsError::UnknownIdType`] if the name is outside the known
    /// set or the catalog is not loaded.
    pub fn resolve_name(&self, name: &str) -> Result<&str, ClaimsError> {
        let id_type = name.parse::<IdType>()?;
        self.resolve(id_type)
    }
}

/// Loads the process-wide claim-type catalog.
pub fn load_claim_types() {
    ClaimTypeCatalog::global().load();
}
