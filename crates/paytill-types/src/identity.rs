//! Identity types for the paytill ledger
//!
//! ID types are strongly typed wrappers around UUIDs to prevent accidental
//! mixing of different ID kinds. Owners are identified by free-form strings
//! issued upstream (store/supplier/affiliate record ids), qualified by an
//! [`OwnerKind`].

use crate::currency::Currency;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Convert to prefixed string
            pub fn to_prefixed_string(&self) -> String {
                format!("{}_{}", $prefix, self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

define_id_type!(WalletId, "wallet", "Unique identifier for a wallet row");
define_id_type!(
    TransactionId,
    "wtx",
    "Unique identifier for a wallet transaction audit record"
);
define_id_type!(SettlementId, "settle", "Unique identifier for a settlement batch");

/// Upstream identifier of a wallet owner (store, supplier, affiliate, ...).
///
/// Owners are keyed by whatever id the calling system uses; the ledger treats
/// it as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Create an owner id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Category of wallet owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerKind {
    /// A merchant store selling through the platform
    Store,
    /// A supplier fulfilling store orders
    Supplier,
    /// An affiliate earning commissions
    Affiliate,
    /// The platform's own wallet (fees, float)
    Platform,
}

impl OwnerKind {
    /// Stable uppercase name as stored and logged
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Store => "STORE",
            Self::Supplier => "SUPPLIER",
            Self::Affiliate => "AFFILIATE",
            Self::Platform => "PLATFORM",
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unique key of a wallet row: one wallet exists per (owner, kind, currency).
///
/// `Ord` is derived so that multi-row operations can take row locks in a
/// deterministic global order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WalletKey {
    pub owner: OwnerId,
    pub owner_kind: OwnerKind,
    pub currency: Currency,
}

impl WalletKey {
    /// Build a wallet key
    pub fn new(owner: impl Into<OwnerId>, owner_kind: OwnerKind, currency: Currency) -> Self {
        Self {
            owner: owner.into(),
            owner_kind,
            currency,
        }
    }
}

impl fmt::Display for WalletKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.owner_kind, self.owner, self.currency)
    }
}

/// Key of a settlement schedule: one schedule exists per (owner, kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerKey {
    pub owner: OwnerId,
    pub owner_kind: OwnerKind,
}

impl OwnerKey {
    /// Build an owner key
    pub fn new(owner: impl Into<OwnerId>, owner_kind: OwnerKind) -> Self {
        Self {
            owner: owner.into(),
            owner_kind,
        }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner_kind, self.owner)
    }
}

/// Correlation to the business event that caused a transaction
/// (an order, a settlement, a dispute, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionRef {
    /// Kind of the referenced event, e.g. `"ORDER"` or `"SETTLEMENT"`
    pub kind: String,
    /// Id of the referenced event in the upstream system
    pub id: String,
}

impl TransactionRef {
    /// Build a reference to an arbitrary business event
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Reference linking a transaction to a settlement batch
    pub fn settlement(id: &SettlementId) -> Self {
        Self::new("SETTLEMENT", id.to_string())
    }

    /// Whether this reference points at the given settlement
    pub fn is_settlement(&self, id: &SettlementId) -> bool {
        self.kind == "SETTLEMENT" && self.id == id.to_string()
    }
}

impl fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_id_prefix() {
        let id = WalletId::new();
        let s = id.to_string();
        assert!(s.starts_with("wallet_"));
    }

    #[test]
    fn test_id_parsing_round_trip() {
        let id = TransactionId::new();
        let parsed = TransactionId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);

        let bare = id.as_uuid().to_string();
        let parsed = TransactionId::parse(&bare).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_wallet_key_display() {
        let key = WalletKey::new("S1", OwnerKind::Store, Currency::usd());
        assert_eq!(key.to_string(), "STORE:S1:USD");
    }

    #[test]
    fn test_wallet_key_ordering_is_total() {
        let a = WalletKey::new("A", OwnerKind::Store, Currency::usd());
        let b = WalletKey::new("B", OwnerKind::Store, Currency::usd());
        assert!(a < b);
        assert!(!(b < a));
    }

    #[test]
    fn test_settlement_reference() {
        let id = SettlementId::new();
        let reference = TransactionRef::settlement(&id);
        assert_eq!(reference.kind, "SETTLEMENT");
        assert!(reference.is_settlement(&id));
        assert!(!reference.is_settlement(&SettlementId::new()));
    }
}
