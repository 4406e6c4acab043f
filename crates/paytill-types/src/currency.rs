//! Currency codes for the paytill ledger
//!
//! Wallets are per-currency. Codes are ISO-4217-style strings normalized to
//! uppercase; the ledger never converts between currencies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A currency code such as `"USD"` or `"EUR"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Create a currency from a code, trimming and uppercasing it
    pub fn new(code: impl AsRef<str>) -> Self {
        Self(code.as_ref().trim().to_ascii_uppercase())
    }

    /// US dollars, the platform default
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    /// The normalized code
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::usd()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}
