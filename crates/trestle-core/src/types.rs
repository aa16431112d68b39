//! Chain, token, address and amount primitives shared across the workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric identifier of a supported chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    pub const ETHEREUM: ChainId = ChainId(1);
    pub const OPTIMISM: ChainId = ChainId(10);
    pub const BASE: ChainId = ChainId(8453);
    pub const ARBITRUM: ChainId = ChainId(42161);
    pub const SEPOLIA: ChainId = ChainId(11155111);
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which deployment the session targets. Selects the input defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Default destination chain for a fresh transfer form.
    pub fn default_chain(&self) -> ChainId {
        match self {
            Network::Mainnet => ChainId::ETHEREUM,
            Network::Testnet => ChainId::SEPOLIA,
        }
    }
}

/// A checksummed-or-not `0x`-prefixed account address.
///
/// Parsing enforces well-formedness only (20 bytes of hex); checksum
/// verification is the wallet's concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

/// Error returned when an address string is not `0x` + 40 hex digits.
#[derive(Debug, Clone, Error)]
#[error("malformed account address: {0:?}")]
pub struct AddressParseError(pub String);

impl Address {
    /// Check well-formedness without constructing.
    pub fn is_well_formed(s: &str) -> bool {
        s.len() == 42
            && s.starts_with("0x")
            && s[2..].chars().all(|c| c.is_ascii_hexdigit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if Address::is_well_formed(s) {
            Ok(Address(s.to_string()))
        } else {
            Err(AddressParseError(s.to_string()))
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved token metadata used by the swap flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMeta {
    /// Ticker symbol, e.g. `"USDC"`.
    pub symbol: String,

    /// Token contract address on its chain.
    pub contract: Address,

    /// Number of decimals in the token's base unit.
    pub decimals: u8,

    /// Human-readable name.
    pub name: String,
}

/// One entry of the unified balance returned by the settlement engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    /// Ticker symbol.
    pub symbol: String,

    /// Aggregate balance across chains, as a decimal string.
    pub balance: String,

    /// Fiat valuation, when the engine provides one.
    pub fiat_value: Option<f64>,
}

/// Returns true when `s` parses as a finite decimal number greater than zero.
///
/// This is the amount clause of the input validity predicate; exactness does
/// not matter here, only sign and parseability.
pub fn amount_is_positive(s: &str) -> bool {
    matches!(s.trim().parse::<f64>(), Ok(v) if v.is_finite() && v > 0.0)
}

/// Error converting a readable decimal amount to integer base units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("malformed decimal amount: {0:?}")]
    Malformed(String),

    #[error("amount {amount:?} has more than {decimals} fractional digits")]
    TooManyDecimals { amount: String, decimals: u8 },

    #[error("amount {0:?} overflows the base-unit range")]
    Overflow(String),
}

/// Convert a readable decimal amount into integer base units.
///
/// Exact string arithmetic: `"1.5"` with 6 decimals becomes `1_500_000`.
/// Fractional digits beyond the token's precision are rejected rather than
/// rounded, since a quote for a different amount than the user typed must
/// never be requested.
pub fn to_base_units(amount: &str, decimals: u8) -> Result<u128, AmountError> {
    let amount = amount.trim();
    let malformed = || AmountError::Malformed(amount.to_string());

    let (int_part, frac_part) = match amount.split_once('.') {
        Some((i, f)) => (i, f),
        None => (amount, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(malformed());
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(malformed());
    }
    if frac_part.len() > decimals as usize {
        return Err(AmountError::TooManyDecimals {
            amount: amount.to_string(),
            decimals,
        });
    }

    let scale = 10u128
        .checked_pow(decimals as u32)
        .ok_or_else(|| AmountError::Overflow(amount.to_string()))?;

    let int_value: u128 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| AmountError::Overflow(amount.to_string()))?
    };

    let frac_value: u128 = if frac_part.is_empty() {
        0
    } else {
        let padded = frac_part
            .parse::<u128>()
            .map_err(|_| AmountError::Overflow(amount.to_string()))?;
        padded * 10u128.pow((decimals as usize - frac_part.len()) as u32)
    };

    int_value
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(|| AmountError::Overflow(amount.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_well_formed() {
        let addr: Address = "0x1111111111111111111111111111111111111111".parse().unwrap();
        assert_eq!(addr.as_str().len(), 42);

        assert!("0x123".parse::<Address>().is_err());
        assert!("1111111111111111111111111111111111111111ab".parse::<Address>().is_err());
        assert!("0xZZ11111111111111111111111111111111111111".parse::<Address>().is_err());
    }

    #[test]
    fn test_amount_is_positive() {
        assert!(amount_is_positive("10"));
        assert!(amount_is_positive("0.0001"));
        assert!(!amount_is_positive("0"));
        assert!(!amount_is_positive("-1"));
        assert!(!amount_is_positive(""));
        assert!(!amount_is_positive("abc"));
    }

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units("10", 6).unwrap(), 10_000_000);
        assert_eq!(to_base_units("1.5", 6).unwrap(), 1_500_000);
        assert_eq!(to_base_units("0.000001", 6).unwrap(), 1);
        assert_eq!(to_base_units(".5", 2).unwrap(), 50);
        assert_eq!(to_base_units("2.", 2).unwrap(), 200);
    }

    #[test]
    fn test_to_base_units_rejects() {
        assert!(matches!(
            to_base_units("1.2345678", 6),
            Err(AmountError::TooManyDecimals { .. })
        ));
        assert!(matches!(to_base_units("", 6), Err(AmountError::Malformed(_))));
        assert!(matches!(to_base_units("1,5", 6), Err(AmountError::Malformed(_))));
        assert!(matches!(to_base_units("-1", 6), Err(AmountError::Malformed(_))));
    }

    #[test]
    fn test_network_default_chain() {
        assert_eq!(Network::Mainnet.default_chain(), ChainId::ETHEREUM);
        assert_eq!(Network::Testnet.default_chain(), ChainId::SEPOLIA);
    }
}
