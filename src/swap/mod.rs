//! Swap domain model
//!
//! Assets, quotes, active swaps (intents) and the canonical status machine.
//! Quotes and active swaps own copies of amounts and asset data; catalog
//! entries are shared read-only reference data.

mod intent;
mod quote;
mod status;

pub use intent::{ActiveSwap, ExecParams, ExecutionReceipt};
pub use quote::{ProviderKind, ProviderPayload, QuoteRequest, RefundContext, SwapQuote};
pub use status::{StatusSnapshot, SwapStatus};

use crate::assets::amount::decimals_for;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the home asset
pub const HOME_ASSET_ID: &str = "ZEC.ZEC";
pub const HOME_SYMBOL: &str = "ZEC";
pub const HOME_DECIMALS: u8 = 8;
const HOME_PROVIDER_ASSET_ID: &str = "nep141:zec.omft.near";

/// Swappable asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub chain: String,
    pub symbol: String,
    /// Composite `CHAIN.SYMBOL[-CONTRACT]` key
    pub identifier: String,
    pub name: String,
    pub decimals: u8,
    pub provider_asset_id: Option<String>,
}

impl Asset {
    pub fn new(
        chain: &str,
        symbol: &str,
        name: &str,
        decimals: u8,
        contract: Option<&str>,
        provider_asset_id: Option<&str>,
    ) -> Self {
        Self {
            chain: chain.to_string(),
            symbol: symbol.to_string(),
            identifier: composite_identifier(chain, symbol, contract),
            name: name.to_string(),
            decimals,
            provider_asset_id: provider_asset_id.map(str::to_string),
        }
    }

    /// The home asset (Zcash)
    pub fn home() -> Self {
        Self::new(
            HOME_SYMBOL,
            HOME_SYMBOL,
            "Zcash",
            HOME_DECIMALS,
            None,
            Some(HOME_PROVIDER_ASSET_ID),
        )
    }

    /// Build an asset from a composite identifier alone, using the decimals
    /// heuristics. Prefer catalog entries, which carry authoritative decimals.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let (chain, rest) = identifier.split_once('.')?;
        if chain.is_empty() || rest.is_empty() {
            return None;
        }
        if identifier == HOME_ASSET_ID {
            return Some(Self::home());
        }
        let symbol = rest.split_once('-').map(|(s, _)| s).unwrap_or(rest);

        Some(Self {
            chain: chain.to_string(),
            symbol: symbol.to_string(),
            identifier: identifier.to_string(),
            name: symbol.to_string(),
            decimals: decimals_for(identifier),
            provider_asset_id: None,
        })
    }

    pub fn is_home(&self) -> bool {
        self.identifier == HOME_ASSET_ID
    }
}

/// Synthesize the composite identifier; `native` contracts are ignored
pub fn composite_identifier(chain: &str, symbol: &str, contract: Option<&str>) -> String {
    match contract.map(str::trim) {
        Some(contract) if !contract.is_empty() && contract != "native" => {
            format!("{chain}.{symbol}-{contract}")
        }
        _ => format!("{chain}.{symbol}"),
    }
}

/// Swap direction relative to the home asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapDirection {
    /// External asset into the home asset
    Inbound,
    /// Home asset out to an external asset
    #[serde(alias = "crosspay")]
    Outbound,
}

impl SwapDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapDirection::Inbound => "inbound",
            SwapDirection::Outbound => "outbound",
        }
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SwapDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inbound" | "in" => Ok(SwapDirection::Inbound),
            "outbound" | "out" | "crosspay" => Ok(SwapDirection::Outbound),
            other => Err(format!("unknown swap direction: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_identifier() {
        assert_eq!(composite_identifier("BTC", "BTC", None), "BTC.BTC");
        assert_eq!(composite_identifier("ETH", "ETH", Some("native")), "ETH.ETH");
        assert_eq!(
            composite_identifier("ETH", "USDC", Some("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")),
            "ETH.USDC-0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
        );
    }

    #[test]
    fn test_from_identifier() {
        let usdc = Asset::from_identifier("ETH.USDC-0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")
            .unwrap();
        assert_eq!(usdc.chain, "ETH");
        assert_eq!(usdc.symbol, "USDC");
        assert_eq!(usdc.decimals, 6);

        assert!(Asset::from_identifier("ZEC.ZEC").unwrap().is_home());
        assert!(Asset::from_identifier("garbage").is_none());
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("crosspay".parse::<SwapDirection>().unwrap(), SwapDirection::Outbound);
        assert_eq!("inbound".parse::<SwapDirection>().unwrap(), SwapDirection::Inbound);
        assert!("sideways".parse::<SwapDirection>().is_err());
    }
}
