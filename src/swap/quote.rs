//! Quote requests and normalized quotes

use super::{Asset, SwapDirection};
use crate::provider::near_intents::NearIntentsPayload;
use crate::provider::simulator::SimulatedPayload;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Liquidity provider that produced a quote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    NearIntents,
    Simulator,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::NearIntents => "near_intents",
            ProviderKind::Simulator => "simulator",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "near_intents" => Ok(ProviderKind::NearIntents),
            "simulator" => Ok(ProviderKind::Simulator),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Provider-specific fields needed to re-submit a quote for execution.
/// Only the provider that produced the variant interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderPayload {
    NearIntents(NearIntentsPayload),
    Simulator(SimulatedPayload),
}

impl ProviderPayload {
    pub fn provider(&self) -> ProviderKind {
        match self {
            ProviderPayload::NearIntents(_) => ProviderKind::NearIntents,
            ProviderPayload::Simulator(_) => ProviderKind::Simulator,
        }
    }
}

/// Refund destinations supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundContext {
    /// Refund address on the external (source) chain; mandatory for inbound
    pub source_chain_refund_address: Option<String>,
    /// Home-chain refund address for outbound swaps
    pub home_refund_address: Option<String>,
}

/// Input to the quote engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub direction: SwapDirection,
    /// The external asset; the other leg is always the home asset
    pub asset: Asset,
    /// Display units of the asset being sold
    pub amount: String,
    pub recipient: String,
    #[serde(default)]
    pub refund: RefundContext,
}

impl QuoteRequest {
    pub fn sell_asset(&self) -> Asset {
        match self.direction {
            SwapDirection::Inbound => self.asset.clone(),
            SwapDirection::Outbound => Asset::home(),
        }
    }

    pub fn buy_asset(&self) -> Asset {
        match self.direction {
            SwapDirection::Inbound => Asset::home(),
            SwapDirection::Outbound => self.asset.clone(),
        }
    }
}

/// Normalized, provider-independent quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub quote_id: String,
    pub provider: ProviderKind,
    pub direction: SwapDirection,
    pub from_asset: Asset,
    pub to_asset: Asset,
    /// Display units
    pub from_amount: String,
    /// Display units
    pub to_amount: String,
    pub fee_fraction: f64,
    pub expires_at: DateTime<Utc>,
    pub estimated_seconds: u64,
    pub payload: ProviderPayload,
}

impl SwapQuote {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Numeric output amount used for ranking
    pub fn to_amount_value(&self) -> f64 {
        self.to_amount.parse::<f64>().unwrap_or(0.0)
    }
}
