//! Offline provider for mock mode
//!
//! Prices come from a fixed rate table. Intent ids carry their execution
//! time, so status is a pure function of the id and the injected clock and
//! any simulator instance can answer for any intent.

use super::{AssetSource, SwapProvider};
use crate::assets::{fallback_assets, parse_amount};
use crate::clock::Clock;
use crate::error::{SwapError, SwapResult};
use crate::swap::{
    Asset, ExecParams, ExecutionReceipt, ProviderKind, ProviderPayload, QuoteRequest,
    StatusSnapshot, SwapQuote, SwapStatus,
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// USD reference prices
const RATE_TABLE: &[(&str, i64)] = &[
    ("BTC.BTC", 42_000),
    ("ETH.ETH", 2_200),
    ("SOL.SOL", 100),
    ("ZEC.ZEC", 25),
];

const DEFAULT_RATE: i64 = 100;
const BUY_AMOUNT_DP: u32 = 8;
const FEE_FRACTION: f64 = 0.003;
const ESTIMATED_SECONDS: u64 = 120;
const QUOTE_TTL_SECS: i64 = 60;

/// Upper bounds (seconds since execution) of each simulated stage
const TIMELINE: &[(i64, SwapStatus)] = &[
    (10, SwapStatus::AwaitingDeposit),
    (15, SwapStatus::DepositDetected),
    (20, SwapStatus::Confirming),
    (35, SwapStatus::Swapping),
    (45, SwapStatus::Completing),
];

const INTENT_PREFIX: &str = "mock-intent-";

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
/// `t1` plus 33 characters, the length of a transparent address
const DEPOSIT_ADDRESS_BODY_LEN: usize = 33;

/// Re-submission data carried inside a simulated quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedPayload {
    pub sell_asset: String,
    pub buy_asset: String,
    pub sell_amount: String,
    pub buy_amount: String,
}

pub struct SimulatorProvider {
    clock: Arc<dyn Clock>,
}

impl SimulatorProvider {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl AssetSource for SimulatorProvider {
    async fn fetch_assets(&self) -> SwapResult<Vec<Asset>> {
        Ok(fallback_assets())
    }
}

#[async_trait]
impl SwapProvider for SimulatorProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Simulator
    }

    async fn quote(&self, request: &QuoteRequest) -> SwapResult<SwapQuote> {
        let sell = request.sell_asset();
        let buy = request.buy_asset();

        let invalid = || SwapError::Provider {
            provider: ProviderKind::Simulator.to_string(),
            status: 400,
            message: format!("invalid amount '{}'", request.amount),
        };

        let sell_amount = parse_amount(&request.amount)
            .ok()
            .filter(|amount| !amount.is_zero())
            .ok_or_else(invalid)?;

        let buy_amount = sell_amount
            .checked_mul(rate_for(&sell.identifier))
            .and_then(|usd| usd.checked_div(rate_for(&buy.identifier)))
            .ok_or_else(invalid)?
            .round_dp(BUY_AMOUNT_DP);
        let buy_amount = format!("{:.8}", buy_amount);
        let now = self.clock.now();

        debug!(
            "Simulated quote {} {} -> {} {}",
            request.amount, sell.identifier, buy_amount, buy.identifier
        );

        Ok(SwapQuote {
            quote_id: format!("mock-{}", Uuid::new_v4().simple()),
            provider: ProviderKind::Simulator,
            direction: request.direction,
            payload: ProviderPayload::Simulator(SimulatedPayload {
                sell_asset: sell.identifier.clone(),
                buy_asset: buy.identifier.clone(),
                sell_amount: request.amount.trim().to_string(),
                buy_amount: buy_amount.clone(),
            }),
            from_asset: sell,
            to_asset: buy,
            from_amount: request.amount.trim().to_string(),
            to_amount: buy_amount,
            fee_fraction: FEE_FRACTION,
            expires_at: now + Duration::seconds(QUOTE_TTL_SECS),
            estimated_seconds: ESTIMATED_SECONDS,
        })
    }

    async fn execute(&self, quote: &SwapQuote, _params: &ExecParams) -> SwapResult<ExecutionReceipt> {
        if let ProviderPayload::NearIntents(_) = &quote.payload {
            return Err(SwapError::Internal(format!(
                "{} payload handed to simulator",
                quote.payload.provider()
            )));
        }

        let intent_id = intent_id_at(self.clock.now());
        let deposit_address = deposit_address_for(&intent_id);
        info!("Simulated intent {} created, deposit to {}", intent_id, deposit_address);

        Ok(ExecutionReceipt {
            intent_id,
            deposit_address,
        })
    }

    async fn poll(&self, intent_id: &str, _deposit_address: Option<&str>) -> StatusSnapshot {
        let Some(started_at) = started_at(intent_id) else {
            return StatusSnapshot::unknown();
        };

        let elapsed = (self.clock.now() - started_at).num_seconds();
        let status = status_after(elapsed);

        let mut snapshot = StatusSnapshot::new(status);
        match status {
            SwapStatus::AwaitingDeposit => {}
            SwapStatus::DepositDetected | SwapStatus::Confirming | SwapStatus::Swapping => {
                snapshot.settlement_tx_ref = Some(tx_ref("deposit", intent_id));
            }
            _ => {
                snapshot.settlement_tx_ref = Some(tx_ref("output", intent_id));
            }
        }

        snapshot
    }
}

/// `mock-intent-{unix millis}-{nonce}`
fn intent_id_at(now: DateTime<Utc>) -> String {
    format!("{INTENT_PREFIX}{}-{}", now.timestamp_millis(), Uuid::new_v4().simple())
}

/// Execution time encoded in a simulated intent id
fn started_at(intent_id: &str) -> Option<DateTime<Utc>> {
    let rest = intent_id.strip_prefix(INTENT_PREFIX)?;
    let (millis, _nonce) = rest.split_once('-')?;
    Utc.timestamp_millis_opt(millis.parse().ok()?).single()
}

fn rate_for(identifier: &str) -> Decimal {
    let rate = RATE_TABLE
        .iter()
        .find(|(id, _)| *id == identifier)
        .map(|(_, rate)| *rate)
        .unwrap_or(DEFAULT_RATE);
    Decimal::from(rate)
}

/// Simulated status after `elapsed` seconds
fn status_after(elapsed: i64) -> SwapStatus {
    TIMELINE
        .iter()
        .find(|(until, _)| elapsed < *until)
        .map(|(_, status)| *status)
        .unwrap_or(SwapStatus::Completed)
}

/// Deterministic transparent-looking address for an intent
fn deposit_address_for(intent_id: &str) -> String {
    let digest = Sha3_256::digest(intent_id.as_bytes());
    let body: String = digest
        .iter()
        .cycle()
        .take(DEPOSIT_ADDRESS_BODY_LEN)
        .map(|byte| BASE58_ALPHABET[*byte as usize % BASE58_ALPHABET.len()] as char)
        .collect();
    format!("t1{body}")
}

fn tx_ref(stage: &str, intent_id: &str) -> String {
    let mut hasher = Sha3_256::new();
    hasher.update(stage.as_bytes());
    hasher.update(intent_id.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{classify, is_mainnet_transparent, ChainTag};
    use crate::clock::ManualClock;
    use crate::swap::{RefundContext, SwapDirection};

    fn btc_request(amount: &str) -> QuoteRequest {
        QuoteRequest {
            direction: SwapDirection::Inbound,
            asset: Asset::new("BTC", "BTC", "Bitcoin", 8, None, Some("nep141:btc.omft.near")),
            amount: amount.to_string(),
            recipient: "t1VpYecBW4UudbGcy4ufh61eWxQCoFaUrPs".to_string(),
            refund: RefundContext {
                source_chain_refund_address: Some("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq".to_string()),
                home_refund_address: None,
            },
        }
    }

    #[tokio::test]
    async fn test_quote_uses_rate_table() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let simulator = SimulatorProvider::new(clock.clone());

        let quote = simulator.quote(&btc_request("1.0")).await.unwrap();
        assert_eq!(quote.to_amount, "1680.00000000");
        assert_eq!(quote.fee_fraction, FEE_FRACTION);
        assert_eq!(quote.expires_at, clock.now() + Duration::seconds(60));

        assert!(simulator.quote(&btc_request("abc")).await.is_err());
        assert!(simulator.quote(&btc_request("0")).await.is_err());
        assert!(simulator.quote(&btc_request("-2")).await.is_err());

        // 0.3 BTC at 42000 / 25 is 504 exactly; no binary float residue
        let quote = simulator.quote(&btc_request("0.3")).await.unwrap();
        assert_eq!(quote.to_amount, "504.00000000");
    }

    #[test]
    fn test_deposit_address_format() {
        let address = deposit_address_for("mock-intent-1");
        assert_eq!(address.len(), 35);
        assert!(is_mainnet_transparent(&address));
        assert_eq!(classify(&address), Some(ChainTag::Zcash));
        assert_eq!(address, deposit_address_for("mock-intent-1"));
        assert_ne!(address, deposit_address_for("mock-intent-2"));
    }

    #[test]
    fn test_timeline() {
        assert_eq!(status_after(0), SwapStatus::AwaitingDeposit);
        assert_eq!(status_after(12), SwapStatus::DepositDetected);
        assert_eq!(status_after(19), SwapStatus::Confirming);
        assert_eq!(status_after(34), SwapStatus::Swapping);
        assert_eq!(status_after(40), SwapStatus::Completing);
        assert_eq!(status_after(45), SwapStatus::Completed);
        assert_eq!(status_after(86_400), SwapStatus::Completed);
    }

    #[tokio::test]
    async fn test_poll_progression() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let simulator = SimulatorProvider::new(clock.clone());
        let quote = simulator.quote(&btc_request("1.0")).await.unwrap();
        let receipt = simulator
            .execute(&quote, &ExecParams::default())
            .await
            .unwrap();

        let first = simulator.poll(&receipt.intent_id, None).await;
        assert_eq!(first.status, SwapStatus::AwaitingDeposit);
        assert!(first.settlement_tx_ref.is_none());

        clock.advance(Duration::seconds(25));
        let swapping = simulator.poll(&receipt.intent_id, None).await;
        assert_eq!(swapping.status, SwapStatus::Swapping);
        assert_eq!(swapping.settlement_tx_ref.as_ref().map(String::len), Some(64));

        clock.advance(Duration::seconds(30));
        let done = simulator.poll(&receipt.intent_id, None).await;
        assert_eq!(done.status, SwapStatus::Completed);
        assert_ne!(done.settlement_tx_ref, swapping.settlement_tx_ref);

        for id in ["mock-intent-missing", "mock-intent-12x-abc", "0xdeadbeef", ""] {
            assert_eq!(simulator.poll(id, None).await.status, SwapStatus::Unknown);
        }
    }

    #[tokio::test]
    async fn test_any_instance_tracks_an_intent() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let executing = SimulatorProvider::new(clock.clone());
        let quote = executing.quote(&btc_request("1.0")).await.unwrap();
        let receipt = executing
            .execute(&quote, &ExecParams::default())
            .await
            .unwrap();

        // A process restart builds a new simulator
        let restarted = SimulatorProvider::new(clock.clone());
        assert_eq!(
            restarted.poll(&receipt.intent_id, None).await.status,
            SwapStatus::AwaitingDeposit
        );

        clock.advance(Duration::seconds(60));
        let same = executing.poll(&receipt.intent_id, None).await;
        let fresh = restarted.poll(&receipt.intent_id, None).await;
        assert_eq!(same.status, SwapStatus::Completed);
        assert_eq!(fresh.status, SwapStatus::Completed);
        assert_eq!(same.settlement_tx_ref, fresh.settlement_tx_ref);
    }

    #[test]
    fn test_intent_id_carries_start_time() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).single().unwrap();
        let id = intent_id_at(at);
        assert!(id.starts_with("mock-intent-1700000000123-"));
        assert_eq!(started_at(&id), Some(at));
        assert_ne!(id, intent_id_at(at));
    }
}
