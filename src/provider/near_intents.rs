//! NEAR Intents 1Click client
//!
//! Quotes are requested dry against `/v0/quote`; execution re-submits the
//! stored request with `dry: false` to obtain a deposit address. Status comes
//! from the explorer's transaction search.

use super::response::{
    first_array, first_decimal, first_f64, first_string, require_string,
    AMOUNT_OUT_FORMATTED_RULES, AMOUNT_OUT_RULES, CORRELATION_ID_RULES, DEPOSIT_ADDRESS_RULES, INTENT_ID_RULES,
    TIME_ESTIMATE_RULES, TRANSACTION_LIST_RULES,
};
use super::http::{HttpReply, HttpTransport};
use super::{AssetSource, SwapProvider};
use crate::assets::{
    chain_for_blockchain, from_minor_units, resolve, resolve_decimals, to_minor_units,
};
use crate::chain::{classify, is_mainnet_transparent};
use crate::clock::Clock;
use crate::config::Settings;
use crate::error::{SwapError, SwapResult};
use crate::swap::{
    composite_identifier, Asset, ExecParams, ExecutionReceipt, ProviderKind, ProviderPayload,
    QuoteRequest, StatusSnapshot, SwapDirection, SwapQuote, SwapStatus,
};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const PROVIDER_NAME: &str = "near_intents";

const SWAP_TYPE_EXACT_INPUT: &str = "EXACT_INPUT";
const ORIGIN_CHAIN: &str = "ORIGIN_CHAIN";
const DESTINATION_CHAIN: &str = "DESTINATION_CHAIN";

/// Used when the provider reports no time estimate
const DEFAULT_ESTIMATED_SECONDS: u64 = 120;

const DEFAULT_FEE_FRACTION: f64 = 0.003;
/// Upper clamp for fee fractions, 0.9999
const MAX_FEE_FRACTION_BPS: i64 = 9_999;
/// Decimal places kept when dividing itemized fees by the sell amount
const FEE_RATIO_SCALE: u32 = 12;

const FEE_FRACTION_RULES: &[&str] = &["/quote/feeFraction", "/feeFraction", "/feePercent"];
const FEE_LIST_RULES: &[&str] = &["/quote/fees", "/fees"];
const AMOUNT_IN_USD_RULES: &[&str] = &["/quote/amountInUsd", "/amountInUsd"];
const AMOUNT_OUT_USD_RULES: &[&str] = &["/quote/amountOutUsd", "/amountOutUsd"];

const TX_STATUS_RULES: &[&str] = &["/status"];
const TX_HASH_RULES: &[&str] = &["/depositTxHash", "/txHash"];
const TX_AMOUNT_IN_RULES: &[&str] = &["/amountInFormatted", "/amountIn", "/fromAmount"];
const TX_AMOUNT_OUT_RULES: &[&str] = &["/amountOutFormatted", "/amountOut", "/toAmount"];
const TX_ERROR_RULES: &[&str] = &["/errorMessage", "/error", "/failureReason"];

/// Body of a `/v0/quote` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequestBody {
    pub dry: bool,
    pub swap_type: String,
    pub slippage_tolerance: u32,
    pub origin_asset: String,
    pub destination_asset: String,
    /// Minor units of the origin asset
    pub amount: String,
    pub recipient: String,
    pub recipient_type: String,
    pub deposit_type: String,
    pub refund_to: String,
    pub refund_type: String,
    pub deadline: String,
}

/// Re-submission data carried inside a NEAR Intents quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearIntentsPayload {
    pub quote_request: QuoteRequestBody,
    /// The dry quote was priced for the placeholder recipient
    pub used_placeholder_recipient: bool,
}

#[derive(Debug, Deserialize)]
struct TokensResponse {
    #[serde(default)]
    items: Vec<TokenEntry>,
}

#[derive(Debug, Deserialize)]
struct TokenEntry {
    defuse_asset_id: String,
    symbol: String,
    blockchain: String,
    #[serde(default)]
    decimals: Option<u8>,
    #[serde(default)]
    contract_address: Option<String>,
}

/// Live provider backed by the NEAR Intents HTTP APIs
pub struct NearIntentsProvider {
    http: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
    quote_url: String,
    tokens_url: String,
    explorer_url: String,
    slippage_bps: u32,
    quote_deadline: chrono::Duration,
    placeholder_recipient: String,
}

impl NearIntentsProvider {
    pub fn new(settings: &Settings, http: Arc<dyn HttpTransport>, clock: Arc<dyn Clock>) -> Self {
        Self {
            http,
            clock,
            quote_url: settings.provider.quote_url.clone(),
            tokens_url: settings.provider.tokens_url.clone(),
            explorer_url: settings.provider.explorer_url.clone(),
            slippage_bps: settings.swap.slippage_bps,
            quote_deadline: settings.swap.quote_deadline(),
            placeholder_recipient: settings.swap.placeholder_recipient.clone(),
        }
    }

    fn deadline(&self) -> DateTime<Utc> {
        self.clock.now() + self.quote_deadline
    }

    /// Build the dry-run request for a quote
    fn build_quote_body(&self, request: &QuoteRequest, deadline: DateTime<Utc>) -> SwapResult<(QuoteRequestBody, bool)> {
        let sell = request.sell_asset();
        let buy = request.buy_asset();
        let recipient = request.recipient.trim();

        let (recipient, used_placeholder, refund_to, refund_type) = match request.direction {
            SwapDirection::Inbound => {
                let refund = non_empty(&request.refund.source_chain_refund_address).ok_or_else(|| {
                    SwapError::Configuration(
                        "a source-chain refund address is required for inbound quotes".to_string(),
                    )
                })?;

                // The provider only prices mainnet transparent recipients
                let (recipient, placeholder) = if is_mainnet_transparent(recipient) {
                    (recipient.to_string(), false)
                } else {
                    (self.placeholder_recipient.clone(), true)
                };
                (recipient, placeholder, normalize_refund_address(refund), ORIGIN_CHAIN)
            }
            SwapDirection::Outbound => match non_empty(&request.refund.home_refund_address) {
                Some(home_refund) => (
                    recipient.to_string(),
                    false,
                    home_refund.to_string(),
                    ORIGIN_CHAIN,
                ),
                None => (
                    recipient.to_string(),
                    false,
                    normalize_refund_address(recipient),
                    DESTINATION_CHAIN,
                ),
            },
        };

        let body = QuoteRequestBody {
            dry: true,
            swap_type: SWAP_TYPE_EXACT_INPUT.to_string(),
            slippage_tolerance: self.slippage_bps,
            origin_asset: resolve(&sell.identifier, sell.provider_asset_id.as_deref()),
            destination_asset: resolve(&buy.identifier, buy.provider_asset_id.as_deref()),
            amount: to_minor_units(&request.amount, sell.decimals),
            recipient,
            recipient_type: DESTINATION_CHAIN.to_string(),
            deposit_type: ORIGIN_CHAIN.to_string(),
            refund_to,
            refund_type: refund_type.to_string(),
            deadline: format_deadline(deadline),
        };

        Ok((body, used_placeholder))
    }

    async fn post_quote(&self, body: &QuoteRequestBody) -> SwapResult<Value> {
        let payload = serde_json::to_string(body)?;
        let response = self.http.post_json(self.quote_url.clone(), payload).await?;

        parse_success(response)
    }

    async fn lookup(&self, search: &str) -> SwapResult<StatusSnapshot> {
        let url = reqwest::Url::parse_with_params(&self.explorer_url, &[("search", search)])
            .map_err(|e| SwapError::Configuration(format!("invalid explorer url: {e}")))?;

        let response = self.http.get_json(url.to_string()).await?;
        let value = parse_success(response)?;

        Ok(snapshot_from_explorer(&value))
    }
}

#[async_trait]
impl AssetSource for NearIntentsProvider {
    async fn fetch_assets(&self) -> SwapResult<Vec<Asset>> {
        let response = self.http.get_json(self.tokens_url.clone()).await?;
        if !response.is_success() {
            return Err(provider_error(response));
        }

        parse_tokens(&response.body)
    }
}

#[async_trait]
impl SwapProvider for NearIntentsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::NearIntents
    }

    async fn quote(&self, request: &QuoteRequest) -> SwapResult<SwapQuote> {
        let deadline = self.deadline();
        let (body, used_placeholder) = self.build_quote_body(request, deadline)?;
        if used_placeholder {
            info!(
                "Recipient is not a mainnet transparent address, quoting with placeholder {}",
                self.placeholder_recipient
            );
        }

        debug!(
            "Requesting {} quote: {} {} -> {}",
            request.direction, body.amount, body.origin_asset, body.destination_asset
        );
        let value = self.post_quote(&body).await?;

        let buy = request.buy_asset();
        let to_amount = match first_string(&value, AMOUNT_OUT_FORMATTED_RULES) {
            Some(formatted) => formatted,
            None => {
                let raw = require_string(&value, AMOUNT_OUT_RULES, "quote output amount")?;
                from_minor_units(&raw, buy.decimals).ok_or_else(|| SwapError::MalformedResponse {
                    context: format!("non-integer output amount {raw}"),
                    raw: value.to_string(),
                })?
            }
        };

        let fee_fraction = derive_fee_fraction(&value, &body.amount);
        let estimated_seconds = first_f64(&value, TIME_ESTIMATE_RULES)
            .map(|secs| secs.max(0.0).round() as u64)
            .unwrap_or(DEFAULT_ESTIMATED_SECONDS);
        let quote_id = first_string(&value, CORRELATION_ID_RULES)
            .unwrap_or_else(|| format!("near-{}", Uuid::new_v4().simple()));

        info!(
            "Quote {}: {} {} -> {} {}",
            quote_id, request.amount, request.sell_asset().symbol, to_amount, buy.symbol
        );

        Ok(SwapQuote {
            quote_id,
            provider: ProviderKind::NearIntents,
            direction: request.direction,
            from_asset: request.sell_asset(),
            to_asset: buy,
            from_amount: request.amount.trim().to_string(),
            to_amount,
            fee_fraction,
            expires_at: deadline,
            estimated_seconds,
            payload: ProviderPayload::NearIntents(NearIntentsPayload {
                quote_request: body,
                used_placeholder_recipient: used_placeholder,
            }),
        })
    }

    async fn execute(&self, quote: &SwapQuote, params: &ExecParams) -> SwapResult<ExecutionReceipt> {
        let payload = match &quote.payload {
            ProviderPayload::NearIntents(payload) => payload,
            other => {
                return Err(SwapError::Internal(format!(
                    "{} payload handed to {}",
                    other.provider(),
                    PROVIDER_NAME
                )))
            }
        };

        let body = execution_body(payload, quote.direction, params, format_deadline(self.deadline()))?;

        info!(
            "Publishing intent for quote {} (recipient {})",
            quote.quote_id, body.recipient
        );
        let value = self.post_quote(&body).await?;

        let deposit_address = require_string(&value, DEPOSIT_ADDRESS_RULES, "deposit address")?;
        let intent_id =
            first_string(&value, INTENT_ID_RULES).unwrap_or_else(|| quote.quote_id.clone());

        info!("Intent {} published, deposit to {}", intent_id, deposit_address);

        Ok(ExecutionReceipt {
            intent_id,
            deposit_address,
        })
    }

    async fn poll(&self, intent_id: &str, deposit_address: Option<&str>) -> StatusSnapshot {
        let search = deposit_address
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .unwrap_or_else(|| intent_id.trim());
        if search.is_empty() {
            return StatusSnapshot::unknown();
        }

        match self.lookup(search).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Indexing lag and tracker outages are expected
                warn!("Status lookup for {} inconclusive: {}", search, e);
                StatusSnapshot::unknown()
            }
        }
    }
}

/// Turn a stored dry-run request into the executable one
fn execution_body(
    payload: &NearIntentsPayload,
    direction: SwapDirection,
    params: &ExecParams,
    deadline: String,
) -> SwapResult<QuoteRequestBody> {
    let mut body = payload.quote_request.clone();
    body.dry = false;
    body.deadline = deadline;

    let destination = params.destination_address.trim();
    match direction {
        SwapDirection::Inbound => {
            if is_mainnet_transparent(destination) {
                body.recipient = destination.to_string();
            } else if !destination.is_empty() || payload.used_placeholder_recipient {
                return Err(SwapError::Configuration(format!(
                    "execution requires a mainnet transparent (t1/t3) destination, got '{destination}'"
                )));
            }
            if let Some(refund) = non_empty(&params.source_chain_refund_address) {
                body.refund_to = normalize_refund_address(refund);
                body.refund_type = ORIGIN_CHAIN.to_string();
            }
        }
        SwapDirection::Outbound => {
            if !destination.is_empty() {
                body.recipient = destination.to_string();
            }
            if let Some(home_refund) = non_empty(&params.home_refund_address) {
                body.refund_to = home_refund.to_string();
                body.refund_type = ORIGIN_CHAIN.to_string();
            }
        }
    }

    Ok(body)
}

fn parse_success(response: HttpReply) -> SwapResult<Value> {
    if !response.is_success() {
        return Err(provider_error(response));
    }

    serde_json::from_str(&response.body).map_err(|e| SwapError::MalformedResponse {
        context: format!("invalid JSON: {e}"),
        raw: response.body,
    })
}

fn provider_error(response: HttpReply) -> SwapError {
    SwapError::Provider {
        provider: PROVIDER_NAME.to_string(),
        status: response.status,
        message: response.body,
    }
}

fn parse_tokens(body: &str) -> SwapResult<Vec<Asset>> {
    let tokens: TokensResponse =
        serde_json::from_str(body).map_err(|e| SwapError::MalformedResponse {
            context: format!("token list: {e}"),
            raw: body.to_string(),
        })?;

    Ok(tokens
        .items
        .into_iter()
        .map(|token| {
            let chain = chain_for_blockchain(&token.blockchain);
            let identifier =
                composite_identifier(&chain, &token.symbol, token.contract_address.as_deref());
            Asset::new(
                &chain,
                &token.symbol,
                &token.symbol,
                resolve_decimals(&identifier, token.decimals),
                token.contract_address.as_deref(),
                Some(&token.defuse_asset_id),
            )
        })
        .collect())
}

fn snapshot_from_explorer(value: &Value) -> StatusSnapshot {
    let tx = match first_array(value, TRANSACTION_LIST_RULES).and_then(|txs| txs.first()) {
        Some(tx) => tx,
        // Nothing indexed for this deposit yet
        None => return StatusSnapshot::new(SwapStatus::AwaitingDeposit),
    };

    let raw_status = first_string(tx, TX_STATUS_RULES).unwrap_or_default();
    let status = SwapStatus::from_provider(&raw_status);
    if status == SwapStatus::Unknown {
        debug!("Unmapped provider status '{}'", raw_status);
    }

    StatusSnapshot {
        status,
        settlement_tx_ref: first_string(tx, TX_HASH_RULES),
        error: if status == SwapStatus::Failed {
            first_string(tx, TX_ERROR_RULES)
        } else {
            None
        },
        from_amount: first_string(tx, TX_AMOUNT_IN_RULES),
        to_amount: first_string(tx, TX_AMOUNT_OUT_RULES),
    }
}

/// Fee fraction from, in order: an explicit value, the itemized fee list over
/// the sell amount, the USD spread, or the default
fn derive_fee_fraction(value: &Value, sell_amount_minor: &str) -> f64 {
    let max = Decimal::new(MAX_FEE_FRACTION_BPS, 4);

    first_decimal(value, FEE_FRACTION_RULES)
        .or_else(|| itemized_fee_fraction(value, sell_amount_minor))
        .or_else(|| usd_spread(value))
        .and_then(|fraction| fraction.clamp(Decimal::ZERO, max).to_f64())
        .unwrap_or(DEFAULT_FEE_FRACTION)
}

/// Sum of the itemized minor-unit fees over the minor-unit sell amount
fn itemized_fee_fraction(value: &Value, sell_amount_minor: &str) -> Option<Decimal> {
    let fees = first_array(value, FEE_LIST_RULES)?;
    let sell = BigUint::from_str(sell_amount_minor.trim())
        .ok()
        .filter(|sell| !sell.is_zero())?;

    let total: BigUint = fees
        .iter()
        .filter_map(|fee| first_string(fee, &["/amount"]))
        .filter_map(|amount| BigUint::from_str(&amount).ok())
        .sum();

    let ratio = total * BigUint::from(10u32).pow(FEE_RATIO_SCALE) / sell;
    Some(Decimal::new(ratio.to_i64()?, FEE_RATIO_SCALE))
}

fn usd_spread(value: &Value) -> Option<Decimal> {
    let amount_in = first_decimal(value, AMOUNT_IN_USD_RULES).filter(|v| *v > Decimal::ZERO)?;
    let amount_out = first_decimal(value, AMOUNT_OUT_USD_RULES)?;
    Some(Decimal::ONE - amount_out.checked_div(amount_in)?)
}

/// EVM addresses are case-insensitive and the provider wants them lowercase;
/// every other format is case-sensitive and passes through
pub fn normalize_refund_address(address: &str) -> String {
    let address = address.trim();
    match classify(address) {
        Some(chain) if chain.is_evm() => address.to_ascii_lowercase(),
        _ => address.to_string(),
    }
}

fn format_deadline(deadline: DateTime<Utc>) -> String {
    deadline.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
