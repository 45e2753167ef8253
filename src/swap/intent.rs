//! Executed intents and their tracked state

use super::{Asset, ProviderKind, StatusSnapshot, SwapDirection, SwapQuote, SwapStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generic message attached to failures without provider detail
const GENERIC_FAILURE: &str = "Swap failed at the provider";

/// Caller-confirmed addresses supplied at execution time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecParams {
    pub destination_address: String,
    pub source_chain_refund_address: Option<String>,
    pub home_refund_address: Option<String>,
}

/// Result of publishing an intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReceipt {
    pub intent_id: String,
    pub deposit_address: String,
}

/// A funded (or awaiting funding) swap intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSwap {
    pub id: String,
    pub direction: SwapDirection,
    pub status: SwapStatus,
    pub from_asset: Asset,
    pub from_amount: String,
    pub to_asset: Asset,
    pub to_amount: String,
    pub deposit_address: Option<String>,
    pub recipient_address: String,
    pub refund_address: Option<String>,
    pub quote_id: String,
    pub provider: ProviderKind,
    pub intent_id: Option<String>,
    pub settlement_tx_ref: Option<String>,
    /// Amounts reported by the tracker, when they differ from the quote
    pub settled_from_amount: Option<String>,
    pub settled_to_amount: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ActiveSwap {
    /// Record an executed quote. The swap starts out awaiting its deposit.
    pub fn from_execution(
        quote: &SwapQuote,
        params: &ExecParams,
        receipt: ExecutionReceipt,
        now: DateTime<Utc>,
    ) -> Self {
        let refund_address = match quote.direction {
            SwapDirection::Inbound => params.source_chain_refund_address.clone(),
            SwapDirection::Outbound => params.home_refund_address.clone(),
        };

        Self {
            id: Uuid::new_v4().to_string(),
            direction: quote.direction,
            status: SwapStatus::AwaitingDeposit,
            from_asset: quote.from_asset.clone(),
            from_amount: quote.from_amount.clone(),
            to_asset: quote.to_asset.clone(),
            to_amount: quote.to_amount.clone(),
            deposit_address: Some(receipt.deposit_address),
            recipient_address: params.destination_address.clone(),
            refund_address,
            quote_id: quote.quote_id.clone(),
            provider: quote.provider,
            intent_id: Some(receipt.intent_id),
            settlement_tx_ref: None,
            settled_from_amount: None,
            settled_to_amount: None,
            error: None,
            created_at: now,
            expires_at: quote.expires_at,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Merge a tracker snapshot into this record.
    ///
    /// Terminal records are frozen, `unknown` never overwrites a known status
    /// and the status never moves backwards. Returns true when anything
    /// changed.
    pub fn apply_snapshot(&mut self, snapshot: &StatusSnapshot, now: DateTime<Utc>) -> bool {
        if self.is_terminal() || snapshot.status == SwapStatus::Unknown {
            return false;
        }

        let mut changed = false;

        if self.status.can_transition_to(snapshot.status) {
            self.status = snapshot.status;
            changed = true;
        } else if snapshot.status != self.status {
            // Stale snapshot from an earlier stage
            return false;
        }

        changed |= merge_field(&mut self.settlement_tx_ref, &snapshot.settlement_tx_ref);
        changed |= merge_field(&mut self.settled_from_amount, &snapshot.from_amount);
        changed |= merge_field(&mut self.settled_to_amount, &snapshot.to_amount);

        if self.status == SwapStatus::Failed && self.error.is_none() {
            self.error = Some(
                snapshot
                    .error
                    .clone()
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            );
            changed = true;
        }

        if self.status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
            changed = true;
        }

        changed
    }

    /// Key used for tracker lookups: intent id, falling back to deposit address
    pub fn tracking_key(&self) -> Option<&str> {
        self.intent_id
            .as_deref()
            .or(self.deposit_address.as_deref())
    }
}

fn merge_field(slot: &mut Option<String>, incoming: &Option<String>) -> bool {
    match incoming {
        Some(value) if slot.as_deref() != Some(value.as_str()) => {
            *slot = Some(value.clone());
            true
        }
        _ => false,
    }
}
