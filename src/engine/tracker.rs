//! Status lookups for published intents

use crate::metrics;
use crate::provider::SwapProvider;
use crate::swap::{ActiveSwap, ProviderKind, StatusSnapshot, SwapStatus};

use std::sync::Arc;
use tracing::{debug, warn};

const GENERIC_FAILURE: &str = "Swap failed at the provider";

pub struct StatusTracker {
    providers: Vec<Arc<dyn SwapProvider>>,
}

impl StatusTracker {
    pub fn new(providers: Vec<Arc<dyn SwapProvider>>) -> Self {
        Self { providers }
    }

    /// Look up an intent. Never fails: an inconclusive lookup is reported
    /// as `unknown`, and a `failed` snapshot always carries an error text.
    pub async fn poll(
        &self,
        provider: ProviderKind,
        intent_id: &str,
        deposit_address: Option<&str>,
    ) -> StatusSnapshot {
        let Some(source) = self.providers.iter().find(|p| p.kind() == provider) else {
            warn!("No {} provider configured to track intent {}", provider, intent_id);
            return StatusSnapshot::unknown();
        };

        let mut snapshot = source.poll(intent_id, deposit_address).await;
        if snapshot.status == SwapStatus::Failed
            && snapshot.error.as_deref().map_or(true, |e| e.trim().is_empty())
        {
            snapshot.error = Some(GENERIC_FAILURE.to_string());
        }

        metrics::record_poll(provider, snapshot.status);
        debug!("Intent {} via {} is {}", intent_id, provider, snapshot.status);
        snapshot
    }

    /// Poll the provider that issued `swap`, keyed by its intent id or deposit address
    pub async fn poll_swap(&self, swap: &ActiveSwap) -> StatusSnapshot {
        let key = swap.tracking_key().unwrap_or_default();
        self.poll(swap.provider, key, swap.deposit_address.as_deref())
            .await
    }
}
