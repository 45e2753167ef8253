//! Turns an accepted quote into a published intent

use crate::clock::Clock;
use crate::error::{SwapError, SwapResult};
use crate::metrics;
use crate::provider::SwapProvider;
use crate::swap::{ExecParams, ExecutionReceipt, SwapQuote};

use std::sync::Arc;
use tracing::{info, warn};

pub struct IntentExecutor {
    providers: Vec<Arc<dyn SwapProvider>>,
    clock: Arc<dyn Clock>,
}

impl IntentExecutor {
    pub fn new(providers: Vec<Arc<dyn SwapProvider>>, clock: Arc<dyn Clock>) -> Self {
        Self { providers, clock }
    }

    /// Publish the intent behind `quote` with the provider that issued it.
    /// Nothing is persisted here.
    pub async fn execute(&self, quote: &SwapQuote, params: &ExecParams) -> SwapResult<ExecutionReceipt> {
        let now = self.clock.now();
        if quote.is_expired(now) {
            warn!("Refusing to execute quote {}: expired at {}", quote.quote_id, quote.expires_at);
            return Err(SwapError::StaleQuote {
                quote_id: quote.quote_id.clone(),
                expired_at: quote.expires_at,
            });
        }

        if params.destination_address.trim().is_empty() {
            return Err(SwapError::Configuration(
                "a confirmed destination address is required to execute".to_string(),
            ));
        }

        let provider = self
            .providers
            .iter()
            .find(|provider| provider.kind() == quote.provider)
            .ok_or_else(|| {
                SwapError::Configuration(format!(
                    "quote {} came from {}, which is not configured",
                    quote.quote_id, quote.provider
                ))
            })?;

        match provider.execute(quote, params).await {
            Ok(receipt) => {
                metrics::record_intent_executed(quote.provider, quote.direction.as_str());
                info!(
                    "Executed quote {} via {}: intent {}, deposit {}",
                    quote.quote_id, quote.provider, receipt.intent_id, receipt.deposit_address
                );
                Ok(receipt)
            }
            Err(e) => {
                metrics::record_execution_failure(quote.provider, &e);
                warn!("Execution of quote {} failed: {}", quote.quote_id, e);
                Err(e)
            }
        }
    }
}
