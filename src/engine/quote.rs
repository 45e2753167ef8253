//! Quote aggregation across providers

use crate::assets::parse_amount;
use crate::chain::is_zcash_address;
use crate::error::{SwapError, SwapResult};
use crate::metrics;
use crate::provider::SwapProvider;
use crate::swap::{QuoteRequest, SwapDirection, SwapQuote};

use futures::future::join_all;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct QuoteEngine {
    providers: Vec<Arc<dyn SwapProvider>>,
}

impl QuoteEngine {
    pub fn new(providers: Vec<Arc<dyn SwapProvider>>) -> Self {
        Self { providers }
    }

    /// Dry-run quotes from every provider, best output first.
    ///
    /// Usage errors are reported before any provider is contacted. Provider
    /// failures only surface when no provider produced a quote.
    pub async fn get_quotes(&self, request: &QuoteRequest) -> SwapResult<Vec<SwapQuote>> {
        validate_request(request)?;

        if self.providers.is_empty() {
            return Err(SwapError::Configuration(
                "no swap providers configured".to_string(),
            ));
        }

        debug!(
            "Requesting {} quotes for {} {} from {} provider(s)",
            request.direction,
            request.amount,
            request.asset.identifier,
            self.providers.len()
        );

        let results = join_all(self.providers.iter().map(|provider| async move {
            let kind = provider.kind();
            metrics::record_quote_request(kind, request.direction.as_str());
            let result = provider.quote(request).await;
            if let Err(e) = &result {
                metrics::record_quote_failure(kind, e);
                warn!("Quote from {} failed: {}", kind, e);
            }
            result
        }))
        .await;

        let mut quotes = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(quote) => quotes.push(quote),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        if quotes.is_empty() {
            return Err(first_error.unwrap_or_else(|| {
                SwapError::Internal("no provider returned a quote".to_string())
            }));
        }

        quotes.sort_by(|a, b| {
            b.to_amount_value()
                .partial_cmp(&a.to_amount_value())
                .unwrap_or(Ordering::Equal)
        });

        info!(
            "Best quote {} from {}: {} {} -> {} {}",
            quotes[0].quote_id,
            quotes[0].provider,
            quotes[0].from_amount,
            quotes[0].from_asset.symbol,
            quotes[0].to_amount,
            quotes[0].to_asset.symbol
        );

        Ok(quotes)
    }
}

fn validate_request(request: &QuoteRequest) -> SwapResult<()> {
    if request.asset.is_home() {
        return Err(SwapError::Configuration(
            "select an external asset to swap against ZEC".to_string(),
        ));
    }

    if request.amount.trim().is_empty() {
        return Err(SwapError::Configuration("amount is required".to_string()));
    }
    if parse_amount(&request.amount)?.is_zero() {
        return Err(SwapError::Configuration(
            "amount must be greater than zero".to_string(),
        ));
    }

    if request.recipient.trim().is_empty() {
        return Err(SwapError::Configuration(
            "recipient address is required".to_string(),
        ));
    }

    let has_source_refund = request
        .refund
        .source_chain_refund_address
        .as_deref()
        .is_some_and(|address| !address.trim().is_empty());
    if request.direction == SwapDirection::Inbound && !has_source_refund {
        return Err(SwapError::Configuration(format!(
            "a {} refund address is required for inbound swaps",
            request.asset.chain
        )));
    }

    if let Some(home_refund) = request.refund.home_refund_address.as_deref() {
        if !home_refund.trim().is_empty() && !is_zcash_address(home_refund) {
            return Err(SwapError::Configuration(format!(
                "'{home_refund}' is not a Zcash refund address"
            )));
        }
    }

    Ok(())
}
