//! Error types for the swap engine

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for quote, execution and persistence operations
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("{provider} returned HTTP {status}: {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Quote {quote_id} expired at {expired_at}")]
    StaleQuote {
        quote_id: String,
        expired_at: DateTime<Utc>,
    },

    #[error("Malformed response ({context}): {raw}")]
    MalformedResponse { context: String, raw: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Swap {0} not found")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwapError {
    /// Check if the same request may succeed later or against another provider
    pub fn is_retryable(&self) -> bool {
        match self {
            SwapError::Network(_) | SwapError::Timeout { .. } => true,
            SwapError::Provider { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Check if the caller has to fix its input before retrying
    pub fn is_user_error(&self) -> bool {
        match self {
            SwapError::Configuration(_) | SwapError::StaleQuote { .. } => true,
            SwapError::Provider { status, .. } => (400..500).contains(status) && *status != 429,
            _ => false,
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SwapError::Configuration(_) => "configuration",
            SwapError::Network(_) => "network",
            SwapError::Timeout { .. } => "timeout",
            SwapError::Provider { .. } => "provider",
            SwapError::StaleQuote { .. } => "stale_quote",
            SwapError::MalformedResponse { .. } => "malformed_response",
            SwapError::Database(_) => "database",
            SwapError::Serialization(_) => "serialization",
            SwapError::NotFound(_) => "not_found",
            SwapError::Internal(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for SwapError {
    fn from(err: reqwest::Error) -> Self {
        let mut message = err.to_string();
        let mut walk: &dyn std::error::Error = &err;
        while let Some(src) = walk.source() {
            message.push_str(&format!(" : {src}"));
            walk = src;
        }
        if err.is_timeout() {
            SwapError::Timeout { operation: message }
        } else {
            SwapError::Network(message)
        }
    }
}

/// Result type for swap operations
pub type SwapResult<T> = Result<T, SwapError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_error(status: u16) -> SwapError {
        SwapError::Provider {
            provider: "near_intents".to_string(),
            status,
            message: "nope".to_string(),
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(SwapError::Network("reset".into()).is_retryable());
        assert!(provider_error(503).is_retryable());
        assert!(provider_error(429).is_retryable());
        assert!(!provider_error(400).is_retryable());
        assert!(!SwapError::Configuration("missing refund".into()).is_retryable());
    }

    #[test]
    fn test_user_error_classification() {
        assert!(provider_error(400).is_user_error());
        assert!(!provider_error(429).is_user_error());
        assert!(SwapError::StaleQuote {
            quote_id: "q".into(),
            expired_at: Utc::now(),
        }
        .is_user_error());
        assert!(!SwapError::Network("down".into()).is_user_error());
    }

    #[test]
    fn test_provider_error_display_carries_status_and_text() {
        let msg = provider_error(422).to_string();
        assert!(msg.contains("near_intents"));
        assert!(msg.contains("422"));
        assert!(msg.contains("nope"));
    }
}
