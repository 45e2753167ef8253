//! Ordered extraction rules for provider response envelopes
//!
//! Providers move fields between a flat envelope and a nested `quote`
//! object. Each field is looked up through an explicit list of JSON
//! pointers, tried in order; the first non-empty value wins.

use crate::error::{SwapError, SwapResult};

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Where an execution response may carry the deposit address
pub const DEPOSIT_ADDRESS_RULES: &[&str] = &["/quote/depositAddress", "/depositAddress", "/deposit_address"];

/// Where an execution response may carry the intent identifier
pub const INTENT_ID_RULES: &[&str] = &["/signature", "/correlationId"];

/// Display-unit output amount
pub const AMOUNT_OUT_FORMATTED_RULES: &[&str] = &["/quote/amountOutFormatted", "/amountOutFormatted"];

/// Minor-unit output amount
pub const AMOUNT_OUT_RULES: &[&str] = &[
    "/quote/amountOut",
    "/amountOut",
    "/quote/expectedOutput",
    "/expectedOutput",
];

pub const TIME_ESTIMATE_RULES: &[&str] = &["/quote/timeEstimate", "/timeEstimate", "/estimatedTime"];

pub const CORRELATION_ID_RULES: &[&str] = &["/correlationId", "/quote/quoteId", "/quoteHash"];

/// Explorer transaction list
pub const TRANSACTION_LIST_RULES: &[&str] = &["/transactions", "/items"];

/// First rule yielding a non-empty string (numbers are rendered as text)
pub fn first_string(value: &Value, rules: &[&str]) -> Option<String> {
    rules
        .iter()
        .filter_map(|pointer| value.pointer(pointer))
        .find_map(as_text)
}

/// First rule yielding a number, accepting numeric strings
pub fn first_f64(value: &Value, rules: &[&str]) -> Option<f64> {
    rules
        .iter()
        .filter_map(|pointer| value.pointer(pointer))
        .find_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .filter(|n| n.is_finite())
}

/// First rule yielding an exact decimal, from a number or numeric string
pub fn first_decimal(value: &Value, rules: &[&str]) -> Option<Decimal> {
    rules
        .iter()
        .filter_map(|pointer| value.pointer(pointer))
        .find_map(|v| {
            let text = as_text(v)?;
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        })
}

/// Like [`first_string`], but absence is a malformed response
pub fn require_string(value: &Value, rules: &[&str], context: &str) -> SwapResult<String> {
    first_string(value, rules).ok_or_else(|| SwapError::MalformedResponse {
        context: format!("{context} (tried {})", rules.join(", ")),
        raw: value.to_string(),
    })
}

/// First array found through the rules
pub fn first_array<'a>(value: &'a Value, rules: &[&str]) -> Option<&'a Vec<Value>> {
    rules
        .iter()
        .filter_map(|pointer| value.pointer(pointer))
        .find_map(Value::as_array)
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_deposit_address() {
        let nested = json!({ "quote": { "depositAddress": "bc1qnested" } });
        assert_eq!(
            first_string(&nested, DEPOSIT_ADDRESS_RULES).as_deref(),
            Some("bc1qnested")
        );
    }

    #[test]
    fn test_flat_deposit_address() {
        let flat = json!({ "depositAddress": "bc1qflat" });
        assert_eq!(first_string(&flat, DEPOSIT_ADDRESS_RULES).as_deref(), Some("bc1qflat"));

        let snake = json!({ "deposit_address": "bc1qsnake" });
        assert_eq!(first_string(&snake, DEPOSIT_ADDRESS_RULES).as_deref(), Some("bc1qsnake"));
    }

    #[test]
    fn test_rule_order_and_empty_values() {
        let both = json!({
            "quote": { "depositAddress": "" },
            "depositAddress": "bc1qflat"
        });
        assert_eq!(first_string(&both, DEPOSIT_ADDRESS_RULES).as_deref(), Some("bc1qflat"));

        let both = json!({ "signature": "ed25519:sig", "correlationId": "corr" });
        assert_eq!(first_string(&both, INTENT_ID_RULES).as_deref(), Some("ed25519:sig"));
    }

    #[test]
    fn test_require_string_reports_raw() {
        let err = require_string(&json!({ "quote": {} }), DEPOSIT_ADDRESS_RULES, "deposit address")
            .unwrap_err();
        match err {
            SwapError::MalformedResponse { context, raw } => {
                assert!(context.starts_with("deposit address"));
                assert!(raw.contains("quote"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_numeric_fields() {
        let value = json!({ "quote": { "amountOut": 168000000000u64, "timeEstimate": "45" } });
        assert_eq!(first_string(&value, AMOUNT_OUT_RULES).as_deref(), Some("168000000000"));
        assert_eq!(first_f64(&value, TIME_ESTIMATE_RULES), Some(45.0));
    }
}
