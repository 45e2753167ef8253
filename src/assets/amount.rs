//! Display-unit and minor-unit amount conversion
//!
//! Display amounts parse into `rust_decimal::Decimal` and minor units are
//! `BigUint`, so 24-decimal assets never overflow. `parse_amount` is the
//! strict entry point used to validate requests. `to_minor_units` stays
//! lenient and converts unparsable input to `"0"`.

use crate::error::{SwapError, SwapResult};

use num_bigint::BigUint;
use num_traits::Zero;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Exact-identifier decimals table
const DECIMALS_TABLE: &[(&str, u8)] = &[
    ("BTC.BTC", 8),
    ("ETH.ETH", 18),
    ("SOL.SOL", 9),
    ("NEAR.NEAR", 24),
    ("ZEC.ZEC", 8),
    ("DOGE.DOGE", 8),
    ("LTC.LTC", 8),
];

/// Tickers of stable assets that use 6 decimals on every supported chain
const SIX_DECIMAL_TICKERS: &[&str] = &["USDC", "USDT"];

/// Decimals assumed when nothing else is known; the account-model default
pub const DEFAULT_DECIMALS: u8 = 18;

/// Heuristic decimals lookup for a composite identifier
pub fn decimals_for(identifier: &str) -> u8 {
    if let Some((_, decimals)) = DECIMALS_TABLE.iter().find(|(id, _)| *id == identifier) {
        return *decimals;
    }

    let upper = identifier.to_ascii_uppercase();
    if SIX_DECIMAL_TICKERS.iter().any(|ticker| upper.contains(ticker)) {
        return 6;
    }

    DEFAULT_DECIMALS
}

/// Decimals for an asset, preferring an authoritative catalog value
pub fn resolve_decimals(identifier: &str, authoritative: Option<u8>) -> u8 {
    authoritative.unwrap_or_else(|| decimals_for(identifier))
}

/// Parse a non-negative display amount. Plain and exponent notation are
/// accepted.
pub fn parse_amount(amount: &str) -> SwapResult<Decimal> {
    let trimmed = amount.trim();
    let value = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| SwapError::Configuration(format!("'{amount}' is not a decimal amount")))?;

    if value < Decimal::ZERO {
        return Err(SwapError::Configuration(format!(
            "amount '{amount}' is negative"
        )));
    }
    Ok(value)
}

/// Scale a display amount to minor units, flooring digits beyond `decimals`
pub fn minor_units(value: Decimal, decimals: u8) -> BigUint {
    let value = value.normalize();
    let mantissa = BigUint::from(value.mantissa().unsigned_abs());
    let scale = value.scale();
    let decimals = u32::from(decimals);
    let ten = BigUint::from(10u32);

    if scale <= decimals {
        mantissa * ten.pow(decimals - scale)
    } else {
        mantissa / ten.pow(scale - decimals)
    }
}

/// Convert a display amount to an integer minor-unit string, flooring any
/// digits beyond `decimals`. Invalid or negative input yields `"0"`.
pub fn to_minor_units(amount: &str, decimals: u8) -> String {
    parse_amount(amount)
        .map(|value| minor_units(value, decimals).to_string())
        .unwrap_or_else(|_| "0".to_string())
}

/// Convert an integer minor-unit string to display units, dropping trailing
/// fractional zeros. Returns `None` for non-integer input.
pub fn from_minor_units(minor: &str, decimals: u8) -> Option<String> {
    let minor = minor.trim();
    if minor.is_empty() || !minor.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let minor = BigUint::from_str(minor).ok()?;
    let unit = BigUint::from(10u32).pow(u32::from(decimals));
    let whole = &minor / &unit;
    let fraction = &minor % &unit;

    if fraction.is_zero() {
        return Some(whole.to_string());
    }
    let fraction = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    Some(format!("{whole}.{}", fraction.trim_end_matches('0')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units("1.23456789", 8), "123456789");
        assert_eq!(to_minor_units("0.00000001", 8), "1");
        assert_eq!(to_minor_units("1", 18), "1000000000000000000");
        assert_eq!(to_minor_units("250.5", 6), "250500000");
        assert_eq!(to_minor_units(".5", 2), "50");
        assert_eq!(to_minor_units("0", 8), "0");
    }

    #[test]
    fn test_to_minor_units_floors() {
        assert_eq!(to_minor_units("0.123456789", 8), "12345678");
        assert_eq!(to_minor_units("0.000000019", 8), "1");
        assert_eq!(to_minor_units("0.000000009", 8), "0");
    }

    #[test]
    fn test_to_minor_units_lenient() {
        assert_eq!(to_minor_units("abc", 6), "0");
        assert_eq!(to_minor_units("", 6), "0");
        assert_eq!(to_minor_units("-1.5", 6), "0");
        assert_eq!(to_minor_units("1.2.3", 6), "0");
        assert_eq!(to_minor_units("NaN", 6), "0");
        assert_eq!(to_minor_units("1e-8", 8), "1");
        assert_eq!(to_minor_units(" 2.5 ", 1), "25");
    }

    #[test]
    fn test_from_minor_units() {
        assert_eq!(from_minor_units("123456789", 8).as_deref(), Some("1.23456789"));
        assert_eq!(from_minor_units("168000000000", 8).as_deref(), Some("1680"));
        assert_eq!(from_minor_units("1", 8).as_deref(), Some("0.00000001"));
        assert_eq!(from_minor_units("0", 6).as_deref(), Some("0"));
        assert_eq!(from_minor_units("42", 0).as_deref(), Some("42"));
        assert_eq!(from_minor_units("12.5", 6), None);
    }

    #[test]
    fn test_decimals_for() {
        assert_eq!(decimals_for("BTC.BTC"), 8);
        assert_eq!(decimals_for("NEAR.NEAR"), 24);
        assert_eq!(decimals_for("ETH.USDC-0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"), 6);
        assert_eq!(decimals_for("SOL.USDT"), 6);
        assert_eq!(decimals_for("ARB.ARB"), 18);
        assert_eq!(resolve_decimals("ARB.ARB", Some(9)), 9);
        assert_eq!(resolve_decimals("ARB.ARB", None), 18);
    }

    #[test]
    fn test_parse_amount_rejects_bad_input() {
        assert_eq!(parse_amount(" 2.50 ").unwrap(), Decimal::new(25, 1));
        assert_eq!(parse_amount("1e-8").unwrap(), Decimal::new(1, 8));

        for bad in ["abc", "", "1.2.3", "NaN", "-1.5"] {
            assert!(
                matches!(parse_amount(bad), Err(SwapError::Configuration(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_minor_units_for_large_native_amounts() {
        // 10 million NEAR at 24 decimals exceeds what Decimal itself can hold
        assert_eq!(to_minor_units("10000000", 24), format!("1{}", "0".repeat(31)));
        assert_eq!(to_minor_units("1.000000000000000000000001", 24), "1000000000000000000000001");
        assert_eq!(
            from_minor_units("10000000000000000000000000000001", 24).as_deref(),
            Some("10000000.000000000000000000000001")
        );
    }
}
