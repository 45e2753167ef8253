//! Configuration management for the swap engine
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable pointing at the configuration file
pub const CONFIG_ENV_VAR: &str = "ZECSWAP_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex =
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("env var pattern is valid");
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderConfig,
    pub swap: SwapConfig,
    pub tracker: TrackerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Bearer token for the 1Click API; empty forces mock mode
    pub api_key: Option<String>,
    /// Explicit override: `true` forces mock mode even with an API key
    pub use_mock: Option<bool>,
    pub quote_url: String,
    pub tokens_url: String,
    pub explorer_url: String,
    pub request_timeout_secs: u64,
    pub catalog_timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            use_mock: None,
            quote_url: "https://1click.chaindefuser.com/v0/quote".to_string(),
            tokens_url: "https://api-mng-console.chaindefuser.com/api/tokens".to_string(),
            explorer_url: "https://explorer.near-intents.org/api/v0/transactions".to_string(),
            request_timeout_secs: 30,
            catalog_timeout_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// Slippage tolerance in basis points
    pub slippage_bps: u32,
    pub quote_deadline_secs: u64,
    pub catalog_ttl_secs: u64,
    /// Mainnet transparent address substituted into dry quotes only
    pub placeholder_recipient: String,
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            slippage_bps: 300,
            quote_deadline_secs: 300,
            catalog_ttl_secs: 300,
            placeholder_recipient: "t1VpYecBW4UudbGcy4ufh61eWxQCoFaUrPs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub poll_interval_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
    /// Polls per swap before tracking is abandoned
    pub max_polls: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            max_backoff_ms: 60_000,
            jitter_ms: 1_000,
            max_polls: 720,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://zecswap.db?mode=rwc".to_string(),
            max_connections: 4,
            min_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl ProviderConfig {
    /// API key, if one is configured and non-empty
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Mock mode is forced without an API key and can be requested explicitly
    pub fn mock_mode(&self) -> bool {
        self.use_mock.unwrap_or(false) || self.api_key().is_none()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn catalog_timeout(&self) -> Duration {
        Duration::from_millis(self.catalog_timeout_ms)
    }
}

impl SwapConfig {
    pub fn quote_deadline(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.quote_deadline_secs as i64)
    }

    pub fn catalog_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.catalog_ttl_secs as i64)
    }
}

impl Settings {
    /// Load settings from `ZECSWAP_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let config_path = env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text, substituting `${VAR}` references
    pub fn parse(config_str: &str) -> Result<Self> {
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.swap.slippage_bps >= 10_000 {
            anyhow::bail!("slippage_bps must be below 10000");
        }
        if self.swap.quote_deadline_secs == 0 {
            anyhow::bail!("quote_deadline_secs must be positive");
        }
        if self.tracker.poll_interval_ms == 0 {
            anyhow::bail!("tracker.poll_interval_ms must be positive");
        }
        if self.tracker.max_backoff_ms < self.tracker.poll_interval_ms {
            anyhow::bail!("tracker.max_backoff_ms must be at least poll_interval_ms");
        }
        if !crate::chain::is_mainnet_transparent(&self.swap.placeholder_recipient) {
            anyhow::bail!(
                "placeholder_recipient {} is not a mainnet transparent address",
                self.swap.placeholder_recipient
            );
        }

        if !self.provider.mock_mode() {
            for (name, url) in [
                ("quote_url", &self.provider.quote_url),
                ("tokens_url", &self.provider.tokens_url),
                ("explorer_url", &self.provider.explorer_url),
            ] {
                if url.is_empty() {
                    anyhow::bail!("provider.{} is required in live mode", name);
                }
            }
        } else if self.provider.api_key().is_some() {
            tracing::warn!("API key configured but use_mock = true - running in mock mode");
        }

        Ok(())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("ZECSWAP_TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${ZECSWAP_TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_missing_api_key_forces_mock_mode() {
        let settings = Settings::parse("[provider]\napi_key = \"${ZECSWAP_UNSET_KEY}\"\n").unwrap();
        assert!(settings.provider.api_key().is_none());
        assert!(settings.provider.mock_mode());
    }

    #[test]
    fn test_api_key_enables_live_mode_unless_overridden() {
        let live = Settings::parse("[provider]\napi_key = \"secret\"\n").unwrap();
        assert!(!live.provider.mock_mode());

        let forced = Settings::parse("[provider]\napi_key = \"secret\"\nuse_mock = true\n").unwrap();
        assert!(forced.provider.mock_mode());
    }

    #[test]
    fn test_defaults_match_engine_constants() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings.swap.slippage_bps, 300);
        assert_eq!(settings.swap.catalog_ttl(), chrono::Duration::minutes(5));
        assert_eq!(settings.swap.quote_deadline(), chrono::Duration::minutes(5));
        assert_eq!(settings.provider.catalog_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_rejects_invalid_placeholder() {
        let err = Settings::parse("[swap]\nplaceholder_recipient = \"u1abc\"\n").unwrap_err();
        assert!(err.to_string().contains("placeholder_recipient"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tracker]\npoll_interval_ms = 250\nmax_backoff_ms = 1000").unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.tracker.poll_interval_ms, 250);
        assert_eq!(settings.tracker.max_backoff_ms, 1000);
    }
}
