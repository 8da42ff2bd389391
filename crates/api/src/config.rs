//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::ItemId;
use payment::PaymentGateConfig;
use saga::SagaConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `0.0.0.0`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json` (default `text`)
/// - `DATABASE_URL`: PostgreSQL event store; unset keeps events in memory
/// - `RPC_TIMEOUT_MS`: timeout of every checkout call to a service (default `2000`)
/// - `CONFIRM_MAX_ATTEMPTS`: stock confirmation attempts after approval (default `5`)
/// - `CONFIRM_RETRY_BACKOFF_MS`: base delay between those attempts (default `200`)
/// - `PAYMENT_IDEMPOTENCY_TTL_SECS`: how long payment outcomes are kept (default `86400`)
/// - `NOTIFIER_BUFFER`: queued stock updates per websocket session (default `64`)
/// - `SEED_INVENTORY`: initial stock, e.g. `book_1=10,book_2=5`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub rpc_timeout: Duration,
    pub confirm_max_attempts: u32,
    pub confirm_retry_backoff: Duration,
    pub payment_idempotency_ttl: Duration,
    pub notifier_buffer: usize,
    pub seed_inventory: Vec<(ItemId, u32)>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses `item=units` pairs separated by commas. Malformed pairs are
/// skipped.
pub fn parse_seed(raw: &str) -> Vec<(ItemId, u32)> {
    raw.split(',')
        .filter_map(|pair| {
            let (item, units) = pair.split_once('=')?;
            let item = item.trim();
            if item.is_empty() {
                return None;
            }
            Some((ItemId::new(item), units.trim().parse().ok()?))
        })
        .collect()
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match std::env::var("LOG_FORMAT") {
                Ok(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            rpc_timeout: Duration::from_millis(env_or("RPC_TIMEOUT_MS", 2000)),
            confirm_max_attempts: env_or("CONFIRM_MAX_ATTEMPTS", defaults.confirm_max_attempts),
            confirm_retry_backoff: Duration::from_millis(env_or("CONFIRM_RETRY_BACKOFF_MS", 200)),
            payment_idempotency_ttl: Duration::from_secs(env_or(
                "PAYMENT_IDEMPOTENCY_TTL_SECS",
                86_400,
            )),
            notifier_buffer: env_or("NOTIFIER_BUFFER", defaults.notifier_buffer),
            seed_inventory: std::env::var("SEED_INVENTORY")
                .map(|s| parse_seed(&s))
                .unwrap_or_default(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn saga_config(&self) -> SagaConfig {
        SagaConfig {
            rpc_timeout: self.rpc_timeout,
            confirm_max_attempts: self.confirm_max_attempts,
            confirm_retry_backoff: self.confirm_retry_backoff,
        }
    }

    pub fn payment_config(&self) -> PaymentGateConfig {
        PaymentGateConfig {
            idempotency_ttl: self.payment_idempotency_ttl,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let saga = SagaConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            rpc_timeout: saga.rpc_timeout,
            confirm_max_attempts: saga.confirm_max_attempts,
            confirm_retry_backoff: saga.confirm_retry_backoff,
            payment_idempotency_ttl: PaymentGateConfig::default().idempotency_ttl,
            notifier_buffer: 64,
            seed_inventory: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.rpc_timeout, Duration::from_millis(2000));
        assert_eq!(config.confirm_max_attempts, 5);
        assert_eq!(config.payment_idempotency_ttl, Duration::from_secs(86_400));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_seed_parsing() {
        let seed = parse_seed("book_1=10, book_2 = 5,broken,=3,book_3=x");
        assert_eq!(
            seed,
            vec![(ItemId::new("book_1"), 10), (ItemId::new("book_2"), 5)]
        );
        assert!(parse_seed("").is_empty());
    }

    #[test]
    fn test_service_configs() {
        let config = Config {
            rpc_timeout: Duration::from_millis(50),
            confirm_max_attempts: 2,
            ..Config::default()
        };
        let saga = config.saga_config();
        assert_eq!(saga.rpc_timeout, Duration::from_millis(50));
        assert_eq!(saga.confirm_max_attempts, 2);
        assert_eq!(
            config.payment_config().idempotency_ttl,
            Duration::from_secs(86_400)
        );
    }
}
