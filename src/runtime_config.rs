// =============================================================================
// Runtime Configuration — feed endpoints, timeouts and dashboard settings
// =============================================================================
//
// Loaded from `runtime_config.json` at startup and written back on shutdown so
// the last sort selection survives a restart.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::binance::client::DEFAULT_BASE_URL;
use crate::market_data::price_feed::FeedConfig;
use crate::types::SortOption;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

/// The popular-instrument allow-list, in display order.
fn default_symbols() -> Vec<String> {
    [
        "BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT", "ADAUSDT", "DOGEUSDT", "DOTUSDT",
        "TRXUSDT", "LTCUSDT",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_rest_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_stream_url() -> String {
    "wss://stream.binance.com:9443/ws/!miniTicker@arr".to_string()
}

fn default_history_interval() -> String {
    "1h".to_string()
}

fn default_history_limit() -> u32 {
    24
}

fn default_fallback_history_len() -> usize {
    20
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_idle_timeout_secs() -> u64 {
    15
}

fn default_ping_interval_secs() -> u64 {
    20
}

fn default_channel_capacity() -> usize {
    16
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Instruments ---------------------------------------------------------

    /// Allow-list of tracked symbols. Ticks for any other symbol are dropped.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    // --- Endpoints -----------------------------------------------------------

    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,

    /// Market-wide mini-ticker stream.
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    // --- History seeding -----------------------------------------------------

    /// Fetch recent candles per symbol before streaming starts.
    #[serde(default = "default_true")]
    pub seed_history: bool,

    #[serde(default = "default_history_interval")]
    pub history_interval: String,

    /// Candles requested per symbol; also the cap on the sparkline length.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,

    /// Length of the zero-filled series used when a symbol's fetch fails.
    #[serde(default = "default_fallback_history_len")]
    pub fallback_history_len: usize,

    // --- Transport -----------------------------------------------------------

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum silence on the stream before the session is failed.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Snapshots buffered between the feed task and the presenter.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    // --- Dashboard -----------------------------------------------------------

    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub default_sort: SortOption,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            rest_base_url: default_rest_base_url(),
            stream_url: default_stream_url(),
            seed_history: true,
            history_interval: default_history_interval(),
            history_limit: default_history_limit(),
            fallback_history_len: default_fallback_history_len(),
            connect_timeout_secs: default_connect_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            ping_interval_secs: default_ping_interval_secs(),
            channel_capacity: default_channel_capacity(),
            bind_addr: default_bind_addr(),
            default_sort: SortOption::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            default_sort = %config.default_sort,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `COINSOCKET_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(syms) = std::env::var("COINSOCKET_SYMBOLS") {
            self.set_symbols_from_list(&syms);
        }
        if let Ok(addr) = std::env::var("COINSOCKET_BIND_ADDR") {
            if !addr.trim().is_empty() {
                self.bind_addr = addr.trim().to_string();
            }
        }
    }

    /// Replace the allow-list from a comma-separated list. Entries are
    /// upper-cased and de-duplicated; an empty result keeps the current list.
    pub fn set_symbols_from_list(&mut self, list: &str) {
        let mut symbols: Vec<String> = Vec::new();
        for sym in list.split(',').map(|s| s.trim().to_uppercase()) {
            if !sym.is_empty() && !symbols.contains(&sym) {
                symbols.push(sym);
            }
        }
        if !symbols.is_empty() {
            self.symbols = symbols;
        }
    }

    /// Settings consumed by the ingestion session.
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            symbols: self.symbols.clone(),
            stream_url: self.stream_url.clone(),
            seed_history: self.seed_history,
            history_interval: self.history_interval.clone(),
            history_limit: self.history_limit,
            fallback_history_len: self.fallback_history_len,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            channel_capacity: self.channel_capacity.max(1),
        }
    }
}
