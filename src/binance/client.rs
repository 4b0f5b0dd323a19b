// =============================================================================
// Binance REST API Client — public market-data endpoints
// =============================================================================
//
// Only unsigned endpoints are used, so no API key is configured. The inner
// reqwest client is shared by every concurrent history fetch; each request is
// independent and the client itself holds no per-request state.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::binance::rate_limit::{RateLimitTracker, UI_KLINES_WEIGHT};
use crate::market_data::ticker::parse_kline_closes;

/// Default REST host.
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Request timeout applied to every REST call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Binance REST API client for public market data.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    rate_limits: Arc<RateLimitTracker>,
}

impl BinanceClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new `BinanceClient` against `base_url`
    /// (e.g. `https://api.binance.com`).
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %base_url, "BinanceClient initialised");

        Ok(Self {
            base_url,
            client,
            rate_limits: Arc::new(RateLimitTracker::new()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Shared handle to the request-weight tracker.
    pub fn rate_limits(&self) -> Arc<RateLimitTracker> {
        self.rate_limits.clone()
    }

    // -------------------------------------------------------------------------
    // Public market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/uiKlines (public).
    ///
    /// Returns the raw array-of-arrays body. `uiKlines` has the same layout as
    /// `klines` but is tuned for chart presentation.
    #[instrument(skip(self), name = "binance::get_ui_klines")]
    pub async fn get_ui_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<serde_json::Value> {
        if !self.rate_limits.can_send_request(UI_KLINES_WEIGHT) {
            anyhow::bail!("request weight budget exhausted, skipping uiKlines for {symbol}");
        }

        let url = format!("{}/api/v3/uiKlines", self.base_url);
        let limit = limit.to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[("symbol", symbol), ("interval", interval), ("limit", limit.as_str())])
            .send()
            .await
            .context("GET /api/v3/uiKlines request failed")?;

        self.rate_limits.update_from_headers(resp.headers());

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse uiKlines response")?;

        if !status.is_success() {
            anyhow::bail!(
                "Binance GET /api/v3/uiKlines returned {}: {}",
                status,
                body
            );
        }

        if !body.is_array() {
            anyhow::bail!("uiKlines response is not an array: {body}");
        }

        Ok(body)
    }

    /// Closing prices of the most recent `limit` candles, oldest-first.
    #[instrument(skip(self), name = "binance::get_close_history")]
    pub async fn get_close_history(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<f64>> {
        let body = self.get_ui_klines(symbol, interval, limit).await?;
        let closes = parse_kline_closes(&body);
        debug!(symbol, interval, count = closes.len(), "close history fetched");
        Ok(closes)
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("rate_limits", &self.rate_limits)
            .finish()
    }
}
