// =============================================================================
// Ticker decoding — Binance mini-ticker payloads to `Quote` updates
// =============================================================================
//
// Binance sends every numeric field as a JSON string. A field that fails to
// parse degrades to 0.0 instead of rejecting the whole batch: one bad value
// shows up as a zero on the dashboard, every other symbol keeps updating.
// =============================================================================

use serde::Deserialize;

use crate::market_data::quote::{change_percent, Quote};

/// One mini-ticker record as it appears on the wire.
///
/// ```json
/// { "e": "24hrMiniTicker", "s": "BTCUSDT", "c": "37020.00", "o": "36500.00",
///   "h": "37100.00", "l": "36400.00", "v": "1234.5", "q": "45678901.2" }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TickerDto {
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "c")]
    pub price: String,
    #[serde(rename = "h", default)]
    pub high: String,
    #[serde(rename = "l", default)]
    pub low: String,
    #[serde(rename = "o", default)]
    pub open: String,
}

impl TickerDto {
    pub fn price(&self) -> f64 {
        parse_or_default(&self.price)
    }

    pub fn high(&self) -> f64 {
        parse_or_default(&self.high)
    }

    pub fn low(&self) -> f64 {
        parse_or_default(&self.low)
    }

    pub fn open(&self) -> f64 {
        parse_or_default(&self.open)
    }

    /// Percent change of the last price against the 24h open.
    pub fn change_percent(&self) -> f64 {
        change_percent(self.price(), self.open())
    }

    /// Standalone quote built from this record alone (no history).
    pub fn to_quote(&self) -> Quote {
        Quote {
            symbol: self.symbol.clone(),
            price: self.price(),
            high_24h: self.high(),
            low_24h: self.low(),
            change_percent: self.change_percent(),
            price_history: Vec::new(),
        }
    }
}

/// Parse a decimal string, yielding `0.0` when it is not a finite number.
pub fn parse_or_default(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Same as [`parse_or_default`] for a JSON value that may be a string or a
/// number.
fn value_or_default(val: &serde_json::Value) -> f64 {
    match val {
        serde_json::Value::String(s) => parse_or_default(s),
        serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Decode one inbound text frame into a batch of ticker records.
///
/// Accepts the `!miniTicker@arr` array form, a single ticker object, and the
/// combined-stream `{ "stream": ..., "data": ... }` envelope around either.
pub fn decode_batch(text: &str) -> Result<Vec<TickerDto>, serde_json::Error> {
    let root: serde_json::Value = serde_json::from_str(text)?;
    decode_value(root)
}

fn decode_value(root: serde_json::Value) -> Result<Vec<TickerDto>, serde_json::Error> {
    match root {
        serde_json::Value::Array(_) => serde_json::from_value(root),
        serde_json::Value::Object(mut map) if map.contains_key("data") => {
            let data = map.remove("data").unwrap_or(serde_json::Value::Null);
            decode_value(data)
        }
        other => serde_json::from_value::<TickerDto>(other).map(|dto| vec![dto]),
    }
}

/// Extract close prices (index 4) from a klines / uiKlines response.
///
/// Array indices:
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume, ...
///
/// Entries that are not arrays or are too short contribute `0.0`, keeping the
/// series aligned with the candle count.
pub fn parse_kline_closes(body: &serde_json::Value) -> Vec<f64> {
    body.as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .and_then(|arr| arr.get(4))
                        .map(value_or_default)
                        .unwrap_or(0.0)
                })
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
