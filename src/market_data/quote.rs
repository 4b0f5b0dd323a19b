use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Quote
// ---------------------------------------------------------------------------

/// Price and 24h statistics snapshot for a single traded instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub change_percent: f64,
    /// Recent price samples for sparkline rendering (oldest-first).
    #[serde(default)]
    pub price_history: Vec<f64>,
}

impl Quote {
    /// Zero-valued placeholder used before the first tick arrives.
    pub fn placeholder(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price: 0.0,
            high_24h: 0.0,
            low_24h: 0.0,
            change_percent: 0.0,
            price_history: Vec::new(),
        }
    }

    /// Quote seeded from historical closes. The latest close becomes the
    /// current price.
    pub fn seeded(symbol: impl Into<String>, history: Vec<f64>) -> Self {
        Self {
            price: history.last().copied().unwrap_or(0.0),
            price_history: history,
            ..Self::placeholder(symbol)
        }
    }

    /// Overwrite the newest history sample with `price`, or push it when the
    /// history is still empty. The trail never grows past `limit`.
    pub fn record_price(&mut self, price: f64, limit: usize) {
        match self.price_history.last_mut() {
            Some(last) => *last = price,
            None => self.price_history.push(price),
        }
        if limit > 0 && self.price_history.len() > limit {
            let excess = self.price_history.len() - limit;
            self.price_history.drain(..excess);
        }
    }
}

/// Percent change from `open` to `price`; `0.0` when there is no usable open.
pub fn change_percent(price: f64, open: f64) -> f64 {
    if open == 0.0 {
        return 0.0;
    }
    (price - open) / open * 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
