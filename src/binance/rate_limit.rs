// =============================================================================
// Request-weight tracker — keeps history seeding inside Binance's IP budget
// =============================================================================
//
// Binance allows 6000 request weight per minute per IP on the public REST API.
// Every response carries `X-MBX-USED-WEIGHT-1M`; the tracker stores the latest
// value so a burst of seeding fetches can be refused locally before the
// exchange starts answering 429. A reading older than one minute no longer
// describes the current window and counts as zero.
// =============================================================================

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Weight header name.
const USED_WEIGHT_HEADER: &str = "X-MBX-USED-WEIGHT-1M";

/// Hard ceiling at which we refuse to send additional requests.
const WEIGHT_HARD_LIMIT: u32 = 5000;
/// Soft warning threshold.
const WEIGHT_WARN_THRESHOLD: u32 = 4000;
/// Length of the exchange's weight window.
const WEIGHT_WINDOW: Duration = Duration::from_secs(60);

/// Request weight of one `uiKlines` call with `limit <= 100`.
pub const UI_KLINES_WEIGHT: u32 = 2;

/// Thread-safe weight tracker backed by an atomic counter.
pub struct RateLimitTracker {
    used_weight_1m: AtomicU32,
    updated_at: Mutex<Option<Instant>>,
}

/// Serialisable view of the tracker for the health endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSnapshot {
    pub used_weight_1m: u32,
    pub hard_limit: u32,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            used_weight_1m: AtomicU32::new(0),
            updated_at: Mutex::new(None),
        }
    }

    /// Record the used weight reported in a response's headers.
    pub fn update_from_headers(&self, headers: &reqwest::header::HeaderMap) {
        self.update_from_headers_at(headers, Instant::now());
    }

    fn update_from_headers_at(&self, headers: &reqwest::header::HeaderMap, now: Instant) {
        let Some(weight) = headers
            .get(USED_WEIGHT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u32>().ok())
        else {
            return;
        };

        let prev = self.used_weight_at(now);
        self.used_weight_1m.store(weight, Ordering::Relaxed);
        *self.updated_at.lock() = Some(now);
        if weight >= WEIGHT_WARN_THRESHOLD && prev < WEIGHT_WARN_THRESHOLD {
            warn!(
                used_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "rate-limit weight crossed warning threshold"
            );
        }
        debug!(used_weight_1m = weight, "rate-limit weight updated from header");
    }

    /// `true` if `weight` more request weight stays under the hard limit.
    pub fn can_send_request(&self, weight: u32) -> bool {
        self.can_send_request_at(weight, Instant::now())
    }

    fn can_send_request_at(&self, weight: u32, now: Instant) -> bool {
        let current = self.used_weight_at(now);
        let allowed = current.saturating_add(weight) <= WEIGHT_HARD_LIMIT;
        if !allowed {
            warn!(
                current_weight = current,
                requested_weight = weight,
                hard_limit = WEIGHT_HARD_LIMIT,
                "request blocked — would exceed rate-limit"
            );
        }
        allowed
    }

    /// Last reported weight, or 0 once the window it was reported in has passed.
    fn used_weight_at(&self, now: Instant) -> u32 {
        match *self.updated_at.lock() {
            Some(at) if now.saturating_duration_since(at) < WEIGHT_WINDOW => {
                self.used_weight_1m.load(Ordering::Relaxed)
            }
            _ => 0,
        }
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        RateLimitSnapshot {
            used_weight_1m: self.used_weight_at(Instant::now()),
            hard_limit: WEIGHT_HARD_LIMIT,
        }
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimitTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitTracker")
            .field("used_weight_1m", &self.used_weight_at(Instant::now()))
            .finish()
    }
}
