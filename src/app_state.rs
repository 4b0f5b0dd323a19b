// =============================================================================
// Dashboard State — latest Loading / Success / Error view of the price feed
// =============================================================================
//
// The presenter task is the only writer of quote data. API handlers read
// through the RwLocks and watch `state_version` to notice fresh data.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared fields.
//   - tokio Notify for restart requests coming from the API.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

use crate::binance::rate_limit::RateLimitTracker;
use crate::market_data::{sort_quotes, FeedEvent, Quote};
use crate::runtime_config::RuntimeConfig;
use crate::types::{FeedStatus, SortOption};

// =============================================================================
// UiState
// =============================================================================

/// What a dashboard should currently render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum UiState {
    Loading,
    Success { quotes: Vec<Quote> },
    Error { message: String },
}

// =============================================================================
// Error Record
// =============================================================================

/// A recorded session failure for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

/// Serialisable view of the whole dashboard state.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub uptime_secs: u64,
    pub feed_status: FeedStatus,
    pub sort: SortOption,
    pub snapshots_received: u64,
    pub sessions_started: u64,
    pub last_update: Option<String>,
    pub recent_errors: Vec<ErrorRecord>,
    pub ui: UiState,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// Shared presentation state, wrapped in `Arc` and handed to every task.
pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Incremented on every change visible to clients.
    pub state_version: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: RwLock<RuntimeConfig>,

    /// Request-weight tracker shared with the REST client.
    pub rate_limits: Arc<RateLimitTracker>,

    // ── Feed output ─────────────────────────────────────────────────────
    ui_state: RwLock<UiState>,
    /// Latest snapshot exactly as emitted (allow-list order).
    latest_quotes: RwLock<Vec<Quote>>,
    sort_option: RwLock<SortOption>,
    feed_status: RwLock<FeedStatus>,
    snapshots_received: AtomicU64,
    sessions_started: AtomicU64,
    last_update: RwLock<Option<DateTime<Utc>>>,

    // ── Error Log ───────────────────────────────────────────────────────
    recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── Control ─────────────────────────────────────────────────────────
    restart: Notify,

    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig, rate_limits: Arc<RateLimitTracker>) -> Self {
        let sort = config.default_sort;
        Self {
            state_version: AtomicU64::new(1),
            runtime_config: RwLock::new(config),
            rate_limits,
            ui_state: RwLock::new(UiState::Loading),
            latest_quotes: RwLock::new(Vec::new()),
            sort_option: RwLock::new(sort),
            feed_status: RwLock::new(FeedStatus::Idle),
            snapshots_received: AtomicU64::new(0),
            sessions_started: AtomicU64::new(0),
            last_update: RwLock::new(None),
            recent_errors: RwLock::new(Vec::new()),
            restart: Notify::new(),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Readers ─────────────────────────────────────────────────────────

    pub fn ui_state(&self) -> UiState {
        self.ui_state.read().clone()
    }

    /// The current state re-ordered by `option`, leaving the stored choice
    /// untouched.
    pub fn ui_state_sorted(&self, option: SortOption) -> UiState {
        let ui = self.ui_state.read();
        match &*ui {
            UiState::Success { .. } => UiState::Success {
                quotes: sort_quotes(&self.latest_quotes.read(), option),
            },
            other => other.clone(),
        }
    }

    pub fn sort_option(&self) -> SortOption {
        *self.sort_option.read()
    }

    pub fn feed_status(&self) -> FeedStatus {
        *self.feed_status.read()
    }

    // ── Feed transitions ────────────────────────────────────────────────

    /// Reset to `Loading` for a fresh session.
    pub fn begin_session(&self) {
        {
            let mut ui = self.ui_state.write();
            self.latest_quotes.write().clear();
            *ui = UiState::Loading;
        }
        *self.feed_status.write() = FeedStatus::Connecting;
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
        self.increment_version();
    }

    pub fn set_feed_status(&self, status: FeedStatus) {
        *self.feed_status.write() = status;
        self.increment_version();
    }

    /// Store a new snapshot and publish it sorted by the current option.
    pub fn publish_snapshot(&self, quotes: Vec<Quote>) {
        // Lock order: ui_state, then sort_option, then latest_quotes.
        {
            let mut ui = self.ui_state.write();
            let sorted = sort_quotes(&quotes, self.sort_option());
            *self.latest_quotes.write() = quotes;
            *ui = UiState::Success { quotes: sorted };
        }
        *self.last_update.write() = Some(Utc::now());
        self.snapshots_received.fetch_add(1, Ordering::Relaxed);
        self.increment_version();
    }

    /// Publish a terminal session failure.
    pub fn publish_error(&self, message: String) {
        *self.feed_status.write() = FeedStatus::Failed;
        *self.ui_state.write() = UiState::Error {
            message: message.clone(),
        };
        self.push_error(message);
    }

    /// Change the ordering and re-publish the latest snapshot with it.
    pub fn set_sort(&self, option: SortOption) {
        {
            let mut ui = self.ui_state.write();
            *self.sort_option.write() = option;
            if let UiState::Success { quotes } = &mut *ui {
                *quotes = sort_quotes(&self.latest_quotes.read(), option);
            }
        }
        self.runtime_config.write().default_sort = option;
        info!(sort = %option, "sort option changed");
        self.increment_version();
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`].
    pub fn push_error(&self, message: String) {
        let record = ErrorRecord {
            message,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }
        drop(errors);

        self.increment_version();
    }

    // ── Restart control ─────────────────────────────────────────────────

    /// Ask the presenter to drop the current session and start a new one.
    /// A request made while no one is waiting is kept until the next wait.
    pub fn request_restart(&self) {
        self.restart.notify_one();
    }

    async fn restart_requested(&self) {
        self.restart.notified().await;
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Payload for `GET /api/v1/state` and the WebSocket push feed.
    pub fn build_snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            state_version: self.current_state_version(),
            server_time: Utc::now().timestamp_millis(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            feed_status: self.feed_status(),
            sort: self.sort_option(),
            snapshots_received: self.snapshots_received.load(Ordering::Relaxed),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            last_update: self.last_update.read().map(|t| t.to_rfc3339()),
            recent_errors: self.recent_errors.read().clone(),
            ui: self.ui_state(),
        }
    }
}

// =============================================================================
// Presenter
// =============================================================================

/// Drive `state` from feed sessions produced by `subscribe`.
///
/// Each session maps snapshots to `Success` and its terminal failure to
/// `Error`. After a failure the presenter waits for [`AppState::request_restart`];
/// a restart request during a live session replaces that session.
pub async fn run_presenter<S>(state: Arc<AppState>, mut subscribe: S)
where
    S: FnMut() -> mpsc::Receiver<FeedEvent>,
{
    loop {
        state.begin_session();
        let mut events = subscribe();

        let restarted = loop {
            tokio::select! {
                () = state.restart_requested() => break true,

                event = events.recv() => match event {
                    Some(FeedEvent::Status(status)) => state.set_feed_status(status),
                    Some(FeedEvent::Snapshot(quotes)) => state.publish_snapshot(quotes),
                    Some(FeedEvent::Failed(e)) => {
                        warn!(error = %e, "price feed failed — waiting for restart");
                        state.publish_error(e.to_string());
                        break false;
                    }
                    None => {
                        warn!("price feed ended without a terminal event");
                        state.set_feed_status(FeedStatus::Cancelled);
                        break false;
                    }
                },
            }
        };

        drop(events);
        if restarted {
            state.set_feed_status(FeedStatus::Cancelled);
        } else {
            state.restart_requested().await;
        }
        info!("starting new price feed session");
    }
}

// =============================================================================
// Tests
// =============================================================================
