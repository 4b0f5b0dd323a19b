// =============================================================================
// Price Feed — one streaming session merged into a per-symbol quote cache
// =============================================================================
//
// Session lifecycle:
//   Connecting -> Streaming -> (Failed | Cancelled)
//
// 1. Optionally seed every allow-listed symbol with recent closes (all fetches
//    issued together, joined before the first emission).
// 2. Connect to the mini-ticker stream.
// 3. For every text frame: decode, merge allow-listed updates, and emit the
//    full cache when at least one entry changed.
//
// A transport failure ends the session with a classified `FeedError`. Nothing
// reconnects here; the caller starts a new session with `subscribe()`.
// =============================================================================

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, timeout, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use crate::binance::BinanceClient;
use crate::market_data::feed_error::FeedError;
use crate::market_data::quote::Quote;
use crate::market_data::ticker::{decode_batch, TickerDto};
use crate::types::FeedStatus;

// ---------------------------------------------------------------------------
// Configuration & events
// ---------------------------------------------------------------------------

/// Settings for one ingestion session.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Allow-list, in emission order.
    pub symbols: Vec<String>,
    pub stream_url: String,
    pub seed_history: bool,
    pub history_interval: String,
    pub history_limit: u32,
    pub fallback_history_len: usize,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub ping_interval: Duration,
    pub channel_capacity: usize,
}

/// Everything a subscriber can observe from a session.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// Lifecycle transition (`Connecting`, `Streaming`).
    Status(FeedStatus),
    /// Full cache contents, in allow-list order.
    Snapshot(Vec<Quote>),
    /// Terminal transport failure. Nothing follows it.
    Failed(FeedError),
}

// ---------------------------------------------------------------------------
// QuoteCache — owned exclusively by the session task
// ---------------------------------------------------------------------------

/// Per-symbol quote cache keyed by the allow-list.
#[derive(Debug, Clone)]
pub struct QuoteCache {
    quotes: Vec<Quote>,
    index: HashMap<String, usize>,
    history_limit: usize,
}

impl QuoteCache {
    /// Build a cache from initial quotes. The first quote for a symbol wins;
    /// the set of symbols is fixed from here on.
    pub fn new(initial: Vec<Quote>, history_limit: usize) -> Self {
        let mut quotes = Vec::with_capacity(initial.len());
        let mut index = HashMap::with_capacity(initial.len());
        for quote in initial {
            if index.contains_key(&quote.symbol) {
                continue;
            }
            index.insert(quote.symbol.clone(), quotes.len());
            quotes.push(quote);
        }
        Self {
            quotes,
            index,
            history_limit,
        }
    }

    /// Zero-valued placeholders for every symbol.
    pub fn placeholders(symbols: &[String], history_limit: usize) -> Self {
        Self::new(symbols.iter().map(Quote::placeholder).collect(), history_limit)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    #[cfg(test)]
    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains_key(symbol)
    }

    #[cfg(test)]
    pub fn get(&self, symbol: &str) -> Option<&Quote> {
        self.index.get(symbol).map(|&i| &self.quotes[i])
    }

    /// Replace the cached quote for `update.symbol`. Returns `false` when the
    /// symbol is not on the allow-list.
    pub fn apply(&mut self, update: &TickerDto) -> bool {
        let Some(&slot) = self.index.get(&update.symbol) else {
            return false;
        };

        let previous = &self.quotes[slot];
        let mut next = update.to_quote();
        next.price_history = previous.price_history.clone();
        next.record_price(next.price, self.history_limit);

        self.quotes[slot] = next;
        true
    }

    /// Apply a whole batch; `true` if any entry was replaced.
    pub fn apply_batch(&mut self, batch: &[TickerDto]) -> bool {
        let mut changed = false;
        for update in batch {
            changed |= self.apply(update);
        }
        changed
    }

    /// Owned copy of every quote, in allow-list order.
    pub fn snapshot(&self) -> Vec<Quote> {
        self.quotes.clone()
    }
}

// ---------------------------------------------------------------------------
// History seeding
// ---------------------------------------------------------------------------

/// Seed one quote per symbol by running `fetch` for all of them concurrently.
///
/// A failed fetch only affects its own symbol, which falls back to a flat
/// zero series of `fallback_len` samples.
pub async fn seed_quotes_with<F, Fut>(symbols: &[String], fallback_len: usize, fetch: F) -> Vec<Quote>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<f64>>>,
{
    let fetches = symbols.iter().map(|symbol| {
        let pending = fetch(symbol.clone());
        async move {
            match pending.await {
                Ok(history) => Quote::seeded(symbol.clone(), history),
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "history fetch failed — using flat series");
                    Quote::seeded(symbol.clone(), vec![0.0; fallback_len])
                }
            }
        }
    });
    join_all(fetches).await
}

/// Seed quotes from Binance `uiKlines` closes.
pub async fn seed_quotes(client: &BinanceClient, config: &FeedConfig) -> Vec<Quote> {
    seed_quotes_with(&config.symbols, config.fallback_history_len, |symbol| async move {
        client
            .get_close_history(&symbol, &config.history_interval, config.history_limit)
            .await
    })
    .await
}

// ---------------------------------------------------------------------------
// PriceFeed
// ---------------------------------------------------------------------------

/// Entry point for starting ingestion sessions.
#[derive(Debug, Clone)]
pub struct PriceFeed {
    client: Arc<BinanceClient>,
    config: FeedConfig,
}

impl PriceFeed {
    pub fn new(client: Arc<BinanceClient>, config: FeedConfig) -> Self {
        Self { client, config }
    }

    /// Start a brand-new session with a fresh cache.
    ///
    /// Dropping the returned receiver ends the session.
    pub fn subscribe(&self) -> mpsc::Receiver<FeedEvent> {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let client = self.client.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            let status = run_session(&client, &config, &tx).await;
            info!(status = %status, "price feed session finished");
        });
        rx
    }
}

/// Run one session to completion and return its terminal status.
pub async fn run_session(
    client: &BinanceClient,
    config: &FeedConfig,
    tx: &mpsc::Sender<FeedEvent>,
) -> FeedStatus {
    if tx.send(FeedEvent::Status(FeedStatus::Connecting)).await.is_err() {
        return FeedStatus::Cancelled;
    }

    let history_limit = config.history_limit as usize;
    let mut cache = if config.seed_history {
        let seeded = QuoteCache::new(seed_quotes(client, config).await, history_limit);
        info!(symbols = seeded.len(), "history seeded");
        if tx.send(FeedEvent::Snapshot(seeded.snapshot())).await.is_err() {
            return FeedStatus::Cancelled;
        }
        seeded
    } else {
        QuoteCache::placeholders(&config.symbols, history_limit)
    };

    info!(url = %config.stream_url, "connecting to mini-ticker WebSocket");
    let ws_stream = match timeout(config.connect_timeout, connect_async(config.stream_url.as_str())).await {
        Ok(Ok((ws_stream, _response))) => ws_stream,
        Ok(Err(e)) => return fail(tx, FeedError::from(e)).await,
        Err(_) => return fail(tx, FeedError::Timeout).await,
    };
    info!("mini-ticker WebSocket connected");

    if tx.send(FeedEvent::Status(FeedStatus::Streaming)).await.is_err() {
        return FeedStatus::Cancelled;
    }
    if !config.seed_history && tx.send(FeedEvent::Snapshot(cache.snapshot())).await.is_err() {
        return FeedStatus::Cancelled;
    }

    let (write, read) = ws_stream.split();
    match ingest(read, write, &mut cache, tx, config.idle_timeout, config.ping_interval).await {
        Ok(()) => FeedStatus::Cancelled,
        Err(e) => fail(tx, e).await,
    }
}

async fn fail(tx: &mpsc::Sender<FeedEvent>, err: FeedError) -> FeedStatus {
    error!(error = %err, "price feed session failed");
    // A closed channel means nobody is left to tell.
    let _ = tx.send(FeedEvent::Failed(err)).await;
    FeedStatus::Failed
}

/// The receive loop.
///
/// Returns `Ok(())` when the subscriber went away and `Err` on any transport
/// failure. Decode errors are logged and skipped.
pub async fn ingest<R, W>(
    mut read: R,
    mut write: W,
    cache: &mut QuoteCache,
    tx: &mpsc::Sender<FeedEvent>,
    idle_timeout: Duration,
    ping_interval: Duration,
) -> Result<(), FeedError>
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
    W: Sink<Message, Error = WsError> + Unpin,
{
    let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);
    let mut idle_deadline = Instant::now() + idle_timeout;
    let mut batches: u64 = 0;

    loop {
        tokio::select! {
            () = tx.closed() => {
                debug!(batches, "subscriber dropped — ending session");
                return Ok(());
            }

            () = sleep_until(idle_deadline) => {
                warn!(idle_secs = idle_timeout.as_secs(), "no frames received — idle timeout");
                return Err(FeedError::Timeout);
            }

            _ = ping.tick() => {
                write.send(Message::Ping(Vec::new())).await?;
                debug!("keep-alive ping sent");
            }

            frame = read.next() => {
                idle_deadline = Instant::now() + idle_timeout;
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        batches += 1;
                        let batch = match decode_batch(&text) {
                            Ok(batch) => batch,
                            Err(e) => {
                                warn!(error = %e, "failed to decode ticker batch");
                                continue;
                            }
                        };
                        if cache.apply_batch(&batch) {
                            if tx.send(FeedEvent::Snapshot(cache.snapshot())).await.is_err() {
                                return Ok(());
                            }
                        } else {
                            debug!(entries = batch.len(), "batch had no tracked symbols");
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        // tungstenite queues the matching Pong itself.
                        debug!(len = data.len(), "ping received");
                    }
                    Some(Ok(Message::Pong(_))) => {
                        debug!("pong received");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                        warn!(reason = %reason, "mini-ticker WebSocket closed by server");
                        return Err(FeedError::Closed);
                    }
                    Some(Ok(_)) => {
                        // Binary / raw frames carry nothing for us.
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "mini-ticker WebSocket read error");
                        return Err(e.into());
                    }
                    None => {
                        warn!("mini-ticker WebSocket stream ended");
                        return Err(FeedError::Closed);
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    use futures_util::stream;
    use tokio::net::TcpListener;

    use crate::runtime_config::RuntimeConfig;

    const LONG: Duration = Duration::from_secs(60);

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn tick(symbol: &str, price: &str, open: &str) -> String {
        format!(r#"{{"e":"24hrMiniTicker","s":"{symbol}","c":"{price}","o":"{open}","h":"120","l":"90"}}"#)
    }

    fn batch(ticks: &[String]) -> Message {
        Message::Text(format!("[{}]", ticks.join(",")))
    }

    fn null_sink() -> impl Sink<Message, Error = WsError> + Unpin {
        futures_util::sink::drain().sink_map_err(|never: Infallible| -> WsError { match never {} })
    }

    /// Feed `frames` through `ingest` and collect every snapshot emitted.
    async fn run_frames(cache: &mut QuoteCache, frames: Vec<Message>) -> (Result<(), FeedError>, Vec<Vec<Quote>>) {
        let (tx, mut rx) = mpsc::channel(64);
        let read = stream::iter(frames.into_iter().map(Ok::<_, WsError>));
        let result = ingest(read, null_sink(), cache, &tx, LONG, LONG).await;
        drop(tx);

        let mut snapshots = Vec::new();
        while let Some(event) = rx.recv().await {
            if let FeedEvent::Snapshot(quotes) = event {
                snapshots.push(quotes);
            }
        }
        (result, snapshots)
    }

    #[test]
    fn cache_ignores_unknown_symbols() {
        let mut cache = QuoteCache::placeholders(&symbols(&["BTCUSDT"]), 24);
        let dto = TickerDto {
            symbol: "PEPEUSDT".into(),
            price: "1".into(),
            high: String::new(),
            low: String::new(),
            open: String::new(),
        };
        assert!(!cache.apply(&dto));
        assert!(!cache.contains("PEPEUSDT"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_deduplicates_initial_symbols() {
        let cache = QuoteCache::placeholders(&symbols(&["BTCUSDT", "ETHUSDT", "BTCUSDT"]), 24);
        assert_eq!(cache.len(), 2);
        let order: Vec<String> = cache.snapshot().into_iter().map(|q| q.symbol).collect();
        assert_eq!(order, symbols(&["BTCUSDT", "ETHUSDT"]));
    }

    #[test]
    fn seeded_history_last_sample_is_replaced_by_tick() {
        let mut cache = QuoteCache::new(vec![Quote::seeded("BTCUSDT", vec![100.0, 105.0, 102.0, 98.0])], 24);
        let batch = decode_batch(&format!("[{}]", tick("BTCUSDT", "110", "100"))).unwrap();
        assert!(cache.apply_batch(&batch));

        let btc = cache.get("BTCUSDT").unwrap();
        assert_eq!(btc.price_history, vec![100.0, 105.0, 102.0, 110.0]);
        assert_eq!(btc.price, 110.0);
        assert_eq!(btc.high_24h, 120.0);
        assert_eq!(btc.change_percent, (110.0 - 100.0) / 100.0 * 100.0);
    }

    #[tokio::test]
    async fn batch_of_unknown_symbols_emits_nothing() {
        let mut cache = QuoteCache::placeholders(&symbols(&["BTCUSDT", "ETHUSDT"]), 24);
        let frames = vec![batch(&[tick("PEPEUSDT", "1", "1"), tick("SHIBUSDT", "2", "2")])];
        let (result, snapshots) = run_frames(&mut cache, frames).await;
        assert_eq!(result, Err(FeedError::Closed));
        assert!(snapshots.is_empty());
    }

    #[tokio::test]
    async fn emission_contains_full_cache() {
        let tracked = symbols(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
        let mut cache = QuoteCache::placeholders(&tracked, 24);
        let frames = vec![batch(&[tick("ETHUSDT", "2000", "1900"), tick("PEPEUSDT", "1", "1")])];
        let (_, snapshots) = run_frames(&mut cache, frames).await;

        assert_eq!(snapshots.len(), 1);
        let snap = &snapshots[0];
        assert_eq!(snap.len(), tracked.len());
        let order: Vec<&str> = snap.iter().map(|q| q.symbol.as_str()).collect();
        assert_eq!(order, vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
        assert_eq!(snap[1].price, 2000.0);
        assert_eq!(snap[0].price, 0.0);
    }

    #[tokio::test]
    async fn second_batch_without_tracked_symbols_is_skipped() {
        let mut cache = QuoteCache::placeholders(&symbols(&["BTCUSDT"]), 24);
        let frames = vec![
            batch(&[tick("BTCUSDT", "37000", "36000")]),
            batch(&[tick("PEPEUSDT", "1", "1")]),
        ];
        let (_, snapshots) = run_frames(&mut cache, frames).await;
        assert_eq!(snapshots.len(), 1);
    }

    #[tokio::test]
    async fn malformed_frames_do_not_stop_the_loop() {
        let mut cache = QuoteCache::placeholders(&symbols(&["BTCUSDT"]), 24);
        let frames = vec![
            Message::Text("{not json".into()),
            Message::Binary(vec![1, 2, 3]),
            Message::Ping(vec![7]),
            batch(&[tick("BTCUSDT", "oops", "0")]),
        ];
        let (result, snapshots) = run_frames(&mut cache, frames).await;
        assert_eq!(result, Err(FeedError::Closed));
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0][0].price, 0.0);
        assert_eq!(snapshots[0][0].change_percent, 0.0);
    }

    #[tokio::test]
    async fn transport_error_is_classified() {
        let mut cache = QuoteCache::placeholders(&symbols(&["BTCUSDT"]), 24);
        let (tx, _rx) = mpsc::channel(8);
        let read = stream::iter(vec![Err::<Message, _>(WsError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        )))]);
        let result = ingest(read, null_sink(), &mut cache, &tx, LONG, LONG).await;
        assert_eq!(result.unwrap_err().to_string(), "Connection reset");
    }

    #[tokio::test]
    async fn dropped_subscriber_cancels_session() {
        let mut cache = QuoteCache::placeholders(&symbols(&["BTCUSDT"]), 24);
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let read = stream::pending::<Result<Message, WsError>>();
        let result = ingest(read, null_sink(), &mut cache, &tx, LONG, LONG).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn silent_stream_times_out() {
        let mut cache = QuoteCache::placeholders(&symbols(&["BTCUSDT"]), 24);
        let (tx, _rx) = mpsc::channel(8);
        let read = stream::pending::<Result<Message, WsError>>();
        let result = ingest(
            read,
            null_sink(),
            &mut cache,
            &tx,
            Duration::from_millis(100),
            LONG,
        )
        .await;
        assert_eq!(result, Err(FeedError::Timeout));
    }

    #[tokio::test]
    async fn failed_seed_fetch_only_degrades_its_symbol() {
        let tracked = symbols(&["BTCUSDT", "ETHUSDT"]);
        let quotes = seed_quotes_with(&tracked, 20, |symbol| async move {
            if symbol == "ETHUSDT" {
                return Err(anyhow::anyhow!("HTTP 418"));
            }
            Ok::<_, anyhow::Error>(vec![100.0, 105.0, 102.0, 98.0])
        })
        .await;

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].symbol, "BTCUSDT");
        assert_eq!(quotes[0].price_history, vec![100.0, 105.0, 102.0, 98.0]);
        assert_eq!(quotes[0].price, 98.0);
        assert_eq!(quotes[1].price_history, vec![0.0; 20]);
        assert_eq!(quotes[1].price, 0.0);
    }

    fn test_config(stream_url: String) -> FeedConfig {
        let mut config = RuntimeConfig::default().feed_config();
        config.symbols = symbols(&["BTCUSDT", "ETHUSDT"]);
        config.stream_url = stream_url;
        config.seed_history = false;
        config
    }

    #[tokio::test]
    async fn refused_connection_surfaces_terminal_error() {
        // Bind then drop to obtain a local port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = BinanceClient::new("http://127.0.0.1:9").unwrap();
        let config = test_config(format!("ws://{addr}/ws/!miniTicker@arr"));
        let (tx, mut rx) = mpsc::channel(8);

        let status = run_session(&client, &config, &tx).await;
        assert_eq!(status, FeedStatus::Failed);

        assert_eq!(rx.recv().await, Some(FeedEvent::Status(FeedStatus::Connecting)));
        assert_eq!(rx.recv().await, Some(FeedEvent::Failed(FeedError::ConnectionRefused)));
    }

    #[tokio::test]
    async fn session_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(batch(&[tick("ETHUSDT", "2000", "1000"), tick("DOGEUSDT", "0.1", "0.1")]))
                .await
                .unwrap();
            ws.send(batch(&[tick("DOGEUSDT", "0.2", "0.1")])).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let client = BinanceClient::new("http://127.0.0.1:9").unwrap();
        let config = test_config(format!("ws://{addr}/ws/!miniTicker@arr"));
        let (tx, mut rx) = mpsc::channel(16);

        let status = run_session(&client, &config, &tx).await;
        drop(tx);
        server.await.unwrap();
        assert_eq!(status, FeedStatus::Failed);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events[0], FeedEvent::Status(FeedStatus::Connecting));
        assert_eq!(events[1], FeedEvent::Status(FeedStatus::Streaming));
        match &events[2] {
            FeedEvent::Snapshot(quotes) => assert!(quotes.iter().all(|q| q.price == 0.0)),
            other => panic!("expected placeholder snapshot, got {other:?}"),
        }
        match &events[3] {
            FeedEvent::Snapshot(quotes) => {
                assert_eq!(quotes.len(), 2);
                assert_eq!(quotes[1].price, 2000.0);
                assert_eq!(quotes[1].change_percent, 100.0);
            }
            other => panic!("expected ticker snapshot, got {other:?}"),
        }
        assert_eq!(events[4], FeedEvent::Failed(FeedError::Closed));
        assert_eq!(events.len(), 5);
    }

    #[tokio::test]
    async fn keepalive_pings_are_sent_while_idle() {
        let mut cache = QuoteCache::placeholders(&symbols(&["BTCUSDT"]), 24);
        let (tx, _rx) = mpsc::channel(8);
        let sent = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Box::pin(futures_util::sink::unfold(sent.clone(), |sent, msg: Message| async move {
            sent.lock().push(msg);
            Ok::<_, WsError>(sent)
        }));
        let read = stream::pending::<Result<Message, WsError>>();

        let result = ingest(
            read,
            sink,
            &mut cache,
            &tx,
            Duration::from_millis(450),
            Duration::from_millis(100),
        )
        .await;
        assert_eq!(result, Err(FeedError::Timeout));

        let sent = sent.lock();
        assert!(sent.len() >= 2, "expected keep-alive pings, got {sent:?}");
        assert!(sent.iter().all(|m| *m == Message::Ping(Vec::new())));
    }

    #[tokio::test]
    async fn stalled_handshake_times_out() {
        // Kernel completes the TCP handshake; nothing ever answers the upgrade.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = BinanceClient::new("http://127.0.0.1:9").unwrap();
        let mut config = test_config(format!("ws://{addr}/ws/!miniTicker@arr"));
        config.connect_timeout = Duration::from_millis(200);
        let (tx, mut rx) = mpsc::channel(8);

        let status = run_session(&client, &config, &tx).await;
        drop(listener);
        assert_eq!(status, FeedStatus::Failed);

        assert_eq!(rx.recv().await, Some(FeedEvent::Status(FeedStatus::Connecting)));
        assert_eq!(rx.recv().await, Some(FeedEvent::Failed(FeedError::Timeout)));
    }

    #[tokio::test]
    async fn server_ping_is_answered_with_same_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::Ping(b"keepalive".to_vec())).await.unwrap();

            let pong = tokio::time::timeout(Duration::from_secs(5), async {
                loop {
                    match ws.next().await {
                        Some(Ok(Message::Pong(data))) => return Some(data),
                        Some(Ok(_)) => continue,
                        _ => return None,
                    }
                }
            })
            .await
            .ok()
            .flatten();

            ws.close(None).await.unwrap();
            pong
        });

        let client = BinanceClient::new("http://127.0.0.1:9").unwrap();
        let config = test_config(format!("ws://{addr}/ws/!miniTicker@arr"));
        let (tx, _rx) = mpsc::channel(16);

        let status = run_session(&client, &config, &tx).await;
        assert_eq!(status, FeedStatus::Failed);
        assert_eq!(server.await.unwrap(), Some(b"keepalive".to_vec()));
    }
}
