use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Mutex;

use common::{
    Candle, CandleSeries, MarketDataGateway, NotificationSink, Result, SubscriberId, Timeframe,
    WatchKey,
};
use signal::SignalParameters;
use watch::{Session, SessionRegistry};

// ─── Scripted collaborators ──────────────────────────────────────────────────

/// Serves a fixed candle series and a scripted sequence of price reads
/// (falling back to a constant once the script is exhausted).
struct ScriptedGateway {
    series: CandleSeries,
    prices: Mutex<VecDeque<f64>>,
    fallback_price: f64,
}

#[async_trait]
impl MarketDataGateway for ScriptedGateway {
    async fn candles(&self, _key: &WatchKey, _limit: usize) -> Result<CandleSeries> {
        Ok(self.series.clone())
    }

    async fn last_price(&self, _key: &WatchKey) -> Result<f64> {
        Ok(self
            .prices
            .lock()
            .await
            .pop_front()
            .unwrap_or(self.fallback_price))
    }
}

#[derive(Default)]
struct CapturingSink {
    messages: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationSink for CapturingSink {
    async fn notify(&self, _subscriber: SubscriberId, text: &str) {
        self.messages.lock().await.push(text.to_string());
    }
}

impl CapturingSink {
    async fn snapshot(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }

    async fn wait_for(&self, count: usize) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let messages = self.snapshot().await;
                if messages.len() >= count {
                    return messages;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for alerts")
    }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn key() -> WatchKey {
    WatchKey::parse("BTC_USDT", Timeframe::M15).unwrap()
}

fn candle(i: usize, close: f64, closed: bool) -> Candle {
    Candle {
        open_time: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
            + chrono::Duration::minutes(15 * i as i64),
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 1.0,
        closed,
    }
}

/// 16 flat bars at 100 then nine 0.5 steps down to 95.5, plus a forming
/// bar. ATR(14) is exactly 1.0, so the signal levels are
/// stop 94.5 / tp1 96.0 / tp2 96.5 at an entry of 95.5.
fn downtrend_series() -> CandleSeries {
    let mut closes = vec![100.0; 16];
    for step in 1..=9 {
        closes.push(100.0 - 0.5 * step as f64);
    }
    let mut candles: Vec<Candle> = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| candle(i, c, true))
        .collect();
    candles.push(candle(closes.len(), 95.4, false));
    CandleSeries::new(candles)
}

fn test_params() -> SignalParameters {
    SignalParameters {
        use_rsi_filter: false,
        use_trend_filter: false,
        trend_ema_length: 10,
        ..Default::default()
    }
}

fn scripted(prices: Vec<f64>, fallback: f64) -> Arc<ScriptedGateway> {
    Arc::new(ScriptedGateway {
        series: downtrend_series(),
        prices: Mutex::new(VecDeque::from(prices)),
        fallback_price: fallback,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn entry_tp1_and_stop_flow_end_to_end() {
    let gateway = scripted(vec![95.5, 96.0, 94.5], 95.5);
    let sink = Arc::new(CapturingSink::default());
    let (session, handle) = Session::new(
        7,
        [key()].into_iter().collect(),
        test_params(),
        gateway,
        sink.clone(),
        Duration::from_millis(10),
    );
    tokio::spawn(session.run());

    let messages = sink.wait_for(3).await;
    assert!(
        messages[0].contains("Entry found") && messages[0].contains("LONG"),
        "unexpected entry alert: {}",
        messages[0]
    );
    assert!(messages[0].contains("95.500000"));
    assert!(messages[1].contains("TP1 reached") && messages[1].contains("96.000000"));
    // The 94.5 read exits via the stop, never via the second target.
    assert!(messages[2].contains("STOP") && messages[2].contains("94.500000"));
    assert!(!messages[2].contains("TP2"));

    // The same closed bar keeps arriving, so the bar is never re-evaluated:
    // no re-entry even though the book is empty again.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.snapshot().await.len(), 3);

    let report = handle.report().await.expect("session alive");
    assert!(report.positions.is_empty());

    handle.stop().await;
    handle.stop().await; // stopping twice is harmless
}

#[tokio::test]
async fn watchlist_mutations_apply_between_ticks() {
    // Price reads hold at the entry so the position never exits by itself.
    let gateway = scripted(Vec::new(), 95.5);
    let sink = Arc::new(CapturingSink::default());
    let (session, handle) = Session::new(
        7,
        BTreeSet::new(),
        test_params(),
        gateway,
        sink.clone(),
        Duration::from_millis(10),
    );
    tokio::spawn(session.run());

    // Nothing watched yet: no alerts.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.snapshot().await.is_empty());

    assert!(handle.add(key()).await);
    let messages = sink.wait_for(1).await;
    assert!(messages[0].contains("Entry found"));

    let report = handle.report().await.unwrap();
    assert_eq!(report.watchlist, vec![key()]);
    assert_eq!(report.positions.len(), 1);

    // Removing the pair stops new-signal checks but keeps the live
    // position monitored.
    assert!(handle.remove(key()).await);
    let report = handle.report().await.unwrap();
    assert!(report.watchlist.is_empty());
    assert_eq!(report.positions.len(), 1);

    handle.stop().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(handle.report().await.is_none(), "stopped session still answering");
}

#[tokio::test]
async fn invalid_parameter_update_keeps_last_valid() {
    let gateway = scripted(Vec::new(), 95.5);
    let sink = Arc::new(CapturingSink::default());
    let (session, handle) = Session::new(
        7,
        BTreeSet::new(),
        test_params(),
        gateway,
        sink,
        Duration::from_millis(10),
    );
    tokio::spawn(session.run());

    let bad = SignalParameters {
        deviation_threshold: -1.0,
        ..Default::default()
    };
    assert!(handle.set_params(bad).await);
    let report = handle.report().await.unwrap();
    assert!(report.params.deviation_threshold > 0.0, "bad update was applied");

    let good = SignalParameters {
        deviation_threshold: 0.01,
        ..test_params()
    };
    assert!(handle.set_params(good.clone()).await);
    let report = handle.report().await.unwrap();
    assert_eq!(report.params, good);

    handle.stop().await;
}

#[tokio::test]
async fn registry_start_and_stop_are_idempotent() {
    let registry = SessionRegistry::new();
    let gateway = scripted(Vec::new(), 0.0);
    let sink = Arc::new(CapturingSink::default());
    let watchlist: BTreeSet<WatchKey> = BTreeSet::new();

    assert!(
        registry
            .start(
                1,
                watchlist.clone(),
                SignalParameters::default(),
                gateway.clone(),
                sink.clone(),
                Duration::from_millis(10),
            )
            .await
    );
    assert!(
        !registry
            .start(
                1,
                watchlist,
                SignalParameters::default(),
                gateway,
                sink,
                Duration::from_millis(10),
            )
            .await,
        "second start must be a no-op"
    );
    assert!(registry.is_running(1).await);
    assert_eq!(registry.active_count().await, 1);

    assert!(registry.stop(1).await);
    assert!(!registry.stop(1).await, "stopping a stopped session must be a no-op");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!registry.is_running(1).await);
    assert_eq!(registry.active_count().await, 0);
}
