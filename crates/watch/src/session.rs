use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use common::{MarketDataGateway, NotificationSink, Position, SubscriberId, WatchKey};
use signal::{evaluate, Evaluation, SignalParameters};
use tracker::PositionBook;

use crate::messages;

/// Candles fetched per evaluation; enough history for the default windows
/// with room for longer user-configured trend EMAs.
pub const CANDLE_FETCH_LIMIT: usize = 120;

/// Mutations and queries accepted by a running session. Commands queue on
/// the session's channel and are applied between ticks, so an in-flight
/// scan never observes a partial update.
#[derive(Debug)]
pub enum SessionCommand {
    Add(WatchKey),
    Remove(WatchKey),
    SetParams(SignalParameters),
    Report(oneshot::Sender<SessionReport>),
    Stop,
}

/// Snapshot of a session's state, answered over a oneshot channel.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub watchlist: Vec<WatchKey>,
    pub params: SignalParameters,
    pub positions: Vec<Position>,
}

/// Cloneable handle to a running session. Dropping every handle closes the
/// command channel, which also stops the session.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Each mutator returns false when the session is no longer running.
    pub async fn add(&self, key: WatchKey) -> bool {
        self.command_tx.send(SessionCommand::Add(key)).await.is_ok()
    }

    pub async fn remove(&self, key: WatchKey) -> bool {
        self.command_tx
            .send(SessionCommand::Remove(key))
            .await
            .is_ok()
    }

    pub async fn set_params(&self, params: SignalParameters) -> bool {
        self.command_tx
            .send(SessionCommand::SetParams(params))
            .await
            .is_ok()
    }

    pub async fn report(&self) -> Option<SessionReport> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .command_tx
            .send(SessionCommand::Report(reply_tx))
            .await
            .is_err()
        {
            return None;
        }
        reply_rx.await.ok()
    }

    /// Request a stop. Takes effect at the session's next suspension point;
    /// the in-flight tick finishes first. Safe to call repeatedly.
    pub async fn stop(&self) {
        let _ = self.command_tx.send(SessionCommand::Stop).await;
    }
}

/// One subscriber's monitoring loop.
///
/// The session exclusively owns its watchlist, last-processed-bar map,
/// position book and parameters; nothing else mutates them, so no locking
/// is needed. All outside interaction goes through the command channel.
pub struct Session {
    subscriber: SubscriberId,
    watchlist: BTreeSet<WatchKey>,
    params: SignalParameters,
    last_processed_bar: HashMap<WatchKey, DateTime<Utc>>,
    book: PositionBook,
    gateway: Arc<dyn MarketDataGateway>,
    sink: Arc<dyn NotificationSink>,
    command_rx: mpsc::Receiver<SessionCommand>,
    poll_interval: Duration,
}

impl Session {
    pub fn new(
        subscriber: SubscriberId,
        watchlist: BTreeSet<WatchKey>,
        params: SignalParameters,
        gateway: Arc<dyn MarketDataGateway>,
        sink: Arc<dyn NotificationSink>,
        poll_interval: Duration,
    ) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let session = Session {
            subscriber,
            watchlist,
            params,
            last_processed_bar: HashMap::new(),
            book: PositionBook::new(),
            gateway,
            sink,
            command_rx,
            poll_interval,
        };
        (session, SessionHandle { command_tx })
    }

    /// Run the monitoring loop until stopped. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!(
            subscriber = self.subscriber,
            interval = ?self.poll_interval,
            pairs = self.watchlist.len(),
            "Signal session started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.scan().await,

                cmd = self.command_rx.recv() => match cmd {
                    Some(SessionCommand::Add(key)) => {
                        if self.watchlist.insert(key.clone()) {
                            info!(subscriber = self.subscriber, key = %key, "Pair added to watchlist");
                        }
                    }
                    Some(SessionCommand::Remove(key)) => {
                        if self.watchlist.remove(&key) {
                            // A live position for the key keeps being
                            // monitored until it exits on its own.
                            self.last_processed_bar.remove(&key);
                            info!(subscriber = self.subscriber, key = %key, "Pair removed from watchlist");
                        }
                    }
                    Some(SessionCommand::SetParams(params)) => match params.validate() {
                        Ok(()) => {
                            info!(subscriber = self.subscriber, "Signal parameters updated");
                            self.params = params;
                        }
                        Err(e) => {
                            // Keep the last-valid parameters.
                            warn!(subscriber = self.subscriber, error = %e, "Rejected parameter update");
                        }
                    },
                    Some(SessionCommand::Report(reply)) => {
                        let _ = reply.send(self.report());
                    }
                    Some(SessionCommand::Stop) | None => break,
                },
            }
        }

        info!(subscriber = self.subscriber, "Signal session stopped");
    }

    fn report(&self) -> SessionReport {
        SessionReport {
            watchlist: self.watchlist.iter().cloned().collect(),
            params: self.params.clone(),
            positions: self.book.positions(),
        }
    }

    /// One tick: the new-signal pass over the watchlist runs before the
    /// exit pass, so an exit check always sees a position opened earlier in
    /// the same tick.
    async fn scan(&mut self) {
        let keys: Vec<WatchKey> = self.watchlist.iter().cloned().collect();
        for key in &keys {
            self.check_entry(key).await;
        }
        for key in self.book.live_keys() {
            self.check_exit(&key).await;
        }
    }

    async fn check_entry(&mut self, key: &WatchKey) {
        let series = match self.gateway.candles(key, CANDLE_FETCH_LIMIT).await {
            Ok(series) => series,
            Err(e) => {
                warn!(key = %key, error = %e, "Candle fetch failed; skipping this tick");
                return;
            }
        };
        let Some(last_closed) = series.last_closed() else {
            warn!(key = %key, "Feed contains no closed bars; skipping this tick");
            return;
        };

        // At most one evaluation per closed bar.
        let bar_time = last_closed.open_time;
        if self.last_processed_bar.get(key) == Some(&bar_time) {
            return;
        }
        self.last_processed_bar.insert(key.clone(), bar_time);

        match evaluate(&series, &self.params) {
            Evaluation::Signal(signal) => {
                if self.book.is_live(key) {
                    // No pyramiding: one live position per key.
                    debug!(key = %key, "Signal suppressed, position already live");
                    return;
                }
                self.book.open(key.clone(), &signal);
                self.sink
                    .notify(self.subscriber, &messages::entry_alert(key, &signal))
                    .await;
            }
            Evaluation::NoSignal(reason) => {
                debug!(key = %key, reason = %reason, "No signal");
            }
        }
    }

    async fn check_exit(&mut self, key: &WatchKey) {
        let last = match self.gateway.last_price(key).await {
            Ok(price) => price,
            Err(e) => {
                warn!(key = %key, error = %e, "Price read failed; skipping exit check");
                return;
            }
        };
        if let Some(event) = self.book.apply_price(key, last) {
            self.sink
                .notify(self.subscriber, &messages::event_alert(&event))
                .await;
        }
    }
}
