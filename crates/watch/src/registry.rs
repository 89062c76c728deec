use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::info;

use common::{MarketDataGateway, NotificationSink, SubscriberId, WatchKey};
use signal::SignalParameters;

use crate::session::{Session, SessionHandle};

struct RunningSession {
    handle: SessionHandle,
    task: tokio::task::JoinHandle<()>,
}

/// All running sessions, one per subscriber.
///
/// `start` spawns the session task and retains its handle; that handle is
/// the only way to mutate or stop the session, so no task outlives its
/// registry entry unnoticed. Start and stop are idempotent.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<SubscriberId, RunningSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a monitoring session. Returns false when one is already
    /// running for the subscriber.
    pub async fn start(
        &self,
        subscriber: SubscriberId,
        watchlist: BTreeSet<WatchKey>,
        params: SignalParameters,
        gateway: Arc<dyn MarketDataGateway>,
        sink: Arc<dyn NotificationSink>,
        poll_interval: Duration,
    ) -> bool {
        let mut sessions = self.sessions.lock().await;
        if let Some(existing) = sessions.get(&subscriber) {
            if !existing.task.is_finished() {
                return false;
            }
        }

        let (session, handle) = Session::new(
            subscriber,
            watchlist,
            params,
            gateway,
            sink,
            poll_interval,
        );
        let task = tokio::spawn(session.run());
        sessions.insert(subscriber, RunningSession { handle, task });
        info!(subscriber, "Session registered");
        true
    }

    /// Stop a subscriber's session. The session finishes its in-flight tick
    /// and exits at the next suspension point. Returns false (a no-op) when
    /// nothing is running.
    pub async fn stop(&self, subscriber: SubscriberId) -> bool {
        let removed = self.sessions.lock().await.remove(&subscriber);
        match removed {
            Some(running) if !running.task.is_finished() => {
                running.handle.stop().await;
                info!(subscriber, "Session stop requested");
                true
            }
            _ => false,
        }
    }

    /// Handle to a live session, if one is running.
    pub async fn handle(&self, subscriber: SubscriberId) -> Option<SessionHandle> {
        self.sessions
            .lock()
            .await
            .get(&subscriber)
            .filter(|running| !running.task.is_finished())
            .map(|running| running.handle.clone())
    }

    pub async fn is_running(&self, subscriber: SubscriberId) -> bool {
        self.handle(subscriber).await.is_some()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions
            .lock()
            .await
            .values()
            .filter(|running| !running.task.is_finished())
            .count()
    }
}
