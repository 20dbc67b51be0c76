use crate::config::TrackingConfig;
use crate::error::Result;
use crate::lock;
use crate::signals::{self, AdSignal, SignalSender};
use log::{debug, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Tracking key for one ad surface
pub fn impression_key(ad_id: u64, param: &str) -> String {
    format!("impression_{}_{}", ad_id, param)
}

struct TrackingSession {
    generation: u64,
    cancel: CancellationToken,
}

/// Fires impression beacons once a surface has been continuously visible
/// for the dwell threshold.
///
/// One poll task runs per tracking key. Arming a key that is already armed
/// cancels the running task first, so rapid remounts never leave duplicate
/// timers behind.
pub struct ImpressionTracker {
    config: TrackingConfig,
    sessions: Arc<Mutex<HashMap<String, TrackingSession>>>,
    next_generation: AtomicU64,
    signals: SignalSender,
}

impl ImpressionTracker {
    pub fn new(config: TrackingConfig, signals: SignalSender) -> Self {
        ImpressionTracker {
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
            signals,
        }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Start a dwell session for `key`.
    ///
    /// `poll` is sampled every poll interval. Any invisible sample restarts
    /// the dwell window. Once the surface has been visible for the whole
    /// threshold, polling stops and `fire` runs exactly once. A failing
    /// `fire` is logged and reported as `AdSignal::BeaconFailed`.
    ///
    /// Returns whether the session was armed; outside a tokio runtime
    /// nothing is.
    pub fn arm<P, F, Fut>(&self, key: impl Into<String>, mut poll: P, fire: F) -> bool
    where
        P: FnMut() -> bool + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let key = key.into();
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("Cannot track {} outside an async runtime", key);
            return false;
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        {
            let mut sessions = lock(&self.sessions);
            if let Some(previous) = sessions.insert(
                key.clone(),
                TrackingSession {
                    generation,
                    cancel: cancel.clone(),
                },
            ) {
                debug!("Replacing tracking session for {}", key);
                previous.cancel.cancel();
            }
        }

        let sessions = Arc::clone(&self.sessions);
        let signals = self.signals.clone();
        let poll_interval = self.config.poll_interval;
        let dwell_threshold = self.config.dwell_threshold;

        debug!("Armed impression tracking for {}", key);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut dwell_started_at = Instant::now();

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Tracking session for {} cancelled", key);
                        return;
                    }
                    _ = ticker.tick() => {}
                }

                if !poll() {
                    dwell_started_at = Instant::now();
                    continue;
                }
                if dwell_started_at.elapsed() >= dwell_threshold {
                    break;
                }
            }

            // a replacement or disarm may have raced the last tick
            {
                let mut sessions = lock(&sessions);
                let current = sessions
                    .get(&key)
                    .is_some_and(|session| session.generation == generation);
                if !current || cancel.is_cancelled() {
                    return;
                }
                sessions.remove(&key);
            }

            match fire().await {
                Ok(()) => {
                    debug!("Impression recorded for {}", key);
                    signals::emit(&signals, AdSignal::ImpressionSent { key });
                }
                Err(e) => {
                    warn!("Failed to track impression for {}: {}", key, e);
                    signals::emit(
                        &signals,
                        AdSignal::BeaconFailed {
                            key,
                            reason: e.to_string(),
                        },
                    );
                }
            }
        });
        true
    }

    /// Cancel the session for `key`; a no-op for fired or unknown keys
    pub fn disarm(&self, key: &str) {
        if let Some(session) = lock(&self.sessions).remove(key) {
            debug!("Disarmed impression tracking for {}", key);
            session.cancel.cancel();
        }
    }

    pub fn disarm_all(&self) {
        let mut sessions = lock(&self.sessions);
        for (_, session) in sessions.drain() {
            session.cancel.cancel();
        }
    }

    pub fn is_armed(&self, key: &str) -> bool {
        lock(&self.sessions).contains_key(key)
    }

    pub fn active_sessions(&self) -> usize {
        lock(&self.sessions).len()
    }
}

impl Drop for ImpressionTracker {
    fn drop(&mut self) {
        self.disarm_all();
    }
}
