pub mod beacon;
pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetch;
pub mod models;
pub mod signals;
pub mod tracker;
pub mod visibility;

pub use bridge::{BridgeCommand, BridgeEvent, Channel, MessageBridge};
pub use config::{RunMode, SessionConfig, TrackingConfig};
pub use controller::{AdSessionController, AdSurface, HostCallbacks, ImpressionTarget, OverlayState};
pub use error::{AdError, Result};
pub use models::{AdInventory, AdKind, BannerAd, RewardAd};
pub use signals::AdSignal;

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock shared state, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Spawn a detached task on the current runtime; without one the task is
/// dropped and logged rather than panicking the host
pub(crate) fn spawn_detached<F>(task: F) -> bool
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task);
            true
        }
        Err(e) => {
            log::error!("No async runtime available, dropping task: {}", e);
            false
        }
    }
}
