use serde::Serialize;
use tokio::sync::broadcast;

/// Capacity of the host signal channel; slow subscribers lose the oldest signals
pub const SIGNAL_CAPACITY: usize = 64;

/// Non-fatal events surfaced to the host application
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AdSignal {
    /// A fetch failed; the previous inventory is still in place
    FetchFailed { reason: String },

    /// Embedded content asked for a refetch
    FetchRequested,

    /// An impression beacon was delivered for the tracking key
    ImpressionSent { key: String },

    /// An impression or progress beacon could not be delivered
    BeaconFailed { key: String, reason: String },
}

pub type SignalSender = broadcast::Sender<AdSignal>;

pub fn channel() -> SignalSender {
    let (tx, _) = broadcast::channel(SIGNAL_CAPACITY);
    tx
}

/// Publish without caring whether anyone is listening
pub(crate) fn emit(sender: &SignalSender, signal: AdSignal) {
    let _ = sender.send(signal);
}
