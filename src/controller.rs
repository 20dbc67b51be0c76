use crate::beacon::{BeaconSender, HttpBeaconSender, ProgressMilestones};
use crate::bridge::{self, BridgeEvent};
use crate::config::{SessionConfig, TrackingConfig};
use crate::error::{AdError, Result};
use crate::fetch::{AdFetcher, HttpAdFetcher};
use crate::lock;
use crate::models::{AdInventory, AdKind, BannerAd, RewardAd, VideoProgressEvent};
use crate::signals::{self, AdSignal, SignalSender};
use crate::tracker::{ImpressionTracker, impression_key};
use crate::visibility::{SurfaceGeometry, visibility_predicate};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use url::Url;

/// The single overlay presented above the ad surfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayState {
    Closed,
    Video(String),
    VideoSurvey(String),
    Survey(String),
    /// Playback was closed before the reward was earned
    Interruption,
    /// Playback finished and the reward is being confirmed
    RewardConfirmation,
}

impl OverlayState {
    pub fn is_open(&self) -> bool {
        *self != OverlayState::Closed
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            OverlayState::Video(url)
            | OverlayState::VideoSurvey(url)
            | OverlayState::Survey(url) => Some(url),
            _ => None,
        }
    }
}

/// Host hook invoked on the calling context
pub type HostCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub struct HostCallbacks {
    pub on_mark_succeeded: Option<HostCallback>,
    pub on_reward_modal_closed: Option<HostCallback>,
}

/// Opens external links outside the ad surface (browser, store, ...)
#[async_trait]
pub trait LinkOpener: Send + Sync {
    async fn open(&self, url: &Url) -> Result<()>;
}

/// The rendered surface a bridge message came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdSurface {
    Reward(RewardAd),
    Banner(BannerAd),
}

/// What the impression tracker needs to know about one rendered ad
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpressionTarget {
    pub kind: AdKind,
    pub ad_id: u64,
    pub endpoint: String,
    pub param: String,
}

impl ImpressionTarget {
    pub fn key(&self) -> String {
        impression_key(self.ad_id, &self.param)
    }
}

impl From<&RewardAd> for ImpressionTarget {
    fn from(ad: &RewardAd) -> Self {
        ImpressionTarget {
            kind: AdKind::Reward,
            ad_id: ad.ad_id,
            endpoint: ad.imp_url.clone(),
            param: ad.param.clone(),
        }
    }
}

impl From<&BannerAd> for ImpressionTarget {
    fn from(ad: &BannerAd) -> Self {
        ImpressionTarget {
            kind: AdKind::Banner,
            ad_id: ad.ad_id,
            endpoint: ad.imp_url.clone(),
            param: ad.param.clone(),
        }
    }
}

struct SessionState {
    inventory: AdInventory,
    overlay: OverlayState,
    current_ad: Option<RewardAd>,
    impression_record: HashSet<u64>,
    refresh_token: u64,
    last_fingerprint: String,
    milestones: ProgressMilestones,
}

impl SessionState {
    fn new() -> Self {
        SessionState {
            inventory: AdInventory::empty(),
            overlay: OverlayState::Closed,
            current_ad: None,
            impression_record: HashSet::new(),
            refresh_token: 0,
            last_fingerprint: String::new(),
            milestones: ProgressMilestones::new(),
        }
    }

    fn close_overlay(&mut self) {
        self.overlay = OverlayState::Closed;
        self.current_ad = None;
        self.milestones.reset();
    }
}

struct Inner {
    session: SessionConfig,
    fetcher: Arc<dyn AdFetcher>,
    beacons: Arc<dyn BeaconSender>,
    links: Option<Arc<dyn LinkOpener>>,
    callbacks: HostCallbacks,
    tracker: ImpressionTracker,
    signals: SignalSender,
    state: Mutex<SessionState>,
}

/// Assembles an [`AdSessionController`] from its collaborators
pub struct ControllerBuilder {
    session: SessionConfig,
    fetcher: Arc<dyn AdFetcher>,
    beacons: Arc<dyn BeaconSender>,
    links: Option<Arc<dyn LinkOpener>>,
    callbacks: HostCallbacks,
    tracking: TrackingConfig,
}

impl ControllerBuilder {
    pub fn callbacks(mut self, callbacks: HostCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn link_opener(mut self, links: Arc<dyn LinkOpener>) -> Self {
        self.links = Some(links);
        self
    }

    pub fn tracking(mut self, tracking: TrackingConfig) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn build(self) -> AdSessionController {
        let signals = signals::channel();
        let tracker = ImpressionTracker::new(self.tracking, signals.clone());
        AdSessionController {
            inner: Arc::new(Inner {
                session: self.session,
                fetcher: self.fetcher,
                beacons: self.beacons,
                links: self.links,
                callbacks: self.callbacks,
                tracker,
                signals,
                state: Mutex::new(SessionState::new()),
            }),
        }
    }
}

/// Owns the ad inventory, the active overlay and the impression record of
/// one ad placement, and reacts to host calls and content messages.
///
/// Cloning is cheap and every clone drives the same session. State is only
/// touched in short synchronous sections; network calls never hold it.
#[derive(Clone)]
pub struct AdSessionController {
    inner: Arc<Inner>,
}

impl AdSessionController {
    pub fn builder(
        session: SessionConfig,
        fetcher: Arc<dyn AdFetcher>,
        beacons: Arc<dyn BeaconSender>,
    ) -> ControllerBuilder {
        ControllerBuilder {
            session,
            fetcher,
            beacons,
            links: None,
            callbacks: HostCallbacks::default(),
            tracking: TrackingConfig::default(),
        }
    }

    /// Controller talking to the real ad server over HTTP
    pub fn connect(session: SessionConfig, callbacks: HostCallbacks) -> Result<Self> {
        let fetcher = Arc::new(HttpAdFetcher::new()?);
        let beacons = Arc::new(HttpBeaconSender::new()?);
        Ok(Self::builder(session, fetcher, beacons)
            .callbacks(callbacks)
            .build())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AdSignal> {
        self.inner.signals.subscribe()
    }

    pub fn session(&self) -> &SessionConfig {
        &self.inner.session
    }

    pub fn inventory(&self) -> AdInventory {
        lock(&self.inner.state).inventory.clone()
    }

    pub fn overlay(&self) -> OverlayState {
        lock(&self.inner.state).overlay.clone()
    }

    /// The reward ad the open overlay belongs to
    pub fn current_ad(&self) -> Option<RewardAd> {
        lock(&self.inner.state).current_ad.clone()
    }

    /// Changes only when the reward ads' identity or order changed
    pub fn refresh_token(&self) -> u64 {
        lock(&self.inner.state).refresh_token
    }

    pub fn has_impression_been_recorded(&self, ad_id: u64) -> bool {
        lock(&self.inner.state).impression_record.contains(&ad_id)
    }

    /// Stable UI identity for each rendered ad, in render order
    pub fn surface_keys(&self) -> Vec<String> {
        let state = lock(&self.inner.state);
        match state.inventory.kind() {
            AdKind::Reward => state
                .inventory
                .reward_ads()
                .iter()
                .map(|ad| format!("reward_{}_{}", ad.index, state.refresh_token))
                .collect(),
            AdKind::Banner => state
                .inventory
                .banner_ads()
                .iter()
                .map(|ad| format!("banner_{}", ad.index))
                .collect(),
            AdKind::None => Vec::new(),
        }
    }

    /// Fetch a fresh inventory and swap it in.
    ///
    /// On failure the current inventory and overlay are kept, a
    /// `FetchFailed` signal is published and the error is returned. There is
    /// no retry. Overlapping calls are not coalesced: the last response to
    /// arrive wins.
    pub async fn fetch(&self) -> Result<()> {
        match self.inner.fetcher.fetch_ads(&self.inner.session).await {
            Ok(inventory) => {
                self.apply_inventory(inventory);
                Ok(())
            }
            Err(e) => {
                error!("Error fetching ads: {}", e);
                signals::emit(
                    &self.inner.signals,
                    AdSignal::FetchFailed {
                        reason: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    fn apply_inventory(&self, inventory: AdInventory) {
        let mut state = lock(&self.inner.state);

        // banner ads are visually idempotent and never force a remount;
        // an open overlay keeps its own copy of the bound ad
        let fingerprint = inventory.reward_fingerprint();
        if fingerprint != state.last_fingerprint {
            state.refresh_token += 1;
            state.last_fingerprint = fingerprint;
        }

        let live_ids: HashSet<u64> = inventory.ad_ids().collect();
        state.impression_record.retain(|id| live_ids.contains(id));

        info!(
            "Inventory updated: {:?} with {} reward / {} banner ads",
            inventory.kind(),
            inventory.reward_ads().len(),
            inventory.banner_ads().len()
        );
        state.inventory = inventory;
    }

    /// Decode a raw content message and act on it.
    ///
    /// Unknown channels are dropped silently, malformed payloads on known
    /// channels are logged.
    pub fn handle_message(&self, source: &AdSurface, channel: &str, payload: &str) {
        match bridge::decode(channel, payload) {
            Ok(Some(event)) => self.handle_bridge_event(source, event),
            Ok(None) => {}
            Err(e) => warn!("Dropping bridge message ({:?}): {}", e.kind(), e),
        }
    }

    /// Apply one content event to the overlay state machine
    pub fn handle_bridge_event(&self, source: &AdSurface, event: BridgeEvent) {
        debug!("Bridge event {:?}", event.channel());
        match event {
            BridgeEvent::PlayVideo(url) => self.open_overlay(source, OverlayState::Video(url)),
            BridgeEvent::PlayVideoSurvey(url) => {
                self.open_overlay(source, OverlayState::VideoSurvey(url))
            }
            BridgeEvent::ShowModal(url) => self.open_overlay(source, OverlayState::Survey(url)),
            BridgeEvent::CloseModal => self.close_modal(),
            BridgeEvent::OnMarkSuccess => {
                if let Some(callback) = &self.inner.callbacks.on_mark_succeeded {
                    callback();
                }
            }
            BridgeEvent::OnRewardFinish => {
                if let Some(callback) = &self.inner.callbacks.on_reward_modal_closed {
                    callback();
                }
            }
            BridgeEvent::FetchAds => {
                let controller = self.clone();
                crate::spawn_detached(async move {
                    // failures already surface as FetchFailed
                    let _ = controller.fetch().await;
                });
                signals::emit(&self.inner.signals, AdSignal::FetchRequested);
            }
            BridgeEvent::OpenUrl(url) => self.open_url(source, url),
        }
    }

    fn open_overlay(&self, source: &AdSurface, overlay: OverlayState) {
        let AdSurface::Reward(ad) = source else {
            debug!("Ignoring {:?} from a banner surface", overlay);
            return;
        };

        let mut state = lock(&self.inner.state);
        if state.overlay.is_open() {
            debug!("Ignoring {:?} while {:?} is open", overlay, state.overlay);
            return;
        }
        state.overlay = overlay;
        state.current_ad = Some(ad.clone());
        state.milestones.reset();
    }

    fn close_modal(&self) {
        let mut state = lock(&self.inner.state);
        let granted = state.current_ad.as_ref().is_some_and(|ad| ad.is_granted);
        if !state.overlay.is_open() {
            return;
        }
        if matches!(state.overlay, OverlayState::Video(_)) && !granted {
            debug!("Video closed before the reward was earned");
            state.overlay = OverlayState::Interruption;
        } else {
            state.close_overlay();
        }
    }

    /// Close whatever overlay is open, e.g. after the host dismissed the
    /// interruption or reward confirmation screen
    pub fn dismiss_overlay(&self) {
        lock(&self.inner.state).close_overlay();
    }

    fn open_url(&self, source: &AdSurface, url: String) {
        let raw = if url.is_empty() {
            match source {
                AdSurface::Banner(ad) => ad.landing_page_url.clone().unwrap_or_default(),
                AdSurface::Reward(_) => String::new(),
            }
        } else {
            url
        };

        let url = match Url::parse(&raw) {
            Ok(url) => url,
            Err(e) => {
                let err = AdError::Navigation(format!("{:?}: {}", raw, e));
                warn!("Not opening link: {}", err);
                return;
            }
        };

        let Some(links) = self.inner.links.clone() else {
            warn!("No link opener installed, dropping {}", url);
            return;
        };
        crate::spawn_detached(async move {
            match links.open(&url).await {
                Ok(()) => debug!("Opened URL: {}", url),
                Err(e) => warn!("Failed to open URL {}: {}", url, e),
            }
        });
    }

    /// Playback of the bound video started
    pub async fn on_video_started(&self) {
        self.send_progress(&[VideoProgressEvent::Start]).await;
    }

    /// Playback reached `percent` of the video
    pub async fn on_video_progress(&self, percent: u32) {
        let crossed = lock(&self.inner.state).milestones.crossed(percent);
        self.send_progress(&crossed).await;
    }

    /// Playback ran to the end; ungranted rewards move on to confirmation
    pub async fn on_video_ended(&self) {
        self.send_progress(&[VideoProgressEvent::End]).await;

        let mut state = lock(&self.inner.state);
        if matches!(state.overlay, OverlayState::Video(_)) {
            let granted = state.current_ad.as_ref().is_some_and(|ad| ad.is_granted);
            if granted {
                state.close_overlay();
            } else {
                state.overlay = OverlayState::RewardConfirmation;
            }
        }
    }

    async fn send_progress(&self, events: &[VideoProgressEvent]) {
        let Some(ad) = self.current_ad() else {
            debug!("No bound ad, skipping progress beacons");
            return;
        };
        for event in events {
            if let Err(e) = self
                .inner
                .beacons
                .send_beacon(&ad.view_url, &ad.param, Some(*event))
                .await
            {
                warn!("Failed to send {} beacon for ad {}: {}", event.as_str(), ad.ad_id, e);
                signals::emit(
                    &self.inner.signals,
                    AdSignal::BeaconFailed {
                        key: format!("progress_{}_{}", ad.ad_id, event.as_str()),
                        reason: e.to_string(),
                    },
                );
            }
        }
    }

    /// Arm impression tracking for a freshly rendered surface.
    ///
    /// Reward ads are tracked once per ad id for the lifetime of the
    /// controller; banner ads are tracked on every call. The ad id is
    /// recorded before the beacon is sent and stays recorded even if the
    /// beacon fails. Returns whether tracking was armed; a session that could
    /// not be armed leaves no record behind.
    pub fn mark_impression_eligible<P>(&self, target: &ImpressionTarget, visible: P) -> bool
    where
        P: FnMut() -> bool + Send + 'static,
    {
        let armed = {
            let mut state = lock(&self.inner.state);
            match target.kind {
                AdKind::Reward => state.impression_record.insert(target.ad_id),
                AdKind::Banner => {
                    state.impression_record.insert(target.ad_id);
                    true
                }
                AdKind::None => false,
            }
        };
        if !armed {
            debug!("Impression already recorded for ad {}", target.ad_id);
            return false;
        }

        let beacons = Arc::clone(&self.inner.beacons);
        let endpoint = target.endpoint.clone();
        let param = target.param.clone();
        let armed = self.inner.tracker.arm(target.key(), visible, move || async move {
            beacons.send_beacon(&endpoint, &param, None).await
        });
        if !armed && target.kind == AdKind::Reward {
            // nothing will ever send it, so let a later render try again
            lock(&self.inner.state).impression_record.remove(&target.ad_id);
        }
        armed
    }

    /// Like [`Self::mark_impression_eligible`], sampling the surface geometry
    /// against the configured visibility ratio
    pub fn mark_surface_eligible<S>(&self, target: &ImpressionTarget, geometry: S) -> bool
    where
        S: FnMut() -> SurfaceGeometry + Send + 'static,
    {
        let threshold = self.inner.tracker.config().visibility_ratio;
        self.mark_impression_eligible(target, visibility_predicate(geometry, threshold))
    }

    /// Stop tracking a surface that went away before its impression counted
    pub fn stop_impression_tracking(&self, target: &ImpressionTarget) {
        self.inner.tracker.disarm(&target.key());
    }

    pub fn is_tracking(&self, target: &ImpressionTarget) -> bool {
        self.inner.tracker.is_armed(&target.key())
    }

    /// Cancel all tracking and forget every recorded impression
    pub fn dispose(&self) {
        self.inner.tracker.disarm_all();
        let mut state = lock(&self.inner.state);
        state.impression_record.clear();
        state.close_overlay();
    }
}
