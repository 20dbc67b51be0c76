//! Shared fakes and fixtures for controller integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use retail_ad_session::beacon::BeaconSender;
use retail_ad_session::config::SessionConfig;
use retail_ad_session::controller::HostCallbacks;
use retail_ad_session::fetch::AdFetcher;
use retail_ad_session::models::{
    AdInventory, BannerAd, FormatType, RewardAd, VideoProgressEvent, VideoType, WebViewUrls,
};
use retail_ad_session::{AdError, AdSessionController, Result, RunMode};

/// Fetcher replaying queued responses; an empty queue yields empty inventory.
#[derive(Default)]
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<AdInventory>>>,
    pub calls: Mutex<u32>,
}

#[allow(dead_code)]
impl ScriptedFetcher {
    pub fn push(&self, response: Result<AdInventory>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl AdFetcher for ScriptedFetcher {
    async fn fetch_ads(&self, _session: &SessionConfig) -> Result<AdInventory> {
        *self.calls.lock().unwrap() += 1;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(AdInventory::empty()))
    }
}

/// Beacon sender recording every call, optionally failing all of them.
#[derive(Default)]
pub struct RecordingBeacons {
    pub sent: Mutex<Vec<(String, String, Option<VideoProgressEvent>)>>,
    pub fail: bool,
}

#[allow(dead_code)]
impl RecordingBeacons {
    pub fn failing() -> Self {
        RecordingBeacons {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<Option<VideoProgressEvent>> {
        self.sent.lock().unwrap().iter().map(|(_, _, e)| *e).collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl BeaconSender for RecordingBeacons {
    async fn send_beacon(
        &self,
        endpoint: &str,
        param: &str,
        event: Option<VideoProgressEvent>,
    ) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((endpoint.to_string(), param.to_string(), event));
        if self.fail {
            return Err(AdError::Beacon("HTTP status 500".to_string()));
        }
        Ok(())
    }
}

pub fn session() -> SessionConfig {
    SessionConfig::new("media-1", "user-1", "crypto-1", "group-1", RunMode::Local)
}

#[allow(dead_code)]
pub fn reward(ad_id: u64, index: u32, param: &str) -> RewardAd {
    RewardAd {
        ad_id,
        index,
        tag_id: "tag-1".to_string(),
        format_type: FormatType::Video,
        video_type: Some(VideoType::Standard),
        is_granted: false,
        webview_url: WebViewUrls {
            contents: "https://ads.test/contents".to_string(),
            getting: "https://ads.test/getting".to_string(),
            interruption: "https://ads.test/interruption".to_string(),
        },
        imp_url: "https://ads.test/imp".to_string(),
        view_url: "https://ads.test/view".to_string(),
        param: param.to_string(),
    }
}

#[allow(dead_code)]
pub fn banner(ad_id: u64, index: u32, param: &str) -> BannerAd {
    BannerAd {
        ad_id,
        index,
        tag_id: "tag-1".to_string(),
        width: 320,
        height: 50,
        imp_url: "https://ads.test/imp".to_string(),
        param: param.to_string(),
        webview_url: "https://ads.test/banner".to_string(),
        landing_page_url: Some("https://shop.test/item".to_string()),
    }
}

/// Controller wired to fakes.
#[allow(dead_code)]
pub fn controller(
    fetcher: Arc<ScriptedFetcher>,
    beacons: Arc<RecordingBeacons>,
    callbacks: HostCallbacks,
) -> AdSessionController {
    AdSessionController::builder(session(), fetcher, beacons)
        .callbacks(callbacks)
        .build()
}
