use crate::models::{AdsRequest, DeviceInfo, RequestPublisher, RequestTagInfo, RequestUser};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const LOCAL_AD_SERVER_URL: &str = "http://localhost:3000/api/ads";
pub const DEV_AD_SERVER_URL: &str = "https://dev-ad.retaiboo.com/ad/v1";
pub const STG_AD_SERVER_URL: &str = "https://stg-ad.retaiboo.com/ad/v1";
pub const PRD_AD_SERVER_URL: &str = "https://ad.retaiboo.com/ad/v1";
pub const MOCK_AD_SERVER_URL: &str = "https://mock.retaiboo.com/ad/v1";

/// Timeout for the fetch-ads call
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout for impression and progress beacons
pub const BEACON_TIMEOUT: Duration = Duration::from_secs(10);

/// Which ad server environment a session talks to
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Local,
    Dev,
    Stg,
    Prd,
    Mock,
}

impl RunMode {
    pub fn ad_server_url(&self) -> &'static str {
        match self {
            RunMode::Local => LOCAL_AD_SERVER_URL,
            RunMode::Dev => DEV_AD_SERVER_URL,
            RunMode::Stg => STG_AD_SERVER_URL,
            RunMode::Prd => PRD_AD_SERVER_URL,
            RunMode::Mock => MOCK_AD_SERVER_URL,
        }
    }
}

/// Parameters identifying one ad session against the ad server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub media_id: String,
    pub user_id: String,
    pub crypto: String,
    pub tag_group_id: String,
    pub run_mode: RunMode,

    /// Replaces the run mode's endpoint when set
    pub endpoint_override: Option<String>,

    pub device: DeviceInfo,
}

impl SessionConfig {
    pub fn new(
        media_id: impl Into<String>,
        user_id: impl Into<String>,
        crypto: impl Into<String>,
        tag_group_id: impl Into<String>,
        run_mode: RunMode,
    ) -> Self {
        SessionConfig {
            media_id: media_id.into(),
            user_id: user_id.into(),
            crypto: crypto.into(),
            tag_group_id: tag_group_id.into(),
            run_mode,
            endpoint_override: None,
            device: DeviceInfo::default(),
        }
    }

    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint_override
            .as_deref()
            .unwrap_or_else(|| self.run_mode.ad_server_url())
    }

    /// Build the fetch-ads request body for this session
    pub fn to_request(&self) -> AdsRequest {
        AdsRequest {
            user: RequestUser {
                id: self.user_id.clone(),
            },
            publisher: RequestPublisher {
                id: self.media_id.clone(),
                crypto: self.crypto.clone(),
            },
            tag_info: RequestTagInfo {
                tag_group_id: self.tag_group_id.clone(),
            },
            device: self.device.clone(),
        }
    }
}

/// Timing and threshold knobs of impression tracking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingConfig {
    /// How often visibility is sampled
    pub poll_interval: Duration,

    /// Continuous visibility required before an impression counts
    pub dwell_threshold: Duration,

    /// Minimum visible fraction of the surface area
    pub visibility_ratio: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        TrackingConfig {
            poll_interval: Duration::from_millis(100),
            dwell_threshold: Duration::from_secs(1),
            visibility_ratio: 0.5,
        }
    }
}
