use crate::config::{FETCH_TIMEOUT, SessionConfig};
use crate::error::{AdError, Result};
use crate::models::{AdInventory, AdsRequest, BannerAd, RewardAd, TagGroup};
use async_trait::async_trait;
use log::{debug, warn};
use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};
use serde::Deserialize;

/// Source of ad inventory for a session
#[async_trait]
pub trait AdFetcher: Send + Sync {
    async fn fetch_ads(&self, session: &SessionConfig) -> Result<AdInventory>;
}

/// Fetches ads from the remote ad server over HTTPS
pub struct HttpAdFetcher {
    client: reqwest::Client,
}

impl HttpAdFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| AdError::Other(format!("Failed to build HTTP client: {}", e)))?;
        Ok(HttpAdFetcher { client })
    }
}

#[async_trait]
impl AdFetcher for HttpAdFetcher {
    async fn fetch_ads(&self, session: &SessionConfig) -> Result<AdInventory> {
        let req_id = request_id();
        let url = url::Url::parse(session.endpoint())?;
        let body: AdsRequest = session.to_request();

        debug!("[{}] Fetching ads from {}", req_id, url);
        let start_time = std::time::Instant::now();

        let response = self.client.post(url).json(&body).send().await.map_err(|e| {
            warn!("[{}] Request failed after {:?}", req_id, start_time.elapsed());
            AdError::Http(e)
        })?;

        let status = response.status().as_u16();
        debug!(
            "[{}] Received HTTP {} in {:?}",
            req_id,
            status,
            start_time.elapsed()
        );

        let bytes = response.bytes().await?;
        let inventory = decode_ads_response(status, &bytes)?;

        debug!(
            "[{}] Decoded {:?} inventory in {:?}",
            req_id,
            inventory.kind(),
            start_time.elapsed()
        );
        Ok(inventory)
    }
}

/// Short random id used to correlate log lines of one request
fn request_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

#[derive(Deserialize)]
struct AdsResponse {
    ad_type: String,
    #[serde(default)]
    tag_group: Option<TagGroup>,
    #[serde(default)]
    ads: serde_json::Value,
}

/// Map a fetch-ads HTTP response into inventory.
///
/// 204 is an empty inventory, not an error. Any other status outside 2xx
/// is `AdError::Status`. An `ad_type` other than REWARD or BANNER yields an
/// empty inventory.
pub fn decode_ads_response(status: u16, body: &[u8]) -> Result<AdInventory> {
    if status == 204 {
        return Ok(AdInventory::empty());
    }
    if !(200..300).contains(&status) {
        return Err(AdError::Status(status));
    }

    let response: AdsResponse = serde_json::from_slice(body)?;
    let ads = if response.ads.is_null() {
        serde_json::Value::Array(Vec::new())
    } else {
        response.ads
    };

    match response.ad_type.as_str() {
        "REWARD" => {
            let ads: Vec<RewardAd> = serde_json::from_value(ads)?;
            Ok(AdInventory::rewards(response.tag_group, ads))
        }
        "BANNER" => {
            let ads: Vec<BannerAd> = serde_json::from_value(ads)?;
            Ok(AdInventory::banners(response.tag_group, ads))
        }
        other => {
            warn!("Ignoring ads of unknown type {}", other);
            Ok(AdInventory::empty())
        }
    }
}
