use crate::config::BEACON_TIMEOUT;
use crate::error::{AdError, Result};
use crate::models::VideoProgressEvent;
use async_trait::async_trait;
use log::debug;
use std::collections::HashSet;
use url::Url;

/// Delivers impression and video progress beacons
#[async_trait]
pub trait BeaconSender: Send + Sync {
    async fn send_beacon(
        &self,
        endpoint: &str,
        param: &str,
        event: Option<VideoProgressEvent>,
    ) -> Result<()>;
}

/// Build `endpoint?param=..[&event=..]`, keeping any query already present
pub fn beacon_url(endpoint: &str, param: &str, event: Option<VideoProgressEvent>) -> Result<Url> {
    let mut url = Url::parse(endpoint)?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("param", param);
        if let Some(event) = event {
            query.append_pair("event", event.as_str());
        }
    }
    Ok(url)
}

/// Sends beacons as plain GET requests; only HTTP 200 counts as delivered
pub struct HttpBeaconSender {
    client: reqwest::Client,
}

impl HttpBeaconSender {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(BEACON_TIMEOUT)
            .build()
            .map_err(|e| AdError::Other(format!("Failed to build HTTP client: {}", e)))?;
        Ok(HttpBeaconSender { client })
    }
}

#[async_trait]
impl BeaconSender for HttpBeaconSender {
    async fn send_beacon(
        &self,
        endpoint: &str,
        param: &str,
        event: Option<VideoProgressEvent>,
    ) -> Result<()> {
        let url = beacon_url(endpoint, param, event)
            .map_err(|e| AdError::Beacon(format!("bad endpoint {}: {}", endpoint, e)))?;
        debug!("Sending beacon to {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AdError::Beacon(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(AdError::Beacon(format!("HTTP status {}", status)));
        }

        debug!("Beacon delivered for param {}", param);
        Ok(())
    }
}

/// Remembers which playback milestones were already reported for one playback
#[derive(Debug, Default)]
pub struct ProgressMilestones {
    sent: HashSet<VideoProgressEvent>,
}

impl ProgressMilestones {
    pub fn new() -> Self {
        Self::default()
    }

    /// Milestones newly crossed at `percent`, each returned at most once
    pub fn crossed(&mut self, percent: u32) -> Vec<VideoProgressEvent> {
        let thresholds = [
            (25, VideoProgressEvent::Quarter),
            (50, VideoProgressEvent::Half),
            (75, VideoProgressEvent::ThreeQuarter),
        ];
        thresholds
            .into_iter()
            .filter(|(threshold, _)| percent >= *threshold)
            .filter_map(|(_, event)| self.sent.insert(event).then_some(event))
            .collect()
    }

    pub fn reset(&mut self) {
        self.sent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beacon_url_appends_param_and_event() {
        let event = Some(VideoProgressEvent::ThreeQuarter);
        let url = beacon_url("https://t.test/view?src=app", "abc", event).unwrap();
        assert_eq!(url.as_str(), "https://t.test/view?src=app&param=abc&event=threeQuarter");
    }

    #[test]
    fn impression_url_has_no_event() {
        let url = beacon_url("https://t.test/imp", "p 1", None).unwrap();
        assert_eq!(url.query(), Some("param=p+1"));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(beacon_url("not a url", "p", None).is_err());
    }

    #[test]
    fn milestones_fire_once_each() {
        let mut milestones = ProgressMilestones::new();
        assert!(milestones.crossed(10).is_empty());
        assert_eq!(
            milestones.crossed(55),
            vec![VideoProgressEvent::Quarter, VideoProgressEvent::Half]
        );
        assert!(milestones.crossed(60).is_empty());
        assert_eq!(milestones.crossed(100), vec![VideoProgressEvent::ThreeQuarter]);

        milestones.reset();
        assert_eq!(milestones.crossed(30), vec![VideoProgressEvent::Quarter]);
    }
}
