use crate::error::{AdError, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use std::sync::Arc;
use url::Url;

/// Message channels the embedded content may post to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    PlayVideo,
    PlayVideoSurvey,
    ShowModal,
    CloseModal,
    OnMarkSuccess,
    OnRewardFinish,
    FetchAds,
    OpenUrl,
}

impl Channel {
    /// Every channel, for registering handlers with the content runtime
    pub const ALL: [Channel; 8] = [
        Channel::PlayVideo,
        Channel::PlayVideoSurvey,
        Channel::ShowModal,
        Channel::CloseModal,
        Channel::OnMarkSuccess,
        Channel::OnRewardFinish,
        Channel::FetchAds,
        Channel::OpenUrl,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::PlayVideo => "playVideo",
            Channel::PlayVideoSurvey => "playVideoSurvey",
            Channel::ShowModal => "showModal",
            Channel::CloseModal => "closeModal",
            Channel::OnMarkSuccess => "onMarkSuccess",
            Channel::OnRewardFinish => "onRewardFinish",
            Channel::FetchAds => "fetchAds",
            Channel::OpenUrl => "openUrl",
        }
    }

    pub fn from_name(name: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|channel| channel.name() == name)
    }
}

/// A typed event decoded from a content message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    PlayVideo(String),
    PlayVideoSurvey(String),
    ShowModal(String),
    CloseModal,
    OnMarkSuccess,
    OnRewardFinish,
    FetchAds,
    /// Empty when the content wants the ad's own landing page
    OpenUrl(String),
}

impl BridgeEvent {
    pub fn channel(&self) -> Channel {
        match self {
            BridgeEvent::PlayVideo(_) => Channel::PlayVideo,
            BridgeEvent::PlayVideoSurvey(_) => Channel::PlayVideoSurvey,
            BridgeEvent::ShowModal(_) => Channel::ShowModal,
            BridgeEvent::CloseModal => Channel::CloseModal,
            BridgeEvent::OnMarkSuccess => Channel::OnMarkSuccess,
            BridgeEvent::OnRewardFinish => Channel::OnRewardFinish,
            BridgeEvent::FetchAds => Channel::FetchAds,
            BridgeEvent::OpenUrl(_) => Channel::OpenUrl,
        }
    }
}

/// Decode one inbound message.
///
/// Unknown channels decode to `Ok(None)`. URL-bearing payloads are taken
/// verbatim; only an empty URL on a modal channel is rejected, the URL
/// itself is checked later when it is loaded.
pub fn decode(channel: &str, payload: &str) -> Result<Option<BridgeEvent>> {
    let Some(channel) = Channel::from_name(channel) else {
        debug!("Ignoring message on unknown channel {}", channel);
        return Ok(None);
    };

    let url = || -> Result<String> {
        if payload.trim().is_empty() {
            return Err(AdError::MalformedPayload {
                channel: channel.name().to_string(),
                reason: "missing url".to_string(),
            });
        }
        Ok(payload.to_string())
    };

    let event = match channel {
        Channel::PlayVideo => BridgeEvent::PlayVideo(url()?),
        Channel::PlayVideoSurvey => BridgeEvent::PlayVideoSurvey(url()?),
        Channel::ShowModal => BridgeEvent::ShowModal(url()?),
        Channel::CloseModal => BridgeEvent::CloseModal,
        Channel::OnMarkSuccess => BridgeEvent::OnMarkSuccess,
        Channel::OnRewardFinish => BridgeEvent::OnRewardFinish,
        Channel::FetchAds => BridgeEvent::FetchAds,
        Channel::OpenUrl => BridgeEvent::OpenUrl(payload.to_string()),
    };
    Ok(Some(event))
}

/// Script evaluation entry point of the embedded content runtime
#[async_trait]
pub trait ScriptEvaluator: Send + Sync {
    async fn evaluate(&self, script: &str) -> Result<()>;
}

/// Commands the host pushes into the embedded content
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BridgeCommand {
    /// Navigate the surface to another page
    LoadUrl(String),

    /// Dispatch a DOM `CustomEvent` named `name` carrying `detail`
    Notify {
        name: String,
        detail: serde_json::Value,
    },
}

impl BridgeCommand {
    /// Render the command as a script for the content runtime
    pub fn to_script(&self) -> Result<String> {
        match self {
            BridgeCommand::LoadUrl(raw) => {
                let url = Url::parse(raw)
                    .map_err(|e| AdError::Navigation(format!("{}: {}", raw, e)))?;
                Ok(format!(
                    "window.location.href = {};",
                    serde_json::to_string(url.as_str())?
                ))
            }
            BridgeCommand::Notify { name, detail } => Ok(format!(
                "window.dispatchEvent(new CustomEvent({}, {{ detail: {} }}));",
                serde_json::to_string(name)?,
                serde_json::to_string(detail)?
            )),
        }
    }
}

/// Outbound half of the bridge; delivery is best-effort
#[derive(Clone)]
pub struct MessageBridge {
    evaluator: Arc<dyn ScriptEvaluator>,
}

impl MessageBridge {
    pub fn new(evaluator: Arc<dyn ScriptEvaluator>) -> Self {
        MessageBridge { evaluator }
    }

    /// Deliver a command; failures are logged and swallowed
    pub async fn send(&self, command: BridgeCommand) {
        let script = match command.to_script() {
            Ok(script) => script,
            Err(e) => {
                warn!("Dropping bridge command {:?}: {}", command, e);
                return;
            }
        };
        if let Err(e) = self.evaluator.evaluate(&script).await {
            warn!("Script evaluation failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn decodes_every_known_channel() {
        for channel in Channel::ALL {
            let event = decode(channel.name(), "https://ads.test/page").unwrap().unwrap();
            assert_eq!(event.channel(), channel);
        }
    }

    #[test]
    fn url_payload_is_kept_verbatim() {
        let event = decode("playVideo", "not even a url").unwrap();
        assert_eq!(event, Some(BridgeEvent::PlayVideo("not even a url".to_string())));
    }

    #[test]
    fn unknown_channel_is_ignored() {
        assert_eq!(decode("shareToSocial", "x").unwrap(), None);
        assert_eq!(decode("", "").unwrap(), None);
    }

    #[test]
    fn empty_modal_url_is_malformed() {
        let err = decode("showModal", "  ").unwrap_err();
        assert!(matches!(
            err,
            AdError::MalformedPayload { ref channel, .. } if channel == "showModal"
        ));
    }

    #[test]
    fn payload_is_ignored_for_signal_channels() {
        assert_eq!(decode("closeModal", "").unwrap(), Some(BridgeEvent::CloseModal));
        assert_eq!(decode("openUrl", "").unwrap(), Some(BridgeEvent::OpenUrl(String::new())));
    }

    #[test]
    fn load_url_script_quotes_url() {
        let script = BridgeCommand::LoadUrl("https://ads.test/a?b=\"c\"".to_string())
            .to_script()
            .unwrap();
        assert!(script.starts_with("window.location.href = \"https://ads.test/a?b=%22c%22\""));
    }

    #[test]
    fn load_url_rejects_bad_url() {
        let err = BridgeCommand::LoadUrl("::nope".to_string()).to_script().unwrap_err();
        assert!(matches!(err, AdError::Navigation(_)));
    }

    #[test]
    fn notify_script_dispatches_custom_event() {
        let command = BridgeCommand::Notify {
            name: "rewardGranted".to_string(),
            detail: serde_json::json!({"adId": 42}),
        };
        assert_eq!(
            command.to_script().unwrap(),
            r#"window.dispatchEvent(new CustomEvent("rewardGranted", { detail: {"adId":42} }));"#
        );
    }

    struct RecordingEvaluator {
        scripts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ScriptEvaluator for RecordingEvaluator {
        async fn evaluate(&self, script: &str) -> Result<()> {
            self.scripts.lock().unwrap().push(script.to_string());
            if self.fail {
                return Err(AdError::Script("web view gone".to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn send_swallows_evaluation_errors() {
        let evaluator = Arc::new(RecordingEvaluator {
            scripts: Mutex::new(Vec::new()),
            fail: true,
        });
        let bridge = MessageBridge::new(evaluator.clone());

        bridge.send(BridgeCommand::LoadUrl("https://ads.test/".to_string())).await;
        assert_eq!(evaluator.scripts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_drops_invalid_navigation() {
        let evaluator = Arc::new(RecordingEvaluator {
            scripts: Mutex::new(Vec::new()),
            fail: false,
        });
        let bridge = MessageBridge::new(evaluator.clone());

        bridge.send(BridgeCommand::LoadUrl("relative/path".to_string())).await;
        assert!(evaluator.scripts.lock().unwrap().is_empty());
    }
}
