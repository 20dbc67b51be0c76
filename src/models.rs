use serde::{Deserialize, Serialize};

/// Which kind of ads a fetch cycle returned
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdKind {
    Banner,
    Reward,
    None,
}

/// Presentation format of a reward ad
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormatType {
    Video,
    Interstitial,
    LoginBonus,
    Survey,
    #[serde(other)]
    Unknown,
}

/// How a video reward ad is played back
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoType {
    Standard,
    Youtube,
    #[serde(other)]
    Unknown,
}

/// Name and description of the placement area the ads belong to
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct TagGroup {
    /// Number of slots in the area
    pub length: Option<u32>,

    /// Display name of the area
    pub area_name: Option<String>,

    /// Display description of the area
    pub area_description: Option<String>,
}

/// Destination pages of a reward ad
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct WebViewUrls {
    /// Primary content page
    pub contents: String,

    /// Page shown once the reward is being granted (survey content)
    pub getting: String,

    /// Page shown when playback was interrupted
    pub interruption: String,
}

/// A reward ad as delivered by the ad server
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct RewardAd {
    /// Stable ad identifier
    pub ad_id: u64,

    /// Session-local ordinal; drives render order and UI identity
    pub index: u32,

    /// Tag the ad was served for
    pub tag_id: String,

    /// Presentation format
    pub format_type: FormatType,

    /// Video flavour, only set for video formats
    #[serde(default)]
    pub video_type: Option<VideoType>,

    /// Whether the user already earned this reward
    pub is_granted: bool,

    /// Destination pages
    pub webview_url: WebViewUrls,

    /// Impression beacon endpoint
    pub imp_url: String,

    /// Video progress beacon endpoint
    pub view_url: String,

    /// Opaque tracking parameter
    pub param: String,
}

/// A banner ad as delivered by the ad server
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct BannerAd {
    /// Stable ad identifier
    pub ad_id: u64,

    /// Session-local ordinal; drives render order and UI identity
    pub index: u32,

    /// Tag the ad was served for
    pub tag_id: String,

    pub width: u32,
    pub height: u32,

    /// Impression beacon endpoint
    pub imp_url: String,

    /// Opaque tracking parameter
    pub param: String,

    /// Creative page
    pub webview_url: String,

    /// Where a tap on the banner should lead
    #[serde(default)]
    pub landing_page_url: Option<String>,
}

/// The result of one fetch cycle.
///
/// Exactly one of the two sequences is non-empty and it matches `kind`;
/// `AdKind::None` means both are empty. Inventories are replaced wholesale
/// on every successful fetch and never mutated in place.
#[derive(Debug, Serialize, PartialEq, Eq, Clone)]
pub struct AdInventory {
    kind: AdKind,
    area: Option<TagGroup>,
    reward_ads: Vec<RewardAd>,
    banner_ads: Vec<BannerAd>,
}

impl AdInventory {
    pub fn empty() -> Self {
        AdInventory {
            kind: AdKind::None,
            area: None,
            reward_ads: Vec::new(),
            banner_ads: Vec::new(),
        }
    }

    pub fn rewards(area: Option<TagGroup>, ads: Vec<RewardAd>) -> Self {
        let kind = if ads.is_empty() { AdKind::None } else { AdKind::Reward };
        AdInventory {
            kind,
            area,
            reward_ads: ads,
            banner_ads: Vec::new(),
        }
    }

    pub fn banners(area: Option<TagGroup>, ads: Vec<BannerAd>) -> Self {
        let kind = if ads.is_empty() { AdKind::None } else { AdKind::Banner };
        AdInventory {
            kind,
            area,
            reward_ads: Vec::new(),
            banner_ads: ads,
        }
    }

    pub fn kind(&self) -> AdKind {
        self.kind
    }

    pub fn area(&self) -> Option<&TagGroup> {
        self.area.as_ref()
    }

    pub fn reward_ads(&self) -> &[RewardAd] {
        &self.reward_ads
    }

    pub fn banner_ads(&self) -> &[BannerAd] {
        &self.banner_ads
    }

    pub fn is_empty(&self) -> bool {
        self.kind == AdKind::None
    }

    /// All ad ids in this snapshot, reward and banner alike
    pub fn ad_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.reward_ads
            .iter()
            .map(|ad| ad.ad_id)
            .chain(self.banner_ads.iter().map(|ad| ad.ad_id))
    }

    /// Order-sensitive fingerprint of the reward ads' `(ad_id, param)` pairs
    pub fn reward_fingerprint(&self) -> String {
        self.reward_ads
            .iter()
            .map(|ad| format!("{}_{}", ad.ad_id, ad.param))
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl Default for AdInventory {
    fn default() -> Self {
        AdInventory::empty()
    }
}

/// Video playback milestones reported to the progress beacon
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "camelCase")]
pub enum VideoProgressEvent {
    Start,
    Quarter,
    Half,
    ThreeQuarter,
    End,
}

impl VideoProgressEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoProgressEvent::Start => "start",
            VideoProgressEvent::Quarter => "quarter",
            VideoProgressEvent::Half => "half",
            VideoProgressEvent::ThreeQuarter => "threeQuarter",
            VideoProgressEvent::End => "end",
        }
    }
}

/// Device descriptor sent with every fetch; collected by the host
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct DeviceInfo {
    pub make: String,
    pub os: String,
    pub osv: String,
    pub hwv: String,
    pub h: u32,
    pub w: u32,
    pub language: String,
    /// Advertising identifier, empty when tracking is not permitted
    pub ifa: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct RequestUser {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct RequestPublisher {
    pub id: String,
    pub crypto: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct RequestTagInfo {
    pub tag_group_id: String,
}

/// JSON body of the fetch-ads call
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct AdsRequest {
    pub user: RequestUser,
    pub publisher: RequestPublisher,
    pub tag_info: RequestTagInfo,
    pub device: DeviceInfo,
}
