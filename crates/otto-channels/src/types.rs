use serde::{Deserialize, Serialize};

/// Media payload kinds understood by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Gif,
    Document,
    Audio,
}

/// One outbound payload for the bridge's send endpoint.
///
/// The same endpoint carries plain text and media; the bridge routes by
/// payload shape and the `platform` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_or_path: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_media: bool,
}

impl OutboundMessage {
    pub fn text(to: impl Into<String>, platform: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            platform: platform.into(),
            message: Some(message.into()),
            url_or_path: None,
            media_type: None,
            caption: None,
            is_media: false,
        }
    }

    pub fn media(
        to: impl Into<String>,
        platform: impl Into<String>,
        url_or_path: impl Into<String>,
        media_type: MediaKind,
        caption: Option<String>,
    ) -> Self {
        Self {
            to: to.into(),
            platform: platform.into(),
            message: None,
            url_or_path: Some(url_or_path.into()),
            media_type: Some(media_type),
            caption,
            is_media: true,
        }
    }
}
