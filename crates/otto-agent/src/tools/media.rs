//! Media tools: `send_media` (local path or URL through egress) and
//! `search_and_send_gif` (Giphy search, random pick from the top results).

use async_trait::async_trait;
use otto_channels::{MediaKind, OutboundMessage};
use otto_core::SELF_TAG;
use rand::seq::SliceRandom;

use crate::context::{ToolCtx, TurnContext};

use super::{require_str, Tool, ToolOutcome};

const GIPHY_SEARCH_URL: &str = "https://api.giphy.com/v1/gifs/search";
const GIPHY_RESULT_LIMIT: u32 = 20;

fn tagged_caption(caption: Option<&str>) -> String {
    match caption {
        Some(c) if !c.is_empty() => format!("{SELF_TAG} {c}"),
        _ => SELF_TAG.to_string(),
    }
}

fn parse_media_kind(s: &str) -> Option<MediaKind> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
}

pub struct SendMediaTool<C: TurnContext> {
    t: ToolCtx<C>,
}

impl<C: TurnContext> SendMediaTool<C> {
    pub fn new(t: ToolCtx<C>) -> Self {
        Self { t }
    }
}

#[async_trait]
impl<C: TurnContext> Tool for SendMediaTool<C> {
    fn name(&self) -> &str {
        "send_media"
    }

    fn description(&self) -> &str {
        "Send an image, video, gif, document, or audio file to the user by \
         absolute local path or remote URL."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url_or_path": {
                    "type": "string",
                    "description": "Absolute local path or remote URL of the media file."
                },
                "type": {
                    "type": "string",
                    "enum": ["image", "video", "gif", "document", "audio"],
                    "description": "Type of media."
                },
                "caption": { "type": "string", "description": "Optional caption." }
            },
            "required": ["url_or_path", "type"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolOutcome {
        let url_or_path = match require_str(&args, "url_or_path") {
            Ok(v) => v,
            Err(out) => return out,
        };
        let kind_str = match require_str(&args, "type") {
            Ok(v) => v,
            Err(out) => return out,
        };
        let Some(kind) = parse_media_kind(kind_str) else {
            return ToolOutcome::error(format!("unknown media type: '{kind_str}'"));
        };
        let caption = tagged_caption(args.get("caption").and_then(|v| v.as_str()));

        let payload = OutboundMessage::media(
            &self.t.session_id,
            &self.t.platform,
            url_or_path,
            kind,
            Some(caption),
        );
        match self.t.ctx.bridge().send(&payload).await {
            Ok(()) => ToolOutcome::success("Media sent successfully.").already_sent(),
            Err(e) => ToolOutcome::error(format!("failed to send media: {e}")),
        }
    }
}

pub struct SearchAndSendGifTool<C: TurnContext> {
    t: ToolCtx<C>,
}

impl<C: TurnContext> SearchAndSendGifTool<C> {
    pub fn new(t: ToolCtx<C>) -> Self {
        Self { t }
    }
}

#[async_trait]
impl<C: TurnContext> Tool for SearchAndSendGifTool<C> {
    fn name(&self) -> &str {
        "search_and_send_gif"
    }

    fn description(&self) -> &str {
        "Search Giphy for a GIF and send one of the top matches to the user."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search term, e.g. 'victory dance'."
                },
                "caption": { "type": "string", "description": "Optional caption." }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolOutcome {
        let query = match require_str(&args, "query") {
            Ok(v) => v,
            Err(out) => return out,
        };
        let Some(api_key) = self.t.ctx.giphy_api_key() else {
            return ToolOutcome::success(
                "GIPHY_API_KEY is not configured. Ask the user to set it in the config.",
            );
        };

        let gif_url = match search_giphy(&api_key, query).await {
            Ok(Some(url)) => url,
            Ok(None) => return ToolOutcome::success(format!("No GIFs found for '{query}'")),
            Err(e) => return ToolOutcome::error(format!("Giphy search: {e}")),
        };

        let caption = tagged_caption(args.get("caption").and_then(|v| v.as_str()));
        let payload = OutboundMessage::media(
            &self.t.session_id,
            &self.t.platform,
            gif_url,
            MediaKind::Gif,
            Some(caption),
        );
        match self.t.ctx.bridge().send(&payload).await {
            Ok(()) => {
                ToolOutcome::success(format!("GIF sent. (Query: {query})")).already_sent()
            }
            Err(e) => ToolOutcome::error(format!("failed to send GIF: {e}")),
        }
    }
}

/// Query Giphy and pick a random URL from the top results.
async fn search_giphy(api_key: &str, query: &str) -> Result<Option<String>, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;
    let limit = GIPHY_RESULT_LIMIT.to_string();
    let resp: serde_json::Value = client
        .get(GIPHY_SEARCH_URL)
        .query(&[
            ("api_key", api_key),
            ("q", query),
            ("limit", limit.as_str()),
            ("rating", "pg"),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let urls: Vec<String> = resp["data"]
        .as_array()
        .map(|gifs| {
            gifs.iter()
                .filter_map(|g| g["images"]["original"]["url"].as_str())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Ok(urls.choose(&mut rand::thread_rng()).cloned())
}
