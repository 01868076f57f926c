//! Web tools: `fetch_url` (readable-text extraction with a hard cap) and
//! `manage_skills` (markdown skill files in the work directory).

use async_trait::async_trait;
use tracing::debug;

use crate::context::{ToolCtx, TurnContext};

use super::{require_str, Tool, ToolOutcome};

/// Hard cap on fetched text handed back to the model.
const FETCH_CAP_CHARS: usize = 10_000;

pub struct FetchUrlTool;

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetch text content from a URL. HTML is converted to readable text; \
         output is capped at 10,000 characters. For quick static reads only — \
         use vision_task for anything interactive."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The URL to fetch." }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolOutcome {
        let url = match require_str(&args, "url") {
            Ok(u) => u,
            Err(out) => return out,
        };
        debug!(url, "fetching url");
        match fetch_readable(url).await {
            Ok(text) => ToolOutcome::success(text),
            Err(e) => ToolOutcome::error(format!("fetching URL: {e}")),
        }
    }
}

async fn fetch_readable(url: &str) -> Result<String, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .user_agent("Mozilla/5.0 (compatible; Otto/0.1)")
        .build()?;

    let resp = client.get(url).send().await?.error_for_status()?;
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    let body = resp.text().await?;

    let text = if content_type.contains("html") {
        html2text::from_read(body.as_bytes(), 100)
    } else {
        body
    };

    Ok(cap_chars(&text, FETCH_CAP_CHARS))
}

fn cap_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

pub struct ManageSkillsTool<C: TurnContext> {
    t: ToolCtx<C>,
}

impl<C: TurnContext> ManageSkillsTool<C> {
    pub fn new(t: ToolCtx<C>) -> Self {
        Self { t }
    }

    fn skill_path(&self, name: &str) -> Result<std::path::PathBuf, ToolOutcome> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(ToolOutcome::error(format!("invalid skill name: '{name}'")));
        }
        Ok(self.t.ctx.skills_dir().join(format!("{name}.md")))
    }
}

#[async_trait]
impl<C: TurnContext> Tool for ManageSkillsTool<C> {
    fn name(&self) -> &str {
        "manage_skills"
    }

    fn description(&self) -> &str {
        "Download, read, or list community skills (markdown modules stored locally)."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["download", "read", "list"] },
                "skill_name": { "type": "string", "description": "Name of the skill module." },
                "url": { "type": "string", "description": "Source URL for the download action." }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> ToolOutcome {
        let action = match require_str(&args, "action") {
            Ok(a) => a,
            Err(out) => return out,
        };

        match action {
            "download" => {
                let name = match require_str(&args, "skill_name") {
                    Ok(n) => n,
                    Err(out) => return out,
                };
                let url = match require_str(&args, "url") {
                    Ok(u) => u,
                    Err(out) => return out,
                };
                let path = match self.skill_path(name) {
                    Ok(p) => p,
                    Err(out) => return out,
                };

                let body = match reqwest::get(url).await.and_then(|r| r.error_for_status()) {
                    Ok(resp) => match resp.text().await {
                        Ok(b) => b,
                        Err(e) => return ToolOutcome::error(format!("downloading skill: {e}")),
                    },
                    Err(e) => return ToolOutcome::error(format!("downloading skill: {e}")),
                };

                if let Some(parent) = path.parent() {
                    if let Err(e) = tokio::fs::create_dir_all(parent).await {
                        return ToolOutcome::error(format!("creating skills directory: {e}"));
                    }
                }
                match tokio::fs::write(&path, body).await {
                    Ok(()) => ToolOutcome::success(format!(
                        "Skill '{name}' downloaded and saved to skills/{name}.md"
                    )),
                    Err(e) => ToolOutcome::error(format!("saving skill: {e}")),
                }
            }
            "read" => {
                let name = match require_str(&args, "skill_name") {
                    Ok(n) => n,
                    Err(out) => return out,
                };
                let path = match self.skill_path(name) {
                    Ok(p) => p,
                    Err(out) => return out,
                };
                match tokio::fs::read_to_string(&path).await {
                    Ok(text) => ToolOutcome::success(text),
                    Err(_) => ToolOutcome::success(format!("Skill '{name}' not found.")),
                }
            }
            "list" => {
                let dir = self.t.ctx.skills_dir();
                let mut names = Vec::new();
                if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
                    while let Ok(Some(entry)) = entries.next_entry().await {
                        let file = entry.file_name().to_string_lossy().into_owned();
                        if let Some(name) = file.strip_suffix(".md") {
                            names.push(name.to_string());
                        }
                    }
                }
                names.sort();
                if names.is_empty() {
                    ToolOutcome::success("No skills installed.")
                } else {
                    ToolOutcome::success(names.join(", "))
                }
            }
            other => ToolOutcome::error(format!("unknown action: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::TestCtx;

    #[test]
    fn cap_chars_is_char_safe() {
        let s = "héllo wörld".repeat(2_000);
        let capped = cap_chars(&s, FETCH_CAP_CHARS);
        assert_eq!(capped.chars().count(), FETCH_CAP_CHARS);
    }

    #[tokio::test]
    async fn skill_read_and_list_round_trip() {
        let ctx = TestCtx::new(vec![]);
        let dir = ctx.skills_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("greeting.md"), "# Greeting\nwave")
            .await
            .unwrap();

        let tool = ManageSkillsTool::new(ToolCtx::new(ctx, "u1", "test"));

        let out = tool
            .execute(serde_json::json!({"action": "read", "skill_name": "greeting"}))
            .await;
        assert!(out.content.contains("wave"));

        let out = tool.execute(serde_json::json!({"action": "list"})).await;
        assert_eq!(out.content, "greeting");

        let out = tool
            .execute(serde_json::json!({"action": "read", "skill_name": "missing"}))
            .await;
        assert!(out.content.contains("not found"));
    }

    #[tokio::test]
    async fn path_traversal_names_are_rejected() {
        let ctx = TestCtx::new(vec![]);
        let tool = ManageSkillsTool::new(ToolCtx::new(ctx, "u1", "test"));
        let out = tool
            .execute(serde_json::json!({"action": "read", "skill_name": "../etc/passwd"}))
            .await;
        assert!(out.content.starts_with("Error"));
    }
}
