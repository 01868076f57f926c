//! `get_system_info` — environment discovery: OS, screen size, and which
//! browsers are actually installed (by path probing, never assumption).

use async_trait::async_trait;

use crate::context::{ToolCtx, TurnContext};

use super::{Tool, ToolOutcome};

#[cfg(not(windows))]
const BROWSER_PATHS: &[(&str, &str)] = &[
    ("firefox", "/usr/bin/firefox"),
    ("firefox", "/snap/bin/firefox"),
    ("chrome", "/usr/bin/google-chrome"),
    ("chrome", "/opt/google/chrome/chrome"),
    ("chromium", "/usr/bin/chromium"),
    ("chromium", "/usr/bin/chromium-browser"),
    ("safari", "/Applications/Safari.app"),
    ("chrome", "/Applications/Google Chrome.app"),
    ("firefox", "/Applications/Firefox.app"),
];

#[cfg(windows)]
const BROWSER_PATHS: &[(&str, &str)] = &[
    ("chrome", r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
    ("chrome", r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
    ("edge", r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe"),
    ("firefox", r"C:\Program Files\Mozilla Firefox\firefox.exe"),
];

pub struct GetSystemInfoTool<C: TurnContext> {
    t: ToolCtx<C>,
}

impl<C: TurnContext> GetSystemInfoTool<C> {
    pub fn new(t: ToolCtx<C>) -> Self {
        Self { t }
    }
}

#[async_trait]
impl<C: TurnContext> Tool for GetSystemInfoTool<C> {
    fn name(&self) -> &str {
        "get_system_info"
    }

    fn description(&self) -> &str {
        "Discover system details: OS, screen resolution, and installed browsers. \
         Use this before assuming specific software exists."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: serde_json::Value) -> ToolOutcome {
        let mut info = format!(
            "OS: {} ({})",
            std::env::consts::OS,
            std::env::consts::ARCH
        );

        match self.t.ctx.vision().screen_size().await {
            Some((w, h)) => info.push_str(&format!("\nScreen: {w}x{h}")),
            None => info.push_str("\nScreen: unavailable (no display)"),
        }

        let mut browsers: Vec<&str> = BROWSER_PATHS
            .iter()
            .filter(|(_, path)| std::path::Path::new(path).exists())
            .map(|(name, _)| *name)
            .collect();
        browsers.dedup();
        if browsers.is_empty() {
            info.push_str("\nBrowsers: none detected");
        } else {
            info.push_str(&format!("\nBrowsers: {}", browsers.join(", ")));
        }

        ToolOutcome::success(info)
    }
}
