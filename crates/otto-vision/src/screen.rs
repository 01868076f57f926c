//! Screen capability interface.
//!
//! The worker depends only on this trait; the concrete driver is an external
//! collaborator. [`CommandDriver`] shells out to the standard X11 utilities
//! (`xdotool`, `scrot`) and covers headful Linux hosts; tests use a scripted
//! mock.

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Result, VisionError};

/// A captured frame: PNG bytes plus the physical pixel dimensions.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

#[async_trait]
pub trait ScreenDriver: Send + Sync {
    /// Logical screen size in pixels.
    async fn screen_size(&self) -> Result<(u32, u32)>;

    /// Capture the full screen.
    async fn capture(&self) -> Result<Screenshot>;

    /// Animate the pointer to `(x, y)` over roughly `duration_ms`.
    async fn move_to(&self, x: u32, y: u32, duration_ms: u64) -> Result<()>;

    async fn click(&self, button: MouseButton) -> Result<()>;

    async fn double_click(&self) -> Result<()>;

    async fn type_text(&self, text: &str) -> Result<()>;

    async fn hotkey(&self, keys: &[String]) -> Result<()>;

    /// Emit exactly one wheel notch.
    async fn scroll_notch(&self, up: bool) -> Result<()>;
}

/// Driver that shells out to `xdotool` and `scrot`.
pub struct CommandDriver;

impl CommandDriver {
    pub fn new() -> Self {
        Self
    }

    async fn xdotool(&self, args: &[&str]) -> Result<String> {
        let out = Command::new("xdotool")
            .args(args)
            .output()
            .await
            .map_err(|e| VisionError::Driver(format!("xdotool failed to spawn: {e}")))?;
        if !out.status.success() {
            return Err(VisionError::Driver(format!(
                "xdotool {} exited with {}",
                args.first().unwrap_or(&""),
                out.status
            )));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

impl Default for CommandDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScreenDriver for CommandDriver {
    async fn screen_size(&self) -> Result<(u32, u32)> {
        let out = self.xdotool(&["getdisplaygeometry"]).await?;
        let mut parts = out.split_whitespace();
        let w = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| VisionError::Driver("unparseable display geometry".into()))?;
        let h = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| VisionError::Driver("unparseable display geometry".into()))?;
        Ok((w, h))
    }

    async fn capture(&self) -> Result<Screenshot> {
        let path = std::env::temp_dir().join(format!(
            "otto_capture_{}.png",
            uuid::Uuid::new_v4().simple()
        ));
        let out = Command::new("scrot")
            .arg("-o")
            .arg(&path)
            .output()
            .await
            .map_err(|e| VisionError::Driver(format!("scrot failed to spawn: {e}")))?;
        if !out.status.success() {
            return Err(VisionError::Driver(format!("scrot exited with {}", out.status)));
        }

        let png = tokio::fs::read(&path).await?;
        let _ = tokio::fs::remove_file(&path).await;

        let img = image::load_from_memory(&png)
            .map_err(|e| VisionError::Image(e.to_string()))?;
        Ok(Screenshot {
            width: img.width(),
            height: img.height(),
            png,
        })
    }

    async fn move_to(&self, x: u32, y: u32, duration_ms: u64) -> Result<()> {
        // xdotool has no animated move; approximate with a short settle pause.
        self.xdotool(&["mousemove", "--sync", &x.to_string(), &y.to_string()])
            .await?;
        tokio::time::sleep(std::time::Duration::from_millis(duration_ms.min(500))).await;
        Ok(())
    }

    async fn click(&self, button: MouseButton) -> Result<()> {
        let btn = match button {
            MouseButton::Left => "1",
            MouseButton::Right => "3",
        };
        self.xdotool(&["click", btn]).await?;
        Ok(())
    }

    async fn double_click(&self) -> Result<()> {
        self.xdotool(&["click", "--repeat", "2", "--delay", "120", "1"])
            .await?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.xdotool(&["type", "--delay", "50", "--", text]).await?;
        Ok(())
    }

    async fn hotkey(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let combo = keys.join("+");
        self.xdotool(&["key", "--", &combo]).await?;
        Ok(())
    }

    async fn scroll_notch(&self, up: bool) -> Result<()> {
        // X11 wheel buttons: 4 = up, 5 = down.
        self.xdotool(&["click", if up { "4" } else { "5" }]).await?;
        Ok(())
    }
}
