use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8890;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_BRIDGE_URL: &str = "http://localhost:3040";

/// Top-level config (otto.toml + OTTO_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OttoConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    pub llm: LlmConfig,
    /// Vision model settings. Any unset field falls back to the main LLM.
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Root directory for memory blobs, screenshots, skills, and sessions.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    pub giphy_api_key: Option<String>,
}

impl Default for OttoConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            llm: LlmConfig::default(),
            vision: VisionConfig::default(),
            bridge: BridgeConfig::default(),
            whatsapp: WhatsAppConfig::default(),
            database: DatabaseConfig::default(),
            work_dir: default_work_dir(),
            giphy_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    /// Base URL without trailing slash. Defaults to the OpenAI endpoint;
    /// any OpenAI-compatible proxy works.
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: String::new(),
            base_url: None,
        }
    }
}

/// Vision LLM overrides — each `None` falls back to [`LlmConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionConfig {
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// The channel adapter process that owns the actual messenger connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_url")]
    pub url: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Sender ids allowed to talk to the agent. Empty list = allow everyone.
    #[serde(default)]
    pub allowed_numbers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl OttoConfig {
    /// Load config from a TOML file with OTTO_* env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: OttoConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("OTTO_").split("_"))
            .extract()
            .map_err(|e| crate::error::OttoError::Config(e.to_string()))?;

        Ok(config)
    }

    pub fn resolved_vision_model(&self) -> &str {
        self.vision.model.as_deref().unwrap_or(&self.llm.model)
    }

    pub fn resolved_vision_api_key(&self) -> &str {
        self.vision.api_key.as_deref().unwrap_or(&self.llm.api_key)
    }

    pub fn resolved_vision_base_url(&self) -> Option<&str> {
        self.vision
            .base_url
            .as_deref()
            .or(self.llm.base_url.as_deref())
    }

    pub fn configs_dir(&self) -> PathBuf {
        Path::new(&self.work_dir).join("configs")
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        Path::new(&self.work_dir).join("screenshots")
    }

    pub fn skills_dir(&self) -> PathBuf {
        Path::new(&self.work_dir).join("skills")
    }

    pub fn sessions_dir(&self) -> PathBuf {
        Path::new(&self.work_dir).join("sessions")
    }

    /// Create the work directory tree if it does not exist yet.
    pub fn ensure_work_dirs(&self) -> std::io::Result<()> {
        for dir in [
            PathBuf::from(&self.work_dir),
            self.configs_dir(),
            self.screenshots_dir(),
            self.skills_dir(),
            self.sessions_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_bridge_url() -> String {
    DEFAULT_BRIDGE_URL.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.otto/otto.db")
}
fn default_work_dir() -> String {
    if cfg!(windows) {
        r"C:\otto".to_string()
    } else {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{home}/otto")
    }
}
fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.otto/otto.toml")
}
