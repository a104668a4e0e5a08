use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SwitchboardError};

/// Top-level configuration for the Switchboard console.
///
/// Loaded from `~/.switchboard/config.toml` by default. Every section falls
/// back to its defaults, so a partial file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub chart: ChartConfig,
}

impl SwitchboardConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SwitchboardConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SwitchboardError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Port of the local HTTP surface.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            port: 4300,
        }
    }
}

/// Backend addresses.
///
/// Paths are joined onto `base_url`. An empty path removes that capability
/// from the endpoint table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: String,
    /// Knowledge question answering (POST, JSON body `{prompt}`).
    pub knowledge_path: String,
    /// Analytics streaming chat (GET, SSE, `?prompt=`).
    pub analytics_stream_path: String,
    /// Analytics single-shot query (POST, JSON body `{prompt}`), used by fan-out.
    pub analytics_once_path: String,
    /// Task tracker standup digest (GET, no body).
    pub tasks_path: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            knowledge_path: "/rag/ask".to_string(),
            analytics_stream_path: "/stream/chat".to_string(),
            analytics_once_path: "/genie/ask".to_string(),
            tasks_path: "/jira/standup-digest".to_string(),
        }
    }
}

impl EndpointConfig {
    /// Join a configured path onto the base URL. Returns `None` for an empty path.
    pub fn resolve(&self, path: &str) -> Option<String> {
        let path = path.trim();
        if path.is_empty() {
            return None;
        }
        if path.starts_with("http://") || path.starts_with("https://") {
            return Some(path.to_string());
        }
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            Some(format!("{}{}", base, path))
        } else {
            Some(format!("{}/{}", base, path))
        }
    }
}

/// Prompt dispatch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Per-request timeout. A timeout is handled as a transport failure.
    pub request_timeout_secs: u64,
    /// Append an empty assistant entry as soon as a stream opens.
    pub stream_placeholder: bool,
    /// Maximum accepted prompt length in characters.
    pub max_prompt_chars: usize,
    /// Default number of entries returned by transcript reads.
    pub history_window: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            stream_placeholder: false,
            max_prompt_chars: 4000,
            history_window: 10,
        }
    }
}

/// Chart rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Dataset colour used for fills and borders.
    pub color: String,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            color: "#da291c".to_string(),
        }
    }
}
