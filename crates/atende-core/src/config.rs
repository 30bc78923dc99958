use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::AtendeError;

/// Top-level Atende configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub evolution: EvolutionConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Shared secret the messaging gateway must present on every webhook
    /// call (`x-api-key` or `apikey` header).
    #[serde(default)]
    pub webhook_api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            webhook_api_key: String::new(),
        }
    }
}

/// Evolution API gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    #[serde(default = "default_evolution_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            base_url: default_evolution_base_url(),
            api_key: String::new(),
        }
    }
}

/// OpenAI settings — chat completions and Whisper transcription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_openai_model(),
            base_url: default_openai_base_url(),
        }
    }
}

/// Store config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Most recent messages replayed as LLM context.
    #[serde(default = "default_max_history")]
    pub max_history_messages: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_history_messages: default_max_history(),
        }
    }
}

// --- Default value functions ---

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_evolution_base_url() -> String {
    "http://localhost:8081".to_string()
}
fn default_openai_model() -> String {
    "gpt-4o".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_db_path() -> String {
    "~/.atende/atende.db".to_string()
}
fn default_max_history() -> usize {
    20
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, AtendeError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!("Config file not found at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| AtendeError::Config(format!("failed to read {}: {e}", path.display())))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| AtendeError::Config(format!("failed to parse config: {e}")))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_fields_missing() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(cfg.openai.model, "gpt-4o");
        assert_eq!(cfg.store.max_history_messages, 20);
        assert!(cfg.server.webhook_api_key.is_empty());
    }

    #[test]
    fn test_partial_config_parses() {
        let toml_str = r#"
            [server]
            webhook_api_key = "secret"

            [evolution]
            base_url = "https://evo.example.com"
            api_key = "evo-key"
        "#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.server.webhook_api_key, "secret");
        assert_eq!(cfg.evolution.base_url, "https://evo.example.com");
        // Untouched sections still default.
        assert_eq!(cfg.openai.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let cfg = load("/nonexistent/atende-test.toml").unwrap();
        assert_eq!(cfg.store.db_path, "~/.atende/atende.db");
    }

    #[test]
    fn test_shellexpand_home() {
        std::env::set_var("HOME", "/home/test");
        assert_eq!(shellexpand("~/x.db"), "/home/test/x.db");
        assert_eq!(shellexpand("/abs/x.db"), "/abs/x.db");
    }
}
