use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Environment variable holding the Groq key (chat and image analysis).
pub const CHAT_ANALYSIS_KEY_VAR: &str = "GROQ_API_KEY";
/// Environment variable holding the Azure OpenAI key (image generation).
pub const IMAGE_GENERATION_KEY_VAR: &str = "AZURE_OPENAI_API_KEY";
/// Overrides `api_base_url` from the config file when set.
pub const API_BASE_URL_VAR: &str = "LUMABOT_API_BASE_URL";

/// Dashboard configuration, loaded from `lumabot.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub session_idle_minutes: u64,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8501,
            max_upload_bytes: 10 << 20,
            session_idle_minutes: 60,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration with the chain: `./lumabot.toml` -> `~/lumabot.toml` -> defaults,
    /// then apply environment overrides.
    pub fn load() -> Self {
        let mut config = Self::load_from_files();
        if let Ok(url) = std::env::var(API_BASE_URL_VAR) {
            if !url.trim().is_empty() {
                config.api_base_url = url.trim().to_string();
            }
        }
        config
    }

    fn load_from_files() -> Self {
        for path in &Self::config_paths() {
            if let Ok(contents) = fs::read_to_string(path) {
                match toml::from_str::<AppConfig>(&contents) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        eprintln!("Warning: failed to parse {}: {}", path.display(), e);
                    }
                }
            }
        }
        Self::default()
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("lumabot.toml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join("lumabot.toml"));
        }
        paths
    }

    /// Check the configuration before the dashboard accepts any input.
    ///
    /// Also normalizes `api_base_url` by trimming trailing slashes so that
    /// `base + endpoint` never produces a double slash.
    pub fn validate(mut self) -> Result<Self> {
        let trimmed = self.api_base_url.trim().trim_end_matches('/').to_string();
        let url = reqwest::Url::parse(&trimmed)
            .with_context(|| format!("api_base_url '{}' is not a valid URL", self.api_base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("api_base_url must use http or https, got '{}'", url.scheme());
        }
        if url.host_str().is_none() {
            bail!("api_base_url '{}' has no host", trimmed);
        }
        if self.port == 0 {
            bail!("port must be non-zero");
        }
        if self.max_upload_bytes == 0 {
            bail!("max_upload_bytes must be non-zero");
        }
        if self.session_idle_minutes == 0 {
            bail!("session_idle_minutes must be non-zero");
        }
        self.api_base_url = trimmed;
        Ok(self)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Presence of the two provider keys the backend needs.
///
/// Only presence is tracked: the values are never stored, sent or displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyStatus {
    pub chat_analysis: bool,
    pub image_generation: bool,
}

impl KeyStatus {
    pub fn from_env() -> Self {
        Self {
            chat_analysis: env_present(CHAT_ANALYSIS_KEY_VAR),
            image_generation: env_present(IMAGE_GENERATION_KEY_VAR),
        }
    }
}

fn env_present(var: &str) -> bool {
    std::env::var(var).is_ok_and(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.api_base_url, "http://127.0.0.1:8080");
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 8501);
        assert_eq!(cfg.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.session_idle_minutes, 60);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_partial_toml_deserialize() {
        let toml_str = r#"
            api_base_url = "http://backend:9000"
            port = 9999
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.api_base_url, "http://backend:9000");
        assert_eq!(cfg.port, 9999);
        // Other fields should be defaults
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.session_idle_minutes, 60);
    }

    #[test]
    fn test_full_toml_deserialize() {
        let toml_str = r#"
            api_base_url = "https://api.example.com"
            host = "0.0.0.0"
            port = 8000
            max_upload_bytes = 2048
            session_idle_minutes = 5
            log_level = "debug"
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.api_base_url, "https://api.example.com");
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.max_upload_bytes, 2048);
        assert_eq!(cfg.session_idle_minutes, 5);
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.listen_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn test_validate_trims_trailing_slash() {
        let cfg = AppConfig {
            api_base_url: "http://127.0.0.1:8080/".to_string(),
            ..AppConfig::default()
        };
        let cfg = cfg.validate().unwrap();
        assert_eq!(cfg.api_base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let cfg = AppConfig {
            api_base_url: "not a url".to_string(),
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = AppConfig {
            api_base_url: "ftp://files.example.com".to_string(),
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let cfg = AppConfig {
            port: 0,
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = AppConfig {
            max_upload_bytes: 0,
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = AppConfig {
            session_idle_minutes: 0,
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_key_status_default_is_missing() {
        let status = KeyStatus::default();
        assert!(!status.chat_analysis);
        assert!(!status.image_generation);
    }
}
