use std::{collections::HashMap, fs, path::PathBuf};

use client_core::DEFAULT_API_BASE_URL;
use thiserror::Error;
use url::Url;

pub const CONFIG_FILE: &str = "clarity.toml";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub session_file: PathBuf,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            session_file: default_session_file(),
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse clarity.toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid api base url '{url}': {source}")]
    InvalidApiUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("api base url '{0}' must use http or https")]
    UnsupportedScheme(String),
}

impl Settings {
    /// Applies command-line flags, which win over file and environment.
    pub fn with_overrides(
        mut self,
        api_base_url: Option<String>,
        session_file: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if let Some(url) = api_base_url {
            validate_api_url(&url)?;
            self.api_base_url = url;
        }
        if let Some(path) = session_file {
            self.session_file = path;
        }
        Ok(self)
    }
}

pub fn load_settings() -> Result<Settings, ConfigError> {
    let file = fs::read_to_string(CONFIG_FILE).ok();
    resolve_settings(file.as_deref(), |name| std::env::var(name).ok())
}

/// Layers defaults, then the flat `clarity.toml` keys, then environment variables.
pub fn resolve_settings(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        let file_cfg = toml::from_str::<HashMap<String, String>>(raw)?;
        if let Some(v) = file_cfg.get("api_base_url") {
            settings.api_base_url = v.clone();
        }
        if let Some(v) = file_cfg.get("session_file") {
            settings.session_file = PathBuf::from(v);
        }
        if let Some(v) = file_cfg.get("log_filter") {
            settings.log_filter = v.clone();
        }
    }

    let read = |name: &str| env(name).filter(|value| !value.trim().is_empty());

    if let Some(v) = read("CLARITY_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = read("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = read("CLARITY_SESSION_FILE") {
        settings.session_file = PathBuf::from(v);
    }
    if let Some(v) = read("APP__SESSION_FILE") {
        settings.session_file = PathBuf::from(v);
    }

    if let Some(v) = read("CLARITY_LOG") {
        settings.log_filter = v;
    }

    validate_api_url(&settings.api_base_url)?;
    Ok(settings)
}

pub fn validate_api_url(raw: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(raw).map_err(|source| ConfigError::InvalidApiUrl {
        url: raw.to_string(),
        source,
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ConfigError::UnsupportedScheme(raw.to_string())),
    }
}

fn default_session_file() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("clarity"))
        .or_else(|| dirs::home_dir().map(|home| home.join(".clarity")))
        .unwrap_or_else(|| PathBuf::from(".clarity"))
        .join("session.json")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
