use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use client_core::PollConfig;
use serde::Deserialize;
use tracing::warn;

pub const DEFAULT_CONFIG_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub base_url: String,
    pub status_poll_interval_ms: u64,
    pub result_poll_interval_ms: u64,
    pub result_poll_max_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            status_poll_interval_ms: 2000,
            result_poll_interval_ms: 1500,
            result_poll_max_attempts: 60,
        }
    }
}

impl Settings {
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            status_interval: Duration::from_millis(self.status_poll_interval_ms),
            result_interval: Duration::from_millis(self.result_poll_interval_ms),
            result_max_attempts: self.result_poll_max_attempts,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    base_url: Option<String>,
    status_poll_interval_ms: Option<u64>,
    result_poll_interval_ms: Option<u64>,
    result_poll_max_attempts: Option<u32>,
}

/// Defaults, then the config file, then the process environment.
///
/// An explicitly named config file must exist; the default `client.toml` is
/// optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    load_settings_with(config_path, |key| std::env::var(key).ok())
}

pub(crate) fn load_settings_with(
    config_path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    if let Some(file_cfg) = read_file_settings(&path, required)? {
        if let Some(v) = file_cfg.base_url {
            settings.base_url = v;
        }
        if let Some(v) = file_cfg.status_poll_interval_ms {
            settings.status_poll_interval_ms = v;
        }
        if let Some(v) = file_cfg.result_poll_interval_ms {
            settings.result_poll_interval_ms = v;
        }
        if let Some(v) = file_cfg.result_poll_max_attempts {
            settings.result_poll_max_attempts = v;
        }
    }

    if let Some(v) = env("CONTRACT_REVIEW_BASE_URL") {
        settings.base_url = v;
    }
    if let Some(v) = env("APP__BASE_URL") {
        settings.base_url = v;
    }

    if let Some(v) = parsed_env(&env, "APP__STATUS_POLL_INTERVAL_MS") {
        settings.status_poll_interval_ms = v;
    }
    if let Some(v) = parsed_env(&env, "APP__RESULT_POLL_INTERVAL_MS") {
        settings.result_poll_interval_ms = v;
    }
    if let Some(v) = parsed_env(&env, "APP__RESULT_POLL_MAX_ATTEMPTS") {
        settings.result_poll_max_attempts = v;
    }

    settings.base_url = normalize_base_url(&settings.base_url);
    sanitize(&mut settings);
    Ok(settings)
}

fn read_file_settings(path: &Path, required: bool) -> anyhow::Result<Option<FileSettings>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    };

    let file_cfg = toml::from_str::<FileSettings>(&raw)
        .with_context(|| format!("invalid config file '{}'", path.display()))?;
    Ok(Some(file_cfg))
}

fn parsed_env<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = env(key)?;
    match raw.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(key, value = %raw, "config: ignoring unparsable environment value");
            None
        }
    }
}

fn sanitize(settings: &mut Settings) {
    let defaults = Settings::default();
    if settings.status_poll_interval_ms == 0 {
        settings.status_poll_interval_ms = defaults.status_poll_interval_ms;
    }
    if settings.result_poll_interval_ms == 0 {
        settings.result_poll_interval_ms = defaults.result_poll_interval_ms;
    }
    if settings.result_poll_max_attempts == 0 {
        settings.result_poll_max_attempts = 1;
    }
}

/// Trims the url, drops trailing slashes and assumes `http` when no scheme is
/// given. A blank value falls back to the default backend.
pub fn normalize_base_url(raw_base_url: &str) -> String {
    let raw_base_url = raw_base_url.trim().trim_end_matches('/');

    if raw_base_url.is_empty() {
        return Settings::default().base_url;
    }

    if raw_base_url.contains("://") {
        return raw_base_url.to_string();
    }

    format!("http://{raw_base_url}")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
