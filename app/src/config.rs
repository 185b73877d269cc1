use serde::{Deserialize, Serialize};
use shield_client::DetectOptions;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BACKEND_PORT: u16 = 8910;
pub const BACKEND_PORT_ENV: &str = "DOC_ANON_BACKEND_PORT";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    // ============ Backend ============
    /// Full base URL; wins over `backend_port` when set.
    pub backend_url: Option<String>,
    pub backend_port: u16,
    pub request_timeout_secs: u64,

    // ============ Review ============
    pub poll_interval_ms: u64,
    /// Documents that fit in one export run.
    pub export_batch_limit: usize,
    pub undo_limit: usize,

    /// Default options for re-detection.
    pub detection: DetectOptions,

    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: None,
            backend_port: DEFAULT_BACKEND_PORT,
            request_timeout_secs: 120,
            poll_interval_ms: 400,
            export_batch_limit: 50,
            undo_limit: shield_review::DEFAULT_UNDO_LIMIT,
            detection: DetectOptions::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl AppConfig {
    /// Base URL of the detection service. The port env var overrides the
    /// configured port but not an explicit `backend_url`.
    pub fn backend_base_url(&self) -> String {
        if let Some(url) = self.backend_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return url.trim_end_matches('/').to_string();
        }
        let port = std::env::var(BACKEND_PORT_ENV)
            .ok()
            .and_then(|raw| parse_port(&raw))
            .unwrap_or(self.backend_port);
        format!("http://127.0.0.1:{}", port)
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    raw.trim().parse::<u16>().ok().filter(|p| *p != 0)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config dir unavailable")]
    NoConfigDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("promptshield").join("config.json"))
}

/// Missing file means defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        log::debug!("[Config] {} not found, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw)?;
    log::info!("[Config] saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.poll_interval_ms, 400);
        assert_eq!(config.export_batch_limit, 50);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = AppConfig::default();
        config.backend_url = Some("http://10.0.0.2:9000".to_string());
        config.log_level = LogLevel::Debug;
        config.detection.ner_enabled = false;

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"backendUrl\""));
        assert!(raw.contains("\"pollIntervalMs\""));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"undoLimit": 10, "logLevel": "warn"}"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.undo_limit, 10);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.backend_port, DEFAULT_BACKEND_PORT);
    }

    #[test]
    fn test_explicit_url_wins() {
        let config = AppConfig {
            backend_url: Some("http://example.test:1234/".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(config.backend_base_url(), "http://example.test:1234");
    }

    #[test]
    fn test_log_level_maps_to_filter() {
        assert_eq!(LogLevel::Warn.to_level_filter(), log::LevelFilter::Warn);
        assert_eq!(LogLevel::default().to_level_filter(), log::LevelFilter::Info);
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port(" 9100 "), Some(9100));
        assert_eq!(parse_port("0"), None);
        assert_eq!(parse_port("abc"), None);
    }
}
