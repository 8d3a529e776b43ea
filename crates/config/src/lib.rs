use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// All configuration for the bookcabin service.
///
/// Precedence (lowest to highest): defaults → config file → env var → CLI arg.
/// CLI arg merging is done by the caller after `Config::load()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // Database
    pub db_url: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,

    // Server
    pub port: u16,

    // Logging
    pub log_level: String,
    pub utc: bool,

    // Redemption
    pub max_attempts: u32,
    pub attempt_timeout_secs: u64,
}

/// Config file layout (~/.bookcabin/config.toml). All fields optional, layered
/// on top of compiled-in defaults.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    db_url: Option<String>,
    max_connections: Option<u32>,
    busy_timeout_secs: Option<u64>,
    port: Option<u16>,
    log_level: Option<String>,
    utc: Option<bool>,
    max_attempts: Option<u32>,
    attempt_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_url: "sqlite:bookcabin.db".to_string(),
            max_connections: 8,
            busy_timeout_secs: 5,
            port: 8080,
            log_level: "info".to_string(),
            utc: false,
            max_attempts: 3,
            attempt_timeout_secs: 5,
        }
    }
}

impl Config {
    /// Config directory: ~/.bookcabin/
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".bookcabin")
    }

    /// Config file path: ~/.bookcabin/config.toml
    pub fn file_path() -> PathBuf {
        Self::dir().join("config.toml")
    }

    /// Load config: defaults → config file → env vars.
    /// CLI args should be merged by the caller afterward.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Layer 2: config file
        if let Ok(contents) = std::fs::read_to_string(Self::file_path()) {
            if let Ok(file) = toml::from_str::<FileConfig>(&contents) {
                config.apply_file(file);
            }
        }

        // Layer 3: environment variables
        config.apply_env(|key| std::env::var(key).ok());

        config
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }

    // --- Private helpers ---

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.db_url { self.db_url = v; }
        if let Some(v) = file.max_connections { self.max_connections = v; }
        if let Some(v) = file.busy_timeout_secs { self.busy_timeout_secs = v; }
        if let Some(v) = file.port { self.port = v; }
        if let Some(v) = file.log_level { self.log_level = v; }
        if let Some(v) = file.utc { self.utc = v; }
        if let Some(v) = file.max_attempts { self.max_attempts = v; }
        if let Some(v) = file.attempt_timeout_secs { self.attempt_timeout_secs = v; }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("BOOKCABIN_DB_URL") { self.db_url = v; }
        if let Some(p) = var("BOOKCABIN_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
            self.max_connections = p;
        }
        if let Some(p) = var("BOOKCABIN_BUSY_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.busy_timeout_secs = p;
        }
        if let Some(p) = var("BOOKCABIN_PORT").and_then(|v| v.parse().ok()) {
            self.port = p;
        }
        if let Some(v) = var("BOOKCABIN_LOG_LEVEL") { self.log_level = v; }
        if let Some(v) = var("BOOKCABIN_UTC") {
            self.utc = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(p) = var("BOOKCABIN_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.max_attempts = p;
        }
        if let Some(p) = var("BOOKCABIN_ATTEMPT_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.attempt_timeout_secs = p;
        }
    }
}
