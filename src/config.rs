//! Configuration module for statusboard.
//!
//! Loads configuration from environment variables with sensible defaults,
//! and the monitored target list from a JSON file or the built-in set.

use crate::db::Target;
use crate::scheduler::RetentionPolicy;

use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read targets file {path}: {source}")]
    Read { path: String, source: std::io::Error },
    #[error("failed to parse targets file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("target #{0} has an empty id")]
    EmptyId(usize),
    #[error("duplicate target id: {0}")]
    DuplicateId(String),
    #[error("target {id} has an invalid url {url:?}: {reason}")]
    InvalidUrl { id: String, url: String, reason: String },
    #[error("invalid retention policy: {0}")]
    Retention(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the persisted status document (default: "status-data.json")
    pub data_path: String,
    /// Optional JSON file with the target list
    pub targets_path: Option<String>,
    /// Interval between background check cycles; zero disables them
    pub check_interval: Duration,
    /// How long a completed cycle is served before a request triggers a new one
    pub cache_ttl: Duration,
    /// Per-request probe timeout
    pub probe_timeout: Duration,
    pub retention: RetentionPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            data_path: "status-data.json".to_string(),
            targets_path: None,
            check_interval: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            retention: RetentionPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STATUSBOARD_HTTP_PORT`: HTTP port (default: 8080)
    /// - `STATUSBOARD_DATA_PATH`: status document path (default: "status-data.json")
    /// - `STATUSBOARD_TARGETS_PATH`: targets JSON file (default: built-in list)
    /// - `STATUSBOARD_CHECK_INTERVAL_SECS`: background cycle interval (default: 60)
    /// - `STATUSBOARD_CACHE_TTL_SECS`: status cache TTL (default: 30)
    /// - `STATUSBOARD_PROBE_TIMEOUT_SECS`: probe timeout (default: 5)
    /// - `STATUSBOARD_HOURLY_RETENTION_HOURS`: hourly history retention (default: 24)
    /// - `STATUSBOARD_DAILY_RETENTION_DAYS`: daily history retention (default: 7)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(port) = parse_var(&lookup, "STATUSBOARD_HTTP_PORT") {
            cfg.http_port = port;
        }

        if let Some(data_path) = lookup("STATUSBOARD_DATA_PATH") {
            cfg.data_path = data_path;
        }

        cfg.targets_path = lookup("STATUSBOARD_TARGETS_PATH").filter(|p| !p.is_empty());

        if let Some(secs) = parse_var(&lookup, "STATUSBOARD_CHECK_INTERVAL_SECS") {
            cfg.check_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_var(&lookup, "STATUSBOARD_CACHE_TTL_SECS") {
            cfg.cache_ttl = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_var::<u64>(&lookup, "STATUSBOARD_PROBE_TIMEOUT_SECS") {
            if secs > 0 {
                cfg.probe_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(hours) = parse_var(&lookup, "STATUSBOARD_HOURLY_RETENTION_HOURS") {
            cfg.retention.hourly_hours = hours;
        }

        if let Some(days) = parse_var(&lookup, "STATUSBOARD_DAILY_RETENTION_DAYS") {
            cfg.retention.daily_days = days;
        }

        cfg
    }

    /// Load and validate the target list.
    pub fn load_targets(&self) -> Result<Vec<Target>, ConfigError> {
        let targets = match &self.targets_path {
            Some(path) => read_targets_file(path)?,
            None => default_targets(),
        };
        validate_targets(&targets)?;
        Ok(targets)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retention.validate().map_err(ConfigError::Retention)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid value {:?} for {}", raw, key);
            None
        }
    }
}

fn read_targets_file<P: AsRef<Path>>(path: P) -> Result<Vec<Target>, ConfigError> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_targets(&data)
}

/// Parse a JSON array of targets.
pub fn parse_targets(data: &str) -> Result<Vec<Target>, ConfigError> {
    Ok(serde_json::from_str(data)?)
}

/// Check that ids are non-empty and unique and that URLs are absolute http(s).
///
/// The id keys every result and history bucket, so it has to be stable and
/// unambiguous. An empty list is valid.
pub fn validate_targets(targets: &[Target]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for (i, target) in targets.iter().enumerate() {
        if target.id.trim().is_empty() {
            return Err(ConfigError::EmptyId(i));
        }
        if !seen.insert(target.id.as_str()) {
            return Err(ConfigError::DuplicateId(target.id.clone()));
        }

        let invalid = |reason: String| ConfigError::InvalidUrl {
            id: target.id.clone(),
            url: target.url.clone(),
            reason,
        };
        let url = reqwest::Url::parse(&target.url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", url.scheme())));
        }
    }

    Ok(())
}

/// The built-in target list.
pub fn default_targets() -> Vec<Target> {
    vec![
        Target::new(
            "projects",
            "Real-Time Projects Hub",
            "Hands-on DevOps projects from beginner to advanced",
            "https://projects.prodevopsguytech.com",
            "💻",
        ),
        Target::new(
            "docs",
            "Ultimate Docs Portal",
            "900+ curated DevOps learning materials",
            "https://docs.prodevopsguytech.com",
            "📚",
        ),
        Target::new(
            "repos",
            "Repositories Central",
            "Collection of scripts, infrastructure code & prep content",
            "https://repos.prodevopsguytech.com",
            "📦",
        ),
        Target::new(
            "jobs",
            "Jobs Portal",
            "Find your next DevOps career opportunity",
            "https://jobs.prodevopsguytech.com",
            "🧭",
        ),
        Target::new(
            "blog",
            "DevOps Blog",
            "Deep dives into DevOps practices & tutorials",
            "https://blog.prodevopsguytech.com",
            "📰",
        ),
        Target::new(
            "cloud",
            "Cloud Blog",
            "Cloud architecture & implementation guides",
            "https://cloud.prodevopsguytech.com",
            "☁️",
        ),
        Target::new(
            "docker2k8s",
            "Docker to Kubernetes",
            "Master containerization journey",
            "https://dockertokubernetes.live",
            "🐳",
        ),
        Target::new(
            "devopslab",
            "DevOps Engineering Lab",
            "Hands-on CI/CD & automation",
            "https://www.devops-engineering.site",
            "🔬",
        ),
        Target::new(
            "toolguides",
            "DevOps Tool Guides",
            "Setup & installation guides",
            "https://www.devopsguides.site",
            "🛠️",
        ),
        Target::new(
            "cheatsheet",
            "DevOps Cheatsheet",
            "Comprehensive tools & practices",
            "https://cheatsheet.prodevopsguytech.com",
            "📑",
        ),
    ]
}
