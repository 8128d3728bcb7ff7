//! Client configuration loaded from the environment

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:3001";
pub const DEFAULT_STORE_PATH: &str = ".pitchpenguin/state.json";

/// Pages poll between one and four seconds
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(4000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Normalized API base URL (scheme, no trailing slash)
    pub api_url: String,
    /// Network poll interval for the phase sync
    pub poll_interval: Duration,
    /// Location of the persisted local state file
    pub store_path: PathBuf,
    /// Timeout for a single HTTP request
    pub http_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            http_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let api_url = std::env::var("PITCH_API_URL")
            .ok()
            .and_then(|url| {
                let trimmed = url.trim();
                (!trimmed.is_empty()).then(|| normalize_base_url(trimmed))
            })
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let poll_interval = std::env::var("PITCH_POLL_MS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_millis)
            .map(clamp_poll_interval)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let store_path = std::env::var("PITCH_STORE_PATH")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH));

        let http_timeout = std::env::var("PITCH_HTTP_TIMEOUT")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        Self {
            api_url,
            poll_interval,
            store_path,
            http_timeout,
        }
    }

    /// WebSocket URL of the room channel
    pub fn socket_url(&self) -> String {
        socket_url(&self.api_url)
    }
}

pub fn clamp_poll_interval(interval: Duration) -> Duration {
    interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
}

/// Ensure the base URL carries a scheme and no trailing slash.
///
/// Hosts without a scheme get `http://` when they point at the local machine
/// and `https://` otherwise.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }

    let host = trimmed.split(['/', ':']).next().unwrap_or_default();
    let local = host == "localhost" || host == "0.0.0.0" || host.starts_with("127.");
    if local {
        format!("http://{}", trimmed)
    } else {
        format!("https://{}", trimmed)
    }
}

/// Map an HTTP base URL onto its WebSocket counterpart
pub fn socket_url(api_url: &str) -> String {
    let base = normalize_base_url(api_url);
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base
    };
    format!("{}/socket", ws_base)
}
