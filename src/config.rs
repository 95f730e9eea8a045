//! Runtime configuration read from the environment

use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_RETENTION_DAYS: u32 = 7;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Shared secret for the retention sweep (None = sweep disabled)
    pub cleanup_token: Option<String>,
    /// Retention window used when a sweep request does not name one
    pub default_retention_days: u32,
    /// How often clients should poll the room snapshot
    pub poll_interval_ms: u64,
    /// JSON theme catalog; the built-in list is used when unset
    pub themes_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: parse_bind_addr(DEFAULT_BIND_ADDR),
            cleanup_token: None,
            default_retention_days: DEFAULT_RETENTION_DAYS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            themes_file: None,
        }
    }
}

fn parse_bind_addr(value: &str) -> SocketAddr {
    value
        .parse()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 3000)))
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a numeric variable, keeping `default` when it is missing or invalid
fn numeric_var<T: std::str::FromStr + Copy + std::fmt::Display>(name: &str, default: T) -> T {
    match non_empty_var(name) {
        Some(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid {}={:?}, using default {}", name, raw, default);
                default
            }
        },
        None => default,
    }
}

impl AppConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let bind_addr = match non_empty_var("BIND_ADDR") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid BIND_ADDR={:?}, using {}", raw, DEFAULT_BIND_ADDR);
                parse_bind_addr(DEFAULT_BIND_ADDR)
            }),
            None => parse_bind_addr(DEFAULT_BIND_ADDR),
        };

        let cleanup_token = non_empty_var("ADMIN_CLEANUP_TOKEN");
        if cleanup_token.is_none() {
            tracing::info!("ADMIN_CLEANUP_TOKEN not set, retention sweep disabled");
        }

        let default_retention_days =
            match numeric_var("CLEANUP_DEFAULT_DAYS", DEFAULT_RETENTION_DAYS) {
                0 => DEFAULT_RETENTION_DAYS,
                days => days,
            };

        Self {
            bind_addr,
            cleanup_token,
            default_retention_days,
            poll_interval_ms: numeric_var("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS),
            themes_file: non_empty_var("THEMES_FILE").map(PathBuf::from),
        }
    }
}
