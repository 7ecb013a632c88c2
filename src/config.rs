use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::error::PatternError;
use crate::filter::{Source, normalize_domain};

/// Process-wide settings, read once at startup and never reloaded.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_block_lists")]
    pub block_lists: Vec<SourceConfig>,

    #[serde(default)]
    pub white_list: Vec<String>,

    #[serde(default)]
    pub hosts_file: HashMap<String, String>,

    #[serde(default = "default_upstreams")]
    pub upstreams: Vec<String>,

    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_concurrent_downloads")]
    pub concurrent_downloads: usize,

    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,

    #[serde(default)]
    pub allow_public_clients: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// A block-list source as written in the config file.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub regex: String,
    pub url: String,
}

// Defaults
fn default_block_lists() -> Vec<SourceConfig> {
    [
        (
            r"0.0.0.0\s+(?P<url>\S+)",
            "https://raw.githubusercontent.com/StevenBlack/hosts/master/hosts",
        ),
        (r"127.0.0.1\s+(?P<url>\S+)", "https://adaway.org/hosts.txt"),
        (r"(?P<url>\S+)", "https://v.firebog.net/hosts/Easyprivacy.txt"),
        (
            r"0.0.0.0\s+(?P<url>\S+)",
            "https://raw.githubusercontent.com/d3ward/toolz/master/src/d3host.txt",
        ),
    ]
    .into_iter()
    .map(|(regex, url)| SourceConfig {
        regex: regex.to_string(),
        url: url.to_string(),
    })
    .collect()
}
fn default_upstreams() -> Vec<String> {
    vec![
        "https://cloudflare-dns.com/dns-query".to_string(),
        "https://dns.google/resolve".to_string(),
    ]
}
fn default_bind() -> String {
    "127.0.0.1:5353".to_string()
}
fn default_cache_ttl_secs() -> u64 {
    900
}
fn default_refresh_interval_secs() -> u64 {
    6 * 3600
}
fn default_query_timeout_ms() -> u64 {
    5000
}
fn default_fetch_timeout_secs() -> u64 {
    60
}
fn default_concurrent_downloads() -> usize {
    4
}
fn default_stats_interval_secs() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_lists: default_block_lists(),
            white_list: Vec::new(),
            hosts_file: HashMap::new(),
            upstreams: default_upstreams(),
            bind: default_bind(),
            cache_ttl_secs: default_cache_ttl_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            query_timeout_ms: default_query_timeout_ms(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            concurrent_downloads: default_concurrent_downloads(),
            stats_interval_secs: default_stats_interval_secs(),
            allow_public_clients: false,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(contents).context("Failed to parse config JSON")?;
        Ok(config.normalized())
    }

    /// Bring whitelist entries and override keys to canonical form so they
    /// compare equal to normalized query names.
    pub fn normalized(mut self) -> Self {
        self.white_list = self
            .white_list
            .iter()
            .map(|d| normalize_domain(d))
            .filter(|d| !d.is_empty())
            .collect();
        self.hosts_file = self
            .hosts_file
            .into_iter()
            .map(|(domain, addr)| (normalize_domain(&domain), addr.trim().to_string()))
            .collect();
        self
    }

    /// Compile the configured block-list sources.
    pub fn sources(&self) -> Result<Vec<Source>, PatternError> {
        self.block_lists
            .iter()
            .map(|s| Source::new(&s.regex, s.url.clone()))
            .collect()
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .with_context(|| format!("Invalid bind address {}", self.bind))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}
