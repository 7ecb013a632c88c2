//! Periodic block-set compiler.
//!
//! Each cycle fetches every configured source, unions the extracted domains,
//! removes whitelisted names and publishes the result in one swap. The same
//! cycle sweeps expired records out of the cache.

use anyhow::{Context, Result};
use futures::{StreamExt, stream};
use reqwest::Client;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tokio_util::io::StreamReader;
use tracing::{info, warn};

use super::{BlockSet, BlockSetHolder, Source};
use crate::cache::RecordCache;
use crate::config::Config;
use crate::error::FetchError;

pub struct Compiler {
    sources: Vec<Source>,
    whitelist: FxHashSet<String>,
    client: Client,
    concurrency: usize,
    interval: Duration,
    blocked: Arc<BlockSetHolder>,
    cache: Arc<RecordCache>,
}

impl Compiler {
    pub fn new(
        config: &Config,
        blocked: Arc<BlockSetHolder>,
        cache: Arc<RecordCache>,
    ) -> Result<Self> {
        let sources = config
            .sources()
            .context("Failed to compile block-list patterns")?;
        let client = Client::builder()
            .user_agent(concat!("dnsieve/", env!("CARGO_PKG_VERSION")))
            .timeout(config.fetch_timeout())
            .build()
            .context("Failed to build block-list HTTP client")?;

        Ok(Self {
            sources,
            whitelist: config.white_list.iter().cloned().collect(),
            client,
            concurrency: config.concurrent_downloads.max(1),
            interval: config.refresh_interval(),
            blocked,
            cache,
        })
    }

    /// Refresh forever: one cycle now, then one cycle `interval` after each
    /// cycle finishes.
    pub async fn run(&self) {
        loop {
            self.refresh().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// Run one refresh cycle and return the newly published set.
    ///
    /// A source that cannot be fetched or read is logged and contributes
    /// nothing to this cycle.
    pub async fn refresh(&self) -> Arc<BlockSet> {
        info!("Refreshing block lists from {} sources", self.sources.len());

        let pending: Vec<_> = self
            .sources
            .iter()
            .map(|source| fetch_tagged(&self.client, source))
            .collect();
        let fetches = stream::iter(pending)
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        let mut set = BlockSet::new();
        let mut failed = 0;
        for (source, result) in fetches {
            match result {
                Ok(domains) => {
                    info!("Parsed {} domains from {}", domains.len(), source.url());
                    set.extend(domains);
                }
                Err(e) => {
                    failed += 1;
                    warn!("Skipping block list for this cycle: {}", e);
                }
            }
        }

        let whitelisted = self
            .whitelist
            .iter()
            .filter(|domain| set.remove(domain))
            .count();

        let total = set.len();
        self.blocked.publish(set);
        let published = self.blocked.current();

        let swept = self.cache.sweep(Instant::now());

        info!(
            "Block list updated with {} domains ({} whitelisted, {} sources failed); swept {} expired cache records",
            total, whitelisted, failed, swept
        );

        published
    }
}

async fn fetch_tagged<'a>(
    client: &Client,
    source: &'a Source,
) -> (&'a Source, Result<BlockSet, FetchError>) {
    (source, fetch_source(client, source).await)
}

/// Fetch one source and collect the domains its pattern extracts.
///
/// Lines are decoded lossily, so a stray non-UTF-8 byte only spoils the
/// line it appears on.
async fn fetch_source(client: &Client, source: &Source) -> Result<BlockSet, FetchError> {
    let url = source.url();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Http {
            url: url.to_string(),
            source: e,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(std::io::Error::other));
    let mut reader = BufReader::new(StreamReader::new(body));

    let mut domains = BlockSet::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(|e| FetchError::Read {
                url: url.to_string(),
                source: e,
            })?;
        if read == 0 {
            break;
        }
        if let Some(domain) = parse_line(source, &String::from_utf8_lossy(&line)) {
            domains.insert(domain);
        }
    }
    Ok(domains)
}

fn parse_line(source: &Source, line: &str) -> Option<String> {
    let trimmed = line.trim();
    // Skip comments and empty lines
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    source.extract(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use crate::record::RecordType;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HOSTS: &str = "\
# StevenBlack style hosts
127.0.0.1 localhost
0.0.0.0 ads.example.com
0.0.0.0 Tracker.Example.NET.
0.0.0.0 spclient.wg.spotify.com
";

    const ADAWAY: &str = "\
127.0.0.1  pixel.example.org
127.0.0.1  ads.example.com
";

    const PLAIN: &str = "\
# bare domains
metrics.example.io

";

    async fn serve(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    fn config_for(server: &MockServer, routes: &[(&str, &str)], whitelist: &[&str]) -> Config {
        Config {
            block_lists: routes
                .iter()
                .map(|(regex, route)| SourceConfig {
                    regex: regex.to_string(),
                    url: format!("{}{}", server.uri(), route),
                })
                .collect(),
            white_list: whitelist.iter().map(|s| s.to_string()).collect(),
            ..Config::default()
        }
        .normalized()
    }

    fn compiler(config: &Config) -> (Compiler, Arc<BlockSetHolder>, Arc<RecordCache>) {
        let blocked = Arc::new(BlockSetHolder::default());
        let cache = Arc::new(RecordCache::new(Duration::from_secs(60)));
        let compiler = Compiler::new(config, blocked.clone(), cache.clone()).unwrap();
        (compiler, blocked, cache)
    }

    #[test]
    fn parse_line_skips_comments_and_blanks() {
        let source = Source::new(r"(?P<url>\S+)", "https://lists.test/plain").unwrap();

        assert_eq!(parse_line(&source, "# 0.0.0.0 commented.example"), None);
        assert_eq!(parse_line(&source, "   "), None);
        assert_eq!(
            parse_line(&source, " metrics.example.io "),
            Some("metrics.example.io".to_string())
        );
    }

    #[tokio::test]
    async fn refresh_unions_all_sources() {
        let server = MockServer::start().await;
        serve(&server, "/hosts", HOSTS).await;
        serve(&server, "/adaway", ADAWAY).await;
        serve(&server, "/plain", PLAIN).await;
        let config = config_for(
            &server,
            &[
                (r"0.0.0.0\s+(?P<url>\S+)", "/hosts"),
                (r"127.0.0.1\s+(?P<url>\S+)", "/adaway"),
                (r"(?P<url>\S+)", "/plain"),
            ],
            &[],
        );
        let (compiler, blocked, _) = compiler(&config);

        let set = compiler.refresh().await;

        for domain in [
            "ads.example.com",
            "tracker.example.net",
            "spclient.wg.spotify.com",
            "pixel.example.org",
            "metrics.example.io",
        ] {
            assert!(set.contains(domain), "{domain} should be blocked");
        }
        assert!(!set.contains("localhost"));
        assert_eq!(set.len(), 5);
        assert_eq!(blocked.len(), 5);
    }

    #[tokio::test]
    async fn refresh_removes_whitelisted_domains() {
        let server = MockServer::start().await;
        serve(&server, "/hosts", HOSTS).await;
        let config = config_for(
            &server,
            &[(r"0.0.0.0\s+(?P<url>\S+)", "/hosts")],
            &["spclient.wg.spotify.com."],
        );
        let (compiler, blocked, _) = compiler(&config);

        compiler.refresh().await;

        assert!(!blocked.contains("spclient.wg.spotify.com"));
        assert!(blocked.contains("ads.example.com"));
    }

    #[tokio::test]
    async fn refresh_skips_failing_sources() {
        let server = MockServer::start().await;
        serve(&server, "/hosts", HOSTS).await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let mut config = config_for(
            &server,
            &[
                (r"0.0.0.0\s+(?P<url>\S+)", "/hosts"),
                (r"(?P<url>\S+)", "/broken"),
            ],
            &[],
        );
        config.block_lists.push(SourceConfig {
            regex: r"(?P<url>\S+)".to_string(),
            url: "http://127.0.0.1:1/unreachable".to_string(),
        });
        let (compiler, blocked, _) = compiler(&config);

        let set = compiler.refresh().await;

        assert_eq!(set.len(), 3);
        assert!(blocked.contains("ads.example.com"));
    }

    #[tokio::test]
    async fn non_utf8_line_spoils_only_itself() {
        let server = MockServer::start().await;
        let body = [
            b"0.0.0.0 ads.example.com\n".as_slice(),
            b"# caf\xe9 list\n",
            b"0.0.0.0 tracker.example.net\n",
            b"0.0.0.0 pixel.example.org\n",
        ]
        .concat();
        Mock::given(method("GET"))
            .and(path("/latin1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;
        let config = config_for(&server, &[(r"0.0.0.0\s+(?P<url>\S+)", "/latin1")], &[]);
        let (compiler, _, _) = compiler(&config);

        let set = compiler.refresh().await;

        assert_eq!(set.len(), 3);
        assert!(set.contains("ads.example.com"));
        assert!(set.contains("tracker.example.net"));
        assert!(set.contains("pixel.example.org"));
    }

    #[tokio::test]
    async fn crlf_lines_are_trimmed() {
        let server = MockServer::start().await;
        serve(&server, "/crlf", "0.0.0.0 ads.example.com\r\n0.0.0.0 pixel.example.org").await;
        let config = config_for(&server, &[(r"0.0.0.0\s+(?P<url>\S+)", "/crlf")], &[]);
        let (compiler, _, _) = compiler(&config);

        let set = compiler.refresh().await;

        assert!(set.contains("ads.example.com"));
        assert!(set.contains("pixel.example.org"));
    }

    async fn requests_to(server: &MockServer) -> usize {
        server.received_requests().await.map_or(0, |r| r.len())
    }

    async fn wait_until_blocked(blocked: &BlockSetHolder, domain: &str) {
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            while !blocked.contains(domain) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "{domain} was never published");
    }

    #[tokio::test]
    async fn run_refreshes_now_and_again_after_interval() {
        let server = MockServer::start().await;
        serve(&server, "/plain", "first.example\n").await;
        let config = config_for(&server, &[(r"(?P<url>\S+)", "/plain")], &[]);
        let (mut compiler, blocked, _) = compiler(&config);
        compiler.interval = Duration::from_millis(800);

        let started = Instant::now();
        let task = tokio::spawn(async move { compiler.run().await });

        wait_until_blocked(&blocked, "first.example").await;
        let first_published = Instant::now();
        assert_eq!(requests_to(&server).await, 1);

        server.reset().await;
        serve(&server, "/plain", "second.example\n").await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(requests_to(&server).await, 0);

        wait_until_blocked(&blocked, "second.example").await;
        assert!(first_published.duration_since(started) < Duration::from_millis(800));
        assert!(first_published.elapsed() >= Duration::from_millis(700));
        assert!(!blocked.contains("first.example"));
        assert_eq!(requests_to(&server).await, 1);

        task.abort();
    }

    #[tokio::test]
    async fn refresh_replaces_previous_set() {
        let server = MockServer::start().await;
        serve(&server, "/plain", PLAIN).await;
        let config = config_for(&server, &[(r"(?P<url>\S+)", "/plain")], &[]);
        let (compiler, blocked, _) = compiler(&config);
        blocked.publish(["stale.example"].into_iter().collect());

        compiler.refresh().await;

        assert!(!blocked.contains("stale.example"));
        assert!(blocked.contains("metrics.example.io"));
    }

    #[tokio::test]
    async fn refresh_sweeps_expired_cache_records() {
        let server = MockServer::start().await;
        serve(&server, "/plain", PLAIN).await;
        let config = config_for(&server, &[(r"(?P<url>\S+)", "/plain")], &[]);
        let (compiler, _, cache) = compiler(&config);
        let long_ago = Instant::now() - Duration::from_secs(120);
        cache.merge("old.example", RecordType::A, vec!["10.0.0.1".to_string()], long_ago);
        cache.merge(
            "fresh.example",
            RecordType::A,
            vec!["10.0.0.2".to_string()],
            Instant::now(),
        );

        compiler.refresh().await;

        assert!(!cache.contains("old.example"));
        assert!(cache.contains("fresh.example"));
    }
}
