//! Server orchestration.
//!
//! Wires the shared state together, starts the background tasks and the
//! transports, and runs until interrupted.

use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::RecordCache;
use crate::config::Config;
use crate::filter::{BlockSetHolder, Compiler};
use crate::resolver::Resolver;
use crate::transport::{ServeOptions, tcp::TcpTransport, udp::UdpTransport};
use crate::upstream::{DohClient, UpstreamResolver};

/// Run the resolver with the given configuration.
///
/// Starts UDP and TCP transports on the bind address. The first block-list
/// refresh runs in the background, so queries are served (unfiltered) while
/// it is in flight. Returns on Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    let bind_addr = config.bind_addr()?;

    let blocked = Arc::new(BlockSetHolder::default());
    let cache = Arc::new(RecordCache::new(config.cache_ttl()));
    let compiler = Compiler::new(&config, blocked.clone(), cache.clone())?;

    let http = Client::builder()
        .user_agent(concat!("dnsieve/", env!("CARGO_PKG_VERSION")))
        .timeout(config.query_timeout())
        .build()
        .context("Failed to build DoH client")?;
    if config.upstreams.is_empty() {
        warn!("No DoH upstreams configured; uncached queries will go unanswered");
    }
    let upstream = UpstreamResolver::new(Arc::new(DohClient::new(http, config.upstreams.clone())));

    let resolver = Arc::new(Resolver::new(
        config.hosts_file.clone(),
        blocked,
        cache,
        Arc::new(upstream),
    ));

    let options = ServeOptions {
        query_timeout: config.query_timeout(),
        allow_public_clients: config.allow_public_clients,
    };
    let udp = UdpTransport::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind UDP socket on {}", bind_addr))?;
    let tcp = TcpTransport::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind TCP listener on {}", bind_addr))?;

    info!("DNS resolver listening on {} (UDP and TCP)", bind_addr);
    info!("Upstreams: {}", config.upstreams.join(", "));
    info!(
        "{} host overrides, {} whitelisted domains, {} block-list sources",
        config.hosts_file.len(),
        config.white_list.len(),
        config.block_lists.len()
    );

    tokio::spawn(async move { compiler.run().await });
    spawn_stats_reporter(resolver.clone(), config.stats_interval());

    udp.start(resolver.clone(), options);
    tcp.start(resolver, options);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");

    Ok(())
}

fn spawn_stats_reporter(resolver: Arc<Resolver>, every: Duration) {
    if every.is_zero() {
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            let stats = resolver.stats_snapshot_and_reset();
            info!(
                "[stats] cache={} blocklist={} requests={} overridden={} blocked={} cached={} forwarded={} unanswered={} avg_response={:.2}ms",
                resolver.cache_len(),
                resolver.blocked_count(),
                stats.requests,
                stats.overridden,
                stats.blocked,
                stats.cached,
                stats.forwarded,
                stats.unanswered,
                stats.avg_response_ms
            );
        }
    });
}
