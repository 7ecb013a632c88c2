use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::info;

use dnsieve::config::Config;
use dnsieve::proxy;

const DEFAULT_CONFIG: &str = "dnsieve.json";

#[derive(Parser)]
#[command(name = "dnsieve")]
#[command(about = "Ad-blocking caching DNS resolver with a DNS-over-HTTPS upstream", long_about = None)]
struct Args {
    /// JSON config file (defaults to ./dnsieve.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address, overriding the config file (e.g. 0.0.0.0:53)
    #[arg(short, long)]
    bind: Option<String>,

    /// Log every query (debug level)
    #[arg(short, long)]
    verbose: bool,
}

fn setup_logging(config: &Config, verbose: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { config.log_level.as_str() };
        // Keep HTTP client internals quiet unless asked for via RUST_LOG
        tracing_subscriber::EnvFilter::new(format!("{level},hyper=warn,reqwest=warn,rustls=warn"))
    });

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, source) = match &args.config {
        Some(path) => (Config::load(path).await?, Some(path.clone())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            (Config::load(DEFAULT_CONFIG).await?, Some(PathBuf::from(DEFAULT_CONFIG)))
        }
        None => (Config::default(), None),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    setup_logging(&config, args.verbose);
    match source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    proxy::run(config).await
}
