//! dnsieve - an ad-blocking, caching DNS resolver.
//!
//! Queries are answered from host overrides, a periodically rebuilt block
//! set, a TTL record cache and finally a DNS-over-HTTPS upstream.

pub mod cache;
pub mod config;
pub mod dns;
pub mod error;
pub mod filter;
pub mod proxy;
pub mod record;
pub mod resolver;
pub mod stats;
pub mod transport;
pub mod upstream;
