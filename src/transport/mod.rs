//! Transport layer implementations for the resolver.
//!
//! Provides UDP and TCP transports that decode client queries, hand each
//! question to the [`Resolver`] and encode the answers.

pub mod tcp;
pub mod udp;

/// Maximum size of a DNS packet (with some headroom).
pub const MAX_DNS_PACKET_SIZE: usize = 4096;

use futures::future::join_all;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::dns::{DnsQuery, DnsResponse, MAX_QUESTIONS};
use crate::record::RecordType;
use crate::resolver::{Answer, Resolver};

/// Transport protocol identifier for logging.
#[derive(Debug, Clone, Copy)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

/// Logger for DNS query events.
pub struct QueryLogger {
    protocol: Protocol,
}

impl QueryLogger {
    pub fn new(protocol: Protocol) -> Self {
        Self { protocol }
    }

    pub fn answered(
        &self,
        domain: &str,
        rtype: RecordType,
        answer: &Answer,
        elapsed: Duration,
        from: SocketAddr,
    ) {
        debug!(
            "[{}] {} {} {} answers={} total={:.3}ms (from {})",
            self.protocol.as_str(),
            domain,
            rtype,
            answer.origin.as_str(),
            answer.values.len(),
            elapsed.as_secs_f64() * 1000.0,
            from
        );
    }

    pub fn unsupported(&self, domain: &str, qtype: u16, from: SocketAddr) {
        debug!(
            "[{}] {} TYPE{} UNSUPPORTED (from {})",
            self.protocol.as_str(),
            domain,
            qtype,
            from
        );
    }

    pub fn malformed(&self, questions: usize, from: SocketAddr) {
        debug!(
            "[{}] FORMERR for {} questions (from {})",
            self.protocol.as_str(),
            questions,
            from
        );
    }

    pub fn refused(&self, from: SocketAddr) {
        debug!("[{}] dropped query from public address {}", self.protocol.as_str(), from);
    }
}

/// Settings shared by both transports.
#[derive(Debug, Clone, Copy)]
pub struct ServeOptions {
    /// Per-query deadline, measured from packet receipt.
    pub query_timeout: Duration,
    pub allow_public_clients: bool,
}

impl ServeOptions {
    pub fn permits(&self, client: SocketAddr) -> bool {
        self.allow_public_clients || is_local_client(client.ip())
    }
}

/// Loopback or private (RFC 1918, unique-local) addresses.
pub fn is_local_client(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => ipv4.is_loopback() || ipv4.is_private(),
        IpAddr::V6(ipv6) => match ipv6.to_ipv4_mapped() {
            Some(ipv4) => is_local_client(IpAddr::V4(ipv4)),
            None => ipv6.is_loopback() || is_ipv6_unique_local(&ipv6),
        },
    }
}

/// Check if IPv6 address is unique local (fc00::/7)
fn is_ipv6_unique_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xfe00) == 0xfc00
}

/// Answer one raw query packet.
///
/// Returns `None` when the packet is not a parseable query, in which case
/// nothing is sent back. Questions are resolved concurrently under one
/// shared deadline; a message with more than [`MAX_QUESTIONS`] questions
/// gets FORMERR without any lookups.
pub async fn answer_packet(
    resolver: &Resolver,
    packet: &[u8],
    query_timeout: Duration,
    logger: &QueryLogger,
    from: SocketAddr,
) -> Option<DnsResponse> {
    let start = Instant::now();
    let query = DnsQuery::parse(packet)?;
    if !query.is_standard() {
        return Some(DnsResponse::not_implemented(&query));
    }
    if query.questions.len() > MAX_QUESTIONS {
        logger.malformed(query.questions.len(), from);
        return Some(DnsResponse::format_error(&query));
    }

    let deadline = start + query_timeout;
    let lookups = query.questions.iter().map(|question| async move {
        let rtype = RecordType::from_code(question.qtype);
        let answer = match rtype {
            Some(rtype) => Some(resolver.answer(&question.domain, rtype, deadline).await),
            None => None,
        };
        (question, rtype, answer)
    });

    let mut response = DnsResponse::for_query(&query);
    for (question, rtype, answer) in join_all(lookups).await {
        match (rtype, answer) {
            (Some(rtype), Some(answer)) => {
                logger.answered(&question.domain, rtype, &answer, start.elapsed(), from);
                response.add_answers(&question.domain, rtype, &answer.values);
            }
            _ => logger.unsupported(&question.domain, question.qtype, from),
        }
    }
    Some(response)
}
