//! DNS query filtering module.
//!
//! Provides ad-blocking functionality: a block set compiled from remote
//! block lists, and the sinkhole answers returned for blocked domains.

mod blocklist;
mod compiler;
mod source;

pub use blocklist::{BlockSet, BlockSetHolder};
pub use compiler::Compiler;
pub use source::Source;

use crate::record::RecordType;

/// Canonical form of a domain: trimmed, without the trailing root dot,
/// lowercase.
pub fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim();
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    domain.to_ascii_lowercase()
}

/// The fixed answer returned for a blocked domain.
pub fn sinkhole(rtype: RecordType) -> Vec<String> {
    let value = match rtype {
        RecordType::A => "127.0.0.1",
        RecordType::AAAA => "::1",
        RecordType::NS | RecordType::MX | RecordType::CNAME => "localhost",
    };
    vec![value.to_string()]
}
