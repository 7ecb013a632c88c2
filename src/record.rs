//! Record types and the per-domain resolved state held by the cache.

use std::fmt;
use tokio::time::Instant;

/// The query types the resolver answers.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    AAAA,
    NS,
    MX,
    CNAME,
}

impl RecordType {
    pub const ALL: [RecordType; 5] = [
        RecordType::A,
        RecordType::AAAA,
        RecordType::NS,
        RecordType::MX,
        RecordType::CNAME,
    ];

    /// Map a wire QTYPE to a supported type.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(RecordType::A),
            2 => Some(RecordType::NS),
            5 => Some(RecordType::CNAME),
            15 => Some(RecordType::MX),
            28 => Some(RecordType::AAAA),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::MX => 15,
            RecordType::AAAA => 28,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
            RecordType::NS => "NS",
            RecordType::MX => "MX",
            RecordType::CNAME => "CNAME",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved values for one domain.
///
/// The expiry is stamped once when the record is created; filling another
/// type slot later does not move it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub expires_at: Instant,
    pub a: Vec<String>,
    pub aaaa: Vec<String>,
    pub ns: Vec<String>,
    pub mx: Vec<String>,
    pub cname: Option<String>,
}

impl Record {
    pub fn new(expires_at: Instant) -> Self {
        Self {
            expires_at,
            a: Vec::new(),
            aaaa: Vec::new(),
            ns: Vec::new(),
            mx: Vec::new(),
            cname: None,
        }
    }

    /// Values held for `rtype`, empty if the slot was never filled.
    pub fn values(&self, rtype: RecordType) -> Vec<String> {
        match rtype {
            RecordType::A => self.a.clone(),
            RecordType::AAAA => self.aaaa.clone(),
            RecordType::NS => self.ns.clone(),
            RecordType::MX => self.mx.clone(),
            RecordType::CNAME => self.cname.iter().cloned().collect(),
        }
    }

    pub fn has(&self, rtype: RecordType) -> bool {
        match rtype {
            RecordType::A => !self.a.is_empty(),
            RecordType::AAAA => !self.aaaa.is_empty(),
            RecordType::NS => !self.ns.is_empty(),
            RecordType::MX => !self.mx.is_empty(),
            RecordType::CNAME => self.cname.is_some(),
        }
    }

    /// Overwrite the slot for `rtype`. CNAME keeps only the first value.
    pub fn set(&mut self, rtype: RecordType, values: Vec<String>) {
        match rtype {
            RecordType::A => self.a = values,
            RecordType::AAAA => self.aaaa = values,
            RecordType::NS => self.ns = values,
            RecordType::MX => self.mx = values,
            RecordType::CNAME => self.cname = values.into_iter().next(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !RecordType::ALL.iter().any(|&rtype| self.has(rtype))
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}
