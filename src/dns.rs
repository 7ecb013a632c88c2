//! DNS message parsing and construction.
//!
//! Only what the resolver needs: queries are parsed into their questions,
//! responses are built from text values per record type.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::record::RecordType;

const HEADER_LEN: usize = 12;
const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;
const CLASS_IN: u16 = 1;

/// TTL carried by every answer record.
pub const ANSWER_TTL: u32 = 60;

const FLAG_QR: u16 = 0x8000;
const OPCODE_MASK: u16 = 0x7800;
const FLAG_TC: u16 = 0x0200;
const FLAG_RD: u16 = 0x0100;
const FLAG_RA: u16 = 0x0080;
const RCODE_FORMERR: u16 = 1;
const RCODE_NOTIMP: u16 = 4;

/// Most questions answered from one message; more is a format error.
pub const MAX_QUESTIONS: usize = 4;

/// A parsed DNS query.
#[derive(Debug, Clone)]
pub struct DnsQuery {
    pub id: u16,
    pub flags: u16,
    pub questions: Vec<DnsQuestion>,
}

/// A DNS question section entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    /// Dot-terminated name as received, e.g. `example.com.`.
    pub domain: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl DnsQuery {
    /// Parse a DNS query from raw bytes.
    ///
    /// Returns `None` for responses, truncated packets and names using
    /// compression pointers.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HEADER_LEN {
            return None;
        }

        let id = u16::from_be_bytes([data[0], data[1]]);
        let flags = u16::from_be_bytes([data[2], data[3]]);
        if flags & FLAG_QR != 0 {
            return None;
        }
        let qdcount = u16::from_be_bytes([data[4], data[5]]) as usize;

        let mut pos = HEADER_LEN;
        let mut questions = Vec::with_capacity(qdcount.min(4));
        for _ in 0..qdcount {
            let domain = parse_name(data, &mut pos)?;
            if pos + 4 > data.len() {
                return None;
            }
            let qtype = u16::from_be_bytes([data[pos], data[pos + 1]]);
            let qclass = u16::from_be_bytes([data[pos + 2], data[pos + 3]]);
            pos += 4;
            questions.push(DnsQuestion {
                domain,
                qtype,
                qclass,
            });
        }

        Some(Self {
            id,
            flags,
            questions,
        })
    }

    pub fn opcode(&self) -> u16 {
        (self.flags & OPCODE_MASK) >> 11
    }

    /// Whether this is a standard query (opcode QUERY).
    pub fn is_standard(&self) -> bool {
        self.opcode() == 0
    }
}

/// Read an uncompressed name starting at `pos`, advancing past it.
fn parse_name(data: &[u8], pos: &mut usize) -> Option<String> {
    let mut name = String::new();
    let mut wire_len = 1;

    loop {
        let label_len = *data.get(*pos)? as usize;
        *pos += 1;
        if label_len == 0 {
            break;
        }
        // Pointers (0xC0) and the reserved 0x40/0x80 label kinds.
        if label_len > MAX_LABEL_LEN {
            return None;
        }
        wire_len += 1 + label_len;
        if wire_len > MAX_NAME_LEN || *pos + label_len > data.len() {
            return None;
        }
        let label = std::str::from_utf8(&data[*pos..*pos + label_len]).ok()?;
        name.push_str(label);
        name.push('.');
        *pos += label_len;
    }

    if name.is_empty() {
        name.push('.');
    }
    Some(name)
}

/// A DNS response.
#[derive(Debug, Clone)]
pub struct DnsResponse {
    pub id: u16,
    pub flags: u16,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<DnsRecord>,
}

/// A DNS resource record.
#[derive(Debug, Clone)]
pub struct DnsRecord {
    pub name: String,
    pub rtype: u16,
    pub class: u16,
    pub ttl: u32,
    pub rdata: Vec<u8>,
}

impl DnsResponse {
    /// Start an empty NOERROR response echoing the query's id, opcode, RD
    /// bit and questions.
    pub fn for_query(query: &DnsQuery) -> Self {
        Self {
            id: query.id,
            flags: FLAG_QR | (query.flags & (OPCODE_MASK | FLAG_RD)) | FLAG_RA,
            questions: query.questions.clone(),
            answers: Vec::new(),
        }
    }

    /// NOTIMP response for opcodes other than QUERY.
    pub fn not_implemented(query: &DnsQuery) -> Self {
        let mut response = Self::for_query(query);
        response.flags |= RCODE_NOTIMP;
        response
    }

    /// FORMERR response carrying no questions.
    pub fn format_error(query: &DnsQuery) -> Self {
        let mut response = Self::for_query(query);
        response.flags |= RCODE_FORMERR;
        response.questions.clear();
        response
    }

    pub fn rcode(&self) -> u16 {
        self.flags & 0x000F
    }

    /// Append one answer record per value. Values that cannot be encoded
    /// as `rtype` are skipped. Returns the number of records added.
    pub fn add_answers(&mut self, name: &str, rtype: RecordType, values: &[String]) -> usize {
        let before = self.answers.len();
        for value in values {
            if let Some(rdata) = encode_rdata(rtype, value) {
                self.answers.push(DnsRecord {
                    name: name.to_string(),
                    rtype: rtype.code(),
                    class: CLASS_IN,
                    ttl: ANSWER_TTL,
                    rdata,
                });
            }
        }
        self.answers.len() - before
    }

    /// Encode the response to wire format bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(512);

        // Header
        data.extend_from_slice(&self.id.to_be_bytes());
        data.extend_from_slice(&self.flags.to_be_bytes());
        data.extend_from_slice(&(self.questions.len() as u16).to_be_bytes());
        data.extend_from_slice(&(self.answers.len() as u16).to_be_bytes());
        data.extend_from_slice(&[0x00, 0x00]); // NSCOUNT
        data.extend_from_slice(&[0x00, 0x00]); // ARCOUNT

        // Questions, remembering where each name starts for compression
        let mut offsets: Vec<(&str, usize)> = Vec::with_capacity(self.questions.len());
        for q in &self.questions {
            offsets.push((q.domain.as_str(), data.len()));
            encode_name_lossy(&mut data, &q.domain);
            data.extend_from_slice(&q.qtype.to_be_bytes());
            data.extend_from_slice(&q.qclass.to_be_bytes());
        }

        // Answers
        for a in &self.answers {
            match offsets.iter().find(|(name, _)| *name == a.name) {
                Some(&(_, offset)) if offset < 0x3FFF => {
                    data.extend_from_slice(&(0xC000 | offset as u16).to_be_bytes());
                }
                _ => encode_name_lossy(&mut data, &a.name),
            }
            data.extend_from_slice(&a.rtype.to_be_bytes());
            data.extend_from_slice(&a.class.to_be_bytes());
            data.extend_from_slice(&a.ttl.to_be_bytes());
            data.extend_from_slice(&(a.rdata.len() as u16).to_be_bytes());
            data.extend_from_slice(&a.rdata);
        }

        data
    }

    /// Encode for a transport limited to `limit` bytes. An oversized
    /// response is sent without answers and with the TC bit set, so the
    /// client retries over TCP.
    pub fn to_bytes_limited(&self, limit: usize) -> Vec<u8> {
        let data = self.to_bytes();
        if data.len() <= limit {
            return data;
        }
        let truncated = Self {
            id: self.id,
            flags: self.flags | FLAG_TC,
            questions: self.questions.clone(),
            answers: Vec::new(),
        };
        truncated.to_bytes()
    }
}

fn encode_rdata(rtype: RecordType, value: &str) -> Option<Vec<u8>> {
    let value = value.trim();
    match rtype {
        RecordType::A => value.parse::<Ipv4Addr>().ok().map(|ip| ip.octets().to_vec()),
        RecordType::AAAA => value.parse::<Ipv6Addr>().ok().map(|ip| ip.octets().to_vec()),
        RecordType::NS | RecordType::CNAME => encode_name(value),
        RecordType::MX => {
            let mut parts = value.split_whitespace();
            let (preference, host) = match (parts.next(), parts.next(), parts.next()) {
                (Some(host), None, None) => (0, host),
                (Some(pref), Some(host), None) => (pref.parse::<u16>().ok()?, host),
                _ => return None,
            };
            let mut rdata = preference.to_be_bytes().to_vec();
            rdata.extend(encode_name(host)?);
            Some(rdata)
        }
    }
}

/// Encode a textual name, rejecting empty inner labels and oversized ones.
fn encode_name(name: &str) -> Option<Vec<u8>> {
    let name = name.strip_suffix('.').unwrap_or(name);
    let mut buf = Vec::with_capacity(name.len() + 2);
    if !name.is_empty() {
        for label in name.split('.') {
            if label.is_empty() || label.len() > MAX_LABEL_LEN {
                return None;
            }
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
    }
    buf.push(0);
    (buf.len() <= MAX_NAME_LEN).then_some(buf)
}

/// Encode a name that was parsed from the wire and is therefore valid.
fn encode_name_lossy(buf: &mut Vec<u8>, name: &str) {
    match encode_name(name) {
        Some(encoded) => buf.extend_from_slice(&encoded),
        None => buf.push(0),
    }
}
