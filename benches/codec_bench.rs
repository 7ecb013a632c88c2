//! Benchmarks for DNS wire parsing and response encoding.
//!
//! Run with: cargo bench

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use dnsieve::dns::{DnsQuery, DnsResponse};
use dnsieve::record::RecordType;

fn create_dns_query(query_id: u16, domain: &str, qtype: u16) -> Vec<u8> {
    let mut packet = Vec::with_capacity(512);

    // Header (12 bytes)
    packet.extend_from_slice(&query_id.to_be_bytes());
    packet.extend_from_slice(&[0x01, 0x00]); // Flags: standard query
    packet.extend_from_slice(&[0x00, 0x01]); // Questions: 1
    packet.extend_from_slice(&[0x00, 0x00]); // Answer RRs: 0
    packet.extend_from_slice(&[0x00, 0x00]); // Authority RRs: 0
    packet.extend_from_slice(&[0x00, 0x00]); // Additional RRs: 0

    // Question section
    for label in domain.split('.') {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0x00); // Root label

    packet.extend_from_slice(&qtype.to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x01]); // Class: IN

    packet
}

fn bench_parse(c: &mut Criterion) {
    let short = create_dns_query(0x1234, "example.com", 1);
    let long = create_dns_query(0x1234, "subdomain.example.domain.com", 28);

    c.bench_function("parse_query_short", |b| {
        b.iter(|| DnsQuery::parse(black_box(&short)))
    });

    c.bench_function("parse_query_long", |b| {
        b.iter(|| DnsQuery::parse(black_box(&long)))
    });
}

fn bench_encode(c: &mut Criterion) {
    let a = DnsQuery::parse(&create_dns_query(0x1234, "example.com", 1)).unwrap();
    let mx = DnsQuery::parse(&create_dns_query(0x1234, "example.com", 15)).unwrap();
    let a_values = vec!["93.184.216.34".to_string(), "93.184.216.35".to_string()];
    let mx_values = vec!["10 mail.example.com.".to_string()];

    c.bench_function("encode_response_a", |b| {
        b.iter(|| {
            let mut response = DnsResponse::for_query(black_box(&a));
            response.add_answers("example.com.", RecordType::A, &a_values);
            response.to_bytes()
        })
    });

    c.bench_function("encode_response_mx", |b| {
        b.iter(|| {
            let mut response = DnsResponse::for_query(black_box(&mx));
            response.add_answers("example.com.", RecordType::MX, &mx_values);
            response.to_bytes()
        })
    });
}

fn bench_throughput(c: &mut Criterion) {
    let queries: Vec<Vec<u8>> = (0..1000u16)
        .map(|id| create_dns_query(id, "example.com", 1))
        .collect();
    let values = vec!["127.0.0.1".to_string()];

    let mut group = c.benchmark_group("throughput");
    group.throughput(Throughput::Elements(1000));

    group.bench_function("answer_1000_queries", |b| {
        b.iter(|| {
            for packet in &queries {
                if let Some(query) = DnsQuery::parse(packet) {
                    let mut response = DnsResponse::for_query(&query);
                    response.add_answers("example.com.", RecordType::A, &values);
                    black_box(response.to_bytes());
                }
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_encode, bench_throughput);

criterion_main!(benches);
