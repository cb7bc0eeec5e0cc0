//! Benchmarks for destination sniffing.
//!
//! Measures how quickly each sniffer handles a typical first segment.

use criterion::{BenchmarkId, Criterion, Throughput, black_box};

use sniff_relay::sniff::{MAX_DOMAIN_LEN, dns, http, sniff_connection, tls};

fn build_dns_query(domain: &str) -> Vec<u8> {
    let mut packet = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0];
    for label in domain.split('.') {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0x00);
    packet.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
    packet
}

fn build_client_hello(sni: &str) -> Vec<u8> {
    let name = sni.as_bytes();
    let mut exts = vec![0x00, 0x0a, 0x00, 0x04, 0x00, 0x02, 0x00, 0x1d];
    exts.extend_from_slice(&[0x00, 0x00]);
    exts.extend_from_slice(&((name.len() + 5) as u16).to_be_bytes());
    exts.extend_from_slice(&((name.len() + 3) as u16).to_be_bytes());
    exts.push(0x00);
    exts.extend_from_slice(&(name.len() as u16).to_be_bytes());
    exts.extend_from_slice(name);

    let mut body = vec![0x03, 0x03];
    body.extend_from_slice(&[0x42; 32]);
    body.push(32);
    body.extend_from_slice(&[0x24; 32]);
    body.extend_from_slice(&[0x00, 0x06, 0x13, 0x01, 0x13, 0x02, 0xc0, 0x2f]);
    body.extend_from_slice(&[0x01, 0x00]);
    body.extend_from_slice(&(exts.len() as u16).to_be_bytes());
    body.extend_from_slice(&exts);

    let mut record = vec![0x16, 0x03, 0x01];
    record.extend_from_slice(&((body.len() + 4) as u16).to_be_bytes());
    record.push(0x01);
    record.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    record.extend_from_slice(&body);
    record
}

fn bench_sniffers(c: &mut Criterion) {
    let query = build_dns_query("www.example.com");
    let connect = b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\n".to_vec();
    let get = b"GET / HTTP/1.1\r\nUser-Agent: bench\r\nAccept: */*\r\nHost: example.com\r\n\r\n"
        .to_vec();
    let hello = build_client_hello("www.example.com");

    let mut group = c.benchmark_group("sniff");
    group.throughput(Throughput::Elements(1));

    group.bench_function(BenchmarkId::new("dns", "question_name"), |b| {
        b.iter(|| dns::question_name(black_box(&query)))
    });

    group.bench_function(BenchmarkId::new("http", "connect"), |b| {
        b.iter(|| http::sniff(black_box(&connect)))
    });

    group.bench_function(BenchmarkId::new("http", "host_header"), |b| {
        b.iter(|| http::sniff(black_box(&get)))
    });

    group.bench_function(BenchmarkId::new("tls", "client_hello"), |b| {
        b.iter(|| tls::sniff(black_box(&hello), MAX_DOMAIN_LEN))
    });

    // Worst case for the orchestrator: HTTP miss, then a full TLS parse.
    group.bench_function(BenchmarkId::new("connection", "tls_fallback"), |b| {
        b.iter(|| sniff_connection(black_box(&hello)))
    });

    group.finish();
}

fn main() {
    let mut criterion = Criterion::default().configure_from_args();
    bench_sniffers(&mut criterion);
    criterion.final_summary();
}
