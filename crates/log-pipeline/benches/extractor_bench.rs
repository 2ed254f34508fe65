//! 추출 경로 벤치마크
//!
//! 엔벨로프 디코딩, 액세스 로그 필드 추출, fingerprint 계산의 처리량을 측정합니다.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use gatewatch_log_pipeline::alert::{AlertFormatter, fingerprint};
use gatewatch_log_pipeline::parser::{AccessLogParser, EnvelopeDecoder};

/// 짧은 액세스 로그 (5xx)
const LINE_SHORT: &str = r#"1.2.3.4 - - [10/Jan/2024:10:00:00 +0000] "http" "example.com" "/path" "GET /path HTTP/1.1" 0.123 502 1024 "-" "curl/8.0" "-" "10.0.0.5:8080""#;

/// 긴 액세스 로그 (긴 쿼리 문자열과 User-Agent)
const LINE_LONG: &str = r#"203.0.113.45 - - [31/Dec/2024:23:59:59 +0800] "https" "api.production.example.com" "/api/v1/orders/search?customer_id=550e8400-e29b-41d4-a716-446655440000&status=pending&page=12&sort=created_at" "GET /api/v1/orders/search HTTP/2.0" 12.004 504 0 "https://shop.example.com/checkout" "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36" "198.51.100.7, 10.0.0.1" "10.20.30.40:8443""#;

/// 형식 불일치 라인
const LINE_MALFORMED: &str = r#"1.2.3.4 - - [10/Jan/2024:10:00:00 +0000] "GET / HTTP/1.1" 200 512"#;

fn envelope(message: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "@timestamp": "2024-01-10T10:00:00.000Z",
        "@metadata": { "beat": "filebeat", "type": "doc", "version": "6.8.0", "topic": "nginx-access" },
        "source": "/var/log/nginx/access.log",
        "offset": 123456,
        "message": message,
        "fields": { "kafka_topic": "nginx-access" },
        "beat": { "name": "gw-01", "hostname": "gw-01", "version": "6.8.0" },
        "host": { "name": "gw-01" }
    }))
    .unwrap()
}

fn bench_extract(c: &mut Criterion) {
    let parser = AccessLogParser::new();
    let mut group = c.benchmark_group("access_log_extract");
    group.throughput(Throughput::Elements(1));

    for (name, line) in [
        ("short", LINE_SHORT),
        ("long", LINE_LONG),
        ("malformed", LINE_MALFORMED),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| parser.extract(black_box(line)))
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let decoder = EnvelopeDecoder::new();
    let short = envelope(LINE_SHORT);
    let long = envelope(LINE_LONG);

    let mut group = c.benchmark_group("envelope_decode");
    group.throughput(Throughput::Bytes(short.len() as u64));
    group.bench_function("short", |b| b.iter(|| decoder.decode(black_box(&short)).unwrap()));
    group.throughput(Throughput::Bytes(long.len() as u64));
    group.bench_function("long", |b| b.iter(|| decoder.decode(black_box(&long)).unwrap()));
    group.finish();
}

fn bench_full_path(c: &mut Criterion) {
    let decoder = EnvelopeDecoder::new();
    let parser = AccessLogParser::new();
    let formatter = AlertFormatter::default();
    let raw = envelope(LINE_SHORT);

    let mut group = c.benchmark_group("decode_extract_format");

    group.throughput(Throughput::Elements(1));
    group.bench_function("single", |b| {
        b.iter(|| {
            let envelope = decoder.decode(black_box(&raw)).unwrap();
            let request = parser.extract(&envelope.message).unwrap();
            let fp = fingerprint(&request.client_ip, &request.url);
            (fp, formatter.format(&request))
        })
    });

    // 1000건 반복 처리량
    group.throughput(Throughput::Elements(1000));
    group.bench_function("throughput_1000", |b| {
        b.iter(|| {
            for _ in 0..1000 {
                let envelope = decoder.decode(black_box(&raw)).unwrap();
                let request = parser.extract(&envelope.message).unwrap();
                black_box(fingerprint(&request.client_ip, &request.url));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_extract, bench_decode, bench_full_path);
criterion_main!(benches);
