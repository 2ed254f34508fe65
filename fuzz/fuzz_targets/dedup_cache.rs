#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use gatewatch_log_pipeline::alert::fingerprint;
use gatewatch_log_pipeline::dedup::{DedupCache, DedupCacheConfig, DedupStore};

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 샤드 수 지수 (0..=4 로 제한)
    shard_bits: u8,
    /// 샤드당 최대 항목 수 (1..=16 으로 제한)
    max_entries: u8,
    /// 기록/조회 연산 목록
    ops: Vec<Op>,
}

#[derive(Arbitrary, Debug)]
enum Op {
    Record { ip: String, url: String },
    Lookup { ip: String, url: String },
    Sweep,
}

fuzz_target!(|input: FuzzInput| {
    let max_entries = usize::from(input.max_entries % 16) + 1;
    let config = DedupCacheConfig {
        shards: 1 << (input.shard_bits % 5),
        max_entries_per_shard: max_entries,
        ..Default::default()
    };
    let Ok(cache) = DedupCache::new(config) else {
        return;
    };

    for op in input.ops.into_iter().take(256) {
        match op {
            Op::Record { ip, url } => {
                let fp = fingerprint(&ip, &url);
                if cache.record(&fp).is_ok() {
                    assert!(cache.lookup(&fp));
                }
            }
            Op::Lookup { ip, url } => {
                let _ = cache.lookup(&fingerprint(&ip, &url));
            }
            Op::Sweep => {
                let _ = cache.sweep();
            }
        }
        assert!(cache.len() <= cache.config().shards * max_entries);
    }
});
