//! 알림 중복 제거 캐시
//!
//! 최근에 알림을 보낸 요청의 fingerprint를 일정 시간 동안 기록합니다.
//! 모든 파티션 워커가 하나의 저장소를 공유하므로 구현체는 내부적으로 동기화되어야 합니다.
//!
//! # 구성
//! - [`DedupStore`]: 워커가 의존하는 저장소 trait (lookup / record / close)
//! - [`DedupCache`]: 샤드별 뮤텍스를 쓰는 인메모리 구현
//! - [`spawn_sweeper`]: 트래픽과 무관하게 주기적으로 만료 엔트리를 정리하는 태스크
//!
//! # 만료 규칙
//! 엔트리는 삽입 시점부터 고정된 TTL 동안만 유효합니다. 조회는 수명을 연장하지 않으며,
//! 스위퍼가 아직 지우지 않은 만료 엔트리도 조회 시 없는 것으로 취급합니다.
//!
//! # 전송 중 예약
//! 캐시 기록은 전송이 성공한 뒤에 일어나므로, 조회와 기록 사이에는 전송 시간만큼의 틈이
//! 있습니다. 여러 파티션이 같은 요청을 동시에 보면 둘 다 조회에서 "없음"을 받을 수 있으므로
//! 워커는 [`DedupStore::try_reserve`]로 fingerprint를 전송 중으로 표시하고 나서 전송합니다.
//! 예약은 [`record`](DedupStore::record)가 성공하거나 [`release`](DedupStore::release)가
//! 호출되면 풀립니다. 먼저 예약한 전송이 실패하면 그동안 억제된 중복 알림은 다시 보내지
//! 않고, 다음 발생 때 재전송됩니다.

use std::collections::hash_map::RandomState;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::LogPipelineError;

/// 중복 제거 저장소
///
/// 파티션 워커는 구체 타입이 아닌 이 trait에 의존합니다.
/// 테스트에서는 다른 구현으로 교체할 수 있습니다.
pub trait DedupStore: Send + Sync {
    /// fingerprint가 유효 기간 안에 기록되어 있는지 확인합니다.
    fn lookup(&self, fingerprint: &str) -> bool;

    /// fingerprint를 기록합니다. 기존 엔트리가 있으면 수명이 다시 시작됩니다.
    ///
    /// 성공하든 실패하든 해당 fingerprint의 예약은 풀립니다.
    fn record(&self, fingerprint: &str) -> Result<(), LogPipelineError>;

    /// 유효한 엔트리도, 다른 워커의 예약도 없으면 fingerprint를 예약하고 `true`를 반환합니다.
    ///
    /// `false`면 알림을 억제해야 합니다. 기본 구현은 예약 없이 조회 결과만 사용합니다.
    fn try_reserve(&self, fingerprint: &str) -> bool {
        !self.lookup(fingerprint)
    }

    /// 전송에 실패한 fingerprint의 예약을 풉니다.
    fn release(&self, _fingerprint: &str) {}

    /// 보관 중인 엔트리 수 (만료되었지만 아직 정리되지 않은 엔트리 포함)
    fn len(&self) -> usize;

    /// 엔트리가 하나도 없는지 확인합니다.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 만료 엔트리를 정리하고 제거한 수를 반환합니다.
    fn sweep(&self) -> usize {
        0
    }

    /// 저장소를 닫습니다. 이후 조회는 항상 없음, 기록은 에러입니다.
    fn close(&self);
}

/// 중복 제거 캐시 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupCacheConfig {
    /// 샤드 수 (2의 거듭제곱)
    pub shards: usize,
    /// 엔트리 수명
    pub ttl: Duration,
    /// 스위퍼 실행 주기
    pub clean_interval: Duration,
    /// 엔트리 최대 크기 (바이트)
    pub max_entry_size: usize,
    /// 샤드당 최대 엔트리 수
    pub max_entries_per_shard: usize,
}

impl Default for DedupCacheConfig {
    fn default() -> Self {
        Self {
            shards: 2,
            ttl: Duration::from_secs(600),
            clean_interval: Duration::from_secs(1),
            max_entry_size: 500,
            max_entries_per_shard: 8192,
        }
    }
}

impl DedupCacheConfig {
    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_SHARDS: usize = 1024;

        if self.shards == 0 || self.shards > MAX_SHARDS || !self.shards.is_power_of_two() {
            return Err(config_error(
                "cache.shards",
                format!("must be a power of two in 1-{MAX_SHARDS}"),
            ));
        }
        if self.ttl.is_zero() {
            return Err(config_error("cache.ttl_secs", "must be greater than 0"));
        }
        if self.clean_interval.is_zero() {
            return Err(config_error(
                "cache.clean_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.max_entry_size == 0 {
            return Err(config_error("cache.max_entry_size", "must be greater than 0"));
        }
        if self.max_entries_per_shard == 0 {
            return Err(config_error(
                "cache.max_entries_per_shard",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// 샤드 하나의 상태
#[derive(Default)]
struct Shard {
    /// fingerprint -> 삽입 시각
    entries: HashMap<String, Instant>,
    /// 삽입 순서 (= 만료 순서). 덮어쓰기로 생긴 오래된 항목이 섞여 있을 수 있습니다.
    order: VecDeque<(String, Instant)>,
    /// 전송 중으로 예약된 fingerprint
    reserved: HashSet<String>,
}

impl Shard {
    fn is_live(&self, key: &str, ttl: Duration) -> bool {
        self.entries
            .get(key)
            .is_some_and(|inserted_at| inserted_at.elapsed() < ttl)
    }

    /// 만료된 엔트리를 앞에서부터 제거합니다.
    fn remove_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let mut removed = 0;
        while let Some((_, inserted_at)) = self.order.front() {
            if now.saturating_duration_since(*inserted_at) < ttl {
                break;
            }
            if let Some((key, inserted_at)) = self.order.pop_front()
                && self.entries.get(&key) == Some(&inserted_at)
            {
                self.entries.remove(&key);
                removed += 1;
            }
        }
        removed
    }

    /// 가장 오래된 살아있는 엔트리 하나를 제거합니다.
    fn evict_oldest(&mut self) {
        while let Some((key, inserted_at)) = self.order.pop_front() {
            if self.entries.get(&key) == Some(&inserted_at) {
                self.entries.remove(&key);
                return;
            }
        }
    }

    /// 덮어쓰기로 쌓인 오래된 순서 항목을 정리합니다.
    fn compact(&mut self) {
        let entries = &self.entries;
        self.order
            .retain(|(key, inserted_at)| entries.get(key) == Some(inserted_at));
    }
}

/// 샤드 기반 인메모리 중복 제거 캐시
///
/// 키를 해시하여 샤드를 고르고, 샤드마다 별도의 뮤텍스를 사용하므로
/// 여러 워커의 동시 접근이 하나의 락에 몰리지 않습니다.
///
/// # 사용 예시
/// ```ignore
/// use std::sync::Arc;
/// use gatewatch_log_pipeline::dedup::{DedupCache, DedupCacheConfig, DedupStore};
///
/// let cache = Arc::new(DedupCache::new(DedupCacheConfig::default())?);
/// if !cache.lookup(&fingerprint) {
///     // 알림 전송 후
///     cache.record(&fingerprint)?;
/// }
/// ```
pub struct DedupCache {
    shards: Vec<Mutex<Shard>>,
    hasher: RandomState,
    config: DedupCacheConfig,
    closed: AtomicBool,
}

impl DedupCache {
    /// 설정을 검증하고 새 캐시를 생성합니다.
    pub fn new(config: DedupCacheConfig) -> Result<Self, LogPipelineError> {
        config.validate()?;
        let shards = (0..config.shards)
            .map(|_| Mutex::new(Shard::default()))
            .collect();
        Ok(Self {
            shards,
            hasher: RandomState::new(),
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// 캐시 설정을 반환합니다.
    pub fn config(&self) -> &DedupCacheConfig {
        &self.config
    }

    /// 엔트리가 차지하는 크기를 계산합니다.
    ///
    /// 값으로 키와 같은 바이트를 보관하므로 키 길이의 두 배입니다.
    pub fn entry_size(fingerprint: &str) -> usize {
        fingerprint.len() * 2
    }

    fn shard(&self, key: &str) -> MutexGuard<'_, Shard> {
        let index = (self.hasher.hash_one(key) as usize) & (self.shards.len() - 1);
        // 패닉한 워커가 남긴 샤드도 계속 사용
        self.shards[index]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl DedupStore for DedupCache {
    fn lookup(&self, fingerprint: &str) -> bool {
        if self.is_closed() {
            return false;
        }
        self.shard(fingerprint).is_live(fingerprint, self.config.ttl)
    }

    fn try_reserve(&self, fingerprint: &str) -> bool {
        if self.is_closed() {
            return true;
        }
        let mut shard = self.shard(fingerprint);
        if shard.is_live(fingerprint, self.config.ttl) || shard.reserved.contains(fingerprint) {
            return false;
        }
        shard.reserved.insert(fingerprint.to_owned());
        true
    }

    fn release(&self, fingerprint: &str) {
        self.shard(fingerprint).reserved.remove(fingerprint);
    }

    fn record(&self, fingerprint: &str) -> Result<(), LogPipelineError> {
        if self.is_closed() {
            return Err(LogPipelineError::CacheClosed);
        }

        let size = Self::entry_size(fingerprint);
        if size > self.config.max_entry_size {
            self.release(fingerprint);
            return Err(LogPipelineError::CacheEntryTooLarge {
                size,
                max: self.config.max_entry_size,
            });
        }

        let now = Instant::now();
        let mut shard = self.shard(fingerprint);
        shard.reserved.remove(fingerprint);

        if !shard.entries.contains_key(fingerprint) {
            shard.remove_expired(now, self.config.ttl);
            if shard.entries.len() >= self.config.max_entries_per_shard {
                shard.evict_oldest();
            }
        }

        shard.entries.insert(fingerprint.to_owned(), now);
        shard.order.push_back((fingerprint.to_owned(), now));

        if shard.order.len() > self.config.max_entries_per_shard * 2 {
            shard.compact();
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| {
                s.lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .entries
                    .len()
            })
            .sum()
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();
        self.shards
            .iter()
            .map(|s| {
                s.lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .remove_expired(now, self.config.ttl)
            })
            .sum()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for shard in &self.shards {
            let mut shard = shard.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            shard.entries.clear();
            shard.order.clear();
            shard.reserved.clear();
        }
        debug!("dedup cache closed");
    }
}

/// 주기적으로 저장소의 만료 엔트리를 정리하는 태스크를 시작합니다.
///
/// `cancel`이 발동되면 종료됩니다.
pub fn spawn_sweeper(
    store: Arc<dyn DedupStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("dedup sweeper received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = store.sweep();
                    if removed > 0 {
                        debug!(removed, "swept expired dedup entries");
                    }
                    metrics::gauge!(gatewatch_core::metrics::CACHE_ENTRIES).set(store.len() as f64);
                }
            }
        }
    })
}
