//! 파티션 워커 -- 파티션 하나의 메시지를 순서대로 처리합니다.
//!
//! # 상태 전이
//! ```text
//! Idle --run--> Reading --message--> Processing --outcome--> Reading
//!                  |                      |
//!                  +--channel closed------+--cancelled--> Stopped
//! ```
//!
//! Stopped는 종료 상태이며 자동 재시작은 없습니다. 취소되면 처리 중이던 메시지는 버려집니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use gatewatch_core::metrics as m;

use crate::collector::PartitionMessage;
use crate::dispatch::WebhookTransport;
use crate::processor::{AlertProcessor, ProcessOutcome};

/// 워커 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// 생성됨, 아직 실행 전
    Idle,
    /// 다음 메시지 대기 중
    Reading,
    /// 메시지 처리 중
    Processing,
    /// 종료됨
    Stopped,
}

/// 워커별 처리 카운터
#[derive(Debug, Default)]
pub struct WorkerStats {
    received: AtomicU64,
    alerted: AtomicU64,
    suppressed: AtomicU64,
    not_eligible: AtomicU64,
    malformed: AtomicU64,
    decode_errors: AtomicU64,
    delivery_errors: AtomicU64,
    cache_write_errors: AtomicU64,
}

impl WorkerStats {
    fn record(&self, outcome: ProcessOutcome) {
        let counter = match outcome {
            ProcessOutcome::DecodeFailed => &self.decode_errors,
            ProcessOutcome::Malformed => &self.malformed,
            ProcessOutcome::NotEligible => &self.not_eligible,
            ProcessOutcome::Suppressed => &self.suppressed,
            ProcessOutcome::DeliveryFailed => &self.delivery_errors,
            ProcessOutcome::Dispatched { cached } => {
                if !cached {
                    self.cache_write_errors.fetch_add(1, Ordering::Relaxed);
                }
                &self.alerted
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// 현재 카운터 값을 복사합니다.
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            alerted: self.alerted.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            not_eligible: self.not_eligible.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            delivery_errors: self.delivery_errors.load(Ordering::Relaxed),
            cache_write_errors: self.cache_write_errors.load(Ordering::Relaxed),
        }
    }
}

/// 워커 카운터의 시점 복사본
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStatsSnapshot {
    /// 수신한 메시지 수
    pub received: u64,
    /// 전송한 알림 수
    pub alerted: u64,
    /// 중복 제거로 억제된 수
    pub suppressed: u64,
    /// 알림 대상이 아닌 수
    pub not_eligible: u64,
    /// 형식 불일치 수
    pub malformed: u64,
    /// 디코딩 실패 수
    pub decode_errors: u64,
    /// 전송 실패 수
    pub delivery_errors: u64,
    /// 캐시 기록 실패 수
    pub cache_write_errors: u64,
}

impl std::ops::Add for WorkerStatsSnapshot {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            received: self.received + rhs.received,
            alerted: self.alerted + rhs.alerted,
            suppressed: self.suppressed + rhs.suppressed,
            not_eligible: self.not_eligible + rhs.not_eligible,
            malformed: self.malformed + rhs.malformed,
            decode_errors: self.decode_errors + rhs.decode_errors,
            delivery_errors: self.delivery_errors + rhs.delivery_errors,
            cache_write_errors: self.cache_write_errors + rhs.cache_write_errors,
        }
    }
}

impl std::iter::Sum for WorkerStatsSnapshot {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, s| acc + s)
    }
}

/// 파티션 워커
pub struct PartitionWorker<T: WebhookTransport> {
    partition: i32,
    rx: mpsc::Receiver<PartitionMessage>,
    processor: Arc<AlertProcessor<T>>,
    cancel: CancellationToken,
    stats: Arc<WorkerStats>,
    state_tx: watch::Sender<WorkerState>,
}

impl<T: WebhookTransport> PartitionWorker<T> {
    /// 새 워커를 생성합니다.
    pub fn new(
        partition: i32,
        rx: mpsc::Receiver<PartitionMessage>,
        processor: Arc<AlertProcessor<T>>,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(WorkerState::Idle);
        Self {
            partition,
            rx,
            processor,
            cancel,
            stats: Arc::new(WorkerStats::default()),
            state_tx,
        }
    }

    /// 담당 파티션 번호
    pub fn partition(&self) -> i32 {
        self.partition
    }

    /// 공유 카운터 핸들
    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    /// 상태 변화를 구독합니다.
    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: WorkerState) {
        self.state_tx.send_replace(state);
    }

    /// 채널이 닫히거나 취소될 때까지 메시지를 처리합니다.
    pub async fn run(mut self) {
        let partition = self.partition;
        self.set_state(WorkerState::Reading);
        metrics::gauge!(m::ACTIVE_WORKERS).increment(1.0);
        info!(partition, "partition worker started");

        loop {
            let msg = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(partition, "partition worker received shutdown signal");
                    break;
                }
                msg = self.rx.recv() => match msg {
                    Some(msg) => msg,
                    None => {
                        warn!(partition, "partition channel closed");
                        break;
                    }
                }
            };

            self.set_state(WorkerState::Processing);
            self.stats.received.fetch_add(1, Ordering::Relaxed);
            metrics::counter!(m::MESSAGES_RECEIVED_TOTAL, m::LABEL_PARTITION => partition.to_string())
                .increment(1);

            let span = info_span!("message", partition, offset = msg.offset);
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(partition, offset = msg.offset, "abandoning in-flight message on shutdown");
                    break;
                }
                outcome = self.processor.process(&msg.payload).instrument(span) => outcome,
            };

            self.stats.record(outcome);
            self.set_state(WorkerState::Reading);
        }

        self.set_state(WorkerState::Stopped);
        metrics::gauge!(m::ACTIVE_WORKERS).decrement(1.0);
        info!(partition, stats = ?self.stats.snapshot(), "partition worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertFormatter;
    use crate::dedup::{DedupCache, DedupCacheConfig, DedupStore};
    use crate::dispatch::tests::MockTransport;
    use crate::dispatch::{Dispatcher, DispatcherConfig, EndpointSelection};

    const LINE_502: &str = r#"1.2.3.4 - - [10/Jan/2024:10:00:00 +0000] "http" "example.com" "/path" "GET /path HTTP/1.1" 0.123 502 1024 "-" "curl/8.0" "-" "10.0.0.5:8080""#;

    fn envelope(message: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({ "message": message })).unwrap()
    }

    fn processor() -> Arc<AlertProcessor<MockTransport>> {
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                endpoints: vec!["http://hook.test/send".to_owned()],
                selection: EndpointSelection::All,
                ..Default::default()
            },
            MockTransport::default(),
        )
        .unwrap();
        let store: Arc<dyn DedupStore> =
            Arc::new(DedupCache::new(DedupCacheConfig::default()).unwrap());
        Arc::new(AlertProcessor::new(
            AlertFormatter::default(),
            "",
            store,
            Arc::new(dispatcher),
        ))
    }

    #[test]
    fn stats_record_outcomes() {
        let stats = WorkerStats::default();
        stats.record(ProcessOutcome::Dispatched { cached: true });
        stats.record(ProcessOutcome::Dispatched { cached: false });
        stats.record(ProcessOutcome::Suppressed);
        stats.record(ProcessOutcome::Malformed);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.alerted, 2);
        assert_eq!(snapshot.cache_write_errors, 1);
        assert_eq!(snapshot.suppressed, 1);
        assert_eq!(snapshot.malformed, 1);
    }

    #[test]
    fn snapshots_sum() {
        let a = WorkerStatsSnapshot {
            received: 3,
            alerted: 1,
            ..Default::default()
        };
        let b = WorkerStatsSnapshot {
            received: 2,
            suppressed: 2,
            ..Default::default()
        };
        let total: WorkerStatsSnapshot = [a, b].into_iter().sum();
        assert_eq!(total.received, 5);
        assert_eq!(total.alerted, 1);
        assert_eq!(total.suppressed, 2);
    }

    #[tokio::test]
    async fn worker_starts_idle() {
        let (_tx, rx) = mpsc::channel(4);
        let worker = PartitionWorker::new(0, rx, processor(), CancellationToken::new());
        assert_eq!(*worker.subscribe_state().borrow(), WorkerState::Idle);
        assert_eq!(worker.partition(), 0);
    }

    #[tokio::test]
    async fn worker_processes_until_channel_closes() {
        let (tx, rx) = mpsc::channel(4);
        let worker = PartitionWorker::new(1, rx, processor(), CancellationToken::new());
        let stats = worker.stats();
        let state = worker.subscribe_state();

        tx.send(PartitionMessage::new(1, 0, envelope(LINE_502)))
            .await
            .unwrap();
        tx.send(PartitionMessage::new(1, 1, envelope(LINE_502)))
            .await
            .unwrap();
        tx.send(PartitionMessage::new(1, 2, b"garbage".to_vec()))
            .await
            .unwrap();
        drop(tx);

        worker.run().await;

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 3);
        assert_eq!(snapshot.alerted, 1);
        assert_eq!(snapshot.suppressed, 1);
        assert_eq!(snapshot.decode_errors, 1);
        assert_eq!(*state.borrow(), WorkerState::Stopped);
    }

    #[tokio::test]
    async fn worker_stops_on_cancel() {
        let (_tx, rx) = mpsc::channel::<PartitionMessage>(4);
        let cancel = CancellationToken::new();
        let worker = PartitionWorker::new(2, rx, processor(), cancel.clone());
        let mut state = worker.subscribe_state();

        let handle = tokio::spawn(worker.run());
        state
            .wait_for(|s| *s == WorkerState::Reading)
            .await
            .unwrap();

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(*state.borrow(), WorkerState::Stopped);
    }
}
