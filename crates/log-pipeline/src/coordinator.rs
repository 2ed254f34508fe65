//! 수집 코디네이터 -- 파티션 워커와 공유 자원의 생명주기를 관리합니다.
//!
//! [`IngestionCoordinator`]는 core의 [`Pipeline`](gatewatch_core::pipeline::Pipeline) trait을 구현하여
//! `gatewatch-daemon`에서 start/stop/health_check로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! MessageSource --partition 0--> PartitionWorker --+
//!               --partition 1--> PartitionWorker --+--> AlertProcessor --> Dispatcher --> webhook
//!               --partition N--> PartitionWorker --+         |
//!                                                      DedupStore <-- sweeper
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use gatewatch_core::error::{GatewatchError, PipelineError};
use gatewatch_core::pipeline::{HealthStatus, Pipeline};

use crate::alert::AlertFormatter;
use crate::collector::MessageSource;
use crate::config::PipelineConfig;
use crate::dedup::{DedupCache, DedupStore, spawn_sweeper};
use crate::dispatch::{Dispatcher, WebhookTransport};
use crate::error::LogPipelineError;
use crate::processor::AlertProcessor;
use crate::worker::{PartitionWorker, WorkerState, WorkerStats, WorkerStatsSnapshot};

/// 코디네이터 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoordinatorState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 실행 중인 워커 태스크
struct WorkerHandle {
    partition: i32,
    task: JoinHandle<()>,
    stats: Arc<WorkerStats>,
    state: watch::Receiver<WorkerState>,
}

/// 수집 코디네이터
///
/// # 사용 예시
/// ```ignore
/// use gatewatch_core::pipeline::Pipeline;
/// use gatewatch_log_pipeline::{IngestionCoordinatorBuilder, KafkaSource, ReqwestTransport};
///
/// let mut coordinator = IngestionCoordinatorBuilder::new()
///     .config(config)
///     .source(KafkaSource::connect(source_config).await?)
///     .transport(ReqwestTransport::new())
///     .build()?;
///
/// coordinator.start().await?;
/// ```
pub struct IngestionCoordinator<S: MessageSource, T: WebhookTransport> {
    config: PipelineConfig,
    state: CoordinatorState,
    source: Arc<S>,
    store: Arc<dyn DedupStore>,
    processor: Arc<AlertProcessor<T>>,
    cancel: CancellationToken,
    workers: Vec<WorkerHandle>,
    sweeper: Option<JoinHandle<()>>,
}

impl<S: MessageSource, T: WebhookTransport> IngestionCoordinator<S, T> {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            CoordinatorState::Initialized => "initialized",
            CoordinatorState::Running => "running",
            CoordinatorState::Stopped => "stopped",
        }
    }

    /// 파이프라인 설정을 반환합니다.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 공유 중복 제거 저장소를 반환합니다.
    pub fn store(&self) -> &Arc<dyn DedupStore> {
        &self.store
    }

    /// 메시지 소스를 반환합니다.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// 워커가 담당하는 파티션 목록을 반환합니다.
    pub fn partitions(&self) -> Vec<i32> {
        self.workers.iter().map(|w| w.partition).collect()
    }

    /// 파티션별 워커 상태를 반환합니다.
    pub fn worker_states(&self) -> Vec<(i32, WorkerState)> {
        self.workers
            .iter()
            .map(|w| (w.partition, *w.state.borrow()))
            .collect()
    }

    /// 모든 워커의 카운터 합계를 반환합니다.
    pub fn worker_stats(&self) -> WorkerStatsSnapshot {
        self.workers.iter().map(|w| w.stats.snapshot()).sum()
    }

    fn exited_workers(&self) -> usize {
        self.workers.iter().filter(|w| w.task.is_finished()).count()
    }

    async fn shutdown_workers(&mut self) {
        let deadline = self.config.shutdown_timeout;
        for worker in &mut self.workers {
            match tokio::time::timeout(deadline, &mut worker.task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_panic() => {
                    error!(partition = worker.partition, error = %e, "partition worker panicked");
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    warn!(
                        partition = worker.partition,
                        timeout_secs = deadline.as_secs(),
                        "partition worker did not stop in time, aborting"
                    );
                    worker.task.abort();
                }
            }
        }
    }
}

impl<S: MessageSource, T: WebhookTransport> Pipeline for IngestionCoordinator<S, T> {
    async fn start(&mut self) -> Result<(), GatewatchError> {
        match self.state {
            CoordinatorState::Running => return Err(PipelineError::AlreadyRunning.into()),
            CoordinatorState::Stopped => {
                return Err(PipelineError::InitFailed(
                    "coordinator cannot be restarted after stop".to_owned(),
                )
                .into());
            }
            CoordinatorState::Initialized => {}
        }

        info!(
            topic = %self.config.topic,
            source = self.source.source_type(),
            "starting ingestion coordinator"
        );

        let partitions = self.source.partitions().await?;
        if partitions.is_empty() {
            return Err(LogPipelineError::Source {
                source_type: self.source.source_type().to_owned(),
                reason: format!("topic '{}' has no partitions", self.config.topic),
            }
            .into());
        }

        for partition in partitions {
            let rx = match self.source.open_partition(partition).await {
                Ok(rx) => rx,
                Err(e) => {
                    error!(partition, error = %e, "failed to open partition, skipping");
                    continue;
                }
            };

            let worker = PartitionWorker::new(
                partition,
                rx,
                Arc::clone(&self.processor),
                self.cancel.child_token(),
            );
            let stats = worker.stats();
            let state = worker.subscribe_state();
            let task = tokio::spawn(worker.run());

            self.workers.push(WorkerHandle {
                partition,
                task,
                stats,
                state,
            });
        }

        if self.workers.is_empty() {
            return Err(LogPipelineError::Source {
                source_type: self.source.source_type().to_owned(),
                reason: "no partition could be opened".to_owned(),
            }
            .into());
        }

        self.sweeper = Some(spawn_sweeper(
            Arc::clone(&self.store),
            self.config.cache.clean_interval,
            self.cancel.child_token(),
        ));

        self.state = CoordinatorState::Running;
        info!(
            workers = self.workers.len(),
            partitions = ?self.partitions(),
            "ingestion coordinator started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), GatewatchError> {
        if self.state != CoordinatorState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping ingestion coordinator");

        // 1. 워커와 스위퍼에 종료 신호
        self.cancel.cancel();

        // 2. 워커 종료 대기 (시간 초과 시 abort)
        self.shutdown_workers().await;

        if let Some(sweeper) = self.sweeper.take()
            && tokio::time::timeout(self.config.shutdown_timeout, sweeper)
                .await
                .is_err()
        {
            warn!("dedup sweeper did not stop in time");
        }

        // 3. 공유 자원 해제
        self.store.close();
        self.source.close().await;

        self.state = CoordinatorState::Stopped;
        info!(stats = ?self.worker_stats(), "ingestion coordinator stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            CoordinatorState::Running => {
                let total = self.workers.len();
                let exited = self.exited_workers();
                if exited == 0 {
                    HealthStatus::Healthy
                } else if exited < total {
                    HealthStatus::Degraded(format!("{exited} of {total} partition workers exited"))
                } else {
                    HealthStatus::Unhealthy("all partition workers exited".to_owned())
                }
            }
            CoordinatorState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            CoordinatorState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 수집 코디네이터 빌더
///
/// 메시지 소스와 웹훅 transport는 필수입니다. 중복 제거 저장소를 지정하지 않으면
/// 설정의 캐시 값으로 [`DedupCache`]를 생성합니다.
pub struct IngestionCoordinatorBuilder<S, T> {
    config: PipelineConfig,
    source: Option<S>,
    transport: Option<T>,
    store: Option<Arc<dyn DedupStore>>,
}

impl<S: MessageSource, T: WebhookTransport> IngestionCoordinatorBuilder<S, T> {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            source: None,
            transport: None,
            store: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 메시지 소스를 지정합니다.
    pub fn source(mut self, source: S) -> Self {
        self.source = Some(source);
        self
    }

    /// 웹훅 transport를 지정합니다.
    pub fn transport(mut self, transport: T) -> Self {
        self.transport = Some(transport);
        self
    }

    /// 중복 제거 저장소를 주입합니다.
    pub fn store(mut self, store: Arc<dyn DedupStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// 코디네이터를 빌드합니다.
    pub fn build(self) -> Result<IngestionCoordinator<S, T>, LogPipelineError> {
        self.config.validate()?;

        let source = self.source.ok_or_else(|| LogPipelineError::Config {
            field: "source".to_owned(),
            reason: "message source is required".to_owned(),
        })?;
        let transport = self.transport.ok_or_else(|| LogPipelineError::Config {
            field: "transport".to_owned(),
            reason: "webhook transport is required".to_owned(),
        })?;

        let store: Arc<dyn DedupStore> = match self.store {
            Some(store) => store,
            None => Arc::new(DedupCache::new(self.config.cache.clone())?),
        };

        let dispatcher = Arc::new(Dispatcher::new(self.config.dispatch.clone(), transport)?);
        let processor = Arc::new(AlertProcessor::new(
            AlertFormatter::new(self.config.alert_title.clone()),
            self.config.mention.clone(),
            Arc::clone(&store),
            dispatcher,
        ));

        Ok(IngestionCoordinator {
            config: self.config,
            state: CoordinatorState::Initialized,
            source: Arc::new(source),
            store,
            processor,
            cancel: CancellationToken::new(),
            workers: Vec::new(),
            sweeper: None,
        })
    }
}

impl<S: MessageSource, T: WebhookTransport> Default for IngestionCoordinatorBuilder<S, T> {
    fn default() -> Self {
        Self::new()
    }
}
