//! Kafka 소스
//!
//! `rskafka` 클라이언트로 토픽의 파티션을 조회하고, 파티션마다 스트림 소비자를 만들어
//! 최신 오프셋부터 메시지를 읽습니다. 과거 backlog는 재생하지 않습니다.
//!
//! 파티션마다 펌프 태스크 하나가 소비자 스트림을 읽어 bounded mpsc 채널로 전달합니다.
//! 스트림 에러나 소스 종료 시 펌프가 멈추고 채널이 닫힙니다.
//!
//! rskafka는 연결 실패를 기한 없이 재시도하므로 브로커 연결, 토픽 조회, 파티션 열기는
//! 모두 `connect_timeout`으로 제한합니다. 기한을 넘기면 `Source` 에러를 반환합니다.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use rskafka::client::consumer::{StartOffset, StreamConsumer, StreamConsumerBuilder};
use rskafka::client::partition::UnknownTopicHandling;
use rskafka::client::{Client, ClientBuilder};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use gatewatch_core::config::SourceConfig;

use super::{MessageSource, PartitionMessage};
use crate::error::LogPipelineError;

const SOURCE_TYPE: &str = "kafka";

/// Kafka 소스 설정
#[derive(Debug, Clone)]
pub struct KafkaSourceConfig {
    /// 부트스트랩 브로커 주소 목록
    pub brokers: Vec<String>,
    /// 소비할 토픽
    pub topic: String,
    /// 클라이언트 ID
    pub client_id: String,
    /// 파티션별 채널 용량
    pub channel_capacity: usize,
    /// fetch 요청 최대 대기 시간
    pub max_wait: Duration,
    /// 브로커 연결, 토픽 조회, 파티션 열기 제한 시간
    pub connect_timeout: Duration,
}

impl KafkaSourceConfig {
    /// core의 소스 설정에서 생성합니다.
    pub fn from_core(core: &SourceConfig) -> Self {
        Self {
            brokers: core.brokers.clone(),
            topic: core.topic.clone(),
            client_id: core.client_id.clone(),
            channel_capacity: core.channel_capacity,
            max_wait: Duration::from_millis(core.max_wait_ms),
            connect_timeout: Duration::from_secs(core.connect_timeout_secs),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_WAIT: Duration = Duration::from_secs(60);
        const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(300);

        if self.brokers.is_empty() {
            return Err(config_error("source.brokers", "at least one broker is required"));
        }
        if self.topic.is_empty() {
            return Err(config_error("source.topic", "must not be empty"));
        }
        if self.channel_capacity == 0 {
            return Err(config_error("source.channel_capacity", "must be greater than 0"));
        }
        if self.max_wait.is_zero() || self.max_wait > MAX_WAIT {
            return Err(config_error(
                "source.max_wait_ms",
                format!("must be 1-{}", MAX_WAIT.as_millis()),
            ));
        }
        if self.connect_timeout.is_zero() || self.connect_timeout > MAX_CONNECT_TIMEOUT {
            return Err(config_error(
                "source.connect_timeout_secs",
                format!("must be 1-{}", MAX_CONNECT_TIMEOUT.as_secs()),
            ));
        }
        Ok(())
    }

    fn max_wait_ms(&self) -> i32 {
        i32::try_from(self.max_wait.as_millis()).unwrap_or(i32::MAX)
    }
}

fn config_error(field: &str, reason: impl Into<String>) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

fn source_error(reason: impl Into<String>) -> LogPipelineError {
    LogPipelineError::Source {
        source_type: SOURCE_TYPE.to_owned(),
        reason: reason.into(),
    }
}

/// rskafka 호출을 제한 시간 안에 끝내고, 실패와 시간 초과를 모두 `Source` 에러로 바꿉니다.
async fn within<T, E, F>(limit: Duration, what: &str, fut: F) -> Result<T, LogPipelineError>
where
    E: std::fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(source_error(format!("failed to {what}: {e}"))),
        Err(_) => Err(source_error(format!(
            "timed out after {}ms trying to {what}",
            limit.as_millis()
        ))),
    }
}

/// Kafka 메시지 소스
///
/// [`connect`](Self::connect)에서 브로커 연결에 실패하면 에러를 반환합니다.
/// 데몬은 이 에러를 시작 실패로 취급하고 종료합니다.
pub struct KafkaSource {
    config: KafkaSourceConfig,
    client: Client,
    cancel: CancellationToken,
    pumps: Mutex<Vec<JoinHandle<()>>>,
}

impl KafkaSource {
    /// 브로커에 연결합니다.
    pub async fn connect(config: KafkaSourceConfig) -> Result<Self, LogPipelineError> {
        config.validate()?;

        let client = within(
            config.connect_timeout,
            "connect to brokers",
            ClientBuilder::new(config.brokers.clone())
                .client_id(config.client_id.clone())
                .build(),
        )
        .await?;

        info!(
            brokers = ?config.brokers,
            topic = %config.topic,
            client_id = %config.client_id,
            "connected to kafka"
        );

        Ok(Self {
            config,
            client,
            cancel: CancellationToken::new(),
            pumps: Mutex::new(Vec::new()),
        })
    }

    /// 소스 설정을 반환합니다.
    pub fn config(&self) -> &KafkaSourceConfig {
        &self.config
    }

    fn track_pump(&self, handle: JoinHandle<()>) {
        self.pumps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handle);
    }
}

impl MessageSource for KafkaSource {
    fn source_type(&self) -> &'static str {
        SOURCE_TYPE
    }

    async fn partitions(&self) -> Result<Vec<i32>, LogPipelineError> {
        let topics = within(
            self.config.connect_timeout,
            "list topics",
            self.client.list_topics(),
        )
        .await?;

        let topic = topics
            .into_iter()
            .find(|t| t.name == self.config.topic)
            .ok_or_else(|| source_error(format!("topic '{}' not found", self.config.topic)))?;

        Ok(topic.partitions.into_iter().collect())
    }

    async fn open_partition(
        &self,
        partition: i32,
    ) -> Result<mpsc::Receiver<PartitionMessage>, LogPipelineError> {
        let partition_client = within(
            self.config.connect_timeout,
            &format!("open partition {partition}"),
            self.client.partition_client(
                self.config.topic.clone(),
                partition,
                UnknownTopicHandling::Error,
            ),
        )
        .await?;

        let stream = StreamConsumerBuilder::new(Arc::new(partition_client), StartOffset::Latest)
            .with_max_wait_ms(self.config.max_wait_ms())
            .build();

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let handle = tokio::spawn(pump(partition, stream, tx, self.cancel.child_token()));
        self.track_pump(handle);

        debug!(partition, topic = %self.config.topic, "partition consumer started at latest offset");
        Ok(rx)
    }

    async fn close(&self) {
        self.cancel.cancel();
        let pumps: Vec<JoinHandle<()>> = self
            .pumps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
            .collect();

        for handle in pumps {
            if let Err(e) = handle.await
                && !e.is_cancelled()
            {
                warn!(error = %e, "partition pump task failed");
            }
        }
        info!(topic = %self.config.topic, "kafka source closed");
    }
}

/// 소비자 스트림을 읽어 채널로 전달합니다.
async fn pump(
    partition: i32,
    mut stream: StreamConsumer,
    tx: mpsc::Sender<PartitionMessage>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(partition, "partition pump received shutdown signal");
                break;
            }
            next = stream.next() => match next {
                Some(Ok((record, _high_watermark))) => {
                    let Some(value) = record.record.value else {
                        debug!(partition, offset = record.offset, "skipping record without value");
                        continue;
                    };
                    let msg = PartitionMessage::new(partition, record.offset, Bytes::from(value));
                    if tx.send(msg).await.is_err() {
                        debug!(partition, "partition receiver dropped, stopping pump");
                        break;
                    }
                }
                Some(Err(e)) => {
                    error!(partition, error = %e, "partition stream failed");
                    break;
                }
                None => {
                    warn!(partition, "partition stream ended");
                    break;
                }
            }
        }
    }
}
