//! 메시지 수집 모듈 -- 토픽 파티션에서 원시 메시지를 받아옵니다.
//!
//! # 수집 소스
//! - [`KafkaSource`]: Kafka 브로커에서 파티션별로 최신 오프셋부터 소비
//! - [`ChannelSource`]: 인메모리 채널 기반 소스 (테스트, 로컬 재현용)
//!
//! # 아키텍처
//! 소스는 파티션마다 `tokio::mpsc::Receiver<PartitionMessage>`를 하나씩 내어주고,
//! 코디네이터는 각 수신 채널을 파티션 워커에 연결합니다.
//! 파티션 채널이 닫히면 해당 워커는 종료됩니다.

pub mod channel;
pub mod kafka;

pub use channel::ChannelSource;
pub use kafka::{KafkaSource, KafkaSourceConfig};

use std::future::Future;
use std::time::SystemTime;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::LogPipelineError;

/// 파티션에서 수신한 원시 메시지
#[derive(Debug, Clone)]
pub struct PartitionMessage {
    /// 파티션 번호
    pub partition: i32,
    /// 파티션 내 오프셋
    pub offset: i64,
    /// 메시지 본문 (엔벨로프 JSON)
    pub payload: Bytes,
    /// 수신 시각
    pub received_at: SystemTime,
}

impl PartitionMessage {
    /// 새 메시지를 생성합니다.
    pub fn new(partition: i32, offset: i64, payload: impl Into<Bytes>) -> Self {
        Self {
            partition,
            offset,
            payload: payload.into(),
            received_at: SystemTime::now(),
        }
    }
}

/// 파티션 단위 메시지 소스
///
/// 코디네이터가 시작 시 파티션 목록을 조회하고, 파티션마다 수신 채널을 엽니다.
pub trait MessageSource: Send + Sync + 'static {
    /// 소스 유형 이름 (로그와 에러 메시지용)
    fn source_type(&self) -> &'static str;

    /// 구독 토픽의 파티션 목록을 조회합니다.
    fn partitions(&self) -> impl Future<Output = Result<Vec<i32>, LogPipelineError>> + Send;

    /// 파티션을 최신 오프셋에서 열고 수신 채널을 반환합니다.
    fn open_partition(
        &self,
        partition: i32,
    ) -> impl Future<Output = Result<mpsc::Receiver<PartitionMessage>, LogPipelineError>> + Send;

    /// 소스를 닫고 연결 자원을 해제합니다. 열린 파티션 채널은 모두 닫힙니다.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_message_from_static_bytes() {
        let msg = PartitionMessage::new(3, 42, &b"{}"[..]);
        assert_eq!(msg.partition, 3);
        assert_eq!(msg.offset, 42);
        assert_eq!(msg.payload.as_ref(), b"{}");
    }

    #[test]
    fn partition_message_from_vec() {
        let msg = PartitionMessage::new(0, 0, b"payload".to_vec());
        assert_eq!(msg.payload.len(), 7);
    }
}
