//! 인메모리 채널 소스
//!
//! 브로커 없이 파티션 메시지를 직접 밀어 넣을 수 있는 [`MessageSource`] 구현입니다.
//! 통합 테스트와 로컬 재현에 사용합니다.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use super::{MessageSource, PartitionMessage};
use crate::error::LogPipelineError;

/// 파티션 하나의 송신 측 상태
struct PartitionSender {
    tx: mpsc::Sender<PartitionMessage>,
    next_offset: i64,
}

/// 인메모리 채널 소스
///
/// # 사용 예시
/// ```ignore
/// let source = ChannelSource::new([0, 1], 64);
/// source.send(0, envelope_bytes).await?;
/// ```
pub struct ChannelSource {
    partitions: Vec<i32>,
    senders: Mutex<HashMap<i32, PartitionSender>>,
    receivers: Mutex<HashMap<i32, mpsc::Receiver<PartitionMessage>>>,
    unavailable: Mutex<HashSet<i32>>,
}

impl ChannelSource {
    /// 지정한 파티션마다 용량 `capacity`의 채널을 만듭니다.
    pub fn new(partitions: impl IntoIterator<Item = i32>, capacity: usize) -> Self {
        let partitions: Vec<i32> = partitions.into_iter().collect();
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for &partition in &partitions {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            senders.insert(
                partition,
                PartitionSender {
                    tx,
                    next_offset: 0,
                },
            );
            receivers.insert(partition, rx);
        }

        Self {
            partitions,
            senders: Mutex::new(senders),
            receivers: Mutex::new(receivers),
            unavailable: Mutex::new(HashSet::new()),
        }
    }

    /// 파티션을 열 수 없는 상태로 표시합니다.
    ///
    /// 파티션 목록에는 남아 있지만 `open_partition`이 실패합니다.
    pub fn mark_unavailable(&self, partition: i32) {
        self.unavailable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(partition);
    }

    /// 파티션에 메시지를 보냅니다. 오프셋은 파티션별로 0부터 증가합니다.
    pub async fn send(&self, partition: i32, payload: impl Into<Bytes>) -> Result<i64, LogPipelineError> {
        let (tx, offset) = {
            let mut senders = self
                .senders
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let sender = senders.get_mut(&partition).ok_or_else(|| {
                LogPipelineError::Channel(format!("partition {partition} is closed or unknown"))
            })?;
            let offset = sender.next_offset;
            sender.next_offset += 1;
            (sender.tx.clone(), offset)
        };

        tx.send(PartitionMessage::new(partition, offset, payload))
            .await
            .map_err(|_| LogPipelineError::Channel(format!("partition {partition} receiver dropped")))?;
        Ok(offset)
    }

    /// 파티션 채널 하나만 닫습니다. 해당 워커는 채널 종료를 보고 멈춥니다.
    pub fn close_partition(&self, partition: i32) {
        self.senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&partition);
    }
}

impl MessageSource for ChannelSource {
    fn source_type(&self) -> &'static str {
        "channel"
    }

    async fn partitions(&self) -> Result<Vec<i32>, LogPipelineError> {
        Ok(self.partitions.clone())
    }

    async fn open_partition(
        &self,
        partition: i32,
    ) -> Result<mpsc::Receiver<PartitionMessage>, LogPipelineError> {
        let unavailable = self
            .unavailable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&partition);
        if unavailable {
            return Err(LogPipelineError::Source {
                source_type: "channel".to_owned(),
                reason: format!("partition {partition} is unavailable"),
            });
        }

        self.receivers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&partition)
            .ok_or_else(|| LogPipelineError::Source {
                source_type: "channel".to_owned(),
                reason: format!("partition {partition} is unknown or already open"),
            })
    }

    async fn close(&self) {
        self.senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
        debug!("channel source closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_configured_partitions() {
        let source = ChannelSource::new([0, 1, 2], 8);
        assert_eq!(source.partitions().await.unwrap(), vec![0, 1, 2]);
        assert_eq!(source.source_type(), "channel");
    }

    #[tokio::test]
    async fn send_assigns_increasing_offsets() {
        let source = ChannelSource::new([0], 8);
        let mut rx = source.open_partition(0).await.unwrap();

        assert_eq!(source.send(0, &b"a"[..]).await.unwrap(), 0);
        assert_eq!(source.send(0, &b"b"[..]).await.unwrap(), 1);

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!((first.offset, first.payload.as_ref()), (0, &b"a"[..]));
        assert_eq!((second.offset, second.payload.as_ref()), (1, &b"b"[..]));
    }

    #[tokio::test]
    async fn partition_can_only_be_opened_once() {
        let source = ChannelSource::new([0], 8);
        source.open_partition(0).await.unwrap();
        assert!(source.open_partition(0).await.is_err());
    }

    #[tokio::test]
    async fn unknown_partition_fails_to_open() {
        let source = ChannelSource::new([0], 8);
        assert!(matches!(
            source.open_partition(9).await,
            Err(LogPipelineError::Source { .. })
        ));
    }

    #[tokio::test]
    async fn unavailable_partition_fails_to_open() {
        let source = ChannelSource::new([0, 1], 8);
        source.mark_unavailable(1);
        assert!(source.open_partition(0).await.is_ok());
        assert!(source.open_partition(1).await.is_err());
    }

    #[tokio::test]
    async fn close_ends_open_channels() {
        let source = ChannelSource::new([0], 8);
        let mut rx = source.open_partition(0).await.unwrap();
        source.close().await;
        assert!(rx.recv().await.is_none());
        assert!(source.send(0, &b"late"[..]).await.is_err());
    }
}
