//! 통합 테스트 -- 파이프라인 전체 흐름 검증
//!
//! 인메모리 채널 소스와 기록용 transport로 수집부터 알림 전송까지의 흐름을 검증합니다.
//! 같은 파티션의 메시지는 순서대로 처리되므로, 알림이 가지 않아야 하는 메시지 뒤에
//! 별도의 확인용 메시지를 보내 처리 완료를 기다립니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use gatewatch_core::pipeline::{HealthStatus, Pipeline};
use gatewatch_log_pipeline::{
    ChannelSource, DedupCacheConfig, EndpointSelection, IngestionCoordinator,
    IngestionCoordinatorBuilder, LogPipelineError, PipelineConfig, PipelineConfigBuilder,
    WebhookPayload, WebhookTransport, fingerprint,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// 성공한 전송을 채널로 내보내고, 앞의 `failures`회는 실패하는 transport
#[derive(Clone)]
struct RecordingTransport {
    delivered: mpsc::UnboundedSender<(String, WebhookPayload)>,
    failures: Arc<AtomicUsize>,
}

impl RecordingTransport {
    fn new(failures: usize) -> (Self, mpsc::UnboundedReceiver<(String, WebhookPayload)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            delivered: tx,
            failures: Arc::new(AtomicUsize::new(failures)),
        };
        (transport, rx)
    }
}

impl WebhookTransport for RecordingTransport {
    async fn post_json(
        &self,
        url: &str,
        payload: &WebhookPayload,
        _timeout: Duration,
    ) -> Result<(), LogPipelineError> {
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(LogPipelineError::Delivery {
                endpoint: url.to_owned(),
                reason: "simulated outage".to_owned(),
            });
        }
        let _ = self.delivered.send((url.to_owned(), payload.clone()));
        Ok(())
    }
}

struct Harness {
    coordinator: IngestionCoordinator<ChannelSource, RecordingTransport>,
    delivered: mpsc::UnboundedReceiver<(String, WebhookPayload)>,
}

impl Harness {
    async fn start(partitions: &[i32], config: PipelineConfig, failures: usize) -> Self {
        let (transport, delivered) = RecordingTransport::new(failures);
        let mut coordinator = IngestionCoordinatorBuilder::new()
            .config(config)
            .source(ChannelSource::new(partitions.iter().copied(), 64))
            .transport(transport)
            .build()
            .expect("failed to build coordinator");
        coordinator.start().await.expect("failed to start coordinator");
        Self {
            coordinator,
            delivered,
        }
    }

    async fn send(&self, partition: i32, message: &str) {
        self.coordinator
            .source()
            .send(partition, envelope(message))
            .await
            .expect("failed to send message");
    }

    async fn next_delivery(&mut self) -> WebhookPayload {
        tokio::time::timeout(RECV_TIMEOUT, self.delivered.recv())
            .await
            .expect("timed out waiting for alert")
            .expect("transport dropped")
            .1
    }

    /// 확인용 메시지를 보내고 그 알림이 도착할 때까지 기다립니다.
    async fn flush(&mut self, partition: i32, marker_ip: &str) {
        self.send(partition, &access_line(marker_ip, "/flush", "599"))
            .await;
        let payload = self.next_delivery().await;
        assert!(
            payload.text.content.contains(&format!("Client IP: {marker_ip}")),
            "expected flush marker, got: {}",
            payload.text.content
        );
    }

    fn assert_no_pending_delivery(&mut self) {
        assert!(self.delivered.try_recv().is_err(), "unexpected extra alert");
    }
}

fn access_line(client_ip: &str, path: &str, status: &str) -> String {
    format!(
        r#"{client_ip} - - [10/Jan/2024:10:00:00 +0000] "http" "example.com" "{path}" "GET {path} HTTP/1.1" 0.123 {status} 1024 "-" "curl/8.0" "-" "10.0.0.5:8080""#
    )
}

fn envelope(message: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "@timestamp": "2024-01-10T10:00:00.000Z",
        "@metadata": { "beat": "filebeat", "type": "doc", "version": "6.8.0", "topic": "nginx-access" },
        "source": "/var/log/nginx/access.log",
        "offset": 1024,
        "message": message,
        "fields": { "kafka_topic": "nginx-access" },
        "beat": { "name": "gw-01", "hostname": "gw-01", "version": "6.8.0" },
        "host": { "name": "gw-01" }
    }))
    .expect("envelope serialization")
}

fn config() -> PipelineConfig {
    PipelineConfigBuilder::new()
        .endpoints(vec![
            "http://hook-a.test/send".to_owned(),
            "http://hook-b.test/send".to_owned(),
        ])
        .mention("13800000000")
        .shutdown_timeout(Duration::from_secs(1))
        .build()
        .expect("valid config")
}

/// 5xx 응답이 알림으로 전송되는 전체 흐름
#[tokio::test]
async fn test_server_error_produces_alert() {
    let mut h = Harness::start(&[0], config(), 0).await;

    h.send(0, &access_line("1.2.3.4", "/path", "502")).await;
    let payload = h.next_delivery().await;

    assert_eq!(payload.msgtype, "text");
    assert_eq!(
        payload.text.content,
        "[Gateway 5xx alert]\n\
         Request time: 10/Jan/2024 10:00:00\n\
         Status: 502\n\
         Duration: 0.123\n\
         Upstream: 10.0.0.5:8080\n\
         Client IP: 1.2.3.4\n\
         URL: http://example.com/path"
    );
    assert_eq!(payload.text.mentioned_mobile_list, vec!["13800000000".to_owned()]);

    assert!(
        h.coordinator
            .store()
            .lookup(&fingerprint("1.2.3.4", "http://example.com/path"))
    );
    h.coordinator.stop().await.unwrap();
}

/// 기본 선택 전략은 마지막 엔드포인트를 사용하지 않음
#[tokio::test]
async fn test_default_selection_skips_last_endpoint() {
    let (transport, mut delivered) = RecordingTransport::new(0);
    let mut coordinator = IngestionCoordinatorBuilder::new()
        .config(config())
        .source(ChannelSource::new([0], 64))
        .transport(transport)
        .build()
        .unwrap();
    assert_eq!(coordinator.config().dispatch.selection, EndpointSelection::AllButLast);
    coordinator.start().await.unwrap();

    for i in 0..20 {
        coordinator
            .source()
            .send(0, envelope(&access_line(&format!("10.1.0.{i}"), "/x", "500")))
            .await
            .unwrap();
    }
    for _ in 0..20 {
        let (url, _) = tokio::time::timeout(RECV_TIMEOUT, delivered.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(url, "http://hook-a.test/send");
    }
    coordinator.stop().await.unwrap();
}

/// 정상 응답, 형식 불일치, 깨진 JSON은 알림을 만들지 않음
#[tokio::test]
async fn test_non_alerting_messages_are_dropped() {
    let mut h = Harness::start(&[0], config(), 0).await;

    h.send(0, &access_line("1.2.3.4", "/ok", "200")).await;
    h.send(0, &access_line("1.2.3.4", "/missing", "404")).await;
    h.send(0, &access_line("1.2.3.4", "/weird", "abc")).await;
    h.send(0, "not an access log line").await;
    h.coordinator
        .source()
        .send(0, &b"{broken json"[..])
        .await
        .unwrap();

    h.flush(0, "9.9.9.9").await;
    h.assert_no_pending_delivery();

    let stats = h.coordinator.worker_stats();
    assert_eq!(stats.received, 6);
    assert_eq!(stats.not_eligible, 3);
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.alerted, 1);
    h.coordinator.stop().await.unwrap();
}

/// 같은 클라이언트와 URL은 상태 코드가 달라도 TTL 안에서 한 번만 알림
#[tokio::test]
async fn test_duplicate_within_ttl_is_suppressed() {
    let mut h = Harness::start(&[0], config(), 0).await;

    h.send(0, &access_line("1.2.3.4", "/path", "502")).await;
    h.next_delivery().await;

    h.send(0, &access_line("1.2.3.4", "/path", "503")).await;
    h.send(0, &access_line("1.2.3.4", "/path", "502")).await;
    h.flush(0, "9.9.9.9").await;
    h.assert_no_pending_delivery();

    assert_eq!(h.coordinator.worker_stats().suppressed, 2);
    h.coordinator.stop().await.unwrap();
}

/// 다른 URL이나 다른 클라이언트는 별도로 알림
#[tokio::test]
async fn test_distinct_requests_are_not_suppressed() {
    let mut h = Harness::start(&[0], config(), 0).await;

    h.send(0, &access_line("1.2.3.4", "/a", "500")).await;
    h.send(0, &access_line("1.2.3.4", "/b", "500")).await;
    h.send(0, &access_line("5.6.7.8", "/a", "500")).await;

    for _ in 0..3 {
        h.next_delivery().await;
    }
    assert_eq!(h.coordinator.store().len(), 3);
    h.coordinator.stop().await.unwrap();
}

/// 캐시는 모든 파티션이 공유함
#[tokio::test]
async fn test_dedup_is_shared_across_partitions() {
    let mut h = Harness::start(&[0, 1], config(), 0).await;

    h.send(0, &access_line("1.2.3.4", "/path", "502")).await;
    h.next_delivery().await;

    h.send(1, &access_line("1.2.3.4", "/path", "502")).await;
    h.flush(1, "9.9.9.9").await;
    h.assert_no_pending_delivery();
    h.coordinator.stop().await.unwrap();
}

/// TTL이 지나면 같은 요청을 다시 알림
#[tokio::test(start_paused = true)]
async fn test_alert_repeats_after_ttl() {
    let mut h = Harness::start(&[0], config(), 0).await;

    h.send(0, &access_line("1.2.3.4", "/path", "502")).await;
    h.next_delivery().await;

    tokio::time::advance(Duration::from_secs(599)).await;
    h.send(0, &access_line("1.2.3.4", "/path", "502")).await;
    h.flush(0, "9.9.9.9").await;
    h.assert_no_pending_delivery();

    tokio::time::advance(Duration::from_secs(2)).await;
    h.send(0, &access_line("1.2.3.4", "/path", "502")).await;
    let payload = h.next_delivery().await;
    assert!(payload.text.content.contains("Client IP: 1.2.3.4"));
    h.coordinator.stop().await.unwrap();
}

/// 캐시 엔트리 크기 제한을 넘으면 기록되지 않으므로 매번 알림
#[tokio::test]
async fn test_oversized_cache_entry_never_suppresses() {
    let config = PipelineConfig {
        cache: DedupCacheConfig {
            max_entry_size: 100,
            ..Default::default()
        },
        ..config()
    };
    let mut h = Harness::start(&[0], config, 0).await;

    for _ in 0..3 {
        h.send(0, &access_line("1.2.3.4", "/path", "502")).await;
        h.next_delivery().await;
    }

    let stats = h.coordinator.worker_stats();
    assert_eq!(stats.alerted, 3);
    assert_eq!(stats.cache_write_errors, 3);
    assert!(h.coordinator.store().is_empty());
    h.coordinator.stop().await.unwrap();
}

/// 전송 실패는 캐시에 기록되지 않아 다음 발생 시 재전송됨
#[tokio::test]
async fn test_failed_delivery_is_retried_on_next_occurrence() {
    let mut h = Harness::start(&[0], config(), 1).await;

    h.send(0, &access_line("1.2.3.4", "/path", "502")).await;
    h.flush(0, "9.9.9.9").await;
    h.assert_no_pending_delivery();
    assert_eq!(h.coordinator.worker_stats().delivery_errors, 1);
    assert!(
        !h.coordinator
            .store()
            .lookup(&fingerprint("1.2.3.4", "http://example.com/path"))
    );

    h.send(0, &access_line("1.2.3.4", "/path", "502")).await;
    let payload = h.next_delivery().await;
    assert!(payload.text.content.contains("URL: http://example.com/path"));
    h.coordinator.stop().await.unwrap();
}

/// 재시도 설정 시 같은 메시지 처리 안에서 재전송
#[tokio::test]
async fn test_configured_retry_recovers_delivery() {
    let config = PipelineConfig {
        dispatch: gatewatch_log_pipeline::DispatcherConfig {
            max_retries: 2,
            ..config().dispatch
        },
        ..config()
    };
    let mut h = Harness::start(&[0], config, 2).await;

    h.send(0, &access_line("1.2.3.4", "/path", "502")).await;
    h.next_delivery().await;

    let stats = h.coordinator.worker_stats();
    assert_eq!(stats.alerted, 1);
    assert_eq!(stats.delivery_errors, 0);
    h.coordinator.stop().await.unwrap();
}

/// 헬스 체크와 정지
#[tokio::test]
async fn test_health_and_shutdown() {
    let mut h = Harness::start(&[0, 1, 2], config(), 0).await;
    assert_eq!(h.coordinator.health_check().await, HealthStatus::Healthy);

    h.coordinator.stop().await.unwrap();
    assert!(h.coordinator.health_check().await.is_unhealthy());
    assert!(h.coordinator.source().send(0, envelope("late")).await.is_err());
}
