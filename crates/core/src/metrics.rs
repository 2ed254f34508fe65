//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `gatewatch_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(gatewatch_core::metrics::MESSAGES_RECEIVED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 파티션 레이블 키
pub const LABEL_PARTITION: &str = "partition";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── 수집 메트릭 ────────────────────────────────────────────────────

/// 수신한 전체 메시지 수 (counter, label: partition)
pub const MESSAGES_RECEIVED_TOTAL: &str = "gatewatch_messages_received_total";

/// 엔벨로프 JSON 디코딩 실패 수 (counter)
pub const DECODE_ERRORS_TOTAL: &str = "gatewatch_decode_errors_total";

/// 형식이 맞지 않아 버려진 액세스 로그 수 (counter)
pub const MALFORMED_TOTAL: &str = "gatewatch_malformed_total";

/// 실행 중인 파티션 워커 수 (gauge)
pub const ACTIVE_WORKERS: &str = "gatewatch_active_workers";

// ─── 알림 메트릭 ────────────────────────────────────────────────────

/// 중복 제거로 억제된 알림 수 (counter)
pub const ALERTS_SUPPRESSED_TOTAL: &str = "gatewatch_alerts_suppressed_total";

/// 전송에 성공한 알림 수 (counter)
pub const ALERTS_DISPATCHED_TOTAL: &str = "gatewatch_alerts_dispatched_total";

/// 전송에 실패한 알림 수 (counter)
pub const DISPATCH_FAILURES_TOTAL: &str = "gatewatch_dispatch_failures_total";

/// 알림 전송 지연 시간 (histogram, 초, label: result)
pub const DISPATCH_DURATION_SECONDS: &str = "gatewatch_dispatch_duration_seconds";

/// 중복 제거 캐시 기록 실패 수 (counter)
pub const CACHE_WRITE_ERRORS_TOTAL: &str = "gatewatch_cache_write_errors_total";

/// 중복 제거 캐시 엔트리 수 (gauge)
pub const CACHE_ENTRIES: &str = "gatewatch_cache_entries";

// ─── 데몬 메트릭 ────────────────────────────────────────────────────

/// 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "gatewatch_build_info";

// ─── 히스토그램 버킷 ────────────────────────────────────────────────

/// 전송 지연 히스토그램 버킷 (초)
pub const DISPATCH_DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// 모든 메트릭의 설명을 등록합니다.
///
/// recorder 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        MESSAGES_RECEIVED_TOTAL,
        "Total number of messages received from the source topic"
    );
    describe_counter!(
        DECODE_ERRORS_TOTAL,
        "Messages dropped because the envelope was not valid JSON"
    );
    describe_counter!(
        MALFORMED_TOTAL,
        "Access log lines dropped because they did not match the positional layout"
    );
    describe_gauge!(ACTIVE_WORKERS, "Number of running partition workers");

    describe_counter!(
        ALERTS_SUPPRESSED_TOTAL,
        "Alerts suppressed by the deduplication cache"
    );
    describe_counter!(
        ALERTS_DISPATCHED_TOTAL,
        "Alerts successfully delivered to a webhook endpoint"
    );
    describe_counter!(
        DISPATCH_FAILURES_TOTAL,
        "Alerts that could not be delivered"
    );
    describe_histogram!(
        DISPATCH_DURATION_SECONDS,
        "Webhook dispatch latency in seconds"
    );
    describe_counter!(
        CACHE_WRITE_ERRORS_TOTAL,
        "Deduplication cache writes that were rejected"
    );
    describe_gauge!(CACHE_ENTRIES, "Entries currently held by the deduplication cache");

    describe_gauge!(DAEMON_BUILD_INFO, "Build information, value is always 1");
}
