#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`collector`]: 토픽 파티션에서 원시 메시지 수집 (Kafka, 인메모리 채널)
//! - [`parser`]: 엔벨로프 JSON 디코딩과 액세스 로그 필드 추출
//! - [`filter`]: 서버 에러(5xx) 판정
//! - [`alert`]: 중복 제거 fingerprint와 알림 본문 생성
//! - [`dedup`]: TTL 기반 공유 중복 제거 캐시
//! - [`dispatch`]: 웹훅 엔드포인트 선택과 전송
//! - [`processor`]: 메시지 한 건의 처리 흐름
//! - [`worker`]: 파티션별 처리 루프
//! - [`coordinator`]: 워커와 공유 자원의 생명주기 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 변환)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Kafka -> PartitionWorker (x N) -> decode -> extract -> 5xx? -> dedup? -> format -> webhook
//!                                                                  ^                    |
//!                                                                  +---- record --------+
//! ```

pub mod alert;
pub mod config;
pub mod coordinator;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod processor;
pub mod worker;

pub mod collector;
pub mod dispatch;
pub mod parser;

// --- 주요 타입 re-export ---

// 코디네이터
pub use coordinator::{IngestionCoordinator, IngestionCoordinatorBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 파서
pub use parser::{AccessLogParser, EnvelopeDecoder, Malformed};

// 수집기
pub use collector::{
    ChannelSource, KafkaSource, KafkaSourceConfig, MessageSource, PartitionMessage,
};

// 중복 제거
pub use dedup::{DedupCache, DedupCacheConfig, DedupStore};

// 전송
pub use dispatch::{
    Dispatcher, DispatcherConfig, EndpointSelection, ReqwestTransport, WebhookPayload,
    WebhookTransport,
};

// 처리
pub use alert::{AlertFormatter, fingerprint};
pub use processor::{AlertProcessor, ProcessOutcome};
pub use worker::{PartitionWorker, WorkerState, WorkerStatsSnapshot};
