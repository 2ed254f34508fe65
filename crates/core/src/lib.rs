//! gatewatch 공통 크레이트
//!
//! 설정 파일 모델, 최상위 에러 타입, 파이프라인 생명주기 trait,
//! 도메인 타입, 메트릭 이름 상수를 제공합니다.

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, GatewatchError, PipelineError};

// 설정
pub use config::GatewatchConfig;

// 파이프라인 trait
pub use pipeline::{HealthStatus, Pipeline};

// 도메인 타입
pub use types::{ExtractedRequest, LogEnvelope};
