//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for GatewatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 추출 단계의 형식 불일치는 에러가 아니라 정의된 건너뛰기 경로이므로
//! 여기가 아닌 [`Malformed`](crate::parser::Malformed)로 표현합니다.

use gatewatch_core::error::{GatewatchError, PipelineError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 엔벨로프 JSON 디코딩 실패
    #[error("decode error at line {line} column {column}: {reason}")]
    Decode {
        /// 실패 위치 (행)
        line: usize,
        /// 실패 위치 (열)
        column: usize,
        /// 실패 사유
        reason: String,
    },

    /// 알림 전송 실패 (연결 실패, 타임아웃, 비정상 응답)
    #[error("delivery to {endpoint} failed: {reason}")]
    Delivery {
        /// 전송 대상 엔드포인트
        endpoint: String,
        /// 실패 사유
        reason: String,
    },

    /// 캐시 엔트리가 최대 크기를 초과
    #[error("cache entry too large: {size} bytes (max: {max})")]
    CacheEntryTooLarge {
        /// 엔트리 크기 (키 + 값)
        size: usize,
        /// 허용 최대 크기
        max: usize,
    },

    /// 이미 닫힌 캐시에 기록 시도
    #[error("cache is closed")]
    CacheClosed,

    /// 메시지 소스 에러 (브로커 연결, 파티션 조회 등)
    #[error("source error: {source_type}: {reason}")]
    Source {
        /// 소스 유형 (kafka, channel 등)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LogPipelineError> for GatewatchError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Source { .. } => {
                GatewatchError::Pipeline(PipelineError::SourceUnavailable(err.to_string()))
            }
            LogPipelineError::Io(e) => GatewatchError::Io(e),
            other => GatewatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_error_display() {
        let err = LogPipelineError::Delivery {
            endpoint: "http://hook.local/send?key=1".to_owned(),
            reason: "timed out".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("hook.local"));
        assert!(msg.contains("timed out"));
    }

    #[test]
    fn cache_entry_too_large_display() {
        let err = LogPipelineError::CacheEntryTooLarge { size: 640, max: 500 };
        let msg = err.to_string();
        assert!(msg.contains("640"));
        assert!(msg.contains("500"));
    }

    #[test]
    fn source_error_converts_to_source_unavailable() {
        let err = LogPipelineError::Source {
            source_type: "kafka".to_owned(),
            reason: "connection refused".to_owned(),
        };
        let top: GatewatchError = err.into();
        assert!(matches!(
            top,
            GatewatchError::Pipeline(PipelineError::SourceUnavailable(_))
        ));
    }

    #[test]
    fn config_error_converts_to_pipeline_error() {
        let err = LogPipelineError::Config {
            field: "cache.shards".to_owned(),
            reason: "must be a power of two".to_owned(),
        };
        let top: GatewatchError = err.into();
        assert!(matches!(top, GatewatchError::Pipeline(_)));
        assert!(top.to_string().contains("cache.shards"));
    }
}
