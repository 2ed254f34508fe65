//! 에러 타입 -- 도메인별 에러 정의

/// gatewatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum GatewatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 메시지 소스 연결/파티션 조회 실패
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: GatewatchError = ConfigError::InvalidValue {
            field: "dispatch.endpoints".to_owned(),
            reason: "must not be empty".to_owned(),
        }
        .into();
        assert!(matches!(err, GatewatchError::Config(_)));
        assert!(err.to_string().contains("dispatch.endpoints"));
    }

    #[test]
    fn pipeline_error_display() {
        let err: GatewatchError = PipelineError::SourceUnavailable("broker down".to_owned()).into();
        assert_eq!(
            err.to_string(),
            "pipeline error: source unavailable: broker down"
        );
    }
}
