//! 엔벨로프 디코더
//!
//! 메시지 큐에서 받은 원시 바이트를 [`LogEnvelope`]로 디코딩합니다.
//! 로그 수집기(beat)가 만든 JSON 객체 형식만 지원합니다.

use gatewatch_core::types::LogEnvelope;

use crate::error::LogPipelineError;

/// 엔벨로프 JSON 디코더
pub struct EnvelopeDecoder {
    /// 최대 허용 입력 크기 (바이트)
    max_input_size: usize,
}

impl EnvelopeDecoder {
    /// 기본 최대 입력 크기 (1MB)
    pub const DEFAULT_MAX_INPUT_SIZE: usize = 1024 * 1024;

    /// 새 디코더를 생성합니다.
    pub fn new() -> Self {
        Self {
            max_input_size: Self::DEFAULT_MAX_INPUT_SIZE,
        }
    }

    /// 최대 입력 크기를 설정합니다.
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// 원시 바이트를 엔벨로프로 디코딩합니다.
    pub fn decode(&self, raw: &[u8]) -> Result<LogEnvelope, LogPipelineError> {
        if raw.len() > self.max_input_size {
            return Err(LogPipelineError::Decode {
                line: 0,
                column: 0,
                reason: format!(
                    "input too large: {} bytes (max: {})",
                    raw.len(),
                    self.max_input_size
                ),
            });
        }

        serde_json::from_slice(raw).map_err(|e| LogPipelineError::Decode {
            line: e.line(),
            column: e.column(),
            reason: e.to_string(),
        })
    }
}

impl Default for EnvelopeDecoder {
    fn default() -> Self {
        Self::new()
    }
}
