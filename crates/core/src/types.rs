//! 도메인 타입 -- 파이프라인 전역에서 사용되는 공통 타입
//!
//! 메시지 큐에서 수신한 엔벨로프와, 엔벨로프의 액세스 로그 라인에서
//! 추출한 요청 정보를 정의합니다.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 로그 수집기(beat)가 붙이는 메타데이터
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeMetadata {
    pub beat: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub topic: String,
}

/// 엔벨로프의 `fields` 섹션
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeFields {
    pub kafka_topic: String,
}

/// 로그를 전송한 beat 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatInfo {
    pub name: String,
    pub hostname: String,
    pub version: String,
}

/// 로그를 생성한 호스트 정보
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostInfo {
    pub name: String,
}

/// 메시지 큐에서 수신한 로그 엔벨로프
///
/// 파이프라인 로직은 `message` 필드(액세스 로그 한 줄)만 사용하며,
/// 나머지 필드는 로깅용 메타데이터입니다. 누락된 필드는 기본값으로 채워집니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEnvelope {
    /// 수집 시각
    #[serde(rename = "@timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    /// beat 메타데이터
    #[serde(rename = "@metadata")]
    pub metadata: EnvelopeMetadata,
    /// 원본 로그 파일 경로
    pub source: String,
    /// 원본 파일 내 오프셋
    pub offset: i64,
    /// 액세스 로그 라인
    pub message: String,
    pub fields: EnvelopeFields,
    pub beat: BeatInfo,
    pub host: HostInfo,
}

/// 액세스 로그 라인에서 추출한 요청 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRequest {
    /// 클라이언트 IP
    pub client_ip: String,
    /// 요청 시각 (`10/Jan/2024 10:00:00` 형식)
    pub request_time: String,
    /// `scheme://host/path` 형태로 재조합한 URL
    pub url: String,
    /// 원본 상태 코드 토큰
    pub status: String,
    /// 정수로 파싱된 상태 코드. 파싱에 실패하면 `None`
    ///
    /// 범위 제한 없이 부호 있는 정수로 파싱합니다 (`70000`, `-1`도 정수).
    pub status_code: Option<i64>,
    /// 요청 처리 시간 토큰
    pub duration: String,
    /// 요청을 처리한 업스트림 노드
    pub upstream: String,
}

impl fmt::Display for ExtractedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} status={} duration={} upstream={}",
            self.client_ip, self.url, self.status, self.duration, self.upstream,
        )
    }
}
