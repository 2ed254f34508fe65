//! 알림 식별자와 메시지 생성
//!
//! - [`fingerprint`]: 같은 클라이언트의 같은 URL 요청을 하나로 묶는 중복 제거 키
//! - [`AlertFormatter`]: 추출된 요청을 사람이 읽을 알림 본문으로 변환
//!
//! 두 함수 모두 입력만으로 결과가 결정되며 부수 효과가 없습니다.

use gatewatch_core::types::ExtractedRequest;
use sha2::{Digest, Sha256};

/// 기본 알림 제목
pub const DEFAULT_ALERT_TITLE: &str = "[Gateway 5xx alert]";

/// 클라이언트 IP와 URL로 중복 제거 키를 계산합니다.
///
/// `"{client_ip}-{url}"`의 SHA-256 다이제스트를 소문자 16진수(64자)로 반환합니다.
/// 요청 시각, 상태 코드, 소요 시간은 키에 포함되지 않습니다.
pub fn fingerprint(client_ip: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(client_ip.as_bytes());
    hasher.update(b"-");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// 알림 본문 생성기
///
/// 제목 한 줄 뒤에 요청 필드를 고정된 순서로 한 줄씩 나열합니다.
/// 필드 값은 가공 없이 그대로 들어가므로, 원본에 있던 비정상 값(`status = "abc"` 등)도
/// 숨겨지지 않습니다.
#[derive(Debug, Clone)]
pub struct AlertFormatter {
    title: String,
}

impl AlertFormatter {
    /// 지정한 제목으로 생성기를 만듭니다.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    /// 알림 제목
    pub fn title(&self) -> &str {
        &self.title
    }

    /// 요청 정보를 알림 본문으로 변환합니다.
    pub fn format(&self, request: &ExtractedRequest) -> String {
        format!(
            "{}\nRequest time: {}\nStatus: {}\nDuration: {}\nUpstream: {}\nClient IP: {}\nURL: {}",
            self.title,
            request.request_time,
            request.status,
            request.duration,
            request.upstream,
            request.client_ip,
            request.url,
        )
    }
}

impl Default for AlertFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_ALERT_TITLE)
    }
}
