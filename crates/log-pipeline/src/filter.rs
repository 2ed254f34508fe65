//! 심각도 필터 -- 서버 에러(5xx) 응답만 알림 대상으로 통과시킵니다.
//!
//! 상태 코드 파싱 실패와 500 미만 코드는 정상 트래픽이므로 에러 없이 걸러집니다.

/// 알림 대상이 되는 최소 상태 코드
pub const SERVER_ERROR_THRESHOLD: i64 = 500;

/// 상태 코드가 알림 대상인지 판정합니다.
pub fn is_eligible(status_code: Option<i64>) -> bool {
    matches!(status_code, Some(code) if code >= SERVER_ERROR_THRESHOLD)
}
