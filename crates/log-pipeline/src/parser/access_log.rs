//! 게이트웨이 액세스 로그 필드 추출기
//!
//! 게이트웨이(nginx)의 액세스 로그 한 줄을 큰따옴표(`"`)로 분할한 뒤,
//! 고정된 토큰 위치에서 요청 정보를 꺼냅니다.
//!
//! # 토큰 레이아웃
//! ```text
//! 1.2.3.4 - - [10/Jan/2024:10:00:00 +0000] "http" "example.com" "/path" "GET /path HTTP/1.1" 0.123 502 1024 "-" "curl/8.0" "-" "10.0.0.5:8080"
//!
//! token[0]  = `1.2.3.4 - - [10/Jan/2024:10:00:00 +0000] `
//! token[1]  = `http`          token[3] = `example.com`    token[5] = `/path`
//! token[8]  = ` 0.123 502 1024 `
//! token[15] = `10.0.0.5:8080`
//! ```
//!
//! | 필드 | 규칙 |
//! |------|------|
//! | client_ip | token[0]의 공백 분할 1번째 |
//! | request_time | token[0]의 공백 분할 4번째, `[` 제거, 첫 `:`를 공백으로 |
//! | url | `token[1] + "://" + token[3] + token[5]` |
//! | status | token[8]의 공백 분할 3번째 |
//! | duration | token[8]의 공백 분할 2번째 |
//! | upstream | token[15] |
//!
//! 토큰 수가 [`AccessLogParser::MIN_TOKENS`]보다 적거나 위치 규칙에 필요한
//! 토큰이 없으면 [`Malformed`]를 반환합니다. 상태 코드가 정수가 아니면
//! 추출은 성공하고 `status_code`가 `None`이 됩니다.

use gatewatch_core::types::ExtractedRequest;

/// 액세스 로그 라인이 위치 규칙과 맞지 않음
///
/// 에러가 아니라 정의된 건너뛰기 경로입니다. 호출자는 로그만 남기고 메시지를 버립니다.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Malformed {
    /// 따옴표 분할 토큰 수 부족
    #[error("expected at least {expected} quote-delimited tokens, found {found}")]
    TooFewTokens {
        /// 필요한 최소 토큰 수
        expected: usize,
        /// 실제 토큰 수
        found: usize,
    },

    /// 토큰 안의 공백 분할 필드가 부족
    #[error("token[{token}] has no {field} field")]
    MissingField {
        /// 토큰 인덱스
        token: usize,
        /// 필드 이름
        field: &'static str,
    },
}

/// 액세스 로그 필드 추출기
///
/// 상태가 없는 순수 파서입니다. I/O나 부수 효과가 없으므로 여러 워커가
/// 동시에 같은 인스턴스를 사용해도 안전합니다.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLogParser;

impl AccessLogParser {
    /// 유효한 라인이 가져야 하는 최소 토큰 수
    pub const MIN_TOKENS: usize = 16;

    /// 새 추출기를 생성합니다.
    pub fn new() -> Self {
        Self
    }

    /// 액세스 로그 라인에서 요청 정보를 추출합니다.
    pub fn extract(&self, raw: &str) -> Result<ExtractedRequest, Malformed> {
        let tokens: Vec<&str> = raw.split('"').collect();
        if tokens.len() < Self::MIN_TOKENS {
            return Err(Malformed::TooFewTokens {
                expected: Self::MIN_TOKENS,
                found: tokens.len(),
            });
        }

        let client_ip = space_field(tokens[0], 0, 0, "client_ip")?;
        let time_field = space_field(tokens[0], 0, 3, "request_time")?;
        let request_time = time_field.replace('[', "").replacen(':', " ", 1);

        let url = format!("{}://{}{}", tokens[1], tokens[3], tokens[5]);

        let duration = space_field(tokens[8], 8, 1, "duration")?;
        let status = space_field(tokens[8], 8, 2, "status")?;
        let status_code = status.parse::<i64>().ok();

        Ok(ExtractedRequest {
            client_ip: client_ip.to_owned(),
            request_time,
            url,
            status: status.to_owned(),
            status_code,
            duration: duration.to_owned(),
            upstream: tokens[15].to_owned(),
        })
    }
}

/// 토큰을 공백 한 칸 단위로 분할하여 `index`번째 필드를 반환합니다.
///
/// 연속 공백은 빈 필드를 만듭니다. 따옴표 바로 뒤의 공백 때문에
/// token[8]의 첫 필드는 항상 비어 있습니다.
fn space_field<'a>(
    token: &'a str,
    token_index: usize,
    index: usize,
    field: &'static str,
) -> Result<&'a str, Malformed> {
    token.split(' ').nth(index).ok_or(Malformed::MissingField {
        token: token_index,
        field,
    })
}
