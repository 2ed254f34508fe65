//! reqwest 기반 웹훅 transport
//!
//! WeCom 그룹 로봇 웹훅은 HTTP 200으로 응답하면서 본문의 `errcode`로 실패를 알립니다.
//! 따라서 2xx 상태 코드와 `errcode == 0`을 모두 만족해야 성공으로 봅니다.
//! 본문이 JSON이 아니면 상태 코드만으로 판단합니다.

use std::time::Duration;

use serde::Deserialize;

use super::{WebhookPayload, WebhookTransport};
use crate::error::LogPipelineError;

/// 웹훅 응답 본문
#[derive(Debug, Default, Deserialize)]
struct WebhookResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// 응답 본문을 검사하여 `errcode`가 0이 아니면 실패 사유를 반환합니다.
fn check_body(body: &[u8]) -> Result<(), String> {
    match serde_json::from_slice::<WebhookResponse>(body) {
        Ok(resp) if resp.errcode != 0 => {
            Err(format!("errcode {}: {}", resp.errcode, resp.errmsg))
        }
        _ => Ok(()),
    }
}

/// reqwest 클라이언트로 웹훅을 호출하는 transport
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// 새 transport를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 미리 구성한 클라이언트로 transport를 생성합니다.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl WebhookTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        payload: &WebhookPayload,
        timeout: Duration,
    ) -> Result<(), LogPipelineError> {
        let delivery_error = |reason: String| LogPipelineError::Delivery {
            endpoint: url.to_owned(),
            reason,
        };

        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    delivery_error(format!("timed out after {}s", timeout.as_secs_f64()))
                } else {
                    delivery_error(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(delivery_error(format!("unexpected status {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| delivery_error(format!("failed to read response body: {e}")))?;
        check_body(&body).map_err(delivery_error)
    }
}
