//! 알림 전송 -- 웹훅 엔드포인트 선택과 전송 정책
//!
//! [`Dispatcher`]는 설정된 웹훅 목록에서 엔드포인트를 무작위로 골라 알림을 보냅니다.
//! 실제 HTTP 전송은 [`WebhookTransport`] 구현체가 담당하므로 테스트에서는
//! 네트워크 없이 목 transport로 교체할 수 있습니다.
//!
//! # 전송 정책
//! - 시도마다 엔드포인트를 새로 선택합니다.
//! - 시도마다 `timeout`이 적용됩니다.
//! - 실패 시 `max_retries`만큼 즉시 재시도합니다 (기본 0회, 백오프 없음).

pub mod webhook;

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use gatewatch_core::config::{SELECTION_ALL, SELECTION_ALL_BUT_LAST};
use gatewatch_core::metrics as m;

use crate::error::LogPipelineError;

pub use webhook::ReqwestTransport;

/// 엔드포인트 선택 전략
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointSelection {
    /// 마지막 엔드포인트를 제외한 `[0, N-1)`에서 균등 선택 (기본값)
    ///
    /// 마지막 엔드포인트는 예비용으로 남겨두는 기존 운영 방식입니다. N ≥ 2가 필요합니다.
    #[default]
    AllButLast,
    /// 전체 `[0, N)`에서 균등 선택
    All,
}

impl EndpointSelection {
    /// 설정 문자열에서 선택 전략을 파싱합니다.
    pub fn parse(value: &str) -> Result<Self, LogPipelineError> {
        match value {
            SELECTION_ALL_BUT_LAST => Ok(Self::AllButLast),
            SELECTION_ALL => Ok(Self::All),
            other => Err(LogPipelineError::Config {
                field: "dispatch.selection".to_owned(),
                reason: format!(
                    "unknown selection '{other}', expected '{SELECTION_ALL_BUT_LAST}' or '{SELECTION_ALL}'"
                ),
            }),
        }
    }

    /// 엔드포인트 수가 `count`일 때 선택 가능한 인덱스 상한 (미포함)
    pub fn upper_bound(self, count: usize) -> usize {
        match self {
            Self::AllButLast => count.saturating_sub(1),
            Self::All => count,
        }
    }

    /// 이 전략에 필요한 최소 엔드포인트 수
    pub fn min_endpoints(self) -> usize {
        match self {
            Self::AllButLast => 2,
            Self::All => 1,
        }
    }
}

/// 텍스트 메시지 본문
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    /// 알림 본문
    pub content: String,
    /// 멘션할 휴대폰 번호 목록
    pub mentioned_mobile_list: Vec<String>,
}

/// 웹훅 요청 본문
///
/// 직렬화 결과: `{"msgtype":"text","text":{"content":...,"mentioned_mobile_list":[...]}}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// 메시지 유형 (항상 `"text"`)
    pub msgtype: String,
    /// 텍스트 본문
    pub text: TextContent,
}

impl WebhookPayload {
    /// 텍스트 알림 페이로드를 생성합니다.
    pub fn text(content: impl Into<String>, mention: impl Into<String>) -> Self {
        Self {
            msgtype: "text".to_owned(),
            text: TextContent {
                content: content.into(),
                mentioned_mobile_list: vec![mention.into()],
            },
        }
    }
}

/// 웹훅 전송 추상화
///
/// 한 번의 전송 시도를 표현합니다. 재시도와 엔드포인트 선택은 [`Dispatcher`]가 담당합니다.
pub trait WebhookTransport: Send + Sync + 'static {
    /// `url`로 페이로드를 POST합니다.
    ///
    /// `timeout` 안에 성공 응답을 받지 못하면 `LogPipelineError::Delivery`를 반환합니다.
    fn post_json(
        &self,
        url: &str,
        payload: &WebhookPayload,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), LogPipelineError>> + Send;
}

/// 전송기 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// 웹훅 URL 목록
    pub endpoints: Vec<String>,
    /// 엔드포인트 선택 전략
    pub selection: EndpointSelection,
    /// 시도당 타임아웃
    pub timeout: Duration,
    /// 최대 재시도 횟수
    pub max_retries: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            selection: EndpointSelection::AllButLast,
            timeout: Duration::from_secs(10),
            max_retries: 0,
        }
    }
}

impl DispatcherConfig {
    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_TIMEOUT: Duration = Duration::from_secs(300);
        const MAX_RETRIES: u32 = 10;

        let required = self.selection.min_endpoints();
        if self.endpoints.len() < required {
            return Err(LogPipelineError::Config {
                field: "dispatch.endpoints".to_owned(),
                reason: format!(
                    "selection {:?} needs at least {required} endpoints, found {}",
                    self.selection,
                    self.endpoints.len()
                ),
            });
        }

        if let Some(endpoint) = self
            .endpoints
            .iter()
            .find(|e| !e.starts_with("http://") && !e.starts_with("https://"))
        {
            return Err(LogPipelineError::Config {
                field: "dispatch.endpoints".to_owned(),
                reason: format!("endpoint '{endpoint}' must be an http(s) URL"),
            });
        }

        if self.timeout.is_zero() || self.timeout > MAX_TIMEOUT {
            return Err(LogPipelineError::Config {
                field: "dispatch.timeout_secs".to_owned(),
                reason: format!("must be 1-{}", MAX_TIMEOUT.as_secs()),
            });
        }

        if self.max_retries > MAX_RETRIES {
            return Err(LogPipelineError::Config {
                field: "dispatch.max_retries".to_owned(),
                reason: format!("must be 0-{MAX_RETRIES}"),
            });
        }

        Ok(())
    }
}

/// 알림 전송기
///
/// 상태가 없으므로 여러 워커가 `Arc`로 공유합니다.
pub struct Dispatcher<T: WebhookTransport> {
    config: DispatcherConfig,
    transport: T,
}

impl<T: WebhookTransport> Dispatcher<T> {
    /// 설정을 검증하고 전송기를 생성합니다.
    pub fn new(config: DispatcherConfig, transport: T) -> Result<Self, LogPipelineError> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    /// 전송기 설정을 반환합니다.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// 내부 transport를 반환합니다.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// 선택 전략에 따라 엔드포인트 하나를 고릅니다.
    pub fn select_endpoint(&self) -> &str {
        let upper = self
            .config
            .selection
            .upper_bound(self.config.endpoints.len())
            .max(1);
        let index = rand::thread_rng().gen_range(0..upper);
        &self.config.endpoints[index]
    }

    /// 알림을 전송하고 수락한 엔드포인트를 반환합니다.
    pub async fn dispatch(&self, message: &str, mention: &str) -> Result<String, LogPipelineError> {
        let payload = WebhookPayload::text(message, mention);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let endpoint = self.select_endpoint().to_owned();
            let started = Instant::now();
            let result = self
                .transport
                .post_json(&endpoint, &payload, self.config.timeout)
                .await;
            let elapsed = started.elapsed().as_secs_f64();

            match result {
                Ok(()) => {
                    metrics::histogram!(m::DISPATCH_DURATION_SECONDS, m::LABEL_RESULT => "success")
                        .record(elapsed);
                    debug!(endpoint = %endpoint, attempt, "alert delivered");
                    return Ok(endpoint);
                }
                Err(e) => {
                    metrics::histogram!(m::DISPATCH_DURATION_SECONDS, m::LABEL_RESULT => "failure")
                        .record(elapsed);
                    if attempt > self.config.max_retries {
                        return Err(e);
                    }
                    warn!(
                        endpoint = %endpoint,
                        attempt,
                        max_retries = self.config.max_retries,
                        error = %e,
                        "alert delivery failed, retrying"
                    );
                }
            }
        }
    }
}
