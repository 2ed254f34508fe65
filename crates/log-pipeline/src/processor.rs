//! 메시지 처리 -- 엔벨로프 한 건을 알림 여부까지 판정합니다.
//!
//! # 처리 순서
//! ```text
//! decode -> extract -> severity filter -> dedup reserve -> format -> dispatch -> dedup record
//! ```
//!
//! 캐시 기록은 전송이 성공한 뒤에만 수행합니다. 전송에 실패한 알림은 기록되지 않으므로
//! 같은 요청이 다시 들어오면 재전송됩니다. 전송 중인 fingerprint는 예약되어 있어 동시에 들어온
//! 같은 요청은 억제됩니다.

use std::sync::Arc;

use tracing::{error, info, trace, warn};

use gatewatch_core::metrics as m;

use crate::alert::{AlertFormatter, fingerprint};
use crate::dedup::DedupStore;
use crate::dispatch::{Dispatcher, WebhookTransport};
use crate::filter::is_eligible;
use crate::parser::{AccessLogParser, EnvelopeDecoder};

/// 메시지 한 건의 처리 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// 엔벨로프 JSON 디코딩 실패
    DecodeFailed,
    /// 액세스 로그 형식 불일치
    Malformed,
    /// 알림 대상 상태 코드가 아님
    NotEligible,
    /// 유효 기간 안에 이미 알림을 보냄
    Suppressed,
    /// 알림 전송 성공. `cached`는 중복 제거 기록 성공 여부
    Dispatched {
        /// 캐시 기록 성공 여부
        cached: bool,
    },
    /// 알림 전송 실패
    DeliveryFailed,
}

/// 알림 처리기
///
/// 모든 파티션 워커가 `Arc`로 공유합니다. 내부 가변 상태는 중복 제거 저장소뿐입니다.
pub struct AlertProcessor<T: WebhookTransport> {
    decoder: EnvelopeDecoder,
    parser: AccessLogParser,
    formatter: AlertFormatter,
    mention: String,
    store: Arc<dyn DedupStore>,
    dispatcher: Arc<Dispatcher<T>>,
}

impl<T: WebhookTransport> AlertProcessor<T> {
    /// 새 처리기를 생성합니다.
    pub fn new(
        formatter: AlertFormatter,
        mention: impl Into<String>,
        store: Arc<dyn DedupStore>,
        dispatcher: Arc<Dispatcher<T>>,
    ) -> Self {
        Self {
            decoder: EnvelopeDecoder::new(),
            parser: AccessLogParser::new(),
            formatter,
            mention: mention.into(),
            store,
            dispatcher,
        }
    }

    /// 엔벨로프 디코더를 교체합니다.
    pub fn with_decoder(mut self, decoder: EnvelopeDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// 공유 중복 제거 저장소
    pub fn store(&self) -> &Arc<dyn DedupStore> {
        &self.store
    }

    /// 메시지 한 건을 처리합니다.
    pub async fn process(&self, payload: &[u8]) -> ProcessOutcome {
        let envelope = match self.decoder.decode(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "failed to decode envelope"
                );
                metrics::counter!(m::DECODE_ERRORS_TOTAL).increment(1);
                return ProcessOutcome::DecodeFailed;
            }
        };

        let request = match self.parser.extract(&envelope.message) {
            Ok(request) => request,
            Err(reason) => {
                info!(reason = %reason, line = %envelope.message, "skipping malformed access log");
                metrics::counter!(m::MALFORMED_TOTAL).increment(1);
                return ProcessOutcome::Malformed;
            }
        };

        if !is_eligible(request.status_code) {
            trace!(status = %request.status, "status not eligible for alerting");
            return ProcessOutcome::NotEligible;
        }

        let fp = fingerprint(&request.client_ip, &request.url);
        if !self.store.try_reserve(&fp) {
            info!(
                fingerprint = %fp,
                client_ip = %request.client_ip,
                url = %request.url,
                "alert suppressed by dedup cache"
            );
            metrics::counter!(m::ALERTS_SUPPRESSED_TOTAL).increment(1);
            return ProcessOutcome::Suppressed;
        }

        let message = self.formatter.format(&request);
        match self.dispatcher.dispatch(&message, &self.mention).await {
            Ok(endpoint) => {
                info!(
                    fingerprint = %fp,
                    endpoint = %endpoint,
                    status = %request.status,
                    url = %request.url,
                    "alert dispatched"
                );
                metrics::counter!(m::ALERTS_DISPATCHED_TOTAL).increment(1);
            }
            Err(e) => {
                self.store.release(&fp);
                error!(fingerprint = %fp, error = %e, "alert delivery failed");
                metrics::counter!(m::DISPATCH_FAILURES_TOTAL).increment(1);
                return ProcessOutcome::DeliveryFailed;
            }
        }

        let cached = match self.store.record(&fp) {
            Ok(()) => true,
            Err(e) => {
                warn!(fingerprint = %fp, error = %e, "failed to record alert in dedup cache");
                metrics::counter!(m::CACHE_WRITE_ERRORS_TOTAL).increment(1);
                false
            }
        };
        ProcessOutcome::Dispatched { cached }
    }
}
