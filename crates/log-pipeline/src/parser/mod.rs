//! 파싱 모듈 -- 엔벨로프 디코딩과 액세스 로그 필드 추출
//!
//! # 구성
//! - [`EnvelopeDecoder`]: 메시지 큐 바이트 -> [`LogEnvelope`](gatewatch_core::types::LogEnvelope)
//! - [`AccessLogParser`]: 엔벨로프의 `message` -> [`ExtractedRequest`](gatewatch_core::types::ExtractedRequest)
//!
//! # 사용 예시
//! ```ignore
//! use gatewatch_log_pipeline::parser::{AccessLogParser, EnvelopeDecoder};
//!
//! let envelope = EnvelopeDecoder::new().decode(payload)?;
//! match AccessLogParser::new().extract(&envelope.message) {
//!     Ok(request) => println!("{request}"),
//!     Err(malformed) => println!("skipped: {malformed}"),
//! }
//! ```

pub mod access_log;
pub mod envelope;

pub use access_log::{AccessLogParser, Malformed};
pub use envelope::EnvelopeDecoder;
