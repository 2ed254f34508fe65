#![no_main]

use gatewatch_log_pipeline::parser::{AccessLogParser, EnvelopeDecoder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let decoder = EnvelopeDecoder::new();
    if let Ok(envelope) = decoder.decode(data) {
        let _ = AccessLogParser::new().extract(&envelope.message);
    }
});
