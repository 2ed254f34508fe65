#![no_main]

use gatewatch_log_pipeline::alert::AlertFormatter;
use gatewatch_log_pipeline::parser::AccessLogParser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        let parser = AccessLogParser::new();
        if let Ok(request) = parser.extract(line) {
            // 파싱된 상태 코드는 원본 토큰과 일치해야 함
            if let Some(code) = request.status_code {
                assert_eq!(request.status.parse::<i64>().ok(), Some(code));
            }
            let _ = AlertFormatter::default().format(&request);
        }
    }
});
