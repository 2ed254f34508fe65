#![no_main]

use gatewatch_core::config::GatewatchConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        if let Ok(config) = GatewatchConfig::parse(content) {
            let _ = config.validate();
        }
    }
});
