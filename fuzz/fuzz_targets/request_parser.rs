#![no_main]

use exptest::config::EngineConfig;
use exptest::request::AnalysisRequest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Parsing and running must return errors, never panic
        if let Ok(request) = AnalysisRequest::from_json(input) {
            let config = EngineConfig {
                simulation_draws: 1_000,
                ..EngineConfig::default()
            };
            let _ = request.run(&config);
        }
    }
});
