#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::Map;

fuzz_target!(|data: &[u8]| {
    let s = String::from_utf8_lossy(data);
    if let Ok(rules) = nested_validation::parse_rules(&s) {
        // Compiling may reject the rules, but must not panic.
        let _ = nested_validation::check(rules, Map::new());
    }
});
