#![no_main]

use libfuzzer_sys::fuzz_target;
use nested_validation::expand::expand;
use nested_validation::path::{flatten, resolve_attr_path, set_attr_path};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte picks the split between path and JSON document.
    let split = data[0] as usize % data.len();
    let (path_bytes, value_bytes) = data.split_at(split);
    let path = String::from_utf8_lossy(path_bytes);

    let Ok(serde_json::Value::Object(mut attrs)) = serde_json::from_slice(value_bytes) else {
        return;
    };

    let _ = flatten(&attrs);
    let _ = resolve_attr_path(&path, &attrs);
    for (leaf, _) in expand(&path, &attrs).leaves() {
        let _ = resolve_attr_path(leaf, &attrs);
    }
    let _ = set_attr_path(&path, &mut attrs, serde_json::Value::Null);
});
