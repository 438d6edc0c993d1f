#![no_main]

use libfuzzer_sys::fuzz_target;
use nested_validation::path::{extract_indices, is_nested_attr, strip_indices, without_brackets};

fuzz_target!(|data: &[u8]| {
    let path = String::from_utf8_lossy(data);

    let _ = extract_indices(&path);
    let _ = is_nested_attr(&path);
    let _ = without_brackets(&path);

    let stripped = strip_indices(&path);
    assert_eq!(
        strip_indices(&stripped),
        stripped,
        "strip_indices is not idempotent for {:?}",
        path
    );
});
