#![no_main]

use libfuzzer_sys::fuzz_target;
use strongman::config::ConfigLoader;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml) = std::str::from_utf8(data) {
        // Any outcome is fine as long as loading does not panic.
        let _ = ConfigLoader::new().load_str(yaml, "fuzz");
    }
});
