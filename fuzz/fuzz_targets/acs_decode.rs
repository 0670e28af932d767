#![no_main]

use libfuzzer_sys::fuzz_target;
use ferry_codec::acs::parse_signal;

fuzz_target!(|data: &[u8]| {
    let _ = parse_signal(data);
});
