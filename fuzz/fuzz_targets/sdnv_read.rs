#![no_main]

use libfuzzer_sys::fuzz_target;
use ferry_codec::sdnv;

fuzz_target!(|data: &[u8]| {
    let _ = sdnv::read(data, 0);
});
