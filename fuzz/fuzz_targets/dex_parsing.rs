#![no_main]

use dc_analysis::report::{self, Options};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(dex) = dc_dex::parse(data) {
        let _ = report::build(&dex, &Options::sequential());
    }
});
