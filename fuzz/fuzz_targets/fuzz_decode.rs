// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for segment line decoding

#![no_main]

use libfuzzer_sys::fuzz_target;
use logspool_segment::codec;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        // Malformed lines must come back as errors, never panics.
        if let Ok(record) = codec::decode(line) {
            // Whatever decodes must re-encode to exactly one line.
            let encoded = codec::encode(&record);
            assert_eq!(encoded.matches('\n').count(), 1);
        }
    }
});
