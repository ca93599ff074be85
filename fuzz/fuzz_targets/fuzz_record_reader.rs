// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for framing logical records out of raw segment bytes

#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use logspool_segment::{decode, RecordReader};

fuzz_target!(|data: &[u8]| {
    let mut reader = RecordReader::new(Cursor::new(data));
    let mut returned = 0u64;
    while let Ok(Some(record)) = reader.next_record() {
        returned += 1;
        if decode(&record).is_err() {
            reader.unjoin();
        }
    }
    assert!(reader.records_read() <= returned);
});
