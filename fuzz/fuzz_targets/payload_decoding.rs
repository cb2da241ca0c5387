#![no_main]

//! Fuzz target for inbound payload decoding.
//!
//! Decoding either fails with a `DecodeError` or yields a raw record that
//! normalizes and re-encodes without panicking.

use libfuzzer_sys::fuzz_target;
use pokeproxy_core::codec::{decode_record, encode_record, normalize, PREVIEW_BYTES};

fuzz_target!(|data: &[u8]| {
    match decode_record(data) {
        Ok(raw) => {
            let record = normalize(&raw);
            let reencoded = encode_record(&record);
            let again = decode_record(&reencoded).map(|raw| normalize(&raw));
            assert_eq!(again.ok().as_ref(), Some(&record));
        },
        Err(e) => {
            assert!(e.preview.len() <= PREVIEW_BYTES * 2 + "...".len());
        },
    }
});
