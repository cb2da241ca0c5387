#![no_main]

//! Fuzz target for request signature verification.
//!
//! Arbitrary signature headers and secrets must never panic, and a mutated
//! signature must never verify.

use libfuzzer_sys::fuzz_target;
use pokeproxy_api::crypto::{sign_payload, verify_signature};

const SECRET: &str = "ZnV6ei1zZWNyZXQ=";

fuzz_target!(|data: &[u8]| {
    let split = data.len() / 2;
    let (header, body) = data.split_at(split);

    if let Ok(header) = std::str::from_utf8(header) {
        let _ = verify_signature(header, body, SECRET);
        let _ = verify_signature(SECRET, body, header);
    }

    if let Ok(signature) = sign_payload(body, SECRET) {
        assert!(verify_signature(&signature, body, SECRET));

        let mut flipped = signature.into_bytes();
        flipped[0] = if flipped[0] == b'0' { b'1' } else { b'0' };
        if let Ok(flipped) = String::from_utf8(flipped) {
            assert!(!verify_signature(&flipped, body, SECRET));
        }
    }
});
