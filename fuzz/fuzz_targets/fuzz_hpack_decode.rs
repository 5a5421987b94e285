#![no_main]

use h2intercept::hpack::{HpackDecoder, HpackEncoder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = HpackDecoder::new();

    // Parse errors are expected for malformed input
    let Ok(headers) = decoder.decode(data) else {
        return;
    };

    // Roundtrip: indexing choices may differ, the header list may not.
    if !headers.is_empty() {
        let mut encoder = HpackEncoder::new();
        let bound: usize = headers.iter().map(|h| h.name.len() + h.value.len() + 16).sum();
        let mut encoded = vec![0u8; bound + 8];
        let n = encoder
            .encode(&headers, &mut encoded)
            .expect("encode decoded headers");

        let mut decoder2 = HpackDecoder::new();
        let decoded = decoder2.decode(&encoded[..n]).expect("decode re-encoded block");
        assert_eq!(headers, decoded, "roundtrip mismatch");
    }
});
