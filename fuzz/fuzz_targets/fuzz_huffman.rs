#![no_main]

use h2intercept::hpack::huffman;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary input must decode or fail cleanly.
    let mut out = vec![0u8; huffman::decoded_len_bound(data.len())];
    let _ = huffman::decode(data, &mut out);

    // Any octet string must survive encoding.
    let mut encoded = vec![0u8; huffman::encoded_len(data)];
    let n = huffman::encode(data, &mut encoded).expect("encode into exact buffer");
    let mut decoded = vec![0u8; huffman::decoded_len_bound(n)];
    let m = huffman::decode(&encoded[..n], &mut decoded).expect("decode own output");
    assert_eq!(&decoded[..m], data);
});
