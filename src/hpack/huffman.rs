//! Huffman coding for HPACK string literals (RFC 7541 Appendix B).
//!
//! Encoding concatenates the canonical codes MSB-first and pads the final
//! octet with the most significant bits of EOS (all ones).
//!
//! Decoding walks a trie whose nodes are indexed by a whole input octet, so a
//! short code resolves in a single lookup. The octet window is taken at an
//! arbitrary bit offset: after a leaf the cursor advances by the code's
//! remaining length, not by a full octet.

use std::sync::OnceLock;

use super::error::{CodecError, HpackError};

/// Symbol index of the end-of-string marker.
pub const EOS: usize = 256;

/// Canonical codes `(code, bit_length)`, indexed by symbol; EOS is last.
static TABLE: [(u32, u8); 257] = [
    (0x1ff8, 13), (0x7fffd8, 23), (0xfffffe2, 28), (0xfffffe3, 28),
    (0xfffffe4, 28), (0xfffffe5, 28), (0xfffffe6, 28), (0xfffffe7, 28),
    (0xfffffe8, 28), (0xffffea, 24), (0x3ffffffc, 30), (0xfffffe9, 28),
    (0xfffffea, 28), (0x3ffffffd, 30), (0xfffffeb, 28), (0xfffffec, 28),
    (0xfffffed, 28), (0xfffffee, 28), (0xfffffef, 28), (0xffffff0, 28),
    (0xffffff1, 28), (0xffffff2, 28), (0x3ffffffe, 30), (0xffffff3, 28),
    (0xffffff4, 28), (0xffffff5, 28), (0xffffff6, 28), (0xffffff7, 28),
    (0xffffff8, 28), (0xffffff9, 28), (0xffffffa, 28), (0xffffffb, 28),
    (0x14, 6), (0x3f8, 10), (0x3f9, 10), (0xffa, 12),
    (0x1ff9, 13), (0x15, 6), (0xf8, 8), (0x7fa, 11),
    (0x3fa, 10), (0x3fb, 10), (0xf9, 8), (0x7fb, 11),
    (0xfa, 8), (0x16, 6), (0x17, 6), (0x18, 6),
    (0x0, 5), (0x1, 5), (0x2, 5), (0x19, 6),
    (0x1a, 6), (0x1b, 6), (0x1c, 6), (0x1d, 6),
    (0x1e, 6), (0x1f, 6), (0x5c, 7), (0xfb, 8),
    (0x7ffc, 15), (0x20, 6), (0xffb, 12), (0x3fc, 10),
    (0x1ffa, 13), (0x21, 6), (0x5d, 7), (0x5e, 7),
    (0x5f, 7), (0x60, 7), (0x61, 7), (0x62, 7),
    (0x63, 7), (0x64, 7), (0x65, 7), (0x66, 7),
    (0x67, 7), (0x68, 7), (0x69, 7), (0x6a, 7),
    (0x6b, 7), (0x6c, 7), (0x6d, 7), (0x6e, 7),
    (0x6f, 7), (0x70, 7), (0x71, 7), (0x72, 7),
    (0xfc, 8), (0x73, 7), (0xfd, 8), (0x1ffb, 13),
    (0x7fff0, 19), (0x1ffc, 13), (0x3ffc, 14), (0x22, 6),
    (0x7ffd, 15), (0x3, 5), (0x23, 6), (0x4, 5),
    (0x24, 6), (0x5, 5), (0x25, 6), (0x26, 6),
    (0x27, 6), (0x6, 5), (0x74, 7), (0x75, 7),
    (0x28, 6), (0x29, 6), (0x2a, 6), (0x7, 5),
    (0x2b, 6), (0x76, 7), (0x2c, 6), (0x8, 5),
    (0x9, 5), (0x2d, 6), (0x77, 7), (0x78, 7),
    (0x79, 7), (0x7a, 7), (0x7b, 7), (0x7ffe, 15),
    (0x7fc, 11), (0x3ffd, 14), (0x1ffd, 13), (0xffffffc, 28),
    (0xfffe6, 20), (0x3fffd2, 22), (0xfffe7, 20), (0xfffe8, 20),
    (0x3fffd3, 22), (0x3fffd4, 22), (0x3fffd5, 22), (0x7fffd9, 23),
    (0x3fffd6, 22), (0x7fffda, 23), (0x7fffdb, 23), (0x7fffdc, 23),
    (0x7fffdd, 23), (0x7fffde, 23), (0xffffeb, 24), (0x7fffdf, 23),
    (0xffffec, 24), (0xffffed, 24), (0x3fffd7, 22), (0x7fffe0, 23),
    (0xffffee, 24), (0x7fffe1, 23), (0x7fffe2, 23), (0x7fffe3, 23),
    (0x7fffe4, 23), (0x1fffdc, 21), (0x3fffd8, 22), (0x7fffe5, 23),
    (0x3fffd9, 22), (0x7fffe6, 23), (0x7fffe7, 23), (0xffffef, 24),
    (0x3fffda, 22), (0x1fffdd, 21), (0xfffe9, 20), (0x3fffdb, 22),
    (0x3fffdc, 22), (0x7fffe8, 23), (0x7fffe9, 23), (0x1fffde, 21),
    (0x7fffea, 23), (0x3fffdd, 22), (0x3fffde, 22), (0xfffff0, 24),
    (0x1fffdf, 21), (0x3fffdf, 22), (0x7fffeb, 23), (0x7fffec, 23),
    (0x1fffe0, 21), (0x1fffe1, 21), (0x3fffe0, 22), (0x1fffe2, 21),
    (0x7fffed, 23), (0x3fffe1, 22), (0x7fffee, 23), (0x7fffef, 23),
    (0xfffea, 20), (0x3fffe2, 22), (0x3fffe3, 22), (0x3fffe4, 22),
    (0x7ffff0, 23), (0x3fffe5, 22), (0x3fffe6, 22), (0x7ffff1, 23),
    (0x3ffffe0, 26), (0x3ffffe1, 26), (0xfffeb, 20), (0x7fff1, 19),
    (0x3fffe7, 22), (0x7ffff2, 23), (0x3fffe8, 22), (0x1ffffec, 25),
    (0x3ffffe2, 26), (0x3ffffe3, 26), (0x3ffffe4, 26), (0x7ffffde, 27),
    (0x7ffffdf, 27), (0x3ffffe5, 26), (0xfffff1, 24), (0x1ffffed, 25),
    (0x7fff2, 19), (0x1fffe3, 21), (0x3ffffe6, 26), (0x7ffffe0, 27),
    (0x7ffffe1, 27), (0x3ffffe7, 26), (0x7ffffe2, 27), (0xfffff2, 24),
    (0x1fffe4, 21), (0x1fffe5, 21), (0x3ffffe8, 26), (0x3ffffe9, 26),
    (0xffffffd, 28), (0x7ffffe3, 27), (0x7ffffe4, 27), (0x7ffffe5, 27),
    (0xfffec, 20), (0xfffff3, 24), (0xfffed, 20), (0x1fffe6, 21),
    (0x3fffe9, 22), (0x1fffe7, 21), (0x1fffe8, 21), (0x7ffff3, 23),
    (0x3fffea, 22), (0x3fffeb, 22), (0x1ffffee, 25), (0x1ffffef, 25),
    (0xfffff4, 24), (0xfffff5, 24), (0x3ffffea, 26), (0x7ffff4, 23),
    (0x3ffffeb, 26), (0x7ffffe6, 27), (0x3ffffec, 26), (0x3ffffed, 26),
    (0x7ffffe7, 27), (0x7ffffe8, 27), (0x7ffffe9, 27), (0x7ffffea, 27),
    (0x7ffffeb, 27), (0xffffffe, 28), (0x7ffffec, 27), (0x7ffffed, 27),
    (0x7ffffee, 27), (0x7ffffef, 27), (0x7fffff0, 27), (0x3ffffee, 26),
    (0x3fffffff, 30),
];

/// Returns the canonical `(code, bit_length)` for a symbol (0-255 or [`EOS`]).
pub fn code(symbol: usize) -> Option<(u32, u8)> {
    TABLE.get(symbol).copied()
}

/// Exact length in octets of the Huffman encoding of `src`.
pub fn encoded_len(src: &[u8]) -> usize {
    let bits: usize = src.iter().map(|&b| TABLE[b as usize].1 as usize).sum();
    bits.div_ceil(8)
}

/// Upper bound on the decoded length of `encoded_len` octets of Huffman
/// data. The shortest code is 5 bits.
pub fn decoded_len_bound(encoded_len: usize) -> usize {
    encoded_len * 8 / 5
}

/// Huffman-encode `src` into `dst`, returning the number of octets written.
pub fn encode(src: &[u8], dst: &mut [u8]) -> Result<usize, HpackError> {
    let needed = encoded_len(src);
    if dst.len() < needed {
        return Err(HpackError::buffer(needed, dst.len()));
    }

    // At most 7 + 30 bits are pending, so the low bits of a u64 suffice.
    let mut acc: u64 = 0;
    let mut pending: u32 = 0;
    let mut pos = 0;

    for &byte in src {
        let (code, len) = TABLE[byte as usize];
        acc = (acc << len) | code as u64;
        pending += len as u32;

        while pending >= 8 {
            pending -= 8;
            dst[pos] = (acc >> pending) as u8;
            pos += 1;
        }
    }

    if pending > 0 {
        let pad = 8 - pending;
        dst[pos] = ((acc << pad) as u8) | ((1u8 << pad) - 1);
        pos += 1;
    }

    debug_assert_eq!(pos, needed);
    Ok(pos)
}

/// Decode Huffman data from `src` into `dst`, returning the number of
/// symbols written.
pub fn decode(src: &[u8], dst: &mut [u8]) -> Result<usize, HpackError> {
    let trie = trie();
    let total_bits = src.len() * 8;

    let mut cursor = 0usize;
    let mut symbol_start = 0usize;
    let mut node = 0usize;
    let mut written = 0usize;

    while cursor < total_bits {
        let available = total_bits - cursor;
        let window = peek_octet(src, cursor);

        match trie.nodes[node][window as usize] {
            Slot::Leaf { symbol, bits } => {
                if bits as usize > available {
                    break;
                }
                if symbol as usize == EOS {
                    return Err(CodecError::HuffmanEos.into());
                }
                if written == dst.len() {
                    return Err(HpackError::buffer(written + 1, dst.len()));
                }
                dst[written] = symbol as u8;
                written += 1;
                cursor += bits as usize;
                symbol_start = cursor;
                node = 0;
            }
            Slot::Branch(next) => {
                if available < 8 {
                    break;
                }
                node = next as usize;
                cursor += 8;
            }
            Slot::Empty => return Err(CodecError::InvalidHuffmanCode.into()),
        }
    }

    // Whatever did not resolve must be at most 7 bits of EOS prefix.
    let padding = total_bits - symbol_start;
    if padding > 7 {
        return Err(CodecError::InvalidHuffmanPadding.into());
    }
    if padding > 0 {
        let mask = (1u8 << padding) - 1;
        if src[src.len() - 1] & mask != mask {
            return Err(CodecError::InvalidHuffmanPadding.into());
        }
    }

    Ok(written)
}

/// The eight bits starting at `cursor`, filled with ones past the end.
#[inline]
fn peek_octet(src: &[u8], cursor: usize) -> u8 {
    let index = cursor / 8;
    let offset = cursor % 8;
    let hi = src[index] as u16;
    let lo = src.get(index + 1).copied().unwrap_or(0xff) as u16;
    (((hi << 8) | lo) >> (8 - offset)) as u8
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Empty,
    /// A symbol whose code ends `bits` bits into this node's window.
    Leaf { symbol: u16, bits: u8 },
    /// The code continues past this window; index of the next node.
    Branch(u16),
}

/// Decoding trie stored as an arena of 256-wide nodes. Node 0 is the root.
struct Trie {
    nodes: Vec<[Slot; 256]>,
}

static TRIE: OnceLock<Trie> = OnceLock::new();

fn trie() -> &'static Trie {
    TRIE.get_or_init(Trie::build)
}

impl Trie {
    fn build() -> Self {
        let mut nodes = vec![[Slot::Empty; 256]];

        for (symbol, &(code, len)) in TABLE.iter().enumerate() {
            let mut node = 0usize;
            let mut remaining = len as u32;

            while remaining > 8 {
                remaining -= 8;
                let octet = ((code >> remaining) & 0xff) as usize;
                node = match nodes[node][octet] {
                    Slot::Branch(next) => next as usize,
                    Slot::Empty | Slot::Leaf { .. } => {
                        nodes.push([Slot::Empty; 256]);
                        let next = nodes.len() - 1;
                        nodes[node][octet] = Slot::Branch(next as u16);
                        next
                    }
                };
            }

            // The last 1..=8 bits occupy the top of the window; every
            // completion of the low bits maps to the same leaf.
            let suffix = (code & ((1 << remaining) - 1)) as usize;
            let first = suffix << (8 - remaining);
            let span = 1usize << (8 - remaining);
            for slot in &mut nodes[node][first..first + span] {
                *slot = Slot::Leaf {
                    symbol: symbol as u16,
                    bits: remaining as u8,
                };
            }
        }

        tracing::trace!(nodes = nodes.len(), "built huffman decoding trie");
        Self { nodes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_vec(src: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; encoded_len(src)];
        let n = encode(src, &mut buf).unwrap();
        buf.truncate(n);
        buf
    }

    fn decode_vec(src: &[u8]) -> Result<Vec<u8>, HpackError> {
        let mut buf = vec![0u8; decoded_len_bound(src.len())];
        let n = decode(src, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    #[test]
    fn test_rfc_examples() {
        // RFC 7541 C.4.1
        assert_eq!(
            encode_vec(b"www.example.com"),
            [0xf1, 0xe3, 0xc2, 0xe5, 0xf2, 0x3a, 0x6b, 0xa0, 0xab, 0x90, 0xf4, 0xff]
        );
        // RFC 7541 C.4.2
        assert_eq!(encode_vec(b"no-cache"), [0xa8, 0xeb, 0x10, 0x64, 0x9c, 0xbf]);
        // RFC 7541 C.6.1
        assert_eq!(encode_vec(b"302"), [0x64, 0x02]);
    }

    #[test]
    fn test_decode_rfc_example() {
        let data = [0xa8, 0xeb, 0x10, 0x64, 0x9c, 0xbf];
        assert_eq!(decode_vec(&data).unwrap(), b"no-cache");
    }

    #[test]
    fn test_roundtrip_printable() {
        let input: Vec<u8> = (0x20u8..0x7f).collect();
        assert_eq!(decode_vec(&encode_vec(&input)).unwrap(), input);
    }

    #[test]
    fn test_roundtrip_all_bytes() {
        let input: Vec<u8> = (0u8..=255).rev().collect();
        assert_eq!(decode_vec(&encode_vec(&input)).unwrap(), input);
    }

    #[test]
    fn test_empty() {
        assert_eq!(encoded_len(b""), 0);
        assert!(encode_vec(b"").is_empty());
        assert!(decode_vec(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_encode_buffer_too_small() {
        let mut buf = [0u8; 2];
        let err = encode(b"www.example.com", &mut buf).unwrap_err();
        assert_eq!(err, HpackError::BufferTooSmall { needed: 12, available: 2 });
    }

    #[test]
    fn test_decode_buffer_too_small() {
        let encoded = encode_vec(b"no-cache");
        let mut buf = [0u8; 3];
        assert!(matches!(
            decode(&encoded, &mut buf),
            Err(HpackError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn test_padding_too_long() {
        // '0' is 00000; a full octet of ones after it is 8 bits of padding.
        let err = decode_vec(&[0x07, 0xff]).unwrap_err();
        assert_eq!(err, HpackError::Codec(CodecError::InvalidHuffmanPadding));
    }

    #[test]
    fn test_padding_not_ones() {
        // '0' followed by three zero bits.
        let err = decode_vec(&[0x00]).unwrap_err();
        assert_eq!(err, HpackError::Codec(CodecError::InvalidHuffmanPadding));
    }

    #[test]
    fn test_eos_rejected() {
        // 30 ones followed by two bits of padding.
        let err = decode_vec(&[0xff, 0xff, 0xff, 0xff]).unwrap_err();
        assert_eq!(err, HpackError::Codec(CodecError::HuffmanEos));
    }

    #[test]
    fn test_unaligned_long_codes() {
        // 'a' (5 bits) shifts every following 28-bit code off the octet
        // boundary.
        let input = [b'a', 0x02, b'a', 0x03, 0x7f, b'a'];
        assert_eq!(decode_vec(&encode_vec(&input)).unwrap(), input);
    }

    #[test]
    fn test_code_lookup() {
        assert_eq!(code(b'a' as usize), Some((0x3, 5)));
        assert_eq!(code(EOS), Some((0x3fffffff, 30)));
        assert_eq!(code(257), None);
    }
}
