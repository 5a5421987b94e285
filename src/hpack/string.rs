//! HPACK string literal representation (RFC 7541 Section 5.2).
//!
//! ```text
//!   0   1   2   3   4   5   6   7
//! +---+---+---+---+---+---+---+---+
//! | H |    String Length (7+)     |
//! +---+---------------------------+
//! |  String Data (Length octets)  |
//! +-------------------------------+
//! ```

use super::error::{CodecError, HpackError};
use super::{huffman, integer};

const HUFFMAN_FLAG: u8 = 0x80;

/// Number of octets `encode` writes for `data`.
pub fn encoded_len(data: &[u8], use_huffman: bool) -> usize {
    let body = body_len(data, use_huffman).0;
    integer::encoded_len(body, 7) + body
}

/// Encode a string literal into `dst`.
///
/// With `use_huffman` set the Huffman form is chosen when it is strictly
/// shorter than the raw octets. Returns the number of octets written.
pub fn encode(data: &[u8], use_huffman: bool, dst: &mut [u8]) -> Result<usize, HpackError> {
    let (body, huffman) = body_len(data, use_huffman);
    let needed = integer::encoded_len(body, 7) + body;
    if dst.len() < needed {
        return Err(HpackError::buffer(needed, dst.len()));
    }

    if huffman {
        let n = integer::encode(body, 7, HUFFMAN_FLAG, dst)?;
        let m = huffman::encode(data, &mut dst[n..])?;
        Ok(n + m)
    } else {
        let n = integer::encode(body, 7, 0x00, dst)?;
        dst[n..n + body].copy_from_slice(data);
        Ok(n + body)
    }
}

/// Decode a string literal from the start of `src` into `dst`.
///
/// Returns `(consumed, written)`: octets read from `src` and octets of
/// decoded string placed in `dst`.
pub fn decode(src: &[u8], dst: &mut [u8]) -> Result<(usize, usize), HpackError> {
    let (length, header) = decode_header(src)?;
    let body = &src[header.consumed..header.consumed + length];

    let written = if header.huffman {
        huffman::decode(body, dst)?
    } else {
        if dst.len() < length {
            return Err(HpackError::buffer(length, dst.len()));
        }
        dst[..length].copy_from_slice(body);
        length
    };

    Ok((header.consumed + length, written))
}

/// Worst-case decoded length of the literal at the start of `src`, used to
/// size the destination for [`decode`].
pub fn decoded_len_bound(src: &[u8]) -> Result<usize, HpackError> {
    let (length, header) = decode_header(src)?;
    Ok(if header.huffman {
        huffman::decoded_len_bound(length)
    } else {
        length
    })
}

struct LiteralHeader {
    huffman: bool,
    consumed: usize,
}

/// Parse the length prefix and check that the body is present.
fn decode_header(src: &[u8]) -> Result<(usize, LiteralHeader), HpackError> {
    let first = *src.first().ok_or(CodecError::Incomplete)?;
    let (length, consumed) = integer::decode(src, 7)?;

    if src.len() - consumed < length {
        return Err(CodecError::Incomplete.into());
    }

    Ok((
        length,
        LiteralHeader {
            huffman: first & HUFFMAN_FLAG != 0,
            consumed,
        },
    ))
}

fn body_len(data: &[u8], use_huffman: bool) -> (usize, bool) {
    if use_huffman {
        let huffman_len = huffman::encoded_len(data);
        if huffman_len < data.len() {
            return (huffman_len, true);
        }
    }
    (data.len(), false)
}
