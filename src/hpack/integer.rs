//! HPACK integer representation (RFC 7541 Section 5.1).
//!
//! ```text
//!   0   1   2   3   4   5   6   7
//! +---+---+---+---+---+---+---+---+
//! | ? | ? | ? | 1   1   1   1   1 |
//! +---+---+---+-------------------+
//! | 1 |    Value-(2^N-1) LSB      |
//! +---+---------------------------+
//!                ...
//! +---+---------------------------+
//! | 0 |    Value-(2^N-1) MSB      |
//! +---+---------------------------+
//! ```

use super::error::{CodecError, HpackError};

/// Maximum number of continuation octets accepted when decoding. Five
/// octets carry 35 bits, well past any table size or string length a peer
/// can legitimately send.
pub const MAX_CONTINUATION_OCTETS: usize = 5;

/// Number of octets needed to encode `value` with an N-bit prefix.
pub fn encoded_len(mut value: usize, prefix_bits: u8) -> usize {
    let max_prefix = (1usize << prefix_bits) - 1;
    if value < max_prefix {
        return 1;
    }
    value -= max_prefix;
    let mut len = 2;
    while value >= 128 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Encode `value` with an N-bit prefix into `dst`.
///
/// `flags` supplies the bits above the prefix in the first octet (the
/// representation type). Returns the number of octets written.
pub fn encode(
    mut value: usize,
    prefix_bits: u8,
    flags: u8,
    dst: &mut [u8],
) -> Result<usize, HpackError> {
    debug_assert!((1..=8).contains(&prefix_bits));

    let needed = encoded_len(value, prefix_bits);
    if dst.len() < needed {
        return Err(HpackError::buffer(needed, dst.len()));
    }

    let max_prefix: usize = (1 << prefix_bits) - 1;

    if value < max_prefix {
        dst[0] = flags | value as u8;
        return Ok(1);
    }

    dst[0] = flags | max_prefix as u8;
    value -= max_prefix;
    let mut pos = 1;
    while value >= 128 {
        dst[pos] = (value % 128) as u8 | 0x80;
        value /= 128;
        pos += 1;
    }
    dst[pos] = value as u8;

    Ok(pos + 1)
}

/// Decode an integer with an N-bit prefix from the start of `src`.
///
/// Returns `(value, consumed)`. The bits above the prefix in the first octet
/// are ignored.
pub fn decode(src: &[u8], prefix_bits: u8) -> Result<(usize, usize), HpackError> {
    debug_assert!((1..=8).contains(&prefix_bits));

    let first = *src.first().ok_or(CodecError::Incomplete)?;

    let max_prefix = (1usize << prefix_bits) - 1;
    let mut value = first as usize & max_prefix;
    if value < max_prefix {
        return Ok((value, 1));
    }

    let overflow = CodecError::IntegerOverflow {
        max_octets: MAX_CONTINUATION_OCTETS,
    };

    let mut shift = 0u32;
    for (i, &byte) in src[1..].iter().enumerate() {
        if i == MAX_CONTINUATION_OCTETS {
            return Err(overflow.into());
        }

        let chunk = ((byte & 0x7f) as usize)
            .checked_shl(shift)
            .filter(|c| c >> shift == (byte & 0x7f) as usize)
            .ok_or(overflow)?;
        value = value.checked_add(chunk).ok_or(overflow)?;

        if byte & 0x80 == 0 {
            return Ok((value, i + 2));
        }
        shift += 7;
    }

    if src.len() - 1 >= MAX_CONTINUATION_OCTETS {
        return Err(overflow.into());
    }
    Err(CodecError::Incomplete.into())
}
