//! HPACK errors.

/// A wire-format violation by the peer.
///
/// Every variant is fatal for the connection: once a header block fails to
/// decode, the compression state can no longer be trusted and the connection
/// must be torn down with `COMPRESSION_ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The bits do not resolve to a Huffman symbol.
    #[error("invalid Huffman code")]
    InvalidHuffmanCode,
    /// Trailing bits are longer than 7 or not a prefix of EOS.
    #[error("invalid Huffman padding")]
    InvalidHuffmanPadding,
    /// The EOS symbol was decoded inside a string literal.
    #[error("EOS symbol in Huffman string literal")]
    HuffmanEos,
    /// An integer used more continuation octets than allowed.
    #[error("HPACK integer exceeds {max_octets} continuation octets")]
    IntegerOverflow { max_octets: usize },
    /// The header block ended in the middle of a representation.
    #[error("incomplete HPACK data")]
    Incomplete,
    /// An index that resolves to neither table.
    #[error("invalid table index: {0}")]
    InvalidIndex(usize),
    /// A dynamic table size update above the advertised limit.
    #[error("table size update {size} exceeds limit {limit}")]
    InvalidTableSize { size: usize, limit: usize },
    /// A dynamic table size update after the first header field of a block.
    #[error("table size update after header field")]
    LateTableSizeUpdate,
    /// The peer did not acknowledge a lowered table size limit.
    #[error("missing required table size update")]
    MissingTableSizeUpdate,
    /// The decoded header list exceeds the configured maximum.
    #[error("header list size {size} exceeds limit {limit}")]
    HeaderListTooLarge { size: usize, limit: usize },
}

/// HPACK encoding/decoding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HpackError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The caller-supplied buffer cannot hold the result. Nothing was
    /// truncated; retry with at least `needed` bytes.
    #[error("buffer too small: need {needed} bytes, {available} available")]
    BufferTooSmall { needed: usize, available: usize },
}

impl HpackError {
    pub(crate) fn buffer(needed: usize, available: usize) -> Self {
        HpackError::BufferTooSmall { needed, available }
    }

    /// Rebase a sizing error raised on `&mut dst[offset..]` onto `dst`.
    pub(crate) fn at_offset(self, offset: usize) -> Self {
        match self {
            HpackError::BufferTooSmall { needed, available } => HpackError::BufferTooSmall {
                needed: needed + offset,
                available: available + offset,
            },
            other => other,
        }
    }

    /// Whether this error must terminate the connection.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, HpackError::Codec(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_error_display() {
        assert_eq!(CodecError::InvalidIndex(999).to_string(), "invalid table index: 999");
        assert_eq!(CodecError::Incomplete.to_string(), "incomplete HPACK data");
        assert_eq!(
            CodecError::InvalidTableSize { size: 8192, limit: 4096 }.to_string(),
            "table size update 8192 exceeds limit 4096"
        );
    }

    #[test]
    fn test_buffer_too_small_display() {
        let err = HpackError::buffer(10, 4);
        assert_eq!(err.to_string(), "buffer too small: need 10 bytes, 4 available");
    }

    #[test]
    fn test_fatality() {
        assert!(HpackError::from(CodecError::HuffmanEos).is_connection_fatal());
        assert!(!HpackError::buffer(1, 0).is_connection_fatal());
    }

    #[test]
    fn test_codec_display_is_transparent() {
        let err = HpackError::from(CodecError::InvalidHuffmanPadding);
        assert_eq!(err.to_string(), "invalid Huffman padding");
    }
}
