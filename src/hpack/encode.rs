//! HPACK header encoding.

use bytes::Bytes;

use super::context::{HpackContext, TableMatch};
use super::error::HpackError;
use super::table::HeaderField;
use super::{integer, string};
use crate::metrics::HPACK_BLOCKS_ENCODED;

/// Indexed header field (Section 6.1): `1xxxxxxx`.
const INDEXED: u8 = 0x80;
/// Literal with incremental indexing (Section 6.2.1): `01xxxxxx`.
const INCREMENTAL: u8 = 0x40;
/// Dynamic table size update (Section 6.3): `001xxxxx`.
const SIZE_UPDATE: u8 = 0x20;
/// Literal never indexed (Section 6.2.3): `0001xxxx`.
const NEVER_INDEXED: u8 = 0x10;

/// Table size changes not yet signalled to the peer.
#[derive(Debug, Clone, Copy)]
struct PendingUpdate {
    smallest: usize,
    last: usize,
}

/// HPACK encoder.
pub struct HpackEncoder {
    /// Indexing context for the outbound direction.
    context: HpackContext,
    /// Whether to use Huffman encoding for strings.
    use_huffman: bool,
    /// Header names always sent as never-indexed literals.
    never_indexed: Vec<Bytes>,
    pending_update: Option<PendingUpdate>,
}

impl Default for HpackEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HpackEncoder {
    /// Create a new HPACK encoder with default settings.
    pub fn new() -> Self {
        Self::with_table_size(super::DEFAULT_TABLE_SIZE)
    }

    /// Create a new HPACK encoder with a specific table size.
    pub fn with_table_size(size: usize) -> Self {
        Self {
            context: HpackContext::new(size),
            use_huffman: true,
            never_indexed: Vec::new(),
            pending_update: None,
        }
    }

    /// Set whether to use Huffman encoding.
    pub fn set_huffman(&mut self, use_huffman: bool) {
        self.use_huffman = use_huffman;
    }

    /// Set the header names whose values must never enter a compression
    /// table, on either side of the connection.
    pub fn set_never_indexed<I, N>(&mut self, names: I)
    where
        I: IntoIterator<Item = N>,
        N: Into<Bytes>,
    {
        self.never_indexed = names.into_iter().map(Into::into).collect();
    }

    /// Apply a new dynamic table size, typically the peer's
    /// SETTINGS_HEADER_TABLE_SIZE. The change is signalled at the start of
    /// the next header block.
    pub fn update_max_size(&mut self, size: usize) {
        self.context.update_max_size(size);
        self.pending_update = Some(match self.pending_update {
            Some(p) => PendingUpdate {
                smallest: p.smallest.min(size),
                last: size,
            },
            None => PendingUpdate {
                smallest: size,
                last: size,
            },
        });
    }

    /// The encoder's indexing context.
    pub fn context(&self) -> &HpackContext {
        &self.context
    }

    /// Encode a list of headers into an HPACK header block.
    ///
    /// Returns the number of octets written to `dst`. On
    /// [`HpackError::BufferTooSmall`] the encoder state is left exactly as
    /// it was, so the block can be re-encoded into a larger buffer.
    pub fn encode(&mut self, headers: &[HeaderField], dst: &mut [u8]) -> Result<usize, HpackError> {
        let context = self.context.clone();
        let pending_update = self.pending_update;

        match self.encode_block(headers, dst) {
            Ok(n) => {
                HPACK_BLOCKS_ENCODED.increment();
                Ok(n)
            }
            Err(e) => {
                self.context = context;
                self.pending_update = pending_update;
                Err(e)
            }
        }
    }

    fn encode_block(
        &mut self,
        headers: &[HeaderField],
        dst: &mut [u8],
    ) -> Result<usize, HpackError> {
        let mut pos = 0;

        if let Some(update) = self.pending_update.take() {
            if update.smallest < update.last {
                pos += integer::encode(update.smallest, 5, SIZE_UPDATE, dst)?;
            }
            pos += integer::encode(update.last, 5, SIZE_UPDATE, &mut dst[pos..])
                .map_err(|e| e.at_offset(pos))?;
        }

        for header in headers {
            pos += self
                .encode_header(header, &mut dst[pos..])
                .map_err(|e| e.at_offset(pos))?;
        }

        Ok(pos)
    }

    /// Encode a single header field.
    fn encode_header(&mut self, header: &HeaderField, dst: &mut [u8]) -> Result<usize, HpackError> {
        let found = self.context.find(&header.name, &header.value);

        if self.is_never_indexed(&header.name) {
            let name_index = match found {
                Some(TableMatch::Full(idx) | TableMatch::Name(idx)) => idx,
                None => 0,
            };
            return self.encode_literal(name_index, header, 4, NEVER_INDEXED, dst);
        }

        match found {
            Some(TableMatch::Full(idx)) => integer::encode(idx, 7, INDEXED, dst),
            Some(TableMatch::Name(idx)) => {
                let n = self.encode_literal(idx, header, 6, INCREMENTAL, dst)?;
                self.context.register(header.name.clone(), header.value.clone());
                Ok(n)
            }
            None => {
                let n = self.encode_literal(0, header, 6, INCREMENTAL, dst)?;
                self.context.register(header.name.clone(), header.value.clone());
                Ok(n)
            }
        }
    }

    /// Encode a literal representation; a zero `name_index` carries the name
    /// as a string literal.
    fn encode_literal(
        &self,
        name_index: usize,
        header: &HeaderField,
        prefix_bits: u8,
        flags: u8,
        dst: &mut [u8],
    ) -> Result<usize, HpackError> {
        let mut pos = integer::encode(name_index, prefix_bits, flags, dst)?;

        if name_index == 0 {
            pos += string::encode(&header.name, self.use_huffman, &mut dst[pos..])
                .map_err(|e| e.at_offset(pos))?;
        }

        pos += string::encode(&header.value, self.use_huffman, &mut dst[pos..])
            .map_err(|e| e.at_offset(pos))?;

        Ok(pos)
    }

    fn is_never_indexed(&self, name: &[u8]) -> bool {
        self.never_indexed
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_vec(encoder: &mut HpackEncoder, headers: &[HeaderField]) -> Vec<u8> {
        let mut buf = vec![0u8; 4096];
        let n = encoder.encode(headers, &mut buf).unwrap();
        buf.truncate(n);
        buf
    }

    #[test]
    fn test_encode_indexed() {
        let mut encoder = HpackEncoder::new();
        encoder.set_huffman(false);

        let headers = [HeaderField::new(":method", "GET")];
        assert_eq!(encode_vec(&mut encoder, &headers), vec![0x82]);
    }

    #[test]
    fn test_encode_literal_new_name_registers() {
        // RFC 7541 C.3.1 style literal with new name
        let mut encoder = HpackEncoder::new();
        encoder.set_huffman(false);

        let headers = [HeaderField::new("custom-key", "custom-header")];
        let encoded = encode_vec(&mut encoder, &headers);
        assert_eq!(
            encoded,
            b"\x40\x0acustom-key\x0dcustom-header".to_vec()
        );
        assert_eq!(encoder.context().size(), 55);

        // Second time it is a dynamic table hit.
        assert_eq!(encode_vec(&mut encoder, &headers), vec![0xbe]);
    }

    #[test]
    fn test_encode_literal_indexed_name() {
        let mut encoder = HpackEncoder::new();
        encoder.set_huffman(false);

        let headers = [HeaderField::new(":path", "/sample/path")];
        let encoded = encode_vec(&mut encoder, &headers);
        assert_eq!(encoded, b"\x44\x0c/sample/path".to_vec());
    }

    #[test]
    fn test_encode_never_indexed() {
        let mut encoder = HpackEncoder::new();
        encoder.set_huffman(false);
        encoder.set_never_indexed(["authorization"]);

        let headers = [HeaderField::new("authorization", "secret")];
        let encoded = encode_vec(&mut encoder, &headers);
        // Name index 23 does not fit in 4 bits: 0x1f then 23 - 15 = 8.
        assert_eq!(encoded, b"\x1f\x08\x06secret".to_vec());
        assert_eq!(encoder.context().size(), 0);
    }

    #[test]
    fn test_table_size_update_emitted_once() {
        let mut encoder = HpackEncoder::new();
        encoder.update_max_size(256);

        let headers = [HeaderField::new(":method", "GET")];
        // 256 with a 5-bit prefix: 0x3f, 256 - 31 = 225 -> 0xe1 0x01
        assert_eq!(encode_vec(&mut encoder, &headers), vec![0x3f, 0xe1, 0x01, 0x82]);
        assert_eq!(encode_vec(&mut encoder, &headers), vec![0x82]);
    }

    #[test]
    fn test_table_size_update_smallest_then_last() {
        let mut encoder = HpackEncoder::new();
        encoder.update_max_size(0);
        encoder.update_max_size(30);

        assert_eq!(encode_vec(&mut encoder, &[]), vec![0x20, 0x3e]);
    }

    #[test]
    fn test_buffer_too_small_rolls_back() {
        let mut encoder = HpackEncoder::new();
        encoder.set_huffman(false);
        encoder.update_max_size(4096);

        let headers = [
            HeaderField::new("x-one", "1"),
            HeaderField::new("x-two", "a-much-longer-value"),
        ];

        let mut small = [0u8; 12];
        let err = encoder.encode(&headers, &mut small).unwrap_err();
        assert!(matches!(err, HpackError::BufferTooSmall { available: 12, .. }));
        assert_eq!(encoder.context().size(), 0);

        // Retrying still emits the size update and both literals.
        let mut buf = [0u8; 64];
        let n = encoder.encode(&headers, &mut buf).unwrap();
        assert_eq!(&buf[..3], &[0x3f, 0xe1, 0x1f]);
        assert_eq!(buf[3], 0x40);
        assert!(n > 12);
        assert_eq!(encoder.context().dynamic_table().len(), 2);
    }
}
