//! HPACK header decoding.

use bytes::Bytes;

use super::context::HpackContext;
use super::error::{CodecError, HpackError};
use super::table::HeaderField;
use super::{integer, string};
use crate::metrics::{HPACK_BLOCKS_DECODED, HPACK_DECODE_ERRORS};

/// HPACK decoder.
pub struct HpackDecoder {
    /// Indexing context for the inbound direction.
    context: HpackContext,
    /// Maximum table size the peer may select (our SETTINGS_HEADER_TABLE_SIZE).
    max_table_size: usize,
    /// Our limit dropped below the size in use; the next block must open
    /// with a size update.
    update_required: bool,
    /// Limit on the decoded header list, in RFC 7541 size units.
    max_header_list_size: Option<usize>,
    /// Reusable destination for string literals.
    scratch: Vec<u8>,
}

impl Default for HpackDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HpackDecoder {
    /// Create a new HPACK decoder with default settings.
    pub fn new() -> Self {
        Self::with_table_size(super::DEFAULT_TABLE_SIZE)
    }

    /// Create a new HPACK decoder with a specific table size.
    pub fn with_table_size(size: usize) -> Self {
        Self {
            context: HpackContext::new(size),
            max_table_size: size,
            update_required: false,
            max_header_list_size: None,
            scratch: Vec::new(),
        }
    }

    /// Set the maximum table size the peer may use, i.e. the value we
    /// advertise in SETTINGS_HEADER_TABLE_SIZE.
    ///
    /// Lowering it below the size currently in use obliges the peer to
    /// open its next header block with a size update.
    pub fn set_max_table_size(&mut self, size: usize) {
        if size < self.context.max_size() {
            self.update_required = true;
        }
        self.max_table_size = size;
    }

    /// Limit the decoded header list size; `None` disables the check.
    pub fn set_max_header_list_size(&mut self, size: Option<usize>) {
        self.max_header_list_size = size;
    }

    /// The decoder's indexing context.
    pub fn context(&self) -> &HpackContext {
        &self.context
    }

    /// Decode an HPACK header block into a list of headers.
    ///
    /// Any error leaves the dynamic table in an unknown state relative to
    /// the peer; the connection must be closed with `COMPRESSION_ERROR`.
    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<HeaderField>, HpackError> {
        match self.decode_block(data) {
            Ok(headers) => {
                HPACK_BLOCKS_DECODED.increment();
                Ok(headers)
            }
            Err(e) => {
                HPACK_DECODE_ERRORS.increment();
                tracing::warn!(error = %e, len = data.len(), "failed to decode header block");
                Err(e)
            }
        }
    }

    fn decode_block(&mut self, data: &[u8]) -> Result<Vec<HeaderField>, HpackError> {
        let mut headers = Vec::new();
        let mut list_size = 0usize;
        let mut pos = 0;

        while pos < data.len() {
            let first_byte = data[pos];
            let src = &data[pos..];

            // Dynamic Table Size Update (Section 6.3)
            // Format: 001xxxxx
            if (first_byte & 0xe0) == 0x20 {
                if !headers.is_empty() {
                    return Err(CodecError::LateTableSizeUpdate.into());
                }
                pos += self.decode_table_size_update(src)?;
                continue;
            }

            if self.update_required {
                return Err(CodecError::MissingTableSizeUpdate.into());
            }

            let (header, consumed) = if first_byte & 0x80 != 0 {
                // Indexed Header Field (Section 6.1)
                // Format: 1xxxxxxx
                self.decode_indexed(src)?
            } else if first_byte & 0x40 != 0 {
                // Literal Header Field with Incremental Indexing (Section 6.2.1)
                // Format: 01xxxxxx
                let (header, consumed) = self.decode_literal(src, 6)?;
                self.context.register(header.name.clone(), header.value.clone());
                (header, consumed)
            } else {
                // Literal Header Field without Indexing (Section 6.2.2)
                // or Never Indexed (Section 6.2.3)
                // Format: 0000xxxx or 0001xxxx
                self.decode_literal(src, 4)?
            };
            pos += consumed;

            list_size += header.size();
            if let Some(limit) = self.max_header_list_size.filter(|&l| list_size > l) {
                return Err(CodecError::HeaderListTooLarge {
                    size: list_size,
                    limit,
                }
                .into());
            }

            headers.push(header);
        }

        Ok(headers)
    }

    /// Decode an indexed header field.
    fn decode_indexed(&self, data: &[u8]) -> Result<(HeaderField, usize), HpackError> {
        let (index, consumed) = integer::decode(data, 7)?;
        Ok((self.get_header(index)?, consumed))
    }

    /// Decode a literal header field; the caller decides whether to index.
    fn decode_literal(
        &mut self,
        data: &[u8],
        prefix_bits: u8,
    ) -> Result<(HeaderField, usize), HpackError> {
        let (name_index, mut consumed) = integer::decode(data, prefix_bits)?;

        let name = if name_index > 0 {
            self.get_header(name_index)?.name
        } else {
            let (name, c) = self.decode_string(&data[consumed..])?;
            consumed += c;
            name
        };

        let (value, c) = self.decode_string(&data[consumed..])?;
        consumed += c;

        Ok((HeaderField { name, value }, consumed))
    }

    /// Decode a dynamic table size update.
    fn decode_table_size_update(&mut self, data: &[u8]) -> Result<usize, HpackError> {
        let (new_size, consumed) = integer::decode(data, 5)?;

        if new_size > self.max_table_size {
            return Err(CodecError::InvalidTableSize {
                size: new_size,
                limit: self.max_table_size,
            }
            .into());
        }

        self.context.update_max_size(new_size);
        self.update_required = false;

        Ok(consumed)
    }

    /// Decode a string literal through the scratch buffer.
    fn decode_string(&mut self, data: &[u8]) -> Result<(Bytes, usize), HpackError> {
        let bound = string::decoded_len_bound(data)?;
        if self.scratch.len() < bound {
            self.scratch.resize(bound, 0);
        }

        let (consumed, written) = string::decode(data, &mut self.scratch[..bound])?;
        Ok((Bytes::copy_from_slice(&self.scratch[..written]), consumed))
    }

    /// Get a header from the static or dynamic table by index.
    fn get_header(&self, index: usize) -> Result<HeaderField, HpackError> {
        if index == 0 {
            return Err(CodecError::InvalidIndex(0).into());
        }

        self.context
            .try_get_entry(index)
            .ok_or_else(|| CodecError::InvalidIndex(index).into())
    }
}
