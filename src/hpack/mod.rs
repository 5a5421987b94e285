//! HPACK header compression (RFC 7541).
//!
//! HPACK is the header compression algorithm used by HTTP/2. It uses:
//! - A static table of 61 common header fields
//! - A dynamic table of recently used headers
//! - Huffman coding for string literals
//! - Variable-length integer encoding
//!
//! The primitives in [`integer`], [`string`] and [`huffman`] write into
//! caller-supplied fixed buffers and never grow them; a destination that is
//! too short yields [`HpackError::BufferTooSmall`].

mod context;
mod decode;
mod encode;
mod error;
pub mod huffman;
pub mod integer;
pub mod string;
mod table;

pub use context::{HpackContext, TableMatch};
pub use decode::HpackDecoder;
pub use encode::HpackEncoder;
pub use error::{CodecError, HpackError};
pub use table::{DynamicTable, ENTRY_OVERHEAD, HeaderField, StaticEntry, StaticTable};

/// Default dynamic table size (4096 bytes).
pub const DEFAULT_TABLE_SIZE: usize = 4096;
