//! HTTP/2 frame codec (RFC 9113 Section 4).
//!
//! HTTP/2 frames have a common 9-byte header:
//! ```text
//! +-----------------------------------------------+
//! |                 Length (24)                   |
//! +---------------+---------------+---------------+
//! |   Type (8)    |   Flags (8)   |
//! +-+-------------+---------------+-------------------------------+
//! |R|                 Stream Identifier (31)                      |
//! +=+=============================================================+
//! |                   Frame Payload (0...)                      ...
//! +---------------------------------------------------------------+
//! ```

mod decode;
mod encode;
mod error;
mod types;

pub use decode::{FrameDecoder, read_frame, read_header};
pub(crate) use decode::validate_setting;
pub use encode::{
    FrameEncoder, write_continuation, write_data, write_frame, write_goaway, write_header,
    write_headers, write_ping, write_priority, write_push_promise, write_rst_stream,
    write_settings, write_unknown, write_window_update,
};
pub use error::{ErrorCode, FrameError};
pub use types::*;

/// Largest payload the 24-bit length field can carry (2^24 - 1).
pub const MAX_FRAME_SIZE: u32 = 16_777_215;

/// Default maximum frame size (16 KB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16_384;

/// Frame header size in bytes.
pub const FRAME_HEADER_SIZE: usize = 9;

/// Connection preface sent by clients.
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Default initial window size for flow control.
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65_535;

/// Largest legal flow-control window (2^31 - 1).
pub const MAX_WINDOW_SIZE: u32 = 0x7FFF_FFFF;

/// Default SETTINGS_HEADER_TABLE_SIZE.
pub const DEFAULT_HEADER_TABLE_SIZE: u32 = 4_096;
