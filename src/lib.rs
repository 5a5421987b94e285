//! h2intercept - HTTP/2 wire engine for an intercepting proxy.
//!
//! This crate holds the per-connection protocol machinery a proxy needs to
//! read, inspect and re-emit HTTP/2 traffic. It performs no I/O of its own:
//! the transport hands it byte buffers and it hands back frames, header
//! lists and send-window decisions.
//!
//! # Features
//!
//! - HPACK header compression with Huffman coding (RFC 7541)
//! - HTTP/2 frame encoding and decoding (RFC 9113)
//! - Send-side flow control shared between async writers
//! - SETTINGS negotiation wiring the above together
//!
//! # Architecture
//!
//! - `hpack`: Huffman codec, integer and string primitives, tables, encoder
//!   and decoder
//! - `frame`: frame types, fixed-buffer writers and readers, streaming decoder
//! - `flow_control`: send windows with cancellable async booking
//! - `settings`: local and peer SETTINGS
//! - `config`, `logging`, `metrics`: ambient configuration and observability
//!
//! Header tables and encoder/decoder state belong to one connection and one
//! direction and are used sequentially. The Huffman trie and static table
//! are process-wide and immutable. Windows are the only shared mutable state.

pub mod config;
pub mod flow_control;
pub mod frame;
pub mod hpack;
pub mod logging;
pub mod metrics;
pub mod settings;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use flow_control::{FlowControlError, SendWindows, Window, WindowState};
pub use frame::{
    CONNECTION_PREFACE, DEFAULT_HEADER_TABLE_SIZE, DEFAULT_INITIAL_WINDOW_SIZE,
    DEFAULT_MAX_FRAME_SIZE, ErrorCode, FRAME_HEADER_SIZE, Frame, FrameDecoder, FrameEncoder,
    FrameError, FrameHeader, FrameType, StreamId,
};
pub use hpack::{CodecError, HeaderField, HpackContext, HpackDecoder, HpackEncoder, HpackError};
pub use settings::{ConnectionSettings, SettingsChange};

/// Any error raised by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("hpack: {0}")]
    Hpack(#[from] HpackError),
    #[error("frame: {0}")]
    Frame(#[from] FrameError),
    #[error("flow control: {0}")]
    FlowControl(#[from] FlowControlError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logging(#[from] logging::LoggingError),
}

impl Error {
    /// Whether the connection must be torn down.
    pub fn is_connection_fatal(&self) -> bool {
        match self {
            Error::Hpack(e) => e.is_connection_fatal(),
            Error::Frame(e) => e.is_connection_fatal(),
            Error::FlowControl(e) => matches!(e, FlowControlError::WindowOverflow { .. }),
            Error::Config(_) | Error::Logging(_) => false,
        }
    }

    /// The error code to close the connection with, for fatal errors.
    pub fn error_code(&self) -> Option<ErrorCode> {
        if !self.is_connection_fatal() {
            return None;
        }
        match self {
            Error::Hpack(_) => Some(ErrorCode::CompressionError),
            Error::Frame(e) => Some(e.error_code()),
            Error::FlowControl(e) => Some(e.error_code()),
            Error::Config(_) | Error::Logging(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = Error::from(HpackError::from(CodecError::InvalidHuffmanPadding));
        assert!(err.is_connection_fatal());
        assert_eq!(err.error_code(), Some(ErrorCode::CompressionError));

        let err = Error::from(HpackError::BufferTooSmall {
            needed: 10,
            available: 5,
        });
        assert!(!err.is_connection_fatal());
        assert_eq!(err.error_code(), None);

        let err = Error::from(FrameError::InvalidWindowIncrement { increment: 0 });
        assert_eq!(err.error_code(), Some(ErrorCode::ProtocolError));

        let err = Error::from(FlowControlError::Disposed);
        assert!(!err.is_connection_fatal());

        let err = Error::from(FlowControlError::WindowOverflow {
            window: 1,
            increment: 0x7FFF_FFFF,
        });
        assert_eq!(err.error_code(), Some(ErrorCode::FlowControlError));
    }
}
