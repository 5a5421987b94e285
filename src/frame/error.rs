//! HTTP/2 frame errors.

use std::fmt;

use super::types::{FrameType, SettingId};

/// HTTP/2 error codes (RFC 9113 Section 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    /// Graceful shutdown.
    NoError = 0x0,
    /// Protocol error detected.
    ProtocolError = 0x1,
    /// Implementation fault.
    InternalError = 0x2,
    /// Flow control limits exceeded.
    FlowControlError = 0x3,
    /// Settings not acknowledged in time.
    SettingsTimeout = 0x4,
    /// Frame received for closed stream.
    StreamClosed = 0x5,
    /// Frame size incorrect.
    FrameSizeError = 0x6,
    /// Stream not processed.
    RefusedStream = 0x7,
    /// Stream cancelled.
    Cancel = 0x8,
    /// Compression state not updated.
    CompressionError = 0x9,
    /// TCP connection error.
    ConnectError = 0xa,
    /// Processing capacity exceeded.
    EnhanceYourCalm = 0xb,
    /// Negotiated TLS requirements not met.
    InadequateSecurity = 0xc,
    /// HTTP/1.1 required.
    Http11Required = 0xd,
}

impl ErrorCode {
    pub fn from_u32(code: u32) -> Self {
        match code {
            0x0 => ErrorCode::NoError,
            0x1 => ErrorCode::ProtocolError,
            0x2 => ErrorCode::InternalError,
            0x3 => ErrorCode::FlowControlError,
            0x4 => ErrorCode::SettingsTimeout,
            0x5 => ErrorCode::StreamClosed,
            0x6 => ErrorCode::FrameSizeError,
            0x7 => ErrorCode::RefusedStream,
            0x8 => ErrorCode::Cancel,
            0x9 => ErrorCode::CompressionError,
            0xa => ErrorCode::ConnectError,
            0xb => ErrorCode::EnhanceYourCalm,
            0xc => ErrorCode::InadequateSecurity,
            0xd => ErrorCode::Http11Required,
            // Unknown error codes are treated as INTERNAL_ERROR
            _ => ErrorCode::InternalError,
        }
    }

    pub fn to_u32(self) -> u32 {
        self as u32
    }

    fn name(self) -> &'static str {
        match self {
            ErrorCode::NoError => "NO_ERROR",
            ErrorCode::ProtocolError => "PROTOCOL_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::FlowControlError => "FLOW_CONTROL_ERROR",
            ErrorCode::SettingsTimeout => "SETTINGS_TIMEOUT",
            ErrorCode::StreamClosed => "STREAM_CLOSED",
            ErrorCode::FrameSizeError => "FRAME_SIZE_ERROR",
            ErrorCode::RefusedStream => "REFUSED_STREAM",
            ErrorCode::Cancel => "CANCEL",
            ErrorCode::CompressionError => "COMPRESSION_ERROR",
            ErrorCode::ConnectError => "CONNECT_ERROR",
            ErrorCode::EnhanceYourCalm => "ENHANCE_YOUR_CALM",
            ErrorCode::InadequateSecurity => "INADEQUATE_SECURITY",
            ErrorCode::Http11Required => "HTTP_1_1_REQUIRED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Frame parsing/encoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Not enough data to parse frame (need more bytes).
    #[error("incomplete frame data")]
    Incomplete,
    /// A writer's destination cannot hold the frame. Nothing was written.
    #[error("buffer too small: need {needed} bytes, {available} available")]
    BufferTooSmall { needed: usize, available: usize },
    /// A writer was asked for a payload longer than the 24-bit length field.
    #[error("frame size {size} exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },
    /// The peer sent a frame above our SETTINGS_MAX_FRAME_SIZE.
    #[error("received frame size {size} exceeds advertised maximum {max}")]
    ExceedsMaxFrameSize { size: u32, max: u32 },
    /// Frame type must be sent on stream 0 but was not.
    #[error("frame type 0x{frame_type:02x} must be sent on stream 0")]
    InvalidStreamZero { frame_type: u8 },
    /// Frame requires non-zero stream ID.
    #[error("frame type 0x{frame_type:02x} requires non-zero stream ID")]
    StreamIdRequired { frame_type: u8 },
    /// The payload length does not fit the frame type's layout.
    #[error("frame type 0x{frame_type:02x} expected {expected} bytes, got {actual}")]
    InvalidPayloadLength {
        frame_type: u8,
        expected: usize,
        actual: usize,
    },
    /// Invalid padding length.
    #[error("padding length {pad_length} exceeds payload length {payload_length}")]
    InvalidPadding {
        pad_length: u8,
        payload_length: usize,
    },
    /// Invalid setting value.
    #[error("invalid value {value} for setting 0x{id:04x}")]
    InvalidSettingValue { id: u16, value: u32 },
    /// Invalid window update increment.
    #[error("invalid window increment {increment}")]
    InvalidWindowIncrement { increment: u32 },
}

impl FrameError {
    /// The error code the connection must be closed with.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            FrameError::BufferTooSmall { .. } | FrameError::FrameTooLarge { .. } => {
                ErrorCode::InternalError
            }
            FrameError::Incomplete | FrameError::ExceedsMaxFrameSize { .. } => {
                ErrorCode::FrameSizeError
            }
            FrameError::InvalidPayloadLength { frame_type, .. } => {
                // A short HEADERS/PUSH_PROMISE body is a layout error, not a
                // size error (RFC 9113 Sections 6.2 and 6.6).
                match FrameType::from_u8(*frame_type) {
                    Some(FrameType::Headers | FrameType::PushPromise) => ErrorCode::ProtocolError,
                    _ => ErrorCode::FrameSizeError,
                }
            }
            FrameError::InvalidSettingValue { id, .. }
                if SettingId::from_u16(*id) == SettingId::InitialWindowSize =>
            {
                ErrorCode::FlowControlError
            }
            FrameError::InvalidStreamZero { .. }
            | FrameError::StreamIdRequired { .. }
            | FrameError::InvalidPadding { .. }
            | FrameError::InvalidSettingValue { .. }
            | FrameError::InvalidWindowIncrement { .. } => ErrorCode::ProtocolError,
        }
    }

    /// Whether this error must terminate the connection. Writer sizing
    /// errors are local and can be retried.
    pub fn is_connection_fatal(&self) -> bool {
        !matches!(
            self,
            FrameError::BufferTooSmall { .. } | FrameError::FrameTooLarge { .. }
        )
    }
}
