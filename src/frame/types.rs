//! HTTP/2 frame type definitions.

use bytes::Bytes;

use super::error::ErrorCode;

/// HTTP/2 frame types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Data = 0x0,
    Headers = 0x1,
    Priority = 0x2,
    RstStream = 0x3,
    Settings = 0x4,
    PushPromise = 0x5,
    Ping = 0x6,
    GoAway = 0x7,
    WindowUpdate = 0x8,
    Continuation = 0x9,
}

impl FrameType {
    /// Parse a frame type from a byte. Unknown types return `None` and must
    /// be ignored by the receiver.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(FrameType::Data),
            0x1 => Some(FrameType::Headers),
            0x2 => Some(FrameType::Priority),
            0x3 => Some(FrameType::RstStream),
            0x4 => Some(FrameType::Settings),
            0x5 => Some(FrameType::PushPromise),
            0x6 => Some(FrameType::Ping),
            0x7 => Some(FrameType::GoAway),
            0x8 => Some(FrameType::WindowUpdate),
            0x9 => Some(FrameType::Continuation),
            _ => None,
        }
    }

    /// Fixed payload length, for the types that have one.
    pub fn fixed_payload_len(self) -> Option<usize> {
        match self {
            FrameType::Priority => Some(5),
            FrameType::RstStream | FrameType::WindowUpdate => Some(4),
            FrameType::Ping => Some(8),
            _ => None,
        }
    }
}

/// Frame flags.
pub mod flags {
    pub const END_STREAM: u8 = 0x1;
    pub const ACK: u8 = 0x1;
    pub const END_HEADERS: u8 = 0x4;
    pub const PADDED: u8 = 0x8;
    pub const PRIORITY: u8 = 0x20;
}

/// A stream identifier. The reserved high bit is always clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StreamId(u32);

impl StreamId {
    /// The connection-level stream (stream 0).
    pub const CONNECTION: StreamId = StreamId(0);

    /// Create a stream ID, masking off the reserved bit.
    pub const fn new(id: u32) -> Self {
        Self(id & 0x7FFF_FFFF)
    }

    /// Get the raw stream ID value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Check if this is the connection-level stream (stream 0).
    pub const fn is_connection_level(self) -> bool {
        self.0 == 0
    }

    /// Client-initiated streams are odd.
    pub const fn is_client_initiated(self) -> bool {
        self.0 % 2 == 1
    }

    /// Server-initiated streams are even and non-zero.
    pub const fn is_server_initiated(self) -> bool {
        self.0 != 0 && self.0 % 2 == 0
    }
}

impl From<u32> for StreamId {
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The 9-octet frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload length (24 bits).
    pub length: u32,
    /// Raw frame type; may be a type this crate does not know.
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: StreamId,
}

impl FrameHeader {
    pub fn new(length: u32, frame_type: FrameType, flags: u8, stream_id: StreamId) -> Self {
        Self {
            length,
            frame_type: frame_type as u8,
            flags,
            stream_id,
        }
    }

    /// The known frame type, if any.
    pub fn get_type(&self) -> Option<FrameType> {
        FrameType::from_u8(self.frame_type)
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

/// A parsed HTTP/2 frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data(DataFrame),
    Headers(HeadersFrame),
    Priority(PriorityFrame),
    RstStream(RstStreamFrame),
    Settings(SettingsFrame),
    PushPromise(PushPromiseFrame),
    Ping(PingFrame),
    GoAway(GoAwayFrame),
    WindowUpdate(WindowUpdateFrame),
    Continuation(ContinuationFrame),
    Unknown(UnknownFrame),
}

impl Frame {
    /// The stream this frame belongs to.
    pub fn stream_id(&self) -> StreamId {
        match self {
            Frame::Data(f) => f.stream_id,
            Frame::Headers(f) => f.stream_id,
            Frame::Priority(f) => f.stream_id,
            Frame::RstStream(f) => f.stream_id,
            Frame::Settings(_) => StreamId::CONNECTION,
            Frame::PushPromise(f) => f.stream_id,
            Frame::Ping(_) => StreamId::CONNECTION,
            Frame::GoAway(_) => StreamId::CONNECTION,
            Frame::WindowUpdate(f) => f.stream_id,
            Frame::Continuation(f) => f.stream_id,
            Frame::Unknown(f) => f.stream_id,
        }
    }

    /// The raw type octet of this frame.
    pub fn frame_type(&self) -> u8 {
        match self {
            Frame::Data(_) => FrameType::Data as u8,
            Frame::Headers(_) => FrameType::Headers as u8,
            Frame::Priority(_) => FrameType::Priority as u8,
            Frame::RstStream(_) => FrameType::RstStream as u8,
            Frame::Settings(_) => FrameType::Settings as u8,
            Frame::PushPromise(_) => FrameType::PushPromise as u8,
            Frame::Ping(_) => FrameType::Ping as u8,
            Frame::GoAway(_) => FrameType::GoAway as u8,
            Frame::WindowUpdate(_) => FrameType::WindowUpdate as u8,
            Frame::Continuation(_) => FrameType::Continuation as u8,
            Frame::Unknown(f) => f.frame_type,
        }
    }

    /// Length of the payload this frame encodes to, excluding the header.
    pub fn payload_len(&self) -> usize {
        match self {
            Frame::Data(f) => f.data.len(),
            Frame::Headers(f) => {
                f.header_block.len() + if f.priority.is_some() { 5 } else { 0 }
            }
            Frame::Priority(_) => 5,
            Frame::RstStream(_) => 4,
            Frame::Settings(f) => {
                if f.ack {
                    0
                } else {
                    f.settings.len() * 6
                }
            }
            Frame::PushPromise(f) => 4 + f.header_block.len(),
            Frame::Ping(_) => 8,
            Frame::GoAway(f) => 8 + f.debug_data.len(),
            Frame::WindowUpdate(_) => 4,
            Frame::Continuation(f) => f.header_block.len(),
            Frame::Unknown(f) => f.payload.len(),
        }
    }

    /// Total encoded length including the 9-octet header.
    pub fn encoded_len(&self) -> usize {
        super::FRAME_HEADER_SIZE + self.payload_len()
    }
}

/// DATA frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub stream_id: StreamId,
    pub end_stream: bool,
    /// Payload with any padding already stripped.
    pub data: Bytes,
}

/// HEADERS frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersFrame {
    pub stream_id: StreamId,
    pub end_stream: bool,
    pub end_headers: bool,
    pub priority: Option<Priority>,
    /// HPACK header block fragment.
    pub header_block: Bytes,
}

/// Stream priority information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub exclusive: bool,
    pub dependency: StreamId,
    /// Wire weight; the effective weight is `weight + 1`.
    pub weight: u8,
}

/// PRIORITY frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityFrame {
    pub stream_id: StreamId,
    pub priority: Priority,
}

/// RST_STREAM frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RstStreamFrame {
    pub stream_id: StreamId,
    /// Raw error code, preserved so unknown codes can be forwarded intact.
    pub error_code: u32,
}

impl RstStreamFrame {
    pub fn new(stream_id: StreamId, error_code: ErrorCode) -> Self {
        Self {
            stream_id,
            error_code: error_code.to_u32(),
        }
    }

    /// The error code, with unknown values treated as `INTERNAL_ERROR`.
    pub fn error(&self) -> ErrorCode {
        ErrorCode::from_u32(self.error_code)
    }
}

/// SETTINGS frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingsFrame {
    pub ack: bool,
    pub settings: Vec<Setting>,
}

impl SettingsFrame {
    /// An empty SETTINGS frame with the ACK flag set.
    pub fn ack() -> Self {
        Self {
            ack: true,
            settings: Vec::new(),
        }
    }
}

/// A single setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Setting {
    pub id: SettingId,
    pub value: u32,
}

/// Setting identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingId {
    HeaderTableSize,
    EnablePush,
    MaxConcurrentStreams,
    InitialWindowSize,
    MaxFrameSize,
    MaxHeaderListSize,
    Unknown(u16),
}

impl SettingId {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0x1 => SettingId::HeaderTableSize,
            0x2 => SettingId::EnablePush,
            0x3 => SettingId::MaxConcurrentStreams,
            0x4 => SettingId::InitialWindowSize,
            0x5 => SettingId::MaxFrameSize,
            0x6 => SettingId::MaxHeaderListSize,
            v => SettingId::Unknown(v),
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            SettingId::HeaderTableSize => 0x1,
            SettingId::EnablePush => 0x2,
            SettingId::MaxConcurrentStreams => 0x3,
            SettingId::InitialWindowSize => 0x4,
            SettingId::MaxFrameSize => 0x5,
            SettingId::MaxHeaderListSize => 0x6,
            SettingId::Unknown(v) => v,
        }
    }
}

/// PUSH_PROMISE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPromiseFrame {
    pub stream_id: StreamId,
    pub end_headers: bool,
    pub promised_stream_id: StreamId,
    pub header_block: Bytes,
}

/// PING frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingFrame {
    pub ack: bool,
    /// Opaque 8-octet payload, echoed back in the ACK.
    pub data: [u8; 8],
}

/// GOAWAY frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoAwayFrame {
    pub last_stream_id: StreamId,
    pub error_code: u32,
    pub debug_data: Bytes,
}

/// WINDOW_UPDATE frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUpdateFrame {
    pub stream_id: StreamId,
    /// 31-bit increment; the reserved bit is never set.
    pub increment: u32,
}

/// CONTINUATION frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationFrame {
    pub stream_id: StreamId,
    pub end_headers: bool,
    pub header_block: Bytes,
}

/// A frame of an unknown type, kept so it can be relayed or dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFrame {
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: StreamId,
    pub payload: Bytes,
}
