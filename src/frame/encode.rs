//! HTTP/2 frame encoding.
//!
//! The `write_*` functions serialise a frame into a caller-supplied fixed
//! buffer and return the total number of octets written, header included.
//! They check the whole frame fits before writing anything, so a failed call
//! leaves the buffer untouched. [`FrameEncoder`] is the growable counterpart
//! over `BytesMut`.

use bytes::{BufMut, BytesMut};

use super::error::FrameError;
use super::types::*;
use super::{CONNECTION_PREFACE, FRAME_HEADER_SIZE, MAX_FRAME_SIZE, MAX_WINDOW_SIZE, flags};

/// Write the 9-octet frame header.
///
/// `length` is the payload length and must fit in 24 bits. The reserved bit
/// of the stream identifier is always written as zero.
pub fn write_header(
    buf: &mut [u8],
    length: usize,
    frame_type: u8,
    flags: u8,
    stream_id: StreamId,
) -> Result<usize, FrameError> {
    if length > MAX_FRAME_SIZE as usize {
        return Err(FrameError::FrameTooLarge {
            size: length,
            max: MAX_FRAME_SIZE as usize,
        });
    }
    if buf.len() < FRAME_HEADER_SIZE {
        return Err(FrameError::BufferTooSmall {
            needed: FRAME_HEADER_SIZE,
            available: buf.len(),
        });
    }

    let mut out = &mut buf[..FRAME_HEADER_SIZE];
    // Length (24 bits, big-endian)
    out.put_uint(length as u64, 3);
    out.put_u8(frame_type);
    out.put_u8(flags);
    // Stream ID (31 bits, big-endian, high bit reserved)
    out.put_u32(stream_id.value() & 0x7FFF_FFFF);

    Ok(FRAME_HEADER_SIZE)
}

/// Write the header and hand back the payload region, sized exactly.
fn begin(
    buf: &mut [u8],
    length: usize,
    frame_type: FrameType,
    flags: u8,
    stream_id: StreamId,
) -> Result<&mut [u8], FrameError> {
    begin_raw(buf, length, frame_type as u8, flags, stream_id)
}

fn begin_raw(
    buf: &mut [u8],
    length: usize,
    frame_type: u8,
    flags: u8,
    stream_id: StreamId,
) -> Result<&mut [u8], FrameError> {
    let total = FRAME_HEADER_SIZE + length;
    if length <= MAX_FRAME_SIZE as usize && buf.len() < total {
        return Err(FrameError::BufferTooSmall {
            needed: total,
            available: buf.len(),
        });
    }
    write_header(buf, length, frame_type, flags, stream_id)?;
    Ok(&mut buf[FRAME_HEADER_SIZE..total])
}

fn put_priority(out: &mut &mut [u8], priority: &Priority) {
    let mut dep = priority.dependency.value();
    if priority.exclusive {
        dep |= 0x8000_0000;
    }
    out.put_u32(dep);
    out.put_u8(priority.weight);
}

/// Write a DATA frame.
pub fn write_data(buf: &mut [u8], frame: &DataFrame) -> Result<usize, FrameError> {
    let mut frame_flags = 0u8;
    if frame.end_stream {
        frame_flags |= flags::END_STREAM;
    }

    let len = frame.data.len();
    let mut out = begin(buf, len, FrameType::Data, frame_flags, frame.stream_id)?;
    out.put_slice(&frame.data);
    Ok(FRAME_HEADER_SIZE + len)
}

/// Write a HEADERS frame.
pub fn write_headers(buf: &mut [u8], frame: &HeadersFrame) -> Result<usize, FrameError> {
    let mut frame_flags = 0u8;
    if frame.end_stream {
        frame_flags |= flags::END_STREAM;
    }
    if frame.end_headers {
        frame_flags |= flags::END_HEADERS;
    }
    if frame.priority.is_some() {
        frame_flags |= flags::PRIORITY;
    }

    let priority_len = if frame.priority.is_some() { 5 } else { 0 };
    let len = priority_len + frame.header_block.len();
    let mut out = begin(buf, len, FrameType::Headers, frame_flags, frame.stream_id)?;

    if let Some(priority) = &frame.priority {
        put_priority(&mut out, priority);
    }
    out.put_slice(&frame.header_block);
    Ok(FRAME_HEADER_SIZE + len)
}

/// Write a PRIORITY frame: exclusive bit, 31-bit dependency, weight.
pub fn write_priority(buf: &mut [u8], frame: &PriorityFrame) -> Result<usize, FrameError> {
    let mut out = begin(buf, 5, FrameType::Priority, 0, frame.stream_id)?;
    put_priority(&mut out, &frame.priority);
    Ok(FRAME_HEADER_SIZE + 5)
}

/// Write a RST_STREAM frame.
pub fn write_rst_stream(buf: &mut [u8], frame: &RstStreamFrame) -> Result<usize, FrameError> {
    let mut out = begin(buf, 4, FrameType::RstStream, 0, frame.stream_id)?;
    out.put_u32(frame.error_code);
    Ok(FRAME_HEADER_SIZE + 4)
}

/// Write a SETTINGS frame. An ACK is always written with an empty body.
pub fn write_settings(buf: &mut [u8], frame: &SettingsFrame) -> Result<usize, FrameError> {
    if frame.ack {
        begin(buf, 0, FrameType::Settings, flags::ACK, StreamId::CONNECTION)?;
        return Ok(FRAME_HEADER_SIZE);
    }

    let len = frame.settings.len() * 6;
    let mut out = begin(buf, len, FrameType::Settings, 0, StreamId::CONNECTION)?;
    for setting in &frame.settings {
        out.put_u16(setting.id.to_u16());
        out.put_u32(setting.value);
    }
    Ok(FRAME_HEADER_SIZE + len)
}

/// Write a PUSH_PROMISE frame.
pub fn write_push_promise(buf: &mut [u8], frame: &PushPromiseFrame) -> Result<usize, FrameError> {
    let frame_flags = if frame.end_headers {
        flags::END_HEADERS
    } else {
        0
    };

    let len = 4 + frame.header_block.len();
    let mut out = begin(buf, len, FrameType::PushPromise, frame_flags, frame.stream_id)?;
    out.put_u32(frame.promised_stream_id.value() & 0x7FFF_FFFF);
    out.put_slice(&frame.header_block);
    Ok(FRAME_HEADER_SIZE + len)
}

/// Write a PING frame carrying its 8-octet opaque payload.
pub fn write_ping(buf: &mut [u8], frame: &PingFrame) -> Result<usize, FrameError> {
    let frame_flags = if frame.ack { flags::ACK } else { 0 };
    let mut out = begin(buf, 8, FrameType::Ping, frame_flags, StreamId::CONNECTION)?;
    out.put_slice(&frame.data);
    Ok(FRAME_HEADER_SIZE + 8)
}

/// Write a GOAWAY frame.
pub fn write_goaway(buf: &mut [u8], frame: &GoAwayFrame) -> Result<usize, FrameError> {
    let len = 8 + frame.debug_data.len();
    let mut out = begin(buf, len, FrameType::GoAway, 0, StreamId::CONNECTION)?;
    out.put_u32(frame.last_stream_id.value() & 0x7FFF_FFFF);
    out.put_u32(frame.error_code);
    out.put_slice(&frame.debug_data);
    Ok(FRAME_HEADER_SIZE + len)
}

/// Write a WINDOW_UPDATE frame.
///
/// The increment must be between 1 and 2^31 - 1; anything else is a frame
/// the peer would reject.
pub fn write_window_update(
    buf: &mut [u8],
    frame: &WindowUpdateFrame,
) -> Result<usize, FrameError> {
    if frame.increment == 0 || frame.increment > MAX_WINDOW_SIZE {
        return Err(FrameError::InvalidWindowIncrement {
            increment: frame.increment,
        });
    }
    let mut out = begin(buf, 4, FrameType::WindowUpdate, 0, frame.stream_id)?;
    out.put_u32(frame.increment);
    Ok(FRAME_HEADER_SIZE + 4)
}

/// Write a CONTINUATION frame.
pub fn write_continuation(
    buf: &mut [u8],
    frame: &ContinuationFrame,
) -> Result<usize, FrameError> {
    let frame_flags = if frame.end_headers {
        flags::END_HEADERS
    } else {
        0
    };

    let len = frame.header_block.len();
    let mut out = begin(buf, len, FrameType::Continuation, frame_flags, frame.stream_id)?;
    out.put_slice(&frame.header_block);
    Ok(FRAME_HEADER_SIZE + len)
}

/// Write a frame of an unknown type verbatim.
pub fn write_unknown(buf: &mut [u8], frame: &UnknownFrame) -> Result<usize, FrameError> {
    let len = frame.payload.len();
    let mut out = begin_raw(buf, len, frame.frame_type, frame.flags, frame.stream_id)?;
    out.put_slice(&frame.payload);
    Ok(FRAME_HEADER_SIZE + len)
}

/// Write any frame.
pub fn write_frame(buf: &mut [u8], frame: &Frame) -> Result<usize, FrameError> {
    match frame {
        Frame::Data(f) => write_data(buf, f),
        Frame::Headers(f) => write_headers(buf, f),
        Frame::Priority(f) => write_priority(buf, f),
        Frame::RstStream(f) => write_rst_stream(buf, f),
        Frame::Settings(f) => write_settings(buf, f),
        Frame::PushPromise(f) => write_push_promise(buf, f),
        Frame::Ping(f) => write_ping(buf, f),
        Frame::GoAway(f) => write_goaway(buf, f),
        Frame::WindowUpdate(f) => write_window_update(buf, f),
        Frame::Continuation(f) => write_continuation(buf, f),
        Frame::Unknown(f) => write_unknown(buf, f),
    }
}

/// Frame encoder that appends HTTP/2 frames to a growable buffer.
pub struct FrameEncoder {
    /// The peer's SETTINGS_MAX_FRAME_SIZE.
    max_frame_size: u32,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameEncoder {
    /// Create a new frame encoder with default settings.
    pub fn new() -> Self {
        Self {
            max_frame_size: super::DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Set the maximum frame size the peer accepts.
    pub fn set_max_frame_size(&mut self, size: u32) {
        self.max_frame_size = size;
    }

    /// Get the maximum frame size.
    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    /// Append a frame to the buffer.
    ///
    /// Fails with [`FrameError::FrameTooLarge`] if the payload exceeds the
    /// peer's maximum frame size; the buffer is then unchanged.
    pub fn encode(&self, frame: &Frame, buf: &mut BytesMut) -> Result<usize, FrameError> {
        let len = frame.payload_len();
        if len > self.max_frame_size as usize {
            return Err(FrameError::FrameTooLarge {
                size: len,
                max: self.max_frame_size as usize,
            });
        }

        let start = buf.len();
        buf.resize(start + FRAME_HEADER_SIZE + len, 0);
        match write_frame(&mut buf[start..], frame) {
            Ok(n) => Ok(n),
            Err(e) => {
                buf.truncate(start);
                Err(e)
            }
        }
    }

    /// Append the client connection preface.
    pub fn encode_connection_preface(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(CONNECTION_PREFACE);
    }

    /// Append a SETTINGS ACK.
    pub fn encode_settings_ack(&self, buf: &mut BytesMut) -> Result<usize, FrameError> {
        self.encode(&Frame::Settings(SettingsFrame::ack()), buf)
    }

    /// Append the ACK for a received PING.
    pub fn encode_ping_ack(&self, data: [u8; 8], buf: &mut BytesMut) -> Result<usize, FrameError> {
        self.encode(&Frame::Ping(PingFrame { ack: true, data }), buf)
    }
}
