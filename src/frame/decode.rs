//! HTTP/2 frame decoding.

use bytes::{Buf, Bytes, BytesMut};

use super::error::FrameError;
use super::types::*;
use super::{DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE, flags};
use crate::metrics::{FRAME_DECODE_ERRORS, FRAMES_DECODED};

/// Read a frame header from the start of `buf`.
///
/// The reserved bit of the stream identifier is masked off.
pub fn read_header(buf: &[u8]) -> Result<FrameHeader, FrameError> {
    let mut buf = buf.get(..FRAME_HEADER_SIZE).ok_or(FrameError::Incomplete)?;

    // Length is 24 bits (3 bytes), big-endian
    let length = buf.get_uint(3) as u32;
    let frame_type = buf.get_u8();
    let flags = buf.get_u8();
    // Stream ID is 31 bits (4 bytes), big-endian, high bit reserved
    let stream_id = StreamId::new(buf.get_u32());

    Ok(FrameHeader {
        length,
        frame_type,
        flags,
        stream_id,
    })
}

/// Read one complete frame from a fixed buffer, returning it with the number
/// of octets consumed. This is the inverse of the `write_*` functions and
/// applies no frame size limit beyond the 24-bit length field.
pub fn read_frame(buf: &[u8]) -> Result<(Frame, usize), FrameError> {
    let header = read_header(buf)?;
    let total = FRAME_HEADER_SIZE + header.length as usize;
    let payload = buf.get(FRAME_HEADER_SIZE..total).ok_or(FrameError::Incomplete)?;
    let frame = parse_frame(header, Bytes::copy_from_slice(payload))?;
    Ok((frame, total))
}

/// Frame decoder that parses HTTP/2 frames from a connection buffer.
pub struct FrameDecoder {
    /// Our advertised SETTINGS_MAX_FRAME_SIZE.
    max_frame_size: u32,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new frame decoder with default settings.
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Set the maximum frame size.
    pub fn set_max_frame_size(&mut self, size: u32) {
        self.max_frame_size = size;
    }

    pub fn max_frame_size(&self) -> u32 {
        self.max_frame_size
    }

    /// Try to decode a frame from the buffer.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol error.
    ///
    /// On success, the consumed bytes are removed from the buffer.
    pub fn decode(&self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        match self.decode_inner(buf) {
            Ok(Some(frame)) => {
                FRAMES_DECODED.increment();
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                FRAME_DECODE_ERRORS.increment();
                tracing::warn!(error = %e, code = %e.error_code(), "failed to decode frame");
                Err(e)
            }
        }
    }

    fn decode_inner(&self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        // Need at least the header
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let header = read_header(&buf[..])?;

        if header.length > self.max_frame_size {
            return Err(FrameError::ExceedsMaxFrameSize {
                size: header.length,
                max: self.max_frame_size,
            });
        }

        // Check if we have the full frame
        let total_len = FRAME_HEADER_SIZE + header.length as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(header.length as usize).freeze();

        tracing::trace!(
            frame_type = header.frame_type,
            flags = header.flags,
            stream_id = header.stream_id.value(),
            length = header.length,
            "decoded frame header"
        );

        parse_frame(header, payload).map(Some)
    }
}

/// Parse a frame given its header and payload.
fn parse_frame(header: FrameHeader, payload: Bytes) -> Result<Frame, FrameError> {
    match header.get_type() {
        Some(FrameType::Data) => parse_data(header, payload),
        Some(FrameType::Headers) => parse_headers(header, payload),
        Some(FrameType::Priority) => parse_priority(header, payload),
        Some(FrameType::RstStream) => parse_rst_stream(header, payload),
        Some(FrameType::Settings) => parse_settings(header, payload),
        Some(FrameType::PushPromise) => parse_push_promise(header, payload),
        Some(FrameType::Ping) => parse_ping(header, payload),
        Some(FrameType::GoAway) => parse_goaway(header, payload),
        Some(FrameType::WindowUpdate) => parse_window_update(header, payload),
        Some(FrameType::Continuation) => parse_continuation(header, payload),
        None => Ok(Frame::Unknown(UnknownFrame {
            frame_type: header.frame_type,
            flags: header.flags,
            stream_id: header.stream_id,
            payload,
        })),
    }
}

fn require_stream(header: &FrameHeader) -> Result<(), FrameError> {
    if header.stream_id.is_connection_level() {
        return Err(FrameError::StreamIdRequired {
            frame_type: header.frame_type,
        });
    }
    Ok(())
}

fn require_connection(header: &FrameHeader) -> Result<(), FrameError> {
    if !header.stream_id.is_connection_level() {
        return Err(FrameError::InvalidStreamZero {
            frame_type: header.frame_type,
        });
    }
    Ok(())
}

/// Check a fixed-size payload.
fn require_len(header: &FrameHeader, payload: &Bytes, expected: usize) -> Result<(), FrameError> {
    if payload.len() != expected {
        return Err(FrameError::InvalidPayloadLength {
            frame_type: header.frame_type,
            expected,
            actual: payload.len(),
        });
    }
    Ok(())
}

/// Check the payload of a type with a fixed layout.
fn require_fixed_len(header: &FrameHeader, payload: &Bytes) -> Result<(), FrameError> {
    match header.get_type().and_then(FrameType::fixed_payload_len) {
        Some(expected) => require_len(header, payload, expected),
        None => Ok(()),
    }
}

fn get_priority(payload: &mut Bytes) -> Priority {
    let first = payload.get_u32();
    Priority {
        exclusive: (first & 0x8000_0000) != 0,
        dependency: StreamId::new(first),
        weight: payload.get_u8(),
    }
}

fn parse_data(header: FrameHeader, payload: Bytes) -> Result<Frame, FrameError> {
    require_stream(&header)?;

    let data = if header.has_flag(flags::PADDED) {
        remove_padding(payload)?
    } else {
        payload
    };

    Ok(Frame::Data(DataFrame {
        stream_id: header.stream_id,
        end_stream: header.has_flag(flags::END_STREAM),
        data,
    }))
}

fn parse_headers(header: FrameHeader, payload: Bytes) -> Result<Frame, FrameError> {
    require_stream(&header)?;

    let mut payload = if header.has_flag(flags::PADDED) {
        remove_padding(payload)?
    } else {
        payload
    };

    let priority = if header.has_flag(flags::PRIORITY) {
        if payload.len() < 5 {
            return Err(FrameError::InvalidPayloadLength {
                frame_type: header.frame_type,
                expected: 5,
                actual: payload.len(),
            });
        }
        Some(get_priority(&mut payload))
    } else {
        None
    };

    Ok(Frame::Headers(HeadersFrame {
        stream_id: header.stream_id,
        end_stream: header.has_flag(flags::END_STREAM),
        end_headers: header.has_flag(flags::END_HEADERS),
        priority,
        header_block: payload,
    }))
}

fn parse_priority(header: FrameHeader, mut payload: Bytes) -> Result<Frame, FrameError> {
    require_stream(&header)?;
    require_fixed_len(&header, &payload)?;

    Ok(Frame::Priority(PriorityFrame {
        stream_id: header.stream_id,
        priority: get_priority(&mut payload),
    }))
}

fn parse_rst_stream(header: FrameHeader, mut payload: Bytes) -> Result<Frame, FrameError> {
    require_stream(&header)?;
    require_fixed_len(&header, &payload)?;

    Ok(Frame::RstStream(RstStreamFrame {
        stream_id: header.stream_id,
        error_code: payload.get_u32(),
    }))
}

fn parse_settings(header: FrameHeader, mut payload: Bytes) -> Result<Frame, FrameError> {
    require_connection(&header)?;

    let ack = header.has_flag(flags::ACK);

    // ACK SETTINGS must have empty payload
    if ack {
        require_len(&header, &payload, 0)?;
        return Ok(Frame::Settings(SettingsFrame::ack()));
    }

    if !payload.len().is_multiple_of(6) {
        return Err(FrameError::InvalidPayloadLength {
            frame_type: header.frame_type,
            expected: (payload.len() / 6) * 6,
            actual: payload.len(),
        });
    }

    let mut settings = Vec::with_capacity(payload.len() / 6);
    while payload.has_remaining() {
        let id = SettingId::from_u16(payload.get_u16());
        let value = payload.get_u32();
        validate_setting(id, value)?;
        settings.push(Setting { id, value });
    }

    Ok(Frame::Settings(SettingsFrame { ack, settings }))
}

/// Validate a setting value against its RFC 9113 Section 6.5.2 range.
pub(crate) fn validate_setting(id: SettingId, value: u32) -> Result<(), FrameError> {
    let valid = match id {
        SettingId::EnablePush => value <= 1,
        SettingId::InitialWindowSize => value <= 0x7FFF_FFFF,
        SettingId::MaxFrameSize => (16_384..=16_777_215).contains(&value),
        _ => true,
    };

    if !valid {
        return Err(FrameError::InvalidSettingValue {
            id: id.to_u16(),
            value,
        });
    }
    Ok(())
}

fn parse_push_promise(header: FrameHeader, payload: Bytes) -> Result<Frame, FrameError> {
    require_stream(&header)?;

    let mut payload = if header.has_flag(flags::PADDED) {
        remove_padding(payload)?
    } else {
        payload
    };

    if payload.len() < 4 {
        return Err(FrameError::InvalidPayloadLength {
            frame_type: header.frame_type,
            expected: 4,
            actual: payload.len(),
        });
    }

    let promised_stream_id = StreamId::new(payload.get_u32());

    Ok(Frame::PushPromise(PushPromiseFrame {
        stream_id: header.stream_id,
        end_headers: header.has_flag(flags::END_HEADERS),
        promised_stream_id,
        header_block: payload,
    }))
}

fn parse_ping(header: FrameHeader, payload: Bytes) -> Result<Frame, FrameError> {
    require_connection(&header)?;
    require_fixed_len(&header, &payload)?;

    let mut data = [0u8; 8];
    data.copy_from_slice(&payload);

    Ok(Frame::Ping(PingFrame {
        ack: header.has_flag(flags::ACK),
        data,
    }))
}

fn parse_goaway(header: FrameHeader, mut payload: Bytes) -> Result<Frame, FrameError> {
    require_connection(&header)?;

    if payload.len() < 8 {
        return Err(FrameError::InvalidPayloadLength {
            frame_type: header.frame_type,
            expected: 8,
            actual: payload.len(),
        });
    }

    let last_stream_id = StreamId::new(payload.get_u32());
    let error_code = payload.get_u32();

    Ok(Frame::GoAway(GoAwayFrame {
        last_stream_id,
        error_code,
        debug_data: payload,
    }))
}

fn parse_window_update(header: FrameHeader, mut payload: Bytes) -> Result<Frame, FrameError> {
    require_fixed_len(&header, &payload)?;

    let increment = payload.get_u32() & 0x7FFF_FFFF;
    if increment == 0 {
        return Err(FrameError::InvalidWindowIncrement { increment });
    }

    Ok(Frame::WindowUpdate(WindowUpdateFrame {
        stream_id: header.stream_id,
        increment,
    }))
}

fn parse_continuation(header: FrameHeader, payload: Bytes) -> Result<Frame, FrameError> {
    require_stream(&header)?;

    Ok(Frame::Continuation(ContinuationFrame {
        stream_id: header.stream_id,
        end_headers: header.has_flag(flags::END_HEADERS),
        header_block: payload,
    }))
}

/// Strip the pad length octet and trailing padding.
fn remove_padding(mut payload: Bytes) -> Result<Bytes, FrameError> {
    if payload.is_empty() {
        return Err(FrameError::InvalidPadding {
            pad_length: 0,
            payload_length: 0,
        });
    }

    let payload_length = payload.len();
    let pad_length = payload.get_u8();

    // Padding may consume everything after the pad length octet, no more.
    if pad_length as usize > payload.len() {
        return Err(FrameError::InvalidPadding {
            pad_length,
            payload_length,
        });
    }

    let data_len = payload.len() - pad_length as usize;
    Ok(payload.slice(..data_len))
}
