//! Codec and flow control metrics.

use metriken::{Counter, metric};

/// Header blocks encoded.
#[metric(
    name = "hpack_blocks_encoded",
    description = "Total header blocks encoded"
)]
pub static HPACK_BLOCKS_ENCODED: Counter = Counter::new();

/// Header blocks decoded.
#[metric(
    name = "hpack_blocks_decoded",
    description = "Total header blocks decoded"
)]
pub static HPACK_BLOCKS_DECODED: Counter = Counter::new();

/// Header blocks that failed to decode.
#[metric(
    name = "hpack_decode_errors",
    description = "Header blocks rejected as malformed"
)]
pub static HPACK_DECODE_ERRORS: Counter = Counter::new();

/// Dynamic table entries evicted.
#[metric(
    name = "hpack_table_evictions",
    description = "Dynamic table entries evicted"
)]
pub static HPACK_TABLE_EVICTIONS: Counter = Counter::new();

/// Frames decoded.
#[metric(name = "frames_decoded", description = "Total frames decoded")]
pub static FRAMES_DECODED: Counter = Counter::new();

/// Frames rejected by the decoder.
#[metric(
    name = "frame_decode_errors",
    description = "Frames rejected as malformed"
)]
pub static FRAME_DECODE_ERRORS: Counter = Counter::new();

/// Window bookings that had to wait.
#[metric(
    name = "flow_control_waits",
    description = "Window bookings that waited for a window update"
)]
pub static FLOW_CONTROL_WAITS: Counter = Counter::new();

/// Window bookings abandoned through cancellation.
#[metric(
    name = "flow_control_cancelled",
    description = "Window bookings cancelled before completing"
)]
pub static FLOW_CONTROL_CANCELLED: Counter = Counter::new();
