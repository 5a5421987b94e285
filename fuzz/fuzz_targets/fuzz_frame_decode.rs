#![no_main]

use bytes::BytesMut;
use h2intercept::frame::{self, Frame, FrameDecoder, FrameEncoder, MAX_FRAME_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // The fixed-buffer reader must agree with the streaming decoder.
    if let Ok((frame, consumed)) = frame::read_frame(data) {
        assert!(consumed <= data.len());
        let mut buf = vec![0u8; frame.encoded_len()];
        let written = frame::write_frame(&mut buf, &frame).expect("re-encode decoded frame");
        let (again, _) = frame::read_frame(&buf[..written]).expect("decode re-encoded frame");
        assert_eq!(frame, again, "fixed-buffer roundtrip mismatch");
    }

    let mut decoder = FrameDecoder::new();
    decoder.set_max_frame_size(MAX_FRAME_SIZE);
    let mut encoder = FrameEncoder::new();
    encoder.set_max_frame_size(MAX_FRAME_SIZE);
    let mut buf = BytesMut::from(data);

    // Decode until we run out of data or hit an error
    loop {
        match decoder.decode(&mut buf) {
            Ok(Some(frame)) => {
                let _ = frame.stream_id();

                // Frames relayed by the proxy must survive re-encoding.
                if !matches!(frame, Frame::Unknown(_)) {
                    let mut out = BytesMut::new();
                    encoder.encode(&frame, &mut out).expect("re-encode decoded frame");
                    let again = decoder
                        .decode(&mut out)
                        .expect("decode re-encoded frame")
                        .expect("complete frame");
                    assert_eq!(frame, again, "streaming roundtrip mismatch");
                }
            }
            Ok(None) => break,
            Err(_) => break,
        }
    }
});
