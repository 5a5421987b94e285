//! SETTINGS exchange between two endpoints.

use bytes::BytesMut;
use h2intercept::flow_control::SendWindows;
use h2intercept::frame::{Frame, FrameDecoder, FrameEncoder, FrameError, StreamId};
use h2intercept::hpack::{HeaderField, HpackDecoder, HpackEncoder};
use h2intercept::settings::ConnectionSettings;
use h2intercept::{Config, DEFAULT_INITIAL_WINDOW_SIZE, ErrorCode};

/// Send `local` over the wire and return the frame the peer decodes.
fn exchange(local: &ConnectionSettings) -> Frame {
    let encoder = FrameEncoder::new();
    let decoder = FrameDecoder::new();

    let mut wire = BytesMut::new();
    encoder.encode(&Frame::Settings(local.to_frame()), &mut wire).unwrap();
    let frame = decoder.decode(&mut wire).unwrap().unwrap();
    assert!(wire.is_empty());
    frame
}

#[test]
fn peer_settings_reconfigure_outbound_side() {
    let advertised = ConnectionSettings::new()
        .header_table_size(256)
        .max_frame_size(32_768)
        .initial_window_size(1_000)
        .enable_push(false);

    let Frame::Settings(frame) = exchange(&advertised) else {
        panic!("expected SETTINGS");
    };

    let mut remote = ConnectionSettings::default();
    let change = remote.apply(&frame).unwrap();
    assert_eq!(remote, advertised);

    let mut hpack = HpackEncoder::new();
    let mut frames = FrameEncoder::new();
    let windows = SendWindows::with_liveness_interval(DEFAULT_INITIAL_WINDOW_SIZE, None);
    let open = windows.open_stream(StreamId::new(1));

    change.apply_to(&mut hpack, &mut frames, &windows).unwrap();

    assert_eq!(hpack.context().max_size(), 256);
    assert_eq!(frames.max_frame_size(), 32_768);
    assert_eq!(open.available(), 1_000);
    assert_eq!(windows.open_stream(StreamId::new(3)).available(), 1_000);
    assert_eq!(windows.connection().available(), 65_535);

    // The next header block opens with the size update the peer expects.
    let mut decoder = HpackDecoder::new();
    let headers = [HeaderField::new("x-a", "b")];
    let mut buf = [0u8; 64];
    let n = hpack.encode(&headers, &mut buf).unwrap();
    assert_eq!(&buf[..3], &[0x3f, 0xe1, 0x01]);
    assert_eq!(decoder.decode(&buf[..n]).unwrap(), headers);
    assert_eq!(decoder.context().max_size(), 256);
}

#[test]
fn invalid_peer_settings_close_the_connection() {
    let mut wire = BytesMut::from(
        &[
            0u8, 0, 6, 0x4, 0, 0, 0, 0, 0, // SETTINGS header
            0, 0x4, 0x80, 0, 0, 0, // INITIAL_WINDOW_SIZE = 2^31
        ][..],
    );

    let err = FrameDecoder::new().decode(&mut wire).unwrap_err();
    assert_eq!(
        err,
        FrameError::InvalidSettingValue {
            id: 0x4,
            value: 0x8000_0000
        }
    );
    assert_eq!(err.error_code(), ErrorCode::FlowControlError);
    assert!(err.is_connection_fatal());
}

#[test]
fn config_drives_local_settings() {
    let config = Config::from_toml(
        r#"
        [hpack]
        header_table_size = 8192

        [frame]
        max_frame_size = 65536

        [flow_control]
        initial_window_size = 1048576
        "#,
    )
    .unwrap();

    let local = config.local_settings();
    assert_eq!(local.header_table_size, 8192);
    assert_eq!(local.max_frame_size, 65_536);
    assert_eq!(local.initial_window_size, 1_048_576);
    assert!(local.validate().is_ok());

    let Frame::Settings(frame) = exchange(&local) else {
        panic!("expected SETTINGS");
    };
    let mut seen_by_peer = ConnectionSettings::default();
    seen_by_peer.apply(&frame).unwrap();
    assert_eq!(seen_by_peer, local);
}

#[test]
fn configured_encoder_tracks_peer_default_table() {
    let config = Config::from_toml("[hpack]\nheader_table_size = 8192\n").unwrap();

    // Our advertised size governs what we decode, not what we send.
    assert_eq!(config.hpack.decoder().context().max_size(), 8192);
    let mut encoder = config.hpack.encoder();
    let mut peer = HpackDecoder::new();

    let mut buf = vec![0u8; 16_384];
    for block in 0..60 {
        let headers: Vec<HeaderField> = (0..=block)
            .map(|i| HeaderField::new(format!("x-field-{i}"), "v".repeat(i + 1)))
            .collect();

        let n = encoder.encode(&headers, &mut buf).unwrap();
        assert_eq!(peer.decode(&buf[..n]).unwrap(), headers, "block {block}");
        assert_eq!(encoder.context().size(), peer.context().size());
    }
    assert_eq!(encoder.context().max_size(), 4096);
    assert_eq!(peer.context().max_size(), 4096);
}
