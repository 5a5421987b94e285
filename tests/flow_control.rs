//! Flow control integration tests.
//!
//! These drive shared windows from several tasks the way a proxy's DATA
//! writers and frame reader do.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use h2intercept::flow_control::{SendWindows, Window, WindowState};
use h2intercept::frame::{Setting, SettingId, SettingsFrame, StreamId};
use h2intercept::settings::ConnectionSettings;
use tokio::sync::oneshot;

async fn cancel_on(rx: oneshot::Receiver<()>) {
    let _ = rx.await;
}

#[tokio::test(start_paused = true)]
async fn second_booking_waits_for_update() {
    let window = Arc::new(Window::new(100).with_liveness_interval(None));
    assert!(window.book_window_size(60, std::future::pending()).await);

    let (_keep, rx) = oneshot::channel();
    let waiter = tokio::spawn({
        let window = window.clone();
        async move { window.book_window_size(60, cancel_on(rx)).await }
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiter.is_finished());
    assert_eq!(window.available(), 40);

    window.update_window_size(20).unwrap();
    assert!(waiter.await.unwrap());
    assert_eq!(window.available(), 0);
    assert_eq!(window.state(), WindowState::Exhausted);
}

#[tokio::test(start_paused = true)]
async fn second_booking_cancelled() {
    let window = Arc::new(Window::new(100));
    assert!(window.book_window_size(60, std::future::pending()).await);

    let (tx, rx) = oneshot::channel();
    let waiter = tokio::spawn({
        let window = window.clone();
        async move { window.book_window_size(60, cancel_on(rx)).await }
    });

    tokio::time::sleep(Duration::from_secs(2)).await;
    tx.send(()).unwrap();

    assert!(!waiter.await.unwrap());
    assert_eq!(window.available(), 40);
}

#[tokio::test(start_paused = true)]
async fn settings_shrink_blocks_until_restored() {
    let windows = SendWindows::with_liveness_interval(100, None);
    let stream = windows.open_stream(StreamId::new(1));

    let mut remote = ConnectionSettings::default().initial_window_size(100);
    let change = remote
        .apply(&SettingsFrame {
            ack: false,
            settings: vec![Setting {
                id: SettingId::InitialWindowSize,
                value: 0,
            }],
        })
        .unwrap();
    assert_eq!(change.initial_window_delta, -100);
    windows
        .apply_initial_window_delta(change.initial_window_delta)
        .unwrap();

    // 50 bytes were already in flight when the shrink landed.
    stream.adjust(-50).unwrap();
    assert_eq!(stream.available(), -50);

    let (_keep, rx) = oneshot::channel();
    let waiter = tokio::spawn({
        let stream = stream.clone();
        async move { stream.book_window_size(10, cancel_on(rx)).await }
    });

    stream.update_window_size(30).unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!waiter.is_finished());

    stream.update_window_size(20).unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!waiter.is_finished());

    stream.update_window_size(10).unwrap();
    assert!(waiter.await.unwrap());
    assert_eq!(stream.available(), 0);
}

#[tokio::test(start_paused = true)]
async fn data_needs_stream_and_connection_window() {
    let windows = Arc::new(SendWindows::with_liveness_interval(100_000, None));
    windows.open_stream(StreamId::new(1));

    // The connection window starts at 65,535 regardless of the stream size.
    assert!(
        windows
            .book_data(StreamId::new(1), 65_535, std::future::pending())
            .await
    );

    let (_keep, rx) = oneshot::channel();
    let writer = tokio::spawn({
        let windows = windows.clone();
        async move { windows.book_data(StreamId::new(1), 1_000, cancel_on(rx)).await }
    });

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!writer.is_finished());

    // A stream update alone does not help; the connection is exhausted.
    windows.window_update(StreamId::new(1), 1_000).unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(!writer.is_finished());

    windows.window_update(StreamId::CONNECTION, 5_000).unwrap();
    assert!(writer.await.unwrap());
    assert_eq!(windows.connection().available(), 4_000);
    let stream = windows.stream(StreamId::new(1)).unwrap();
    assert_eq!(stream.available(), 100_000 - 65_535 - 1_000 + 1_000);
}

#[tokio::test(start_paused = true)]
async fn closing_a_stream_releases_its_writer() {
    let windows = Arc::new(SendWindows::with_liveness_interval(10, None));
    windows.open_stream(StreamId::new(3));

    let (_keep, rx) = oneshot::channel();
    let writer = tokio::spawn({
        let windows = windows.clone();
        async move { windows.book_data(StreamId::new(3), 100, cancel_on(rx)).await }
    });

    tokio::time::sleep(Duration::from_millis(1)).await;
    windows.close_stream(StreamId::new(3));

    assert!(!writer.await.unwrap());
    assert_eq!(windows.stream_count(), 0);
    assert_eq!(windows.connection().available(), 65_535);
    assert!(!windows.book_data(StreamId::new(3), 1, std::future::pending()).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_never_overspend() {
    const WRITERS: u64 = 16;
    const CHUNK: u32 = 1_000;
    const CHUNKS: u64 = 20;

    let window = Arc::new(
        Window::new(5_000).with_liveness_interval(Some(Duration::from_millis(5))),
    );
    let sent = Arc::new(AtomicU64::new(0));

    let mut writers = Vec::new();
    for _ in 0..WRITERS {
        let window = window.clone();
        let sent = sent.clone();
        writers.push(tokio::spawn(async move {
            for _ in 0..CHUNKS {
                assert!(window.book_window_size(CHUNK, std::future::pending()).await);
                assert!(window.available() >= 0);
                sent.fetch_add(u64::from(CHUNK), Ordering::Relaxed);
            }
        }));
    }

    // Replenish exactly what the writers need, beyond the initial 5,000.
    let total = WRITERS * CHUNKS * u64::from(CHUNK);
    let mut granted = 5_000u64;
    while granted < total {
        tokio::time::sleep(Duration::from_millis(1)).await;
        let increment = (total - granted).min(3_000);
        window.update_window_size(increment as u32).unwrap();
        granted += increment;
    }

    for writer in writers {
        writer.await.unwrap();
    }
    assert_eq!(sent.load(Ordering::Relaxed), total);
    assert_eq!(window.available(), 0);
}
