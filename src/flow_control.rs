//! HTTP/2 send-side flow control.
//!
//! HTTP/2 uses a credit-based flow control scheme. Each side maintains a
//! send window per stream and one for the connection; DATA may only be sent
//! once both have room. A [`Window`] is shared between the tasks writing
//! DATA (which book window) and the task reading frames (which applies
//! WINDOW_UPDATE and SETTINGS).
//!
//! Bookings are served in arrival order. A booking that does not fit waits
//! for an update while holding the reservation gate, so a small late request
//! cannot starve a large early one.

use std::collections::HashMap;
use std::future::Future;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::frame::{DEFAULT_INITIAL_WINDOW_SIZE, ErrorCode, MAX_WINDOW_SIZE, StreamId};
use crate::metrics::{FLOW_CONTROL_CANCELLED, FLOW_CONTROL_WAITS};

/// Default interval between re-checks while waiting for window.
pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_millis(500);

/// Flow control errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FlowControlError {
    /// The window would exceed 2^31 - 1 (RFC 9113 Section 6.9.1).
    #[error("window update of {increment} overflows window {window}")]
    WindowOverflow { window: i64, increment: i64 },
    /// The window was disposed; its stream or connection is gone.
    #[error("window disposed")]
    Disposed,
}

impl FlowControlError {
    /// The error code to reset the stream or connection with.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            FlowControlError::WindowOverflow { .. } => ErrorCode::FlowControlError,
            FlowControlError::Disposed => ErrorCode::StreamClosed,
        }
    }
}

/// Observable state of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Positive budget available.
    Open,
    /// Zero, or negative after a SETTINGS shrink.
    Exhausted,
    /// No further bookings are possible.
    Disposed,
}

/// A send window shared by the tasks that consume and replenish it.
#[derive(Debug)]
pub struct Window {
    /// Signed: a SETTINGS_INITIAL_WINDOW_SIZE decrease may push it below zero.
    available: Mutex<i64>,
    disposed: AtomicBool,
    /// Woken on every increase and on disposal.
    notify: Notify,
    /// Reservation gate. Tokio's mutex is fair, so waiters are served FIFO.
    gate: tokio::sync::Mutex<()>,
    /// Re-check interval while waiting; `None` relies on wake-ups alone.
    liveness_interval: Option<Duration>,
}

impl Default for Window {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_WINDOW_SIZE)
    }
}

impl Window {
    /// Create a window with the given initial size.
    pub fn new(initial_size: u32) -> Self {
        Self::with_available(i64::from(initial_size))
    }

    fn with_available(available: i64) -> Self {
        Self {
            available: Mutex::new(available),
            disposed: AtomicBool::new(false),
            notify: Notify::new(),
            gate: tokio::sync::Mutex::new(()),
            liveness_interval: Some(DEFAULT_LIVENESS_INTERVAL),
        }
    }

    /// Set the interval between re-checks while waiting, or `None` to wait
    /// for wake-ups only.
    pub fn with_liveness_interval(mut self, interval: Option<Duration>) -> Self {
        self.liveness_interval = interval;
        self
    }

    /// Current budget. May be negative.
    pub fn available(&self) -> i64 {
        *self.available.lock()
    }

    pub fn state(&self) -> WindowState {
        if self.is_disposed() {
            WindowState::Disposed
        } else if self.available() > 0 {
            WindowState::Open
        } else {
            WindowState::Exhausted
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Apply a WINDOW_UPDATE increment and wake pending bookings.
    ///
    /// Returns the new budget.
    pub fn update_window_size(&self, increment: u32) -> Result<i64, FlowControlError> {
        self.adjust(i64::from(increment))
    }

    /// Shift the window by a signed delta, as a change of
    /// SETTINGS_INITIAL_WINDOW_SIZE requires. The result may be negative.
    pub fn adjust(&self, delta: i64) -> Result<i64, FlowControlError> {
        if self.is_disposed() {
            return Err(FlowControlError::Disposed);
        }

        let updated = {
            let mut available = self.available.lock();
            let updated = *available + delta;
            if updated > i64::from(MAX_WINDOW_SIZE) {
                return Err(FlowControlError::WindowOverflow {
                    window: *available,
                    increment: delta,
                });
            }
            *available = updated;
            updated
        };

        tracing::trace!(delta, available = updated, "window adjusted");
        if delta > 0 {
            self.notify.notify_waiters();
        }
        Ok(updated)
    }

    /// Return part of a booking that was not sent.
    pub fn release(&self, amount: u32) -> Result<i64, FlowControlError> {
        self.adjust(i64::from(amount))
    }

    /// Reserve `requested` bytes of window.
    ///
    /// Waits until the budget covers the whole request, then deducts it.
    /// Returns `false` without reserving anything if `cancel` completes
    /// first or the window is disposed.
    pub async fn book_window_size<C>(&self, requested: u32, cancel: C) -> bool
    where
        C: Future<Output = ()>,
    {
        let cancel = pin!(cancel);
        self.book(requested, cancel).await
    }

    pub(crate) async fn book<C>(&self, requested: u32, mut cancel: Pin<&mut C>) -> bool
    where
        C: Future<Output = ()>,
    {
        if self.is_disposed() {
            return false;
        }
        let requested = i64::from(requested);

        let _gate = tokio::select! {
            biased;
            _ = cancel.as_mut() => {
                FLOW_CONTROL_CANCELLED.increment();
                return false;
            }
            guard = self.gate.lock() => guard,
        };

        let mut waited = false;
        loop {
            // Register interest before checking so an update landing between
            // the check and the wait is not missed.
            let notified = self.notify.notified();
            let mut notified = pin!(notified);
            notified.as_mut().enable();

            if self.is_disposed() {
                return false;
            }

            {
                let mut available = self.available.lock();
                if *available >= requested {
                    *available -= requested;
                    tracing::trace!(requested, available = *available, "window booked");
                    return true;
                }
                if !waited {
                    tracing::debug!(requested, available = *available, "waiting for window");
                }
            }

            if !waited {
                FLOW_CONTROL_WAITS.increment();
                waited = true;
            }

            let liveness = async {
                match self.liveness_interval {
                    Some(interval) => tokio::time::sleep(interval).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                _ = cancel.as_mut() => {
                    FLOW_CONTROL_CANCELLED.increment();
                    tracing::debug!(requested, "window booking cancelled");
                    return false;
                }
                _ = notified => {}
                _ = liveness => {}
            }
        }
    }

    /// Release waiters and refuse further bookings. Pending and future
    /// bookings return `false`.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            tracing::trace!("window disposed");
            self.notify.notify_waiters();
        }
    }
}

#[derive(Debug)]
struct Streams {
    initial_window_size: i64,
    windows: HashMap<StreamId, Arc<Window>>,
}

/// The send windows of one connection: the connection window plus one
/// window per open stream.
#[derive(Debug)]
pub struct SendWindows {
    connection: Arc<Window>,
    streams: Mutex<Streams>,
    liveness_interval: Option<Duration>,
}

impl Default for SendWindows {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_WINDOW_SIZE)
    }
}

impl SendWindows {
    /// Create the windows for a connection whose peer advertised
    /// `initial_window_size` for streams. The connection window always
    /// starts at 65,535.
    pub fn new(initial_window_size: u32) -> Self {
        Self::with_liveness_interval(initial_window_size, Some(DEFAULT_LIVENESS_INTERVAL))
    }

    pub fn with_liveness_interval(initial_window_size: u32, interval: Option<Duration>) -> Self {
        Self {
            connection: Arc::new(
                Window::new(DEFAULT_INITIAL_WINDOW_SIZE).with_liveness_interval(interval),
            ),
            streams: Mutex::new(Streams {
                initial_window_size: i64::from(initial_window_size),
                windows: HashMap::new(),
            }),
            liveness_interval: interval,
        }
    }

    /// The connection-level window.
    pub fn connection(&self) -> &Arc<Window> {
        &self.connection
    }

    /// The window of an open stream.
    pub fn stream(&self, id: StreamId) -> Option<Arc<Window>> {
        self.streams.lock().windows.get(&id).cloned()
    }

    /// Open a stream window at the current initial size. Opening an already
    /// open stream returns its existing window.
    pub fn open_stream(&self, id: StreamId) -> Arc<Window> {
        let mut streams = self.streams.lock();
        // The initial size may have been shrunk below zero by SETTINGS; a new
        // stream starts from the same (possibly negative) base.
        let initial = streams.initial_window_size;
        let interval = self.liveness_interval;
        streams
            .windows
            .entry(id)
            .or_insert_with(|| {
                Arc::new(Window::with_available(initial).with_liveness_interval(interval))
            })
            .clone()
    }

    /// Close a stream, releasing anything waiting on its window.
    pub fn close_stream(&self, id: StreamId) {
        if let Some(window) = self.streams.lock().windows.remove(&id) {
            window.dispose();
        }
    }

    /// Number of open stream windows.
    pub fn stream_count(&self) -> usize {
        self.streams.lock().windows.len()
    }

    /// Route a received WINDOW_UPDATE. Stream 0 addresses the connection.
    ///
    /// Returns `Ok(None)` for streams that are not open; such updates are
    /// ignored (RFC 9113 Section 6.9).
    pub fn window_update(
        &self,
        stream_id: StreamId,
        increment: u32,
    ) -> Result<Option<i64>, FlowControlError> {
        if stream_id.is_connection_level() {
            return self.connection.update_window_size(increment).map(Some);
        }

        match self.stream(stream_id) {
            Some(window) => window.update_window_size(increment).map(Some),
            None => Ok(None),
        }
    }

    /// Apply a change of SETTINGS_INITIAL_WINDOW_SIZE to every open stream
    /// and to streams opened later. The connection window is unaffected
    /// (RFC 9113 Section 6.9.2).
    ///
    /// If any open stream would overflow nothing is changed.
    pub fn apply_initial_window_delta(&self, delta: i64) -> Result<(), FlowControlError> {
        let mut streams = self.streams.lock();

        for window in streams.windows.values().filter(|w| !w.is_disposed()) {
            let available = window.available();
            if available + delta > i64::from(MAX_WINDOW_SIZE) {
                return Err(FlowControlError::WindowOverflow {
                    window: available,
                    increment: delta,
                });
            }
        }

        streams.initial_window_size += delta;

        tracing::debug!(
            delta,
            initial_window_size = streams.initial_window_size,
            streams = streams.windows.len(),
            "applying initial window delta"
        );

        for window in streams.windows.values() {
            match window.adjust(delta) {
                Ok(_) | Err(FlowControlError::Disposed) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Book `len` bytes of DATA on a stream: first its own window, then the
    /// connection window. If the connection booking fails the stream booking
    /// is refunded.
    pub async fn book_data<C>(&self, stream_id: StreamId, len: u32, cancel: C) -> bool
    where
        C: Future<Output = ()>,
    {
        let Some(stream) = self.stream(stream_id) else {
            return false;
        };

        let mut cancel = pin!(cancel);
        if !stream.book(len, cancel.as_mut()).await {
            return false;
        }

        if self.connection.book(len, cancel.as_mut()).await {
            return true;
        }

        match stream.release(len) {
            // The stream is gone and nobody will book from it.
            Ok(_) | Err(FlowControlError::Disposed) => {}
            Err(e) => {
                tracing::warn!(
                    stream_id = stream_id.value(),
                    len,
                    error = %e,
                    "stream window refund dropped"
                );
            }
        }
        false
    }

    /// Dispose every window of the connection.
    pub fn dispose(&self) {
        self.connection.dispose();
        for window in self.streams.lock().windows.values() {
            window.dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::pending;

    #[tokio::test]
    async fn test_book_immediate() {
        let window = Window::new(100);
        assert!(window.book_window_size(60, pending()).await);
        assert_eq!(window.available(), 40);
        assert_eq!(window.state(), WindowState::Open);
    }

    #[tokio::test]
    async fn test_book_exact_exhausts() {
        let window = Window::new(100);
        assert!(window.book_window_size(100, pending()).await);
        assert_eq!(window.available(), 0);
        assert_eq!(window.state(), WindowState::Exhausted);
    }

    #[tokio::test]
    async fn test_book_zero_always_succeeds() {
        let window = Window::new(0);
        assert!(window.book_window_size(0, pending()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_book_waits_for_update() {
        let window = Arc::new(Window::new(100));
        assert!(window.book_window_size(60, pending()).await);

        let waiter = {
            let window = window.clone();
            tokio::spawn(async move { window.book_window_size(60, pending()).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        assert_eq!(window.available(), 40);

        window.update_window_size(20).unwrap();
        assert!(waiter.await.unwrap());
        assert_eq!(window.available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_book_cancelled() {
        let window = Arc::new(Window::new(40));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let waiter = {
            let window = window.clone();
            tokio::spawn(async move {
                window
                    .book_window_size(60, async {
                        let _ = rx.await;
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        tx.send(()).unwrap();
        assert!(!waiter.await.unwrap());
        assert_eq!(window.available(), 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_window() {
        let window = Arc::new(Window::new(100));
        assert_eq!(window.adjust(-150).unwrap(), -50);
        assert_eq!(window.state(), WindowState::Exhausted);

        let waiter = {
            let window = window.clone();
            tokio::spawn(async move { window.book_window_size(10, pending()).await })
        };

        window.update_window_size(30).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        window.update_window_size(40).unwrap();
        assert!(waiter.await.unwrap());
        assert_eq!(window.available(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bookings_served_in_order() {
        let window = Arc::new(Window::new(0));

        let first = {
            let window = window.clone();
            tokio::spawn(async move { window.book_window_size(60, pending()).await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        let second = {
            let window = window.clone();
            tokio::spawn(async move { window.book_window_size(10, pending()).await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;

        // Enough for the second but not the first: nobody proceeds.
        window.update_window_size(10).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!first.is_finished());
        assert!(!second.is_finished());

        window.update_window_size(50).unwrap();
        assert!(first.await.unwrap());
        assert_eq!(window.available(), 0);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!second.is_finished());

        window.update_window_size(10).unwrap();
        assert!(second.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wakeup_without_liveness_poll() {
        let window = Arc::new(Window::new(0).with_liveness_interval(None));

        let waiter = {
            let window = window.clone();
            tokio::spawn(async move { window.book_window_size(5, pending()).await })
        };
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!waiter.is_finished());

        window.update_window_size(5).unwrap();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_releases_waiters() {
        let window = Arc::new(Window::new(0));

        let waiter = {
            let window = window.clone();
            tokio::spawn(async move { window.book_window_size(1, pending()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        window.dispose();
        assert!(!waiter.await.unwrap());
        assert_eq!(window.state(), WindowState::Disposed);
        assert!(!window.book_window_size(0, pending()).await);
        assert_eq!(window.update_window_size(1), Err(FlowControlError::Disposed));
    }

    #[test]
    fn test_update_overflow() {
        let window = Window::new(MAX_WINDOW_SIZE);
        assert_eq!(
            window.update_window_size(1),
            Err(FlowControlError::WindowOverflow {
                window: i64::from(MAX_WINDOW_SIZE),
                increment: 1
            })
        );
        assert_eq!(window.available(), i64::from(MAX_WINDOW_SIZE));
        assert_eq!(
            FlowControlError::WindowOverflow {
                window: 0,
                increment: 0
            }
            .error_code(),
            ErrorCode::FlowControlError
        );
    }

    #[test]
    fn test_window_update_routing() {
        let windows = SendWindows::new(1000);
        windows.open_stream(StreamId::new(1));

        assert_eq!(windows.window_update(StreamId::CONNECTION, 10).unwrap(), Some(65_545));
        assert_eq!(windows.window_update(StreamId::new(1), 10).unwrap(), Some(1010));
        assert_eq!(windows.window_update(StreamId::new(3), 10).unwrap(), None);
    }

    #[test]
    fn test_initial_window_delta() {
        let windows = SendWindows::new(1000);
        let stream = windows.open_stream(StreamId::new(1));

        windows.apply_initial_window_delta(-1500).unwrap();
        assert_eq!(stream.available(), -500);
        assert_eq!(windows.connection().available(), 65_535);

        // New streams start from the adjusted base.
        let later = windows.open_stream(StreamId::new(3));
        assert_eq!(later.available(), -500);

        windows.apply_initial_window_delta(2000).unwrap();
        assert_eq!(stream.available(), 1500);
        assert_eq!(later.available(), 1500);
    }

    #[test]
    fn test_initial_window_delta_overflow_changes_nothing() {
        let windows = SendWindows::new(1000);
        let full = windows.open_stream(StreamId::new(1));
        let other = windows.open_stream(StreamId::new(5));
        full.update_window_size(MAX_WINDOW_SIZE - 1000).unwrap();

        assert_eq!(
            windows.apply_initial_window_delta(10),
            Err(FlowControlError::WindowOverflow {
                window: i64::from(MAX_WINDOW_SIZE),
                increment: 10
            })
        );
        assert_eq!(full.available(), i64::from(MAX_WINDOW_SIZE));
        assert_eq!(other.available(), 1000);
        assert_eq!(windows.open_stream(StreamId::new(3)).available(), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_book_data_refund_overflow() {
        let windows = Arc::new(SendWindows::new(1000));
        let stream = windows.open_stream(StreamId::new(1));
        windows.connection().adjust(-65_535).unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let writer = {
            let windows = windows.clone();
            tokio::spawn(async move {
                windows
                    .book_data(StreamId::new(1), 1000, async {
                        let _ = rx.await;
                    })
                    .await
            })
        };

        // The stream booking is in; the writer waits on the connection.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(stream.available(), 0);
        stream.update_window_size(MAX_WINDOW_SIZE).unwrap();

        tx.send(()).unwrap();
        assert!(!writer.await.unwrap());
        assert_eq!(stream.available(), i64::from(MAX_WINDOW_SIZE));
        assert_eq!(windows.connection().available(), 0);
    }

    #[test]
    fn test_close_stream_disposes() {
        let windows = SendWindows::new(1000);
        let stream = windows.open_stream(StreamId::new(1));
        assert_eq!(windows.stream_count(), 1);

        windows.close_stream(StreamId::new(1));
        assert_eq!(stream.state(), WindowState::Disposed);
        assert!(windows.stream(StreamId::new(1)).is_none());
        assert_eq!(windows.stream_count(), 0);
    }

    #[tokio::test]
    async fn test_book_data_books_both_windows() {
        let windows = SendWindows::new(1000);
        let stream = windows.open_stream(StreamId::new(1));

        assert!(windows.book_data(StreamId::new(1), 400, pending()).await);
        assert_eq!(stream.available(), 600);
        assert_eq!(windows.connection().available(), 65_135);

        assert!(!windows.book_data(StreamId::new(3), 1, pending()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_book_data_refunds_stream_on_cancel() {
        let windows = SendWindows::new(100_000);
        let stream = windows.open_stream(StreamId::new(1));

        let cancel = tokio::time::sleep(Duration::from_secs(1));
        assert!(!windows.book_data(StreamId::new(1), 70_000, cancel).await);
        assert_eq!(stream.available(), 100_000);
        assert_eq!(windows.connection().available(), 65_535);
    }
}
