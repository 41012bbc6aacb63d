use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::listings::Listing;

/// Outbound delivery of moderation results. Implementations own transport details; the
/// core only logs failures.
pub trait Notifier: Send + Sync {
    /// Broadcasts a freshly approved listing to the public channel.
    fn publish_to_channel(&self, listing: &Listing) -> Result<(), NotifierError>;
    fn notify_user(&self, user_id: u64, title: &str, message: &str) -> Result<(), NotifierError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("notification timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0} notifier calls still in flight; call dropped")]
    Saturated(usize),
}

/// Calls allowed to run at once before new ones are refused.
pub const MAX_IN_FLIGHT: usize = 16;

/// Bounds every call of the wrapped notifier. Each call runs on its own short-lived thread.
/// A call that misses the deadline is reported as [`NotifierError::Timeout`] and is not
/// retried. Threads cannot be cancelled, so a timed-out worker keeps running until the inner
/// notifier returns. At most [`MAX_IN_FLIGHT`] workers exist at once; further calls fail fast
/// with [`NotifierError::Saturated`] until a stuck transport recovers.
pub struct DeadlineNotifier<N> {
    inner: Arc<N>,
    timeout: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: usize,
}

/// Releases a worker slot when the worker ends, including on panic.
struct Slot(Arc<AtomicUsize>);

impl Drop for Slot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<N> DeadlineNotifier<N>
where
    N: Notifier + 'static,
{
    pub fn new(inner: Arc<N>, timeout: Duration) -> Self {
        Self::with_capacity(inner, timeout, MAX_IN_FLIGHT)
    }

    pub fn with_capacity(inner: Arc<N>, timeout: Duration, max_in_flight: usize) -> Self {
        Self {
            inner,
            timeout,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn inner(&self) -> &Arc<N> {
        &self.inner
    }

    /// Workers currently running, including ones whose caller already gave up.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn acquire_slot(&self) -> Result<Slot, NotifierError> {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |running| {
                (running < self.max_in_flight).then_some(running + 1)
            })
            .map(|_| Slot(Arc::clone(&self.in_flight)))
            .map_err(NotifierError::Saturated)
    }

    fn call<F>(&self, call: F) -> Result<(), NotifierError>
    where
        F: FnOnce(&N) -> Result<(), NotifierError> + Send + 'static,
    {
        let slot = self.acquire_slot()?;
        let (sender, receiver) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || {
            let _slot = slot;
            let _ = sender.send(call(&*inner));
        });

        match receiver.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(NotifierError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(NotifierError::Transport(
                "notifier worker exited without a result".to_string(),
            )),
        }
    }
}

impl<N> Notifier for DeadlineNotifier<N>
where
    N: Notifier + 'static,
{
    fn publish_to_channel(&self, listing: &Listing) -> Result<(), NotifierError> {
        let listing = listing.clone();
        self.call(move |inner| inner.publish_to_channel(&listing))
    }

    fn notify_user(&self, user_id: u64, title: &str, message: &str) -> Result<(), NotifierError> {
        let title = title.to_string();
        let message = message.to_string();
        self.call(move |inner| inner.notify_user(user_id, &title, &message))
    }
}
