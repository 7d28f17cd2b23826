//! Interrupt waiting and cancellation.

use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::{Context, Poll, Waker};

/// A platform interrupt line bound to one device.
///
/// `wait()` resolves once the device raises its interrupt. Drivers await
/// it once per handler iteration and never hold it across anything else.
pub trait Interrupt {
    /// Wait for the next interrupt.
    fn wait(&self) -> impl Future<Output = ()>;
}

impl<I: Interrupt + ?Sized> Interrupt for &I {
    fn wait(&self) -> impl Future<Output = ()> {
        (**self).wait()
    }
}

pub(crate) type SharedWaker = spin::Mutex<Option<Waker>>;

/// Stops a long-lived driver task.
///
/// Share it (by reference or `Arc`) between the task and whoever shuts it
/// down. Cancellation is sticky.
#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
    waker: SharedWaker,
}

impl CancelToken {
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            waker: spin::Mutex::new(None),
        }
    }

    /// Request cancellation, and wake the task if it's waiting.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(waker) = self.waker.lock().take() {
            waker.wake();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once [`cancel`](Self::cancel) is called.
    pub fn cancelled(&self) -> Cancelled<'_> {
        Cancelled { token: self }
    }

    fn poll_cancelled(&self, cx: &mut Context<'_>) -> Poll<()> {
        if self.is_cancelled() {
            return Poll::Ready(());
        }
        *self.waker.lock() = Some(cx.waker().clone());
        // Checked again in case cancel() ran before the waker was stored.
        if self.is_cancelled() {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

/// Future returned by [`CancelToken::cancelled`].
#[must_use = "futures do nothing unless awaited"]
pub struct Cancelled<'a> {
    token: &'a CancelToken,
}

impl Future for Cancelled<'_> {
    type Output = ();
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.token.poll_cancelled(cx)
    }
}

/// What woke an interrupt-handling task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    Interrupt,
    Cancelled,
}

/// Waits for either an interrupt or cancellation. Cancellation wins ties.
pub(crate) struct Next<'a, F> {
    pub(crate) interrupt: Pin<&'a mut F>,
    pub(crate) token: &'a CancelToken,
}

impl<F: Future<Output = ()>> Future for Next<'_, F> {
    type Output = Wake;
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Wake> {
        if self.token.poll_cancelled(cx).is_ready() {
            return Poll::Ready(Wake::Cancelled);
        }
        match self.interrupt.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(Wake::Interrupt),
            Poll::Pending => Poll::Pending,
        }
    }
}
