//! Per-call deadline and cancellation
//!
//! Cancelling a context, or letting its deadline pass, cancels every context
//! derived from it.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time;

/// Pass this as first parameter to all async trait methods and down into
/// network calls so cancellation reaches the transport
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, done_rx) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                done: done_rx,
                done_tx,
            }),
        }
    }

    /// Derive a context that is cancelled once `timeout` elapses.
    /// Must be called from within a tokio runtime.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };

        let (done_tx, done_rx) = watch::channel(self.is_cancelled());

        let timer_tx = done_tx.clone();
        let mut parent_done = self.done();
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep_until(deadline.into()) => {}
                _ = async {
                    while !*parent_done.borrow_and_update() {
                        if parent_done.changed().await.is_err() {
                            std::future::pending::<()>().await;
                        }
                    }
                } => {}
                _ = timer_tx.closed() => return,
            }
            let _ = timer_tx.send(true);
        });

        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                done: done_rx,
                done_tx,
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left before the deadline, `None` when the context has no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns a channel that's closed when work done on behalf of this
    /// context should be cancelled
    pub fn done(&self) -> watch::Receiver<bool> {
        self.inner.done.clone()
    }

    /// Resolves once the context is cancelled or its deadline passes.
    /// Intended for `tokio::select!` around in-flight work.
    pub async fn cancelled(&self) {
        let mut done = self.done();
        while !*done.borrow_and_update() {
            if done.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    pub fn cancel(&self) {
        let _ = self.inner.done_tx.send(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
