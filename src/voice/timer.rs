//! Cancellable one-shot timers
//!
//! A [`TimerSlot`] holds at most one pending timer of a given kind. Arming
//! replaces the pending timer, cancelling aborts it. Firings are delivered as
//! [`TimerFired`] messages on the owner's channel and tagged with a
//! generation, so a firing that raced a cancellation is recognised as stale.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Which timer fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Auto-send after silence in a multi-sentence conversation
    Pause,
    /// Passive wake-word listening gave up
    WakeTimeout,
}

/// A timer firing delivered to the owning event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// Timer kind
    pub kind: TimerKind,
    /// Generation the timer was armed with
    pub generation: u64,
}

/// Delivers timer firings into the owner's event queue
///
/// Wraps any unbounded channel whose item can be built from a [`TimerFired`],
/// so firings share one queue with the rest of the owner's events.
#[derive(Clone)]
pub struct TimerSender(Arc<dyn Fn(TimerFired) -> bool + Send + Sync>);

impl TimerSender {
    /// Wrap a channel sender
    #[must_use]
    pub fn new<T>(tx: mpsc::UnboundedSender<T>) -> Self
    where
        T: From<TimerFired> + Send + 'static,
    {
        Self(Arc::new(move |fired| tx.send(T::from(fired)).is_ok()))
    }

    /// Deliver a firing; false if the receiver is gone
    pub fn send(&self, fired: TimerFired) -> bool {
        (self.0)(fired)
    }
}

impl std::fmt::Debug for TimerSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerSender").finish_non_exhaustive()
    }
}

/// Single cancellable timer of one kind
#[derive(Debug)]
pub struct TimerSlot {
    kind: TimerKind,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl TimerSlot {
    /// Create an empty slot
    #[must_use]
    pub const fn new(kind: TimerKind) -> Self {
        Self {
            kind,
            generation: 0,
            pending: None,
        }
    }

    /// Arm the timer, replacing any pending one
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self, after: Duration, tx: &TimerSender) {
        self.cancel();

        let fired = TimerFired {
            kind: self.kind,
            generation: self.generation,
        };
        let tx = tx.clone();

        tracing::trace!(kind = ?self.kind, generation = self.generation, ?after, "timer armed");

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if !tx.send(fired) {
                tracing::trace!(kind = ?fired.kind, "timer receiver dropped");
            }
        }));
    }

    /// Cancel the pending timer, if any
    ///
    /// Bumps the generation so a firing already queued is treated as stale.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
            tracing::trace!(kind = ?self.kind, generation = self.generation, "timer cancelled");
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Accept a firing if it belongs to the currently pending timer
    ///
    /// On acceptance the slot becomes empty; stale firings leave it untouched.
    pub fn accept(&mut self, fired: TimerFired) -> bool {
        if fired.kind != self.kind || fired.generation != self.generation || self.pending.is_none()
        {
            tracing::debug!(kind = ?fired.kind, generation = fired.generation, "ignoring stale timer");
            return false;
        }
        self.pending = None;
        self.generation = self.generation.wrapping_add(1);
        true
    }

    /// Whether a timer is currently pending
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Timer kind held by this slot
    #[must_use]
    pub const fn kind(&self) -> TimerKind {
        self.kind
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
