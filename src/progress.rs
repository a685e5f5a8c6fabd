// src/progress.rs

//! Progress reporting and cooperative cancellation
//!
//! Long-running archive operations report through a [`ProgressListener`].
//! The listener carries three operations: publish a percentage, request
//! cancellation, and answer whether cancellation was requested. The builder
//! polls `is_cancelled()` between content entries and between copy chunks.
//!
//! Implementations:
//! - `SilentProgress`: records state only
//! - `LogProgress`: logs to tracing at 10% steps
//! - `CallbackProgress`: forwards events to a closure (CLI bars, GUIs)

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::info;

/// Listener for percent progress with cooperative cancellation
///
/// Implementations must be thread-safe so a caller can cancel from another
/// thread while the operation runs.
pub trait ProgressListener: Send + Sync {
    /// Report overall completion, 0..=100
    fn publish(&self, percent: u8);

    /// Request cancellation; the operation stops at its next poll point
    fn cancel(&self, reason: &str);

    /// Whether cancellation has been requested
    fn is_cancelled(&self) -> bool;
}

/// Shared cancellation state used by the listener implementations
#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl CancelState {
    fn cancel(&self, reason: &str) {
        if let Ok(mut slot) = self.reason.lock() {
            slot.get_or_insert_with(|| reason.to_string());
        }
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn reason(&self) -> Option<String> {
        self.reason.lock().ok().and_then(|r| r.clone())
    }
}

/// Silent progress listener (no output)
#[derive(Debug, Default)]
pub struct SilentProgress {
    percent: AtomicU8,
    state: CancelState,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last published percentage
    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    /// Reason given to the first `cancel` call
    pub fn cancel_reason(&self) -> Option<String> {
        self.state.reason()
    }
}

impl ProgressListener for SilentProgress {
    fn publish(&self, percent: u8) {
        self.percent.store(percent.min(100), Ordering::Relaxed);
    }

    fn cancel(&self, reason: &str) {
        self.state.cancel(reason);
    }

    fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

/// Logging progress listener
///
/// Logs at info level whenever progress crosses a 10% boundary.
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    last_logged: AtomicU8,
    state: CancelState,
}

impl LogProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_logged: AtomicU8::new(0),
            state: CancelState::default(),
        }
    }
}

impl ProgressListener for LogProgress {
    fn publish(&self, percent: u8) {
        let percent = percent.min(100);
        let previous = self.last_logged.load(Ordering::Relaxed);
        if percent / 10 > previous / 10 {
            self.last_logged.store(percent, Ordering::Relaxed);
            info!("{}: {}%", self.name, percent);
        }
    }

    fn cancel(&self, reason: &str) {
        info!("{}: cancelled - {}", self.name, reason);
        self.state.cancel(reason);
    }

    fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

/// Events emitted by [`CallbackProgress`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Completion changed
    Percent(u8),
    /// Cancellation requested
    Cancelled(String),
}

/// Callback-based progress listener
///
/// Calls a user-provided function on every change. Repeated publishes of
/// the same percentage are coalesced.
pub struct CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    callback: F,
    last: AtomicU8,
    state: CancelState,
}

impl<F> CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            last: AtomicU8::new(0),
            state: CancelState::default(),
        }
    }
}

impl<F> ProgressListener for CallbackProgress<F>
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn publish(&self, percent: u8) {
        let percent = percent.min(100);
        if self.last.swap(percent, Ordering::Relaxed) != percent {
            (self.callback)(ProgressEvent::Percent(percent));
        }
    }

    fn cancel(&self, reason: &str) {
        self.state.cancel(reason);
        (self.callback)(ProgressEvent::Cancelled(reason.to_string()));
    }

    fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

/// Byte accounting that turns work done into a published percentage
///
/// A fixed share is reserved for the manifest entry; the rest is spread over
/// the estimated content bytes.
pub(crate) struct ProgressMeter<'a> {
    listener: &'a dyn ProgressListener,
    total: u64,
    done: AtomicU64,
    base: u8,
}

impl<'a> ProgressMeter<'a> {
    /// Share of progress credited once the manifest entry is written
    pub const MANIFEST_SHARE: u8 = 5;

    pub fn new(listener: &'a dyn ProgressListener, total: u64) -> Self {
        Self {
            listener,
            total,
            done: AtomicU64::new(0),
            base: 0,
        }
    }

    pub fn manifest_written(&mut self) {
        self.base = Self::MANIFEST_SHARE;
        self.listener.publish(self.base);
    }

    pub fn advance(&self, bytes: u64) {
        let done = self.done.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.listener.publish(self.percent_for(done));
    }

    pub fn is_cancelled(&self) -> bool {
        self.listener.is_cancelled()
    }

    fn percent_for(&self, done: u64) -> u8 {
        let span = u64::from(100 - self.base);
        if self.total == 0 {
            return self.base;
        }
        let share = (done.min(self.total) * span) / self.total;
        self.base + share as u8
    }

    pub fn finish(&self) {
        self.listener.publish(100);
    }
}
