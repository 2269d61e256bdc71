//! Progress reporting and cooperative cancellation for long-running runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Receives `(message, fraction)` updates; fractions never decrease within a run
pub trait ProgressSink: Send {
    fn report(&mut self, message: &str, fraction: f64);
}

impl<F> ProgressSink for F
where
    F: FnMut(&str, f64) + Send,
{
    fn report(&mut self, message: &str, fraction: f64) {
        self(message, fraction)
    }
}

/// Discards all updates
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&mut self, _message: &str, _fraction: f64) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub message: String,
    pub fraction: f64,
}

/// Worker-side end of a progress channel
pub struct ChannelProgress {
    sender: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ProgressSink for ChannelProgress {
    fn report(&mut self, message: &str, fraction: f64) {
        // A dropped receiver only means nobody is watching any more
        let _ = self.sender.send(ProgressUpdate {
            message: message.to_string(),
            fraction,
        });
    }
}

/// Progress channel between the worker and the interactive side.
/// The receiver yields `None` once the worker drops its sink.
pub fn channel() -> (ChannelProgress, mpsc::UnboundedReceiver<ProgressUpdate>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (ChannelProgress { sender }, receiver)
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: f64,
    span: f64,
    local: f64,
}

/// Maps stage-local fractions onto the run's `[0, 1]` range and keeps the
/// reported fraction non-decreasing.
pub struct Progress<'a> {
    sink: &'a mut dyn ProgressSink,
    windows: Vec<Window>,
    last: f64,
}

impl<'a> Progress<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self {
            sink,
            windows: vec![Window { start: 0.0, span: 1.0, local: 0.0 }],
            last: 0.0,
        }
    }

    fn current(&self) -> Window {
        self.windows.last().copied().unwrap_or(Window { start: 0.0, span: 1.0, local: 0.0 })
    }

    /// Narrow reporting to `[from, to]` of the current window
    pub fn push_window(&mut self, from: f64, to: f64) {
        let parent = self.current();
        let from = from.clamp(0.0, 1.0);
        let to = to.clamp(from, 1.0);
        self.windows.push(Window {
            start: parent.start + parent.span * from,
            span: parent.span * (to - from),
            local: 0.0,
        });
    }

    pub fn pop_window(&mut self) {
        if self.windows.len() > 1 {
            self.windows.pop();
        }
    }

    /// Report a fraction local to the current window
    pub fn set(&mut self, message: &str, local: f64) {
        let local = local.clamp(0.0, 1.0);
        if let Some(window) = self.windows.last_mut() {
            window.local = local;
        }
        let window = self.current();
        let absolute = (window.start + window.span * local).max(self.last).min(1.0);
        self.last = absolute;
        self.sink.report(message, absolute);
    }

    /// Advance the current window by `delta`
    pub fn advance(&mut self, message: &str, delta: f64) {
        let local = self.current().local + delta;
        self.set(message, local);
    }

    /// Repeat the last fraction with a new message
    pub fn message(&mut self, message: &str) {
        let last = self.last;
        self.sink.report(message, last);
    }
}

/// Shared cancellation flag, polled at chunk and batch boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Terminal outcome of a cancellable run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome<T> {
    Completed(T),
    Cancelled,
}

impl<T> RunOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled)
    }

    pub fn completed(self) -> Option<T> {
        match self {
            RunOutcome::Completed(value) => Some(value),
            RunOutcome::Cancelled => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> RunOutcome<U> {
        match self {
            RunOutcome::Completed(value) => RunOutcome::Completed(f(value)),
            RunOutcome::Cancelled => RunOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_map_to_absolute_range() {
        let mut seen = Vec::new();
        {
            let mut sink = |_: &str, f: f64| seen.push(f);
            let mut progress = Progress::new(&mut sink);
            progress.push_window(0.0, 0.5);
            progress.set("half of first half", 0.5);
            progress.pop_window();
            progress.push_window(0.5, 1.0);
            progress.advance("a", 0.5);
            progress.advance("b", 0.5);
            progress.pop_window();
        }
        assert_eq!(seen, vec![0.25, 0.75, 1.0]);
    }

    #[test]
    fn test_fractions_never_decrease() {
        let mut seen = Vec::new();
        {
            let mut sink = |_: &str, f: f64| seen.push(f);
            let mut progress = Progress::new(&mut sink);
            progress.set("up", 0.6);
            progress.set("down", 0.2);
            progress.advance("over", 5.0);
        }
        assert_eq!(seen, vec![0.6, 0.6, 1.0]);
    }

    #[tokio::test]
    async fn test_channel_delivers_updates() {
        let (mut sink, mut receiver) = channel();
        sink.report("hello", 0.5);
        drop(sink);
        let update = receiver.recv().await.unwrap();
        assert_eq!(update.message, "hello");
        assert_eq!(update.fraction, 0.5);
        assert!(receiver.recv().await.is_none());
    }

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
