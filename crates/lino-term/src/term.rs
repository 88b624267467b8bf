// SPDX-License-Identifier: MIT
//
// The `Term` capability trait — everything the editing engine needs
// from a terminal.
//
// The original design question here is the platform split: raw-mode
// handling is genuinely different between a POSIX tty and anything
// else, but the engine above it is not. So the engine depends on this
// trait only, and the backend is chosen at construction time:
// `PosixTerm` for a real tty, `MemTerm` for tests and headless hosts.
//
// Reading is deliberately split off into `TermReader`. The editing
// engine releases its state lock while blocked on input (that is what
// lets another thread print a message or cancel the read), so the
// blocking side must be usable without borrowing the backend itself.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TermError;

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    /// Number of columns (width in character cells).
    pub cols: u16,
    /// Number of rows (height in character cells).
    pub rows: u16,
}

impl Size {
    /// The fallback geometry used when the terminal cannot be queried.
    pub const FALLBACK: Self = Self { cols: 80, rows: 24 };
}

// ─── Reading ────────────────────────────────────────────────────────────────

/// Outcome of a single byte read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    /// One byte of input.
    Byte(u8),
    /// No input arrived within the requested timeout.
    TimedOut,
    /// The input stream is closed.
    Eof,
    /// A [`Waker`] fired while the read was pending.
    Cancelled,
}

/// Blocking byte input, usable while no lock on the backend is held.
///
/// `timeout` of `None` blocks until a byte, end of input, or a wake
/// signal arrives. A timeout firing is a normal, retried condition for
/// the callers (escape disambiguation, cursor-position queries), never
/// a failure.
pub trait TermReader: Send {
    fn read_byte(&mut self, timeout: Option<Duration>) -> io::Result<Poll>;
}

// ─── Waking ─────────────────────────────────────────────────────────────────

/// Backend-specific wake signal target.
pub trait WakeTarget: Send + Sync {
    fn wake(&self);
}

/// Cross-thread handle that interrupts a pending [`TermReader`] read.
///
/// Cloneable and `Send`; signalling it causes the blocked read to
/// return [`Poll::Cancelled`] within the backend's polling bound.
#[derive(Clone)]
pub struct Waker(Arc<dyn WakeTarget>);

impl Waker {
    pub fn new(target: Arc<dyn WakeTarget>) -> Self {
        Self(target)
    }

    /// Interrupt the next (or currently blocked) read.
    pub fn wake(&self) {
        self.0.wake();
    }
}

impl std::fmt::Debug for Waker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Waker")
    }
}

// ─── Term ───────────────────────────────────────────────────────────────────

/// Terminal backend capabilities.
pub trait Term: Send {
    /// Whether input is connected to an interactive terminal.
    fn is_interactive(&self) -> bool;

    /// Switch the terminal to raw mode: no line buffering, no echo, no
    /// signal characters, no output post-processing, reads return after
    /// a single byte.
    ///
    /// # Errors
    ///
    /// [`TermError`] when the input is not a tty, the terminal type is
    /// unsupported, or the mode system call fails. The caller falls
    /// back to plain buffered reads in all three cases.
    fn enter_raw(&mut self) -> Result<(), TermError>;

    /// Restore the mode saved by [`enter_raw`](Self::enter_raw).
    /// Idempotent; a no-op when raw mode is not active.
    fn leave_raw(&mut self);

    /// Whether raw mode is currently active.
    fn is_raw(&self) -> bool;

    /// Current window size for rendering.
    ///
    /// Tries the direct geometry query first. If that reports zero
    /// columns (serial terminals), falls back to an active probe —
    /// query cursor column, jump to column 999, query again, restore —
    /// at most once per session; the probed value is cached until
    /// [`invalidate_size`](Self::invalidate_size).
    fn window_size(&mut self) -> Size;

    /// Bare geometry query with no probe and no cache, usable outside
    /// any edit session. `None` when the terminal cannot report it.
    fn query_size(&self) -> Option<Size>;

    /// Drop the cached size so the next [`window_size`](Self::window_size)
    /// re-probes (used by clear-screen).
    fn invalidate_size(&mut self);

    /// A read handle that does not borrow the backend.
    fn reader(&self) -> Box<dyn TermReader>;

    /// A cross-thread cancellation handle for pending reads.
    fn waker(&self) -> Waker;

    /// Write bytes to the terminal's output.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Write bytes to the error stream.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    fn write_err(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Flush buffered output.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    fn flush(&mut self) -> io::Result<()>;

    /// Sound the terminal bell.
    fn beep(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fallback_size_is_80x24() {
        assert_eq!(Size::FALLBACK, Size { cols: 80, rows: 24 });
    }

    struct Counter(AtomicUsize);
    impl WakeTarget for Counter {
        fn wake(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn waker_clones_share_a_target() {
        let target = Arc::new(Counter(AtomicUsize::new(0)));
        let waker = Waker::new(target.clone());
        let clone = waker.clone();
        waker.wake();
        clone.wake();
        assert_eq!(target.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn poll_is_comparable() {
        assert_eq!(Poll::Byte(b'a'), Poll::Byte(b'a'));
        assert_ne!(Poll::TimedOut, Poll::Eof);
    }
}
