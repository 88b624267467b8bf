// SPDX-License-Identifier: MIT
//
// In-memory terminal backend.
//
// The second `Term` implementation: scripted input bytes, captured
// output, a fixed window size. Every engine test drives the editor
// through this backend, and it doubles as a stand-in on hosts without
// a tty. Clones share state, so a test can keep a handle for
// inspection after moving the backend into the editor.
//
// Blocking semantics are script-friendly by default: when the input
// script runs dry, a blocking read reports end of input so an edit
// loop terminates instead of hanging. `hold_open()` switches to real
// blocking (condvar wait) for cross-thread cancellation tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::TermError;
use crate::term::{Poll, Size, Term, TermReader, WakeTarget, Waker};

#[derive(Debug)]
struct MemState {
    input: VecDeque<u8>,
    cancelled: bool,
    hold_open: bool,
    interactive: bool,
    raw: bool,
    /// Raw-mode transitions, `true` for enter: lets tests assert that
    /// e.g. completion suspended and resumed raw mode around its
    /// callback.
    mode_log: Vec<bool>,
    size: Size,
    out: Vec<u8>,
    err: Vec<u8>,
    beeps: usize,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<MemState>,
    cond: Condvar,
}

impl WakeTarget for Inner {
    fn wake(&self) {
        if let Ok(mut st) = self.state.lock() {
            st.cancelled = true;
        }
        self.cond.notify_all();
    }
}

/// An in-memory terminal: scripted input, captured output.
#[derive(Clone, Debug)]
pub struct MemTerm {
    inner: Arc<Inner>,
}

impl MemTerm {
    /// A terminal of the given geometry with an empty input script.
    #[must_use]
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(MemState {
                    input: VecDeque::new(),
                    cancelled: false,
                    hold_open: false,
                    interactive: true,
                    raw: false,
                    mode_log: Vec::new(),
                    size: Size { cols, rows },
                    out: Vec::new(),
                    err: Vec::new(),
                    beeps: 0,
                }),
                cond: Condvar::new(),
            }),
        }
    }

    /// Append bytes to the input script (builder form).
    #[must_use]
    pub fn with_input(self, bytes: &[u8]) -> Self {
        self.feed(bytes);
        self
    }

    /// Keep reads blocking when the script is exhausted instead of
    /// reporting end of input (builder form).
    #[must_use]
    pub fn hold_open(self) -> Self {
        self.lock().hold_open = true;
        self
    }

    /// Report stdin as not connected to a terminal (builder form).
    #[must_use]
    pub fn non_interactive(self) -> Self {
        self.lock().interactive = false;
        self
    }

    /// Append bytes to the input script from any thread.
    pub fn feed(&self, bytes: &[u8]) {
        self.lock().input.extend(bytes.iter().copied());
        self.inner.cond.notify_all();
    }

    /// Everything written to the output stream so far.
    #[must_use]
    pub fn output(&self) -> Vec<u8> {
        self.lock().out.clone()
    }

    /// The output stream as (lossy) text.
    #[must_use]
    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.lock().out).into_owned()
    }

    /// Everything written to the error stream so far.
    #[must_use]
    pub fn error_output(&self) -> Vec<u8> {
        self.lock().err.clone()
    }

    /// Clear and return the output stream.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().out)
    }

    /// Number of bell characters sounded.
    #[must_use]
    pub fn beeps(&self) -> usize {
        self.lock().beeps
    }

    /// Raw-mode transition history, `true` for each enter.
    #[must_use]
    pub fn mode_log(&self) -> Vec<bool> {
        self.lock().mode_log.clone()
    }

    /// Change the reported window size (resize simulation).
    pub fn set_size(&self, cols: u16, rows: u16) {
        self.lock().size = Size { cols, rows };
    }

    #[allow(clippy::missing_panics_doc)] // Poisoning is a test-harness bug.
    fn lock(&self) -> std::sync::MutexGuard<'_, MemState> {
        self.inner.state.lock().expect("mem term state poisoned")
    }
}

// ─── Reader ─────────────────────────────────────────────────────────────────

struct MemReader {
    inner: Arc<Inner>,
}

impl TermReader for MemReader {
    fn read_byte(&mut self, timeout: Option<Duration>) -> io::Result<Poll> {
        let mut st = self.inner.state.lock().expect("mem term state poisoned");
        loop {
            if st.cancelled {
                st.cancelled = false;
                return Ok(Poll::Cancelled);
            }
            if let Some(byte) = st.input.pop_front() {
                return Ok(Poll::Byte(byte));
            }
            if !st.hold_open {
                return Ok(if timeout.is_some() {
                    Poll::TimedOut
                } else {
                    Poll::Eof
                });
            }
            match timeout {
                Some(t) => {
                    let (guard, result) = self
                        .inner
                        .cond
                        .wait_timeout(st, t)
                        .expect("mem term state poisoned");
                    st = guard;
                    if result.timed_out() {
                        return Ok(Poll::TimedOut);
                    }
                }
                None => {
                    st = self.inner.cond.wait(st).expect("mem term state poisoned");
                }
            }
        }
    }
}

// ─── Term impl ──────────────────────────────────────────────────────────────

impl Term for MemTerm {
    fn is_interactive(&self) -> bool {
        self.lock().interactive
    }

    fn enter_raw(&mut self) -> Result<(), TermError> {
        let mut st = self.lock();
        if !st.interactive {
            return Err(TermError::NotATerminal);
        }
        if !st.raw {
            st.raw = true;
            st.mode_log.push(true);
        }
        Ok(())
    }

    fn leave_raw(&mut self) {
        let mut st = self.lock();
        if st.raw {
            st.raw = false;
            st.mode_log.push(false);
        }
    }

    fn is_raw(&self) -> bool {
        self.lock().raw
    }

    fn window_size(&mut self) -> Size {
        self.lock().size
    }

    fn query_size(&self) -> Option<Size> {
        Some(self.lock().size)
    }

    fn invalidate_size(&mut self) {}

    fn reader(&self) -> Box<dyn TermReader> {
        Box::new(MemReader {
            inner: Arc::clone(&self.inner),
        })
    }

    fn waker(&self) -> Waker {
        Waker::new(self.inner.clone())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.lock().out.extend_from_slice(bytes);
        Ok(())
    }

    fn write_err(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.lock().err.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn beep(&mut self) {
        self.lock().beeps += 1;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scripted_bytes_come_back_in_order() {
        let term = MemTerm::new(80, 24).with_input(b"ab");
        let mut reader = term.reader();
        assert_eq!(reader.read_byte(None).unwrap(), Poll::Byte(b'a'));
        assert_eq!(reader.read_byte(None).unwrap(), Poll::Byte(b'b'));
        assert_eq!(reader.read_byte(None).unwrap(), Poll::Eof);
    }

    #[test]
    fn exhausted_script_times_out_with_a_timeout() {
        let term = MemTerm::new(80, 24);
        let mut reader = term.reader();
        assert_eq!(
            reader
                .read_byte(Some(Duration::from_millis(1)))
                .unwrap(),
            Poll::TimedOut
        );
    }

    #[test]
    fn wake_interrupts_before_input() {
        let term = MemTerm::new(80, 24).with_input(b"x");
        term.waker().wake();
        let mut reader = term.reader();
        assert_eq!(reader.read_byte(None).unwrap(), Poll::Cancelled);
        // The wake is one-shot; the scripted byte follows.
        assert_eq!(reader.read_byte(None).unwrap(), Poll::Byte(b'x'));
    }

    #[test]
    fn hold_open_blocks_until_fed() {
        let term = MemTerm::new(80, 24).hold_open();
        let feeder = term.clone();
        let mut reader = term.reader();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            feeder.feed(b"z");
        });
        assert_eq!(reader.read_byte(None).unwrap(), Poll::Byte(b'z'));
        handle.join().unwrap();
    }

    #[test]
    fn hold_open_wake_unblocks() {
        let term = MemTerm::new(80, 24).hold_open();
        let waker = term.waker();
        let mut reader = term.reader();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            waker.wake();
        });
        assert_eq!(reader.read_byte(None).unwrap(), Poll::Cancelled);
        handle.join().unwrap();
    }

    #[test]
    fn clones_share_output() {
        let term = MemTerm::new(80, 24);
        let probe = term.clone();
        let mut boxed: Box<dyn Term> = Box::new(term);
        boxed.write(b"hello").unwrap();
        assert_eq!(probe.output(), b"hello");
    }

    #[test]
    fn raw_mode_transitions_are_logged() {
        let mut term = MemTerm::new(80, 24);
        term.enter_raw().unwrap();
        term.leave_raw();
        term.enter_raw().unwrap();
        assert_eq!(term.mode_log(), vec![true, false, true]);
    }

    #[test]
    fn non_interactive_refuses_raw_mode() {
        let mut term = MemTerm::new(80, 24).non_interactive();
        assert!(matches!(
            term.enter_raw(),
            Err(TermError::NotATerminal)
        ));
    }
}
