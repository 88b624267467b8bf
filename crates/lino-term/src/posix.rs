// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// POSIX terminal backend — termios raw mode, poll-based reads, and the
// self-pipe wake channel.
//
// Safety: this module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), ioctl (TIOCGWINSZ), isatty, pipe, poll, and raw fd reads
// and writes. These are the standard POSIX interfaces for terminal
// control — there is no safe alternative. Each unsafe block is minimal.
//
// The wake channel is a pipe whose read end is polled alongside stdin.
// Any thread can write a byte to the other end; a read blocked in
// `poll()` then returns immediately with `Poll::Cancelled` instead of a
// keypress. This is what makes a blocked `read_line` cancellable from
// outside without signals or timeouts on the read itself.
//
// Raw mode restoration must survive both orderly shutdown and panics.
// `Drop` handles the former. For the latter a process-wide panic hook
// restores the saved termios from a global backup before the original
// hook prints its message to a then-working terminal.

use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use crate::error::TermError;
use crate::term::{Poll, Size, Term, TermReader, WakeTarget, Waker};

/// Timeout for each byte of a cursor-position report.
const CURSOR_REPORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Terminal types that cannot handle our escape sequences.
const UNSUPPORTED_TERMS: &[&str] = &["dumb", "cons25"];

// ─── Panic-safe restore ─────────────────────────────────────────────────────

/// Global backup of the original termios for the panic hook, which has
/// no access to the `PosixTerm` that saved it.
static TERMIOS_BACKUP: Mutex<Option<libc::termios>> = Mutex::new(None);

/// Panic hook guard — installed at most once per process.
static PANIC_HOOK_INSTALLED: Once = Once::new();

fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_termios_from_backup();
            original(info);
        }));
    });
}

/// Restore termios from the global backup. Best-effort.
fn restore_termios_from_backup() {
    if let Ok(guard) = TERMIOS_BACKUP.lock() {
        if let Some(ref orig) = *guard {
            unsafe {
                let _ = libc::tcsetattr(libc::STDIN_FILENO, libc::TCSADRAIN, orig);
            }
        }
    }
}

// ─── Wake pipe ──────────────────────────────────────────────────────────────

/// The self-pipe used to interrupt pending reads.
struct WakePipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl WakePipe {
    fn new() -> io::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        let rc = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        for fd in fds {
            unsafe {
                libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC);
            }
        }
        // Safety: the fds were just returned by pipe() and are owned here.
        unsafe {
            Ok(Self {
                read: OwnedFd::from_raw_fd(fds[0]),
                write: OwnedFd::from_raw_fd(fds[1]),
            })
        }
    }

    /// Consume one pending wake byte, if any.
    fn drain_one(&self) {
        let mut byte = 0u8;
        unsafe {
            let _ = libc::read(self.read.as_raw_fd(), (&raw mut byte).cast(), 1);
        }
    }
}

impl WakeTarget for WakePipe {
    fn wake(&self) {
        let byte = 0u8;
        unsafe {
            let _ = libc::write(self.write.as_raw_fd(), (&raw const byte).cast(), 1);
        }
    }
}

// ─── Reader ─────────────────────────────────────────────────────────────────

/// Byte reads from stdin, interruptible through the wake pipe.
struct TtyReader {
    wake: Arc<WakePipe>,
}

impl TermReader for TtyReader {
    fn read_byte(&mut self, timeout: Option<Duration>) -> io::Result<Poll> {
        read_stdin_byte(&self.wake, timeout)
    }
}

#[allow(clippy::cast_possible_truncation)] // Timeouts here are tens of ms.
fn read_stdin_byte(wake: &WakePipe, timeout: Option<Duration>) -> io::Result<Poll> {
    let timeout_ms: libc::c_int = timeout.map_or(-1, |t| t.as_millis().min(i32::MAX as u128) as _);

    loop {
        let mut fds = [
            libc::pollfd {
                fd: libc::STDIN_FILENO,
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: wake.read.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];

        let ready = unsafe { libc::poll(fds.as_mut_ptr(), 2, timeout_ms) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if ready == 0 {
            return Ok(Poll::TimedOut);
        }

        if fds[1].revents & libc::POLLIN != 0 {
            wake.drain_one();
            return Ok(Poll::Cancelled);
        }

        let mut byte = 0u8;
        let n = unsafe { libc::read(libc::STDIN_FILENO, (&raw mut byte).cast(), 1) };
        if n == 1 {
            return Ok(Poll::Byte(byte));
        }
        if n == 0 {
            return Ok(Poll::Eof);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            continue;
        }
        return Err(err);
    }
}

// ─── Backend ────────────────────────────────────────────────────────────────

/// Terminal backend for a POSIX tty.
pub struct PosixTerm {
    wake: Arc<WakePipe>,
    /// Original termios saved on entering raw mode; doubles as the
    /// raw-mode indicator.
    orig: Option<libc::termios>,
    /// Probed/queried size, kept until invalidated.
    size_cache: Option<Size>,
}

impl PosixTerm {
    /// Create a backend for stdin/stdout.
    ///
    /// # Errors
    ///
    /// Fails only if the wake pipe cannot be created.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            wake: Arc::new(WakePipe::new()?),
            orig: None,
            size_cache: None,
        })
    }

    fn ioctl_size() -> Option<Size> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &raw mut ws) };
        if rc == 0 && ws.ws_col > 0 {
            Some(Size {
                cols: ws.ws_col,
                rows: ws.ws_row,
            })
        } else {
            None
        }
    }

    /// Read a cursor-position report (`ESC [ rows ; cols R`) from
    /// stdin. Returns the reported column, or `None` if the terminal
    /// never answered.
    fn read_cursor_col(&self) -> Option<u16> {
        let mut reader = TtyReader {
            wake: Arc::clone(&self.wake),
        };
        let mut next = || match reader.read_byte(Some(CURSOR_REPORT_TIMEOUT)) {
            Ok(Poll::Byte(b)) => Some(b),
            _ => None,
        };

        if next()? != 0x1b || next()? != b'[' {
            return None;
        }
        let mut n: u32 = 0;
        loop {
            match next()? {
                b';' => n = 0,
                b'R' => {
                    return if n > 0 && n < 1000 {
                        Some(n as u16)
                    } else {
                        None
                    };
                }
                b @ b'0'..=b'9' => n = n * 10 + u32::from(b - b'0'),
                _ => return None,
            }
        }
    }

    /// Active width probe for terminals whose geometry query reports
    /// zero columns (serial lines): note the cursor column, jump to
    /// column 999, read where we actually landed, and put the cursor
    /// back. Runs at most once per session.
    fn probe_size(&mut self) -> Size {
        let mut size = Size::FALLBACK;

        if self.write(b"\x1b[6n").is_err() || self.flush().is_err() {
            return size;
        }
        let Some(here) = self.read_cursor_col() else {
            return size;
        };

        if self.write(b"\x1b[999C\x1b[6n").is_err() || self.flush().is_err() {
            return size;
        }
        match self.read_cursor_col() {
            Some(cols) => {
                size.cols = cols;
                if cols > here {
                    let mut buf = Vec::new();
                    let _ = crate::ansi::cursor_left_by(&mut buf, cols - here);
                    let _ = self.write(&buf);
                }
            }
            None => {
                // Cannot learn where we are; at least return to the
                // left edge rather than leave the cursor at 999.
                let _ = self.write(b"\r");
            }
        }
        let _ = self.flush();
        size
    }
}

impl Term for PosixTerm {
    fn is_interactive(&self) -> bool {
        unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
    }

    fn enter_raw(&mut self) -> Result<(), TermError> {
        if self.orig.is_some() {
            return Ok(());
        }
        if !self.is_interactive() {
            return Err(TermError::NotATerminal);
        }
        if let Ok(term) = std::env::var("TERM") {
            if UNSUPPORTED_TERMS.contains(&term.as_str()) {
                return Err(TermError::UnsupportedTerminal(term));
            }
        }

        install_panic_hook();

        unsafe {
            let mut termios: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(libc::STDIN_FILENO, &raw mut termios) != 0 {
                return Err(TermError::ModeSwitchFailed(io::Error::last_os_error()));
            }

            let orig = termios;

            // No break signal, no CR-to-NL, no parity check, no strip,
            // no flow control; no output post-processing; 8-bit chars;
            // no echo, no canonical mode, no extended functions, no
            // signal characters. Reads return after exactly one byte.
            termios.c_iflag &=
                !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
            termios.c_oflag &= !libc::OPOST;
            termios.c_cflag |= libc::CS8;
            termios.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);
            termios.c_cc[libc::VMIN] = 1;
            termios.c_cc[libc::VTIME] = 0;

            if libc::tcsetattr(libc::STDIN_FILENO, libc::TCSADRAIN, &raw const termios) != 0 {
                return Err(TermError::ModeSwitchFailed(io::Error::last_os_error()));
            }

            self.orig = Some(orig);
            if let Ok(mut backup) = TERMIOS_BACKUP.lock() {
                *backup = Some(orig);
            }
        }

        Ok(())
    }

    fn leave_raw(&mut self) {
        if let Some(orig) = self.orig.take() {
            let rc = unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSADRAIN, &raw const orig) };
            if rc != 0 {
                // Nothing more can be done; the shell will run stty sane.
                log::warn!(
                    "failed to restore terminal mode: {}",
                    io::Error::last_os_error()
                );
            }
            if let Ok(mut backup) = TERMIOS_BACKUP.lock() {
                *backup = None;
            }
        }
    }

    fn is_raw(&self) -> bool {
        self.orig.is_some()
    }

    fn window_size(&mut self) -> Size {
        if let Some(size) = Self::ioctl_size() {
            self.size_cache = Some(size);
            return size;
        }
        if let Some(cached) = self.size_cache {
            return cached;
        }
        let size = self.probe_size();
        self.size_cache = Some(size);
        size
    }

    fn query_size(&self) -> Option<Size> {
        Self::ioctl_size()
    }

    fn invalidate_size(&mut self) {
        self.size_cache = None;
    }

    fn reader(&self) -> Box<dyn TermReader> {
        Box::new(TtyReader {
            wake: Arc::clone(&self.wake),
        })
    }

    fn waker(&self) -> Waker {
        Waker::new(self.wake.clone())
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        io::stdout().lock().write_all(bytes)
    }

    fn write_err(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut err = io::stderr().lock();
        err.write_all(bytes)?;
        err.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().lock().flush()
    }

    fn beep(&mut self) {
        let _ = self.write_err(b"\x07");
    }
}

impl Drop for PosixTerm {
    fn drop(&mut self) {
        self.leave_raw();
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // Raw-mode entry cannot be exercised without a real tty; these
    // cover the parts that work anywhere.

    #[test]
    fn new_creates_wake_pipe() {
        let term = PosixTerm::new().unwrap();
        assert!(!term.is_raw());
    }

    #[test]
    fn wake_pipe_round_trip() {
        let pipe = WakePipe::new().unwrap();
        pipe.wake();
        // The byte must be readable back.
        let mut byte = 1u8;
        let n = unsafe { libc::read(pipe.read.as_raw_fd(), (&raw mut byte).cast(), 1) };
        assert_eq!(n, 1);
        assert_eq!(byte, 0);
    }

    #[test]
    fn wake_makes_read_return_cancelled() {
        let term = PosixTerm::new().unwrap();
        let waker = term.waker();
        let mut reader = term.reader();
        waker.wake();
        // stdin has no data in tests, so only the wake pipe can fire.
        let polled = reader.read_byte(Some(Duration::from_millis(200))).unwrap();
        assert_eq!(polled, Poll::Cancelled);
    }

    #[test]
    fn wake_is_drained_after_cancel() {
        let term = PosixTerm::new().unwrap();
        term.waker().wake();
        let mut reader = term.reader();
        assert_eq!(
            reader.read_byte(Some(Duration::from_millis(200))).unwrap(),
            Poll::Cancelled
        );
        // A second read must not report another cancel. (Whether it
        // times out or sees EOF depends on what stdin is in the test
        // harness.)
        assert_ne!(
            reader.read_byte(Some(Duration::from_millis(10))).unwrap(),
            Poll::Cancelled
        );
    }

    #[test]
    fn leave_raw_without_enter_is_a_noop() {
        let mut term = PosixTerm::new().unwrap();
        term.leave_raw();
        assert!(!term.is_raw());
    }

    #[test]
    fn invalidate_clears_the_cache() {
        let mut term = PosixTerm::new().unwrap();
        term.size_cache = Some(Size {
            cols: 132,
            rows: 43,
        });
        term.invalidate_size();
        assert!(term.size_cache.is_none());
    }
}
