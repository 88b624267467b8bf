// SPDX-License-Identifier: MIT
//
// Keypress decoding — turns the raw byte stream into logical keys.
//
// One logical keypress is either a Unicode code point (multi-byte
// UTF-8 sequences of length 2-3 are assembled here) or a named special
// key delivered as an escape sequence. A lone ESC is ambiguous until a
// short timeout decides between the Escape key and a sequence start.
//
// Escape sequences are matched against small declarative tables rather
// than nested branching, so the mapping is testable with scripted byte
// streams and no timing involved:
//
//   ESC [ A          arrows / Home / End / Shift-Tab  (also ESC O A)
//   ESC [ 3 ~        editing keys, including the alternate Home/End
//                    digit codes emitted by screen and tmux
//   ESC [ 1 ; 5 C    Ctrl-modified arrows
//
// Unrecognized tails are drained up to `~` or end of stream and decode
// to "no key" — consumed, producing no character.

use std::io;
use std::time::Duration;

use crate::term::{Poll, TermReader};

/// How long to wait for the byte after an ESC before deciding the user
/// pressed the Escape key itself.
const ESC_TIMEOUT: Duration = Duration::from_millis(50);

// ─── Key model ──────────────────────────────────────────────────────────────

/// A logical keypress.
///
/// Control characters arrive as `Char` with a code point below 0x20;
/// use [`ctrl`] to name them when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A Unicode code point, control characters included.
    Char(char),
    Up,
    Down,
    Left,
    Right,
    Delete,
    Home,
    End,
    Insert,
    PageUp,
    PageDown,
    ShiftTab,
    CtrlLeft,
    CtrlRight,
    /// A bare Escape keypress (no sequence followed within the window).
    Esc,
}

/// Outcome of one decode step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// A decoded keypress.
    Key(Key),
    /// Input was consumed but resolved to no keypress (timeout, or an
    /// escape sequence we do not recognize).
    None,
    /// End of input, including malformed UTF-8 treated as such.
    Eof,
    /// A wake signal interrupted the read.
    Cancelled,
}

/// The control-character code point for `letter` (`ctrl('C')` is 0x03).
#[must_use]
pub const fn ctrl(letter: char) -> char {
    ((letter as u8) - b'@') as char
}

// ─── Escape tables ──────────────────────────────────────────────────────────

/// `ESC [ <letter>` / `ESC O <letter>` finals.
const FINAL_KEYS: &[(u8, Key)] = &[
    (b'A', Key::Up),
    (b'B', Key::Down),
    (b'C', Key::Right),
    (b'D', Key::Left),
    (b'F', Key::End),
    (b'H', Key::Home),
    (b'Z', Key::ShiftTab),
];

/// `ESC [ <digit> ~` extended keys. Codes 1/7 and 4/8 both mean
/// Home and End; screen and tmux emit the low variants.
const TILDE_KEYS: &[(u8, Key)] = &[
    (b'1', Key::Home),
    (b'2', Key::Insert),
    (b'3', Key::Delete),
    (b'4', Key::End),
    (b'5', Key::PageUp),
    (b'6', Key::PageDown),
    (b'7', Key::Home),
    (b'8', Key::End),
];

fn lookup(table: &[(u8, Key)], byte: u8) -> Option<Key> {
    table.iter().find(|(b, _)| *b == byte).map(|(_, k)| *k)
}

// ─── Decoding ───────────────────────────────────────────────────────────────

/// Read one logical keypress.
///
/// `timeout` applies to the first byte only; continuation bytes of a
/// UTF-8 sequence are read without a timeout (once a lead byte is seen
/// the rest must follow), and escape disambiguation uses its own short
/// window.
///
/// # Errors
///
/// Propagates I/O errors from the underlying reader.
pub fn read_key(r: &mut dyn TermReader, timeout: Option<Duration>) -> io::Result<KeyEvent> {
    match r.read_byte(timeout)? {
        Poll::TimedOut => Ok(KeyEvent::None),
        Poll::Eof => Ok(KeyEvent::Eof),
        Poll::Cancelled => Ok(KeyEvent::Cancelled),
        Poll::Byte(0x1b) => decode_escape(r),
        Poll::Byte(b) => decode_utf8(r, b),
    }
}

/// Read one code point with no special-key interpretation: ESC decodes
/// to `Char('\u{1b}')`. This is the literal-next (Ctrl-V) path.
///
/// # Errors
///
/// Propagates I/O errors from the underlying reader.
pub fn read_char_raw(r: &mut dyn TermReader, timeout: Option<Duration>) -> io::Result<KeyEvent> {
    match r.read_byte(timeout)? {
        Poll::TimedOut => Ok(KeyEvent::None),
        Poll::Eof => Ok(KeyEvent::Eof),
        Poll::Cancelled => Ok(KeyEvent::Cancelled),
        Poll::Byte(b) => decode_utf8(r, b),
    }
}

/// Expected total length of a UTF-8 sequence from its lead byte, or 0
/// when the byte cannot start one we support (lengths 1-3, like the
/// original wire format; 4-byte sequences and stray continuation bytes
/// are decode errors).
const fn utf8_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 0,
    }
}

/// Assemble a full code point starting from `lead`.
///
/// A malformed sequence is a decode error treated as end of input for
/// this read: the terminal handed us bytes we cannot interpret, and
/// resynchronizing mid-stream is not worth guessing about.
fn decode_utf8(r: &mut dyn TermReader, lead: u8) -> io::Result<KeyEvent> {
    let len = utf8_len(lead);
    if len == 0 {
        return Ok(KeyEvent::Eof);
    }
    if len == 1 {
        return Ok(KeyEvent::Key(Key::Char(lead as char)));
    }

    let mut buf = [lead, 0, 0];
    for slot in buf.iter_mut().take(len).skip(1) {
        match r.read_byte(None)? {
            Poll::Byte(b) if b & 0xc0 == 0x80 => *slot = b,
            Poll::Cancelled => return Ok(KeyEvent::Cancelled),
            _ => return Ok(KeyEvent::Eof),
        }
    }

    match std::str::from_utf8(&buf[..len]) {
        Ok(s) => Ok(s
            .chars()
            .next()
            .map_or(KeyEvent::Eof, |ch| KeyEvent::Key(Key::Char(ch)))),
        Err(_) => Ok(KeyEvent::Eof),
    }
}

/// An ESC byte was read; decide between the Escape key and a sequence.
fn decode_escape(r: &mut dyn TermReader) -> io::Result<KeyEvent> {
    let b1 = match r.read_byte(Some(ESC_TIMEOUT))? {
        Poll::Byte(b) => b,
        Poll::Cancelled => return Ok(KeyEvent::Cancelled),
        // Nothing followed: a real Escape keypress.
        Poll::TimedOut | Poll::Eof => return Ok(KeyEvent::Key(Key::Esc)),
    };
    let b2 = match r.read_byte(Some(ESC_TIMEOUT))? {
        Poll::Byte(b) => b,
        Poll::Cancelled => return Ok(KeyEvent::Cancelled),
        Poll::TimedOut | Poll::Eof => return Ok(KeyEvent::Eof),
    };

    if b1 == b'[' || b1 == b'O' {
        if let Some(key) = lookup(FINAL_KEYS, b2) {
            return Ok(KeyEvent::Key(key));
        }
    }

    if b1 == b'[' && (b'1'..=b'8').contains(&b2) {
        return decode_extended(r, b2);
    }

    Ok(KeyEvent::None)
}

/// `ESC [ <digit>` seen; the sequence continues with `~` (editing
/// keys) or `; 5 <letter>` (Ctrl-arrows). Anything else is drained.
fn decode_extended(r: &mut dyn TermReader, digit: u8) -> io::Result<KeyEvent> {
    let b3 = match r.read_byte(Some(ESC_TIMEOUT))? {
        Poll::Byte(b) => b,
        Poll::Cancelled => return Ok(KeyEvent::Cancelled),
        Poll::TimedOut | Poll::Eof => return Ok(KeyEvent::None),
    };

    if b3 == b'~' {
        return Ok(lookup(TILDE_KEYS, digit).map_or(KeyEvent::None, KeyEvent::Key));
    }

    if b3 == b';' && digit == b'1' {
        match r.read_byte(Some(ESC_TIMEOUT))? {
            Poll::Byte(b'5') => match r.read_byte(Some(ESC_TIMEOUT))? {
                Poll::Byte(b'C') => return Ok(KeyEvent::Key(Key::CtrlRight)),
                Poll::Byte(b'D') => return Ok(KeyEvent::Key(Key::CtrlLeft)),
                Poll::Byte(b) => return drain_sequence(r, b),
                Poll::Cancelled => return Ok(KeyEvent::Cancelled),
                Poll::TimedOut | Poll::Eof => return Ok(KeyEvent::None),
            },
            Poll::Byte(b) => return drain_sequence(r, b),
            Poll::Cancelled => return Ok(KeyEvent::Cancelled),
            Poll::TimedOut | Poll::Eof => return Ok(KeyEvent::None),
        }
    }

    drain_sequence(r, b3)
}

/// Consume the rest of an unrecognized sequence up to `~` or end of
/// stream (e.g. `ESC [ 1 2 ~` or `ESC [ 1 1 ; 2 ~`).
fn drain_sequence(r: &mut dyn TermReader, mut byte: u8) -> io::Result<KeyEvent> {
    while byte != b'~' {
        match r.read_byte(Some(ESC_TIMEOUT))? {
            Poll::Byte(b) => byte = b,
            Poll::Cancelled => return Ok(KeyEvent::Cancelled),
            Poll::TimedOut | Poll::Eof => break,
        }
    }
    Ok(KeyEvent::None)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
