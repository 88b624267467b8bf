// SPDX-License-Identifier: MIT
//
// lino-term — terminal backend for the lino line editor.
//
// Raw-mode control via termios, window-size queries (with the cursor
// probe fallback for serial terminals), cancellable byte reads through
// a self-pipe, keypress decoding, and styled ANSI output. Everything
// the editing engine needs from a terminal lives behind the `Term`
// capability trait, with two implementations: `PosixTerm` for a real
// tty and `MemTerm` for tests and headless hosts.
//
// This crate intentionally avoids terminal frameworks in favor of
// direct control via ANSI escape sequences and raw termios. Every byte
// sent to the terminal is accounted for.

pub mod ansi;
pub mod error;
pub mod input;
pub mod mem;
#[cfg(unix)]
pub mod posix;
pub mod style;
pub mod term;

pub use error::TermError;
pub use input::{Key, KeyEvent};
pub use mem::MemTerm;
#[cfg(unix)]
pub use posix::PosixTerm;
pub use style::{Color, Styles, TextAttr};
pub use term::{Poll, Size, Term, TermReader, Waker};
