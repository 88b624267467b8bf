//! The thread-safe editor front door and its edit loop.
//!
//! [`Editor`] owns two independent mutual-exclusion domains: the
//! editing domain (terminal backend, raw-mode state, and a snapshot of
//! the line being displayed) and the history domain. The edit loop
//! acquires the history lock only while inside the editing-lock scope,
//! and the standalone history API never touches the editing lock, so
//! no lock-ordering cycle exists.
//!
//! The single point of suspension is the byte read, performed through
//! a detached reader *without* holding the editing lock. That is what
//! lets a different thread interleave: [`Editor::print_line`] writes a
//! styled message above the prompt and repaints the line in progress
//! from the snapshot, and [`Editor::cancel_pending_read`] makes the
//! blocked read return promptly with a distinguishable outcome.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lino_term::input::{self, Key, KeyEvent, ctrl};
use lino_term::{Size, Term, TermReader, TextAttr, Waker, ansi};

use crate::buffer::LineBuffer;
use crate::config::EditConfig;
use crate::history::History;
use crate::render;
use crate::search::{self, SearchDir};

// ─── Outcomes ───────────────────────────────────────────────────────────────

/// Result of a `read_line` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The user accepted a line.
    Line(String),
    /// End of input on an empty line (Ctrl-D or closed stream).
    EndOfInput,
    /// The read was interrupted; no line is available.
    Interrupted(Interrupt),
}

/// Why a read was interrupted — a real Ctrl-C keystroke and a
/// cross-thread cancellation are distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    CtrlC,
    Cancelled,
}

// ─── Lock domains ───────────────────────────────────────────────────────────

/// A non-reentrant mutex domain. Acquiring it twice from the same
/// thread is a programming error, detected before the deadlock in
/// debug builds.
struct Domain<T> {
    inner: Mutex<T>,
    #[cfg(debug_assertions)]
    holder: Mutex<Option<std::thread::ThreadId>>,
}

impl<T> Domain<T> {
    fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            #[cfg(debug_assertions)]
            holder: Mutex::new(None),
        }
    }

    fn lock(&self) -> DomainGuard<'_, T> {
        #[cfg(debug_assertions)]
        {
            let holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
            assert!(
                *holder != Some(std::thread::current().id()),
                "re-entrant domain lock"
            );
        }
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        #[cfg(debug_assertions)]
        {
            *self.holder.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(std::thread::current().id());
        }
        DomainGuard {
            guard,
            #[cfg(debug_assertions)]
            holder: &self.holder,
        }
    }
}

struct DomainGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    #[cfg(debug_assertions)]
    holder: &'a Mutex<Option<std::thread::ThreadId>>,
}

impl<T> Drop for DomainGuard<'_, T> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            *self.holder.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }
}

impl<T> std::ops::Deref for DomainGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> std::ops::DerefMut for DomainGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

// ─── Editing domain state ───────────────────────────────────────────────────

/// Snapshot of the line currently on screen, kept for the cross-thread
/// print path so it can repaint after writing its message.
#[derive(Clone)]
struct ActiveEdit {
    prompt: String,
    prompt_attr: Option<TextAttr>,
    line: String,
    pos: usize,
}

struct EditShared {
    term: Box<dyn Term>,
    active: Option<ActiveEdit>,
}

/// Clears the in-session marker even on early returns.
struct SessionFlag<'a>(&'a AtomicBool);

impl Drop for SessionFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ─── Editor ─────────────────────────────────────────────────────────────────

/// A line editor bound to one terminal backend.
///
/// All methods take `&self`; the editor is meant to be shared across
/// threads (printing and cancellation from anywhere), with the edit
/// loop itself running on one thread at a time.
pub struct Editor {
    edit: Domain<EditShared>,
    history: Domain<History>,
    waker: Waker,
    in_session: AtomicBool,
}

impl Editor {
    /// An editor on the process's controlling terminal.
    ///
    /// # Errors
    ///
    /// Fails only if the backend's wake channel cannot be created.
    #[cfg(unix)]
    pub fn new() -> io::Result<Self> {
        Ok(Self::with_term(Box::new(lino_term::PosixTerm::new()?)))
    }

    /// An editor on any backend — tests use the in-memory terminal.
    #[must_use]
    pub fn with_term(term: Box<dyn Term>) -> Self {
        let waker = term.waker();
        Self {
            edit: Domain::new(EditShared { term, active: None }),
            history: Domain::new(History::new()),
            waker,
            in_session: AtomicBool::new(false),
        }
    }

    // ── History API (history lock only; never the editing lock) ────

    /// Append a line to history. `false` when it duplicates the
    /// previous entry or the store has zero capacity.
    pub fn history_add(&self, line: &str) -> bool {
        self.history.lock().add(line)
    }

    /// Bound the history store, discarding oldest entries as needed.
    pub fn history_set_max_len(&self, max_len: usize) -> bool {
        self.history.lock().set_max_len(max_len)
    }

    /// A snapshot of the history, oldest first.
    #[must_use]
    pub fn history_entries(&self) -> Vec<String> {
        self.history.lock().entries().map(str::to_owned).collect()
    }

    /// Save history to `path` (backslash-escaped, one entry per line).
    ///
    /// # Errors
    ///
    /// Propagates file I/O errors.
    pub fn history_save(&self, path: &Path) -> io::Result<()> {
        self.history.lock().save(path)
    }

    /// Load history from `path`.
    ///
    /// # Errors
    ///
    /// Propagates file I/O errors, including a missing file.
    pub fn history_load(&self, path: &Path) -> io::Result<()> {
        self.history.lock().load(path)
    }

    // ── Cross-thread operations ─────────────────────────────────────

    /// Make a pending (or the next) blocked read return promptly with
    /// [`Interrupt::Cancelled`]. Callable from any thread.
    pub fn cancel_pending_read(&self) {
        self.waker.wake();
    }

    /// Write a styled line to the output stream without corrupting an
    /// edit in progress; the prompt line is repainted afterwards.
    ///
    /// # Errors
    ///
    /// Propagates terminal write errors.
    pub fn print_line(&self, text: &str, attr: Option<&TextAttr>) -> io::Result<()> {
        self.print_from_start(false, &[(text, attr)])
    }

    /// [`print_line`](Self::print_line) to the error stream.
    ///
    /// # Errors
    ///
    /// Propagates terminal write errors.
    pub fn error_line(&self, text: &str, attr: Option<&TextAttr>) -> io::Result<()> {
        self.print_from_start(true, &[(text, attr)])
    }

    /// Multi-segment form of [`print_line`](Self::print_line): each
    /// segment carries its own attribute, emitted as one line.
    ///
    /// # Errors
    ///
    /// Propagates terminal write errors.
    pub fn print_segments(&self, segments: &[(&str, Option<&TextAttr>)]) -> io::Result<()> {
        self.print_from_start(false, segments)
    }

    /// Window size independent of any edit session.
    #[must_use]
    pub fn window_size(&self) -> Option<Size> {
        self.edit.lock().term.query_size()
    }

    /// Clear the screen and force a fresh geometry probe.
    ///
    /// # Errors
    ///
    /// Propagates terminal write errors.
    pub fn clear_screen(&self) -> io::Result<()> {
        let mut shared = self.edit.lock();
        let mut out = Vec::new();
        ansi::clear_screen(&mut out)?;
        shared.term.write(&out)?;
        shared.term.invalidate_size();
        shared.term.flush()
    }

    // ── read_line ───────────────────────────────────────────────────

    /// Read one edited line.
    ///
    /// Falls back to a plain buffered read when the input is not an
    /// interactive terminal, the terminal type is unsupported, or raw
    /// mode cannot be entered.
    ///
    /// # Errors
    ///
    /// Propagates terminal I/O errors; every user action, including
    /// interruption and end of input, is an [`Outcome`], not an error.
    pub fn read_line(&self, prompt: &str, config: &EditConfig) -> io::Result<Outcome> {
        let was_active = self.in_session.swap(true, Ordering::Acquire);
        debug_assert!(!was_active, "read_line is already running");
        let _session = SessionFlag(&self.in_session);

        {
            let mut shared = self.edit.lock();
            if let Some(max) = config.history_max {
                self.history.lock().set_max_len(max);
            }
            if let Err(err) = shared.term.enter_raw() {
                log::debug!("line editing disabled: {err}");
                drop(shared);
                return self.read_line_plain(prompt);
            }
        }

        let result = self.edit_loop(prompt, config);

        let mut shared = self.edit.lock();
        shared.active = None;
        shared.term.leave_raw();
        let _ = shared.term.write(b"\n");
        let _ = shared.term.flush();

        result
    }

    /// Non-interactive fallback: prompt, then read bytes to the next
    /// newline. No history, no completion, no editing.
    fn read_line_plain(&self, prompt: &str) -> io::Result<Outcome> {
        let mut reader = {
            let mut shared = self.edit.lock();
            shared.term.write(prompt.as_bytes())?;
            shared.term.flush()?;
            shared.term.reader()
        };

        let mut bytes = Vec::new();
        loop {
            match reader.read_byte(None)? {
                lino_term::Poll::Byte(b'\n') => break,
                lino_term::Poll::Byte(b) => bytes.push(b),
                lino_term::Poll::TimedOut => {}
                lino_term::Poll::Eof => {
                    if bytes.is_empty() {
                        return Ok(Outcome::EndOfInput);
                    }
                    break;
                }
                lino_term::Poll::Cancelled => {
                    return Ok(Outcome::Interrupted(Interrupt::Cancelled));
                }
            }
        }
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        Ok(Outcome::Line(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    }

    // ── The edit loop ───────────────────────────────────────────────

    fn edit_loop(&self, prompt: &str, config: &EditConfig) -> io::Result<Outcome> {
        let mut line = LineBuffer::new();
        // The latest history slot is always the line being edited.
        self.history.lock().push_scratch();
        let mut history_index: usize = 0;

        let mut reader = self.edit.lock().term.reader();
        self.refresh(prompt, config, &line)?;

        // A key handed back by search or completion, to be processed
        // as if freshly read — but never re-triggering completion.
        let mut pending: Option<Key> = None;

        loop {
            let (key, fresh) = match pending.take() {
                Some(key) => (key, false),
                None => match input::read_key(&mut *reader, None)? {
                    KeyEvent::Key(key) => (key, true),
                    KeyEvent::None => continue,
                    KeyEvent::Eof => return self.finish(Outcome::Line(line.as_str().to_owned())),
                    KeyEvent::Cancelled => {
                        return self.finish(Outcome::Interrupted(Interrupt::Cancelled));
                    }
                },
            };

            if fresh && key == Key::Char('\t') && config.completion_callback().is_some() {
                match self.complete_session(&mut *reader, prompt, config, &mut line)? {
                    SessionExit::Resume => {
                        self.refresh(prompt, config, &line)?;
                        continue;
                    }
                    SessionExit::Redispatch(key) => {
                        pending = Some(key);
                        continue;
                    }
                    SessionExit::Eof => {
                        return self.finish(Outcome::Line(line.as_str().to_owned()));
                    }
                    SessionExit::Cancelled => {
                        return self.finish(Outcome::Interrupted(Interrupt::Cancelled));
                    }
                }
            }

            match key {
                Key::Char('\r' | '\n') => {
                    return self.finish(Outcome::Line(line.as_str().to_owned()));
                }
                Key::Char(c) if c == ctrl('C') => {
                    return self.finish(Outcome::Interrupted(Interrupt::CtrlC));
                }
                Key::Char(c) if c == ctrl('D') => {
                    if line.is_empty() {
                        return self.finish(Outcome::EndOfInput);
                    }
                    line.remove(line.pos());
                }
                Key::Char(c) if c == ctrl('H') || c == '\u{7f}' => {
                    if line.pos() > 0 {
                        line.remove(line.pos() - 1);
                    }
                }
                Key::Delete => {
                    line.remove(line.pos());
                }
                Key::Char(c) if c == ctrl('W') => {
                    line.delete_word_left();
                }
                Key::Char(c) if c == ctrl('R') => {
                    match self.search_session(&mut *reader, config, &mut line)? {
                        SessionExit::Resume => {}
                        SessionExit::Redispatch(key) => {
                            self.refresh(prompt, config, &line)?;
                            pending = Some(key);
                            continue;
                        }
                        SessionExit::Eof => {
                            return self.finish(Outcome::Line(line.as_str().to_owned()));
                        }
                        SessionExit::Cancelled => {
                            return self.finish(Outcome::Interrupted(Interrupt::Cancelled));
                        }
                    }
                }
                Key::Char(c) if c == ctrl('T') => {
                    line.transpose();
                }
                Key::Char(c) if c == ctrl('V') => {
                    self.literal_next(&mut *reader, prompt, config, &mut line)?;
                }
                Key::Char(c) if c == ctrl('B') => line.move_left(),
                Key::Left => line.move_left(),
                Key::Char(c) if c == ctrl('F') => line.move_right(),
                Key::Right => line.move_right(),
                Key::CtrlLeft => line.word_left(),
                Key::CtrlRight => line.word_right(),
                Key::Home => line.move_home(),
                Key::Char(c) if c == ctrl('A') => line.move_home(),
                Key::End => line.move_end(),
                Key::Char(c) if c == ctrl('E') => line.move_end(),
                Key::Char(c) if c == ctrl('U') => {
                    line.remove_range(0, line.pos());
                }
                Key::Char(c) if c == ctrl('K') => {
                    line.remove_range(line.pos(), line.chars() - line.pos());
                }
                Key::Char(c) if c == ctrl('Y') => {
                    if let Some(capture) = line.capture().map(str::to_owned) {
                        line.insert_text(line.pos(), &capture);
                    }
                }
                Key::Char(c) if c == ctrl('L') => {
                    self.clear_screen()?;
                }
                Key::Up => self.navigate(&mut line, &mut history_index, Nav::Delta(1)),
                Key::Char(c) if c == ctrl('P') => {
                    self.navigate(&mut line, &mut history_index, Nav::Delta(1));
                }
                Key::Down => self.navigate(&mut line, &mut history_index, Nav::Delta(-1)),
                Key::Char(c) if c == ctrl('N') => {
                    self.navigate(&mut line, &mut history_index, Nav::Delta(-1));
                }
                Key::PageUp => self.navigate(&mut line, &mut history_index, Nav::Oldest),
                Key::PageDown => self.navigate(&mut line, &mut history_index, Nav::Newest),
                Key::Char(c) if c == '\t' || c >= ' ' => {
                    let _ = line.insert(line.pos(), c);
                }
                // Insert, bare Escape, Shift-Tab, remaining control
                // characters: no effect.
                _ => {}
            }

            self.refresh(prompt, config, &line)?;
        }
    }

    /// Pop the transient history slot and pass the outcome through.
    fn finish(&self, outcome: Outcome) -> io::Result<Outcome> {
        self.history.lock().pop_scratch();
        Ok(outcome)
    }

    /// Ctrl-V: show a `^V` marker, then insert the next code point
    /// verbatim, bypassing special-key interpretation.
    fn literal_next(
        &self,
        reader: &mut dyn TermReader,
        prompt: &str,
        config: &EditConfig,
        line: &mut LineBuffer,
    ) -> io::Result<()> {
        if line.insert(line.pos(), ctrl('V')).is_err() {
            return Ok(());
        }
        self.refresh(prompt, config, line)?;
        let event = input::read_char_raw(reader, None)?;
        line.remove(line.pos() - 1);
        if let KeyEvent::Key(Key::Char(c)) = event {
            let _ = line.insert(line.pos(), c);
        }
        Ok(())
    }

    // ── History navigation ──────────────────────────────────────────

    fn navigate(&self, line: &mut LineBuffer, history_index: &mut usize, nav: Nav) {
        let mut history = self.history.lock();
        let len = history.len();
        if len <= 1 {
            return;
        }
        // Another thread may have shrunk the store mid-session.
        if *history_index >= len {
            *history_index = len - 1;
        }

        // Save in-progress edits back into the displayed slot before
        // switching, so they are not lost.
        history.replace(len - 1 - *history_index, line.as_str());

        #[allow(clippy::cast_possible_wrap)]
        let delta = match nav {
            Nav::Delta(d) => d,
            Nav::Oldest => (len - 1 - *history_index) as isize,
            Nav::Newest => -(*history_index as isize),
        };
        #[allow(clippy::cast_possible_wrap)]
        let target = *history_index as isize + delta;

        if target < 0 {
            *history_index = 0;
            return;
        }
        #[allow(clippy::cast_sign_loss)]
        let target = target as usize;
        if target >= len {
            *history_index = len - 1;
            return;
        }
        *history_index = target;
        line.set(history.get(len - 1 - target).unwrap_or(""));
    }

    // ── Reverse incremental search ──────────────────────────────────

    fn search_session(
        &self,
        reader: &mut dyn TermReader,
        config: &EditConfig,
        line: &mut LineBuffer,
    ) -> io::Result<SessionExit> {
        let mut query = String::new();
        let mut searchpos = self.history.lock().len().saturating_sub(1);

        let terminator = loop {
            let sprompt = search::search_prompt(&query);
            self.refresh_line(&sprompt, config.prompt_attr.as_ref(), line, None)?;

            let key = match input::read_key(reader, None)? {
                KeyEvent::Key(key) => key,
                KeyEvent::None => continue,
                KeyEvent::Eof => return Ok(SessionExit::Eof),
                KeyEvent::Cancelled => return Ok(SessionExit::Cancelled),
            };

            // Decide how this key moves the search, if at all.
            let (dir, skip_same, added_char) = match key {
                Key::Char(c) if c == ctrl('H') || c == '\u{7f}' => {
                    if query.pop().is_none() {
                        continue;
                    }
                    // Shrinking the query re-searches from scratch.
                    searchpos = self.history.lock().len().saturating_sub(1);
                    (SearchDir::Older, false, false)
                }
                Key::Up => {
                    searchpos = searchpos.saturating_sub(1);
                    (SearchDir::Older, true, false)
                }
                Key::Char(c) if c == ctrl('P') => {
                    searchpos = searchpos.saturating_sub(1);
                    (SearchDir::Older, true, false)
                }
                Key::Down => {
                    searchpos = self.bump_newer(searchpos);
                    (SearchDir::Newer, true, false)
                }
                Key::Char(c) if c == ctrl('N') => {
                    searchpos = self.bump_newer(searchpos);
                    (SearchDir::Newer, true, false)
                }
                Key::Char(c) if c >= ' ' => {
                    query.push(c);
                    // A new character re-anchors to the newest entry.
                    searchpos = self.history.lock().len().saturating_sub(1);
                    (SearchDir::Older, false, true)
                }
                other => break other,
            };

            let history = self.history.lock();
            let skip = if skip_same { Some(line.as_str()) } else { None };
            match search::find(&history, &query, searchpos, dir, skip) {
                Some(hit) => {
                    searchpos = hit.index;
                    let entry = history.get(hit.index).unwrap_or("").to_owned();
                    drop(history);
                    line.set(&entry);
                    line.set_pos(hit.char_pos);
                }
                None => {
                    drop(history);
                    if added_char {
                        // No match: the char does not join the query.
                        query.pop();
                    }
                }
            }
        };

        Ok(match terminator {
            Key::Char(c) if c == ctrl('G') || c == ctrl('C') => {
                // Cancel: wipe the buffer, swallow the key.
                line.clear();
                SessionExit::Resume
            }
            Key::Char(c) if c == ctrl('J') => SessionExit::Resume,
            other => SessionExit::Redispatch(other),
        })
    }

    /// Step the search cursor toward newer entries; it may rest one
    /// past the end, where the scan simply finds nothing.
    fn bump_newer(&self, searchpos: usize) -> usize {
        if searchpos < self.history.lock().len() {
            searchpos + 1
        } else {
            searchpos
        }
    }

    // ── Completion ──────────────────────────────────────────────────

    fn complete_session(
        &self,
        reader: &mut dyn TermReader,
        prompt: &str,
        config: &EditConfig,
        line: &mut LineBuffer,
    ) -> io::Result<SessionExit> {
        let (head, tail) = {
            let (head, tail) = line.split_at_cursor();
            (head.to_owned(), tail.to_owned())
        };

        // The callback may do blocking work and write to the terminal,
        // so raw mode is suspended around it; the bracket restores raw
        // mode even if the callback panics.
        let candidates = self.with_raw_suspended(|| {
            config
                .completion_callback()
                .map_or_else(Vec::new, |callback| callback(&head))
        });

        if candidates.is_empty() {
            self.edit.lock().term.beep();
            return Ok(SessionExit::Resume);
        }

        // Cycle position: `candidates.len()` shows the original line.
        let mut index = 0usize;
        loop {
            if index < candidates.len() {
                let mut preview = LineBuffer::new();
                preview.set_with_tail(&candidates[index], &tail);
                self.refresh_line(prompt, config.prompt_attr.as_ref(), &preview, None)?;
            } else {
                self.refresh_line(prompt, config.prompt_attr.as_ref(), line, None)?;
            }

            let key = match input::read_key(reader, None)? {
                KeyEvent::Key(key) => key,
                KeyEvent::None => continue,
                KeyEvent::Eof => return Ok(SessionExit::Eof),
                KeyEvent::Cancelled => return Ok(SessionExit::Cancelled),
            };

            match key {
                Key::Char('\t') => {
                    index = (index + 1) % (candidates.len() + 1);
                    if index == candidates.len() {
                        // Wrapped back around to the original buffer.
                        self.edit.lock().term.beep();
                    }
                }
                Key::Esc => return Ok(SessionExit::Resume),
                Key::ShiftTab => {
                    if index == 0 {
                        return Ok(SessionExit::Resume);
                    }
                    index -= 1;
                }
                other => {
                    if index < candidates.len() {
                        line.set_with_tail(&candidates[index], &tail);
                    }
                    return Ok(SessionExit::Redispatch(other));
                }
            }
        }
    }

    /// Leave raw mode, run `f` with no locks held, re-enter raw mode.
    fn with_raw_suspended<R>(&self, f: impl FnOnce() -> R) -> R {
        self.edit.lock().term.leave_raw();

        let result = panic::catch_unwind(AssertUnwindSafe(f));

        if let Err(err) = self.edit.lock().term.enter_raw() {
            log::warn!("failed to re-enter raw mode after callback: {err}");
        }
        match result {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    // ── Rendering ───────────────────────────────────────────────────

    /// Refresh with the configured prompt, computing the hint first
    /// (outside any lock — the callback is user code).
    fn refresh(&self, prompt: &str, config: &EditConfig, line: &LineBuffer) -> io::Result<()> {
        let hint = config
            .hints_callback()
            .and_then(|callback| callback(line.as_str()));
        self.refresh_line(
            prompt,
            config.prompt_attr.as_ref(),
            line,
            hint.as_ref().map(|h| (h.text.as_str(), h.attr())),
        )
    }

    /// Repaint and update the cross-thread snapshot in one lock scope.
    fn refresh_line(
        &self,
        prompt: &str,
        prompt_attr: Option<&TextAttr>,
        line: &LineBuffer,
        hint: Option<(&str, TextAttr)>,
    ) -> io::Result<()> {
        let mut shared = self.edit.lock();
        render::refresh(&mut *shared.term, prompt, prompt_attr, line, hint)?;
        shared.active = Some(ActiveEdit {
            prompt: prompt.to_owned(),
            prompt_attr: prompt_attr.copied(),
            line: line.as_str().to_owned(),
            pos: line.pos(),
        });
        Ok(())
    }

    // ── Cross-thread printing ───────────────────────────────────────

    fn print_from_start(
        &self,
        to_stderr: bool,
        segments: &[(&str, Option<&TextAttr>)],
    ) -> io::Result<()> {
        let mut shared = self.edit.lock();
        let editing = shared.active.is_some() && shared.term.is_raw();

        let mut out = Vec::new();
        if editing {
            // Wipe the prompt line, then restore cooked output so the
            // message's newline behaves.
            ansi::cursor_to_left(&mut out)?;
            ansi::erase_eol(&mut out)?;
            shared.term.write(&out)?;
            out.clear();
            shared.term.leave_raw();
        } else {
            ansi::cursor_to_left(&mut out)?;
        }

        let mut current: Option<&TextAttr> = None;
        let mut styled = false;
        for (text, attr) in segments {
            if *attr != current {
                lino_term::style::sgr(&mut out, *attr)?;
                current = *attr;
                styled = styled || attr.is_some();
            }
            out.extend_from_slice(text.as_bytes());
        }
        if styled {
            lino_term::style::sgr(&mut out, None)?;
        }
        out.extend_from_slice(b"\r\n");

        if to_stderr {
            shared.term.write_err(&out)?;
        } else {
            shared.term.write(&out)?;
            shared.term.flush()?;
        }

        if editing {
            if let Err(err) = shared.term.enter_raw() {
                log::warn!("failed to re-enter raw mode after print: {err}");
                return Ok(());
            }
            if let Some(snapshot) = shared.active.clone() {
                let mut line = LineBuffer::new();
                line.set(&snapshot.line);
                line.set_pos(snapshot.pos);
                render::refresh(
                    &mut *shared.term,
                    &snapshot.prompt,
                    snapshot.prompt_attr.as_ref(),
                    &line,
                    None,
                )?;
            }
        }
        Ok(())
    }
}

/// How a sub-session (search, completion) hands control back.
enum SessionExit {
    /// Continue the edit loop; the key that ended the session was
    /// consumed.
    Resume,
    /// Process this key as if freshly read.
    Redispatch(Key),
    Eof,
    Cancelled,
}

/// History navigation targets.
enum Nav {
    Delta(isize),
    Oldest,
    Newest,
}

// ─── Tests ──────────────────────────────────────────────────────────────────
