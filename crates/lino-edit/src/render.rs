//! Line rendering — the single most column-sensitive code in the
//! engine.
//!
//! Every mutation repaints the whole prompt line in one batch: cursor
//! to column 0, the (possibly styled) prompt, the visible slice of the
//! buffer, an optional hint, erase to end of line, and finally the
//! cursor parked at its true column. Getting the column arithmetic
//! wrong here shows up instantly as a desynced cursor, so all of it is
//! funnelled through [`char_cols`] and [`prompt_width`] and covered by
//! tests against the in-memory backend.
//!
//! Lines wider than the terminal scroll horizontally: characters are
//! trimmed from the *front of the rendered view only* (the buffer is
//! untouched) until prompt, line and cursor fit.

use std::io;

use lino_term::{Term, TextAttr, ansi, style};
use unicode_width::UnicodeWidthChar;

use crate::buffer::LineBuffer;

/// Display columns occupied by one buffer character.
///
/// Control characters render as the two-column `^X` glyph. Everything
/// else takes its Unicode display width (wide CJK forms take two).
#[must_use]
pub fn char_cols(ch: char) -> usize {
    if (ch as u32) < 0x20 {
        2
    } else {
        UnicodeWidthChar::width(ch).unwrap_or(1)
    }
}

/// Displayed width of a prompt, not counting embedded color escapes.
///
/// A small state machine recognizes `ESC [ <digits/semicolons> m` runs
/// as zero-width; anything else — including unterminated or non-color
/// escapes — counts as visible, which is also what the terminal will
/// make of it.
#[must_use]
pub fn prompt_width(prompt: &str) -> usize {
    enum State {
        Normal,
        SawEsc,
        InCsi,
    }

    let mut width = 0;
    let mut pending = 0; // width of a tentative, not-yet-complete escape
    let mut state = State::Normal;

    for ch in prompt.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(1);
        match state {
            State::Normal => {
                if ch == '\x1b' {
                    pending = w;
                    state = State::SawEsc;
                } else {
                    width += w;
                }
            }
            State::SawEsc => {
                if ch == '[' {
                    pending += w;
                    state = State::InCsi;
                } else {
                    // Not a CSI after all; both chars were visible.
                    width += pending + w;
                    pending = 0;
                    state = State::Normal;
                }
            }
            State::InCsi => {
                if ch.is_ascii_digit() || ch == ';' {
                    pending += w;
                } else {
                    if ch != 'm' {
                        // Some other CSI final — count the whole run.
                        width += pending + w;
                    }
                    pending = 0;
                    state = State::Normal;
                }
            }
        }
    }
    width + pending
}

/// Repaint the prompt line.
///
/// `hint` is appended after the buffer (styled, truncated to the
/// remaining columns) when the caller decided one applies; it never
/// affects the cursor column.
///
/// # Errors
///
/// Propagates terminal write errors.
pub fn refresh(
    term: &mut dyn Term,
    prompt: &str,
    prompt_attr: Option<&TextAttr>,
    line: &LineBuffer,
    hint: Option<(&str, TextAttr)>,
) -> io::Result<()> {
    let cols = usize::from(term.window_size().cols.max(1));
    let pwidth = prompt_width(prompt);
    let chars: Vec<char> = line.as_str().chars().collect();

    // Columns the full line would need.
    let mut needed = pwidth + chars.iter().copied().map(char_cols).sum::<usize>();

    // Horizontal scroll: drop characters from the front of the view,
    // never past the cursor, until the line fits.
    let mut start = 0;
    let mut vis_pos = line.pos();
    while needed >= cols && vis_pos > 0 {
        needed -= char_cols(chars[start]);
        start += 1;
        vis_pos -= 1;
    }

    let mut out = Vec::with_capacity(64 + prompt.len() + line.as_str().len());
    ansi::cursor_to_left(&mut out)?;
    if prompt_attr.is_some() {
        style::sgr(&mut out, prompt_attr)?;
        out.extend_from_slice(prompt.as_bytes());
        style::sgr(&mut out, None)?;
    } else {
        out.extend_from_slice(prompt.as_bytes());
    }

    // The visible buffer slice, stopping when the width is exhausted.
    let mut used = pwidth;
    let mut cursor_col = pwidth;
    let mut utf8 = [0u8; 4];
    for (i, &ch) in chars[start..].iter().enumerate() {
        let w = char_cols(ch);
        if used + w > cols {
            break;
        }
        if (ch as u32) < 0x20 {
            ansi::control_glyph(&mut out, ch as u8)?;
        } else {
            out.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
        }
        used += w;
        if i < vis_pos {
            cursor_col += w;
        }
    }

    if let Some((text, attr)) = hint {
        let mut styled = false;
        for ch in text.chars() {
            let w = char_cols(ch);
            if used + w > cols {
                break;
            }
            if !styled {
                style::sgr(&mut out, Some(&attr))?;
                styled = true;
            }
            if (ch as u32) < 0x20 {
                ansi::control_glyph(&mut out, ch as u8)?;
            } else {
                out.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
            }
            used += w;
        }
        if styled {
            style::sgr(&mut out, None)?;
        }
    }

    ansi::erase_eol(&mut out)?;
    #[allow(clippy::cast_possible_truncation)] // cursor_col < cols <= u16::MAX
    ansi::cursor_to_col(&mut out, cursor_col as u16)?;

    term.write(&out)?;
    term.flush()
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use lino_term::{Color, MemTerm};
    use pretty_assertions::assert_eq;

    fn buffer(text: &str) -> LineBuffer {
        let mut line = LineBuffer::new();
        line.set(text);
        line
    }

    fn paint(cols: u16, prompt: &str, line: &LineBuffer) -> String {
        let mut term = MemTerm::new(cols, 24);
        let probe = term.clone();
        refresh(&mut term, prompt, None, line, None).unwrap();
        probe.output_str()
    }

    /// The cursor column requested by the final `\r ESC [ n C`.
    fn cursor_col(output: &str) -> usize {
        let tail = output.rsplit('\r').next().unwrap();
        if tail.is_empty() {
            return 0;
        }
        let digits: String = tail
            .trim_start_matches("\x1b[")
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().unwrap()
    }

    // ── prompt_width ────────────────────────────────────────────────

    #[test]
    fn plain_prompt_width() {
        assert_eq!(prompt_width("> "), 2);
        assert_eq!(prompt_width(""), 0);
    }

    #[test]
    fn color_escapes_are_zero_width() {
        assert_eq!(prompt_width("\x1b[1;32m~\x1b[0m> "), 3);
        assert_eq!(prompt_width("\x1b[34muser@host\x1b[0m "), 10);
    }

    #[test]
    fn non_color_escape_counts_as_visible() {
        // ESC [ 2 K is not an SGR run; the terminal would not print
        // it, but neither did the original — both count it.
        assert_eq!(prompt_width("\x1b[2K> "), 6);
    }

    #[test]
    fn unterminated_escape_counts_as_visible() {
        assert_eq!(prompt_width("> \x1b[1;3"), 2 + 5);
    }

    #[test]
    fn wide_chars_count_double() {
        assert_eq!(prompt_width("界> "), 4);
    }

    // ── refresh ─────────────────────────────────────────────────────

    #[test]
    fn simple_line_renders_in_one_batch() {
        let line = buffer("hello");
        let out = paint(80, "> ", &line);
        assert_eq!(out, "\r> hello\x1b[0K\r\x1b[7C");
    }

    #[test]
    fn cursor_column_is_prompt_plus_chars_before_cursor() {
        let mut line = buffer("hello");
        line.set_pos(2);
        let out = paint(80, "> ", &line);
        assert_eq!(cursor_col(&out), 2 + 2);
    }

    #[test]
    fn cursor_at_column_zero_prompt_only() {
        let line = buffer("");
        let out = paint(80, "", &line);
        // Bare CR, no CUF.
        assert!(out.ends_with("\x1b[0K\r"));
        assert_eq!(cursor_col(&out), 0);
    }

    #[test]
    fn control_chars_render_as_inverse_glyphs_and_take_two_columns() {
        let mut line = buffer("a");
        line.insert(1, '\u{1}').unwrap(); // Ctrl-A
        line.insert(2, 'b').unwrap();
        let out = paint(80, "> ", &line);
        assert!(out.contains("\x1b[7m^A\x1b[0m"));
        // prompt 2 + 'a' 1 + glyph 2 + 'b' 1
        assert_eq!(cursor_col(&out), 6);
    }

    #[test]
    fn styled_prompt_is_wrapped_in_sgr() {
        let mut term = MemTerm::new(80, 24);
        let probe = term.clone();
        let attr = TextAttr::new().fg(Color::Green);
        let line = buffer("x");
        refresh(&mut term, "> ", Some(&attr), &line, None).unwrap();
        let out = probe.output_str();
        assert!(out.contains("m> \x1b[0m"));
        // Styling must not disturb the column math.
        assert_eq!(cursor_col(&out), 3);
    }

    #[test]
    fn long_line_trims_from_the_front() {
        let text: String = ('a'..='z').collect(); // 26 chars
        let line = buffer(&text);
        let out = paint(10, "> ", &line);
        // needed = 2 + 26 = 28; trimmed until 2 + visible < 10.
        assert!(!out.contains('a'));
        assert!(out.contains("tuvwxyz"));
        assert_eq!(cursor_col(&out), 2 + 7);
    }

    #[test]
    fn trim_never_passes_the_cursor() {
        let text: String = ('a'..='z').collect();
        let mut line = buffer(&text);
        line.set_pos(0);
        let out = paint(10, "> ", &line);
        // Cursor at the far left: the front survives, the tail is cut.
        assert!(out.contains("\r> abcdefgh"));
        assert!(!out.contains('j'));
        assert_eq!(cursor_col(&out), 2);
    }

    #[test]
    fn output_never_exceeds_the_width() {
        for cols in [4u16, 7, 10, 23] {
            let text: String = std::iter::repeat_n('x', 40).collect();
            let line = buffer(&text);
            let out = paint(cols, "> ", &line);
            let body = out
                .rsplit_once("\x1b[0K")
                .map(|(head, _)| head)
                .unwrap()
                .trim_start_matches('\r');
            let width: usize = body.chars().map(char_cols).sum();
            assert!(width <= usize::from(cols), "cols={cols} width={width}");
        }
    }

    #[test]
    fn exact_fit_boundary_trims_one() {
        // prompt 2 + 8 chars = 10 == cols triggers the trim.
        let line = buffer("abcdefgh");
        let out = paint(10, "> ", &line);
        assert!(!out.contains("\r> a"));
        assert_eq!(cursor_col(&out), 2 + 7);
    }

    #[test]
    fn hint_is_styled_and_does_not_move_the_cursor() {
        let mut term = MemTerm::new(80, 24);
        let probe = term.clone();
        let line = buffer("l");
        let attr = TextAttr::new().fg(Color::Green);
        refresh(&mut term, "> ", None, &line, Some(("s", attr))).unwrap();
        let out = probe.output_str();
        assert!(out.contains('s'));
        // Cursor stays after the typed 'l', before the hint.
        assert_eq!(cursor_col(&out), 3);
    }

    #[test]
    fn hint_is_truncated_to_the_window() {
        let mut term = MemTerm::new(6, 24);
        let probe = term.clone();
        let line = buffer("ab");
        let attr = TextAttr::new();
        refresh(&mut term, "> ", None, &line, Some(("longhint", attr))).unwrap();
        let out = probe.output_str();
        assert!(out.contains("lo"));
        assert!(!out.contains("longh"));
    }

    #[test]
    fn wide_chars_move_the_cursor_two_columns() {
        let line = buffer("世界");
        let out = paint(80, "> ", &line);
        assert_eq!(cursor_col(&out), 2 + 4);
    }
}
