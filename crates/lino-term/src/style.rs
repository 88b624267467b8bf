// SPDX-License-Identifier: MIT
//
// Text attributes — optional styling for prompts and printed lines.
//
// The model is deliberately small: the eight base ANSI colors plus
// bold / underline / inverse / bright flags. `None` anywhere means
// "inherit the terminal default". Bright colors are rendered with the
// 90-base SGR codes on terminals advertising 256-color support and
// approximated with bold everywhere else.

use std::io::{self, Write};
use std::sync::OnceLock;

use bitflags::bitflags;

// ─── Color ──────────────────────────────────────────────────────────────────

/// The eight base ANSI colors.
///
/// The discriminant is the SGR offset: foreground is `30 + color`,
/// background `40 + color`, bright foreground `90 + color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
}

bitflags! {
    /// Style flags carried alongside the colors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Styles: u8 {
        const BOLD      = 0b0001;
        const UNDERLINE = 0b0010;
        const INVERT    = 0b0100;
        const BRIGHT    = 0b1000;
    }
}

// ─── TextAttr ───────────────────────────────────────────────────────────────

/// A complete text attribute: colors plus style flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextAttr {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub styles: Styles,
}

impl TextAttr {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn fg(mut self, color: Color) -> Self {
        self.fg = Some(color);
        self
    }

    #[must_use]
    pub const fn bg(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }

    #[must_use]
    pub fn bold(mut self) -> Self {
        self.styles |= Styles::BOLD;
        self
    }

    #[must_use]
    pub fn underline(mut self) -> Self {
        self.styles |= Styles::UNDERLINE;
        self
    }

    #[must_use]
    pub fn invert(mut self) -> Self {
        self.styles |= Styles::INVERT;
        self
    }

    #[must_use]
    pub fn bright(mut self) -> Self {
        self.styles |= Styles::BRIGHT;
        self
    }
}

// ─── Bright-color capability ────────────────────────────────────────────────

/// Whether `$TERM` advertises 256-color support (checked once per
/// process; the terminal type does not change under us).
fn is_256_color_term() -> bool {
    static CACHE: OnceLock<bool> = OnceLock::new();
    *CACHE.get_or_init(|| term_supports_bright(std::env::var("TERM").ok().as_deref()))
}

/// Pure form of the `$TERM` check, split out for tests.
fn term_supports_bright(term: Option<&str>) -> bool {
    term.is_some_and(|t| t.contains("256color"))
}

// ─── SGR emission ───────────────────────────────────────────────────────────

/// Emit the SGR sequence selecting `attr`, or a full reset for `None`.
///
/// The sequence always starts from a reset (`ESC [ 0`) so attributes
/// never leak between writes. Bright foregrounds use the 90-base codes
/// when the terminal supports them and bold otherwise; a bold standard
/// color on a 256-color terminal also uses the 90 base, matching how
/// most terminals historically displayed bold.
pub fn sgr(w: &mut impl Write, attr: Option<&TextAttr>) -> io::Result<()> {
    sgr_with(w, attr, is_256_color_term())
}

fn sgr_with(w: &mut impl Write, attr: Option<&TextAttr>, wide_palette: bool) -> io::Result<()> {
    let Some(attr) = attr else {
        return w.write_all(b"\x1b[0m");
    };

    let mut bold = attr.styles.contains(Styles::BOLD);
    w.write_all(b"\x1b[0")?;

    if let Some(fg) = attr.fg {
        let mut base = 30u8;
        if attr.styles.contains(Styles::BRIGHT) {
            if wide_palette {
                base = 90;
            } else {
                bold = true;
            }
        } else if bold && wide_palette {
            base = 90;
        }
        write!(w, ";{}", base + fg as u8)?;
    }
    if bold {
        w.write_all(b";1")?;
    }
    if attr.styles.contains(Styles::UNDERLINE) {
        w.write_all(b";4")?;
    }
    if let Some(bg) = attr.bg {
        write!(w, ";{}", 40 + bg as u8)?;
    }
    if attr.styles.contains(Styles::INVERT) {
        w.write_all(b";7")?;
    }
    w.write_all(b"m")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn render(attr: Option<&TextAttr>, wide: bool) -> String {
        let mut buf = Vec::new();
        sgr_with(&mut buf, attr, wide).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn none_resets() {
        assert_eq!(render(None, false), "\x1b[0m");
        assert_eq!(render(None, true), "\x1b[0m");
    }

    #[test]
    fn plain_fg() {
        let attr = TextAttr::new().fg(Color::Green);
        assert_eq!(render(Some(&attr), false), "\x1b[0;32m");
    }

    #[test]
    fn bright_uses_90_base_on_wide_palettes() {
        let attr = TextAttr::new().fg(Color::Red).bright();
        assert_eq!(render(Some(&attr), true), "\x1b[0;91m");
    }

    #[test]
    fn bright_falls_back_to_bold() {
        let attr = TextAttr::new().fg(Color::Red).bright();
        assert_eq!(render(Some(&attr), false), "\x1b[0;31;1m");
    }

    #[test]
    fn bold_fg_promotes_on_wide_palettes() {
        let attr = TextAttr::new().fg(Color::Blue).bold();
        assert_eq!(render(Some(&attr), true), "\x1b[0;94;1m");
        assert_eq!(render(Some(&attr), false), "\x1b[0;34;1m");
    }

    #[test]
    fn background_and_flags_combine() {
        let attr = TextAttr::new()
            .fg(Color::White)
            .bg(Color::Blue)
            .underline()
            .invert();
        assert_eq!(render(Some(&attr), false), "\x1b[0;37;4;44;7m");
    }

    #[test]
    fn bold_without_color_is_just_bold() {
        let attr = TextAttr::new().bold();
        assert_eq!(render(Some(&attr), true), "\x1b[0;1m");
    }

    #[test]
    fn term_detection() {
        assert!(term_supports_bright(Some("xterm-256color")));
        assert!(!term_supports_bright(Some("xterm")));
        assert!(!term_supports_bright(None));
    }
}
