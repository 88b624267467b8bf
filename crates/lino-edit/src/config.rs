//! Per-call editor configuration.
//!
//! Everything a `read_line` call can be parameterized with lives in
//! one plain struct with builder-style setters: the completion and
//! hints callbacks, the prompt styling, the history cap, and the
//! multi-line flag. Nothing here is global.

use lino_term::{Color, TextAttr};

/// A candidate-producing completion callback: receives the text
/// before the cursor, returns the candidates.
pub type CompletionFn = dyn Fn(&str) -> Vec<String>;

/// A hints callback: receives the current line, returns a suffix to
/// preview after it.
pub type HintsFn = dyn Fn(&str) -> Option<Hint>;

/// A hint: gray-matter text previewed after the typed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    /// The suffix to display (not inserted into the buffer).
    pub text: String,
    pub color: Option<Color>,
    pub bold: bool,
}

impl Hint {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
            bold: false,
        }
    }

    #[must_use]
    pub fn color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    #[must_use]
    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// The text attribute this hint renders with.
    #[must_use]
    pub fn attr(&self) -> TextAttr {
        let mut attr = TextAttr::new();
        if let Some(color) = self.color {
            attr = attr.fg(color);
        }
        if self.bold {
            attr = attr.bold();
        }
        attr
    }
}

/// Configuration for one `read_line` call.
#[derive(Default)]
pub struct EditConfig {
    /// Accepted for API parity; the renderer currently always uses
    /// single-line horizontal scrolling.
    pub multiline: bool,
    /// Applied to the history store when the call starts.
    pub history_max: Option<usize>,
    /// Styling for the prompt text.
    pub prompt_attr: Option<TextAttr>,
    completion: Option<Box<CompletionFn>>,
    hints: Option<Box<HintsFn>>,
}

impl EditConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn multiline(mut self, on: bool) -> Self {
        self.multiline = on;
        self
    }

    #[must_use]
    pub fn history_max(mut self, max: usize) -> Self {
        self.history_max = Some(max);
        self
    }

    #[must_use]
    pub fn prompt_attr(mut self, attr: TextAttr) -> Self {
        self.prompt_attr = Some(attr);
        self
    }

    #[must_use]
    pub fn completion(mut self, callback: impl Fn(&str) -> Vec<String> + 'static) -> Self {
        self.completion = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn hints(mut self, callback: impl Fn(&str) -> Option<Hint> + 'static) -> Self {
        self.hints = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn completion_callback(&self) -> Option<&CompletionFn> {
        self.completion.as_deref()
    }

    #[must_use]
    pub fn hints_callback(&self) -> Option<&HintsFn> {
        self.hints.as_deref()
    }
}

impl std::fmt::Debug for EditConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditConfig")
            .field("multiline", &self.multiline)
            .field("history_max", &self.history_max)
            .field("prompt_attr", &self.prompt_attr)
            .field("completion", &self.completion.is_some())
            .field("hints", &self.hints.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_has_no_callbacks() {
        let config = EditConfig::new();
        assert!(config.completion_callback().is_none());
        assert!(config.hints_callback().is_none());
        assert!(!config.multiline);
    }

    #[test]
    fn callbacks_are_invocable() {
        let config = EditConfig::new()
            .completion(|prefix| vec![format!("{prefix}x")])
            .hints(|line| Some(Hint::new(format!("{line}!"))));
        assert_eq!(
            config.completion_callback().unwrap()("a"),
            vec!["ax".to_owned()]
        );
        assert_eq!(
            config.hints_callback().unwrap()("b").unwrap().text,
            "b!"
        );
    }

    #[test]
    fn hint_attr_reflects_color_and_bold() {
        let hint = Hint::new("s").color(Color::Green).bold();
        let attr = hint.attr();
        assert_eq!(attr.fg, Some(Color::Green));
        assert!(attr.styles.contains(lino_term::Styles::BOLD));
    }
}
