// SPDX-License-Identifier: MIT
//
// Terminal backend errors.

use std::fmt;
use std::io;

/// Why raw mode could not be entered.
///
/// All three variants mean the same thing to the editing engine: fall
/// back to a plain line-buffered read with no history or completion.
/// They are kept distinct so the fallback decision can be logged with
/// its actual cause.
#[derive(Debug)]
pub enum TermError {
    /// Stdin is not connected to an interactive terminal.
    NotATerminal,
    /// `$TERM` names a terminal type that cannot handle our escape
    /// sequences (`dumb`, `cons25`).
    UnsupportedTerminal(String),
    /// The mode-query or mode-set system call failed.
    ModeSwitchFailed(io::Error),
}

impl fmt::Display for TermError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotATerminal => write!(f, "stdin is not a terminal"),
            Self::UnsupportedTerminal(term) => {
                write!(f, "unsupported terminal type {term:?}")
            }
            Self::ModeSwitchFailed(err) => {
                write!(f, "failed to switch terminal mode: {err}")
            }
        }
    }
}

impl std::error::Error for TermError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ModeSwitchFailed(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_cause() {
        assert_eq!(
            TermError::NotATerminal.to_string(),
            "stdin is not a terminal"
        );
        assert!(
            TermError::UnsupportedTerminal("dumb".into())
                .to_string()
                .contains("dumb")
        );
    }

    #[test]
    fn mode_switch_carries_source() {
        use std::error::Error;
        let err = TermError::ModeSwitchFailed(io::Error::other("boom"));
        assert!(err.source().is_some());
    }
}
