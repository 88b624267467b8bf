//! Reverse incremental search over history — the pure matching half.
//!
//! The interactive loop (prompt display, key handling) lives in the
//! editor; this module only knows how to scan the store for a
//! substring match, which keeps the search semantics testable without
//! a terminal.

use crate::history::History;

/// Scan direction through history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDir {
    /// Toward older entries (index decreasing).
    Older,
    /// Toward newer entries (index increasing).
    Newer,
}

/// A successful search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    /// History index of the matching entry.
    pub index: usize,
    /// Character position of the match within the entry — where the
    /// cursor lands when the search is accepted.
    pub char_pos: usize,
}

/// Find `query` as a substring, scanning from `from` (inclusive) in
/// `dir` until a match or the list bound.
///
/// `skip_line`, when set, rejects entries equal to it — the
/// search-older/search-newer keys use this so stepping through
/// history skips entries identical to the line already displayed.
#[must_use]
pub fn find(
    history: &History,
    query: &str,
    from: usize,
    dir: SearchDir,
    skip_line: Option<&str>,
) -> Option<SearchHit> {
    let mut index = from;
    loop {
        let entry = history.get(index)?;
        if let Some(byte_off) = entry.find(query) {
            if skip_line != Some(entry) {
                return Some(SearchHit {
                    index,
                    char_pos: entry[..byte_off].chars().count(),
                });
            }
        }
        index = match dir {
            SearchDir::Older => index.checked_sub(1)?,
            SearchDir::Newer => index + 1,
        };
    }
}

/// The search-mode prompt shown in place of the configured prompt.
#[must_use]
pub fn search_prompt(query: &str) -> String {
    format!("(reverse-i-search)'{query}': ")
}

// ─── Tests ──────────────────────────────────────────────────────────────────
