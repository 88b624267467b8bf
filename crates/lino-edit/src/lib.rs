//! # lino-edit — the line-editing engine
//!
//! Turns a raw keyboard stream into a single edited line of text, with
//! history recall, reverse incremental search, tab completion, hints,
//! and styled output — safely usable from multiple threads of one
//! process.
//!
//! - **[`buffer`]** — the in-progress line: UTF-8 buffer, character
//!   cursor, capture buffer
//! - **[`history`]** — bounded, deduplicated history with persistence
//! - **[`search`]** — reverse incremental search over history
//! - **[`render`]** — prompt-line repainting and the column math
//! - **[`config`]** — per-call configuration and callbacks
//! - **[`editor`]** — the [`Editor`] front door and its edit loop
//!
//! The terminal itself lives behind `lino-term`'s `Term` trait; tests
//! drive the whole engine through the in-memory backend.

pub mod buffer;
pub mod config;
pub mod editor;
pub mod history;
pub mod render;
pub mod search;

pub use buffer::{LineBuffer, NoRoom};
pub use config::{EditConfig, Hint};
pub use editor::{Editor, Interrupt, Outcome};
pub use history::History;
