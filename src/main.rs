// SPDX-License-Identifier: MIT
//
// lino — a minimal interactive shell front-end for the line editor.
//
// This binary only demonstrates the engine's boundary: it builds a
// prompt, wires up demo completion and hints callbacks, persists
// history next to the user's home directory, and echoes what it reads.
// There is deliberately no command execution here.
//
//   keyboard → lino-term (raw mode, decoding) → lino-edit (edit loop)
//            → one completed line per read_line call → this loop

use std::path::PathBuf;
use std::process::ExitCode;

use lino_edit::{EditConfig, Editor, Hint, Interrupt, Outcome};
use lino_term::{Color, TextAttr};

/// Demo completions, in the spirit of every shell tutorial.
const COMMANDS: &[&str] = &["ls", "pwd", "cd", "vim", "nano", "exit", "clear"];

fn completions(prefix: &str) -> Vec<String> {
    if prefix.is_empty() {
        return Vec::new();
    }
    COMMANDS
        .iter()
        .filter(|cmd| cmd.starts_with(prefix))
        .map(|cmd| (*cmd).to_owned())
        .collect()
}

fn hints(line: &str) -> Option<Hint> {
    if line.is_empty() {
        return None;
    }
    let candidate = COMMANDS
        .iter()
        .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())?;
    Some(Hint::new(&candidate[line.len()..]).color(Color::Green))
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            std::fs::read_to_string("/proc/sys/kernel/hostname")
                .ok()
                .map(|s| s.trim().to_owned())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_owned())
}

fn history_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".lino_history"))
}

fn main() -> ExitCode {
    let editor = match Editor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("lino: cannot initialize terminal: {err}");
            return ExitCode::FAILURE;
        }
    };

    let history_file = history_path();
    if let Some(path) = &history_file {
        // A missing history file is a fresh start, not an error.
        let _ = editor.history_load(path);
    }

    let user = std::env::var("USER").unwrap_or_else(|_| "user".to_owned());
    let prompt = format!("<{}@{}> ", user, hostname());
    let config = EditConfig::new()
        .history_max(100)
        .prompt_attr(TextAttr::new().fg(Color::Blue))
        .completion(completions)
        .hints(hints);

    loop {
        let outcome = match editor.read_line(&prompt, &config) {
            Ok(outcome) => outcome,
            Err(err) => {
                eprintln!("lino: read error: {err}");
                break;
            }
        };

        let line = match outcome {
            Outcome::Line(line) => line,
            Outcome::EndOfInput => break,
            Outcome::Interrupted(Interrupt::CtrlC | Interrupt::Cancelled) => continue,
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        editor.history_add(trimmed);

        match trimmed {
            "exit" => break,
            "clear" => {
                if let Err(err) = editor.clear_screen() {
                    eprintln!("lino: {err}");
                }
            }
            other => {
                let _ = editor.print_line(other, None);
            }
        }
    }

    if let Some(path) = &history_file {
        if let Err(err) = editor.history_save(path) {
            eprintln!("lino: cannot save history: {err}");
        }
    }
    ExitCode::SUCCESS
}
