//! Rendering of a failed run for people.
//!
//! A failure prints as one `error:` line followed by labelled notes naming
//! what was being read when it happened, and at most one hint.
//!
//! ```text
//! error: malformed declaration: slot rule of interface `content`: ...
//!   component: provider
//!        rule: slot rule of interface `content`
//!        hint: run `ifacesim check-decls` on the listed snaps to find the bad rule
//! ```

use std::fmt;
use std::path::PathBuf;

/// Hints for failures with a known next step.
pub mod hints {
    pub const PARAMS: &str =
        "pass a single JSON object, e.g. '{\"target-snap\": \"app\", \"snaps\": []}'";

    pub const COMPONENT_LAYOUT: &str =
        "each component needs <dir>/<id>/.snap.json and <dir>/<id>/snap.yaml";

    pub const CHECK_DECLS: &str =
        "run `ifacesim check-decls` on the listed snaps to find the bad rule";

    pub const MAX_ITERATIONS: &str =
        "raise `simulation.max-engine-iterations` in .ifacesim/config.toml";
}

const LABEL_WIDTH: usize = 11;

/// What a failure was about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Note {
    /// File being read
    File(PathBuf),
    /// Component being loaded or registered
    Component(String),
    /// Declaration rule being decoded
    Rule(String),
    /// Change being run by the task engine
    Change(String),
}

impl Note {
    fn label(&self) -> &'static str {
        match self {
            Note::File(_) => "file",
            Note::Component(_) => "component",
            Note::Rule(_) => "rule",
            Note::Change(_) => "change",
        }
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::File(path) => write!(f, "{}", path.display()),
            Note::Component(s) | Note::Rule(s) | Note::Change(s) => f.write_str(s),
        }
    }
}

/// An error as shown on stderr in human mode.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    message: String,
    notes: Vec<Note>,
    hint: Option<&'static str>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            notes: Vec::new(),
            hint: None,
        }
    }

    pub fn note(mut self, note: Note) -> Self {
        self.notes.push(note);
        self
    }

    pub fn hint(mut self, hint: &'static str) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Render for a terminal.
    pub fn render(&self, color: bool) -> String {
        let paint = |code: &str, text: &str| {
            if color {
                format!("\x1b[{}m{}\x1b[0m", code, text)
            } else {
                text.to_string()
            }
        };

        let mut out = format!("{}: {}\n", paint("1;31", "error"), self.message);
        for note in &self.notes {
            out.push_str(&format!("{:>w$}: {}\n", note.label(), note, w = LABEL_WIDTH));
        }
        if let Some(hint) = self.hint {
            let label = format!("{:>w$}", "hint", w = LABEL_WIDTH);
            out.push_str(&format!("{}: {}\n", paint("1;32", &label), hint));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.render(color));
}
