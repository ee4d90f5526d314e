// Terminal output helpers for the CLI.
//
// Colors are only emitted when the stream is a terminal. Remote failures
// are reported as the classified status line followed by the response
// body, everything else as a single `error:` line.

use std::io::{self, IsTerminal, Write};

use habits_core::client::RequestError;
use habits_core::coordinator::SyncError;
pub use habits_core::json::format_number;
use habits_core::json::to_pretty_string;
use serde::Serialize;

const ANSI_RED: &str = "\x1b[31m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_RESET: &str = "\x1b[0m";

/// Colors for human-readable stdout output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    /// Colored when stdout is a terminal.
    pub fn detect() -> Self {
        Self::from_terminal(io::stdout().is_terminal())
    }

    pub const fn from_terminal(is_tty: bool) -> Self {
        Self { enabled: is_tty }
    }

    #[cfg(test)]
    pub const fn plain() -> Self {
        Self::from_terminal(false)
    }

    pub fn green(self, text: &str) -> String {
        self.paint(ANSI_GREEN, text)
    }

    pub fn red(self, text: &str) -> String {
        self.paint(ANSI_RED, text)
    }

    pub fn bold_red(self, text: &str) -> String {
        if self.enabled {
            format!("{ANSI_BOLD}{ANSI_RED}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    fn paint(self, color: &str, text: &str) -> String {
        if self.enabled {
            format!("{color}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

/// Pretty JSON (sorted keys, 4-space indent) followed by a newline.
pub fn write_json<W, T>(out: &mut W, value: &T) -> io::Result<()>
where
    W: Write + ?Sized,
    T: Serialize + ?Sized,
{
    writeln!(out, "{}", to_pretty_string(value))
}

/// Write the diagnostics for a failed command to stderr.
pub fn print_error(error: &anyhow::Error) {
    let rendered = render_error(error, io::stderr().is_terminal());
    let _ = io::stderr().lock().write_all(rendered.as_bytes());
}

pub fn render_error(error: &anyhow::Error, is_tty: bool) -> String {
    match find_request_error(error) {
        Some(request) => render_request_error(request),
        None => {
            let mut line = render_human_stderr_line("error", &format!("{error:#}"), is_tty);
            line.push('\n');
            line
        }
    }
}

/// The classified status line, then the body: pretty JSON when it parsed,
/// raw text otherwise.
pub fn render_request_error(error: &RequestError) -> String {
    let mut text = format!("{error}\n");
    if let Some(body) = &error.body {
        text.push_str(&body.render());
        text.push('\n');
    }
    text
}

/// First remote failure in the chain. `SyncError` forwards its source
/// transparently, so it is unwrapped explicitly.
pub fn find_request_error(error: &anyhow::Error) -> Option<&RequestError> {
    error.chain().find_map(|cause| {
        cause
            .downcast_ref::<RequestError>()
            .or_else(|| cause.downcast_ref::<SyncError>().and_then(SyncError::as_request))
    })
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool) -> String {
    if is_tty {
        format!("{ANSI_RED}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}
