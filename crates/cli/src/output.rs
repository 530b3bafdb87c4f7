// Output format auto-detection for the CLI.
//
// TTY → human-readable text. Piped/redirected → structured JSON.
// `--json` flag forces JSON output regardless of terminal.
// Errors and warnings always go to stderr as one line.

use serde::Serialize;
use std::io::{self, IsTerminal, Write};

use crate::exit_code::ExitCode;

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    Human,
    /// Machine-readable JSON (one object per response).
    Json,
}

impl OutputFormat {
    /// Auto-detect format: JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    /// Testable variant that takes an explicit `is_tty` flag.
    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }
}

/// Write a value to stdout in the selected format.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    write_output(&mut io::stdout().lock(), format, value, human_fn)
}

/// Write a value to a provided writer (useful for testing).
pub fn write_output<W, T, F>(
    writer: &mut W,
    format: OutputFormat,
    value: &T,
    human_fn: F,
) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => {
            writeln!(writer, "{}", human_fn(value))
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

/// `error: [CODE] message` on stderr.
pub fn print_error(code: &str, message: &str) {
    let line = render_human_stderr_line(
        "error",
        &format!("[{code}] {message}"),
        io::stderr().is_terminal(),
        ANSI_RED,
    );
    let _ = writeln!(io::stderr().lock(), "{line}");
}

pub fn print_warning(message: &str) {
    let line = render_human_stderr_line("warning", message, io::stderr().is_terminal(), ANSI_YELLOW);
    let _ = writeln!(io::stderr().lock(), "{line}");
}

/// Print a command failure as a single categorized line.
pub fn print_anyhow_error(error: &anyhow::Error) {
    print_error(ExitCode::label(error), &describe_chain(error));
}

/// Join the error chain with `: `, skipping causes whose text an outer
/// error already includes.
fn describe_chain(error: &anyhow::Error) -> String {
    let mut message = String::new();
    for cause in error.chain() {
        let text = cause.to_string();
        if text.is_empty() || message.contains(&text) {
            continue;
        }
        if !message.is_empty() {
            message.push_str(": ");
        }
        message.push_str(&text);
    }
    message
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool, color: &str) -> String {
    if is_tty {
        format!("{color}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use pushgate_common::types::DenyReason;
    use pushgate_gate::error::GateError;

    #[test]
    fn detect_tty_returns_human() {
        assert_eq!(OutputFormat::detect_from_terminal(true), OutputFormat::Human);
    }

    #[test]
    fn detect_pipe_returns_json() {
        assert_eq!(OutputFormat::detect_from_terminal(false), OutputFormat::Json);
    }

    #[test]
    fn detect_json_flag_overrides_tty() {
        assert_eq!(OutputFormat::detect(true), OutputFormat::Json);
    }

    #[test]
    fn write_output_human_format() {
        #[derive(Serialize)]
        struct Info {
            scope: String,
        }
        let info = Info { scope: "global".into() };
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Human, &info, |i| format!("Scope: {}", i.scope))
            .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "Scope: global\n");
    }

    #[test]
    fn write_output_json_format() {
        #[derive(Serialize)]
        struct Info {
            scope: String,
            age_secs: u64,
        }
        let info = Info { scope: "global".into(), age_secs: 42 };
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Json, &info, |_| {
            unreachable!("human_fn should not be called in JSON mode")
        })
        .unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed["scope"], "global");
        assert_eq!(parsed["age_secs"], 42);
    }

    #[test]
    fn render_human_error_uses_color_for_tty() {
        let line = render_human_stderr_line("error", "boom", true, ANSI_RED);
        assert!(line.contains(ANSI_RED));
        assert!(line.contains(ANSI_RESET));
        assert!(line.contains("boom"));
    }

    #[test]
    fn render_human_warning_without_tty_is_plain() {
        let line = render_human_stderr_line("warning", "careful", false, ANSI_YELLOW);
        assert_eq!(line, "warning: careful");
    }

    #[test]
    fn policy_error_is_one_line_naming_the_reference() {
        let err = anyhow::Error::new(GateError::PolicyViolation {
            reference: "refs/heads/main".into(),
            reason: DenyReason::NonFastForward,
        });
        assert_eq!(
            describe_chain(&err),
            "refs/heads/main: update is not a fast-forward of the remote reference"
        );
    }

    #[test]
    fn describe_chain_skips_repeated_causes() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let outer = format!("lease store failed: {io}");
        let result: Result<(), _> = Err(io);
        let err = result.context(outer).context("could not gate push").unwrap_err();

        assert_eq!(describe_chain(&err), "could not gate push: lease store failed: access denied");
    }
}
